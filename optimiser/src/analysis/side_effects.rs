// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use yul::{
    visit::{walk_for_loop, walk_function_call, Visitor},
    Block, Dialect, Expression, ForLoop, FunctionCall, FunctionDefinition, Identifier, SideEffects, Statement,
    YulString,
};

use super::CallGraph;

/// Computes the side effects of every function in the program.
///
/// Functions that are part of a call cycle get [`SideEffects::WORST`], and
/// functions that contain a loop are neither movable nor removable, since
/// they might not terminate.
pub struct SideEffectsPropagator;

impl SideEffectsPropagator {
    #[must_use]
    pub fn side_effects(dialect: &dyn Dialect, graph: &CallGraph) -> BTreeMap<YulString, SideEffects> {
        let mut result = BTreeMap::new();

        for component in graph.strongly_connected_components() {
            let is_cycle = component.len() > 1
                || graph.function_calls[&component[0]].contains(&component[0]);

            for function in component {
                if function.is_empty() {
                    continue;
                }

                let effects = if is_cycle {
                    SideEffects::WORST
                } else {
                    Self::function_effects(dialect, graph, &result, &function)
                };

                trace!("Function `{function}` has side effects {effects:?}");
                result.insert(function, effects);
            }
        }

        result
    }

    fn function_effects(
        dialect: &dyn Dialect,
        graph: &CallGraph,
        known: &BTreeMap<YulString, SideEffects>,
        function: &YulString,
    ) -> SideEffects {
        let mut effects = SideEffects::NONE;

        if graph.functions_with_loops.contains(function) {
            effects.movable = false;
            effects.side_effect_free = false;
            effects.side_effect_free_if_no_msize = false;
        }

        for callee in &graph.function_calls[function] {
            effects += match dialect.builtin(callee) {
                Some(builtin) => builtin.side_effects,
                None => known.get(callee).copied().unwrap_or(SideEffects::WORST),
            };
        }

        effects
    }
}

/// Sums up the side effects of a piece of code. Calls to user functions
/// without known side effects count as [`SideEffects::WORST`].
pub struct SideEffectsCollector<'a> {
    dialect: &'a dyn Dialect,
    functions: &'a BTreeMap<YulString, SideEffects>,
    effects: SideEffects,
}

impl<'a> SideEffectsCollector<'a> {
    #[must_use]
    pub fn new(dialect: &'a dyn Dialect, functions: &'a BTreeMap<YulString, SideEffects>) -> Self {
        Self {
            dialect,
            functions,
            effects: SideEffects::NONE,
        }
    }

    #[must_use]
    pub fn of_expression(dialect: &'a dyn Dialect, functions: &'a BTreeMap<YulString, SideEffects>, expression: &Expression) -> SideEffects {
        let mut collector = Self::new(dialect, functions);
        collector.visit_expression(expression);
        collector.effects
    }

    #[must_use]
    pub fn of_statement(dialect: &'a dyn Dialect, functions: &'a BTreeMap<YulString, SideEffects>, statement: &Statement) -> SideEffects {
        let mut collector = Self::new(dialect, functions);
        collector.visit_statement(statement);
        collector.effects
    }

    #[must_use]
    pub fn of_block(dialect: &'a dyn Dialect, functions: &'a BTreeMap<YulString, SideEffects>, block: &Block) -> SideEffects {
        let mut collector = Self::new(dialect, functions);
        collector.visit_block(block);
        collector.effects
    }

    fn record_call(&mut self, name: &YulString) {
        self.effects += match self.dialect.builtin(name) {
            Some(builtin) => builtin.side_effects,
            None => self.functions.get(name).copied().unwrap_or(SideEffects::WORST),
        };
    }
}

impl<'ast> Visitor<'ast> for SideEffectsCollector<'_> {
    fn visit_function_call(&mut self, call: &'ast FunctionCall) {
        self.record_call(&call.function_name.name);
        walk_function_call(self, call);
    }

    fn visit_for_loop(&mut self, for_loop: &'ast ForLoop) {
        self.effects.movable = false;
        self.effects.side_effect_free = false;
        self.effects.side_effect_free_if_no_msize = false;
        walk_for_loop(self, for_loop);
    }

    // A definition does not run any code.
    fn visit_function_definition(&mut self, _: &'ast FunctionDefinition) {}
}

/// Determines whether an expression is movable and which variables it
/// references.
pub struct MovableChecker<'a> {
    collector: SideEffectsCollector<'a>,
    referenced: BTreeSet<YulString>,
}

impl<'a> MovableChecker<'a> {
    #[must_use]
    pub fn check(dialect: &'a dyn Dialect, functions: &'a BTreeMap<YulString, SideEffects>, expression: &Expression) -> Self {
        let mut checker = Self {
            collector: SideEffectsCollector::new(dialect, functions),
            referenced: BTreeSet::new(),
        };
        checker.visit_expression(expression);
        checker
    }

    #[must_use]
    pub fn is_movable(&self) -> bool {
        self.collector.effects.movable
    }

    #[must_use]
    pub fn referenced_variables(&self) -> &BTreeSet<YulString> {
        &self.referenced
    }

    #[must_use]
    pub fn into_referenced_variables(self) -> BTreeSet<YulString> {
        self.referenced
    }
}

impl<'ast> Visitor<'ast> for MovableChecker<'_> {
    fn visit_identifier(&mut self, identifier: &'ast Identifier) {
        self.referenced.insert(identifier.name.clone());
    }

    fn visit_function_call(&mut self, call: &'ast FunctionCall) {
        self.collector.record_call(&call.function_name.name);
        walk_function_call(self, call);
    }
}

/// Returns whether the program calls a builtin that observes the size of
/// memory, which forbids removing unused memory reads.
#[must_use]
pub fn contains_msize(dialect: &dyn Dialect, ast: &Block) -> bool {
    struct MSizeFinder<'a> {
        dialect: &'a dyn Dialect,
        found: bool,
    }

    impl<'ast> Visitor<'ast> for MSizeFinder<'_> {
        fn visit_function_call(&mut self, call: &'ast FunctionCall) {
            if self.dialect.builtin(&call.function_name.name).is_some_and(|builtin| builtin.is_msize()) {
                self.found = true;
            }
            walk_function_call(self, call);
        }
    }

    let mut finder = MSizeFinder { dialect, found: false };
    finder.visit_block(ast);
    finder.found
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use yul::{parse, EvmDialect};

    use super::*;

    fn function_effects(source: &str) -> BTreeMap<YulString, SideEffects> {
        let ast = parse(source).unwrap();
        SideEffectsPropagator::side_effects(&EvmDialect::new(), &CallGraph::of(&ast))
    }

    #[test]
    fn propagates_through_calls() {
        let effects = function_effects("{
            function pure(a) -> r { r := add(a, 1) }
            function reads() -> r { r := pure(sload(0)) }
            function writes() { sstore(0, reads()) }
        }");

        assert_eq!(effects["pure"], SideEffects::NONE);
        assert_eq!(effects["reads"], SideEffects::READS_STATE);
        assert_eq!(effects["writes"], SideEffects::WRITES_STORAGE + SideEffects::READS_STATE);
    }

    #[test]
    fn recursion_is_the_worst_case() {
        let effects = function_effects("{
            function f(a) -> r { r := g(a) }
            function g(a) -> r { if a { r := f(sub(a, 1)) } }
        }");

        assert_eq!(effects["f"], SideEffects::WORST);
        assert_eq!(effects["g"], SideEffects::WORST);
    }

    #[test]
    fn loops_are_not_removable() {
        let effects = function_effects("{ function f() { for { } 1 { } { } } }");
        assert!(!effects["f"].movable);
        assert!(!effects["f"].can_be_removed(true));
        assert!(!effects["f"].invalidates_storage);
    }

    #[test]
    fn unknown_functions_are_the_worst_case() {
        let dialect = EvmDialect::new();
        let functions = BTreeMap::new();
        let expression = Expression::call("f", vec![Expression::number(1u64)]);

        assert_eq!(SideEffectsCollector::of_expression(&dialect, &functions, &expression), SideEffects::WORST);
    }

    #[test]
    fn movable_checker_collects_references() {
        let dialect = EvmDialect::new();
        let functions = BTreeMap::new();
        let ast = parse("{ pop(add(x, mul(y, x))) pop(mload(x)) }").unwrap();
        let [Statement::Expression(first), Statement::Expression(second)] = ast.statements.as_slice() else {
            panic!("expected two expression statements");
        };

        let checker = MovableChecker::check(&dialect, &functions, first);
        assert!(checker.is_movable());
        assert_eq!(checker.referenced_variables().iter().map(|n| n.as_str()).collect::<Vec<_>>(), vec!["x", "y"]);

        assert!(!MovableChecker::check(&dialect, &functions, second).is_movable());
    }

    #[test]
    fn finds_msize() {
        let dialect = EvmDialect::new();
        assert!(contains_msize(&dialect, &parse("{ function f() { pop(msize()) } }").unwrap()));
        assert!(!contains_msize(&dialect, &parse("{ pop(mload(0)) }").unwrap()));
    }
}
