// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use yul::{
    visit::{iterate_replacing, walk_block, walk_expression, walk_statement, walk_statement_mut, walk_variable_declaration, Visitor, VisitorMut},
    Assignment, Block, Dialect, Expression, ForLoop, FunctionDefinition, Identifier, If, SideEffects, Statement, Switch,
    VariableDeclaration, YulString,
};

use crate::{
    analysis::{contains_msize, CallGraph, SideEffectsCollector, SideEffectsPropagator},
    AstInvariant, OptimiserStep, OptimiserStepContext,
};

/// Removes assignments to variables whose value is not read before the
/// variable is assigned again or goes out of scope. Assignments are
/// identified by the order in which they appear in the program.
#[derive(Debug, Default)]
pub struct UnusedAssignEliminator;

impl OptimiserStep for UnusedAssignEliminator {
    const NAME: &'static str = "UnusedAssignEliminator";
    const ABBREVIATION: char = 'r';
    const REQUIRES: &'static [AstInvariant] = &[AstInvariant::Disambiguated, AstInvariant::ForLoopInitRewritten];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let functions = SideEffectsPropagator::side_effects(ctx.dialect, &CallGraph::of(ast));

        let mut analysis = StoreAnalysis {
            dialect: ctx.dialect,
            functions: &functions,
            allow_msize_optimization: !contains_msize(ctx.dialect, ast),
            active: ActiveStores::new(),
            declared: BTreeSet::new(),
            return_variables: BTreeSet::new(),
            pending_breaks: Vec::new(),
            pending_continues: Vec::new(),
            loop_depth: 0,
            next_id: 0,
            potentially_unused: BTreeSet::new(),
            used: BTreeSet::new(),
        };
        analysis.visit_block(ast);

        let to_remove: BTreeSet<usize> = analysis.potentially_unused.difference(&analysis.used).copied().collect();
        trace!("Removing {} unused assignment(s)", to_remove.len());

        if !to_remove.is_empty() {
            AssignmentRemover { to_remove, next_id: 0 }.visit_block(ast);
        }
    }
}

/// The assignments that may still be read, per variable.
type ActiveStores = BTreeMap<YulString, BTreeSet<usize>>;

fn join(target: &mut ActiveStores, source: ActiveStores) {
    for (variable, stores) in source {
        target.entry(variable).or_default().extend(stores);
    }
}

/// Above this depth, loop bodies are analyzed once and every assignment in
/// them is considered used.
const MAX_LOOP_DEPTH_FOR_SECOND_RUN: usize = 6;

struct StoreAnalysis<'a> {
    dialect: &'a dyn Dialect,
    functions: &'a BTreeMap<YulString, SideEffects>,
    allow_msize_optimization: bool,

    active: ActiveStores,
    declared: BTreeSet<YulString>,
    return_variables: BTreeSet<YulString>,
    pending_breaks: Vec<ActiveStores>,
    pending_continues: Vec<ActiveStores>,
    loop_depth: usize,

    next_id: usize,
    potentially_unused: BTreeSet<usize>,
    used: BTreeSet<usize>,
}

impl StoreAnalysis<'_> {
    fn mark_used(&mut self, variable: &YulString) {
        if let Some(stores) = self.active.get(variable) {
            self.used.extend(stores.iter().copied());
        }
    }

    fn terminates(&self, expression: &Expression) -> bool {
        let Expression::FunctionCall(call) = expression else {
            return false;
        };
        self.dialect.builtin(&call.function_name.name)
            .is_some_and(|builtin| !builtin.control_flow_side_effects.can_continue)
    }

    fn visit_loop_iteration(&mut self, for_loop: &ForLoop) {
        self.visit_block(&for_loop.body);
        for continued in std::mem::take(&mut self.pending_continues) {
            join(&mut self.active, continued);
        }
        self.visit_block(&for_loop.post);
        self.visit_expression(&for_loop.condition);
    }
}

impl<'ast> Visitor<'ast> for StoreAnalysis<'_> {
    fn visit_block(&mut self, block: &'ast Block) {
        let outer_declared = std::mem::take(&mut self.declared);
        walk_block(self, block);

        for variable in std::mem::replace(&mut self.declared, outer_declared) {
            self.active.remove(&variable);
        }
    }

    fn visit_statement(&mut self, statement: &'ast Statement) {
        match statement {
            Statement::Break => self.pending_breaks.push(std::mem::take(&mut self.active)),
            Statement::Continue => self.pending_continues.push(std::mem::take(&mut self.active)),
            Statement::Leave => {
                for variable in self.return_variables.clone() {
                    self.mark_used(&variable);
                }
                self.active.clear();
            }
            Statement::Expression(expression) if self.terminates(expression) => {
                walk_expression(self, expression);
                self.active.clear();
            }
            _ => walk_statement(self, statement),
        }
    }

    fn visit_identifier(&mut self, identifier: &'ast Identifier) {
        self.mark_used(&identifier.name);
    }

    fn visit_assignment(&mut self, assignment: &'ast Assignment) {
        let id = self.next_id;
        self.next_id += 1;

        self.visit_expression(&assignment.value);

        for target in &assignment.variable_names {
            self.active.insert(target.name.clone(), BTreeSet::new());
        }

        if let [target] = assignment.variable_names.as_slice() {
            self.active.entry(target.name.clone()).or_default().insert(id);

            let effects = SideEffectsCollector::of_expression(self.dialect, self.functions, &assignment.value);
            if effects.can_be_removed(self.allow_msize_optimization) {
                self.potentially_unused.insert(id);
            }
        }
    }

    fn visit_variable_declaration(&mut self, declaration: &'ast VariableDeclaration) {
        walk_variable_declaration(self, declaration);
        self.declared.extend(declaration.variables.iter().map(|variable| variable.name.clone()));
    }

    fn visit_if(&mut self, statement: &'ast If) {
        self.visit_expression(&statement.condition);

        let skipped = self.active.clone();
        self.visit_block(&statement.body);
        join(&mut self.active, skipped);
    }

    fn visit_switch(&mut self, switch: &'ast Switch) {
        self.visit_expression(&switch.expression);

        let before = self.active.clone();
        let mut after = if switch.default_case().is_some() { ActiveStores::new() } else { before.clone() };

        for case in &switch.cases {
            self.active = before.clone();
            self.visit_block(&case.body);
            join(&mut after, std::mem::take(&mut self.active));
        }

        self.active = after;
    }

    fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
        let active = std::mem::take(&mut self.active);
        let declared = std::mem::take(&mut self.declared);
        let pending_breaks = std::mem::take(&mut self.pending_breaks);
        let pending_continues = std::mem::take(&mut self.pending_continues);
        let loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        let return_variables = std::mem::replace(
            &mut self.return_variables,
            function.return_variables.iter().map(|variable| variable.name.clone()).collect(),
        );

        self.visit_block(&function.body);
        for variable in self.return_variables.clone() {
            self.mark_used(&variable);
        }

        self.active = active;
        self.declared = declared;
        self.pending_breaks = pending_breaks;
        self.pending_continues = pending_continues;
        self.loop_depth = loop_depth;
        self.return_variables = return_variables;
    }

    fn visit_for_loop(&mut self, for_loop: &'ast ForLoop) {
        assert!(for_loop.pre.is_empty(), "for loop pre blocks should have been moved out");

        let outer_breaks = std::mem::take(&mut self.pending_breaks);
        let outer_continues = std::mem::take(&mut self.pending_continues);
        self.loop_depth += 1;

        self.visit_expression(&for_loop.condition);
        let zero_runs = self.active.clone();

        let first_id = self.next_id;
        self.visit_loop_iteration(for_loop);

        if self.loop_depth < MAX_LOOP_DEPTH_FOR_SECOND_RUN {
            // The second run sees what the first run assigned.
            self.next_id = first_id;
            let one_run = self.active.clone();
            self.visit_loop_iteration(for_loop);
            join(&mut self.active, one_run);
        } else {
            self.used.extend(first_id..self.next_id);
        }

        join(&mut self.active, zero_runs);
        for broken in std::mem::take(&mut self.pending_breaks) {
            join(&mut self.active, broken);
        }

        self.loop_depth -= 1;
        self.pending_breaks = outer_breaks;
        self.pending_continues = outer_continues;
    }
}

/// Removes the assignments with the given ids, numbering assignments in the
/// same order as the analysis.
struct AssignmentRemover {
    to_remove: BTreeSet<usize>,
    next_id: usize,
}

impl VisitorMut for AssignmentRemover {
    fn visit_block(&mut self, block: &mut Block) {
        iterate_replacing(&mut block.statements, |statement| {
            if let Statement::Assignment(..) = statement {
                let id = self.next_id;
                self.next_id += 1;
                return self.to_remove.contains(&id).then(Vec::new);
            }

            walk_statement_mut(self, statement);
            None
        });
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case("{ let x := 1 x := 2 x := 3 sstore(0, x) }", "{ let x := 1 x := 3 sstore(0, x) }")]
    #[case(
        "{ let x := calldataload(0) if calldataload(1) { x := 2 } sstore(0, x) }",
        "{ let x := calldataload(0) if calldataload(1) { x := 2 } sstore(0, x) }",
    )]
    #[case("{ let x := 0 x := 1 }", "{ let x := 0 }")]
    #[case("{ let x := 0 x := mload(0) sstore(0, 1) }", "{ let x := 0 sstore(0, 1) }")]
    #[case("{ let x := 0 x := call(gas(), 0, 0, 0, 0, 0, 0) }", "{ let x := 0 x := call(gas(), 0, 0, 0, 0, 0, 0) }")]
    #[case(
        "{ let x := 0 for { } lt(x, 10) { } { x := add(x, 1) } }",
        "{ let x := 0 for { } lt(x, 10) { } { x := add(x, 1) } }",
    )]
    #[case("{ function f() -> r { r := 1 } }", "{ function f() -> r { r := 1 } }")]
    #[case("{ function f(a) { a := 2 } }", "{ function f(a) { } }")]
    #[case(
        "{ for { } 1 { } { let y := 0 y := 5 if calldataload(0) { sstore(0, y) break } y := 6 } }",
        "{ for { } 1 { } { let y := 0 y := 5 if calldataload(0) { sstore(0, y) break } } }",
    )]
    #[case(
        "{ function f() -> r { r := 1 if calldataload(0) { leave } r := 2 } }",
        "{ function f() -> r { r := 1 if calldataload(0) { leave } r := 2 } }",
    )]
    #[case(
        "{ let x := 0 for { } calldataload(x) { x := add(x, 1) } { x := 7 continue } }",
        "{ let x := 0 for { } calldataload(x) { x := add(x, 1) } { x := 7 continue } }",
    )]
    fn removes_unused_assignments(#[case] input: &str, #[case] expected: &str) {
        assert_step::<UnusedAssignEliminator>(input, expected);
    }
}
