// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace};
use yul::{
    visit::{iterate_replacing, walk_statement_mut, VisitorMut},
    Block, Dialect, Expression, SideEffects, Statement, YulString,
};

use crate::{
    analysis::{contains_msize, CallGraph, SideEffectsCollector, SideEffectsPropagator},
    names::ReferencesCounter,
    OptimiserStep, OptimiserStepContext,
};

/// Removes functions and variables that are never referenced, and
/// expression statements whose evaluation has no effect. Blocks of the
/// top-level block are kept, even when empty.
#[derive(Debug, Default)]
pub struct UnusedPruner;

impl OptimiserStep for UnusedPruner {
    const NAME: &'static str = "UnusedPruner";
    const ABBREVIATION: char = 'u';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let allow_msize_optimization = !contains_msize(ctx.dialect, ast);

        for iteration in 1.. {
            let functions = SideEffectsPropagator::side_effects(ctx.dialect, &CallGraph::of(ast));
            let mut pruner = Pruner {
                dialect: ctx.dialect,
                functions: &functions,
                references: ReferencesCounter::count_block(ast),
                reserved: ctx.reserved_identifiers,
                allow_msize_optimization,
                changed: false,
            };

            pruner.prune(&mut ast.statements, false);
            if !pruner.changed {
                trace!("Nothing left to prune after {iteration} iteration(s)");
                break;
            }
        }
    }
}

struct Pruner<'a> {
    dialect: &'a dyn Dialect,
    functions: &'a BTreeMap<YulString, SideEffects>,
    references: BTreeMap<YulString, usize>,
    reserved: &'a BTreeSet<YulString>,
    allow_msize_optimization: bool,
    changed: bool,
}

impl Pruner<'_> {
    fn is_used(&self, name: &YulString) -> bool {
        self.references.get(name).is_some_and(|count| *count > 0) || self.reserved.contains(name)
    }

    fn is_removable(&self, expression: &Expression) -> bool {
        SideEffectsCollector::of_expression(self.dialect, self.functions, expression)
            .can_be_removed(self.allow_msize_optimization)
    }

    fn prune(&mut self, statements: &mut Vec<Statement>, remove_empty_blocks: bool) {
        for statement in statements.iter_mut() {
            walk_statement_mut(self, statement);
        }

        iterate_replacing(statements, |statement| {
            let replacement = self.prune_statement(statement, remove_empty_blocks);
            self.changed |= replacement.is_some();
            replacement
        });
    }

    fn prune_statement(&self, statement: &mut Statement, remove_empty_blocks: bool) -> Option<Vec<Statement>> {
        match statement {
            Statement::FunctionDefinition(function) if !self.is_used(&function.name) => {
                debug!("Removing unused function `{}`", function.name);
                Some(Vec::new())
            }

            Statement::VariableDeclaration(declaration)
                if !declaration.variables.iter().any(|variable| self.is_used(&variable.name)) =>
            {
                let Some(value) = &declaration.value else {
                    return Some(Vec::new());
                };

                if self.is_removable(value) {
                    return Some(Vec::new());
                }

                if declaration.variables.len() != 1 {
                    return None;
                }

                let discard = self.dialect.discard_function()?;
                let value = declaration.value.take()?;
                Some(vec![Statement::Expression(Expression::call(discard.name.clone(), vec![value]))])
            }

            Statement::Expression(expression) if self.is_removable(expression) => Some(Vec::new()),

            Statement::Block(block) if remove_empty_blocks && block.is_empty() => Some(Vec::new()),

            _ => None,
        }
    }
}

impl VisitorMut for Pruner<'_> {
    fn visit_block(&mut self, block: &mut Block) {
        self.prune(&mut block.statements, true);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case("{ let x := 1 let y := 2 sstore(0, y) }", "{ let y := 2 sstore(0, y) }")]
    #[case("{ let x := mload(0) }", "{ }")]
    #[case("{ let x := mload(0) sstore(0, msize()) }", "{ pop(mload(0)) sstore(0, msize()) }")]
    #[case("{ let x := call(gas(), 0, 0, 0, 0, 0, 0) }", "{ pop(call(gas(), 0, 0, 0, 0, 0, 0)) }")]
    #[case("{ function f() { } function g() { f() } }", "{ }")]
    #[case("{ let a, b := f() function f() -> x, y { x := 1 y := 2 } }", "{ }")]
    #[case("{ pop(add(1, 2)) sstore(0, 1) }", "{ sstore(0, 1) }")]
    #[case("{ { } if calldataload(0) { { } } }", "{ { } if calldataload(0) { } }")]
    #[case("{ let x := 1 x := 2 }", "{ let x := 1 x := 2 }")]
    fn prunes_unused_code(#[case] input: &str, #[case] expected: &str) {
        assert_step::<UnusedPruner>(input, expected);
    }
}
