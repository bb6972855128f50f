// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use yul::{
    visit::{iterate_replacing, walk_statement_mut, VisitorMut},
    Block, Dialect, ForLoop, SideEffects, Statement, VariableDeclaration, YulString,
};

use crate::{
    analysis::{CallGraph, MovableChecker, SideEffectsPropagator},
    names::ssa_variables,
    AstInvariant, OptimiserStep, OptimiserStepContext,
};

/// Moves declarations out of loop bodies and post blocks, if the variable
/// is never reassigned and its value is movable and only depends on
/// variables that are never reassigned and declared outside of the loop.
#[derive(Debug, Default)]
pub struct LoopInvariantCodeMotion;

impl OptimiserStep for LoopInvariantCodeMotion {
    const NAME: &'static str = "LoopInvariantCodeMotion";
    const ABBREVIATION: char = 'M';
    const REQUIRES: &'static [AstInvariant] = &[
        AstInvariant::Disambiguated,
        AstInvariant::ForLoopInitRewritten,
        AstInvariant::FunctionsHoisted,
    ];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let functions = SideEffectsPropagator::side_effects(ctx.dialect, &CallGraph::of(ast));
        let mut mover = Mover {
            dialect: ctx.dialect,
            functions: &functions,
            ssa_variables: ssa_variables(ast).into_keys().collect(),
        };
        mover.visit_block(ast);
    }
}

struct Mover<'a> {
    dialect: &'a dyn Dialect,
    functions: &'a BTreeMap<YulString, SideEffects>,
    ssa_variables: BTreeSet<YulString>,
}

impl Mover<'_> {
    fn can_be_promoted(&self, declaration: &VariableDeclaration, defined_in_loop: &BTreeSet<YulString>) -> bool {
        if !declaration.variables.iter().all(|variable| self.ssa_variables.contains(&variable.name)) {
            return false;
        }

        let Some(value) = &declaration.value else {
            return true;
        };

        let checker = MovableChecker::check(self.dialect, self.functions, value);
        checker.is_movable()
            && checker.referenced_variables().iter()
                .all(|variable| self.ssa_variables.contains(variable) && !defined_in_loop.contains(variable))
    }

    /// Removes the invariant declarations from the loop and returns them.
    fn rewrite_loop(&self, for_loop: &mut ForLoop) -> Vec<Statement> {
        assert!(for_loop.pre.is_empty(), "for loop pre blocks should have been moved out");

        let mut promoted = Vec::new();
        for block in [&mut for_loop.post, &mut for_loop.body] {
            let mut defined_in_loop = BTreeSet::new();

            iterate_replacing(&mut block.statements, |statement| {
                let Statement::VariableDeclaration(declaration) = statement else {
                    return None;
                };

                if self.can_be_promoted(declaration, &defined_in_loop) {
                    promoted.push(std::mem::replace(statement, Statement::Break));
                    return Some(Vec::new());
                }

                defined_in_loop.extend(declaration.variables.iter().map(|variable| variable.name.clone()));
                None
            });
        }

        promoted
    }
}

impl VisitorMut for Mover<'_> {
    fn visit_block(&mut self, block: &mut Block) {
        iterate_replacing(&mut block.statements, |statement| {
            walk_statement_mut(self, statement);

            let Statement::ForLoop(for_loop) = statement else {
                return None;
            };

            let mut promoted = self.rewrite_loop(for_loop);
            if promoted.is_empty() {
                return None;
            }

            promoted.push(std::mem::replace(statement, Statement::Break));
            Some(promoted)
        });
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case(
        "{ let a := calldataload(0) for { } lt(a, 1) { } { let x := add(a, 1) sstore(x, 1) } }",
        "{ let a := calldataload(0) let x := add(a, 1) for { } lt(a, 1) { } { sstore(x, 1) } }",
    )]
    #[case(
        "{ let i := 0 for { } lt(i, 10) { i := add(i, 1) } { let x := add(i, 1) sstore(x, 1) } }",
        "{ let i := 0 for { } lt(i, 10) { i := add(i, 1) } { let x := add(i, 1) sstore(x, 1) } }",
    )]
    #[case(
        "{ for { } 1 { } { let x := mload(0) sstore(x, 1) } }",
        "{ for { } 1 { } { let x := mload(0) sstore(x, 1) } }",
    )]
    #[case(
        "{ for { } 1 { } { let y := sload(0) let x := add(y, 1) sstore(x, 1) } }",
        "{ for { } 1 { } { let y := sload(0) let x := add(y, 1) sstore(x, 1) } }",
    )]
    #[case(
        "{ let a := calldataload(0) for { } 1 { } { let y := add(a, 2) let x := mul(y, 3) sstore(x, 1) } }",
        "{ let a := calldataload(0) let y := add(a, 2) let x := mul(y, 3) for { } 1 { } { sstore(x, 1) } }",
    )]
    #[case(
        "{ let a := calldataload(0) for { } 1 { } { for { } 1 { } { let x := add(a, 1) sstore(x, 1) } } }",
        "{ let a := calldataload(0) let x := add(a, 1) for { } 1 { } { for { } 1 { } { sstore(x, 1) } } }",
    )]
    fn moves_invariant_declarations(#[case] input: &str, #[case] expected: &str) {
        assert_step::<LoopInvariantCodeMotion>(input, expected);
    }
}
