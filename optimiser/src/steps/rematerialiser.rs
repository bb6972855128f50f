// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use yul::{Block, Expression, YulString};

use crate::{
    analysis::{walk_arguments, CostOracle, DataFlowAnalyzer, DataFlowHook, DataFlowState, MovableChecker},
    names::ReferencesCounter,
    OptimiserStep, OptimiserStepContext,
};

/// Replaces references to variables by the value of the variable, if that
/// is cheap or the variable is only used once.
#[derive(Debug, Default)]
pub struct Rematerialiser;

impl OptimiserStep for Rematerialiser {
    const NAME: &'static str = "Rematerialiser";
    const ABBREVIATION: char = 'm';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let hook = RematerialiseHook {
            references: ReferencesCounter::count_block(ast),
            cost_oracle: ctx.cost_oracle,
            cost_limit: ctx.settings.rematerialisation_cost_limit,
        };
        DataFlowAnalyzer::run(ctx.dialect, ast, hook);
    }
}

struct RematerialiseHook<'a> {
    references: BTreeMap<YulString, usize>,
    cost_oracle: &'a dyn CostOracle,
    cost_limit: usize,
}

impl RematerialiseHook<'_> {
    fn should_rematerialise(&self, state: &DataFlowState<'_>, name: &YulString, value: &Expression, loop_depth: usize) -> bool {
        let references = self.references.get(name).copied().unwrap_or(0);
        let cost = self.cost_oracle.expression_cost(value);

        (references <= 1 && loop_depth == state.loop_depth())
            || cost == 0
            || (cost < self.cost_limit && references <= 5 && state.loop_depth() == 0)
    }
}

impl DataFlowHook for RematerialiseHook<'_> {
    fn visit_expression(&mut self, state: &DataFlowState<'_>, expression: &mut Expression) {
        if let Expression::Identifier(identifier) = expression {
            if let Some(assigned) = state.value(&identifier.name) {
                let name = identifier.name.clone();

                if self.should_rematerialise(state, &name, &assigned.value, assigned.loop_depth) {
                    let checker = MovableChecker::check(state.dialect(), state.function_side_effects(), &assigned.value);
                    if checker.referenced_variables().iter().all(|variable| state.in_scope(variable)) {
                        if let Some(count) = self.references.get_mut(&name) {
                            *count = count.saturating_sub(1);
                        }
                        for (variable, count) in ReferencesCounter::count_expression(&assigned.value) {
                            *self.references.entry(variable).or_default() += count;
                        }
                        *expression = assigned.value.clone();
                    }
                }
            }
        }

        walk_arguments(self, state, expression);
    }
}

/// Replaces references to variables whose value is a literal by that
/// literal.
#[derive(Debug, Default)]
pub struct LiteralRematerialiser;

impl OptimiserStep for LiteralRematerialiser {
    const NAME: &'static str = "LiteralRematerialiser";
    const ABBREVIATION: char = 'T';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        DataFlowAnalyzer::run(ctx.dialect, ast, Self);
    }
}

impl DataFlowHook for LiteralRematerialiser {
    fn visit_expression(&mut self, state: &DataFlowState<'_>, expression: &mut Expression) {
        if let Expression::Identifier(identifier) = expression {
            if let Some(Expression::Literal(literal)) = state.value(&identifier.name).map(|assigned| &assigned.value) {
                *expression = Expression::Literal(literal.clone());
            }
        }

        walk_arguments(self, state, expression);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case(
        "{ let a := add(calldataload(0), 2) let b := mul(a, 3) sstore(0, b) }",
        "{ let a := add(calldataload(0), 2) let b := mul(add(calldataload(0), 2), 3) sstore(0, mul(add(calldataload(0), 2), 3)) }",
    )]
    #[case(
        "{ let a := 1 let b := a sstore(b, a) }",
        "{ let a := 1 let b := 1 sstore(1, 1) }",
    )]
    #[case(
        "{ let a := mload(0) let b := a sstore(b, b) }",
        "{ let a := mload(0) let b := a sstore(a, a) }",
    )]
    #[case(
        "{ let a := calldataload(0) for { } 1 { } { sstore(a, a) sstore(a, a) sstore(a, a) } }",
        "{ let a := calldataload(0) for { } 1 { } { sstore(a, a) sstore(a, a) sstore(a, a) } }",
    )]
    #[case(
        "{ let x := mload(0) let a := x x := 2 sstore(a, 1) }",
        "{ let x := mload(0) let a := x x := 2 sstore(a, 1) }",
    )]
    fn rematerialises_cheap_values(#[case] input: &str, #[case] expected: &str) {
        assert_step::<Rematerialiser>(input, expected);
    }

    #[rstest]
    #[case(
        "{ let a := 7 let b := add(a, a) if b { let c := a sstore(c, b) } }",
        "{ let a := 7 let b := add(7, 7) if b { let c := 7 sstore(7, b) } }",
    )]
    #[case(
        "{ let a := 7 a := calldataload(0) sstore(a, a) }",
        "{ let a := 7 a := calldataload(0) sstore(a, a) }",
    )]
    fn replaces_literal_values(#[case] input: &str, #[case] expected: &str) {
        assert_step::<LiteralRematerialiser>(input, expected);
    }
}
