// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{Block, Expression, Identifier};

use crate::{
    analysis::{walk_arguments, DataFlowAnalyzer, DataFlowHook, DataFlowState},
    OptimiserStep, OptimiserStepContext,
};

/// Replaces expressions by a variable that is known to hold their value.
#[derive(Debug, Default)]
pub struct CommonSubexpressionEliminator;

impl OptimiserStep for CommonSubexpressionEliminator {
    const NAME: &'static str = "CommonSubexpressionEliminator";
    const ABBREVIATION: char = 'c';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        DataFlowAnalyzer::run(ctx.dialect, ast, Self);
    }
}

impl DataFlowHook for CommonSubexpressionEliminator {
    fn visit_expression(&mut self, state: &DataFlowState<'_>, expression: &mut Expression) {
        walk_arguments(self, state, expression);

        if let Expression::Identifier(identifier) = expression {
            let Some(assigned) = state.value(&identifier.name) else {
                return;
            };

            if let Expression::Identifier(value) = &assigned.value {
                if state.in_scope(&value.name) {
                    *expression = Expression::Identifier(value.clone());
                }
            }
            return;
        }

        let candidate = state.values().find(|(variable, assigned)| {
            // Keep the zero literal instead of referring to the initial value
            // of a return variable.
            if state.is_return_variable(variable) && matches!(assigned.value, Expression::Literal(..)) {
                return false;
            }
            state.in_scope(variable) && assigned.value == *expression
        });

        if let Some((variable, _)) = candidate {
            *expression = Expression::Identifier(Identifier::new(variable.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case(
        "{ let a := mul(1, codesize()) let b := mul(1, codesize()) }",
        "{ let a := mul(1, codesize()) let b := a }",
    )]
    #[case(
        "{ let a := mload(1) let b := mload(1) }",
        "{ let a := mload(1) let b := mload(1) }",
    )]
    #[case(
        "{ let a := calldataload(0) let b := a let c := add(b, 1) let d := add(a, 1) }",
        "{ let a := calldataload(0) let b := a let c := add(a, 1) let d := c }",
    )]
    #[case(
        "{ let a := add(calldataload(0), 1) if a { a := 2 } let b := add(calldataload(0), 1) }",
        "{ let a := add(calldataload(0), 1) if a { a := 2 } let b := add(calldataload(0), 1) }",
    )]
    #[case(
        "{ function f() -> r { let x := 0 r := x } }",
        "{ function f() -> r { let x := 0 r := x } }",
    )]
    #[case(
        "{ let a := add(calldataload(0), 1) function f() -> r { r := add(calldataload(0), 1) } }",
        "{ let a := add(calldataload(0), 1) function f() -> r { r := add(calldataload(0), 1) } }",
    )]
    fn replaces_known_expressions(#[case] input: &str, #[case] expected: &str) {
        assert_step::<CommonSubexpressionEliminator>(input, expected);
    }
}
