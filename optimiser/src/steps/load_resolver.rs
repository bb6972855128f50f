// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{Block, Expression, Identifier};

use crate::{
    analysis::{contains_msize, walk_arguments, DataFlowAnalyzer, DataFlowHook, DataFlowState},
    OptimiserStep, OptimiserStepContext,
};

/// Replaces `sload(k)` and `mload(k)` by a variable that is known to hold
/// the value stored at `k`. Memory loads are only replaced when the program
/// never inspects the size of memory.
#[derive(Debug, Default)]
pub struct LoadResolver {
    contains_msize: bool,
}

impl OptimiserStep for LoadResolver {
    const NAME: &'static str = "LoadResolver";
    const ABBREVIATION: char = 'L';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let hook = Self {
            contains_msize: contains_msize(ctx.dialect, ast),
        };
        DataFlowAnalyzer::run(ctx.dialect, ast, hook);
    }
}

impl DataFlowHook for LoadResolver {
    fn visit_expression(&mut self, state: &DataFlowState<'_>, expression: &mut Expression) {
        walk_arguments(self, state, expression);

        let Expression::FunctionCall(call) = expression else {
            return;
        };

        let [Expression::Identifier(key)] = call.arguments.as_slice() else {
            return;
        };

        let dialect = state.dialect();
        let name = &call.function_name.name;

        let value = if dialect.storage_load_function().is_some_and(|load| load.name == *name) {
            state.storage_value(&key.name)
        } else if !self.contains_msize && dialect.memory_load_function().is_some_and(|load| load.name == *name) {
            state.memory_value(&key.name)
        } else {
            None
        };

        if let Some(value) = value.filter(|value| state.in_scope(value)) {
            *expression = Expression::Identifier(Identifier::new(value.clone()));
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
        "{ let k := calldataload(0) let v := calldataload(1) sstore(k, v) let x := sload(k) }",
        "{ let k := calldataload(0) let v := calldataload(1) sstore(k, v) let x := v }",
    )]
    #[case(
        "{ let k := 0 let v := calldataload(1) mstore(k, v) let x := mload(k) }",
        "{ let k := 0 let v := calldataload(1) mstore(k, v) let x := v }",
    )]
    #[case(
        "{ let k := 0 let v := calldataload(1) mstore(k, v) let x := mload(k) let s := msize() }",
        "{ let k := 0 let v := calldataload(1) mstore(k, v) let x := mload(k) let s := msize() }",
    )]
    #[case(
        "{ let k := 0 let v := calldataload(1) sstore(k, v) let o := calldataload(2) sstore(o, 1) let x := sload(k) }",
        "{ let k := 0 let v := calldataload(1) sstore(k, v) let o := calldataload(2) sstore(o, 1) let x := sload(k) }",
    )]
    #[case(
        "{ let k := 0 let v := calldataload(1) sstore(k, v) let o := 1 let w := 2 sstore(o, w) let x := sload(k) }",
        "{ let k := 0 let v := calldataload(1) sstore(k, v) let o := 1 let w := 2 sstore(o, w) let x := v }",
    )]
    #[case(
        "{ let k := 0 let x := sload(k) sstore(k, x) let y := sload(k) }",
        "{ let k := 0 let x := sload(k) sstore(k, x) let y := x }",
    )]
    fn resolves_loads(#[case] input: &str, #[case] expected: &str) {
        assert_step::<LoadResolver>(input, expected);
    }
}
