// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{evaluate_pure, Block, EvmInstruction, Expression, U256};

use crate::{
    analysis::{walk_arguments, DataFlowAnalyzer, DataFlowHook, DataFlowState},
    OptimiserStep, OptimiserStepContext,
};

/// Folds constants and applies algebraic identities. Variables whose value
/// is a literal count as constants.
#[derive(Debug, Default)]
pub struct ExpressionSimplifier;

impl OptimiserStep for ExpressionSimplifier {
    const NAME: &'static str = "ExpressionSimplifier";
    const ABBREVIATION: char = 's';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        DataFlowAnalyzer::run(ctx.dialect, ast, Self);
    }
}

impl DataFlowHook for ExpressionSimplifier {
    fn visit_expression(&mut self, state: &DataFlowState<'_>, expression: &mut Expression) {
        walk_arguments(self, state, expression);

        while let Some(simplified) = simplify(state, expression) {
            *expression = simplified;
        }
    }
}

fn simplify(state: &DataFlowState<'_>, expression: &Expression) -> Option<Expression> {
    let Expression::FunctionCall(call) = expression else {
        return None;
    };

    let instruction = state.dialect().builtin(&call.function_name.name)?.instruction?;
    let constant = |argument: &Expression| state.literal_value(argument).and_then(|literal| literal.value());

    let constants: Option<Vec<U256>> = call.arguments.iter().map(|argument| constant(argument)).collect();
    if let Some(value) = constants.and_then(|arguments| evaluate_pure(instruction, &arguments)) {
        return Some(Expression::number(value));
    }

    let is = |argument: &Expression, value: U256| constant(argument) == Some(value);
    let movable = |argument: &Expression| state.is_movable(argument);
    let zero = || Expression::number(0u64);

    use EvmInstruction::*;
    match (instruction, call.arguments.as_slice()) {
        (Add | Or | Xor, [x, y]) if is(y, U256::zero()) => Some(x.clone()),
        (Add | Or | Xor, [x, y]) if is(x, U256::zero()) => Some(y.clone()),
        (Sub, [x, y]) if is(y, U256::zero()) => Some(x.clone()),

        (Mul | Div, [x, y]) if is(y, U256::one()) => Some(x.clone()),
        (Mul, [x, y]) if is(x, U256::one()) => Some(y.clone()),

        (Mul | And, [x, y]) if is(y, U256::zero()) && movable(x) => Some(zero()),
        (Mul | And | Div, [x, y]) if is(x, U256::zero()) && movable(y) => Some(zero()),
        (Div | Mod, [x, y]) if is(y, U256::zero()) && movable(x) => Some(zero()),
        (Mod, [x, y]) if is(y, U256::one()) && movable(x) => Some(zero()),

        (And, [x, y]) if is(y, U256::MAX) => Some(x.clone()),
        (And, [x, y]) if is(x, U256::MAX) => Some(y.clone()),
        (Or, [x, y]) if is(y, U256::MAX) && movable(x) => Some(Expression::number(U256::MAX)),
        (Or, [x, y]) if is(x, U256::MAX) && movable(y) => Some(Expression::number(U256::MAX)),

        (Xor | Sub | Lt | Gt | Slt | Sgt, [x, y]) if x == y && movable(x) => Some(zero()),
        (Eq, [x, y]) if x == y && movable(x) => Some(Expression::number(1u64)),
        (And | Or, [x, y]) if x == y && movable(x) => Some(x.clone()),

        (Eq, [x, y]) if is(y, U256::zero()) => Some(Expression::call("iszero", vec![x.clone()])),
        (Eq, [x, y]) if is(x, U256::zero()) => Some(Expression::call("iszero", vec![y.clone()])),

        (Shl | Shr | Sar, [shift, x]) if is(shift, U256::zero()) => Some(x.clone()),

        (Exp, [x, y]) if is(y, U256::zero()) && movable(x) => Some(Expression::number(1u64)),
        (Exp, [x, y]) if is(y, U256::one()) => Some(x.clone()),

        (Not, [inner]) => {
            let inner = inner.as_function_call().filter(|inner| inner.function_name.name == "not")?;
            Some(inner.arguments[0].clone())
        }

        (Iszero, [inner]) => {
            let inner = inner.as_function_call().filter(|inner| inner.function_name.name == "iszero")?;
            let innermost = inner.arguments[0].as_function_call().filter(|call| call.function_name.name == "iszero")?;
            Some(Expression::call("iszero", innermost.arguments.clone()))
        }

        _ => None,
    }
}
