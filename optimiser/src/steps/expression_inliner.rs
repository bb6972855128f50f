// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use yul::{
    visit::{walk_expression_mut, walk_function_definition, Visitor, VisitorMut},
    Block, Dialect, Expression, FunctionCall, FunctionDefinition, SideEffects, Statement, YulString,
};

use crate::{
    analysis::{CallGraph, MovableChecker, SideEffectsPropagator},
    names::ReferencesCounter,
    OptimiserStep, OptimiserStepContext,
};

/// Inlines calls to functions of the form
/// `function f(a, b) -> r { r := e }` where `e` is movable and only
/// references the parameters. Such functions are never recursive, so the
/// inlined code is visited again.
#[derive(Debug, Default)]
pub struct ExpressionInliner;

impl OptimiserStep for ExpressionInliner {
    const NAME: &'static str = "ExpressionInliner";
    const ABBREVIATION: char = 'e';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let side_effects = SideEffectsPropagator::side_effects(ctx.dialect, &CallGraph::of(ast));

        let mut finder = InlinableFunctionFinder {
            dialect: ctx.dialect,
            side_effects: &side_effects,
            functions: BTreeMap::new(),
        };
        finder.visit_block(ast);

        let mut inliner = Inliner {
            dialect: ctx.dialect,
            side_effects: &side_effects,
            functions: finder.functions,
        };
        inliner.visit_block(ast);
    }
}

struct InlinableFunction {
    parameters: Vec<YulString>,
    value: Expression,
    references: BTreeMap<YulString, usize>,
}

struct InlinableFunctionFinder<'a> {
    dialect: &'a dyn Dialect,
    side_effects: &'a BTreeMap<YulString, SideEffects>,
    functions: BTreeMap<YulString, InlinableFunction>,
}

impl<'ast> Visitor<'ast> for InlinableFunctionFinder<'_> {
    fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
        walk_function_definition(self, function);

        let [return_variable] = function.return_variables.as_slice() else {
            return;
        };
        let [Statement::Assignment(assignment)] = function.body.statements.as_slice() else {
            return;
        };
        let [target] = assignment.variable_names.as_slice() else {
            return;
        };
        if target.name != return_variable.name {
            return;
        }

        let checker = MovableChecker::check(self.dialect, self.side_effects, &assignment.value);
        let only_parameters = checker.referenced_variables().iter()
            .all(|variable| function.parameters.iter().any(|parameter| parameter.name == *variable));

        if checker.is_movable() && only_parameters {
            self.functions.insert(function.name.clone(), InlinableFunction {
                parameters: function.parameters.iter().map(|parameter| parameter.name.clone()).collect(),
                value: assignment.value.clone(),
                references: ReferencesCounter::count_expression(&assignment.value),
            });
        }
    }
}

struct Inliner<'a> {
    dialect: &'a dyn Dialect,
    side_effects: &'a BTreeMap<YulString, SideEffects>,
    functions: BTreeMap<YulString, InlinableFunction>,
}

impl Inliner<'_> {
    fn inline(&self, call: &FunctionCall) -> Option<Expression> {
        let function = self.functions.get(&call.function_name.name)?;

        for (parameter, argument) in function.parameters.iter().zip(&call.arguments) {
            if !MovableChecker::check(self.dialect, self.side_effects, argument).is_movable() {
                return None;
            }

            let references = function.references.get(parameter).copied().unwrap_or(0);
            let is_cheap = matches!(argument, Expression::Literal(..) | Expression::Identifier(..));
            if references > 1 && !is_cheap {
                return None;
            }
        }

        let substitutions = function.parameters.iter().cloned().zip(call.arguments.iter().cloned()).collect();
        let mut value = function.value.clone();
        Substitution { substitutions }.visit_expression(&mut value);
        Some(value)
    }
}

impl VisitorMut for Inliner<'_> {
    fn visit_expression(&mut self, expression: &mut Expression) {
        walk_expression_mut(self, expression);

        if let Expression::FunctionCall(call) = expression {
            if let Some(inlined) = self.inline(call) {
                *expression = inlined;
                self.visit_expression(expression);
            }
        }
    }
}

/// Replaces identifiers by expressions.
struct Substitution {
    substitutions: BTreeMap<YulString, Expression>,
}

impl VisitorMut for Substitution {
    fn visit_expression(&mut self, expression: &mut Expression) {
        if let Some(name) = expression.as_identifier() {
            if let Some(replacement) = self.substitutions.get(name) {
                *expression = replacement.clone();
            }
            return;
        }

        walk_expression_mut(self, expression);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case(
        "{ function f(a) -> r { r := add(a, 1) } sstore(0, f(calldataload(0))) }",
        "{ function f(a) -> r { r := add(a, 1) } sstore(0, add(calldataload(0), 1)) }",
    )]
    #[case(
        "{ function f(a) -> r { r := mul(a, a) } sstore(0, f(calldataload(0))) }",
        "{ function f(a) -> r { r := mul(a, a) } sstore(0, f(calldataload(0))) }",
    )]
    #[case(
        "{ function f(a) -> r { r := mul(a, a) } sstore(0, f(3)) }",
        "{ function f(a) -> r { r := mul(a, a) } sstore(0, mul(3, 3)) }",
    )]
    #[case(
        "{ function f(a) -> r { r := mload(a) } sstore(0, f(0)) }",
        "{ function f(a) -> r { r := mload(a) } sstore(0, f(0)) }",
    )]
    #[case(
        "{ function f(a) -> r { r := add(a, 1) } sstore(0, f(mload(0))) }",
        "{ function f(a) -> r { r := add(a, 1) } sstore(0, f(mload(0))) }",
    )]
    #[case(
        "{ function f(a) -> r { r := a r := add(r, 1) } sstore(0, f(1)) }",
        "{ function f(a) -> r { r := a r := add(r, 1) } sstore(0, f(1)) }",
    )]
    #[case(
        "{ function f(a) -> r { r := add(a, 1) } function g(b) -> s { s := f(f(b)) } sstore(0, g(2)) }",
        "{ function f(a) -> r { r := add(a, 1) } function g(b) -> s { s := add(add(b, 1), 1) } sstore(0, add(add(2, 1), 1)) }",
    )]
    fn inlines_expression_functions(#[case] input: &str, #[case] expected: &str) {
        assert_step::<ExpressionInliner>(input, expected);
    }
}
