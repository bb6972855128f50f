// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use log::debug;
use yul::{Block, Expression};

use crate::{
    analysis::{DataFlowAnalyzer, DataFlowHook, DataFlowState},
    OptimiserStep, OptimiserStepContext,
};

/// Decides whether a condition always holds, given facts that are known to
/// be true at that point of the program.
pub trait ReasoningOracle {
    /// Returns `Some(true)` if `condition` is non-zero whenever all `facts`
    /// are non-zero, `Some(false)` if it is zero in that case, and `None` if
    /// the oracle cannot tell.
    fn decide(&self, facts: &[Expression], condition: &Expression) -> Option<bool>;
}

/// Replaces conditions of `if` statements and loops by a literal when a
/// [`ReasoningOracle`] proves them constant.
#[derive(Debug, Default)]
pub struct ReasoningBasedSimplifier;

impl OptimiserStep for ReasoningBasedSimplifier {
    const NAME: &'static str = "ReasoningBasedSimplifier";
    const ABBREVIATION: char = 'R';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let Some(oracle) = ctx.reasoning_oracle else {
            debug!("No reasoning oracle available, skipping {}", Self::NAME);
            return;
        };

        DataFlowAnalyzer::run(ctx.dialect, ast, ConditionHook { oracle });
    }
}

struct ConditionHook<'a> {
    oracle: &'a dyn ReasoningOracle,
}

impl ConditionHook<'_> {
    fn facts(state: &DataFlowState<'_>) -> Vec<Expression> {
        state.values()
            .filter(|(_, assigned)| state.is_movable(&assigned.value))
            .map(|(name, assigned)| {
                Expression::call("eq", vec![Expression::identifier(name.clone()), assigned.value.clone()])
            })
            .collect()
    }
}

impl DataFlowHook for ConditionHook<'_> {
    fn visit_expression(&mut self, _: &DataFlowState<'_>, _: &mut Expression) {}

    fn visit_condition(&mut self, state: &DataFlowState<'_>, condition: &mut Expression) {
        if condition.as_literal().is_some() || !state.is_movable(condition) {
            return;
        }

        let facts = Self::facts(state);
        if let Some(decision) = self.oracle.decide(&facts, condition) {
            debug!("Condition {condition} is always {decision}");
            *condition = Expression::number(u64::from(decision));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use yul::{evaluate_pure, parse, Dialect, EvmDialect, YulString, U256};

    use crate::{steps::testing::run_step_with, OptimiserSettings};

    use super::*;

    /// Evaluates the condition using facts of the form `eq(x, <literal>)`.
    struct EvaluatingOracle;

    impl EvaluatingOracle {
        fn evaluate(variables: &BTreeMap<YulString, U256>, expression: &Expression) -> Option<U256> {
            match expression {
                Expression::Literal(literal) => literal.value(),
                Expression::Identifier(identifier) => variables.get(&identifier.name).copied(),
                Expression::FunctionCall(call) => {
                    let instruction = EvmDialect::new().builtin(&call.function_name.name)?.instruction?;
                    let arguments = call.arguments.iter()
                        .map(|argument| Self::evaluate(variables, argument))
                        .collect::<Option<Vec<_>>>()?;
                    evaluate_pure(instruction, &arguments)
                }
            }
        }
    }

    impl ReasoningOracle for EvaluatingOracle {
        fn decide(&self, facts: &[Expression], condition: &Expression) -> Option<bool> {
            let mut variables = BTreeMap::new();
            for fact in facts {
                let call = fact.as_function_call()?;
                let name = call.arguments[0].as_identifier()?;
                if let Some(value) = Self::evaluate(&variables, &call.arguments[1]) {
                    variables.insert(name.clone(), value);
                }
            }

            Self::evaluate(&variables, condition).map(|value| !value.is_zero())
        }
    }

    #[rstest]
    #[case("{ let x := 3 if gt(x, 2) { sstore(0, 1) } }", "{ let x := 3 if 1 { sstore(0, 1) } }")]
    #[case("{ let x := 3 if lt(x, 2) { sstore(0, 1) } }", "{ let x := 3 if 0 { sstore(0, 1) } }")]
    #[case("{ let x := calldataload(0) if gt(x, 2) { sstore(0, 1) } }", "{ let x := calldataload(0) if gt(x, 2) { sstore(0, 1) } }")]
    #[case("{ let x := 3 if gt(sload(x), 2) { sstore(0, 1) } }", "{ let x := 3 if gt(sload(x), 2) { sstore(0, 1) } }")]
    fn decides_conditions(#[case] input: &str, #[case] expected: &str) {
        let actual = run_step_with::<ReasoningBasedSimplifier>(input, &OptimiserSettings::default(), Some(&EvaluatingOracle));
        assert_eq!(actual.to_string(), parse(expected).unwrap().to_string());
    }

    #[test]
    fn does_nothing_without_an_oracle() {
        let input = "{ let x := 3 if gt(x, 2) { sstore(0, 1) } }";
        let actual = run_step_with::<ReasoningBasedSimplifier>(input, &OptimiserSettings::default(), None);
        assert_eq!(actual.to_string(), parse(input).unwrap().to_string());
    }
}
