// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{
    visit::{iterate_replacing, walk_statement_mut, VisitorMut},
    Block, Dialect, Expression, Statement,
};

use crate::{OptimiserStep, OptimiserStepContext};

/// Removes `if`, `switch` and `for` statements whose condition is a literal,
/// keeping only the code that would run. Empty `if` statements only keep
/// their condition.
#[derive(Debug, Default)]
pub struct StructuralSimplifier;

impl OptimiserStep for StructuralSimplifier {
    const NAME: &'static str = "StructuralSimplifier";
    const ABBREVIATION: char = 't';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        Simplifier { dialect: ctx.dialect }.visit_block(ast);
    }
}

struct Simplifier<'a> {
    dialect: &'a dyn Dialect,
}

impl Simplifier<'_> {
    fn simplify(&self, statement: &mut Statement) -> Option<Vec<Statement>> {
        match statement {
            Statement::If(statement) => match truth_value(&statement.condition) {
                Some(true) => Some(vec![Statement::Block(std::mem::take(&mut statement.body))]),
                Some(false) => Some(Vec::new()),
                None if statement.body.is_empty() => {
                    let condition = std::mem::replace(&mut statement.condition, Expression::number(0u64));
                    Some(self.discard(condition))
                }
                None => None,
            },

            Statement::Switch(switch) => {
                if let Some(value) = switch.expression.as_literal().and_then(|literal| literal.value()) {
                    let index = switch.cases.iter()
                        .position(|case| case.value.as_ref().and_then(|literal| literal.value()) == Some(value))
                        .or_else(|| switch.cases.iter().position(|case| case.value.is_none()));
                    return match index {
                        Some(index) => Some(vec![Statement::Block(std::mem::take(&mut switch.cases[index].body))]),
                        None => Some(Vec::new()),
                    };
                }

                if switch.cases.len() == 1 && switch.cases[0].value.is_none() {
                    let body = std::mem::take(&mut switch.cases[0].body);
                    let mut replacement = self.discard(std::mem::replace(&mut switch.expression, Expression::number(0u64)));
                    replacement.push(Statement::Block(body));
                    return Some(replacement);
                }

                None
            }

            Statement::ForLoop(for_loop) if truth_value(&for_loop.condition) == Some(false) => {
                let pre = std::mem::take(&mut for_loop.pre);
                if pre.is_empty() {
                    Some(Vec::new())
                } else {
                    Some(vec![Statement::Block(pre)])
                }
            }

            _ => None,
        }
    }

    /// Evaluates `expression` for its side effects only.
    fn discard(&self, expression: Expression) -> Vec<Statement> {
        if !matches!(expression, Expression::FunctionCall(..)) {
            return Vec::new();
        }

        match self.dialect.discard_function() {
            Some(discard) => vec![Statement::Expression(Expression::call(discard.name.clone(), vec![expression]))],
            None => vec![Statement::Expression(expression)],
        }
    }
}

impl VisitorMut for Simplifier<'_> {
    fn visit_block(&mut self, block: &mut Block) {
        iterate_replacing(&mut block.statements, |statement| {
            walk_statement_mut(self, statement);
            self.simplify(statement)
        });
    }
}

fn truth_value(expression: &Expression) -> Option<bool> {
    let value = expression.as_literal()?.value()?;
    Some(!value.is_zero())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case("{ if 1 { sstore(0, 1) } }", "{ { sstore(0, 1) } }")]
    #[case("{ if 0 { sstore(0, 1) } sstore(1, 1) }", "{ sstore(1, 1) }")]
    #[case(
        "{ switch 2 case 1 { sstore(0, 1) } case 2 { sstore(0, 2) } default { sstore(0, 3) } }",
        "{ { sstore(0, 2) } }",
    )]
    #[case("{ switch 5 case 1 { sstore(0, 1) } default { sstore(0, 3) } }", "{ { sstore(0, 3) } }")]
    #[case("{ switch 5 case 1 { sstore(0, 1) } }", "{ }")]
    #[case("{ switch calldataload(0) default { sstore(0, 3) } }", "{ pop(calldataload(0)) { sstore(0, 3) } }")]
    #[case("{ for { } 0 { } { sstore(0, 1) } }", "{ }")]
    #[case("{ let x := calldataload(0) if x { } }", "{ let x := calldataload(0) }")]
    #[case("{ if calldataload(0) { } }", "{ pop(calldataload(0)) }")]
    #[case(
        "{ let x := calldataload(0) if x { if 1 { sstore(0, x) } } }",
        "{ let x := calldataload(0) if x { { sstore(0, x) } } }",
    )]
    fn simplifies_control_flow(#[case] input: &str, #[case] expected: &str) {
        assert_step::<StructuralSimplifier>(input, expected);
    }
}
