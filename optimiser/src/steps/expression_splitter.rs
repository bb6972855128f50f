// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{visit::iterate_replacing, Block, Expression, FunctionCall, Statement, VariableDeclaration};

use crate::{NameDispenser, OptimiserStep, OptimiserStepContext};

/// Moves every argument of a function call that is not a variable into a
/// fresh variable declared right before the statement, so that each
/// statement performs at most one call. Conditions of `if` and `switch`
/// statements are moved as well; loop conditions are kept, since they are
/// evaluated more than once.
#[derive(Debug, Default)]
pub struct ExpressionSplitter;

impl OptimiserStep for ExpressionSplitter {
    const NAME: &'static str = "ExpressionSplitter";
    const ABBREVIATION: char = 'x';

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let mut splitter = Splitter {
            dispenser: &mut *ctx.dispenser,
            prefix: Vec::new(),
        };
        splitter.split_block(ast);
    }
}

struct Splitter<'a> {
    dispenser: &'a mut NameDispenser,
    prefix: Vec<Statement>,
}

impl Splitter<'_> {
    fn split_block(&mut self, block: &mut Block) {
        let saved = std::mem::take(&mut self.prefix);

        iterate_replacing(&mut block.statements, |statement| {
            self.split_statement(statement);
            if self.prefix.is_empty() {
                return None;
            }

            let mut replacement = std::mem::take(&mut self.prefix);
            replacement.push(std::mem::replace(statement, Statement::Break));
            Some(replacement)
        });

        self.prefix = saved;
    }

    fn split_statement(&mut self, statement: &mut Statement) {
        match statement {
            Statement::Expression(expression) => self.split_value(expression),
            Statement::Assignment(assignment) => self.split_value(&mut assignment.value),
            Statement::VariableDeclaration(declaration) => {
                if let Some(value) = &mut declaration.value {
                    self.split_value(value);
                }
            }

            Statement::If(statement) => {
                self.outline(&mut statement.condition);
                self.split_block(&mut statement.body);
            }

            Statement::Switch(switch) => {
                self.outline(&mut switch.expression);
                for case in &mut switch.cases {
                    self.split_block(&mut case.body);
                }
            }

            Statement::ForLoop(for_loop) => {
                self.split_block(&mut for_loop.pre);
                self.split_block(&mut for_loop.post);
                self.split_block(&mut for_loop.body);
            }

            Statement::FunctionDefinition(function) => self.split_block(&mut function.body),
            Statement::Block(block) => self.split_block(block),
            Statement::Break | Statement::Continue | Statement::Leave => (),
        }
    }

    /// The outermost call of a value stays in place.
    fn split_value(&mut self, expression: &mut Expression) {
        if let Expression::FunctionCall(call) = expression {
            self.split_arguments(call);
        }
    }

    fn split_arguments(&mut self, call: &mut FunctionCall) {
        for argument in call.arguments.iter_mut().rev() {
            self.outline(argument);
        }
    }

    fn outline(&mut self, expression: &mut Expression) {
        match expression {
            Expression::Identifier(..) => return,
            Expression::FunctionCall(call) => self.split_arguments(call),
            Expression::Literal(..) => (),
        }

        let name = self.dispenser.new_name("");
        let value = std::mem::replace(expression, Expression::identifier(name.clone()));
        self.prefix.push(Statement::VariableDeclaration(VariableDeclaration::single(name, value)));
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case(
        "{ sstore(add(1, 2), mload(0)) }",
        "{ let _1 := 0 let _2 := mload(_1) let _3 := 2 let _4 := 1 let _5 := add(_4, _3) sstore(_5, _2) }",
    )]
    #[case("{ let x := calldataload(0) }", "{ let _1 := 0 let x := calldataload(_1) }")]
    #[case("{ if calldataload(0) { } }", "{ let _1 := 0 let _2 := calldataload(_1) if _2 { } }")]
    #[case("{ for { } lt(1, 2) { } { } }", "{ for { } lt(1, 2) { } { } }")]
    #[case("{ { sstore(0, 1) } }", "{ { let _1 := 1 let _2 := 0 sstore(_2, _1) } }")]
    #[case("{ let x := 1 sstore(x, x) }", "{ let x := 1 sstore(x, x) }")]
    #[case(
        "{ function f(a) -> r { r := add(a, 1) } }",
        "{ function f(a) -> r { let _1 := 1 r := add(a, _1) } }",
    )]
    fn splits_expressions(#[case] input: &str, #[case] expected: &str) {
        assert_step::<ExpressionSplitter>(input, expected);
    }
}
