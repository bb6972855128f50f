// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{Block, Statement};

use crate::{AstInvariant, OptimiserStep, OptimiserStepContext};

/// Moves all code of the top-level block into a block of its own, followed
/// by the function definitions.
#[derive(Debug, Default)]
pub struct FunctionGrouper;

impl OptimiserStep for FunctionGrouper {
    const NAME: &'static str = "FunctionGrouper";
    const ABBREVIATION: char = 'g';
    const REQUIRES: &'static [AstInvariant] = &[AstInvariant::Disambiguated, AstInvariant::FunctionsHoisted];
    const ESTABLISHES: &'static [AstInvariant] = &[AstInvariant::FunctionsGrouped];

    fn run(&mut self, _: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        if is_grouped(ast) {
            return;
        }

        let mut code = Block::default();
        let mut functions = Vec::new();
        for statement in std::mem::take(&mut ast.statements) {
            if statement.is_function_definition() {
                functions.push(statement);
            } else {
                code.statements.push(statement);
            }
        }

        ast.statements.push(Statement::Block(code));
        ast.statements.append(&mut functions);
    }
}

/// Returns whether the top-level block starts with a block of code and
/// otherwise only contains blocks and function definitions.
#[must_use]
pub fn is_grouped(ast: &Block) -> bool {
    matches!(ast.statements.first(), Some(Statement::Block(..)))
        && ast.statements.iter().all(|statement| matches!(statement, Statement::Block(..) | Statement::FunctionDefinition(..)))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case("{ let a function f() { } }", "{ { let a } function f() { } }")]
    #[case("{ }", "{ { } }")]
    #[case("{ function f() { } pop(1) function g() { } }", "{ { pop(1) } function f() { } function g() { } }")]
    #[case("{ { let a } function f() { } }", "{ { let a } function f() { } }")]
    #[case("{ function f() { } function g() { } }", "{ { } function f() { } function g() { } }")]
    fn groups_functions(#[case] input: &str, #[case] expected: &str) {
        assert_step::<FunctionGrouper>(input, expected);
    }
}
