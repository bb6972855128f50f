// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{visit::{walk_statement_mut, VisitorMut}, Block, Statement};

use crate::{AstInvariant, OptimiserStep, OptimiserStepContext};

/// Moves every function definition to the end of the top-level block. A
/// nested definition leaves an empty block in its place.
#[derive(Debug, Default)]
pub struct FunctionHoister {
    functions: Vec<Statement>,
    is_top_level: bool,
}

impl OptimiserStep for FunctionHoister {
    const NAME: &'static str = "FunctionHoister";
    const ABBREVIATION: char = 'h';
    const ESTABLISHES: &'static [AstInvariant] = &[AstInvariant::FunctionsHoisted];

    fn run(&mut self, _: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        self.is_top_level = true;
        self.visit_block(ast);
    }
}

impl VisitorMut for FunctionHoister {
    fn visit_block(&mut self, block: &mut Block) {
        let is_top_level = std::mem::replace(&mut self.is_top_level, false);

        if !is_top_level {
            for statement in &mut block.statements {
                walk_statement_mut(self, statement);
                if statement.is_function_definition() {
                    let function = std::mem::replace(statement, Statement::Block(Block::default()));
                    self.functions.push(function);
                }
            }
            return;
        }

        // Blocks that were already at the top level stay, so a grouped
        // program remains grouped.
        let mut remaining = Vec::with_capacity(block.statements.len());
        for mut statement in std::mem::take(&mut block.statements) {
            walk_statement_mut(self, &mut statement);
            if statement.is_function_definition() {
                self.functions.push(statement);
            } else {
                remaining.push(statement);
            }
        }

        remaining.append(&mut self.functions);
        block.statements = remaining;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case("{ let a function f() { } }", "{ let a function f() { } }")]
    #[case("{ function f() { } let a }", "{ let a function f() { } }")]
    #[case(
        "{ if 1 { function f() { function g() { } } } { } }",
        "{ if 1 { { } } { } function g() { } function f() { { } } }",
    )]
    #[case("{ { } function f() { } }", "{ { } function f() { } }")]
    #[case("{ { } function f() { function g() { } } }", "{ { } function g() { } function f() { { } } }")]
    fn hoists_functions(#[case] input: &str, #[case] expected: &str) {
        assert_step::<FunctionHoister>(input, expected);
    }
}
