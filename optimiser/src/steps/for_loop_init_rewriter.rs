// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{
    visit::{iterate_replacing, walk_statement_mut, VisitorMut},
    Block, Statement,
};

use crate::{AstInvariant, OptimiserStep, OptimiserStepContext};

/// Moves the statements of the pre block of every for loop in front of the
/// loop. Names are unique, so this does not change what they refer to.
#[derive(Debug, Default)]
pub struct ForLoopInitRewriter;

impl OptimiserStep for ForLoopInitRewriter {
    const NAME: &'static str = "ForLoopInitRewriter";
    const ABBREVIATION: char = 'o';
    const ESTABLISHES: &'static [AstInvariant] = &[AstInvariant::ForLoopInitRewritten];

    fn run(&mut self, _: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        self.visit_block(ast);
    }
}

impl VisitorMut for ForLoopInitRewriter {
    fn visit_block(&mut self, block: &mut Block) {
        iterate_replacing(&mut block.statements, |statement| {
            walk_statement_mut(self, statement);

            let Statement::ForLoop(for_loop) = statement else {
                return None;
            };

            let mut rewritten = std::mem::take(&mut for_loop.pre.statements);
            rewritten.push(std::mem::replace(statement, Statement::Break));
            Some(rewritten)
        });
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case(
        "{ for { let i := 0 } lt(i, 3) { i := add(i, 1) } { } }",
        "{ let i := 0 for { } lt(i, 3) { i := add(i, 1) } { } }",
    )]
    #[case(
        "{ for { let i := 0 } lt(i, 3) { i := add(i, 1) } { for { let j := i } j { j := 0 } { } } }",
        "{ let i := 0 for { } lt(i, 3) { i := add(i, 1) } { let j := i for { } j { j := 0 } { } } }",
    )]
    #[case("{ if 1 { for { let k := 1 } k { } { break } } }", "{ if 1 { let k := 1 for { } k { } { break } } }")]
    fn moves_pre_blocks(#[case] input: &str, #[case] expected: &str) {
        assert_step::<ForLoopInitRewriter>(input, expected);
    }
}
