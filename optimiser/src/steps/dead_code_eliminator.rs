// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{visit::{walk_block_mut, VisitorMut}, Block, Dialect};

use crate::{
    analysis::{ControlFlow, TerminationFinder},
    AstInvariant, OptimiserStep, OptimiserStepContext,
};

/// Removes the statements after a statement that unconditionally leaves the
/// block. Function definitions are kept.
#[derive(Debug, Default)]
pub struct DeadCodeEliminator;

impl OptimiserStep for DeadCodeEliminator {
    const NAME: &'static str = "DeadCodeEliminator";
    const ABBREVIATION: char = 'D';
    const REQUIRES: &'static [AstInvariant] = &[AstInvariant::Disambiguated, AstInvariant::ForLoopInitRewritten];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        Eliminator { dialect: ctx.dialect }.visit_block(ast);
    }
}

struct Eliminator<'a> {
    dialect: &'a dyn Dialect,
}

impl VisitorMut for Eliminator<'_> {
    fn visit_block(&mut self, block: &mut Block) {
        let finder = TerminationFinder::new(self.dialect);
        if let (kind, Some(index)) = finder.first_unconditional_control_flow_change(&block.statements) {
            debug_assert_ne!(kind, ControlFlow::FlowOut);

            let mut position = 0;
            block.statements.retain(|statement| {
                position += 1;
                position <= index + 1 || statement.is_function_definition()
            });
        }

        walk_block_mut(self, block);
    }
}
