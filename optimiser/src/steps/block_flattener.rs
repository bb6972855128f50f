// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{
    visit::{iterate_replacing, walk_block_mut, VisitorMut},
    Block, Statement,
};

use crate::{AstInvariant, OptimiserStep, OptimiserStepContext};

/// Replaces blocks nested directly in another block by their statements.
/// The top-level block keeps its shape.
#[derive(Debug, Default)]
pub struct BlockFlattener;

impl OptimiserStep for BlockFlattener {
    const NAME: &'static str = "BlockFlattener";
    const ABBREVIATION: char = 'f';
    const REQUIRES: &'static [AstInvariant] = &[AstInvariant::Disambiguated, AstInvariant::FunctionsGrouped];

    fn run(&mut self, _: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        for statement in &mut ast.statements {
            match statement {
                Statement::Block(block) => self.visit_block(block),
                Statement::FunctionDefinition(function) => self.visit_block(&mut function.body),
                _ => panic!("flattening blocks requires grouped functions, found {statement}"),
            }
        }
    }
}

impl VisitorMut for BlockFlattener {
    fn visit_block(&mut self, block: &mut Block) {
        walk_block_mut(self, block);

        iterate_replacing(&mut block.statements, |statement| match statement {
            Statement::Block(inner) => Some(std::mem::take(&mut inner.statements)),
            _ => None,
        });
    }
}
