// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{
    visit::{iterate_replacing, walk_block_mut, VisitorMut},
    Block, Dialect, Expression, Statement, VariableDeclaration,
};

use crate::{AstInvariant, OptimiserStep, OptimiserStepContext};

/// Gives every variable declaration an explicit initial value of zero,
/// splitting declarations of multiple variables.
#[derive(Debug, Default)]
pub struct VarDeclInitializer;

impl OptimiserStep for VarDeclInitializer {
    const NAME: &'static str = "VarDeclInitializer";
    const ABBREVIATION: char = 'd';
    const REQUIRES: &'static [AstInvariant] = &[];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        Initializer { dialect: ctx.dialect }.visit_block(ast);
    }
}

struct Initializer<'a> {
    dialect: &'a dyn Dialect,
}

impl VisitorMut for Initializer<'_> {
    fn visit_block(&mut self, block: &mut Block) {
        walk_block_mut(self, block);

        iterate_replacing(&mut block.statements, |statement| {
            let Statement::VariableDeclaration(declaration) = statement else {
                return None;
            };

            if declaration.value.is_some() {
                return None;
            }

            if declaration.variables.len() == 1 {
                declaration.value = Some(Expression::Literal(self.dialect.zero_literal()));
                return None;
            }

            Some(declaration.variables.iter()
                .map(|variable| Statement::VariableDeclaration(VariableDeclaration {
                    variables: vec![variable.clone()],
                    value: Some(Expression::Literal(self.dialect.zero_literal())),
                }))
                .collect())
        });
    }
}
