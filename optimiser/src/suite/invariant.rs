// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeSet;

use strum::{AsRefStr, EnumIter};
use yul::{
    visit::{walk_for_loop, walk_function_definition, walk_variable_declaration, Visitor},
    Block, ForLoop, FunctionDefinition, Statement, VariableDeclaration, YulString,
};

use crate::steps::is_grouped;

/// A property of the shape of the AST that steps may rely on. Steps declare
/// which ones they need and which ones they establish; the suite checks
/// after every step which ones still hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, EnumIter)]
pub enum AstInvariant {
    /// Every declared name is unique in the whole program.
    Disambiguated,

    /// Function definitions only appear in the top-level block.
    FunctionsHoisted,

    /// The top-level block is a block of code followed by function
    /// definitions.
    FunctionsGrouped,

    /// For loops have an empty pre block.
    ForLoopInitRewritten,
}

impl AstInvariant {
    /// Returns whether the invariant holds for `ast`. Names in `reserved`
    /// are never renamed, so they may be declared more than once.
    #[must_use]
    pub fn holds(&self, ast: &Block, reserved: &BTreeSet<YulString>) -> bool {
        match self {
            Self::Disambiguated => {
                let mut finder = ShapeFinder::new(reserved);
                finder.visit_block(ast);
                !finder.has_duplicate_declaration
            }

            Self::FunctionsHoisted => ast.statements.iter().all(|statement| {
                let mut finder = ShapeFinder::new(reserved);
                match statement {
                    Statement::FunctionDefinition(function) => finder.visit_block(&function.body),
                    _ => finder.visit_statement(statement),
                }
                !finder.has_function
            }),

            Self::FunctionsGrouped => is_grouped(ast),

            Self::ForLoopInitRewritten => {
                let mut finder = ShapeFinder::new(reserved);
                finder.visit_block(ast);
                !finder.has_for_loop_init
            }
        }
    }
}

struct ShapeFinder<'a> {
    reserved: &'a BTreeSet<YulString>,
    declared: BTreeSet<YulString>,
    has_duplicate_declaration: bool,
    has_function: bool,
    has_for_loop_init: bool,
}

impl<'a> ShapeFinder<'a> {
    fn new(reserved: &'a BTreeSet<YulString>) -> Self {
        Self {
            reserved,
            declared: BTreeSet::new(),
            has_duplicate_declaration: false,
            has_function: false,
            has_for_loop_init: false,
        }
    }

    fn declare(&mut self, name: &YulString) {
        if !self.declared.insert(name.clone()) && !self.reserved.contains(name) {
            self.has_duplicate_declaration = true;
        }
    }
}

impl<'ast> Visitor<'ast> for ShapeFinder<'_> {
    fn visit_variable_declaration(&mut self, declaration: &'ast VariableDeclaration) {
        for variable in &declaration.variables {
            self.declare(&variable.name);
        }
        walk_variable_declaration(self, declaration);
    }

    fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
        self.has_function = true;
        self.declare(&function.name);
        for variable in function.parameters.iter().chain(&function.return_variables) {
            self.declare(&variable.name);
        }
        walk_function_definition(self, function);
    }

    fn visit_for_loop(&mut self, for_loop: &'ast ForLoop) {
        self.has_for_loop_init |= !for_loop.pre.is_empty();
        walk_for_loop(self, for_loop);
    }
}
