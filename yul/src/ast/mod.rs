// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

mod display;
mod expression;
mod statement;
pub mod visit;

pub use self::{
    expression::{Expression, FunctionCall, Identifier, Literal, LiteralKind, LiteralValue},
    statement::{Assignment, Block, Case, ForLoop, FunctionDefinition, If, Statement, Switch, TypedName, VariableDeclaration},
};
