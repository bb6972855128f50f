// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use crate::{Expression, Identifier, Literal, YulString};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    #[must_use]
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Expression(Expression),
    Assignment(Assignment),
    VariableDeclaration(VariableDeclaration),
    FunctionDefinition(FunctionDefinition),
    If(If),
    Switch(Switch),
    ForLoop(ForLoop),
    Break,
    Continue,
    Leave,
    Block(Block),
}

impl Statement {
    #[must_use]
    pub fn as_function_definition(&self) -> Option<&FunctionDefinition> {
        match self {
            Self::FunctionDefinition(function) => Some(function),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_function_definition(&self) -> bool {
        matches!(self, Self::FunctionDefinition(..))
    }

    #[must_use]
    pub fn is_empty_block(&self) -> bool {
        matches!(self, Self::Block(block) if block.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedName {
    pub name: YulString,
    pub ty: Option<YulString>,
}

impl TypedName {
    #[must_use]
    pub fn new(name: impl Into<YulString>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub variable_names: Vec<Identifier>,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclaration {
    pub variables: Vec<TypedName>,
    pub value: Option<Expression>,
}

impl VariableDeclaration {
    #[must_use]
    pub fn single(name: impl Into<YulString>, value: Expression) -> Self {
        Self {
            variables: vec![TypedName::new(name)],
            value: Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: YulString,
    pub parameters: Vec<TypedName>,
    pub return_variables: Vec<TypedName>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct If {
    pub condition: Expression,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    pub expression: Expression,
    pub cases: Vec<Case>,
}

impl Switch {
    #[must_use]
    pub fn default_case(&self) -> Option<&Case> {
        self.cases.iter().find(|case| case.value.is_none())
    }
}

/// A switch case. The default case has no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub value: Option<Literal>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoop {
    pub pre: Block,
    pub condition: Expression,
    pub post: Block,
    pub body: Block,
}
