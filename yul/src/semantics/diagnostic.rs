// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use strum::{AsRefStr, IntoStaticStr};

use crate::YulString;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, AsRefStr, IntoStaticStr)]
pub enum AnalysisDiagnostic {
    #[error("`{name}` is already declared in this or an enclosing scope")]
    Redeclaration { name: YulString },

    #[error("`{name}` is the name of a builtin and cannot be declared")]
    ReservedName { name: YulString },

    #[error("Variable `{name}` is not declared or not visible here")]
    UndeclaredVariable { name: YulString },

    #[error("Function `{name}` is not declared")]
    UndeclaredFunction { name: YulString },

    #[error("`{name}` is a function, but is used as a variable")]
    NotAVariable { name: YulString },

    #[error("`{name}` is a variable, but is called as a function")]
    NotAFunction { name: YulString },

    #[error("Function `{function}` expects {expected} arguments, but {actual} were given")]
    ArgumentCountMismatch { function: YulString, expected: usize, actual: usize },

    #[error("Expected {expected} values, but the expression yields {actual}")]
    ValueCountMismatch { expected: usize, actual: usize },

    #[error("`{statement}` is only allowed inside the body of a for loop")]
    OutsideLoopBody { statement: &'static str },

    #[error("`leave` is only allowed inside a function")]
    LeaveOutsideFunction,

    #[error("Function `{name}` cannot be defined in the initializer of a for loop")]
    FunctionInForLoopPre { name: YulString },

    #[error("Duplicate switch case `{value}`")]
    DuplicateCase { value: String },
}
