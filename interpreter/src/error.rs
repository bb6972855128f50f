// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use strum::AsRefStr;
use thiserror::Error;
use yul::{YulString, U256};

#[derive(Debug, Clone, PartialEq, Eq, Error, AsRefStr)]
pub enum InterpreterError {
    #[error("builtin `{name}` is not supported by the interpreter")]
    UnsupportedBuiltin {
        name: YulString,
    },

    #[error("variable `{name}` is not declared")]
    UndeclaredVariable {
        name: YulString,
    },

    #[error("function `{name}` is not declared")]
    UndeclaredFunction {
        name: YulString,
    },

    #[error("expected {expected} value(s), but got {actual}")]
    ValueCountMismatch {
        expected: usize,
        actual: usize,
    },

    #[error("literal {literal} does not fit in a word")]
    InvalidLiteral {
        literal: String,
    },

    #[error("accessing {size} bytes of memory at {offset} exceeds the memory limit")]
    MemoryLimitExceeded {
        offset: U256,
        size: U256,
    },
}
