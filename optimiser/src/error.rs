// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use strum::AsRefStr;
use thiserror::Error;
use yul::AnalysisDiagnostic;

#[derive(Debug, Clone, PartialEq, Eq, Error, AsRefStr)]
pub enum SequenceError {
    #[error("unknown optimiser step `{abbreviation}` at position {position}")]
    UnknownAbbreviation {
        abbreviation: char,
        position: usize,
    },

    #[error("`]` at position {position} does not close a bracket")]
    UnexpectedClosingBracket {
        position: usize,
    },

    #[error("`[` at position {position} is never closed")]
    UnterminatedBracket {
        position: usize,
    },

    #[error("`:` at position {position} is nested or appears more than once")]
    InvalidColon {
        position: usize,
    },
}

#[derive(Debug, Error, AsRefStr)]
pub enum OptimiserError {
    #[error("invalid step sequence: {0}")]
    Sequence(#[from] SequenceError),

    #[error("expression is nested {depth} levels deep, the limit is {limit}")]
    ExpressionTooDeep {
        depth: usize,
        limit: usize,
    },

    #[error("program is invalid: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    InvalidProgram(Vec<AnalysisDiagnostic>),

    #[error("invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
}
