// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

#![deny(elided_lifetimes_in_paths)]

mod error;
mod interpreter;
mod scope;
mod state;

pub use self::{
    error::InterpreterError,
    interpreter::{ExecutionResult, Interpreter, Termination},
    scope::Scope,
    state::{ExecutionState, TraceEntry},
};
