// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

#![deny(elided_lifetimes_in_paths)]

mod ast;
mod dialect;
mod lexer;
mod parser;
mod semantics;
mod side_effects;
mod string;
mod token;

pub use self::{
    ast::*,
    dialect::{evaluate_pure, BuiltinFunction, Dialect, EvmDialect, EvmInstruction},
    lexer::Lexer,
    parser::{parse, ParseDiagnostic, ParseResult, Parser},
    semantics::{AnalysisDiagnostic, AnalysisInfo, Analyzer, Scope, ScopeId, ScopeTree, SymbolKind},
    side_effects::{ControlFlowSideEffects, SideEffects},
    string::YulString,
    token::{FileLocation, Keyword, Punctuator, Token, TokenKind},
};

pub use primitive_types::U256;
