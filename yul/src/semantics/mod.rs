// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

mod analyzer;
mod diagnostic;
mod scope;

pub use self::{
    analyzer::{AnalysisInfo, Analyzer},
    diagnostic::AnalysisDiagnostic,
    scope::{Scope, ScopeId, ScopeTree, SymbolKind},
};
