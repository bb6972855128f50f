// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

mod collector;
mod disambiguator;
mod dispenser;
mod displacer;
mod renamer;
mod shortener;

pub use self::{
    collector::{ssa_variables, Assignments, NameCollector, ReferencesCounter},
    disambiguator::Disambiguator,
    dispenser::NameDispenser,
    displacer::NameDisplacer,
    renamer::{normalized_snapshot, Renamer},
    shortener::{DiagnosticSink, LogSink, NameShortener},
};
