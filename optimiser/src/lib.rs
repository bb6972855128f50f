// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

#![deny(elided_lifetimes_in_paths)]

pub mod analysis;
mod context;
mod error;
mod names;
mod settings;
mod steps;
mod suite;

pub use self::{
    context::OptimiserStepContext,
    error::{OptimiserError, SequenceError},
    names::{
        normalized_snapshot, ssa_variables, Assignments, DiagnosticSink, Disambiguator, LogSink, NameCollector,
        NameDispenser, NameDisplacer, NameShortener, ReferencesCounter, Renamer,
    },
    settings::{FullInlinerSettings, OptimiserSettings, DEFAULT_CLEANUP_SEQUENCE, DEFAULT_SEQUENCE},
    steps::*,
    suite::{AstInvariant, OptimiserSuite, SequenceItem, StepEntry, StepRegistry, StepSequence},
};
