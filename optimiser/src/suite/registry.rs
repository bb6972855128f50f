// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use yul::Block;

use crate::{steps::*, AstInvariant, OptimiserStep, OptimiserStepContext};

/// A registered step, type-erased so sequences can refer to it by its
/// abbreviation.
#[derive(Debug, Clone, Copy)]
pub struct StepEntry {
    pub name: &'static str,
    pub abbreviation: char,
    pub requires: &'static [AstInvariant],
    pub establishes: &'static [AstInvariant],
    run: fn(&mut OptimiserStepContext<'_>, &mut Block),
}

impl StepEntry {
    #[must_use]
    pub fn of<T: OptimiserStep>() -> Self {
        Self {
            name: T::NAME,
            abbreviation: T::ABBREVIATION,
            requires: T::REQUIRES,
            establishes: T::ESTABLISHES,
            run: run_step::<T>,
        }
    }

    pub fn run(&self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        (self.run)(ctx, ast);
    }
}

fn run_step<T: OptimiserStep>(ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
    T::default().run(ctx, ast);
}

/// Maps abbreviations to steps. The registry is built once and handed to
/// the suite, so a reduced set of steps can be used where needed.
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    steps: BTreeMap<char, StepEntry>,
}

impl StepRegistry {
    /// A registry without any steps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every step of this crate.
    #[must_use]
    pub fn with_all_steps() -> Self {
        let mut registry = Self::new();
        registry
            .register::<BlockFlattener>()
            .register::<CircularReferencesPruner>()
            .register::<CommonSubexpressionEliminator>()
            .register::<VarDeclInitializer>()
            .register::<DeadCodeEliminator>()
            .register::<EquivalentFunctionCombiner>()
            .register::<ExpressionInliner>()
            .register::<FunctionGrouper>()
            .register::<FunctionHoister>()
            .register::<FullInliner>()
            .register::<ExpressionJoiner>()
            .register::<LoadResolver>()
            .register::<LoopInvariantCodeMotion>()
            .register::<Rematerialiser>()
            .register::<ForLoopInitRewriter>()
            .register::<UnusedFunctionParameterPruner>()
            .register::<ReasoningBasedSimplifier>()
            .register::<UnusedAssignEliminator>()
            .register::<UnusedStoreEliminator>()
            .register::<ExpressionSimplifier>()
            .register::<LiteralRematerialiser>()
            .register::<StructuralSimplifier>()
            .register::<UnusedPruner>()
            .register::<SSAReverser>()
            .register::<SSATransform>()
            .register::<ExpressionSplitter>();
        registry
    }

    /// Adds the step `T`.
    ///
    /// # Panics
    /// If another step with the same abbreviation is registered already.
    pub fn register<T: OptimiserStep>(&mut self) -> &mut Self {
        let entry = StepEntry::of::<T>();
        if let Some(existing) = self.steps.insert(entry.abbreviation, entry) {
            panic!("{} and {} share the abbreviation `{}`", existing.name, entry.name, entry.abbreviation);
        }
        self
    }

    #[must_use]
    pub fn get(&self, abbreviation: char) -> Option<&StepEntry> {
        self.steps.get(&abbreviation)
    }

    pub fn entries(&self) -> impl Iterator<Item = &StepEntry> {
        self.steps.values()
    }
}
