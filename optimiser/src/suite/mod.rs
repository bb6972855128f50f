// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

mod invariant;
mod registry;
mod sequence;

use std::collections::BTreeSet;

use log::{debug, info, trace};
use yul::{
    visit::{Visitor, VisitorMut},
    Analyzer, Block, Dialect, Expression, YulString,
};

use crate::{
    analysis::{CodeSizeOracle, CostOracle},
    names::normalized_snapshot,
    steps::{ForLoopInitRewriter, FunctionGrouper, FunctionHoister, ReasoningOracle},
    Disambiguator, NameDispenser, OptimiserError, OptimiserSettings, OptimiserStepContext, SequenceError,
};

pub use self::{
    invariant::AstInvariant,
    registry::{StepEntry, StepRegistry},
    sequence::{SequenceItem, StepSequence},
};

/// Runs the configured step sequences on a program.
///
/// Before the sequence runs, the program is checked, disambiguated and
/// brought into hoisted and grouped form with for loop pre blocks moved
/// out, so that every step finds the shape it requires.
pub struct OptimiserSuite<'a> {
    dialect: &'a dyn Dialect,
    settings: &'a OptimiserSettings,
    registry: StepRegistry,
    cost_oracle: &'a dyn CostOracle,
    reasoning_oracle: Option<&'a dyn ReasoningOracle>,
}

impl<'a> OptimiserSuite<'a> {
    #[must_use]
    pub fn new(dialect: &'a dyn Dialect, settings: &'a OptimiserSettings) -> Self {
        Self {
            dialect,
            settings,
            registry: StepRegistry::with_all_steps(),
            cost_oracle: &CodeSizeOracle,
            reasoning_oracle: None,
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: StepRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_cost_oracle(mut self, cost_oracle: &'a dyn CostOracle) -> Self {
        self.cost_oracle = cost_oracle;
        self
    }

    #[must_use]
    pub fn with_reasoning_oracle(mut self, reasoning_oracle: &'a dyn ReasoningOracle) -> Self {
        self.reasoning_oracle = Some(reasoning_oracle);
        self
    }

    /// Parses the main and cleanup sequences of the settings. A cleanup
    /// sequence after a `:` in the main sequence takes precedence over the
    /// separate cleanup setting.
    pub fn sequences(&self) -> Result<(Vec<SequenceItem>, Vec<SequenceItem>), OptimiserError> {
        let sequence = StepSequence::parse(&self.settings.sequence, &self.registry)?;
        let cleanup = match sequence.cleanup {
            Some(cleanup) => cleanup,
            None => {
                let cleanup = StepSequence::parse(&self.settings.cleanup_sequence, &self.registry)?;
                if cleanup.cleanup.is_some() {
                    let position = self.settings.cleanup_sequence.chars().position(|c| c == ':').unwrap_or_default();
                    return Err(SequenceError::InvalidColon { position }.into());
                }
                cleanup.main
            }
        };

        Ok((sequence.main, cleanup))
    }

    /// Optimises `ast` in place. Nothing is changed if the sequences are
    /// invalid, the program is invalid or an expression is nested too deep.
    /// Names in `reserved` are never renamed or removed.
    pub fn run(&self, ast: &mut Block, reserved: &BTreeSet<YulString>) -> Result<(), OptimiserError> {
        let (main, cleanup) = self.sequences()?;

        let depth = ExpressionDepth::of(ast);
        if depth > self.settings.max_expression_depth {
            return Err(OptimiserError::ExpressionTooDeep {
                depth,
                limit: self.settings.max_expression_depth,
            });
        }

        let analysis = Analyzer::analyze(self.dialect, ast).map_err(OptimiserError::InvalidProgram)?;
        Disambiguator::new(self.dialect, &analysis, reserved).visit_block(ast);

        let mut dispenser = NameDispenser::for_ast(self.dialect, ast, reserved);
        let mut ctx = OptimiserStepContext {
            dialect: self.dialect,
            dispenser: &mut dispenser,
            reserved_identifiers: reserved,
            settings: self.settings,
            cost_oracle: self.cost_oracle,
            reasoning_oracle: self.reasoning_oracle,
        };

        let mut runner = SequenceRunner {
            registry: &self.registry,
            max_rounds: self.settings.max_rounds,
            established: BTreeSet::from([AstInvariant::Disambiguated]),
        };

        for prefix in [StepEntry::of::<FunctionHoister>(), StepEntry::of::<FunctionGrouper>(), StepEntry::of::<ForLoopInitRewriter>()] {
            runner.run_step(&prefix, &mut ctx, ast);
        }

        debug!("Running main sequence");
        runner.run_items(&main, &mut ctx, ast);

        debug!("Running cleanup sequence");
        runner.run_items(&cleanup, &mut ctx, ast);

        Ok(())
    }
}

struct SequenceRunner<'a> {
    registry: &'a StepRegistry,
    max_rounds: usize,
    established: BTreeSet<AstInvariant>,
}

impl SequenceRunner<'_> {
    fn run_items(&mut self, items: &[SequenceItem], ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        for item in items {
            match item {
                SequenceItem::Step(abbreviation) => {
                    let entry = *self.registry.get(*abbreviation)
                        .expect("sequence should have been validated against the registry");
                    self.run_step(&entry, ctx, ast);
                }

                SequenceItem::Repeat(items) => self.run_until_stable(items, ctx, ast),
            }
        }
    }

    fn run_until_stable(&mut self, items: &[SequenceItem], ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        for round in 1..=self.max_rounds {
            let before = normalized_snapshot(ast);
            self.run_items(items, ctx, ast);

            if normalized_snapshot(ast) == before {
                info!("Sequence reached a fixpoint after {round} round(s)");
                return;
            }
            debug!("Round {round} changed the program");
        }

        info!("Sequence did not reach a fixpoint within {} rounds", self.max_rounds);
    }

    fn run_step(&mut self, entry: &StepEntry, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        for invariant in entry.requires {
            assert!(
                self.established.contains(invariant),
                "{} requires {invariant:?} to hold", entry.name,
            );
        }

        debug!("Running {}", entry.name);
        entry.run(ctx, ast);
        trace!("After {}: {ast}", entry.name);

        self.established.extend(entry.establishes.iter().copied());
        self.established.retain(|invariant| {
            let holds = invariant.holds(ast, ctx.reserved_identifiers);
            if !holds {
                debug!("{} broke {invariant:?}", entry.name);
            }
            holds
        });
    }
}

/// The deepest nesting of calls in any expression of a program.
#[derive(Default)]
struct ExpressionDepth {
    max: usize,
}

impl ExpressionDepth {
    fn of(ast: &Block) -> usize {
        let mut finder = Self::default();
        finder.visit_block(ast);
        finder.max
    }
}

impl<'ast> Visitor<'ast> for ExpressionDepth {
    fn visit_expression(&mut self, expression: &'ast Expression) {
        self.max = self.max.max(expression.depth());
    }
}
