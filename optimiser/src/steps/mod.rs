// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

mod block_flattener;
mod circular_references_pruner;
mod common_subexpression_eliminator;
mod dead_code_eliminator;
mod equivalent_function_combiner;
mod expression_inliner;
mod expression_joiner;
mod expression_simplifier;
mod expression_splitter;
mod for_loop_init_rewriter;
mod full_inliner;
mod function_grouper;
mod function_hoister;
mod load_resolver;
mod loop_invariant_code_motion;
mod reasoning_based_simplifier;
mod rematerialiser;
mod ssa_reverser;
mod ssa_transform;
mod structural_simplifier;
mod unused_assign_eliminator;
mod unused_function_parameter_pruner;
mod unused_pruner;
mod unused_store_eliminator;
mod var_decl_initializer;

use yul::Block;

use crate::{AstInvariant, OptimiserStepContext};

pub(crate) use self::function_grouper::is_grouped;

pub use self::{
    block_flattener::BlockFlattener,
    circular_references_pruner::CircularReferencesPruner,
    common_subexpression_eliminator::CommonSubexpressionEliminator,
    dead_code_eliminator::DeadCodeEliminator,
    equivalent_function_combiner::EquivalentFunctionCombiner,
    expression_inliner::ExpressionInliner,
    expression_joiner::ExpressionJoiner,
    expression_simplifier::ExpressionSimplifier,
    expression_splitter::ExpressionSplitter,
    for_loop_init_rewriter::ForLoopInitRewriter,
    full_inliner::FullInliner,
    function_grouper::FunctionGrouper,
    function_hoister::FunctionHoister,
    load_resolver::LoadResolver,
    loop_invariant_code_motion::LoopInvariantCodeMotion,
    reasoning_based_simplifier::{ReasoningBasedSimplifier, ReasoningOracle},
    rematerialiser::{LiteralRematerialiser, Rematerialiser},
    ssa_reverser::SSAReverser,
    ssa_transform::SSATransform,
    structural_simplifier::StructuralSimplifier,
    unused_assign_eliminator::UnusedAssignEliminator,
    unused_function_parameter_pruner::UnusedFunctionParameterPruner,
    unused_pruner::UnusedPruner,
    unused_store_eliminator::UnusedStoreEliminator,
    var_decl_initializer::VarDeclInitializer,
};

/// A transformation of the whole program. Every step preserves the
/// semantics of the program.
pub trait OptimiserStep: Default {
    const NAME: &'static str;
    const ABBREVIATION: char;

    /// The shape the AST must have before the step runs.
    const REQUIRES: &'static [AstInvariant] = &[AstInvariant::Disambiguated];

    /// The shape the AST has after the step ran.
    const ESTABLISHES: &'static [AstInvariant] = &[];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;
    use yul::{parse, Block, EvmDialect};

    use crate::{analysis::CodeSizeOracle, Disambiguator, NameDispenser, OptimiserSettings, OptimiserStepContext};

    use super::{OptimiserStep, ReasoningOracle};

    /// Parses and disambiguates `source`, then runs the step `T` on it.
    pub fn run_step<T: OptimiserStep>(source: &str) -> Block {
        run_step_with::<T>(source, &OptimiserSettings::default(), None)
    }

    pub fn run_step_with<T: OptimiserStep>(
        source: &str,
        settings: &OptimiserSettings,
        reasoning_oracle: Option<&dyn ReasoningOracle>,
    ) -> Block {
        let dialect = EvmDialect::new();
        let reserved = BTreeSet::new();

        let mut ast = parse(source).expect("test input should parse");
        Disambiguator::run(&dialect, &mut ast, &reserved);

        let mut dispenser = NameDispenser::for_ast(&dialect, &ast, &reserved);
        let mut ctx = OptimiserStepContext {
            dialect: &dialect,
            dispenser: &mut dispenser,
            reserved_identifiers: &reserved,
            settings,
            cost_oracle: &CodeSizeOracle,
            reasoning_oracle,
        };

        T::default().run(&mut ctx, &mut ast);
        ast
    }

    /// Asserts that the step `T` turns `input` into `expected`. Both are
    /// compared in printed form, so failures show a readable diff.
    #[track_caller]
    pub fn assert_step<T: OptimiserStep>(input: &str, expected: &str) {
        let expected = parse(expected).expect("expected output should parse");
        assert_eq!(run_step::<T>(input).to_string(), expected.to_string());
    }
}
