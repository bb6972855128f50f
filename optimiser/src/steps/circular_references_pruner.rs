// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use log::debug;
use yul::{Block, Statement, YulString};

use crate::{analysis::CallGraph, AstInvariant, OptimiserStep, OptimiserStepContext};

/// Removes the functions that cannot be reached from the top-level code or
/// from a reserved identifier, including functions that only call each
/// other.
#[derive(Debug, Default)]
pub struct CircularReferencesPruner;

impl OptimiserStep for CircularReferencesPruner {
    const NAME: &'static str = "CircularReferencesPruner";
    const ABBREVIATION: char = 'l';
    const REQUIRES: &'static [AstInvariant] = &[AstInvariant::Disambiguated, AstInvariant::FunctionsHoisted];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let graph = CallGraph::of(ast);
        let empty = YulString::empty();
        let reachable = graph.reachable_from(ctx.reserved_identifiers.iter().chain(std::iter::once(&empty)));

        ast.statements.retain(|statement| match statement {
            Statement::FunctionDefinition(function) if !reachable.contains(&function.name) => {
                debug!("Removing unreachable function `{}`", function.name);
                false
            }
            _ => true,
        });
    }
}
