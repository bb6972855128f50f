// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use log::debug;
use yul::{
    visit::{walk_function_call_mut, VisitorMut},
    Block, FunctionCall, Statement, YulString,
};

use crate::{names::normalized_snapshot, AstInvariant, OptimiserStep, OptimiserStepContext};

/// Redirects calls of a function to the first function with the same code,
/// up to the names of its parameters, return variables and locals. The
/// duplicates are left unreferenced for the unused pruner.
#[derive(Debug, Default)]
pub struct EquivalentFunctionCombiner;

impl OptimiserStep for EquivalentFunctionCombiner {
    const NAME: &'static str = "EquivalentFunctionCombiner";
    const ABBREVIATION: char = 'v';
    const REQUIRES: &'static [AstInvariant] = &[
        AstInvariant::Disambiguated,
        AstInvariant::FunctionsHoisted,
        AstInvariant::FunctionsGrouped,
    ];

    fn run(&mut self, _: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let mut first_with_code: BTreeMap<String, YulString> = BTreeMap::new();
        let mut replacements = BTreeMap::new();

        for statement in &ast.statements {
            let Statement::FunctionDefinition(function) = statement else {
                continue;
            };

            let code = normalized_snapshot(&Block { statements: vec![statement.clone()] });
            match first_with_code.get(&code) {
                Some(first) => {
                    debug!("{} has the same code as {first}", function.name);
                    replacements.insert(function.name.clone(), first.clone());
                }
                None => {
                    first_with_code.insert(code, function.name.clone());
                }
            }
        }

        if !replacements.is_empty() {
            CallRedirector { replacements: &replacements }.visit_block(ast);
        }
    }
}

/// Renames the called function of every call, but not the definitions.
struct CallRedirector<'a> {
    replacements: &'a BTreeMap<YulString, YulString>,
}

impl VisitorMut for CallRedirector<'_> {
    fn visit_function_call(&mut self, call: &mut FunctionCall) {
        if let Some(replacement) = self.replacements.get(&call.function_name.name) {
            call.function_name.name = replacement.clone();
        }
        walk_function_call_mut(self, call);
    }
}
