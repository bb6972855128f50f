// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use yul::{
    visit::{iterate_replacing, VisitorMut},
    Assignment, Block, Expression, FunctionCall, FunctionDefinition, Identifier, Statement, TypedName, YulString,
};

use crate::{
    analysis::CodeSize,
    names::{NameDisplacer, ReferencesCounter},
    AstInvariant, NameDispenser, OptimiserStep, OptimiserStepContext,
};

/// Removes the parameters and return variables a function never references.
///
/// ```text
/// function f(a, b) -> x, y { x := add(a, 7) }
/// ```
///
/// becomes the pruned `f` plus a linking function that keeps the original
/// signature, which every call site now uses:
///
/// ```text
/// function f(a) -> x { x := add(a, 7) }
/// function f_1(a_2, b_3) -> x_4, y_5 { x_4 := f(a_2) }
/// ```
///
/// The linking function is meant to be inlined by a later step.
#[derive(Debug, Default)]
pub struct UnusedFunctionParameterPruner;

impl OptimiserStep for UnusedFunctionParameterPruner {
    const NAME: &'static str = "UnusedFunctionParameterPruner";
    const ABBREVIATION: char = 'p';
    const REQUIRES: &'static [AstInvariant] = &[
        AstInvariant::Disambiguated,
        AstInvariant::FunctionsHoisted,
        AstInvariant::FunctionsGrouped,
    ];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let references = ReferencesCounter::count_block(ast);
        let is_used = |variable: &TypedName| references.contains_key(&variable.name);

        let mut usage: BTreeMap<YulString, Usage> = BTreeMap::new();
        for function in ast.statements.iter().filter_map(Statement::as_function_definition) {
            if ctx.reserved_identifiers.contains(&function.name) || is_too_simple_to_be_pruned(function) {
                continue;
            }

            let parameters: Vec<bool> = function.parameters.iter().map(is_used).collect();
            let returns: Vec<bool> = function.return_variables.iter().map(is_used).collect();
            if parameters.iter().chain(&returns).all(|used| *used) {
                continue;
            }

            usage.insert(function.name.clone(), Usage { parameters, returns });
        }

        if usage.is_empty() {
            return;
        }

        let names_to_free: BTreeSet<YulString> = usage.keys().cloned().collect();
        let mut displacer = NameDisplacer::new(&mut *ctx.dispenser, &names_to_free);
        displacer.visit_block(ast);

        let original_names: BTreeMap<YulString, YulString> = displacer.into_translations()
            .into_iter()
            .map(|(original, displaced)| (displaced, original))
            .collect();

        iterate_replacing(&mut ast.statements, |statement| {
            let Statement::FunctionDefinition(function) = statement else {
                return None;
            };
            let original_name = original_names.get(&function.name)?.clone();
            let usage = &usage[&original_name];

            debug!("Pruning unused parameters of {original_name}");
            let linking = linking_function(&mut *ctx.dispenser, function, &original_name, usage);

            function.name = original_name;
            function.parameters = filter(std::mem::take(&mut function.parameters), &usage.parameters);
            function.return_variables = filter(std::mem::take(&mut function.return_variables), &usage.returns);

            let pruned = std::mem::replace(statement, Statement::Break);
            Some(vec![pruned, Statement::FunctionDefinition(linking)])
        });
    }
}

/// Which parameters and return variables of a function are referenced.
struct Usage {
    parameters: Vec<bool>,
    returns: Vec<bool>,
}

fn is_too_simple_to_be_pruned(function: &FunctionDefinition) -> bool {
    function.body.statements.len() <= 1 && CodeSize::of_block(&function.body) <= 1
}

fn filter<T>(items: Vec<T>, mask: &[bool]) -> Vec<T> {
    items.into_iter()
        .zip(mask)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

/// Creates a function with the signature of `function` that forwards the
/// used parameters to the pruned function and returns its results.
fn linking_function(
    dispenser: &mut NameDispenser,
    function: &FunctionDefinition,
    pruned_name: &YulString,
    usage: &Usage,
) -> FunctionDefinition {
    let mut fresh = |variable: &TypedName| TypedName {
        name: dispenser.new_name(&variable.name),
        ty: variable.ty.clone(),
    };

    let parameters: Vec<TypedName> = function.parameters.iter().map(&mut fresh).collect();
    let return_variables: Vec<TypedName> = function.return_variables.iter().map(&mut fresh).collect();

    let call = Expression::FunctionCall(FunctionCall {
        function_name: Identifier::new(pruned_name.clone()),
        arguments: filter(parameters.clone(), &usage.parameters)
            .into_iter()
            .map(|parameter| Expression::identifier(parameter.name))
            .collect(),
    });

    let targets: Vec<Identifier> = filter(return_variables.clone(), &usage.returns)
        .into_iter()
        .map(|variable| Identifier::new(variable.name))
        .collect();

    let statement = if targets.is_empty() {
        Statement::Expression(call)
    } else {
        Statement::Assignment(Assignment {
            variable_names: targets,
            value: call,
        })
    };

    FunctionDefinition {
        name: function.name.clone(),
        parameters,
        return_variables,
        body: Block::new(vec![statement]),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case(
        "{ { sstore(0, f(1, 2)) } function f(a, b) -> x { x := add(a, 7) } }",
        "{ { sstore(0, f_1(1, 2)) } function f(a) -> x { x := add(a, 7) } function f_1(a_2, b_3) -> x_4 { x_4 := f(a_2) } }",
    )]
    #[case(
        "{ { let y, z := g(3) sstore(y, z) } function g(a) -> r, s { r := mul(a, 3) } }",
        "{ { let y, z := g_1(3) sstore(y, z) } function g(a) -> r { r := mul(a, 3) } function g_1(a_2) -> r_3, s_4 { r_3 := g(a_2) } }",
    )]
    #[case(
        "{ { k(1) } function k(a) { sstore(0, 1) sstore(1, 2) } }",
        "{ { k_1(1) } function k() { sstore(0, 1) sstore(1, 2) } function k_1(a_2) { k() } }",
    )]
    #[case(
        "{ { sstore(0, h(1)) } function h(a) -> r { r := 1 } }",
        "{ { sstore(0, h(1)) } function h(a) -> r { r := 1 } }",
    )]
    #[case(
        "{ { sstore(0, f(1, 2)) } function f(a, b) -> x { x := add(a, b) } }",
        "{ { sstore(0, f(1, 2)) } function f(a, b) -> x { x := add(a, b) } }",
    )]
    fn prunes_unused_parameters(#[case] input: &str, #[case] expected: &str) {
        assert_step::<UnusedFunctionParameterPruner>(input, expected);
    }
}
