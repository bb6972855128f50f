// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use yul::{
    visit::{iterate_replacing, walk_statement, Visitor, VisitorMut},
    Assignment, Block, Dialect, Expression, FunctionCall, FunctionDefinition, Identifier, Statement, TypedName,
    VariableDeclaration, YulString,
};

use crate::{
    analysis::{CallGraph, CodeSize},
    names::{NameCollector, ReferencesCounter, Renamer},
    AstInvariant, FullInlinerSettings, NameDispenser, OptimiserStep, OptimiserStepContext,
};

/// Inlines whole function bodies at call sites that are statements of their
/// own: `let x := f(...)`, `x := f(...)` or `f(...)`.
///
/// Functions are processed callees first, so the body that gets inlined
/// already contains everything that was inlined into it. Code that was just
/// inlined is not looked at again in the same run.
#[derive(Debug, Default)]
pub struct FullInliner;

impl OptimiserStep for FullInliner {
    const NAME: &'static str = "FullInliner";
    const ABBREVIATION: char = 'i';
    const REQUIRES: &'static [AstInvariant] = &[
        AstInvariant::Disambiguated,
        AstInvariant::FunctionsHoisted,
        AstInvariant::FunctionsGrouped,
    ];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let graph = CallGraph::of(ast);
        let recursive = graph.recursive_functions();
        let references = ReferencesCounter::count_block(ast);

        let functions: BTreeMap<YulString, FunctionDefinition> = ast.statements.iter()
            .filter_map(Statement::as_function_definition)
            .map(|function| (function.name.clone(), function.clone()))
            .collect();

        let candidates: BTreeSet<YulString> = functions.values()
            .filter(|function| !recursive.contains(&function.name) && !LeaveFinder::contains_leave(&function.body))
            .map(|function| function.name.clone())
            .collect();

        let single_use = candidates.iter()
            .filter(|name| references.get(*name) == Some(&1))
            .cloned()
            .collect();

        let mut inliner = Inliner {
            dialect: ctx.dialect,
            dispenser: &mut *ctx.dispenser,
            settings: &ctx.settings.full_inliner,
            functions,
            candidates,
            single_use,
        };

        for name in graph.strongly_connected_components().into_iter().flatten() {
            let Some(function) = ast.statements.iter_mut().find_map(|statement| match statement {
                Statement::FunctionDefinition(function) if function.name == name => Some(function),
                _ => None,
            }) else {
                continue;
            };

            inliner.inline_into(&mut function.body);
            inliner.functions.insert(name, function.clone());
        }

        for statement in &mut ast.statements {
            if let Statement::Block(code) = statement {
                inliner.inline_into(code);
            }
        }
    }
}

struct Inliner<'a> {
    dialect: &'a dyn Dialect,
    dispenser: &'a mut NameDispenser,
    settings: &'a FullInlinerSettings,

    /// The current version of every function.
    functions: BTreeMap<YulString, FunctionDefinition>,
    candidates: BTreeSet<YulString>,
    single_use: BTreeSet<YulString>,
}

/// Where the results of an inlined call go.
enum Targets {
    Discard,
    Declare(Vec<TypedName>),
    Assign(Vec<Identifier>),
}

impl Inliner<'_> {
    fn inline_into(&mut self, body: &mut Block) {
        let mut caller_size = CodeSize::of_block(body);
        self.inline_block(&mut caller_size, body);
    }

    fn inline_block(&mut self, caller_size: &mut usize, block: &mut Block) {
        iterate_replacing(&mut block.statements, |statement| {
            match statement {
                Statement::If(statement) => self.inline_block(caller_size, &mut statement.body),
                Statement::Switch(switch) => {
                    for case in &mut switch.cases {
                        self.inline_block(caller_size, &mut case.body);
                    }
                }
                Statement::ForLoop(for_loop) => {
                    self.inline_block(caller_size, &mut for_loop.pre);
                    self.inline_block(caller_size, &mut for_loop.body);
                    self.inline_block(caller_size, &mut for_loop.post);
                }
                Statement::Block(block) => self.inline_block(caller_size, block),
                _ => return self.try_inline(caller_size, statement),
            }
            None
        });
    }

    fn try_inline(&mut self, caller_size: &mut usize, statement: &mut Statement) -> Option<Vec<Statement>> {
        let call = match statement {
            Statement::Expression(Expression::FunctionCall(call)) => call,
            Statement::VariableDeclaration(VariableDeclaration { value: Some(Expression::FunctionCall(call)), .. }) => call,
            Statement::Assignment(Assignment { value: Expression::FunctionCall(call), .. }) => call,
            _ => return None,
        };

        let function = self.functions.get(&call.function_name.name)?;
        if !self.should_inline(function, call, *caller_size) {
            return None;
        }

        let function = function.clone();
        debug!("Inlining {} ({} units)", function.name, CodeSize::of_block(&function.body));
        *caller_size += CodeSize::of_block(&function.body);

        let (call, targets) = match std::mem::replace(statement, Statement::Break) {
            Statement::Expression(Expression::FunctionCall(call)) => (call, Targets::Discard),
            Statement::VariableDeclaration(VariableDeclaration { variables, value: Some(Expression::FunctionCall(call)) }) => {
                (call, Targets::Declare(variables))
            }
            Statement::Assignment(Assignment { variable_names, value: Expression::FunctionCall(call) }) => {
                (call, Targets::Assign(variable_names))
            }
            _ => unreachable!("the statement was matched as a call site above"),
        };

        Some(self.inline_call(&function, call, targets))
    }

    fn should_inline(&self, function: &FunctionDefinition, call: &FunctionCall, caller_size: usize) -> bool {
        if !self.candidates.contains(&function.name) {
            return false;
        }

        let size = CodeSize::of_block(&function.body);
        if size <= self.settings.tiny_function_size {
            return true;
        }

        if caller_size > self.settings.max_caller_size {
            return false;
        }

        if self.single_use.contains(&function.name) {
            return true;
        }

        let constant_argument = call.arguments.iter().any(|argument| argument.as_literal().is_some());
        let threshold = if constant_argument {
            2 * self.settings.inline_threshold
        } else {
            self.settings.inline_threshold
        };
        size < threshold
    }

    fn inline_call(&mut self, function: &FunctionDefinition, call: FunctionCall, targets: Targets) -> Vec<Statement> {
        let mut translations = BTreeMap::new();
        let mut statements = Vec::new();

        for (parameter, argument) in function.parameters.iter().zip(call.arguments).rev() {
            let name = self.dispenser.new_name(&parameter.name);
            translations.insert(parameter.name.clone(), name.clone());
            statements.push(Statement::VariableDeclaration(VariableDeclaration::single(name, argument)));
        }

        let mut return_variables = Vec::new();
        for variable in &function.return_variables {
            let name = self.dispenser.new_name(&variable.name);
            translations.insert(variable.name.clone(), name.clone());
            statements.push(Statement::VariableDeclaration(VariableDeclaration::single(
                name.clone(),
                Expression::Literal(self.dialect.zero_literal()),
            )));
            return_variables.push(name);
        }

        for local in NameCollector::declared_names(&function.body) {
            let name = self.dispenser.new_name(&local);
            translations.insert(local, name);
        }

        let mut body = function.body.clone();
        Renamer::new(&translations).visit_block(&mut body);
        statements.push(Statement::Block(body));

        match targets {
            Targets::Discard => (),
            Targets::Declare(variables) => {
                for (variable, value) in variables.into_iter().zip(return_variables) {
                    statements.push(Statement::VariableDeclaration(VariableDeclaration {
                        variables: vec![variable],
                        value: Some(Expression::identifier(value)),
                    }));
                }
            }
            Targets::Assign(variables) => {
                for (variable, value) in variables.into_iter().zip(return_variables) {
                    statements.push(Statement::Assignment(Assignment {
                        variable_names: vec![variable],
                        value: Expression::identifier(value),
                    }));
                }
            }
        }

        statements
    }
}

#[derive(Default)]
struct LeaveFinder {
    found: bool,
}

impl LeaveFinder {
    fn contains_leave(block: &Block) -> bool {
        let mut finder = Self::default();
        finder.visit_block(block);
        finder.found
    }
}

impl<'ast> Visitor<'ast> for LeaveFinder {
    fn visit_statement(&mut self, statement: &'ast Statement) {
        if matches!(statement, Statement::Leave) {
            self.found = true;
        }
        walk_statement(self, statement);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use pretty_assertions::assert_eq;
    use yul::parse;

    use crate::{steps::testing::{assert_step, run_step_with}, OptimiserSettings};

    use super::*;

    #[rstest]
    #[case(
        "{ { let x := f(calldataload(0)) sstore(0, x) } function f(a) -> r { r := add(a, 1) } }",
        "{ { let a_1 := calldataload(0) let r_2 := 0 { r_2 := add(a_1, 1) } let x := r_2 sstore(0, x) } function f(a) -> r { r := add(a, 1) } }",
    )]
    #[case(
        "{ { let x := f(1) sstore(0, x) } function f(a) -> r { if a { r := f(sub(a, 1)) } } }",
        "{ { let x := f(1) sstore(0, x) } function f(a) -> r { if a { r := f(sub(a, 1)) } } }",
    )]
    #[case(
        "{ { let x := f(1) sstore(0, x) } function f(a) -> r { r := a leave } }",
        "{ { let x := f(1) sstore(0, x) } function f(a) -> r { r := a leave } }",
    )]
    #[case(
        "{ { g(1) g(2) } function g(a) { sstore(a, 0) } }",
        "{ { let a_1 := 1 { sstore(a_1, 0) } let a_2 := 2 { sstore(a_2, 0) } } function g(a) { sstore(a, 0) } }",
    )]
    #[case(
        "{ { let x, y x, y := f() sstore(x, y) } function f() -> a, b { a := 1 b := 2 } }",
        "{ { let x, y let a_1 := 0 let b_2 := 0 { a_1 := 1 b_2 := 2 } x := a_1 y := b_2 sstore(x, y) } function f() -> a, b { a := 1 b := 2 } }",
    )]
    #[case(
        "{ { sstore(0, f(1)) } function f(a) -> r { r := add(a, 1) } }",
        "{ { sstore(0, f(1)) } function f(a) -> r { r := add(a, 1) } }",
    )]
    fn inlines_call_sites(#[case] input: &str, #[case] expected: &str) {
        assert_step::<FullInliner>(input, expected);
    }

    #[test]
    fn inlines_callees_first() {
        assert_step::<FullInliner>(
            "{
                { let z := f(7) sstore(0, z) }
                function f(a) -> r { let t := g(a) r := mul(t, 2) }
                function g(b) -> s { s := add(b, 1) }
            }",
            "{
                {
                    let a_3 := 7
                    let r_4 := 0
                    { let b_1_5 := a_3 let s_2_6 := 0 { s_2_6 := add(b_1_5, 1) } let t_7 := s_2_6 r_4 := mul(t_7, 2) }
                    let z := r_4
                    sstore(0, z)
                }
                function f(a) -> r { let b_1 := a let s_2 := 0 { s_2 := add(b_1, 1) } let t := s_2 r := mul(t, 2) }
                function g(b) -> s { s := add(b, 1) }
            }",
        );
    }

    #[test]
    fn respects_the_caller_size_limit() {
        let mut settings = OptimiserSettings::default();
        settings.full_inliner.max_caller_size = 0;

        let source = "{ { g(1) g(2) } function g(a) { sstore(a, 0) } }";
        let ast = run_step_with::<FullInliner>(source, &settings, None);
        assert_eq!(ast.to_string(), parse(source).unwrap().to_string());
    }
}
