// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use yul::{
    visit::{walk_function_call_mut, VisitorMut},
    AnalysisInfo, Analyzer, Assignment, Block, Dialect, ForLoop, FunctionCall, FunctionDefinition, Identifier,
    ScopeId, Statement, VariableDeclaration, YulString,
};

use super::NameDispenser;

/// Renames every declaration to a name that is unique in the whole program.
/// Builtins and reserved identifiers keep their names.
///
/// Scopes are entered in the same order as the [`Analyzer`] entered them, so
/// the n-th scope entered here is the n-th scope of the analysis.
pub struct Disambiguator<'a> {
    dialect: &'a dyn Dialect,
    info: &'a AnalysisInfo,
    reserved: &'a BTreeSet<YulString>,
    dispenser: NameDispenser,
    translations: BTreeMap<(ScopeId, YulString), YulString>,
    scopes_entered: usize,
    current: Option<ScopeId>,
}

impl<'a> Disambiguator<'a> {
    /// Analyzes and disambiguates `ast`. The program must be valid.
    pub fn run(dialect: &dyn Dialect, ast: &mut Block, reserved: &BTreeSet<YulString>) {
        let info = match Analyzer::analyze(dialect, ast) {
            Ok(info) => info,
            Err(errors) => panic!("cannot disambiguate an invalid program: {errors:?}"),
        };

        let mut disambiguator = Disambiguator::new(dialect, &info, reserved);
        disambiguator.visit_block(ast);
        debug!("Disambiguated {} declarations", disambiguator.translations.len());
    }

    #[must_use]
    pub fn new(dialect: &'a dyn Dialect, info: &'a AnalysisInfo, reserved: &'a BTreeSet<YulString>) -> Self {
        Self {
            dialect,
            info,
            reserved,
            dispenser: NameDispenser::new(dialect, reserved.clone()),
            translations: BTreeMap::new(),
            scopes_entered: 0,
            current: None,
        }
    }

    fn current_scope(&self) -> ScopeId {
        self.current.expect("disambiguation should be inside a scope")
    }

    fn enter_scope(&mut self) {
        let id = ScopeId::new(self.scopes_entered);
        self.scopes_entered += 1;
        debug_assert_eq!(self.info.scopes.scope(id).parent, self.current);
        self.current = Some(id);
    }

    fn leave_scope(&mut self) {
        self.current = self.info.scopes.scope(self.current_scope()).parent;
    }

    fn declare(&mut self, name: &mut YulString) {
        let new_name = if self.reserved.contains(name) {
            name.clone()
        } else {
            self.dispenser.new_name(name)
        };

        self.translations.insert((self.current_scope(), name.clone()), new_name.clone());
        *name = new_name;
    }

    fn resolve(&self, name: &mut YulString) {
        let Some((scope, _)) = self.info.scopes.lookup(self.current_scope(), name) else {
            panic!("reference to `{name}` does not resolve to a declaration");
        };

        match self.translations.get(&(scope, name.clone())) {
            Some(new_name) => *name = new_name.clone(),
            None => panic!("reference to `{name}` precedes its declaration"),
        }
    }
}

impl VisitorMut for Disambiguator<'_> {
    fn visit_block(&mut self, block: &mut Block) {
        self.enter_scope();

        for statement in &mut block.statements {
            if let Statement::FunctionDefinition(function) = statement {
                self.declare(&mut function.name);
            }
        }

        for statement in &mut block.statements {
            self.visit_statement(statement);
        }

        self.leave_scope();
    }

    fn visit_identifier(&mut self, identifier: &mut Identifier) {
        self.resolve(&mut identifier.name);
    }

    fn visit_function_call(&mut self, call: &mut FunctionCall) {
        walk_function_call_mut(self, call);
        if !self.dialect.is_builtin(&call.function_name.name) {
            self.resolve(&mut call.function_name.name);
        }
    }

    fn visit_assignment(&mut self, assignment: &mut Assignment) {
        self.visit_expression(&mut assignment.value);
        for variable in &mut assignment.variable_names {
            self.resolve(&mut variable.name);
        }
    }

    fn visit_variable_declaration(&mut self, declaration: &mut VariableDeclaration) {
        if let Some(value) = &mut declaration.value {
            self.visit_expression(value);
        }
        for variable in &mut declaration.variables {
            self.declare(&mut variable.name);
        }
    }

    fn visit_function_definition(&mut self, function: &mut FunctionDefinition) {
        self.enter_scope();
        for variable in function.parameters.iter_mut().chain(&mut function.return_variables) {
            self.declare(&mut variable.name);
        }
        self.visit_block(&mut function.body);
        self.leave_scope();
    }

    fn visit_for_loop(&mut self, for_loop: &mut ForLoop) {
        self.enter_scope();
        for statement in &mut for_loop.pre.statements {
            self.visit_statement(statement);
        }
        self.visit_expression(&mut for_loop.condition);
        self.visit_block(&mut for_loop.body);
        self.visit_block(&mut for_loop.post);
        self.leave_scope();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use yul::{parse, EvmDialect};

    use super::*;

    fn disambiguate(source: &str, reserved: &[&str]) -> String {
        let mut block = parse(source).unwrap();
        let reserved = reserved.iter().map(|name| YulString::from(*name)).collect();
        Disambiguator::run(&EvmDialect::new(), &mut block, &reserved);
        block.to_string()
    }

    #[rstest]
    #[case(
        "{ { let a := 1 } { let a := 2 pop(a) } }",
        "{\n    {\n        let a := 1\n    }\n    {\n        let a_1 := 2\n        pop(a_1)\n    }\n}",
    )]
    #[case(
        "{ { function f(x) -> y { y := x } } { function f(x) { pop(x) } } }",
        "{\n    {\n        function f(x) -> y {\n            y := x\n        }\n    }\n    {\n        function f_1(x_2) {\n            pop(x_2)\n        }\n    }\n}",
    )]
    #[case(
        "{ for { let i := 0 } lt(i, 2) { i := add(i, 1) } { let i_1 := i } { let i := 5 } }",
        "{\n    for {\n        let i := 0\n    } lt(i, 2) {\n        i := add(i, 1)\n    } {\n        let i_1 := i\n    }\n    {\n        let i_2 := 5\n    }\n}",
    )]
    fn renames_shadowing_declarations(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(disambiguate(input, &[]), expected);
    }

    #[test]
    fn keeps_reserved_names() {
        let output = disambiguate("{ { let x } { let x function keep() { } keep() } }", &["x", "keep"]);
        assert_eq!(output, "{\n    {\n        let x\n    }\n    {\n        let x\n        function keep() { }\n        keep()\n    }\n}");
    }
}
