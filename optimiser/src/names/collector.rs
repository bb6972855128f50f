// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use yul::{
    visit::{walk_assignment, walk_function_call, walk_function_definition, walk_variable_declaration, Visitor},
    Assignment, Block, Expression, FunctionCall, FunctionDefinition, Identifier, Statement, VariableDeclaration,
    YulString,
};

/// Collects the names of every declared variable, parameter, return
/// variable and function.
#[derive(Debug, Default)]
pub struct NameCollector {
    names: BTreeSet<YulString>,
}

impl NameCollector {
    #[must_use]
    pub fn declared_names(block: &Block) -> BTreeSet<YulString> {
        let mut collector = Self::default();
        collector.visit_block(block);
        collector.names
    }
}

impl<'ast> Visitor<'ast> for NameCollector {
    fn visit_variable_declaration(&mut self, declaration: &'ast VariableDeclaration) {
        self.names.extend(declaration.variables.iter().map(|variable| variable.name.clone()));
        walk_variable_declaration(self, declaration);
    }

    fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
        self.names.insert(function.name.clone());
        self.names.extend(function.parameters.iter().map(|variable| variable.name.clone()));
        self.names.extend(function.return_variables.iter().map(|variable| variable.name.clone()));
        walk_function_definition(self, function);
    }
}

/// Counts how often every name is referenced: variables read, variables
/// assigned to and functions called.
#[derive(Debug, Default)]
pub struct ReferencesCounter {
    references: BTreeMap<YulString, usize>,
}

impl ReferencesCounter {
    #[must_use]
    pub fn count_block(block: &Block) -> BTreeMap<YulString, usize> {
        let mut counter = Self::default();
        counter.visit_block(block);
        counter.references
    }

    #[must_use]
    pub fn count_statement(statement: &Statement) -> BTreeMap<YulString, usize> {
        let mut counter = Self::default();
        counter.visit_statement(statement);
        counter.references
    }

    #[must_use]
    pub fn count_expression(expression: &Expression) -> BTreeMap<YulString, usize> {
        let mut counter = Self::default();
        counter.visit_expression(expression);
        counter.references
    }

    fn add(&mut self, name: &YulString) {
        *self.references.entry(name.clone()).or_default() += 1;
    }
}

impl<'ast> Visitor<'ast> for ReferencesCounter {
    fn visit_identifier(&mut self, identifier: &'ast Identifier) {
        self.add(&identifier.name);
    }

    fn visit_function_call(&mut self, call: &'ast FunctionCall) {
        self.add(&call.function_name.name);
        walk_function_call(self, call);
    }

    fn visit_assignment(&mut self, assignment: &'ast Assignment) {
        for variable in &assignment.variable_names {
            self.add(&variable.name);
        }
        walk_assignment(self, assignment);
    }
}

/// Collects the variables that are the target of an assignment.
#[derive(Debug, Default)]
pub struct Assignments {
    names: BTreeSet<YulString>,
}

impl Assignments {
    #[must_use]
    pub fn in_block(block: &Block) -> BTreeSet<YulString> {
        let mut assignments = Self::default();
        assignments.visit_block(block);
        assignments.names
    }

    #[must_use]
    pub fn in_statement(statement: &Statement) -> BTreeSet<YulString> {
        let mut assignments = Self::default();
        assignments.visit_statement(statement);
        assignments.names
    }
}

impl<'ast> Visitor<'ast> for Assignments {
    fn visit_assignment(&mut self, assignment: &'ast Assignment) {
        self.names.extend(assignment.variable_names.iter().map(|variable| variable.name.clone()));
    }
}

/// Returns the variables that are assigned exactly once, at their
/// declaration or as a parameter, together with the value they were
/// declared with (if any).
#[must_use]
pub fn ssa_variables(block: &Block) -> BTreeMap<YulString, Option<Expression>> {
    #[derive(Default)]
    struct Tracker {
        values: BTreeMap<YulString, Option<Expression>>,
    }

    impl<'ast> Visitor<'ast> for Tracker {
        fn visit_variable_declaration(&mut self, declaration: &'ast VariableDeclaration) {
            let value = match (&declaration.value, declaration.variables.len()) {
                (Some(value), 1) => Some(value.clone()),
                _ => None,
            };

            for variable in &declaration.variables {
                self.values.insert(variable.name.clone(), value.clone());
            }
            walk_variable_declaration(self, declaration);
        }

        fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
            for parameter in &function.parameters {
                self.values.insert(parameter.name.clone(), None);
            }
            walk_function_definition(self, function);
        }
    }

    let mut tracker = Tracker::default();
    tracker.visit_block(block);

    for assigned in Assignments::in_block(block) {
        tracker.values.remove(&assigned);
    }

    tracker.values
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use yul::parse;

    use super::*;

    fn names(set: &BTreeSet<YulString>) -> Vec<&str> {
        set.iter().map(|name| name.as_str()).collect()
    }

    #[test]
    fn collects_declarations() {
        let block = parse("{ let a, b function f(c) -> d { let e } }").unwrap();
        assert_eq!(names(&NameCollector::declared_names(&block)), vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn counts_reads_writes_and_calls() {
        let block = parse("{ let x := 1 x := add(x, x) f() f() function f() { } }").unwrap();
        let references = ReferencesCounter::count_block(&block);

        assert_eq!(references.get("x"), Some(&3));
        assert_eq!(references.get("f"), Some(&2));
        assert_eq!(references.get("add"), Some(&1));
    }

    #[test]
    fn finds_assigned_variables() {
        let block = parse("{ let x let y if 1 { y := 2 } }").unwrap();
        assert_eq!(names(&Assignments::in_block(&block)), vec!["y"]);
    }

    #[test]
    fn ssa_variables_exclude_reassigned_ones() {
        let block = parse("{ let x := 1 let y := 2 y := 3 function f(a, b) { b := a } }").unwrap();
        let variables = ssa_variables(&block);

        assert_eq!(variables.keys().map(|name| name.as_str()).collect::<Vec<_>>(), vec!["a", "x"]);
        assert_eq!(variables["x"], Some(Expression::number(1u64)));
    }
}
