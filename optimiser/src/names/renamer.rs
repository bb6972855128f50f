// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use yul::{
    visit::{walk_assignment_mut, walk_function_call_mut, walk_function_definition_mut, walk_variable_declaration_mut, VisitorMut},
    Assignment, Block, FunctionCall, FunctionDefinition, Identifier, VariableDeclaration, YulString,
};

/// Consistently renames declarations and all references to them.
#[derive(Debug)]
pub struct Renamer<'a> {
    translations: &'a BTreeMap<YulString, YulString>,
}

impl<'a> Renamer<'a> {
    #[must_use]
    pub fn new(translations: &'a BTreeMap<YulString, YulString>) -> Self {
        Self { translations }
    }

    pub fn rename(&self, name: &mut YulString) {
        if let Some(new_name) = self.translations.get(name) {
            *name = new_name.clone();
        }
    }
}

impl VisitorMut for Renamer<'_> {
    fn visit_identifier(&mut self, identifier: &mut Identifier) {
        self.rename(&mut identifier.name);
    }

    fn visit_function_call(&mut self, call: &mut FunctionCall) {
        self.rename(&mut call.function_name.name);
        walk_function_call_mut(self, call);
    }

    fn visit_assignment(&mut self, assignment: &mut Assignment) {
        for variable in &mut assignment.variable_names {
            self.rename(&mut variable.name);
        }
        walk_assignment_mut(self, assignment);
    }

    fn visit_variable_declaration(&mut self, declaration: &mut VariableDeclaration) {
        for variable in &mut declaration.variables {
            self.rename(&mut variable.name);
        }
        walk_variable_declaration_mut(self, declaration);
    }

    fn visit_function_definition(&mut self, function: &mut FunctionDefinition) {
        self.rename(&mut function.name);
        for variable in function.parameters.iter_mut().chain(&mut function.return_variables) {
            self.rename(&mut variable.name);
        }
        walk_function_definition_mut(self, function);
    }
}

/// Prints the program with every declared name replaced by a name derived
/// from its position in declaration order. Two programs that only differ in
/// the choice of names produce the same snapshot. The replacements are not
/// valid identifiers, so they never clash with names that are referenced but
/// not declared in `ast`.
#[must_use]
pub fn normalized_snapshot(ast: &Block) -> String {
    let mut order = Vec::new();
    collect_in_declaration_order(ast, &mut order);

    let translations: BTreeMap<YulString, YulString> = order.into_iter()
        .enumerate()
        .map(|(idx, name)| (name, YulString::from(format!("@{idx}"))))
        .collect();

    let mut ast = ast.clone();
    Renamer::new(&translations).visit_block(&mut ast);
    ast.to_string()
}

fn collect_in_declaration_order(ast: &Block, order: &mut Vec<YulString>) {
    use yul::visit::{walk_function_definition, walk_variable_declaration, Visitor};

    struct Collector<'a> {
        order: &'a mut Vec<YulString>,
    }

    impl<'ast> Visitor<'ast> for Collector<'_> {
        fn visit_variable_declaration(&mut self, declaration: &'ast VariableDeclaration) {
            self.order.extend(declaration.variables.iter().map(|variable| variable.name.clone()));
            walk_variable_declaration(self, declaration);
        }

        fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
            self.order.push(function.name.clone());
            self.order.extend(function.parameters.iter().map(|variable| variable.name.clone()));
            self.order.extend(function.return_variables.iter().map(|variable| variable.name.clone()));
            walk_function_definition(self, function);
        }
    }

    Collector { order }.visit_block(ast);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use yul::parse;

    use super::*;

    #[test]
    fn renames_declarations_and_references() {
        let mut block = parse("{ function f(a) -> b { b := a } let c := f(1) }").unwrap();
        let translations = [("f", "g"), ("a", "x"), ("b", "y")]
            .into_iter()
            .map(|(from, to)| (YulString::from(from), YulString::from(to)))
            .collect();

        Renamer::new(&translations).visit_block(&mut block);
        assert_eq!(block, parse("{ function g(x) -> y { y := x } let c := g(1) }").unwrap());
    }

    #[test]
    fn snapshots_ignore_the_choice_of_names() {
        let lhs = parse("{ let a := 1 function f(p) { pop(p) } }").unwrap();
        let rhs = parse("{ let b := 1 function g(q) { pop(q) } }").unwrap();
        assert_eq!(normalized_snapshot(&lhs), normalized_snapshot(&rhs));

        let different = parse("{ let b := 2 function g(q) { pop(q) } }").unwrap();
        assert_ne!(normalized_snapshot(&lhs), normalized_snapshot(&different));
    }
}
