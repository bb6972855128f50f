// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use yul::{
    visit::{walk_block_mut, walk_function_call_mut, walk_function_definition_mut, VisitorMut},
    Assignment, Block, FunctionCall, FunctionDefinition, Identifier, Statement, VariableDeclaration, YulString,
};

use super::NameDispenser;

/// Renames the declarations of a set of names (and all references to them)
/// to fresh names, so that the original names become available again.
pub struct NameDisplacer<'a> {
    dispenser: &'a mut NameDispenser,
    names_to_free: &'a BTreeSet<YulString>,
    translations: BTreeMap<YulString, YulString>,
}

impl<'a> NameDisplacer<'a> {
    pub fn new(dispenser: &'a mut NameDispenser, names_to_free: &'a BTreeSet<YulString>) -> Self {
        for name in names_to_free {
            dispenser.mark_used(name.clone());
        }

        Self {
            dispenser,
            names_to_free,
            translations: BTreeMap::new(),
        }
    }

    /// Maps each freed name to the name that replaced it.
    #[must_use]
    pub fn into_translations(self) -> BTreeMap<YulString, YulString> {
        self.translations
    }

    fn displace_declaration(&mut self, name: &mut YulString) {
        if self.names_to_free.contains(name) {
            let new_name = self.dispenser.new_name(name);
            self.translations.insert(name.clone(), new_name.clone());
            *name = new_name;
        }
    }

    fn translate(&self, name: &mut YulString) {
        if let Some(new_name) = self.translations.get(name) {
            *name = new_name.clone();
        }
    }
}

impl VisitorMut for NameDisplacer<'_> {
    fn visit_block(&mut self, block: &mut Block) {
        // Functions can be called before their definition.
        for statement in &mut block.statements {
            if let Statement::FunctionDefinition(function) = statement {
                self.displace_declaration(&mut function.name);
            }
        }
        walk_block_mut(self, block);
    }

    fn visit_identifier(&mut self, identifier: &mut Identifier) {
        self.translate(&mut identifier.name);
    }

    fn visit_function_call(&mut self, call: &mut FunctionCall) {
        self.translate(&mut call.function_name.name);
        walk_function_call_mut(self, call);
    }

    fn visit_assignment(&mut self, assignment: &mut Assignment) {
        for variable in &mut assignment.variable_names {
            self.translate(&mut variable.name);
        }
        self.visit_expression(&mut assignment.value);
    }

    fn visit_variable_declaration(&mut self, declaration: &mut VariableDeclaration) {
        if let Some(value) = &mut declaration.value {
            self.visit_expression(value);
        }
        for variable in &mut declaration.variables {
            self.displace_declaration(&mut variable.name);
        }
    }

    fn visit_function_definition(&mut self, function: &mut FunctionDefinition) {
        for variable in function.parameters.iter_mut().chain(&mut function.return_variables) {
            self.displace_declaration(&mut variable.name);
        }
        walk_function_definition_mut(self, function);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use yul::{parse, EvmDialect};

    use super::*;

    #[test]
    fn frees_function_names() {
        let mut block = parse("{ pop(f(1)) function f(a) -> r { r := a } }").unwrap();
        let mut dispenser = NameDispenser::for_ast(&EvmDialect::new(), &block, &BTreeSet::new());
        let names_to_free = BTreeSet::from([YulString::from("f")]);

        let mut displacer = NameDisplacer::new(&mut dispenser, &names_to_free);
        displacer.visit_block(&mut block);
        let translations = displacer.into_translations();

        assert_eq!(translations.get("f").map(YulString::as_str), Some("f_1"));
        assert_eq!(block, parse("{ pop(f_1(1)) function f_1(a) -> r { r := a } }").unwrap());
    }
}
