// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use yul::{FunctionDefinition, YulString, U256};

/// The variables and functions of a block, linked to the scope of the
/// enclosing block or caller.
#[derive(Default, Debug)]
pub struct Scope<'ast> {
    pub parent: Option<Box<Scope<'ast>>>,
    pub variables: BTreeMap<YulString, U256>,
    pub functions: BTreeMap<YulString, &'ast FunctionDefinition>,

    /// Variables of the parents are invisible from here on, functions are
    /// not.
    pub is_function_boundary: bool,
}

impl<'ast> Scope<'ast> {
    pub fn push(self) -> Self {
        Self {
            parent: Some(Box::new(self)),
            ..Default::default()
        }
    }

    pub fn push_function(self) -> Self {
        Self {
            parent: Some(Box::new(self)),
            is_function_boundary: true,
            ..Default::default()
        }
    }

    pub fn pop(self) -> Self {
        *self.parent.expect("top-level scope popped")
    }

    pub fn find_variable(&self, name: &str) -> Option<U256> {
        if let Some(value) = self.variables.get(name) {
            return Some(*value);
        }

        if self.is_function_boundary {
            return None;
        }

        self.parent.as_ref()?.find_variable(name)
    }

    pub fn find_variable_mut(&mut self, name: &str) -> Option<&mut U256> {
        if self.variables.contains_key(name) {
            return self.variables.get_mut(name);
        }

        if self.is_function_boundary {
            return None;
        }

        self.parent.as_mut()?.find_variable_mut(name)
    }

    pub fn find_function(&self, name: &str) -> Option<&'ast FunctionDefinition> {
        if let Some(function) = self.functions.get(name) {
            return Some(*function);
        }

        self.parent.as_ref()?.find_function(name)
    }
}
