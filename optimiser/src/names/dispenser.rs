// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{collections::BTreeSet, str::FromStr};

use yul::{Block, Dialect, Keyword, YulString};

use super::NameCollector;

/// Hands out fresh names that do not collide with names in the program,
/// names it issued before, builtins, keywords or reserved identifiers.
///
/// The sequence of issued names only depends on the sequence of calls, so
/// the output of the optimiser is reproducible.
#[derive(Debug, Clone)]
pub struct NameDispenser {
    used: BTreeSet<YulString>,
    builtins: BTreeSet<YulString>,
    counter: usize,
}

impl NameDispenser {
    #[must_use]
    pub fn new(dialect: &dyn Dialect, used: BTreeSet<YulString>) -> Self {
        Self {
            used,
            builtins: dialect.builtins().iter().map(|builtin| builtin.name.clone()).collect(),
            counter: 0,
        }
    }

    /// Creates a dispenser that avoids every name declared in `ast` as well
    /// as the `reserved` identifiers.
    #[must_use]
    pub fn for_ast(dialect: &dyn Dialect, ast: &Block, reserved: &BTreeSet<YulString>) -> Self {
        let mut used = NameCollector::declared_names(ast);
        used.extend(reserved.iter().cloned());
        Self::new(dialect, used)
    }

    /// Returns `hint` itself if it is still available, otherwise `hint_N`
    /// for the next free `N`.
    pub fn new_name(&mut self, hint: &str) -> YulString {
        let mut name = YulString::from(hint);
        while self.is_illegal(&name) {
            self.counter += 1;
            name = YulString::from(format!("{hint}_{}", self.counter));
        }

        self.used.insert(name.clone());
        name
    }

    /// Reserves a name without issuing it.
    pub fn mark_used(&mut self, name: YulString) {
        self.used.insert(name);
    }

    #[must_use]
    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    fn is_illegal(&self, name: &str) -> bool {
        name.is_empty()
            || self.used.contains(name)
            || self.builtins.contains(name)
            || Keyword::from_str(name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use yul::EvmDialect;

    use super::*;

    fn dispenser(used: &[&str]) -> NameDispenser {
        NameDispenser::new(&EvmDialect::new(), used.iter().map(|name| YulString::from(*name)).collect())
    }

    #[test]
    fn keeps_available_hints() {
        assert_eq!(dispenser(&[]).new_name("x"), "x");
    }

    #[test]
    fn appends_a_counter_to_used_names() {
        let mut dispenser = dispenser(&["x", "x_1"]);
        assert_eq!(dispenser.new_name("x"), "x_2");
        assert_eq!(dispenser.new_name("x"), "x_3");
        assert_eq!(dispenser.new_name("y"), "y");
        assert_eq!(dispenser.new_name("y"), "y_4");
    }

    #[test]
    fn avoids_builtins_keywords_and_empty_names() {
        let mut dispenser = dispenser(&[]);
        assert_eq!(dispenser.new_name("add"), "add_1");
        assert_eq!(dispenser.new_name("let"), "let_2");
        assert_eq!(dispenser.new_name(""), "_3");
    }

    #[test]
    fn marked_names_are_avoided() {
        let mut dispenser = dispenser(&[]);
        dispenser.mark_used(YulString::from("z"));
        assert!(dispenser.is_used("z"));
        assert_eq!(dispenser.new_name("z"), "z_1");
    }
}
