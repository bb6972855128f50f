// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use yul::{Dialect, EvmInstruction, Expression, YulString, U256};

use super::AssignedValue;

/// A value written as `base + offset` (modulo 2^256), where a missing base
/// stands for zero.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LinearForm {
    base: Option<YulString>,
    offset: U256,
}

/// Answers questions about the relation between variables, based on the
/// values the data-flow analysis knows for them.
pub struct KnowledgeBase<'a> {
    dialect: &'a dyn Dialect,
    values: &'a BTreeMap<YulString, AssignedValue>,
}

impl<'a> KnowledgeBase<'a> {
    #[must_use]
    pub fn new(dialect: &'a dyn Dialect, values: &'a BTreeMap<YulString, AssignedValue>) -> Self {
        Self { dialect, values }
    }

    #[must_use]
    pub fn known_to_be_different(&self, a: &YulString, b: &YulString) -> bool {
        let (a, b) = (self.explore_variable(a), self.explore_variable(b));
        a.base == b.base && a.offset != b.offset
    }

    /// Returns whether the two values are at least 32 apart in both
    /// directions, so two words stored at them do not overlap.
    #[must_use]
    pub fn known_to_be_different_by_at_least_32(&self, a: &YulString, b: &YulString) -> bool {
        let (a, b) = (self.explore_variable(a), self.explore_variable(b));
        if a.base != b.base {
            return false;
        }

        let word = U256::from(32);
        a.offset.overflowing_sub(b.offset).0 >= word && b.offset.overflowing_sub(a.offset).0 >= word
    }

    #[must_use]
    pub fn known_to_be_equal(&self, a: &YulString, b: &YulString) -> bool {
        a == b || self.explore_variable(a) == self.explore_variable(b)
    }

    /// Returns `a - b` (modulo 2^256) if both are offsets of the same value.
    #[must_use]
    pub fn difference(&self, a: &Expression, b: &Expression) -> Option<U256> {
        let (a, b) = (self.explore(a)?, self.explore(b)?);
        (a.base == b.base).then(|| a.offset.overflowing_sub(b.offset).0)
    }

    #[must_use]
    pub fn value_if_known_constant(&self, expression: &Expression) -> Option<U256> {
        let form = self.explore(expression)?;
        form.base.is_none().then_some(form.offset)
    }

    fn explore_variable(&self, name: &YulString) -> LinearForm {
        self.values.get(name)
            .and_then(|assigned| self.explore(&assigned.value))
            .unwrap_or_else(|| LinearForm { base: Some(name.clone()), offset: U256::zero() })
    }

    fn explore(&self, expression: &Expression) -> Option<LinearForm> {
        match expression {
            Expression::Literal(literal) => Some(LinearForm { base: None, offset: literal.value()? }),
            Expression::Identifier(identifier) => Some(self.explore_variable(&identifier.name)),
            Expression::FunctionCall(call) => {
                let instruction = self.dialect.builtin(&call.function_name.name)?.instruction?;
                let [lhs, rhs] = call.arguments.as_slice() else {
                    return None;
                };

                match instruction {
                    EvmInstruction::Add => {
                        let (lhs, rhs) = (self.explore(lhs)?, self.explore(rhs)?);
                        match (&lhs.base, &rhs.base) {
                            (_, None) => Some(LinearForm { base: lhs.base, offset: lhs.offset.overflowing_add(rhs.offset).0 }),
                            (None, _) => Some(LinearForm { base: rhs.base, offset: lhs.offset.overflowing_add(rhs.offset).0 }),
                            _ => None,
                        }
                    }
                    EvmInstruction::Sub => {
                        let (lhs, rhs) = (self.explore(lhs)?, self.explore(rhs)?);
                        if rhs.base.is_some() {
                            return None;
                        }
                        Some(LinearForm { base: lhs.base, offset: lhs.offset.overflowing_sub(rhs.offset).0 })
                    }
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use yul::{parse, BuiltinFunction, ControlFlowSideEffects, EvmDialect, SideEffects};

    use super::*;

    fn values(source: &str) -> BTreeMap<YulString, AssignedValue> {
        parse(source).unwrap().statements.into_iter()
            .filter_map(|statement| match statement {
                yul::Statement::VariableDeclaration(mut declaration) => {
                    let name = declaration.variables.remove(0).name;
                    Some((name, AssignedValue { value: declaration.value?, loop_depth: 0 }))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn relates_offsets_of_the_same_base() {
        let values = values("{ let a := add(p, 32) let b := sub(a, 1) let c := add(1, b) let d := 7 let e := 0x27 }");
        let dialect = EvmDialect::new();
        let knowledge = KnowledgeBase::new(&dialect, &values);
        let name = |n: &str| YulString::from(n);

        assert!(knowledge.known_to_be_different(&name("a"), &name("b")));
        assert!(!knowledge.known_to_be_different(&name("a"), &name("c")));
        assert!(knowledge.known_to_be_equal(&name("a"), &name("c")));
        assert!(knowledge.known_to_be_different_by_at_least_32(&name("p"), &name("a")));
        assert!(!knowledge.known_to_be_different_by_at_least_32(&name("p"), &name("b")));
        assert!(knowledge.known_to_be_different_by_at_least_32(&name("d"), &name("e")));
        assert!(!knowledge.known_to_be_different(&name("p"), &name("q")));
    }

    #[test]
    fn finds_constants() {
        let values = values("{ let a := 7 let b := add(a, 3) }");
        let dialect = EvmDialect::new();
        let knowledge = KnowledgeBase::new(&dialect, &values);

        assert_eq!(knowledge.value_if_known_constant(&Expression::identifier("b")), Some(U256::from(10)));
        assert_eq!(knowledge.value_if_known_constant(&Expression::identifier("z")), None);
    }

    #[test]
    fn differences_need_a_common_base() {
        let values = values("{ let a := add(p, 64) let b := sub(a, 96) }");
        let dialect = EvmDialect::new();
        let knowledge = KnowledgeBase::new(&dialect, &values);
        let (a, b, p) = (Expression::identifier("a"), Expression::identifier("b"), Expression::identifier("p"));

        assert_eq!(knowledge.difference(&a, &p), Some(U256::from(64)));
        assert_eq!(knowledge.difference(&p, &b), Some(U256::from(32)));
        assert_eq!(knowledge.difference(&Expression::number(40u64), &Expression::number(8u64)), Some(U256::from(32)));
        assert_eq!(knowledge.difference(&a, &Expression::number(64u64)), None);
    }

    /// A dialect that calls its addition something else.
    #[derive(Debug)]
    struct RenamedAddition {
        builtins: Vec<BuiltinFunction>,
    }

    impl RenamedAddition {
        fn new() -> Self {
            let plus = BuiltinFunction {
                name: YulString::from("plus"),
                parameters: 2,
                returns: 1,
                side_effects: SideEffects::NONE,
                control_flow_side_effects: ControlFlowSideEffects::CONTINUES,
                instruction: Some(EvmInstruction::Add),
            };
            Self { builtins: vec![plus] }
        }
    }

    impl Dialect for RenamedAddition {
        fn builtin(&self, name: &str) -> Option<&BuiltinFunction> {
            self.builtins.iter().find(|builtin| builtin.name.as_str() == name)
        }

        fn builtins(&self) -> &[BuiltinFunction] {
            &self.builtins
        }

        fn discard_function(&self) -> Option<&BuiltinFunction> {
            None
        }

        fn equality_function(&self) -> Option<&BuiltinFunction> {
            None
        }

        fn boolean_negation_function(&self) -> Option<&BuiltinFunction> {
            None
        }

        fn memory_store_function(&self) -> Option<&BuiltinFunction> {
            None
        }

        fn memory_load_function(&self) -> Option<&BuiltinFunction> {
            None
        }

        fn storage_store_function(&self) -> Option<&BuiltinFunction> {
            None
        }

        fn storage_load_function(&self) -> Option<&BuiltinFunction> {
            None
        }
    }

    #[test]
    fn arithmetic_is_recognised_through_the_dialect() {
        let values = values("{ let a := plus(p, 32) let b := add(p, 32) }");
        let dialect = RenamedAddition::new();
        let knowledge = KnowledgeBase::new(&dialect, &values);
        let name = |n: &str| YulString::from(n);

        assert!(knowledge.known_to_be_different_by_at_least_32(&name("p"), &name("a")));
        assert!(!knowledge.known_to_be_equal(&name("a"), &name("b")));
        assert!(!knowledge.known_to_be_different(&name("p"), &name("b")));
    }
}
