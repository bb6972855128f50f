// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

mod arithmetic;
mod evm;

use std::fmt::Debug;

use primitive_types::U256;

use crate::{ControlFlowSideEffects, Literal, SideEffects, YulString};

pub use self::{
    arithmetic::evaluate_pure,
    evm::{EvmDialect, EvmInstruction},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinFunction {
    pub name: YulString,
    pub parameters: usize,
    pub returns: usize,
    pub side_effects: SideEffects,
    pub control_flow_side_effects: ControlFlowSideEffects,
    pub instruction: Option<EvmInstruction>,
}

impl BuiltinFunction {
    #[must_use]
    pub fn is_msize(&self) -> bool {
        self.instruction == Some(EvmInstruction::Msize)
    }
}

/// Describes the builtin operations of a target, their signatures and their
/// side effects.
pub trait Dialect: Debug {
    fn builtin(&self, name: &str) -> Option<&BuiltinFunction>;

    /// All builtins, in a stable order.
    fn builtins(&self) -> &[BuiltinFunction];

    #[must_use]
    fn is_builtin(&self, name: &str) -> bool {
        self.builtin(name).is_some()
    }

    #[must_use]
    fn zero_literal(&self) -> Literal {
        Literal::number(U256::zero())
    }

    #[must_use]
    fn true_literal(&self) -> Literal {
        Literal::boolean(true)
    }

    #[must_use]
    fn false_literal(&self) -> Literal {
        Literal::boolean(false)
    }

    /// Evaluates its argument and drops the result.
    fn discard_function(&self) -> Option<&BuiltinFunction>;

    fn equality_function(&self) -> Option<&BuiltinFunction>;

    fn boolean_negation_function(&self) -> Option<&BuiltinFunction>;

    fn memory_store_function(&self) -> Option<&BuiltinFunction>;

    fn memory_load_function(&self) -> Option<&BuiltinFunction>;

    fn storage_store_function(&self) -> Option<&BuiltinFunction>;

    fn storage_load_function(&self) -> Option<&BuiltinFunction>;
}
