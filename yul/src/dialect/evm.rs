// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{BuiltinFunction, ControlFlowSideEffects, Dialect, SideEffects, YulString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum EvmInstruction {
    Stop,
    Add,
    Mul,
    Sub,
    Div,
    Sdiv,
    Mod,
    Smod,
    Addmod,
    Mulmod,
    Exp,
    Signextend,
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    Iszero,
    And,
    Or,
    Xor,
    Not,
    Byte,
    Shl,
    Shr,
    Sar,
    Keccak256,
    Address,
    Balance,
    Origin,
    Caller,
    Callvalue,
    Calldataload,
    Calldatasize,
    Calldatacopy,
    Codesize,
    Codecopy,
    Gasprice,
    Extcodesize,
    Extcodecopy,
    Returndatasize,
    Returndatacopy,
    Extcodehash,
    Blockhash,
    Coinbase,
    Timestamp,
    Number,
    Prevrandao,
    Gaslimit,
    Chainid,
    Selfbalance,
    Basefee,
    Pop,
    Mload,
    Mstore,
    Mstore8,
    Sload,
    Sstore,
    Tload,
    Tstore,
    Mcopy,
    Msize,
    Gas,
    Log0,
    Log1,
    Log2,
    Log3,
    Log4,
    Create,
    Call,
    Callcode,
    Return,
    Delegatecall,
    Create2,
    Staticcall,
    Revert,
    Invalid,
    Selfdestruct,
}

impl EvmInstruction {
    /// Returns the number of arguments and return values.
    #[must_use]
    pub const fn signature(&self) -> (usize, usize) {
        use EvmInstruction::*;
        match self {
            Stop | Invalid => (0, 0),

            Add | Mul | Sub | Div | Sdiv | Mod | Smod | Exp | Signextend | Lt | Gt | Slt | Sgt | Eq
                | And | Or | Xor | Byte | Shl | Shr | Sar | Keccak256 => (2, 1),

            Addmod | Mulmod => (3, 1),

            Iszero | Not | Balance | Calldataload | Extcodesize | Extcodehash | Blockhash | Mload
                | Sload | Tload => (1, 1),

            Address | Origin | Caller | Callvalue | Calldatasize | Codesize | Gasprice | Returndatasize
                | Coinbase | Timestamp | Number | Prevrandao | Gaslimit | Chainid | Selfbalance | Basefee
                | Msize | Gas => (0, 1),

            Calldatacopy | Codecopy | Returndatacopy | Mcopy => (3, 0),
            Extcodecopy => (4, 0),

            Pop | Selfdestruct => (1, 0),
            Mstore | Mstore8 | Sstore | Tstore | Return | Revert => (2, 0),

            Log0 => (2, 0),
            Log1 => (3, 0),
            Log2 => (4, 0),
            Log3 => (5, 0),
            Log4 => (6, 0),

            Create => (3, 1),
            Create2 => (4, 1),
            Call | Callcode => (7, 1),
            Delegatecall | Staticcall => (6, 1),
        }
    }

    #[must_use]
    pub const fn side_effects(&self) -> SideEffects {
        use EvmInstruction::*;
        match self {
            Add | Mul | Sub | Div | Sdiv | Mod | Smod | Addmod | Mulmod | Exp | Signextend | Lt | Gt
                | Slt | Sgt | Eq | Iszero | And | Or | Xor | Not | Byte | Shl | Shr | Sar | Pop => SideEffects::NONE,

            Address | Origin | Caller | Callvalue | Calldataload | Calldatasize | Codesize | Gasprice
                | Blockhash | Coinbase | Timestamp | Number | Prevrandao | Gaslimit | Chainid
                | Basefee => SideEffects::NONE,

            Balance | Selfbalance | Extcodesize | Extcodehash | Returndatasize | Sload | Tload | Msize
                | Gas => SideEffects::READS_STATE,

            Keccak256 | Mload => SideEffects::READS_MEMORY,

            Calldatacopy | Codecopy | Extcodecopy | Returndatacopy | Mcopy | Mstore | Mstore8 => SideEffects::WRITES_MEMORY,

            Sstore | Tstore => SideEffects::WRITES_STORAGE,

            Stop | Return | Revert | Invalid | Log0 | Log1 | Log2 | Log3 | Log4 => SideEffects::EFFECTFUL,

            Create | Create2 | Call | Callcode | Delegatecall | Staticcall | Selfdestruct => SideEffects::WORST,
        }
    }

    #[must_use]
    pub const fn control_flow_side_effects(&self) -> ControlFlowSideEffects {
        use EvmInstruction::*;
        match self {
            Stop | Return | Selfdestruct => ControlFlowSideEffects::TERMINATES,
            Revert | Invalid => ControlFlowSideEffects::REVERTS,
            _ => ControlFlowSideEffects::CONTINUES,
        }
    }
}

/// The EVM dialect: every opcode that is not a stack or jump manipulation is
/// available as a builtin function.
#[derive(Debug, Clone)]
pub struct EvmDialect {
    builtins: Vec<BuiltinFunction>,
    by_name: BTreeMap<YulString, usize>,
}

impl EvmDialect {
    #[must_use]
    pub fn new() -> Self {
        let builtins: Vec<_> = EvmInstruction::iter()
            .map(|instruction| {
                let (parameters, returns) = instruction.signature();
                BuiltinFunction {
                    name: YulString::new_static(instruction.into()),
                    parameters,
                    returns,
                    side_effects: instruction.side_effects(),
                    control_flow_side_effects: instruction.control_flow_side_effects(),
                    instruction: Some(instruction),
                }
            })
            .collect();

        let by_name = builtins.iter()
            .enumerate()
            .map(|(idx, builtin)| (builtin.name.clone(), idx))
            .collect();

        Self {
            builtins,
            by_name,
        }
    }

    fn instruction(&self, instruction: EvmInstruction) -> Option<&BuiltinFunction> {
        self.builtin(instruction.as_ref())
    }
}

impl Default for EvmDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for EvmDialect {
    fn builtin(&self, name: &str) -> Option<&BuiltinFunction> {
        self.by_name.get(name).map(|idx| &self.builtins[*idx])
    }

    fn builtins(&self) -> &[BuiltinFunction] {
        &self.builtins
    }

    fn discard_function(&self) -> Option<&BuiltinFunction> {
        self.instruction(EvmInstruction::Pop)
    }

    fn equality_function(&self) -> Option<&BuiltinFunction> {
        self.instruction(EvmInstruction::Eq)
    }

    fn boolean_negation_function(&self) -> Option<&BuiltinFunction> {
        self.instruction(EvmInstruction::Iszero)
    }

    fn memory_store_function(&self) -> Option<&BuiltinFunction> {
        self.instruction(EvmInstruction::Mstore)
    }

    fn memory_load_function(&self) -> Option<&BuiltinFunction> {
        self.instruction(EvmInstruction::Mload)
    }

    fn storage_store_function(&self) -> Option<&BuiltinFunction> {
        self.instruction(EvmInstruction::Sstore)
    }

    fn storage_load_function(&self) -> Option<&BuiltinFunction> {
        self.instruction(EvmInstruction::Sload)
    }
}
