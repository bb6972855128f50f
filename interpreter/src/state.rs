// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{collections::BTreeMap, fmt::Display, ops::Range};

use yul::{EvmInstruction, U256};

use crate::InterpreterError;

/// Memory accesses beyond this many bytes are refused.
const MEMORY_LIMIT: usize = 1 << 24;

/// A call to a builtin that changes state or ends execution, with its
/// evaluated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub instruction: EvmInstruction,
    pub arguments: Vec<U256>,
}

impl Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &'static str = self.instruction.into();
        write!(f, "{name}(")?;
        for (idx, argument) in self.arguments.iter().enumerate() {
            if idx != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{argument:#x}")?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    pub memory: Vec<u8>,
    pub storage: BTreeMap<U256, U256>,
    pub transient_storage: BTreeMap<U256, U256>,
    pub calldata: Vec<u8>,
    pub return_data: Vec<u8>,
    pub trace: Vec<TraceEntry>,
}

impl ExecutionState {
    #[must_use]
    pub fn new(calldata: Vec<u8>) -> Self {
        Self {
            calldata,
            ..Default::default()
        }
    }

    pub fn record(&mut self, instruction: EvmInstruction, arguments: &[U256]) {
        self.trace.push(TraceEntry {
            instruction,
            arguments: arguments.to_vec(),
        });
    }

    /// Reads `size` bytes, growing memory to cover them.
    pub fn read_memory(&mut self, offset: U256, size: U256) -> Result<Vec<u8>, InterpreterError> {
        match self.expand_memory(offset, size)? {
            Some(range) => Ok(self.memory[range].to_vec()),
            None => Ok(Vec::new()),
        }
    }

    pub fn write_memory(&mut self, offset: U256, data: &[u8]) -> Result<(), InterpreterError> {
        if let Some(range) = self.expand_memory(offset, U256::from(data.len()))? {
            self.memory[range].copy_from_slice(data);
        }
        Ok(())
    }

    pub fn load_word(&mut self, offset: U256) -> Result<U256, InterpreterError> {
        let bytes = self.read_memory(offset, U256::from(32))?;
        Ok(U256::from_big_endian(&bytes))
    }

    pub fn store_word(&mut self, offset: U256, value: U256) -> Result<(), InterpreterError> {
        let mut bytes = [0; 32];
        value.to_big_endian(&mut bytes);
        self.write_memory(offset, &bytes)
    }

    /// Reads `size` bytes of calldata, padded with zeros past its end.
    #[must_use]
    pub fn read_calldata(&self, offset: U256, size: usize) -> Vec<u8> {
        let mut bytes = vec![0; size];
        if offset < U256::from(self.calldata.len()) {
            let available = &self.calldata[offset.as_usize()..];
            let length = available.len().min(size);
            bytes[..length].copy_from_slice(&available[..length]);
        }
        bytes
    }

    /// The memory size in bytes, always a multiple of 32.
    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.memory.len()
    }

    fn expand_memory(&mut self, offset: U256, size: U256) -> Result<Option<Range<usize>>, InterpreterError> {
        if size.is_zero() {
            return Ok(None);
        }

        let limit = U256::from(MEMORY_LIMIT);
        if offset > limit || size > limit || offset + size > limit {
            return Err(InterpreterError::MemoryLimitExceeded { offset, size });
        }

        let range = offset.as_usize()..(offset + size).as_usize();
        let required = range.end.div_ceil(32) * 32;
        if required > self.memory.len() {
            self.memory.resize(required, 0);
        }

        Ok(Some(range))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn memory_grows_in_words() {
        let mut state = ExecutionState::default();
        state.write_memory(U256::from(33), &[1]).unwrap();

        assert_eq!(state.memory_size(), 64);
        assert_eq!(state.load_word(U256::from(2)).unwrap(), U256::one());
    }

    #[test]
    fn calldata_is_padded() {
        let state = ExecutionState::new(vec![0xab, 0xcd]);
        assert_eq!(state.read_calldata(U256::one(), 3), vec![0xcd, 0, 0]);
        assert_eq!(state.read_calldata(U256::from(5), 2), vec![0, 0]);
    }

    #[test]
    fn refuses_huge_accesses() {
        let mut state = ExecutionState::default();
        assert!(matches!(
            state.read_memory(U256::MAX, U256::one()),
            Err(InterpreterError::MemoryLimitExceeded { .. }),
        ));
    }
}
