// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use log::{debug, trace};
use sha3::Digest;
use yul::{
    evaluate_pure, Block, BuiltinFunction, Dialect, EvmInstruction, Expression, ForLoop, FunctionCall, Literal,
    Statement, U256,
};

use crate::{ExecutionState, InterpreterError, Scope, TraceEntry};

/// How execution of a program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `stop()`, `selfdestruct(..)` or the end of the program was reached.
    Stopped,
    Returned,
    Reverted,
    Invalid,
    StepLimitReached,
    CallDepthExceeded,
}

/// Everything that can be observed from the outside after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub termination: Termination,
    pub trace: Vec<TraceEntry>,
    pub storage: BTreeMap<U256, U256>,
    pub return_data: Vec<u8>,
}

/// Executes programs of the EVM dialect with a bounded number of steps.
/// Calls to other contracts and contract creation are not supported.
pub struct Interpreter<'a> {
    dialect: &'a dyn Dialect,
    calldata: Vec<u8>,
    step_limit: usize,
    max_call_depth: usize,
}

impl<'a> Interpreter<'a> {
    #[must_use]
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            calldata: Vec::new(),
            step_limit: 100_000,
            max_call_depth: 64,
        }
    }

    #[must_use]
    pub fn with_calldata(self, calldata: impl Into<Vec<u8>>) -> Self {
        Self {
            calldata: calldata.into(),
            ..self
        }
    }

    #[must_use]
    pub fn with_step_limit(self, step_limit: usize) -> Self {
        Self {
            step_limit,
            ..self
        }
    }

    #[must_use]
    pub fn with_max_call_depth(self, max_call_depth: usize) -> Self {
        Self {
            max_call_depth,
            ..self
        }
    }

    pub fn run(&self, ast: &Block) -> Result<ExecutionResult, InterpreterError> {
        let mut execution = Execution {
            dialect: self.dialect,
            scope: Scope::default(),
            state: ExecutionState::new(self.calldata.clone()),
            steps: 0,
            step_limit: self.step_limit,
            call_depth: 0,
            max_call_depth: self.max_call_depth,
        };

        let termination = match execution.execute_block(ast) {
            Ok(..) => Termination::Stopped,
            Err(Interrupt::Halt(termination)) => termination,
            Err(Interrupt::Error(error)) => return Err(error),
        };

        debug!("Execution ended with {termination:?} after {} steps", execution.steps);

        if matches!(termination, Termination::Reverted | Termination::Invalid) {
            execution.state.storage.clear();
        }

        Ok(ExecutionResult {
            termination,
            trace: execution.state.trace,
            storage: execution.state.storage,
            return_data: execution.state.return_data,
        })
    }
}

/// Why evaluation stopped early.
enum Interrupt {
    Halt(Termination),
    Error(InterpreterError),
}

impl From<InterpreterError> for Interrupt {
    fn from(value: InterpreterError) -> Self {
        Self::Error(value)
    }
}

type Outcome<T> = Result<T, Interrupt>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Leave,
}

struct Execution<'a> {
    dialect: &'a dyn Dialect,
    scope: Scope<'a>,
    state: ExecutionState,
    steps: usize,
    step_limit: usize,
    call_depth: usize,
    max_call_depth: usize,
}

impl<'a> Execution<'a> {
    fn count_step(&mut self) -> Outcome<()> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(Interrupt::Halt(Termination::StepLimitReached));
        }
        Ok(())
    }

    fn execute_block(&mut self, block: &'a Block) -> Outcome<Flow> {
        self.scope = std::mem::take(&mut self.scope).push();
        for function in block.statements.iter().filter_map(Statement::as_function_definition) {
            self.scope.functions.insert(function.name.clone(), function);
        }

        let flow = self.execute_statements(&block.statements)?;
        self.scope = std::mem::take(&mut self.scope).pop();
        Ok(flow)
    }

    fn execute_statements(&mut self, statements: &'a [Statement]) -> Outcome<Flow> {
        for statement in statements {
            let flow = self.execute_statement(statement)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_statement(&mut self, statement: &'a Statement) -> Outcome<Flow> {
        self.count_step()?;

        match statement {
            Statement::Expression(expression) => {
                self.evaluate(expression)?;
            }

            Statement::VariableDeclaration(declaration) => {
                let values = match &declaration.value {
                    Some(value) => self.evaluate_values(value, declaration.variables.len())?,
                    None => vec![U256::zero(); declaration.variables.len()],
                };

                for (variable, value) in declaration.variables.iter().zip(values) {
                    self.scope.variables.insert(variable.name.clone(), value);
                }
            }

            Statement::Assignment(assignment) => {
                let values = self.evaluate_values(&assignment.value, assignment.variable_names.len())?;
                for (variable, value) in assignment.variable_names.iter().zip(values) {
                    let Some(slot) = self.scope.find_variable_mut(&variable.name) else {
                        return Err(InterpreterError::UndeclaredVariable { name: variable.name.clone() }.into());
                    };
                    *slot = value;
                }
            }

            Statement::FunctionDefinition(..) => (),

            Statement::If(statement) => {
                if !self.evaluate_single(&statement.condition)?.is_zero() {
                    return self.execute_block(&statement.body);
                }
            }

            Statement::Switch(switch) => {
                let value = self.evaluate_single(&switch.expression)?;
                let case = switch.cases.iter()
                    .find(|case| case.value.as_ref().and_then(Literal::value) == Some(value))
                    .or_else(|| switch.default_case());

                if let Some(case) = case {
                    return self.execute_block(&case.body);
                }
            }

            Statement::ForLoop(for_loop) => {
                self.scope = std::mem::take(&mut self.scope).push();
                let flow = self.execute_for_loop(for_loop)?;
                self.scope = std::mem::take(&mut self.scope).pop();
                return Ok(flow);
            }

            Statement::Break => return Ok(Flow::Break),
            Statement::Continue => return Ok(Flow::Continue),
            Statement::Leave => return Ok(Flow::Leave),

            Statement::Block(block) => return self.execute_block(block),
        }

        Ok(Flow::Normal)
    }

    /// Runs a loop inside the scope that holds the variables of its pre
    /// block.
    fn execute_for_loop(&mut self, for_loop: &'a ForLoop) -> Outcome<Flow> {
        let flow = self.execute_statements(&for_loop.pre.statements)?;
        if flow != Flow::Normal {
            return Ok(flow);
        }

        loop {
            self.count_step()?;
            if self.evaluate_single(&for_loop.condition)?.is_zero() {
                break;
            }

            match self.execute_block(&for_loop.body)? {
                Flow::Break => break,
                Flow::Leave => return Ok(Flow::Leave),
                Flow::Normal | Flow::Continue => (),
            }

            let flow = self.execute_block(&for_loop.post)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }

        Ok(Flow::Normal)
    }

    fn evaluate_single(&mut self, expression: &'a Expression) -> Outcome<U256> {
        let values = self.evaluate_values(expression, 1)?;
        Ok(values[0])
    }

    fn evaluate_values(&mut self, expression: &'a Expression, expected: usize) -> Outcome<Vec<U256>> {
        let values = self.evaluate(expression)?;
        if values.len() != expected {
            return Err(InterpreterError::ValueCountMismatch { expected, actual: values.len() }.into());
        }
        Ok(values)
    }

    fn evaluate(&mut self, expression: &'a Expression) -> Outcome<Vec<U256>> {
        match expression {
            Expression::Literal(literal) => {
                let Some(value) = literal.value() else {
                    return Err(InterpreterError::InvalidLiteral { literal: literal.to_string() }.into());
                };
                Ok(vec![value])
            }

            Expression::Identifier(identifier) => {
                match self.scope.find_variable(&identifier.name) {
                    Some(value) => Ok(vec![value]),
                    None => Err(InterpreterError::UndeclaredVariable { name: identifier.name.clone() }.into()),
                }
            }

            Expression::FunctionCall(call) => self.evaluate_call(call),
        }
    }

    fn evaluate_call(&mut self, call: &'a FunctionCall) -> Outcome<Vec<U256>> {
        // Arguments are evaluated right to left.
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in call.arguments.iter().rev() {
            arguments.push(self.evaluate_single(argument)?);
        }
        arguments.reverse();

        let name = &call.function_name.name;
        if let Some(builtin) = self.dialect.builtin(name) {
            return self.call_builtin(builtin, &arguments);
        }

        let Some(function) = self.scope.find_function(name) else {
            return Err(InterpreterError::UndeclaredFunction { name: name.clone() }.into());
        };

        if self.call_depth >= self.max_call_depth {
            return Err(Interrupt::Halt(Termination::CallDepthExceeded));
        }

        self.call_depth += 1;
        self.scope = std::mem::take(&mut self.scope).push_function();

        for (parameter, value) in function.parameters.iter().zip(arguments) {
            self.scope.variables.insert(parameter.name.clone(), value);
        }
        for variable in &function.return_variables {
            self.scope.variables.insert(variable.name.clone(), U256::zero());
        }

        self.execute_block(&function.body)?;

        let returns = function.return_variables.iter()
            .map(|variable| self.scope.variables[&variable.name])
            .collect();

        self.scope = std::mem::take(&mut self.scope).pop();
        self.call_depth -= 1;
        Ok(returns)
    }

    fn call_builtin(&mut self, builtin: &BuiltinFunction, arguments: &[U256]) -> Outcome<Vec<U256>> {
        use EvmInstruction::*;

        let Some(instruction) = builtin.instruction else {
            return Err(InterpreterError::UnsupportedBuiltin { name: builtin.name.clone() }.into());
        };

        if let Some(value) = evaluate_pure(instruction, arguments) {
            return Ok(vec![value]);
        }

        trace!("Calling {} with {arguments:?}", builtin.name);

        let value = match (instruction, arguments) {
            (Keccak256, [offset, size]) => {
                let data = self.state.read_memory(*offset, *size)?;
                U256::from_big_endian(&sha3::Keccak256::digest(&data))
            }

            (Calldataload, [offset]) => U256::from_big_endian(&self.state.read_calldata(*offset, 32)),
            (Calldatasize, []) => U256::from(self.state.calldata.len()),
            (Msize, []) => U256::from(self.state.memory_size()),
            (Mload, [offset]) => self.state.load_word(*offset)?,

            (Sload, [key]) => self.state.storage.get(key).copied().unwrap_or_default(),
            (Tload, [key]) => self.state.transient_storage.get(key).copied().unwrap_or_default(),

            (Balance | Extcodesize | Extcodehash | Blockhash, [_]) => U256::zero(),
            (_, []) if instruction.signature() == (0, 1) => environment_value(instruction),

            (Pop, [_]) => return Ok(Vec::new()),

            _ => {
                self.execute_effect(instruction, arguments)?;
                return Ok(Vec::new());
            }
        };

        Ok(vec![value])
    }

    /// Executes a builtin that returns nothing, recording it in the trace.
    fn execute_effect(&mut self, instruction: EvmInstruction, arguments: &[U256]) -> Outcome<()> {
        use EvmInstruction::*;

        match (instruction, arguments) {
            (Create | Create2 | Call | Callcode | Delegatecall | Staticcall, _) => {
                let name: &'static str = instruction.into();
                return Err(InterpreterError::UnsupportedBuiltin { name: name.into() }.into());
            }
            _ => (),
        }

        self.state.record(instruction, arguments);

        match (instruction, arguments) {
            (Mstore, [offset, value]) => self.state.store_word(*offset, *value)?,
            (Mstore8, [offset, value]) => self.state.write_memory(*offset, &[value.byte(0)])?,

            (Mcopy, [destination, source, size]) => {
                let data = self.state.read_memory(*source, *size)?;
                self.state.write_memory(*destination, &data)?;
            }

            (Calldatacopy, [destination, offset, size]) => {
                let len = self.checked_size(*destination, *size)?;
                let data = self.state.read_calldata(*offset, len);
                self.state.write_memory(*destination, &data)?;
            }

            (Codecopy, [destination, _, size]) | (Extcodecopy, [_, destination, _, size]) => {
                let data = vec![0; self.checked_size(*destination, *size)?];
                self.state.write_memory(*destination, &data)?;
            }

            (Returndatacopy, [_, offset, size]) => {
                if !offset.is_zero() || !size.is_zero() {
                    return Err(Interrupt::Halt(Termination::Invalid));
                }
            }

            (Sstore, [key, value]) => store(&mut self.state.storage, *key, *value),
            (Tstore, [key, value]) => store(&mut self.state.transient_storage, *key, *value),

            (Log0 | Log1 | Log2 | Log3 | Log4, [offset, size, ..]) => {
                self.state.read_memory(*offset, *size)?;
            }

            (Return, [offset, size]) => {
                self.state.return_data = self.state.read_memory(*offset, *size)?;
                return Err(Interrupt::Halt(Termination::Returned));
            }

            (Revert, [offset, size]) => {
                self.state.return_data = self.state.read_memory(*offset, *size)?;
                return Err(Interrupt::Halt(Termination::Reverted));
            }

            (Stop, []) | (Selfdestruct, [_]) => return Err(Interrupt::Halt(Termination::Stopped)),
            (Invalid, []) => return Err(Interrupt::Halt(Termination::Invalid)),

            _ => {
                return Err(InterpreterError::ValueCountMismatch {
                    expected: instruction.signature().0,
                    actual: arguments.len(),
                }.into());
            }
        }

        Ok(())
    }

    /// Converts the size of a copy to memory, refusing sizes that could
    /// never fit.
    fn checked_size(&mut self, destination: U256, size: U256) -> Outcome<usize> {
        self.state.read_memory(destination, size)?;
        Ok(size.as_usize())
    }
}

fn store(storage: &mut BTreeMap<U256, U256>, key: U256, value: U256) {
    if value.is_zero() {
        storage.remove(&key);
    } else {
        storage.insert(key, value);
    }
}

/// The fixed values of the environment the program runs in.
fn environment_value(instruction: EvmInstruction) -> U256 {
    use EvmInstruction::*;

    match instruction {
        Address => U256::from(0xc0ffee),
        Caller | Origin => U256::from(0xca11e4),
        Chainid | Number | Timestamp => U256::one(),
        Gas | Gaslimit => U256::from(30_000_000),
        _ => U256::zero(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use yul::{parse, EvmDialect};

    use super::*;

    fn run(source: &str) -> ExecutionResult {
        let dialect = EvmDialect::new();
        let ast = parse(source).expect("test program should parse");
        Interpreter::new(&dialect).with_calldata(vec![0; 4]).run(&ast).expect("test program should run")
    }

    fn storage(result: &ExecutionResult) -> Vec<(u64, u64)> {
        result.storage.iter().map(|(key, value)| (key.as_u64(), value.as_u64())).collect()
    }

    #[rstest]
    #[case("{ sstore(1, add(2, 3)) }", vec![(1, 5)])]
    #[case("{ let x := 3 x := mul(x, x) sstore(0, x) }", vec![(0, 9)])]
    #[case("{ for { let i := 0 } lt(i, 5) { i := add(i, 1) } { if eq(i, 3) { break } sstore(i, 7) } }", vec![(0, 7), (1, 7), (2, 7)])]
    #[case("{ for { let i := 0 } lt(i, 4) { i := add(i, 1) } { if mod(i, 2) { continue } sstore(i, 1) } }", vec![(0, 1), (2, 1)])]
    #[case("{ switch calldatasize() case 4 { sstore(1, 1) } default { sstore(2, 2) } }", vec![(1, 1)])]
    #[case("{ switch 9 case 4 { sstore(1, 1) } default { sstore(2, 2) } }", vec![(2, 2)])]
    #[case("{ function f(a, b) -> r { r := sub(a, b) if r { leave } r := 100 } sstore(f(3, 1), f(1, 1)) }", vec![(2, 100)])]
    #[case("{ let a, b := g() sstore(a, b) function g() -> x, y { x := 4 y := 5 } }", vec![(4, 5)])]
    #[case("{ mstore(0, 0x2a) sstore(msize(), mload(0)) }", vec![(32, 42)])]
    #[case("{ sstore(1, 1) sstore(1, 0) }", vec![])]
    fn executes_statements(#[case] source: &str, #[case] expected: Vec<(u64, u64)>) {
        let result = run(source);
        assert_eq!(result.termination, Termination::Stopped);
        assert_eq!(storage(&result), expected);
    }

    #[test]
    fn evaluates_arguments_right_to_left() {
        let result = run("{ function f(x) -> r { sstore(x, 1) r := x } pop(add(f(1), f(2))) }");
        let keys: Vec<u64> = result.trace.iter().map(|entry| entry.arguments[0].as_u64()).collect();
        assert_eq!(keys, vec![2, 1]);
    }

    #[test]
    fn returns_memory() {
        let result = run("{ mstore(0, 0xff) return(31, 1) sstore(0, 1) }");
        assert_eq!(result.termination, Termination::Returned);
        assert_eq!(result.return_data, vec![0xff]);
        assert!(result.storage.is_empty());
    }

    #[test]
    fn revert_discards_storage() {
        let result = run("{ sstore(0, 1) revert(0, 0) }");
        assert_eq!(result.termination, Termination::Reverted);
        assert!(result.storage.is_empty());
        assert_eq!(result.trace.iter().map(ToString::to_string).collect::<Vec<_>>(), vec!["sstore(0x0, 0x1)", "revert(0x0, 0x0)"]);
    }

    #[test]
    fn hashes_memory() {
        let result = run("{ sstore(0, keccak256(0, 0)) }");
        let expected = U256::from_str_radix("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470", 16).unwrap();
        assert_eq!(result.storage.get(&U256::zero()), Some(&expected));
    }

    #[test]
    fn stops_endless_loops() {
        let result = run("{ for { } 1 { } { } }");
        assert_eq!(result.termination, Termination::StepLimitReached);
    }

    #[test]
    fn limits_call_depth() {
        let result = run("{ function f(x) { f(add(x, 1)) } f(0) }");
        assert_eq!(result.termination, Termination::CallDepthExceeded);
    }

    #[test]
    fn rejects_external_calls() {
        let dialect = EvmDialect::new();
        let ast = parse("{ pop(call(0, 0, 0, 0, 0, 0, 0)) }").unwrap();
        assert_eq!(
            Interpreter::new(&dialect).run(&ast),
            Err(InterpreterError::UnsupportedBuiltin { name: "call".into() }),
        );
    }
}
