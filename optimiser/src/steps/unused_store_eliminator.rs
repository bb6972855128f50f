// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use log::trace;
use yul::{
    visit::{iterate_replacing, walk_block, walk_expression, walk_function_call, walk_statement, walk_statement_mut, walk_variable_declaration, Visitor, VisitorMut},
    Block, BuiltinFunction, Dialect, EvmInstruction, Expression, ForLoop, FunctionCall, FunctionDefinition, Identifier, If,
    SideEffects, Statement, Switch, VariableDeclaration, YulString,
};

use crate::{
    analysis::{contains_msize, AssignedValue, KnowledgeBase},
    names::ssa_variables,
    AstInvariant, OptimiserStep, OptimiserStepContext,
};

/// Removes `sstore`, `mstore` and `mstore8` statements whose effect is never
/// observed: the location is overwritten before it is read, or execution
/// ends in a way that discards it. Memory stores are kept if the program
/// uses `msize`.
///
/// The arguments of a removable store have to be variables or literals, so
/// the step works best after the expression splitter.
#[derive(Debug, Default)]
pub struct UnusedStoreEliminator;

impl OptimiserStep for UnusedStoreEliminator {
    const NAME: &'static str = "UnusedStoreEliminator";
    const ABBREVIATION: char = 'S';
    const REQUIRES: &'static [AstInvariant] = &[AstInvariant::Disambiguated, AstInvariant::ForLoopInitRewritten];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let ssa = ssa_variables(ast);
        let values = ssa.iter()
            .filter_map(|(name, value)| {
                let value = value.as_ref()?;
                only_reads_ssa_variables(value, &ssa).then(|| (name.clone(), AssignedValue { value: value.clone(), loop_depth: 0 }))
            })
            .collect();

        let mut analysis = StoreAnalysis {
            dialect: ctx.dialect,
            ssa: ssa.into_keys().collect(),
            values,
            ignore_memory: contains_msize(ctx.dialect, ast),
            active: ActiveStores::new(),
            declared: BTreeSet::new(),
            pending_breaks: Vec::new(),
            pending_continues: Vec::new(),
            loop_depth: 0,
            next_id: 0,
            stores: BTreeSet::new(),
            used: BTreeSet::new(),
        };
        analysis.visit_block(ast);

        // Storage outlives the program, memory does not.
        let remaining: Vec<usize> = analysis.active.iter()
            .filter(|(_, operation)| operation.location == Location::Storage)
            .map(|(id, _)| *id)
            .collect();
        analysis.used.extend(remaining);

        let to_remove: BTreeSet<usize> = analysis.stores.difference(&analysis.used).copied().collect();
        trace!("Removing {} unused store(s)", to_remove.len());

        if !to_remove.is_empty() {
            StoreRemover { to_remove, next_id: 0 }.visit_block(ast);
        }
    }
}

fn only_reads_ssa_variables(expression: &Expression, ssa: &BTreeMap<YulString, Option<Expression>>) -> bool {
    struct Reads<'a> {
        ssa: &'a BTreeMap<YulString, Option<Expression>>,
        only_ssa: bool,
    }

    impl<'ast> Visitor<'ast> for Reads<'_> {
        fn visit_identifier(&mut self, identifier: &'ast Identifier) {
            self.only_ssa &= self.ssa.contains_key(&identifier.name);
        }
    }

    let mut reads = Reads { ssa, only_ssa: true };
    reads.visit_expression(expression);
    reads.only_ssa
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Storage,
    Memory,
}

/// A range of storage or memory. Missing bounds are unknown. Known bounds
/// are literals or variables that are assigned exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Operation {
    location: Location,
    start: Option<Expression>,
    length: Option<Expression>,
}

impl Operation {
    /// Keeps the bounds both operations agree on.
    fn meet(&mut self, other: &Operation) {
        if self.start != other.start {
            self.start = None;
        }
        if self.length != other.length {
            self.length = None;
        }
    }

    /// Drops the bounds that name one of `variables`.
    fn forget(&mut self, variables: &BTreeSet<YulString>) {
        for bound in [&mut self.start, &mut self.length] {
            if bound.as_ref().and_then(Expression::as_identifier).is_some_and(|name| variables.contains(name)) {
                *bound = None;
            }
        }
    }
}

/// What a builtin reads of storage and memory.
enum Access {
    Nothing,
    Everything,
    Range(Operation),
}

/// The stores whose effect may still be observed, with the range they wrote.
type ActiveStores = BTreeMap<usize, Operation>;

fn join(target: &mut ActiveStores, source: ActiveStores) {
    for (id, operation) in source {
        match target.entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(operation);
            }
            Entry::Occupied(mut entry) => entry.get_mut().meet(&operation),
        }
    }
}

/// Above this depth, loop bodies are analyzed once and every store in them
/// is considered used.
const MAX_LOOP_DEPTH_FOR_SECOND_RUN: usize = 6;

struct StoreAnalysis<'a> {
    dialect: &'a dyn Dialect,
    ssa: BTreeSet<YulString>,
    values: BTreeMap<YulString, AssignedValue>,
    ignore_memory: bool,

    active: ActiveStores,
    declared: BTreeSet<YulString>,
    pending_breaks: Vec<ActiveStores>,
    pending_continues: Vec<ActiveStores>,
    loop_depth: usize,

    /// Expression statements are numbered in visiting order.
    next_id: usize,
    stores: BTreeSet<usize>,
    used: BTreeSet<usize>,
}

impl StoreAnalysis<'_> {
    fn knowledge(&self) -> KnowledgeBase<'_> {
        KnowledgeBase::new(self.dialect, &self.values)
    }

    fn operand(&self, expression: Option<&Expression>) -> Option<Expression> {
        match expression? {
            Expression::Literal(..) => expression.cloned(),
            Expression::Identifier(identifier) if self.ssa.contains(&identifier.name) => expression.cloned(),
            _ => None,
        }
    }

    fn memory_range(&self, arguments: &[Expression], start: usize, length: usize) -> Access {
        Access::Range(Operation {
            location: Location::Memory,
            start: self.operand(arguments.get(start)),
            length: self.operand(arguments.get(length)),
        })
    }

    fn access(&self, builtin: &BuiltinFunction, arguments: &[Expression]) -> Access {
        use EvmInstruction::*;

        let Some(instruction) = builtin.instruction else {
            return if builtin.side_effects == SideEffects::NONE { Access::Nothing } else { Access::Everything };
        };

        match instruction {
            Sload => Access::Range(Operation {
                location: Location::Storage,
                start: self.operand(arguments.first()),
                length: None,
            }),
            Mload => Access::Range(Operation {
                location: Location::Memory,
                start: self.operand(arguments.first()),
                length: Some(Expression::number(32u64)),
            }),
            Keccak256 | Return | Revert | Log0 | Log1 | Log2 | Log3 | Log4 => self.memory_range(arguments, 0, 1),
            Mcopy => self.memory_range(arguments, 1, 2),
            Create | Create2 | Call | Callcode | Delegatecall | Staticcall | Selfdestruct => Access::Everything,
            _ => Access::Nothing,
        }
    }

    /// The range written by a store that may be removed.
    fn removable_store(&self, expression: &Expression) -> Option<Operation> {
        let Expression::FunctionCall(call) = expression else {
            return None;
        };

        let simple_arguments = call.arguments.iter()
            .all(|argument| matches!(argument, Expression::Identifier(..) | Expression::Literal(..)));
        if !simple_arguments {
            return None;
        }

        let (location, length) = match self.dialect.builtin(&call.function_name.name)?.instruction? {
            EvmInstruction::Sstore => (Location::Storage, None),
            EvmInstruction::Mstore => (Location::Memory, Some(Expression::number(32u64))),
            EvmInstruction::Mstore8 => (Location::Memory, Some(Expression::number(1u64))),
            _ => return None,
        };

        if location == Location::Memory && self.ignore_memory {
            return None;
        }

        Some(Operation { location, start: self.operand(call.arguments.first()), length })
    }

    fn known_unrelated(&self, store: &Operation, read: &Operation) -> bool {
        if store.location != read.location {
            return true;
        }

        let knowledge = self.knowledge();
        let constant = |bound: &Option<Expression>| bound.as_ref().and_then(|bound| knowledge.value_if_known_constant(bound));

        match store.location {
            Location::Storage => match (&store.start, &read.start) {
                (Some(store_start), Some(read_start)) => {
                    knowledge.difference(store_start, read_start).is_some_and(|difference| !difference.is_zero())
                }
                _ => false,
            },
            Location::Memory => {
                let read_length = constant(&read.length);
                if read_length.is_some_and(|length| length.is_zero()) {
                    return true;
                }

                let (Some(store_start), Some(read_start)) = (&store.start, &read.start) else {
                    return false;
                };
                let (Some(store_length), Some(read_length)) = (constant(&store.length), read_length) else {
                    return false;
                };

                let after = knowledge.difference(read_start, store_start);
                let before = knowledge.difference(store_start, read_start);
                after.is_some_and(|after| after >= store_length) && before.is_some_and(|before| before >= read_length)
            }
        }
    }

    fn known_covered(&self, store: &Operation, write: &Operation) -> bool {
        if store.location != write.location {
            return false;
        }

        let (Some(store_start), Some(write_start)) = (&store.start, &write.start) else {
            return false;
        };
        let knowledge = self.knowledge();

        match store.location {
            Location::Storage => knowledge.difference(store_start, write_start).is_some_and(|difference| difference.is_zero()),
            Location::Memory => {
                let constant = |bound: &Option<Expression>| bound.as_ref().and_then(|bound| knowledge.value_if_known_constant(bound));
                let (Some(store_length), Some(write_length)) = (constant(&store.length), constant(&write.length)) else {
                    return false;
                };

                knowledge.difference(store_start, write_start)
                    .and_then(|offset| offset.checked_add(store_length))
                    .is_some_and(|end| end <= write_length)
            }
        }
    }

    fn mark_all_used(&mut self) {
        self.used.extend(std::mem::take(&mut self.active).into_keys());
    }

    fn read(&mut self, read: &Operation) {
        let related: Vec<usize> = self.active.iter()
            .filter(|(_, store)| !self.known_unrelated(store, read))
            .map(|(id, _)| *id)
            .collect();

        for id in related {
            self.active.remove(&id);
            self.used.insert(id);
        }
    }

    fn write(&mut self, id: usize, write: Operation) {
        let covered: Vec<usize> = self.active.iter()
            .filter(|(_, store)| self.known_covered(store, &write))
            .map(|(id, _)| *id)
            .collect();

        for id in covered {
            self.active.remove(&id);
        }

        self.stores.insert(id);
        self.active.insert(id, write);
    }

    /// Execution ends here. Memory is discarded, storage is kept unless the
    /// call reverts.
    fn terminate(&mut self, keeps_storage: bool) {
        for (id, operation) in std::mem::take(&mut self.active) {
            if operation.location == Location::Storage && keeps_storage {
                self.used.insert(id);
            }
        }
    }

    /// If `expression` ends execution, returns whether storage survives.
    fn termination(&self, expression: &Expression) -> Option<bool> {
        let call = expression.as_function_call()?;
        let effects = self.dialect.builtin(&call.function_name.name)?.control_flow_side_effects;
        (!effects.can_continue).then_some(effects.can_terminate)
    }

    fn visit_loop_iteration(&mut self, for_loop: &ForLoop) {
        self.visit_block(&for_loop.body);
        for continued in std::mem::take(&mut self.pending_continues) {
            join(&mut self.active, continued);
        }
        self.visit_block(&for_loop.post);
        self.visit_expression(&for_loop.condition);
    }
}

impl<'ast> Visitor<'ast> for StoreAnalysis<'_> {
    fn visit_block(&mut self, block: &'ast Block) {
        let outer_declared = std::mem::take(&mut self.declared);
        walk_block(self, block);

        // The variables of this block get a new value when it runs again.
        let declared = std::mem::replace(&mut self.declared, outer_declared);
        let pending = self.pending_breaks.iter_mut().chain(&mut self.pending_continues);
        for stores in std::iter::once(&mut self.active).chain(pending) {
            for operation in stores.values_mut() {
                operation.forget(&declared);
            }
        }
    }

    fn visit_statement(&mut self, statement: &'ast Statement) {
        match statement {
            Statement::Break => self.pending_breaks.push(std::mem::take(&mut self.active)),
            Statement::Continue => self.pending_continues.push(std::mem::take(&mut self.active)),
            Statement::Leave => self.mark_all_used(),
            Statement::Expression(expression) => {
                let id = self.next_id;
                self.next_id += 1;

                walk_expression(self, expression);

                if let Some(keeps_storage) = self.termination(expression) {
                    self.terminate(keeps_storage);
                } else if let Some(store) = self.removable_store(expression) {
                    self.write(id, store);
                }
            }
            _ => walk_statement(self, statement),
        }
    }

    fn visit_function_call(&mut self, call: &'ast FunctionCall) {
        walk_function_call(self, call);

        let access = match self.dialect.builtin(&call.function_name.name) {
            Some(builtin) => self.access(builtin, &call.arguments),
            None => Access::Everything,
        };

        match access {
            Access::Nothing => (),
            Access::Everything => self.mark_all_used(),
            Access::Range(read) => self.read(&read),
        }
    }

    fn visit_variable_declaration(&mut self, declaration: &'ast VariableDeclaration) {
        walk_variable_declaration(self, declaration);
        self.declared.extend(declaration.variables.iter().map(|variable| variable.name.clone()));
    }

    fn visit_if(&mut self, statement: &'ast If) {
        self.visit_expression(&statement.condition);

        let skipped = self.active.clone();
        self.visit_block(&statement.body);
        join(&mut self.active, skipped);
    }

    fn visit_switch(&mut self, switch: &'ast Switch) {
        self.visit_expression(&switch.expression);

        let before = self.active.clone();
        let mut after = if switch.default_case().is_some() { ActiveStores::new() } else { before.clone() };

        for case in &switch.cases {
            self.active = before.clone();
            self.visit_block(&case.body);
            join(&mut after, std::mem::take(&mut self.active));
        }

        self.active = after;
    }

    fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
        let active = std::mem::take(&mut self.active);
        let declared = std::mem::take(&mut self.declared);
        let pending_breaks = std::mem::take(&mut self.pending_breaks);
        let pending_continues = std::mem::take(&mut self.pending_continues);
        let loop_depth = std::mem::replace(&mut self.loop_depth, 0);

        // The caller may read whatever the function stored.
        self.visit_block(&function.body);
        self.mark_all_used();

        self.active = active;
        self.declared = declared;
        self.pending_breaks = pending_breaks;
        self.pending_continues = pending_continues;
        self.loop_depth = loop_depth;
    }

    fn visit_for_loop(&mut self, for_loop: &'ast ForLoop) {
        assert!(for_loop.pre.is_empty(), "for loop pre blocks should have been moved out");

        let outer_breaks = std::mem::take(&mut self.pending_breaks);
        let outer_continues = std::mem::take(&mut self.pending_continues);
        self.loop_depth += 1;

        self.visit_expression(&for_loop.condition);
        let zero_runs = self.active.clone();

        let first_id = self.next_id;
        self.visit_loop_iteration(for_loop);

        if self.loop_depth < MAX_LOOP_DEPTH_FOR_SECOND_RUN {
            // The second run sees the stores of the first run.
            self.next_id = first_id;
            let one_run = self.active.clone();
            self.visit_loop_iteration(for_loop);
            join(&mut self.active, one_run);
        } else {
            self.used.extend(first_id..self.next_id);
        }

        join(&mut self.active, zero_runs);
        for broken in std::mem::take(&mut self.pending_breaks) {
            join(&mut self.active, broken);
        }

        self.loop_depth -= 1;
        self.pending_breaks = outer_breaks;
        self.pending_continues = outer_continues;
    }
}

/// Removes the expression statements with the given ids, numbering them in
/// the same order as the analysis.
struct StoreRemover {
    to_remove: BTreeSet<usize>,
    next_id: usize,
}

impl VisitorMut for StoreRemover {
    fn visit_block(&mut self, block: &mut Block) {
        iterate_replacing(&mut block.statements, |statement| {
            if let Statement::Expression(..) = statement {
                let id = self.next_id;
                self.next_id += 1;
                return self.to_remove.contains(&id).then(Vec::new);
            }

            walk_statement_mut(self, statement);
            None
        });
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::steps::testing::assert_step;

    use super::*;

    #[rstest]
    #[case("{ sstore(0, 1) sstore(0, 2) }", "{ sstore(0, 2) }")]
    #[case("{ mstore(0, 1) }", "{ }")]
    #[case("{ mstore(0, 1) return(0, 32) }", "{ mstore(0, 1) return(0, 32) }")]
    #[case("{ mstore(0, 1) mstore(32, 2) return(32, 32) }", "{ mstore(32, 2) return(32, 32) }")]
    #[case("{ sstore(0, 1) revert(0, 0) }", "{ revert(0, 0) }")]
    #[case("{ sstore(0, 1) stop() }", "{ sstore(0, 1) stop() }")]
    #[case("{ mstore(0, 1) revert(0, 0) }", "{ revert(0, 0) }")]
    #[case(
        "{ let x := calldataload(0) sstore(x, 1) sstore(0, 2) }",
        "{ let x := calldataload(0) sstore(x, 1) sstore(0, 2) }",
    )]
    #[case("{ let x := calldataload(0) sstore(x, 1) sstore(x, 2) }", "{ let x := calldataload(0) sstore(x, 2) }")]
    #[case(
        "{ let x := calldataload(0) sstore(x, 1) x := 3 sstore(x, 2) }",
        "{ let x := calldataload(0) sstore(x, 1) x := 3 sstore(x, 2) }",
    )]
    #[case("{ sstore(0, 1) sstore(1, sload(0)) sstore(0, 2) }", "{ sstore(0, 1) sstore(1, sload(0)) sstore(0, 2) }")]
    #[case("{ sstore(0, 1) let y := sload(1) sstore(0, 2) }", "{ let y := sload(1) sstore(0, 2) }")]
    #[case(
        "{ sstore(0, 1) if calldataload(0) { sstore(0, 2) } }",
        "{ sstore(0, 1) if calldataload(0) { sstore(0, 2) } }",
    )]
    #[case("{ mstore(0, 1) if calldataload(0) { mstore(0, 2) } }", "{ if calldataload(0) { } }")]
    #[case("{ mstore(0, 1) pop(msize()) }", "{ mstore(0, 1) pop(msize()) }")]
    #[case("{ mstore(0, 1) sstore(0, keccak256(0, 32)) }", "{ mstore(0, 1) sstore(0, keccak256(0, 32)) }")]
    #[case("{ mstore(0, 1) sstore(0, keccak256(32, 32)) }", "{ sstore(0, keccak256(32, 32)) }")]
    #[case("{ mstore8(3, 1) mstore(0, 2) return(0, 32) }", "{ mstore(0, 2) return(0, 32) }")]
    #[case("{ mstore(0, 2) mstore8(3, 1) return(0, 32) }", "{ mstore(0, 2) mstore8(3, 1) return(0, 32) }")]
    #[case(
        "{ let p := calldataload(0) let q := add(p, 32) mstore(p, 1) mstore(q, 2) return(q, 32) }",
        "{ let p := calldataload(0) let q := add(p, 32) mstore(q, 2) return(q, 32) }",
    )]
    #[case(
        "{ sstore(0, 1) pop(call(gas(), 0, 0, 0, 0, 0, 0)) sstore(0, 2) }",
        "{ sstore(0, 1) pop(call(gas(), 0, 0, 0, 0, 0, 0)) sstore(0, 2) }",
    )]
    #[case(
        "{ mstore(0, 1) f() mstore(0, 2) function f() { } }",
        "{ mstore(0, 1) f() function f() { } }",
    )]
    #[case("{ function f() { mstore(0, 1) } }", "{ function f() { mstore(0, 1) } }")]
    #[case(
        "{ function f() { sstore(0, 1) if calldataload(0) { leave } sstore(0, 2) } }",
        "{ function f() { sstore(0, 1) if calldataload(0) { leave } sstore(0, 2) } }",
    )]
    #[case(
        "{ for { } calldataload(0) { } { mstore(0, 1) } return(0, 32) }",
        "{ for { } calldataload(0) { } { mstore(0, 1) } return(0, 32) }",
    )]
    #[case(
        "{ for { } calldataload(0) { } { sstore(0, 1) if calldataload(1) { break } sstore(0, 2) } }",
        "{ for { } calldataload(0) { } { sstore(0, 1) if calldataload(1) { break } sstore(0, 2) } }",
    )]
    #[case(
        "{ let i := 0 for { } lt(i, 2) { i := add(i, 1) } { let p := mul(i, 32) mstore(p, 1) } return(0, 64) }",
        "{ let i := 0 for { } lt(i, 2) { i := add(i, 1) } { let p := mul(i, 32) mstore(p, 1) } return(0, 64) }",
    )]
    #[case("{ sstore(0, add(1, 2)) sstore(0, 3) }", "{ sstore(0, add(1, 2)) sstore(0, 3) }")]
    fn removes_unused_stores(#[case] input: &str, #[case] expected: &str) {
        assert_step::<UnusedStoreEliminator>(input, expected);
    }

    #[test]
    fn covering_requires_the_whole_range() {
        let store = Operation { location: Location::Memory, start: Some(Expression::number(16u64)), length: Some(Expression::number(32u64)) };
        let write = Operation { location: Location::Memory, start: Some(Expression::number(0u64)), length: Some(Expression::number(32u64)) };
        let dialect = yul::EvmDialect::new();
        let analysis = StoreAnalysis {
            dialect: &dialect,
            ssa: BTreeSet::new(),
            values: BTreeMap::new(),
            ignore_memory: false,
            active: ActiveStores::new(),
            declared: BTreeSet::new(),
            pending_breaks: Vec::new(),
            pending_continues: Vec::new(),
            loop_depth: 0,
            next_id: 0,
            stores: BTreeSet::new(),
            used: BTreeSet::new(),
        };

        assert!(!analysis.known_covered(&store, &write));
        assert!(analysis.known_covered(&write, &write));
        assert!(!analysis.known_unrelated(&store, &write));
    }
}
