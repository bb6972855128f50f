// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! The data-flow analysis shared by the steps that need to know which value
//! a variable currently holds.
//!
//! The analysis walks the program in evaluation order and tracks, for every
//! variable in scope, the movable expression it was last assigned (if any).
//! It also tracks which storage and memory slots are known to hold the value
//! of a variable. Knowledge is dropped when a variable is reassigned, when
//! control flow joins, and when a loop is entered.
//!
//! Steps plug into the walk through a [`DataFlowHook`], which is handed every
//! expression in the program together with the knowledge that holds at that
//! point.

use std::collections::{BTreeMap, BTreeSet};

use yul::{
    visit::VisitorMut, Assignment, Block, Dialect, Expression, ForLoop, FunctionDefinition, If, SideEffects,
    Statement, Switch, VariableDeclaration, YulString,
};

use crate::names::Assignments;

use super::{CallGraph, KnowledgeBase, MovableChecker, SideEffectsCollector, SideEffectsPropagator};

/// The value a variable was last assigned and the loop nesting depth of that
/// assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedValue {
    pub value: Expression,
    pub loop_depth: usize,
}

/// Which variables hold the contents of which storage or memory slots. Both
/// key and value are variable names.
#[derive(Debug, Clone, Default)]
struct Environment {
    storage: BTreeMap<YulString, YulString>,
    memory: BTreeMap<YulString, YulString>,
}

impl Environment {
    /// Only keeps the facts that also hold in `other`.
    fn join(&mut self, other: &Environment) {
        self.storage.retain(|key, value| other.storage.get(key) == Some(value));
        self.memory.retain(|key, value| other.memory.get(key) == Some(value));
    }
}

#[derive(Debug, Default)]
struct VariableScope {
    variables: BTreeSet<YulString>,
    is_function: bool,
}

/// The knowledge at the current point of the walk.
pub struct DataFlowState<'a> {
    dialect: &'a dyn Dialect,
    function_side_effects: BTreeMap<YulString, SideEffects>,
    values: BTreeMap<YulString, AssignedValue>,

    /// For every variable with a known value, the variables that value
    /// refers to.
    references: BTreeMap<YulString, BTreeSet<YulString>>,

    environment: Environment,
    scopes: Vec<VariableScope>,
    loop_depth: usize,
    return_variables: BTreeSet<YulString>,
}

impl<'a> DataFlowState<'a> {
    fn new(dialect: &'a dyn Dialect, ast: &Block) -> Self {
        Self {
            dialect,
            function_side_effects: SideEffectsPropagator::side_effects(dialect, &CallGraph::of(ast)),
            values: BTreeMap::new(),
            references: BTreeMap::new(),
            environment: Environment::default(),
            scopes: Vec::new(),
            loop_depth: 0,
            return_variables: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }

    #[must_use]
    pub fn function_side_effects(&self) -> &BTreeMap<YulString, SideEffects> {
        &self.function_side_effects
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&AssignedValue> {
        self.values.get(name)
    }

    /// Every variable with a known value, ordered by name.
    pub fn values(&self) -> impl Iterator<Item = (&YulString, &AssignedValue)> {
        self.values.iter()
    }

    /// Returns the literal or the identifier with a literal value that
    /// `expression` is, as a literal.
    #[must_use]
    pub fn literal_value<'e>(&'e self, expression: &'e Expression) -> Option<&'e yul::Literal> {
        match expression {
            Expression::Literal(literal) => Some(literal),
            Expression::Identifier(identifier) => self.value(&identifier.name)?.value.as_literal(),
            Expression::FunctionCall(..) => None,
        }
    }

    /// Returns whether the variable is visible at the current point, which
    /// excludes variables declared outside of the current function.
    #[must_use]
    pub fn in_scope(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.variables.contains(name) {
                return true;
            }
            if scope.is_function {
                return false;
            }
        }
        false
    }

    #[must_use]
    pub fn loop_depth(&self) -> usize {
        self.loop_depth
    }

    #[must_use]
    pub fn is_return_variable(&self, name: &str) -> bool {
        self.return_variables.contains(name)
    }

    #[must_use]
    pub fn knowledge_base(&self) -> KnowledgeBase<'_> {
        KnowledgeBase::new(self.dialect, &self.values)
    }

    /// The variable known to hold the contents of the storage slot `key`.
    #[must_use]
    pub fn storage_value(&self, key: &str) -> Option<&YulString> {
        self.environment.storage.get(key)
    }

    /// The variable known to hold the word in memory at `key`.
    #[must_use]
    pub fn memory_value(&self, key: &str) -> Option<&YulString> {
        self.environment.memory.get(key)
    }

    #[must_use]
    pub fn is_movable(&self, expression: &Expression) -> bool {
        MovableChecker::check(self.dialect, &self.function_side_effects, expression).is_movable()
    }

    fn push_scope(&mut self, is_function: bool) {
        self.scopes.push(VariableScope {
            variables: BTreeSet::new(),
            is_function,
        });
    }

    fn pop_scope(&mut self) {
        let scope = self.scopes.pop().expect("scope stack should not underflow");
        self.clear_values(&scope.variables);
    }

    fn declare(&mut self, name: YulString) {
        self.scopes.last_mut()
            .expect("declarations should be inside a scope")
            .variables
            .insert(name);
    }

    /// Forgets the values of `variables` and of every variable whose value
    /// refers to one of them. The latter are not cleared recursively, since
    /// their own values did not change.
    fn clear_values(&mut self, variables: &BTreeSet<YulString>) {
        if variables.is_empty() {
            return;
        }

        self.environment.storage.retain(|key, value| !variables.contains(key) && !variables.contains(value));
        self.environment.memory.retain(|key, value| !variables.contains(key) && !variables.contains(value));

        let referencing: Vec<YulString> = self.references.iter()
            .filter(|(_, referenced)| !referenced.is_disjoint(variables))
            .map(|(name, _)| name.clone())
            .collect();

        for name in variables.iter().chain(&referencing) {
            self.values.remove(name);
            self.references.remove(name);
        }
    }

    fn clear_knowledge_if_invalidated(&mut self, effects: SideEffects) {
        if effects.invalidates_storage {
            self.environment.storage.clear();
        }
        if effects.invalidates_memory {
            self.environment.memory.clear();
        }
    }

    fn clear_knowledge_invalidated_by_expression(&mut self, expression: &Expression) {
        let effects = SideEffectsCollector::of_expression(self.dialect, &self.function_side_effects, expression);
        self.clear_knowledge_if_invalidated(effects);
    }

    fn clear_knowledge_invalidated_by_block(&mut self, block: &Block) {
        let effects = SideEffectsCollector::of_block(self.dialect, &self.function_side_effects, block);
        self.clear_knowledge_if_invalidated(effects);
    }

    fn handle_assignment(&mut self, variables: &[YulString], value: Option<&Expression>, is_declaration: bool) {
        let names: BTreeSet<YulString> = variables.iter().cloned().collect();
        if !is_declaration {
            self.clear_values(&names);
        }

        let referenced = match value {
            Some(value) => {
                let checker = MovableChecker::check(self.dialect, &self.function_side_effects, value);
                let is_movable = checker.is_movable();
                let referenced = checker.into_referenced_variables();
                if let [name] = variables {
                    if is_movable && !referenced.contains(name) {
                        self.assign_value(name.clone(), value.clone());
                    }
                }
                referenced
            }
            None => {
                for name in variables {
                    self.assign_value(name.clone(), Expression::Literal(self.dialect.zero_literal()));
                }
                BTreeSet::new()
            }
        };

        for name in variables {
            self.references.insert(name.clone(), referenced.clone());
            if !is_declaration {
                self.environment.storage.retain(|key, value| key != name && value != name);
                self.environment.memory.retain(|key, value| key != name && value != name);
            }
        }

        if let (Some(value), [name]) = (value, variables) {
            if !referenced.contains(name) {
                if let Some(key) = self.simple_load(value, self.dialect.memory_load_function()) {
                    self.environment.memory.insert(key, name.clone());
                } else if let Some(key) = self.simple_load(value, self.dialect.storage_load_function()) {
                    self.environment.storage.insert(key, name.clone());
                }
            }
        }
    }

    fn assign_value(&mut self, name: YulString, value: Expression) {
        self.values.insert(name, AssignedValue {
            value,
            loop_depth: self.loop_depth,
        });
    }

    /// Returns the key of `load(key)` if `key` is a variable.
    fn simple_load(&self, expression: &Expression, load: Option<&yul::BuiltinFunction>) -> Option<YulString> {
        let call = expression.as_function_call()?;
        if call.function_name.name != load?.name {
            return None;
        }
        match call.arguments.as_slice() {
            [Expression::Identifier(key)] => Some(key.name.clone()),
            _ => None,
        }
    }

    /// Returns the key and value of `store(key, value)` if both are
    /// variables.
    fn simple_store(&self, expression: &Expression, store: Option<&yul::BuiltinFunction>) -> Option<(YulString, YulString)> {
        let call = expression.as_function_call()?;
        if call.function_name.name != store?.name {
            return None;
        }
        match call.arguments.as_slice() {
            [Expression::Identifier(key), Expression::Identifier(value)] => Some((key.name.clone(), value.name.clone())),
            _ => None,
        }
    }
}

/// Receives every expression of the program during a data-flow walk. The
/// hook is responsible for visiting the sub-expressions itself, for example
/// through [`walk_arguments`].
pub trait DataFlowHook {
    fn visit_expression(&mut self, state: &DataFlowState<'_>, expression: &mut Expression);

    /// Called for the conditions of `if` statements and `for` loops.
    fn visit_condition(&mut self, state: &DataFlowState<'_>, expression: &mut Expression) {
        self.visit_expression(state, expression);
    }
}

/// Visits the arguments of a call with the hook, in evaluation order.
pub fn walk_arguments<H: DataFlowHook + ?Sized>(hook: &mut H, state: &DataFlowState<'_>, expression: &mut Expression) {
    if let Expression::FunctionCall(call) = expression {
        for argument in call.arguments.iter_mut().rev() {
            hook.visit_expression(state, argument);
        }
    }
}

pub struct DataFlowAnalyzer<'a, H> {
    state: DataFlowState<'a>,
    hook: H,
}

impl<'a, H: DataFlowHook> DataFlowAnalyzer<'a, H> {
    /// Prepares an analysis of `ast`, which should be the whole program so
    /// the side effects of every function are known.
    #[must_use]
    pub fn new(dialect: &'a dyn Dialect, ast: &Block, hook: H) -> Self {
        Self {
            state: DataFlowState::new(dialect, ast),
            hook,
        }
    }

    /// Runs the analysis over `ast` and returns the hook.
    pub fn run(dialect: &'a dyn Dialect, ast: &mut Block, hook: H) -> H {
        let mut analyzer = Self::new(dialect, ast, hook);
        analyzer.visit_block(ast);
        analyzer.hook
    }

    fn visit_expression_statement(&mut self, expression: &mut Expression) {
        let dialect = self.state.dialect;

        if let Some((key, value)) = self.state.simple_store(expression, dialect.storage_store_function()) {
            self.hook.visit_expression(&self.state, expression);

            let state = &mut self.state;
            let knowledge = KnowledgeBase::new(state.dialect, &state.values);
            state.environment.storage.retain(|other_key, other_value| {
                knowledge.known_to_be_different(&key, other_key) || *other_value == value
            });
            state.environment.storage.insert(key, value);
            return;
        }

        if let Some((key, value)) = self.state.simple_store(expression, dialect.memory_store_function()) {
            self.hook.visit_expression(&self.state, expression);

            let state = &mut self.state;
            let knowledge = KnowledgeBase::new(state.dialect, &state.values);
            state.environment.memory.retain(|other_key, _| {
                knowledge.known_to_be_different_by_at_least_32(&key, other_key)
            });
            state.environment.memory.insert(key, value);
            return;
        }

        self.state.clear_knowledge_invalidated_by_expression(expression);
        self.hook.visit_expression(&self.state, expression);
    }
}

impl<H: DataFlowHook> VisitorMut for DataFlowAnalyzer<'_, H> {
    fn visit_block(&mut self, block: &mut Block) {
        self.state.push_scope(false);
        for statement in &mut block.statements {
            self.visit_statement(statement);
        }
        self.state.pop_scope();
    }

    fn visit_statement(&mut self, statement: &mut Statement) {
        match statement {
            Statement::Expression(expression) => self.visit_expression_statement(expression),
            Statement::Break | Statement::Continue | Statement::Leave => (),
            Statement::Assignment(assignment) => self.visit_assignment(assignment),
            Statement::VariableDeclaration(declaration) => self.visit_variable_declaration(declaration),
            Statement::FunctionDefinition(function) => self.visit_function_definition(function),
            Statement::If(statement) => self.visit_if(statement),
            Statement::Switch(switch) => self.visit_switch(switch),
            Statement::ForLoop(for_loop) => self.visit_for_loop(for_loop),
            Statement::Block(block) => self.visit_block(block),
        }
    }

    fn visit_assignment(&mut self, assignment: &mut Assignment) {
        let names: Vec<YulString> = assignment.variable_names.iter().map(|variable| variable.name.clone()).collect();

        self.state.clear_knowledge_invalidated_by_expression(&assignment.value);
        self.hook.visit_expression(&self.state, &mut assignment.value);
        self.state.handle_assignment(&names, Some(&assignment.value), false);
    }

    fn visit_variable_declaration(&mut self, declaration: &mut VariableDeclaration) {
        let names: Vec<YulString> = declaration.variables.iter().map(|variable| variable.name.clone()).collect();
        for name in &names {
            self.state.declare(name.clone());
        }

        if let Some(value) = &mut declaration.value {
            self.state.clear_knowledge_invalidated_by_expression(value);
            self.hook.visit_expression(&self.state, value);
        }
        self.state.handle_assignment(&names, declaration.value.as_ref(), true);
    }

    fn visit_if(&mut self, statement: &mut If) {
        self.state.clear_knowledge_invalidated_by_expression(&statement.condition);
        let before = self.state.environment.clone();

        self.hook.visit_condition(&self.state, &mut statement.condition);
        self.visit_block(&mut statement.body);

        self.state.environment.join(&before);
        self.state.clear_values(&Assignments::in_block(&statement.body));
    }

    fn visit_switch(&mut self, switch: &mut Switch) {
        self.state.clear_knowledge_invalidated_by_expression(&switch.expression);
        self.hook.visit_expression(&self.state, &mut switch.expression);

        let mut assigned = BTreeSet::new();
        for case in &mut switch.cases {
            let before = self.state.environment.clone();
            self.visit_block(&mut case.body);
            self.state.environment.join(&before);

            let variables = Assignments::in_block(&case.body);
            self.state.clear_values(&variables);
            assigned.extend(variables);
            self.state.clear_knowledge_invalidated_by_block(&case.body);
        }

        for case in &switch.cases {
            self.state.clear_knowledge_invalidated_by_block(&case.body);
        }
        self.state.clear_values(&assigned);
    }

    fn visit_function_definition(&mut self, function: &mut FunctionDefinition) {
        let values = std::mem::take(&mut self.state.values);
        let references = std::mem::take(&mut self.state.references);
        let environment = std::mem::take(&mut self.state.environment);
        let loop_depth = std::mem::replace(&mut self.state.loop_depth, 0);

        self.state.push_scope(true);
        for parameter in &function.parameters {
            self.state.declare(parameter.name.clone());
        }
        for variable in &function.return_variables {
            self.state.declare(variable.name.clone());
            self.state.return_variables.insert(variable.name.clone());
            self.state.handle_assignment(std::slice::from_ref(&variable.name), None, true);
        }

        self.visit_block(&mut function.body);

        self.state.pop_scope();
        self.state.values = values;
        self.state.references = references;
        self.state.environment = environment;
        self.state.loop_depth = loop_depth;
    }

    fn visit_for_loop(&mut self, for_loop: &mut ForLoop) {
        // The variables of the pre block are visible in the whole loop.
        self.state.push_scope(false);
        for statement in &mut for_loop.pre.statements {
            self.visit_statement(statement);
        }

        let mut assigned = Assignments::in_block(&for_loop.body);
        assigned.extend(Assignments::in_block(&for_loop.post));
        self.state.clear_values(&assigned);
        self.state.clear_knowledge_invalidated_by_expression(&for_loop.condition);
        self.state.clear_knowledge_invalidated_by_block(&for_loop.post);
        self.state.clear_knowledge_invalidated_by_block(&for_loop.body);

        self.state.loop_depth += 1;

        self.hook.visit_condition(&self.state, &mut for_loop.condition);
        self.visit_block(&mut for_loop.body);

        // A `continue` may skip the rest of the body.
        self.state.clear_values(&Assignments::in_block(&for_loop.body));
        self.state.clear_knowledge_invalidated_by_block(&for_loop.body);

        self.visit_block(&mut for_loop.post);

        self.state.clear_values(&assigned);
        self.state.clear_knowledge_invalidated_by_expression(&for_loop.condition);
        self.state.clear_knowledge_invalidated_by_block(&for_loop.post);
        self.state.clear_knowledge_invalidated_by_block(&for_loop.body);

        self.state.loop_depth -= 1;
        self.state.pop_scope();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use yul::{parse, EvmDialect};

    use super::*;

    /// Records, for every call to `observe`, the known value of its argument.
    #[derive(Default)]
    struct Observer {
        seen: Vec<Option<String>>,
        storage: Vec<Option<String>>,
    }

    impl DataFlowHook for Observer {
        fn visit_expression(&mut self, state: &DataFlowState<'_>, expression: &mut Expression) {
            if let Expression::FunctionCall(call) = expression {
                if call.function_name.name == "observe" {
                    let name = call.arguments[0].as_identifier().unwrap();
                    self.seen.push(state.value(name).map(|value| value.value.to_string()));
                    self.storage.push(state.storage_value(name).map(|value| value.to_string()));
                    return;
                }
            }
            walk_arguments(self, state, expression);
        }
    }

    fn observe(source: &str) -> Observer {
        let mut ast = parse(source).unwrap();
        DataFlowAnalyzer::run(&EvmDialect::new(), &mut ast, Observer::default())
    }

    fn known(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|value| value.map(str::to_string)).collect()
    }

    #[test]
    fn tracks_movable_values() {
        let observed = observe("{
            let a := add(x, 1)
            observe(a)
            let b := mload(0)
            observe(b)
            let c
            observe(c)
            a := 2
            observe(a)
        }");

        assert_eq!(observed.seen, known(&[Some("add(x, 1)"), None, Some("0"), Some("2")]));
    }

    #[test]
    fn reassignment_clears_referencing_values() {
        let observed = observe("{ let a := 1 let b := a let c := b a := 2 observe(b) observe(c) }");
        assert_eq!(observed.seen, known(&[None, Some("b")]));
    }

    #[test]
    fn branches_forget_assigned_values() {
        let observed = observe("{
            let a := 1
            let b := 1
            if x { a := 2 }
            observe(a)
            observe(b)
            switch x case 0 { b := 3 } default { }
            observe(b)
        }");

        assert_eq!(observed.seen, known(&[None, Some("1"), None]));
    }

    #[test]
    fn loops_forget_values_assigned_inside() {
        let observed = observe("{
            let i := 0
            let j := 0
            for { } lt(i, 10) { i := add(i, 1) } { observe(i) observe(j) }
            observe(i)
        }");

        assert_eq!(observed.seen, known(&[None, Some("0"), None]));
    }

    #[test]
    fn functions_start_without_knowledge() {
        let observed = observe("{ let a := 1 function f(p) -> r { observe(r) observe(p) } observe(a) }");
        assert_eq!(observed.seen, known(&[Some("0"), None, Some("1")]));
    }

    #[test]
    fn tracks_storage_contents() {
        let observed = observe("{
            let k := 1
            let v := 2
            sstore(k, v)
            observe(k)
            let other := 2
            sstore(other, v)
            observe(k)
            sstore(add(k, 0), v)
            observe(k)
            function observe(x) { }
        }");

        assert_eq!(observed.storage, known(&[Some("v"), Some("v"), None]));
    }
}
