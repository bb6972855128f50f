// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use log::trace;

use crate::{
    visit::{walk_statement, Visitor},
    Block, Dialect, Expression, ForLoop, FunctionDefinition, Statement, YulString,
};

use super::{AnalysisDiagnostic, ScopeId, ScopeTree, SymbolKind};

/// The result of a successful analysis.
#[derive(Debug, Clone)]
pub struct AnalysisInfo {
    pub scopes: ScopeTree,
}

/// Builds the scope tree of a program while checking that every name
/// resolves and every call and assignment has matching arity.
pub struct Analyzer<'a> {
    dialect: &'a dyn Dialect,
    scopes: ScopeTree,
    current: Option<ScopeId>,
    diagnostics: Vec<AnalysisDiagnostic>,
    in_loop_body: bool,
    in_function: bool,
}

impl<'a> Analyzer<'a> {
    pub fn analyze(dialect: &'a dyn Dialect, block: &Block) -> Result<AnalysisInfo, Vec<AnalysisDiagnostic>> {
        let mut analyzer = Self {
            dialect,
            scopes: ScopeTree::new(),
            current: None,
            diagnostics: Vec::new(),
            in_loop_body: false,
            in_function: false,
        };

        analyzer.visit_block(block);
        trace!("Analysis created {} scopes with {} diagnostics", analyzer.scopes.len(), analyzer.diagnostics.len());

        if analyzer.diagnostics.is_empty() {
            Ok(AnalysisInfo { scopes: analyzer.scopes })
        } else {
            Err(analyzer.diagnostics)
        }
    }

    fn current_scope(&self) -> ScopeId {
        self.current.expect("analysis should be inside a scope")
    }

    fn enter_scope(&mut self, is_function_boundary: bool) {
        self.current = Some(self.scopes.add_scope(self.current, is_function_boundary));
    }

    fn leave_scope(&mut self) {
        self.current = self.scopes.scope(self.current_scope()).parent;
    }

    fn declare(&mut self, name: &YulString, kind: SymbolKind) {
        let scope = self.current_scope();
        if self.dialect.is_builtin(name) {
            self.diagnostics.push(AnalysisDiagnostic::ReservedName { name: name.clone() });
        } else if self.scopes.is_declared(scope, name) {
            self.diagnostics.push(AnalysisDiagnostic::Redeclaration { name: name.clone() });
        } else {
            self.scopes.register(scope, name.clone(), kind);
        }
    }

    fn register_functions(&mut self, statements: &[Statement]) {
        for function in statements.iter().filter_map(Statement::as_function_definition) {
            self.declare(&function.name, SymbolKind::Function {
                parameters: function.parameters.len(),
                returns: function.return_variables.len(),
            });
        }
    }

    fn visit_statements(&mut self, statements: &[Statement]) {
        self.register_functions(statements);
        for statement in statements {
            self.visit_statement(statement);
        }
    }

    /// Checks an expression and returns how many values it evaluates to, or
    /// `None` if that is unknown because of an earlier error.
    fn expression_values(&mut self, expression: &Expression) -> Option<usize> {
        match expression {
            Expression::Literal(..) => Some(1),

            Expression::Identifier(identifier) => {
                match self.scopes.lookup(self.current_scope(), &identifier.name) {
                    Some((_, SymbolKind::Variable)) => Some(1),
                    Some((_, SymbolKind::Function { .. })) => {
                        self.diagnostics.push(AnalysisDiagnostic::NotAVariable { name: identifier.name.clone() });
                        None
                    }
                    None => {
                        self.diagnostics.push(AnalysisDiagnostic::UndeclaredVariable { name: identifier.name.clone() });
                        None
                    }
                }
            }

            Expression::FunctionCall(call) => {
                for argument in call.arguments.iter().rev() {
                    self.expect_single_value(argument);
                }

                let name = &call.function_name.name;
                let (parameters, returns) = if let Some(builtin) = self.dialect.builtin(name) {
                    (builtin.parameters, builtin.returns)
                } else {
                    match self.scopes.lookup(self.current_scope(), name) {
                        Some((_, SymbolKind::Function { parameters, returns })) => (parameters, returns),
                        Some((_, SymbolKind::Variable)) => {
                            self.diagnostics.push(AnalysisDiagnostic::NotAFunction { name: name.clone() });
                            return None;
                        }
                        None => {
                            self.diagnostics.push(AnalysisDiagnostic::UndeclaredFunction { name: name.clone() });
                            return None;
                        }
                    }
                };

                if parameters != call.arguments.len() {
                    self.diagnostics.push(AnalysisDiagnostic::ArgumentCountMismatch {
                        function: name.clone(),
                        expected: parameters,
                        actual: call.arguments.len(),
                    });
                }

                Some(returns)
            }
        }
    }

    fn expect_values(&mut self, expression: &Expression, expected: usize) {
        if let Some(actual) = self.expression_values(expression) {
            if actual != expected {
                self.diagnostics.push(AnalysisDiagnostic::ValueCountMismatch { expected, actual });
            }
        }
    }

    fn expect_single_value(&mut self, expression: &Expression) {
        self.expect_values(expression, 1);
    }

    fn check_assignment_target(&mut self, name: &YulString) {
        match self.scopes.lookup(self.current_scope(), name) {
            Some((_, SymbolKind::Variable)) => (),
            Some((_, SymbolKind::Function { .. })) => {
                self.diagnostics.push(AnalysisDiagnostic::NotAVariable { name: name.clone() });
            }
            None => {
                self.diagnostics.push(AnalysisDiagnostic::UndeclaredVariable { name: name.clone() });
            }
        }
    }
}

impl<'ast> Visitor<'ast> for Analyzer<'_> {
    fn visit_block(&mut self, block: &'ast Block) {
        self.enter_scope(false);
        self.visit_statements(&block.statements);
        self.leave_scope();
    }

    fn visit_statement(&mut self, statement: &'ast Statement) {
        match statement {
            Statement::Expression(expression) => self.expect_values(expression, 0),

            Statement::Assignment(assignment) => {
                self.expect_values(&assignment.value, assignment.variable_names.len());
                for target in &assignment.variable_names {
                    self.check_assignment_target(&target.name);
                }
            }

            Statement::VariableDeclaration(declaration) => {
                if let Some(value) = &declaration.value {
                    self.expect_values(value, declaration.variables.len());
                }
                for variable in &declaration.variables {
                    self.declare(&variable.name, SymbolKind::Variable);
                }
            }

            Statement::If(statement) => {
                self.expect_single_value(&statement.condition);
                self.visit_block(&statement.body);
            }

            Statement::Switch(switch) => {
                self.expect_single_value(&switch.expression);
                for (idx, case) in switch.cases.iter().enumerate() {
                    if let Some(value) = &case.value {
                        let duplicate = switch.cases[..idx].iter().any(|other| other.value.as_ref() == Some(value));
                        if duplicate {
                            self.diagnostics.push(AnalysisDiagnostic::DuplicateCase { value: value.to_string() });
                        }
                    }
                    self.visit_block(&case.body);
                }
            }

            Statement::Break | Statement::Continue => {
                if !self.in_loop_body {
                    let statement = if matches!(statement, Statement::Break) { "break" } else { "continue" };
                    self.diagnostics.push(AnalysisDiagnostic::OutsideLoopBody { statement });
                }
            }

            Statement::Leave => {
                if !self.in_function {
                    self.diagnostics.push(AnalysisDiagnostic::LeaveOutsideFunction);
                }
            }

            _ => walk_statement(self, statement),
        }
    }

    fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
        self.enter_scope(true);
        for variable in function.parameters.iter().chain(&function.return_variables) {
            self.declare(&variable.name, SymbolKind::Variable);
        }

        let in_loop_body = std::mem::replace(&mut self.in_loop_body, false);
        let in_function = std::mem::replace(&mut self.in_function, true);

        self.visit_block(&function.body);

        self.in_loop_body = in_loop_body;
        self.in_function = in_function;
        self.leave_scope();
    }

    fn visit_for_loop(&mut self, for_loop: &'ast ForLoop) {
        self.enter_scope(false);

        for function in for_loop.pre.statements.iter().filter_map(Statement::as_function_definition) {
            self.diagnostics.push(AnalysisDiagnostic::FunctionInForLoopPre { name: function.name.clone() });
        }

        let in_loop_body = std::mem::replace(&mut self.in_loop_body, false);
        for statement in &for_loop.pre.statements {
            if !statement.is_function_definition() {
                self.visit_statement(statement);
            }
        }

        self.expect_single_value(&for_loop.condition);

        self.in_loop_body = true;
        self.visit_block(&for_loop.body);

        self.in_loop_body = false;
        self.visit_block(&for_loop.post);

        self.in_loop_body = in_loop_body;
        self.leave_scope();
    }
}
