// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Visitor traits that walk the tree in evaluation order. Function call
//! arguments are visited right to left, because that is the order in which
//! they are evaluated.

use crate::{Assignment, Block, Case, Expression, ForLoop, FunctionCall, FunctionDefinition, Identifier, If, Literal, Statement, Switch, VariableDeclaration};

pub trait Visitor<'ast>: Sized {
    fn visit_block(&mut self, block: &'ast Block) {
        walk_block(self, block)
    }

    fn visit_statement(&mut self, statement: &'ast Statement) {
        walk_statement(self, statement)
    }

    fn visit_expression(&mut self, expression: &'ast Expression) {
        walk_expression(self, expression)
    }

    fn visit_function_call(&mut self, call: &'ast FunctionCall) {
        walk_function_call(self, call)
    }

    /// A reference to a variable. Function names are not visited as
    /// identifiers, use [`Visitor::visit_function_call`] for those.
    fn visit_identifier(&mut self, _identifier: &'ast Identifier) {}

    fn visit_literal(&mut self, _literal: &'ast Literal) {}

    fn visit_assignment(&mut self, assignment: &'ast Assignment) {
        walk_assignment(self, assignment)
    }

    fn visit_variable_declaration(&mut self, declaration: &'ast VariableDeclaration) {
        walk_variable_declaration(self, declaration)
    }

    fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
        walk_function_definition(self, function)
    }

    fn visit_if(&mut self, statement: &'ast If) {
        walk_if(self, statement)
    }

    fn visit_switch(&mut self, switch: &'ast Switch) {
        walk_switch(self, switch)
    }

    fn visit_case(&mut self, case: &'ast Case) {
        walk_case(self, case)
    }

    fn visit_for_loop(&mut self, for_loop: &'ast ForLoop) {
        walk_for_loop(self, for_loop)
    }
}

pub fn walk_block<'a>(visitor: &mut impl Visitor<'a>, block: &'a Block) {
    for statement in &block.statements {
        visitor.visit_statement(statement);
    }
}

pub fn walk_statement<'a>(visitor: &mut impl Visitor<'a>, statement: &'a Statement) {
    match statement {
        Statement::Expression(expression) => visitor.visit_expression(expression),
        Statement::Assignment(assignment) => visitor.visit_assignment(assignment),
        Statement::VariableDeclaration(declaration) => visitor.visit_variable_declaration(declaration),
        Statement::FunctionDefinition(function) => visitor.visit_function_definition(function),
        Statement::If(statement) => visitor.visit_if(statement),
        Statement::Switch(switch) => visitor.visit_switch(switch),
        Statement::ForLoop(for_loop) => visitor.visit_for_loop(for_loop),
        Statement::Break | Statement::Continue | Statement::Leave => (),
        Statement::Block(block) => visitor.visit_block(block),
    }
}

pub fn walk_expression<'a>(visitor: &mut impl Visitor<'a>, expression: &'a Expression) {
    match expression {
        Expression::Literal(literal) => visitor.visit_literal(literal),
        Expression::Identifier(identifier) => visitor.visit_identifier(identifier),
        Expression::FunctionCall(call) => visitor.visit_function_call(call),
    }
}

pub fn walk_function_call<'a>(visitor: &mut impl Visitor<'a>, call: &'a FunctionCall) {
    for argument in call.arguments.iter().rev() {
        visitor.visit_expression(argument);
    }
}

pub fn walk_assignment<'a>(visitor: &mut impl Visitor<'a>, assignment: &'a Assignment) {
    visitor.visit_expression(&assignment.value);
}

pub fn walk_variable_declaration<'a>(visitor: &mut impl Visitor<'a>, declaration: &'a VariableDeclaration) {
    if let Some(value) = &declaration.value {
        visitor.visit_expression(value);
    }
}

pub fn walk_function_definition<'a>(visitor: &mut impl Visitor<'a>, function: &'a FunctionDefinition) {
    visitor.visit_block(&function.body);
}

pub fn walk_if<'a>(visitor: &mut impl Visitor<'a>, statement: &'a If) {
    visitor.visit_expression(&statement.condition);
    visitor.visit_block(&statement.body);
}

pub fn walk_switch<'a>(visitor: &mut impl Visitor<'a>, switch: &'a Switch) {
    visitor.visit_expression(&switch.expression);
    for case in &switch.cases {
        visitor.visit_case(case);
    }
}

pub fn walk_case<'a>(visitor: &mut impl Visitor<'a>, case: &'a Case) {
    visitor.visit_block(&case.body);
}

pub fn walk_for_loop<'a>(visitor: &mut impl Visitor<'a>, for_loop: &'a ForLoop) {
    visitor.visit_block(&for_loop.pre);
    visitor.visit_expression(&for_loop.condition);
    visitor.visit_block(&for_loop.body);
    visitor.visit_block(&for_loop.post);
}

/// The mutable counterpart of [`Visitor`], used by passes that rewrite the
/// tree in place.
pub trait VisitorMut: Sized {
    fn visit_block(&mut self, block: &mut Block) {
        walk_block_mut(self, block)
    }

    fn visit_statement(&mut self, statement: &mut Statement) {
        walk_statement_mut(self, statement)
    }

    fn visit_expression(&mut self, expression: &mut Expression) {
        walk_expression_mut(self, expression)
    }

    fn visit_function_call(&mut self, call: &mut FunctionCall) {
        walk_function_call_mut(self, call)
    }

    fn visit_identifier(&mut self, _identifier: &mut Identifier) {}

    fn visit_assignment(&mut self, assignment: &mut Assignment) {
        walk_assignment_mut(self, assignment)
    }

    fn visit_variable_declaration(&mut self, declaration: &mut VariableDeclaration) {
        walk_variable_declaration_mut(self, declaration)
    }

    fn visit_function_definition(&mut self, function: &mut FunctionDefinition) {
        walk_function_definition_mut(self, function)
    }

    fn visit_if(&mut self, statement: &mut If) {
        walk_if_mut(self, statement)
    }

    fn visit_switch(&mut self, switch: &mut Switch) {
        walk_switch_mut(self, switch)
    }

    fn visit_for_loop(&mut self, for_loop: &mut ForLoop) {
        walk_for_loop_mut(self, for_loop)
    }
}

pub fn walk_block_mut(visitor: &mut impl VisitorMut, block: &mut Block) {
    for statement in &mut block.statements {
        visitor.visit_statement(statement);
    }
}

pub fn walk_statement_mut(visitor: &mut impl VisitorMut, statement: &mut Statement) {
    match statement {
        Statement::Expression(expression) => visitor.visit_expression(expression),
        Statement::Assignment(assignment) => visitor.visit_assignment(assignment),
        Statement::VariableDeclaration(declaration) => visitor.visit_variable_declaration(declaration),
        Statement::FunctionDefinition(function) => visitor.visit_function_definition(function),
        Statement::If(statement) => visitor.visit_if(statement),
        Statement::Switch(switch) => visitor.visit_switch(switch),
        Statement::ForLoop(for_loop) => visitor.visit_for_loop(for_loop),
        Statement::Break | Statement::Continue | Statement::Leave => (),
        Statement::Block(block) => visitor.visit_block(block),
    }
}

pub fn walk_expression_mut(visitor: &mut impl VisitorMut, expression: &mut Expression) {
    match expression {
        Expression::Literal(..) => (),
        Expression::Identifier(identifier) => visitor.visit_identifier(identifier),
        Expression::FunctionCall(call) => visitor.visit_function_call(call),
    }
}

pub fn walk_function_call_mut(visitor: &mut impl VisitorMut, call: &mut FunctionCall) {
    for argument in call.arguments.iter_mut().rev() {
        visitor.visit_expression(argument);
    }
}

pub fn walk_assignment_mut(visitor: &mut impl VisitorMut, assignment: &mut Assignment) {
    visitor.visit_expression(&mut assignment.value);
}

pub fn walk_variable_declaration_mut(visitor: &mut impl VisitorMut, declaration: &mut VariableDeclaration) {
    if let Some(value) = &mut declaration.value {
        visitor.visit_expression(value);
    }
}

pub fn walk_function_definition_mut(visitor: &mut impl VisitorMut, function: &mut FunctionDefinition) {
    visitor.visit_block(&mut function.body);
}

pub fn walk_if_mut(visitor: &mut impl VisitorMut, statement: &mut If) {
    visitor.visit_expression(&mut statement.condition);
    visitor.visit_block(&mut statement.body);
}

pub fn walk_switch_mut(visitor: &mut impl VisitorMut, switch: &mut Switch) {
    visitor.visit_expression(&mut switch.expression);
    for case in &mut switch.cases {
        visitor.visit_block(&mut case.body);
    }
}

pub fn walk_for_loop_mut(visitor: &mut impl VisitorMut, for_loop: &mut ForLoop) {
    visitor.visit_block(&mut for_loop.pre);
    visitor.visit_expression(&mut for_loop.condition);
    visitor.visit_block(&mut for_loop.body);
    visitor.visit_block(&mut for_loop.post);
}

/// Visits every statement of `statements`, replacing a statement by the list
/// returned from `f` (if any). Replacements are not visited again.
pub fn iterate_replacing(statements: &mut Vec<Statement>, mut f: impl FnMut(&mut Statement) -> Option<Vec<Statement>>) {
    let mut result = Vec::with_capacity(statements.len());

    for mut statement in std::mem::take(statements) {
        match f(&mut statement) {
            Some(replacement) => result.extend(replacement),
            None => result.push(statement),
        }
    }

    *statements = result;
}
