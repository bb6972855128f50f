// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{Dialect, Expression, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    FlowOut,
    Break,
    Continue,
    Leave,
    Terminate,
}

/// Finds statements after which control never reaches the next statement.
pub struct TerminationFinder<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> TerminationFinder<'a> {
    #[must_use]
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Returns the kind and index of the first statement that
    /// unconditionally leaves the sequence, or [`ControlFlow::FlowOut`] and
    /// `None` if control can reach the end of it.
    #[must_use]
    pub fn first_unconditional_control_flow_change(&self, statements: &[Statement]) -> (ControlFlow, Option<usize>) {
        for (idx, statement) in statements.iter().enumerate() {
            let kind = self.control_flow_kind(statement);
            if kind != ControlFlow::FlowOut {
                return (kind, Some(idx));
            }
        }
        (ControlFlow::FlowOut, None)
    }

    #[must_use]
    pub fn control_flow_kind(&self, statement: &Statement) -> ControlFlow {
        match statement {
            Statement::VariableDeclaration(declaration) => {
                match &declaration.value {
                    Some(value) if self.contains_non_continuing_call(value) => ControlFlow::Terminate,
                    _ => ControlFlow::FlowOut,
                }
            }

            Statement::Assignment(assignment) if self.contains_non_continuing_call(&assignment.value) => ControlFlow::Terminate,
            Statement::Expression(expression) if self.contains_non_continuing_call(expression) => ControlFlow::Terminate,

            Statement::Break => ControlFlow::Break,
            Statement::Continue => ControlFlow::Continue,
            Statement::Leave => ControlFlow::Leave,

            Statement::Block(block) => self.first_unconditional_control_flow_change(&block.statements).0,

            _ => ControlFlow::FlowOut,
        }
    }

    fn contains_non_continuing_call(&self, expression: &Expression) -> bool {
        let Expression::FunctionCall(call) = expression else {
            return false;
        };

        if call.arguments.iter().any(|argument| self.contains_non_continuing_call(argument)) {
            return true;
        }

        self.dialect.builtin(&call.function_name.name)
            .is_some_and(|builtin| !builtin.control_flow_side_effects.can_continue)
    }
}
