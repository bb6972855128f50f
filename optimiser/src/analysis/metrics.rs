// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{Block, Expression, Statement};

/// A rough measure of how much code an AST fragment produces. Identifiers
/// are free, every other expression costs one unit and control flow costs
/// extra.
pub struct CodeSize;

impl CodeSize {
    #[must_use]
    pub fn of_expression(expression: &Expression) -> usize {
        match expression {
            Expression::Identifier(..) => 0,
            Expression::Literal(..) => 1,
            Expression::FunctionCall(call) => 1 + call.arguments.iter().map(Self::of_expression).sum::<usize>(),
        }
    }

    #[must_use]
    pub fn of_statement(statement: &Statement) -> usize {
        match statement {
            Statement::Expression(expression) => Self::of_expression(expression),
            Statement::Assignment(assignment) => Self::of_expression(&assignment.value),
            Statement::VariableDeclaration(declaration) => declaration.value.as_ref().map_or(0, Self::of_expression),
            Statement::FunctionDefinition(function) => 1 + Self::of_block(&function.body),
            Statement::If(statement) => 2 + Self::of_expression(&statement.condition) + Self::of_block(&statement.body),
            Statement::Switch(switch) => {
                1 + 2 * switch.cases.len()
                    + Self::of_expression(&switch.expression)
                    + switch.cases.iter().map(|case| Self::of_block(&case.body)).sum::<usize>()
            }
            Statement::ForLoop(for_loop) => {
                3 + Self::of_block(&for_loop.pre)
                    + Self::of_expression(&for_loop.condition)
                    + Self::of_block(&for_loop.body)
                    + Self::of_block(&for_loop.post)
            }
            Statement::Break | Statement::Continue | Statement::Leave => 2,
            Statement::Block(block) => Self::of_block(block),
        }
    }

    #[must_use]
    pub fn of_block(block: &Block) -> usize {
        block.statements.iter().map(Self::of_statement).sum()
    }

    /// The size of a block, not counting the functions defined in it.
    #[must_use]
    pub fn of_block_without_functions(block: &Block) -> usize {
        block.statements.iter()
            .filter(|statement| !statement.is_function_definition())
            .map(Self::of_statement)
            .sum()
    }
}

/// Estimates what an expression costs. Steps that trade code size against
/// duplicated work consult the oracle of their context.
pub trait CostOracle {
    fn expression_cost(&self, expression: &Expression) -> usize;
}

/// Uses [`CodeSize`] as the cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeSizeOracle;

impl CostOracle for CodeSizeOracle {
    fn expression_cost(&self, expression: &Expression) -> usize {
        CodeSize::of_expression(expression)
    }
}
