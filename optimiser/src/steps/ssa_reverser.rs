// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use yul::{
    visit::{walk_block_mut, VisitorMut},
    Assignment, Block, Expression, Statement, VariableDeclaration,
};

use crate::{OptimiserStep, OptimiserStepContext};

/// Undoes the variable splitting of [`SSATransform`](super::SSATransform)
/// where it does not pay off, by turning
///
/// ```text
/// let a_1 := E        a := E
/// a := a_1        =>  let a_1 := a
/// ```
///
/// and the corresponding pair of declarations. Together with the
/// [`CommonSubexpressionEliminator`](super::CommonSubexpressionEliminator)
/// and the [`UnusedPruner`](super::UnusedPruner) this removes the extra
/// variables.
#[derive(Debug, Default)]
pub struct SSAReverser;

impl OptimiserStep for SSAReverser {
    const NAME: &'static str = "SSAReverser";
    const ABBREVIATION: char = 'V';

    fn run(&mut self, _: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        self.visit_block(ast);
    }
}

impl VisitorMut for SSAReverser {
    fn visit_block(&mut self, block: &mut Block) {
        walk_block_mut(self, block);

        let mut index = 0;
        while index + 1 < block.statements.len() {
            let reversed = match &mut block.statements[index..=index + 1] {
                [first, second] => reverse(first, second),
                _ => false,
            };

            index += if reversed { 2 } else { 1 };
        }
    }
}

fn reverse(first: &mut Statement, second: &mut Statement) -> bool {
    let Statement::VariableDeclaration(declaration) = first else {
        return false;
    };
    let ([variable], Some(..)) = (declaration.variables.as_slice(), &declaration.value) else {
        return false;
    };
    let name = variable.name.clone();

    match second {
        Statement::Assignment(assignment)
            if assignment.variable_names.len() == 1 && assignment.value.as_identifier() == Some(&name) =>
        {
            let target = assignment.variable_names[0].clone();
            let value = declaration.value.take().unwrap_or_else(|| Expression::number(0u64));

            *second = Statement::VariableDeclaration(VariableDeclaration {
                variables: std::mem::take(&mut declaration.variables),
                value: Some(Expression::Identifier(target.clone())),
            });
            *first = Statement::Assignment(Assignment {
                variable_names: vec![target],
                value,
            });
            true
        }

        Statement::VariableDeclaration(other)
            if other.variables.len() == 1 && other.value.as_ref().and_then(Expression::as_identifier) == Some(&name) =>
        {
            let variable = other.variables[0].clone();
            let value = declaration.value.take();

            *second = Statement::VariableDeclaration(VariableDeclaration {
                variables: std::mem::take(&mut declaration.variables),
                value: Some(Expression::identifier(variable.name.clone())),
            });
            *first = Statement::VariableDeclaration(VariableDeclaration {
                variables: vec![variable],
                value,
            });
            true
        }

        _ => false,
    }
}
