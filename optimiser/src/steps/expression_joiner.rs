// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use yul::{Block, Expression, Statement, YulString};

use crate::{names::ReferencesCounter, OptimiserStep, OptimiserStepContext};

/// Moves the value of a variable that is referenced exactly once into its
/// use, if the variable is declared by the statement right before it and
/// no code is evaluated in between.
#[derive(Debug, Default)]
pub struct ExpressionJoiner;

impl OptimiserStep for ExpressionJoiner {
    const NAME: &'static str = "ExpressionJoiner";
    const ABBREVIATION: char = 'j';

    fn run(&mut self, _: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let joiner = Joiner {
            references: ReferencesCounter::count_block(ast),
        };
        joiner.join_block(ast);
    }
}

struct Joiner {
    references: BTreeMap<YulString, usize>,
}

/// The statements before the statement that is being joined into.
struct Candidates<'a> {
    statements: &'a mut [Statement],
    latest: Option<usize>,
    joined: &'a mut BTreeSet<usize>,
}

impl Joiner {
    fn join_block(&self, block: &mut Block) {
        let mut joined = BTreeSet::new();

        for index in 0..block.statements.len() {
            let (previous, rest) = block.statements.split_at_mut(index);
            let mut candidates = Candidates {
                statements: previous,
                latest: index.checked_sub(1),
                joined: &mut joined,
            };
            self.join_statement(&mut rest[0], &mut candidates);
        }

        if !joined.is_empty() {
            let mut index = 0;
            block.statements.retain(|_| {
                index += 1;
                !joined.contains(&(index - 1))
            });
        }
    }

    fn join_statement(&self, statement: &mut Statement, candidates: &mut Candidates<'_>) {
        match statement {
            Statement::Expression(expression) => self.join_expression(expression, candidates),
            Statement::Assignment(assignment) => self.join_expression(&mut assignment.value, candidates),
            Statement::VariableDeclaration(declaration) => {
                if let Some(value) = &mut declaration.value {
                    self.join_expression(value, candidates);
                }
            }

            Statement::If(statement) => {
                self.join_expression(&mut statement.condition, candidates);
                self.join_block(&mut statement.body);
            }

            Statement::Switch(switch) => {
                self.join_expression(&mut switch.expression, candidates);
                for case in &mut switch.cases {
                    self.join_block(&mut case.body);
                }
            }

            // The condition is evaluated more than once.
            Statement::ForLoop(for_loop) => {
                self.join_block(&mut for_loop.pre);
                self.join_block(&mut for_loop.body);
                self.join_block(&mut for_loop.post);
            }

            Statement::FunctionDefinition(function) => self.join_block(&mut function.body),
            Statement::Block(block) => self.join_block(block),

            Statement::Break | Statement::Continue | Statement::Leave => (),
        }
    }

    fn join_expression(&self, expression: &mut Expression, candidates: &mut Candidates<'_>) {
        match expression {
            Expression::Identifier(identifier) => {
                let name = identifier.name.clone();
                if let Some(value) = self.take_joinable(&name, candidates) {
                    *expression = value;
                }
            }

            // Arguments are evaluated from right to left, so only the
            // arguments from the last one with code in it onwards can be
            // joined into.
            Expression::FunctionCall(call) => {
                let start = call.arguments.iter()
                    .rposition(|argument| !matches!(argument, Expression::Identifier(..) | Expression::Literal(..)))
                    .unwrap_or(0);

                for argument in &mut call.arguments[start..] {
                    self.join_expression(argument, candidates);
                }
            }

            Expression::Literal(..) => (),
        }
    }

    fn take_joinable(&self, name: &YulString, candidates: &mut Candidates<'_>) -> Option<Expression> {
        let index = candidates.latest?;
        let Statement::VariableDeclaration(declaration) = &mut candidates.statements[index] else {
            return None;
        };

        let [variable] = declaration.variables.as_slice() else {
            return None;
        };
        if variable.name != *name || self.references.get(name) != Some(&1) {
            return None;
        }

        let value = declaration.value.take()?;
        candidates.joined.insert(index);
        candidates.latest = index.checked_sub(1);
        Some(value)
    }
}
