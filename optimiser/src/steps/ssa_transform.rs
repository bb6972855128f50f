// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use yul::{
    visit::{
        iterate_replacing, walk_assignment_mut, walk_block_mut, walk_function_definition_mut, walk_statement_mut,
        walk_variable_declaration_mut, VisitorMut,
    },
    Assignment, Block, Expression, ForLoop, FunctionDefinition, Identifier, Statement, Switch, TypedName,
    VariableDeclaration, YulString,
};

use crate::{names::Assignments, AstInvariant, NameDispenser, OptimiserStep, OptimiserStepContext};

/// Gives every value a variable takes its own variable, which is assigned
/// exactly once. The original variables keep being assigned, so the result
/// is still correct where the new variables cannot be used:
///
/// ```text
/// let a := 1           let a_1 := 1 let a := a_1
/// a := add(a, 2)   =>  let a_2 := add(a_1, 2) a := a_2
/// sstore(0, a)         sstore(0, a_2)
/// ```
///
/// After control flow joins, the original variable is copied into a new
/// variable again.
#[derive(Debug, Default)]
pub struct SSATransform;

impl OptimiserStep for SSATransform {
    const NAME: &'static str = "SSATransform";
    const ABBREVIATION: char = 'a';
    const REQUIRES: &'static [AstInvariant] = &[AstInvariant::Disambiguated, AstInvariant::ForLoopInitRewritten];

    fn run(&mut self, ctx: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        let assigned = Assignments::in_block(ast);

        IntroduceSsa {
            dispenser: &mut *ctx.dispenser,
            to_replace: &assigned,
        }
        .visit_block(ast);

        IntroduceControlFlowSsa {
            dispenser: &mut *ctx.dispenser,
            to_replace: &assigned,
            in_scope: BTreeSet::new(),
            to_reassign: Vec::new(),
        }
        .visit_block(ast);

        PropagateValues {
            to_replace: &assigned,
            current_values: BTreeMap::new(),
            clear_at_end_of_block: BTreeSet::new(),
        }
        .visit_block(ast);
    }
}

fn push_unique(names: &mut Vec<YulString>, name: YulString) {
    if !names.contains(&name) {
        names.push(name);
    }
}

/// Splits `let a := v` into `let a_1 := v let a := a_1`, and `a := v`
/// into `let a_1 := v a := a_1`, for every variable that is assigned
/// somewhere.
struct IntroduceSsa<'a> {
    dispenser: &'a mut NameDispenser,
    to_replace: &'a BTreeSet<YulString>,
}

impl VisitorMut for IntroduceSsa<'_> {
    fn visit_block(&mut self, block: &mut Block) {
        iterate_replacing(&mut block.statements, |statement| match statement {
            Statement::VariableDeclaration(declaration) => {
                if !declaration.variables.iter().any(|variable| self.to_replace.contains(&variable.name)) {
                    return None;
                }

                let mut fresh = Vec::new();
                let mut statements = Vec::new();
                for variable in &declaration.variables {
                    let name = self.dispenser.new_name(&variable.name);
                    fresh.push(TypedName {
                        name: name.clone(),
                        ty: variable.ty.clone(),
                    });
                    statements.push(Statement::VariableDeclaration(VariableDeclaration {
                        variables: vec![variable.clone()],
                        value: Some(Expression::identifier(name)),
                    }));
                }

                statements.insert(0, Statement::VariableDeclaration(VariableDeclaration {
                    variables: fresh,
                    value: declaration.value.take(),
                }));
                Some(statements)
            }

            Statement::Assignment(assignment) => {
                let mut fresh = Vec::new();
                let mut statements = Vec::new();
                for target in &assignment.variable_names {
                    assert!(self.to_replace.contains(&target.name), "assigned variable `{}` was not collected", target.name);

                    let name = self.dispenser.new_name(&target.name);
                    fresh.push(TypedName::new(name.clone()));
                    statements.push(Statement::Assignment(Assignment {
                        variable_names: vec![target.clone()],
                        value: Expression::identifier(name),
                    }));
                }

                let value = std::mem::replace(&mut assignment.value, Expression::number(0u64));
                statements.insert(0, Statement::VariableDeclaration(VariableDeclaration {
                    variables: fresh,
                    value: Some(value),
                }));
                Some(statements)
            }

            _ => {
                walk_statement_mut(self, statement);
                None
            }
        });
    }
}

/// Inserts `let a_1 := a` where control flow joins after `a` may have been
/// assigned, at the start of loop bodies and post blocks, and at the start
/// of functions for reassigned parameters.
struct IntroduceControlFlowSsa<'a> {
    dispenser: &'a mut NameDispenser,
    to_replace: &'a BTreeSet<YulString>,
    in_scope: BTreeSet<YulString>,

    /// Variables whose value is unknown at the next statement.
    to_reassign: Vec<YulString>,
}

impl VisitorMut for IntroduceControlFlowSsa<'_> {
    fn visit_function_definition(&mut self, function: &mut FunctionDefinition) {
        let in_scope = std::mem::take(&mut self.in_scope);
        let to_reassign = std::mem::take(&mut self.to_reassign);

        for parameter in &function.parameters {
            if self.to_replace.contains(&parameter.name) {
                self.in_scope.insert(parameter.name.clone());
                push_unique(&mut self.to_reassign, parameter.name.clone());
            }
        }

        walk_function_definition_mut(self, function);

        self.in_scope = in_scope;
        self.to_reassign = to_reassign;
    }

    fn visit_for_loop(&mut self, for_loop: &mut ForLoop) {
        assert!(for_loop.pre.is_empty(), "for loop pre blocks should have been moved out");

        let mut assigned = Assignments::in_block(&for_loop.body);
        assigned.extend(Assignments::in_block(&for_loop.post));
        for name in assigned {
            if self.in_scope.contains(&name) {
                push_unique(&mut self.to_reassign, name);
            }
        }

        self.visit_block(&mut for_loop.body);
        self.visit_block(&mut for_loop.post);
    }

    fn visit_switch(&mut self, switch: &mut Switch) {
        debug_assert!(self.to_reassign.is_empty());

        let mut to_reassign = Vec::new();
        for case in &mut switch.cases {
            self.visit_block(&mut case.body);
            for name in std::mem::take(&mut self.to_reassign) {
                push_unique(&mut to_reassign, name);
            }
        }

        self.to_reassign = to_reassign;
    }

    fn visit_block(&mut self, block: &mut Block) {
        let mut declared_here = Vec::new();
        let mut assigned = Vec::new();

        iterate_replacing(&mut block.statements, |statement| {
            let mut prefix = Vec::new();
            for name in std::mem::take(&mut self.to_reassign) {
                let fresh = self.dispenser.new_name(&name);
                prefix.push(Statement::VariableDeclaration(VariableDeclaration::single(fresh, Expression::identifier(name.clone()))));
                push_unique(&mut assigned, name);
            }

            match statement {
                Statement::VariableDeclaration(declaration) => {
                    for variable in &declaration.variables {
                        if self.to_replace.contains(&variable.name) {
                            push_unique(&mut declared_here, variable.name.clone());
                            self.in_scope.insert(variable.name.clone());
                        }
                    }
                }

                Statement::Assignment(assignment) => {
                    for target in &assignment.variable_names {
                        if self.to_replace.contains(&target.name) {
                            push_unique(&mut assigned, target.name.clone());
                        }
                    }
                }

                _ => walk_statement_mut(self, statement),
            }

            if prefix.is_empty() {
                return None;
            }
            prefix.push(std::mem::replace(statement, Statement::Break));
            Some(prefix)
        });

        for name in assigned {
            push_unique(&mut self.to_reassign, name);
        }
        for name in &declared_here {
            self.in_scope.remove(name);
        }
        self.to_reassign.retain(|name| !declared_here.contains(name));
    }
}

/// Replaces references to the original variables by the variable holding
/// their current value.
struct PropagateValues<'a> {
    to_replace: &'a BTreeSet<YulString>,
    current_values: BTreeMap<YulString, YulString>,
    clear_at_end_of_block: BTreeSet<YulString>,
}

impl PropagateValues<'_> {
    fn forget_assigned_in_loop(&mut self, for_loop: &ForLoop) {
        for name in Assignments::in_block(&for_loop.body).iter().chain(&Assignments::in_block(&for_loop.post)) {
            self.current_values.remove(name);
        }
    }
}

impl VisitorMut for PropagateValues<'_> {
    fn visit_identifier(&mut self, identifier: &mut Identifier) {
        if let Some(value) = self.current_values.get(&identifier.name) {
            identifier.name = value.clone();
        }
    }

    fn visit_variable_declaration(&mut self, declaration: &mut VariableDeclaration) {
        walk_variable_declaration_mut(self, declaration);

        let [variable] = declaration.variables.as_slice() else {
            return;
        };

        if self.to_replace.contains(&variable.name) {
            // let a := a_1
            let Some(Expression::Identifier(value)) = &declaration.value else {
                panic!("`{}` should be declared with a fresh variable", variable.name);
            };
            self.current_values.insert(variable.name.clone(), value.name.clone());
            self.clear_at_end_of_block.insert(variable.name.clone());
        } else if let Some(Expression::Identifier(value)) = &declaration.value {
            // let a_1 := a
            if self.to_replace.contains(&value.name) {
                self.current_values.insert(value.name.clone(), variable.name.clone());
                self.clear_at_end_of_block.insert(value.name.clone());
            }
        }
    }

    fn visit_assignment(&mut self, assignment: &mut Assignment) {
        walk_assignment_mut(self, assignment);

        let [target] = assignment.variable_names.as_slice() else {
            return;
        };
        if !self.to_replace.contains(&target.name) {
            return;
        }

        let Expression::Identifier(value) = &assignment.value else {
            panic!("`{}` should be assigned a fresh variable", target.name);
        };
        self.current_values.insert(target.name.clone(), value.name.clone());
        self.clear_at_end_of_block.insert(target.name.clone());
    }

    fn visit_for_loop(&mut self, for_loop: &mut ForLoop) {
        assert!(for_loop.pre.is_empty(), "for loop pre blocks should have been moved out");

        self.forget_assigned_in_loop(for_loop);
        self.visit_expression(&mut for_loop.condition);
        self.visit_block(&mut for_loop.body);
        self.visit_block(&mut for_loop.post);
        self.forget_assigned_in_loop(for_loop);
    }

    fn visit_block(&mut self, block: &mut Block) {
        let clear_at_parent_block = std::mem::take(&mut self.clear_at_end_of_block);

        walk_block_mut(self, block);

        for name in std::mem::replace(&mut self.clear_at_end_of_block, clear_at_parent_block) {
            self.current_values.remove(&name);
        }
    }
}
