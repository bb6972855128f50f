// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::{Display, Formatter, Result, Write};

use crate::{Block, Case, Expression, FunctionCall, Literal, LiteralKind, Statement, TypedName};

const INDENT: &str = "    ";

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Literal(literal) => literal.fmt(f),
            Self::Identifier(identifier) => f.write_str(&identifier.name),
            Self::FunctionCall(call) => call.fmt(f),
        }
    }
}

impl Display for FunctionCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(&self.function_name.name)?;
        f.write_char('(')?;
        for (idx, argument) in self.arguments.iter().enumerate() {
            if idx != 0 {
                f.write_str(", ")?;
            }
            argument.fmt(f)?;
        }
        f.write_char(')')
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.kind {
            LiteralKind::Boolean => {
                let is_true = self.value().is_some_and(|v| !v.is_zero());
                f.write_str(if is_true { "true" } else { "false" })
            }

            LiteralKind::Number => {
                if let Some(hint) = self.value.hint() {
                    return f.write_str(hint);
                }

                match self.value() {
                    Some(value) if value.bits() <= 64 => write!(f, "{value}"),
                    Some(value) => write!(f, "0x{value:x}"),
                    None => f.write_str("0"),
                }
            }

            LiteralKind::String => {
                f.write_char('"')?;
                if let Some(hint) = self.value.hint() {
                    f.write_str(hint)?;
                } else if let Some(value) = self.value() {
                    let mut bytes = [0u8; 32];
                    value.to_big_endian(&mut bytes);
                    let length = bytes.iter().rposition(|b| *b != 0).map_or(0, |idx| idx + 1);
                    for byte in &bytes[..length] {
                        write!(f, "\\x{byte:02x}")?;
                    }
                }
                f.write_char('"')
            }
        }
    }
}

impl Display for TypedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(&self.name)?;
        if let Some(ty) = &self.ty {
            write!(f, ":{ty}")?;
        }
        Ok(())
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write_block(f, self, 0)
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write_statement(f, self, 0)
    }
}

fn write_indent(f: &mut Formatter<'_>, indent: usize) -> Result {
    for _ in 0..indent {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> Result {
    for (idx, item) in items.iter().enumerate() {
        if idx != 0 {
            f.write_str(", ")?;
        }
        item.fmt(f)?;
    }
    Ok(())
}

fn write_block(f: &mut Formatter<'_>, block: &Block, indent: usize) -> Result {
    if block.statements.is_empty() {
        return f.write_str("{ }");
    }

    f.write_str("{\n")?;
    for statement in &block.statements {
        write_indent(f, indent + 1)?;
        write_statement(f, statement, indent + 1)?;
        f.write_char('\n')?;
    }
    write_indent(f, indent)?;
    f.write_char('}')
}

fn write_statement(f: &mut Formatter<'_>, statement: &Statement, indent: usize) -> Result {
    match statement {
        Statement::Expression(expression) => expression.fmt(f),

        Statement::Assignment(assignment) => {
            let names: Vec<_> = assignment.variable_names.iter().map(|v| v.name.clone()).collect();
            write_list(f, &names)?;
            write!(f, " := {}", assignment.value)
        }

        Statement::VariableDeclaration(declaration) => {
            f.write_str("let ")?;
            write_list(f, &declaration.variables)?;
            if let Some(value) = &declaration.value {
                write!(f, " := {value}")?;
            }
            Ok(())
        }

        Statement::FunctionDefinition(function) => {
            write!(f, "function {}(", function.name)?;
            write_list(f, &function.parameters)?;
            f.write_char(')')?;
            if !function.return_variables.is_empty() {
                f.write_str(" -> ")?;
                write_list(f, &function.return_variables)?;
            }
            f.write_char(' ')?;
            write_block(f, &function.body, indent)
        }

        Statement::If(statement) => {
            write!(f, "if {} ", statement.condition)?;
            write_block(f, &statement.body, indent)
        }

        Statement::Switch(switch) => {
            write!(f, "switch {}", switch.expression)?;
            for case in &switch.cases {
                f.write_char('\n')?;
                write_indent(f, indent)?;
                write_case(f, case, indent)?;
            }
            Ok(())
        }

        Statement::ForLoop(for_loop) => {
            f.write_str("for ")?;
            write_block(f, &for_loop.pre, indent)?;
            write!(f, " {} ", for_loop.condition)?;
            write_block(f, &for_loop.post, indent)?;
            f.write_char(' ')?;
            write_block(f, &for_loop.body, indent)
        }

        Statement::Break => f.write_str("break"),
        Statement::Continue => f.write_str("continue"),
        Statement::Leave => f.write_str("leave"),
        Statement::Block(block) => write_block(f, block, indent),
    }
}

fn write_case(f: &mut Formatter<'_>, case: &Case, indent: usize) -> Result {
    match &case.value {
        Some(value) => write!(f, "case {value} ")?,
        None => f.write_str("default ")?,
    }
    write_block(f, &case.body, indent)
}
