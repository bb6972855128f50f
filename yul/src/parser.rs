// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use primitive_types::U256;
use strum::AsRefStr;

use crate::{
    Assignment, Block, Case, Expression, FileLocation, ForLoop, FunctionCall, FunctionDefinition, Identifier, If,
    Keyword, Lexer, Literal, LiteralKind, LiteralValue, Punctuator, Statement, Switch, Token, TokenKind, TypedName,
    VariableDeclaration, YulString,
};

pub type ParseResult<T> = Result<T, ParseDiagnostic>;

/// Parses a complete program: a single outermost block.
pub fn parse(source: &str) -> ParseResult<Block> {
    let tokens = Lexer::new(source).tokenize();
    let mut parser = Parser::new(&tokens);
    let block = parser.parse_block()?;

    if let Some(token) = parser.peek_token() {
        return Err(ParseDiagnostic::TrailingTokens { token: token.clone() });
    }

    Ok(block)
}

#[derive(Clone)]
pub struct Parser<'tokens> {
    tokens: &'tokens [Token],
    cursor: usize,
    end_of_file: FileLocation,
}

impl<'tokens> Parser<'tokens> {
    pub fn new(tokens: &'tokens [Token]) -> Self {
        let end_of_file = tokens.last().map(|token| token.end).unwrap_or_default();

        Self {
            tokens,
            cursor: 0,
            end_of_file,
        }
    }

    pub fn parse_block(&mut self) -> ParseResult<Block> {
        self.expect_punctuator(Punctuator::LeftCurlyBracket, "block")?;

        let mut statements = Vec::new();
        while !self.consume_punctuator_if(Punctuator::RightCurlyBracket) {
            statements.push(self.parse_statement()?);
        }

        Ok(Block { statements })
    }

    pub fn parse_statement(&mut self) -> ParseResult<Statement> {
        let token = self.peek_token_or_eof()?.clone();

        let statement = match &token.kind {
            TokenKind::Punctuator(Punctuator::LeftCurlyBracket) => Statement::Block(self.parse_block()?),

            TokenKind::Keyword(Keyword::Function) => {
                self.cursor += 1;
                Statement::FunctionDefinition(self.parse_function_definition()?)
            }

            TokenKind::Keyword(Keyword::Let) => {
                self.cursor += 1;
                Statement::VariableDeclaration(self.parse_variable_declaration()?)
            }

            TokenKind::Keyword(Keyword::If) => {
                self.cursor += 1;
                let condition = self.parse_expression()?;
                let body = self.parse_block()?;
                Statement::If(If { condition, body })
            }

            TokenKind::Keyword(Keyword::Switch) => {
                self.cursor += 1;
                Statement::Switch(self.parse_switch()?)
            }

            TokenKind::Keyword(Keyword::For) => {
                self.cursor += 1;
                let pre = self.parse_block()?;
                let condition = self.parse_expression()?;
                let post = self.parse_block()?;
                let body = self.parse_block()?;
                Statement::ForLoop(ForLoop { pre, condition, post, body })
            }

            TokenKind::Keyword(Keyword::Break) => {
                self.cursor += 1;
                Statement::Break
            }

            TokenKind::Keyword(Keyword::Continue) => {
                self.cursor += 1;
                Statement::Continue
            }

            TokenKind::Keyword(Keyword::Leave) => {
                self.cursor += 1;
                Statement::Leave
            }

            TokenKind::Identifier(..) => {
                if self.peek_punctuator_at(1) == Some(Punctuator::LeftParenthesis) {
                    Statement::Expression(self.parse_expression()?)
                } else {
                    Statement::Assignment(self.parse_assignment()?)
                }
            }

            _ => return Err(self.lexical_error(&token).unwrap_or(ParseDiagnostic::StatementInvalidStart { token: token.clone() })),
        };

        Ok(statement)
    }

    fn parse_function_definition(&mut self) -> ParseResult<FunctionDefinition> {
        let name = self.expect_identifier("function")?;

        self.expect_punctuator(Punctuator::LeftParenthesis, "function name")?;
        let mut parameters = Vec::new();
        if !self.consume_punctuator_if(Punctuator::RightParenthesis) {
            parameters = self.parse_typed_name_list("function parameter")?;
            self.expect_punctuator(Punctuator::RightParenthesis, "function parameters")?;
        }

        let mut return_variables = Vec::new();
        if self.consume_punctuator_if(Punctuator::Arrow) {
            return_variables = self.parse_typed_name_list("return variable")?;
        }

        let body = self.parse_block()?;

        Ok(FunctionDefinition {
            name,
            parameters,
            return_variables,
            body,
        })
    }

    fn parse_variable_declaration(&mut self) -> ParseResult<VariableDeclaration> {
        let variables = self.parse_typed_name_list("let")?;

        let value = if self.consume_punctuator_if(Punctuator::Assignment) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(VariableDeclaration { variables, value })
    }

    fn parse_assignment(&mut self) -> ParseResult<Assignment> {
        let mut variable_names = vec![Identifier::new(self.expect_identifier("assignment")?)];
        while self.consume_punctuator_if(Punctuator::Comma) {
            variable_names.push(Identifier::new(self.expect_identifier("comma")?));
        }

        self.expect_punctuator(Punctuator::Assignment, "assignment targets")?;
        let value = self.parse_expression()?;

        Ok(Assignment { variable_names, value })
    }

    fn parse_switch(&mut self) -> ParseResult<Switch> {
        let expression = self.parse_expression()?;

        let mut cases = Vec::new();
        loop {
            match self.peek_token().map(|token| &token.kind) {
                Some(TokenKind::Keyword(Keyword::Case)) => {
                    self.cursor += 1;
                    let value = match self.parse_expression()? {
                        Expression::Literal(literal) => literal,
                        _ => {
                            let token = self.tokens[self.cursor - 1].clone();
                            return Err(ParseDiagnostic::CaseValueNotLiteral { token });
                        }
                    };
                    let body = self.parse_block()?;
                    cases.push(Case { value: Some(value), body });
                }

                Some(TokenKind::Keyword(Keyword::Default)) => {
                    self.cursor += 1;
                    let body = self.parse_block()?;
                    cases.push(Case { value: None, body });
                    break;
                }

                _ => break,
            }
        }

        Ok(Switch { expression, cases })
    }

    fn parse_typed_name_list(&mut self, context: &'static str) -> ParseResult<Vec<TypedName>> {
        let mut names = vec![self.parse_typed_name(context)?];
        while self.consume_punctuator_if(Punctuator::Comma) {
            names.push(self.parse_typed_name("comma")?);
        }
        Ok(names)
    }

    fn parse_typed_name(&mut self, context: &'static str) -> ParseResult<TypedName> {
        let name = self.expect_identifier(context)?;
        let ty = if self.consume_punctuator_if(Punctuator::Colon) {
            Some(self.expect_identifier("colon")?)
        } else {
            None
        };
        Ok(TypedName { name, ty })
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        let token = self.consume_token()?.clone();

        match token.kind {
            TokenKind::Identifier(name) => {
                if !self.consume_punctuator_if(Punctuator::LeftParenthesis) {
                    return Ok(Expression::Identifier(Identifier::new(name)));
                }

                let mut arguments = Vec::new();
                if !self.consume_punctuator_if(Punctuator::RightParenthesis) {
                    loop {
                        arguments.push(self.parse_expression()?);
                        if self.consume_punctuator_if(Punctuator::RightParenthesis) {
                            break;
                        }
                        self.expect_punctuator(Punctuator::Comma, "function argument")?;
                    }
                }

                Ok(Expression::FunctionCall(FunctionCall {
                    function_name: Identifier::new(name),
                    arguments,
                }))
            }

            TokenKind::Number(ref text) => {
                let value = parse_number(text).ok_or_else(|| ParseDiagnostic::InvalidNumber { token: token.clone() })?;
                Ok(Expression::Literal(Literal {
                    kind: LiteralKind::Number,
                    value: LiteralValue::with_hint(value, text.clone()),
                }))
            }

            TokenKind::StringLiteral { spelling, bytes } => {
                Ok(Expression::Literal(Literal::string(spelling, &bytes)))
            }

            TokenKind::Keyword(Keyword::True) => Ok(Expression::Literal(Literal::boolean(true))),
            TokenKind::Keyword(Keyword::False) => Ok(Expression::Literal(Literal::boolean(false))),

            _ => Err(self.lexical_error(&token).unwrap_or(ParseDiagnostic::ExpressionInvalidStart { token })),
        }
    }

    fn lexical_error(&self, token: &Token) -> Option<ParseDiagnostic> {
        match token.kind {
            TokenKind::IllegalCharacter(..) | TokenKind::UnterminatedString | TokenKind::InvalidEscape(..) => {
                Some(ParseDiagnostic::InvalidToken { token: token.clone() })
            }
            _ => None,
        }
    }

    fn expect_identifier(&mut self, context: &'static str) -> ParseResult<YulString> {
        let token = self.consume_token()?;
        match &token.kind {
            TokenKind::Identifier(name) => Ok(name.clone()),
            _ => Err(ParseDiagnostic::ExpectedIdentifier { token: token.clone(), context }),
        }
    }

    fn expect_punctuator(&mut self, punctuator: Punctuator, context: &'static str) -> ParseResult<()> {
        let token = self.consume_token()?;
        if token.kind == TokenKind::Punctuator(punctuator) {
            Ok(())
        } else {
            Err(ParseDiagnostic::ExpectedPunctuator {
                expected: punctuator.as_str(),
                token: token.clone(),
                context,
            })
        }
    }

    fn consume_punctuator_if(&mut self, punctuator: Punctuator) -> bool {
        if self.peek_punctuator_at(0) == Some(punctuator) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn peek_punctuator_at(&self, distance: usize) -> Option<Punctuator> {
        match self.tokens.get(self.cursor + distance)?.kind {
            TokenKind::Punctuator(punctuator) => Some(punctuator),
            _ => None,
        }
    }

    fn peek_token(&self) -> Option<&'tokens Token> {
        self.tokens.get(self.cursor)
    }

    fn peek_token_or_eof(&self) -> ParseResult<&'tokens Token> {
        self.peek_token().ok_or(ParseDiagnostic::UnexpectedEndOfFile { location: self.end_of_file })
    }

    fn consume_token(&mut self) -> ParseResult<&'tokens Token> {
        let token = self.peek_token_or_eof()?;
        self.cursor += 1;
        Ok(token)
    }
}

fn parse_number(text: &str) -> Option<U256> {
    if let Some(digits) = text.strip_prefix("0x") {
        if digits.is_empty() || digits.len() > 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return U256::from_str_radix(digits, 16).ok();
    }

    if !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    U256::from_dec_str(text).ok()
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, AsRefStr)]
pub enum ParseDiagnostic {
    #[error("Unexpected end of input at {location}")]
    UnexpectedEndOfFile { location: FileLocation },

    #[error("Expected `{expected}` after {context}, but got: {token}")]
    ExpectedPunctuator { expected: &'static str, token: Token, context: &'static str },

    #[error("Expected an identifier after {context}, but got: {token}")]
    ExpectedIdentifier { token: Token, context: &'static str },

    #[error("Invalid start of a statement: {token}")]
    StatementInvalidStart { token: Token },

    #[error("Invalid start of an expression: {token}")]
    ExpressionInvalidStart { token: Token },

    #[error("Invalid number literal: {token}")]
    InvalidNumber { token: Token },

    #[error("Switch cases need a literal value: {token}")]
    CaseValueNotLiteral { token: Token },

    #[error("Invalid token: {token}")]
    InvalidToken { token: Token },

    #[error("Unexpected input after the outermost block: {token}")]
    TrailingTokens { token: Token },
}
