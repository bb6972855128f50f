// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{iter::Peekable, str::{CharIndices, FromStr}};

use crate::{FileLocation, Keyword, Punctuator, Token, TokenKind, YulString};

pub struct Lexer<'source_code> {
    input: &'source_code str,
    chars: Peekable<CharIndices<'source_code>>,
    line: usize,
    column: usize,
}

impl<'source_code> Lexer<'source_code> {
    pub fn new(input: &'source_code str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 0,
            column: 0,
        }
    }

    /// Collects all remaining tokens.
    #[must_use]
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next() {
            tokens.push(token);
        }
        tokens
    }

    pub fn next(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();

        let ch = self.peek_char()?;
        let begin = self.current_location();

        let kind = match ch {
            '"' => self.consume_string(),
            'a'..='z' | 'A'..='Z' | '_' | '$' => self.consume_identifier_or_keyword(),
            '0'..='9' => self.consume_number(),

            '{' => self.consume_punctuator(Punctuator::LeftCurlyBracket),
            '}' => self.consume_punctuator(Punctuator::RightCurlyBracket),
            '(' => self.consume_punctuator(Punctuator::LeftParenthesis),
            ')' => self.consume_punctuator(Punctuator::RightParenthesis),
            ',' => self.consume_punctuator(Punctuator::Comma),

            ':' => {
                self.consume_char();
                if self.peek_char() == Some('=') {
                    self.consume_char();
                    TokenKind::Punctuator(Punctuator::Assignment)
                } else {
                    TokenKind::Punctuator(Punctuator::Colon)
                }
            }

            '-' => {
                self.consume_char();
                if self.peek_char() == Some('>') {
                    self.consume_char();
                    TokenKind::Punctuator(Punctuator::Arrow)
                } else {
                    TokenKind::IllegalCharacter('-')
                }
            }

            _ => {
                self.consume_char();
                TokenKind::IllegalCharacter(ch)
            }
        };

        Some(Token {
            kind,
            begin,
            end: self.current_location(),
        })
    }

    fn consume_punctuator(&mut self, punctuator: Punctuator) -> TokenKind {
        self.consume_char();
        TokenKind::Punctuator(punctuator)
    }

    fn consume_identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.current_location().offset();

        while let Some(c) = self.peek_char() {
            if !(c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.') {
                break;
            }
            self.consume_char();
        }

        let text = &self.input[start..self.current_location().offset()];
        match Keyword::from_str(text) {
            Ok(keyword) => TokenKind::Keyword(keyword),
            Err(..) => TokenKind::Identifier(YulString::from(text)),
        }
    }

    fn consume_number(&mut self) -> TokenKind {
        let start = self.current_location().offset();

        while let Some(c) = self.peek_char() {
            if !c.is_ascii_alphanumeric() {
                break;
            }
            self.consume_char();
        }

        TokenKind::Number(YulString::from(&self.input[start..self.current_location().offset()]))
    }

    fn consume_string(&mut self) -> TokenKind {
        assert_eq!(self.next_char(), Some('"'));

        let start = self.current_location().offset();
        let mut bytes = Vec::new();
        let mut invalid_escape = None;

        loop {
            let Some(c) = self.next_char() else {
                return TokenKind::UnterminatedString;
            };

            match c {
                '"' => break,
                '\n' => return TokenKind::UnterminatedString,
                '\\' => {
                    let Some(escape) = self.next_char() else {
                        return TokenKind::UnterminatedString;
                    };

                    match escape {
                        '\\' | '"' | '\'' => bytes.push(escape as u8),
                        'n' => bytes.push(b'\n'),
                        'r' => bytes.push(b'\r'),
                        't' => bytes.push(b'\t'),
                        'x' => match self.consume_hex_digits(2) {
                            Some(value) => bytes.push(value as u8),
                            None => invalid_escape = invalid_escape.or(Some(escape)),
                        },
                        'u' => match self.consume_hex_digits(4).and_then(char::from_u32) {
                            Some(c) => bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
                            None => invalid_escape = invalid_escape.or(Some(escape)),
                        },
                        _ => invalid_escape = invalid_escape.or(Some(escape)),
                    }
                }
                _ => bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
            }
        }

        if let Some(escape) = invalid_escape {
            return TokenKind::InvalidEscape(escape);
        }

        // The closing quote is one byte long.
        let end = self.current_location().offset() - 1;
        TokenKind::StringLiteral {
            spelling: YulString::from(&self.input[start..end]),
            bytes,
        }
    }

    fn consume_hex_digits(&mut self, count: usize) -> Option<u32> {
        let mut value = 0;
        for _ in 0..count {
            let digit = self.peek_char()?.to_digit(16)?;
            self.consume_char();
            value = value * 16 + digit;
        }
        Some(value)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.consume_char();
                }

                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek().map(|(_, c)| *c) {
                        Some('/') => {
                            while self.peek_char().is_some_and(|c| c != '\n') {
                                self.consume_char();
                            }
                        }
                        Some('*') => {
                            self.consume_char();
                            self.consume_char();
                            let mut previous = '\0';
                            while let Some(c) = self.next_char() {
                                if previous == '*' && c == '/' {
                                    break;
                                }
                                previous = c;
                            }
                        }
                        _ => return,
                    }
                }

                _ => return,
            }
        }
    }

    fn current_location(&mut self) -> FileLocation {
        let offset = self.chars.peek().map_or(self.input.len(), |(offset, _)| *offset);
        FileLocation::new(offset, self.line, self.column)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn consume_char(&mut self) {
        _ = self.next_char();
    }

    fn next_char(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input).tokenize().into_iter().map(|token| token.kind).collect()
    }

    #[rstest]
    #[case("let", TokenKind::Keyword(Keyword::Let))]
    #[case("x.y$z", TokenKind::Identifier(YulString::from("x.y$z")))]
    #[case("0x1f", TokenKind::Number(YulString::from("0x1f")))]
    #[case(":=", TokenKind::Punctuator(Punctuator::Assignment))]
    #[case("->", TokenKind::Punctuator(Punctuator::Arrow))]
    #[case("#", TokenKind::IllegalCharacter('#'))]
    fn single_token(#[case] input: &str, #[case] expected: TokenKind) {
        assert_eq!(kinds(input), vec![expected]);
    }

    #[test]
    fn skips_comments() {
        assert_eq!(kinds("// a\n/* b * c */ leave"), vec![TokenKind::Keyword(Keyword::Leave)]);
    }

    #[test]
    fn decodes_string_escapes() {
        let expected = TokenKind::StringLiteral {
            spelling: YulString::from("a\\x41\\n"),
            bytes: b"aA\n".to_vec(),
        };
        assert_eq!(kinds(r#""a\x41\n""#), vec![expected]);
    }

    #[test]
    fn reports_unterminated_strings() {
        assert_eq!(kinds("\"abc"), vec![TokenKind::UnterminatedString]);
    }

    #[test]
    fn tracks_lines() {
        let tokens = Lexer::new("{\n  x\n}").tokenize();
        assert_eq!(tokens[1].begin.line(), 1);
        assert_eq!(tokens[1].begin.column(), 2);
    }
}
