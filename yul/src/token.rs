// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::{Display, Formatter};

use strum::{AsRefStr, EnumString};

use crate::YulString;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileLocation {
    offset: usize,
    line: usize,
    column: usize,
}

impl FileLocation {
    #[must_use]
    pub const fn new(offset: usize, line: usize, column: usize) -> Self {
        Self { offset, line, column }
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }
}

impl Display for FileLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Let,
    Function,
    If,
    Switch,
    Case,
    Default,
    For,
    Break,
    Continue,
    Leave,
    True,
    False,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuator {
    LeftCurlyBracket,
    RightCurlyBracket,
    LeftParenthesis,
    RightParenthesis,
    Comma,
    Colon,
    Assignment,
    Arrow,
}

impl Punctuator {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LeftCurlyBracket => "{",
            Self::RightCurlyBracket => "}",
            Self::LeftParenthesis => "(",
            Self::RightParenthesis => ")",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Assignment => ":=",
            Self::Arrow => "->",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(YulString),
    Keyword(Keyword),
    Number(YulString),
    StringLiteral {
        spelling: YulString,
        bytes: Vec<u8>,
    },
    Punctuator(Punctuator),
    IllegalCharacter(char),
    UnterminatedString,
    InvalidEscape(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub begin: FileLocation,
    pub end: FileLocation,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TokenKind::Identifier(name) => write!(f, "identifier `{name}`"),
            TokenKind::Keyword(keyword) => write!(f, "keyword `{}`", keyword.as_ref()),
            TokenKind::Number(number) => write!(f, "number `{number}`"),
            TokenKind::StringLiteral { spelling, .. } => write!(f, "string \"{spelling}\""),
            TokenKind::Punctuator(punctuator) => write!(f, "`{}`", punctuator.as_str()),
            TokenKind::IllegalCharacter(c) => write!(f, "illegal character {c:?}"),
            TokenKind::UnterminatedString => f.write_str("unterminated string"),
            TokenKind::InvalidEscape(c) => write!(f, "invalid escape sequence `\\{c}`"),
        }?;

        write!(f, " at {}", self.begin)
    }
}
