// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use primitive_types::U256;

use crate::YulString;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Literal(Literal),
    Identifier(Identifier),
    FunctionCall(FunctionCall),
}

impl Expression {
    #[must_use]
    pub fn identifier(name: impl Into<YulString>) -> Self {
        Self::Identifier(Identifier::new(name))
    }

    #[must_use]
    pub fn number(value: impl Into<U256>) -> Self {
        Self::Literal(Literal::number(value.into()))
    }

    #[must_use]
    pub fn call(function_name: impl Into<YulString>, arguments: Vec<Expression>) -> Self {
        Self::FunctionCall(FunctionCall {
            function_name: Identifier::new(function_name),
            arguments,
        })
    }

    #[must_use]
    pub fn as_identifier(&self) -> Option<&YulString> {
        match self {
            Self::Identifier(identifier) => Some(&identifier.name),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Self::FunctionCall(call) => Some(call),
            _ => None,
        }
    }

    /// The number of nested function calls, counting this expression. Walks
    /// the tree with an explicit stack, so arbitrarily deep input is fine.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 0)];

        while let Some((expression, above)) = pending.pop() {
            if let Self::FunctionCall(call) = expression {
                let depth = above + 1;
                deepest = deepest.max(depth);
                pending.extend(call.arguments.iter().map(|argument| (argument, depth)));
            }
        }

        deepest
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: YulString,
}

impl Identifier {
    #[must_use]
    pub fn new(name: impl Into<YulString>) -> Self {
        Self {
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub function_name: Identifier,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    Boolean,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub value: LiteralValue,
}

impl Literal {
    #[must_use]
    pub fn number(value: U256) -> Self {
        Self {
            kind: LiteralKind::Number,
            value: LiteralValue::new(value),
        }
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self {
            kind: LiteralKind::Boolean,
            value: LiteralValue::new(if value { U256::one() } else { U256::zero() }),
        }
    }

    /// Creates a string literal from its source spelling (between the quotes)
    /// and the bytes it denotes. Strings longer than a word have no numeric
    /// value.
    #[must_use]
    pub fn string(spelling: impl Into<YulString>, bytes: &[u8]) -> Self {
        let value = (bytes.len() <= 32).then(|| {
            let mut word = [0u8; 32];
            word[..bytes.len()].copy_from_slice(bytes);
            U256::from_big_endian(&word)
        });

        Self {
            kind: LiteralKind::String,
            value: LiteralValue {
                value,
                hint: Some(spelling.into()),
            },
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<U256> {
        self.value.value
    }
}

/// The value of a literal. Literals whose value does not fit in a word only
/// carry their spelling.
#[derive(Debug, Clone)]
pub struct LiteralValue {
    value: Option<U256>,
    hint: Option<YulString>,
}

impl LiteralValue {
    #[must_use]
    pub fn new(value: U256) -> Self {
        Self {
            value: Some(value),
            hint: None,
        }
    }

    #[must_use]
    pub fn with_hint(value: U256, hint: impl Into<YulString>) -> Self {
        Self {
            value: Some(value),
            hint: Some(hint.into()),
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<U256> {
        self.value
    }

    #[must_use]
    pub fn hint(&self) -> Option<&YulString> {
        self.hint.as_ref()
    }
}

impl PartialEq for LiteralValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.value, other.value) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => self.hint == other.hint,
        }
    }
}

impl Eq for LiteralValue {}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Expression::number(1u64), 0)]
    #[case(Expression::identifier("x"), 0)]
    #[case(Expression::call("gas", vec![]), 1)]
    #[case(
        Expression::call("add", vec![
            Expression::call("not", vec![Expression::call("not", vec![Expression::number(1u64)])]),
            Expression::number(2u64),
        ]),
        3,
    )]
    #[case(
        Expression::call("add", vec![
            Expression::number(2u64),
            Expression::call("mul", vec![Expression::identifier("x"), Expression::call("gas", vec![])]),
        ]),
        3,
    )]
    fn depth_counts_the_deepest_chain_of_calls(#[case] expression: Expression, #[case] expected: usize) {
        assert_eq!(expression.depth(), expected);
    }

    #[test]
    fn depth_of_a_very_deep_expression() {
        const NESTING: usize = 100_000;

        let mut expression = Expression::number(0u64);
        for _ in 0..NESTING {
            expression = Expression::call("not", vec![expression]);
        }

        assert_eq!(expression.depth(), NESTING);

        // Taken apart one level at a time, as dropping the whole chain at
        // once recurses.
        while let Expression::FunctionCall(mut call) = expression {
            expression = call.arguments.pop().unwrap_or_else(|| Expression::number(0u64));
        }
    }

    #[test]
    fn literal_equality_ignores_spelling() {
        let hex = Literal {
            kind: LiteralKind::Number,
            value: LiteralValue::with_hint(U256::from(16), "0x10"),
        };

        assert_eq!(hex, Literal::number(U256::from(16)));
        assert_ne!(hex, Literal::boolean(true));
    }

    #[test]
    fn string_literals_are_left_aligned() {
        let literal = Literal::string("ab", b"ab");
        assert_eq!(literal.value().map(|v| v.byte(31)), Some(b'a'));
        assert_eq!(literal.value().map(|v| v.byte(30)), Some(b'b'));

        let long = "x".repeat(33);
        assert_eq!(Literal::string(long.as_str(), long.as_bytes()).value(), None);
    }
}
