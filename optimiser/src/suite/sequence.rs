// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

use crate::SequenceError;

use super::StepRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceItem {
    Step(char),

    /// A bracketed sub-sequence, repeated until the program stops changing.
    Repeat(Vec<SequenceItem>),
}

/// A validated step sequence, optionally followed by a cleanup sequence
/// after a `:`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepSequence {
    pub main: Vec<SequenceItem>,
    pub cleanup: Option<Vec<SequenceItem>>,
}

impl StepSequence {
    /// Parses `source`, checking that every abbreviation is known to
    /// `registry` and that the brackets are balanced. Positions in errors
    /// are character offsets.
    pub fn parse(source: &str, registry: &StepRegistry) -> Result<Self, SequenceError> {
        let mut sequence = Self::default();
        let mut open: Vec<(usize, Vec<SequenceItem>)> = Vec::new();
        let mut current = Vec::new();

        for (position, c) in source.chars().enumerate() {
            match c {
                '[' => {
                    open.push((position, std::mem::take(&mut current)));
                }

                ']' => {
                    let Some((_, mut outer)) = open.pop() else {
                        return Err(SequenceError::UnexpectedClosingBracket { position });
                    };
                    outer.push(SequenceItem::Repeat(std::mem::take(&mut current)));
                    current = outer;
                }

                ':' => {
                    if !open.is_empty() || sequence.cleanup.is_some() {
                        return Err(SequenceError::InvalidColon { position });
                    }
                    sequence.main = std::mem::take(&mut current);
                    sequence.cleanup = Some(Vec::new());
                }

                c if c.is_whitespace() => (),

                abbreviation => {
                    if registry.get(abbreviation).is_none() {
                        return Err(SequenceError::UnknownAbbreviation { abbreviation, position });
                    }
                    current.push(SequenceItem::Step(abbreviation));
                }
            }
        }

        if let Some((position, _)) = open.first() {
            return Err(SequenceError::UnterminatedBracket { position: *position });
        }

        match &mut sequence.cleanup {
            Some(cleanup) => *cleanup = current,
            None => sequence.main = current,
        }

        Ok(sequence)
    }
}

impl Display for SequenceItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(abbreviation) => write!(f, "{abbreviation}"),
            Self::Repeat(items) => {
                f.write_str("[")?;
                for item in items {
                    item.fmt(f)?;
                }
                f.write_str("]")
            }
        }
    }
}
