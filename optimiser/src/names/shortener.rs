// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use yul::{visit::VisitorMut, Block, YulString};

use super::{NameCollector, Renamer};

/// Receives a notification for every name that was shortened.
pub trait DiagnosticSink {
    fn name_shortened(&mut self, original: &YulString, shortened: &YulString);
}

/// Writes every shortened name to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn name_shortened(&mut self, original: &YulString, shortened: &YulString) {
        info!("Shortened `{original}` to `{shortened}`");
    }
}

impl DiagnosticSink for Vec<(YulString, YulString)> {
    fn name_shortened(&mut self, original: &YulString, shortened: &YulString) {
        self.push((original.clone(), shortened.clone()));
    }
}

/// Truncates declared names that are longer than a given length. A
/// truncated name that collides with another name gets the first free
/// `_1`, `_2`, ... suffix.
pub struct NameShortener;

impl NameShortener {
    pub fn shorten(ast: &mut Block, max_length: usize, sink: &mut dyn DiagnosticSink, reserved: &BTreeSet<YulString>) {
        let declared = NameCollector::declared_names(ast);

        let mut used: BTreeSet<YulString> = declared.iter()
            .filter(|name| name.chars().count() <= max_length || reserved.contains(*name))
            .cloned()
            .collect();
        used.extend(reserved.iter().cloned());

        let mut translations = BTreeMap::new();
        for name in &declared {
            if reserved.contains(name) || name.chars().count() <= max_length {
                continue;
            }

            let truncated: String = name.chars().take(max_length).collect();
            let mut shortened = YulString::from(truncated.as_str());
            let mut suffix = 0;
            while used.contains(&shortened) {
                suffix += 1;
                shortened = YulString::from(format!("{truncated}_{suffix}"));
            }

            used.insert(shortened.clone());
            sink.name_shortened(name, &shortened);
            translations.insert(name.clone(), shortened);
        }

        if !translations.is_empty() {
            Renamer::new(&translations).visit_block(ast);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use yul::parse;

    use super::*;

    #[test]
    fn tries_suffixes_on_collision() {
        let mut block = parse("{ let abcdef := 1 let abcxyz := 2 let abc := 3 let x := add(abcdef, abcxyz) }").unwrap();
        let mut reported = Vec::new();

        NameShortener::shorten(&mut block, 3, &mut reported, &BTreeSet::new());

        assert_eq!(block, parse("{ let abc_1 := 1 let abc_2 := 2 let abc := 3 let x := add(abc_1, abc_2) }").unwrap());
        assert_eq!(reported, vec![
            (YulString::from("abcdef"), YulString::from("abc_1")),
            (YulString::from("abcxyz"), YulString::from("abc_2")),
        ]);
    }

    #[test]
    fn keeps_reserved_names() {
        let mut block = parse("{ function external_entry() { } }").unwrap();
        let reserved = BTreeSet::from([YulString::from("external_entry")]);

        NameShortener::shorten(&mut block, 4, &mut LogSink, &reserved);

        assert_eq!(block, parse("{ function external_entry() { } }").unwrap());
    }
}
