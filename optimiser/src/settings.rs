// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use serde::Deserialize;

use crate::OptimiserError;

pub const DEFAULT_SEQUENCE: &str = "dhfoDgvulfTt [xa[r]scLMVcul [j] Tpeulxa[rul] xa[r]cLgvifTca[r]LSsTtfDca[r]ulc] jmul[jul] VcTcul jmul";
pub const DEFAULT_CLEANUP_SEQUENCE: &str = "fDTc";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct OptimiserSettings {
    /// The steps to run, see [`crate::StepRegistry`] for the abbreviations.
    /// A `:` separates the main sequence from the cleanup sequence.
    pub sequence: String,

    /// Runs after the main sequence, unless `sequence` contains its own.
    pub cleanup_sequence: String,

    /// The maximum number of rounds a bracketed sequence is repeated.
    pub max_rounds: usize,

    pub max_expression_depth: usize,

    /// Variables whose value costs less than this are rematerialised when
    /// they are used a few times outside of loops.
    pub rematerialisation_cost_limit: usize,

    pub full_inliner: FullInlinerSettings,
}

impl OptimiserSettings {
    pub fn from_toml(source: &str) -> Result<Self, OptimiserError> {
        Ok(toml::from_str(source)?)
    }
}

impl Default for OptimiserSettings {
    fn default() -> Self {
        Self {
            sequence: DEFAULT_SEQUENCE.to_string(),
            cleanup_sequence: DEFAULT_CLEANUP_SEQUENCE.to_string(),
            max_rounds: 12,
            max_expression_depth: 256,
            rematerialisation_cost_limit: 7,
            full_inliner: FullInlinerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct FullInlinerSettings {
    /// Functions at most this big are always inlined.
    pub tiny_function_size: usize,

    /// Nothing is inlined into functions bigger than this.
    pub max_caller_size: usize,

    /// Functions smaller than this are inlined, or twice this size when a
    /// call passes a constant.
    pub inline_threshold: usize,
}

impl Default for FullInlinerSettings {
    fn default() -> Self {
        Self {
            tiny_function_size: 1,
            max_caller_size: 45,
            inline_threshold: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let settings = OptimiserSettings::from_toml("max-rounds = 3\n\n[full-inliner]\ninline-threshold = 10\n").unwrap();

        assert_eq!(settings.max_rounds, 3);
        assert_eq!(settings.full_inliner.inline_threshold, 10);
        assert_eq!(settings.full_inliner.max_caller_size, 45);
        assert_eq!(settings.sequence, DEFAULT_SEQUENCE);
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(matches!(
            OptimiserSettings::from_toml("max-rounds = \"many\""),
            Err(OptimiserError::Settings(..)),
        ));
    }
}
