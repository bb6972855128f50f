// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeSet;

use yul::{Dialect, YulString};

use crate::{analysis::CostOracle, steps::ReasoningOracle, NameDispenser, OptimiserSettings};

/// Everything a step may use besides the AST itself.
pub struct OptimiserStepContext<'a> {
    pub dialect: &'a dyn Dialect,
    pub dispenser: &'a mut NameDispenser,

    /// Names that are used from outside the program. They are never renamed
    /// or removed.
    pub reserved_identifiers: &'a BTreeSet<YulString>,

    pub settings: &'a OptimiserSettings,
    pub cost_oracle: &'a dyn CostOracle,
    pub reasoning_oracle: Option<&'a dyn ReasoningOracle>,
}
