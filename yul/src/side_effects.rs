// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::ops::{Add, AddAssign};

/// What a piece of code may do to its environment. Combining two descriptors
/// (with `+`) describes running both pieces of code in sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideEffects {
    /// The code can be reordered, duplicated or removed if its result is
    /// unused. It does not depend on state that other code may change.
    pub movable: bool,

    /// The code can be removed if its result is unused.
    pub side_effect_free: bool,

    /// The code can be removed if its result is unused, provided the program
    /// never inspects the size of memory.
    pub side_effect_free_if_no_msize: bool,

    pub invalidates_storage: bool,
    pub invalidates_memory: bool,
}

impl SideEffects {
    /// The descriptor of code that does nothing.
    pub const NONE: Self = Self {
        movable: true,
        side_effect_free: true,
        side_effect_free_if_no_msize: true,
        invalidates_storage: false,
        invalidates_memory: false,
    };

    pub const WORST: Self = Self {
        movable: false,
        side_effect_free: false,
        side_effect_free_if_no_msize: false,
        invalidates_storage: true,
        invalidates_memory: true,
    };

    /// Reads state, but does not change it.
    pub const READS_STATE: Self = Self {
        movable: false,
        ..Self::NONE
    };

    /// Reads memory, which might grow it.
    pub const READS_MEMORY: Self = Self {
        movable: false,
        side_effect_free: false,
        ..Self::NONE
    };

    /// Has observable effects outside of storage and memory.
    pub const EFFECTFUL: Self = Self {
        movable: false,
        side_effect_free: false,
        side_effect_free_if_no_msize: false,
        ..Self::NONE
    };

    pub const WRITES_MEMORY: Self = Self {
        invalidates_memory: true,
        ..Self::EFFECTFUL
    };

    pub const WRITES_STORAGE: Self = Self {
        invalidates_storage: true,
        ..Self::EFFECTFUL
    };

    /// Returns whether the code may be deleted when its result is unused.
    #[must_use]
    pub const fn can_be_removed(&self, allow_msize_optimization: bool) -> bool {
        if allow_msize_optimization {
            self.side_effect_free_if_no_msize
        } else {
            self.side_effect_free
        }
    }
}

impl Default for SideEffects {
    fn default() -> Self {
        Self::NONE
    }
}

impl Add for SideEffects {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            movable: self.movable && rhs.movable,
            side_effect_free: self.side_effect_free && rhs.side_effect_free,
            side_effect_free_if_no_msize: self.side_effect_free_if_no_msize && rhs.side_effect_free_if_no_msize,
            invalidates_storage: self.invalidates_storage || rhs.invalidates_storage,
            invalidates_memory: self.invalidates_memory || rhs.invalidates_memory,
        }
    }
}

impl AddAssign for SideEffects {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// How a builtin (or function) may transfer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFlowSideEffects {
    pub can_terminate: bool,
    pub can_revert: bool,
    pub can_continue: bool,
}

impl ControlFlowSideEffects {
    pub const CONTINUES: Self = Self {
        can_terminate: false,
        can_revert: false,
        can_continue: true,
    };

    pub const TERMINATES: Self = Self {
        can_terminate: true,
        can_revert: false,
        can_continue: false,
    };

    pub const REVERTS: Self = Self {
        can_terminate: false,
        can_revert: true,
        can_continue: false,
    };

    /// Control never returns to the caller.
    #[must_use]
    pub const fn terminates_or_reverts(&self) -> bool {
        !self.can_continue
    }
}

impl Default for ControlFlowSideEffects {
    fn default() -> Self {
        Self::CONTINUES
    }
}
