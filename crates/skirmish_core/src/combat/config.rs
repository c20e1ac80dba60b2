//! Combat resolution configuration.

use serde::{Deserialize, Serialize};

/// Tunable resolution behaviour.
///
/// # Example RON
///
/// ```ron
/// CombatConfig(
///     modifier_cap: Some(1),
///     merge_defensive_modifiers: true,
///     cover_blocked_by_good_save: true,
/// )
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Cap on the net hit and wound roll modifier (None ⇒ uncapped).
    pub modifier_cap: Option<i32>,
    /// Add the defender's hit/wound modifiers to the incoming attack.
    pub merge_defensive_modifiers: bool,
    /// Cover does not improve a 3+ or better armour save against AP 0.
    pub cover_blocked_by_good_save: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            modifier_cap: None,
            merge_defensive_modifiers: true,
            cover_blocked_by_good_save: true,
        }
    }
}

impl CombatConfig {
    /// Set the net roll modifier cap.
    #[must_use]
    pub const fn with_modifier_cap(mut self, cap: i32) -> Self {
        self.modifier_cap = Some(cap);
        self
    }

    /// Enable or disable merging defensive modifiers into the attack.
    #[must_use]
    pub const fn with_defensive_merge(mut self, merge: bool) -> Self {
        self.merge_defensive_modifiers = merge;
        self
    }

    /// Apply the modifier cap to a net modifier.
    #[must_use]
    pub fn cap(&self, modifier: i32) -> i32 {
        match self.modifier_cap {
            Some(cap) => modifier.clamp(-cap.abs(), cap.abs()),
            None => modifier,
        }
    }
}
