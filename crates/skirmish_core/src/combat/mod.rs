//! Combat resolution.
//!
//! The flow for one attack:
//! 1. [`prepare_attack`] builds a [`CombatContext`] for each side, applies
//!    their rules and bakes the result into a [`CombatSnapshot`].
//! 2. A [`CombatSession`] resolves the snapshot one step at a time with dice
//!    from a caller-supplied source.
//! 3. The [`CombatResult`] is shared with the other player, who may
//!    [`CombatSession::resume`] it to run the next step.

mod abilities;
mod config;
mod context;
mod engine;
mod result;
mod snapshot;

pub use abilities::{AbilitySet, WeaponAbility};
pub use config::CombatConfig;
pub use context::{
    CombatContext, CombatContextBuilder, CombatOptions, CombatRole, Modifiers, RerollGrant,
};
pub use engine::{effective_target, wound_threshold, CombatSession};
pub use result::{
    AttacksStep, CombatBroadcast, CombatResult, CombatStage, CombatSummary, DamageRoll, DieRoll,
    FeelNoPainStep, HitsStep, SavesStep, WoundsStep, COMBAT_RESULT_VERSION,
};
pub use snapshot::{
    prepare_attack, AttackSetup, CombatSnapshot, RollModifiers, TargetSnapshot, WeaponSnapshot,
    DEFAULT_CRITICAL,
};
