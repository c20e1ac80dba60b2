//! # Skirmish Core
//!
//! Rules engine and combat resolution core for Skirmish Ledger.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (dice come from a caller-supplied source)
//!
//! This separation enables:
//! - Sharing one combat result between two clients
//! - Resuming a resolution from a transmitted snapshot
//! - Replaying raw dice for audits and tests
//!
//! ## Crate Structure
//!
//! - [`data`] - Army, unit, model and weapon snapshots
//! - [`rules`] - Rule model, condition evaluation, aggregation, reminders
//! - [`combat`] - Combat contexts, snapshots and step-by-step resolution
//! - [`dice`] - Dice expressions and dice sources
//! - [`game`] - Turn and phase state

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod data;
pub mod dice;
pub mod error;
pub mod game;
pub mod rules;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::{
        prepare_attack, AttackSetup, CombatBroadcast, CombatConfig, CombatContext, CombatOptions,
        CombatResult, CombatRole, CombatSession, CombatSnapshot, CombatStage, WeaponAbility,
    };
    pub use crate::data::{Army, ArmyState, Attachment, Model, ModelCharacteristics, RuleRecord, Unit, UnitView, Weapon, WeaponKind};
    pub use crate::dice::{parse_dice, DiceExpr, DiceSource, ScriptedDice, SeededDice};
    pub use crate::error::{EngineError, Result};
    pub use crate::game::{GameState, Phase, PhaseFilter, PlayerId, TurnContext, TurnFilter};
    pub use crate::rules::{
        apply_rule, apply_rules, evaluate, get_all_unit_rules, get_reactive_units, get_unit_reminders,
        Effect, Rule, RuleLibrary, Scope, Trigger, WhenExpr,
    };
}
