//! Rule model, evaluation and aggregation.
//!
//! Rules are immutable value objects decoded from serialized payloads.
//! The pipeline is: [`get_all_unit_rules`] (scope resolution across
//! attachments) → [`evaluate`] (condition trees) → [`apply_rules`]
//! (modifier accumulation). [`get_unit_reminders`] filters the same rule
//! set for display without resolving anything.

mod aggregate;
mod applier;
mod condition;
mod model;
mod payload;
pub mod registry;
mod reminders;

pub use aggregate::get_all_unit_rules;
pub use applier::{apply_rule, apply_rules, ActiveRule};
pub use condition::{army_states_allow, evaluate, evaluate_optional, has_army_state_requirement};
pub use model::{
    Characteristic, Effect, RerollKind, RollKind, Rule, Scope, Threshold, Trigger, WhenExpr,
    MAX_CONDITION_DEPTH,
};
pub use payload::{decode_rule_payload, decode_rule_record, RuleLibrary, RulePayload, RULE_LIBRARY_VERSION};
pub use registry::describe;
pub use reminders::{get_reactive_units, get_unit_reminders, is_reactive_for};
