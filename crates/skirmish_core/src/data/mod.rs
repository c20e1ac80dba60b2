//! Data structures for armies, units, models and weapons.
//!
//! This module contains pure data structures mirroring the snapshots
//! supplied by the external data store. All structs are designed to be
//! deserialized from JSON or RON.
//!
//! **Note:** This module contains no IO - it only defines data types.
//! File loading is handled by `skirmish_tools`.

mod army_data;
mod unit_data;
mod weapon_data;

pub use army_data::{Army, ArmyState, Attachment, UnitView};
pub use unit_data::{Model, ModelCharacteristics, RuleRecord, Unit};
pub use weapon_data::{Weapon, WeaponKind, WeaponUsage};
