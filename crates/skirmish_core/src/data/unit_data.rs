//! Unit and model data structures, as supplied by the external data store.

use serde::{Deserialize, Serialize};

use super::weapon_data::Weapon;

/// A named ability whose rule definition is carried as serialized text.
///
/// The definition decodes to a single rule object or an array of rule
/// objects (see [`crate::rules::decode_rule_record`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Display name of the ability (e.g. "Might is Right").
    pub name: String,
    /// Serialized rule definition (JSON).
    pub definition: String,
}

impl RuleRecord {
    /// Create a record from a name and its serialized definition.
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// Per-model characteristics (M/T/SV/W/LD/OC plus optional saves).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelCharacteristics {
    /// Movement in inches.
    pub movement: u32,
    /// Toughness.
    pub toughness: i32,
    /// Armour save (the "3" of a 3+ save).
    pub save: u8,
    /// Wounds per model.
    pub wounds: u32,
    /// Leadership (the "6" of a 6+ test).
    pub leadership: u8,
    /// Objective control.
    pub objective_control: u32,
    /// Invulnerable save, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invulnerable_save: Option<u8>,
    /// Feel No Pain threshold, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feel_no_pain: Option<u8>,
}

impl Default for ModelCharacteristics {
    fn default() -> Self {
        Self {
            movement: 6,
            toughness: 4,
            save: 4,
            wounds: 1,
            leadership: 7,
            objective_control: 1,
            invulnerable_save: None,
            feel_no_pain: None,
        }
    }
}

/// A single model in a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Unique model identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Model characteristics.
    pub characteristics: ModelCharacteristics,
    /// Abilities borne by this model.
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
    /// Weapons carried by this model.
    #[serde(default)]
    pub weapons: Vec<Weapon>,
}

impl Model {
    /// Create a model with no rules or weapons.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        characteristics: ModelCharacteristics,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            characteristics,
            rules: Vec::new(),
            weapons: Vec::new(),
        }
    }

    /// Find a weapon by id.
    #[must_use]
    pub fn weapon(&self, id: &str) -> Option<&Weapon> {
        self.weapons.iter().find(|w| w.id == id)
    }
}

/// A unit on the battlefield.
///
/// Attachment relations (leader/bodyguard) are not stored on the unit; they
/// are looked up through [`super::Army`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique unit identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether this unit is a character able to lead a bodyguard unit.
    #[serde(default)]
    pub is_leader: bool,
    /// Keywords and categories (e.g. "Infantry", "Character", "Orks").
    #[serde(default)]
    pub categories: Vec<String>,
    /// Unit-level abilities.
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
    /// Models in the unit.
    #[serde(default)]
    pub models: Vec<Model>,
}

impl Unit {
    /// Create an empty unit.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_leader: false,
            categories: Vec::new(),
            rules: Vec::new(),
            models: Vec::new(),
        }
    }

    /// Check if this unit carries a keyword (case-insensitive).
    #[must_use]
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(keyword))
    }

    /// Number of models in the unit.
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Find a weapon carried by any model in the unit.
    #[must_use]
    pub fn find_weapon(&self, weapon_id: &str) -> Option<&Weapon> {
        self.models.iter().find_map(|m| m.weapon(weapon_id))
    }

    /// Number of models carrying a weapon with the given id.
    #[must_use]
    pub fn models_with_weapon(&self, weapon_id: &str) -> usize {
        self.models
            .iter()
            .filter(|m| m.weapon(weapon_id).is_some())
            .count()
    }
}
