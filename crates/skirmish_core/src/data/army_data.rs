//! Army roster, attachment links and army states.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::unit_data::{Model, Unit};
use crate::error::{EngineError, Result};
use crate::game::PlayerId;

/// A named army-wide flag (e.g. "waaagh" declared this battle round).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArmyState {
    /// State name, matched by `ArmyState` conditions.
    pub name: String,
    /// Battle round the state became active, if tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_turn: Option<u32>,
}

impl ArmyState {
    /// Create a state with no activation turn.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            since_turn: None,
        }
    }
}

/// A leader attached to a bodyguard unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attachment {
    /// The leading character unit.
    pub leader_id: String,
    /// The bodyguard unit it leads.
    pub bodyguard_id: String,
}

/// One player's army: its units, attachments and active states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Army {
    /// Army identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning player.
    pub player: PlayerId,
    /// Units in the roster.
    pub units: Vec<Unit>,
    /// Leader-to-bodyguard attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Currently active army states.
    #[serde(default)]
    pub army_states: Vec<ArmyState>,
}

impl Army {
    /// Create an empty army.
    pub fn new(id: impl Into<String>, name: impl Into<String>, player: PlayerId) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            player,
            units: Vec::new(),
            attachments: Vec::new(),
            army_states: Vec::new(),
        }
    }

    /// Find a unit by id.
    #[must_use]
    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Leaders attached to the unit with the given id.
    #[must_use]
    pub fn attached_leaders_of(&self, unit_id: &str) -> Vec<&Unit> {
        self.attachments
            .iter()
            .filter(|a| a.bodyguard_id == unit_id)
            .filter_map(|a| self.unit(&a.leader_id))
            .collect()
    }

    /// Bodyguard units led by the unit with the given id.
    #[must_use]
    pub fn bodyguards_of(&self, unit_id: &str) -> Vec<&Unit> {
        self.attachments
            .iter()
            .filter(|a| a.leader_id == unit_id)
            .filter_map(|a| self.unit(&a.bodyguard_id))
            .collect()
    }

    /// Build the evaluation view of a unit with its attachment relations.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownUnit`] if the id is not in the roster.
    pub fn view(&self, unit_id: &str) -> Result<UnitView<'_>> {
        let unit = self
            .unit(unit_id)
            .ok_or_else(|| EngineError::UnknownUnit(unit_id.to_string()))?;
        Ok(UnitView {
            unit,
            leaders: self.attached_leaders_of(unit_id),
            bodyguards: self.bodyguards_of(unit_id),
        })
    }

    /// Names of the active army states.
    #[must_use]
    pub fn state_names(&self) -> BTreeSet<String> {
        self.army_states.iter().map(|s| s.name.clone()).collect()
    }

    /// Activate a state; activating an already-active state is a no-op.
    pub fn activate_state(&mut self, state: ArmyState) {
        if !self.army_states.iter().any(|s| s.name == state.name) {
            self.army_states.push(state);
        }
    }

    /// Clear a state by name.
    pub fn clear_state(&mut self, name: &str) {
        self.army_states.retain(|s| s.name != name);
    }

    /// Validate internal consistency of the roster.
    ///
    /// Checks for:
    /// - Attachments that reference unknown units
    /// - Attachments whose leader is not flagged as a leader
    /// - Units that are both leading and being led
    ///
    /// Returns a list of validation errors.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for attachment in &self.attachments {
            match self.unit(&attachment.leader_id) {
                None => errors.push(format!(
                    "Attachment references unknown leader '{}'",
                    attachment.leader_id
                )),
                Some(leader) if !leader.is_leader => errors.push(format!(
                    "Unit '{}' is attached as a leader but is not a leader",
                    leader.id
                )),
                Some(_) => {}
            }
            if self.unit(&attachment.bodyguard_id).is_none() {
                errors.push(format!(
                    "Attachment references unknown bodyguard '{}'",
                    attachment.bodyguard_id
                ));
            }
        }

        for unit in &self.units {
            let led = self.attachments.iter().any(|a| a.bodyguard_id == unit.id);
            let leading = self.attachments.iter().any(|a| a.leader_id == unit.id);
            if led && leading {
                errors.push(format!("Unit '{}' is both leading and being led", unit.id));
            }
        }

        errors
    }
}

/// A unit together with the units on the other side of its attachment.
///
/// At most one of `leaders` and `bodyguards` is expected to be non-empty:
/// `leaders` when the viewed unit is a bodyguard body, `bodyguards` when it
/// is the leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitView<'a> {
    /// The unit being evaluated.
    pub unit: &'a Unit,
    /// Leaders attached to the unit.
    pub leaders: Vec<&'a Unit>,
    /// Bodyguard units the unit leads.
    pub bodyguards: Vec<&'a Unit>,
}

impl<'a> UnitView<'a> {
    /// View of a unit with no attachments.
    #[must_use]
    pub fn solo(unit: &'a Unit) -> Self {
        Self {
            unit,
            leaders: Vec::new(),
            bodyguards: Vec::new(),
        }
    }

    /// Builder method to attach leaders.
    #[must_use]
    pub fn with_leaders(mut self, leaders: Vec<&'a Unit>) -> Self {
        self.leaders = leaders;
        self
    }

    /// Builder method to attach bodyguard units.
    #[must_use]
    pub fn with_bodyguards(mut self, bodyguards: Vec<&'a Unit>) -> Self {
        self.bodyguards = bodyguards;
        self
    }

    /// Whether the unit is part of an attached unit.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.leaders.is_empty() || !self.bodyguards.is_empty()
    }

    /// The bodyguard body of the combined unit (the unit itself unless it is a leader).
    #[must_use]
    pub fn body(&self) -> &'a Unit {
        self.bodyguards.first().copied().unwrap_or(self.unit)
    }

    /// Every unit making up the combined unit.
    pub fn units(&self) -> impl Iterator<Item = &'a Unit> + '_ {
        std::iter::once(self.unit)
            .chain(self.leaders.iter().copied())
            .chain(self.bodyguards.iter().copied())
    }

    /// Every model in the combined unit.
    pub fn models(&self) -> impl Iterator<Item = &'a Model> + '_ {
        self.units().flat_map(|u| u.models.iter())
    }

    /// Total models in the combined unit.
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.units().map(Unit::model_count).sum()
    }

    /// Whether any unit of the combined unit carries `keyword`.
    #[must_use]
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.units().any(|u| u.has_keyword(keyword))
    }

    /// Keywords of the combined unit, deduplicated.
    #[must_use]
    pub fn keywords(&self) -> BTreeSet<String> {
        self.units()
            .flat_map(|u| u.categories.iter().cloned())
            .collect()
    }
}
