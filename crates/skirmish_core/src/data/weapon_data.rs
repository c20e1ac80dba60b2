//! Weapon profile data.

use serde::{Deserialize, Serialize};

use crate::game::Phase;

/// Whether a weapon is used in the shooting or the fight phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Ranged weapon, uses Ballistic Skill.
    Ranged,
    /// Melee weapon, uses Weapon Skill.
    Melee,
}

/// Per-turn usage markers, used to gate re-use of a weapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WeaponUsage {
    /// The weapon has already shot this turn.
    #[serde(default)]
    pub fired_this_turn: bool,
    /// The weapon has already fought this turn.
    #[serde(default)]
    pub fought_this_turn: bool,
}

/// A weapon profile.
///
/// # Example RON
///
/// ```ron
/// Weapon(
///     id: "bolt-rifle",
///     name: "Bolt rifle",
///     kind: ranged,
///     range: Some(24),
///     attacks: "2",
///     skill: 3,
///     strength: 4,
///     ap: -1,
///     damage: "1",
///     keywords: ["Assault", "Heavy"],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    /// Unique weapon identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Ranged or melee.
    pub kind: WeaponKind,
    /// Range in inches (ranged weapons only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<u32>,
    /// Attacks characteristic: a literal or a dice expression.
    pub attacks: String,
    /// Weapon Skill or Ballistic Skill (the "3" of 3+).
    pub skill: u8,
    /// Strength.
    pub strength: i32,
    /// Armour penetration, zero or negative (e.g. -1).
    #[serde(default)]
    pub ap: i32,
    /// Damage characteristic: a literal or a dice expression.
    pub damage: String,
    /// Weapon keywords (e.g. "Sustained Hits 1", "Anti-Infantry 4+").
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Usage this turn.
    #[serde(default)]
    pub usage: WeaponUsage,
}

impl Weapon {
    /// Create a weapon with a 1-attack, 4+, S4, AP0, D1 profile.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: WeaponKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            range: None,
            attacks: "1".to_string(),
            skill: 4,
            strength: 4,
            ap: 0,
            damage: "1".to_string(),
            keywords: Vec::new(),
            usage: WeaponUsage::default(),
        }
    }

    /// Builder method to set the core profile.
    #[must_use]
    pub fn with_profile(
        mut self,
        attacks: &str,
        skill: u8,
        strength: i32,
        ap: i32,
        damage: &str,
    ) -> Self {
        self.attacks = attacks.to_string();
        self.skill = skill;
        self.strength = strength;
        self.ap = ap;
        self.damage = damage.to_string();
        self
    }

    /// Builder method to add a keyword.
    #[must_use]
    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keywords.push(keyword.to_string());
        self
    }

    /// Builder method to set the range.
    #[must_use]
    pub const fn with_range(mut self, range: u32) -> Self {
        self.range = Some(range);
        self
    }

    /// Check if the weapon carries a keyword (case-insensitive).
    #[must_use]
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
    }

    /// Whether the weapon may still be used in `phase` this turn.
    #[must_use]
    pub const fn is_available(&self, phase: Phase) -> bool {
        match (self.kind, phase) {
            (WeaponKind::Ranged, Phase::Shoot) => !self.usage.fired_this_turn,
            (WeaponKind::Melee, Phase::Fight) => !self.usage.fought_this_turn,
            _ => false,
        }
    }

    /// Record that the weapon was used in `phase`.
    pub fn mark_used(&mut self, phase: Phase) {
        match phase {
            Phase::Shoot => self.usage.fired_this_turn = true,
            Phase::Fight => self.usage.fought_this_turn = true,
            _ => {}
        }
    }

    /// Clear usage markers at the start of a new turn.
    pub fn reset_usage(&mut self) {
        self.usage = WeaponUsage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_gating() {
        let mut bolter = Weapon::new("bolter", "Bolter", WeaponKind::Ranged);
        assert!(bolter.is_available(Phase::Shoot));
        assert!(!bolter.is_available(Phase::Fight));

        bolter.mark_used(Phase::Shoot);
        assert!(!bolter.is_available(Phase::Shoot));

        bolter.reset_usage();
        assert!(bolter.is_available(Phase::Shoot));
    }

    #[test]
    fn test_melee_availability() {
        let mut choppa = Weapon::new("choppa", "Choppa", WeaponKind::Melee);
        assert!(choppa.is_available(Phase::Fight));
        choppa.mark_used(Phase::Fight);
        assert!(!choppa.is_available(Phase::Fight));
    }

    #[test]
    fn test_keywords() {
        let weapon = Weapon::new("w", "W", WeaponKind::Ranged).with_keyword("Lethal Hits");
        assert!(weapon.has_keyword("lethal hits"));
        assert!(!weapon.has_keyword("Blast"));
    }
}
