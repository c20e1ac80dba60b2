//! Typed rule representation: scope, trigger, condition tree and effects.
//!
//! Rules are immutable value objects. They are decoded from serialized
//! payloads or rule libraries, validated once, and never mutated.
//!
//! # Example JSON
//!
//! ```json
//! {
//!   "id": "warboss-might-is-right",
//!   "name": "Might is Right",
//!   "scope": "unit",
//!   "trigger": { "phase": "fight" },
//!   "when": { "all": [ { "role": { "is": "attacker" } }, { "army_state": { "is": ["waaagh"] } } ] },
//!   "effects": [ { "modify_hit": 1 } ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::combat::CombatRole;
use crate::data::WeaponKind;
use crate::error::{EngineError, Result};
use crate::game::{Phase, PhaseFilter, TurnContext, TurnFilter};

/// Deepest condition nesting accepted by validation.
pub const MAX_CONDITION_DEPTH: usize = 32;

/// Whether a rule transfers across an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Shared with the whole combined unit, including attached leaders/bodyguards.
    Unit,
    /// Bound to the bearing model's own unit; never crosses an attachment.
    Model,
}

/// When a rule is relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trigger {
    /// Phase the rule is relevant in.
    pub phase: PhaseFilter,
    /// Turn the rule is relevant in.
    #[serde(default)]
    pub turn: TurnFilter,
    /// Usable during the opponent's phase.
    #[serde(default)]
    pub reactive: bool,
}

impl Trigger {
    /// Whether the trigger admits the given phase and turn.
    #[must_use]
    pub const fn matches(&self, phase: Phase, turn: TurnContext) -> bool {
        self.phase.matches(phase) && self.turn.matches(turn)
    }

    /// Whether this is a reactive trigger usable in `phase`.
    #[must_use]
    pub const fn is_reactive_for(&self, phase: Phase) -> bool {
        self.reactive && self.phase.matches(phase)
    }
}

/// Condition tree.
///
/// Combinators (`all`, `any`, `not`) nest leaf predicates. The tree is owned
/// top-down and cannot contain cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenExpr {
    /// Every child holds (empty ⇒ true).
    All(Vec<WhenExpr>),
    /// At least one child holds (empty ⇒ false).
    Any(Vec<WhenExpr>),
    /// The child does not hold.
    Not(Box<WhenExpr>),
    /// Any of the named army states is active.
    ArmyState {
        /// Candidate state names.
        is: Vec<String>,
    },
    /// The current phase is one of these.
    Phase {
        /// Candidate phases.
        is: Vec<Phase>,
    },
    /// It is the evaluating side's own turn, or the opponent's.
    Turn {
        /// Required turn context.
        is: TurnContext,
    },
    /// The evaluating side is attacking or defending.
    Role {
        /// Required role.
        is: CombatRole,
    },
    /// The attacking weapon is ranged or melee.
    WeaponKind {
        /// Required weapon kind.
        is: WeaponKind,
    },
    /// The attacking weapon has any of these keywords.
    WeaponKeyword {
        /// Candidate keywords.
        any: Vec<String>,
    },
    /// The evaluating side's unit has any of these keywords.
    UnitKeyword {
        /// Candidate keywords.
        any: Vec<String>,
    },
    /// The opposing unit has any of these keywords.
    EnemyKeyword {
        /// Candidate keywords.
        any: Vec<String>,
    },
    /// The target is within half the weapon's range.
    WithinHalfRange,
    /// The attacking unit charged this turn.
    Charged,
    /// The attacking unit remained stationary this turn.
    RemainedStationary,
    /// The target is visible to the attacker.
    TargetVisible,
    /// A free-form user input flag is set.
    Flag {
        /// Flag name.
        name: String,
    },
    /// The evaluating side's unit is led by or leading another unit.
    LeaderAttached,
}

impl WhenExpr {
    /// Depth of the tree (a leaf has depth 1).
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            WhenExpr::All(children) | WhenExpr::Any(children) => {
                1 + children.iter().map(WhenExpr::depth).max().unwrap_or(0)
            }
            WhenExpr::Not(child) => 1 + child.depth(),
            _ => 1,
        }
    }

    fn validate(&self, rule_id: &str) -> Result<()> {
        let empty = |what: &str| EngineError::invalid_rule(rule_id, format!("{what} condition lists nothing"));
        match self {
            WhenExpr::All(children) | WhenExpr::Any(children) => {
                for child in children {
                    child.validate(rule_id)?;
                }
            }
            WhenExpr::Not(child) => child.validate(rule_id)?,
            WhenExpr::ArmyState { is } if is.iter().all(|s| s.trim().is_empty()) => {
                return Err(empty("army_state"));
            }
            WhenExpr::Phase { is } if is.is_empty() => return Err(empty("phase")),
            WhenExpr::WeaponKeyword { any } if any.is_empty() => {
                return Err(empty("weapon_keyword"))
            }
            WhenExpr::UnitKeyword { any } if any.is_empty() => return Err(empty("unit_keyword")),
            WhenExpr::EnemyKeyword { any } if any.is_empty() => {
                return Err(empty("enemy_keyword"))
            }
            WhenExpr::Flag { name } if name.trim().is_empty() => {
                return Err(EngineError::invalid_rule(rule_id, "flag condition has no name"));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Characteristics addressable by [`Effect::ModifyCharacteristic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    /// Weapon Attacks.
    Attacks,
    /// Weapon/Ballistic Skill (positive delta worsens the skill number).
    Skill,
    /// Weapon Strength.
    Strength,
    /// Weapon AP (negative delta improves penetration).
    ArmourPenetration,
    /// Weapon Damage.
    Damage,
    /// Model Toughness.
    Toughness,
    /// Model armour Save (negative delta improves the save).
    Save,
    /// Model Movement.
    Movement,
    /// Model Leadership.
    Leadership,
    /// Model Objective Control.
    ObjectiveControl,
    /// Model Wounds.
    Wounds,
}

impl Characteristic {
    /// Whether the combat calculator consumes this characteristic.
    #[must_use]
    pub const fn affects_combat(self) -> bool {
        matches!(
            self,
            Characteristic::Attacks
                | Characteristic::Skill
                | Characteristic::Strength
                | Characteristic::ArmourPenetration
                | Characteristic::Damage
                | Characteristic::Toughness
                | Characteristic::Save
        )
    }

    /// Whether the stat belongs to the attacking weapon's profile rather
    /// than to the defending model.
    #[must_use]
    pub const fn is_weapon_stat(self) -> bool {
        matches!(
            self,
            Characteristic::Attacks
                | Characteristic::Skill
                | Characteristic::Strength
                | Characteristic::ArmourPenetration
                | Characteristic::Damage
        )
    }
}

/// Which roll an effect targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollKind {
    /// Hit roll.
    Hit,
    /// Wound roll.
    Wound,
    /// Saving throw.
    Save,
    /// Damage roll.
    Damage,
}

/// Which dice a reroll grant allows to be re-rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerollKind {
    /// Natural rolls of 1.
    Ones,
    /// Any failed roll.
    Failed,
    /// Any roll (used to fish for criticals; failed rolls are re-rolled).
    All,
}

/// Threshold that [`Effect::OverrideThreshold`] can replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// Target number to hit.
    Hit,
    /// Target number to wound.
    Wound,
    /// Armour save.
    Save,
    /// Invulnerable save.
    Invulnerable,
    /// Feel No Pain.
    FeelNoPain,
}

/// One effect of a satisfied rule. Interpretation lives in the rule applier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Add to hit rolls.
    ModifyHit(i32),
    /// Add to wound rolls.
    ModifyWound(i32),
    /// Add to saving throws.
    ModifySave(i32),
    /// Adjust a characteristic.
    ModifyCharacteristic {
        /// Characteristic to change.
        stat: Characteristic,
        /// Amount added.
        delta: i32,
    },
    /// Grant the attacking weapon a keyword (e.g. "Lethal Hits").
    AddKeyword(String),
    /// Allow re-rolling some dice.
    GrantReroll {
        /// Roll affected.
        roll: RollKind,
        /// Which dice may be re-rolled.
        kind: RerollKind,
    },
    /// Replace a threshold outright.
    OverrideThreshold {
        /// Threshold replaced.
        threshold: Threshold,
        /// New target number (7 means only a critical succeeds).
        value: u8,
    },
    /// Unmodified rolls of `value`+ are critical.
    CriticalOn {
        /// Hit or wound roll.
        roll: RollKind,
        /// Critical threshold.
        value: u8,
    },
}

impl Effect {
    fn validate(&self, rule_id: &str) -> Result<()> {
        match self {
            Effect::AddKeyword(keyword) if keyword.trim().is_empty() => {
                Err(EngineError::invalid_rule(rule_id, "add_keyword has an empty keyword"))
            }
            Effect::OverrideThreshold { value, .. } if !(2..=7).contains(value) => {
                Err(EngineError::invalid_rule(
                    rule_id,
                    format!("threshold override {value} is outside 2..=7"),
                ))
            }
            Effect::CriticalOn { roll, .. } if !matches!(roll, RollKind::Hit | RollKind::Wound) => {
                Err(EngineError::invalid_rule(
                    rule_id,
                    "critical threshold only applies to hit or wound rolls",
                ))
            }
            Effect::CriticalOn { value, .. } if !(2..=6).contains(value) => {
                Err(EngineError::invalid_rule(
                    rule_id,
                    format!("critical threshold {value} is outside 2..=6"),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// A composable ability: scope, optional trigger, optional condition, effects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Rules text shown to players.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Transfer scope across attachments.
    pub scope: Scope,
    /// When the rule is relevant (None ⇒ passive, always visible).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    /// Condition (None ⇒ always satisfied).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenExpr>,
    /// Effects applied when satisfied.
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Rule {
    /// Create an unconditional rule with no effects.
    pub fn new(id: impl Into<String>, name: impl Into<String>, scope: Scope) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            scope,
            trigger: None,
            when: None,
            effects: Vec::new(),
        }
    }

    /// Builder method to set the trigger.
    #[must_use]
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Builder method to set the condition.
    #[must_use]
    pub fn with_when(mut self, when: WhenExpr) -> Self {
        self.when = Some(when);
        self
    }

    /// Builder method to add an effect.
    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Whether the rule may be used during the opponent's `phase`.
    #[must_use]
    pub fn is_reactive_for(&self, phase: Phase) -> bool {
        self.trigger.is_some_and(|t| t.is_reactive_for(phase))
    }

    /// Validate the rule against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRule`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::invalid_rule(&self.name, "rule id is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::invalid_rule(&self.id, "rule name is empty"));
        }
        if let Some(trigger) = self.trigger {
            if trigger.reactive && trigger.turn == TurnFilter::Own {
                return Err(EngineError::invalid_rule(
                    &self.id,
                    "a reactive trigger cannot be limited to its own turn",
                ));
            }
        }
        if let Some(when) = &self.when {
            if when.depth() > MAX_CONDITION_DEPTH {
                return Err(EngineError::invalid_rule(
                    &self.id,
                    format!("condition nesting exceeds {MAX_CONDITION_DEPTH}"),
                ));
            }
            when.validate(&self.id)?;
        }
        for effect in &self.effects {
            effect.validate(&self.id)?;
        }
        Ok(())
    }
}
