//! Combat results: per-step roll records plus the snapshot they came from.
//!
//! A [`CombatResult`] is self-contained. It travels to the other player as
//! JSON inside a [`CombatBroadcast`] and is kept as a compact bincode audit
//! record; either encoding can be resumed by a fresh session.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::snapshot::CombatSnapshot;
use crate::error::{EngineError, Result};

/// Combat result format version for compatibility.
pub const COMBAT_RESULT_VERSION: u32 = 1;

/// How far resolution has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatStage {
    /// Snapshot prepared, no dice rolled.
    Declared,
    /// Attacks resolved.
    AttacksRolled,
    /// Hit rolls made.
    HitsRolled,
    /// Wound rolls made.
    WoundsRolled,
    /// Saving throws made.
    SavesRolled,
    /// Feel No Pain rolls made.
    FeelNoPainRolled,
    /// Damage totalled.
    Summarized,
}

impl CombatStage {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            CombatStage::Declared => "declared",
            CombatStage::AttacksRolled => "attacks",
            CombatStage::HitsRolled => "hits",
            CombatStage::WoundsRolled => "wounds",
            CombatStage::SavesRolled => "saves",
            CombatStage::FeelNoPainRolled => "feel no pain",
            CombatStage::Summarized => "summary",
        }
    }
}

impl fmt::Display for CombatStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One D6 roll, with the original value if it was re-rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DieRoll {
    /// Final unmodified result.
    pub natural: u8,
    /// Result before a re-roll, if one was made.
    pub rerolled_from: Option<u8>,
    /// Whether the roll passed.
    pub success: bool,
    /// Whether the roll was a critical.
    pub critical: bool,
}

/// Attacks step record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttacksStep {
    /// Attacks made by each model.
    pub per_model: Vec<u32>,
    /// Attacks added per model by Blast.
    pub blast_bonus: u32,
    /// Attacks added per model by Rapid Fire.
    pub rapid_fire_bonus: u32,
    /// Total attacks.
    pub total: u32,
}

/// Hits step record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitsStep {
    /// Target number used (None when attacks hit automatically).
    pub target: Option<u8>,
    /// Hit rolls.
    pub rolls: Vec<DieRoll>,
    /// Hits scored without rolling.
    pub automatic: u32,
    /// Extra hits from Sustained Hits.
    pub sustained: u32,
    /// Critical hits that wound automatically (Lethal Hits).
    pub lethal: u32,
    /// Hits that go on to roll to wound.
    pub hits: u32,
}

impl HitsStep {
    /// Critical hits rolled.
    #[must_use]
    pub fn criticals(&self) -> u32 {
        self.rolls.iter().filter(|r| r.critical).count() as u32
    }

    /// Every hit entering the wound step, rolled or automatic.
    #[must_use]
    pub const fn total_hits(&self) -> u32 {
        self.hits + self.lethal
    }
}

/// Wounds step record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WoundsStep {
    /// Target number used.
    pub target: u8,
    /// Wound rolls.
    pub rolls: Vec<DieRoll>,
    /// Wounds scored without rolling (Lethal Hits).
    pub automatic: u32,
    /// Wounds that must be saved.
    pub wounds: u32,
    /// Critical wounds that skip saves (Devastating Wounds).
    pub devastating: u32,
}

/// Saves step record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavesStep {
    /// Save target used (None when no save is possible).
    pub target: Option<u8>,
    /// Whether the invulnerable save was the better save.
    pub invulnerable: bool,
    /// Whether cover improved the armour save.
    pub cover: bool,
    /// Saving throws.
    pub rolls: Vec<DieRoll>,
    /// Wounds saved.
    pub saved: u32,
    /// Wounds not saved.
    pub unsaved: u32,
}

/// Feel No Pain step record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeelNoPainStep {
    /// Feel No Pain target (None when the target has none).
    pub target: Option<u8>,
    /// Wound instances that got through: unsaved plus devastating.
    pub penetrating: u32,
    /// Feel No Pain rolls, one per penetrating wound.
    pub rolls: Vec<DieRoll>,
    /// Wound instances negated.
    pub negated: u32,
}

impl FeelNoPainStep {
    /// Wound instances that deal damage.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.penetrating.saturating_sub(self.negated)
    }
}

/// Damage of one wound instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageRoll {
    /// Damage dealt, bonuses included.
    pub value: u32,
    /// Value before a re-roll, if one was made.
    pub rerolled_from: Option<u32>,
}

/// Final totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatSummary {
    /// Wound instances dealing damage.
    pub wounds_dealt: u32,
    /// Melta bonus applied to each instance.
    pub melta_bonus: u32,
    /// Damage of each instance.
    pub damage: Vec<DamageRoll>,
    /// Sum of all damage.
    pub total_damage: u32,
}

/// Snapshot plus every step resolved so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatResult {
    /// Format version.
    pub version: u32,
    /// Inputs of the resolution.
    pub snapshot: CombatSnapshot,
    /// Latest completed stage.
    pub stage: CombatStage,
    /// Attacks step.
    pub attacks: Option<AttacksStep>,
    /// Hits step.
    pub hits: Option<HitsStep>,
    /// Wounds step.
    pub wounds: Option<WoundsStep>,
    /// Saves step.
    pub saves: Option<SavesStep>,
    /// Feel No Pain step.
    pub feel_no_pain: Option<FeelNoPainStep>,
    /// Summary.
    pub summary: Option<CombatSummary>,
}

impl CombatResult {
    /// A result with no steps resolved.
    #[must_use]
    pub fn new(snapshot: CombatSnapshot) -> Self {
        Self {
            version: COMBAT_RESULT_VERSION,
            snapshot,
            stage: CombatStage::Declared,
            attacks: None,
            hits: None,
            wounds: None,
            saves: None,
            feel_no_pain: None,
            summary: None,
        }
    }

    /// Drop every step after `stage` and mark `stage` as the latest.
    pub fn truncate_to(&mut self, stage: CombatStage) {
        if stage < CombatStage::AttacksRolled {
            self.attacks = None;
        }
        if stage < CombatStage::HitsRolled {
            self.hits = None;
        }
        if stage < CombatStage::WoundsRolled {
            self.wounds = None;
        }
        if stage < CombatStage::SavesRolled {
            self.saves = None;
        }
        if stage < CombatStage::FeelNoPainRolled {
            self.feel_no_pain = None;
        }
        if stage < CombatStage::Summarized {
            self.summary = None;
        }
        self.stage = stage;
    }

    /// Check the version, that exactly the steps up to `stage` are present,
    /// and that each step's counts agree with its rolls and with the step
    /// before it.
    pub fn validate(&self) -> Result<()> {
        if self.version != COMBAT_RESULT_VERSION {
            return Err(EngineError::UnsupportedVersion {
                expected: COMBAT_RESULT_VERSION,
                found: self.version,
            });
        }
        let present = [
            (CombatStage::AttacksRolled, self.attacks.is_some()),
            (CombatStage::HitsRolled, self.hits.is_some()),
            (CombatStage::WoundsRolled, self.wounds.is_some()),
            (CombatStage::SavesRolled, self.saves.is_some()),
            (CombatStage::FeelNoPainRolled, self.feel_no_pain.is_some()),
            (CombatStage::Summarized, self.summary.is_some()),
        ];
        for (stage, is_present) in present {
            if is_present != (stage <= self.stage) {
                return Err(EngineError::Snapshot(format!(
                    "result at stage {} has inconsistent {stage} record",
                    self.stage
                )));
            }
        }
        self.check_counts()
    }

    fn check_counts(&self) -> Result<()> {
        fn ensure(ok: bool, what: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(EngineError::Snapshot(format!("inconsistent {what} record")))
            }
        }
        fn successes(rolls: &[DieRoll]) -> u64 {
            rolls.iter().filter(|r| r.success).count() as u64
        }
        fn criticals(rolls: &[DieRoll]) -> u64 {
            rolls.iter().filter(|r| r.critical).count() as u64
        }
        let len = |rolls: &[DieRoll]| rolls.len() as u64;

        if let Some(attacks) = &self.attacks {
            let sum: u64 = attacks.per_model.iter().map(|&n| u64::from(n)).sum();
            ensure(sum == u64::from(attacks.total), "attacks")?;
        }
        if let (Some(attacks), Some(hits)) = (&self.attacks, &self.hits) {
            ensure(
                len(&hits.rolls) + u64::from(hits.automatic) == u64::from(attacks.total)
                    && u64::from(hits.lethal) <= criticals(&hits.rolls)
                    && u64::from(hits.hits) + u64::from(hits.lethal)
                        == successes(&hits.rolls) + u64::from(hits.automatic) + u64::from(hits.sustained),
                "hits",
            )?;
        }
        if let (Some(hits), Some(wounds)) = (&self.hits, &self.wounds) {
            ensure(
                len(&wounds.rolls) == u64::from(hits.hits)
                    && wounds.automatic == hits.lethal
                    && u64::from(wounds.devastating) <= criticals(&wounds.rolls)
                    && u64::from(wounds.wounds) + u64::from(wounds.devastating)
                        == successes(&wounds.rolls) + u64::from(wounds.automatic),
                "wounds",
            )?;
        }
        if let (Some(wounds), Some(saves)) = (&self.wounds, &self.saves) {
            let rolled = if saves.target.is_some() { u64::from(wounds.wounds) } else { 0 };
            ensure(
                len(&saves.rolls) == rolled
                    && u64::from(saves.saved) == successes(&saves.rolls)
                    && u64::from(saves.saved) + u64::from(saves.unsaved) == u64::from(wounds.wounds),
                "saves",
            )?;
        }
        if let (Some(wounds), Some(saves), Some(fnp)) = (&self.wounds, &self.saves, &self.feel_no_pain) {
            let rolled = if fnp.target.is_some() { u64::from(fnp.penetrating) } else { 0 };
            ensure(
                u64::from(fnp.penetrating) == u64::from(saves.unsaved) + u64::from(wounds.devastating)
                    && len(&fnp.rolls) == rolled
                    && u64::from(fnp.negated) == successes(&fnp.rolls)
                    && fnp.negated <= fnp.penetrating,
                "feel no pain",
            )?;
        }
        if let (Some(fnp), Some(summary)) = (&self.feel_no_pain, &self.summary) {
            let total: u64 = summary.damage.iter().map(|d| u64::from(d.value)).sum();
            ensure(
                summary.wounds_dealt == fnp.remaining()
                    && summary.damage.len() as u64 == u64::from(summary.wounds_dealt)
                    && total == u64::from(summary.total_damage),
                "summary",
            )?;
        }
        Ok(())
    }

    /// Total damage, once summarized.
    #[must_use]
    pub fn total_damage(&self) -> Option<u32> {
        self.summary.as_ref().map(|s| s.total_damage)
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::Snapshot(format!("Failed to encode combat result: {e}")))
    }

    /// Decode from JSON and validate.
    pub fn from_json(text: &str) -> Result<Self> {
        let result: Self = serde_json::from_str(text)
            .map_err(|e| EngineError::Snapshot(format!("Failed to decode combat result: {e}")))?;
        result.validate()?;
        Ok(result)
    }

    /// Encode as a compact binary audit record.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| EngineError::Snapshot(format!("Failed to serialize combat result: {e}")))
    }

    /// Decode a binary audit record and validate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let result: Self = bincode::deserialize(bytes)
            .map_err(|e| EngineError::Snapshot(format!("Failed to deserialize combat result: {e}")))?;
        result.validate()?;
        Ok(result)
    }
}

/// A combat result addressed to a game's publish/subscribe channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatBroadcast {
    /// Game identifier.
    pub game_id: String,
    /// Channel topic (e.g. "combat").
    pub topic: String,
    /// The result being shared.
    pub result: CombatResult,
}

impl CombatBroadcast {
    /// Wrap a result for a game and topic.
    pub fn new(game_id: impl Into<String>, topic: impl Into<String>, result: CombatResult) -> Self {
        Self {
            game_id: game_id.into(),
            topic: topic.into(),
            result,
        }
    }

    /// Channel key: `game:{game_id}:{topic}`.
    #[must_use]
    pub fn channel_key(&self) -> String {
        format!("game:{}:{}", self.game_id, self.topic)
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::Snapshot(format!("Failed to encode broadcast: {e}")))
    }

    /// Decode from JSON and validate the carried result.
    pub fn from_json(text: &str) -> Result<Self> {
        let broadcast: Self = serde_json::from_str(text)
            .map_err(|e| EngineError::Snapshot(format!("Failed to decode broadcast: {e}")))?;
        broadcast.result.validate()?;
        Ok(broadcast)
    }
}
