//! Step-by-step dice resolution.
//!
//! Attacks → Hits → Wounds → Saves → Feel No Pain → Summary. Each step is
//! an explicit call that draws dice from the caller's [`DiceSource`] and
//! records its rolls in the [`CombatResult`]. A step may be re-run, which
//! discards every later step. A failed step leaves the result untouched.

use super::result::{
    AttacksStep, CombatResult, CombatStage, CombatSummary, DamageRoll, DieRoll, FeelNoPainStep,
    HitsStep, SavesStep, WoundsStep,
};
use super::snapshot::CombatSnapshot;
use crate::dice::{parse_dice, DiceSource};
use crate::error::{EngineError, Result};
use crate::rules::{RerollKind, RollKind, Threshold};

/// A target number that no die can reach; only criticals succeed.
const IMPOSSIBLE: u8 = 7;

/// Target number to wound for a strength against a toughness.
#[must_use]
pub const fn wound_threshold(strength: i32, toughness: i32) -> u8 {
    if strength >= toughness * 2 {
        2
    } else if strength > toughness {
        3
    } else if strength == toughness {
        4
    } else if strength * 2 <= toughness {
        6
    } else {
        5
    }
}

/// Effective target number for a roll: `base` shifted by `modifier`,
/// clamped to 2..=7, unless an override replaces it.
#[must_use]
pub fn effective_target(base: u8, modifier: i32, override_value: Option<u8>) -> u8 {
    match override_value {
        Some(value) => value.clamp(2, IMPOSSIBLE),
        None => (i32::from(base) - modifier).clamp(2, i32::from(IMPOSSIBLE)) as u8,
    }
}

/// How one D6 test is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct D6Test {
    target: u8,
    critical: u8,
    reroll: Option<RerollKind>,
}

impl D6Test {
    fn judge(self, natural: u8) -> (bool, bool) {
        // A natural 1 always fails and is never a critical.
        let critical = natural != 1 && natural >= self.critical;
        let success = critical || (natural != 1 && natural >= self.target);
        (success, critical)
    }

    fn wants_reroll(self, natural: u8, success: bool) -> bool {
        match self.reroll {
            None => false,
            Some(RerollKind::Ones) => natural == 1,
            Some(RerollKind::Failed | RerollKind::All) => !success,
        }
    }

    fn roll(self, dice: &mut impl DiceSource) -> Result<DieRoll> {
        let first = dice.d6()?;
        let (success, critical) = self.judge(first);
        if !self.wants_reroll(first, success) {
            return Ok(DieRoll {
                natural: first,
                rerolled_from: None,
                success,
                critical,
            });
        }
        let second = dice.d6()?;
        let (success, critical) = self.judge(second);
        Ok(DieRoll {
            natural: second,
            rerolled_from: Some(first),
            success,
            critical,
        })
    }

    fn roll_many(self, count: u32, dice: &mut impl DiceSource) -> Result<Vec<DieRoll>> {
        (0..count).map(|_| self.roll(dice)).collect()
    }
}

fn count(rolls: &[DieRoll], pred: impl Fn(&DieRoll) -> bool) -> u32 {
    rolls.iter().filter(|r| pred(r)).count() as u32
}

/// Resolution of one attack against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatSession {
    result: CombatResult,
}

impl CombatSession {
    /// Start resolving a prepared snapshot.
    #[must_use]
    pub fn new(snapshot: CombatSnapshot) -> Self {
        Self {
            result: CombatResult::new(snapshot),
        }
    }

    /// Continue from a result computed elsewhere.
    ///
    /// # Errors
    ///
    /// Fails if the result has an unsupported version or inconsistent steps.
    pub fn resume(result: CombatResult) -> Result<Self> {
        result.validate()?;
        tracing::debug!(stage = %result.stage, weapon = %result.snapshot.weapon.id, "Resumed combat");
        Ok(Self { result })
    }

    /// The result so far.
    #[must_use]
    pub fn result(&self) -> &CombatResult {
        &self.result
    }

    /// Consume the session, returning the result.
    #[must_use]
    pub fn into_result(self) -> CombatResult {
        self.result
    }

    /// The snapshot being resolved.
    #[must_use]
    pub fn snapshot(&self) -> &CombatSnapshot {
        &self.result.snapshot
    }

    /// Latest completed stage.
    #[must_use]
    pub fn stage(&self) -> CombatStage {
        self.result.stage
    }

    fn require(&self, step: CombatStage) -> Result<()> {
        let needed = match step {
            CombatStage::Declared | CombatStage::AttacksRolled => CombatStage::Declared,
            CombatStage::HitsRolled => CombatStage::AttacksRolled,
            CombatStage::WoundsRolled => CombatStage::HitsRolled,
            CombatStage::SavesRolled => CombatStage::WoundsRolled,
            CombatStage::FeelNoPainRolled => CombatStage::SavesRolled,
            CombatStage::Summarized => CombatStage::FeelNoPainRolled,
        };
        if self.result.stage < needed {
            return Err(EngineError::StepOutOfOrder {
                step: step.name().to_string(),
                stage: self.result.stage.name().to_string(),
            });
        }
        Ok(())
    }

    fn missing(step: CombatStage) -> EngineError {
        EngineError::Snapshot(format!("{step} record missing"))
    }

    /// Resolve the Attacks characteristic for every model firing.
    ///
    /// # Errors
    ///
    /// Fails on an invalid Attacks expression or an exhausted dice source.
    pub fn roll_attacks(&mut self, dice: &mut impl DiceSource) -> Result<&AttacksStep> {
        self.require(CombatStage::AttacksRolled)?;
        let snap = &self.result.snapshot;
        let expr = parse_dice(&snap.weapon.attacks)?;
        let abilities = &snap.weapon.abilities;

        let blast_bonus = if abilities.blast { snap.target.model_count / 5 } else { 0 };
        let rapid_fire_bonus = if snap.options.within_half_range {
            abilities.rapid_fire
        } else {
            0
        };

        let mut per_model = Vec::with_capacity(snap.models_firing as usize);
        for _ in 0..snap.models_firing {
            let base = expr.resolve(dice)? as i32 + snap.weapon.attacks_bonus;
            per_model.push(base.max(0) as u32 + blast_bonus + rapid_fire_bonus);
        }
        let total: u32 = per_model.iter().sum();

        tracing::debug!(weapon = %snap.weapon.id, total, "Attacks rolled");
        self.result.truncate_to(CombatStage::AttacksRolled);
        Ok(&*self.result.attacks.insert(AttacksStep {
            per_model,
            blast_bonus,
            rapid_fire_bonus,
            total,
        }))
    }

    /// Roll to hit.
    ///
    /// # Errors
    ///
    /// Fails if attacks have not been rolled or the dice source fails.
    pub fn roll_hits(&mut self, dice: &mut impl DiceSource) -> Result<&HitsStep> {
        self.require(CombatStage::HitsRolled)?;
        let snap = &self.result.snapshot;
        let attacks = self
            .result
            .attacks
            .as_ref()
            .ok_or_else(|| Self::missing(CombatStage::AttacksRolled))?
            .total;
        let abilities = &snap.weapon.abilities;

        let step = if abilities.torrent {
            HitsStep {
                target: None,
                rolls: Vec::new(),
                automatic: attacks,
                sustained: 0,
                lethal: 0,
                hits: attacks,
            }
        } else {
            let mut modifier = snap.modifiers.hit;
            if abilities.heavy && snap.options.remained_stationary {
                modifier += 1;
            }
            if abilities.indirect_fire && !snap.options.target_visible {
                modifier -= 1;
            }
            let modifier = snap.config.cap(modifier);
            let test = D6Test {
                target: effective_target(
                    snap.weapon.skill,
                    modifier,
                    snap.modifiers.override_for(Threshold::Hit),
                ),
                critical: snap.modifiers.critical_hit,
                reroll: snap.modifiers.reroll_for(RollKind::Hit),
            };
            let rolls = test.roll_many(attacks, dice)?;
            let criticals = count(&rolls, |r| r.critical);
            let successes = count(&rolls, |r| r.success);

            let mut sustained = 0;
            if let Some(extra) = abilities.sustained_hits {
                for _ in 0..criticals {
                    sustained += extra.resolve(dice)?;
                }
            }
            let lethal = if abilities.lethal_hits { criticals } else { 0 };

            HitsStep {
                target: Some(test.target),
                rolls,
                automatic: 0,
                sustained,
                lethal,
                hits: successes - lethal + sustained,
            }
        };

        tracing::debug!(
            weapon = %snap.weapon.id,
            hits = step.hits,
            lethal = step.lethal,
            sustained = step.sustained,
            "Hits rolled"
        );
        self.result.truncate_to(CombatStage::HitsRolled);
        Ok(&*self.result.hits.insert(step))
    }

    /// Roll to wound.
    ///
    /// # Errors
    ///
    /// Fails if hits have not been rolled or the dice source fails.
    pub fn roll_wounds(&mut self, dice: &mut impl DiceSource) -> Result<&WoundsStep> {
        self.require(CombatStage::WoundsRolled)?;
        let snap = &self.result.snapshot;
        let hits = self
            .result
            .hits
            .as_ref()
            .ok_or_else(|| Self::missing(CombatStage::HitsRolled))?;
        let abilities = &snap.weapon.abilities;

        let mut modifier = snap.modifiers.wound;
        if abilities.lance && snap.options.charged {
            modifier += 1;
        }
        let modifier = snap.config.cap(modifier);

        let mut critical = snap.modifiers.critical_wound;
        if let Some(anti) = abilities.anti_threshold(&snap.target.keywords) {
            critical = critical.min(anti);
        }
        let mut reroll = snap.modifiers.reroll_for(RollKind::Wound);
        if abilities.twin_linked {
            reroll = reroll.max(Some(RerollKind::Failed));
        }

        let test = D6Test {
            target: effective_target(
                wound_threshold(snap.weapon.strength, snap.target.toughness),
                modifier,
                snap.modifiers.override_for(Threshold::Wound),
            ),
            critical,
            reroll,
        };
        let rolls = test.roll_many(hits.hits, dice)?;
        let successes = count(&rolls, |r| r.success);
        let devastating = if abilities.devastating_wounds {
            count(&rolls, |r| r.critical)
        } else {
            0
        };

        let step = WoundsStep {
            target: test.target,
            rolls,
            automatic: hits.lethal,
            wounds: successes - devastating + hits.lethal,
            devastating,
        };

        tracing::debug!(
            weapon = %snap.weapon.id,
            wounds = step.wounds,
            devastating = step.devastating,
            "Wounds rolled"
        );
        self.result.truncate_to(CombatStage::WoundsRolled);
        Ok(&*self.result.wounds.insert(step))
    }

    /// Make saving throws against every wound that is not devastating.
    ///
    /// # Errors
    ///
    /// Fails if wounds have not been rolled or the dice source fails.
    pub fn roll_saves(&mut self, dice: &mut impl DiceSource) -> Result<&SavesStep> {
        self.require(CombatStage::SavesRolled)?;
        let snap = &self.result.snapshot;
        let wounds = self
            .result
            .wounds
            .as_ref()
            .ok_or_else(|| Self::missing(CombatStage::WoundsRolled))?
            .wounds;
        let target = &snap.target;
        let options = &snap.options;
        let abilities = &snap.weapon.abilities;

        let in_cover = options.in_cover || (abilities.indirect_fire && !options.target_visible);
        let cover_blocked = snap.config.cover_blocked_by_good_save && target.save <= 3 && snap.weapon.ap == 0;
        let cover = in_cover && !abilities.ignores_cover && !cover_blocked;

        let mut armour = i32::from(target.save) - snap.weapon.ap - snap.modifiers.save;
        if cover {
            armour -= 1;
        }
        let armour = match snap.modifiers.override_for(Threshold::Save) {
            Some(value) => i32::from(value),
            None => armour.max(2),
        };
        let invulnerable = snap
            .modifiers
            .override_for(Threshold::Invulnerable)
            .or(target.invulnerable_save)
            .map(|v| i32::from(v.max(2)));

        let (best, use_invulnerable) = match invulnerable {
            Some(inv) if inv < armour => (inv, true),
            _ => (armour, false),
        };

        let step = if best >= i32::from(IMPOSSIBLE) {
            SavesStep {
                target: None,
                invulnerable: false,
                cover,
                rolls: Vec::new(),
                saved: 0,
                unsaved: wounds,
            }
        } else {
            let test = D6Test {
                target: best as u8,
                critical: IMPOSSIBLE,
                reroll: snap.modifiers.reroll_for(RollKind::Save),
            };
            let rolls = test.roll_many(wounds, dice)?;
            let saved = count(&rolls, |r| r.success);
            SavesStep {
                target: Some(test.target),
                invulnerable: use_invulnerable,
                cover,
                rolls,
                saved,
                unsaved: wounds - saved,
            }
        };

        tracing::debug!(
            target = %target.unit_id,
            saved = step.saved,
            unsaved = step.unsaved,
            "Saves rolled"
        );
        self.result.truncate_to(CombatStage::SavesRolled);
        Ok(&*self.result.saves.insert(step))
    }

    /// Roll Feel No Pain once per penetrating wound.
    ///
    /// # Errors
    ///
    /// Fails if saves have not been rolled or the dice source fails.
    pub fn roll_feel_no_pain(&mut self, dice: &mut impl DiceSource) -> Result<&FeelNoPainStep> {
        self.require(CombatStage::FeelNoPainRolled)?;
        let snap = &self.result.snapshot;
        let devastating = self
            .result
            .wounds
            .as_ref()
            .ok_or_else(|| Self::missing(CombatStage::WoundsRolled))?
            .devastating;
        let unsaved = self
            .result
            .saves
            .as_ref()
            .ok_or_else(|| Self::missing(CombatStage::SavesRolled))?
            .unsaved;
        let penetrating = unsaved.saturating_add(devastating);

        let threshold = snap
            .modifiers
            .override_for(Threshold::FeelNoPain)
            .or(snap.target.feel_no_pain)
            .filter(|v| *v < IMPOSSIBLE);

        let step = match threshold {
            None => FeelNoPainStep {
                target: None,
                penetrating,
                rolls: Vec::new(),
                negated: 0,
            },
            Some(value) => {
                let test = D6Test {
                    target: value.max(2),
                    critical: IMPOSSIBLE,
                    reroll: None,
                };
                let rolls = test.roll_many(penetrating, dice)?;
                let negated = count(&rolls, |r| r.success);
                FeelNoPainStep {
                    target: Some(test.target),
                    penetrating,
                    rolls,
                    negated,
                }
            }
        };

        tracing::debug!(
            target = %snap.target.unit_id,
            penetrating,
            negated = step.negated,
            "Feel No Pain rolled"
        );
        self.result.truncate_to(CombatStage::FeelNoPainRolled);
        Ok(&*self.result.feel_no_pain.insert(step))
    }

    /// Roll damage for every remaining wound and total it.
    ///
    /// # Errors
    ///
    /// Fails on an invalid Damage expression or an exhausted dice source.
    pub fn summarize(&mut self, dice: &mut impl DiceSource) -> Result<&CombatSummary> {
        self.require(CombatStage::Summarized)?;
        let snap = &self.result.snapshot;
        let remaining = self
            .result
            .feel_no_pain
            .as_ref()
            .ok_or_else(|| Self::missing(CombatStage::FeelNoPainRolled))?
            .remaining();
        let expr = parse_dice(&snap.weapon.damage)?;
        let melta_bonus = if snap.options.within_half_range {
            snap.weapon.abilities.melta
        } else {
            0
        };
        let reroll = snap.modifiers.reroll_for(RollKind::Damage);
        let bonus = snap.weapon.damage_bonus + melta_bonus as i32;

        let mut damage = Vec::with_capacity(remaining as usize);
        for _ in 0..remaining {
            let first = expr.resolve(dice)?;
            let poor = match reroll {
                _ if expr.is_fixed() => false,
                None => false,
                Some(RerollKind::Ones) => first as i32 == expr.min(),
                Some(RerollKind::Failed | RerollKind::All) => (first as i32) * 2 < expr.min() + expr.max(),
            };
            let (rolled, rerolled_from) = if poor {
                (expr.resolve(dice)?, Some(first))
            } else {
                (first, None)
            };
            // Damage modifiers never reduce an instance below 1.
            let value = (rolled as i32 + bonus).max(1) as u32;
            damage.push(DamageRoll {
                value,
                rerolled_from: rerolled_from.map(|r| (r as i32 + bonus).max(1) as u32),
            });
        }
        let total_damage: u32 = damage.iter().map(|d| d.value).sum();

        tracing::debug!(
            weapon = %snap.weapon.id,
            wounds = remaining,
            total_damage,
            "Combat summarized"
        );
        self.result.truncate_to(CombatStage::Summarized);
        Ok(&*self.result.summary.insert(CombatSummary {
            wounds_dealt: remaining,
            melta_bonus,
            damage,
            total_damage,
        }))
    }

    /// Run every step after the current stage.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step; earlier steps stay recorded.
    pub fn resolve_all(&mut self, dice: &mut impl DiceSource) -> Result<&CombatResult> {
        loop {
            match self.result.stage {
                CombatStage::Declared => {
                    self.roll_attacks(dice)?;
                }
                CombatStage::AttacksRolled => {
                    self.roll_hits(dice)?;
                }
                CombatStage::HitsRolled => {
                    self.roll_wounds(dice)?;
                }
                CombatStage::WoundsRolled => {
                    self.roll_saves(dice)?;
                }
                CombatStage::SavesRolled => {
                    self.roll_feel_no_pain(dice)?;
                }
                CombatStage::FeelNoPainRolled => {
                    self.summarize(dice)?;
                }
                CombatStage::Summarized => return Ok(&self.result),
            }
        }
    }
}
