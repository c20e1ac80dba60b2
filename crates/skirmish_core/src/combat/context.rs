//! Combat context: the per-attack evaluation input plus modifier accumulator.
//!
//! A context is built fresh for each attack instance and for each side
//! (attacker and defender), filled by the rule applier, and discarded once
//! its modifiers have been baked into a combat snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data::{UnitView, Weapon};
use crate::error::Result;
use crate::game::{GameState, TurnContext};
use crate::rules::{get_all_unit_rules, Characteristic, RerollKind, RollKind, Rule, Threshold};

/// Which side of the attack a context evaluates rules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatRole {
    /// The side making the attack.
    Attacker,
    /// The side being attacked.
    Defender,
}

/// Situational inputs for one attack, supplied by the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatOptions {
    /// Models firing the weapon (None ⇒ every model carrying it).
    pub models_firing: Option<u32>,
    /// Target is within half the weapon's range.
    pub within_half_range: bool,
    /// Target is visible to the attacker.
    pub target_visible: bool,
    /// Attacking unit charged this turn.
    pub charged: bool,
    /// Attacking unit remained stationary this turn.
    pub remained_stationary: bool,
    /// Target has the benefit of cover.
    pub in_cover: bool,
    /// Free-form user input flags.
    pub flags: BTreeSet<String>,
}

impl Default for CombatOptions {
    fn default() -> Self {
        Self {
            models_firing: None,
            within_half_range: false,
            target_visible: true,
            charged: false,
            remained_stationary: false,
            in_cover: false,
            flags: BTreeSet::new(),
        }
    }
}

/// A reroll granted by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RerollGrant {
    /// Roll affected.
    pub roll: RollKind,
    /// Which dice may be re-rolled.
    pub kind: RerollKind,
}

/// Accumulated effects of every satisfied rule.
///
/// Numeric deltas stack additively. Threshold overrides replace each other
/// in rule order. Critical thresholds keep the lowest value granted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    /// Delta added to hit rolls.
    pub hit: i32,
    /// Delta added to wound rolls.
    pub wound: i32,
    /// Delta added to saving throws.
    pub save: i32,
    /// Characteristic deltas.
    pub characteristics: BTreeMap<Characteristic, i32>,
    /// Keywords granted to the attacking weapon.
    pub keywords: BTreeSet<String>,
    /// Reroll grants.
    pub rerolls: BTreeSet<RerollGrant>,
    /// Threshold overrides.
    pub overrides: BTreeMap<Threshold, u8>,
    /// Critical thresholds for hit and wound rolls.
    pub critical: BTreeMap<RollKind, u8>,
    /// Effects that were ignored, with the reason.
    pub diagnostics: Vec<String>,
}

impl Modifiers {
    /// Delta accumulated for a characteristic.
    #[must_use]
    pub fn characteristic(&self, stat: Characteristic) -> i32 {
        self.characteristics.get(&stat).copied().unwrap_or(0)
    }

    /// Add a characteristic delta.
    pub fn add_characteristic(&mut self, stat: Characteristic, delta: i32) {
        *self.characteristics.entry(stat).or_insert(0) += delta;
    }

    /// Best reroll kind granted for `roll`, if any (`All` > `Failed` > `Ones`).
    #[must_use]
    pub fn reroll_for(&self, roll: RollKind) -> Option<RerollKind> {
        self.rerolls
            .iter()
            .filter(|g| g.roll == roll)
            .map(|g| g.kind)
            .max()
    }

    /// Grant a reroll.
    pub fn grant_reroll(&mut self, roll: RollKind, kind: RerollKind) {
        self.rerolls.insert(RerollGrant { roll, kind });
    }

    /// Lower the critical threshold for a roll; the lowest grant wins.
    pub fn lower_critical(&mut self, roll: RollKind, value: u8) {
        let entry = self.critical.entry(roll).or_insert(value);
        *entry = (*entry).min(value);
    }

    /// Whether nothing has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Evaluation input for one side of one attack.
#[derive(Debug, Clone)]
pub struct CombatContext<'a> {
    /// The attacking unit and its attachments.
    pub attacker: UnitView<'a>,
    /// The defending unit and its attachments.
    pub defender: UnitView<'a>,
    /// The attacking weapon.
    pub weapon: &'a Weapon,
    /// Turn and phase state.
    pub game: &'a GameState,
    /// Turn context of the evaluating side.
    pub turn: TurnContext,
    /// Side whose rules are being evaluated.
    pub role: CombatRole,
    /// Situational inputs.
    pub options: CombatOptions,
    /// Aggregated rule set of the evaluating side.
    pub rules: Vec<Rule>,
    /// Active army states of the evaluating side.
    pub army_states: BTreeSet<String>,
    /// Modifier accumulator, the only mutable state.
    pub modifiers: Modifiers,
}

impl<'a> CombatContext<'a> {
    /// Create a context with no rules, options or army states.
    ///
    /// The attacker is assumed to act in its own turn.
    #[must_use]
    pub fn new(
        attacker: UnitView<'a>,
        defender: UnitView<'a>,
        weapon: &'a Weapon,
        game: &'a GameState,
        role: CombatRole,
    ) -> Self {
        let turn = match role {
            CombatRole::Attacker => TurnContext::Own,
            CombatRole::Defender => TurnContext::Opponent,
        };
        Self {
            attacker,
            defender,
            weapon,
            game,
            turn,
            role,
            options: CombatOptions::default(),
            rules: Vec::new(),
            army_states: BTreeSet::new(),
            modifiers: Modifiers::default(),
        }
    }

    /// Start building a context.
    #[must_use]
    pub fn builder(
        attacker: UnitView<'a>,
        defender: UnitView<'a>,
        weapon: &'a Weapon,
        game: &'a GameState,
    ) -> CombatContextBuilder<'a> {
        CombatContextBuilder {
            attacker,
            defender,
            weapon,
            game,
            role: CombatRole::Attacker,
            turn: None,
            options: CombatOptions::default(),
            army_states: BTreeSet::new(),
        }
    }

    /// The unit whose rules are evaluated.
    #[must_use]
    pub fn own_side(&self) -> &UnitView<'a> {
        match self.role {
            CombatRole::Attacker => &self.attacker,
            CombatRole::Defender => &self.defender,
        }
    }

    /// The opposing unit.
    #[must_use]
    pub fn enemy_side(&self) -> &UnitView<'a> {
        match self.role {
            CombatRole::Attacker => &self.defender,
            CombatRole::Defender => &self.attacker,
        }
    }
}

/// Builder assembling a [`CombatContext`] with the evaluating side's rules.
#[derive(Debug, Clone)]
pub struct CombatContextBuilder<'a> {
    attacker: UnitView<'a>,
    defender: UnitView<'a>,
    weapon: &'a Weapon,
    game: &'a GameState,
    role: CombatRole,
    turn: Option<TurnContext>,
    options: CombatOptions,
    army_states: BTreeSet<String>,
}

impl<'a> CombatContextBuilder<'a> {
    /// Set the evaluating side.
    #[must_use]
    pub fn role(mut self, role: CombatRole) -> Self {
        self.role = role;
        self
    }

    /// Set the evaluating side's turn context explicitly.
    #[must_use]
    pub fn turn(mut self, turn: TurnContext) -> Self {
        self.turn = Some(turn);
        self
    }

    /// Set situational options.
    #[must_use]
    pub fn options(mut self, options: CombatOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the evaluating side's active army states.
    #[must_use]
    pub fn army_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.army_states = states.into_iter().map(Into::into).collect();
        self
    }

    /// Aggregate the evaluating side's rules and build the context.
    ///
    /// # Errors
    ///
    /// Fails if a rule payload cannot be decoded or the attachment data is
    /// ambiguous.
    pub fn build(self) -> Result<CombatContext<'a>> {
        let mut ctx = CombatContext::new(
            self.attacker,
            self.defender,
            self.weapon,
            self.game,
            self.role,
        );
        if let Some(turn) = self.turn {
            ctx.turn = turn;
        }
        ctx.options = self.options;
        ctx.army_states = self.army_states;
        ctx.rules = get_all_unit_rules(ctx.own_side())?;
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RuleRecord, Unit, WeaponKind};
    use crate::game::PlayerId;

    #[test]
    fn test_modifier_helpers() {
        let mut mods = Modifiers::default();
        assert!(mods.is_empty());

        mods.add_characteristic(Characteristic::Attacks, 1);
        mods.add_characteristic(Characteristic::Attacks, 2);
        assert_eq!(mods.characteristic(Characteristic::Attacks), 3);
        assert_eq!(mods.characteristic(Characteristic::Damage), 0);

        mods.grant_reroll(RollKind::Hit, RerollKind::Ones);
        mods.grant_reroll(RollKind::Hit, RerollKind::Failed);
        assert_eq!(mods.reroll_for(RollKind::Hit), Some(RerollKind::Failed));
        assert_eq!(mods.reroll_for(RollKind::Wound), None);

        mods.lower_critical(RollKind::Hit, 5);
        mods.lower_critical(RollKind::Hit, 6);
        assert_eq!(mods.critical.get(&RollKind::Hit), Some(&5));
        assert!(!mods.is_empty());
    }

    #[test]
    fn test_default_options() {
        let options = CombatOptions::default();
        assert!(options.target_visible);
        assert!(!options.within_half_range);
        assert_eq!(options.models_firing, None);
    }

    #[test]
    fn test_builder_aggregates_own_side() {
        let mut attacker = Unit::new("a", "Attacker");
        attacker.rules.push(RuleRecord::new(
            "Aim",
            r#"{"id":"aim","name":"Aim","scope":"unit","effects":[{"modify_hit":1}]}"#,
        ));
        let mut defender = Unit::new("d", "Defender");
        defender.rules.push(RuleRecord::new(
            "Tough",
            r#"{"id":"tough","name":"Tough","scope":"unit","effects":[{"modify_wound":-1}]}"#,
        ));
        let weapon = Weapon::new("w", "W", WeaponKind::Ranged);
        let game = GameState::new("g", PlayerId("p".into()));

        let ctx = CombatContext::builder(UnitView::solo(&attacker), UnitView::solo(&defender), &weapon, &game)
            .army_states(["waaagh"])
            .build()
            .unwrap();
        assert_eq!(ctx.rules.len(), 1);
        assert_eq!(ctx.rules[0].id, "aim");
        assert_eq!(ctx.turn, TurnContext::Own);
        assert!(ctx.army_states.contains("waaagh"));

        let ctx = CombatContext::builder(UnitView::solo(&attacker), UnitView::solo(&defender), &weapon, &game)
            .role(CombatRole::Defender)
            .build()
            .unwrap();
        assert_eq!(ctx.rules[0].id, "tough");
        assert_eq!(ctx.turn, TurnContext::Opponent);
        assert_eq!(ctx.own_side().unit.id, "d");
        assert_eq!(ctx.enemy_side().unit.id, "a");
    }
}
