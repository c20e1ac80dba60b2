//! Combat snapshots: everything dice resolution needs, with rule effects
//! baked in.
//!
//! A snapshot is built once from the attacker's and defender's evaluated
//! contexts. After that, resolution never looks at rules again, so a peer
//! holding only the snapshot reproduces the same outcome from the same dice.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::abilities::AbilitySet;
use super::config::CombatConfig;
use super::context::{CombatContext, CombatOptions, CombatRole, Modifiers, RerollGrant};
use crate::data::{Army, ModelCharacteristics, UnitView, Weapon, WeaponKind};
use crate::error::Result;
use crate::game::{GameState, TurnContext};
use crate::rules::{apply_rules, ActiveRule, Characteristic, RerollKind, RollKind, Threshold};

/// Default critical threshold for hit and wound rolls.
pub const DEFAULT_CRITICAL: u8 = 6;

/// Weapon profile used for one attack, after characteristic modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSnapshot {
    /// Weapon identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Ranged or melee.
    pub kind: WeaponKind,
    /// Attacks characteristic as written on the profile.
    pub attacks: String,
    /// Flat amount added to each model's attacks.
    pub attacks_bonus: i32,
    /// Skill (target number to hit before modifiers).
    pub skill: u8,
    /// Strength.
    pub strength: i32,
    /// Armour penetration (zero or negative).
    pub ap: i32,
    /// Damage characteristic as written on the profile.
    pub damage: String,
    /// Flat amount added to each damage roll.
    pub damage_bonus: i32,
    /// Effective keywords: the profile's plus any granted by rules.
    pub keywords: Vec<String>,
    /// Abilities parsed from the effective keywords.
    pub abilities: AbilitySet,
}

/// Defending unit's profile used for one attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    /// Defending unit identifier.
    pub unit_id: String,
    /// Display name.
    pub name: String,
    /// Models in the combined unit.
    pub model_count: u32,
    /// Toughness.
    pub toughness: i32,
    /// Armour save.
    pub save: u8,
    /// Invulnerable save, if any.
    pub invulnerable_save: Option<u8>,
    /// Feel No Pain, if any.
    pub feel_no_pain: Option<u8>,
    /// Keywords of the combined unit.
    pub keywords: BTreeSet<String>,
}

impl TargetSnapshot {
    /// Take the profile of the defending body's first model.
    #[must_use]
    pub fn from_view(view: &UnitView<'_>) -> Self {
        let body = view.body();
        let stats = body
            .models
            .first()
            .or_else(|| view.models().next())
            .map_or_else(ModelCharacteristics::default, |m| m.characteristics);
        Self {
            unit_id: view.unit.id.clone(),
            name: view.unit.name.clone(),
            model_count: view.model_count() as u32,
            toughness: stats.toughness,
            save: stats.save,
            invulnerable_save: stats.invulnerable_save,
            feel_no_pain: stats.feel_no_pain,
            keywords: view.keywords(),
        }
    }
}

/// Roll modifiers baked from both sides' rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollModifiers {
    /// Net hit roll modifier (after the configured cap).
    pub hit: i32,
    /// Net wound roll modifier (after the configured cap).
    pub wound: i32,
    /// Net saving throw modifier.
    pub save: i32,
    /// Reroll grants.
    pub rerolls: BTreeSet<RerollGrant>,
    /// Threshold overrides.
    pub overrides: BTreeMap<Threshold, u8>,
    /// Critical hit threshold.
    pub critical_hit: u8,
    /// Critical wound threshold.
    pub critical_wound: u8,
}

impl Default for RollModifiers {
    fn default() -> Self {
        Self {
            hit: 0,
            wound: 0,
            save: 0,
            rerolls: BTreeSet::new(),
            overrides: BTreeMap::new(),
            critical_hit: DEFAULT_CRITICAL,
            critical_wound: DEFAULT_CRITICAL,
        }
    }
}

impl RollModifiers {
    /// Best reroll granted for `roll`.
    #[must_use]
    pub fn reroll_for(&self, roll: RollKind) -> Option<RerollKind> {
        self.rerolls
            .iter()
            .filter(|g| g.roll == roll)
            .map(|g| g.kind)
            .max()
    }

    /// Override for a threshold, if any rule set one.
    #[must_use]
    pub fn override_for(&self, threshold: Threshold) -> Option<u8> {
        self.overrides.get(&threshold).copied()
    }
}

/// The exact inputs of one attack's dice resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatSnapshot {
    /// Weapon profile.
    pub weapon: WeaponSnapshot,
    /// Target profile.
    pub target: TargetSnapshot,
    /// Models firing or fighting with the weapon.
    pub models_firing: u32,
    /// Situational inputs.
    pub options: CombatOptions,
    /// Baked roll modifiers.
    pub modifiers: RollModifiers,
    /// Rules whose effects are baked in.
    pub active_rules: Vec<ActiveRule>,
    /// Effects that were ignored, with the reason.
    pub diagnostics: Vec<String>,
    /// Resolution configuration.
    pub config: CombatConfig,
}

/// Which rolls each side may grant rerolls for.
const fn side_owns_roll(side: CombatRole, roll: RollKind) -> bool {
    match side {
        CombatRole::Attacker => matches!(roll, RollKind::Hit | RollKind::Wound | RollKind::Damage),
        CombatRole::Defender => matches!(roll, RollKind::Save),
    }
}

fn clamp_target(value: i32) -> u8 {
    value.clamp(2, 7) as u8
}

impl CombatSnapshot {
    /// Bake the evaluated contexts of both sides into a snapshot.
    ///
    /// `attacker` supplies the weapon, target, options and offensive
    /// modifiers. `defender`, if given, contributes save-side effects and,
    /// when the config merges defensive modifiers, its hit and wound deltas.
    ///
    /// Characteristic deltas stay with the side that owns the stat: weapon
    /// stats come from the attacker only, Toughness and Save from the
    /// defender only. A delta a side cannot own is reported in
    /// `diagnostics`.
    #[must_use]
    pub fn bake(
        attacker: &CombatContext<'_>,
        defender: Option<&CombatContext<'_>>,
        active_rules: Vec<ActiveRule>,
        config: CombatConfig,
    ) -> Self {
        let atk = &attacker.modifiers;
        let mut diagnostics = atk.diagnostics.clone();
        let mut weapon_stats = BTreeMap::new();
        let mut target_stats = BTreeMap::new();
        let mut overrides = atk.overrides.clone();
        let mut rerolls = BTreeSet::new();
        let (mut hit, mut wound, mut save) = (atk.hit, atk.wound, atk.save);

        keep_rerolls(atk, CombatRole::Attacker, &mut rerolls, &mut diagnostics);
        route_characteristics(atk, CombatRole::Attacker, &mut weapon_stats, &mut target_stats, &mut diagnostics);

        if let Some(def) = defender.map(|ctx| &ctx.modifiers) {
            diagnostics.extend(def.diagnostics.iter().cloned());
            if config.merge_defensive_modifiers {
                hit += def.hit;
                wound += def.wound;
            } else if def.hit != 0 || def.wound != 0 {
                diagnostics.push("defensive hit/wound modifiers not merged into the attack".to_string());
            }
            save += def.save;
            route_characteristics(def, CombatRole::Defender, &mut weapon_stats, &mut target_stats, &mut diagnostics);
            // Defender overrides apply after the attacker's.
            overrides.extend(def.overrides.iter().map(|(k, v)| (*k, *v)));
            keep_rerolls(def, CombatRole::Defender, &mut rerolls, &mut diagnostics);
            if !def.keywords.is_empty() {
                diagnostics.push(format!(
                    "keywords granted by defensive rules are ignored: {}",
                    def.keywords.iter().cloned().collect::<Vec<_>>().join(", ")
                ));
            }
            if !def.critical.is_empty() {
                diagnostics.push("critical thresholds granted by defensive rules are ignored".to_string());
            }
        }

        let stat = |c: Characteristic| {
            weapon_stats
                .get(&c)
                .or_else(|| target_stats.get(&c))
                .copied()
                .unwrap_or(0)
        };
        let weapon = attacker.weapon;

        let mut keywords = weapon.keywords.clone();
        for granted in &atk.keywords {
            if !keywords.iter().any(|k| k.eq_ignore_ascii_case(granted)) {
                keywords.push(granted.clone());
            }
        }
        let abilities = AbilitySet::from_keywords(keywords.iter().map(String::as_str));

        let weapon_snapshot = WeaponSnapshot {
            id: weapon.id.clone(),
            name: weapon.name.clone(),
            kind: weapon.kind,
            attacks: weapon.attacks.clone(),
            attacks_bonus: stat(Characteristic::Attacks),
            skill: clamp_target(i32::from(weapon.skill) + stat(Characteristic::Skill)),
            strength: (weapon.strength + stat(Characteristic::Strength)).max(1),
            ap: (weapon.ap + stat(Characteristic::ArmourPenetration)).min(0),
            damage: weapon.damage.clone(),
            damage_bonus: stat(Characteristic::Damage),
            keywords,
            abilities,
        };

        let mut target = TargetSnapshot::from_view(&attacker.defender);
        target.toughness = (target.toughness + stat(Characteristic::Toughness)).max(1);
        target.save = clamp_target(i32::from(target.save) + stat(Characteristic::Save));

        let critical = |roll: RollKind| {
            atk.critical
                .get(&roll)
                .copied()
                .unwrap_or(DEFAULT_CRITICAL)
                .clamp(2, DEFAULT_CRITICAL)
        };
        let modifiers = RollModifiers {
            hit: config.cap(hit),
            wound: config.cap(wound),
            save,
            rerolls,
            overrides,
            critical_hit: critical(RollKind::Hit),
            critical_wound: critical(RollKind::Wound),
        };

        for note in &diagnostics {
            tracing::debug!(weapon = %weapon.id, note = %note, "Combat diagnostic");
        }

        Self {
            weapon: weapon_snapshot,
            target,
            models_firing: models_firing(attacker),
            options: attacker.options.clone(),
            modifiers,
            active_rules,
            diagnostics,
            config,
        }
    }
}

/// Sort one side's characteristic deltas into the weapon or target profile.
fn route_characteristics(
    mods: &Modifiers,
    side: CombatRole,
    weapon_stats: &mut BTreeMap<Characteristic, i32>,
    target_stats: &mut BTreeMap<Characteristic, i32>,
    diagnostics: &mut Vec<String>,
) {
    for (&stat, &delta) in &mods.characteristics {
        match (side, stat.is_weapon_stat()) {
            (CombatRole::Attacker, true) => *weapon_stats.entry(stat).or_insert(0) += delta,
            (CombatRole::Defender, false) => *target_stats.entry(stat).or_insert(0) += delta,
            _ => diagnostics.push(format!(
                "{side:?} {stat:?} modifier does not apply to the other side's profile"
            )),
        }
    }
}

fn keep_rerolls(
    mods: &Modifiers,
    side: CombatRole,
    rerolls: &mut BTreeSet<RerollGrant>,
    diagnostics: &mut Vec<String>,
) {
    for grant in &mods.rerolls {
        if side_owns_roll(side, grant.roll) {
            rerolls.insert(*grant);
        } else {
            diagnostics.push(format!("{side:?} cannot re-roll {:?} rolls", grant.roll));
        }
    }
}

fn models_firing(ctx: &CombatContext<'_>) -> u32 {
    if let Some(n) = ctx.options.models_firing {
        return n;
    }
    let carrying: usize = ctx
        .attacker
        .units()
        .map(|u| u.models_with_weapon(&ctx.weapon.id))
        .sum();
    // A weapon handed in directly still fires once.
    carrying.max(1) as u32
}

/// Everything besides the units and weapon needed to prepare an attack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttackSetup {
    /// Situational inputs.
    pub options: CombatOptions,
    /// Turn context of the attacking side.
    pub attacker_turn: TurnContext,
    /// Active army states of the attacking army.
    pub attacker_states: BTreeSet<String>,
    /// Active army states of the defending army.
    pub defender_states: BTreeSet<String>,
    /// Resolution configuration.
    pub config: CombatConfig,
}

impl AttackSetup {
    /// Setup with army states and turn context taken from the armies.
    #[must_use]
    pub fn for_armies(attacker: &Army, defender: &Army, game: &GameState) -> Self {
        Self {
            options: CombatOptions::default(),
            attacker_turn: game.turn_context_for(&attacker.player),
            attacker_states: attacker.state_names(),
            defender_states: defender.state_names(),
            config: CombatConfig::default(),
        }
    }

    /// Builder method to set the options.
    #[must_use]
    pub fn with_options(mut self, options: CombatOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder method to set the config.
    #[must_use]
    pub fn with_config(mut self, config: CombatConfig) -> Self {
        self.config = config;
        self
    }
}

/// Build both sides' contexts, apply their rules and bake a snapshot.
///
/// Weapon usage and range are not checked here. Callers gate the weapon
/// with [`Weapon::is_available`](crate::data::Weapon::is_available) and
/// derive `within_half_range` from its range.
///
/// # Errors
///
/// Fails if either side's rules cannot be aggregated.
pub fn prepare_attack(
    attacker: &UnitView<'_>,
    defender: &UnitView<'_>,
    weapon: &Weapon,
    game: &GameState,
    setup: &AttackSetup,
) -> Result<CombatSnapshot> {
    let mut atk_ctx = CombatContext::builder(attacker.clone(), defender.clone(), weapon, game)
        .role(CombatRole::Attacker)
        .turn(setup.attacker_turn)
        .options(setup.options.clone())
        .army_states(setup.attacker_states.iter().cloned())
        .build()?;
    let mut def_ctx = CombatContext::builder(attacker.clone(), defender.clone(), weapon, game)
        .role(CombatRole::Defender)
        .turn(setup.attacker_turn.opposite())
        .options(setup.options.clone())
        .army_states(setup.defender_states.iter().cloned())
        .build()?;

    let mut active = apply_rules(&mut atk_ctx);
    active.extend(apply_rules(&mut def_ctx));

    tracing::debug!(
        attacker = %attacker.unit.id,
        defender = %defender.unit.id,
        weapon = %weapon.id,
        active_rules = active.len(),
        "Prepared attack"
    );

    Ok(CombatSnapshot::bake(&atk_ctx, Some(&def_ctx), active, setup.config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Model, RuleRecord, Unit};
    use crate::game::PlayerId;

    fn unit(id: &str, toughness: i32, save: u8, models: usize) -> Unit {
        let mut unit = Unit::new(id, id);
        for i in 0..models {
            let stats = ModelCharacteristics {
                toughness,
                save,
                ..ModelCharacteristics::default()
            };
            unit.models.push(Model::new(format!("{id}-{i}"), id, stats));
        }
        unit
    }

    fn record(id: &str, body: &str) -> RuleRecord {
        RuleRecord::new(id, format!(r#"{{"id":"{id}","name":"{id}","scope":"unit",{body}}}"#))
    }

    #[test]
    fn test_plain_snapshot() {
        let attacker = unit("a", 4, 4, 1);
        let defender = unit("d", 4, 3, 10);
        let weapon = Weapon::new("w", "W", WeaponKind::Ranged).with_profile("2", 3, 4, -1, "1");
        let game = GameState::new("g", PlayerId("p".into()));

        let snapshot = prepare_attack(
            &UnitView::solo(&attacker),
            &UnitView::solo(&defender),
            &weapon,
            &game,
            &AttackSetup::default(),
        )
        .unwrap();

        assert_eq!(snapshot.weapon.skill, 3);
        assert_eq!(snapshot.weapon.ap, -1);
        assert_eq!(snapshot.target.toughness, 4);
        assert_eq!(snapshot.target.save, 3);
        assert_eq!(snapshot.target.model_count, 10);
        assert_eq!(snapshot.models_firing, 1);
        assert_eq!(snapshot.modifiers, RollModifiers::default());
        assert!(snapshot.active_rules.is_empty());
    }

    #[test]
    fn test_both_sides_baked() {
        let mut attacker = unit("a", 4, 4, 1);
        attacker.rules = vec![
            record("aim", r#""effects":[{"modify_hit":1},{"modify_characteristic":{"stat":"strength","delta":1}}]"#),
            record("lethal", r#""effects":[{"add_keyword":"Lethal Hits"}]"#),
        ];
        let mut defender = unit("d", 4, 3, 5);
        defender.rules = vec![
            record("tough", r#""effects":[{"modify_wound":-1},{"grant_reroll":{"roll":"save","kind":"ones"}}]"#),
            record("bad", r#""effects":[{"grant_reroll":{"roll":"hit","kind":"all"}}]"#),
        ];
        let weapon = Weapon::new("w", "W", WeaponKind::Melee);
        let game = GameState::new("g", PlayerId("p".into()));

        let snapshot = prepare_attack(
            &UnitView::solo(&attacker),
            &UnitView::solo(&defender),
            &weapon,
            &game,
            &AttackSetup::default(),
        )
        .unwrap();

        assert_eq!(snapshot.modifiers.hit, 1);
        assert_eq!(snapshot.modifiers.wound, -1);
        assert_eq!(snapshot.weapon.strength, 5);
        assert!(snapshot.weapon.abilities.lethal_hits);
        assert_eq!(snapshot.modifiers.reroll_for(RollKind::Save), Some(RerollKind::Ones));
        assert_eq!(snapshot.modifiers.reroll_for(RollKind::Hit), None);
        assert_eq!(snapshot.active_rules.len(), 4);
        assert_eq!(snapshot.diagnostics.len(), 1);
    }

    #[test]
    fn test_characteristics_stay_with_their_owner() {
        let mut attacker = unit("a", 4, 4, 1);
        attacker.rules = vec![record(
            "hardy",
            r#""effects":[{"modify_characteristic":{"stat":"toughness","delta":1}},{"modify_characteristic":{"stat":"strength","delta":1}}]"#,
        )];
        let mut defender = unit("d", 4, 3, 5);
        defender.rules = vec![record(
            "brutal",
            r#""effects":[{"modify_characteristic":{"stat":"attacks","delta":4}},{"modify_characteristic":{"stat":"save","delta":-1}}]"#,
        )];
        let weapon = Weapon::new("w", "W", WeaponKind::Ranged).with_profile("2", 3, 4, -1, "1");
        let game = GameState::new("g", PlayerId("p".into()));

        let snapshot = prepare_attack(
            &UnitView::solo(&attacker),
            &UnitView::solo(&defender),
            &weapon,
            &game,
            &AttackSetup::default(),
        )
        .unwrap();

        // Each side's own stats apply.
        assert_eq!(snapshot.weapon.strength, 5);
        assert_eq!(snapshot.target.save, 2);
        // Neither leaks onto the other side's profile.
        assert_eq!(snapshot.target.toughness, 4);
        assert_eq!(snapshot.weapon.attacks_bonus, 0);
        assert_eq!(snapshot.diagnostics.len(), 2);
        assert!(snapshot.diagnostics.iter().any(|d| d.contains("Attacker Toughness")));
        assert!(snapshot.diagnostics.iter().any(|d| d.contains("Defender Attacks")));
    }

    #[test]
    fn test_defensive_merge_can_be_disabled() {
        let attacker = unit("a", 4, 4, 1);
        let mut defender = unit("d", 4, 3, 5);
        defender.rules = vec![record("tough", r#""effects":[{"modify_wound":-1}]"#)];
        let weapon = Weapon::new("w", "W", WeaponKind::Melee);
        let game = GameState::new("g", PlayerId("p".into()));
        let setup = AttackSetup::default().with_config(CombatConfig::default().with_defensive_merge(false));

        let snapshot = prepare_attack(
            &UnitView::solo(&attacker),
            &UnitView::solo(&defender),
            &weapon,
            &game,
            &setup,
        )
        .unwrap();
        assert_eq!(snapshot.modifiers.wound, 0);
        assert_eq!(snapshot.diagnostics.len(), 1);
    }

    #[test]
    fn test_modifier_cap_applies_to_net_value() {
        let mut attacker = unit("a", 4, 4, 1);
        attacker.rules = vec![
            record("one", r#""effects":[{"modify_hit":1}]"#),
            record("two", r#""effects":[{"modify_hit":1}]"#),
        ];
        let defender = unit("d", 4, 3, 5);
        let weapon = Weapon::new("w", "W", WeaponKind::Melee);
        let game = GameState::new("g", PlayerId("p".into()));
        let setup = AttackSetup::default().with_config(CombatConfig::default().with_modifier_cap(1));

        let snapshot = prepare_attack(
            &UnitView::solo(&attacker),
            &UnitView::solo(&defender),
            &weapon,
            &game,
            &setup,
        )
        .unwrap();
        assert_eq!(snapshot.modifiers.hit, 1);
    }

    #[test]
    fn test_models_firing_counts_carriers() {
        let weapon = Weapon::new("slugga", "Slugga", WeaponKind::Ranged);
        let mut boyz = unit("boyz", 5, 5, 3);
        for model in boyz.models.iter_mut().take(2) {
            model.weapons.push(weapon.clone());
        }
        let defender = unit("d", 4, 3, 1);
        let game = GameState::new("g", PlayerId("p".into()));
        let ctx = CombatContext::new(
            UnitView::solo(&boyz),
            UnitView::solo(&defender),
            &weapon,
            &game,
            CombatRole::Attacker,
        );
        let snapshot = CombatSnapshot::bake(&ctx, None, Vec::new(), CombatConfig::default());
        assert_eq!(snapshot.models_firing, 2);
    }
}
