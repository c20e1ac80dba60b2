//! Test fixtures and helpers.
//!
//! Pre-built armies, units and weapons for consistent testing.
//! The Ork roster models the Boyz + Warboss attachment used throughout
//! the integration tests.

use skirmish_core::combat::{prepare_attack, AttackSetup, CombatRole, CombatSnapshot};
use skirmish_core::data::{Army, Attachment, Model, ModelCharacteristics, RuleRecord, Unit, Weapon, WeaponKind};
use skirmish_core::game::{GameState, Phase, PlayerId};
use skirmish_core::rules::{Characteristic, Effect, Rule, Scope, WhenExpr};

/// Player id of the Ork army.
pub const ORK_PLAYER: &str = "orks";
/// Player id of the Space Marine army.
pub const MARINE_PLAYER: &str = "marines";

/// Serialize a rule into the record form carried by units and models.
///
/// # Panics
///
/// Panics if the rule cannot be serialized (never for valid rules).
#[must_use]
pub fn rule_record(rule: &Rule) -> RuleRecord {
    let definition = serde_json::to_string(rule).expect("rule serializes to JSON");
    RuleRecord::new(rule.name.clone(), definition)
}

/// Serialize several rules into one bundled record.
///
/// # Panics
///
/// Panics if the rules cannot be serialized.
#[must_use]
pub fn bundle_record(name: &str, rules: &[Rule]) -> RuleRecord {
    let definition = serde_json::to_string(rules).expect("rules serialize to JSON");
    RuleRecord::new(name, definition)
}

fn attacking() -> WhenExpr {
    WhenExpr::Role {
        is: CombatRole::Attacker,
    }
}

/// Unit-scoped "+1 to hit" carried by the Warboss.
#[must_use]
pub fn might_is_right() -> Rule {
    Rule::new("warboss-might-is-right", "Might is Right", Scope::Unit)
        .with_when(attacking())
        .with_effect(Effect::ModifyHit(1))
}

/// Model-scoped "+4 Attacks" carried by the Warboss model.
#[must_use]
pub fn da_biggest() -> Rule {
    Rule::new("warboss-da-biggest", "Da Biggest", Scope::Model)
        .with_when(attacking())
        .with_effect(Effect::ModifyCharacteristic {
            stat: Characteristic::Attacks,
            delta: 4,
        })
}

/// Army-wide "+1 Strength during a Waaagh!".
#[must_use]
pub fn waaagh_strength() -> Rule {
    Rule::new("orks-waaagh-strength", "Waaagh!", Scope::Unit)
        .with_when(WhenExpr::All(vec![
            attacking(),
            WhenExpr::ArmyState {
                is: vec!["waaagh".into()],
            },
        ]))
        .with_effect(Effect::ModifyCharacteristic {
            stat: Characteristic::Strength,
            delta: 1,
        })
}

/// Choppa: A3 WS3+ S4 AP-1 D1.
#[must_use]
pub fn choppa() -> Weapon {
    Weapon::new("choppa", "Choppa", WeaponKind::Melee).with_profile("3", 3, 4, -1, "1")
}

/// Slugga: A1 BS5+ S4 AP0 D1.
#[must_use]
pub fn slugga() -> Weapon {
    Weapon::new("slugga", "Slugga", WeaponKind::Ranged)
        .with_profile("1", 5, 4, 0, "1")
        .with_range(12)
        .with_keyword("Pistol")
}

/// Power klaw: A4 WS2+ S9 AP-2 D2.
#[must_use]
pub fn power_klaw() -> Weapon {
    Weapon::new("power-klaw", "Power klaw", WeaponKind::Melee).with_profile("4", 2, 9, -2, "2")
}

/// Bolt rifle: A2 BS3+ S4 AP-1 D1.
#[must_use]
pub fn bolt_rifle() -> Weapon {
    Weapon::new("bolt-rifle", "Bolt rifle", WeaponKind::Ranged)
        .with_profile("2", 3, 4, -1, "1")
        .with_range(24)
        .with_keyword("Assault")
        .with_keyword("Heavy")
}

/// Meltagun: A1 BS3+ S9 AP-4 DD6, Melta 2.
#[must_use]
pub fn meltagun() -> Weapon {
    Weapon::new("meltagun", "Meltagun", WeaponKind::Ranged)
        .with_profile("1", 3, 9, -4, "D6")
        .with_range(12)
        .with_keyword("Melta 2")
}

/// A model with the given toughness and save.
#[must_use]
pub fn model(id: &str, name: &str, toughness: i32, save: u8, wounds: u32) -> Model {
    Model::new(
        id,
        name,
        ModelCharacteristics {
            toughness,
            save,
            wounds,
            ..ModelCharacteristics::default()
        },
    )
}

/// Ten Boyz (T5 Sv5+) with choppas and sluggas, carrying the Waaagh! rule.
#[must_use]
pub fn ork_boyz() -> Unit {
    let mut boyz = Unit::new("boyz", "Boyz");
    boyz.categories = vec!["Infantry".into(), "Orks".into(), "Mob".into()];
    boyz.rules = vec![rule_record(&waaagh_strength())];
    boyz.models = (0..10)
        .map(|i| {
            let mut boy = model(&format!("boy-{i}"), "Boy", 5, 5, 1);
            boy.weapons = vec![choppa(), slugga()];
            boy
        })
        .collect();
    boyz
}

/// Warboss (T6 Sv4+ W6, 5++) with Might is Right (unit) and Da Biggest (model).
#[must_use]
pub fn warboss() -> Unit {
    let mut boss = Unit::new("warboss", "Warboss");
    boss.is_leader = true;
    boss.categories = vec!["Infantry".into(), "Character".into(), "Orks".into()];
    boss.rules = vec![rule_record(&might_is_right())];
    let mut model = model("warboss-model", "Warboss", 6, 4, 6);
    model.characteristics.invulnerable_save = Some(5);
    model.rules = vec![rule_record(&da_biggest())];
    model.weapons = vec![power_klaw()];
    boss.models = vec![model];
    boss
}

/// Ork army: Warboss leading the Boyz.
#[must_use]
pub fn ork_army() -> Army {
    let mut army = Army::new("ork-army", "Orks", PlayerId(ORK_PLAYER.into()));
    army.units = vec![warboss(), ork_boyz()];
    army.attachments = vec![Attachment {
        leader_id: "warboss".into(),
        bodyguard_id: "boyz".into(),
    }];
    army
}

/// Five Intercessors (T4 Sv3+ W2) with bolt rifles.
#[must_use]
pub fn intercessors() -> Unit {
    let mut unit = Unit::new("intercessors", "Intercessor Squad");
    unit.categories = vec!["Infantry".into(), "Imperium".into(), "Adeptus Astartes".into()];
    unit.models = (0..5)
        .map(|i| {
            let mut marine = model(&format!("intercessor-{i}"), "Intercessor", 4, 3, 2);
            marine.weapons = vec![bolt_rifle()];
            marine
        })
        .collect();
    unit
}

/// Space Marine army with a single Intercessor squad.
#[must_use]
pub fn marine_army() -> Army {
    let mut army = Army::new("marine-army", "Space Marines", PlayerId(MARINE_PLAYER.into()));
    army.units = vec![intercessors()];
    army
}

/// Game state in `phase` with `active` as the active player.
#[must_use]
pub fn game_state(phase: Phase, active: &str) -> GameState {
    let mut game = GameState::new("test-game", PlayerId(active.into()));
    game.phase = phase;
    game
}

/// Snapshot of a solo attacker shooting or fighting a solo defender.
///
/// # Panics
///
/// Panics if either unit's rules fail to aggregate.
#[must_use]
pub fn solo_snapshot(attacker: &Unit, defender: &Unit, weapon: &Weapon, setup: &AttackSetup) -> CombatSnapshot {
    use skirmish_core::data::UnitView;
    let phase = match weapon.kind {
        WeaponKind::Ranged => Phase::Shoot,
        WeaponKind::Melee => Phase::Fight,
    };
    let game = game_state(phase, "attacker");
    prepare_attack(
        &UnitView::solo(attacker),
        &UnitView::solo(defender),
        weapon,
        &game,
        setup,
    )
    .expect("fixture rules aggregate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ork_army_is_valid() {
        let army = ork_army();
        assert!(army.validate().is_empty());
        assert_eq!(army.attached_leaders_of("boyz").len(), 1);
    }

    #[test]
    fn test_rule_records_decode() {
        let boss = warboss();
        let rules = skirmish_core::rules::decode_rule_record(&boss.rules[0]).unwrap();
        assert_eq!(rules, vec![might_is_right()]);
    }
}
