//! Scenario loading and resolution.
//!
//! A scenario pairs two armies with one declared attack. Abilities are
//! granted by rule id from the loaded rule libraries, so army files stay
//! free of serialized rule text.

use std::path::Path;

use serde::{Deserialize, Serialize};
use skirmish_core::combat::{
    prepare_attack, AttackSetup, CombatConfig, CombatOptions, CombatResult, CombatRole, CombatSession, CombatSnapshot,
};
use skirmish_core::data::{Army, Weapon, WeaponKind};
use skirmish_core::dice::SeededDice;
use skirmish_core::error::EngineError;
use skirmish_core::game::{GameState, Phase};
use skirmish_core::rules::RuleLibrary;
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A granted rule id is in none of the loaded libraries.
    #[error("Rule not found in any library: {0}")]
    UnknownRule(String),
    /// A grant names a model that is not in its unit.
    #[error("Model '{model_id}' not found in unit '{unit_id}'")]
    UnknownModel {
        /// Unit searched.
        unit_id: String,
        /// Missing model.
        model_id: String,
    },
    /// A grant without an army names a unit id both armies use.
    #[error("Unit '{0}' is in both armies; the grant must name its army")]
    AmbiguousUnit(String),
    /// The declared weapon has already been used or does not fit the phase.
    #[error("Weapon '{weapon_id}' cannot be used in the {phase} phase")]
    WeaponUnavailable {
        /// Declared weapon.
        weapon_id: String,
        /// Current phase.
        phase: Phase,
    },
    /// The engine rejected the scenario.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Grants a library rule to a unit, or to one model of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGrant {
    /// Unit receiving the rule.
    pub unit_id: String,
    /// Army holding the unit; looked up in both when absent.
    #[serde(default)]
    pub army: Option<CombatRole>,
    /// Model receiving the rule; the unit itself when absent.
    #[serde(default)]
    pub model_id: Option<String>,
    /// Library rule id.
    pub rule_id: String,
}

/// The attack a scenario resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackDeclaration {
    /// Attacking unit id (in the attacker army).
    pub unit: String,
    /// Target unit id (in the defender army).
    pub target: String,
    /// Weapon id carried by the attacking unit or its attachment.
    pub weapon: String,
    /// Situational inputs.
    #[serde(default)]
    pub options: CombatOptions,
}

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Turn and phase state.
    pub game: GameState,
    /// Attacking army.
    pub attacker: Army,
    /// Defending army.
    pub defender: Army,
    /// Abilities granted from rule libraries.
    #[serde(default)]
    pub grants: Vec<RuleGrant>,
    /// The attack to resolve.
    pub attack: AttackDeclaration,
    /// Resolution configuration.
    #[serde(default)]
    pub config: CombatConfig,
}

fn find_record(libraries: &[RuleLibrary], rule_id: &str) -> Result<skirmish_core::data::RuleRecord, ScenarioError> {
    let library = libraries
        .iter()
        .find(|lib| lib.get(rule_id).is_some())
        .ok_or_else(|| ScenarioError::UnknownRule(rule_id.to_string()))?;
    Ok(library.record_for(rule_id)?)
}

fn apply_grant(army: &mut Army, grant: &RuleGrant, libraries: &[RuleLibrary]) -> Result<bool, ScenarioError> {
    let Some(unit) = army.units.iter_mut().find(|u| u.id == grant.unit_id) else {
        return Ok(false);
    };
    let record = find_record(libraries, &grant.rule_id)?;
    match &grant.model_id {
        None => unit.rules.push(record),
        Some(model_id) => {
            let model = unit
                .models
                .iter_mut()
                .find(|m| &m.id == model_id)
                .ok_or_else(|| ScenarioError::UnknownModel {
                    unit_id: grant.unit_id.clone(),
                    model_id: model_id.clone(),
                })?;
            model.rules.push(record);
        }
    }
    Ok(true)
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Roster problems in either army.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors: Vec<String> = self
            .attacker
            .validate()
            .into_iter()
            .chain(self.defender.validate())
            .collect();
        if self.attacker.unit(&self.attack.unit).is_none() {
            errors.push(format!("Attacking unit '{}' is not in the attacker army", self.attack.unit));
        }
        if self.defender.unit(&self.attack.target).is_none() {
            errors.push(format!("Target unit '{}' is not in the defender army", self.attack.target));
        }
        for grant in &self.grants {
            if grant.army.is_none()
                && self.attacker.unit(&grant.unit_id).is_some()
                && self.defender.unit(&grant.unit_id).is_some()
            {
                errors.push(format!(
                    "Grant of '{}' names unit '{}' which is in both armies",
                    grant.rule_id, grant.unit_id
                ));
            }
        }
        if let Ok(view) = self.attacker.view(&self.attack.unit) {
            match view.units().find_map(|u| u.find_weapon(&self.attack.weapon)) {
                None => errors.push(format!(
                    "Weapon '{}' is not carried by unit '{}'",
                    self.attack.weapon, self.attack.unit
                )),
                Some(weapon) => errors.extend(self.weapon_problems(weapon)),
            }
        }
        errors
    }

    fn weapon_problems(&self, weapon: &Weapon) -> Vec<String> {
        let mut problems = Vec::new();
        if !weapon.is_available(self.game.phase) {
            problems.push(format!("Weapon '{}' cannot be used in the {} phase", weapon.id, self.game.phase));
        }
        if self.attack.options.within_half_range && weapon.kind == WeaponKind::Ranged && weapon.range.is_none() {
            problems.push(format!("Weapon '{}' is declared within half range but has no range", weapon.id));
        }
        problems
    }

    /// Both armies with every grant turned into a rule record.
    pub fn armies_with_rules(&self, libraries: &[RuleLibrary]) -> Result<(Army, Army), ScenarioError> {
        let mut attacker = self.attacker.clone();
        let mut defender = self.defender.clone();
        for grant in &self.grants {
            let granted = match grant.army {
                Some(CombatRole::Attacker) => apply_grant(&mut attacker, grant, libraries)?,
                Some(CombatRole::Defender) => apply_grant(&mut defender, grant, libraries)?,
                None => {
                    if attacker.unit(&grant.unit_id).is_some() && defender.unit(&grant.unit_id).is_some() {
                        return Err(ScenarioError::AmbiguousUnit(grant.unit_id.clone()));
                    }
                    apply_grant(&mut attacker, grant, libraries)? || apply_grant(&mut defender, grant, libraries)?
                }
            };
            if !granted {
                return Err(EngineError::UnknownUnit(grant.unit_id.clone()).into());
            }
        }
        Ok((attacker, defender))
    }

    /// Build the combat snapshot of the declared attack.
    ///
    /// The declared weapon must still be usable in the scenario's phase.
    pub fn prepare(&self, libraries: &[RuleLibrary]) -> Result<CombatSnapshot, ScenarioError> {
        let (attacker, defender) = self.armies_with_rules(libraries)?;
        let attacking = attacker.view(&self.attack.unit)?;
        let target = defender.view(&self.attack.target)?;
        let weapon = attacking
            .units()
            .find_map(|u| u.find_weapon(&self.attack.weapon))
            .ok_or_else(|| EngineError::UnknownWeapon(self.attack.weapon.clone()))?;
        if !weapon.is_available(self.game.phase) {
            return Err(ScenarioError::WeaponUnavailable {
                weapon_id: weapon.id.clone(),
                phase: self.game.phase,
            });
        }

        let setup = AttackSetup::for_armies(&attacker, &defender, &self.game)
            .with_options(self.attack.options.clone())
            .with_config(self.config);
        Ok(prepare_attack(&attacking, &target, weapon, &self.game, &setup)?)
    }

    /// Prepare and resolve the declared attack with seeded dice.
    pub fn resolve(&self, libraries: &[RuleLibrary], seed: u64) -> Result<CombatResult, ScenarioError> {
        let snapshot = self.prepare(libraries)?;
        let mut session = CombatSession::new(snapshot);
        let mut dice = SeededDice::new(seed);
        session.resolve_all(&mut dice)?;
        tracing::info!(scenario = %self.name, seed, "Resolved scenario");
        Ok(session.into_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"RuleLibrary(
        version: 1,
        name: "Test",
        rules: [
            (
                id: "aim",
                name: "Aim",
                scope: unit,
                effects: [modify_hit(1)],
            ),
        ],
    )"#;

    const SCENARIO: &str = r#"Scenario(
        name: "Duel",
        game: (game_id: "g", turn: 1, active_player: ("red"), phase: shoot),
        attacker: (
            id: "red",
            name: "Red",
            player: ("red"),
            units: [
                (
                    id: "shooters",
                    name: "Shooters",
                    models: [
                        (
                            id: "s1",
                            name: "Shooter",
                            characteristics: (movement: 6, toughness: 4, save: 3, wounds: 2, leadership: 6, objective_control: 1),
                            weapons: [(id: "gun", name: "Gun", kind: ranged, attacks: "2", skill: 3, strength: 4, ap: -1, damage: "1")],
                        ),
                    ],
                ),
            ],
        ),
        defender: (
            id: "blue",
            name: "Blue",
            player: ("blue"),
            units: [
                (
                    id: "targets",
                    name: "Targets",
                    models: [
                        (
                            id: "t1",
                            name: "Target",
                            characteristics: (movement: 6, toughness: 4, save: 4, wounds: 1, leadership: 7, objective_control: 1),
                        ),
                    ],
                ),
            ],
        ),
        grants: [(unit_id: "shooters", rule_id: "aim")],
        attack: (unit: "shooters", target: "targets", weapon: "gun"),
    )"#;

    fn library() -> RuleLibrary {
        RuleLibrary::from_ron_str(LIBRARY).unwrap()
    }

    #[test]
    fn test_scenario_parses() {
        let scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        assert_eq!(scenario.name, "Duel");
        assert!(scenario.validate().is_empty());
    }

    #[test]
    fn test_grant_reaches_snapshot() {
        let scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        let snapshot = scenario.prepare(&[library()]).unwrap();
        assert_eq!(snapshot.modifiers.hit, 1);
        assert_eq!(snapshot.models_firing, 1);
    }

    #[test]
    fn test_missing_rule_is_reported() {
        let scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        assert!(matches!(scenario.prepare(&[]), Err(ScenarioError::UnknownRule(id)) if id == "aim"));
    }

    #[test]
    fn test_missing_weapon_is_reported() {
        let mut scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        scenario.attack.weapon = "laser".into();
        assert!(matches!(
            scenario.prepare(&[library()]),
            Err(ScenarioError::Engine(EngineError::UnknownWeapon(_)))
        ));
    }

    #[test]
    fn test_used_weapon_is_rejected() {
        let mut scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        scenario.attacker.units[0].models[0].weapons[0].mark_used(Phase::Shoot);
        assert!(matches!(
            scenario.prepare(&[library()]),
            Err(ScenarioError::WeaponUnavailable { weapon_id, phase: Phase::Shoot }) if weapon_id == "gun"
        ));
        assert!(scenario.validate().iter().any(|e| e.contains("'gun' cannot be used")));
    }

    #[test]
    fn test_ranged_weapon_in_fight_phase_is_rejected() {
        let mut scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        scenario.game.phase = Phase::Fight;
        assert!(matches!(
            scenario.prepare(&[library()]),
            Err(ScenarioError::WeaponUnavailable { .. })
        ));
    }

    #[test]
    fn test_half_range_needs_a_range() {
        let mut scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        scenario.attack.options.within_half_range = true;
        assert!(scenario.validate().iter().any(|e| e.contains("no range")));

        scenario.attacker.units[0].models[0].weapons[0].range = Some(24);
        assert!(scenario.validate().is_empty());
    }

    #[test]
    fn test_shared_unit_id_needs_an_army() {
        let mut scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        scenario.defender.units[0].id = "shooters".into();
        scenario.attack.target = "shooters".into();
        assert!(scenario.validate().iter().any(|e| e.contains("in both armies")));
        assert!(matches!(
            scenario.armies_with_rules(&[library()]),
            Err(ScenarioError::AmbiguousUnit(id)) if id == "shooters"
        ));

        scenario.grants[0].army = Some(CombatRole::Defender);
        assert!(scenario.validate().is_empty());
        let (attacker, defender) = scenario.armies_with_rules(&[library()]).unwrap();
        assert!(attacker.units[0].rules.is_empty());
        assert_eq!(defender.units[0].rules.len(), 1);
    }

    #[test]
    fn test_resolve_is_seeded() {
        let scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        let a = scenario.resolve(&[library()], 11).unwrap();
        let b = scenario.resolve(&[library()], 11).unwrap();
        assert_eq!(a, b);
        assert!(a.total_damage().is_some());
    }
}
