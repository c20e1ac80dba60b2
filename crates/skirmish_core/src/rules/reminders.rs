//! Reminder filtering: which abilities are live right now.
//!
//! Works on the same aggregated rule set as combat resolution but never
//! touches dice; the UI uses it to surface abilities a player may want to
//! use in the current phase.

use std::collections::BTreeSet;

use super::aggregate::get_all_unit_rules;
use super::condition::{army_states_allow, has_army_state_requirement};
use super::model::Rule;
use crate::data::{Army, Unit, UnitView};
use crate::error::Result;
use crate::game::{Phase, TurnContext};

/// Whether a rule's condition tolerates the supplied army states.
///
/// With no army-state data, any rule that mentions an army state is
/// treated as unsatisfied, including `not(army_state)`. An empty set is
/// known data: `not(army_state)` holds against it. Missing data never
/// activates an ability.
fn army_gate(rule: &Rule, army_states: Option<&BTreeSet<String>>) -> bool {
    match (&rule.when, army_states) {
        (None, _) => true,
        (Some(when), None) => !has_army_state_requirement(when),
        (Some(when), Some(states)) => army_states_allow(when, states),
    }
}

/// Rules of the viewed unit that are relevant in `phase` during `turn`.
///
/// Rules without a trigger are passive and always included. Triggered rules
/// must match the phase and turn, and must not depend on an inactive army
/// state. Passing `None` for `army_states` hides every triggered rule whose
/// condition mentions an army state; pass an empty set when the army is
/// known to have none active. The result is unique by rule id.
///
/// # Errors
///
/// Propagates aggregation errors (malformed payloads, ambiguous attachments).
pub fn get_unit_reminders(
    view: &UnitView<'_>,
    phase: Phase,
    turn: TurnContext,
    army_states: Option<&BTreeSet<String>>,
) -> Result<Vec<Rule>> {
    let rules = get_all_unit_rules(view)?;
    let mut seen = BTreeSet::new();
    let reminders: Vec<Rule> = rules
        .into_iter()
        .filter(|rule| match rule.trigger {
            None => true,
            Some(trigger) => trigger.matches(phase, turn) && army_gate(rule, army_states),
        })
        .filter(|rule| seen.insert(rule.id.clone()))
        .collect();

    tracing::trace!(
        unit = %view.unit.id,
        phase = %phase,
        turn = ?turn,
        count = reminders.len(),
        "Computed reminders"
    );
    Ok(reminders)
}

/// Whether any of `rules` can be used reactively in the opponent's `phase`.
#[must_use]
pub fn is_reactive_for(rules: &[Rule], phase: Phase, army_states: &BTreeSet<String>) -> bool {
    rules
        .iter()
        .any(|rule| rule.is_reactive_for(phase) && army_gate(rule, Some(army_states)))
}

/// Units of `army` with at least one reactive ability usable in `phase`.
///
/// # Errors
///
/// Propagates aggregation errors for any unit in the army.
pub fn get_reactive_units<'a>(army: &'a Army, phase: Phase) -> Result<Vec<&'a Unit>> {
    let states = army.state_names();
    let mut units = Vec::new();
    for unit in &army.units {
        let view = army.view(&unit.id)?;
        if is_reactive_for(&get_all_unit_rules(&view)?, phase, &states) {
            units.push(unit);
        }
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ArmyState, RuleRecord};
    use crate::game::{PhaseFilter, PlayerId, TurnFilter};
    use crate::rules::{Effect, Scope, Trigger, WhenExpr};

    fn record(rule: &Rule) -> RuleRecord {
        RuleRecord::new(rule.name.clone(), serde_json::to_string(rule).unwrap())
    }

    fn triggered(id: &str, phase: PhaseFilter, turn: TurnFilter) -> Rule {
        Rule::new(id, id, Scope::Unit)
            .with_trigger(Trigger {
                phase,
                turn,
                reactive: false,
            })
            .with_effect(Effect::ModifyHit(1))
    }

    fn unit_with(rules: &[Rule]) -> Unit {
        let mut unit = Unit::new("u", "U");
        unit.rules = rules.iter().map(record).collect();
        unit
    }

    fn ids(rules: &[Rule]) -> Vec<&str> {
        rules.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_phase_and_turn_filtering() {
        let unit = unit_with(&[
            Rule::new("passive", "passive", Scope::Unit),
            triggered("shoot-own", PhaseFilter::Shoot, TurnFilter::Own),
            triggered("shoot-both", PhaseFilter::Shoot, TurnFilter::Both),
            triggered("fight-any", PhaseFilter::Fight, TurnFilter::Both),
            triggered("any-opp", PhaseFilter::Any, TurnFilter::Opponent),
        ]);
        let view = UnitView::solo(&unit);

        let own_shoot = get_unit_reminders(&view, Phase::Shoot, TurnContext::Own, None).unwrap();
        assert_eq!(ids(&own_shoot), vec!["passive", "shoot-own", "shoot-both"]);

        let opp_shoot = get_unit_reminders(&view, Phase::Shoot, TurnContext::Opponent, None).unwrap();
        assert_eq!(ids(&opp_shoot), vec!["passive", "shoot-both", "any-opp"]);
    }

    #[test]
    fn test_army_state_gating() {
        let waaagh = triggered("waaagh", PhaseFilter::Any, TurnFilter::Both).with_when(WhenExpr::ArmyState {
            is: vec!["waaagh".into()],
        });
        let unit = unit_with(&[waaagh]);
        let view = UnitView::solo(&unit);

        assert!(get_unit_reminders(&view, Phase::Fight, TurnContext::Own, None)
            .unwrap()
            .is_empty());

        let inactive = BTreeSet::from(["other".to_string()]);
        assert!(get_unit_reminders(&view, Phase::Fight, TurnContext::Own, Some(&inactive))
            .unwrap()
            .is_empty());

        let active = BTreeSet::from(["waaagh".to_string()]);
        let live = get_unit_reminders(&view, Phase::Fight, TurnContext::Own, Some(&active)).unwrap();
        assert_eq!(ids(&live), vec!["waaagh"]);
    }

    #[test]
    fn test_missing_army_states_differ_from_none_active() {
        let calm = triggered("calm", PhaseFilter::Any, TurnFilter::Both).with_when(WhenExpr::Not(Box::new(
            WhenExpr::ArmyState {
                is: vec!["waaagh".into()],
            },
        )));
        let unit = unit_with(&[calm]);
        let view = UnitView::solo(&unit);

        assert!(get_unit_reminders(&view, Phase::Fight, TurnContext::Own, None)
            .unwrap()
            .is_empty());

        let none_active = BTreeSet::new();
        let live = get_unit_reminders(&view, Phase::Fight, TurnContext::Own, Some(&none_active)).unwrap();
        assert_eq!(ids(&live), vec!["calm"]);

        let active = BTreeSet::from(["waaagh".to_string()]);
        assert!(get_unit_reminders(&view, Phase::Fight, TurnContext::Own, Some(&active))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_non_army_leaves_do_not_hide_reminders() {
        let rule = triggered("charge-bonus", PhaseFilter::Fight, TurnFilter::Own).with_when(WhenExpr::Charged);
        let unit = unit_with(&[rule]);
        let reminders =
            get_unit_reminders(&UnitView::solo(&unit), Phase::Fight, TurnContext::Own, None).unwrap();
        assert_eq!(ids(&reminders), vec!["charge-bonus"]);
    }

    #[test]
    fn test_reactive_rule_with_negated_condition_is_surfaced() {
        let counter = Rule::new("counter", "Counter-offensive", Scope::Unit)
            .with_trigger(Trigger {
                phase: PhaseFilter::Fight,
                turn: TurnFilter::Opponent,
                reactive: true,
            })
            .with_when(WhenExpr::Not(Box::new(WhenExpr::Charged)));

        let mut army = Army::new("a", "A", PlayerId("p".into()));
        let mut veterans = Unit::new("veterans", "Veterans");
        veterans.rules = vec![record(&counter)];
        army.units = vec![veterans];

        let units = get_reactive_units(&army, Phase::Fight).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "veterans");
    }

    #[test]
    fn test_reactive_units() {
        let overwatch = Rule::new("overwatch", "Fire Overwatch", Scope::Unit).with_trigger(Trigger {
            phase: PhaseFilter::Move,
            turn: TurnFilter::Opponent,
            reactive: true,
        });
        let gated = Rule::new("gated", "Gated", Scope::Unit)
            .with_trigger(Trigger {
                phase: PhaseFilter::Charge,
                turn: TurnFilter::Opponent,
                reactive: true,
            })
            .with_when(WhenExpr::ArmyState {
                is: vec!["ambush".into()],
            });

        let mut army = Army::new("a", "A", PlayerId("p".into()));
        let mut guards = Unit::new("guards", "Guards");
        guards.rules = vec![record(&overwatch)];
        let mut scouts = Unit::new("scouts", "Scouts");
        scouts.rules = vec![record(&gated)];
        army.units = vec![guards, scouts, Unit::new("idle", "Idle")];

        let ids_of = |units: Vec<&Unit>| units.iter().map(|u| u.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids_of(get_reactive_units(&army, Phase::Move).unwrap()), vec!["guards"]);
        assert!(get_reactive_units(&army, Phase::Charge).unwrap().is_empty());

        army.activate_state(ArmyState::new("ambush"));
        assert_eq!(ids_of(get_reactive_units(&army, Phase::Charge).unwrap()), vec!["scouts"]);
    }
}
