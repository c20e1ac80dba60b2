//! Applies satisfied rules to a combat context's modifier accumulator.

use serde::{Deserialize, Serialize};

use super::condition::evaluate_optional;
use super::model::{Effect, Rule};
use crate::combat::{CombatContext, CombatRole, Modifiers};

/// A rule whose condition held and whose effects were applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveRule {
    /// Rule identifier.
    pub id: String,
    /// Rule display name.
    pub name: String,
    /// Side whose context the rule fired in.
    pub side: CombatRole,
}

/// Evaluate `rule` against `ctx` and, if satisfied, apply its effects.
///
/// Returns true iff the condition held. The rule itself is never mutated.
pub fn apply_rule(rule: &Rule, ctx: &mut CombatContext<'_>) -> bool {
    if !evaluate_optional(rule.when.as_ref(), ctx) {
        return false;
    }
    for effect in &rule.effects {
        apply_effect(&rule.id, effect, &mut ctx.modifiers);
    }
    tracing::debug!(rule = %rule.id, role = ?ctx.role, "Rule applied");
    true
}

/// Apply every rule in the context's rule set, in rule order.
///
/// Rule order matters only for threshold overrides, where the last
/// satisfied rule wins.
pub fn apply_rules(ctx: &mut CombatContext<'_>) -> Vec<ActiveRule> {
    let rules = std::mem::take(&mut ctx.rules);
    let mut fired = Vec::new();
    for rule in &rules {
        if apply_rule(rule, ctx) {
            fired.push(ActiveRule {
                id: rule.id.clone(),
                name: rule.name.clone(),
                side: ctx.role,
            });
        }
    }
    ctx.rules = rules;
    fired
}

fn apply_effect(rule_id: &str, effect: &Effect, mods: &mut Modifiers) {
    match effect {
        Effect::ModifyHit(delta) => mods.hit += delta,
        Effect::ModifyWound(delta) => mods.wound += delta,
        Effect::ModifySave(delta) => mods.save += delta,
        Effect::ModifyCharacteristic { stat, delta } => {
            if stat.affects_combat() {
                mods.add_characteristic(*stat, *delta);
            } else {
                let note = format!("{rule_id}: {stat:?} has no effect on combat resolution");
                tracing::warn!(rule = rule_id, stat = ?stat, "Effect ignored in combat");
                mods.diagnostics.push(note);
            }
        }
        Effect::AddKeyword(keyword) => {
            mods.keywords.insert(keyword.clone());
        }
        Effect::GrantReroll { roll, kind } => mods.grant_reroll(*roll, *kind),
        Effect::OverrideThreshold { threshold, value } => {
            mods.overrides.insert(*threshold, *value);
        }
        Effect::CriticalOn { roll, value } => mods.lower_critical(*roll, *value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Unit, UnitView, Weapon, WeaponKind};
    use crate::game::{GameState, PlayerId};
    use crate::rules::{Characteristic, RerollKind, RollKind, Scope, Threshold, WhenExpr};

    struct Fixture {
        attacker: Unit,
        defender: Unit,
        weapon: Weapon,
        game: GameState,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                attacker: Unit::new("a", "A"),
                defender: Unit::new("d", "D"),
                weapon: Weapon::new("w", "W", WeaponKind::Ranged),
                game: GameState::new("g", PlayerId("p".into())),
            }
        }

        fn ctx(&self) -> CombatContext<'_> {
            CombatContext::new(
                UnitView::solo(&self.attacker),
                UnitView::solo(&self.defender),
                &self.weapon,
                &self.game,
                CombatRole::Attacker,
            )
        }
    }

    fn rule(id: &str, effects: Vec<Effect>) -> Rule {
        let mut rule = Rule::new(id, id, Scope::Unit);
        rule.effects = effects;
        rule
    }

    #[test]
    fn test_unsatisfied_rule_not_applied() {
        let f = Fixture::new();
        let mut ctx = f.ctx();
        let r = rule("r", vec![Effect::ModifyHit(1)]).with_when(WhenExpr::ArmyState {
            is: vec!["waaagh".into()],
        });
        assert!(!apply_rule(&r, &mut ctx));
        assert!(ctx.modifiers.is_empty());
    }

    #[test]
    fn test_numeric_effects_stack() {
        let f = Fixture::new();
        let mut ctx = f.ctx();
        assert!(apply_rule(&rule("a", vec![Effect::ModifyHit(1), Effect::ModifyWound(1)]), &mut ctx));
        assert!(apply_rule(&rule("b", vec![Effect::ModifyHit(1), Effect::ModifySave(-1)]), &mut ctx));
        assert!(apply_rule(
            &rule(
                "c",
                vec![Effect::ModifyCharacteristic {
                    stat: Characteristic::Strength,
                    delta: 2
                }]
            ),
            &mut ctx
        ));
        assert_eq!(ctx.modifiers.hit, 2);
        assert_eq!(ctx.modifiers.wound, 1);
        assert_eq!(ctx.modifiers.save, -1);
        assert_eq!(ctx.modifiers.characteristic(Characteristic::Strength), 2);
    }

    #[test]
    fn test_side_channels() {
        let f = Fixture::new();
        let mut ctx = f.ctx();
        apply_rule(
            &rule(
                "r",
                vec![
                    Effect::AddKeyword("Lethal Hits".into()),
                    Effect::GrantReroll {
                        roll: RollKind::Hit,
                        kind: RerollKind::Ones,
                    },
                    Effect::CriticalOn {
                        roll: RollKind::Hit,
                        value: 5,
                    },
                ],
            ),
            &mut ctx,
        );
        assert!(ctx.modifiers.keywords.contains("Lethal Hits"));
        assert_eq!(ctx.modifiers.reroll_for(RollKind::Hit), Some(RerollKind::Ones));
        assert_eq!(ctx.modifiers.critical.get(&RollKind::Hit), Some(&5));
    }

    #[test]
    fn test_override_last_wins() {
        let f = Fixture::new();
        let mut ctx = f.ctx();
        ctx.rules = vec![
            rule(
                "first",
                vec![Effect::OverrideThreshold {
                    threshold: Threshold::Hit,
                    value: 2,
                }],
            ),
            rule(
                "second",
                vec![Effect::OverrideThreshold {
                    threshold: Threshold::Hit,
                    value: 4,
                }],
            ),
        ];
        let fired = apply_rules(&mut ctx);
        assert_eq!(fired.len(), 2);
        assert_eq!(ctx.modifiers.overrides.get(&Threshold::Hit), Some(&4));
        assert_eq!(ctx.rules.len(), 2);
    }

    #[test]
    fn test_non_combat_characteristic_is_diagnosed() {
        let f = Fixture::new();
        let mut ctx = f.ctx();
        assert!(apply_rule(
            &rule(
                "ld",
                vec![
                    Effect::ModifyCharacteristic {
                        stat: Characteristic::Leadership,
                        delta: 1
                    },
                    Effect::ModifyHit(1)
                ]
            ),
            &mut ctx
        ));
        assert_eq!(ctx.modifiers.hit, 1);
        assert_eq!(ctx.modifiers.characteristic(Characteristic::Leadership), 0);
        assert_eq!(ctx.modifiers.diagnostics.len(), 1);
    }

    #[test]
    fn test_apply_rules_reports_fired() {
        let f = Fixture::new();
        let mut ctx = f.ctx();
        ctx.rules = vec![
            rule("always", vec![Effect::ModifyHit(1)]),
            rule("never", vec![Effect::ModifyHit(1)]).with_when(WhenExpr::Any(vec![])),
        ];
        let fired = apply_rules(&mut ctx);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, "always");
        assert_eq!(fired[0].side, CombatRole::Attacker);
    }
}
