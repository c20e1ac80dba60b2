//! Condition tree evaluation.
//!
//! Three queries share one walk over [`WhenExpr`] so they cannot drift
//! apart:
//! - [`evaluate`] answers "does this rule apply now" against a combat context,
//! - [`army_states_allow`] answers "could this rule apply given these army
//!   states", treating every non-army leaf as satisfiable,
//! - [`has_army_state_requirement`] answers "does this tree mention army
//!   states at all".

use std::collections::BTreeSet;

use super::model::WhenExpr;
use crate::combat::CombatContext;

/// Fold a condition tree, delegating leaves to `leaf`.
///
/// `leaf` also receives whether the leaf sits under an odd number of `Not`s.
/// `All` of nothing is true, `Any` of nothing is false.
fn walk<F>(when: &WhenExpr, negated: bool, leaf: &F) -> bool
where
    F: Fn(&WhenExpr, bool) -> bool,
{
    match when {
        WhenExpr::All(children) => children.iter().all(|c| walk(c, negated, leaf)),
        WhenExpr::Any(children) => children.iter().any(|c| walk(c, negated, leaf)),
        WhenExpr::Not(child) => !walk(child, !negated, leaf),
        _ => leaf(when, negated),
    }
}

/// Visit every leaf, returning true if `pred` holds for any of them.
fn any_leaf<F>(when: &WhenExpr, pred: &F) -> bool
where
    F: Fn(&WhenExpr) -> bool,
{
    match when {
        WhenExpr::All(children) | WhenExpr::Any(children) => {
            children.iter().any(|c| any_leaf(c, pred))
        }
        WhenExpr::Not(child) => any_leaf(child, pred),
        _ => pred(when),
    }
}

/// Evaluate a condition tree against a combat context.
#[must_use]
pub fn evaluate(when: &WhenExpr, ctx: &CombatContext<'_>) -> bool {
    walk(when, false, &|leaf, _| leaf_holds(leaf, ctx))
}

/// Evaluate an optional condition; absence means "always true".
#[must_use]
pub fn evaluate_optional(when: Option<&WhenExpr>, ctx: &CombatContext<'_>) -> bool {
    when.map_or(true, |w| evaluate(w, ctx))
}

/// Whether the tree contains an army-state leaf anywhere.
#[must_use]
pub fn has_army_state_requirement(when: &WhenExpr) -> bool {
    any_leaf(when, &|leaf| matches!(leaf, WhenExpr::ArmyState { .. }))
}

/// Evaluate only the army-state leaves against `states`; every other leaf
/// is assumed satisfiable, so it counts as false under a `Not`.
#[must_use]
pub fn army_states_allow(when: &WhenExpr, states: &BTreeSet<String>) -> bool {
    walk(when, false, &|leaf, negated| match leaf {
        WhenExpr::ArmyState { is } => any_state_active(is, states),
        _ => !negated,
    })
}

fn any_state_active(names: &[String], states: &BTreeSet<String>) -> bool {
    names.iter().any(|name| states.contains(name))
}

fn leaf_holds(leaf: &WhenExpr, ctx: &CombatContext<'_>) -> bool {
    match leaf {
        WhenExpr::ArmyState { is } => any_state_active(is, &ctx.army_states),
        WhenExpr::Phase { is } => is.contains(&ctx.game.phase),
        WhenExpr::Turn { is } => ctx.turn == *is,
        WhenExpr::Role { is } => ctx.role == *is,
        WhenExpr::WeaponKind { is } => ctx.weapon.kind == *is,
        WhenExpr::WeaponKeyword { any } => any.iter().any(|k| ctx.weapon.has_keyword(k)),
        WhenExpr::UnitKeyword { any } => any.iter().any(|k| ctx.own_side().has_keyword(k)),
        WhenExpr::EnemyKeyword { any } => any.iter().any(|k| ctx.enemy_side().has_keyword(k)),
        WhenExpr::WithinHalfRange => ctx.options.within_half_range,
        WhenExpr::Charged => ctx.options.charged,
        WhenExpr::RemainedStationary => ctx.options.remained_stationary,
        WhenExpr::TargetVisible => ctx.options.target_visible,
        WhenExpr::Flag { name } => ctx.options.flags.contains(name),
        WhenExpr::LeaderAttached => ctx.own_side().is_attached(),
        WhenExpr::All(_) | WhenExpr::Any(_) | WhenExpr::Not(_) => walk(leaf, false, &|l, _| leaf_holds(l, ctx)),
    }
}
