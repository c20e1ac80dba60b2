//! Rule aggregation across leader/bodyguard attachments.
//!
//! A unit always keeps every rule of its own and of its own models. Across
//! an attachment, in either direction, only `unit`-scoped rules transfer;
//! `model`-scoped rules stay with the unit whose model bears them.

use std::collections::BTreeSet;

use super::model::{Rule, Scope};
use super::payload::decode_rule_record;
use crate::data::{RuleRecord, Unit, UnitView};
use crate::error::{EngineError, Result};

/// Which decoded rules a source contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    /// The evaluated unit itself: every rule.
    Own,
    /// A unit across the attachment boundary: `unit` scope only.
    Attached,
}

impl Reach {
    const fn admits(self, scope: Scope) -> bool {
        match self {
            Reach::Own => true,
            Reach::Attached => matches!(scope, Scope::Unit),
        }
    }
}

/// Ordered, id-deduplicated rule list. First occurrence wins.
#[derive(Debug, Default)]
struct RuleCollector {
    seen: BTreeSet<String>,
    rules: Vec<Rule>,
}

impl RuleCollector {
    fn push(&mut self, rule: Rule) {
        if self.seen.insert(rule.id.clone()) {
            self.rules.push(rule);
        }
    }

    fn collect_records(&mut self, records: &[RuleRecord], reach: Reach) -> Result<()> {
        for record in records {
            // Filter per decoded rule: a bundle may mix scopes.
            for rule in decode_rule_record(record)? {
                if reach.admits(rule.scope) {
                    self.push(rule);
                }
            }
        }
        Ok(())
    }

    fn collect_unit(&mut self, unit: &Unit, reach: Reach) -> Result<()> {
        self.collect_records(&unit.rules, reach)?;
        for model in &unit.models {
            self.collect_records(&model.rules, reach)?;
        }
        Ok(())
    }
}

/// Every rule that applies to the viewed unit, unique by id.
///
/// Order: the unit's own rules, its models' rules, then rules transferred
/// from attached leaders or bodyguards.
///
/// # Errors
///
/// Returns [`EngineError::AmbiguousAttachment`] if the view has both leaders
/// and bodyguards, and a payload error if any rule record fails to decode.
pub fn get_all_unit_rules(view: &UnitView<'_>) -> Result<Vec<Rule>> {
    if !view.leaders.is_empty() && !view.bodyguards.is_empty() {
        return Err(EngineError::AmbiguousAttachment {
            unit_id: view.unit.id.clone(),
        });
    }

    let mut collector = RuleCollector::default();
    collector.collect_unit(view.unit, Reach::Own)?;
    for leader in &view.leaders {
        collector.collect_unit(leader, Reach::Attached)?;
    }
    for bodyguard in &view.bodyguards {
        collector.collect_unit(bodyguard, Reach::Attached)?;
    }

    tracing::debug!(
        unit = %view.unit.id,
        leaders = view.leaders.len(),
        bodyguards = view.bodyguards.len(),
        rules = collector.rules.len(),
        "Aggregated unit rules"
    );

    Ok(collector.rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Model, ModelCharacteristics};

    fn rule_json(id: &str, scope: &str) -> String {
        format!(r#"{{"id":"{id}","name":"{id}","scope":"{scope}","effects":[{{"modify_hit":1}}]}}"#)
    }

    fn unit_with(id: &str, unit_rules: &[(&str, &str)], model_rules: &[(&str, &str)]) -> Unit {
        let mut unit = Unit::new(id, id);
        unit.rules = unit_rules
            .iter()
            .map(|(rid, scope)| RuleRecord::new(*rid, rule_json(rid, scope)))
            .collect();
        let mut model = Model::new(format!("{id}-m"), id, ModelCharacteristics::default());
        model.rules = model_rules
            .iter()
            .map(|(rid, scope)| RuleRecord::new(*rid, rule_json(rid, scope)))
            .collect();
        unit.models.push(model);
        unit
    }

    fn ids(rules: &[Rule]) -> Vec<&str> {
        rules.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_solo_unit_keeps_both_scopes() {
        let unit = unit_with("u", &[("u-unit", "unit"), ("u-model", "model")], &[("m-model", "model")]);
        let rules = get_all_unit_rules(&UnitView::solo(&unit)).unwrap();
        assert_eq!(ids(&rules), vec!["u-unit", "u-model", "m-model"]);
    }

    #[test]
    fn test_leader_transfers_unit_scope_only() {
        let boyz = unit_with("boyz", &[], &[]);
        let boss = unit_with("boss", &[("boss-unit", "unit"), ("boss-model", "model")], &[
            ("boss-m-unit", "unit"),
            ("boss-m-model", "model"),
        ]);
        let view = UnitView::solo(&boyz).with_leaders(vec![&boss]);
        let rules = get_all_unit_rules(&view).unwrap();
        assert_eq!(ids(&rules), vec!["boss-unit", "boss-m-unit"]);
    }

    #[test]
    fn test_bodyguard_transfers_unit_scope_only() {
        let boyz = unit_with("boyz", &[("mob", "unit"), ("boyz-model", "model")], &[]);
        let boss = unit_with("boss", &[("boss-model", "model")], &[]);
        let view = UnitView::solo(&boss).with_bodyguards(vec![&boyz]);
        let rules = get_all_unit_rules(&view).unwrap();
        assert_eq!(ids(&rules), vec!["boss-model", "mob"]);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let boyz = unit_with("boyz", &[("shared", "unit")], &[("shared", "unit")]);
        let boss = unit_with("boss", &[("shared", "unit")], &[]);
        let view = UnitView::solo(&boyz).with_leaders(vec![&boss]);
        let rules = get_all_unit_rules(&view).unwrap();
        assert_eq!(ids(&rules), vec!["shared"]);
    }

    #[test]
    fn test_mixed_bundle_filtered_per_rule() {
        let boyz = unit_with("boyz", &[], &[]);
        let mut boss = Unit::new("boss", "Boss");
        boss.rules.push(RuleRecord::new(
            "Bundle",
            format!("[{},{}]", rule_json("b-unit", "unit"), rule_json("b-model", "model")),
        ));
        let view = UnitView::solo(&boyz).with_leaders(vec![&boss]);
        assert_eq!(ids(&get_all_unit_rules(&view).unwrap()), vec!["b-unit"]);
    }

    #[test]
    fn test_ambiguous_attachment_rejected() {
        let a = unit_with("a", &[], &[]);
        let b = unit_with("b", &[], &[]);
        let c = unit_with("c", &[], &[]);
        let view = UnitView::solo(&a).with_leaders(vec![&b]).with_bodyguards(vec![&c]);
        assert_eq!(
            get_all_unit_rules(&view),
            Err(EngineError::AmbiguousAttachment { unit_id: "a".into() })
        );
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let mut unit = Unit::new("u", "U");
        unit.rules.push(RuleRecord::new("Broken", "not json"));
        assert!(matches!(
            get_all_unit_rules(&UnitView::solo(&unit)),
            Err(EngineError::RulePayload { .. })
        ));
    }
}
