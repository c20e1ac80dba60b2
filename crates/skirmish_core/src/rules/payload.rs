//! Decoding of serialized rule payloads and rule libraries.
//!
//! Abilities carry their rule definition as opaque JSON text that decodes
//! to either one rule object or an array of rule objects. Decoding always
//! validates, so the aggregator only ever sees well-formed rules.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::model::Rule;
use crate::data::RuleRecord;
use crate::error::{EngineError, Result};

/// Rule library format version.
pub const RULE_LIBRARY_VERSION: u32 = 1;

/// One rule or a bundle of rules under a single named ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RulePayload {
    /// A single rule object.
    One(Rule),
    /// An array of rule objects.
    Many(Vec<Rule>),
}

impl RulePayload {
    /// Flatten into a list of rules.
    #[must_use]
    pub fn into_rules(self) -> Vec<Rule> {
        match self {
            RulePayload::One(rule) => vec![rule],
            RulePayload::Many(rules) => rules,
        }
    }
}

/// Decode and validate a serialized rule payload.
///
/// # Errors
///
/// Returns [`EngineError::RulePayload`] if the text is not a rule or rule
/// array, and [`EngineError::InvalidRule`] if a decoded rule fails validation.
pub fn decode_rule_payload(source_name: &str, text: &str) -> Result<Vec<Rule>> {
    let payload: RulePayload =
        serde_json::from_str(text).map_err(|e| EngineError::RulePayload {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
    let rules = payload.into_rules();
    if rules.is_empty() {
        return Err(EngineError::RulePayload {
            source_name: source_name.to_string(),
            message: "payload contains no rules".to_string(),
        });
    }
    for rule in &rules {
        rule.validate()?;
    }
    Ok(rules)
}

/// Decode the rule definition carried by an ability record.
pub fn decode_rule_record(record: &RuleRecord) -> Result<Vec<Rule>> {
    decode_rule_payload(&record.name, &record.definition)
}

/// A versioned collection of rule definitions (the rule source).
///
/// # Example RON
///
/// ```ron
/// RuleLibrary(
///     version: 1,
///     name: "Orks",
///     rules: [
///         (
///             id: "waaagh-strength",
///             name: "Waaagh!",
///             scope: unit,
///             when: Some(army_state(is: ["waaagh"])),
///             effects: [modify_characteristic(stat: strength, delta: 1)],
///         ),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleLibrary {
    /// Format version.
    pub version: u32,
    /// Library name (faction, detachment, core rules...).
    pub name: String,
    /// Rule definitions.
    pub rules: Vec<Rule>,
}

impl RuleLibrary {
    /// Parse a RON rule library and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse, has the wrong
    /// version, or any rule fails validation.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let library: Self = ron::from_str(text).map_err(|e| EngineError::RulePayload {
            source_name: "rule library".to_string(),
            message: e.to_string(),
        })?;
        library.validate()?;
        Ok(library)
    }

    /// Validate version, rule schema and id uniqueness.
    pub fn validate(&self) -> Result<()> {
        if self.version != RULE_LIBRARY_VERSION {
            return Err(EngineError::UnsupportedVersion {
                expected: RULE_LIBRARY_VERSION,
                found: self.version,
            });
        }
        let mut seen = BTreeSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(EngineError::invalid_rule(&rule.id, "duplicate rule id in library"));
            }
        }
        Ok(())
    }

    /// Find a rule by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Serialize a rule as the JSON text carried by an ability record.
    pub fn record_for(&self, id: &str) -> Result<RuleRecord> {
        let rule = self
            .get(id)
            .ok_or_else(|| EngineError::invalid_rule(id, "not in library"))?;
        let definition = serde_json::to_string(rule).map_err(|e| EngineError::RulePayload {
            source_name: rule.name.clone(),
            message: e.to_string(),
        })?;
        Ok(RuleRecord::new(rule.name.clone(), definition))
    }
}
