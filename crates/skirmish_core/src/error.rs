//! Error types for the rules engine and combat resolution.

use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for all rules engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A rule definition failed schema validation.
    #[error("Invalid rule '{rule_id}': {message}")]
    InvalidRule {
        /// Identifier of the offending rule (may be empty if the id itself is missing).
        rule_id: String,
        /// What was wrong with it.
        message: String,
    },

    /// A serialized rule payload could not be decoded.
    #[error("Failed to decode rule payload '{source_name}': {message}")]
    RulePayload {
        /// Name of the ability record carrying the payload.
        source_name: String,
        /// Decoder error message.
        message: String,
    },

    /// A unit reports both attached leaders and bodyguard units.
    #[error("Unit '{unit_id}' is both led and leading; attachment data is inconsistent")]
    AmbiguousAttachment {
        /// The unit with both relations populated.
        unit_id: String,
    },

    /// A unit id was not found in the army roster.
    #[error("Unit not found: {0}")]
    UnknownUnit(String),

    /// A weapon id was not found on the attacking unit.
    #[error("Weapon not found: {0}")]
    UnknownWeapon(String),

    /// A dice expression (attacks or damage characteristic) could not be parsed.
    #[error("Invalid dice expression '{expression}': {message}")]
    DiceExpression {
        /// The raw expression text.
        expression: String,
        /// Parser error message.
        message: String,
    },

    /// The dice source could not produce a roll (e.g. a scripted sequence ran out).
    #[error("Dice source failed: {0}")]
    DiceSource(String),

    /// A resolution step was invoked before the step it depends on.
    #[error("Cannot run {step} while combat is at stage {stage}")]
    StepOutOfOrder {
        /// Step that was requested.
        step: String,
        /// Stage the combat result was at.
        stage: String,
    },

    /// Encoding or decoding a combat snapshot failed.
    #[error("Combat snapshot error: {0}")]
    Snapshot(String),

    /// A versioned document had an unexpected version.
    #[error("Unsupported format version: expected {expected}, got {found}")]
    UnsupportedVersion {
        /// Version this build understands.
        expected: u32,
        /// Version found in the document.
        found: u32,
    },
}

impl EngineError {
    /// Shorthand for an [`EngineError::InvalidRule`].
    pub fn invalid_rule(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an [`EngineError::DiceExpression`].
    pub fn dice(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DiceExpression {
            expression: expression.into(),
            message: message.into(),
        }
    }
}
