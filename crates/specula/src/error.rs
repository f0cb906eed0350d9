//! Error types for the specula crate.

use thiserror::Error;

/// Errors that can occur when building or evaluating specifications.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    /// A path segment does not exist on the entity reached so far.
    #[error("cannot resolve '{path}' on {entity}: no field '{segment}'")]
    PathResolution {
        entity: &'static str,
        path: String,
        segment: String,
    },

    /// Operator token is not part of the DSL and no fallback was given.
    #[error("unsupported operator '{token}' in '{raw}'")]
    UnsupportedOperator { token: String, raw: String },

    /// Operator is not valid for the declared type of the field.
    #[error("operator '{op}' is not valid for {value_type} values")]
    InvalidOperatorForType {
        op: &'static str,
        value_type: &'static str,
    },

    /// A raw operand could not be converted to the field's declared type.
    #[error("cannot convert '{value}' to {target}")]
    Coercion { value: String, target: &'static str },

    /// Date or date-time operand failed calendar parsing.
    #[error("invalid date format for value: {value}")]
    InvalidDate { value: String },

    /// Operand shape does not fit the operator (e.g. `range` without two bounds).
    #[error("malformed operand for '{token}': {reason}")]
    MalformedOperand { token: &'static str, reason: String },

    /// A sub-filter or selector targets a different entity than the path reaches.
    #[error("expected entity {expected}, path reaches {actual}")]
    EntityMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Value kind does not fit the field it is written to or compared with.
    #[error("type mismatch: field expects {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The host cancelled materialization.
    #[error("query was cancelled")]
    Cancelled,

    /// Engine configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for specula operations.
pub type Result<T> = std::result::Result<T, SpecError>;
