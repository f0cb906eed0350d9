//! Engine configuration.
//!
//! [`EngineConfig`] controls how operand strings are split and coerced. All
//! fields have defaults, so a partial JSON document is enough:
//!
//! ```
//! use specula::{CoercionPolicy, EngineConfig};
//!
//! let config = EngineConfig::from_json(r#"{ "coercion_policy": "strict" }"#).unwrap();
//! assert_eq!(config.coercion_policy, CoercionPolicy::Strict);
//! assert_eq!(config.list_separator, ',');
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecError};

/// What the update builder does when a value cannot be coerced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    /// Keep the raw value and log a warning.
    #[default]
    Degrade,
    /// Fail the whole update.
    Strict,
}

/// Settings shared by the condition parser and the update builder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Separator between list items and range bounds (default: `,`).
    pub list_separator: char,
    /// Update coercion failure handling.
    pub coercion_policy: CoercionPolicy,
    /// Extra `chrono` format strings tried before the built-in ones.
    pub date_formats: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            list_separator: ',',
            coercion_policy: CoercionPolicy::Degrade,
            date_formats: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Loads a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SpecError::Config(e.to_string()))
    }
}
