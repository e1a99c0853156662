//! Runtime Configuration
//!
//! Hosts describe the initial runtime state as JSON and apply it with
//! [`Runtime::configure`](crate::reactive::Runtime::configure):
//!
//! ```json
//! { "mode": "disabled" }
//! ```
//!
//! Missing fields take their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};
use crate::reactive::Mode;

/// Per-thread runtime settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Reactivity mode to switch to.
    pub mode: Mode,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ReactiveError::Config(e.to_string()))
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ReactiveError::Config(e.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;

    #[test]
    fn parses_lowercase_mode_names() {
        let config = RuntimeConfig::from_json(r#"{ "mode": "lazy" }"#).unwrap();
        assert_eq!(config.mode, Mode::Lazy);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.mode, Mode::Enabled);
    }

    #[test]
    fn rejects_unknown_modes() {
        let err = RuntimeConfig::from_json(r#"{ "mode": "sometimes" }"#).unwrap_err();
        assert!(matches!(err, ReactiveError::Config(_)));
    }

    #[test]
    fn json_round_trip() {
        let config = RuntimeConfig {
            mode: Mode::Disabled,
        };
        let json = config.to_json().unwrap();
        assert_eq!(json, r#"{"mode":"disabled"}"#);
        assert_eq!(RuntimeConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn configure_applies_mode() {
        Runtime::configure(&RuntimeConfig::from_json(r#"{ "mode": "disabled" }"#).unwrap());
        assert_eq!(Runtime::mode(), Mode::Disabled);

        Runtime::configure(&RuntimeConfig::default());
        assert_eq!(Runtime::mode(), Mode::Enabled);
    }
}
