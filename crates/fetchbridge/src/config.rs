//! Bridge configuration.
//!
//! Parsed from a flat TOML document, e.g.
//!
//! ```toml
//! entry_point = "fetchbridge_dispatch"
//! registration_policy = "reject"
//! handler_faults = "isolate"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Default global name of the dispatch entry point.
pub const DEFAULT_ENTRY_POINT: &str = "fetchbridge_dispatch";

/// What a second registration attempt does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationPolicy {
    /// Return [`BridgeError::AlreadyRegistered`].
    #[default]
    Reject,
    /// Log and leave the existing registration in place.
    Ignore,
}

/// What a panicking handler does to its event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerFaultPolicy {
    /// Settle the event through "fail" with the panic message.
    #[default]
    Isolate,
    /// Treat the panic as fatal: the event is left unsettled and the process
    /// aborts.
    Propagate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub entry_point: String,
    pub registration_policy: RegistrationPolicy,
    pub handler_faults: HandlerFaultPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            registration_policy: RegistrationPolicy::default(),
            handler_faults: HandlerFaultPolicy::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> BridgeResult<Self> {
        let config: BridgeConfig =
            toml::from_str(content).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> BridgeResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// The entry point is spliced into the listener script, so it must be a
    /// plain identifier.
    pub fn validate(&self) -> BridgeResult<()> {
        let mut chars = self.entry_point.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if !valid {
            return Err(BridgeError::Config(format!(
                "entry_point {:?} is not an identifier",
                self.entry_point
            )));
        }
        Ok(())
    }

    pub fn with_entry_point(self, entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            ..self
        }
    }

    pub fn with_registration_policy(self, registration_policy: RegistrationPolicy) -> Self {
        Self {
            registration_policy,
            ..self
        }
    }

    pub fn with_handler_faults(self, handler_faults: HandlerFaultPolicy) -> Self {
        Self {
            handler_faults,
            ..self
        }
    }
}
