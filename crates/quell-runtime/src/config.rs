#![forbid(unsafe_code)]

//! Delay policy for [`DelayedSignal`](crate::delayed::DelayedSignal).
//!
//! With the `policy-config` feature the policy can be loaded from TOML or
//! JSON, so applications can tune the flicker threshold without a rebuild:
//!
//! ```toml
//! delay_ms = 250
//! ```

use web_time::Duration;

/// Default delay in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 300;

/// How long a source must stay `true` before the delayed value follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(serde::Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default, deny_unknown_fields))]
pub struct DelayConfig {
    pub delay_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl DelayConfig {
    #[must_use]
    pub const fn new(delay_ms: u64) -> Self {
        Self { delay_ms }
    }

    /// The delay as a `Duration`.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[cfg(feature = "policy-config")]
pub use loading::{ConfigError, Result};

#[cfg(feature = "policy-config")]
mod loading {
    use thiserror::Error;

    use super::DelayConfig;

    pub type Result<T> = std::result::Result<T, ConfigError>;

    /// Failure to parse a [`DelayConfig`].
    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("invalid TOML delay policy: {0}")]
        Toml(#[from] toml::de::Error),

        #[error("invalid JSON delay policy: {0}")]
        Json(#[from] serde_json::Error),
    }

    impl DelayConfig {
        /// Parse a policy from TOML. Missing fields take their defaults.
        pub fn from_toml_str(input: &str) -> Result<Self> {
            Ok(toml::from_str(input)?)
        }

        /// Parse a policy from JSON. Missing fields take their defaults.
        pub fn from_json_str(input: &str) -> Result<Self> {
            Ok(serde_json::from_str(input)?)
        }
    }
}
