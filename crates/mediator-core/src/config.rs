//! # Dispatcher Configuration
//!
//! Defaults suit most callers; overrides come from the environment or from
//! JSON.
//!
//! | Field | Default | Environment |
//! |-------|---------|-------------|
//! | `publish_strategy` | `stop_on_first_error` | `MEDIATOR_PUBLISH_STRATEGY` |
//! | `log_dispatch` | `true` | `MEDIATOR_LOG_DISPATCH` |

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable selecting the [`PublishStrategy`].
pub const ENV_PUBLISH_STRATEGY: &str = "MEDIATOR_PUBLISH_STRATEGY";

/// Environment variable toggling per-dispatch debug logging.
pub const ENV_LOG_DISPATCH: &str = "MEDIATOR_LOG_DISPATCH";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown publish strategy: {0}")]
    UnknownPublishStrategy(String),

    #[error("Invalid dispatcher config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a notification fan-out reacts to a failing handler.
///
/// Handlers always run one at a time, in registration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStrategy {
    /// Return the first error; later handlers do not run.
    #[default]
    StopOnFirstError,
    /// Run every handler and report all failures together.
    ContinueOnError,
}

impl PublishStrategy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopOnFirstError => "stop_on_first_error",
            Self::ContinueOnError => "continue_on_error",
        }
    }
}

impl fmt::Display for PublishStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "stop_on_first_error" | "stop" => Ok(Self::StopOnFirstError),
            "continue_on_error" | "continue" => Ok(Self::ContinueOnError),
            _ => Err(ConfigError::UnknownPublishStrategy(value.to_string())),
        }
    }
}

/// Dispatcher settings fixed at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Notification failure policy.
    pub publish_strategy: PublishStrategy,

    /// Emit a `debug!` line per send, publish and stream.
    pub log_dispatch: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            publish_strategy: PublishStrategy::default(),
            log_dispatch: true,
        }
    }
}

impl DispatcherConfig {
    /// Read overrides from environment variables.
    ///
    /// Unparseable values fall back to the default with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_PUBLISH_STRATEGY) {
            match raw.parse() {
                Ok(strategy) => config.publish_strategy = strategy,
                Err(e) => warn!(
                    variable = ENV_PUBLISH_STRATEGY,
                    error = %e,
                    fallback = %config.publish_strategy,
                    "Ignoring invalid publish strategy"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_LOG_DISPATCH) {
            config.log_dispatch = raw.to_lowercase() != "false" && raw != "0";
        }

        config
    }

    /// Parse from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// `ConfigError::Json` on malformed input or unknown enum values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_publish_strategy(mut self, strategy: PublishStrategy) -> Self {
        self.publish_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_dispatch_logging(mut self, enabled: bool) -> Self {
        self.log_dispatch = enabled;
        self
    }
}
