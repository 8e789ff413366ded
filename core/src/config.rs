//! Configuration for the fixpoint loop
//!
//! The loop is unbounded by default: a derive function that never settles
//! is a caller bug, and the loop will keep draining. Hosts that want a
//! watchdog can opt into an iteration cap.
//!
//! # Example
//!
//! ```
//! use fetchloop_core::config::FetchConfig;
//!
//! let config = FetchConfig::bounded(64);
//! assert_eq!(config.max_iterations, Some(64));
//! assert!(config.validate().is_ok());
//!
//! assert!(FetchConfig::default().max_iterations.is_none());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable read by [`FetchConfig::from_env`]
pub const MAX_ITERATIONS_ENV: &str = "FETCHLOOP_MAX_ITERATIONS";

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value could not be parsed
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Setting name
        key: String,
        /// Raw value that failed to parse
        value: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Fixpoint loop configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of derived batches one call may drain
    ///
    /// `None` leaves the loop unbounded.
    pub max_iterations: Option<usize>,
}

impl FetchConfig {
    /// No iteration cap
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_iterations: None,
        }
    }

    /// Cap the loop at `max_iterations` drained batches
    #[must_use]
    pub const fn bounded(max_iterations: usize) -> Self {
        Self {
            max_iterations: Some(max_iterations),
        }
    }

    /// Load from `FETCHLOOP_MAX_ITERATIONS`
    ///
    /// Unset or empty means unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the variable is not a
    /// number, or [`ConfigError::Validation`] if it is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var(MAX_ITERATIONS_ENV).ok();
        Self::parse(raw.as_deref())
    }

    fn parse(raw: Option<&str>) -> Result<Self, ConfigError> {
        let config = match raw.map(str::trim) {
            None | Some("") => Self::unbounded(),
            Some(value) => {
                let max = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: MAX_ITERATIONS_ENV.to_string(),
                    value: value.to_string(),
                })?;
                Self::bounded(max)
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if `max_iterations` is `Some(0)`, which would reject
    /// every call that derives anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == Some(0) {
            return Err(ConfigError::Validation(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
