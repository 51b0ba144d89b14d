//! What to do with recoverable failures.

use crate::config::Config;
use crate::error::{Error, Result};

/// Decides whether a recoverable error reaches the caller.
///
/// A strict policy (any environment other than production) returns every
/// error so problems surface during development. A lenient policy logs the
/// error and lets processing continue, which ends in fallback rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    strict: bool,
}

impl ErrorPolicy {
    pub const fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Fail loud.
    pub const fn strict() -> Self {
        Self::new(true)
    }

    /// Fail open.
    pub const fn lenient() -> Self {
        Self::new(false)
    }

    /// Strict everywhere except the `production` environment.
    pub fn for_environment(environment: &str) -> Self {
        Self::new(environment != crate::config::PRODUCTION)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::for_environment(&config.environment)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Return `err` when strict; otherwise log it and carry on.
    pub fn check(&self, err: Error) -> Result<()> {
        if self.strict {
            return Err(err);
        }
        tracing::warn!(
            error = %err,
            cause = ?std::error::Error::source(&err).map(ToString::to_string),
            "ignoring highlight error in production"
        );
        Ok(())
    }
}
