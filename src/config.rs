//! Runtime configuration for the global link allocator.
//!
//! Everything structural (index width, page size, bundle size) is a
//! compile-time constant. The two knobs that remain are the global arena's
//! capacity and the critical-stall test hook, read once when the global
//! allocator is first touched.

use serde::{Deserialize, Serialize};

use crate::alloc::arena::MAX_LINKS;
use crate::error::ConfigError;

/// Environment variable holding a JSON [`LinkConfig`].
pub const CONFIG_ENV: &str = "LINKAGE_CONFIG";

/// Configuration of the process-wide link allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Capacity of the global arena, index 0 included. At most `2^26`.
    pub max_links: u32,
    /// Inject synthetic stalls at race-sensitive points (debug builds only).
    pub test_critical_stall: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_links: MAX_LINKS,
            test_critical_stall: false,
        }
    }
}

impl LinkConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed input and
    /// [`ConfigError::InvalidCapacity`] for an out-of-range `max_links`.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads [`CONFIG_ENV`]; an unset variable yields the defaults.
    ///
    /// # Errors
    /// Same as [`LinkConfig::from_json`].
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(text) => Self::from_json(&text),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Checks that the capacity leaves at least one usable index and fits
    /// the index space.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidCapacity`] when it does not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_links < 2 || self.max_links > MAX_LINKS {
            return Err(ConfigError::InvalidCapacity(self.max_links));
        }
        Ok(())
    }
}
