//! Error types for the fallible parts of the crate.
//!
//! List operations never fail in the exceptional sense: an empty list yields
//! `None` and a closed list hands the payload back. What remains are arena
//! capacity and configuration errors.

use core::fmt;

/// The error type for arena reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    /// Reserving `requested` more links would exceed the arena's capacity.
    Exhausted {
        /// Number of links asked for.
        requested: u32,
        /// Number of links already handed out (index 0 included).
        reserved: u32,
        /// Hard capacity of the arena.
        capacity: u32,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted {
                requested,
                reserved,
                capacity,
            } => write!(
                f,
                "link arena exhausted: {requested} requested, {reserved} of {capacity} reserved"
            ),
        }
    }
}

impl std::error::Error for ArenaError {}

/// The error type for configuration and global initialization.
#[derive(Debug)]
pub enum ConfigError {
    /// The global link allocator was already initialized.
    AlreadyInitialized,
    /// The requested arena capacity is zero or exceeds the index space.
    InvalidCapacity(u32),
    /// The configuration text could not be parsed.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => f.write_str("global link allocator already initialized"),
            Self::InvalidCapacity(n) => write!(f, "invalid link arena capacity: {n}"),
            Self::Parse(e) => write!(f, "invalid link configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}
