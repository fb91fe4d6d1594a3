//! The process-wide link allocator.
//!
//! One [`LinkArena`] and one free-bundle stack per process, created once under
//! a `OnceLock` and never torn down. [`LinkAllocator::init_global`] installs it
//! from an explicit [`LinkConfig`]; otherwise the first use builds it from
//! [`LinkConfig::from_env`].

use std::sync::OnceLock;

use crossbeam_utils::CachePadded;

use crate::alloc::arena::LinkArena;
use crate::alloc::stats::ArenaStats;
use crate::concurrency::stall;
use crate::config::{LinkConfig, CONFIG_ENV};
use crate::error::ConfigError;
use crate::list::lifo_root::LinkStackRoot;

static GLOBAL: OnceLock<LinkAllocator> = OnceLock::new();

/// The global arena plus the stack of free bundles shared by thread caches.
pub struct LinkAllocator {
    arena: LinkArena,
    free_bundles: CachePadded<LinkStackRoot>,
}

impl LinkAllocator {
    fn from_config(config: LinkConfig) -> Self {
        if config.test_critical_stall {
            stall::set_test_critical_stall(true);
        }
        link_debug!(max_links = config.max_links, "global link allocator initialized");
        Self {
            arena: LinkArena::with_capacity(config.max_links),
            free_bundles: CachePadded::new(LinkStackRoot::new()),
        }
    }

    /// Installs the global allocator from `config`.
    ///
    /// # Errors
    /// Returns [`ConfigError::AlreadyInitialized`] if the allocator was already
    /// created (explicitly or by first use), or the validation error of `config`.
    pub fn init_global(config: LinkConfig) -> Result<&'static Self, ConfigError> {
        config.validate()?;
        let mut installed = false;
        let allocator = GLOBAL.get_or_init(|| {
            installed = true;
            Self::from_config(config)
        });
        if installed {
            Ok(allocator)
        } else {
            Err(ConfigError::AlreadyInitialized)
        }
    }

    /// The global allocator, created from the environment on first use.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| {
            let config = LinkConfig::from_env().unwrap_or_else(|_err| {
                link_warn!(error = %_err, "ignoring invalid {}", CONFIG_ENV);
                LinkConfig::default()
            });
            Self::from_config(config)
        })
    }

    /// The global allocator if it has been created.
    pub(crate) fn try_global() -> Option<&'static Self> {
        GLOBAL.get()
    }

    /// The shared arena.
    pub fn arena(&self) -> &LinkArena {
        &self.arena
    }

    pub(crate) fn free_bundles(&self) -> &LinkStackRoot {
        &self.free_bundles
    }

    /// Arena counters.
    pub fn stats(&self) -> ArenaStats {
        self.arena.stats()
    }
}
