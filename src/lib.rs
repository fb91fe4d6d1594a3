//! # `linkage` - lock-free link lists over an index arena
//!
//! Lock-free LIFO and FIFO lists whose nodes ("links") live in one
//! process-wide, append-only arena and are addressed by 26-bit indices.
//! Roots pack an index and a 38-bit ABA counter into a single 64-bit word,
//! so every list operation is a plain 64-bit CAS.
//!
//! ## Layers
//!
//! 1. **Tagged indices** ([`TaggedIndex`], [`AtomicTaggedIndex`]): index plus
//!    counter in one word. The low counter bits can carry a small state.
//! 2. **Arena** ([`LinkArena`]): paged storage of link records. Records are
//!    never freed while the arena lives, so stale readers always read valid
//!    memory.
//! 3. **Thread cache** ([`acquire_link`], [`release_link`]): per-thread
//!    bundles of [`BUNDLE_SIZE`] links. Cross-thread traffic happens once per
//!    bundle.
//! 4. **Roots** ([`LinkStackRoot`], [`LinkQueueRoot`]): a Treiber stack and a
//!    Michael-Scott queue over raw links.
//! 5. **Containers** ([`LockFreeStack`], [`LockFreeQueue`], [`ClosableList`],
//!    [`StallingQueue`]): one owned payload per link.
//!
//! ## Guarantees
//!
//! - Each successfully pushed item is popped at most once, and exactly once
//!   unless it is still in the list when the list is dropped.
//! - Stacks are LIFO-consistent, queues are FIFO per producer.
//! - A closed [`ClosableList`] stays closed.
//! - No operation blocks. A stalled [`StallingQueue`] consumer is only
//!   *reported* to the producer that should wake it.
//!
//! ## Example
//!
//! ```rust
//! use linkage::{LockFreeQueue, LockFreeStack};
//!
//! let stack = LockFreeStack::new();
//! stack.push(Box::new("a"));
//! stack.push(Box::new("b"));
//! assert_eq!(stack.pop().as_deref(), Some(&"b"));
//!
//! let queue = LockFreeQueue::new();
//! queue.push(Box::new(1));
//! queue.push(Box::new(2));
//! assert_eq!(queue.pop().as_deref(), Some(&1));
//! ```
//!
//! ## Configuration
//!
//! The global arena is created on first use from [`LinkConfig::from_env`]
//! (JSON in `LINKAGE_CONFIG`), or explicitly through
//! [`LinkAllocator::init_global`] before any link is touched.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
mod diag;

pub mod alloc;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod list;
mod sync;

pub use alloc::{
    acquire_link, cached_links, release_link, ArenaStats, LinkAllocator, LinkArena, LinkRecord,
    BUNDLE_SIZE, MAX_LINKS,
};
pub use concurrency::{transact, AtomicTaggedIndex, LinkIndex, TaggedIndex, Transaction};
pub use config::LinkConfig;
pub use diag::counter_overflows;
pub use error::{ArenaError, ConfigError};
pub use list::{
    ClosableList, LinkChain, LinkPayload, LinkQueueRoot, LinkStackRoot, LockFreeQueue,
    LockFreeStack, StallingQueue,
};

// Compile-time layout checks.
#[cfg(not(loom))]
const _: () = {
    use core::mem;

    // Roots and record links are single 64-bit words so they CAS as one unit.
    assert!(mem::size_of::<TaggedIndex>() == 8);
    assert!(mem::size_of::<AtomicTaggedIndex>() == 8);
    assert!(mem::size_of::<LinkIndex>() == 4);

    // Stalled-thread masks live in the index bits of a stall register.
    assert!(list::MAX_STALL_THREADS <= 32);
    assert!(MAX_LINKS % alloc::LINKS_PER_PAGE == 0);
};
