//! Atomics used by the lock-free core.
//!
//! Under `--cfg loom` these resolve to loom's model-checked atomics so the
//! list algorithms can be explored exhaustively; otherwise they are the plain
//! `core` atomics.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64};

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64};

pub(crate) use core::sync::atomic::Ordering;
