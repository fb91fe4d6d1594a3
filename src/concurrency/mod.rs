//! Concurrency primitives underneath the link lists.
//!
//! - [`tagged`]: index/counter words and their atomic form.
//! - [`stall`]: synthetic stalls for stress testing.
//! - [`transaction`]: deferred link effects for transactional regions.

pub mod stall;
pub mod tagged;
pub mod transaction;

pub use tagged::{AtomicTaggedIndex, LinkIndex, TaggedIndex};
pub use transaction::{in_transaction, transact, Transaction};
