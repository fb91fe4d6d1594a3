//! Lock-free lists of links.
//!
//! Two layers live here. The roots ([`LinkStackRoot`], [`LinkQueueRoot`])
//! operate on raw [`LinkIndex`](crate::LinkIndex) values and never touch a
//! payload; the typed containers wrap one payload per link and manage link
//! lifetime through the thread cache.

pub mod closable;
pub mod fifo_root;
pub mod lifo_root;
pub mod payload;
pub mod queue;
pub mod stack;
pub mod stalling;

pub use closable::ClosableList;
pub use fifo_root::LinkQueueRoot;
pub use lifo_root::{LinkChain, LinkStackRoot};
pub use payload::LinkPayload;
pub use queue::LockFreeQueue;
pub use stack::LockFreeStack;
pub use stalling::{StallingQueue, MAX_STALL_THREADS};
