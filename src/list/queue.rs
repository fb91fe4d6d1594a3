//! `LockFreeQueue` — a FIFO of owned payloads.

use core::marker::PhantomData;

use crate::alloc::arena::LinkArena;
use crate::alloc::thread_cache;
use crate::list::fifo_root::LinkQueueRoot;
use crate::list::payload::{attach, from_opaque, LinkPayload};

/// A lock-free multi-producer multi-consumer FIFO queue.
///
/// Enqueue order is preserved across all producers and consumers.
pub struct LockFreeQueue<P: LinkPayload, const ABA_INC: u64 = 1> {
    root: LinkQueueRoot<ABA_INC>,
    _marker: PhantomData<P>,
}

// SAFETY: payloads cross threads only by value, and `LinkPayload: Send`.
unsafe impl<P: LinkPayload, const ABA_INC: u64> Send for LockFreeQueue<P, ABA_INC> {}
// SAFETY: every shared operation goes through the atomic head/tail pair.
unsafe impl<P: LinkPayload, const ABA_INC: u64> Sync for LockFreeQueue<P, ABA_INC> {}

impl<P: LinkPayload> LockFreeQueue<P> {
    /// Creates an empty queue whose roots advance their counters by one.
    pub fn new() -> Self {
        Self::with_aba_increment()
    }
}

impl<P: LinkPayload, const ABA_INC: u64> LockFreeQueue<P, ABA_INC> {
    /// Creates an empty queue whose roots advance their counters by `ABA_INC`.
    pub fn with_aba_increment() -> Self {
        Self {
            root: LinkQueueRoot::new(thread_cache::acquire()),
            _marker: PhantomData,
        }
    }

    /// Appends `item`.
    pub fn push(&self, item: P) {
        let arena = LinkArena::global();
        let link = attach(arena, item);
        self.root.push(arena, link);
    }

    /// Removes the oldest item, or `None` if the queue looked empty.
    pub fn pop(&self) -> Option<P> {
        let arena = LinkArena::global();
        let (retired, raw) = self.root.pop(arena)?;
        thread_cache::release(retired);
        // SAFETY: the payload was stored by `attach::<P>` and winning the head
        // CAS made this thread its only consumer.
        Some(unsafe { from_opaque(raw) })
    }

    /// Pops until the queue looks empty, oldest first.
    pub fn pop_all(&self) -> Vec<P> {
        let mut out = Vec::new();
        self.pop_all_and_apply(|item| out.push(item));
        out
    }

    /// Pops until the queue looks empty, handing each item to `f`.
    pub fn pop_all_and_apply<F>(&self, mut f: F)
    where
        F: FnMut(P),
    {
        while let Some(item) = self.pop() {
            f(item);
        }
    }

    /// Whether the queue looked empty. A hint under concurrent use.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty(LinkArena::global())
    }
}

impl<P: LinkPayload> Default for LockFreeQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: LinkPayload, const ABA_INC: u64> Drop for LockFreeQueue<P, ABA_INC> {
    fn drop(&mut self) {
        self.pop_all_and_apply(drop);
        let dummy = self.root.take_dummy(LinkArena::global());
        thread_cache::release(dummy);
    }
}
