//! Michael-Scott queue over arena links.
//!
//! `head` and `tail` are tagged indices and never null: the queue always holds
//! one dummy link whose successor, reached through `next_strong`, is the
//! oldest element. A push appends behind `tail` and then swings `tail`
//! forward; if the pusher is preempted before the swing, the next pusher or
//! popper that sees the lagging tail completes it. A pop moves `head` to the
//! successor, which becomes the new dummy, and retires the old dummy.
//!
//! Every race-sensitive gap calls [`test_critical_stall`].

use crossbeam_utils::{Backoff, CachePadded};

use crate::alloc::arena::LinkArena;
use crate::concurrency::stall::test_critical_stall;
use crate::concurrency::tagged::{AtomicTaggedIndex, LinkIndex, TaggedIndex};

/// The shared head/tail pair of a lock-free FIFO queue of links.
#[derive(Debug)]
pub struct LinkQueueRoot<const ABA_INC: u64 = 1> {
    head: CachePadded<AtomicTaggedIndex>,
    tail: CachePadded<AtomicTaggedIndex>,
}

impl<const ABA_INC: u64> LinkQueueRoot<ABA_INC> {
    const INCREMENT_IS_POWER_OF_TWO: () = assert!(
        ABA_INC.is_power_of_two(),
        "ABA increment must be a power of two"
    );

    /// Creates an empty queue around the clean link `dummy`.
    pub fn new(dummy: LinkIndex) -> Self {
        let () = Self::INCREMENT_IS_POWER_OF_TWO;
        link_check!(!dummy.is_null(), "queue dummy must not be null");
        let root = TaggedIndex::NULL.with_index(dummy);
        Self {
            head: CachePadded::new(AtomicTaggedIndex::new(root)),
            tail: CachePadded::new(AtomicTaggedIndex::new(root)),
        }
    }

    /// Appends a link whose payload is already set.
    pub fn push(&self, arena: &LinkArena, link: LinkIndex) {
        link_check!(
            arena.item(link).next_strong().load().index().is_null(),
            "{link:?} pushed while still linked"
        );
        let backoff = Backoff::new();
        let local_tail = loop {
            let local_tail = self.tail.load();
            let tail_record = arena.item(local_tail.index());
            let local_next = tail_record.next_strong().load();
            test_critical_stall();
            if self.tail.load() == local_tail {
                if local_next.index().is_null() {
                    test_critical_stall();
                    let new_next = local_next.advanced(ABA_INC).with_index(link);
                    if tail_record.next_strong().compare_exchange(new_next, local_next) {
                        break local_tail;
                    }
                } else {
                    test_critical_stall();
                    let new_tail = local_tail.advanced(ABA_INC).with_index(local_next.index());
                    let _ = self.tail.compare_exchange(new_tail, local_tail);
                }
            }
            backoff.spin();
        };
        test_critical_stall();
        let new_tail = local_tail.advanced(ABA_INC).with_index(link);
        // Losing this CAS is fine: someone already helped the tail forward.
        let _ = self.tail.compare_exchange(new_tail, local_tail);
    }

    /// Removes the oldest element.
    ///
    /// Returns the retired dummy link, already reset to its clean state, and
    /// the payload; the caller owns both.
    pub fn pop(&self, arena: &LinkArena) -> Option<(LinkIndex, *mut ())> {
        let backoff = Backoff::new();
        let (local_head, payload) = loop {
            let local_head = self.head.load();
            let local_tail = self.tail.load();
            let local_next = arena.item(local_head.index()).next_strong().load();
            test_critical_stall();
            if self.head.load() == local_head {
                if local_head.index() == local_tail.index() {
                    if local_next.index().is_null() {
                        return None;
                    }
                    test_critical_stall();
                    let new_tail = local_tail.advanced(ABA_INC).with_index(local_next.index());
                    let _ = self.tail.compare_exchange(new_tail, local_tail);
                } else if let Some(next) = arena.get(local_next.index()) {
                    // Read before the CAS: afterwards the successor is the new
                    // dummy and another popper may retire and recycle it.
                    let payload = next.payload();
                    test_critical_stall();
                    let new_head = local_head.advanced(ABA_INC).with_index(local_next.index());
                    if self.head.compare_exchange(new_head, local_head) {
                        break (local_head, payload);
                    }
                }
            }
            backoff.spin();
        };
        let retired = local_head.index();
        arena.item(retired).reset(ABA_INC);
        Some((retired, payload))
    }

    /// Whether the queue looked empty at the moment of the call. A hint only.
    pub fn is_empty(&self, arena: &LinkArena) -> bool {
        let head = self.head.load();
        arena
            .item(head.index())
            .next_strong()
            .load()
            .index()
            .is_null()
    }

    /// Detaches the dummy link, reset to its clean state, and leaves the root
    /// null. The queue must be empty and unshared.
    pub fn take_dummy(&mut self, arena: &LinkArena) -> LinkIndex {
        let dummy = self.head.load().index();
        link_check!(self.is_empty(arena), "dummy taken from a non-empty queue");
        arena.item(dummy).reset(ABA_INC);
        self.head.init();
        self.tail.init();
        dummy
    }
}
