//! `StallingQueue` — a multi-priority FIFO that tracks idle consumers.
//!
//! One [`LockFreeQueue`] per priority (index 0 is the highest) plus a shared
//! register: an [`AtomicTaggedIndex`] whose index bits are a bitmask of
//! stalled consumer slots and whose counter changes on every push and every
//! successful pop.
//!
//! A consumer snapshots the register, scans the queues, and if it finds
//! nothing sets its stall bit with a CAS against that snapshot. Every push
//! advances the register after enqueueing, so a push the scan missed always
//! makes the stall CAS fail and the consumer rescans: no lost wakeups. A push
//! also clears the lowest stalled bit, designating exactly one consumer to be
//! woken by whatever blocking primitive the caller uses.

use crossbeam_utils::{Backoff, CachePadded};

use crate::concurrency::stall::test_critical_stall;
use crate::concurrency::tagged::{AtomicTaggedIndex, INDEX_BITS};
use crate::list::payload::LinkPayload;
use crate::list::queue::LockFreeQueue;

/// Number of consumer slots the stall register can track.
pub const MAX_STALL_THREADS: usize = INDEX_BITS as usize;

/// A priority queue of FIFO levels with a stalled-consumer register.
pub struct StallingQueue<P: LinkPayload, const PRIORITIES: usize, const ABA_INC: u64 = 1> {
    master: CachePadded<AtomicTaggedIndex>,
    queues: [LockFreeQueue<P, ABA_INC>; PRIORITIES],
}

impl<P: LinkPayload, const PRIORITIES: usize, const ABA_INC: u64>
    StallingQueue<P, PRIORITIES, ABA_INC>
{
    const HAS_PRIORITIES: () = assert!(PRIORITIES > 0, "at least one priority level");

    /// Creates an empty queue with no stalled consumers.
    pub fn new() -> Self {
        let () = Self::HAS_PRIORITIES;
        Self {
            master: CachePadded::new(AtomicTaggedIndex::default()),
            queues: core::array::from_fn(|_| LockFreeQueue::with_aba_increment()),
        }
    }

    /// Enqueues `item` at `priority` and wakes at most one stalled consumer.
    ///
    /// Returns the slot of the consumer whose stall bit was cleared, if any.
    ///
    /// # Panics
    /// Panics if `priority >= PRIORITIES`.
    pub fn push(&self, item: P, priority: usize) -> Option<usize> {
        assert!(priority < PRIORITIES, "priority {priority} out of range");
        self.queues[priority].push(item);

        let backoff = Backoff::new();
        loop {
            let local = self.master.load();
            let stalled = local.bits();
            let wake = (stalled != 0).then(|| stalled.trailing_zeros() as usize);
            let new = match wake {
                Some(slot) => local.advanced(ABA_INC).with_bits(stalled & !(1 << slot)),
                None => local.advanced(ABA_INC),
            };
            test_critical_stall();
            if self.master.compare_exchange(new, local) {
                if let Some(slot) = wake {
                    link_trace!(slot, "stalled consumer designated to wake");
                }
                return wake;
            }
            backoff.spin();
        }
    }

    /// Takes the highest-priority item, oldest first within a level.
    ///
    /// With nothing to take and `allow_stall` set, marks `thread` as stalled
    /// and returns `None`; the caller is then expected to block until a push
    /// clears the bit.
    ///
    /// # Panics
    /// Panics if `thread >= MAX_STALL_THREADS`, and in debug builds if
    /// `thread` is still marked stalled.
    pub fn pop(&self, thread: usize, allow_stall: bool) -> Option<P> {
        assert!(thread < MAX_STALL_THREADS, "consumer slot {thread} out of range");
        let bit = 1u32 << thread;

        let backoff = Backoff::new();
        loop {
            let mut local = self.master.load();
            link_check!(
                local.bits() & bit == 0,
                "consumer {thread} asked for work while marked stalled"
            );
            for queue in &self.queues {
                if let Some(item) = queue.pop() {
                    // Move the register so a concurrent stall attempt that
                    // scanned before this pop has to rescan.
                    while !self.master.compare_exchange(local.advanced(ABA_INC), local) {
                        local = self.master.load();
                    }
                    return Some(item);
                }
            }
            if !allow_stall {
                return None;
            }
            test_critical_stall();
            let stalled = local.advanced(ABA_INC).with_bits(local.bits() | bit);
            if self.master.compare_exchange(stalled, local) {
                link_trace!(thread, "consumer stalled");
                return None;
            }
            backoff.spin();
        }
    }

    /// Withdraws `thread`'s stall bit without a push, e.g. after a wait timed
    /// out. Returns whether the bit was set.
    ///
    /// # Panics
    /// Panics if `thread >= MAX_STALL_THREADS`.
    pub fn cancel_stall(&self, thread: usize) -> bool {
        assert!(thread < MAX_STALL_THREADS, "consumer slot {thread} out of range");
        let bit = 1u32 << thread;
        loop {
            let local = self.master.load();
            if local.bits() & bit == 0 {
                return false;
            }
            let new = local.advanced(ABA_INC).with_bits(local.bits() & !bit);
            if self.master.compare_exchange(new, local) {
                return true;
            }
        }
    }

    /// Bitmask of currently stalled consumer slots.
    pub fn stalled_mask(&self) -> u32 {
        self.master.load().bits()
    }

    /// Whether `thread` is currently marked stalled.
    pub fn is_stalled(&self, thread: usize) -> bool {
        thread < MAX_STALL_THREADS && self.stalled_mask() & (1 << thread) != 0
    }

    /// Whether every level looked empty. A hint under concurrent use.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(LockFreeQueue::is_empty)
    }
}

impl<P: LinkPayload, const PRIORITIES: usize, const ABA_INC: u64> Default
    for StallingQueue<P, PRIORITIES, ABA_INC>
{
    fn default() -> Self {
        Self::new()
    }
}
