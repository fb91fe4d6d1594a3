//! Treiber stack over arena links.
//!
//! The root is one [`AtomicTaggedIndex`]; each operation is a single CAS retry
//! loop that re-reads the root on failure. Links chain through `next_weak`.
//! The counter advances by `ABA_INC` on every publish, which leaves the low
//! `log2(ABA_INC)` counter bits free to carry a state (see
//! [`push_if`](LinkStackRoot::push_if) and
//! [`pop_all_and_change_state`](LinkStackRoot::pop_all_and_change_state)).
//!
//! Only LIFO consistency is promised: concurrent pushes and pops linearize at
//! their successful CAS, nothing more.

use crossbeam_utils::Backoff;

use crate::alloc::arena::LinkArena;
use crate::concurrency::stall::test_critical_stall;
use crate::concurrency::tagged::{AtomicTaggedIndex, LinkIndex, TaggedIndex};

/// The shared root of a lock-free LIFO list of links.
#[derive(Debug)]
pub struct LinkStackRoot<const ABA_INC: u64 = 1> {
    head: AtomicTaggedIndex,
}

impl<const ABA_INC: u64> LinkStackRoot<ABA_INC> {
    const INCREMENT_IS_POWER_OF_TWO: () = assert!(
        ABA_INC.is_power_of_two(),
        "ABA increment must be a power of two"
    );

    /// Creates an empty root with a zero counter.
    pub fn new() -> Self {
        let () = Self::INCREMENT_IS_POWER_OF_TWO;
        Self {
            head: AtomicTaggedIndex::default(),
        }
    }

    /// Resets to empty. Only valid while no other thread uses the root.
    pub fn init(&self) {
        self.head.init();
    }

    /// Pushes a clean `link`.
    pub fn push(&self, arena: &LinkArena, link: LinkIndex) {
        self.push_chain(arena, link, link);
    }

    /// Pushes a privately owned chain in one CAS. `first` becomes the new top
    /// and `last`, reached from `first` through `next_weak`, is linked to the
    /// previous top.
    pub fn push_chain(&self, arena: &LinkArena, first: LinkIndex, last: LinkIndex) {
        let pushed = self.push_chain_if(arena, first, last, |_| true);
        debug_assert!(pushed);
    }

    /// Pushes `link` only if `allow` accepts the root observed in the same
    /// iteration as the CAS. If the root changes in between, the CAS fails and
    /// the predicate runs again on the fresh value.
    ///
    /// Returns `false`, with `link` left clean, when the predicate refuses.
    pub fn push_if<F>(&self, arena: &LinkArena, link: LinkIndex, allow: F) -> bool
    where
        F: FnMut(TaggedIndex) -> bool,
    {
        self.push_chain_if(arena, link, link, allow)
    }

    fn push_chain_if<F>(
        &self,
        arena: &LinkArena,
        first: LinkIndex,
        last: LinkIndex,
        mut allow: F,
    ) -> bool
    where
        F: FnMut(TaggedIndex) -> bool,
    {
        link_check!(!first.is_null(), "pushing the null link");
        let tail = arena.item(last);
        let backoff = Backoff::new();
        loop {
            let local = self.head.load();
            if !allow(local) {
                tail.set_next_weak(LinkIndex::NULL);
                return false;
            }
            tail.set_next_weak(local.index());
            let new = local.advanced(ABA_INC).with_index(first);
            test_critical_stall();
            if self.head.compare_exchange(new, local) {
                return true;
            }
            backoff.spin();
        }
    }

    /// Pops the top link, or returns null when empty. The popped link's
    /// `next_weak` is cleared.
    pub fn pop(&self, arena: &LinkArena) -> LinkIndex {
        let backoff = Backoff::new();
        loop {
            let local = self.head.load();
            let Some(record) = arena.get(local.index()) else {
                return LinkIndex::NULL;
            };
            // A stale successor only matters if the CAS succeeds, and it cannot
            // succeed once the root has moved: the counter differs.
            let new = local.advanced(ABA_INC).with_index(record.next_weak());
            test_critical_stall();
            if self.head.compare_exchange(new, local) {
                record.set_next_weak(LinkIndex::NULL);
                return local.index();
            }
            backoff.spin();
        }
    }

    /// Detaches the whole list and returns its top. Walk it with [`LinkChain`].
    pub fn pop_all(&self) -> LinkIndex {
        let backoff = Backoff::new();
        loop {
            let local = self.head.load();
            if local.index().is_null() {
                return LinkIndex::NULL;
            }
            let new = local.advanced(ABA_INC).with_index(LinkIndex::NULL);
            test_critical_stall();
            if self.head.compare_exchange(new, local) {
                return local.index();
            }
            backoff.spin();
        }
    }

    /// Detaches the whole list and installs new state bits in the same CAS.
    ///
    /// `change` receives the candidate root (counter already advanced, state
    /// bits as observed) and returns it with the state it wants; the index is
    /// forced to null. Runs again if the CAS loses a race.
    pub fn pop_all_and_change_state<F>(&self, mut change: F) -> LinkIndex
    where
        F: FnMut(TaggedIndex) -> TaggedIndex,
    {
        let backoff = Backoff::new();
        loop {
            let local = self.head.load();
            let new = change(local.advanced(ABA_INC)).with_index(LinkIndex::NULL);
            test_critical_stall();
            if self.head.compare_exchange(new, local) {
                return local.index();
            }
            backoff.spin();
        }
    }

    /// Snapshot of the root.
    pub fn load(&self) -> TaggedIndex {
        self.head.load()
    }

    /// Whether the list looked empty at the moment of the call. A hint only.
    pub fn is_empty(&self) -> bool {
        self.head.load().index().is_null()
    }
}

impl<const ABA_INC: u64> Default for LinkStackRoot<ABA_INC> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a detached LIFO chain.
///
/// The caller owns the chain exclusively, so traversal is plain sequential
/// reads; each yielded link has its `next_weak` cleared. Links not yet
/// yielded when the iterator is dropped stay chained.
pub struct LinkChain<'a> {
    arena: &'a LinkArena,
    next: LinkIndex,
}

impl<'a> LinkChain<'a> {
    /// Walks the chain starting at `head`.
    pub fn new(arena: &'a LinkArena, head: LinkIndex) -> Self {
        Self { arena, next: head }
    }
}

impl Iterator for LinkChain<'_> {
    type Item = LinkIndex;

    fn next(&mut self) -> Option<LinkIndex> {
        let link = self.next;
        let record = self.arena.get(link)?;
        self.next = record.next_weak();
        record.set_next_weak(LinkIndex::NULL);
        Some(link)
    }
}
