//! `LinkArena` — the paged, append-only table of link records.
//!
//! Records are addressed by [`LinkIndex`] only. Indices are handed out by a
//! bump counter and pages are allocated on first touch, raced into a fixed
//! page table with a pointer CAS. No record is freed while the arena lives, so
//! a resolved `&LinkRecord` stays valid and a stale reader never touches freed
//! memory: the ABA counters in the list roots take care of stale *values*.

use core::ptr;

use crossbeam_utils::CachePadded;

use crate::alloc::global::LinkAllocator;
use crate::alloc::stats::ArenaStats;
use crate::concurrency::tagged::{AtomicTaggedIndex, LinkIndex, INDEX_BITS};
use crate::diag;
use crate::error::ArenaError;
use crate::sync::{AtomicPtr, AtomicU32, Ordering};

/// Size of the index space, index 0 included.
pub const MAX_LINKS: u32 = 1 << INDEX_BITS;
/// Records per arena page.
#[cfg(not(loom))]
pub const LINKS_PER_PAGE: u32 = 1 << 14;
/// Records per arena page, kept small so a model run stays tractable.
#[cfg(loom)]
pub const LINKS_PER_PAGE: u32 = 1 << 4;
/// Number of slots in the page table of a full-size arena.
pub const MAX_PAGES: u32 = MAX_LINKS / LINKS_PER_PAGE;

/// One node of a lock-free list.
///
/// Fields are atomics because a stale reader may load them while the owner
/// rewrites them; ownership, not locking, serializes writers.
#[derive(Debug)]
pub struct LinkRecord {
    next_strong: AtomicTaggedIndex,
    payload: AtomicPtr<()>,
    next_weak: AtomicU32,
}

impl LinkRecord {
    fn new() -> Self {
        Self {
            next_strong: AtomicTaggedIndex::default(),
            payload: AtomicPtr::new(ptr::null_mut()),
            next_weak: AtomicU32::new(0),
        }
    }

    /// The tagged successor used by FIFO queues.
    #[inline]
    pub fn next_strong(&self) -> &AtomicTaggedIndex {
        &self.next_strong
    }

    /// The plain successor used by LIFO chains.
    #[inline]
    pub fn next_weak(&self) -> LinkIndex {
        LinkIndex::new(self.next_weak.load(Ordering::Relaxed))
    }

    /// Sets the plain successor.
    #[inline]
    pub fn set_next_weak(&self, next: LinkIndex) {
        self.next_weak.store(next.get(), Ordering::Relaxed);
    }

    /// The opaque payload. Never dereferenced by the list.
    #[inline]
    pub fn payload(&self) -> *mut () {
        self.payload.load(Ordering::Relaxed)
    }

    /// Sets the opaque payload.
    #[inline]
    pub fn set_payload(&self, payload: *mut ()) {
        self.payload.store(payload, Ordering::Relaxed);
    }

    /// Takes the payload, leaving null behind.
    #[inline]
    pub fn take_payload(&self) -> *mut () {
        self.payload.swap(ptr::null_mut(), Ordering::Relaxed)
    }

    /// Whether the record is in its unlinked state: no payload, no successors.
    pub fn is_clean(&self) -> bool {
        self.payload().is_null()
            && self.next_weak().is_null()
            && self.next_strong.load().index().is_null()
    }

    /// Returns the record to its unlinked state.
    ///
    /// A non-null strong successor is cleared with an advanced counter so a
    /// CAS prepared against the old value can never succeed later.
    pub(crate) fn reset(&self, increment: u64) {
        self.payload.store(ptr::null_mut(), Ordering::Relaxed);
        self.next_weak.store(0, Ordering::Relaxed);
        let next = self.next_strong.load();
        if !next.index().is_null() {
            self.next_strong
                .store(next.advanced(increment).with_index(LinkIndex::NULL));
        }
    }

    // Bundles in the thread cache chain through the payload slot, leaving
    // `next_weak` free for the global free-bundle stack.
    #[inline]
    pub(crate) fn set_bundle_next(&self, next: LinkIndex) {
        self.payload
            .store(ptr::without_provenance_mut(next.get() as usize), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn take_bundle_next(&self) -> LinkIndex {
        let raw = self.payload.swap(ptr::null_mut(), Ordering::Relaxed);
        #[allow(clippy::cast_possible_truncation)]
        LinkIndex::new(raw.addr() as u32)
    }
}

/// A paged, append-only allocator of link records.
pub struct LinkArena {
    next_index: CachePadded<AtomicU32>,
    capacity: u32,
    pages: Box<[AtomicPtr<LinkRecord>]>,
    pages_allocated: AtomicU32,
}

impl LinkArena {
    /// Creates an arena able to hand out indices `1..capacity`.
    ///
    /// # Panics
    /// Panics if `capacity < 2` or `capacity > MAX_LINKS`.
    pub fn with_capacity(capacity: u32) -> Self {
        assert!(
            (2..=MAX_LINKS).contains(&capacity),
            "link arena capacity {capacity} outside 2..={MAX_LINKS}"
        );
        let page_count = capacity.div_ceil(LINKS_PER_PAGE);
        let pages = (0..page_count)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect();
        Self {
            next_index: CachePadded::new(AtomicU32::new(1)),
            capacity,
            pages,
            pages_allocated: AtomicU32::new(0),
        }
    }

    /// The process-wide arena.
    pub fn global() -> &'static LinkArena {
        LinkAllocator::global().arena()
    }

    /// Hard capacity, index 0 included.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of indices handed out so far.
    pub fn reserved(&self) -> u32 {
        self.next_index.load(Ordering::Relaxed) - 1
    }

    /// Reserves `count` contiguous fresh links, aborting the process when the
    /// index space is exhausted.
    pub fn alloc(&self, count: u32) -> LinkIndex {
        match self.try_alloc(count) {
            Ok(first) => first,
            Err(ArenaError::Exhausted {
                requested,
                capacity,
                ..
            }) => diag::links_exhausted(requested, capacity),
        }
    }

    /// Reserves `count` contiguous fresh links and returns the first.
    ///
    /// A failed reservation leaves the arena untouched.
    ///
    /// # Errors
    /// Returns [`ArenaError::Exhausted`] if the reservation does not fit.
    pub fn try_alloc(&self, count: u32) -> Result<LinkIndex, ArenaError> {
        link_check!(count > 0, "empty link reservation");
        let mut first = self.next_index.load(Ordering::Relaxed);
        loop {
            let end = u64::from(first) + u64::from(count);
            if end > u64::from(self.capacity) {
                return Err(ArenaError::Exhausted {
                    requested: count,
                    reserved: first,
                    capacity: self.capacity,
                });
            }
            #[allow(clippy::cast_possible_truncation)]
            match self.next_index.compare_exchange_weak(
                first,
                end as u32,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => first = actual,
            }
        }
        self.map_pages(first, count);
        Ok(LinkIndex::new(first))
    }

    fn map_pages(&self, first: u32, count: u32) {
        let first_page = first / LINKS_PER_PAGE;
        let last_page = (first + count - 1) / LINKS_PER_PAGE;
        for page in first_page..=last_page {
            let slot = &self.pages[page as usize];
            if !slot.load(Ordering::Acquire).is_null() {
                continue;
            }
            let fresh = new_page();
            match slot.compare_exchange(
                ptr::null_mut(),
                fresh,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.pages_allocated.fetch_add(1, Ordering::Relaxed);
                    link_debug!(page, "link arena page mapped");
                }
                // SAFETY: `fresh` lost the race and was never shared.
                Err(_) => unsafe { free_page(fresh) },
            }
        }
    }

    /// Resolves `index` to its record; null maps to `None`.
    #[inline]
    pub fn get(&self, index: LinkIndex) -> Option<&LinkRecord> {
        if index.is_null() {
            return None;
        }
        let raw = index.get();
        link_check!(
            raw < self.next_index.load(Ordering::Relaxed),
            "link index {raw} beyond the reserved range"
        );
        let page = self
            .pages
            .get((raw / LINKS_PER_PAGE) as usize)
            .map_or(ptr::null_mut(), |slot| slot.load(Ordering::Acquire));
        if page.is_null() {
            diag::critical_error("link index resolves to an unmapped page", raw);
        }
        // SAFETY: a mapped page holds LINKS_PER_PAGE records and is never freed
        // while `self` is alive.
        Some(unsafe { &*page.add((raw % LINKS_PER_PAGE) as usize) })
    }

    /// Resolves a non-null `index` to its record.
    #[inline]
    pub fn item(&self, index: LinkIndex) -> &LinkRecord {
        match self.get(index) {
            Some(record) => record,
            None => diag::critical_error("null link dereferenced", 0),
        }
    }

    /// Snapshot of the arena's counters.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            capacity: self.capacity,
            reserved_links: self.reserved(),
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            links_per_page: LINKS_PER_PAGE,
            counter_overflows: diag::counter_overflows(),
        }
    }
}

impl Drop for LinkArena {
    fn drop(&mut self) {
        for slot in self.pages.iter() {
            let page = slot.load(Ordering::Relaxed);
            if !page.is_null() {
                // SAFETY: exclusive access; each mapped page came from `new_page`.
                unsafe { free_page(page) };
            }
        }
    }
}

fn new_page() -> *mut LinkRecord {
    let page: Box<[LinkRecord]> = (0..LINKS_PER_PAGE).map(|_| LinkRecord::new()).collect();
    Box::into_raw(page).cast::<LinkRecord>()
}

/// # Safety
/// `page` must come from `new_page` and must not be used afterwards.
unsafe fn free_page(page: *mut LinkRecord) {
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
        page,
        LINKS_PER_PAGE as usize,
    )));
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn index_zero_is_null() {
        let arena = LinkArena::with_capacity(64);
        assert!(arena.get(LinkIndex::NULL).is_none());
    }

    #[test]
    fn reservations_are_contiguous_and_start_at_one() {
        let arena = LinkArena::with_capacity(1000);
        assert_eq!(arena.alloc(10).get(), 1);
        assert_eq!(arena.alloc(5).get(), 11);
        assert_eq!(arena.reserved(), 15);
        for raw in 1..16 {
            assert!(arena.item(LinkIndex::new(raw)).is_clean());
        }
    }

    #[test]
    fn exhaustion_is_reported_and_leaves_counter_alone() {
        let arena = LinkArena::with_capacity(8);
        assert_eq!(arena.try_alloc(7).unwrap().get(), 1);
        assert_eq!(
            arena.try_alloc(1),
            Err(ArenaError::Exhausted {
                requested: 1,
                reserved: 8,
                capacity: 8
            })
        );
        assert_eq!(arena.reserved(), 7);
    }

    #[test]
    fn reservation_spanning_pages_maps_both() {
        let arena = LinkArena::with_capacity(3 * LINKS_PER_PAGE);
        arena.alloc(LINKS_PER_PAGE - 10);
        let first = arena.alloc(20);
        assert_eq!(arena.stats().pages_allocated, 2);
        let last = LinkIndex::new(first.get() + 19);
        arena.item(last).set_next_weak(first);
        assert_eq!(arena.item(last).next_weak(), first);
    }

    #[test]
    fn reset_advances_strong_counter() {
        let arena = LinkArena::with_capacity(16);
        let a = arena.alloc(2);
        let b = LinkIndex::new(a.get() + 1);
        let record = arena.item(a);
        let before = record.next_strong().load();
        record.next_strong().store(before.advanced(1).with_index(b));
        record.set_payload(ptr::without_provenance_mut(0x40));
        record.reset(1);
        assert!(record.is_clean());
        assert_eq!(record.next_strong().load().counter(), before.counter() + 2);
    }

    #[test]
    fn bundle_chain_uses_payload_slot() {
        let arena = LinkArena::with_capacity(16);
        let a = arena.alloc(2);
        let b = LinkIndex::new(a.get() + 1);
        arena.item(a).set_bundle_next(b);
        assert!(!arena.item(a).is_clean());
        assert_eq!(arena.item(a).take_bundle_next(), b);
        assert!(arena.item(a).is_clean());
    }
}
