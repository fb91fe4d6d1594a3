//! Per-thread link cache.
//!
//! Each thread keeps two bundles of links: a `full_bundle` of exactly
//! [`BUNDLE_SIZE`] links and a `partial_bundle` being drawn down or built up.
//! Single-link acquire/release touches only thread-local state; the one
//! cross-thread operation, a push or pop on the global free-bundle stack,
//! happens once per [`BUNDLE_SIZE`] links.
//!
//! Links inside a bundle chain through their payload slot. A bundle on the
//! global stack is represented by its head link, chained through `next_weak`.
//!
//! [`acquire_link`] and [`release_link`] cooperate with
//! [`transaction`](crate::concurrency::transaction): inside a region, an
//! acquisition is recorded (and undone on abort) and a release is deferred to
//! commit. The typed containers use the untracked paths.

use core::cell::RefCell;
use core::mem;

use crate::alloc::global::LinkAllocator;
use crate::concurrency::tagged::LinkIndex;
use crate::concurrency::transaction;

/// Links per bundle.
pub const BUNDLE_SIZE: u32 = 64;

struct ThreadLinkCache {
    full_bundle: LinkIndex,
    partial_bundle: LinkIndex,
    num_partial: u32,
}

thread_local! {
    static CACHE: RefCell<ThreadLinkCache> = const { RefCell::new(ThreadLinkCache::new()) };
}

impl ThreadLinkCache {
    const fn new() -> Self {
        Self {
            full_bundle: LinkIndex::NULL,
            partial_bundle: LinkIndex::NULL,
            num_partial: 0,
        }
    }

    fn pop(&mut self, allocator: &LinkAllocator) -> LinkIndex {
        let arena = allocator.arena();
        if self.partial_bundle.is_null() {
            if self.full_bundle.is_null() {
                self.partial_bundle = allocator.free_bundles().pop(arena);
                if self.partial_bundle.is_null() {
                    let first = arena.alloc(BUNDLE_SIZE).get();
                    link_trace!(first, "thread link cache refilled from arena");
                    for raw in first..first + BUNDLE_SIZE {
                        let link = LinkIndex::new(raw);
                        arena.item(link).set_bundle_next(self.partial_bundle);
                        self.partial_bundle = link;
                    }
                }
            } else {
                self.partial_bundle = mem::replace(&mut self.full_bundle, LinkIndex::NULL);
            }
            self.num_partial = BUNDLE_SIZE;
        }

        let link = self.partial_bundle;
        let record = arena.item(link);
        self.partial_bundle = record.take_bundle_next();
        self.num_partial -= 1;
        link_check!(record.is_clean(), "{link:?} left the thread cache dirty");
        link
    }

    fn push(&mut self, allocator: &LinkAllocator, link: LinkIndex) {
        let arena = allocator.arena();
        let record = arena.item(link);
        link_check!(record.is_clean(), "{link:?} released while still linked");

        if self.num_partial >= BUNDLE_SIZE {
            if !self.full_bundle.is_null() {
                allocator.free_bundles().push(arena, self.full_bundle);
            }
            self.full_bundle = mem::replace(&mut self.partial_bundle, LinkIndex::NULL);
            self.num_partial = 0;
        }
        record.set_bundle_next(self.partial_bundle);
        self.partial_bundle = link;
        self.num_partial += 1;
    }

    fn len(&self) -> u32 {
        let full = if self.full_bundle.is_null() { 0 } else { BUNDLE_SIZE };
        full + self.num_partial
    }
}

impl Drop for ThreadLinkCache {
    fn drop(&mut self) {
        // The full bundle goes back for other threads; the partial one is
        // stranded since the global stack only carries whole bundles.
        if self.full_bundle.is_null() {
            return;
        }
        if let Some(allocator) = LinkAllocator::try_global() {
            allocator
                .free_bundles()
                .push(allocator.arena(), self.full_bundle);
        }
        link_trace!(stranded = self.num_partial, "thread link cache retired");
    }
}

/// Takes a clean link from this thread's cache.
///
/// Inside a transaction region the acquisition is recorded; if the region
/// aborts, the link is reset and handed back to the cache. Links acquired in a
/// region that may abort must not be published before it commits.
pub fn acquire_link() -> LinkIndex {
    let link = acquire();
    transaction::record_acquire(link);
    link
}

/// Returns a fully unlinked link to this thread's cache.
///
/// Inside a transaction region the release is deferred until the outermost
/// region commits, and dropped if it aborts.
pub fn release_link(link: LinkIndex) {
    if !transaction::defer_release(link) {
        release(link);
    }
}

/// Number of links currently held by this thread's cache.
pub fn cached_links() -> u32 {
    CACHE.try_with(|cache| cache.borrow().len()).unwrap_or(0)
}

pub(crate) fn acquire() -> LinkIndex {
    let allocator = LinkAllocator::global();
    CACHE
        .try_with(|cache| cache.borrow_mut().pop(allocator))
        .unwrap_or_else(|_| allocator.arena().alloc(1))
}

pub(crate) fn release(link: LinkIndex) {
    let allocator = LinkAllocator::global();
    if CACHE
        .try_with(|cache| cache.borrow_mut().push(allocator, link))
        .is_err()
    {
        link_trace!(?link, "link stranded during thread teardown");
    }
}
