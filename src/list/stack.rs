//! `LockFreeStack` — an unordered-by-contract LIFO of owned payloads.

use core::marker::PhantomData;

use crossbeam_utils::CachePadded;

use crate::alloc::arena::LinkArena;
use crate::list::lifo_root::{LinkChain, LinkStackRoot};
use crate::list::payload::{attach, detach, LinkPayload};

/// A lock-free multi-producer multi-consumer LIFO stack.
///
/// Links come from the calling thread's cache, so steady-state push/pop costs
/// one CAS on the root and no allocation.
///
/// # Example
/// ```
/// use linkage::LockFreeStack;
///
/// let stack = LockFreeStack::new();
/// stack.push(Box::new(1));
/// stack.push(Box::new(2));
/// stack.push(Box::new(3));
/// let drained: Vec<i32> = stack.pop_all().into_iter().map(|b| *b).collect();
/// assert_eq!(drained, [3, 2, 1]);
/// ```
pub struct LockFreeStack<P: LinkPayload> {
    root: CachePadded<LinkStackRoot>,
    _marker: PhantomData<P>,
}

// SAFETY: payloads cross threads only by value, and `LinkPayload: Send`.
unsafe impl<P: LinkPayload> Send for LockFreeStack<P> {}
// SAFETY: every shared operation goes through the atomic root.
unsafe impl<P: LinkPayload> Sync for LockFreeStack<P> {}

impl<P: LinkPayload> LockFreeStack<P> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            root: CachePadded::new(LinkStackRoot::new()),
            _marker: PhantomData,
        }
    }

    /// Pushes `item` on top.
    pub fn push(&self, item: P) {
        let arena = LinkArena::global();
        let link = attach(arena, item);
        self.root.push(arena, link);
    }

    /// Pushes every item with a single CAS. The result is the same as pushing
    /// them one by one: the last item ends up on top.
    pub fn push_all<I>(&self, items: I)
    where
        I: IntoIterator<Item = P>,
    {
        let arena = LinkArena::global();
        let mut items = items.into_iter();
        let Some(first) = items.next() else {
            return;
        };
        let bottom = attach(arena, first);
        let mut top = bottom;
        for item in items {
            let link = attach(arena, item);
            arena.item(link).set_next_weak(top);
            top = link;
        }
        self.root.push_chain(arena, top, bottom);
    }

    /// Pops the top item, or `None` if the stack looked empty.
    pub fn pop(&self) -> Option<P> {
        let arena = LinkArena::global();
        let link = self.root.pop(arena);
        if link.is_null() {
            return None;
        }
        // SAFETY: the link was filled by `attach::<P>` and the pop made it ours.
        Some(unsafe { detach(arena, link) })
    }

    /// Detaches everything pushed so far in one CAS and returns it newest first.
    pub fn pop_all(&self) -> Vec<P> {
        let mut out = Vec::new();
        self.pop_all_and_apply(|item| out.push(item));
        out
    }

    /// Detaches everything pushed so far in one CAS and hands each item to
    /// `f`, newest first.
    pub fn pop_all_and_apply<F>(&self, mut f: F)
    where
        F: FnMut(P),
    {
        let arena = LinkArena::global();
        for link in LinkChain::new(arena, self.root.pop_all()) {
            // SAFETY: the detached chain is exclusively ours.
            f(unsafe { detach(arena, link) });
        }
    }

    /// Whether the stack looked empty. A hint under concurrent use.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

impl<P: LinkPayload> Default for LockFreeStack<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: LinkPayload> Drop for LockFreeStack<P> {
    fn drop(&mut self) {
        self.pop_all_and_apply(drop);
    }
}
