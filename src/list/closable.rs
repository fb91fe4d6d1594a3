//! `ClosableList` — a multi-producer single-consumer list that can be closed.
//!
//! The root's lowest counter bit is the open/closed flag and the root advances
//! in steps of two so pushes never disturb it. Closing detaches the contents
//! and sets the flag in the same CAS, so no push can slip in between the
//! final drain and the close.

use core::marker::PhantomData;

use crossbeam_utils::CachePadded;

use crate::alloc::arena::LinkArena;
use crate::alloc::thread_cache;
use crate::list::lifo_root::{LinkChain, LinkStackRoot};
use crate::list::payload::{attach, detach, from_opaque, LinkPayload};

const STATE_BITS: u32 = 1;
const OPEN: u64 = 0;
const CLOSED: u64 = 1;

/// A LIFO list that accepts pushes until its single consumer closes it.
pub struct ClosableList<P: LinkPayload> {
    root: CachePadded<LinkStackRoot<{ 1 << STATE_BITS }>>,
    _marker: PhantomData<P>,
}

// SAFETY: payloads cross threads only by value, and `LinkPayload: Send`.
unsafe impl<P: LinkPayload> Send for ClosableList<P> {}
// SAFETY: every shared operation goes through the atomic root.
unsafe impl<P: LinkPayload> Sync for ClosableList<P> {}

impl<P: LinkPayload> ClosableList<P> {
    /// Creates an open, empty list.
    pub fn new() -> Self {
        Self {
            root: CachePadded::new(LinkStackRoot::new()),
            _marker: PhantomData,
        }
    }

    /// Pushes `item` unless the list is closed.
    ///
    /// # Errors
    /// Returns the item back if the list was closed; nothing is retained.
    pub fn push_if_not_closed(&self, item: P) -> Result<(), P> {
        let arena = LinkArena::global();
        let link = attach(arena, item);
        if self
            .root
            .push_if(arena, link, |root| root.state::<STATE_BITS>() == OPEN)
        {
            return Ok(());
        }
        let raw = arena.item(link).take_payload();
        thread_cache::release(link);
        // SAFETY: the payload was stored by `attach::<P>` above and never published.
        Err(unsafe { from_opaque(raw) })
    }

    /// Closes the list and returns its contents, newest first.
    ///
    /// # Panics
    /// Panics in debug builds if the list was already closed.
    pub fn pop_all_and_close(&self) -> Vec<P> {
        let mut out = Vec::new();
        self.pop_all_and_close_apply(|item| out.push(item));
        out
    }

    /// Closes the list and hands its contents to `f`, newest first.
    ///
    /// # Panics
    /// Panics in debug builds if the list was already closed.
    pub fn pop_all_and_close_apply<F>(&self, mut f: F)
    where
        F: FnMut(P),
    {
        let arena = LinkArena::global();
        let head = self.root.pop_all_and_change_state(|root| {
            link_check!(
                root.state::<STATE_BITS>() == OPEN,
                "closable list closed twice"
            );
            root.with_state::<STATE_BITS>(CLOSED)
        });
        for link in LinkChain::new(arena, head) {
            // SAFETY: the detached chain is exclusively ours.
            f(unsafe { detach(arena, link) });
        }
    }

    /// Whether the list has been closed. Once true, stays true.
    pub fn is_closed(&self) -> bool {
        self.root.load().state::<STATE_BITS>() == CLOSED
    }

    /// Whether the list looked empty. A hint under concurrent use.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

impl<P: LinkPayload> Default for ClosableList<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: LinkPayload> Drop for ClosableList<P> {
    fn drop(&mut self) {
        let arena = LinkArena::global();
        for link in LinkChain::new(arena, self.root.pop_all()) {
            // SAFETY: exclusive access through `&mut self`.
            drop(unsafe { detach::<P>(arena, link) });
        }
    }
}
