//! Payloads carried by links.
//!
//! A link stores one non-null opaque pointer and never dereferences it.
//! [`LinkPayload`] is the conversion between an owned value and that pointer.

use core::num::NonZeroUsize;
use core::ptr::{self, NonNull};
use std::sync::Arc;

use crate::alloc::arena::LinkArena;
use crate::alloc::thread_cache;
use crate::concurrency::tagged::LinkIndex;

/// An owned value that round-trips through a non-null opaque pointer.
///
/// # Safety
/// `from_raw(into_raw(x))` must give back `x`, and a pointer produced by
/// `into_raw` must be consumed by exactly one `from_raw`.
pub unsafe trait LinkPayload: Send + Sized {
    /// Gives up ownership, producing the opaque pointer.
    fn into_raw(self) -> NonNull<()>;

    /// Takes ownership back.
    ///
    /// # Safety
    /// `raw` must come from [`into_raw`](Self::into_raw) of the same type and
    /// must not be used again.
    unsafe fn from_raw(raw: NonNull<()>) -> Self;
}

// SAFETY: `Box::leak`/`Box::from_raw` round-trip; the pointer is never null.
unsafe impl<T: Send> LinkPayload for Box<T> {
    fn into_raw(self) -> NonNull<()> {
        NonNull::from(Box::leak(self)).cast()
    }

    unsafe fn from_raw(raw: NonNull<()>) -> Self {
        Box::from_raw(raw.cast::<T>().as_ptr())
    }
}

// SAFETY: `Arc::into_raw`/`Arc::from_raw` round-trip; the pointer is never null.
unsafe impl<T: Send + Sync> LinkPayload for Arc<T> {
    fn into_raw(self) -> NonNull<()> {
        // SAFETY: `Arc::into_raw` never returns null.
        unsafe { NonNull::new_unchecked(Arc::into_raw(self).cast_mut()) }.cast()
    }

    unsafe fn from_raw(raw: NonNull<()>) -> Self {
        Arc::from_raw(raw.cast::<T>().as_ptr().cast_const())
    }
}

// Opaque tokens: the value travels as the pointer's address.
// SAFETY: a non-zero address is a non-null pointer and reads back unchanged.
unsafe impl LinkPayload for NonZeroUsize {
    fn into_raw(self) -> NonNull<()> {
        // SAFETY: `self` is non-zero.
        unsafe { NonNull::new_unchecked(ptr::without_provenance_mut(self.get())) }
    }

    unsafe fn from_raw(raw: NonNull<()>) -> Self {
        NonZeroUsize::new_unchecked(raw.as_ptr().addr())
    }
}

/// Stores `item` in a freshly acquired link.
pub(crate) fn attach<P: LinkPayload>(arena: &LinkArena, item: P) -> LinkIndex {
    let link = thread_cache::acquire();
    arena.item(link).set_payload(item.into_raw().as_ptr());
    link
}

/// Takes the payload out of a link the caller exclusively owns and returns
/// the link to the thread cache.
///
/// # Safety
/// `link` must have been filled by [`attach`] with the same `P`, and must be
/// unlinked from every list.
pub(crate) unsafe fn detach<P: LinkPayload>(arena: &LinkArena, link: LinkIndex) -> P {
    let raw = arena.item(link).take_payload();
    thread_cache::release(link);
    from_opaque(raw)
}

/// # Safety
/// `raw` must come from `P::into_raw` and be consumed only here.
pub(crate) unsafe fn from_opaque<P: LinkPayload>(raw: *mut ()) -> P {
    match NonNull::new(raw) {
        Some(raw) => P::from_raw(raw),
        None => crate::diag::critical_error("null payload on a published link", 0),
    }
}
