//! Deferred link effects for transactional regions.
//!
//! A region opened with [`transact`] (and nested with
//! [`Transaction::nested`]) attaches a pending-effects frame to the current
//! thread. While a frame is open, the thread cache does not apply link
//! operations blindly:
//!
//! - [`acquire_link`](crate::alloc::acquire_link) still hands out a link but
//!   records it; if the region aborts, the link is reset and returned to the
//!   cache.
//! - [`release_link`](crate::alloc::release_link) is recorded and only
//!   replayed when the outermost region commits; an abort drops it.
//!
//! Committing a nested region folds its effects and hooks into the parent;
//! only the outermost commit applies them. A region aborts when its closure
//! returns `Err` or panics.
//!
//! Container operations are not transactional by themselves. Defer them as
//! commands with [`Transaction::on_commit`]:
//!
//! ```
//! use linkage::{concurrency::transaction::transact, LockFreeStack};
//!
//! let stack = LockFreeStack::new();
//! let result: Result<(), &str> = transact(|tx| {
//!     tx.on_commit(|| stack.push(Box::new(7)));
//!     Err("rolled back")
//! });
//! assert!(result.is_err());
//! assert!(stack.pop().is_none());
//! ```

use core::cell::RefCell;
use core::marker::PhantomData;

use crate::alloc::arena::LinkArena;
use crate::alloc::thread_cache;
use crate::concurrency::tagged::LinkIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkEffect {
    Acquired(LinkIndex),
    Released(LinkIndex),
}

thread_local! {
    static FRAMES: RefCell<Vec<Vec<LinkEffect>>> = const { RefCell::new(Vec::new()) };
}

/// Whether the current thread is inside a transactional region.
pub fn in_transaction() -> bool {
    FRAMES
        .try_with(|frames| !frames.borrow().is_empty())
        .unwrap_or(false)
}

pub(crate) fn record_acquire(link: LinkIndex) {
    let _ = FRAMES.try_with(|frames| {
        if let Some(top) = frames.borrow_mut().last_mut() {
            top.push(LinkEffect::Acquired(link));
        }
    });
}

/// Returns `true` if the release was deferred to the enclosing region.
pub(crate) fn defer_release(link: LinkIndex) -> bool {
    FRAMES
        .try_with(|frames| match frames.borrow_mut().last_mut() {
            Some(top) => {
                top.push(LinkEffect::Released(link));
                true
            }
            None => false,
        })
        .unwrap_or(false)
}

type Hook<'s> = Box<dyn FnOnce() + 's>;

/// Handle to an open transactional region on the current thread.
pub struct Transaction<'s> {
    depth: usize,
    on_commit: Vec<Hook<'s>>,
    on_abort: Vec<Hook<'s>>,
    finished: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'s> Transaction<'s> {
    fn open(depth: usize) -> Self {
        Self {
            depth,
            on_commit: Vec::new(),
            on_abort: Vec::new(),
            finished: false,
            _not_send: PhantomData,
        }
    }

    /// Nesting depth; the outermost region is 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Runs `f` after the outermost region commits.
    pub fn on_commit<F>(&mut self, f: F)
    where
        F: FnOnce() + 's,
    {
        self.on_commit.push(Box::new(f));
    }

    /// Runs `f` if this region, or an enclosing one it committed into, aborts.
    /// Abort hooks run newest first.
    pub fn on_abort<F>(&mut self, f: F)
    where
        F: FnOnce() + 's,
    {
        self.on_abort.push(Box::new(f));
    }

    /// Runs `f` in a nested region. On `Ok` its effects and hooks join this
    /// region; on `Err` (or panic) only the nested region is rolled back.
    ///
    /// # Errors
    /// Returns the error produced by `f`.
    pub fn nested<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Transaction<'s>) -> Result<R, E>,
    {
        let mut child = Transaction::open(self.depth + 1);
        let frame = Frame::push();
        match f(&mut child) {
            Ok(value) => {
                let effects = frame.close();
                let _ = FRAMES.try_with(|frames| {
                    if let Some(parent) = frames.borrow_mut().last_mut() {
                        parent.extend(effects);
                    }
                });
                self.on_commit.append(&mut child.on_commit);
                self.on_abort.append(&mut child.on_abort);
                child.finished = true;
                Ok(value)
            }
            Err(err) => {
                invert(frame.close());
                child.abort();
                Err(err)
            }
        }
    }

    fn commit(mut self) {
        self.finished = true;
        for hook in self.on_commit.drain(..) {
            hook();
        }
    }

    fn abort(&mut self) {
        self.finished = true;
        while let Some(hook) = self.on_abort.pop() {
            hook();
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.abort();
        }
    }
}

/// Runs `f` in a transactional region on the current thread.
///
/// On `Ok`, deferred link releases are applied and commit hooks run, in that
/// order. On `Err` or panic, links acquired in the region go back to the
/// cache, deferred releases are dropped and abort hooks run.
///
/// # Errors
/// Returns the error produced by `f`.
pub fn transact<'s, R, E, F>(f: F) -> Result<R, E>
where
    F: FnOnce(&mut Transaction<'s>) -> Result<R, E>,
{
    let mut tx = Transaction::open(1);
    let frame = Frame::push();
    match f(&mut tx) {
        Ok(value) => {
            apply(frame.close());
            tx.commit();
            Ok(value)
        }
        Err(err) => {
            invert(frame.close());
            tx.abort();
            Err(err)
        }
    }
}

/// The current thread's pending-effects frame; rolled back if dropped open.
struct Frame {
    open: bool,
}

impl Frame {
    fn push() -> Self {
        FRAMES.with(|frames| frames.borrow_mut().push(Vec::new()));
        Self { open: true }
    }

    fn close(mut self) -> Vec<LinkEffect> {
        self.open = false;
        pop_frame()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if self.open {
            invert(pop_frame());
        }
    }
}

fn pop_frame() -> Vec<LinkEffect> {
    FRAMES
        .try_with(|frames| frames.borrow_mut().pop())
        .ok()
        .flatten()
        .unwrap_or_default()
}

fn apply(effects: Vec<LinkEffect>) {
    for effect in effects {
        if let LinkEffect::Released(link) = effect {
            thread_cache::release(link);
        }
    }
}

fn invert(effects: Vec<LinkEffect>) {
    if effects.is_empty() {
        return;
    }
    let arena = LinkArena::global();
    for effect in effects.into_iter().rev() {
        if let LinkEffect::Acquired(link) = effect {
            arena.item(link).reset(1);
            thread_cache::release(link);
        }
    }
}
