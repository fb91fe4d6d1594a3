//! Tagged link indices: a node index and an ABA counter in one CAS-able word.
//!
//! Layout of the packed `u64`:
//!
//! ```text
//!  63                                26 25                 0
//! +------------------------------------+--------------------+
//! |       counter / state (38 bits)    |   index (26 bits)  |
//! +------------------------------------+--------------------+
//! ```
//!
//! The counter advances on every successful publish of a root, so a CAS that
//! races with a pop-push-pop of the same index still fails: the index matches
//! but the counter does not. The lowest counter bits may double as a small
//! state enum (see [`TaggedIndex::state`]); roots that do this advance the
//! counter in steps of `1 << BITS` so the state survives every update.

use core::fmt;

use crate::sync::{AtomicU64, Ordering};

/// Width of the index field.
pub const INDEX_BITS: u32 = 26;
/// Width of the counter/state field.
pub const COUNTER_BITS: u32 = u64::BITS - INDEX_BITS;

const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
const COUNTER_MASK: u64 = (1 << COUNTER_BITS) - 1;

/// Compact handle of a link record in the arena. `0` is null.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct LinkIndex(u32);

impl LinkIndex {
    /// The null index.
    pub const NULL: Self = Self(0);

    /// Wraps a raw index.
    ///
    /// # Panics
    /// Panics in debug builds if `raw` does not fit in [`INDEX_BITS`].
    #[inline]
    pub const fn new(raw: u32) -> Self {
        debug_assert!((raw as u64) <= INDEX_MASK, "link index out of range");
        Self(raw)
    }

    /// The raw index.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether this is the null index.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for LinkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("LinkIndex(null)")
        } else {
            write!(f, "LinkIndex({})", self.0)
        }
    }
}

/// A link index packed with its ABA counter.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct TaggedIndex(u64);

impl TaggedIndex {
    /// Null index, counter zero.
    pub const NULL: Self = Self(0);

    /// Packs `index` with `counter` (truncated to [`COUNTER_BITS`]).
    #[inline]
    pub const fn new(index: LinkIndex, counter: u64) -> Self {
        Self(((counter & COUNTER_MASK) << INDEX_BITS) | index.0 as u64)
    }

    /// The index component.
    #[inline]
    pub const fn index(self) -> LinkIndex {
        LinkIndex((self.0 & INDEX_MASK) as u32)
    }

    /// Same counter, different index.
    #[inline]
    pub const fn with_index(self, index: LinkIndex) -> Self {
        Self((self.0 & !INDEX_MASK) | index.0 as u64)
    }

    /// The index field as raw bits, for roots that store a bitmask there.
    #[inline]
    pub const fn bits(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// Same counter, raw `bits` in the index field.
    ///
    /// # Panics
    /// Panics in debug builds if `bits` does not fit in [`INDEX_BITS`].
    #[inline]
    pub fn with_bits(self, bits: u32) -> Self {
        link_check!(u64::from(bits) <= INDEX_MASK, "bitmask {bits:#x} wider than the index field");
        Self((self.0 & !INDEX_MASK) | (u64::from(bits) & INDEX_MASK))
    }

    /// The counter/state component.
    #[inline]
    pub const fn counter(self) -> u64 {
        self.0 >> INDEX_BITS
    }

    /// Same index, counter advanced by `increment`.
    ///
    /// Wrap-around is reported through the overflow diagnostic and otherwise
    /// accepted: with 38 bits a collision needs ~2.7e11 publishes of one root
    /// to land inside a single preempted CAS window.
    #[inline]
    pub fn advanced(self, increment: u64) -> Self {
        let from = self.counter();
        let to = from.wrapping_add(increment) & COUNTER_MASK;
        if to < from {
            crate::diag::tag_counter_overflowed(from, to);
        }
        Self::new(self.index(), to)
    }

    /// The low `BITS` bits of the counter, read as a state value.
    #[inline]
    pub const fn state<const BITS: u32>(self) -> u64 {
        self.counter() & ((1 << BITS) - 1)
    }

    /// Same index and counter, with the low `BITS` counter bits replaced by `state`.
    ///
    /// # Panics
    /// Panics in debug builds if `state` does not fit in `BITS` bits.
    #[inline]
    pub fn with_state<const BITS: u32>(self, state: u64) -> Self {
        let mask = (1u64 << BITS) - 1;
        link_check!(state <= mask, "state {state} does not fit in {BITS} bits");
        let counter = (self.counter() & !mask) | (state & mask);
        Self::new(self.index(), counter)
    }

    /// The packed word.
    #[inline]
    pub const fn into_raw(self) -> u64 {
        self.0
    }

    /// Rebuilds a value from its packed word.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for TaggedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedIndex")
            .field("index", &self.index().get())
            .field("counter", &self.counter())
            .finish()
    }
}

/// An atomic [`TaggedIndex`].
#[repr(transparent)]
pub struct AtomicTaggedIndex {
    inner: AtomicU64,
}

impl AtomicTaggedIndex {
    /// Creates a new atomic holding `value`.
    #[inline]
    pub fn new(value: TaggedIndex) -> Self {
        Self {
            inner: AtomicU64::new(value.0),
        }
    }

    /// Resets to null with a zero counter.
    ///
    /// Only valid while no other thread can observe this word.
    #[inline]
    pub fn init(&self) {
        self.inner.store(0, Ordering::Relaxed);
    }

    /// Acquire snapshot of index and counter as one unit.
    #[inline]
    pub fn load(&self) -> TaggedIndex {
        TaggedIndex(self.inner.load(Ordering::Acquire))
    }

    /// Publishes `value` without a CAS. Reserved for the current owner of
    /// the enclosing record.
    #[inline]
    pub(crate) fn store(&self, value: TaggedIndex) {
        self.inner.store(value.0, Ordering::Release);
    }

    /// Replaces `expected` with `new` if the word still equals `expected`.
    ///
    /// Returns `false` on failure; the caller must retry from a fresh
    /// [`load`](Self::load).
    #[inline]
    pub fn compare_exchange(&self, new: TaggedIndex, expected: TaggedIndex) -> bool {
        self.inner
            .compare_exchange(expected.0, new.0, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}

impl Default for AtomicTaggedIndex {
    fn default() -> Self {
        Self::new(TaggedIndex::NULL)
    }
}

impl fmt::Debug for AtomicTaggedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(), f)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack() {
        let t = TaggedIndex::new(LinkIndex::new(12345), 987_654_321);
        assert_eq!(t.index().get(), 12345);
        assert_eq!(t.counter(), 987_654_321);
        assert_eq!(TaggedIndex::from_raw(t.into_raw()), t);
    }

    #[test]
    fn advance_keeps_index() {
        let t = TaggedIndex::new(LinkIndex::new(7), 10).advanced(4);
        assert_eq!(t.index().get(), 7);
        assert_eq!(t.counter(), 14);
        let moved = t.with_index(LinkIndex::new(9));
        assert_eq!(moved.counter(), 14);
        assert_eq!(moved.index().get(), 9);
    }

    #[test]
    fn state_survives_aligned_increments() {
        let open = TaggedIndex::NULL.with_state::<1>(0);
        let closed = open.advanced(2).with_state::<1>(1);
        assert_eq!(closed.state::<1>(), 1);
        let later = closed.advanced(2).advanced(2);
        assert_eq!(later.state::<1>(), 1);
        assert_eq!(later.counter() >> 1, 3);
    }

    #[test]
    fn wraparound_is_reported_not_fatal() {
        let before = crate::diag::counter_overflows();
        let near = TaggedIndex::new(LinkIndex::new(3), COUNTER_MASK);
        let wrapped = near.advanced(1);
        assert_eq!(wrapped.counter(), 0);
        assert_eq!(wrapped.index().get(), 3);
        assert!(crate::diag::counter_overflows() > before);
    }

    #[test]
    fn stale_snapshot_loses_the_race() {
        let root = AtomicTaggedIndex::default();
        let a = LinkIndex::new(1);
        let b = LinkIndex::new(2);

        let first = root.load();
        assert!(root.compare_exchange(first.advanced(1).with_index(a), first));

        let stale = root.load();
        // Another thread moves to `b` and back to `a`.
        assert!(root.compare_exchange(stale.advanced(1).with_index(b), stale));
        let mid = root.load();
        assert!(root.compare_exchange(mid.advanced(1).with_index(a), mid));

        // Same index as the stale snapshot, different counter.
        assert_eq!(root.load().index(), stale.index());
        assert!(!root.compare_exchange(stale.advanced(1).with_index(b), stale));
    }

    #[test]
    fn bitmask_in_index_field() {
        let t = TaggedIndex::NULL.with_bits(0b1010).advanced(1);
        assert_eq!(t.bits(), 0b1010);
        assert_eq!(t.counter(), 1);
    }
}
