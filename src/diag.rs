//! Diagnostics for the lock-free core.
//!
//! Three classes of abnormal condition exist:
//! - **fatal**: the arena ran out of indices, or a non-null index resolves to
//!   an unmapped page. Both are logged and abort the process.
//! - **benign**: an ABA counter wrapped around. Logged once and counted.
//! - **debug-only**: record-state and index-range consistency checks through
//!   [`link_check!`], which compile to nothing without `debug_assertions`.
//!
//! Logging goes through `tracing` when the `tracing` feature is enabled; the
//! crate never installs a subscriber.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

macro_rules! link_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        ::tracing::trace!($($arg)*);
    }};
}

macro_rules! link_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        ::tracing::debug!($($arg)*);
    }};
}

macro_rules! link_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        ::tracing::warn!($($arg)*);
    }};
}

macro_rules! link_error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        ::tracing::error!($($arg)*);
    }};
}

/// Debug-only consistency check.
///
/// The condition is evaluated only when `debug_assertions` are enabled; a
/// failure is logged and panics.
macro_rules! link_check {
    ($cond:expr, $($arg:tt)+) => {
        if cfg!(debug_assertions) && !$cond {
            $crate::diag::check_failed(format_args!($($arg)+));
        }
    };
}

static COUNTER_OVERFLOWS: AtomicU64 = AtomicU64::new(0);
static OVERFLOW_REPORTED: AtomicBool = AtomicBool::new(false);

/// Number of ABA counter wrap-arounds observed by this process.
pub fn counter_overflows() -> u64 {
    COUNTER_OVERFLOWS.load(Ordering::Relaxed)
}

#[cold]
pub(crate) fn tag_counter_overflowed(from: u64, to: u64) {
    COUNTER_OVERFLOWS.fetch_add(1, Ordering::Relaxed);
    if !OVERFLOW_REPORTED.swap(true, Ordering::Relaxed) {
        link_warn!(from, to, "tag counter has overflowed");
    }
    let _ = (from, to);
}

#[cold]
#[track_caller]
pub(crate) fn check_failed(args: fmt::Arguments<'_>) -> ! {
    link_error!("link consistency check failed: {}", args);
    panic!("link consistency check failed: {args}");
}

#[cold]
pub(crate) fn links_exhausted(requested: u32, capacity: u32) -> ! {
    link_error!(requested, capacity, "lock-free links exhausted");
    let _ = (requested, capacity);
    std::process::abort();
}

#[cold]
pub(crate) fn critical_error(what: &str, index: u32) -> ! {
    link_error!(index, "critical lock-free list error: {}", what);
    let _ = (what, index);
    std::process::abort();
}
