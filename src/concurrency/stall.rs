//! Synthetic stalls at race-sensitive points.
//!
//! The list algorithms call [`test_critical_stall`] between reading a root and
//! publishing a CAS against it. When the knob is on, a small fraction of those
//! calls sleep or yield, widening the race windows so livelock and lost-update
//! bugs surface in stress runs. The knob has no effect in builds without
//! `debug_assertions`.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

static ENABLED: AtomicBool = AtomicBool::new(false);
static SEED: AtomicU64 = AtomicU64::new(0x9E37_79B9_7F4A_7C15);

thread_local! {
    static RNG: Cell<u64> = Cell::new(SEED.fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::Relaxed) | 1);
}

/// Turns synthetic stalls on or off for the whole process.
pub fn set_test_critical_stall(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether synthetic stalls are currently requested.
pub fn test_critical_stall_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Possibly stalls the calling thread. Called at critical points only.
#[inline]
pub fn test_critical_stall() {
    if cfg!(debug_assertions) && ENABLED.load(Ordering::Relaxed) {
        stall();
    }
}

#[cold]
fn stall() {
    let roll = RNG
        .try_with(|rng| {
            // xorshift64*
            let mut x = rng.get();
            x ^= x >> 12;
            x ^= x << 25;
            x ^= x >> 27;
            rng.set(x);
            x.wrapping_mul(0x2545_F491_4F6C_DD1D) % 1000
        })
        .unwrap_or(999);

    if roll == 0 {
        std::thread::sleep(Duration::from_millis(1));
    } else if roll < 10 {
        std::thread::yield_now();
    }
}
