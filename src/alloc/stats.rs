//! Serializable arena counters.

use serde::{Deserialize, Serialize};

/// Point-in-time counters of a [`LinkArena`](crate::alloc::LinkArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStats {
    /// Hard capacity, index 0 included.
    pub capacity: u32,
    /// Links handed out by the bump allocator.
    pub reserved_links: u32,
    /// Pages currently mapped.
    pub pages_allocated: u32,
    /// Records per page.
    pub links_per_page: u32,
    /// ABA counter wrap-arounds observed process-wide.
    pub counter_overflows: u64,
}

impl ArenaStats {
    /// Fraction of the index space handed out.
    pub fn utilization(&self) -> f64 {
        f64::from(self.reserved_links) / f64::from(self.capacity)
    }
}
