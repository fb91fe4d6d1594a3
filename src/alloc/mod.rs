//! Link storage: the paged arena, the process-wide allocator and the
//! per-thread link cache.

pub mod arena;
pub mod global;
pub mod stats;
pub mod thread_cache;

pub use arena::{LinkArena, LinkRecord, LINKS_PER_PAGE, MAX_LINKS};
pub use global::LinkAllocator;
pub use stats::ArenaStats;
pub use thread_cache::{acquire_link, cached_links, release_link, BUNDLE_SIZE};
