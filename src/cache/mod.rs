//! Response cache for AI pipeline results.

mod entry;
mod hash;
mod store;

pub use entry::CacheEntry;
pub use hash::{cache_key, compute_hash};
pub use store::{CACHE_PREFIX, CacheStats, DEFAULT_TTL, ResponseCache};
