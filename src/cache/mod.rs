//! Remote data cache.
//!
//! Process-lifetime, in-memory cache for backend responses:
//! - Entries are keyed by resource name + resolved parameters
//! - Each entry has its own staleness window
//! - Prefix invalidation after writes
//! - At most one fetch in flight per key
//! - Stale-while-error: failures keep the last good value

mod entry;
mod key;
mod layer;

pub use entry::{CacheEntry, EntryStatus};
pub use key::CacheKey;
pub use layer::RemoteCache;
