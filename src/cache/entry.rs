//! Read-only snapshots of cache slots.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::{decode, ApiError};

/// Lifecycle status of a cached resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
  /// Never fetched, or the resource is inactive
  Idle,
  /// A fetch is in flight; `value` may still hold the previous result
  Loading,
  /// Value is within its staleness window
  Fresh,
  /// Value is older than its window or was invalidated
  Stale,
  /// The last fetch failed; `value` holds the last known good result, if any
  Error,
}

/// Snapshot of one cache entry as seen by a consumer.
///
/// Entries are copies; mutating one never touches the cache.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub status: EntryStatus,
  pub value: Option<Value>,
  pub error: Option<ApiError>,
  pub last_fetched_at: Option<DateTime<Utc>>,
  pub stale_after: Duration,
}

impl CacheEntry {
  /// Entry for a resource that has not been fetched (or cannot be, e.g. no id yet).
  pub fn idle() -> Self {
    Self {
      status: EntryStatus::Idle,
      value: None,
      error: None,
      last_fetched_at: None,
      stale_after: Duration::zero(),
    }
  }

  #[allow(dead_code)]
  pub fn is_loading(&self) -> bool {
    self.status == EntryStatus::Loading
  }

  /// Decode the cached value into a typed payload.
  #[allow(dead_code)]
  pub fn data<T: DeserializeOwned>(&self) -> Option<Result<T, ApiError>> {
    self.value.clone().map(decode)
  }
}
