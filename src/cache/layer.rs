//! In-memory cache of remote fetch results.

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::entry::{CacheEntry, EntryStatus};
use super::key::CacheKey;
use crate::api::ApiError;

type FetchResult = Result<Value, ApiError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct InFlight {
  generation: u64,
  future: SharedFetch,
}

struct Slot {
  value: Option<Value>,
  error: Option<ApiError>,
  last_fetched_at: Option<DateTime<Utc>>,
  stale_after: Duration,
  invalidated: bool,
  /// Fetches with a generation at or below this were started before the
  /// last invalidation; their results never count as fresh.
  invalidated_through: u64,
  /// Generation of the newest fetch whose result was applied
  settled_generation: u64,
  inflight: Option<InFlight>,
}

impl Slot {
  fn new(stale_after: Duration) -> Self {
    Self {
      value: None,
      error: None,
      last_fetched_at: None,
      stale_after,
      invalidated: false,
      invalidated_through: 0,
      settled_generation: 0,
      inflight: None,
    }
  }

  fn is_fresh(&self, now: DateTime<Utc>) -> bool {
    if self.invalidated || self.error.is_some() || self.value.is_none() {
      return false;
    }
    self
      .last_fetched_at
      .map(|at| now - at <= self.stale_after)
      .unwrap_or(false)
  }

  fn snapshot(&self, now: DateTime<Utc>) -> CacheEntry {
    let status = if self.inflight.is_some() {
      EntryStatus::Loading
    } else if self.error.is_some() {
      EntryStatus::Error
    } else if self.value.is_none() {
      EntryStatus::Idle
    } else if self.is_fresh(now) {
      EntryStatus::Fresh
    } else {
      EntryStatus::Stale
    };

    CacheEntry {
      status,
      value: self.value.clone(),
      error: self.error.clone(),
      last_fetched_at: self.last_fetched_at,
      stale_after: self.stale_after,
    }
  }
}

#[derive(Default)]
struct CacheState {
  slots: HashMap<CacheKey, Slot>,
  next_generation: u64,
}

/// Keyed cache of asynchronous fetch results.
///
/// - `get` serves a fresh value without a network call, otherwise fetches
/// - concurrent `get`s for one key share a single in-flight fetch
/// - a failed fetch records the error and keeps the last good value
/// - a response from an older fetch never replaces a newer settled one
///
/// Clones share the same underlying state.
#[derive(Clone, Default)]
pub struct RemoteCache {
  state: Arc<Mutex<CacheState>>,
}

impl RemoteCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, CacheState> {
    // State is plain data and every critical section leaves it consistent.
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Return the value for `key`, fetching it when missing, stale or invalidated.
  pub async fn get<F, Fut>(&self, key: &CacheKey, stale_after: Duration, fetcher: F) -> FetchResult
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = FetchResult> + Send + 'static,
  {
    let (generation, future) = {
      let mut guard = self.lock();
      let state = &mut *guard;
      let slot = state
        .slots
        .entry(key.clone())
        .or_insert_with(|| Slot::new(stale_after));
      slot.stale_after = stale_after;

      if let Some(inflight) = &slot.inflight {
        debug!(%key, generation = inflight.generation, "joining in-flight fetch");
        (inflight.generation, inflight.future.clone())
      } else if let Some(value) = slot.value.as_ref().filter(|_| slot.is_fresh(Utc::now())) {
        debug!(%key, "cache hit");
        return Ok(value.clone());
      } else {
        state.next_generation += 1;
        let generation = state.next_generation;
        debug!(%key, generation, "fetching");
        let future = fetcher().boxed().shared();
        slot.inflight = Some(InFlight {
          generation,
          future: future.clone(),
        });
        (generation, future)
      }
    };

    let result = future.await;
    self.settle(key, generation, &result);
    result
  }

  fn settle(&self, key: &CacheKey, generation: u64, result: &FetchResult) {
    let mut state = self.lock();
    let Some(slot) = state.slots.get_mut(key) else {
      // Evicted while the fetch was running.
      return;
    };

    if slot
      .inflight
      .as_ref()
      .is_some_and(|f| f.generation == generation)
    {
      slot.inflight = None;
    }

    if generation <= slot.settled_generation {
      if generation < slot.settled_generation {
        warn!(%key, generation, settled = slot.settled_generation, "discarding out-of-order response");
      }
      return;
    }
    slot.settled_generation = generation;

    match result {
      Ok(value) => {
        slot.value = Some(value.clone());
        slot.error = None;
        slot.last_fetched_at = Some(Utc::now());
        slot.invalidated = generation <= slot.invalidated_through;
      }
      Err(e) => {
        warn!(%key, error = %e, "fetch failed");
        slot.error = Some(e.clone());
      }
    }
  }

  /// Snapshot of the entry for `key`; an unknown key reads as idle.
  pub fn peek(&self, key: &CacheKey) -> CacheEntry {
    let state = self.lock();
    state
      .slots
      .get(key)
      .map(|slot| slot.snapshot(Utc::now()))
      .unwrap_or_else(CacheEntry::idle)
  }

  /// Mark every entry under `prefix` stale so the next `get` refetches.
  ///
  /// Fetches already in flight for those keys are detached: their results
  /// are still recorded but stay stale. Returns the number of entries touched.
  pub fn invalidate(&self, prefix: &CacheKey) -> usize {
    let mut guard = self.lock();
    let state = &mut *guard;
    let mut count = 0;
    for (key, slot) in state.slots.iter_mut() {
      if key.starts_with(prefix) {
        slot.invalidated = true;
        slot.invalidated_through = state.next_generation;
        slot.inflight = None;
        count += 1;
      }
    }
    debug!(%prefix, count, "invalidated");
    count
  }

  /// Drop every entry under `prefix`.
  #[allow(dead_code)]
  pub fn evict(&self, prefix: &CacheKey) -> usize {
    let mut state = self.lock();
    let before = state.slots.len();
    state.slots.retain(|key, _| !key.starts_with(prefix));
    before - state.slots.len()
  }

  #[allow(dead_code)]
  pub fn len(&self) -> usize {
    self.lock().slots.len()
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn key(name: &str) -> CacheKey {
    CacheKey::new("analytics").with(name)
  }

  fn counting_fetch(
    calls: &Arc<AtomicU32>,
    value: Value,
    delay_ms: u64,
  ) -> impl FnOnce() -> BoxFuture<'static, FetchResult> {
    let calls = calls.clone();
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async move {
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        Ok(value)
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_fresh_value_served_without_fetch() {
    let cache = RemoteCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let k = key("overview");

    let first = cache
      .get(&k, Duration::minutes(5), counting_fetch(&calls, json!(1), 0))
      .await;
    let second = cache
      .get(&k, Duration::minutes(5), counting_fetch(&calls, json!(2), 0))
      .await;

    assert_eq!(first, Ok(json!(1)));
    assert_eq!(second, Ok(json!(1)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.peek(&k).status, EntryStatus::Fresh);
  }

  #[tokio::test]
  async fn test_concurrent_gets_share_one_fetch() {
    let cache = RemoteCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let k = key("overview");

    let (a, b) = tokio::join!(
      cache.get(&k, Duration::minutes(5), counting_fetch(&calls, json!("a"), 20)),
      cache.get(&k, Duration::minutes(5), counting_fetch(&calls, json!("b"), 20)),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a, Ok(json!("a")));
    assert_eq!(b, Ok(json!("a")));
  }

  #[tokio::test]
  async fn test_aged_entry_refetches() {
    let cache = RemoteCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let k = key("indexadores");

    cache
      .get(&k, Duration::zero(), counting_fetch(&calls, json!(1), 0))
      .await
      .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(cache.peek(&k).status, EntryStatus::Stale);

    let value = cache
      .get(&k, Duration::zero(), counting_fetch(&calls, json!(2), 0))
      .await;
    assert_eq!(value, Ok(json!(2)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidate_prefix_forces_refetch() {
    let cache = RemoteCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let overview = key("overview");
    let funds = CacheKey::new("fundos").with(50).with(0);

    cache
      .get(&overview, Duration::minutes(5), counting_fetch(&calls, json!(1), 0))
      .await
      .unwrap();
    cache
      .get(&funds, Duration::minutes(5), counting_fetch(&calls, json!(1), 0))
      .await
      .unwrap();

    assert_eq!(cache.invalidate(&CacheKey::new("analytics")), 1);
    assert_eq!(cache.peek(&overview).status, EntryStatus::Stale);
    assert_eq!(cache.peek(&funds).status, EntryStatus::Fresh);

    cache
      .get(&overview, Duration::minutes(5), counting_fetch(&calls, json!(2), 0))
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.peek(&overview).status, EntryStatus::Fresh);
  }

  #[tokio::test]
  async fn test_error_keeps_last_good_value() {
    let cache = RemoteCache::new();
    let k = key("overview");

    cache
      .get(&k, Duration::zero(), || async { Ok::<_, ApiError>(json!({"total": 3})) })
      .await
      .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let result = cache
      .get(&k, Duration::zero(), || async {
        Err::<Value, _>(ApiError::Transport("connection refused".to_string()))
      })
      .await;
    assert!(result.is_err());

    let entry = cache.peek(&k);
    assert_eq!(entry.status, EntryStatus::Error);
    assert_eq!(entry.value, Some(json!({"total": 3})));
    assert!(matches!(entry.error, Some(ApiError::Transport(_))));
  }

  #[tokio::test]
  async fn test_older_response_does_not_overwrite_newer() {
    let cache = RemoteCache::new();
    let k = key("overview");

    // Slow fetch started first, then detached by an invalidation.
    let slow = {
      let cache = cache.clone();
      let k = k.clone();
      tokio::spawn(async move {
        cache
          .get(&k, Duration::minutes(5), || async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok::<_, ApiError>(json!("old"))
          })
          .await
      })
    };
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    cache.invalidate(&k);

    let fast = cache
      .get(&k, Duration::minutes(5), || async { Ok::<_, ApiError>(json!("new")) })
      .await;
    assert_eq!(fast, Ok(json!("new")));

    let old = slow.await.unwrap();
    assert_eq!(old, Ok(json!("old")));

    let entry = cache.peek(&k);
    assert_eq!(entry.value, Some(json!("new")));
    assert_eq!(entry.status, EntryStatus::Fresh);
  }

  #[tokio::test]
  async fn test_unknown_key_is_idle_and_evict_removes() {
    let cache = RemoteCache::new();
    let k = key("overview");
    assert_eq!(cache.peek(&k).status, EntryStatus::Idle);

    cache
      .get(&k, Duration::minutes(5), || async { Ok::<_, ApiError>(json!(1)) })
      .await
      .unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.evict(&CacheKey::new("analytics")), 1);
    assert!(cache.is_empty());
  }
}
