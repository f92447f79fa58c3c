//! Consumer-side query handles.
//!
//! Inspired by TanStack Query, a `Query<T>` is what a view holds on to: it
//! starts fetches, tracks Idle/Loading/Success/Error for that view, and keeps
//! the last good data visible while a refetch runs or after it fails.
//!
//! The fetch itself runs on a spawned task, so a shared cache behind the
//! fetcher is populated even if the view goes away. Dropping the `Query`
//! (or calling `refetch`) drops the receiving end, and a response that
//! arrives afterwards is never applied to this handle.
//!
//! # Example
//!
//! ```ignore
//! let mut query = client.query::<OverviewResponse>(Some(resource));
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, re-render
//! }
//!
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::oneshot;

use crate::api::ApiError;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started, or is disabled
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(ApiError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query for data fetching with per-view state.
pub struct Query<T> {
  state: QueryState<T>,
  /// Last successful result, kept across refetches and failures
  last_data: Option<T>,
  fetcher: Option<FetcherFn<T>>,
  receiver: Option<oneshot::Receiver<Result<T, ApiError>>>,
}

impl<T: Clone + Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is called each time `fetch()` or `refetch()` starts a request.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Self {
      fetcher: Some(Box::new(move || Box::pin(fetcher()))),
      ..Self::disabled()
    }
  }

  /// A query with nothing to fetch (e.g. a detail view without an id yet).
  /// It stays `Idle` and never issues a request.
  pub fn disabled() -> Self {
    Self {
      state: QueryState::Idle,
      last_data: None,
      fetcher: None,
      receiver: None,
    }
  }

  #[allow(dead_code)]
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Latest data: the current result, or the last good one while loading or after an error.
  pub fn data(&self) -> Option<&T> {
    match &self.state {
      QueryState::Success(data) => Some(data),
      _ => self.last_data.as_ref(),
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    self.state.error()
  }

  /// Start fetching data if not already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch. A response still pending from an earlier fetch is ignored.
  #[allow(dead_code)]
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  #[allow(dead_code)]
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = &mut self.receiver else {
      return false;
    };

    match receiver.try_recv() {
      Ok(result) => {
        self.apply(result);
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.apply(Err(ApiError::Transport("Query was cancelled".to_string())));
        true
      }
    }
  }

  /// Wait until the pending fetch (if any) resolves.
  pub async fn settle(&mut self) -> &QueryState<T> {
    if let Some(receiver) = &mut self.receiver {
      let result = receiver
        .await
        .unwrap_or_else(|_| Err(ApiError::Transport("Query was cancelled".to_string())));
      self.apply(result);
    }
    &self.state
  }

  fn apply(&mut self, result: Result<T, ApiError>) {
    self.receiver = None;
    match result {
      Ok(data) => {
        self.last_data = Some(data.clone());
        self.state = QueryState::Success(data);
      }
      Err(error) => {
        self.state = QueryState::Error(error);
      }
    }
  }

  fn start_fetch(&mut self) {
    let Some(fetcher) = &self.fetcher else {
      return;
    };
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = fetcher();
    tokio::spawn(async move {
      let result = future.await;
      // Receiver may be gone: the view was dropped or refetched.
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
