//! Backend client with transparent caching for reads and cache
//! invalidation after writes.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::cache::{CacheEntry, CacheKey, RemoteCache};
use crate::query::Query;

use super::api_types::{
  decode, BulkEnrichmentResponse, DeleteFundResponse, EnrichedAssetResponse, EnrichmentResult,
  EnrichmentStatus, FileAnalyticsResponse, FileDetailsResponse, FileHistoryResponse, FundDetail,
  FundListResponse, IndexersResponse, MonthlyEvolutionResponse, OverviewResponse,
  UploadFundResponse, AssetsResponse,
};
use super::client::{ApiClient, Transport};
use super::error::ApiError;
use super::resources::{AnalyticsFilters, Mutation, Resource, UPLOAD_FIELD};

/// Fund registry client.
///
/// Reads go through a shared [`RemoteCache`]; writes go straight to the
/// backend and, on success, invalidate the key prefixes they affect.
/// There is no linkage beyond that: if invalidation never runs, cached reads
/// stay stale until their window expires.
#[derive(Clone)]
pub struct FundClient<T: Transport = ApiClient> {
  inner: T,
  cache: RemoteCache,
}

impl<T: Transport> FundClient<T> {
  pub fn new(inner: T, cache: RemoteCache) -> Self {
    Self { inner, cache }
  }

  // ==========================================================================
  // Generic bindings
  // ==========================================================================

  /// Fetch a resource through the cache.
  pub async fn read_value(&self, resource: &Resource) -> Result<Value, ApiError> {
    let request = resource.request();
    self
      .cache
      .get(&resource.key(), resource.stale_after(), || {
        let inner = self.inner.clone();
        async move { inner.send(request).await }
      })
      .await
  }

  /// Fetch and decode a resource through the cache.
  pub async fn read<D: DeserializeOwned>(&self, resource: &Resource) -> Result<D, ApiError> {
    decode(self.read_value(resource).await?)
  }

  /// Fetch a resource that needs an id; `None` means inactive, no request.
  async fn read_optional<D: DeserializeOwned>(
    &self,
    resource: Option<Resource>,
  ) -> Result<Option<D>, ApiError> {
    match resource {
      Some(r) => self.read(&r).await.map(Some),
      None => Ok(None),
    }
  }

  /// Current cache entry for a resource; inactive resources read as idle.
  #[allow(dead_code)]
  pub fn entry(&self, resource: Option<&Resource>) -> CacheEntry {
    resource
      .map(|r| self.cache.peek(&r.key()))
      .unwrap_or_else(CacheEntry::idle)
  }

  /// Build a consumer-side query handle for a resource.
  pub fn query<D>(&self, resource: Option<Resource>) -> Query<D>
  where
    D: DeserializeOwned + Clone + Send + 'static,
  {
    match resource {
      Some(resource) => {
        let client = self.clone();
        Query::new(move || {
          let client = client.clone();
          let resource = resource.clone();
          async move { client.read::<D>(&resource).await }
        })
      }
      None => Query::disabled(),
    }
  }

  fn invalidate_after(&self, mutation: &Mutation) {
    for prefix in mutation.invalidates() {
      self.cache.invalidate(&CacheKey::new(prefix));
    }
  }

  /// Run a mutation request, invalidating dependent keys on success.
  async fn mutate<D: DeserializeOwned>(&self, mutation: Mutation) -> Result<D, ApiError> {
    let value = self.inner.send(mutation.request()).await?;
    self.invalidate_after(&mutation);
    info!(?mutation, "mutation applied");
    decode(value)
  }

  // ==========================================================================
  // Funds
  // ==========================================================================

  pub async fn fund_list(&self, limit: u32, offset: u32) -> Result<FundListResponse, ApiError> {
    self.read(&Resource::FundList { limit, offset }).await
  }

  pub async fn fund_detail(&self, fund_id: Option<u64>) -> Result<Option<FundDetail>, ApiError> {
    self
      .read_optional(fund_id.map(|fund_id| Resource::FundDetail { fund_id }))
      .await
  }

  /// Upload one XML file as a new fund.
  ///
  /// Returns the backend's answer, which may itself flag a duplicate.
  pub async fn upload_fund(
    &self,
    file_name: &str,
    content: Vec<u8>,
  ) -> Result<UploadFundResponse, ApiError> {
    let mutation = Mutation::UploadFund;
    let value = self
      .inner
      .upload(mutation.request(), UPLOAD_FIELD, file_name.to_string(), content)
      .await?;
    let response: UploadFundResponse = decode(value)?;
    if response.sucesso && !response.arquivo_duplicado {
      self.invalidate_after(&mutation);
    }
    info!(file_name, fund_id = ?response.fundo_id, duplicate = response.arquivo_duplicado, "upload finished");
    Ok(response)
  }

  pub async fn delete_fund(&self, fund_id: u64) -> Result<DeleteFundResponse, ApiError> {
    self.mutate(Mutation::DeleteFund { fund_id }).await
  }

  // ==========================================================================
  // History
  // ==========================================================================

  pub async fn file_history(&self, limit: u32, offset: u32) -> Result<FileHistoryResponse, ApiError> {
    self.read(&Resource::FileHistory { limit, offset }).await
  }

  pub async fn file_details(
    &self,
    lot_id: Option<u64>,
  ) -> Result<Option<FileDetailsResponse>, ApiError> {
    self
      .read_optional(lot_id.map(|lot_id| Resource::FileDetails { lot_id }))
      .await
  }

  pub async fn file_analytics(
    &self,
    lot_id: Option<u64>,
  ) -> Result<Option<FileAnalyticsResponse>, ApiError> {
    self
      .read_optional(lot_id.map(|lot_id| Resource::FileAnalytics { lot_id }))
      .await
  }

  // ==========================================================================
  // Analytics
  // ==========================================================================

  pub async fn overview(
    &self,
    enriched: bool,
    fund_id: Option<u64>,
    filters: &AnalyticsFilters,
  ) -> Result<OverviewResponse, ApiError> {
    self
      .read(&Resource::Overview {
        enriched,
        fund_id,
        filters: filters.clone(),
      })
      .await
  }

  pub async fn indexers(&self) -> Result<IndexersResponse, ApiError> {
    self.read(&Resource::Indexers).await
  }

  pub async fn monthly_evolution(
    &self,
    year: Option<i32>,
    filters: &AnalyticsFilters,
  ) -> Result<MonthlyEvolutionResponse, ApiError> {
    self
      .read(&Resource::MonthlyEvolution {
        year,
        filters: filters.clone(),
      })
      .await
  }

  pub async fn assets(
    &self,
    indexador: Option<String>,
    limit: u32,
    offset: u32,
  ) -> Result<AssetsResponse, ApiError> {
    self
      .read(&Resource::Assets {
        indexador,
        limit,
        offset,
      })
      .await
  }

  // ==========================================================================
  // Enrichment
  // ==========================================================================

  pub async fn enrichment_status(&self) -> Result<EnrichmentStatus, ApiError> {
    self.read(&Resource::EnrichmentStatus).await
  }

  pub async fn enriched_asset(
    &self,
    asset_id: Option<u64>,
  ) -> Result<Option<EnrichedAssetResponse>, ApiError> {
    self
      .read_optional(asset_id.map(|asset_id| Resource::EnrichedAsset { asset_id }))
      .await
  }

  pub async fn enrich_asset(&self, asset_id: u64) -> Result<EnrichmentResult, ApiError> {
    self.mutate(Mutation::EnrichAsset { asset_id }).await
  }

  pub async fn enrich_bulk(
    &self,
    asset_ids: Vec<u64>,
    background: bool,
  ) -> Result<BulkEnrichmentResponse, ApiError> {
    self
      .mutate(Mutation::EnrichBulk {
        asset_ids,
        background,
      })
      .await
  }

  pub async fn enrich_pending(
    &self,
    limit: u32,
    background: bool,
  ) -> Result<BulkEnrichmentResponse, ApiError> {
    self
      .mutate(Mutation::EnrichPending { limit, background })
      .await
  }
}

#[cfg(test)]
pub(crate) mod testing {
  //! In-memory transport for exercising the client and workflows.

  use super::*;
  use crate::api::resources::{ApiRequest, Method};
  use std::collections::HashMap;
  use std::future::Future;
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  type Reply = Result<Value, ApiError>;

  /// Fake backend: canned replies by path, with a log of every request.
  #[derive(Clone, Default)]
  pub struct FakeTransport {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    log: Arc<Mutex<Vec<ApiRequest>>>,
    delay: Option<Duration>,
  }

  impl FakeTransport {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
      self.delay = Some(delay);
      self
    }

    pub fn reply(&self, path: &str, reply: Reply) {
      self
        .replies
        .lock()
        .unwrap()
        .insert(path.to_string(), reply);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
      self.log.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
      self
        .log
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.path == path)
        .count()
    }

    fn respond(&self, request: ApiRequest) -> impl Future<Output = Reply> + Send {
      let reply = self
        .replies
        .lock()
        .unwrap()
        .get(&request.path)
        .cloned()
        .unwrap_or_else(|| {
          Err(ApiError::Backend {
            status: 404,
            message: format!("no reply for {}", request.path),
            existing_fund: None,
          })
        });
      self.log.lock().unwrap().push(request);
      let delay = self.delay;
      async move {
        if let Some(d) = delay {
          tokio::time::sleep(d).await;
        }
        reply
      }
    }
  }

  impl Transport for FakeTransport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Reply> + Send {
      self.respond(request)
    }

    fn upload(
      &self,
      request: ApiRequest,
      _field: &'static str,
      _file_name: String,
      _content: Vec<u8>,
    ) -> impl Future<Output = Reply> + Send {
      assert_eq!(request.method, Method::Post);
      self.respond(request)
    }
  }

  pub fn client(transport: &FakeTransport) -> FundClient<FakeTransport> {
    FundClient::new(transport.clone(), RemoteCache::new())
  }
}
