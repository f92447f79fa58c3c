//! Resource and mutation descriptors.
//!
//! Each backend resource declares its cache key, staleness window and HTTP
//! request in one place; mutations declare which key prefixes they invalidate.

use chrono::Duration;
use serde_json::Value;

use crate::cache::CacheKey;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
  Delete,
}

/// A backend call, independent of the transport that performs it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: Method,
  pub path: String,
  pub query: Vec<(&'static str, String)>,
  pub body: Option<Value>,
}

impl ApiRequest {
  fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      query: Vec::new(),
      body: None,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::Get, path)
  }

  pub fn post(path: impl Into<String>) -> Self {
    Self::new(Method::Post, path)
  }

  pub fn delete(path: impl Into<String>) -> Self {
    Self::new(Method::Delete, path)
  }

  pub fn param(mut self, name: &'static str, value: impl ToString) -> Self {
    self.query.push((name, value.to_string()));
    self
  }

  /// Add a parameter only when present and not blank.
  pub fn opt_param(self, name: &'static str, value: Option<impl ToString>) -> Self {
    match value.map(|v| v.to_string()) {
      Some(v) if !v.trim().is_empty() => self.param(name, v.trim()),
      _ => self,
    }
  }

  pub fn json(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  /// Value of a query parameter, if set.
  #[allow(dead_code)]
  pub fn query_value(&self, name: &str) -> Option<&str> {
    self
      .query
      .iter()
      .find(|(k, _)| *k == name)
      .map(|(_, v)| v.as_str())
  }
}

// ============================================================================
// Analytics filters
// ============================================================================

/// Filters accepted by the analytics endpoints. Blank fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsFilters {
  pub date_from: String,
  pub date_to: String,
  pub indexador: String,
  pub asset_code: String,
}

impl AnalyticsFilters {
  pub fn is_empty(&self) -> bool {
    [&self.date_from, &self.date_to, &self.indexador, &self.asset_code]
      .iter()
      .all(|v| v.trim().is_empty())
  }

  fn extend_key(&self, key: CacheKey) -> CacheKey {
    key
      .with_opt("date_from", non_blank(&self.date_from))
      .with_opt("date_to", non_blank(&self.date_to))
      .with_opt("indexador", non_blank(&self.indexador))
      .with_opt("codigo_ativo", non_blank(&self.asset_code))
  }

  fn extend_request(&self, request: ApiRequest) -> ApiRequest {
    request
      .opt_param("date_from", non_blank(&self.date_from))
      .opt_param("date_to", non_blank(&self.date_to))
      .opt_param("indexador", non_blank(&self.indexador))
      .opt_param("codigo_ativo", non_blank(&self.asset_code))
  }
}

fn non_blank(s: &str) -> Option<&str> {
  let s = s.trim();
  (!s.is_empty()).then_some(s)
}

// ============================================================================
// Query resources
// ============================================================================

/// Cache-key prefixes, one per backend area.
pub mod prefix {
  pub const FUND_LIST: &str = "fundos";
  pub const FUND: &str = "fundo";
  pub const HISTORY: &str = "history";
  pub const ANALYTICS: &str = "analytics";
  pub const ENRICHMENT: &str = "enrichment";
}

/// Readable backend resources.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
  FundList { limit: u32, offset: u32 },
  FundDetail { fund_id: u64 },
  FileHistory { limit: u32, offset: u32 },
  FileDetails { lot_id: u64 },
  FileAnalytics { lot_id: u64 },
  Overview {
    enriched: bool,
    fund_id: Option<u64>,
    filters: AnalyticsFilters,
  },
  Indexers,
  MonthlyEvolution {
    year: Option<i32>,
    filters: AnalyticsFilters,
  },
  Assets {
    indexador: Option<String>,
    limit: u32,
    offset: u32,
  },
  EnrichmentStatus,
  EnrichedAsset { asset_id: u64 },
}

impl Resource {
  pub fn key(&self) -> CacheKey {
    use prefix::*;
    match self {
      Self::FundList { limit, offset } => CacheKey::new(FUND_LIST).with(limit).with(offset),
      Self::FundDetail { fund_id } => CacheKey::new(FUND).with(fund_id),
      Self::FileHistory { limit, offset } => CacheKey::new(HISTORY)
        .with("files")
        .with(limit)
        .with(offset),
      Self::FileDetails { lot_id } => CacheKey::new(HISTORY).with("file-details").with(lot_id),
      Self::FileAnalytics { lot_id } => CacheKey::new(HISTORY).with("file-analytics").with(lot_id),
      Self::Overview {
        enriched,
        fund_id,
        filters,
      } => filters.extend_key(
        CacheKey::new(ANALYTICS)
          .with("overview")
          .with(enriched)
          .with_opt("fundo_id", *fund_id),
      ),
      Self::Indexers => CacheKey::new(ANALYTICS).with("indexadores"),
      Self::MonthlyEvolution { year, filters } => filters.extend_key(
        CacheKey::new(ANALYTICS)
          .with("evolucao-mensal")
          .with_opt("ano", *year),
      ),
      Self::Assets {
        indexador,
        limit,
        offset,
      } => CacheKey::new(ANALYTICS)
        .with("ativos")
        .with_opt("indexador", indexador.as_deref())
        .with(limit)
        .with(offset),
      Self::EnrichmentStatus => CacheKey::new(ENRICHMENT).with("status"),
      Self::EnrichedAsset { asset_id } => CacheKey::new(ENRICHMENT).with("ativo").with(asset_id),
    }
  }

  pub fn stale_after(&self) -> Duration {
    match self {
      Self::FundList { .. } | Self::FileHistory { .. } | Self::Assets { .. } => Duration::minutes(2),
      Self::EnrichmentStatus => Duration::seconds(30),
      _ => Duration::minutes(5),
    }
  }

  pub fn request(&self) -> ApiRequest {
    match self {
      Self::FundList { limit, offset } => ApiRequest::get("/fundo/")
        .param("limit", limit)
        .param("offset", offset),
      Self::FundDetail { fund_id } => ApiRequest::get(format!("/fundo/{}", fund_id)),
      Self::FileHistory { limit, offset } => ApiRequest::get("/history/files")
        .param("limit", limit)
        .param("offset", offset),
      Self::FileDetails { lot_id } => ApiRequest::get(format!("/history/files/{}", lot_id)),
      Self::FileAnalytics { lot_id } => {
        ApiRequest::get(format!("/history/files/{}/analytics", lot_id))
      }
      Self::Overview {
        enriched,
        fund_id,
        filters,
      } => {
        let mut request = ApiRequest::get("/analytics/overview");
        if *enriched {
          request = request.param("enriched", true);
        }
        filters.extend_request(request.opt_param("fundo_id", *fund_id))
      }
      Self::Indexers => ApiRequest::get("/analytics/indexadores"),
      Self::MonthlyEvolution { year, filters } => {
        filters.extend_request(ApiRequest::get("/analytics/evolucao-mensal").opt_param("ano", *year))
      }
      Self::Assets {
        indexador,
        limit,
        offset,
      } => ApiRequest::get("/analytics/ativos")
        .opt_param("indexador", indexador.as_deref())
        .param("limit", limit)
        .param("offset", offset),
      Self::EnrichmentStatus => ApiRequest::get("/enrichment/status"),
      Self::EnrichedAsset { asset_id } => {
        ApiRequest::get(format!("/enrichment/ativos/{}/enriched", asset_id))
      }
    }
  }
}

// ============================================================================
// Mutations
// ============================================================================

/// Form field carrying the uploaded XML file.
pub const UPLOAD_FIELD: &str = "arquivo";

/// Write operations against the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
  UploadFund,
  DeleteFund { fund_id: u64 },
  EnrichAsset { asset_id: u64 },
  EnrichBulk { asset_ids: Vec<u64>, background: bool },
  EnrichPending { limit: u32, background: bool },
}

impl Mutation {
  /// Key prefixes whose entries no longer reflect the backend once this succeeds.
  pub fn invalidates(&self) -> &'static [&'static str] {
    use prefix::*;
    match self {
      Self::UploadFund | Self::DeleteFund { .. } => &[FUND_LIST, FUND, ANALYTICS, HISTORY],
      Self::EnrichAsset { .. } | Self::EnrichBulk { .. } | Self::EnrichPending { .. } => {
        &[FUND_LIST, ANALYTICS, ENRICHMENT]
      }
    }
  }

  /// Request for this mutation. Uploads carry their file as a multipart form
  /// added by the transport.
  pub fn request(&self) -> ApiRequest {
    match self {
      Self::UploadFund => ApiRequest::post("/fundo/upload"),
      Self::DeleteFund { fund_id } => ApiRequest::delete(format!("/fundo/{}", fund_id)),
      Self::EnrichAsset { asset_id } => ApiRequest::post(format!("/enrichment/enrich/{}", asset_id)),
      Self::EnrichBulk {
        asset_ids,
        background,
      } => ApiRequest::post("/enrichment/enrich/bulk").json(serde_json::json!({
        "ativo_ids": asset_ids,
        "background": background,
      })),
      Self::EnrichPending { limit, background } => {
        let request = ApiRequest::post("/enrichment/enrich/pending").param("limit", limit);
        if *background {
          request.param("background", true)
        } else {
          request
        }
      }
    }
  }
}
