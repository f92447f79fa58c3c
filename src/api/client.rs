use crate::config::Config;
use color_eyre::{eyre::eyre, Result};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::ApiError;
use super::resources::{ApiRequest, Method};

/// Header the backend uses to point at the fund that already holds a duplicate upload.
const EXISTING_FUND_HEADER: &str = "X-Fundo-Existente";

/// Something that can execute backend requests.
///
/// Implemented by [`ApiClient`] over HTTP; tests substitute in-memory fakes.
pub trait Transport: Clone + Send + Sync + 'static {
  /// Perform a JSON request and return the decoded body (`Null` when empty).
  fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value, ApiError>> + Send;

  /// Perform a multipart upload of one file under `field`.
  fn upload(
    &self,
    request: ApiRequest,
    field: &'static str,
    file_name: String,
    content: Vec<u8>,
  ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// HTTP client for the fund registry backend
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base_url = Url::parse(&config.api.base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", config.api.base_url, e))?;

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.api.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    let http = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  /// Resolve a request path and query against the base URL.
  ///
  /// Paths are appended to the base path, so a base of `http://host/api`
  /// and a path of `/fundo/` give `http://host/api/fundo/`.
  fn url(&self, request: &ApiRequest) -> Result<Url, ApiError> {
    let joined = format!(
      "{}{}",
      self.base_url.as_str().trim_end_matches('/'),
      request.path
    );
    let mut url =
      Url::parse(&joined).map_err(|e| ApiError::InvalidInput(format!("Bad URL {}: {}", joined, e)))?;
    if !request.query.is_empty() {
      let mut pairs = url.query_pairs_mut();
      for (name, value) in &request.query {
        pairs.append_pair(name, value);
      }
    }
    Ok(url)
  }

  fn builder(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder, ApiError> {
    let url = self.url(request)?;
    debug!(method = ?request.method, %url, "request");
    let builder = match request.method {
      Method::Get => self.http.get(url),
      Method::Post => self.http.post(url),
      Method::Delete => self.http.delete(url),
    };
    Ok(builder)
  }
}

/// Turn a response into JSON, or into a backend error for non-2xx statuses.
async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
  let status = response.status();
  let existing_fund = response
    .headers()
    .get(EXISTING_FUND_HEADER)
    .and_then(|v| v.to_str().ok())
    .and_then(|s| s.trim().parse().ok());
  let body = response.text().await?;

  if !status.is_success() {
    return Err(ApiError::from_response(
      status.as_u16(),
      &body,
      existing_fund,
    ));
  }
  if body.trim().is_empty() {
    return Ok(Value::Null);
  }
  Ok(serde_json::from_str(&body)?)
}

impl Transport for ApiClient {
  fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value, ApiError>> + Send {
    let client = self.clone();
    async move {
      let mut builder = client.builder(&request)?;
      if let Some(body) = &request.body {
        builder = builder.json(body);
      }
      let response = builder.send().await?;
      read_json(response).await
    }
  }

  fn upload(
    &self,
    request: ApiRequest,
    field: &'static str,
    file_name: String,
    content: Vec<u8>,
  ) -> impl Future<Output = Result<Value, ApiError>> + Send {
    let client = self.clone();
    async move {
      let part = Part::bytes(content)
        .file_name(file_name)
        .mime_str("application/xml")?;
      let form = Form::new().part(field, part);
      let response = client.builder(&request)?.multipart(form).send().await?;
      read_json(response).await
    }
  }
}
