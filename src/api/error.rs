//! Error taxonomy for calls against the fund registry backend.

use serde::Deserialize;
use thiserror::Error;

/// Failure of a single backend call.
///
/// `Clone` so that one failed fetch can be handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// No usable response: connection refused, timeout, TLS failure, ...
  #[error("Could not reach the server: {0}")]
  Transport(String),

  /// The backend answered but reported a failure.
  #[error("Server returned {status}: {message}")]
  Backend {
    status: u16,
    message: String,
    /// Id of the fund that already holds this file (duplicate uploads only)
    existing_fund: Option<u64>,
  },

  /// The response body did not have the expected shape.
  #[error("Unexpected response from server: {0}")]
  Decode(String),

  /// A client-side precondition failed before anything was sent.
  #[error("{0}")]
  InvalidInput(String),
}

impl ApiError {
  /// Text suitable for an acknowledgment shown to the user.
  pub fn user_message(&self) -> String {
    match self {
      ApiError::Backend { message, .. } if !message.is_empty() => message.clone(),
      other => other.to_string(),
    }
  }

  /// True when the backend rejected an upload because the file was already processed.
  pub fn is_duplicate(&self) -> bool {
    matches!(self, ApiError::Backend { status: 409, .. })
  }

  /// Build a backend error from a non-success status and its raw body.
  ///
  /// FastAPI wraps messages as `{"detail": "..."}`; anything else is shown verbatim.
  pub fn from_response(status: u16, body: &str, existing_fund: Option<u64>) -> Self {
    let message = serde_json::from_str::<ErrorBody>(body)
      .ok()
      .and_then(|b| b.detail)
      .map(|d| match d {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
      })
      .unwrap_or_else(|| body.trim().to_string());

    ApiError::Backend {
      status,
      message,
      existing_fund,
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      ApiError::Decode(e.to_string())
    } else {
      ApiError::Transport(e.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(e: serde_json::Error) -> Self {
    ApiError::Decode(e.to_string())
  }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  detail: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_detail_is_extracted() {
    let err = ApiError::from_response(400, r#"{"detail": "Apenas arquivos XML são aceitos"}"#, None);
    assert_eq!(err.user_message(), "Apenas arquivos XML são aceitos");
    assert!(!err.is_duplicate());
  }

  #[test]
  fn test_plain_body_is_kept() {
    let err = ApiError::from_response(502, "  Bad Gateway \n", None);
    assert_eq!(err.user_message(), "Bad Gateway");
  }

  #[test]
  fn test_conflict_is_duplicate() {
    let err = ApiError::from_response(409, r#"{"detail": "Arquivo já processado"}"#, Some(7));
    assert!(err.is_duplicate());
    assert!(matches!(
      err,
      ApiError::Backend {
        existing_fund: Some(7),
        ..
      }
    ));
  }

  #[test]
  fn test_transport_message() {
    let err = ApiError::Transport("connection refused".to_string());
    assert_eq!(
      err.user_message(),
      "Could not reach the server: connection refused"
    );
  }
}
