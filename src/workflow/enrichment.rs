//! Enrichment mode toggle.
//!
//! Switching on runs the "enrich pending" mutation first and only commits
//! the mode once it succeeds. Switching off is local.

use tracing::{info, warn};

use super::notifications::NotificationCenter;
use super::Rejected;
use crate::api::{ApiError, BulkEnrichmentResponse, FundClient, Transport};

/// Default number of pending assets enriched per toggle.
pub const DEFAULT_PENDING_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnrichmentMode {
  #[default]
  Normal,
  Enriched,
}

impl EnrichmentMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Normal => "normal",
      Self::Enriched => "enriched",
    }
  }
}

#[derive(Debug)]
pub struct EnrichmentToggle {
  mode: EnrichmentMode,
  in_flight: bool,
  limit: u32,
}

impl Default for EnrichmentToggle {
  fn default() -> Self {
    Self::new(DEFAULT_PENDING_LIMIT)
  }
}

impl EnrichmentToggle {
  pub fn new(limit: u32) -> Self {
    Self {
      mode: EnrichmentMode::Normal,
      in_flight: false,
      limit,
    }
  }

  pub fn mode(&self) -> EnrichmentMode {
    self.mode
  }

  pub fn is_enriched(&self) -> bool {
    self.mode == EnrichmentMode::Enriched
  }

  #[allow(dead_code)]
  pub fn in_flight(&self) -> bool {
    self.in_flight
  }

  /// Start switching on. Returns the pending-asset limit to request.
  pub fn begin_enable(&mut self) -> Result<u32, Rejected> {
    if self.in_flight {
      return Err(Rejected::InFlight);
    }
    self.in_flight = true;
    Ok(self.limit)
  }

  /// Finish switching on with the enrichment outcome.
  pub fn finish_enable(
    &mut self,
    result: Result<BulkEnrichmentResponse, ApiError>,
    notifications: &mut NotificationCenter,
  ) -> EnrichmentMode {
    self.in_flight = false;
    match result {
      Ok(resp) => {
        self.mode = EnrichmentMode::Enriched;
        let message = if resp.background {
          resp
            .message
            .unwrap_or_else(|| "Enrichment started in background".to_string())
        } else {
          format!("Enriched {} assets", resp.enriquecidos)
        };
        info!(enriched = resp.enriquecidos, failed = resp.falhas, "enrichment mode on");
        notifications.success(message);
      }
      Err(e) => {
        warn!(error = %e, "enrichment failed, staying in normal mode");
        notifications.error(format!("Enrichment failed: {}", e.user_message()));
      }
    }
    self.mode
  }

  /// Switch off. No request is made.
  pub fn disable(&mut self) -> Result<EnrichmentMode, Rejected> {
    if self.in_flight {
      return Err(Rejected::InFlight);
    }
    self.mode = EnrichmentMode::Normal;
    Ok(self.mode)
  }

  /// Flip the toggle, waiting for the enrichment request when switching on.
  pub async fn toggle<T: Transport>(
    &mut self,
    client: &FundClient<T>,
    notifications: &mut NotificationCenter,
  ) -> Result<EnrichmentMode, Rejected> {
    if self.is_enriched() {
      return self.disable();
    }
    let limit = self.begin_enable()?;
    let result = client.enrich_pending(limit, false).await;
    Ok(self.finish_enable(result, notifications))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::cached_client::testing::{client, FakeTransport};
  use crate::workflow::NotificationKind;
  use chrono::Utc;
  use serde_json::json;

  #[tokio::test]
  async fn test_toggle_on_success() {
    let transport = FakeTransport::new();
    transport.reply(
      "/enrichment/enrich/pending",
      Ok(json!({"total": 3, "enriquecidos": 3, "falhas": 0})),
    );
    let client = client(&transport);
    let mut notes = NotificationCenter::new();
    let mut toggle = EnrichmentToggle::new(25);

    let mode = toggle.toggle(&client, &mut notes).await.unwrap();
    assert_eq!(mode, EnrichmentMode::Enriched);
    assert!(!toggle.in_flight());
    assert_eq!(notes.count(NotificationKind::Success), 1);
    assert_eq!(notes.take_active(Utc::now())[0].message, "Enriched 3 assets");

    let sent = &transport.requests()[0];
    assert_eq!(sent.query_value("limit"), Some("25"));
  }

  #[tokio::test]
  async fn test_toggle_on_failure_stays_normal() {
    let transport = FakeTransport::new();
    transport.reply(
      "/enrichment/enrich/pending",
      Err(ApiError::Transport("timeout".to_string())),
    );
    let client = client(&transport);
    let mut notes = NotificationCenter::new();
    let mut toggle = EnrichmentToggle::default();

    let mode = toggle.toggle(&client, &mut notes).await.unwrap();
    assert_eq!(mode, EnrichmentMode::Normal);
    assert_eq!(notes.count(NotificationKind::Error), 1);
    assert_eq!(notes.len(), 1);
  }

  #[tokio::test]
  async fn test_toggle_off_is_local() {
    let transport = FakeTransport::new();
    transport.reply("/enrichment/enrich/pending", Ok(json!({"enriquecidos": 0})));
    let client = client(&transport);
    let mut notes = NotificationCenter::new();
    let mut toggle = EnrichmentToggle::default();

    toggle.toggle(&client, &mut notes).await.unwrap();
    let mode = toggle.toggle(&client, &mut notes).await.unwrap();
    assert_eq!(mode, EnrichmentMode::Normal);
    assert_eq!(transport.requests().len(), 1);
  }

  #[test]
  fn test_reentrant_toggle_rejected() {
    let mut toggle = EnrichmentToggle::default();
    let mut notes = NotificationCenter::new();

    assert_eq!(toggle.begin_enable(), Ok(DEFAULT_PENDING_LIMIT));
    assert_eq!(toggle.begin_enable(), Err(Rejected::InFlight));
    assert_eq!(toggle.disable(), Err(Rejected::InFlight));
    assert_eq!(toggle.mode(), EnrichmentMode::Normal);

    toggle.finish_enable(
      Ok(BulkEnrichmentResponse {
        background: true,
        ..Default::default()
      }),
      &mut notes,
    );
    assert!(toggle.is_enriched());
    assert_eq!(notes.take_active(Utc::now())[0].message, "Enrichment started in background");
  }
}
