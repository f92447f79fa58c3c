//! Draft/applied analytics filters.
//!
//! Edits only touch the draft. Queries are always built from the applied
//! set, which changes only on an explicit apply or clear.

use tracing::info;

use crate::api::{AnalyticsFilters, Resource};

/// One editable filter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
  DateFrom,
  DateTo,
  Indexador,
  Asset,
}

impl FilterField {
  pub const ALL: [FilterField; 4] = [
    FilterField::DateFrom,
    FilterField::DateTo,
    FilterField::Indexador,
    FilterField::Asset,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      FilterField::DateFrom => "Date from",
      FilterField::DateTo => "Date to",
      FilterField::Indexador => "Indexer",
      FilterField::Asset => "Asset code",
    }
  }

  pub fn value<'a>(&self, filters: &'a AnalyticsFilters) -> &'a str {
    match self {
      FilterField::DateFrom => &filters.date_from,
      FilterField::DateTo => &filters.date_to,
      FilterField::Indexador => &filters.indexador,
      FilterField::Asset => &filters.asset_code,
    }
  }

  fn get_mut<'a>(&self, filters: &'a mut AnalyticsFilters) -> &'a mut String {
    match self {
      FilterField::DateFrom => &mut filters.date_from,
      FilterField::DateTo => &mut filters.date_to,
      FilterField::Indexador => &mut filters.indexador,
      FilterField::Asset => &mut filters.asset_code,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct FilterController {
  draft: AnalyticsFilters,
  applied: AnalyticsFilters,
}

impl FilterController {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn draft(&self) -> &AnalyticsFilters {
    &self.draft
  }

  pub fn applied(&self) -> &AnalyticsFilters {
    &self.applied
  }

  pub fn edit(&mut self, field: FilterField, value: impl Into<String>) {
    *field.get_mut(&mut self.draft) = value.into();
  }

  /// Commit the draft. Returns true when the applied filters changed,
  /// i.e. dependent queries will see new parameters.
  pub fn apply(&mut self) -> bool {
    if !self.has_pending() {
      return false;
    }
    self.applied = self.draft.clone();
    info!(filters = ?self.applied, "filters applied");
    true
  }

  /// Reset draft and applied filters to empty.
  pub fn clear(&mut self) -> bool {
    let changed = !self.applied.is_empty();
    self.draft = AnalyticsFilters::default();
    self.applied = AnalyticsFilters::default();
    changed
  }

  /// Fields whose draft value has not been applied yet. Surrounding
  /// whitespace is ignored, as it is when building requests.
  pub fn pending_fields(&self) -> Vec<FilterField> {
    FilterField::ALL
      .into_iter()
      .filter(|f| f.value(&self.draft).trim() != f.value(&self.applied).trim())
      .collect()
  }

  pub fn has_pending(&self) -> bool {
    !self.pending_fields().is_empty()
  }

  /// Overview resource for the applied filters.
  pub fn overview(&self, enriched: bool, fund_id: Option<u64>) -> Resource {
    Resource::Overview {
      enriched,
      fund_id,
      filters: self.applied.clone(),
    }
  }

  /// Monthly evolution resource for the applied filters.
  pub fn monthly_evolution(&self, year: Option<i32>) -> Resource {
    Resource::MonthlyEvolution {
      year,
      filters: self.applied.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::cached_client::testing::{client, FakeTransport};
  use serde_json::json;

  #[test]
  fn test_edits_stay_in_draft() {
    let mut filters = FilterController::new();
    filters.edit(FilterField::Indexador, "DI1");

    assert_eq!(filters.draft().indexador, "DI1");
    assert!(filters.applied().is_empty());
    assert_eq!(filters.pending_fields(), vec![FilterField::Indexador]);

    let request = filters.overview(false, None).request();
    assert_eq!(request.query_value("indexador"), None);
  }

  #[test]
  fn test_apply_then_edit_keeps_applied() {
    let mut filters = FilterController::new();
    filters.edit(FilterField::Indexador, "DI1");
    assert!(filters.apply());
    assert!(!filters.has_pending());
    assert!(!filters.apply());

    filters.edit(FilterField::Indexador, "PRE");
    assert_eq!(filters.pending_fields(), vec![FilterField::Indexador]);
    assert_eq!(
      filters.monthly_evolution(None).request().query_value("indexador"),
      Some("DI1")
    );
    assert_eq!(
      filters.overview(true, None).request().query_value("indexador"),
      Some("DI1")
    );
  }

  #[test]
  fn test_whitespace_edit_is_not_a_change() {
    let mut filters = FilterController::new();
    filters.edit(FilterField::Indexador, "DI1");
    assert!(filters.apply());

    filters.edit(FilterField::Indexador, " DI1 ");
    assert!(!filters.has_pending());
    assert!(!filters.apply());
    assert_eq!(filters.applied().indexador, "DI1");

    filters.edit(FilterField::Asset, "   ");
    assert!(filters.pending_fields().is_empty());
    assert!(!filters.apply());
  }

  #[test]
  fn test_clear_resets_both() {
    let mut filters = FilterController::new();
    filters.edit(FilterField::DateFrom, "2024-01-01");
    filters.apply();
    filters.edit(FilterField::Asset, "CRA1");

    assert!(filters.clear());
    assert!(filters.draft().is_empty());
    assert!(filters.applied().is_empty());
    assert!(!filters.has_pending());
    assert!(!filters.clear());
  }

  #[tokio::test]
  async fn test_queries_follow_applied_filters() {
    let transport = FakeTransport::new();
    transport.reply("/analytics/evolucao-mensal", Ok(json!({"evolucao": []})));
    transport.reply("/analytics/overview", Ok(json!({"total_ativos": 0})));
    let client = client(&transport);

    let mut filters = FilterController::new();
    filters.edit(FilterField::Indexador, "DI1");
    filters.apply();
    client
      .read_value(&filters.monthly_evolution(None))
      .await
      .unwrap();

    filters.edit(FilterField::Indexador, "PRE");
    client
      .read_value(&filters.overview(false, None))
      .await
      .unwrap();

    let sent: Vec<_> = transport
      .requests()
      .iter()
      .map(|r| r.query_value("indexador").map(String::from))
      .collect();
    assert_eq!(sent, vec![Some("DI1".to_string()), Some("DI1".to_string())]);
  }
}
