//! Ordered cache keys with prefix matching.

use std::fmt;

/// Cache key: resource name followed by its resolved parameters.
///
/// Keys compare segment by segment, so `["analytics"]` is a prefix of
/// `["analytics", "overview", ...]` but not of `["analyticsx"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
  pub fn new(resource: &str) -> Self {
    Self(vec![resource.to_string()])
  }

  /// Append a parameter segment.
  pub fn with(mut self, segment: impl ToString) -> Self {
    self.0.push(segment.to_string());
    self
  }

  /// Append a named optional parameter; absent values still occupy a slot
  /// so that keys of the same resource keep the same shape.
  pub fn with_opt<V: ToString>(mut self, name: &str, value: Option<V>) -> Self {
    let value = value.map(|v| v.to_string()).unwrap_or_default();
    self.0.push(format!("{}={}", name, value));
    self
  }

  pub fn starts_with(&self, prefix: &CacheKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.join(":"))
  }
}
