//! Self-expiring user notifications (toasts).

use chrono::{DateTime, Duration, Utc};

/// How long a notification stays visible.
pub const NOTIFICATION_TTL_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
  Success,
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
  pub id: u64,
  pub kind: NotificationKind,
  pub message: String,
  pub created_at: DateTime<Utc>,
}

impl Notification {
  pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - self.created_at >= ttl
  }
}

/// Queue of notifications, each expiring on its own schedule.
#[derive(Debug)]
pub struct NotificationCenter {
  items: Vec<Notification>,
  next_id: u64,
  ttl: Duration,
}

impl Default for NotificationCenter {
  fn default() -> Self {
    Self::new()
  }
}

impl NotificationCenter {
  pub fn new() -> Self {
    Self::with_ttl(Duration::seconds(NOTIFICATION_TTL_SECS))
  }

  pub fn with_ttl(ttl: Duration) -> Self {
    Self {
      items: Vec::new(),
      next_id: 1,
      ttl,
    }
  }

  pub fn push(&mut self, kind: NotificationKind, message: impl Into<String>) -> u64 {
    self.push_at(kind, message, Utc::now())
  }

  pub fn push_at(
    &mut self,
    kind: NotificationKind,
    message: impl Into<String>,
    now: DateTime<Utc>,
  ) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    self.items.push(Notification {
      id,
      kind,
      message: message.into(),
      created_at: now,
    });
    id
  }

  pub fn success(&mut self, message: impl Into<String>) -> u64 {
    self.push(NotificationKind::Success, message)
  }

  pub fn error(&mut self, message: impl Into<String>) -> u64 {
    self.push(NotificationKind::Error, message)
  }

  /// Notifications still visible at `now`.
  #[allow(dead_code)]
  pub fn active(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Notification> {
    let ttl = self.ttl;
    self.items.iter().filter(move |n| !n.is_expired(now, ttl))
  }

  /// Drop expired notifications.
  pub fn prune(&mut self, now: DateTime<Utc>) {
    let ttl = self.ttl;
    self.items.retain(|n| !n.is_expired(now, ttl));
  }

  #[allow(dead_code)]
  pub fn dismiss(&mut self, id: u64) {
    self.items.retain(|n| n.id != id);
  }

  /// Take the notifications still visible at `now`, dropping expired ones.
  pub fn take_active(&mut self, now: DateTime<Utc>) -> Vec<Notification> {
    self.prune(now);
    std::mem::take(&mut self.items)
  }

  #[allow(dead_code)]
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  #[allow(dead_code)]
  pub fn count(&self, kind: NotificationKind) -> usize {
    self.items.iter().filter(|n| n.kind == kind).count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_notifications_expire_independently() {
    let mut center = NotificationCenter::new();
    let t0 = Utc::now();
    center.push_at(NotificationKind::Success, "first", t0);
    center.push_at(NotificationKind::Error, "second", t0 + Duration::seconds(3));

    let at = |s| t0 + Duration::seconds(s);
    assert_eq!(center.active(at(4)).count(), 2);
    assert_eq!(center.active(at(5)).count(), 1);
    assert_eq!(center.active(at(5)).next().unwrap().message, "second");
    assert_eq!(center.active(at(8)).count(), 0);

    center.prune(at(6));
    assert_eq!(center.len(), 1);
  }

  #[test]
  fn test_ids_are_unique_and_dismissable() {
    let mut center = NotificationCenter::new();
    let a = center.success("a");
    let b = center.error("b");
    assert_ne!(a, b);

    center.dismiss(a);
    assert_eq!(center.count(NotificationKind::Success), 0);
    assert_eq!(center.count(NotificationKind::Error), 1);
    assert_eq!(center.take_active(Utc::now()).len(), 1);
    assert!(center.is_empty());
  }

  #[test]
  fn test_take_active_skips_expired() {
    let mut center = NotificationCenter::new();
    let t0 = Utc::now();
    center.push_at(NotificationKind::Error, "old", t0);
    center.push_at(NotificationKind::Success, "new", t0 + Duration::seconds(4));

    let shown = center.take_active(t0 + Duration::seconds(6));
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].message, "new");
    assert!(center.is_empty());
  }
}
