//! File staging and upload lifecycle.
//!
//! ```text
//! Idle ──submit──▶ Uploading ──▶ Succeeded | DuplicateWarning | Failed
//!   ▲                  │                     │
//!   ├───── cancel ─────┘                     │
//!   └──────────── acknowledge / clear ───────┘
//! ```
//!
//! One submission creates one fund from the first staged file, even when
//! several files are staged.

use std::path::Path;
use tracing::{info, warn};

use super::notifications::{NotificationCenter, NotificationKind};
use super::Rejected;
use crate::api::{ApiError, FundClient, Transport, UploadFundResponse};

/// A file picked by the user, held in memory until submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
  pub name: String,
  pub size: u64,
  pub content: Vec<u8>,
}

impl StagedFile {
  pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
    Self {
      name: name.into(),
      size: content.len() as u64,
      content,
    }
  }

  pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .ok_or_else(|| ApiError::InvalidInput(format!("Not a file: {}", path.display())))?;
    let content = tokio::fs::read(path)
      .await
      .map_err(|e| ApiError::InvalidInput(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(Self::new(name, content))
  }

  fn same_file(&self, other: &StagedFile) -> bool {
    self.name == other.name && self.size == other.size
  }
}

/// Ordered set of staged files, unique by (name, size).
#[derive(Debug, Clone, Default)]
pub struct Selection {
  files: Vec<StagedFile>,
}

impl Selection {
  /// Merge files into the selection; ones already staged are skipped.
  /// Returns how many were added.
  pub fn add(&mut self, files: impl IntoIterator<Item = StagedFile>) -> usize {
    let mut added = 0;
    for file in files {
      if !self.files.iter().any(|f| f.same_file(&file)) {
        self.files.push(file);
        added += 1;
      }
    }
    added
  }

  pub fn remove_at(&mut self, index: usize) -> Option<StagedFile> {
    (index < self.files.len()).then(|| self.files.remove(index))
  }

  pub fn clear(&mut self) {
    self.files.clear();
  }

  pub fn first(&self) -> Option<&StagedFile> {
    self.files.first()
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn total_size(&self) -> u64 {
    self.files.iter().map(|f| f.size).sum()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
  #[default]
  Idle,
  Uploading {
    file_name: String,
  },
  Succeeded {
    fund_id: Option<u64>,
    message: String,
  },
  DuplicateWarning {
    existing_fund: Option<u64>,
    message: String,
  },
  Failed {
    message: String,
  },
}

impl UploadState {
  pub fn is_uploading(&self) -> bool {
    matches!(self, UploadState::Uploading { .. })
  }

  /// Acknowledgment for a terminal state.
  fn acknowledgment(&self) -> Option<(NotificationKind, &str)> {
    match self {
      UploadState::Succeeded { message, .. } => Some((NotificationKind::Success, message)),
      UploadState::DuplicateWarning { message, .. } => Some((NotificationKind::Warning, message)),
      UploadState::Failed { message } => Some((NotificationKind::Error, message)),
      _ => None,
    }
  }
}

#[derive(Debug)]
enum UploadEvent {
  Submit,
  Completed(Result<UploadFundResponse, ApiError>),
  Acknowledge,
  Clear,
  Cancel,
}

/// Drives one screen's upload: staged selection plus upload state.
#[derive(Debug, Default)]
pub struct UploadController {
  state: UploadState,
  selection: Selection,
}

impl UploadController {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self) -> &UploadState {
    &self.state
  }

  pub fn selection(&self) -> &Selection {
    &self.selection
  }

  /// Fund created by the last successful upload, for navigating to it.
  pub fn created_fund(&self) -> Option<u64> {
    match self.state {
      UploadState::Succeeded { fund_id, .. } => fund_id,
      _ => None,
    }
  }

  /// Add files from drag-and-drop or the file picker.
  pub fn stage(&mut self, files: impl IntoIterator<Item = StagedFile>) -> Result<usize, Rejected> {
    if self.state.is_uploading() {
      return Err(Rejected::InFlight);
    }
    Ok(self.selection.add(files))
  }

  #[allow(dead_code)]
  pub fn remove_at(&mut self, index: usize) -> Result<Option<StagedFile>, Rejected> {
    if self.state.is_uploading() {
      return Err(Rejected::InFlight);
    }
    Ok(self.selection.remove_at(index))
  }

  /// Start a submission, returning the file to send.
  pub fn begin_submit(&mut self) -> Result<StagedFile, Rejected> {
    self.transition(UploadEvent::Submit)?;
    // Submit only succeeds with a non-empty selection.
    self.selection.first().cloned().ok_or(Rejected::NothingStaged)
  }

  /// Record the outcome of the submission started by `begin_submit`.
  pub fn complete(
    &mut self,
    result: Result<UploadFundResponse, ApiError>,
    notifications: &mut NotificationCenter,
  ) -> &UploadState {
    if self.transition(UploadEvent::Completed(result)).is_ok() {
      if let Some((kind, message)) = self.state.acknowledgment() {
        notifications.push(kind, message);
      }
    }
    &self.state
  }

  /// Submit the first staged file and wait for the outcome.
  pub async fn submit<T: Transport>(
    &mut self,
    client: &FundClient<T>,
    notifications: &mut NotificationCenter,
  ) -> Result<&UploadState, Rejected> {
    let file = self.begin_submit()?;
    let guard = SubmitGuard {
      controller: &mut *self,
      finished: false,
    };
    let result = client.upload_fund(&file.name, file.content).await;
    guard.finish();
    Ok(self.complete(result, notifications))
  }

  /// Dismiss a terminal outcome, keeping the selection.
  pub fn acknowledge(&mut self) -> Result<(), Rejected> {
    self.transition(UploadEvent::Acknowledge)
  }

  /// Reset to idle with an empty selection.
  #[allow(dead_code)]
  pub fn clear(&mut self) -> Result<(), Rejected> {
    self.transition(UploadEvent::Clear)
  }

  /// Abandon an in-flight submission whose outcome will never arrive.
  /// Goes back to idle with the selection intact; a no-op otherwise.
  pub fn cancel(&mut self) {
    if self.state.is_uploading() {
      // Cancel is accepted from Uploading.
      let _ = self.transition(UploadEvent::Cancel);
    }
  }

  fn transition(&mut self, event: UploadEvent) -> Result<(), Rejected> {
    let next = match (&self.state, event) {
      (UploadState::Uploading { .. }, UploadEvent::Submit)
      | (UploadState::Uploading { .. }, UploadEvent::Acknowledge)
      | (UploadState::Uploading { .. }, UploadEvent::Clear) => return Err(Rejected::InFlight),

      (_, UploadEvent::Submit) => match self.selection.first() {
        Some(file) => {
          if self.selection.len() > 1 {
            info!(
              staged = self.selection.len(),
              "only the first staged file is uploaded"
            );
          }
          UploadState::Uploading {
            file_name: file.name.clone(),
          }
        }
        None => return Err(Rejected::NothingStaged),
      },

      (UploadState::Uploading { file_name }, UploadEvent::Completed(result)) => {
        let next = outcome(file_name, result);
        if matches!(next, UploadState::Succeeded { .. }) {
          self.selection.clear();
        }
        next
      }
      (_, UploadEvent::Completed(_)) => {
        warn!("upload result arrived with no upload in flight");
        return Err(Rejected::NothingStaged);
      }

      (UploadState::Uploading { file_name }, UploadEvent::Cancel) => {
        warn!(file_name = %file_name, "upload abandoned before completion");
        UploadState::Idle
      }
      (_, UploadEvent::Cancel) => return Ok(()),

      (_, UploadEvent::Acknowledge) => UploadState::Idle,
      (_, UploadEvent::Clear) => {
        self.selection.clear();
        UploadState::Idle
      }
    };

    info!(from = ?self.state, to = ?next, "upload state");
    self.state = next;
    Ok(())
  }
}

/// Cancels the submission if `submit` is dropped before the response.
struct SubmitGuard<'a> {
  controller: &'a mut UploadController,
  finished: bool,
}

impl SubmitGuard<'_> {
  fn finish(mut self) {
    self.finished = true;
  }
}

impl Drop for SubmitGuard<'_> {
  fn drop(&mut self) {
    if !self.finished {
      self.controller.cancel();
    }
  }
}

/// Map the backend's answer to a terminal state.
fn outcome(file_name: &str, result: Result<UploadFundResponse, ApiError>) -> UploadState {
  match result {
    Ok(resp) if resp.arquivo_duplicado => {
      let existing_fund = resp.fundo_existente.as_ref().map(|f| f.id).or(resp.fundo_id);
      UploadState::DuplicateWarning {
        message: duplicate_message(file_name, &resp.mensagem, existing_fund),
        existing_fund,
      }
    }
    Ok(resp) if resp.sucesso => UploadState::Succeeded {
      message: if resp.mensagem.is_empty() {
        match resp.fundo_id {
          Some(id) => format!("Fund {} created from {}", id, file_name),
          None => format!("{} uploaded", file_name),
        }
      } else {
        resp.mensagem
      },
      fund_id: resp.fundo_id,
    },
    Ok(resp) => UploadState::Failed {
      message: if resp.mensagem.is_empty() {
        format!("Upload of {} was rejected", file_name)
      } else {
        resp.mensagem
      },
    },
    Err(e) if e.is_duplicate() => {
      let existing_fund = match &e {
        ApiError::Backend { existing_fund, .. } => *existing_fund,
        _ => None,
      };
      UploadState::DuplicateWarning {
        message: duplicate_message(file_name, &e.user_message(), existing_fund),
        existing_fund,
      }
    }
    Err(e) => UploadState::Failed {
      message: e.user_message(),
    },
  }
}

fn duplicate_message(file_name: &str, backend_message: &str, existing_fund: Option<u64>) -> String {
  let base = if backend_message.is_empty() {
    format!("{} was already uploaded", file_name)
  } else {
    backend_message.to_string()
  };
  match existing_fund {
    Some(id) => format!("{} (existing fund {})", base, id),
    None => base,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::cached_client::testing::{client, FakeTransport};
  use crate::api::Resource;
  use crate::cache::EntryStatus;
  use serde_json::json;
  use std::time::Duration;

  fn file(name: &str, size: usize) -> StagedFile {
    StagedFile::new(name, vec![b'x'; size])
  }

  #[test]
  fn test_staging_dedups_by_name_and_size() {
    let mut controller = UploadController::new();
    // Drag-and-drop, then the file picker with the same file.
    assert_eq!(controller.stage([file("a.xml", 100)]), Ok(1));
    assert_eq!(controller.stage([file("a.xml", 100)]), Ok(0));
    assert_eq!(controller.selection().len(), 1);

    // Same name, different size is a different file.
    assert_eq!(
      controller.stage([file("a.xml", 101), file("b.xml", 100), file("b.xml", 100)]),
      Ok(2)
    );
    assert_eq!(controller.selection().len(), 3);
    assert_eq!(controller.selection().total_size(), 301);
  }

  #[test]
  fn test_submit_requires_files() {
    let mut controller = UploadController::new();
    assert_eq!(controller.begin_submit(), Err(Rejected::NothingStaged));
    assert_eq!(controller.state(), &UploadState::Idle);
  }

  #[test]
  fn test_submit_is_not_reentrant() {
    let mut controller = UploadController::new();
    controller.stage([file("a.xml", 10)]).unwrap();

    let sent = controller.begin_submit().unwrap();
    assert_eq!(sent.name, "a.xml");
    assert!(controller.state().is_uploading());

    assert_eq!(controller.begin_submit(), Err(Rejected::InFlight));
    assert_eq!(controller.stage([file("b.xml", 1)]), Err(Rejected::InFlight));
    assert_eq!(controller.clear(), Err(Rejected::InFlight));
    assert_eq!(controller.remove_at(0), Err(Rejected::InFlight));
  }

  #[test]
  fn test_only_first_file_is_sent() {
    let mut controller = UploadController::new();
    controller
      .stage([file("first.xml", 1), file("second.xml", 2)])
      .unwrap();
    assert_eq!(controller.begin_submit().unwrap().name, "first.xml");
  }

  #[test]
  fn test_duplicate_keeps_selection() {
    let mut controller = UploadController::new();
    let mut notes = NotificationCenter::new();
    controller.stage([file("a.xml", 10)]).unwrap();
    controller.begin_submit().unwrap();

    let resp = UploadFundResponse {
      sucesso: false,
      mensagem: "Arquivo já processado".to_string(),
      fundo_id: Some(9),
      arquivo_duplicado: true,
      fundo_existente: None,
    };
    let state = controller.complete(Ok(resp), &mut notes).clone();

    assert_eq!(
      state,
      UploadState::DuplicateWarning {
        existing_fund: Some(9),
        message: "Arquivo já processado (existing fund 9)".to_string(),
      }
    );
    assert_eq!(controller.selection().len(), 1);
    assert_eq!(notes.count(NotificationKind::Warning), 1);
  }

  #[test]
  fn test_conflict_status_is_duplicate() {
    let mut controller = UploadController::new();
    let mut notes = NotificationCenter::new();
    controller.stage([file("a.xml", 10)]).unwrap();
    controller.begin_submit().unwrap();

    let err = ApiError::from_response(409, r#"{"detail": "Arquivo duplicado"}"#, Some(4));
    controller.complete(Err(err), &mut notes);

    assert!(matches!(
      controller.state(),
      UploadState::DuplicateWarning {
        existing_fund: Some(4),
        ..
      }
    ));
    assert_eq!(controller.selection().len(), 1);
  }

  #[test]
  fn test_transport_failure_keeps_selection_for_retry() {
    let mut controller = UploadController::new();
    let mut notes = NotificationCenter::new();
    controller.stage([file("a.xml", 10)]).unwrap();
    controller.begin_submit().unwrap();

    controller.complete(
      Err(ApiError::Transport("connection reset".to_string())),
      &mut notes,
    );
    assert!(matches!(controller.state(), UploadState::Failed { .. }));
    assert_eq!(controller.selection().len(), 1);
    assert_eq!(notes.count(NotificationKind::Error), 1);

    // Retry straight from Failed.
    assert!(controller.begin_submit().is_ok());
  }

  #[test]
  fn test_acknowledge_and_clear() {
    let mut controller = UploadController::new();
    let mut notes = NotificationCenter::new();
    controller.stage([file("a.xml", 10)]).unwrap();
    controller.begin_submit().unwrap();
    controller.complete(Err(ApiError::Transport("x".to_string())), &mut notes);

    controller.acknowledge().unwrap();
    assert_eq!(controller.state(), &UploadState::Idle);
    assert_eq!(controller.selection().len(), 1);

    controller.clear().unwrap();
    assert!(controller.selection().is_empty());
  }

  #[test]
  fn test_cancel_returns_to_idle_keeping_selection() {
    let mut controller = UploadController::new();
    controller.stage([file("a.xml", 10)]).unwrap();
    controller.begin_submit().unwrap();

    controller.cancel();
    assert_eq!(controller.state(), &UploadState::Idle);
    assert_eq!(controller.selection().len(), 1);
    assert_eq!(controller.stage([file("b.xml", 1)]), Ok(1));

    // Nothing to cancel outside an upload.
    controller.cancel();
    assert_eq!(controller.state(), &UploadState::Idle);
  }

  #[tokio::test]
  async fn test_dropped_submit_does_not_stay_uploading() {
    let transport = FakeTransport::new().with_delay(Duration::from_millis(200));
    transport.reply("/fundo/upload", Ok(json!({"sucesso": true, "fundo_id": 1})));
    let client = client(&transport);
    let mut notes = NotificationCenter::new();

    let mut controller = UploadController::new();
    controller.stage([file("a.xml", 10)]).unwrap();
    let timed_out = tokio::time::timeout(
      Duration::from_millis(20),
      controller.submit(&client, &mut notes),
    )
    .await;
    assert!(timed_out.is_err());

    assert_eq!(controller.state(), &UploadState::Idle);
    assert_eq!(controller.selection().len(), 1);
    assert!(notes.is_empty());
    assert!(controller.begin_submit().is_ok());
  }

  #[test]
  fn test_stray_completion_is_ignored() {
    let mut controller = UploadController::new();
    let mut notes = NotificationCenter::new();
    controller.complete(Ok(UploadFundResponse::default()), &mut notes);
    assert_eq!(controller.state(), &UploadState::Idle);
    assert!(notes.is_empty());
  }

  #[tokio::test]
  async fn test_successful_upload_clears_selection_and_invalidates() {
    let transport = FakeTransport::new();
    transport.reply("/fundo/", Ok(json!({"fundos": [], "total": 0})));
    transport.reply("/analytics/indexadores", Ok(json!({"indexadores": []})));
    transport.reply("/fundo/upload", Ok(json!({"sucesso": true, "fundo_id": 42})));
    let client = client(&transport);
    let mut notes = NotificationCenter::new();

    client.fund_list(50, 0).await.unwrap();
    client.indexers().await.unwrap();

    let mut controller = UploadController::new();
    controller.stage([file("a.xml", 100)]).unwrap();
    controller.stage([file("a.xml", 100)]).unwrap();
    assert_eq!(controller.selection().len(), 1);

    let state = controller.submit(&client, &mut notes).await.unwrap().clone();
    assert!(matches!(
      state,
      UploadState::Succeeded {
        fund_id: Some(42),
        ..
      }
    ));
    assert!(controller.selection().is_empty());
    assert_eq!(controller.created_fund(), Some(42));
    assert_eq!(transport.calls_to("/fundo/upload"), 1);
    assert_eq!(notes.count(NotificationKind::Success), 1);

    let list = Resource::FundList { limit: 50, offset: 0 };
    assert_eq!(client.entry(Some(&list)).status, EntryStatus::Stale);
    assert_eq!(
      client.entry(Some(&Resource::Indexers)).status,
      EntryStatus::Stale
    );
  }

  #[tokio::test]
  async fn test_from_path_reads_name_and_size() {
    let dir = std::env::temp_dir().join(format!("fundview-staged-file-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("carteira.xml");
    std::fs::write(&path, b"<xml/>").unwrap();

    let staged = StagedFile::from_path(&path).await.unwrap();
    assert_eq!(staged.name, "carteira.xml");
    assert_eq!(staged.size, 6);

    let missing = StagedFile::from_path(&dir.join("missing.xml")).await;
    assert!(matches!(missing, Err(ApiError::InvalidInput(_))));
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
