//! Workflow controllers driving uploads, analytics filters and enrichment.

pub mod enrichment;
pub mod filters;
pub mod notifications;
pub mod upload;

use thiserror::Error;

pub use enrichment::EnrichmentToggle;
pub use filters::{FilterController, FilterField};
pub use notifications::{NotificationCenter, NotificationKind};
pub use upload::{StagedFile, UploadController, UploadState};

/// Why a workflow refused to start an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
  #[error("An operation is already in progress")]
  InFlight,
  #[error("No files selected")]
  NothingStaged,
}
