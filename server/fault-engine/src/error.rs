//! Error taxonomy for the fault engine.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Engine error taxonomy.
///
/// Failures are scoped: a `SourceUnavailable` skips one log source, a
/// `MalformedRecord` skips one line, a `PersistFailure` aborts one fault
/// type's run. No variant aborts processing of other fault types.
#[derive(Debug, Error)]
pub enum EngineError {
  /// A log source or store file is missing or unreadable. The source is
  /// skipped for this run; all others proceed.
  #[error("source unavailable: {source_id}: {reason}")]
  SourceUnavailable { source_id: String, reason: String },

  /// The resume marker line was not found in the source. Recovered by
  /// re-reading the source with no marker (over-reporting is preferred to
  /// silently dropping data).
  #[error("resume marker not found: {source_id}")]
  MarkerNotFound { source_id: String },

  /// A durable-store or config line failed to parse. The single record is
  /// skipped; the rest of the file continues to load.
  #[error("malformed record: {file}:{line_no}: {reason}")]
  MalformedRecord {
    file: String,
    line_no: usize,
    reason: String,
  },

  /// Temp-write or rename failed while persisting. The previous live file
  /// is left intact.
  #[error("persist failure: {path}: {reason}")]
  PersistFailure { path: PathBuf, reason: String },

  #[error("parse: {0}")]
  Parse(String),

  #[error("io: {0}")]
  Io(#[from] io::Error),
}

impl EngineError {
  pub fn source_unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
    Self::SourceUnavailable {
      source_id: source_id.into(),
      reason: reason.to_string(),
    }
  }

  pub fn marker_not_found(source_id: impl Into<String>) -> Self {
    Self::MarkerNotFound {
      source_id: source_id.into(),
    }
  }

  pub fn malformed(file: impl Into<String>, line_no: usize, reason: impl Into<String>) -> Self {
    Self::MalformedRecord {
      file: file.into(),
      line_no,
      reason: reason.into(),
    }
  }

  pub fn persist(path: impl AsRef<Path>, reason: impl ToString) -> Self {
    Self::PersistFailure {
      path: path.as_ref().to_path_buf(),
      reason: reason.to_string(),
    }
  }
}
