//! Resume-marker persistence: which file and which line each log source
//! was consumed up to on the previous run.
//!
//! Format, one line per source: `sourceId,fileName,lastLineText`. The last
//! field runs to end of line so the marker text may itself contain commas.
//! A line holding only a source id means "no prior marker". The whole set
//! is rewritten at run end via temp-write + rename so a partial rewrite
//! never corrupts previously-working markers.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::EngineError;

/// Resume point for one log source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeMarker {
  /// File the last consumed line came from.
  pub file_name: Option<String>,
  /// Full text of the last line successfully consumed.
  pub last_line: Option<String>,
}

/// All resume markers, keyed by source id.
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
  map: BTreeMap<String, ResumeMarker>,
}

impl MarkerSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load from disk. A missing file means no prior state.
  pub fn load(path: &Path) -> Result<Self, EngineError> {
    let text = match fs::read_to_string(path) {
      Ok(t) => t,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
      Err(e) => return Err(EngineError::Io(e)),
    };
    let mut map = BTreeMap::new();
    for (idx, line) in text.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let mut parts = line.splitn(3, ',');
      let Some(id) = parts.next().map(str::trim).filter(|s| !s.is_empty()) else {
        warn!("{}:{}: bad marker line: {:?}", path.display(), idx + 1, line);
        continue;
      };
      let marker = match (parts.next(), parts.next()) {
        (Some(file), Some(last)) => ResumeMarker {
          file_name: Some(file.to_string()),
          last_line: Some(last.to_string()),
        },
        _ => ResumeMarker::default(),
      };
      map.insert(id.to_string(), marker);
    }
    Ok(Self { map })
  }

  pub fn get(&self, source_id: &str) -> Option<&ResumeMarker> {
    self.map.get(source_id)
  }

  pub fn set(&mut self, source_id: &str, file_name: String, last_line: String) {
    self.map.insert(
      source_id.to_string(),
      ResumeMarker {
        file_name: Some(file_name),
        last_line: Some(last_line),
      },
    );
  }

  pub fn clear(&mut self, source_id: &str) {
    self.map.insert(source_id.to_string(), ResumeMarker::default());
  }

  /// Rewrite the whole set: write a sibling temp file, then rename it into
  /// place. On failure the previous marker file is left intact.
  pub fn save(&self, path: &Path) -> Result<(), EngineError> {
    let mut out = String::new();
    for (id, marker) in &self.map {
      match (&marker.file_name, &marker.last_line) {
        (Some(file), Some(last)) => {
          out.push_str(&format!("{id},{file},{last}\n"));
        }
        _ => out.push_str(&format!("{id}\n")),
      }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, out).map_err(|e| EngineError::persist(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| EngineError::persist(path, e))?;
    Ok(())
  }
}
