//! Resumable log ingestion: hourly-file iteration, resume-by-line-content,
//! keyword recognition and field extraction.
//!
//! Each log source is a directory of hourly files named `YYYYMMDDHH.log`.
//! The resume marker is the full text of the last line consumed on the
//! previous run; on restart the marker's file is scanned from the top for
//! that exact line and consumption resumes immediately after it. A marker
//! that cannot be found is reported as `MarkerNotFound` and the caller
//! retries the source fresh — over-reporting beats silently dropping data.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use tracing::{debug, warn};

use crate::catalog::FaultTypeCatalog;
use crate::error::EngineError;
use crate::lookup::{paired_unit, Lookups};
use crate::markers::ResumeMarker;
use crate::types::{FaultType, FieldKind, Keyword, Occurrence};

/// Length of the leading `HH:MM:SS MM/DD/YY` timestamp on each log line.
const LINE_TS_LEN: usize = 17;
const LINE_TS_FORMAT: &str = "%H:%M:%S %m/%d/%y";

// ---------------------------------------------------------------------------
// Log sources
// ---------------------------------------------------------------------------

/// One watched log directory. `line` is the sector/line the source reports
/// for (used by the hostname table and server-identity faults).
#[derive(Debug, Clone)]
pub struct LogSource {
  pub id: String,
  pub line: String,
  pub dir: PathBuf,
}

impl LogSource {
  /// Parse the source list. Format: `id,line,dir` per line.
  pub fn parse_all(text: &str, file_label: &str) -> Vec<LogSource> {
    let mut sources = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
      let line = raw.trim();
      if line.is_empty() || line.starts_with("//") {
        continue;
      }
      let parts: Vec<&str> = line.splitn(3, ',').map(str::trim).collect();
      if parts.len() == 3 && !parts[0].is_empty() {
        sources.push(LogSource {
          id: parts[0].to_string(),
          line: parts[1].to_string(),
          dir: PathBuf::from(parts[2]),
        });
      } else {
        warn!("{}:{}: bad log source row: {:?}", file_label, idx + 1, line);
      }
    }
    sources
  }
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Everything one source produced this run, plus the new resume marker.
#[derive(Debug, Default)]
pub struct IngestOutcome {
  pub occurrences: Vec<Occurrence>,
  /// (file name, last complete line consumed). None when nothing was read,
  /// in which case the previous marker remains valid.
  pub marker: Option<(String, String)>,
}

pub struct LogIngestor<'a> {
  catalog: &'a FaultTypeCatalog,
  lookups: &'a Lookups,
  startup_lookback_hours: i64,
}

impl<'a> LogIngestor<'a> {
  pub fn new(catalog: &'a FaultTypeCatalog, lookups: &'a Lookups, startup_lookback_hours: i64) -> Self {
    Self {
      catalog,
      lookups,
      startup_lookback_hours,
    }
  }

  /// Consume everything the source grew since the marker. The returned
  /// occurrences are ordered as read (oldest file first).
  pub fn ingest_source(
    &self,
    source: &LogSource,
    marker: Option<&ResumeMarker>,
    now: DateTime<Utc>,
  ) -> Result<IngestOutcome, EngineError> {
    if !source.dir.is_dir() {
      return Err(EngineError::source_unavailable(
        &source.id,
        format!("missing directory {}", source.dir.display()),
      ));
    }

    let marker_file = marker.and_then(|m| m.file_name.clone());
    let marker_line = marker.and_then(|m| m.last_line.clone());

    // Start at the marker's hour; fresh sources go back the configured
    // look-back from now.
    let start = match marker_file.as_deref().and_then(parse_hour_stamp) {
      Some(hour) => hour,
      None => truncate_to_hour(now) - Duration::hours(self.startup_lookback_hours),
    };

    let mut outcome = IngestOutcome::default();
    let mut pending_marker = marker_line;
    let mut hour = start;
    let end = truncate_to_hour(now);
    while hour <= end {
      let file_name = format!("{}.log", hour.format("%Y%m%d%H"));
      let path = source.dir.join(&file_name);
      let is_marker_file = marker_file.as_deref() == Some(file_name.as_str());
      hour += Duration::hours(1);

      let bytes = match fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
          if is_marker_file && pending_marker.is_some() {
            // The resume point's file vanished (rotation outran us).
            return Err(EngineError::marker_not_found(&source.id));
          }
          continue;
        }
        Err(e) => return Err(EngineError::source_unavailable(&source.id, e)),
      };
      let text = String::from_utf8_lossy(&bytes);
      let lines = complete_lines(&text);

      let mut lines = lines.as_slice();
      if is_marker_file {
        if let Some(needle) = pending_marker.take() {
          match lines.iter().position(|l| *l == needle) {
            Some(pos) => lines = &lines[pos + 1..],
            None => return Err(EngineError::marker_not_found(&source.id)),
          }
        }
      }

      for line in lines {
        if let Some(occ) = self.extract(source, line) {
          outcome.occurrences.push(occ);
        }
        outcome.marker = Some((file_name.clone(), (*line).to_string()));
      }
    }

    debug!(
      source = %source.id,
      occurrences = outcome.occurrences.len(),
      "source ingested"
    );
    Ok(outcome)
  }

  /// Turn one complete log line into an occurrence, or None when no fault
  /// type recognizes it.
  fn extract(&self, source: &LogSource, raw: &str) -> Option<Occurrence> {
    // Strip transport junk before the leading timestamp digit.
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let line = &raw[start..];
    let stamp = line.get(..LINE_TS_LEN)?;
    let at = NaiveDateTime::parse_from_str(stamp, LINE_TS_FORMAT)
      .ok()?
      .and_utc();
    let message = line.get(LINE_TS_LEN..)?.trim_start();

    // First catalog entry whose literals are all present wins.
    let fault_type = self
      .catalog
      .iter()
      .find(|ft| literals_present(&ft.keywords, message))?;

    let mut occ = extract_fields(fault_type, message, at, &source.line)?;
    self.apply_flags(fault_type, source, &mut occ);
    self.lookups.reassign.apply(&mut occ);
    Some(occ)
  }

  fn apply_flags(&self, fault_type: &FaultType, source: &LogSource, occ: &mut Occurrence) {
    if fault_type.flags.previous_unit {
      if let Some(paired) = paired_unit(&occ.object) {
        occ.object = paired;
      }
    }
    if fault_type.flags.server_identity {
      if let Some(host) = self.lookups.hostnames.resolve(&occ.object, &source.line) {
        occ.object = host.to_string();
      }
      if !occ.aux.is_empty() {
        if let Some(host) = self.lookups.hostnames.resolve(&occ.aux, &source.line) {
          occ.aux = host.to_string();
        }
      }
      occ.location = source.line.clone();
    }
  }
}

/// All complete lines of the file. A final fragment without a terminator
/// (the file was read mid-append) is dropped: it is never a marker and
/// never produces an occurrence; the next run re-reads it.
fn complete_lines(text: &str) -> Vec<&str> {
  let mut lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
  // A trailing '\n' leaves one empty tail element; anything else is an
  // unterminated fragment. Either way the tail is not a line.
  lines.pop();
  lines
}

/// True when every literal keyword appears somewhere in the message.
fn literals_present(keywords: &[Keyword], message: &str) -> bool {
  keywords.iter().all(|kw| match kw {
    Keyword::Literal(lit) => message.contains(lit.as_str()),
    Keyword::Field(_) => true,
  })
}

/// Walk the keyword sequence over the message, extracting each placeholder
/// from the span between its neighboring literals. One leading and one
/// trailing space are trimmed from each captured span.
fn extract_fields(
  fault_type: &FaultType,
  message: &str,
  at: DateTime<Utc>,
  source_line: &str,
) -> Option<Occurrence> {
  let mut occ = Occurrence {
    type_code: fault_type.code.clone(),
    at,
    location: String::new(),
    object: String::new(),
    aux: String::new(),
    extra: String::new(),
    line: source_line.to_string(),
  };

  let mut cursor = 0usize;
  let mut pending: Option<FieldKind> = None;
  for kw in &fault_type.keywords {
    match kw {
      Keyword::Literal(lit) => {
        let pos = message[cursor..].find(lit.as_str())? + cursor;
        if let Some(kind) = pending.take() {
          assign(&mut occ, kind, trim_one_space(&message[cursor..pos]));
        }
        cursor = pos + lit.len();
      }
      Keyword::Field(kind) => {
        pending = Some(*kind);
      }
    }
  }
  if let Some(kind) = pending {
    assign(&mut occ, kind, trim_one_space(&message[cursor..]));
  }
  Some(occ)
}

fn assign(occ: &mut Occurrence, kind: FieldKind, value: &str) {
  match kind {
    FieldKind::Location => occ.location = value.to_string(),
    FieldKind::Object => occ.object = value.to_string(),
    FieldKind::Aux => occ.aux = value.to_string(),
    FieldKind::Extra => occ.extra = value.to_string(),
  }
}

fn trim_one_space(s: &str) -> &str {
  let s = s.strip_prefix(' ').unwrap_or(s);
  s.strip_suffix(' ').unwrap_or(s)
}

fn truncate_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
  dt - Duration::minutes(i64::from(dt.minute())) - Duration::seconds(i64::from(dt.second()))
    - Duration::nanoseconds(i64::from(dt.nanosecond()))
}

/// Parse the `YYYYMMDDHH` stamp out of an hourly file name.
fn parse_hour_stamp(file_name: &str) -> Option<DateTime<Utc>> {
  let stem = file_name.strip_suffix(".log").unwrap_or(file_name);
  if stem.len() != 10 || !stem.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  NaiveDateTime::parse_from_str(&format!("{stem}0000"), "%Y%m%d%H%M%S")
    .ok()
    .map(|n| n.and_utc())
}
