//! Fault-type catalog: the ordered, read-only table of fault definitions.
//!
//! Config format, one fault type per line, semicolon-delimited:
//!
//! ```text
//! CODE;label;KW1,\L,KW2,\K;summary tpl;event tpl;location tpl;[c,m][c,m];FLAGS[;routing]
//! ```
//!
//! Keywords are comma-separated; `\L`, `\K`, `\E`, `\X` are extraction
//! placeholders, everything else is a literal that must appear in the
//! line. Lines starting with `//` and blank lines are ignored. A line
//! that fails to parse is skipped with a diagnostic; the rest of the
//! file still loads.

use tracing::warn;

use crate::error::EngineError;
use crate::types::{FaultType, Keyword, ProcessingFlags, Threshold};

/// Declaration-ordered fault-type definitions. Read-only during a run;
/// declaration order is authoritative for threshold tie-breaks.
#[derive(Debug, Clone, Default)]
pub struct FaultTypeCatalog {
  types: Vec<FaultType>,
}

impl FaultTypeCatalog {
  pub fn new(types: Vec<FaultType>) -> Self {
    Self { types }
  }

  /// Parse the catalog config text. Malformed lines are skipped.
  pub fn parse(text: &str, file_label: &str) -> Self {
    let mut types = Vec::new();
    for (idx, line) in text.lines().enumerate() {
      let trimmed = line.trim();
      if trimmed.is_empty() || trimmed.starts_with("//") {
        continue;
      }
      match parse_fault_type(trimmed, file_label, idx + 1) {
        Ok(ft) => types.push(ft),
        Err(e) => warn!("skipping fault type: {}", e),
      }
    }
    Self { types }
  }

  pub fn get(&self, code: &str) -> Option<&FaultType> {
    self.types.iter().find(|t| t.code == code)
  }

  /// Fault types in declaration order.
  pub fn iter(&self) -> impl Iterator<Item = &FaultType> {
    self.types.iter()
  }

  pub fn len(&self) -> usize {
    self.types.len()
  }

  pub fn is_empty(&self) -> bool {
    self.types.is_empty()
  }
}

fn parse_fault_type(line: &str, file: &str, line_no: usize) -> Result<FaultType, EngineError> {
  let fields: Vec<&str> = line.split(';').collect();
  if fields.len() < 8 {
    return Err(EngineError::malformed(
      file,
      line_no,
      format!("expected at least 8 ';' fields, got {}", fields.len()),
    ));
  }

  let code = fields[0].trim();
  if code.is_empty() {
    return Err(EngineError::malformed(file, line_no, "empty fault-type code"));
  }

  let keywords: Vec<Keyword> = fields[2]
    .split(',')
    .filter(|t| !t.is_empty())
    .map(Keyword::parse)
    .collect();
  if keywords.is_empty() {
    return Err(EngineError::malformed(file, line_no, "empty keyword sequence"));
  }

  let thresholds = parse_thresholds(fields[6], file, line_no)?;
  let routing_class = fields
    .get(8)
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .unwrap_or(code)
    .to_string();

  Ok(FaultType {
    code: code.to_string(),
    label: fields[1].trim().to_string(),
    keywords,
    summary_template: fields[3].to_string(),
    event_template: fields[4].to_string(),
    location_template: fields[5].to_string(),
    thresholds,
    flags: ProcessingFlags::parse(fields[7]),
    routing_class,
  })
}

/// Parse a threshold list of the form `[count,minutes][count,minutes]...`.
/// An empty string is a valid empty list.
fn parse_thresholds(s: &str, file: &str, line_no: usize) -> Result<Vec<Threshold>, EngineError> {
  let mut thresholds = Vec::new();
  let mut rest = s.trim();
  while !rest.is_empty() {
    let open = rest
      .find('[')
      .ok_or_else(|| EngineError::malformed(file, line_no, format!("bad threshold list: {s:?}")))?;
    let close = rest[open..]
      .find(']')
      .map(|i| open + i)
      .ok_or_else(|| EngineError::malformed(file, line_no, format!("unclosed threshold: {s:?}")))?;
    let body = &rest[open + 1..close];
    let (count, minutes) = body
      .split_once(',')
      .ok_or_else(|| EngineError::malformed(file, line_no, format!("bad threshold pair: {body:?}")))?;
    let count: u32 = count.trim().parse().map_err(|_| {
      EngineError::malformed(file, line_no, format!("bad threshold count: {count:?}"))
    })?;
    let minutes: i64 = minutes.trim().parse().map_err(|_| {
      EngineError::malformed(file, line_no, format!("bad threshold minutes: {minutes:?}"))
    })?;
    thresholds.push(Threshold { count, minutes });
    rest = rest[close + 1..].trim_start();
  }
  Ok(thresholds)
}
