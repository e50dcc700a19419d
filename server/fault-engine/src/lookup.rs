//! Static lookup tables, loaded once and passed explicitly into ingestion.
//!
//! Three tables plus the paired-unit rule:
//! - hostname table: (logical unit id, source line) -> concrete server name
//! - reassignment table: (raw location, raw object) -> canonical pair
//! - canonical-name pairs: configured location -> canonical location(s),
//!   used to fan out disablement rules
//! - paired-unit flip: the redundant partner of a unit ("...A" <-> "...B")

use std::collections::HashMap;

use tracing::warn;

use crate::types::Occurrence;

// ---------------------------------------------------------------------------
// Hostname table
// ---------------------------------------------------------------------------

/// Translates a logical unit id into the concrete server name for a given
/// line/sector. Format: `unit,line,hostname` per line.
#[derive(Debug, Clone, Default)]
pub struct HostnameTable {
  map: HashMap<(String, String), String>,
}

impl HostnameTable {
  pub fn parse(text: &str, file_label: &str) -> Self {
    let mut map = HashMap::new();
    for (idx, line) in config_lines(text) {
      let mut parts = line.split(',');
      match (parts.next(), parts.next(), parts.next()) {
        (Some(unit), Some(sector), Some(host)) => {
          map.insert(
            (unit.trim().to_string(), sector.trim().to_string()),
            host.trim().to_string(),
          );
        }
        _ => warn!("{}:{}: bad hostname row: {:?}", file_label, idx, line),
      }
    }
    Self { map }
  }

  pub fn resolve(&self, unit: &str, line: &str) -> Option<&str> {
    self
      .map
      .get(&(unit.to_string(), line.to_string()))
      .map(String::as_str)
  }
}

// ---------------------------------------------------------------------------
// Location/object reassignment
// ---------------------------------------------------------------------------

/// Some track sections and switches are reported under a yard location by
/// the source system but sit on the mainline in practice. This table
/// renames such (location, object) pairs to their canonical names before
/// suppression and merge. Format: `rawLocation,rawObject,location,object`.
#[derive(Debug, Clone, Default)]
pub struct ReassignTable {
  pairs: Vec<ReassignPair>,
}

#[derive(Debug, Clone)]
struct ReassignPair {
  from_location: String,
  from_object: String,
  to_location: String,
  to_object: String,
}

impl ReassignTable {
  pub fn parse(text: &str, file_label: &str) -> Self {
    let mut pairs = Vec::new();
    for (idx, line) in config_lines(text) {
      let parts: Vec<&str> = line.split(',').map(str::trim).collect();
      if parts.len() == 4 {
        pairs.push(ReassignPair {
          from_location: parts[0].to_string(),
          from_object: parts[1].to_string(),
          to_location: parts[2].to_string(),
          to_object: parts[3].to_string(),
        });
      } else {
        warn!("{}:{}: bad reassignment row: {:?}", file_label, idx, line);
      }
    }
    Self { pairs }
  }

  /// Rewrite the occurrence's location and object if a pair matches.
  /// Returns true when a rename happened.
  pub fn apply(&self, occ: &mut Occurrence) -> bool {
    if occ.location.is_empty() || occ.object.is_empty() {
      return false;
    }
    for p in &self.pairs {
      if occ.location == p.from_location && occ.object == p.from_object {
        occ.location = p.to_location.clone();
        occ.object = p.to_object.clone();
        return true;
      }
    }
    false
  }
}

// ---------------------------------------------------------------------------
// Canonical-name pairs
// ---------------------------------------------------------------------------

/// Maps a location name as operators configure it onto the canonical
/// name(s) the source system emits. One configured name may map to
/// several canonical ones. Format: `configured,canonical`.
#[derive(Debug, Clone, Default)]
pub struct CanonicalPairs {
  pairs: Vec<(String, String)>,
}

impl CanonicalPairs {
  pub fn parse(text: &str, file_label: &str) -> Self {
    let mut pairs = Vec::new();
    for (idx, line) in config_lines(text) {
      match line.split_once(',') {
        Some((configured, canonical)) => {
          pairs.push((configured.trim().to_string(), canonical.trim().to_string()));
        }
        None => warn!("{}:{}: bad canonical-name row: {:?}", file_label, idx, line),
      }
    }
    Self { pairs }
  }

  /// All canonical names for a configured location. When no pair matches,
  /// the location already is canonical and is returned as-is.
  pub fn expand(&self, location: &str) -> Vec<String> {
    let matched: Vec<String> = self
      .pairs
      .iter()
      .filter(|(configured, _)| configured == location)
      .map(|(_, canonical)| canonical.clone())
      .collect();
    if matched.is_empty() {
      vec![location.to_string()]
    } else {
      matched
    }
  }
}

// ---------------------------------------------------------------------------
// Paired unit
// ---------------------------------------------------------------------------

/// The redundant partner of a unit id: a trailing 'A' becomes 'B' and vice
/// versa ("TCS_1A" <-> "TCS_1B"). None when the id has no such suffix.
pub fn paired_unit(id: &str) -> Option<String> {
  if let Some(body) = id.strip_suffix('A') {
    Some(format!("{body}B"))
  } else {
    id.strip_suffix('B').map(|body| format!("{body}A"))
  }
}

/// Bundle of all lookup tables handed to the ingestor.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
  pub hostnames: HostnameTable,
  pub reassign: ReassignTable,
  pub canonical: CanonicalPairs,
}

/// Non-blank, non-comment config lines with their 1-based line numbers.
fn config_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
  text
    .lines()
    .enumerate()
    .map(|(i, l)| (i + 1, l.trim()))
    .filter(|(_, l)| !l.is_empty() && !l.starts_with("//"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};

  fn occ(location: &str, object: &str) -> Occurrence {
    Occurrence {
      type_code: "TF".into(),
      at: Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
      location: location.into(),
      object: object.into(),
      aux: String::new(),
      extra: String::new(),
      line: "YUS".into(),
    }
  }

  #[test]
  fn hostname_resolution_is_keyed_by_unit_and_line() {
    let table = HostnameTable::parse("TCS_1A,YUS,yus-tcs-01\nTCS_1A,BDS,bds-tcs-01\n", "hosts");
    assert_eq!(table.resolve("TCS_1A", "YUS"), Some("yus-tcs-01"));
    assert_eq!(table.resolve("TCS_1A", "BDS"), Some("bds-tcs-01"));
    assert_eq!(table.resolve("TCS_1A", "CYUS"), None);
    assert_eq!(table.resolve("TCS_9Z", "YUS"), None);
  }

  #[test]
  fn reassignment_renames_matching_pair_only() {
    let table = ReassignTable::parse("YARD A,T101,DAVISVILLE,T101-M\n", "reassign");
    let mut a = occ("YARD A", "T101");
    assert!(table.apply(&mut a));
    assert_eq!(a.location, "DAVISVILLE");
    assert_eq!(a.object, "T101-M");

    let mut b = occ("YARD A", "T999");
    assert!(!table.apply(&mut b));
    assert_eq!(b.location, "YARD A");
  }

  #[test]
  fn reassignment_skips_empty_fields() {
    let table = ReassignTable::parse("YARD A,T101,DAVISVILLE,T101-M\n", "reassign");
    let mut a = occ("", "T101");
    assert!(!table.apply(&mut a));
  }

  #[test]
  fn canonical_fan_out() {
    let pairs = CanonicalPairs::parse("ST GEORGE,ST GEORGE YUS\nST GEORGE,ST GEORGE BDS\n", "canon");
    assert_eq!(
      pairs.expand("ST GEORGE"),
      vec!["ST GEORGE YUS".to_string(), "ST GEORGE BDS".to_string()]
    );
    assert_eq!(pairs.expand("KIPLING"), vec!["KIPLING".to_string()]);
  }

  #[test]
  fn paired_unit_flips_suffix() {
    assert_eq!(paired_unit("TCS_1A"), Some("TCS_1B".to_string()));
    assert_eq!(paired_unit("TCS_1B"), Some("TCS_1A".to_string()));
    assert_eq!(paired_unit("TCS_1"), None);
    assert_eq!(paired_unit(""), None);
  }
}
