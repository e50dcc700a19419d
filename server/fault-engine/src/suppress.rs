//! Suppression filtering: static mutes, time-bounded disablement windows,
//! and the revenue-hours check.

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc};
use tracing::warn;

use crate::lookup::CanonicalPairs;
use crate::types::{parse_ts, Occurrence, ProcessingFlags};

// ---------------------------------------------------------------------------
// Static mutes
// ---------------------------------------------------------------------------

/// A permanently muted fault class, until the config changes. Format:
/// `type[,location[,object]]`. Matching, most to least specific:
/// (type, location, object) -> (type, object) -> (type, location) ->
/// type alone. Any match suppresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMute {
  pub type_code: String,
  pub location: Option<String>,
  pub object: Option<String>,
}

impl StaticMute {
  pub fn parse_all(text: &str, file_label: &str) -> Vec<StaticMute> {
    let mut mutes = Vec::new();
    for (idx, line) in config_lines(text) {
      let parts: Vec<&str> = line.split(',').map(str::trim).collect();
      match parts.as_slice() {
        [code] if !code.is_empty() => mutes.push(StaticMute {
          type_code: (*code).to_string(),
          location: None,
          object: None,
        }),
        [code, location] if !code.is_empty() => mutes.push(StaticMute {
          type_code: (*code).to_string(),
          location: non_empty(location),
          object: None,
        }),
        [code, location, object] if !code.is_empty() => mutes.push(StaticMute {
          type_code: (*code).to_string(),
          location: non_empty(location),
          object: non_empty(object),
        }),
        _ => warn!("{}:{}: bad mute rule: {:?}", file_label, idx, line),
      }
    }
    mutes
  }

  fn matches(&self, occ: &Occurrence) -> bool {
    if self.type_code != occ.type_code {
      return false;
    }
    let loc_ok = self.location.as_ref().map_or(true, |l| *l == occ.location);
    let obj_ok = self.object.as_ref().map_or(true, |o| *o == occ.object);
    loc_ok && obj_ok
  }
}

// ---------------------------------------------------------------------------
// Dynamic disablements
// ---------------------------------------------------------------------------

/// Which fault types a disablement rule covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSet {
  All,
  Codes(Vec<String>),
}

impl TypeSet {
  fn contains(&self, code: &str) -> bool {
    match self {
      TypeSet::All => true,
      TypeSet::Codes(codes) => codes.iter().any(|c| c == code),
    }
  }
}

/// A time-bounded disablement window at one canonical location. Format:
/// `typeCSV;location;start;end` with timestamps in the durable format;
/// `ALL` as the type list matches every type. A configured location fans
/// out to one rule per canonical name.
#[derive(Debug, Clone)]
pub struct Disablement {
  pub types: TypeSet,
  pub location: String,
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl Disablement {
  pub fn parse_all(text: &str, file_label: &str, canonical: &CanonicalPairs) -> Vec<Disablement> {
    let mut rules = Vec::new();
    for (idx, line) in config_lines(text) {
      let fields: Vec<&str> = line.split(';').map(str::trim).collect();
      if fields.len() < 4 {
        warn!("{}:{}: bad disablement rule: {:?}", file_label, idx, line);
        continue;
      }
      let types = if fields[0].eq_ignore_ascii_case("ALL") {
        TypeSet::All
      } else {
        TypeSet::Codes(
          fields[0]
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        )
      };
      let (Some(start), Some(end)) = (parse_ts(fields[2]), parse_ts(fields[3])) else {
        warn!("{}:{}: bad disablement window: {:?}", file_label, idx, line);
        continue;
      };
      for location in canonical.expand(fields[1]) {
        rules.push(Disablement {
          types: types.clone(),
          location,
          start,
          end,
        });
      }
    }
    rules
  }

  /// Inclusive at both bounds.
  fn matches(&self, occ: &Occurrence) -> bool {
    occ.location == self.location
      && occ.at >= self.start
      && occ.at <= self.end
      && self.types.contains(&occ.type_code)
  }
}

// ---------------------------------------------------------------------------
// Revenue hours
// ---------------------------------------------------------------------------

/// Per-weekday non-revenue window (maintenance/working hours). Format:
/// `day,HH:MM,HH:MM` with three-letter day names; days without a line
/// have no window and never filter. The window is inclusive at both ends.
#[derive(Debug, Clone, Default)]
pub struct RevenueSchedule {
  // Indexed by days-from-Sunday.
  windows: [Option<(NaiveTime, NaiveTime)>; 7],
}

impl RevenueSchedule {
  pub fn parse(text: &str, file_label: &str) -> Self {
    let mut windows: [Option<(NaiveTime, NaiveTime)>; 7] = Default::default();
    for (idx, line) in config_lines(text) {
      let parts: Vec<&str> = line.split(',').map(str::trim).collect();
      let parsed = if parts.len() == 3 {
        match (
          day_index(parts[0]),
          NaiveTime::parse_from_str(parts[1], "%H:%M"),
          NaiveTime::parse_from_str(parts[2], "%H:%M"),
        ) {
          (Some(day), Ok(start), Ok(end)) => Some((day, start, end)),
          _ => None,
        }
      } else {
        None
      };
      match parsed {
        Some((day, start, end)) => windows[day] = Some((start, end)),
        None => warn!("{}:{}: bad revenue-hours row: {:?}", file_label, idx, line),
      }
    }
    Self { windows }
  }

  /// True when `at` falls inside the weekday's non-revenue window.
  pub fn non_revenue(&self, at: DateTime<Utc>) -> bool {
    let day = at.weekday().num_days_from_sunday() as usize;
    match self.windows[day] {
      Some((start, end)) => {
        // Compare to minute precision, inclusive at both ends.
        let t = match NaiveTime::from_hms_opt(at.hour(), at.minute(), 0) {
          Some(t) => t,
          None => return false,
        };
        t >= start && t <= end
      }
      None => false,
    }
  }
}

fn day_index(name: &str) -> Option<usize> {
  match name.to_ascii_uppercase().as_str() {
    "SUN" => Some(0),
    "MON" => Some(1),
    "TUE" => Some(2),
    "WED" => Some(3),
    "THU" => Some(4),
    "FRI" => Some(5),
    "SAT" => Some(6),
    _ => None,
  }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Decides keep/drop for each occurrence. All rule sources are read
/// wholesale at run start and never mutated.
#[derive(Debug, Clone, Default)]
pub struct SuppressionFilter {
  mutes: Vec<StaticMute>,
  disablements: Vec<Disablement>,
  schedule: RevenueSchedule,
}

impl SuppressionFilter {
  pub fn new(
    mutes: Vec<StaticMute>,
    disablements: Vec<Disablement>,
    schedule: RevenueSchedule,
  ) -> Self {
    Self {
      mutes,
      disablements,
      schedule,
    }
  }

  /// True when the occurrence survives every suppression rule.
  pub fn admit(&self, occ: &Occurrence, flags: ProcessingFlags) -> bool {
    if flags.revenue_hours && self.schedule.non_revenue(occ.at) {
      return false;
    }
    if self.mutes.iter().any(|m| m.matches(occ)) {
      return false;
    }
    if self.disablements.iter().any(|d| d.matches(occ)) {
      return false;
    }
    true
  }
}

fn non_empty(s: &str) -> Option<String> {
  if s.is_empty() {
    None
  } else {
    Some(s.to_string())
  }
}

/// Non-blank, non-comment config lines with 1-based line numbers.
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
  use chrono::TimeZone;

  fn occ(code: &str, location: &str, object: &str, at: DateTime<Utc>) -> Occurrence {
    Occurrence {
      type_code: code.into(),
      at,
      location: location.into(),
      object: object.into(),
      aux: String::new(),
      extra: String::new(),
      line: "YUS".into(),
    }
  }

  fn at(h: u32, m: u32) -> DateTime<Utc> {
    // 2025-01-13 is a Monday.
    Utc.with_ymd_and_hms(2025, 1, 13, h, m, 0).unwrap()
  }

  #[test]
  fn type_only_mute_suppresses_everything_of_that_type() {
    let mutes = StaticMute::parse_all("TF\n", "mutes");
    let filter = SuppressionFilter::new(mutes, vec![], RevenueSchedule::default());
    let flags = ProcessingFlags::default();
    assert!(!filter.admit(&occ("TF", "KIPLING", "T101", at(9, 0)), flags));
    assert!(!filter.admit(&occ("TF", "ISLINGTON", "T202", at(9, 0)), flags));
    assert!(filter.admit(&occ("CDF", "KIPLING", "T101", at(9, 0)), flags));
  }

  #[test]
  fn location_and_object_mutes_narrow_the_match() {
    let mutes = StaticMute::parse_all("TF,KIPLING\nTF,ISLINGTON,T7\n", "mutes");
    let filter = SuppressionFilter::new(mutes, vec![], RevenueSchedule::default());
    let flags = ProcessingFlags::default();
    assert!(!filter.admit(&occ("TF", "KIPLING", "ANY", at(9, 0)), flags));
    assert!(!filter.admit(&occ("TF", "ISLINGTON", "T7", at(9, 0)), flags));
    assert!(filter.admit(&occ("TF", "ISLINGTON", "T8", at(9, 0)), flags));
  }

  #[test]
  fn disablement_window_is_inclusive_and_time_bounded() {
    let canonical = CanonicalPairs::default();
    let rules = Disablement::parse_all(
      "TF;KIPLING;2025-01-13 02:00:00;2025-01-13 04:00:00\n",
      "disabled",
      &canonical,
    );
    let filter = SuppressionFilter::new(vec![], rules, RevenueSchedule::default());
    let flags = ProcessingFlags::default();
    assert!(!filter.admit(&occ("TF", "KIPLING", "T1", at(3, 0)), flags));
    assert!(!filter.admit(&occ("TF", "KIPLING", "T1", at(4, 0)), flags));
    assert!(filter.admit(&occ("TF", "KIPLING", "T1", at(5, 0)), flags));
    assert!(filter.admit(&occ("TF", "ISLINGTON", "T1", at(3, 0)), flags));
  }

  #[test]
  fn disablement_all_matches_every_type() {
    let canonical = CanonicalPairs::default();
    let rules = Disablement::parse_all(
      "ALL;KIPLING;2025-01-13 02:00:00;2025-01-13 04:00:00\n",
      "disabled",
      &canonical,
    );
    let filter = SuppressionFilter::new(vec![], rules, RevenueSchedule::default());
    let flags = ProcessingFlags::default();
    assert!(!filter.admit(&occ("CDF", "KIPLING", "T1", at(3, 0)), flags));
  }

  #[test]
  fn disablement_fans_out_through_canonical_names() {
    let canonical = CanonicalPairs::parse("ST GEORGE,ST GEORGE YUS\nST GEORGE,ST GEORGE BDS\n", "c");
    let rules = Disablement::parse_all(
      "TF;ST GEORGE;2025-01-13 00:00:00;2025-01-13 23:00:00\n",
      "disabled",
      &canonical,
    );
    assert_eq!(rules.len(), 2);
    let filter = SuppressionFilter::new(vec![], rules, RevenueSchedule::default());
    let flags = ProcessingFlags::default();
    assert!(!filter.admit(&occ("TF", "ST GEORGE YUS", "T1", at(9, 0)), flags));
    assert!(!filter.admit(&occ("TF", "ST GEORGE BDS", "T1", at(9, 0)), flags));
  }

  #[test]
  fn revenue_check_applies_only_to_flagged_types() {
    let schedule = RevenueSchedule::parse("MON,02:00,04:00\n", "hours");
    let filter = SuppressionFilter::new(vec![], vec![], schedule);
    let flagged = ProcessingFlags {
      revenue_hours: true,
      ..Default::default()
    };
    let unflagged = ProcessingFlags::default();
    // Monday 03:00 falls in the non-revenue window.
    assert!(!filter.admit(&occ("TF", "KIPLING", "T1", at(3, 0)), flagged));
    assert!(filter.admit(&occ("TF", "KIPLING", "T1", at(3, 0)), unflagged));
    // Monday 05:00 is back in revenue hours.
    assert!(filter.admit(&occ("TF", "KIPLING", "T1", at(5, 0)), flagged));
    // Window bounds are inclusive.
    assert!(!filter.admit(&occ("TF", "KIPLING", "T1", at(2, 0)), flagged));
    assert!(!filter.admit(&occ("TF", "KIPLING", "T1", at(4, 0)), flagged));
  }

  #[test]
  fn day_without_window_never_filters() {
    let schedule = RevenueSchedule::parse("MON,02:00,04:00\n", "hours");
    let filter = SuppressionFilter::new(vec![], vec![], schedule);
    let flagged = ProcessingFlags {
      revenue_hours: true,
      ..Default::default()
    };
    // 2025-01-14 is a Tuesday.
    let tue = Utc.with_ymd_and_hms(2025, 1, 14, 3, 0, 0).unwrap();
    assert!(filter.admit(&occ("TF", "KIPLING", "T1", tue), flagged));
  }
}
