//! The durable per-fault-type incident store: load/expire, merge,
//! evaluate, persist with crash-safe rename semantics.
//!
//! One text file per fault type, one line per fault instance:
//!
//! ```text
//! location;object;aux;extra;line;FLAG;lastSummary;ts[,ts|label...]
//! ```
//!
//! `FLAG` is `QUIET` or `NOTIFIED-<timestamp>`; `lastSummary` is `NA` or a
//! timestamp. Occurrence entries are comma-separated timestamps, with a
//! `|label` suffix for instance kinds whose occurrences carry a per-event
//! location.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::error::EngineError;
use crate::threshold::{evaluate, Outcome};
use crate::timeseries::{SeriesEntry, TimeSeries};
use crate::types::{
  format_ts, parse_ts, FaultType, InstanceIdentity, NotifyFlag, Occurrence, Threshold,
  ThresholdNotification,
};

/// Stable short id for an instance identity key.
pub fn instance_id(type_code: &str, location: &str, object: &str, aux: &str) -> String {
  let hash = blake3::hash(format!("{type_code}|{location}|{object}|{aux}").as_bytes());
  let hex = hash.to_hex();
  format!("flt-{}", &hex[..16])
}

// ---------------------------------------------------------------------------
// Fault instance
// ---------------------------------------------------------------------------

/// One durable fault instance: identity key + occurrence series +
/// notification state.
#[derive(Debug, Clone)]
pub struct FaultInstance {
  pub location: String,
  pub object: String,
  pub aux: String,
  pub extra: String,
  pub line: String,
  pub flag: NotifyFlag,
  pub last_summary: Option<DateTime<Utc>>,
  pub series: TimeSeries,
}

impl FaultInstance {
  fn from_occurrence(occ: &Occurrence, onboard: bool) -> Self {
    Self {
      // Onboard instances are identified by the unit alone; the location
      // travels on each entry as a label instead.
      location: if onboard { String::new() } else { occ.location.clone() },
      object: occ.object.clone(),
      aux: occ.aux.clone(),
      extra: occ.extra.clone(),
      line: occ.line.clone(),
      flag: NotifyFlag::Quiet,
      last_summary: None,
      series: TimeSeries::new(),
    }
  }

  /// Identity-key match against a new occurrence. Auxiliary-field equality
  /// only applies when the occurrence supplies a non-empty auxiliary field.
  fn matches(&self, occ: &Occurrence, onboard: bool) -> bool {
    if onboard {
      return self.object == occ.object;
    }
    self.location == occ.location
      && self.object == occ.object
      && (occ.aux.is_empty() || self.aux == occ.aux)
  }

  pub fn identity(&self, fault_type: &FaultType) -> InstanceIdentity {
    InstanceIdentity {
      id: instance_id(&fault_type.code, &self.location, &self.object, &self.aux),
      type_code: fault_type.code.clone(),
      routing_class: fault_type.routing_class.clone(),
      location: self.location.clone(),
      object: self.object.clone(),
      aux: self.aux.clone(),
      extra: self.extra.clone(),
    }
  }

  fn to_line(&self) -> String {
    let flag = match self.flag {
      NotifyFlag::Quiet => "QUIET".to_string(),
      NotifyFlag::Notified(at) => format!("NOTIFIED-{}", format_ts(at)),
    };
    let last_summary = match self.last_summary {
      Some(at) => format_ts(at),
      None => "NA".to_string(),
    };
    let entries: Vec<String> = self
      .series
      .entries()
      .iter()
      .map(|e| match &e.label {
        Some(label) => format!("{}|{}", format_ts(e.at), label),
        None => format_ts(e.at),
      })
      .collect();
    format!(
      "{};{};{};{};{};{};{};{}",
      self.location,
      self.object,
      self.aux,
      self.extra,
      self.line,
      flag,
      last_summary,
      entries.join(",")
    )
  }

  fn parse_line(line: &str, file: &str, line_no: usize) -> Result<Self, EngineError> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() != 8 {
      return Err(EngineError::malformed(
        file,
        line_no,
        format!("expected 8 ';' fields, got {}", fields.len()),
      ));
    }
    let flag = if fields[5] == "QUIET" {
      NotifyFlag::Quiet
    } else if let Some(ts) = fields[5].strip_prefix("NOTIFIED-") {
      NotifyFlag::Notified(
        parse_ts(ts)
          .ok_or_else(|| EngineError::malformed(file, line_no, format!("bad flag time: {ts:?}")))?,
      )
    } else {
      return Err(EngineError::malformed(
        file,
        line_no,
        format!("bad flag token: {:?}", fields[5]),
      ));
    };
    let last_summary = if fields[6] == "NA" {
      None
    } else {
      Some(parse_ts(fields[6]).ok_or_else(|| {
        EngineError::malformed(file, line_no, format!("bad summary marker: {:?}", fields[6]))
      })?)
    };
    let mut series = TimeSeries::new();
    for entry in fields[7].split(',').filter(|e| !e.is_empty()) {
      let (ts, label) = match entry.split_once('|') {
        Some((ts, label)) => (ts, Some(label.to_string())),
        None => (entry, None),
      };
      let at = parse_ts(ts)
        .ok_or_else(|| EngineError::malformed(file, line_no, format!("bad entry: {entry:?}")))?;
      series.insert(at, label);
    }
    Ok(Self {
      location: fields[0].to_string(),
      object: fields[1].to_string(),
      aux: fields[2].to_string(),
      extra: fields[3].to_string(),
      line: fields[4].to_string(),
      flag,
      last_summary,
      series,
    })
  }
}

// ---------------------------------------------------------------------------
// Summary candidates (handed to the batcher)
// ---------------------------------------------------------------------------

/// An instance whose notification cool-down elapsed while occurrences
/// kept arriving, captured during the load-time expiry pass.
#[derive(Debug, Clone)]
pub struct SummaryCandidate {
  pub location: String,
  pub object: String,
  pub aux: String,
  pub extra: String,
  pub notified_at: DateTime<Utc>,
  pub last_summary: Option<DateTime<Utc>>,
  /// Every occurrence strictly after the last summary marker, expired and
  /// still-live alike.
  pub entries: Vec<SeriesEntry>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Durable set of fault instances for one fault type. Loaded once per run,
/// merged, evaluated, persisted. Exclusively owned by one run at a time.
#[derive(Debug)]
pub struct IncidentStore {
  path: PathBuf,
  instances: Vec<FaultInstance>,
}

impl IncidentStore {
  /// Load from durable storage. A missing file means no prior state.
  ///
  /// During load: occurrences older than the type's max threshold window
  /// are dropped (they cannot affect any threshold); a `Notified(at)` flag
  /// resets to `Quiet` once `at + maxWindow < now` (the only path back);
  /// instances left with an empty series and no pending cool-down are
  /// dropped entirely. A still-notified instance whose summary cool-down
  /// elapsed comes back as a `SummaryCandidate` carrying everything it
  /// accumulated since the last summary, expired entries included.
  pub fn load(
    path: &Path,
    fault_type: &FaultType,
    default_window_minutes: i64,
    summary_delay_minutes: i64,
    now: DateTime<Utc>,
  ) -> Result<(Self, Vec<SummaryCandidate>), EngineError> {
    let max_window = Duration::minutes(fault_type.max_window_minutes(default_window_minutes));
    let cutoff = now - max_window;
    let summary_delay = Duration::minutes(summary_delay_minutes);

    let text = match fs::read_to_string(path) {
      Ok(t) => t,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
      Err(e) => {
        return Err(EngineError::source_unavailable(
          path.display().to_string(),
          e,
        ))
      }
    };

    let file_label = path.display().to_string();
    let mut instances = Vec::new();
    let mut candidates = Vec::new();
    for (idx, line) in text.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let mut instance = match FaultInstance::parse_line(line, &file_label, idx + 1) {
        Ok(i) => i,
        Err(e) => {
          warn!("skipping store record: {}", e);
          continue;
        }
      };

      let expired = instance.series.split_expired(cutoff);

      if let NotifyFlag::Notified(at) = instance.flag {
        if now >= at + summary_delay {
          // Expired entries first, surviving ones after: both ranges are
          // ascending and every expired entry predates every kept one.
          let entries: Vec<SeriesEntry> = expired
            .iter()
            .chain(instance.series.entries())
            .filter(|e| instance.last_summary.map_or(true, |marker| e.at > marker))
            .cloned()
            .collect();
          if !entries.is_empty() {
            candidates.push(SummaryCandidate {
              location: instance.location.clone(),
              object: instance.object.clone(),
              aux: instance.aux.clone(),
              extra: instance.extra.clone(),
              notified_at: at,
              last_summary: instance.last_summary,
              entries,
            });
          }
        }
        // Cool-down expiry is the only transition back to Quiet.
        if at + max_window < now {
          instance.flag = NotifyFlag::Quiet;
        }
      }

      if instance.series.is_empty() && instance.flag == NotifyFlag::Quiet {
        continue;
      }
      instances.push(instance);
    }

    Ok((
      Self {
        path: path.to_path_buf(),
        instances,
      },
      candidates,
    ))
  }

  pub fn instances(&self) -> &[FaultInstance] {
    &self.instances
  }

  /// Merge this run's occurrences. Identity-key equality decides whether
  /// an occurrence joins an existing instance; a duplicate timestamp for
  /// the same instance is a no-op.
  pub fn merge(&mut self, occurrences: &[Occurrence], onboard: bool) {
    for occ in occurrences {
      let label = if onboard { Some(occ.location.clone()) } else { None };
      match self.instances.iter_mut().find(|i| i.matches(occ, onboard)) {
        Some(instance) => {
          instance.series.insert(occ.at, label);
        }
        None => {
          let mut instance = FaultInstance::from_occurrence(occ, onboard);
          instance.series.insert(occ.at, label);
          self.instances.push(instance);
        }
      }
    }
  }

  /// Run every threshold (declaration order) against every quiet instance.
  /// The first threshold that fires wins: the flag flips to
  /// `Notified(now)` and one notification request is emitted — at most one
  /// per instance per run.
  pub fn evaluate_all(
    &mut self,
    fault_type: &FaultType,
    now: DateTime<Utc>,
  ) -> Vec<ThresholdNotification> {
    let mut fired = Vec::new();
    for instance in &mut self.instances {
      if instance.flag != NotifyFlag::Quiet {
        continue;
      }
      for &threshold in &fault_type.thresholds {
        if let Outcome::Met { start, end } = evaluate(&instance.series, threshold) {
          instance.flag = NotifyFlag::Notified(now);
          fired.push(build_notification(instance, fault_type, threshold, start, end));
          break;
        }
      }
    }
    fired
  }

  /// Advance an instance's last-summary marker after a digest was emitted,
  /// so a future summary only reports occurrences strictly after it.
  pub fn set_last_summary(
    &mut self,
    location: &str,
    object: &str,
    aux: &str,
    at: DateTime<Utc>,
  ) {
    if let Some(instance) = self
      .instances
      .iter_mut()
      .find(|i| i.location == location && i.object == object && i.aux == aux)
    {
      instance.last_summary = Some(at);
    }
  }

  /// Crash-safe persist: write a temp file, rename the previous live file
  /// to a timestamped archive, rename the temp file into the live path.
  /// The live file is never truncated in place; on any failure the
  /// previous live file remains intact.
  pub fn persist(&self, now: DateTime<Utc>) -> Result<(), EngineError> {
    let mut out = String::new();
    for instance in &self.instances {
      if instance.series.is_empty() && instance.flag == NotifyFlag::Quiet {
        continue;
      }
      out.push_str(&instance.to_line());
      out.push('\n');
    }

    let tmp = self.path.with_extension("tmp");
    fs::write(&tmp, out).map_err(|e| EngineError::persist(&tmp, e))?;

    if self.path.exists() {
      let archive = archive_path(&self.path, now);
      fs::rename(&self.path, &archive).map_err(|e| EngineError::persist(&self.path, e))?;
    }
    fs::rename(&tmp, &self.path).map_err(|e| EngineError::persist(&self.path, e))?;
    Ok(())
  }
}

fn build_notification(
  instance: &FaultInstance,
  fault_type: &FaultType,
  threshold: Threshold,
  start: DateTime<Utc>,
  end: DateTime<Utc>,
) -> ThresholdNotification {
  let occurrences = instance
    .series
    .entries()
    .iter()
    .filter(|e| e.at >= start && e.at <= end)
    .map(|e| format_ts(e.at))
    .collect();
  ThresholdNotification {
    identity: instance.identity(fault_type),
    threshold,
    window_start: format_ts(start),
    window_end: format_ts(end),
    occurrences,
    event_template: fault_type.event_template.clone(),
    location_template: fault_type.location_template.clone(),
  }
}

fn archive_path(live: &Path, now: DateTime<Utc>) -> PathBuf {
  let stem = live
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  let name = format!("{}_deprecated_at_{}.txt", stem, now.format("%y%m%d_%H%M%S"));
  live.with_file_name(name)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::ProcessingFlags;
  use chrono::TimeZone;
  use tempfile::tempdir;

  fn ts(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, h, m, 0).unwrap()
  }

  fn fault_type(thresholds: Vec<Threshold>, onboard: bool) -> FaultType {
    FaultType {
      code: "TF".into(),
      label: "TRACK".into(),
      keywords: vec![],
      summary_template: "s".into(),
      event_template: "e".into(),
      location_template: "l".into(),
      thresholds,
      flags: ProcessingFlags {
        onboard,
        ..Default::default()
      },
      routing_class: "TF".into(),
    }
  }

  fn occ(location: &str, object: &str, at: DateTime<Utc>) -> Occurrence {
    Occurrence {
      type_code: "TF".into(),
      at,
      location: location.into(),
      object: object.into(),
      aux: String::new(),
      extra: String::new(),
      line: "YUS".into(),
    }
  }

  fn th(count: u32, minutes: i64) -> Threshold {
    Threshold { count, minutes }
  }

  #[test]
  fn record_line_round_trip() {
    let mut series = TimeSeries::new();
    series.insert(ts(13, 10, 0), None);
    series.insert(ts(13, 10, 5), Some("KIPLING".into()));
    let instance = FaultInstance {
      location: "KIPLING".into(),
      object: "T101".into(),
      aux: "RUN 12".into(),
      extra: String::new(),
      line: "YUS".into(),
      flag: NotifyFlag::Notified(ts(13, 10, 6)),
      last_summary: None,
      series,
    };
    let line = instance.to_line();
    let parsed = FaultInstance::parse_line(&line, "TF.txt", 1).unwrap();
    assert_eq!(parsed.location, "KIPLING");
    assert_eq!(parsed.object, "T101");
    assert_eq!(parsed.aux, "RUN 12");
    assert_eq!(parsed.flag, NotifyFlag::Notified(ts(13, 10, 6)));
    assert_eq!(parsed.last_summary, None);
    assert_eq!(parsed.series.len(), 2);
    assert_eq!(parsed.series.entries()[1].label.as_deref(), Some("KIPLING"));
  }

  #[test]
  fn fresh_occurrence_creates_quiet_singleton_instance() {
    let dir = tempdir().unwrap();
    let ft = fault_type(vec![th(3, 10)], false);
    let (mut store, _) =
      IncidentStore::load(&dir.path().join("TF.txt"), &ft, 1440, 1440, ts(13, 12, 0)).unwrap();
    store.merge(&[occ("KIPLING", "T101", ts(13, 10, 0))], false);
    assert_eq!(store.instances().len(), 1);
    let instance = &store.instances()[0];
    assert_eq!(instance.series.len(), 1);
    assert_eq!(instance.flag, NotifyFlag::Quiet);
  }

  #[test]
  fn merge_same_timestamp_twice_is_idempotent() {
    let dir = tempdir().unwrap();
    let ft = fault_type(vec![th(3, 10)], false);
    let (mut store, _) =
      IncidentStore::load(&dir.path().join("TF.txt"), &ft, 1440, 1440, ts(13, 12, 0)).unwrap();
    let o = occ("KIPLING", "T101", ts(13, 10, 0));
    store.merge(&[o.clone()], false);
    store.merge(&[o], false);
    assert_eq!(store.instances().len(), 1);
    assert_eq!(store.instances()[0].series.len(), 1);
  }

  #[test]
  fn merge_groups_by_identity_key() {
    let dir = tempdir().unwrap();
    let ft = fault_type(vec![th(3, 10)], false);
    let (mut store, _) =
      IncidentStore::load(&dir.path().join("TF.txt"), &ft, 1440, 1440, ts(13, 12, 0)).unwrap();
    store.merge(
      &[
        occ("KIPLING", "T101", ts(13, 10, 0)),
        occ("KIPLING", "T101", ts(13, 10, 2)),
        occ("ISLINGTON", "T101", ts(13, 10, 3)),
      ],
      false,
    );
    assert_eq!(store.instances().len(), 2);
  }

  #[test]
  fn onboard_identity_is_object_only_with_location_labels() {
    let dir = tempdir().unwrap();
    let ft = fault_type(vec![th(2, 60)], true);
    let (mut store, _) =
      IncidentStore::load(&dir.path().join("TF.txt"), &ft, 1440, 1440, ts(13, 12, 0)).unwrap();
    store.merge(
      &[
        occ("KIPLING", "5541", ts(13, 10, 0)),
        occ("ISLINGTON", "5541", ts(13, 10, 5)),
      ],
      true,
    );
    assert_eq!(store.instances().len(), 1);
    let instance = &store.instances()[0];
    assert_eq!(instance.location, "");
    assert_eq!(instance.series.entries()[0].label.as_deref(), Some("KIPLING"));
    assert_eq!(instance.series.entries()[1].label.as_deref(), Some("ISLINGTON"));
  }

  #[test]
  fn evaluate_all_first_threshold_wins_and_flips_flag() {
    let dir = tempdir().unwrap();
    let ft = fault_type(vec![th(3, 10), th(2, 60)], false);
    let now = ts(13, 12, 0);
    let (mut store, _) = IncidentStore::load(&dir.path().join("TF.txt"), &ft, 1440, 1440, now).unwrap();
    store.merge(
      &[
        occ("KIPLING", "T101", ts(13, 10, 0)),
        occ("KIPLING", "T101", ts(13, 10, 5)),
        occ("KIPLING", "T101", ts(13, 10, 8)),
      ],
      false,
    );
    let fired = store.evaluate_all(&ft, now);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].threshold, th(3, 10));
    assert_eq!(fired[0].occurrences.len(), 3);
    assert_eq!(store.instances()[0].flag, NotifyFlag::Notified(now));

    // Second evaluation in the same run emits nothing further.
    assert!(store.evaluate_all(&ft, now).is_empty());
  }

  #[test]
  fn notified_instance_is_not_reevaluated() {
    let dir = tempdir().unwrap();
    let ft = fault_type(vec![th(2, 60)], false);
    let now = ts(13, 12, 0);
    let (mut store, _) = IncidentStore::load(&dir.path().join("TF.txt"), &ft, 1440, 1440, now).unwrap();
    store.merge(
      &[
        occ("KIPLING", "T101", ts(13, 10, 0)),
        occ("KIPLING", "T101", ts(13, 10, 5)),
      ],
      false,
    );
    assert_eq!(store.evaluate_all(&ft, now).len(), 1);
    store.merge(&[occ("KIPLING", "T101", ts(13, 11, 0))], false);
    assert!(store.evaluate_all(&ft, now).is_empty());
  }

  #[test]
  fn persist_load_round_trip_preserves_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("TF.txt");
    // Window wide enough that nothing expires between persist and reload.
    let ft = fault_type(vec![th(3, 180)], false);
    let now = ts(13, 12, 0);
    let (mut store, _) = IncidentStore::load(&path, &ft, 1440, 1440, now).unwrap();
    store.merge(
      &[
        occ("KIPLING", "T101", ts(13, 10, 0)),
        occ("ISLINGTON", "T202", ts(13, 11, 0)),
      ],
      false,
    );
    store.persist(now).unwrap();

    let (reloaded, _) = IncidentStore::load(&path, &ft, 1440, 1440, now).unwrap();
    assert_eq!(reloaded.instances().len(), 2);
    assert_eq!(reloaded.instances()[0].series.len(), 1);
  }

  #[test]
  fn persist_archives_previous_live_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("TF.txt");
    let ft = fault_type(vec![th(3, 10)], false);
    let now = ts(13, 12, 0);
    let (mut store, _) = IncidentStore::load(&path, &ft, 1440, 1440, now).unwrap();
    store.merge(&[occ("KIPLING", "T101", ts(13, 10, 0))], false);
    store.persist(now).unwrap();
    store.persist(ts(13, 12, 1)).unwrap();

    let archives: Vec<_> = fs::read_dir(dir.path())
      .unwrap()
      .filter_map(|e| e.ok())
      .map(|e| e.file_name().to_string_lossy().into_owned())
      .filter(|n| n.contains("_deprecated_at_"))
      .collect();
    assert_eq!(archives.len(), 1);
    assert!(archives[0].starts_with("TF_deprecated_at_"));
    assert!(path.exists());
  }

  #[test]
  fn load_expires_old_occurrences_and_drops_empty_instances() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("TF.txt");
    let ft = fault_type(vec![th(3, 60)], false);
    let (mut store, _) = IncidentStore::load(&path, &ft, 1440, 1440, ts(13, 12, 0)).unwrap();
    store.merge(
      &[
        occ("KIPLING", "T101", ts(13, 10, 0)),
        occ("ISLINGTON", "T202", ts(13, 11, 58)),
      ],
      false,
    );
    store.persist(ts(13, 12, 0)).unwrap();

    // An hour later only ISLINGTON's occurrence is still in the window.
    let (reloaded, _) = IncidentStore::load(&path, &ft, 1440, 1440, ts(13, 12, 30)).unwrap();
    assert_eq!(reloaded.instances().len(), 1);
    assert_eq!(reloaded.instances()[0].location, "ISLINGTON");
  }

  #[test]
  fn notified_flag_resets_only_after_max_window() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("TF.txt");
    let ft = fault_type(vec![th(2, 60)], false);
    let notify_time = ts(13, 10, 5);
    let (mut store, _) = IncidentStore::load(&path, &ft, 1440, 1440, notify_time).unwrap();
    store.merge(
      &[
        occ("KIPLING", "T101", ts(13, 10, 0)),
        occ("KIPLING", "T101", ts(13, 10, 4)),
      ],
      false,
    );
    store.evaluate_all(&ft, notify_time);
    store.persist(notify_time).unwrap();

    // 30 minutes later: still inside the window, still notified.
    let (early, _) = IncidentStore::load(&path, &ft, 1440, 1440, ts(13, 10, 35)).unwrap();
    assert_eq!(early.instances()[0].flag, NotifyFlag::Notified(notify_time));

    // 61 minutes after notification the flag resets; the occurrences have
    // expired too, so the instance is dropped.
    let (late, _) = IncidentStore::load(&path, &ft, 1440, 1440, ts(13, 11, 10)).unwrap();
    assert!(late.instances().is_empty());
  }

  #[test]
  fn load_collects_summary_candidates_before_dropping_expired() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("TF.txt");
    let ft = fault_type(vec![th(2, 60)], false);
    let notify_time = ts(13, 10, 5);
    let (mut store, _) = IncidentStore::load(&path, &ft, 1440, 1440, notify_time).unwrap();
    store.merge(
      &[
        occ("KIPLING", "T101", ts(13, 10, 0)),
        occ("KIPLING", "T101", ts(13, 10, 4)),
        occ("KIPLING", "T101", ts(13, 10, 50)),
      ],
      false,
    );
    store.evaluate_all(&ft, notify_time);
    store.persist(notify_time).unwrap();

    // Two hours later, with a 90-minute summary delay: the cool-down has
    // elapsed and the expired occurrences come back as one candidate.
    let (_, candidates) = IncidentStore::load(&path, &ft, 1440, 90, ts(13, 12, 10)).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].entries.len(), 3);
    assert_eq!(candidates[0].notified_at, notify_time);
  }

  #[test]
  fn summary_candidate_includes_still_live_occurrences() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("TF.txt");
    let ft = fault_type(vec![th(2, 60)], false);
    let notify_time = ts(13, 10, 5);
    let (mut store, _) = IncidentStore::load(&path, &ft, 1440, 1440, notify_time).unwrap();
    store.merge(
      &[
        occ("KIPLING", "T101", ts(13, 10, 0)),
        occ("KIPLING", "T101", ts(13, 10, 4)),
        occ("KIPLING", "T101", ts(13, 11, 50)),
      ],
      false,
    );
    store.evaluate_all(&ft, notify_time);
    store.persist(notify_time).unwrap();

    // At 12:10 the first two occurrences have expired but 11:50 is still
    // inside the window; the candidate reports all three, and the live
    // entry stays on the instance.
    let (reloaded, candidates) =
      IncidentStore::load(&path, &ft, 1440, 90, ts(13, 12, 10)).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].entries.len(), 3);
    assert_eq!(candidates[0].entries[2].at, ts(13, 11, 50));
    assert_eq!(reloaded.instances().len(), 1);
    assert_eq!(reloaded.instances()[0].series.len(), 1);
  }

  #[test]
  fn malformed_store_line_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("TF.txt");
    fs::write(
      &path,
      "garbage line\nKIPLING;T101;;;YUS;QUIET;NA;2025-01-13 10:00:00\n",
    )
    .unwrap();
    let ft = fault_type(vec![th(3, 600)], false);
    let (store, _) = IncidentStore::load(&path, &ft, 1440, 1440, ts(13, 12, 0)).unwrap();
    assert_eq!(store.instances().len(), 1);
  }

  #[test]
  fn instance_id_is_stable_and_key_dependent() {
    let a = instance_id("TF", "KIPLING", "T101", "");
    let b = instance_id("TF", "KIPLING", "T101", "");
    let c = instance_id("TF", "KIPLING", "T102", "");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.starts_with("flt-"));
    assert_eq!(a.len(), 4 + 16);
  }
}
