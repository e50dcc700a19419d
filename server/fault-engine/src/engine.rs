//! Per-run orchestration: ingest -> suppress -> merge -> evaluate ->
//! summarize -> persist, with per-fault-type failure isolation.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::catalog::FaultTypeCatalog;
use crate::config::Config;
use crate::error::EngineError;
use crate::ingest::{LogIngestor, LogSource};
use crate::lookup::Lookups;
use crate::markers::MarkerSet;
use crate::router::NotificationRouter;
use crate::store::IncidentStore;
use crate::summary::SummaryBatcher;
use crate::suppress::SuppressionFilter;
use crate::types::{format_ts, FaultType, Occurrence};

/// What happened to one fault type this run.
#[derive(Debug)]
pub struct TypeOutcome {
  pub type_code: String,
  pub merged: usize,
  pub notifications: usize,
  pub summaries: usize,
  /// Set when this type's cycle failed; other types still ran.
  pub error: Option<String>,
}

/// Whole-run accounting for the caller.
#[derive(Debug, Default)]
pub struct RunReport {
  /// Occurrences that survived suppression.
  pub admitted: usize,
  /// Sources skipped as unavailable this run.
  pub skipped_sources: Vec<String>,
  pub outcomes: Vec<TypeOutcome>,
}

/// One batch invocation: run-to-completion, single-threaded, then exit.
pub struct Engine {
  config: Config,
  catalog: FaultTypeCatalog,
  filter: SuppressionFilter,
  lookups: Lookups,
  sources: Vec<LogSource>,
}

impl Engine {
  pub fn new(
    config: Config,
    catalog: FaultTypeCatalog,
    filter: SuppressionFilter,
    lookups: Lookups,
    sources: Vec<LogSource>,
  ) -> Self {
    Self {
      config,
      catalog,
      filter,
      lookups,
      sources,
    }
  }

  /// Perform one full cycle. Only run-wide plumbing failures (directories,
  /// resume-marker rewrite) abort; everything narrower is isolated and
  /// reported in the `RunReport`.
  pub fn run(
    &mut self,
    router: &mut dyn NotificationRouter,
    now: DateTime<Utc>,
  ) -> Result<RunReport, EngineError> {
    fs::create_dir_all(&self.config.store_dir)?;
    fs::create_dir_all(&self.config.export_dir)?;
    if let Some(parent) = self.config.marker_path.parent() {
      fs::create_dir_all(parent)?;
    }

    let mut markers = match MarkerSet::load(&self.config.marker_path) {
      Ok(m) => m,
      Err(e) => {
        // Starting with no markers over-reports; losing the run loses data.
        warn!("resume markers unreadable, starting fresh: {}", e);
        MarkerSet::new()
      }
    };

    let mut report = RunReport::default();
    let occurrences = self.ingest_all(&mut markers, &mut report, now);
    let admitted = self.suppress(occurrences);
    report.admitted = admitted.len();
    self.export_occurrences(&admitted, now);

    let mut by_type: HashMap<&str, Vec<Occurrence>> = HashMap::new();
    for occ in &admitted {
      by_type.entry(occ.type_code.as_str()).or_default().push(occ.clone());
    }

    for fault_type in self.catalog.iter() {
      let occs = by_type.remove(fault_type.code.as_str()).unwrap_or_default();
      let outcome = match self.process_type(fault_type, &occs, router, now) {
        Ok(outcome) => outcome,
        Err(e) => {
          error!(type_code = %fault_type.code, "fault type cycle failed: {}", e);
          TypeOutcome {
            type_code: fault_type.code.clone(),
            merged: occs.len(),
            notifications: 0,
            summaries: 0,
            error: Some(e.to_string()),
          }
        }
      };
      report.outcomes.push(outcome);
    }

    markers.save(&self.config.marker_path)?;
    info!(
      admitted = report.admitted,
      types = report.outcomes.len(),
      skipped_sources = report.skipped_sources.len(),
      "run complete"
    );
    Ok(report)
  }

  fn ingest_all(
    &self,
    markers: &mut MarkerSet,
    report: &mut RunReport,
    now: DateTime<Utc>,
  ) -> Vec<Occurrence> {
    let ingestor = LogIngestor::new(
      &self.catalog,
      &self.lookups,
      self.config.startup_lookback_hours,
    );
    let mut occurrences = Vec::new();
    for source in &self.sources {
      let marker = markers.get(&source.id).cloned();
      let outcome = match ingestor.ingest_source(source, marker.as_ref(), now) {
        Ok(o) => Ok(o),
        Err(EngineError::MarkerNotFound { .. }) => {
          // The resume point vanished; re-read the source fresh and accept
          // possible re-matches of already-seen lines.
          warn!(source = %source.id, "resume marker not found, re-reading source");
          ingestor.ingest_source(source, None, now)
        }
        Err(e) => Err(e),
      };
      match outcome {
        Ok(o) => {
          if let Some((file_name, last_line)) = o.marker {
            markers.set(&source.id, file_name, last_line);
          }
          occurrences.extend(o.occurrences);
        }
        Err(e) => {
          warn!(source = %source.id, "skipping source: {}", e);
          report.skipped_sources.push(source.id.clone());
        }
      }
    }
    occurrences
  }

  fn suppress(&self, occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
    occurrences
      .into_iter()
      .filter(|occ| {
        let Some(fault_type) = self.catalog.get(&occ.type_code) else {
          return false;
        };
        self.filter.admit(occ, fault_type.flags)
      })
      .collect()
  }

  /// Append each admitted occurrence to the per-run export log for
  /// downstream collectors. Fire-and-forget: a write failure is logged
  /// and ignored.
  fn export_occurrences(&self, occurrences: &[Occurrence], now: DateTime<Utc>) {
    if occurrences.is_empty() {
      return;
    }
    let path = self
      .config
      .export_dir
      .join(format!("occurrences_{}.csv", now.format("%Y%m%d%H")));
    let result = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .and_then(|mut f| {
        for occ in occurrences {
          writeln!(
            f,
            "timestamp={},incident_type={},location={},object={}",
            format_ts(occ.at),
            occ.type_code,
            occ.location,
            occ.object
          )?;
        }
        Ok(())
      });
    if let Err(e) = result {
      warn!("occurrence export failed: {}", e);
    }
  }

  fn process_type(
    &self,
    fault_type: &FaultType,
    occurrences: &[Occurrence],
    router: &mut dyn NotificationRouter,
    now: DateTime<Utc>,
  ) -> Result<TypeOutcome, EngineError> {
    let path = self.config.store_dir.join(format!("{}.txt", fault_type.code));
    let (mut store, candidates) = IncidentStore::load(
      &path,
      fault_type,
      self.config.default_window_minutes,
      self.config.summary_delay_minutes,
      now,
    )?;

    store.merge(occurrences, fault_type.flags.onboard);

    let fired = store.evaluate_all(fault_type, now);
    for notification in &fired {
      router.threshold_fired(notification);
    }

    let batcher = SummaryBatcher::new(candidates);
    let summaries = batcher.digests(fault_type, self.config.default_window_minutes);
    for batched in &summaries {
      router.summary_ready(&batched.digest);
      store.set_last_summary(&batched.location, &batched.object, &batched.aux, batched.marker);
    }

    store.persist(now)?;

    Ok(TypeOutcome {
      type_code: fault_type.code.clone(),
      merged: occurrences.len(),
      notifications: fired.len(),
      summaries: summaries.len(),
      error: None,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::suppress::{RevenueSchedule, StaticMute, SuppressionFilter};
  use crate::types::{SummaryDigest, ThresholdNotification};
  use chrono::TimeZone;
  use std::path::Path;
  use tempfile::TempDir;

  #[derive(Default)]
  struct CollectingRouter {
    fired: Vec<ThresholdNotification>,
    summaries: Vec<SummaryDigest>,
  }

  impl NotificationRouter for CollectingRouter {
    fn threshold_fired(&mut self, notification: &ThresholdNotification) {
      self.fired.push(notification.clone());
    }

    fn summary_ready(&mut self, digest: &SummaryDigest) {
      self.summaries.push(digest.clone());
    }
  }

  const TYPES: &str = "TF;TRACK;TRACK FAILURE AT,\\L,TRACK,\\K;s;e;l;[3,10];\n";

  fn write_log(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
  }

  fn engine(root: &TempDir, logs: &Path, mutes: Vec<StaticMute>) -> Engine {
    let config = Config {
      store_dir: root.path().join("stores"),
      marker_path: root.path().join("markers.txt"),
      export_dir: root.path().join("export"),
      ..Config::default()
    };
    let sources = vec![LogSource {
      id: "tcs-a".into(),
      line: "YUS".into(),
      dir: logs.to_path_buf(),
    }];
    Engine::new(
      config,
      FaultTypeCatalog::parse(TYPES, "types.txt"),
      SuppressionFilter::new(mutes, vec![], RevenueSchedule::default()),
      Lookups::default(),
      sources,
    )
  }

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 13, 10, 30, 0).unwrap()
  }

  #[test]
  fn full_cycle_fires_threshold_and_persists() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    write_log(
      logs.path(),
      "2025011310.log",
      "10:00:00 01/13/25 TRACK FAILURE AT KIPLING TRACK T101\n\
       10:05:00 01/13/25 TRACK FAILURE AT KIPLING TRACK T101\n\
       10:08:00 01/13/25 TRACK FAILURE AT KIPLING TRACK T101\n",
    );
    let mut eng = engine(&root, logs.path(), vec![]);
    let mut router = CollectingRouter::default();
    let report = eng.run(&mut router, now()).unwrap();

    assert_eq!(report.admitted, 3);
    assert_eq!(router.fired.len(), 1);
    assert_eq!(router.fired[0].identity.location, "KIPLING");
    assert!(root.path().join("stores/TF.txt").exists());
    assert!(root.path().join("markers.txt").exists());

    // Second run over the same file: the marker prevents re-ingestion,
    // and the notified instance does not fire again.
    let mut router2 = CollectingRouter::default();
    let report2 = eng.run(&mut router2, now()).unwrap();
    assert_eq!(report2.admitted, 0);
    assert!(router2.fired.is_empty());
  }

  #[test]
  fn muted_type_is_suppressed_end_to_end() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    write_log(
      logs.path(),
      "2025011310.log",
      "10:00:00 01/13/25 TRACK FAILURE AT KIPLING TRACK T101\n",
    );
    let mutes = StaticMute::parse_all("TF\n", "mutes");
    let mut eng = engine(&root, logs.path(), mutes);
    let mut router = CollectingRouter::default();
    let report = eng.run(&mut router, now()).unwrap();
    assert_eq!(report.admitted, 0);
    assert!(router.fired.is_empty());
  }

  #[test]
  fn unavailable_source_is_skipped_not_fatal() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let mut eng = engine(&root, &logs.path().join("missing"), vec![]);
    let mut router = CollectingRouter::default();
    let report = eng.run(&mut router, now()).unwrap();
    assert_eq!(report.skipped_sources, vec!["tcs-a".to_string()]);
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.outcomes[0].error.is_none());
  }
}
