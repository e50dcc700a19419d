//! Run configuration with sane defaults.

use std::path::PathBuf;

/// Directory layout and tunables for one batch run.
#[derive(Debug, Clone)]
pub struct Config {
  /// Directory holding one durable store file per fault type.
  pub store_dir: PathBuf,
  /// Resume-marker file (source id -> last consumed line).
  pub marker_path: PathBuf,
  /// Directory for the per-run occurrence export logs.
  pub export_dir: PathBuf,
  /// Retention window for types that declare no thresholds, minutes.
  pub default_window_minutes: i64,
  /// How far back a fresh (markerless) source is read, hours.
  pub startup_lookback_hours: i64,
  /// Cool-down before a notified instance qualifies for a summary digest,
  /// minutes.
  pub summary_delay_minutes: i64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      store_dir: PathBuf::from("data/stores"),
      marker_path: PathBuf::from("data/markers.txt"),
      export_dir: PathBuf::from("data/export"),
      default_window_minutes: 1440,
      startup_lookback_hours: 24,
      summary_delay_minutes: 1440,
    }
  }
}
