//! Core types for the fault engine (config model, occurrences, output contracts).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// Timestamp format used in durable text files and JSON output.
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp for durable storage / output.
pub fn format_ts(ts: DateTime<Utc>) -> String {
  ts.format(TS_FORMAT).to_string()
}

/// Parse a durable-storage timestamp.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
  NaiveDateTime::parse_from_str(s.trim(), TS_FORMAT)
    .ok()
    .map(|n| n.and_utc())
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// One alerting rule: `count` occurrences within `minutes` fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Threshold {
  pub count: u32,
  pub minutes: i64,
}

// ---------------------------------------------------------------------------
// Processing flags
// ---------------------------------------------------------------------------

/// Per-fault-type processing behaviors, parsed from the config flag string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingFlags {
  /// 'R' — suppress occurrences outside revenue hours.
  pub revenue_hours: bool,
  /// 'N' — resolve the paired redundant unit (the previously active one).
  pub previous_unit: bool,
  /// 'S' — server-identity based: translate unit ids through the hostname
  /// table and take the source's line as the location.
  pub server_identity: bool,
  /// 'O' — onboard/train-scoped: instance identity is the secondary id
  /// only; occurrences carry their location as a per-event label.
  pub onboard: bool,
}

impl ProcessingFlags {
  pub fn parse(s: &str) -> Self {
    let mut flags = Self::default();
    for ch in s.chars() {
      match ch {
        'R' => flags.revenue_hours = true,
        'N' => flags.previous_unit = true,
        'S' => flags.server_identity = true,
        'O' => flags.onboard = true,
        _ => {}
      }
    }
    flags
  }
}

// ---------------------------------------------------------------------------
// Keyword sequence
// ---------------------------------------------------------------------------

/// Which identity field a placeholder keyword extracts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  /// `\L` — primary object/location.
  Location,
  /// `\K` — secondary object/id (track, switch, server, car number).
  Object,
  /// `\E` — first auxiliary field.
  Aux,
  /// `\X` — second auxiliary field.
  Extra,
}

/// One element of a fault type's recognition sequence: either a literal
/// that must appear in the line, or a placeholder extracted from the span
/// between its neighboring literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
  Literal(String),
  Field(FieldKind),
}

impl Keyword {
  pub fn parse(token: &str) -> Self {
    match token {
      "\\L" => Keyword::Field(FieldKind::Location),
      "\\K" => Keyword::Field(FieldKind::Object),
      "\\E" => Keyword::Field(FieldKind::Aux),
      "\\X" => Keyword::Field(FieldKind::Extra),
      other => Keyword::Literal(other.to_string()),
    }
  }
}

// ---------------------------------------------------------------------------
// Fault type definition
// ---------------------------------------------------------------------------

/// Immutable fault-type definition, loaded once per run.
#[derive(Debug, Clone)]
pub struct FaultType {
  /// Short unique code, e.g. "TF".
  pub code: String,
  /// Human-facing object label, e.g. "TRACK".
  pub label: String,
  /// Ordered recognition/extraction sequence.
  pub keywords: Vec<Keyword>,
  /// Opaque pass-through templates for the notification router.
  pub summary_template: String,
  pub event_template: String,
  pub location_template: String,
  /// Evaluated independently, in declaration order.
  pub thresholds: Vec<Threshold>,
  pub flags: ProcessingFlags,
  /// Routing class consumed by the external router.
  pub routing_class: String,
}

impl FaultType {
  /// Largest threshold window in minutes, or `default_minutes` when the
  /// type declares no thresholds. Occurrences older than this cannot
  /// affect any threshold.
  pub fn max_window_minutes(&self, default_minutes: i64) -> i64 {
    self
      .thresholds
      .iter()
      .map(|t| t.minutes)
      .max()
      .unwrap_or(default_minutes)
  }
}

// ---------------------------------------------------------------------------
// Occurrence
// ---------------------------------------------------------------------------

/// One detected fault event, freshly extracted from a log line. Consumed
/// by the suppression filter and the store merge, then discarded.
#[derive(Debug, Clone)]
pub struct Occurrence {
  pub type_code: String,
  pub at: DateTime<Utc>,
  /// Primary object/location (station, interlocking, sector).
  pub location: String,
  /// Secondary object/id (track, switch, server name, car number).
  pub object: String,
  /// Auxiliary fields; meaning is fault-type-specific.
  pub aux: String,
  pub extra: String,
  /// The log source's declared line/sector.
  pub line: String,
}

// ---------------------------------------------------------------------------
// Notification-flag state
// ---------------------------------------------------------------------------

/// Per-instance notification state. `Quiet -> Notified(t)` on a threshold
/// fire; `Notified(t) -> Quiet` only when the cool-down expires at load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyFlag {
  Quiet,
  Notified(DateTime<Utc>),
}

// ---------------------------------------------------------------------------
// Output types (JSON contract — what the router receives)
// ---------------------------------------------------------------------------

/// Identity of a fault instance as exposed to the router.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceIdentity {
  /// Stable short id derived from the identity key ("flt-<16 hex>").
  pub id: String,
  pub type_code: String,
  pub routing_class: String,
  pub location: String,
  pub object: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub aux: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub extra: String,
}

/// A threshold fire: "notify about this instance, this rule, this window."
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdNotification {
  pub identity: InstanceIdentity,
  pub threshold: Threshold,
  pub window_start: String,
  pub window_end: String,
  /// Timestamps of the occurrences inside the firing window.
  pub occurrences: Vec<String>,
  pub event_template: String,
  pub location_template: String,
}

/// One occurrence inside a summary digest.
#[derive(Debug, Clone, Serialize)]
pub struct DigestEntry {
  pub at: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
}

/// Consolidated digest of everything an instance accumulated since the
/// last summary (or since first detection).
#[derive(Debug, Clone, Serialize)]
pub struct SummaryDigest {
  pub identity: InstanceIdentity,
  pub occurrences: Vec<DigestEntry>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub since: Option<String>,
  /// True when the pattern fired but the whole cluster spans longer than
  /// the threshold window — report as historical, not freshly repeating.
  pub historical: bool,
  pub summary_template: String,
}
