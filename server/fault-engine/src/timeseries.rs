//! Chronologically ordered occurrence timestamps for one fault instance.

use chrono::{DateTime, Duration, Utc};

/// One occurrence entry. The label is only populated for instance kinds
/// whose occurrences carry a per-event location (onboard faults).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesEntry {
  pub at: DateTime<Utc>,
  pub label: Option<String>,
}

/// Ascending series of occurrence timestamps. Insertion keeps strict
/// chronological order; a repeat of an existing instant is dropped (the
/// anti-flood rule: same-instant repeats collapse to one entry).
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
  entries: Vec<SeriesEntry>,
}

impl TimeSeries {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert in chronological position. Returns false (no-op) when an entry
  /// with the same timestamp already exists.
  pub fn insert(&mut self, at: DateTime<Utc>, label: Option<String>) -> bool {
    match self.entries.binary_search_by_key(&at, |e| e.at) {
      Ok(_) => false,
      Err(pos) => {
        self.entries.insert(pos, SeriesEntry { at, label });
        true
      }
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn first(&self) -> Option<&SeriesEntry> {
    self.entries.first()
  }

  pub fn last(&self) -> Option<&SeriesEntry> {
    self.entries.last()
  }

  pub fn entries(&self) -> &[SeriesEntry] {
    &self.entries
  }

  /// Time between the oldest and newest entry (zero for 0 or 1 entries).
  pub fn span(&self) -> Duration {
    match (self.entries.first(), self.entries.last()) {
      (Some(first), Some(last)) => last.at - first.at,
      _ => Duration::zero(),
    }
  }

  /// Remove and return every entry strictly older than `cutoff`.
  pub fn split_expired(&mut self, cutoff: DateTime<Utc>) -> Vec<SeriesEntry> {
    let keep_from = self.entries.partition_point(|e| e.at < cutoff);
    self.entries.drain(..keep_from).collect()
  }
}

impl FromIterator<SeriesEntry> for TimeSeries {
  fn from_iter<I: IntoIterator<Item = SeriesEntry>>(iter: I) -> Self {
    let mut series = TimeSeries::new();
    for e in iter {
      series.insert(e.at, e.label);
    }
    series
  }
}
