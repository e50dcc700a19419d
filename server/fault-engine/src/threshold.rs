//! Sliding-window threshold evaluation over an ascending time series.

use chrono::{DateTime, Duration, Utc};

use crate::timeseries::TimeSeries;
use crate::types::Threshold;

/// Result of evaluating one threshold against one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  NotMet,
  /// A window of `count` consecutive entries spans less than the
  /// configured minutes. Bounds are the window's first and last entries.
  Met {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  },
  /// Summary mode only: the window condition holds, but the whole series
  /// spans longer than the window — the cluster is too spread out to
  /// count as one fresh repeating pattern.
  MetButSpanExceedsWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  },
}

/// Slide a window of exactly `threshold.count` consecutive entries across
/// the series, oldest end first; the earliest qualifying window wins. A
/// window qualifies when it spans strictly less than `threshold.minutes`.
pub fn evaluate(series: &TimeSeries, threshold: Threshold) -> Outcome {
  let n = threshold.count as usize;
  if n == 0 || series.len() < n {
    return Outcome::NotMet;
  }
  let entries = series.entries();
  let window = Duration::minutes(threshold.minutes);
  for i in 0..=(entries.len() - n) {
    let first = entries[i].at;
    let last = entries[i + n - 1].at;
    if last - first < window {
      return Outcome::Met {
        start: first,
        end: last,
      };
    }
  }
  Outcome::NotMet
}

/// Summary-mode evaluation: same window scan, but a fire whose entire
/// series spans strictly longer than the threshold window is demoted to
/// `MetButSpanExceedsWindow`. A span exactly equal to the window is `Met`.
pub fn evaluate_summary(series: &TimeSeries, threshold: Threshold) -> Outcome {
  match evaluate(series, threshold) {
    Outcome::Met { start, end } if series.span() > Duration::minutes(threshold.minutes) => {
      Outcome::MetButSpanExceedsWindow { start, end }
    }
    other => other,
  }
}
