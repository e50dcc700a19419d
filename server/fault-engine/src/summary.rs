//! Summary batching: one consolidated digest per instance whose
//! notification cool-down elapsed while occurrences kept arriving.

use crate::store::SummaryCandidate;
use crate::threshold::{evaluate_summary, Outcome};
use crate::timeseries::TimeSeries;
use crate::types::{format_ts, DigestEntry, FaultType, InstanceIdentity, SummaryDigest};

use crate::store::instance_id;
use chrono::{DateTime, Duration, Utc};

/// A digest ready for the router, plus the marker advance the store must
/// record so no occurrence appears in two consecutive summaries.
#[derive(Debug, Clone)]
pub struct BatchedSummary {
  pub digest: SummaryDigest,
  pub location: String,
  pub object: String,
  pub aux: String,
  /// New last-summary marker: the newest reported occurrence.
  pub marker: DateTime<Utc>,
}

/// Builds digests out of the candidates the store captured at load time.
#[derive(Debug, Default)]
pub struct SummaryBatcher {
  candidates: Vec<SummaryCandidate>,
}

impl SummaryBatcher {
  pub fn new(candidates: Vec<SummaryCandidate>) -> Self {
    Self { candidates }
  }

  /// One digest per candidate. When a summary-mode threshold matches the
  /// collected occurrences, the collection must be strictly larger than
  /// that threshold's count (a bare threshold-sized cluster was already
  /// covered by the original notification); a fire whose cluster outspans
  /// the window digests as historical. When no threshold matches at all
  /// the candidate still digests, judged against the type's widest window.
  pub fn digests(&self, fault_type: &FaultType, default_window_minutes: i64) -> Vec<BatchedSummary> {
    let mut out = Vec::new();
    for candidate in &self.candidates {
      let series: TimeSeries = candidate.entries.iter().cloned().collect();
      let Some(newest) = series.last().map(|e| e.at) else {
        continue;
      };
      let matched = fault_type
        .thresholds
        .iter()
        .find_map(|&th| match evaluate_summary(&series, th) {
          Outcome::NotMet => None,
          outcome => Some((th, outcome)),
        });
      let historical = match matched {
        Some((th, _)) if series.len() <= th.count as usize => continue,
        Some((_, outcome)) => matches!(outcome, Outcome::MetButSpanExceedsWindow { .. }),
        None => {
          let window = fault_type.max_window_minutes(default_window_minutes);
          series.span() > Duration::minutes(window)
        }
      };

      let occurrences = series
        .entries()
        .iter()
        .map(|e| DigestEntry {
          at: format_ts(e.at),
          label: e.label.clone(),
        })
        .collect();
      out.push(BatchedSummary {
        digest: SummaryDigest {
          identity: InstanceIdentity {
            id: instance_id(
              &fault_type.code,
              &candidate.location,
              &candidate.object,
              &candidate.aux,
            ),
            type_code: fault_type.code.clone(),
            routing_class: fault_type.routing_class.clone(),
            location: candidate.location.clone(),
            object: candidate.object.clone(),
            aux: candidate.aux.clone(),
            extra: candidate.extra.clone(),
          },
          occurrences,
          since: candidate.last_summary.map(format_ts),
          historical,
          summary_template: fault_type.summary_template.clone(),
        },
        location: candidate.location.clone(),
        object: candidate.object.clone(),
        aux: candidate.aux.clone(),
        marker: newest,
      });
    }
    out
  }
}
