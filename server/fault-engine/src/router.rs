//! Notification routing boundary.
//!
//! The engine decides "notify about X"; rendering and delivery live
//! outside it. The built-in implementation writes one JSON object per
//! notification to a stream, for an external delivery process to consume.

use std::io::Write;

use serde::Serialize;

use crate::types::{SummaryDigest, ThresholdNotification};

/// External collaborator that receives notification requests.
pub trait NotificationRouter {
  fn threshold_fired(&mut self, notification: &ThresholdNotification);
  fn summary_ready(&mut self, digest: &SummaryDigest);
}

#[derive(Serialize)]
struct Emitted<'a, T: Serialize> {
  kind: &'static str,
  #[serde(flatten)]
  body: &'a T,
}

/// Writes each notification as one JSON line.
pub struct JsonLineRouter<W: Write> {
  out: W,
}

impl<W: Write> JsonLineRouter<W> {
  pub fn new(out: W) -> Self {
    Self { out }
  }

  fn emit<T: Serialize>(&mut self, kind: &'static str, body: &T) {
    // Delivery failures are the collaborator's problem; the engine's
    // durable state must not depend on them.
    let _ = serde_json::to_writer(&mut self.out, &Emitted { kind, body });
    let _ = writeln!(self.out);
  }
}

impl<W: Write> NotificationRouter for JsonLineRouter<W> {
  fn threshold_fired(&mut self, notification: &ThresholdNotification) {
    self.emit("threshold", notification);
  }

  fn summary_ready(&mut self, digest: &SummaryDigest) {
    self.emit("summary", digest);
  }
}
