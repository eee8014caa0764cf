use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use trellis_core::Outcome;

/// Which half of a saga step an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaAction {
  Forward,
  Compensation,
}

/// One recorded forward or compensation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SagaAuditEntry {
  pub saga: String,
  pub step: String,
  pub action: SagaAction,
  pub outcome: Outcome,
  pub recorded_at: DateTime<Utc>,
}

/// A shared, append-only trail of saga activity.
///
/// Clones share the same underlying trail, so a single audit handle can be
/// attached to several sagas and read back after a workflow completes.
#[derive(Debug, Clone, Default)]
pub struct SagaAudit {
  entries: Arc<RwLock<Vec<SagaAuditEntry>>>,
}

impl SagaAudit {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&self, saga: &str, step: &str, action: SagaAction, outcome: Outcome) {
    let entry = SagaAuditEntry {
      saga: saga.to_string(),
      step: step.to_string(),
      action,
      outcome,
      recorded_at: Utc::now(),
    };
    self
      .entries
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .push(entry);
  }

  /// Snapshot of the trail in recording order.
  pub fn entries(&self) -> Vec<SagaAuditEntry> {
    self
      .entries
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  pub fn len(&self) -> usize {
    self
      .entries
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_clones_share_one_trail() {
    let audit = SagaAudit::new();
    let other = audit.clone();

    audit.record("order", "reserve", SagaAction::Forward, Outcome::Success);
    other.record("order", "reserve", SagaAction::Compensation, Outcome::Failure);

    let entries = audit.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, SagaAction::Forward);
    assert_eq!(entries[1].action, SagaAction::Compensation);
    assert_eq!(entries[1].outcome, Outcome::Failure);
  }
}
