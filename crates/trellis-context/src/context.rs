//! Execution context and scope derivation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

type Bag = Arc<RwLock<HashMap<String, serde_json::Value>>>;

/// Context threaded through every primitive call.
///
/// A context is created once per root execution and derived for nested
/// scopes. The metadata and state bags are guarded for concurrent access,
/// but concurrent mutation of the *same* key by sibling branches is
/// undefined by contract and must be avoided by the caller's design.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
  correlation_id: String,
  workflow_id: Option<String>,
  session_id: Option<String>,
  metadata: Bag,
  state: Bag,
  cancel: CancellationToken,
  deadline: Option<Instant>,
}

impl ExecutionContext {
  /// Create a fresh root context with a new correlation id.
  pub fn new() -> Self {
    Self {
      correlation_id: uuid::Uuid::new_v4().to_string(),
      workflow_id: None,
      session_id: None,
      metadata: Arc::new(RwLock::new(HashMap::new())),
      state: Arc::new(RwLock::new(HashMap::new())),
      cancel: CancellationToken::new(),
      deadline: None,
    }
  }

  /// Attach a caller-supplied workflow id for logical grouping.
  pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
    self.workflow_id = Some(workflow_id.into());
    self
  }

  /// Attach a caller-supplied session id for logical grouping.
  pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
    self.session_id = Some(session_id.into());
    self
  }

  /// Correlation id, stable across an entire root-to-leaf execution.
  pub fn correlation_id(&self) -> &str {
    &self.correlation_id
  }

  pub fn workflow_id(&self) -> Option<&str> {
    self.workflow_id.as_deref()
  }

  pub fn session_id(&self) -> Option<&str> {
    self.session_id.as_deref()
  }

  /// Read a metadata value.
  pub fn metadata_value(&self, key: &str) -> Option<serde_json::Value> {
    read_bag(&self.metadata).get(key).cloned()
  }

  /// Write a metadata value.
  pub fn set_metadata(&self, key: impl Into<String>, value: serde_json::Value) {
    write_bag(&self.metadata).insert(key.into(), value);
  }

  /// Snapshot of the metadata bag.
  pub fn metadata_snapshot(&self) -> HashMap<String, serde_json::Value> {
    read_bag(&self.metadata).clone()
  }

  /// Read a state value.
  pub fn state_value(&self, key: &str) -> Option<serde_json::Value> {
    read_bag(&self.state).get(key).cloned()
  }

  /// Write a state value.
  pub fn set_state(&self, key: impl Into<String>, value: serde_json::Value) {
    write_bag(&self.state).insert(key.into(), value);
  }

  /// Remove a state value, returning it if present.
  pub fn remove_state(&self, key: &str) -> Option<serde_json::Value> {
    write_bag(&self.state).remove(key)
  }

  /// Snapshot of the state bag.
  pub fn state_snapshot(&self) -> HashMap<String, serde_json::Value> {
    read_bag(&self.state).clone()
  }

  /// Merge another context's bags into this one. Entries from `other` win.
  ///
  /// Intended for callers that fan out isolated children and want to fold
  /// selected results back in after fan-in.
  pub fn absorb(&self, other: &ExecutionContext) {
    let other_metadata = other.metadata_snapshot();
    write_bag(&self.metadata).extend(other_metadata);
    let other_state = other.state_snapshot();
    write_bag(&self.state).extend(other_state);
  }

  /// Derive an isolated child scope.
  ///
  /// The child carries the same identifiers and deadline, copies of both
  /// bags, and a child cancellation token. Writes in the child stay local
  /// unless the parent explicitly merges them back with [`absorb`].
  ///
  /// [`absorb`]: ExecutionContext::absorb
  pub fn child(&self) -> Self {
    Self {
      correlation_id: self.correlation_id.clone(),
      workflow_id: self.workflow_id.clone(),
      session_id: self.session_id.clone(),
      metadata: Arc::new(RwLock::new(self.metadata_snapshot())),
      state: Arc::new(RwLock::new(self.state_snapshot())),
      cancel: self.cancel.child_token(),
      deadline: self.deadline,
    }
  }

  /// Derive a scope with a tightened deadline.
  ///
  /// The scope shares both bags with the parent (state written inside the
  /// scope stays visible after it returns), gets a child cancellation token,
  /// and a deadline of `now + limit` or the inherited deadline, whichever
  /// comes first.
  pub fn deadline_scope(&self, limit: Duration) -> Self {
    let candidate = Instant::now() + limit;
    let deadline = match self.deadline {
      Some(inherited) => Some(inherited.min(candidate)),
      None => Some(candidate),
    };
    Self {
      cancel: self.cancel.child_token(),
      deadline,
      ..self.clone()
    }
  }

  /// Derive a scope detached from upstream cancellation.
  ///
  /// Shares identifiers and bags but carries a fresh token and no deadline.
  /// Used for compensation work that must run even though the triggering
  /// execution was cancelled or timed out.
  pub fn detached(&self) -> Self {
    Self {
      cancel: CancellationToken::new(),
      deadline: None,
      ..self.clone()
    }
  }

  /// Cancel this scope and everything derived from it.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// The cancellation token for this scope.
  pub fn cancel_token(&self) -> &CancellationToken {
    &self.cancel
  }

  /// The effective deadline for this scope, if any.
  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Time remaining until the deadline. `None` when no deadline is set.
  pub fn remaining(&self) -> Option<Duration> {
    self
      .deadline
      .map(|d| d.saturating_duration_since(Instant::now()))
  }

  /// Whether this scope has been cancelled or its deadline has passed.
  pub fn is_cancelled(&self) -> bool {
    if self.cancel.is_cancelled() {
      return true;
    }
    matches!(self.deadline, Some(d) if Instant::now() >= d)
  }

  /// Wait until this scope is cancelled or its deadline passes.
  pub async fn cancelled(&self) {
    match self.deadline {
      Some(deadline) => {
        tokio::select! {
          _ = self.cancel.cancelled() => {}
          _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
        }
      }
      None => self.cancel.cancelled().await,
    }
  }
}

impl Default for ExecutionContext {
  fn default() -> Self {
    Self::new()
  }
}

fn read_bag(bag: &Bag) -> std::sync::RwLockReadGuard<'_, HashMap<String, serde_json::Value>> {
  bag.read().unwrap_or_else(|e| e.into_inner())
}

fn write_bag(bag: &Bag) -> std::sync::RwLockWriteGuard<'_, HashMap<String, serde_json::Value>> {
  bag.write().unwrap_or_else(|e| e.into_inner())
}
