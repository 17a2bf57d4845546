// flowline/src/core/flow.rs

//! Per-traversal state: progress, timing and the final disposition.

use crate::core::control::Disposition;
use crate::core::describe::positional_label;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Caller-supplied metadata travelling with a message. Opaque to the engine.
pub type Headers = serde_json::Map<String, serde_json::Value>;

/// Data bound to a filter or observer at registration time.
pub type Bindings = serde_json::Map<String, serde_json::Value>;

/// Unique identifier of one traversal. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TraversalId(Uuid);

impl TraversalId {
  pub fn generate() -> Self {
    TraversalId(Uuid::new_v4())
  }

  pub fn as_uuid(&self) -> &Uuid {
    &self.0
  }
}

impl fmt::Display for TraversalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.simple())
  }
}

/// Anything the flow context can record as a step.
pub trait Named {
  fn display_name(&self) -> Option<&str>;
}

/// Tracks one message's passage through a filter chain.
///
/// Owned by exactly one traversal and mutated sequentially by it. Observers and
/// receipts only ever see it after [`FlowContext::complete`] has run.
#[derive(Debug, Clone, Serialize)]
pub struct FlowContext {
  id: TraversalId,
  pipeline_name: String,
  steps_taken: usize,
  step_stack: Vec<String>,
  started_at: DateTime<Utc>,
  #[serde(skip)]
  started_instant: Instant,
  finished: bool,
  disposition: Option<Disposition>,
  finished_at: Option<DateTime<Utc>>,
  duration_ms: Option<u64>,
  headers: Arc<Headers>,
}

impl FlowContext {
  pub fn new(pipeline_name: impl Into<String>, headers: Headers) -> Self {
    Self {
      id: TraversalId::generate(),
      pipeline_name: pipeline_name.into(),
      steps_taken: 0,
      step_stack: Vec::new(),
      started_at: Utc::now(),
      started_instant: Instant::now(),
      finished: false,
      disposition: None,
      finished_at: None,
      duration_ms: None,
      headers: Arc::new(headers),
    }
  }

  /// Counts `entry` as the next step and pushes its display name. Returns the
  /// entry unchanged so the caller can invoke it.
  pub fn record_step<'e, N: Named + ?Sized>(&mut self, entry: &'e N) -> &'e N {
    self.steps_taken += 1;
    let name = entry
      .display_name()
      .map(str::to_string)
      .unwrap_or_else(|| positional_label(self.steps_taken));
    self.step_stack.push(name);
    entry
  }

  /// Marks the traversal finished. Only the first call has any effect; the
  /// return value tells whether this call was the one that took effect.
  pub fn complete(&mut self, disposition: Disposition) -> bool {
    if self.finished {
      return false;
    }
    self.finished = true;
    self.disposition = Some(disposition);
    self.finished_at = Some(Utc::now());
    self.duration_ms = Some(self.started_instant.elapsed().as_millis() as u64);
    true
  }

  pub fn id(&self) -> TraversalId {
    self.id
  }

  pub fn pipeline_name(&self) -> &str {
    &self.pipeline_name
  }

  pub fn steps_taken(&self) -> usize {
    self.steps_taken
  }

  pub fn step_stack(&self) -> &[String] {
    &self.step_stack
  }

  /// Display name of the most recently recorded step.
  pub fn current_step(&self) -> Option<&str> {
    self.step_stack.last().map(String::as_str)
  }

  pub fn started_at(&self) -> DateTime<Utc> {
    self.started_at
  }

  pub fn is_finished(&self) -> bool {
    self.finished
  }

  pub fn disposition(&self) -> Option<Disposition> {
    self.disposition
  }

  pub fn finished_at(&self) -> Option<DateTime<Utc>> {
    self.finished_at
  }

  pub fn duration_ms(&self) -> Option<u64> {
    self.duration_ms
  }

  pub fn headers(&self) -> &Headers {
    &self.headers
  }

  /// JSON view of the context for logs and diagnostics.
  pub fn snapshot(&self) -> serde_json::Value {
    serde_json::to_value(self).unwrap_or_default()
  }

  pub(crate) fn shared_headers(&self) -> Arc<Headers> {
    Arc::clone(&self.headers)
  }
}
