// flowline/src/core/control.rs

//! Defines the signals a filter uses to steer a traversal and the terminal
//! classification of a finished traversal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker requesting early, non-error termination of a traversal.
///
/// It carries no data and cannot be confused with a message payload. Filters
/// reach it through [`BREAK`] or `FilterContext::breaker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Breaker;

/// The break sentinel.
pub const BREAK: Breaker = Breaker;

/// What a filter hands back to the engine when it finishes without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
  /// Pass the (possibly transformed) message on to the next filter.
  Continue(T),
  /// Stop the traversal here. The traversal ends as `Disposition::Broke`
  /// and no further filters run.
  Break,
}

impl<T> Step<T> {
  pub fn is_break(&self) -> bool {
    matches!(self, Step::Break)
  }
}

impl<T> From<Breaker> for Step<T> {
  fn from(_: Breaker) -> Self {
    Step::Break
  }
}

/// Terminal classification of a traversal. Exactly one is assigned per traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
  /// Every filter in the chain snapshot ran and continued.
  Succeeded,
  /// A filter returned the break sentinel.
  Broke,
  /// A filter failed, panicked, timed out or lost its continuation.
  Failed,
}

impl Disposition {
  pub fn as_str(&self) -> &'static str {
    match self {
      Disposition::Succeeded => "succeeded",
      Disposition::Broke => "broke",
      Disposition::Failed => "failed",
    }
  }
}

impl fmt::Display for Disposition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
