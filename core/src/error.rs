// flowline/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowlineError {
  #[error("Pipeline '{pipeline}' is closed and no longer accepts messages")]
  Closed { pipeline: String },

  #[error("Invalid configuration for '{field}': {message}")]
  InvalidConfiguration { field: String, message: String },

  #[error("Filter '{step}' panicked: {message}")]
  FilterPanicked { step: String, message: String },

  #[error("Filter '{step}' did not complete within {timeout_ms}ms")]
  FilterTimedOut { step: String, timeout_ms: u128 },

  #[error("Filter '{step}' was aborted before completing")]
  FilterAborted { step: String },

  #[error("Filter '{step}' dropped its continuation without calling it")]
  ContinuationDropped { step: String },

  #[error("Message for pipeline '{pipeline}' was discarded before a worker picked it up")]
  Discarded { pipeline: String },

  #[error("No Tokio runtime is available to dispatch the traversal")]
  NoRuntime,

  #[error("Error in user-provided filter or observer. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },
}

// Lets `Pipeline<T, FlowlineError>` accept filters that return `anyhow::Result`.
impl From<AnyhowError> for FlowlineError {
  fn from(err: AnyhowError) -> Self {
    FlowlineError::HandlerError { source: err }
  }
}

impl FlowlineError {
  /// True for failures raised by the engine around a filter invocation
  /// (panic, timeout, abort, dropped continuation) rather than by the filter itself.
  pub fn is_engine_failure(&self) -> bool {
    matches!(
      self,
      FlowlineError::FilterPanicked { .. }
        | FlowlineError::FilterTimedOut { .. }
        | FlowlineError::FilterAborted { .. }
        | FlowlineError::ContinuationDropped { .. }
    )
  }
}

pub type FlowlineResult<T, E = FlowlineError> = std::result::Result<T, E>;
