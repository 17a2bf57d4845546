// flowline/src/pipeline/traversal.rs

//! Drives one message through a chain snapshot and produces exactly one
//! terminal outcome.

use crate::core::control::{Disposition, Step};
use crate::core::filter::{FilterContext, FilterEntry};
use crate::core::flow::FlowContext;
use crate::error::FlowlineError;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, instrument, Level};

/// Terminal result of a traversal.
#[derive(Debug)]
pub enum Outcome<T, E> {
  /// Every filter continued; carries the message returned by the last one
  /// (or the original message for an empty chain).
  Succeeded(T),
  /// A filter returned the break sentinel.
  Broke,
  /// A filter failed; carries its error.
  Failed(E),
}

impl<T, E> Outcome<T, E> {
  pub fn disposition(&self) -> Disposition {
    match self {
      Outcome::Succeeded(_) => Disposition::Succeeded,
      Outcome::Broke => Disposition::Broke,
      Outcome::Failed(_) => Disposition::Failed,
    }
  }

  pub fn succeeded(self) -> Option<T> {
    match self {
      Outcome::Succeeded(message) => Some(message),
      _ => None,
    }
  }

  pub fn failed(self) -> Option<E> {
    match self {
      Outcome::Failed(err) => Some(err),
      _ => None,
    }
  }
}

/// A finished traversal: its outcome plus the completed flow context.
#[derive(Debug)]
pub struct Completion<T, E> {
  pub outcome: Outcome<T, E>,
  pub flow: FlowContext,
}

impl<T, E> Completion<T, E> {
  pub fn disposition(&self) -> Disposition {
    self.outcome.disposition()
  }

  pub fn into_parts(self) -> (Outcome<T, E>, FlowContext) {
    (self.outcome, self.flow)
  }
}

/// Runs `message` through `chain` in order.
///
/// Every filter invocation is spawned onto the runtime, so each step starts on a
/// fresh scheduling turn and a panic inside a filter surfaces as a join error
/// instead of unwinding through the engine.
#[instrument(
  name = "Pipeline::traverse",
  skip_all,
  fields(
    pipeline = %flow.pipeline_name(),
    traversal_id = %flow.id(),
    chain_len = chain.len(),
  )
)]
pub(crate) async fn traverse<T, E>(
  chain: Vec<Arc<FilterEntry<T, E>>>,
  message: T,
  mut flow: FlowContext,
  default_timeout: Option<Duration>,
) -> Completion<T, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  // Never start inside the submitting call.
  tokio::task::yield_now().await;
  event!(Level::DEBUG, "Traversal starting.");

  let mut pending: VecDeque<Arc<FilterEntry<T, E>>> = chain.into();
  let mut current = message;

  let outcome = loop {
    let Some(next_entry) = pending.pop_front() else {
      break Outcome::Succeeded(current);
    };
    let entry = flow.record_step(next_entry.as_ref());
    let step_name = flow.current_step().unwrap_or_default().to_string();
    event!(Level::DEBUG, step = %step_name, step_index = flow.steps_taken(), "Invoking filter.");

    let ctx = FilterContext::new(flow.id(), flow.shared_headers(), step_name, Arc::clone(&entry.bindings));
    let timeout = entry.timeout.or(default_timeout);

    match invoke_filter(entry, current, ctx, timeout).await {
      Ok(Step::Continue(next_message)) => current = next_message,
      Ok(Step::Break) => {
        event!(Level::DEBUG, step = ?flow.current_step(), "Filter requested break.");
        break Outcome::Broke;
      }
      Err(err) => {
        event!(Level::DEBUG, step = ?flow.current_step(), error = %err, "Filter failed.");
        break Outcome::Failed(err);
      }
    }
  };

  let disposition = outcome.disposition();
  flow.complete(disposition);
  event!(
    Level::INFO,
    %disposition,
    steps_taken = flow.steps_taken(),
    duration_ms = flow.duration_ms().unwrap_or_default(),
    "Traversal finished."
  );

  Completion { outcome, flow }
}

async fn invoke_filter<T, E>(
  entry: &FilterEntry<T, E>,
  message: T,
  ctx: FilterContext,
  timeout: Option<Duration>,
) -> Result<Step<T>, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  let step = ctx.step.clone();
  let filter = Arc::clone(&entry.filter);
  // The filter is called inside the task so a panic while building its future is caught too.
  let mut handle = tokio::spawn(async move { filter(message, ctx).await });

  let joined = match timeout {
    Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
      Ok(joined) => joined,
      Err(_) => {
        handle.abort();
        event!(Level::WARN, %step, timeout_ms = limit.as_millis() as u64, "Filter timed out.");
        return Err(E::from(FlowlineError::FilterTimedOut {
          step,
          timeout_ms: limit.as_millis(),
        }));
      }
    },
    None => handle.await,
  };

  joined.unwrap_or_else(|join_err| {
    if join_err.is_panic() {
      let message = panic_message(join_err.into_panic());
      event!(Level::ERROR, %step, panic = %message, "Filter panicked.");
      Err(E::from(FlowlineError::FilterPanicked { step, message }))
    } else {
      Err(E::from(FlowlineError::FilterAborted { step }))
    }
  })
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
