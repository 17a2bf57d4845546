// flowline/src/pipeline/execution.rs

//! Contains `Pipeline::execute()` and the lifecycle methods. Submission hands
//! the message to the dispatch queue; the traversal runs on a worker task, its
//! outcome goes to the observers and then to the submission's `Receipt`.

use crate::core::flow::{FlowContext, Headers};
use crate::error::{FlowlineError, FlowlineResult};
use crate::pipeline::definition::Pipeline;
use crate::pipeline::traversal::{traverse, Completion};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{event, instrument, Level};

impl<T, E> Pipeline<T, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  /// Submits `message` without headers. See [`Pipeline::execute_with_headers`].
  pub fn execute(&self, message: T) -> FlowlineResult<Receipt<T, E>> {
    self.execute_with_headers(message, Headers::new())
  }

  /// Submits `message` for traversal and returns immediately.
  ///
  /// The returned `Receipt` may be dropped (fire-and-forget; observers still
  /// run) or awaited for this traversal's `Completion`.
  ///
  /// Fails with `FlowlineError::Closed` after [`Pipeline::close`] and with
  /// `FlowlineError::NoRuntime` outside a Tokio runtime.
  #[instrument(name = "Pipeline::execute", skip_all, fields(pipeline = %self.shared.name), err(Display))]
  pub fn execute_with_headers(&self, message: T, headers: Headers) -> FlowlineResult<Receipt<T, E>> {
    let (tx, rx) = oneshot::channel();
    let shared = Arc::clone(&self.shared);

    let job = Box::pin(async move {
      // The chain snapshot is taken when the traversal starts, not at submission.
      let flow = FlowContext::new(shared.name.clone(), headers);
      let chain = shared.chain.snapshot();
      let completion = traverse(chain, message, flow, shared.config.filter_timeout).await;
      shared.observers.emit(&completion);
      // Nobody waiting is fine: the submission was fire-and-forget.
      let _ = tx.send(completion);
    });

    self.queue.submit(job)?;
    event!(Level::TRACE, "Message submitted.");
    Ok(Receipt {
      pipeline: self.shared.name.clone(),
      rx,
    })
  }

  /// Stops admission. Later `execute` calls fail with `Closed`; messages still
  /// waiting for a worker are discarded (their receipts report `Discarded`);
  /// traversals already running finish and notify observers as usual.
  pub fn close(&self) {
    let discarded = self.queue.shutdown();
    if discarded > 0 {
      event!(Level::WARN, pipeline = %self.shared.name, discarded, "Pipeline closed with queued messages; they were discarded.");
    }
    event!(Level::INFO, pipeline = %self.shared.name, "Pipeline closed.");
  }

  pub fn is_closed(&self) -> bool {
    self.queue.is_closed()
  }

  /// Resolves once no traversal is running or queued.
  pub async fn wait_idle(&self) {
    self.queue.wait_idle().await
  }
}

/// Per-submission handle to a traversal's completion.
#[derive(Debug)]
pub struct Receipt<T, E> {
  pipeline: String,
  rx: oneshot::Receiver<Completion<T, E>>,
}

impl<T, E> Receipt<T, E> {
  /// Waits for the traversal to finish. Observers have already been notified
  /// by the time this resolves.
  ///
  /// Fails with `FlowlineError::Discarded` if the message never reached a
  /// worker because the pipeline was closed first.
  pub async fn wait(self) -> FlowlineResult<Completion<T, E>> {
    let pipeline = self.pipeline;
    self.rx.await.map_err(|_| FlowlineError::Discarded { pipeline })
  }
}
