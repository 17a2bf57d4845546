// flowline/src/pipeline/observers.rs

//! Per-disposition observer lists and outcome emission.

use crate::core::control::{Breaker, Disposition, BREAK};
use crate::core::flow::{Bindings, FlowContext};
use crate::pipeline::traversal::{panic_message, Completion, Outcome};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{event, Level};

pub type SuccessObserver<T> = Arc<dyn Fn(&T, &FlowContext, &Bindings) + Send + Sync>;
pub type FailureObserver<E> = Arc<dyn Fn(&E, &FlowContext, &Bindings) + Send + Sync>;
pub type BreakObserver = Arc<dyn Fn(&Breaker, &FlowContext, &Bindings) + Send + Sync>;
pub type FlowObserver = Arc<dyn Fn(&FlowContext, &Bindings) + Send + Sync>;

struct Registration<H> {
  handler: H,
  bindings: Arc<Bindings>,
}

impl<H: Clone> Clone for Registration<H> {
  fn clone(&self) -> Self {
    Self {
      handler: self.handler.clone(),
      bindings: Arc::clone(&self.bindings),
    }
  }
}

pub(crate) struct Observers<T, E> {
  succeeded: RwLock<Vec<Registration<SuccessObserver<T>>>>,
  broke: RwLock<Vec<Registration<BreakObserver>>>,
  failed: RwLock<Vec<Registration<FailureObserver<E>>>>,
  always: RwLock<Vec<Registration<FlowObserver>>>,
  warned_unobserved_failure: AtomicBool,
}

impl<T, E> Observers<T, E>
where
  E: std::fmt::Display,
{
  pub(crate) fn new() -> Self {
    Self {
      succeeded: RwLock::new(Vec::new()),
      broke: RwLock::new(Vec::new()),
      failed: RwLock::new(Vec::new()),
      always: RwLock::new(Vec::new()),
      warned_unobserved_failure: AtomicBool::new(false),
    }
  }

  pub(crate) fn add_succeeded(&self, handler: SuccessObserver<T>, bindings: Bindings) {
    self.succeeded.write().push(Registration {
      handler,
      bindings: Arc::new(bindings),
    });
  }

  pub(crate) fn add_broke(&self, handler: BreakObserver, bindings: Bindings) {
    self.broke.write().push(Registration {
      handler,
      bindings: Arc::new(bindings),
    });
  }

  pub(crate) fn add_failed(&self, handler: FailureObserver<E>, bindings: Bindings) {
    self.failed.write().push(Registration {
      handler,
      bindings: Arc::new(bindings),
    });
  }

  pub(crate) fn add_always(&self, handler: FlowObserver, bindings: Bindings) {
    self.always.write().push(Registration {
      handler,
      bindings: Arc::new(bindings),
    });
  }

  pub(crate) fn count(&self, disposition: Disposition) -> usize {
    match disposition {
      Disposition::Succeeded => self.succeeded.read().len(),
      Disposition::Broke => self.broke.read().len(),
      Disposition::Failed => self.failed.read().len(),
    }
  }

  pub(crate) fn always_count(&self) -> usize {
    self.always.read().len()
  }

  /// Notifies the observers of the matching disposition, then every "always"
  /// observer, each in registration order.
  ///
  /// Lists are copied before calling out so an observer may register further
  /// observers without deadlocking; those apply to later emissions only.
  pub(crate) fn emit(&self, completion: &Completion<T, E>) {
    let flow = &completion.flow;
    match &completion.outcome {
      Outcome::Succeeded(result) => {
        let handlers = self.succeeded.read().clone();
        for (idx, reg) in handlers.iter().enumerate() {
          guarded(flow, "succeeded", idx, || (reg.handler)(result, flow, reg.bindings.as_ref()));
        }
      }
      Outcome::Broke => {
        let handlers = self.broke.read().clone();
        for (idx, reg) in handlers.iter().enumerate() {
          guarded(flow, "broke", idx, || (reg.handler)(&BREAK, flow, reg.bindings.as_ref()));
        }
      }
      Outcome::Failed(err) => {
        let handlers = self.failed.read().clone();
        if handlers.is_empty() && !self.warned_unobserved_failure.swap(true, Ordering::Relaxed) {
          event!(
            Level::WARN,
            pipeline = %flow.pipeline_name(),
            traversal_id = %flow.id(),
            error = %err,
            "Traversal failed but no failed-observer is registered; failures of this pipeline go unreported."
          );
        }
        for (idx, reg) in handlers.iter().enumerate() {
          guarded(flow, "failed", idx, || (reg.handler)(err, flow, reg.bindings.as_ref()));
        }
      }
    }

    let handlers = self.always.read().clone();
    for (idx, reg) in handlers.iter().enumerate() {
      guarded(flow, "always", idx, || (reg.handler)(flow, reg.bindings.as_ref()));
    }
  }
}

fn guarded(flow: &FlowContext, kind: &'static str, index: usize, call: impl FnOnce()) {
  if let Err(payload) = catch_unwind(AssertUnwindSafe(call)) {
    event!(
      Level::ERROR,
      pipeline = %flow.pipeline_name(),
      traversal_id = %flow.id(),
      observer_kind = kind,
      observer_index = index,
      panic = %panic_message(payload),
      "Observer panicked; continuing with remaining observers."
    );
  }
}
