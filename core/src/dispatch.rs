// flowline/src/dispatch.rs

//! Bounded-concurrency admission of traversals.
//!
//! Submissions start immediately while fewer than `concurrency` traversals are
//! active and wait in a FIFO backlog otherwise. A finishing traversal hands its
//! slot straight to the oldest backlog item. Start order is FIFO; finish
//! order is not.

use crate::error::{FlowlineError, FlowlineResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{event, Level};

/// A unit of work admitted by the queue. Nothing runs until a worker polls it.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
  pub concurrency: usize,
  pub active: usize,
  pub queued: usize,
  pub closed: bool,
}

struct QueueState {
  backlog: VecDeque<Job>,
  active: usize,
  closed: bool,
}

struct QueueShared {
  name: String,
  concurrency: usize,
  state: Mutex<QueueState>,
  idle: Notify,
}

pub struct DispatchQueue {
  shared: Arc<QueueShared>,
}

impl DispatchQueue {
  /// `concurrency` must be positive; `PipelineConfig::validate` enforces it.
  pub fn new(name: impl Into<String>, concurrency: usize) -> Self {
    Self {
      shared: Arc::new(QueueShared {
        name: name.into(),
        concurrency: concurrency.max(1),
        state: Mutex::new(QueueState {
          backlog: VecDeque::new(),
          active: 0,
          closed: false,
        }),
        idle: Notify::new(),
      }),
    }
  }

  /// Admits `job` without blocking. Must be called from within a Tokio runtime.
  pub fn submit(&self, job: Job) -> FlowlineResult<()> {
    let handle = Handle::try_current().map_err(|_| FlowlineError::NoRuntime)?;

    let mut state = self.shared.state.lock();
    if state.closed {
      return Err(FlowlineError::Closed {
        pipeline: self.shared.name.clone(),
      });
    }
    if state.active < self.shared.concurrency {
      state.active += 1;
      let active = state.active;
      drop(state);
      event!(Level::TRACE, queue = %self.shared.name, active, "Job admitted to a free worker slot.");
      spawn_worker(handle, Arc::clone(&self.shared), job);
    } else {
      state.backlog.push_back(job);
      event!(Level::TRACE, queue = %self.shared.name, queued = state.backlog.len(), "All worker slots busy; job queued.");
    }
    Ok(())
  }

  /// Stops admission. Backlog items that never started are dropped and their
  /// count returned; running jobs are left to finish.
  pub fn shutdown(&self) -> usize {
    let (discarded, now_idle) = {
      let mut state = self.shared.state.lock();
      if state.closed {
        return 0;
      }
      state.closed = true;
      (std::mem::take(&mut state.backlog), state.active == 0)
    };
    let count = discarded.len();
    // Dropped outside the lock: jobs own receipt senders.
    drop(discarded);
    if now_idle {
      self.shared.idle.notify_waiters();
    }
    count
  }

  pub fn is_closed(&self) -> bool {
    self.shared.state.lock().closed
  }

  pub fn stats(&self) -> QueueStats {
    let state = self.shared.state.lock();
    QueueStats {
      concurrency: self.shared.concurrency,
      active: state.active,
      queued: state.backlog.len(),
      closed: state.closed,
    }
  }

  /// Resolves once no job is running and none is queued.
  pub async fn wait_idle(&self) {
    loop {
      let notified = self.shared.idle.notified();
      let mut notified = std::pin::pin!(notified);
      notified.as_mut().enable();
      if self.shared.is_idle() {
        return;
      }
      notified.await;
    }
  }
}

impl QueueShared {
  fn is_idle(&self) -> bool {
    let state = self.state.lock();
    state.active == 0 && state.backlog.is_empty()
  }
}

fn release(shared: &Arc<QueueShared>, handle: &Handle) {
  let mut state = shared.state.lock();
  let next = if state.closed { None } else { state.backlog.pop_front() };
  match next {
    // The slot passes straight to the next job; `active` is unchanged.
    Some(job) => {
      drop(state);
      spawn_worker(handle.clone(), Arc::clone(shared), job);
    }
    None => {
      state.active -= 1;
      let idle = state.active == 0 && state.backlog.is_empty();
      drop(state);
      if idle {
        shared.idle.notify_waiters();
      }
    }
  }
}

/// Gives up a slot whose worker task was dropped before it was ever polled,
/// which only happens while the runtime shuts down. Handing the slot on would
/// spawn onto the same dying runtime, so the backlog is dropped instead.
fn abandon(shared: &QueueShared) {
  let (discarded, idle) = {
    let mut state = shared.state.lock();
    state.active -= 1;
    (std::mem::take(&mut state.backlog), state.active == 0)
  };
  let count = discarded.len();
  // Unspawned jobs hold no slot guard; dropping them only closes their receipts.
  drop(discarded);
  if count > 0 {
    event!(Level::WARN, queue = %shared.name, discarded = count, "Runtime shut down with queued jobs; they were discarded.");
  }
  if idle {
    shared.idle.notify_waiters();
  }
}

/// Returns the worker slot when dropped, which also covers a job that panics.
struct SlotGuard {
  shared: Arc<QueueShared>,
  handle: Handle,
  started: bool,
}

impl Drop for SlotGuard {
  fn drop(&mut self) {
    if self.started {
      release(&self.shared, &self.handle);
    } else {
      abandon(&self.shared);
    }
  }
}

fn spawn_worker(handle: Handle, shared: Arc<QueueShared>, job: Job) {
  let mut guard = SlotGuard {
    shared,
    handle: handle.clone(),
    started: false,
  };
  handle.spawn(async move {
    guard.started = true;
    let _slot = guard;
    job.await;
  });
}
