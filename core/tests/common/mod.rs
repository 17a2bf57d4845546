// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use flowline::{FilterContext, FlowlineError, Step};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tracing::Level;

// --- Common Message Types ---
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Order {
  pub id: u32,
  pub amount: i64,
  pub notes: Vec<String>,
}

impl Order {
  pub fn new(id: u32, amount: i64) -> Self {
    Self {
      id,
      amount,
      notes: Vec::new(),
    }
  }
}

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Flowline framework error: {0}")]
  Flowline(String), // Stored as String for Eq comparison

  #[error("Test filter failed: {0}")]
  Filter(String),
}

impl From<FlowlineError> for TestError {
  fn from(fe: FlowlineError) -> Self {
    TestError::Flowline(format!("{:?}", fe))
  }
}

/// Shared, ordered record of which filters ran.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
  Arc::new(Mutex::new(Vec::new()))
}

// --- Common Filter Creators ---

/// Records `label` in `journal`, appends it to the order's notes and continues.
pub fn noting_filter(
  journal: &Journal,
  label: &'static str,
) -> impl Fn(Order, FilterContext) -> std::pin::Pin<Box<dyn Future<Output = Result<Step<Order>, TestError>> + Send>>
     + Send
     + Sync
     + 'static {
  let journal = Arc::clone(journal);
  move |mut order: Order, _ctx: FilterContext| {
    let journal = Arc::clone(&journal);
    Box::pin(async move {
      journal.lock().push(label.to_string());
      order.notes.push(label.to_string());
      tracing::debug!(target: "test_filters", filter = label, order_id = order.id, "executed");
      Ok(Step::Continue(order))
    })
  }
}

/// Records `label` in `journal` and fails with `TestError::Filter(message)`.
pub fn failing_filter(
  journal: &Journal,
  label: &'static str,
  message: &'static str,
) -> impl Fn(Order, FilterContext) -> std::pin::Pin<Box<dyn Future<Output = Result<Step<Order>, TestError>> + Send>>
     + Send
     + Sync
     + 'static {
  let journal = Arc::clone(journal);
  move |_order: Order, _ctx: FilterContext| {
    let journal = Arc::clone(&journal);
    Box::pin(async move {
      journal.lock().push(label.to_string());
      tracing::warn!(target: "test_filters", filter = label, "failing with: '{}'", message);
      Err(TestError::Filter(message.to_string()))
    })
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
