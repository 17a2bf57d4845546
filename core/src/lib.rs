// flowline/src/lib.rs

//! Flowline: an asynchronous filter-chain engine for Rust.
//!
//! Callers register an ordered list of filters against a named pipeline and
//! submit messages to it. Each message travels through the filters in order,
//! a bounded pool of workers processes several messages at once, and every
//! traversal ends in exactly one disposition:
//!  - `Succeeded`: every filter continued.
//!  - `Broke`: a filter returned the break sentinel.
//!  - `Failed`: a filter returned an error, panicked, timed out or dropped its continuation.
//!
//! Outcomes reach per-disposition observers and, optionally, the `Receipt`
//! returned by `execute`.

pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod pipeline;

// --- Re-exports for the Public API ---

pub use crate::core::control::{Breaker, Disposition, Step, BREAK};
pub use crate::core::describe::{callable_name, describe_callable};
pub use crate::core::filter::{Continuation, Filter, FilterContext, FilterOptions, MessageFilter};
pub use crate::core::flow::{Bindings, FlowContext, Headers, TraversalId};

pub use crate::pipeline::{Completion, Outcome, Pipeline, PipelineBuilder, PipelineSnapshot, Receipt, ANONYMOUS};

pub use crate::config::PipelineConfig;
pub use crate::dispatch::QueueStats;
pub use crate::error::{FlowlineError, FlowlineResult};

/*
    Core Workflow:
    1. Pick a message type `Msg` and an error type `MyErr: From<FlowlineError>`
       (or use `FlowlineError` itself).
    2. Build a `Pipeline<Msg, MyErr>` via `Pipeline::new("name")` or
       `Pipeline::builder().namespace("ns").name("name").worker_concurrency(8).build()?`.
    3. Register filters in order with `.use_filter()`, `.use_named()`, `.use_with()`,
       `.use_callback()`, `.use_instance()` or `.break_if()`.
    4. Register observers with `.on_succeeded()`, `.on_broken()`, `.on_failed()`, `.on_always()`.
    5. Inside a Tokio runtime, call `pipeline.execute(msg)?`; optionally `.wait().await`
       the returned receipt.
    6. `pipeline.close()` stops admission; `pipeline.wait_idle().await` waits for in-flight work.
*/
