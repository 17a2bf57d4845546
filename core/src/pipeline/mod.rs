// flowline/src/pipeline/mod.rs

pub mod chain;
pub mod definition;
pub mod execution;
pub mod hooks;
pub mod observers;
pub mod traversal;

pub use definition::{Pipeline, PipelineBuilder, PipelineSnapshot, ANONYMOUS};
pub use execution::Receipt;
pub use traversal::{Completion, Outcome};
