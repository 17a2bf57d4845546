pub mod control;
pub mod describe;
pub mod filter;
pub mod flow;

// Re-export key types for easier access from other flowline modules (and lib.rs)
pub use control::{Breaker, Disposition, Step, BREAK};
pub use describe::{callable_name, describe_callable, positional_label};
pub use filter::{Continuation, Filter, FilterContext, FilterEntry, FilterOptions, MessageFilter};
pub use flow::{Bindings, FlowContext, Headers, Named, TraversalId};
