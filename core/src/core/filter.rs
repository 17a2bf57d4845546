// flowline/src/core/filter.rs

//! Defines the `Filter<T, E>` type stored in a chain, the typed invocation
//! context handed to every filter, and the adapters that turn async closures,
//! callback-style closures and `MessageFilter` implementations into filters.

use crate::core::control::{Breaker, Step, BREAK};
use crate::core::describe::callable_name;
use crate::core::flow::{Bindings, Headers, Named, TraversalId};
use crate::error::FlowlineError;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

// --- Filter Definition ---

/// Future returned by a type-erased filter.
pub type FilterFuture<T, E> = Pin<Box<dyn Future<Output = Result<Step<T>, E>> + Send>>;

/// Type alias for a filter as stored in a pipeline's chain.
///
/// A filter takes ownership of the message and its invocation context and
/// resolves exactly once:
/// 1. `Ok(Step::Continue(msg))` hands `msg` to the next filter (or finishes the
///    traversal successfully when none is left).
/// 2. `Ok(Step::Break)` ends the traversal early without error.
/// 3. `Err(e)` ends the traversal as failed.
pub type Filter<T, E> = Arc<dyn Fn(T, FilterContext) -> FilterFuture<T, E> + Send + Sync>;

/// Invocation context passed to a filter alongside the message.
#[derive(Debug, Clone)]
pub struct FilterContext {
  /// The break sentinel. `Ok(ctx.breaker.into())` ends the traversal early.
  pub breaker: Breaker,
  /// Headers supplied with the message at submission.
  pub headers: Arc<Headers>,
  /// Id of the traversal this invocation belongs to.
  pub traversal_id: TraversalId,
  /// Display name under which this invocation was recorded.
  pub step: String,
  /// Data bound to the filter at registration.
  pub bindings: Arc<Bindings>,
}

impl FilterContext {
  pub(crate) fn new(traversal_id: TraversalId, headers: Arc<Headers>, step: String, bindings: Arc<Bindings>) -> Self {
    Self {
      breaker: BREAK,
      headers,
      traversal_id,
      step,
      bindings,
    }
  }

  pub fn header(&self, key: &str) -> Option<&serde_json::Value> {
    self.headers.get(key)
  }

  pub fn binding(&self, key: &str) -> Option<&serde_json::Value> {
    self.bindings.get(key)
  }
}

/// Registration options for a single filter.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
  pub name: Option<String>,
  pub bindings: Bindings,
  /// Overrides the pipeline-wide `filter_timeout` for this filter.
  pub timeout: Option<Duration>,
}

impl FilterOptions {
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: Some(name.into()),
      ..Self::default()
    }
  }

  pub fn bind(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
    self.bindings.insert(key.into(), value.into());
    self
  }

  pub fn with_bindings(mut self, bindings: Bindings) -> Self {
    self.bindings = bindings;
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }
}

/// One slot of a filter chain. Immutable once appended.
pub struct FilterEntry<T, E> {
  pub(crate) name: Option<String>,
  pub(crate) filter: Filter<T, E>,
  pub(crate) bindings: Arc<Bindings>,
  pub(crate) timeout: Option<Duration>,
}

impl<T, E> FilterEntry<T, E> {
  pub(crate) fn new(filter: Filter<T, E>, name: Option<String>, options: FilterOptions) -> Self {
    Self {
      name: options.name.or(name),
      filter,
      bindings: Arc::new(options.bindings),
      timeout: options.timeout,
    }
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn bindings(&self) -> &Bindings {
    &self.bindings
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout
  }
}

impl<T, E> Named for FilterEntry<T, E> {
  fn display_name(&self) -> Option<&str> {
    self.name.as_deref()
  }
}

// `Filter` is an `Arc<dyn Fn>`, so Debug is written out by hand.
impl<T, E> std::fmt::Debug for FilterEntry<T, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FilterEntry")
      .field("name", &self.name)
      .field("bindings", &self.bindings)
      .field("timeout", &self.timeout)
      .finish()
  }
}

// --- Callback-style filters ---

/// Completion handle for callback-style filters.
///
/// Every method consumes the continuation, so it can be resolved at most once.
/// Dropping it unresolved fails the traversal with
/// `FlowlineError::ContinuationDropped`.
pub struct Continuation<T, E> {
  tx: oneshot::Sender<Result<Step<T>, E>>,
}

impl<T, E> Continuation<T, E> {
  /// Continue with `message`.
  pub fn proceed(self, message: T) {
    self.resume(Ok(Step::Continue(message)));
  }

  /// End the traversal early.
  pub fn brk(self) {
    self.resume(Ok(Step::Break));
  }

  /// Fail the traversal.
  pub fn fail(self, err: impl Into<E>) {
    self.resume(Err(err.into()));
  }

  pub fn resume(self, result: Result<Step<T>, E>) {
    // The receiver is gone once the traversal has moved on (e.g. timed out).
    let _ = self.tx.send(result);
  }
}

impl<T, E> std::fmt::Debug for Continuation<T, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Continuation").field("resolved", &self.tx.is_closed()).finish()
  }
}

// --- Trait-based filters ---

/// A filter implemented as a type, for filters that carry their own state.
#[async_trait]
pub trait MessageFilter<T, E>: Send + Sync + 'static
where
  T: Send + 'static,
  E: Send + 'static,
{
  /// Display name for step stacks. Defaults to the implementing type's name.
  fn name(&self) -> Option<String> {
    callable_name::<Self>()
  }

  async fn apply(&self, message: T, ctx: FilterContext) -> Result<Step<T>, E>;
}

// --- Adapters into `Filter<T, E>` ---

pub(crate) fn from_async<T, E, F, Fut, UserErr>(filter_fn: F) -> Filter<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
  F: Fn(T, FilterContext) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Step<T>, UserErr>> + Send + 'static,
  UserErr: Into<E> + Send + 'static,
{
  Arc::new(move |message, ctx| {
    let user_fut = filter_fn(message, ctx);
    Box::pin(async move { user_fut.await.map_err(Into::into) })
  })
}

pub(crate) fn from_callback<T, E, F>(filter_fn: F) -> Filter<T, E>
where
  T: Send + 'static,
  E: From<FlowlineError> + Send + 'static,
  F: Fn(T, FilterContext, Continuation<T, E>) + Send + Sync + 'static,
{
  Arc::new(move |message, ctx| {
    let step = ctx.step.clone();
    let (tx, rx) = oneshot::channel();
    filter_fn(message, ctx, Continuation { tx });
    Box::pin(async move {
      rx.await
        .unwrap_or_else(|_| Err(E::from(FlowlineError::ContinuationDropped { step })))
    })
  })
}

pub(crate) fn from_instance<T, E, M>(instance: Arc<M>) -> Filter<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
  M: MessageFilter<T, E>,
{
  Arc::new(move |message, ctx| {
    let instance = Arc::clone(&instance);
    Box::pin(async move { instance.apply(message, ctx).await })
  })
}
