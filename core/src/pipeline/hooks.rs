// flowline/src/pipeline/hooks.rs

//! Contains the fluent registration API: filters (async, callback-style,
//! trait-based, `break_if`) and disposition observers.

use crate::core::control::{Breaker, Step};
use crate::core::describe::callable_name;
use crate::core::filter::{
  from_async, from_callback, from_instance, Continuation, FilterContext, FilterEntry, FilterOptions, MessageFilter,
};
use crate::core::flow::{Bindings, FlowContext};
use crate::error::FlowlineError;
use crate::pipeline::definition::Pipeline;
use std::future::Future;
use std::sync::Arc;
use tracing::{event, Level};

impl<T, E> Pipeline<T, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  /// Appends an async filter.
  ///
  /// The `filter_fn` takes the message and its `FilterContext` and returns a
  /// `Future` resolving to `Result<Step<T>, UserProvidedErr>`, where
  /// `UserProvidedErr` must be convertible into the pipeline's `E`.
  pub fn use_filter<F, Fut, UserProvidedErr>(&self, filter_fn: F) -> &Self
  where
    F: Fn(T, FilterContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Step<T>, UserProvidedErr>> + Send + 'static,
    UserProvidedErr: Into<E> + Send + 'static,
  {
    self.use_with(filter_fn, FilterOptions::default())
  }

  /// Appends an async filter under an explicit display name.
  pub fn use_named<F, Fut, UserProvidedErr>(&self, name: impl Into<String>, filter_fn: F) -> &Self
  where
    F: Fn(T, FilterContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Step<T>, UserProvidedErr>> + Send + 'static,
    UserProvidedErr: Into<E> + Send + 'static,
  {
    self.use_with(filter_fn, FilterOptions::named(name))
  }

  /// Appends an async filter with a bound context, name or timeout.
  pub fn use_with<F, Fut, UserProvidedErr>(&self, filter_fn: F, options: FilterOptions) -> &Self
  where
    F: Fn(T, FilterContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Step<T>, UserProvidedErr>> + Send + 'static,
    UserProvidedErr: Into<E> + Send + 'static,
  {
    let name = callable_name::<F>();
    self.append(FilterEntry::new(from_async(filter_fn), name, options))
  }

  /// Appends a callback-style filter that resolves a [`Continuation`] instead
  /// of returning a future.
  pub fn use_callback<F>(&self, filter_fn: F) -> &Self
  where
    F: Fn(T, FilterContext, Continuation<T, E>) + Send + Sync + 'static,
  {
    self.use_callback_with(filter_fn, FilterOptions::default())
  }

  pub fn use_callback_with<F>(&self, filter_fn: F, options: FilterOptions) -> &Self
  where
    F: Fn(T, FilterContext, Continuation<T, E>) + Send + Sync + 'static,
  {
    let name = callable_name::<F>();
    self.append(FilterEntry::new(from_callback(filter_fn), name, options))
  }

  /// Appends a [`MessageFilter`] implementation.
  pub fn use_instance<M>(&self, filter: M) -> &Self
  where
    M: MessageFilter<T, E>,
  {
    self.use_instance_with(filter, FilterOptions::default())
  }

  pub fn use_instance_with<M>(&self, filter: M, options: FilterOptions) -> &Self
  where
    M: MessageFilter<T, E>,
  {
    let name = filter.name();
    self.append(FilterEntry::new(from_instance(Arc::new(filter)), name, options))
  }

  /// Appends a filter that breaks the traversal when `predicate` holds for the
  /// incoming message and passes it on unchanged otherwise. It occupies one
  /// chain slot like any other filter.
  pub fn break_if<P>(&self, predicate: P) -> &Self
  where
    P: Fn(&T) -> bool + Send + Sync + 'static,
  {
    self.use_named("break_if", move |message: T, _ctx: FilterContext| {
      let step = if predicate(&message) {
        Step::Break
      } else {
        Step::Continue(message)
      };
      async move { Ok::<Step<T>, E>(step) }
    })
  }

  fn append(&self, entry: FilterEntry<T, E>) -> &Self {
    let filter_name = entry.name().map(str::to_string);
    let position = self.shared.chain.append(entry);
    event!(Level::DEBUG, pipeline = %self.shared.name, position, filter = ?filter_name, "Filter registered.");
    self
  }

  // --- Observers ---

  /// Called with the final message of every succeeded traversal.
  pub fn on_succeeded<H>(&self, handler: H) -> &Self
  where
    H: Fn(&T, &FlowContext) + Send + Sync + 'static,
  {
    self.on_succeeded_with(Bindings::new(), move |result: &T, flow: &FlowContext, _: &Bindings| {
      handler(result, flow)
    })
  }

  pub fn on_succeeded_with<H>(&self, bindings: Bindings, handler: H) -> &Self
  where
    H: Fn(&T, &FlowContext, &Bindings) + Send + Sync + 'static,
  {
    self.shared.observers.add_succeeded(Arc::new(handler), bindings);
    self
  }

  /// Called with the break sentinel for every traversal that ended through it.
  pub fn on_broken<H>(&self, handler: H) -> &Self
  where
    H: Fn(&Breaker, &FlowContext) + Send + Sync + 'static,
  {
    self.on_broken_with(Bindings::new(), move |breaker: &Breaker, flow: &FlowContext, _: &Bindings| {
      handler(breaker, flow)
    })
  }

  pub fn on_broken_with<H>(&self, bindings: Bindings, handler: H) -> &Self
  where
    H: Fn(&Breaker, &FlowContext, &Bindings) + Send + Sync + 'static,
  {
    self.shared.observers.add_broke(Arc::new(handler), bindings);
    self
  }

  /// Called with the error of every failed traversal. Without at least one of
  /// these, failures are only visible through receipts and logs.
  pub fn on_failed<H>(&self, handler: H) -> &Self
  where
    H: Fn(&E, &FlowContext) + Send + Sync + 'static,
  {
    self.on_failed_with(Bindings::new(), move |err: &E, flow: &FlowContext, _: &Bindings| handler(err, flow))
  }

  pub fn on_failed_with<H>(&self, bindings: Bindings, handler: H) -> &Self
  where
    H: Fn(&E, &FlowContext, &Bindings) + Send + Sync + 'static,
  {
    self.shared.observers.add_failed(Arc::new(handler), bindings);
    self
  }

  /// Called for every finished traversal, after the disposition observers.
  pub fn on_always<H>(&self, handler: H) -> &Self
  where
    H: Fn(&FlowContext) + Send + Sync + 'static,
  {
    self.on_always_with(Bindings::new(), move |flow: &FlowContext, _: &Bindings| handler(flow))
  }

  pub fn on_always_with<H>(&self, bindings: Bindings, handler: H) -> &Self
  where
    H: Fn(&FlowContext, &Bindings) + Send + Sync + 'static,
  {
    self.shared.observers.add_always(Arc::new(handler), bindings);
    self
  }

  /// Number of observers registered for `disposition`.
  pub fn observer_count(&self, disposition: crate::core::control::Disposition) -> usize {
    self.shared.observers.count(disposition)
  }

  pub fn always_observer_count(&self) -> usize {
    self.shared.observers.always_count()
  }
}
