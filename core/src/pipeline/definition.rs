// flowline/src/pipeline/definition.rs

//! Contains the `Pipeline<T, E>` struct definition, its builder, and
//! introspection (`describe`, `Display`).

use crate::config::PipelineConfig;
use crate::dispatch::{DispatchQueue, QueueStats};
use crate::error::{FlowlineError, FlowlineResult};
use crate::pipeline::chain::FilterChain;
use crate::pipeline::observers::Observers;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Name used when a pipeline is created without one.
pub const ANONYMOUS: &str = "anonymous";

/// A named filter chain with a bounded worker pool and disposition observers.
///
/// `T` is the message type flowing through the filters. `E` is the error type
/// filters fail with; it must be `From<FlowlineError>` so that engine-level
/// failures (panics, timeouts, dropped continuations) can be reported through
/// the same channel.
///
/// Registration methods take `&self` and may be called while messages are in
/// flight: new filters apply to traversals that start afterwards, new observers
/// to emissions that happen afterwards.
pub struct Pipeline<T, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  pub(crate) shared: Arc<PipelineShared<T, E>>,
  pub(crate) queue: DispatchQueue,
}

/// State reachable from worker tasks.
pub(crate) struct PipelineShared<T, E> {
  pub(crate) name: String,
  pub(crate) config: PipelineConfig,
  pub(crate) chain: FilterChain<T, E>,
  pub(crate) observers: Observers<T, E>,
}

/// Diagnostic snapshot of a pipeline's structure. Not meant for reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSnapshot {
  #[serde(rename = "type")]
  pub kind: &'static str,
  pub name: String,
  pub worker_concurrency: usize,
  pub filters: Vec<String>,
}

impl<T, E> Pipeline<T, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  /// Creates a pipeline named `name` with the default configuration.
  pub fn new(name: impl Into<String>) -> Self {
    Self::from_parts(name.into(), PipelineConfig::default())
  }

  pub fn anonymous() -> Self {
    Self::new(ANONYMOUS)
  }

  pub fn builder() -> PipelineBuilder<T, E> {
    PipelineBuilder::new()
  }

  fn from_parts(name: String, config: PipelineConfig) -> Self {
    tracing::debug!(
      pipeline = %name,
      worker_concurrency = config.worker_concurrency,
      message_type = %std::any::type_name::<T>(),
      error_type = %std::any::type_name::<E>(),
      "Pipeline created."
    );
    let queue = DispatchQueue::new(name.clone(), config.worker_concurrency);
    Self {
      shared: Arc::new(PipelineShared {
        name,
        config,
        chain: FilterChain::new(),
        observers: Observers::new(),
      }),
      queue,
    }
  }

  pub fn name(&self) -> &str {
    &self.shared.name
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.shared.config
  }

  /// Number of filters currently registered.
  pub fn len(&self) -> usize {
    self.shared.chain.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn stats(&self) -> QueueStats {
    self.queue.stats()
  }

  pub fn describe(&self) -> PipelineSnapshot {
    PipelineSnapshot {
      kind: "Pipeline",
      name: self.shared.name.clone(),
      worker_concurrency: self.shared.config.worker_concurrency,
      filters: self.shared.chain.display_names(),
    }
  }

  pub fn to_json(&self) -> serde_json::Value {
    let snapshot = self.describe();
    serde_json::json!({
      "type": snapshot.kind,
      "name": snapshot.name,
      "worker_concurrency": snapshot.worker_concurrency,
      "filters": snapshot.filters,
    })
  }
}

impl<T, E> fmt::Display for Pipeline<T, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Pipeline:{}", self.shared.name)
  }
}

impl<T, E> fmt::Debug for Pipeline<T, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pipeline")
      .field("name", &self.shared.name)
      .field("config", &self.shared.config)
      .field("filters", &self.shared.chain.display_names())
      .field("stats", &self.queue.stats())
      .finish()
  }
}

/// Builds a pipeline with an optional name, namespace and configuration.
pub struct PipelineBuilder<T, E> {
  name: Option<String>,
  namespace: Option<String>,
  config: PipelineConfig,
  _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> PipelineBuilder<T, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      name: None,
      namespace: None,
      config: PipelineConfig::default(),
      _marker: PhantomData,
    }
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Prefixes the name as `namespace/name`.
  pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
    self.namespace = Some(namespace.into());
    self
  }

  pub fn config(mut self, config: PipelineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn worker_concurrency(mut self, workers: usize) -> Self {
    self.config.worker_concurrency = workers;
    self
  }

  pub fn filter_timeout(mut self, timeout: std::time::Duration) -> Self {
    self.config.filter_timeout = Some(timeout);
    self
  }

  /// Validates the configuration and creates the pipeline.
  pub fn build(self) -> FlowlineResult<Pipeline<T, E>> {
    self.config.validate()?;
    let base = self
      .name
      .filter(|n| !n.is_empty())
      .unwrap_or_else(|| ANONYMOUS.to_string());
    let name = match self.namespace.filter(|ns| !ns.is_empty()) {
      Some(ns) => format!("{}/{}", ns, base),
      None => base,
    };
    Ok(Pipeline::from_parts(name, self.config))
  }
}

impl<T, E> Default for PipelineBuilder<T, E>
where
  T: Send + 'static,
  E: std::error::Error + From<FlowlineError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
