// flowline/src/config.rs

//! Per-pipeline configuration. Defaults are applied once per instance; there is
//! no process-wide default object to mutate.

use crate::error::{FlowlineError, FlowlineResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_WORKER_CONCURRENCY: usize = 5;

pub const ENV_WORKER_CONCURRENCY: &str = "FLOWLINE_WORKER_CONCURRENCY";
pub const ENV_FILTER_TIMEOUT_MS: &str = "FLOWLINE_FILTER_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Maximum number of traversals executing at once.
  pub worker_concurrency: usize,

  /// Upper bound for a single filter invocation. `None` waits forever, which
  /// lets a filter that never completes hold its worker slot indefinitely.
  #[serde(with = "timeout_millis", rename = "filter_timeout_ms")]
  pub filter_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
      filter_timeout: None,
    }
  }
}

impl PipelineConfig {
  pub fn with_worker_concurrency(mut self, workers: usize) -> Self {
    self.worker_concurrency = workers;
    self
  }

  pub fn with_filter_timeout(mut self, timeout: Duration) -> Self {
    self.filter_timeout = Some(timeout);
    self
  }

  pub fn validate(&self) -> FlowlineResult<()> {
    if self.worker_concurrency == 0 {
      return Err(FlowlineError::InvalidConfiguration {
        field: "worker_concurrency".to_string(),
        message: "must be a positive integer".to_string(),
      });
    }
    if self.filter_timeout == Some(Duration::ZERO) {
      return Err(FlowlineError::InvalidConfiguration {
        field: "filter_timeout".to_string(),
        message: "must be greater than zero when set".to_string(),
      });
    }
    Ok(())
  }

  /// Reads overrides from the environment. Unset variables keep their
  /// defaults; set but unparsable ones are a configuration error.
  pub fn from_env() -> FlowlineResult<Self> {
    let mut config = Self::default();

    if let Ok(raw) = env::var(ENV_WORKER_CONCURRENCY) {
      config.worker_concurrency = raw.trim().parse::<usize>().map_err(|e| FlowlineError::InvalidConfiguration {
        field: ENV_WORKER_CONCURRENCY.to_string(),
        message: format!("'{}' is not a valid worker count: {}", raw, e),
      })?;
    }

    if let Ok(raw) = env::var(ENV_FILTER_TIMEOUT_MS) {
      let millis = raw.trim().parse::<u64>().map_err(|e| FlowlineError::InvalidConfiguration {
        field: ENV_FILTER_TIMEOUT_MS.to_string(),
        message: format!("'{}' is not a valid millisecond value: {}", raw, e),
      })?;
      config.filter_timeout = Some(Duration::from_millis(millis));
    }

    config.validate()?;
    tracing::debug!(
      worker_concurrency = config.worker_concurrency,
      filter_timeout_ms = ?config.filter_timeout.map(|d| d.as_millis()),
      "Pipeline configuration loaded from environment."
    );
    Ok(config)
  }
}

mod timeout_millis {
  use serde::{Deserialize, Deserializer, Serializer};
  use std::time::Duration;

  pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
      Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_has_five_workers_and_no_timeout() {
    let config = PipelineConfig::default();
    assert_eq!(config.worker_concurrency, 5);
    assert_eq!(config.filter_timeout, None);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn zero_workers_is_rejected() {
    let err = PipelineConfig::default().with_worker_concurrency(0).validate().unwrap_err();
    match err {
      FlowlineError::InvalidConfiguration { field, .. } => assert_eq!(field, "worker_concurrency"),
      other => panic!("Expected InvalidConfiguration, got {:?}", other),
    }
  }

  #[test]
  fn zero_timeout_is_rejected() {
    let config = PipelineConfig::default().with_filter_timeout(Duration::ZERO);
    assert!(config.validate().is_err());
  }

  #[test]
  fn deserializes_partial_json_with_defaults() {
    let config: PipelineConfig = serde_json::from_str(r#"{ "filter_timeout_ms": 250 }"#).unwrap();
    assert_eq!(config.worker_concurrency, DEFAULT_WORKER_CONCURRENCY);
    assert_eq!(config.filter_timeout, Some(Duration::from_millis(250)));

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["filter_timeout_ms"], 250);
  }
}
