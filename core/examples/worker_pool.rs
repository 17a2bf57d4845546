// flowline/examples/worker_pool.rs

use flowline::{FilterContext, FlowlineError, Headers, Pipeline, PipelineConfig, Step};
use std::time::Duration;
use tracing::info;

#[derive(Clone, Debug)]
struct Job {
  id: u32,
  work_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), FlowlineError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Worker Pool Example ---");

  // FLOWLINE_WORKER_CONCURRENCY / FLOWLINE_FILTER_TIMEOUT_MS override the defaults.
  let config = PipelineConfig::from_env()?.with_worker_concurrency(2);
  let pipeline = Pipeline::<Job, FlowlineError>::builder()
    .namespace("batch")
    .name("resize")
    .config(config)
    .filter_timeout(Duration::from_millis(500))
    .build()?;

  pipeline.use_named("simulate_work", |job: Job, ctx: FilterContext| async move {
    let tenant = ctx.header("tenant").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
    info!(job = job.id, %tenant, traversal = %ctx.traversal_id, "Working for {}ms", job.work_ms);
    tokio::time::sleep(Duration::from_millis(job.work_ms)).await;
    Ok::<_, FlowlineError>(Step::Continue(job))
  });

  pipeline
    .on_succeeded(|job: &Job, flow| info!(job = job.id, duration_ms = ?flow.duration_ms(), "Job done."))
    .on_failed(|err: &FlowlineError, flow| info!(steps = ?flow.step_stack(), "Job failed: {}", err));

  let mut headers = Headers::new();
  headers.insert("tenant".to_string(), serde_json::json!("acme"));

  for (id, work_ms) in [(1, 100), (2, 50), (3, 900), (4, 20), (5, 10)] {
    // Fire-and-forget: observers still see every outcome.
    let _ = pipeline.execute_with_headers(Job { id, work_ms }, headers.clone())?;
    info!(stats = ?pipeline.stats(), "Submitted job {}", id);
  }

  pipeline.wait_idle().await;
  info!("{}", pipeline);
  pipeline.close();
  Ok(())
}
