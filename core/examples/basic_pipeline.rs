// flowline/examples/basic_pipeline.rs

use flowline::{FilterContext, FilterOptions, FlowlineError, Outcome, Pipeline, Step};
use tracing::info;

// 1. Define the message type that travels through the filters
#[derive(Clone, Debug, Default)]
struct Greeting {
  message_log: Vec<String>,
  counter: i32,
}

// 2. Filters may be plain async fns; their name shows up in the step stack.
async fn step_alpha(mut msg: Greeting, _ctx: FilterContext) -> Result<Step<Greeting>, FlowlineError> {
  msg.counter += 1;
  let line = format!("Alpha executed: counter = {}", msg.counter);
  info!("{}", line);
  msg.message_log.push(line);
  Ok(Step::Continue(msg))
}

#[tokio::main]
async fn main() -> Result<(), FlowlineError> {
  // Initialize tracing (optional, for demonstration)
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Pipeline Example ---");

  // 3. Create a pipeline. Pipeline<Msg, Err> where Err must be From<FlowlineError>
  let pipeline = Pipeline::<Greeting, FlowlineError>::new("greetings");

  // 4. Register filters in the order they should run
  pipeline
    .use_filter(step_alpha)
    .use_named("step_beta", |mut msg: Greeting, _ctx: FilterContext| async move {
      msg.counter *= 2;
      let line = format!("Beta executed: counter = {}", msg.counter);
      info!("{}", line);
      msg.message_log.push(line);
      Ok::<_, FlowlineError>(Step::Continue(msg))
    })
    .use_with(
      |mut msg: Greeting, ctx: FilterContext| async move {
        let delta = ctx.binding("delta").and_then(|v| v.as_i64()).unwrap_or(1) as i32;
        msg.counter -= delta;
        let line = format!("Gamma executed: counter = {}", msg.counter);
        info!("{}", line);
        msg.message_log.push(line);
        Ok::<_, FlowlineError>(Step::Continue(msg))
      },
      FilterOptions::named("step_gamma").bind("delta", 1),
    );

  // 5. Observe outcomes
  pipeline.on_succeeded(|msg: &Greeting, flow| {
    info!(steps = ?flow.step_stack(), "Observer saw final counter {}", msg.counter);
  });

  info!("{}", pipeline.to_json());

  // 6. Submit a message and wait for its traversal
  info!("Submitting message...");
  let completion = pipeline
    .execute(Greeting {
      message_log: Vec::new(),
      counter: 5, // Start counter at 5
    })?
    .wait()
    .await?;

  // 7. Inspect the results
  let msg = match completion.outcome {
    Outcome::Succeeded(msg) => msg,
    Outcome::Broke => {
      info!("Pipeline was stopped early.");
      return Ok(());
    }
    Outcome::Failed(err) => return Err(err),
  };
  info!("Final counter value: {}", msg.counter);
  info!("Execution log:");
  for log_entry in &msg.message_log {
    info!("- {}", log_entry);
  }

  // Expected: (5+1)*2 - 1 = 11
  assert_eq!(msg.counter, 11);
  assert_eq!(completion.flow.step_stack(), &["step_alpha", "step_beta", "step_gamma"]);

  pipeline.close();
  Ok(())
}
