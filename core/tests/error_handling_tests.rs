// tests/error_handling_tests.rs
mod common;

use common::*;
use flowline::{Disposition, FilterContext, FilterOptions, FlowlineError, Outcome, Pipeline, Step};
use std::sync::Arc;
use std::time::Duration;

fn expect_failure<T: std::fmt::Debug, E>(outcome: Outcome<T, E>) -> E {
  match outcome {
    Outcome::Failed(err) => err,
    Outcome::Succeeded(msg) => panic!("Expected Failed, got Succeeded({:?})", msg),
    Outcome::Broke => panic!("Expected Failed, got Broke"),
  }
}

#[tokio::test]
async fn test_filter_error_fails_traversal_and_skips_the_rest() {
  setup_tracing();
  let j = journal();
  let j_failed = Arc::clone(&j);
  let j_always = Arc::clone(&j);
  let pipeline = Pipeline::<Order, TestError>::new("failing");
  pipeline
    .use_named("first", noting_filter(&j, "first"))
    .use_named("second", failing_filter(&j, "second", "card declined"))
    .use_named("third", noting_filter(&j, "third"))
    .on_failed(move |err: &TestError, flow| {
      j_failed.lock().push(format!("failed at {}: {}", flow.current_step().unwrap_or("?"), err));
    })
    .on_always(move |flow| j_always.lock().push(format!("always:{}", flow.disposition().unwrap())));

  let completion = pipeline.execute(Order::new(1, 10)).unwrap().wait().await.unwrap();

  assert_eq!(completion.flow.steps_taken(), 2);
  assert_eq!(completion.flow.step_stack(), &["first", "second"]);
  assert_eq!(completion.flow.disposition(), Some(Disposition::Failed));
  assert_eq!(expect_failure(completion.outcome), TestError::Filter("card declined".to_string()));
  assert_eq!(
    *j.lock(),
    vec![
      "first",
      "second",
      "failed at second: Test filter failed: card declined",
      "always:failed"
    ]
  );
}

#[tokio::test]
async fn test_panic_while_building_the_future_becomes_a_failure() {
  setup_tracing();
  let pipeline = Pipeline::<Order, TestError>::new("sync-panic");
  pipeline.use_named("explode", |order: Order, _ctx: FilterContext| {
    if order.amount > 0 {
      panic!("sync kaboom");
    }
    async move { Ok::<_, TestError>(Step::Continue(order)) }
  });

  let completion = pipeline.execute(Order::new(1, 1)).unwrap().wait().await.unwrap();

  match expect_failure(completion.outcome) {
    TestError::Flowline(msg) => {
      assert!(msg.contains("FilterPanicked"), "unexpected error: {}", msg);
      assert!(msg.contains("sync kaboom"), "unexpected error: {}", msg);
    }
    other => panic!("Expected Flowline error, got {:?}", other),
  }
}

#[tokio::test]
async fn test_panic_inside_async_filter_becomes_a_failure() {
  setup_tracing();
  let j = journal();
  let pipeline = Pipeline::<Order, TestError>::new("async-panic");
  pipeline
    .use_named("explode", |order: Order, _ctx: FilterContext| async move {
      tokio::task::yield_now().await;
      if order.amount > 0 {
        panic!("async kaboom");
      }
      Ok::<_, TestError>(Step::Continue(order))
    })
    .use_named("after", noting_filter(&j, "after"));

  let completion = pipeline.execute(Order::new(1, 1)).unwrap().wait().await.unwrap();

  assert_eq!(completion.flow.steps_taken(), 1);
  assert!(j.lock().is_empty());
  let err = expect_failure(completion.outcome);
  assert!(matches!(&err, TestError::Flowline(msg) if msg.contains("async kaboom")));
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_timeout_fails_a_stalled_filter() {
  setup_tracing();
  let pipeline = Pipeline::<Order, TestError>::builder()
    .name("stalled")
    .filter_timeout(Duration::from_millis(50))
    .build()
    .unwrap();
  pipeline
    .use_named("fast", |order: Order, _ctx: FilterContext| async move {
      tokio::time::sleep(Duration::from_millis(10)).await;
      Ok::<_, TestError>(Step::Continue(order))
    })
    .use_named("slow", |order: Order, _ctx: FilterContext| async move {
      tokio::time::sleep(Duration::from_secs(3600)).await;
      Ok::<_, TestError>(Step::Continue(order))
    });

  let completion = pipeline.execute(Order::new(1, 1)).unwrap().wait().await.unwrap();

  assert_eq!(completion.flow.step_stack(), &["fast", "slow"]);
  match expect_failure(completion.outcome) {
    TestError::Flowline(msg) => {
      assert!(msg.contains("FilterTimedOut"), "unexpected error: {}", msg);
      assert!(msg.contains("timeout_ms: 50"), "unexpected error: {}", msg);
    }
    other => panic!("Expected Flowline error, got {:?}", other),
  }
}

#[tokio::test(start_paused = true)]
async fn test_per_filter_timeout_overrides_pipeline_default() {
  setup_tracing();
  let pipeline = Pipeline::<Order, TestError>::builder()
    .name("override")
    .filter_timeout(Duration::from_secs(60))
    .build()
    .unwrap();
  pipeline.use_with(
    |order: Order, _ctx: FilterContext| async move {
      tokio::time::sleep(Duration::from_secs(1)).await;
      Ok::<_, TestError>(Step::Continue(order))
    },
    FilterOptions::named("tight").with_timeout(Duration::from_millis(20)),
  );

  let completion = pipeline.execute(Order::new(1, 1)).unwrap().wait().await.unwrap();

  let err = expect_failure(completion.outcome);
  assert!(matches!(&err, TestError::Flowline(msg) if msg.contains("timeout_ms: 20")));
}

#[tokio::test]
async fn test_dropped_continuation_fails_the_traversal() {
  setup_tracing();
  let pipeline = Pipeline::<Order, TestError>::new("dropped");
  pipeline.use_callback_with(
    |_order: Order, _ctx, next| drop(next),
    FilterOptions::named("forgetful"),
  );

  let completion = pipeline.execute(Order::new(1, 1)).unwrap().wait().await.unwrap();

  let err = expect_failure(completion.outcome);
  assert!(
    matches!(&err, TestError::Flowline(msg) if msg.contains("ContinuationDropped") && msg.contains("forgetful")),
    "unexpected error: {:?}",
    err
  );
}

#[tokio::test]
async fn test_continuation_fail_reports_the_user_error() {
  setup_tracing();
  let pipeline = Pipeline::<Order, TestError>::new("callback-fail");
  pipeline.use_callback(|order: Order, _ctx, next| {
    if order.amount < 0 {
      next.fail(TestError::Filter("negative amount".to_string()));
    } else {
      next.proceed(order);
    }
  });

  let failed = pipeline.execute(Order::new(1, -5)).unwrap().wait().await.unwrap();
  assert_eq!(expect_failure(failed.outcome), TestError::Filter("negative amount".to_string()));

  let ok = pipeline.execute(Order::new(2, 5)).unwrap().wait().await.unwrap();
  assert_eq!(ok.disposition(), Disposition::Succeeded);
}

#[tokio::test]
async fn test_anyhow_errors_flow_into_flowline_error() {
  setup_tracing();
  let pipeline = Pipeline::<Order, FlowlineError>::new("anyhow");
  pipeline.use_named("lookup", |order: Order, _ctx: FilterContext| async move {
    if order.id == 0 {
      return Err(anyhow::anyhow!("order {} not found", order.id));
    }
    Ok(Step::Continue(order))
  });

  let completion = pipeline.execute(Order::new(0, 1)).unwrap().wait().await.unwrap();

  match expect_failure(completion.outcome) {
    FlowlineError::HandlerError { source } => assert_eq!(source.to_string(), "order 0 not found"),
    other => panic!("Expected HandlerError, got {:?}", other),
  }
}

#[tokio::test]
async fn test_engine_failures_are_distinguishable() {
  setup_tracing();
  let pipeline = Pipeline::<Order, FlowlineError>::new("engine-failures");
  pipeline.use_callback(|_order: Order, _ctx, next| drop(next));

  let completion = pipeline.execute(Order::new(1, 1)).unwrap().wait().await.unwrap();

  let err = expect_failure(completion.outcome);
  assert!(err.is_engine_failure());
  assert!(!FlowlineError::from(anyhow::anyhow!("user")).is_engine_failure());
}

#[tokio::test]
async fn test_panicking_observer_does_not_affect_others() {
  setup_tracing();
  let j = journal();
  let j_second = Arc::clone(&j);
  let j_always = Arc::clone(&j);
  let pipeline = Pipeline::<Order, TestError>::new("observer-panic");
  pipeline
    .use_named("boom", failing_filter(&journal(), "boom", "nope"))
    .on_failed(|_err: &TestError, _flow| panic!("observer blew up"))
    .on_failed(move |err: &TestError, _flow| j_second.lock().push(format!("second saw: {}", err)))
    .on_always(move |_flow| j_always.lock().push("always".to_string()));

  let completion = pipeline.execute(Order::new(1, 1)).unwrap().wait().await.unwrap();

  assert_eq!(completion.disposition(), Disposition::Failed);
  assert_eq!(*j.lock(), vec!["second saw: Test filter failed: nope", "always"]);

  // The pipeline keeps working afterwards.
  let again = pipeline.execute(Order::new(2, 1)).unwrap().wait().await.unwrap();
  assert_eq!(again.disposition(), Disposition::Failed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_failing_message_does_not_affect_another() {
  setup_tracing();
  let pipeline = Pipeline::<Order, TestError>::new("isolation");
  pipeline.use_named("validate", |order: Order, _ctx: FilterContext| async move {
    tokio::time::sleep(Duration::from_millis(5)).await;
    if order.amount < 0 {
      return Err(TestError::Filter(format!("order {} invalid", order.id)));
    }
    Ok(Step::Continue(order))
  });

  let bad = pipeline.execute(Order::new(1, -1)).unwrap();
  let good = pipeline.execute(Order::new(2, 7)).unwrap();

  let (bad, good) = tokio::join!(bad.wait(), good.wait());
  let bad = bad.unwrap();
  let good = good.unwrap();

  assert_eq!(expect_failure(bad.outcome), TestError::Filter("order 1 invalid".to_string()));
  assert_eq!(good.outcome.succeeded(), Some(Order::new(2, 7)));
  assert_ne!(bad.flow.id(), good.flow.id());
}
