// flowline/examples/error_handling.rs

use flowline::{Disposition, FilterContext, FlowlineError, Pipeline, Step};
use tracing::{error, info, warn};

// 1. Define a custom application error type
#[derive(Debug, thiserror::Error)]
enum PaymentError {
  #[error("Card declined: {0}")]
  Declined(String),

  #[error("Flowline framework error during traversal: {0}")]
  Flowline(#[from] FlowlineError), // Lets engine failures (panics, timeouts) reach the same observers
}

#[derive(Clone, Debug)]
struct Payment {
  id: u32,
  amount_cents: i64,
  card: &'static str,
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Break and Failure Example ---");

  let pipeline = Pipeline::<Payment, PaymentError>::new("payments");

  // Zero-amount payments need no processing; break instead of failing.
  pipeline
    .break_if(|p: &Payment| p.amount_cents == 0)
    .use_named("authorize", |p: Payment, _ctx: FilterContext| async move {
      if p.card.starts_with("4000") {
        return Err(PaymentError::Declined(format!("card ending {}", &p.card[p.card.len() - 4..])));
      }
      Ok(Step::Continue(p))
    })
    .use_named("capture", |p: Payment, _ctx: FilterContext| async move {
      if p.amount_cents > 1_000_000 {
        panic!("capture limit exceeded for payment {}", p.id);
      }
      info!(payment = p.id, "Captured {} cents", p.amount_cents);
      Ok::<_, PaymentError>(Step::Continue(p))
    });

  pipeline
    .on_succeeded(|p: &Payment, flow| info!(payment = p.id, steps = flow.steps_taken(), "Payment settled."))
    .on_broken(|_breaker, flow| info!(traversal = %flow.id(), "Nothing to charge; traversal broke early."))
    .on_failed(|err: &PaymentError, flow| {
      error!(step = ?flow.current_step(), "Payment failed: {}", err);
    })
    .on_always(|flow| info!(disposition = %flow.disposition().unwrap_or(Disposition::Failed), "Traversal finished."));

  let payments = vec![
    Payment { id: 1, amount_cents: 2_500, card: "4242424242424242" },
    Payment { id: 2, amount_cents: 0, card: "4242424242424242" },
    Payment { id: 3, amount_cents: 900, card: "4000000000000002" },
    Payment { id: 4, amount_cents: 5_000_000, card: "5555555555554444" },
  ];

  let mut receipts = Vec::new();
  for payment in payments {
    match pipeline.execute(payment) {
      Ok(receipt) => receipts.push(receipt),
      Err(e) => warn!("Submission rejected: {}", e),
    }
  }

  for receipt in receipts {
    match receipt.wait().await {
      Ok(completion) => info!(steps = ?completion.flow.step_stack(), "Disposition: {}", completion.disposition()),
      Err(e) => warn!("Receipt error: {}", e),
    }
  }

  pipeline.close();
  if let Err(e) = pipeline.execute(Payment { id: 5, amount_cents: 1, card: "4242" }) {
    info!("After close: {}", e);
  }
}
