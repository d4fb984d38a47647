//! counter-facts - Minimal compose-dispatch example
//!
//! This demo walks the core pattern end to end:
//! - State: what the feature knows
//! - Actions: what can happen
//! - Reducer: how state changes and which effects run
//! - Store: where state lives and effects are scheduled
//!
//! It increments a counter, fetches a number fact from numbersapi.com, then
//! drops the count below zero and waits for the delayed recovery effect.

use std::time::Duration;

use clap::Parser;
use compose_dispatch::prelude::*;

#[derive(Parser, Debug)]
#[command(about = "Counter with number facts, built on compose-dispatch")]
struct Args {
    /// How many times to increment before fetching a fact
    #[arg(long, default_value_t = 3)]
    increments: u32,

    /// Base URL of the fact provider
    #[arg(long, default_value = "http://numbersapi.com")]
    fact_url: String,
}

// ============================================================================
// State - what the feature knows
// ============================================================================

#[derive(Clone, Debug, Default)]
struct CounterState {
    count: i64,
    fact: Option<String>,
}

// ============================================================================
// Actions - what can happen
// ============================================================================

#[derive(Action, Clone, Debug)]
enum CounterAction {
    IncrementButtonTapped,
    DecrementButtonTapped,
    DecrementDelayResponse,
    FactButtonTapped,
    FactResponse(Result<String, FactError>),
}

// ============================================================================
// Reducer - how state changes, and which effects run
// ============================================================================

struct Counter {
    clock: Clock,
    facts: FactClient,
}

const DELAY_ID: &str = "decrement-delay";

impl Reducer for Counter {
    type State = CounterState;
    type Action = CounterAction;

    fn reduce(&self, state: &mut CounterState, action: CounterAction) -> Effect<CounterAction> {
        match action {
            CounterAction::IncrementButtonTapped => {
                state.count += 1;
                state.fact = None;
                if state.count >= 0 {
                    Effect::cancel(CancelId::new(DELAY_ID))
                } else {
                    Effect::none()
                }
            }
            CounterAction::DecrementButtonTapped => {
                state.count -= 1;
                state.fact = None;
                if state.count >= 0 {
                    return Effect::none();
                }
                let clock = self.clock.clone();
                Effect::run(move |send| async move {
                    clock.sleep(Duration::from_secs(1)).await;
                    send.send(CounterAction::DecrementDelayResponse);
                })
                .cancellable(CancelId::new(DELAY_ID))
            }
            CounterAction::DecrementDelayResponse => {
                if state.count < 0 {
                    state.count += 1;
                }
                Effect::none()
            }
            CounterAction::FactButtonTapped => {
                let facts = self.facts.clone();
                let count = state.count;
                Effect::run(move |send| async move {
                    send.send(CounterAction::FactResponse(facts.fetch(count).await));
                })
                .cancellable_in_flight(CancelId::new("fact"))
            }
            CounterAction::FactResponse(Ok(fact)) => {
                state.fact = Some(fact);
                Effect::none()
            }
            CounterAction::FactResponse(Err(error)) => {
                tracing::warn!(%error, "fact request failed");
                Effect::none()
            }
        }
    }
}

// ============================================================================
// Live fact client backed by numbersapi.com
// ============================================================================

fn live_fact_client(base_url: String) -> FactClient {
    let http = reqwest::Client::new();
    FactClient::new(move |number| {
        let http = http.clone();
        let url = format!("{base_url}/{number}/trivia");
        async move {
            let response = http
                .get(&url)
                .send()
                .await
                .map_err(|e| FactError::Provider(e.to_string()))?;
            response
                .text()
                .await
                .map_err(|e| FactError::Provider(e.to_string()))
        }
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,compose_dispatch_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let store = Store::new(
        CounterState::default(),
        Counter {
            clock: Clock::system(),
            facts: live_fact_client(args.fact_url),
        },
    );

    for _ in 0..args.increments {
        store.send(CounterAction::IncrementButtonTapped);
    }
    println!("count after increments: {}", store.state().count);

    store.send(CounterAction::FactButtonTapped).finish().await;
    match store.state().fact {
        Some(fact) => println!("fact: {fact}"),
        None => println!("no fact available"),
    }

    // Back to zero, then one more: the feature schedules a one-second
    // recovery for the negative count.
    for _ in 0..args.increments {
        store.send(CounterAction::DecrementButtonTapped);
    }
    println!("count after decrements: {}", store.state().count);

    let recovery = store.send(CounterAction::DecrementButtonTapped);
    println!("count went negative: {}", store.state().count);
    recovery.finish().await;
    println!("count after delayed recovery: {}", store.state().count);
}
