//! Cancelling in-flight effects by identity: explicit cancel actions,
//! cancel-on-state-change, and mutual exclusion via cancel-in-flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use compose_dispatch::prelude::*;
use compose_dispatch::{assert_not_delivered, count_delivered, ActionLog, Recorded};

#[derive(Clone, Debug, Default, PartialEq)]
struct CancellationState {
    count: i64,
    current_fact: Option<String>,
    is_fact_request_in_flight: bool,
}

#[derive(Action, Clone, Debug)]
enum CancellationAction {
    CancelButtonTapped,
    StepperChanged(i64),
    FactButtonTapped,
    FactResponse(Result<String, FactError>),
}

struct EffectsCancellation {
    facts: FactClient,
}

const FACT_REQUEST_ID: &str = "fact-request";

impl Reducer for EffectsCancellation {
    type State = CancellationState;
    type Action = CancellationAction;

    fn reduce(
        &self,
        state: &mut CancellationState,
        action: CancellationAction,
    ) -> Effect<CancellationAction> {
        match action {
            CancellationAction::CancelButtonTapped => {
                state.is_fact_request_in_flight = false;
                Effect::cancel(CancelId::new(FACT_REQUEST_ID))
            }
            CancellationAction::StepperChanged(value) => {
                state.count = value;
                state.current_fact = None;
                state.is_fact_request_in_flight = false;
                Effect::cancel(CancelId::new(FACT_REQUEST_ID))
            }
            CancellationAction::FactButtonTapped => {
                state.current_fact = None;
                state.is_fact_request_in_flight = true;
                let facts = self.facts.clone();
                let count = state.count;
                Effect::run(move |send| async move {
                    send.send(CancellationAction::FactResponse(facts.fetch(count).await));
                })
                .cancellable_in_flight(CancelId::new(FACT_REQUEST_ID))
            }
            CancellationAction::FactResponse(Ok(fact)) => {
                state.is_fact_request_in_flight = false;
                state.current_fact = Some(fact);
                Effect::none()
            }
            CancellationAction::FactResponse(Err(_)) => {
                state.is_fact_request_in_flight = false;
                Effect::none()
            }
        }
    }
}

fn store_with(
    facts: FactClient,
) -> (
    Store<CancellationState, CancellationAction>,
    ActionLog<CancellationAction>,
) {
    let log = ActionLog::new();
    let store = Store::new(
        CancellationState::default(),
        Recorded::new(EffectsCancellation { facts }, log.clone()),
    );
    (store, log)
}

/// A fact client whose futures never resolve.
fn pending_facts() -> FactClient {
    FactClient::new(|_| std::future::pending())
}

#[tokio::test]
async fn test_cancel_with_no_live_effect_is_noop() {
    let (store, log) = store_with(FactClient::echoing());

    let handle = store.send(CancellationAction::CancelButtonTapped);

    assert!(handle.is_finished());
    assert_eq!(log.drain().len(), 1);
    assert_eq!(store.state(), CancellationState::default());
}

#[tokio::test]
async fn test_cancel_button_stops_fetch() {
    let (store, log) = store_with(pending_facts());

    let fetch = store.send(CancellationAction::FactButtonTapped);
    assert!(store.state().is_fact_request_in_flight);
    assert!(store.is_effect_live(&CancelId::new(FACT_REQUEST_ID)));

    store.send(CancellationAction::CancelButtonTapped);

    // The fetch resolves by cancellation, never by delivering a response.
    fetch.finish().await;
    assert!(!store.is_effect_live(&CancelId::new(FACT_REQUEST_ID)));
    assert!(!store.state().is_fact_request_in_flight);
    assert_not_delivered!(log.drain(), CancellationAction::FactResponse(_));
}

#[tokio::test]
async fn test_stepper_change_cancels_fetch() {
    let (store, log) = store_with(pending_facts());

    let fetch = store.send(CancellationAction::FactButtonTapped);
    store.send(CancellationAction::StepperChanged(5));

    fetch.finish().await;
    assert_eq!(store.state().count, 5);
    assert_eq!(store.state().current_fact, None);
    assert_not_delivered!(log.drain(), CancellationAction::FactResponse(_));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_in_flight_leaves_exactly_one_fact() {
    // The generation cell is bumped between the two taps; only a fetch
    // issued after the bump can observe generation 1.
    let generation = Arc::new(AtomicU64::new(0));
    let facts = {
        let generation = Arc::clone(&generation);
        FactClient::new(move |_count| {
            let generation = generation.load(Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(format!("fact generation {generation}"))
            }
        })
    };
    let (store, log) = store_with(facts);

    let first = store.send(CancellationAction::FactButtonTapped);
    generation.store(1, Ordering::SeqCst);
    let second = store.send(CancellationAction::FactButtonTapped);

    first.finish().await;
    second.finish().await;

    // Exactly one resolved fact, and it is the second request's: the first
    // was cancelled before its resolution could reach the reducer.
    let state = store.state();
    assert!(!state.is_fact_request_in_flight);
    assert_eq!(state.current_fact.as_deref(), Some("fact generation 1"));

    let actions = log.drain();
    assert_eq!(count_delivered!(actions, CancellationAction::FactResponse(_)), 1);
}

// ---------------------------------------------------------------------------
// Timeout is not a primitive: race the fetch against sleep-then-cancel
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq)]
struct TimeoutState {
    fact: Option<String>,
    timed_out: bool,
}

#[derive(Action, Clone, Debug)]
enum TimeoutAction {
    FetchButtonTapped,
    Response(Result<String, FactError>),
    TimedOut,
}

struct TimeoutFetch {
    facts: FactClient,
    clock: Clock,
}

impl Reducer for TimeoutFetch {
    type State = TimeoutState;
    type Action = TimeoutAction;

    fn reduce(&self, state: &mut TimeoutState, action: TimeoutAction) -> Effect<TimeoutAction> {
        match action {
            TimeoutAction::FetchButtonTapped => {
                let facts = self.facts.clone();
                let clock = self.clock.clone();
                Effect::merge([
                    Effect::run(move |send| async move {
                        send.send(TimeoutAction::Response(facts.fetch(0).await));
                    })
                    .cancellable(CancelId::new("fetch")),
                    Effect::concat([
                        Effect::run(move |_send| async move {
                            clock.sleep(Duration::from_secs(1)).await;
                        }),
                        Effect::cancel(CancelId::new("fetch")),
                        Effect::send(TimeoutAction::TimedOut),
                    ])
                    .cancellable(CancelId::new("timeout")),
                ])
            }
            TimeoutAction::Response(Ok(fact)) => {
                state.fact = Some(fact);
                Effect::cancel(CancelId::new("timeout"))
            }
            TimeoutAction::Response(Err(_)) => Effect::cancel(CancelId::new("timeout")),
            TimeoutAction::TimedOut => {
                state.timed_out = true;
                Effect::none()
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_times_out() {
    let log = ActionLog::new();
    let store = Store::new(
        TimeoutState::default(),
        Recorded::new(
            TimeoutFetch {
                facts: pending_facts(),
                clock: Clock::system(),
            },
            log.clone(),
        ),
    );

    store.send(TimeoutAction::FetchButtonTapped).finish().await;

    let state = store.state();
    assert!(state.timed_out);
    assert_eq!(state.fact, None);
    assert_not_delivered!(log.drain(), TimeoutAction::Response(_));
}

#[tokio::test(start_paused = true)]
async fn test_fast_fetch_beats_the_timeout() {
    let log = ActionLog::new();
    let store = Store::new(
        TimeoutState::default(),
        Recorded::new(
            TimeoutFetch {
                facts: FactClient::echoing(),
                clock: Clock::system(),
            },
            log.clone(),
        ),
    );

    store.send(TimeoutAction::FetchButtonTapped).finish().await;

    let state = store.state();
    assert!(!state.timed_out);
    assert_eq!(state.fact.as_deref(), Some("0 is a good number"));
    assert_not_delivered!(log.drain(), TimeoutAction::TimedOut);
}

#[tokio::test]
async fn test_new_fetch_supersedes_old_after_count_change() {
    let (store, _log) = store_with(FactClient::echoing());

    store.send(CancellationAction::StepperChanged(3));
    let handle = store.send(CancellationAction::FactButtonTapped);
    handle.finish().await;

    assert_eq!(
        store.state().current_fact.as_deref(),
        Some("3 is a good number")
    );
}
