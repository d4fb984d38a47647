//! Navigation stacks: store-assigned element identity, pop-to semantics,
//! and effect lifetimes tied to screen lifetime.

use std::time::Duration;

use compose_dispatch::prelude::*;
use compose_dispatch::{assert_delivered, assert_not_delivered, ActionLog, Recorded};
use tokio_stream::StreamExt;

#[derive(Clone, Debug, Default, PartialEq)]
struct ScreenState {
    count: i64,
    is_timer_running: bool,
}

#[derive(Action, Clone, Debug)]
enum ScreenAction {
    StartButtonTapped,
    StopButtonTapped,
    TimerTick,
}

struct TimerScreen {
    clock: Clock,
}

impl Reducer for TimerScreen {
    type State = ScreenState;
    type Action = ScreenAction;

    fn reduce(&self, state: &mut ScreenState, action: ScreenAction) -> Effect<ScreenAction> {
        match action {
            ScreenAction::StartButtonTapped => {
                state.is_timer_running = true;
                let clock = self.clock.clone();
                Effect::run(move |send| async move {
                    let mut ticks = clock.timer(Duration::from_secs(1));
                    while ticks.next().await.is_some() {
                        send.send(ScreenAction::TimerTick);
                    }
                })
                .cancellable(CancelId::new("timer"))
            }
            ScreenAction::StopButtonTapped => {
                state.is_timer_running = false;
                Effect::cancel(CancelId::new("timer"))
            }
            ScreenAction::TimerTick => {
                state.count += 1;
                Effect::none()
            }
        }
    }
}

#[derive(Debug, Default)]
struct NavigationDemoState {
    path: StackState<ScreenState>,
}

#[derive(Action, Clone, Debug)]
enum NavigationDemoAction {
    PushScreenButtonTapped,
    GoBackToScreen(StackElementId),
    PopToRoot,
    Path(StackElementId, ScreenAction),
}

fn navigation_demo() -> impl Reducer<State = NavigationDemoState, Action = NavigationDemoAction> {
    Reduce::new(|state: &mut NavigationDemoState, action| {
        match action {
            NavigationDemoAction::PushScreenButtonTapped => {
                state.path.push(ScreenState::default());
            }
            NavigationDemoAction::GoBackToScreen(id) => {
                state.path.pop_to(id);
            }
            NavigationDemoAction::PopToRoot => {
                state.path.remove_all();
            }
            NavigationDemoAction::Path(_, _) => {}
        }
        Effect::none()
    })
    .for_each_stack(
        "path",
        |s| &mut s.path,
        CasePath::new(
            |a| match a {
                NavigationDemoAction::Path(id, action) => Ok((id, action)),
                other => Err(other),
            },
            |(id, action)| NavigationDemoAction::Path(id, action),
        ),
        TimerScreen {
            clock: Clock::system(),
        },
    )
}

fn store() -> (
    Store<NavigationDemoState, NavigationDemoAction>,
    ActionLog<NavigationDemoAction>,
) {
    let log = ActionLog::new();
    let store = Store::new(
        NavigationDemoState::default(),
        Recorded::new(navigation_demo(), log.clone()),
    );
    (store, log)
}

fn push_screens(store: &Store<NavigationDemoState, NavigationDemoAction>, n: usize) -> Vec<StackElementId> {
    for _ in 0..n {
        store.send(NavigationDemoAction::PushScreenButtonTapped);
    }
    store.with_state(|s| s.path.ids().collect())
}

async fn step_seconds(n: u64) {
    tokio::task::yield_now().await;
    for _ in 0..n {
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_identical_screens_get_distinct_ids() {
    let (store, _log) = store();

    let ids = push_screens(&store, 3);

    assert_eq!(ids.len(), 3);
    assert!(ids[0] < ids[1] && ids[1] < ids[2]);
}

#[tokio::test]
async fn test_pop_to_removes_target_and_above() {
    let (store, _log) = store();
    let ids = push_screens(&store, 3);

    store.send(NavigationDemoAction::GoBackToScreen(ids[1]));

    store.with_state(|s| {
        assert_eq!(s.path.ids().collect::<Vec<_>>(), vec![ids[0]]);
    });
}

#[tokio::test(start_paused = true)]
async fn test_pop_kills_popped_timers_but_not_survivors() {
    let (store, log) = store();
    let ids = push_screens(&store, 3);

    for id in &ids {
        store.send(NavigationDemoAction::Path(*id, ScreenAction::StartButtonTapped));
    }
    step_seconds(1).await;
    store.with_state(|s| {
        for id in &ids {
            assert_eq!(s.path.get(*id).map(|screen| screen.count), Some(1));
        }
    });

    store.send(NavigationDemoAction::GoBackToScreen(ids[1]));
    log.drain();

    step_seconds(2).await;

    // The surviving screen keeps ticking; the popped screens are silent.
    store.with_state(|s| {
        assert_eq!(s.path.get(ids[0]).map(|screen| screen.count), Some(3));
    });
    let actions = log.drain();
    assert_delivered!(actions, NavigationDemoAction::Path(id, ScreenAction::TimerTick) if *id == ids[0]);
    assert_not_delivered!(actions, NavigationDemoAction::Path(id, ScreenAction::TimerTick) if *id != ids[0]);
}

#[tokio::test(start_paused = true)]
async fn test_pop_to_root_cancels_everything() {
    let (store, log) = store();
    let ids = push_screens(&store, 2);

    for id in &ids {
        store.send(NavigationDemoAction::Path(*id, ScreenAction::StartButtonTapped));
    }
    step_seconds(1).await;

    store.send(NavigationDemoAction::PopToRoot);
    log.drain();
    step_seconds(3).await;

    store.with_state(|s| assert!(s.path.is_empty()));
    assert_not_delivered!(log.drain(), NavigationDemoAction::Path(_, ScreenAction::TimerTick));
}

#[tokio::test(start_paused = true)]
async fn test_action_for_popped_screen_is_dropped() {
    let (store, _log) = store();
    let ids = push_screens(&store, 2);

    store.send(NavigationDemoAction::GoBackToScreen(ids[1]));
    let handle = store.send(NavigationDemoAction::Path(ids[1], ScreenAction::StartButtonTapped));

    assert!(handle.is_finished());
    store.with_state(|s| {
        assert_eq!(s.path.len(), 1);
        assert!(!s.path.get(ids[0]).is_some_and(|screen| screen.is_timer_running));
    });
}

#[tokio::test(start_paused = true)]
async fn test_stop_button_cancels_only_this_screens_timer() {
    let (store, log) = store();
    let ids = push_screens(&store, 2);

    for id in &ids {
        store.send(NavigationDemoAction::Path(*id, ScreenAction::StartButtonTapped));
    }
    step_seconds(1).await;

    store.send(NavigationDemoAction::Path(ids[1], ScreenAction::StopButtonTapped));
    log.drain();
    step_seconds(2).await;

    store.with_state(|s| {
        assert_eq!(s.path.get(ids[0]).map(|screen| screen.count), Some(3));
        assert_eq!(s.path.get(ids[1]).map(|screen| screen.count), Some(1));
        assert!(!s.path.get(ids[1]).is_some_and(|screen| screen.is_timer_running));
    });
}
