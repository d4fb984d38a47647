//! Test utilities for compose-dispatch applications
//!
//! - [`ActionLog`] + [`Recorded`]: capture every action a reducer processes,
//!   so tests can assert what was (and wasn't) delivered
//! - `assert_delivered!` / `assert_not_delivered!` / `count_delivered!`:
//!   pattern-matching assertions over captured actions
//! - Time control helpers behind the `testing-time` feature
//!
//! # Example
//!
//! ```ignore
//! let log = ActionLog::new();
//! let store = Store::new(State::default(), Recorded::new(reducer(), log.clone()));
//!
//! store.send(Action::FactButtonTapped).finish().await;
//!
//! let actions = log.drain();
//! assert_delivered!(actions, Action::FactResponse(Ok(_)));
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::reducer::Reducer;

/// Shared, clonable log of actions a reducer has processed.
pub struct ActionLog<A> {
    actions: Arc<Mutex<Vec<A>>>,
}

impl<A> ActionLog<A> {
    pub fn new() -> Self {
        Self {
            actions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn record(&self, action: A) {
        self.actions.lock().push(action);
    }

    /// Take every recorded action, leaving the log empty.
    pub fn drain(&self) -> Vec<A> {
        std::mem::take(&mut *self.actions.lock())
    }

    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }
}

impl<A: Clone> ActionLog<A> {
    /// Copy of everything recorded so far, without draining.
    pub fn all(&self) -> Vec<A> {
        self.actions.lock().clone()
    }
}

impl<A> Clone for ActionLog<A> {
    fn clone(&self) -> Self {
        Self {
            actions: Arc::clone(&self.actions),
        }
    }
}

impl<A> Default for ActionLog<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reducer wrapper that records every action it processes into an
/// [`ActionLog`] before delegating.
///
/// Because cancelled effects never deliver their actions, the log is the
/// place to assert that a superseded response really was dropped.
pub struct Recorded<R: Reducer> {
    inner: R,
    log: ActionLog<R::Action>,
}

impl<R: Reducer> Recorded<R> {
    pub fn new(inner: R, log: ActionLog<R::Action>) -> Self {
        Self { inner, log }
    }
}

impl<R: Reducer> Reducer for Recorded<R> {
    type State = R::State;
    type Action = R::Action;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
    ) -> crate::effect::Effect<Self::Action> {
        self.log.record(action.clone());
        self.inner.reduce(state, action)
    }
}

/// Assert that an action matching the pattern was delivered.
///
/// ```ignore
/// assert_delivered!(actions, Action::FactResponse(_));
/// ```
#[macro_export]
macro_rules! assert_delivered {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            $actions.iter().any(|a| matches!(a, $pattern $(if $guard)?)),
            "Expected action matching `{}` to be delivered, but got: {:?}",
            stringify!($pattern),
            $actions
        );
    };
}

/// Assert that NO action matching the pattern was delivered.
#[macro_export]
macro_rules! assert_not_delivered {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            !$actions.iter().any(|a| matches!(a, $pattern $(if $guard)?)),
            "Expected no action matching `{}` to be delivered, but got: {:?}",
            stringify!($pattern),
            $actions
        );
    };
}

/// Count delivered actions matching a pattern.
#[macro_export]
macro_rules! count_delivered {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        $actions
            .iter()
            .filter(|a| matches!(a, $pattern $(if $guard)?))
            .count()
    };
}

/// Pause the tokio clock. Requires a current-thread runtime.
#[cfg(feature = "testing-time")]
pub fn pause_time() {
    tokio::time::pause();
}

/// Resume the tokio clock.
#[cfg(feature = "testing-time")]
pub fn resume_time() {
    tokio::time::resume();
}

/// Advance the paused tokio clock, firing any timers that come due.
#[cfg(feature = "testing-time")]
pub async fn advance_time(duration: std::time::Duration) {
    tokio::time::advance(duration).await;
}
