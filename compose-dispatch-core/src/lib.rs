//! Core traits and types for compose-dispatch
//!
//! This crate provides the foundational abstractions for building
//! applications around a single unidirectional data flow, following a
//! Redux/Elm-inspired architecture with composable feature trees.
//!
//! # Core Concepts
//!
//! - **Action**: Events that describe what happened
//! - **Reducer**: Pure transition function `(State, Action) -> Effect`
//! - **Effect**: Declarative description of async work that feeds actions back
//! - **Store**: Serializes actions, owns state, runs and cancels effects
//! - **Scoping**: Lifts child reducers into a parent's state/action space
//!
//! # Basic Example
//!
//! ```ignore
//! use compose_dispatch_core::prelude::*;
//!
//! #[derive(Action, Clone, Debug)]
//! enum CounterAction {
//!     Increment,
//!     Decrement,
//! }
//!
//! #[derive(Clone, Default)]
//! struct Counter {
//!     count: i32,
//! }
//!
//! fn counter() -> impl Reducer<State = Counter, Action = CounterAction> {
//!     Reduce::new(|state: &mut Counter, action| {
//!         match action {
//!             CounterAction::Increment => state.count += 1,
//!             CounterAction::Decrement => state.count -= 1,
//!         }
//!         Effect::none()
//!     })
//! }
//!
//! # async fn demo() {
//! let store = Store::new(Counter::default(), counter());
//! store.send(CounterAction::Increment);
//! assert_eq!(store.state().count, 1);
//! # }
//! ```
//!
//! # Effects and cancellation
//!
//! Reducers return effects instead of performing work. An effect tagged with
//! a [`CancelId`] can be cancelled later by identity, and scoping
//! combinators cancel everything a child registered when that child's state
//! goes away:
//!
//! ```ignore
//! Action::FactButtonTapped => {
//!     state.is_loading = true;
//!     let client = self.fact_client.clone();
//!     let count = state.count;
//!     Effect::run(move |send| async move {
//!         send.send(Action::FactResponse(client.fetch(count).await));
//!     })
//!     .cancellable_in_flight(CancelId::new("fact"))
//! }
//! Action::CancelButtonTapped => {
//!     state.is_loading = false;
//!     Effect::cancel(CancelId::new("fact"))
//! }
//! ```

pub mod action;
pub mod cancel;
pub mod clients;
pub mod effect;
pub mod identified;
pub mod presentation;
pub mod reducer;
pub mod stack;
pub mod store;
pub mod testing;

// Core trait exports
pub use action::Action;

// Effect exports
pub use effect::{ActionSender, BoxFuture, BoxStream, Effect};

// Cancellation exports
pub use cancel::CancelId;

// Reducer and composition exports
pub use reducer::{CasePath, NoopReducer, Reduce, Reducer, ReducerExt, Scope};

// Collection and navigation exports
pub use identified::{ForEach, Identifiable, IdentifiedVec};
pub use presentation::{IfLet, Present, PresentationAction, Presented};
pub use stack::{ForEachStack, StackElementId, StackState};

// Store exports
pub use store::{SendHandle, Store};

// Capability client exports
pub use clients::{
    Clock, DownloadClient, DownloadError, DownloadEvent, FactClient, FactError, IdGen,
    ScreenshotClient,
};

// Testing exports
pub use testing::{ActionLog, Recorded};

#[cfg(feature = "testing-time")]
pub use testing::{advance_time, pause_time, resume_time};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::cancel::CancelId;
    pub use crate::clients::{
        Clock, DownloadClient, DownloadError, DownloadEvent, FactClient, FactError, IdGen,
        ScreenshotClient,
    };
    pub use crate::effect::{ActionSender, BoxFuture, BoxStream, Effect};
    pub use crate::identified::{Identifiable, IdentifiedVec};
    pub use crate::presentation::{PresentationAction, Presented};
    pub use crate::reducer::{CasePath, NoopReducer, Reduce, Reducer, ReducerExt, Scope};
    pub use crate::stack::{StackElementId, StackState};
    pub use crate::store::{SendHandle, Store};
}
