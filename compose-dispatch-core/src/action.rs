//! Action trait for type-safe state transitions

use std::fmt::Debug;

/// Marker trait for actions that can be sent to a store
///
/// Actions describe "what happened". They should be:
/// - Clone: Actions may be logged, routed through several composed reducers, or replayed
/// - Debug: For debugging and logging
/// - Send + 'static: Effects deliver actions back from other tasks
///
/// Use `#[derive(Action)]` from `compose-dispatch-macros` to auto-implement this trait.
pub trait Action: Clone + Debug + Send + 'static {
    /// Get the action name for logging and filtering
    fn name(&self) -> &'static str;
}
