//! compose-dispatch: Composable state management for async Rust apps
//!
//! Like Redux/Elm, but for feature trees: state lives in one store, all
//! mutations happen through dispatched actions, and async work is described
//! by effects whose lifetimes are tied to the state that spawned them.
//!
//! # Example
//! ```ignore
//! use compose_dispatch::prelude::*;
//!
//! #[derive(Action, Clone, Debug)]
//! enum AppAction {
//!     IncrementButtonTapped,
//!     DecrementButtonTapped,
//! }
//! ```

// Re-export everything from core
pub use compose_dispatch_core::*;

// Re-export derive macros
pub use compose_dispatch_macros::Action;

/// Prelude for convenient imports
pub mod prelude {
    pub use compose_dispatch_core::prelude::*;
    pub use compose_dispatch_macros::Action;
}
