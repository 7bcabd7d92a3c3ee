//! Async store runtime for flowdux.
//!
//! The centerpiece is [`Store`], a serialized dispatch loop that owns the
//! application state. Every dispatched action travels through one of two
//! priority queues into a single worker task, which reduces the state,
//! publishes [`StateTransition`]s to subscribers and notifies registered
//! middlewares. Because a single task owns the state, reducers never need
//! locks and observers always see transitions in dispatch order.
//!
//! ```no_run
//! use flowdux_core::{Action, AnyAction, Reducible};
//! use flowdux_runtime::{Store, StoreConfig};
//!
//! #[derive(Clone, PartialEq, Debug)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! impl Action for CounterAction {}
//!
//! #[derive(Clone, PartialEq, Default, Debug)]
//! struct CounterState {
//!     count: u64,
//! }
//!
//! impl Reducible<CounterAction> for CounterState {
//!     fn reduce(&mut self, action: &AnyAction<CounterAction>) -> bool {
//!         match action {
//!             AnyAction::App(CounterAction::Increment) => {
//!                 self.count += 1;
//!                 true
//!             }
//!             _ => false,
//!         }
//!     }
//! }
//!
//! # async fn demo() -> Result<(), flowdux_runtime::StoreError> {
//! let store = Store::new(CounterState::default());
//! store.dispatch(CounterAction::Increment)?;
//! store.drained().await?;
//! assert_eq!(store.state().count, 1);
//! # Ok(())
//! # }
//! ```
//!
//! Middlewares come in two flavors: [`ReducibleMiddleware`] sees every
//! action after the state has settled, while [`ObservableMiddleware`]
//! declares a [`PartialEq`] scope over the state and is only woken when
//! that scope actually changes. Both drive side work through an
//! [`EffectRunner`], which keys every running effect by an
//! [`EffectToken`](flowdux_core::EffectToken) so duplicate starts are
//! no-ops and cancellation is a map lookup.

pub mod effects;
pub mod logging;
pub mod middleware;
pub mod storage;
pub mod store;

pub use effects::EffectRunner;
pub use logging::ActionLogger;
pub use middleware::{MiddlewareKey, MiddlewareStatus, ObservableMiddleware, ReducibleMiddleware};
pub use storage::{Cached, KeyValueStorage, MemoryStorage, StorageError, StorageExt};
pub use store::{ObserverHandle, Priority, StateTransition, Store, StoreConfig, Subscription};

use thiserror::Error;

/// Errors surfaced by the store's public API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store has begun shutting down and no longer accepts work.
    #[error("store is shutting down")]
    ShuttingDown,

    /// The worker task has stopped; every handle to it was dropped or it
    /// already completed shutdown.
    #[error("store worker has stopped")]
    Closed,

    /// Graceful shutdown did not finish within the configured timeout.
    #[error("store shutdown timed out after {0:?}")]
    ShutdownTimeout(std::time::Duration),
}
