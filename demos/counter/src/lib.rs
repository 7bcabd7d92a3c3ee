//! # Counter demo
//!
//! A small but complete flowdux application:
//!
//! - A composite state built with `#[derive(Reducible)]`
//! - A reducible middleware running a delayed autosave effect
//! - An observable middleware watching a single scope
//!
//! ## Example
//!
//! ```no_run
//! use counter::{CounterAction, DemoState};
//! use flowdux_runtime::Store;
//!
//! # async fn example() -> Result<(), flowdux_runtime::StoreError> {
//! let store = Store::new(DemoState::default());
//! store.dispatch(CounterAction::Increment)?;
//! store.drained().await?;
//! assert_eq!(store.state().counter.count, 1);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use flowdux_core::action::{Action, AnyAction};
use flowdux_core::effect::{Effect, EffectToken};
use flowdux_core::reducer::Reducible;
use flowdux_macros::Reducible;
use flowdux_runtime::{EffectRunner, ObservableMiddleware, ReducibleMiddleware};
use tracing::info;

/// Everything that can happen to the demo.
#[derive(Debug, Clone, PartialEq)]
pub enum CounterAction {
    /// Increment the counter by 1
    Increment,
    /// Decrement the counter by 1
    Decrement,
    /// Reset the counter to 0
    Reset,
    /// The autosave effect finished
    Saved,
}

impl Action for CounterAction {}

/// The counter itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CounterState {
    /// Current count value
    pub count: i64,
}

impl Reducible<CounterAction> for CounterState {
    fn reduce(&mut self, action: &AnyAction<CounterAction>) -> bool {
        match action {
            AnyAction::App(CounterAction::Increment) => {
                self.count += 1;
                true
            },
            AnyAction::App(CounterAction::Decrement) => {
                self.count -= 1;
                true
            },
            AnyAction::App(CounterAction::Reset) if self.count != 0 => {
                self.count = 0;
                true
            },
            _ => false,
        }
    }
}

/// Tracks whether the current count has been persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaveState {
    /// How many autosaves have completed
    pub saves: u64,
    /// Whether the counter changed since the last save
    pub dirty: bool,
}

impl Reducible<CounterAction> for SaveState {
    fn reduce(&mut self, action: &AnyAction<CounterAction>) -> bool {
        match action {
            AnyAction::App(CounterAction::Saved) => {
                self.saves += 1;
                self.dirty = false;
                true
            },
            AnyAction::App(
                CounterAction::Increment | CounterAction::Decrement | CounterAction::Reset,
            ) => {
                self.dirty = true;
                true
            },
            _ => false,
        }
    }
}

/// Root state: two children composed by the derive macro.
#[derive(Reducible, Debug, Clone, PartialEq, Default)]
#[reducible(action = CounterAction)]
pub struct DemoState {
    /// The counter
    #[reducible]
    pub counter: CounterState,

    /// Autosave bookkeeping
    #[reducible]
    pub save: SaveState,
}

/// Debounces an autosave while the counter keeps changing.
///
/// Every counting action (re)starts a delayed save effect under one token;
/// as long as a save is pending, further changes are no-ops against the
/// occupied token and the original deadline stands.
pub struct AutosaveMiddleware {
    delay: Duration,
}

impl AutosaveMiddleware {
    /// Autosave after `delay` of the first unsaved change.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    fn token() -> EffectToken {
        EffectToken::from("autosave")
    }
}

impl ReducibleMiddleware<DemoState, CounterAction> for AutosaveMiddleware {
    fn reduce(
        &mut self,
        action: &AnyAction<CounterAction>,
        state: &DemoState,
        effects: &mut EffectRunner<DemoState, CounterAction>,
    ) {
        match action {
            AnyAction::App(
                CounterAction::Increment | CounterAction::Decrement | CounterAction::Reset,
            ) if state.save.dirty => {
                let delay = self.delay;
                let _ = effects.execute(
                    Self::token(),
                    Effect::value(async move {
                        tokio::time::sleep(delay).await;
                        CounterAction::Saved
                    }),
                );
            },
            _ => {},
        }
    }
}

/// Logs every change to the count, and only to the count.
pub struct CountWatcher;

impl ObservableMiddleware<DemoState, CounterAction> for CountWatcher {
    type Scope = i64;

    fn scope(&self, state: &DemoState) -> i64 {
        state.counter.count
    }

    fn observe(
        &mut self,
        state: &DemoState,
        _effects: &mut EffectRunner<DemoState, CounterAction>,
    ) {
        info!(count = state.counter.count, "Count changed");
    }
}
