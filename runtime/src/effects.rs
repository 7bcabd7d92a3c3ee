//! Token-keyed effect execution.
//!
//! Every middleware owns an [`EffectRunner`]: a registry of in-flight async
//! work keyed by [`EffectToken`]. Starting an effect under an occupied token
//! is a no-op, which makes "kick off the fetch if it isn't already running"
//! a one-liner with no bookkeeping in the middleware itself. Cancellation
//! aborts the driving task and feeds a
//! [`DidCancelEffect`](AnyAction::DidCancelEffect) action back through the
//! store so reducers can roll back optimistic state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

use flowdux_core::action::{Action, AnyAction, InternalAction};
use flowdux_core::effect::{Effect, EffectError, EffectToken};

use crate::store::{Dispatcher, Priority};

/// One in-flight effect.
///
/// `abort` is `None` only in the window between reserving the token and
/// spawning the driving task; both happen in the same synchronous call, so
/// `cancel` never observes an unarmed slot from the worker. `generation`
/// guards against a finished task removing a slot that was already replaced.
struct EffectSlot {
    abort: Option<AbortHandle>,
    generation: u64,
}

type SlotMap = Arc<Mutex<HashMap<EffectToken, EffectSlot>>>;

fn lock_slots(slots: &SlotMap) -> std::sync::MutexGuard<'_, HashMap<EffectToken, EffectSlot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Executes and tracks effects on behalf of one middleware.
///
/// Dropped when its middleware unsubscribes; dropping aborts every running
/// effect without dispatching cancellation actions.
pub struct EffectRunner<S, A: Action> {
    dispatcher: Dispatcher<S, A>,
    state: watch::Receiver<S>,
    slots: SlotMap,
    next_generation: u64,
}

impl<S, A> EffectRunner<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Action,
{
    pub(crate) fn new(dispatcher: Dispatcher<S, A>, state: watch::Receiver<S>) -> Self {
        Self {
            dispatcher,
            state,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: 0,
        }
    }

    /// Start an effect whose emissions are dispatched as application actions.
    ///
    /// Returns `false` without doing anything if `token` is already running.
    /// Emissions dispatch at default priority; an error emission dispatches
    /// [`AnyAction::EffectError`] and ends the effect. When the effect's
    /// stream finishes the token frees itself.
    pub fn execute(&mut self, token: impl Into<EffectToken>, effect: Effect<A>) -> bool {
        self.execute_with(token, effect, AnyAction::App)
    }

    /// Start an effect with a custom mapping from emissions to actions.
    pub fn execute_with<T, F>(
        &mut self,
        token: impl Into<EffectToken>,
        effect: Effect<T>,
        map: F,
    ) -> bool
    where
        T: Send + 'static,
        F: Fn(T) -> AnyAction<A> + Send + 'static,
    {
        self.execute_map_err(token, effect, map, |token, error| AnyAction::EffectError {
            token,
            message: error.to_string(),
        })
    }

    /// Start an effect with custom mappings for both emissions and failure.
    ///
    /// `map_error` runs at most once: the first error emission ends the
    /// effect after its mapped action is dispatched.
    pub fn execute_map_err<T, F, E>(
        &mut self,
        token: impl Into<EffectToken>,
        effect: Effect<T>,
        map: F,
        map_error: E,
    ) -> bool
    where
        T: Send + 'static,
        F: Fn(T) -> AnyAction<A> + Send + 'static,
        E: FnOnce(EffectToken, EffectError) -> AnyAction<A> + Send + 'static,
    {
        let token = token.into();
        let Some(generation) = self.reserve(&token) else {
            debug!(token = %token, "Effect token occupied, ignoring start");
            return false;
        };

        let dispatcher = self.dispatcher.clone();
        let slots = Arc::clone(&self.slots);
        let task_token = token.clone();
        let mut stream = effect.into_stream();

        let handle = tokio::spawn(async move {
            let mut map_error = Some(map_error);
            while let Some(item) = stream.next().await {
                let action = match item {
                    Ok(value) => map(value),
                    Err(error) => {
                        if let Some(map_error) = map_error.take() {
                            let failure = map_error(task_token.clone(), error);
                            let _ = dispatcher
                                .dispatch_internal(InternalAction::new(failure), Priority::Default);
                        }
                        break;
                    },
                };
                if dispatcher
                    .dispatch_internal(InternalAction::new(action), Priority::Default)
                    .is_err()
                {
                    break;
                }
            }
            release(&slots, &task_token, generation);
        });

        self.arm(&token, generation, handle.abort_handle());
        metrics::counter!("store.effects.started").increment(1);
        debug!(token = %token, "Effect started");
        true
    }

    /// Start an effect whose emissions are gated by a state predicate.
    ///
    /// Each emission samples the last published state; the action is
    /// dispatched only when `filter` approves it. Useful for long-lived
    /// streams that should go quiet while some mode is off without tearing
    /// the subscription down.
    pub fn run<P>(
        &mut self,
        token: impl Into<EffectToken>,
        effect: Effect<A>,
        filter: P,
    ) -> bool
    where
        P: Fn(&S, &A) -> bool + Send + 'static,
    {
        let token = token.into();
        let Some(generation) = self.reserve(&token) else {
            debug!(token = %token, "Effect token occupied, ignoring start");
            return false;
        };

        let dispatcher = self.dispatcher.clone();
        let state = self.state.clone();
        let slots = Arc::clone(&self.slots);
        let task_token = token.clone();
        let mut stream = effect.into_stream();

        let handle = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(action) => {
                        let approved = filter(&state.borrow(), &action);
                        if !approved {
                            continue;
                        }
                        if dispatcher
                            .dispatch_internal(
                                InternalAction::new(AnyAction::App(action)),
                                Priority::Default,
                            )
                            .is_err()
                        {
                            break;
                        }
                    },
                    Err(error) => {
                        let failure = AnyAction::EffectError {
                            token: task_token.clone(),
                            message: error.to_string(),
                        };
                        let _ = dispatcher
                            .dispatch_internal(InternalAction::new(failure), Priority::Default);
                        break;
                    },
                }
            }
            release(&slots, &task_token, generation);
        });

        self.arm(&token, generation, handle.abort_handle());
        metrics::counter!("store.effects.started").increment(1);
        debug!(token = %token, "Effect started (filtered)");
        true
    }

    /// Cancel the effect registered under `token`.
    ///
    /// Aborts the driving task, frees the token, and dispatches
    /// [`AnyAction::DidCancelEffect`] exactly once. Returns `false` if no
    /// effect was running under the token.
    pub fn cancel(&mut self, token: &EffectToken) -> bool {
        let removed = lock_slots(&self.slots).remove(token);
        let Some(slot) = removed else {
            return false;
        };
        if let Some(abort) = slot.abort {
            abort.abort();
        }
        metrics::counter!("store.effects.cancelled").increment(1);
        debug!(token = %token, "Effect cancelled");
        let _ = self.dispatcher.dispatch_internal(
            InternalAction::new(AnyAction::DidCancelEffect {
                token: token.clone(),
            }),
            Priority::Default,
        );
        true
    }

    /// Cancel every running effect, dispatching one
    /// [`AnyAction::DidCancelEffect`] per token.
    pub fn cancel_all(&mut self) {
        let tokens: Vec<EffectToken> = lock_slots(&self.slots).keys().cloned().collect();
        for token in tokens {
            self.cancel(&token);
        }
    }

    /// Whether an effect is currently registered under `token`.
    #[must_use]
    pub fn is_running(&self, token: &EffectToken) -> bool {
        lock_slots(&self.slots).contains_key(token)
    }

    /// Number of in-flight effects.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_slots(&self.slots).len()
    }

    /// Whether no effects are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve `token`, returning the slot generation, or `None` if occupied.
    ///
    /// The slot is inserted before the task is spawned so an instantly
    /// completing task finds its own slot to release rather than racing the
    /// insertion.
    fn reserve(&mut self, token: &EffectToken) -> Option<u64> {
        let mut slots = lock_slots(&self.slots);
        if slots.contains_key(token) {
            return None;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        slots.insert(
            token.clone(),
            EffectSlot {
                abort: None,
                generation,
            },
        );
        Some(generation)
    }

    fn arm(&self, token: &EffectToken, generation: u64, abort: AbortHandle) {
        let mut slots = lock_slots(&self.slots);
        if let Some(slot) = slots.get_mut(token) {
            if slot.generation == generation {
                slot.abort = Some(abort);
            }
        }
    }
}

/// Free a slot from inside its own driving task, if it still owns the token.
fn release(slots: &SlotMap, token: &EffectToken, generation: u64) {
    let mut slots = lock_slots(slots);
    if slots
        .get(token)
        .is_some_and(|slot| slot.generation == generation)
    {
        slots.remove(token);
    }
}

impl<S, A: Action> Drop for EffectRunner<S, A> {
    fn drop(&mut self) {
        for slot in lock_slots(&self.slots).values() {
            if let Some(abort) = &slot.abort {
                abort.abort();
            }
        }
    }
}
