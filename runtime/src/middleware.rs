//! Middleware flavors and their lifecycle.
//!
//! A middleware is a long-lived observer registered with the store. It never
//! mutates state directly; it reacts to what the store publishes and feeds
//! results back by dispatching actions through its [`EffectRunner`].
//!
//! Two flavors exist:
//!
//! * [`ReducibleMiddleware`] receives every action after the batch it
//!   belongs to has been reduced, along with the settled state. The
//!   `silent` flag suppresses logging only; lifecycle actions still
//!   arrive here.
//! * [`ObservableMiddleware`] projects a [`PartialEq`] scope out of the
//!   state and is woken only when that scope differs between the previous
//!   and the new published state.
//!
//! Both flavors report a [`MiddlewareStatus`] computed from the current
//! state. While `Suspended` a middleware receives nothing, and the moment
//! it transitions out of `Active` all of its running effects are cancelled.
//! Transitioning back to `Active` re-observes the current state once (for
//! observable middlewares) but never replays missed actions.

use flowdux_core::action::{Action, AnyAction, InternalAction};

use crate::effects::EffectRunner;

/// Whether a middleware currently wants to receive notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MiddlewareStatus {
    /// Deliver actions / scope changes and keep effects running.
    Active,
    /// Deliver nothing; entering this status cancels all running effects.
    Suspended,
}

/// A middleware that inspects every action flowing through the store.
///
/// `reduce` is invoked once per flattened action in a batch, silent or
/// not, after the whole batch has been applied to the state, so `state`
/// is always the settled post-batch value.
pub trait ReducibleMiddleware<S, A: Action>: Send + 'static {
    /// Compute the current status from the state. Defaults to always active.
    fn status(&self, state: &S) -> MiddlewareStatus {
        let _ = state;
        MiddlewareStatus::Active
    }

    /// React to a single action against the settled state.
    fn reduce(&mut self, action: &AnyAction<A>, state: &S, effects: &mut EffectRunner<S, A>);
}

/// A middleware woken only when its projection of the state changes.
pub trait ObservableMiddleware<S, A: Action>: Send + 'static {
    /// The slice of state this middleware cares about.
    type Scope: PartialEq;

    /// Compute the current status from the state. Defaults to always active.
    fn status(&self, state: &S) -> MiddlewareStatus {
        let _ = state;
        MiddlewareStatus::Active
    }

    /// Project the watched scope out of the state.
    fn scope(&self, state: &S) -> Self::Scope;

    /// React to a state whose scope differs from the last observed one.
    ///
    /// Also called once on subscription and once per suspend→active
    /// transition, regardless of whether the scope changed.
    fn observe(&mut self, state: &S, effects: &mut EffectRunner<S, A>);
}

/// Identifies a registered middleware, for later unsubscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MiddlewareKey(u64);

impl MiddlewareKey {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Object-safe view of an [`ObservableMiddleware`].
///
/// The associated `Scope` type prevents boxing the trait directly, so the
/// scope comparison is folded into `scope_changed` and erased here.
pub(crate) trait ErasedObservable<S, A: Action>: Send {
    fn status(&self, state: &S) -> MiddlewareStatus;
    fn scope_changed(&self, old: &S, new: &S) -> bool;
    fn observe(&mut self, state: &S, effects: &mut EffectRunner<S, A>);
}

impl<S, A, M> ErasedObservable<S, A> for M
where
    A: Action,
    M: ObservableMiddleware<S, A>,
{
    fn status(&self, state: &S) -> MiddlewareStatus {
        ObservableMiddleware::status(self, state)
    }

    fn scope_changed(&self, old: &S, new: &S) -> bool {
        self.scope(old) != self.scope(new)
    }

    fn observe(&mut self, state: &S, effects: &mut EffectRunner<S, A>) {
        ObservableMiddleware::observe(self, state, effects);
    }
}

/// A registered middleware of either flavor.
pub(crate) enum MiddlewareKind<S, A: Action> {
    Reducible(Box<dyn ReducibleMiddleware<S, A>>),
    Observable(Box<dyn ErasedObservable<S, A>>),
}

impl<S, A> MiddlewareKind<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Action,
{
    fn status(&self, state: &S) -> MiddlewareStatus {
        match self {
            Self::Reducible(middleware) => middleware.status(state),
            Self::Observable(middleware) => middleware.status(state),
        }
    }
}

/// Worker-side bookkeeping for one registered middleware.
pub(crate) struct MiddlewareSlot<S, A: Action> {
    pub(crate) key: MiddlewareKey,
    kind: MiddlewareKind<S, A>,
    runner: EffectRunner<S, A>,
    last_status: MiddlewareStatus,
}

impl<S, A> MiddlewareSlot<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Action,
{
    /// Register a middleware against the current state.
    ///
    /// Observable middlewares in `Active` status observe the state once
    /// immediately so they start from a known baseline.
    pub(crate) fn mount(
        key: MiddlewareKey,
        kind: MiddlewareKind<S, A>,
        runner: EffectRunner<S, A>,
        state: &S,
    ) -> Self {
        let status = kind.status(state);
        let mut slot = Self {
            key,
            kind,
            runner,
            last_status: status,
        };
        if status == MiddlewareStatus::Active {
            if let MiddlewareKind::Observable(middleware) = &mut slot.kind {
                middleware.observe(state, &mut slot.runner);
            }
        }
        slot
    }

    /// Deliver one settled batch to this middleware.
    ///
    /// `old` is the state before the batch, `new` the settled state after
    /// it. Status transitions are evaluated against `new`:
    ///
    /// * active → suspended cancels every running effect, once;
    /// * suspended → active re-observes (observable) or sees the current
    ///   batch (reducible), but never replays earlier actions;
    /// * active → active delivers actions (reducible) or observes when the
    ///   scope changed (observable);
    /// * suspended → suspended delivers nothing.
    pub(crate) fn deliver(&mut self, old: &S, new: &S, batch: &[InternalAction<A>]) {
        let status = self.kind.status(new);
        let was_active = self.last_status == MiddlewareStatus::Active;
        self.last_status = status;

        match status {
            MiddlewareStatus::Suspended => {
                if was_active {
                    self.runner.cancel_all();
                }
            }
            MiddlewareStatus::Active => match &mut self.kind {
                MiddlewareKind::Reducible(middleware) => {
                    for item in batch {
                        middleware.reduce(&item.action, new, &mut self.runner);
                    }
                }
                MiddlewareKind::Observable(middleware) => {
                    if !was_active || middleware.scope_changed(old, new) {
                        middleware.observe(new, &mut self.runner);
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests_support::runner_for_tests;
    use flowdux_core::action::InternalAction;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, PartialEq, Debug)]
    enum TestAction {
        Ping,
    }

    impl Action for TestAction {}

    #[derive(Clone, PartialEq, Default, Debug)]
    struct TestState {
        enabled: bool,
        counter: u32,
        unrelated: u32,
    }

    struct Recorder {
        seen: Arc<Mutex<Vec<u32>>>,
    }

    impl ObservableMiddleware<TestState, TestAction> for Recorder {
        type Scope = u32;

        fn status(&self, state: &TestState) -> MiddlewareStatus {
            if state.enabled {
                MiddlewareStatus::Active
            } else {
                MiddlewareStatus::Suspended
            }
        }

        fn scope(&self, state: &TestState) -> u32 {
            state.counter
        }

        fn observe(&mut self, state: &TestState, _effects: &mut EffectRunner<TestState, TestAction>) {
            self.seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(state.counter);
        }
    }

    fn batch() -> Vec<InternalAction<TestAction>> {
        vec![InternalAction::new(AnyAction::App(TestAction::Ping))]
    }

    #[test]
    fn observable_only_wakes_on_scope_change() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = TestState {
            enabled: true,
            ..TestState::default()
        };
        let mut slot = MiddlewareSlot::mount(
            MiddlewareKey::new(0),
            MiddlewareKind::Observable(Box::new(Recorder { seen: seen.clone() })),
            runner_for_tests(&state),
            &state,
        );

        // Bootstrap observe fired on mount.
        assert_eq!(*seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner), vec![0]);

        // A batch that only touches unrelated state stays quiet.
        let mut next = state.clone();
        next.unrelated = 7;
        slot.deliver(&state, &next, &batch());
        assert_eq!(seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len(), 1);

        // A scope change wakes the middleware.
        let mut scoped = next.clone();
        scoped.counter = 3;
        slot.deliver(&next, &scoped, &batch());
        assert_eq!(*seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner), vec![0, 3]);
    }

    #[test]
    fn suspend_then_resume_observes_exactly_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let active = TestState {
            enabled: true,
            counter: 1,
            unrelated: 0,
        };
        let mut slot = MiddlewareSlot::mount(
            MiddlewareKey::new(0),
            MiddlewareKind::Observable(Box::new(Recorder { seen: seen.clone() })),
            runner_for_tests(&active),
            &active,
        );
        assert_eq!(seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len(), 1);

        // Suspend: nothing observed, even though the scope moved.
        let suspended = TestState {
            enabled: false,
            counter: 5,
            unrelated: 0,
        };
        slot.deliver(&active, &suspended, &batch());
        assert_eq!(seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len(), 1);

        // Suspended batches do not accumulate observes.
        let still_suspended = TestState {
            enabled: false,
            counter: 9,
            unrelated: 0,
        };
        slot.deliver(&suspended, &still_suspended, &batch());
        assert_eq!(seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len(), 1);

        // Resume observes the current state once, scope change or not.
        let resumed = TestState {
            enabled: true,
            counter: 9,
            unrelated: 0,
        };
        slot.deliver(&still_suspended, &resumed, &batch());
        assert_eq!(*seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner), vec![1, 9]);
    }
}
