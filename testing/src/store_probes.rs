//! Probes for observing a running store from tests.
//!
//! [`RecordingMiddleware`] registers like any reducible middleware and
//! captures every delivered action together with the settled state it was
//! delivered against. [`TransitionCollector`] drains published transitions
//! with a timeout so a missing publish fails the test instead of hanging it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use flowdux_core::action::{Action, AnyAction};
use flowdux_runtime::effects::EffectRunner;
use flowdux_runtime::middleware::ReducibleMiddleware;
use flowdux_runtime::store::{StateTransition, Store, Subscription};

/// Shared view into what a [`RecordingMiddleware`] has seen.
pub struct Recording<S, A: Action> {
    log: Arc<Mutex<Vec<(AnyAction<A>, S)>>>,
}

impl<S: Clone, A: Action> Recording<S, A> {
    /// The recorded actions, in delivery order.
    #[must_use]
    pub fn actions(&self) -> Vec<AnyAction<A>> {
        self.lock().iter().map(|(action, _)| action.clone()).collect()
    }

    /// The recorded (action, settled state) pairs.
    #[must_use]
    pub fn entries(&self) -> Vec<(AnyAction<A>, S)> {
        self.lock().clone()
    }

    /// How many actions have been delivered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been delivered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(AnyAction<A>, S)>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A reducible middleware that records everything it is delivered.
pub struct RecordingMiddleware<S, A: Action> {
    log: Arc<Mutex<Vec<(AnyAction<A>, S)>>>,
}

impl<S, A: Action> RecordingMiddleware<S, A> {
    /// Create a recorder and the handle used to inspect it.
    #[must_use]
    pub fn new() -> (Self, Recording<S, A>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: Arc::clone(&log),
            },
            Recording { log },
        )
    }
}

impl<S, A> ReducibleMiddleware<S, A> for RecordingMiddleware<S, A>
where
    S: Clone + Send + 'static,
    A: Action,
{
    fn reduce(&mut self, action: &AnyAction<A>, state: &S, _effects: &mut EffectRunner<S, A>) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((action.clone(), state.clone()));
    }
}

/// Collects published transitions, failing fast when one is missing.
pub struct TransitionCollector<S> {
    subscription: Subscription<S>,
    timeout: Duration,
}

impl<S: Clone + Send + 'static> TransitionCollector<S> {
    /// Subscribe to `store` with a one second per-transition timeout.
    #[must_use]
    pub fn attach<A: Action>(store: &Store<S, A>) -> Self
    where
        S: flowdux_core::reducer::AppReducer<A>,
    {
        Self {
            subscription: store.subscribe(),
            timeout: Duration::from_secs(1),
        }
    }

    /// Override the per-transition timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Take exactly `count` transitions.
    ///
    /// # Panics
    ///
    /// Panics when a transition does not arrive within the timeout or the
    /// store closes early; both mean the test's expectation was wrong.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub async fn take(&mut self, count: usize) -> Vec<StateTransition<S>> {
        let mut transitions = Vec::with_capacity(count);
        for index in 0..count {
            let next = tokio::time::timeout(self.timeout, self.subscription.next())
                .await
                .unwrap_or_else(|_| {
                    panic!("timed out waiting for transition {} of {count}", index + 1)
                });
            let transition = next.expect("store closed before delivering expected transitions");
            transitions.push(transition);
        }
        transitions
    }

    /// Assert that no transition is published within `window`.
    ///
    /// # Panics
    ///
    /// Panics if a transition arrives.
    #[allow(clippy::panic)] // Test code can panic
    pub async fn expect_quiet(&mut self, window: Duration) {
        let result = tokio::time::timeout(window, self.subscription.next()).await;
        assert!(
            result.is_err(),
            "expected no transition, but one was published"
        );
    }
}
