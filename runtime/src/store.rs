//! The store: serialized dispatch, priority queues, and publication.
//!
//! A [`Store`] spawns one worker task that owns the application state.
//! Dispatch is a cheap channel send; the worker pulls commands off two
//! queues (default and user-interactive), reduces batches against the
//! state, publishes [`StateTransition`]s over a broadcast channel, and
//! notifies middlewares once per settled batch.
//!
//! Expedited commands are preferred over default ones, but after
//! [`StoreConfig::fairness_window`] consecutive expedited commands one
//! default command is interleaved so a burst of user interactions cannot
//! starve background work.
//!
//! All `Store` handles are clones of the same underlying store; the worker
//! stops when the last handle is dropped or [`Store::shutdown`] completes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tracing::{Instrument, debug, info_span, warn};

use flowdux_core::action::{
    Action, ActionGroup, AnimationTag, AnyAction, FlatActions, InternalAction,
};
use flowdux_core::reducer::{AppReducer, BindableContainer, BindableKey};

use crate::StoreError;
use crate::effects::EffectRunner;
use crate::logging::ActionLogger;
use crate::middleware::{
    MiddlewareKey, MiddlewareKind, MiddlewareSlot, ObservableMiddleware, ReducibleMiddleware,
};

/// Scheduling class for a dispatched command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Priority {
    /// Background work; processed in order, may be briefly deferred behind
    /// user-interactive commands.
    #[default]
    Default,
    /// Direct responses to user input; jumps ahead of default-priority work.
    UserInteractive,
}

/// One published state change.
///
/// `old` is the last published state, `new` the freshly settled one. A
/// multi-action batch normally collapses into a single transition; an
/// animated action inside a batch forces an intermediate transition
/// carrying its tag.
#[derive(Clone, Debug)]
pub struct StateTransition<S> {
    /// State before this transition.
    pub old: S,
    /// State after this transition.
    pub new: S,
    /// Animation tag of the action that forced this publish, if any.
    pub animation: Option<AnimationTag>,
    /// When the transition was published.
    pub at: DateTime<Utc>,
}

/// Tunables for a [`Store`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Broadcast buffer per subscriber; slow subscribers that fall more
    /// than this far behind skip transitions (and are told so).
    pub publish_capacity: usize,
    /// Consecutive expedited commands processed before one default command
    /// is interleaved.
    pub fairness_window: u32,
    /// How long [`Store::shutdown`] waits for the worker to finish pending
    /// work.
    pub shutdown_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            publish_capacity: 64,
            fairness_window: 4,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Set the broadcast buffer size per subscriber.
    #[must_use]
    pub const fn publish_capacity(mut self, capacity: usize) -> Self {
        self.publish_capacity = capacity;
        self
    }

    /// Set how many consecutive expedited commands may run before a default
    /// command is interleaved.
    #[must_use]
    pub const fn fairness_window(mut self, window: u32) -> Self {
        self.fairness_window = window;
        self
    }

    /// Set the graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// A dispatched unit of work: a single action or a whole group.
pub(crate) enum Payload<A: Action> {
    One(InternalAction<A>),
    Group(ActionGroup<A>),
}

/// Everything the worker task knows how to process.
pub(crate) enum Command<S, A: Action> {
    Dispatch(Payload<A>),
    Subscribe {
        kind: MiddlewareKind<S, A>,
        reply: oneshot::Sender<MiddlewareKey>,
    },
    Unsubscribe(MiddlewareKey),
    Barrier(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Weak dispatch handle held by effect tasks and the worker itself.
///
/// Weak so that in-flight effects and the worker's own feedback loop never
/// keep the queues alive: once every [`Store`] handle is gone the channels
/// close and the worker unwinds.
pub(crate) struct Dispatcher<S, A: Action> {
    default_tx: mpsc::WeakUnboundedSender<Command<S, A>>,
    expedited_tx: mpsc::WeakUnboundedSender<Command<S, A>>,
}

impl<S, A: Action> Clone for Dispatcher<S, A> {
    fn clone(&self) -> Self {
        Self {
            default_tx: self.default_tx.clone(),
            expedited_tx: self.expedited_tx.clone(),
        }
    }
}

impl<S, A: Action> Dispatcher<S, A> {
    pub(crate) fn dispatch_internal(
        &self,
        action: InternalAction<A>,
        priority: Priority,
    ) -> Result<(), StoreError> {
        let weak = match priority {
            Priority::Default => &self.default_tx,
            Priority::UserInteractive => &self.expedited_tx,
        };
        let sender = weak.upgrade().ok_or(StoreError::Closed)?;
        sender
            .send(Command::Dispatch(Payload::One(action)))
            .map_err(|_| StoreError::Closed)
    }
}

/// A handle to a running store.
///
/// Cloning is cheap and every clone addresses the same worker. Dispatch
/// methods are synchronous sends; state reads return the last published
/// snapshot without touching the worker.
pub struct Store<S, A: Action> {
    default_tx: mpsc::UnboundedSender<Command<S, A>>,
    expedited_tx: mpsc::UnboundedSender<Command<S, A>>,
    state: watch::Receiver<S>,
    transitions: broadcast::Sender<StateTransition<S>>,
    closed: Arc<AtomicBool>,
    shutdown_timeout: Duration,
}

impl<S, A: Action> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            default_tx: self.default_tx.clone(),
            expedited_tx: self.expedited_tx.clone(),
            state: self.state.clone(),
            transitions: self.transitions.clone(),
            closed: Arc::clone(&self.closed),
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

impl<S, A> Store<S, A>
where
    S: AppReducer<A>,
    A: Action,
{
    /// Start a store over `initial` with default configuration.
    ///
    /// Must be called from within a tokio runtime; the worker task is
    /// spawned immediately.
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    /// Start a store with explicit configuration.
    #[must_use]
    pub fn with_config(initial: S, config: StoreConfig) -> Self {
        Self::with_logger(initial, config, ActionLogger::new())
    }

    /// Start a store with explicit configuration and action logger.
    #[must_use]
    pub fn with_logger(initial: S, config: StoreConfig, logger: ActionLogger<A>) -> Self {
        let (default_tx, default_rx) = mpsc::unbounded_channel();
        let (expedited_tx, expedited_rx) = mpsc::unbounded_channel();
        let (watch_tx, watch_rx) = watch::channel(initial.clone());
        let (transitions, _) = broadcast::channel(config.publish_capacity);

        let dispatcher = Dispatcher {
            default_tx: default_tx.downgrade(),
            expedited_tx: expedited_tx.downgrade(),
        };

        let worker = Worker {
            state: initial,
            default_rx,
            expedited_rx,
            watch_tx,
            transitions: transitions.clone(),
            middlewares: Vec::new(),
            logger,
            dispatcher,
            fairness_window: config.fairness_window.max(1),
            expedited_streak: 0,
            next_middleware_key: 0,
            default_closed: false,
            expedited_closed: false,
        };
        tokio::spawn(worker.run().instrument(info_span!("store_worker")));

        Self {
            default_tx,
            expedited_tx,
            state: watch_rx,
            transitions,
            closed: Arc::new(AtomicBool::new(false)),
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Dispatch one action at default priority.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShuttingDown`] after [`Store::shutdown`] was called,
    /// [`StoreError::Closed`] if the worker is gone.
    #[track_caller]
    pub fn dispatch(&self, action: impl Into<AnyAction<A>>) -> Result<(), StoreError> {
        self.dispatch_internal(InternalAction::new(action), Priority::Default)
    }

    /// Dispatch one action at user-interactive priority.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    #[track_caller]
    pub fn dispatch_expedited(&self, action: impl Into<AnyAction<A>>) -> Result<(), StoreError> {
        self.dispatch_internal(InternalAction::new(action), Priority::UserInteractive)
    }

    /// Dispatch one action carrying an animation tag.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    #[track_caller]
    pub fn dispatch_animated(
        &self,
        action: impl Into<AnyAction<A>>,
        tag: impl Into<AnimationTag>,
    ) -> Result<(), StoreError> {
        self.dispatch_internal(
            InternalAction::new(action).with_animation(tag),
            Priority::Default,
        )
    }

    /// Dispatch an already-wrapped action at the given priority.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    pub fn dispatch_internal(
        &self,
        action: InternalAction<A>,
        priority: Priority,
    ) -> Result<(), StoreError> {
        self.send(Command::Dispatch(Payload::One(action)), priority)
    }

    /// Dispatch a whole group as one batch.
    ///
    /// The group flattens into a single ordered list; middlewares are
    /// notified once, after the entire batch has settled.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    pub fn dispatch_group(
        &self,
        group: ActionGroup<A>,
        priority: Priority,
    ) -> Result<(), StoreError> {
        self.send(Command::Dispatch(Payload::Group(group)), priority)
    }

    /// Mount a bindable container instance and return its key.
    ///
    /// The lifecycle action is dispatched silently; the per-instance state
    /// entry exists once the queue drains past it.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    pub fn mount_container<C: BindableContainer>(
        &self,
        id: impl Into<String>,
    ) -> Result<BindableKey, StoreError> {
        let key = BindableKey::mount(id);
        self.send(
            Command::Dispatch(Payload::One(InternalAction::container_did_load(
                C::NAME,
                key.clone(),
            ))),
            Priority::Default,
        )?;
        Ok(key)
    }

    /// Unmount a bindable container instance, dropping its state entry.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    pub fn unmount_container<C: BindableContainer>(
        &self,
        key: BindableKey,
    ) -> Result<(), StoreError> {
        self.send(
            Command::Dispatch(Payload::One(InternalAction::container_did_unload(
                C::NAME,
                key,
            ))),
            Priority::Default,
        )
    }

    /// Snapshot of the last published state.
    #[must_use]
    pub fn state(&self) -> S {
        self.state.borrow().clone()
    }

    /// Read from the last published state without cloning it.
    pub fn state_with<T>(&self, read: impl FnOnce(&S) -> T) -> T {
        read(&self.state.borrow())
    }

    /// Subscribe to published state transitions.
    ///
    /// The subscription sees every transition published after this call,
    /// in order, unless it falls further behind than the configured
    /// publish capacity.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<S> {
        Subscription {
            receiver: self.transitions.subscribe(),
        }
    }

    /// Invoke `callback` for every transition on a background task.
    ///
    /// The returned handle owns the subscription: dropping it stops the
    /// callback. There is nothing to clean up manually.
    #[must_use]
    pub fn observe<F>(&self, mut callback: F) -> ObserverHandle
    where
        F: FnMut(&StateTransition<S>) + Send + 'static,
    {
        let mut receiver = self.transitions.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(transition) => callback(&transition),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "State observer lagging, transitions dropped");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        ObserverHandle {
            abort: handle.abort_handle(),
        }
    }

    /// Register a reducible middleware.
    ///
    /// Registration is ordered with dispatch: actions dispatched after
    /// this call resolves are guaranteed to reach the middleware.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    pub async fn subscribe_reducible<M>(&self, middleware: M) -> Result<MiddlewareKey, StoreError>
    where
        M: ReducibleMiddleware<S, A>,
    {
        self.subscribe_middleware(MiddlewareKind::Reducible(Box::new(middleware)))
            .await
    }

    /// Register an observable middleware.
    ///
    /// If its status is active, it observes the current state once before
    /// any further actions are processed.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    pub async fn subscribe_observable<M>(&self, middleware: M) -> Result<MiddlewareKey, StoreError>
    where
        M: ObservableMiddleware<S, A>,
    {
        self.subscribe_middleware(MiddlewareKind::Observable(Box::new(middleware)))
            .await
    }

    async fn subscribe_middleware(
        &self,
        kind: MiddlewareKind<S, A>,
    ) -> Result<MiddlewareKey, StoreError> {
        let (reply, key) = oneshot::channel();
        self.send(Command::Subscribe { kind, reply }, Priority::Default)?;
        key.await.map_err(|_| StoreError::Closed)
    }

    /// Remove a middleware, aborting all of its running effects.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    pub fn unsubscribe_middleware(&self, key: MiddlewareKey) -> Result<(), StoreError> {
        self.send(Command::Unsubscribe(key), Priority::Default)
    }

    /// Wait until every command dispatched at default priority before this
    /// call has been processed.
    ///
    /// Actions dispatched by still-running effects are not waited for.
    ///
    /// # Errors
    ///
    /// Same as [`Store::dispatch`].
    pub async fn drained(&self) -> Result<(), StoreError> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Barrier(reply), Priority::Default)?;
        done.await.map_err(|_| StoreError::Closed)
    }

    /// Gracefully stop the store.
    ///
    /// New dispatches are refused immediately; work already queued at
    /// default priority still runs. Middlewares are dropped, aborting
    /// their effects.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownTimeout`] if pending work does not finish
    /// within the configured timeout; [`StoreError::Closed`] if the
    /// worker was already gone.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        let (reply, done) = oneshot::channel();
        // Rides the default queue so already-queued work drains first.
        self.default_tx
            .send(Command::Shutdown(reply))
            .map_err(|_| StoreError::Closed)?;
        match tokio::time::timeout(self.shutdown_timeout, done).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(StoreError::Closed),
            Err(_) => Err(StoreError::ShutdownTimeout(self.shutdown_timeout)),
        }
    }

    fn send(&self, command: Command<S, A>, priority: Priority) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::ShuttingDown);
        }
        let sender = match priority {
            Priority::Default => &self.default_tx,
            Priority::UserInteractive => &self.expedited_tx,
        };
        sender.send(command).map_err(|_| StoreError::Closed)
    }
}

/// An ordered stream of published transitions.
pub struct Subscription<S> {
    receiver: broadcast::Receiver<StateTransition<S>>,
}

impl<S: Clone + Send> Subscription<S> {
    /// Receive the next transition, or `None` once the store is gone.
    ///
    /// Lagging skips to the oldest retained transition with a warning
    /// rather than failing.
    pub async fn next(&mut self) -> Option<StateTransition<S>> {
        loop {
            match self.receiver.recv().await {
                Ok(transition) => return Some(transition),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Subscription lagging, transitions dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Owns a callback-based observer; dropping it stops the callback.
pub struct ObserverHandle {
    abort: AbortHandle,
}

impl ObserverHandle {
    /// Stop observing now instead of at drop time.
    pub fn cancel(self) {
        self.abort.abort();
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// The single task that owns the state.
struct Worker<S, A: Action> {
    state: S,
    default_rx: mpsc::UnboundedReceiver<Command<S, A>>,
    expedited_rx: mpsc::UnboundedReceiver<Command<S, A>>,
    watch_tx: watch::Sender<S>,
    transitions: broadcast::Sender<StateTransition<S>>,
    middlewares: Vec<MiddlewareSlot<S, A>>,
    logger: ActionLogger<A>,
    dispatcher: Dispatcher<S, A>,
    fairness_window: u32,
    expedited_streak: u32,
    next_middleware_key: u64,
    default_closed: bool,
    expedited_closed: bool,
}

impl<S, A> Worker<S, A>
where
    S: AppReducer<A>,
    A: Action,
{
    async fn run(mut self) {
        debug!("Store worker started");
        while let Some(command) = self.next_command().await {
            match command {
                Command::Dispatch(payload) => self.process(payload),
                Command::Subscribe { kind, reply } => {
                    self.next_middleware_key += 1;
                    let key = MiddlewareKey::new(self.next_middleware_key);
                    let runner =
                        EffectRunner::new(self.dispatcher.clone(), self.watch_tx.subscribe());
                    let slot = MiddlewareSlot::mount(key, kind, runner, &self.state);
                    self.middlewares.push(slot);
                    metrics::gauge!("store.middlewares").increment(1.0);
                    let _ = reply.send(key);
                },
                Command::Unsubscribe(key) => {
                    let before = self.middlewares.len();
                    self.middlewares.retain(|slot| slot.key != key);
                    if self.middlewares.len() < before {
                        metrics::gauge!("store.middlewares").decrement(1.0);
                    }
                },
                Command::Barrier(reply) => {
                    let _ = reply.send(());
                },
                Command::Shutdown(reply) => {
                    // Dropping the slots aborts every running effect.
                    self.middlewares.clear();
                    let _ = reply.send(());
                    break;
                },
            }
        }
        debug!("Store worker stopped");
    }

    /// Pull the next command, preferring the expedited queue but
    /// interleaving one default command per fairness window.
    async fn next_command(&mut self) -> Option<Command<S, A>> {
        use mpsc::error::TryRecvError;

        loop {
            if self.expedited_streak >= self.fairness_window {
                if let Ok(command) = self.default_rx.try_recv() {
                    self.expedited_streak = 0;
                    return Some(command);
                }
            }

            match self.expedited_rx.try_recv() {
                Ok(command) => {
                    self.expedited_streak += 1;
                    return Some(command);
                },
                Err(TryRecvError::Disconnected) => self.expedited_closed = true,
                Err(TryRecvError::Empty) => {},
            }
            match self.default_rx.try_recv() {
                Ok(command) => {
                    self.expedited_streak = 0;
                    return Some(command);
                },
                Err(TryRecvError::Disconnected) => self.default_closed = true,
                Err(TryRecvError::Empty) => {},
            }
            if self.expedited_closed && self.default_closed {
                return None;
            }

            // Both queues empty; park until either side produces.
            tokio::select! {
                biased;
                command = self.expedited_rx.recv(), if !self.expedited_closed => {
                    match command {
                        Some(command) => {
                            self.expedited_streak += 1;
                            return Some(command);
                        }
                        None => self.expedited_closed = true,
                    }
                }
                command = self.default_rx.recv(), if !self.default_closed => {
                    match command {
                        Some(command) => {
                            self.expedited_streak = 0;
                            return Some(command);
                        }
                        None => self.default_closed = true,
                    }
                }
            }
        }
    }

    /// Reduce one batch, publish, and notify middlewares.
    ///
    /// Publishes collapse: a batch yields one transition at the end unless
    /// an animated action forces an intermediate one. Middlewares see the
    /// settled state exactly once per batch.
    fn process(&mut self, payload: Payload<A>) {
        let flat: FlatActions<A> = match payload {
            Payload::One(action) => smallvec::smallvec![action],
            Payload::Group(group) => group.flatten(),
        };
        if flat.is_empty() {
            return;
        }

        let batch_start = self.state.clone();
        let mut published = batch_start.clone();
        let mut pending = false;

        for item in &flat {
            self.logger.record(item);
            metrics::counter!("store.actions.total").increment(1);
            let started = Instant::now();
            let changed = self.state.reduce(&item.action);
            metrics::histogram!("store.reduce.duration_seconds")
                .record(started.elapsed().as_secs_f64());
            pending |= changed;
            if pending && item.animation.is_some() {
                self.publish(&mut published, item.animation.clone());
                pending = false;
            }
        }
        if pending {
            self.publish(&mut published, None);
        }

        for slot in &mut self.middlewares {
            slot.deliver(&batch_start, &self.state, &flat);
        }
    }

    fn publish(&mut self, published: &mut S, animation: Option<AnimationTag>) {
        let transition = StateTransition {
            old: std::mem::replace(published, self.state.clone()),
            new: self.state.clone(),
            animation,
            at: Utc::now(),
        };
        self.watch_tx.send_replace(self.state.clone());
        let _ = self.transitions.send(transition);
        metrics::counter!("store.publishes.total").increment(1);
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// Keeps the channel ends an [`EffectRunner`] dispatches into alive so
    /// tests can assert on what it sent.
    pub(crate) struct TestHarness<S, A: Action> {
        pub(crate) default_rx: mpsc::UnboundedReceiver<Command<S, A>>,
        _default_tx: mpsc::UnboundedSender<Command<S, A>>,
        _expedited_tx: mpsc::UnboundedSender<Command<S, A>>,
        _expedited_rx: mpsc::UnboundedReceiver<Command<S, A>>,
    }

    pub(crate) fn runner_with_harness<S, A>(state: &S) -> (EffectRunner<S, A>, TestHarness<S, A>)
    where
        S: Clone + Send + Sync + 'static,
        A: Action,
    {
        let (default_tx, default_rx) = mpsc::unbounded_channel();
        let (expedited_tx, expedited_rx) = mpsc::unbounded_channel();
        let (_watch_tx, watch_rx) = watch::channel(state.clone());
        let dispatcher = Dispatcher {
            default_tx: default_tx.downgrade(),
            expedited_tx: expedited_tx.downgrade(),
        };
        let runner = EffectRunner::new(dispatcher, watch_rx);
        (
            runner,
            TestHarness {
                default_rx,
                _default_tx: default_tx,
                _expedited_tx: expedited_tx,
                _expedited_rx: expedited_rx,
            },
        )
    }

    /// A runner whose dispatches go nowhere; enough for lifecycle tests.
    pub(crate) fn runner_for_tests<S, A>(state: &S) -> EffectRunner<S, A>
    where
        S: Clone + Send + Sync + 'static,
        A: Action,
    {
        runner_with_harness(state).0
    }

    /// Collect `count` dispatched actions off the default queue.
    pub(crate) async fn drain_dispatches<S, A: Action>(
        harness: &mut TestHarness<S, A>,
        count: usize,
    ) -> Vec<AnyAction<A>> {
        let mut actions = Vec::new();
        while actions.len() < count {
            let Some(command) = harness.default_rx.recv().await else {
                break;
            };
            if let Command::Dispatch(Payload::One(action)) = command {
                actions.push(action.action);
            }
        }
        actions
    }
}
