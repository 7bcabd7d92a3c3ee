//! Integration tests for the store's dispatch, publication, and lifecycle
//! behavior, driven through the public API only.
//!
//! These tests use `expect()` where setup cannot fail, which is acceptable
//! in test code.

#![allow(clippy::expect_used)]

use std::time::Duration;

use flowdux_core::action::{Action, ActionGroup, AnimationTag, AnyAction, InternalAction};
use flowdux_core::reducer::{BindableContainer, BindableReducer, Reducible};
use flowdux_runtime::{Priority, Store, StoreConfig, StoreError};
use flowdux_testing::{RecordingMiddleware, TransitionCollector};

#[derive(Clone, Debug, PartialEq)]
enum CounterAction {
    Increment,
    Step(i64),
    Noop,
    ToggleRow { id: String },
}

impl Action for CounterAction {
    fn bound_id(&self) -> Option<&str> {
        match self {
            Self::ToggleRow { id } => Some(id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
struct RowState {
    on: bool,
}

impl BindableContainer for RowState {
    const NAME: &'static str = "row";
}

impl Reducible<CounterAction> for RowState {
    fn reduce(&mut self, action: &AnyAction<CounterAction>) -> bool {
        match action {
            AnyAction::App(CounterAction::ToggleRow { .. }) => {
                self.on = !self.on;
                true
            },
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
struct AppState {
    count: i64,
    rows: BindableReducer<RowState>,
}

impl Reducible<CounterAction> for AppState {
    fn reduce(&mut self, action: &AnyAction<CounterAction>) -> bool {
        let mut changed = match action {
            AnyAction::App(CounterAction::Increment) => {
                self.count += 1;
                true
            },
            AnyAction::App(CounterAction::Step(delta)) => {
                self.count += delta;
                true
            },
            _ => false,
        };
        changed |= self.rows.reduce(action);
        changed
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_are_serialized() {
    flowdux_testing::init_tracing();
    let store = Store::new(AppState::default());
    let (recorder, recording) = RecordingMiddleware::new();
    store
        .subscribe_reducible(recorder)
        .await
        .expect("subscription should succeed");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let handle = store.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                handle
                    .dispatch(CounterAction::Increment)
                    .expect("store should accept dispatches");
            }
        }));
    }
    for task in tasks {
        task.await.expect("dispatching task should not fail");
    }

    store.drained().await.expect("store should drain");
    assert_eq!(store.state().count, 200);

    // Every increment was applied exactly once, in a total order: the
    // settled counts form the strictly increasing sequence 1..=200.
    let counts: Vec<i64> = recording
        .entries()
        .into_iter()
        .map(|(_, state)| state.count)
        .collect();
    assert_eq!(counts, (1..=200).collect::<Vec<i64>>());
}

#[tokio::test]
async fn expedited_actions_overtake_queued_defaults() {
    let store = Store::new(AppState::default());
    let (recorder, recording) = RecordingMiddleware::new();
    store
        .subscribe_reducible(recorder)
        .await
        .expect("subscription should succeed");

    // All enqueued before the worker gets a chance to run: on a
    // current-thread runtime nothing is processed until the next await.
    store.dispatch(CounterAction::Step(1)).expect("dispatch");
    store.dispatch(CounterAction::Step(2)).expect("dispatch");
    store
        .dispatch_expedited(CounterAction::Step(100))
        .expect("dispatch");

    store.drained().await.expect("store should drain");

    let actions = recording.actions();
    assert_eq!(
        actions,
        vec![
            AnyAction::App(CounterAction::Step(100)),
            AnyAction::App(CounterAction::Step(1)),
            AnyAction::App(CounterAction::Step(2)),
        ]
    );
}

#[tokio::test]
async fn fairness_window_interleaves_default_work() {
    let config = StoreConfig::default().fairness_window(1);
    let store = Store::with_config(AppState::default(), config);
    let (recorder, recording) = RecordingMiddleware::new();
    store
        .subscribe_reducible(recorder)
        .await
        .expect("subscription should succeed");

    store.dispatch(CounterAction::Step(1)).expect("dispatch");
    store
        .dispatch_expedited(CounterAction::Step(100))
        .expect("dispatch");
    store
        .dispatch_expedited(CounterAction::Step(200))
        .expect("dispatch");

    store.drained().await.expect("store should drain");

    // One expedited command, then the fairness window forces the default
    // through before the second expedited one.
    assert_eq!(
        recording.actions(),
        vec![
            AnyAction::App(CounterAction::Step(100)),
            AnyAction::App(CounterAction::Step(1)),
            AnyAction::App(CounterAction::Step(200)),
        ]
    );
}

#[tokio::test]
async fn animated_group_publishes_intermediate_transition() {
    let store = Store::new(AppState::default());
    let mut collector = TransitionCollector::attach(&store);

    let group = ActionGroup::new()
        .with(CounterAction::Step(1))
        .with_animated(CounterAction::Step(10), "slide")
        .with(CounterAction::Step(100));
    store
        .dispatch_group(group, Priority::Default)
        .expect("dispatch");

    let transitions = collector.take(2).await;

    // First publish covers everything up to and including the animated
    // action, carrying its tag.
    assert_eq!(transitions[0].old.count, 0);
    assert_eq!(transitions[0].new.count, 11);
    assert_eq!(transitions[0].animation, Some(AnimationTag::from("slide")));

    // The remainder of the batch publishes untagged.
    assert_eq!(transitions[1].old.count, 11);
    assert_eq!(transitions[1].new.count, 111);
    assert_eq!(transitions[1].animation, None);

    collector.expect_quiet(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn unchanged_batches_publish_nothing() {
    let store = Store::new(AppState::default());
    let mut collector = TransitionCollector::attach(&store);

    store.dispatch(CounterAction::Noop).expect("dispatch");
    store.drained().await.expect("store should drain");

    collector.expect_quiet(Duration::from_millis(50)).await;
    assert_eq!(store.state().count, 0);
}

#[tokio::test]
async fn middleware_sees_settled_state_once_per_batch() {
    let store = Store::new(AppState::default());
    let (recorder, recording) = RecordingMiddleware::new();
    store
        .subscribe_reducible(recorder)
        .await
        .expect("subscription should succeed");

    let group = ActionGroup::new()
        .with(CounterAction::Step(1))
        .with_animated(CounterAction::Step(10), "fade")
        .with(CounterAction::Step(100));
    store
        .dispatch_group(group, Priority::Default)
        .expect("dispatch");
    store.drained().await.expect("store should drain");

    // Even though the batch published twice, the middleware saw every
    // action against the final state.
    let entries = recording.entries();
    assert_eq!(entries.len(), 3);
    for (_, state) in entries {
        assert_eq!(state.count, 111);
    }
}

#[tokio::test]
async fn silent_actions_still_reach_middlewares() {
    let store = Store::new(AppState::default());
    let (recorder, recording) = RecordingMiddleware::new();
    store
        .subscribe_reducible(recorder)
        .await
        .expect("subscription should succeed");

    // Silent suppresses logging only; delivery is unaffected.
    store
        .dispatch_internal(
            InternalAction::new(CounterAction::Increment).silent(),
            Priority::Default,
        )
        .expect("dispatch");
    let key = store
        .mount_container::<RowState>("row-1")
        .expect("mount should succeed");
    store.drained().await.expect("store should drain");

    assert_eq!(store.state().count, 1);
    assert_eq!(
        recording.actions(),
        vec![
            AnyAction::App(CounterAction::Increment),
            AnyAction::ContainerDidLoad {
                container: "row",
                key,
            },
        ]
    );
}

#[tokio::test]
async fn bound_actions_reach_only_their_row() {
    let store = Store::new(AppState::default());

    let first = store
        .mount_container::<RowState>("row-1")
        .expect("mount should succeed");
    let second = store
        .mount_container::<RowState>("row-2")
        .expect("mount should succeed");

    store
        .dispatch(CounterAction::ToggleRow {
            id: "row-1".into(),
        })
        .expect("dispatch");
    store.drained().await.expect("store should drain");

    let state = store.state();
    assert_eq!(state.rows.get(&first).map(|row| row.on), Some(true));
    assert_eq!(state.rows.get(&second).map(|row| row.on), Some(false));

    store
        .unmount_container::<RowState>(first.clone())
        .expect("unmount should succeed");
    store.drained().await.expect("store should drain");
    assert!(store.state().rows.get(&first).is_none());
    assert_eq!(store.state().rows.len(), 1);
}

#[tokio::test]
async fn two_instances_over_one_id_stay_in_sync() {
    let store = Store::new(AppState::default());

    let first = store
        .mount_container::<RowState>("row-1")
        .expect("mount should succeed");
    let second = store
        .mount_container::<RowState>("row-1")
        .expect("mount should succeed");
    assert_ne!(first, second);

    store
        .dispatch(CounterAction::ToggleRow {
            id: "row-1".into(),
        })
        .expect("dispatch");
    store.drained().await.expect("store should drain");

    // Same logical id: both mounted instances reduce the bound action.
    let state = store.state();
    assert_eq!(state.rows.get(&first).map(|row| row.on), Some(true));
    assert_eq!(state.rows.get(&second).map(|row| row.on), Some(true));
}

#[tokio::test]
async fn snapshot_tracks_last_publish() {
    let store = Store::new(AppState::default());
    assert_eq!(store.state().count, 0);

    store.dispatch(CounterAction::Step(5)).expect("dispatch");
    store.drained().await.expect("store should drain");

    assert_eq!(store.state().count, 5);
    assert_eq!(store.state_with(|state| state.count), 5);
}

#[tokio::test]
async fn observer_handle_is_raii() {
    let store = Store::new(AppState::default());
    let (sender, mut received) = tokio::sync::mpsc::unbounded_channel();

    let handle = store.observe(move |transition| {
        let _ = sender.send(transition.new.count);
    });

    store.dispatch(CounterAction::Step(1)).expect("dispatch");
    store.drained().await.expect("store should drain");
    assert_eq!(received.recv().await, Some(1));

    drop(handle);
    tokio::time::sleep(Duration::from_millis(10)).await;

    store.dispatch(CounterAction::Step(1)).expect("dispatch");
    store.drained().await.expect("store should drain");

    // The callback task is gone; its channel sender was dropped with it.
    assert_eq!(received.recv().await, None);
}

#[tokio::test]
async fn shutdown_refuses_further_dispatches() {
    let store = Store::new(AppState::default());
    store.dispatch(CounterAction::Step(3)).expect("dispatch");

    store.shutdown().await.expect("shutdown should succeed");

    // Queued work drained before the worker stopped.
    assert_eq!(store.state().count, 3);
    assert_eq!(
        store.dispatch(CounterAction::Increment),
        Err(StoreError::ShuttingDown)
    );
}
