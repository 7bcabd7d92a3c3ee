//! Counter demo binary
//!
//! Walks through dispatching, animation tags, middleware effects, and
//! graceful shutdown against a real store.

use std::time::Duration;

use counter::{AutosaveMiddleware, CountWatcher, CounterAction, DemoState};
use flowdux_runtime::{Store, StoreError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), StoreError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counter=debug,flowdux_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Counter demo: the flowdux state engine ===\n");

    let store = Store::new(DemoState::default());
    store
        .subscribe_reducible(AutosaveMiddleware::new(Duration::from_millis(100)))
        .await?;
    store.subscribe_observable(CountWatcher).await?;

    println!("Initial count: {}", store.state().counter.count);

    println!("\n>>> Dispatching: Increment x3");
    store.dispatch(CounterAction::Increment)?;
    store.dispatch(CounterAction::Increment)?;
    store.dispatch_animated(CounterAction::Increment, "bump")?;
    store.drained().await?;
    println!("Count: {}", store.state().counter.count);

    println!("\n>>> Dispatching: Decrement (user-interactive)");
    store.dispatch_expedited(CounterAction::Decrement)?;
    store.drained().await?;
    println!("Count: {}", store.state().counter.count);

    // Give the debounced autosave a chance to land.
    tokio::time::sleep(Duration::from_millis(200)).await;
    store.drained().await?;
    let state = store.state();
    println!(
        "\nAutosaves completed: {} (dirty: {})",
        state.save.saves, state.save.dirty
    );

    println!("\n>>> Dispatching: Reset");
    store.dispatch(CounterAction::Reset)?;
    store.drained().await?;
    println!("Count: {}", store.state().counter.count);

    store.shutdown().await?;
    println!("\n=== Done ===");
    Ok(())
}
