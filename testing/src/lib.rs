//! # flowdux testing
//!
//! Testing utilities and helpers for the flowdux state engine.
//!
//! This crate provides:
//! - [`ReducerTest`]: a Given-When-Then harness for reducer trees
//! - [`RecordingMiddleware`]: captures every action a store delivers
//! - [`TransitionCollector`]: drains published transitions with timeouts
//! - [`init_tracing`]: per-test tracing setup honoring `RUST_LOG`
//!
//! ## Example
//!
//! ```ignore
//! use flowdux_testing::ReducerTest;
//!
//! #[test]
//! fn incrementing_counts() {
//!     ReducerTest::new()
//!         .given_state(CounterState::default())
//!         .when_action(CounterAction::Increment)
//!         .then_changed(true)
//!         .then_state(|state| assert_eq!(state.count, 1))
//!         .run();
//! }
//! ```

pub mod store_probes;

pub use reducer_test::ReducerTest;
pub use store_probes::{Recording, RecordingMiddleware, TransitionCollector};

/// Initialize tracing for a test, honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs the
/// subscriber.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
