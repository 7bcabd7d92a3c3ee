//! Effect descriptions and the cancellation token type.
//!
//! An [`Effect`] describes asynchronous work that will emit zero or more
//! values; it is a value, not running work. The runtime's effect runner
//! drives it on a spawned task keyed by an [`EffectToken`], converts its
//! emissions into dispatched actions, and aborts the task on cancellation.
//!
//! Internally every effect is a stream of `Result` items: a one-shot task is
//! a one-item stream, so the [`delay`](Effect::delay) and
//! [`filter_action`](Effect::filter_action) combinators compose uniformly
//! and cancellation (dropping the driving task) propagates through all of
//! them.

use std::fmt;
use std::time::Duration;

use futures::future::ready;
use futures::stream::{self, BoxStream};
use futures::{Future, Stream, StreamExt};
use thiserror::Error;

use crate::flow::FlowId;

/// Error produced by a failed effect.
///
/// Errors never cross the middleware boundary as panics or `Err` returns;
/// the runner maps them into a follow-up action carrying this description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// A human-readable failure description.
    #[error("{0}")]
    Message(String),
}

impl EffectError {
    /// Build an error from any displayable value.
    pub fn message(message: impl ToString) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<&str> for EffectError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}

/// Hashable key identifying one logical in-flight effect slot per
/// middleware instance.
///
/// The runner guarantees at most one live effect per token; a second start
/// under an occupied token is a silent no-op. Flow-correlated work derives
/// the token from the flow's id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EffectToken(String);

impl EffectToken {
    /// Create a token.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EffectToken {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EffectToken {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<FlowId> for EffectToken {
    fn from(id: FlowId) -> Self {
        Self(id.as_str().to_owned())
    }
}

impl fmt::Display for EffectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A description of asynchronous work emitting values of type `T`.
///
/// # Example
///
/// ```
/// use flowdux_core::effect::{Effect, EffectError};
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Msg { Loaded(u32) }
///
/// let effect = Effect::task(async {
///     Ok(Msg::Loaded(42))
/// });
/// let filtered = effect.filter_action(|msg| matches!(msg, Msg::Loaded(n) if *n > 10));
/// ```
pub struct Effect<T> {
    stream: BoxStream<'static, Result<T, EffectError>>,
}

impl<T: Send + 'static> Effect<T> {
    /// One-shot async work producing a single value or an error.
    pub fn task<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, EffectError>> + Send + 'static,
    {
        Self {
            stream: stream::once(future).boxed(),
        }
    }

    /// One-shot async work that cannot fail.
    pub fn value<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            stream: stream::once(future).map(Ok).boxed(),
        }
    }

    /// Long-lived work emitting any number of values.
    pub fn stream<S>(values: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            stream: values.map(Ok).boxed(),
        }
    }

    /// Defer each emission by a fixed duration.
    ///
    /// Cancellation propagates: aborting the driving task drops the sleep
    /// and the underlying work together.
    #[must_use]
    pub fn delay(self, duration: Duration) -> Self {
        Self {
            stream: self
                .stream
                .then(move |item| async move {
                    tokio::time::sleep(duration).await;
                    item
                })
                .boxed(),
        }
    }

    /// Drop emissions failing a predicate; errors pass through.
    #[must_use]
    pub fn filter_action<P>(self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            stream: self
                .stream
                .filter(move |item| {
                    let keep = match item {
                        Ok(value) => predicate(value),
                        Err(_) => true,
                    };
                    ready(keep)
                })
                .boxed(),
        }
    }

    /// Map emitted values into another type (errors pass through).
    #[must_use]
    pub fn map<U, F>(self, map: F) -> Effect<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Effect {
            stream: self.stream.map(move |item| item.map(&map)).boxed(),
        }
    }

    /// Consume the description, exposing the underlying item stream.
    ///
    /// Used by the runtime's effect runner to drive the work.
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, Result<T, EffectError>> {
        self.stream
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Effect(<stream>)")
    }
}
