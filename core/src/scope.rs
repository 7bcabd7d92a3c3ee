//! Scopes: equatable projections of state used to gate observer
//! notifications.
//!
//! A scope is any `PartialEq` value produced by a pure function of the
//! state. After each published transition the engine computes the scope of
//! the old and new states and renotifies an observer only on inequality.
//!
//! Multiple values declared together compose with [`CombinedScope`]: the
//! combination is equal iff every component is pairwise equal, i.e. tuple
//! equality rather than independent per-field notification.

/// Composition of two scopes; equal iff both children are equal.
///
/// Chains nest naturally: `CombinedScope(a, CombinedScope(b, c))`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombinedScope<A, B>(pub A, pub B);

impl<A, B> CombinedScope<A, B> {
    /// Combine two scope values.
    pub const fn new(first: A, second: B) -> Self {
        Self(first, second)
    }
}

/// A scope that is always equal to itself: the observer is never renotified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct NoneScope;

/// Whether a transition from `old` to `new` must renotify an observer.
pub fn scope_changed<S: PartialEq>(old: &S, new: &S) -> bool {
    old != new
}
