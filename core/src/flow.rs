//! Flows: finite-state-machine-shaped reducer slices with a stable
//! correlation identifier.
//!
//! A flow models a multi-step interaction (sign-in, checkout, upload) as an
//! explicit state machine whose transitions are driven by actions. Its
//! [`FlowId`] correlates the flow's requests, responses, and cancellations
//! across asynchronous boundaries: middleware conventionally derives its
//! [`EffectToken`](crate::effect::EffectToken) from the flow id.

use std::fmt;

use crate::action::Action;
use crate::reducer::Reducible;

/// Stable identifier correlating one flow's async work.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlowId(String);

impl FlowId {
    /// Create a flow id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FlowId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reducer node shaped as an explicit finite state machine.
///
/// # Example
///
/// ```
/// use flowdux_core::action::{Action, AnyAction};
/// use flowdux_core::flow::{Flow, FlowId};
/// use flowdux_core::reducer::Reducible;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum AuthAction { SignIn, DidSignIn, SignOut }
/// impl Action for AuthAction {}
///
/// #[derive(Clone, Debug, PartialEq, Default)]
/// enum AuthFlow {
///     #[default]
///     SignedOut,
///     SigningIn,
///     SignedIn,
/// }
///
/// impl Reducible<AuthAction> for AuthFlow {
///     fn reduce(&mut self, action: &AnyAction<AuthAction>) -> bool {
///         let next = match (&*self, action) {
///             (AuthFlow::SignedOut, AnyAction::App(AuthAction::SignIn)) => AuthFlow::SigningIn,
///             (AuthFlow::SigningIn, AnyAction::App(AuthAction::DidSignIn)) => AuthFlow::SignedIn,
///             (AuthFlow::SignedIn, AnyAction::App(AuthAction::SignOut)) => AuthFlow::SignedOut,
///             _ => return false,
///         };
///         *self = next;
///         true
///     }
/// }
///
/// impl Flow<AuthAction> for AuthFlow {
///     fn id(&self) -> FlowId {
///         FlowId::new("auth")
///     }
/// }
/// ```
pub trait Flow<A: Action>: Reducible<A> {
    /// The flow's stable correlation id.
    fn id(&self) -> FlowId;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AnyAction;
    use crate::effect::EffectToken;

    #[derive(Clone, Debug, PartialEq)]
    enum LoadAction {
        Start,
        Done,
        Fail,
    }

    impl Action for LoadAction {}

    #[derive(Clone, Debug, PartialEq, Default)]
    enum LoadFlow {
        #[default]
        Idle,
        Loading,
        Loaded,
        Failed,
    }

    impl Reducible<LoadAction> for LoadFlow {
        fn reduce(&mut self, action: &AnyAction<LoadAction>) -> bool {
            let next = match (&*self, action) {
                (Self::Idle | Self::Failed, AnyAction::App(LoadAction::Start)) => Self::Loading,
                (Self::Loading, AnyAction::App(LoadAction::Done)) => Self::Loaded,
                (Self::Loading, AnyAction::App(LoadAction::Fail)) => Self::Failed,
                _ => return false,
            };
            *self = next;
            true
        }
    }

    impl Flow<LoadAction> for LoadFlow {
        fn id(&self) -> FlowId {
            FlowId::new("load")
        }
    }

    #[test]
    fn transitions_follow_the_machine() {
        let mut flow = LoadFlow::default();
        assert!(flow.reduce(&AnyAction::App(LoadAction::Start)));
        assert_eq!(flow, LoadFlow::Loading);

        // Done outside Loading is a no-op.
        assert!(flow.reduce(&AnyAction::App(LoadAction::Done)));
        assert!(!flow.reduce(&AnyAction::App(LoadAction::Done)));
        assert_eq!(flow, LoadFlow::Loaded);
    }

    #[test]
    fn flow_id_converts_to_effect_token() {
        let flow = LoadFlow::default();
        let token = EffectToken::from(flow.id());
        assert_eq!(token.as_str(), "load");
    }
}
