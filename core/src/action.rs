//! Actions, action metadata, and ordered action batches.
//!
//! An [`Action`] is an immutable value describing an intended state change.
//! Application code defines a closed enum of actions; the engine wraps each
//! dispatched action in an [`InternalAction`] carrying the metadata the store
//! and middlewares need (animation tag, silent flag, dispatch provenance).
//!
//! [`ActionGroup`] batches several actions into one dispatch unit. Groups may
//! nest; the store flattens them into a single ordered list before reducing,
//! and each entry keeps its own animation/silent tags through flattening.

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;

use crate::effect::EffectToken;
use crate::reducer::BindableKey;

/// Marker trait for application-defined action enums.
///
/// Actions are closed sum types: every reducer matches exhaustively on its
/// own variants and ignores the rest. There is no downcasting anywhere in
/// the engine.
///
/// # Example
///
/// ```
/// use flowdux_core::action::Action;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum CounterAction {
///     Increment,
///     Decrement,
/// }
///
/// impl Action for CounterAction {}
/// ```
pub trait Action: Clone + PartialEq + fmt::Debug + Send + 'static {
    /// Logical item id this action is bound to, if any.
    ///
    /// A bound action is routed only to [`BindableReducer`](crate::reducer::BindableReducer)
    /// entries whose key carries the same logical id; unbound actions reach
    /// every entry. The default is unbound.
    fn bound_id(&self) -> Option<&str> {
        None
    }
}

/// Engine-level action type: the application's actions plus the framework's
/// own notification and lifecycle actions.
///
/// Reducer nodes and middlewares receive `&AnyAction<A>`; domain code
/// usually matches on [`AnyAction::App`] and ignores the rest, while
/// framework-aware nodes ([`BindableReducer`](crate::reducer::BindableReducer),
/// forms, flows) react to the dedicated variants.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyAction<A: Action> {
    /// An application-defined action.
    App(A),

    /// Generic field assignment addressed to a named form.
    ///
    /// Applied by [`reduce_form_fields`](crate::form::reduce_form_fields)
    /// without going through the form's custom reduce logic.
    UpdateFormField {
        /// Registered name of the target form ([`Form::NAME`](crate::form::Form::NAME)).
        form: &'static str,
        /// Field name within the form.
        field: String,
        /// The value to assign.
        value: crate::form::FormValue,
    },

    /// An in-flight effect was cancelled via `cancel`/`cancel_all`.
    ///
    /// Dispatched by the effect runtime exactly once per cancelled token.
    /// Normal completion never produces this action.
    DidCancelEffect {
        /// The cancellation token the effect was registered under.
        token: EffectToken,
    },

    /// An effect failed; the default error mapping produced this action.
    ///
    /// `token` doubles as the correlation id for the failed work.
    EffectError {
        /// The token of the failed effect.
        token: EffectToken,
        /// Human-readable failure description.
        message: String,
    },

    /// A bindable container instance was mounted.
    ///
    /// Creates a per-instance entry in the matching
    /// [`BindableReducer`](crate::reducer::BindableReducer). Dispatched
    /// silently.
    ContainerDidLoad {
        /// Registered container name.
        container: &'static str,
        /// Composite (logical id, instance id) key for the new entry.
        key: BindableKey,
    },

    /// A bindable container instance was unmounted; its entry is removed.
    ContainerDidUnload {
        /// Registered container name.
        container: &'static str,
        /// The key that was mounted.
        key: BindableKey,
    },
}

impl<A: Action> AnyAction<A> {
    /// Short human-readable name used in log records.
    #[must_use]
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            Self::App(action) => Cow::Owned(format!("{action:?}")),
            Self::UpdateFormField { form, field, .. } => {
                Cow::Owned(format!("UpdateFormField({form}.{field})"))
            },
            Self::DidCancelEffect { token } => Cow::Owned(format!("DidCancelEffect({token})")),
            Self::EffectError { token, .. } => Cow::Owned(format!("EffectError({token})")),
            Self::ContainerDidLoad { container, .. } => {
                Cow::Owned(format!("ContainerDidLoad({container})"))
            },
            Self::ContainerDidUnload { container, .. } => {
                Cow::Owned(format!("ContainerDidUnload({container})"))
            },
        }
    }

    /// Returns the application action if this is an [`AnyAction::App`].
    #[must_use]
    pub const fn as_app(&self) -> Option<&A> {
        match self {
            Self::App(action) => Some(action),
            _ => None,
        }
    }
}

impl<A: Action> From<A> for AnyAction<A> {
    fn from(action: A) -> Self {
        Self::App(action)
    }
}

/// Opaque, equatable animation tag attached to a state transition.
///
/// The engine never interprets the tag; it is carried from dispatch through
/// to the published transition so a UI binding layer can style the update.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnimationTag(Cow<'static, str>);

impl AnimationTag {
    /// Create a tag from a name.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The tag name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for AnimationTag {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl fmt::Display for AnimationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dispatch provenance: where in the source an action was dispatched from.
///
/// Purely diagnostic; never affects behavior. Captured automatically by the
/// store's dispatch methods via `#[track_caller]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Origin {
    /// Source file of the dispatch call site.
    pub file: &'static str,
    /// Line of the dispatch call site.
    pub line: u32,
}

impl Origin {
    /// Capture the caller's location.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A dispatched action together with its per-dispatch metadata.
///
/// Every action entering the store is wrapped in one of these; actions that
/// arrive unwrapped are wrapped with default metadata at the dispatch
/// boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct InternalAction<A: Action> {
    /// The wrapped action value.
    pub action: AnyAction<A>,
    /// Optional animation tag; forces an intermediate publish mid-batch.
    pub animation: Option<AnimationTag>,
    /// Suppresses action logging when set.
    pub silent: bool,
    /// Dispatch call site, for log records.
    pub origin: Origin,
}

impl<A: Action> InternalAction<A> {
    /// Wrap an action with default metadata, capturing the caller as origin.
    #[track_caller]
    pub fn new(action: impl Into<AnyAction<A>>) -> Self {
        Self {
            action: action.into(),
            animation: None,
            silent: false,
            origin: Origin::caller(),
        }
    }

    /// Attach an animation tag.
    #[must_use]
    pub fn with_animation(mut self, tag: impl Into<AnimationTag>) -> Self {
        self.animation = Some(tag.into());
        self
    }

    /// Suppress logging for this action.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Silent wrapper for the container-mount lifecycle action.
    #[track_caller]
    #[must_use]
    pub fn container_did_load(container: &'static str, key: BindableKey) -> Self {
        Self::new(AnyAction::ContainerDidLoad { container, key }).silent()
    }

    /// Silent wrapper for the container-unmount lifecycle action.
    #[track_caller]
    #[must_use]
    pub fn container_did_unload(container: &'static str, key: BindableKey) -> Self {
        Self::new(AnyAction::ContainerDidUnload { container, key }).silent()
    }
}

/// Preferred inline capacity for flattened batches.
///
/// Most dispatches are a single action; small groups stay on the stack.
pub type FlatActions<A> = SmallVec<[InternalAction<A>; 4]>;

/// An ordered batch of actions dispatched as one unit.
///
/// Groups reduce element-by-element: each entry keeps its own animation and
/// silent tags, and an animated entry causes an intermediate publish
/// mid-batch. Groups may nest arbitrarily; flattening preserves order.
///
/// # Example
///
/// ```
/// use flowdux_core::action::{Action, ActionGroup};
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Msg { A, B, C }
/// impl Action for Msg {}
///
/// let group = ActionGroup::new()
///     .with(Msg::A)
///     .with_animated(Msg::B, "slide")
///     .with(Msg::C);
/// assert_eq!(group.len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ActionGroup<A: Action> {
    entries: Vec<GroupEntry<A>>,
}

impl<A: Action> Default for ActionGroup<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of an [`ActionGroup`]: a single action or a nested group.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupEntry<A: Action> {
    /// A single wrapped action.
    Action(InternalAction<A>),
    /// A nested group, flattened in place.
    Group(ActionGroup<A>),
}

impl<A: Action> ActionGroup<A> {
    /// Create an empty group.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an action with default metadata.
    #[must_use]
    #[track_caller]
    pub fn with(mut self, action: impl Into<AnyAction<A>>) -> Self {
        self.entries.push(GroupEntry::Action(InternalAction::new(action)));
        self
    }

    /// Append an action carrying an animation tag.
    #[must_use]
    #[track_caller]
    pub fn with_animated(
        mut self,
        action: impl Into<AnyAction<A>>,
        tag: impl Into<AnimationTag>,
    ) -> Self {
        self.entries
            .push(GroupEntry::Action(InternalAction::new(action).with_animation(tag)));
        self
    }

    /// Append an already-wrapped action, preserving its metadata.
    #[must_use]
    pub fn with_internal(mut self, action: InternalAction<A>) -> Self {
        self.entries.push(GroupEntry::Action(action));
        self
    }

    /// Append a nested group.
    #[must_use]
    pub fn with_group(mut self, group: Self) -> Self {
        self.entries.push(GroupEntry::Group(group));
        self
    }

    /// Total number of actions, counting nested groups recursively.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| match entry {
                GroupEntry::Action(_) => 1,
                GroupEntry::Group(group) => group.len(),
            })
            .sum()
    }

    /// Whether the group contains no actions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a single ordered action list.
    ///
    /// Per-entry animation and silent tags survive flattening.
    #[must_use]
    pub fn flatten(self) -> FlatActions<A> {
        let mut flat = FlatActions::new();
        self.flatten_into(&mut flat);
        flat
    }

    fn flatten_into(self, flat: &mut FlatActions<A>) {
        for entry in self.entries {
            match entry {
                GroupEntry::Action(action) => flat.push(action),
                GroupEntry::Group(group) => group.flatten_into(flat),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        One,
        Two,
        Three,
    }

    impl Action for TestAction {}

    #[test]
    fn wrapping_captures_origin() {
        let wrapped = InternalAction::new(TestAction::One);
        assert!(wrapped.origin.file.ends_with("action.rs"));
        assert!(!wrapped.silent);
        assert_eq!(wrapped.animation, None);
    }

    #[test]
    fn group_flattens_in_order() {
        let group = ActionGroup::new()
            .with(TestAction::One)
            .with_animated(TestAction::Two, "fade")
            .with(TestAction::Three);

        let flat = group.flatten();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].action, AnyAction::App(TestAction::One));
        assert_eq!(flat[1].animation, Some(AnimationTag::from("fade")));
        assert_eq!(flat[2].action, AnyAction::App(TestAction::Three));
    }

    #[test]
    fn nested_groups_flatten_depth_first() {
        let inner = ActionGroup::new().with(TestAction::Two).with(TestAction::Three);
        let group = ActionGroup::new().with(TestAction::One).with_group(inner);

        let flat = group.flatten();
        let names: Vec<_> = flat.iter().map(|a| a.action.clone()).collect();
        assert_eq!(
            names,
            vec![
                AnyAction::App(TestAction::One),
                AnyAction::App(TestAction::Two),
                AnyAction::App(TestAction::Three),
            ]
        );
    }

    #[test]
    fn silent_tag_survives_flattening() {
        let group = ActionGroup::new()
            .with_internal(InternalAction::new(TestAction::One).silent())
            .with(TestAction::Two);

        let flat = group.flatten();
        assert!(flat[0].silent);
        assert!(!flat[1].silent);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug, PartialEq)]
        struct Tagged(u8);

        impl Action for Tagged {}

        proptest! {
            #[test]
            fn flattening_preserves_order_and_count(
                values in proptest::collection::vec(0u8..8, 0..16),
                nest in proptest::collection::vec(any::<bool>(), 0..16),
            ) {
                let mut group = ActionGroup::new();
                for (index, value) in values.iter().enumerate() {
                    // Wrap some entries one level deep; flattening must not care.
                    if nest.get(index).copied().unwrap_or(false) {
                        group = group.with_group(ActionGroup::new().with(Tagged(*value)));
                    } else {
                        group = group.with(Tagged(*value));
                    }
                }
                prop_assert_eq!(group.len(), values.len());

                let flat: Vec<u8> = group
                    .flatten()
                    .into_iter()
                    .filter_map(|item| match item.action {
                        AnyAction::App(Tagged(value)) => Some(value),
                        _ => None,
                    })
                    .collect();
                prop_assert_eq!(flat, values);
            }
        }
    }

    #[test]
    fn len_counts_nested_entries() {
        let inner = ActionGroup::new().with(TestAction::One);
        let group = ActionGroup::<TestAction>::new()
            .with(TestAction::Two)
            .with_group(inner)
            .with_group(ActionGroup::new());
        assert_eq!(group.len(), 2);
        assert!(!group.is_empty());
        assert!(ActionGroup::<TestAction>::new().is_empty());
    }
}
