//! The reducer tree: explicit, compile-time-checked reduction.
//!
//! Every sub-state value that wants to react to actions implements
//! [`Reducible`]. Composite nodes delegate to their reducer-typed fields by
//! hand (or via `#[derive(Reducible)]` from `flowdux-macros`), OR-ing the
//! changed flags upward. Reduction is a total function: an action no node
//! matches is simply a no-op.
//!
//! [`BindableReducer`] holds multiple simultaneous instances of one child
//! reducer type keyed by a composite (logical id, instance id) pair, driven
//! by the container mount/unmount lifecycle actions.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::action::{Action, AnyAction};

/// A state sub-tree that can reduce actions.
///
/// `reduce` returns whether this node (or any descendant) changed. The store
/// uses the root's flag to decide whether a transition must be published.
///
/// # Example
///
/// ```
/// use flowdux_core::action::{Action, AnyAction};
/// use flowdux_core::reducer::Reducible;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum CounterAction { Increment }
/// impl Action for CounterAction {}
///
/// #[derive(Clone, Debug, PartialEq, Default)]
/// struct Counter { count: i64 }
///
/// impl Reducible<CounterAction> for Counter {
///     fn reduce(&mut self, action: &AnyAction<CounterAction>) -> bool {
///         match action {
///             AnyAction::App(CounterAction::Increment) => {
///                 self.count += 1;
///                 true
///             }
///             _ => false,
///         }
///     }
/// }
/// ```
pub trait Reducible<A: Action> {
    /// Apply one action; return whether anything under this node changed.
    fn reduce(&mut self, action: &AnyAction<A>) -> bool;
}

/// Optional sub-states participate without plumbing: `None` is a no-op.
impl<A: Action, R: Reducible<A>> Reducible<A> for Option<R> {
    fn reduce(&mut self, action: &AnyAction<A>) -> bool {
        match self {
            Some(node) => node.reduce(action),
            None => false,
        }
    }
}

/// Boxed reducer nodes delegate to the inner value.
impl<A: Action, R: Reducible<A> + ?Sized> Reducible<A> for Box<R> {
    fn reduce(&mut self, action: &AnyAction<A>) -> bool {
        self.as_mut().reduce(action)
    }
}

/// Bounds required of a root application state.
///
/// The root is constructed once, mutated exclusively by the store's worker,
/// and cloned for published snapshots; equality gates publishes and scope
/// diffing.
pub trait AppReducer<A: Action>:
    Reducible<A> + Clone + PartialEq + Send + Sync + 'static
{
}

impl<A: Action, T> AppReducer<A> for T where
    T: Reducible<A> + Clone + PartialEq + Send + Sync + 'static
{
}

/// Process-unique identity for one mounted container instance.
///
/// Two views mounted over the same logical id get distinct instance ids and
/// therefore independent state entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

impl InstanceId {
    /// Allocate a fresh instance id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Composite key for one [`BindableReducer`] entry:
/// (logical item id, mounted instance id).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindableKey {
    /// Logical item identifier (e.g. a list-row id).
    pub id: String,
    /// Unique id of the mounted instance.
    pub instance: InstanceId,
}

impl BindableKey {
    /// Build a key for a freshly mounted instance of a logical item.
    #[must_use]
    pub fn mount(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instance: InstanceId::next(),
        }
    }
}

impl fmt::Display for BindableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.id, self.instance)
    }
}

/// A child reducer type usable inside a [`BindableReducer`].
///
/// `NAME` identifies the container in mount/unmount lifecycle actions;
/// `Default` provides the initial per-instance state.
pub trait BindableContainer: Default {
    /// Registered container name; must be unique within the state tree.
    const NAME: &'static str;
}

/// A keyed map of per-instance child reducers.
///
/// Entries are created by `ContainerDidLoad` and destroyed by
/// `ContainerDidUnload` lifecycle actions addressed to
/// [`BindableContainer::NAME`]. Every other action is forwarded to every
/// entry; entries change independently.
#[derive(Clone, Debug, PartialEq)]
pub struct BindableReducer<R> {
    entries: HashMap<BindableKey, R>,
}

impl<R> BindableReducer<R> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up the entry for a mounted key.
    #[must_use]
    pub fn get(&self, key: &BindableKey) -> Option<&R> {
        self.entries.get(key)
    }

    /// Mutable access to one entry.
    pub fn get_mut(&mut self, key: &BindableKey) -> Option<&mut R> {
        self.entries.get_mut(key)
    }

    /// All entries sharing a logical id (one per mounted instance).
    pub fn entries_for_id<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = (&'a BindableKey, &'a R)> {
        self.entries.iter().filter(move |(key, _)| key.id == id)
    }

    /// Number of mounted entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no instance is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&BindableKey, &R)> {
        self.entries.iter()
    }
}

impl<R> Default for BindableReducer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> Reducible<A> for BindableReducer<R>
where
    A: Action,
    R: Reducible<A> + BindableContainer,
{
    fn reduce(&mut self, action: &AnyAction<A>) -> bool {
        match action {
            AnyAction::ContainerDidLoad { container, key } if *container == R::NAME => {
                // Re-mounting an existing key keeps its state.
                if self.entries.contains_key(key) {
                    false
                } else {
                    self.entries.insert(key.clone(), R::default());
                    true
                }
            },
            AnyAction::ContainerDidUnload { container, key } if *container == R::NAME => {
                self.entries.remove(key).is_some()
            },
            _ => {
                // Bound app actions reach only entries sharing the logical id;
                // everything else is forwarded to every entry.
                let bound = action.as_app().and_then(Action::bound_id).map(str::to_owned);
                let mut changed = false;
                for (key, entry) in &mut self.entries {
                    if let Some(id) = &bound {
                        if key.id != *id {
                            continue;
                        }
                    }
                    changed |= entry.reduce(action);
                }
                changed
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum RowAction {
        Rename { id: String, to: String },
    }

    impl Action for RowAction {
        fn bound_id(&self) -> Option<&str> {
            match self {
                Self::Rename { id, .. } => Some(id),
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Default)]
    struct RowState {
        name: String,
    }

    impl BindableContainer for RowState {
        const NAME: &'static str = "Row";
    }

    impl Reducible<RowAction> for RowState {
        fn reduce(&mut self, action: &AnyAction<RowAction>) -> bool {
            match action {
                AnyAction::App(RowAction::Rename { to, .. }) => {
                    self.name.clone_from(to);
                    true
                },
                _ => false,
            }
        }
    }

    #[test]
    fn instance_ids_are_unique() {
        let a = InstanceId::next();
        let b = InstanceId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn mount_creates_entry_with_default_state() {
        let mut bindable = BindableReducer::<RowState>::new();
        let key = BindableKey::mount("row-1");

        let changed = bindable.reduce(&AnyAction::ContainerDidLoad {
            container: "Row",
            key: key.clone(),
        });
        assert!(changed);
        assert_eq!(bindable.get(&key), Some(&RowState::default()));
    }

    #[test]
    fn unmount_removes_entry() {
        let mut bindable = BindableReducer::<RowState>::new();
        let key = BindableKey::mount("row-1");
        let _ = bindable.reduce(&AnyAction::ContainerDidLoad {
            container: "Row",
            key: key.clone(),
        });

        let changed = bindable.reduce(&AnyAction::ContainerDidUnload {
            container: "Row",
            key: key.clone(),
        });
        assert!(changed);
        assert!(bindable.is_empty());

        // Unmounting again is a no-op.
        let changed = bindable.reduce(&AnyAction::ContainerDidUnload {
            container: "Row",
            key,
        });
        assert!(!changed);
    }

    #[test]
    fn lifecycle_actions_for_other_containers_are_ignored() {
        let mut bindable = BindableReducer::<RowState>::new();
        let changed = bindable.reduce(&AnyAction::ContainerDidLoad {
            container: "SomethingElse",
            key: BindableKey::mount("x"),
        });
        assert!(!changed);
        assert!(bindable.is_empty());
    }

    #[test]
    fn bound_actions_touch_only_matching_entries() {
        let mut bindable = BindableReducer::<RowState>::new();
        let key_a = BindableKey::mount("a");
        let key_b = BindableKey::mount("b");
        for key in [&key_a, &key_b] {
            let _ = bindable.reduce(&AnyAction::ContainerDidLoad {
                container: "Row",
                key: key.clone(),
            });
        }

        let before_b = bindable.get(&key_b).cloned();
        let changed = bindable.reduce(&AnyAction::App(RowAction::Rename {
            id: "a".into(),
            to: "alpha".into(),
        }));
        assert!(changed);
        assert_eq!(bindable.get(&key_a).map(|r| r.name.as_str()), Some("alpha"));
        assert_eq!(bindable.get(&key_b).cloned(), before_b);
    }

    #[test]
    fn two_instances_of_one_logical_id_are_independent() {
        let mut bindable = BindableReducer::<RowState>::new();
        let first = BindableKey::mount("row");
        let second = BindableKey::mount("row");
        assert_ne!(first, second);

        for key in [&first, &second] {
            let _ = bindable.reduce(&AnyAction::ContainerDidLoad {
                container: "Row",
                key: key.clone(),
            });
        }
        assert_eq!(bindable.entries_for_id("row").count(), 2);

        // Mutate one instance directly; the sibling keeps its own state.
        if let Some(entry) = bindable.get_mut(&first) {
            entry.name = "edited".into();
        }
        assert_eq!(bindable.get(&second), Some(&RowState::default()));
    }

    #[test]
    fn option_node_reduces_when_present() {
        let mut node: Option<RowState> = None;
        assert!(!node.reduce(&AnyAction::App(RowAction::Rename {
            id: "a".into(),
            to: "x".into(),
        })));

        node = Some(RowState::default());
        assert!(node.reduce(&AnyAction::App(RowAction::Rename {
            id: "a".into(),
            to: "x".into(),
        })));
        assert_eq!(node.as_ref().map(|r| r.name.as_str()), Some("x"));
    }
}
