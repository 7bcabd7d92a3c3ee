//! Structured action logging.
//!
//! Every non-silent action flowing through the worker is recorded through
//! [`ActionLogger`] at debug level, with the action's short name and its
//! dispatch call site. Filters narrow the firehose down to the actions a
//! debugging session cares about; silent actions (lifecycle plumbing,
//! high-frequency streams) never reach the log regardless of filters.

use tracing::debug;

use flowdux_core::action::{Action, AnyAction, InternalAction};

type ActionFilter<A> = Box<dyn Fn(&AnyAction<A>) -> bool + Send>;

/// Records dispatched actions via `tracing`.
///
/// With no filters installed every non-silent action is logged; each added
/// filter must approve an action for it to be recorded.
pub struct ActionLogger<A: Action> {
    filters: Vec<ActionFilter<A>>,
}

impl<A: Action> Default for ActionLogger<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Action> ActionLogger<A> {
    /// A logger that records every non-silent action.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Add a filter; only actions approved by every filter are recorded.
    ///
    /// ```
    /// use flowdux_core::action::{Action, AnyAction};
    /// use flowdux_runtime::ActionLogger;
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// enum Msg { Tick, Submit }
    /// impl Action for Msg {}
    ///
    /// let logger = ActionLogger::new()
    ///     .with_filter(|action| !matches!(action, AnyAction::App(Msg::Tick)));
    /// ```
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&AnyAction<A>) -> bool + Send + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    /// Record one dispatched action, honoring the silent flag and filters.
    pub fn record(&self, action: &InternalAction<A>) {
        if action.silent {
            return;
        }
        if !self.filters.iter().all(|filter| filter(&action.action)) {
            return;
        }
        debug!(
            action = %action.action.name(),
            origin = %action.origin,
            animated = action.animation.is_some(),
            "Dispatching action"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Tick,
        Submit,
    }

    impl Action for TestAction {}

    fn passes(logger: &ActionLogger<TestAction>, action: &InternalAction<TestAction>) -> bool {
        !action.silent && logger.filters.iter().all(|filter| filter(&action.action))
    }

    #[test]
    fn unfiltered_logger_accepts_everything() {
        let logger = ActionLogger::new();
        assert!(passes(&logger, &InternalAction::new(TestAction::Tick)));
        assert!(passes(&logger, &InternalAction::new(TestAction::Submit)));
    }

    #[test]
    fn silent_actions_never_pass() {
        let logger = ActionLogger::new();
        assert!(!passes(&logger, &InternalAction::new(TestAction::Tick).silent()));
    }

    #[test]
    fn every_filter_must_approve() {
        let logger = ActionLogger::new()
            .with_filter(|action| !matches!(action, AnyAction::App(TestAction::Tick)))
            .with_filter(|_| true);
        assert!(!passes(&logger, &InternalAction::new(TestAction::Tick)));
        assert!(passes(&logger, &InternalAction::new(TestAction::Submit)));
    }
}
