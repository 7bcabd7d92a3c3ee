//! Forms: generic field assignment for input-holding state.
//!
//! A form is a reducer node whose fields can be written by the generic
//! `UpdateFormField` action without any custom reduce logic. The node's
//! `Reducible` implementation calls [`reduce_form_fields`] first; when the
//! action is a field assignment addressed to this form it is applied there
//! and the node's own matching is bypassed entirely.

use crate::action::{Action, AnyAction};

/// A value assignable to a form field.
#[derive(Clone, Debug, PartialEq)]
pub enum FormValue {
    /// Free text.
    Text(String),
    /// A toggle.
    Flag(bool),
    /// An integer.
    Integer(i64),
    /// A floating-point number.
    Float(f64),
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FormValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<i64> for FormValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FormValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// A reducer node with assignable fields.
///
/// `assign` returns whether the field existed, accepted the value, and
/// actually changed. Unknown fields and type mismatches return `false`
/// (total-function semantics, like any other unmatched action).
pub trait Form {
    /// Registered form name, addressed by `UpdateFormField` actions.
    const NAME: &'static str;

    /// Assign one field; report whether the form changed.
    fn assign(&mut self, field: &str, value: &FormValue) -> bool;
}

/// Apply a field assignment addressed to this form, if the action is one.
///
/// Returns `Some(changed)` when the action was an `UpdateFormField` for
/// `F::NAME` (the caller should return it without running custom logic),
/// and `None` otherwise.
///
/// # Example
///
/// ```
/// use flowdux_core::action::{Action, AnyAction};
/// use flowdux_core::form::{reduce_form_fields, Form, FormValue};
/// use flowdux_core::reducer::Reducible;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum AppAction { Submit }
/// impl Action for AppAction {}
///
/// #[derive(Clone, Debug, PartialEq, Default)]
/// struct SignInForm {
///     email: String,
///     remember: bool,
///     submitted: bool,
/// }
///
/// impl Form for SignInForm {
///     const NAME: &'static str = "SignInForm";
///
///     fn assign(&mut self, field: &str, value: &FormValue) -> bool {
///         match (field, value) {
///             ("email", FormValue::Text(text)) if self.email != *text => {
///                 self.email = text.clone();
///                 true
///             }
///             ("remember", FormValue::Flag(flag)) if self.remember != *flag => {
///                 self.remember = *flag;
///                 true
///             }
///             _ => false,
///         }
///     }
/// }
///
/// impl Reducible<AppAction> for SignInForm {
///     fn reduce(&mut self, action: &AnyAction<AppAction>) -> bool {
///         if let Some(changed) = reduce_form_fields(self, action) {
///             return changed;
///         }
///         match action {
///             AnyAction::App(AppAction::Submit) => {
///                 self.submitted = true;
///                 true
///             }
///             _ => false,
///         }
///     }
/// }
/// ```
pub fn reduce_form_fields<A: Action, F: Form>(
    form: &mut F,
    action: &AnyAction<A>,
) -> Option<bool> {
    match action {
        AnyAction::UpdateFormField {
            form: name,
            field,
            value,
        } if *name == F::NAME => Some(form.assign(field, value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum NoAction {}
    impl Action for NoAction {}

    #[derive(Default)]
    struct Settings {
        volume: i64,
        muted: bool,
    }

    impl Form for Settings {
        const NAME: &'static str = "Settings";

        fn assign(&mut self, field: &str, value: &FormValue) -> bool {
            match (field, value) {
                ("volume", FormValue::Integer(v)) if self.volume != *v => {
                    self.volume = *v;
                    true
                },
                ("muted", FormValue::Flag(v)) if self.muted != *v => {
                    self.muted = *v;
                    true
                },
                _ => false,
            }
        }
    }

    fn update(field: &str, value: impl Into<FormValue>) -> AnyAction<NoAction> {
        AnyAction::UpdateFormField {
            form: "Settings",
            field: field.to_owned(),
            value: value.into(),
        }
    }

    #[test]
    fn assignment_is_applied_and_reported() {
        let mut form = Settings::default();
        assert_eq!(reduce_form_fields(&mut form, &update("volume", 7)), Some(true));
        assert_eq!(form.volume, 7);

        // Same value again: handled, but unchanged.
        assert_eq!(reduce_form_fields(&mut form, &update("volume", 7)), Some(false));
    }

    #[test]
    fn unknown_fields_and_type_mismatches_are_no_ops() {
        let mut form = Settings::default();
        assert_eq!(reduce_form_fields(&mut form, &update("nope", 1)), Some(false));
        assert_eq!(reduce_form_fields(&mut form, &update("volume", true)), Some(false));
    }

    #[test]
    fn other_forms_are_not_handled() {
        let mut form = Settings::default();
        let other: AnyAction<NoAction> = AnyAction::UpdateFormField {
            form: "Other",
            field: "volume".into(),
            value: FormValue::Integer(3),
        };
        assert_eq!(reduce_form_fields(&mut form, &other), None);
        assert_eq!(form.volume, 0);
    }
}
