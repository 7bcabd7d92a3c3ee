//! Derive macros for the flowdux state engine.
//!
//! `#[derive(Reducible)]` wires a composite state struct to its child
//! reducers without any reflection: the fields participating in reduction
//! are named explicitly, and the generated implementation delegates to each
//! one in declaration order, OR-ing their change flags.
//!
//! # Example
//!
//! ```ignore
//! use flowdux_macros::Reducible;
//!
//! #[derive(Reducible, Clone, Debug, PartialEq, Default)]
//! #[reducible(action = AppAction)]
//! struct AppState {
//!     #[reducible]
//!     counter: CounterState,
//!
//!     #[reducible]
//!     session: SessionState,
//!
//!     // Not reduced; managed by hand elsewhere.
//!     window_title: String,
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Expr, Fields, parse_macro_input};

/// Derive macro composing a state struct out of child reducers.
///
/// # Attributes
///
/// - `#[reducible(action = ActionType)]` on the struct names the
///   application action enum the implementation is generated for.
/// - `#[reducible]` on a field marks it as a child reducer; the field's
///   type must implement `Reducible<ActionType>`.
///
/// Children reduce in declaration order, every child sees every action,
/// and the struct reports changed when any child does.
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a non-struct type or a struct without named fields
/// - The `#[reducible(action = ...)]` attribute is missing or malformed
/// - No field is marked `#[reducible]`
#[proc_macro_derive(Reducible, attributes(reducible))]
pub fn derive_reducible(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let action = match action_type(&input.attrs) {
        Ok(Some(action)) => action,
        Ok(None) => {
            return syn::Error::new_spanned(
                &input.ident,
                "#[derive(Reducible)] requires #[reducible(action = ActionType)] on the struct",
            )
            .to_compile_error()
            .into();
        },
        Err(error) => return error.to_compile_error().into(),
    };

    let Data::Struct(data_struct) = &input.data else {
        return syn::Error::new_spanned(&input.ident, "#[derive(Reducible)] only supports structs")
            .to_compile_error()
            .into();
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return syn::Error::new_spanned(
            &input.ident,
            "#[derive(Reducible)] requires named fields",
        )
        .to_compile_error()
        .into();
    };

    let children: Vec<_> = fields
        .named
        .iter()
        .filter(|field| is_marked(&field.attrs))
        .filter_map(|field| field.ident.as_ref())
        .collect();

    if children.is_empty() {
        return syn::Error::new_spanned(
            &input.ident,
            "#[derive(Reducible)] needs at least one field marked #[reducible]",
        )
        .to_compile_error()
        .into();
    }

    let delegates = children.iter().map(|field| {
        quote! {
            changed |= ::flowdux_core::reducer::Reducible::reduce(&mut self.#field, action);
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::flowdux_core::reducer::Reducible<#action> for #name #ty_generics
        #where_clause
        {
            fn reduce(
                &mut self,
                action: &::flowdux_core::action::AnyAction<#action>,
            ) -> bool {
                let mut changed = false;
                #(#delegates)*
                changed
            }
        }
    };

    TokenStream::from(expanded)
}

/// Extract the action type from `#[reducible(action = ActionType)]`.
fn action_type(attrs: &[Attribute]) -> syn::Result<Option<Expr>> {
    for attr in attrs {
        if !attr.path().is_ident("reducible") {
            continue;
        }
        let name_value: syn::MetaNameValue = attr.parse_args()?;
        if !name_value.path.is_ident("action") {
            return Err(syn::Error::new_spanned(
                &name_value.path,
                "expected #[reducible(action = ActionType)]",
            ));
        }
        return Ok(Some(name_value.value));
    }
    Ok(None)
}

/// Whether a field carries a bare `#[reducible]` marker.
fn is_marked(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("reducible") && matches!(attr.meta, syn::Meta::Path(_))
    })
}

#[cfg(test)]
mod tests {
    // Expansion is covered by the integration tests in tests/, which
    // exercise the generated impls against flowdux-core.
}
