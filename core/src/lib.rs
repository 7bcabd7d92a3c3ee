//! # flowdux core
//!
//! Core traits and value types for the flowdux unidirectional-data-flow
//! engine.
//!
//! ## Core concepts
//!
//! - **State**: a single, deeply nested, value-semantics aggregate; the root
//!   implements [`reducer::AppReducer`]
//! - **Action**: an immutable, equatable value describing an intended change
//!   ([`action::Action`]); the engine wraps each dispatch in an
//!   [`action::InternalAction`] carrying animation/silent/provenance metadata
//! - **Reducer node**: any sub-state implementing [`reducer::Reducible`];
//!   composite nodes delegate to their reducer-typed fields explicitly (or
//!   via `#[derive(Reducible)]` from `flowdux-macros`)
//! - **Scope**: an equatable projection of state gating observer
//!   notifications ([`scope`])
//! - **Flow**: a finite-state-machine-shaped reducer slice with a stable
//!   correlation id ([`flow`])
//! - **Effect**: a description of asynchronous work, driven and cancelled by
//!   the runtime under an [`effect::EffectToken`]
//!
//! ## Architecture principles
//!
//! - Unidirectional data flow: UI dispatches, the store reduces, observers
//!   are renotified only when their scope changed
//! - Explicit composition: the reducer tree is enumerated in code, not
//!   discovered by reflection; unmatched actions are deliberate no-ops
//! - Explicit lifecycles: subscriptions and per-instance container state use
//!   handles and keys, never weak-reference sweeps
//!
//! The store runtime, middleware protocols, and effect runner live in
//! `flowdux-runtime`.

pub mod action;
pub mod effect;
pub mod flow;
pub mod form;
pub mod reducer;
pub mod scope;

pub use action::{Action, ActionGroup, AnimationTag, AnyAction, InternalAction, Origin};
pub use effect::{Effect, EffectError, EffectToken};
pub use flow::{Flow, FlowId};
pub use form::{Form, FormValue};
pub use reducer::{AppReducer, BindableContainer, BindableKey, BindableReducer, Reducible};
pub use scope::{CombinedScope, NoneScope};
