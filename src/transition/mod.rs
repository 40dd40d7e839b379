//! Transitions and their lifecycle hooks.
//!
//! - [`Transition`]: one attempt to move to a target, run as a phased pipeline
//! - [`HookRegistry`]: hooks per phase with match criteria and priorities
//! - [`TransitionToken`]: cooperative supersession
//! - [`Outcome`] / [`TransitionError`]: how it ended

mod error;
pub mod hooks;
mod outcome;
mod token;
#[allow(clippy::module_inception)]
mod transition;

pub use error::TransitionError;
pub use hooks::{
    HookCallback, HookContext, HookHandle, HookPhase, HookRegistry, HookResult, MatchCriteria,
    StateMatcher,
};
pub use outcome::{Outcome, TransitionStatus};
pub use token::TransitionToken;
pub use transition::Transition;
pub(crate) use transition::Step;
