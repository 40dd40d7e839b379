//! Transition failure types.

use crate::core::InvalidTarget;
use crate::params::ParamValidationError;
use crate::resolve::ResolveError;
use thiserror::Error;

/// Why a transition failed.
///
/// Supersession and ignored duplicates are outcomes, not errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransitionError {
    #[error("invalid target {target}: {reason}")]
    InvalidTargetState {
        target: String,
        #[source]
        reason: InvalidTarget,
    },

    #[error(transparent)]
    ParamValidation(#[from] ParamValidationError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("transition to '{target}' was cancelled by a {phase} hook")]
    Cancelled { target: String, phase: String },

    #[error("too many redirects ({count}) starting at '{target}'")]
    TooManyRedirects { target: String, count: usize },

    #[error("{phase} hook failed for '{target}': {message}")]
    HookFailed {
        target: String,
        phase: String,
        message: String,
    },
}

impl TransitionError {
    /// Short machine-friendly tag, used in logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTargetState { .. } => "invalid_target",
            Self::ParamValidation(_) => "param_validation",
            Self::Resolve(_) => "resolve",
            Self::Cancelled { .. } => "cancelled",
            Self::TooManyRedirects { .. } => "too_many_redirects",
            Self::HookFailed { .. } => "hook_failed",
        }
    }
}
