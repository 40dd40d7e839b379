//! Registration errors for state declarations.

use crate::url::UrlPatternError;
use thiserror::Error;

/// Errors that can occur when registering a state declaration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Invalid state name '{0}'. Names are dot-separated non-empty segments")]
    InvalidName(String),

    #[error("State '{0}' is already registered")]
    DuplicateState(String),

    #[error("Parent state '{parent}' of '{state}' is not registered")]
    UnknownParent { state: String, parent: String },

    #[error("Explicit parent '{parent}' of '{state}' disagrees with its name")]
    ParentMismatch { state: String, parent: String },

    #[error("Invalid url for state '{state}': {source}")]
    InvalidUrl {
        state: String,
        #[source]
        source: UrlPatternError,
    },

    #[error("Param '{param}' of state '{state}' collides with an ancestor param")]
    ParamCollision { state: String, param: String },

    #[error("Resolve key '{key}' is declared twice on state '{state}'")]
    DuplicateResolve { state: String, key: String },

    #[error("Resolve '{key}' of state '{state}' depends on unknown key '{dependency}'")]
    UnknownDependency {
        state: String,
        key: String,
        dependency: String,
    },

    #[error("Resolves of state '{state}' form a cycle through '{key}'")]
    CyclicDependency { state: String, key: String },

    #[error("State '{0}' has registered children and cannot be removed")]
    HasChildren(String),

    #[error("State '{0}' is not registered")]
    UnknownState(String),
}
