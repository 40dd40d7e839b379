//! Navigation targets and the options that travel with them.

use super::state::State;
use crate::params::Params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// What a successful transition does to the URL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    /// Leave the URL alone
    Skip,
    /// Push a new history entry
    #[default]
    Push,
    /// Replace the current history entry
    Replace,
}

/// Which retained states a transition forces to exit and re-enter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reload {
    #[default]
    None,
    /// Every state below the root
    All,
    /// The named state and its descendants
    From(String),
}

/// Options controlling a single transition.
///
/// # Example
///
/// ```
/// use wayfinder::core::{LocationMode, Reload, TransitionOptions};
///
/// let options = TransitionOptions::default()
///     .location(LocationMode::Replace)
///     .reload(Reload::From("users".into()))
///     .trace(true);
/// assert!(options.notify);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionOptions {
    pub location: LocationMode,
    /// Base state for relative identifiers (`.child`, `^.sibling`)
    pub relative: Option<String>,
    /// Copy current param values the target doesn't specify
    pub inherit: bool,
    /// Emit router events
    pub notify: bool,
    pub reload: Reload,
    /// Log pipeline phases at `info` instead of `debug`
    pub trace: bool,
    /// Free-form data for hooks
    pub custom: Value,
}

impl Default for TransitionOptions {
    fn default() -> Self {
        Self {
            location: LocationMode::Push,
            relative: None,
            inherit: false,
            notify: true,
            reload: Reload::None,
            trace: false,
            custom: Value::Null,
        }
    }
}

impl TransitionOptions {
    /// How the URL should be updated on success.
    pub fn location(mut self, location: LocationMode) -> Self {
        self.location = location;
        self
    }

    /// Base state for relative identifiers.
    pub fn relative(mut self, base: impl Into<String>) -> Self {
        self.relative = Some(base.into());
        self
    }

    /// Inherit params from the current location.
    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    /// Emit router events for this transition.
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    /// Force states to be re-entered.
    pub fn reload(mut self, reload: Reload) -> Self {
        self.reload = reload;
        self
    }

    /// Log phases at info level.
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Free-form data for hooks.
    pub fn custom(mut self, custom: Value) -> Self {
        self.custom = custom;
        self
    }
}

/// Why a target cannot be transitioned to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidTarget {
    #[error("no such state '{0}'")]
    NoSuchState(String),

    #[error("cannot transition to abstract state '{0}'")]
    Abstract(String),
}

/// An immutable navigation request: a state, raw params and options.
///
/// The state is bound at construction; validity is computed on first use.
#[derive(Clone)]
pub struct TargetState {
    identifier: String,
    state: Option<Arc<State>>,
    params: Params,
    options: TransitionOptions,
    validity: OnceLock<Result<(), InvalidTarget>>,
}

impl TargetState {
    /// Bind `identifier` to an already-looked-up state (`None` if unknown).
    pub fn new(
        identifier: impl Into<String>,
        state: Option<Arc<State>>,
        params: Params,
        options: TransitionOptions,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            state,
            params,
            options,
            validity: OnceLock::new(),
        }
    }

    /// The identifier as requested, possibly relative.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The resolved state, if the identifier matched one.
    pub fn state(&self) -> Option<&Arc<State>> {
        self.state.as_ref()
    }

    /// Name of the bound state, or the raw identifier if unbound.
    pub fn name(&self) -> &str {
        self.state.as_ref().map_or(&self.identifier, |s| s.name())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn options(&self) -> &TransitionOptions {
        &self.options
    }

    /// True when the state exists and can be targeted.
    pub fn valid(&self) -> bool {
        self.error().is_none()
    }

    /// Why the target is invalid.
    pub fn error(&self) -> Option<&InvalidTarget> {
        self.validity
            .get_or_init(|| match &self.state {
                None => Err(InvalidTarget::NoSuchState(self.identifier.clone())),
                Some(state) if state.is_abstract() => Err(InvalidTarget::Abstract(state.name().to_string())),
                Some(_) => Ok(()),
            })
            .as_ref()
            .err()
    }

    /// Same state and options, different params.
    pub fn with_params(&self, params: Params) -> Self {
        Self::new(self.identifier.clone(), self.state.clone(), params, self.options.clone())
    }

    /// Same state and params, different options.
    pub fn with_options(&self, options: TransitionOptions) -> Self {
        Self::new(self.identifier.clone(), self.state.clone(), self.params.clone(), options)
    }
}

impl fmt::Debug for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetState")
            .field("identifier", &self.identifier)
            .field("state", &self.state.as_ref().map(|s| s.name()))
            .field("params", &self.params)
            .field("options", &self.options)
            .finish()
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.name())?;
        if !self.params.is_empty() {
            write!(f, " {}", serde_json::to_string(&self.params).map_err(|_| fmt::Error)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::StateRegistry;
    use crate::params;

    #[test]
    fn default_options() {
        let options = TransitionOptions::default();
        assert_eq!(options.location, LocationMode::Push);
        assert!(options.notify);
        assert!(!options.inherit);
        assert_eq!(options.reload, Reload::None);
    }

    #[test]
    fn options_deserialize_partially() {
        let options: TransitionOptions =
            serde_json::from_str(r#"{ "location": "replace", "reload": { "from": "a" } }"#).unwrap();
        assert_eq!(options.location, LocationMode::Replace);
        assert_eq!(options.reload, Reload::From("a".into()));
        assert!(options.notify);
    }

    #[test]
    fn validity_reflects_binding() {
        let mut registry = StateRegistry::default();
        registry.register(StateBuilder::new("base").abstract_state().build()).unwrap();
        registry.register(StateBuilder::new("base.page").build()).unwrap();

        let missing = TargetState::new("nope", None, Params::new(), TransitionOptions::default());
        assert_eq!(missing.error(), Some(&InvalidTarget::NoSuchState("nope".into())));

        let abstract_target =
            TargetState::new("base", registry.get("base"), Params::new(), TransitionOptions::default());
        assert!(!abstract_target.valid());

        let page = TargetState::new(
            "base.page",
            registry.get("base.page"),
            params! { "x" => 1 },
            TransitionOptions::default(),
        );
        assert!(page.valid());
        assert_eq!(page.to_string(), r#"'base.page' {"x":1}"#);
    }
}
