//! Router configuration and builder.

use super::Router;
use crate::builder::RegistrationError;
use crate::core::StateDeclaration;
use crate::resolve::Injector;
use crate::url::MatcherOptions;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Router-wide settings.
///
/// Every field has a default, so partial JSON works:
///
/// ```
/// use wayfinder::router::RouterConfig;
///
/// let config = RouterConfig::from_json(r#"{ "max_redirects": 5 }"#).unwrap();
/// assert_eq!(config.max_redirects, 5);
/// assert!(!config.case_insensitive);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Redirects allowed in one navigation before it fails
    pub max_redirects: usize,
    /// Prefix for absolute hrefs
    pub base_href: String,
    pub case_insensitive: bool,
    pub strict_trailing_slash: bool,
    /// Trace every transition, as if each set `trace`
    pub default_trace: bool,
    /// Committed transitions kept in the navigation history
    pub history_limit: Option<usize>,
    /// URL to sync to when no state matches
    pub otherwise: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_redirects: 20,
            base_href: String::new(),
            case_insensitive: false,
            strict_trailing_slash: false,
            default_trace: false,
            history_limit: Some(100),
            otherwise: None,
        }
    }
}

impl RouterConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub(crate) fn matcher_options(&self) -> MatcherOptions {
        MatcherOptions {
            case_insensitive: self.case_insensitive,
            strict_trailing_slash: self.strict_trailing_slash,
        }
    }
}

/// Builder for constructing routers with a fluent API.
///
/// # Example
///
/// ```
/// use wayfinder::builder::StateBuilder;
/// use wayfinder::router::RouterBuilder;
///
/// let router = RouterBuilder::new()
///     .max_redirects(5)
///     .state(StateBuilder::new("home").url("/home").build())
///     .build()
///     .unwrap();
/// assert!(router.get("home").is_some());
/// ```
#[derive(Debug, Default)]
pub struct RouterBuilder {
    config: RouterConfig,
    states: Vec<StateDeclaration>,
    services: Injector,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Redirects allowed before a transition fails.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Prefix applied to absolute hrefs.
    pub fn base_href(mut self, base: impl Into<String>) -> Self {
        self.config.base_href = base.into();
        self
    }

    /// Match URLs without regard to case.
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.config.case_insensitive = yes;
        self
    }

    /// Require trailing slashes to match exactly.
    pub fn strict_trailing_slash(mut self, yes: bool) -> Self {
        self.config.strict_trailing_slash = yes;
        self
    }

    /// Log every transition at info level.
    pub fn trace(mut self, yes: bool) -> Self {
        self.config.default_trace = yes;
        self
    }

    /// URL to navigate to when nothing matches.
    pub fn otherwise(mut self, url: impl Into<String>) -> Self {
        self.config.otherwise = Some(url.into());
        self
    }

    /// Add a state; states register in the order they were added.
    pub fn state(mut self, decl: StateDeclaration) -> Self {
        self.states.push(decl);
        self
    }

    /// Add several states at once.
    pub fn states(mut self, decls: impl IntoIterator<Item = StateDeclaration>) -> Self {
        self.states.extend(decls);
        self
    }

    /// Provide a service to resolve producers.
    pub fn service<T: Any + Send + Sync>(self, name: impl Into<String>, service: T) -> Self {
        self.services.provide(name, service);
        self
    }

    /// Build the router, registering every state.
    /// Returns the first registration error.
    pub fn build(self) -> Result<Router, RegistrationError> {
        let router = Router::with_services(self.config, self.services);
        for decl in self.states {
            router.register(decl)?;
        }
        Ok(router)
    }
}
