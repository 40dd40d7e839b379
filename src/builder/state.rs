//! Fluent builder for state declarations.

use crate::core::{StateDeclaration, ViewDeclaration, DEFAULT_VIEW};
use crate::params::ParamConfig;
use crate::resolve::{ResolvePolicy, Resolvable};
use crate::transition::HookCallback;
use serde_json::Value;

/// Builder for [`StateDeclaration`]s with a fluent API.
///
/// # Example
///
/// ```
/// use wayfinder::builder::StateBuilder;
/// use wayfinder::params::ParamConfig;
/// use wayfinder::resolve::Resolvable;
/// use serde_json::json;
///
/// let decl = StateBuilder::new("users.detail")
///     .url("/:id?tab")
///     .param("tab", ParamConfig::value("info"))
///     .component("UserDetail")
///     .resolve(Resolvable::value("title", json!("User")))
///     .build();
///
/// assert_eq!(decl.name, "users.detail");
/// assert_eq!(decl.url.as_deref(), Some("/:id?tab"));
/// ```
#[derive(Debug, Default)]
pub struct StateBuilder {
    decl: StateDeclaration,
}

impl StateBuilder {
    /// Start a declaration for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            decl: StateDeclaration {
                name: name.into(),
                ..StateDeclaration::default()
            },
        }
    }

    /// Set an explicit parent instead of deriving it from the name.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.decl.parent = Some(parent.into());
        self
    }

    /// URL pattern, relative to the parent's.
    pub fn url(mut self, pattern: impl Into<String>) -> Self {
        self.decl.url = Some(pattern.into());
        self
    }

    /// Configure a param, or declare a config-only one.
    pub fn param(mut self, id: impl Into<String>, config: ParamConfig) -> Self {
        self.decl.params.insert(id.into(), config);
        self
    }

    /// Add a named view slot.
    pub fn view(mut self, name: impl Into<String>, view: ViewDeclaration) -> Self {
        self.decl.views.insert(name.into(), view);
        self
    }

    /// Shorthand for a default view rendering `component`.
    pub fn component(self, component: impl Into<String>) -> Self {
        self.view(DEFAULT_VIEW, ViewDeclaration::component(component))
    }

    /// Add a resolvable to the state.
    pub fn resolve(mut self, resolvable: Resolvable) -> Self {
        self.decl.resolve.push(resolvable);
        self
    }

    /// Default policy for this state's resolvables.
    pub fn resolve_policy(mut self, policy: ResolvePolicy) -> Self {
        self.decl.resolve_policy = policy;
        self
    }

    /// Arbitrary data, merged over the parent's.
    pub fn data(mut self, data: Value) -> Self {
        self.decl.data = data;
        self
    }

    /// Run `callback` whenever this state is entered.
    pub fn on_enter(mut self, callback: HookCallback) -> Self {
        self.decl.on_enter = Some(callback);
        self
    }

    /// Run `callback` whenever this state is exited.
    pub fn on_exit(mut self, callback: HookCallback) -> Self {
        self.decl.on_exit = Some(callback);
        self
    }

    /// Mark the state abstract: it can be a parent but never a target.
    pub fn abstract_state(mut self) -> Self {
        self.decl.is_abstract = true;
        self
    }

    /// Finish the declaration. Validation happens at registration.
    pub fn build(self) -> StateDeclaration {
        self.decl
    }
}
