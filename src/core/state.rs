//! State declarations and registered state records.

use crate::params::{ParamConfig, ParamSet};
use crate::resolve::{ResolvePolicy, Resolvable};
use crate::transition::HookCallback;
use crate::url::UrlMatcher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name of the default view slot.
pub const DEFAULT_VIEW: &str = "$default";

/// Opaque description of what a view slot should render.
///
/// The router never interprets these fields; they are handed to the
/// view layer through [`ViewConfig`](crate::router::ViewConfig).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewDeclaration {
    pub component: Option<String>,
    pub template: Option<String>,
    pub template_url: Option<String>,
    pub controller: Option<String>,
    pub controller_as: Option<String>,
}

impl ViewDeclaration {
    /// A view rendering a named component.
    pub fn component(name: impl Into<String>) -> Self {
        Self {
            component: Some(name.into()),
            ..Self::default()
        }
    }

    /// A view rendering an inline template.
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            ..Self::default()
        }
    }
}

/// Raw, unvalidated state declaration.
///
/// Usually built with [`StateBuilder`](crate::builder::StateBuilder) and
/// passed to [`StateRegistry::register`](super::StateRegistry::register).
#[derive(Clone, Debug, Default)]
pub struct StateDeclaration {
    /// Dot-segmented unique name
    pub name: String,
    /// Explicit parent; otherwise derived from the name's dot prefix
    pub parent: Option<String>,
    /// URL pattern relative to the parent's URL (`^` prefix for absolute)
    pub url: Option<String>,
    /// Per-param configuration, including config-only params
    pub params: BTreeMap<String, ParamConfig>,
    pub views: BTreeMap<String, ViewDeclaration>,
    pub resolve: Vec<Resolvable>,
    pub resolve_policy: ResolvePolicy,
    pub data: Value,
    pub on_enter: Option<HookCallback>,
    pub on_exit: Option<HookCallback>,
    pub is_abstract: bool,
}

/// A registered state.
///
/// Everything inherited from ancestors (URL, params, data) is computed once
/// at registration; the record never changes afterwards.
pub struct State {
    pub(crate) name: String,
    pub(crate) parent: Option<Arc<State>>,
    pub(crate) is_abstract: bool,
    pub(crate) own_url: Option<UrlMatcher>,
    pub(crate) url: Option<UrlMatcher>,
    pub(crate) own_params: ParamSet,
    pub(crate) params: ParamSet,
    pub(crate) resolvables: Vec<Resolvable>,
    pub(crate) resolve_policy: ResolvePolicy,
    pub(crate) views: BTreeMap<String, ViewDeclaration>,
    pub(crate) data: Value,
    pub(crate) depth: usize,
}

impl State {
    /// The implicit abstract root every tree starts from.
    pub(crate) fn root() -> Self {
        Self {
            name: String::new(),
            parent: None,
            is_abstract: true,
            own_url: None,
            url: None,
            own_params: ParamSet::new(),
            params: ParamSet::new(),
            resolvables: Vec::new(),
            resolve_policy: ResolvePolicy::default(),
            views: BTreeMap::new(),
            data: Value::Object(Default::default()),
            depth: 0,
        }
    }

    /// Fully qualified dotted name. Empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent state, `None` for the root.
    pub fn parent(&self) -> Option<&Arc<State>> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Abstract states cannot be targeted.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Distance from the root (the root is 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The URL pattern declared by this state alone.
    pub fn own_url(&self) -> Option<&UrlMatcher> {
        self.own_url.as_ref()
    }

    /// The effective URL, composed with every ancestor's.
    pub fn url(&self) -> Option<&UrlMatcher> {
        self.url.as_ref()
    }

    /// This state if it has a URL, otherwise its nearest ancestor that does.
    pub fn navigable(&self) -> Option<&State> {
        if self.url.is_some() {
            return Some(self);
        }
        self.parent.as_deref().and_then(State::navigable)
    }

    /// Params declared by this state.
    pub fn own_params(&self) -> &ParamSet {
        &self.own_params
    }

    /// Own params plus every ancestor's.
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    /// Resolvables declared on this state.
    pub fn resolvables(&self) -> &[Resolvable] {
        &self.resolvables
    }

    /// Look up one of this state's resolvables by key.
    pub fn resolvable(&self, key: &str) -> Option<&Resolvable> {
        self.resolvables.iter().find(|r| r.key() == key)
    }

    /// Default policy for resolvables that do not set one.
    pub fn resolve_policy(&self) -> ResolvePolicy {
        self.resolve_policy
    }

    /// Views keyed by outlet name.
    pub fn views(&self) -> &BTreeMap<String, ViewDeclaration> {
        &self.views
    }

    /// Declared data, merged over the parent's.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Whether `name` is this state or one of its ancestors.
    pub fn includes(&self, name: &str) -> bool {
        self.ancestors().any(|s| s.name == name)
    }

    /// This state followed by its ancestors, up to and including the root.
    pub fn ancestors(&self) -> impl Iterator<Item = &State> {
        std::iter::successors(Some(self), |s| s.parent.as_deref())
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
            .field("is_abstract", &self.is_abstract)
            .field("url", &self.url.as_ref().map(UrlMatcher::source))
            .field("params", &self.params.ids().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("(root)")
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Shallow merge of `own` object data over `inherited`.
pub(crate) fn merge_data(inherited: &Value, own: &Value) -> Value {
    match (inherited, own) {
        (Value::Object(base), Value::Object(own)) => {
            let mut merged = base.clone();
            merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
            Value::Object(merged)
        }
        (inherited, Value::Null) => inherited.clone(),
        (_, own) => own.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_is_abstract_and_unnamed() {
        let root = State::root();
        assert!(root.is_root());
        assert!(root.is_abstract());
        assert_eq!(root.name(), "");
        assert_eq!(root.to_string(), "(root)");
        assert!(root.navigable().is_none());
    }

    #[test]
    fn data_merges_objects_and_overrides_scalars() {
        let parent = json!({ "a": 1, "b": 2 });
        assert_eq!(merge_data(&parent, &json!({ "b": 3 })), json!({ "a": 1, "b": 3 }));
        assert_eq!(merge_data(&parent, &Value::Null), parent);
        assert_eq!(merge_data(&parent, &json!("x")), json!("x"));
    }

    #[test]
    fn view_declaration_deserializes_with_defaults() {
        let view: ViewDeclaration = serde_json::from_value(json!({ "component": "Home" })).unwrap();
        assert_eq!(view, ViewDeclaration::component("Home"));
    }
}
