//! The state tree: validated registration and lookup.

use super::state::{merge_data, State, StateDeclaration};
use crate::builder::RegistrationError;
use crate::params::{Param, ParamLocation, ParamSet, Params};
use crate::resolve::Resolvable;
use crate::url::{MatcherOptions, UrlMatch, UrlMatcher, UrlRules};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Registered states, keyed by name, plus the URL rules of navigable ones.
#[derive(Debug)]
pub struct StateRegistry {
    states: HashMap<String, Arc<State>>,
    order: Vec<String>,
    root: Arc<State>,
    rules: UrlRules,
    options: MatcherOptions,
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::with_options(MatcherOptions::default())
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '$'))
        })
}

fn join_name(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{parent}.{child}"),
    }
}

impl StateRegistry {
    /// Create an empty tree (just the root) whose URLs use `options`.
    pub fn with_options(options: MatcherOptions) -> Self {
        Self {
            states: HashMap::new(),
            order: Vec::new(),
            root: Arc::new(State::root()),
            rules: UrlRules::new(),
            options,
        }
    }

    /// Validate a declaration and add it to the tree.
    ///
    /// The parent must already be registered.
    pub fn register(&mut self, decl: StateDeclaration) -> Result<Arc<State>, RegistrationError> {
        let name = decl.name.clone();
        if !valid_name(&name) {
            return Err(RegistrationError::InvalidName(name));
        }
        if self.states.contains_key(&name) {
            return Err(RegistrationError::DuplicateState(name));
        }

        let parent = self.parent_of(&decl)?;
        let (own_url, url) = self.compile_url(&decl, &parent)?;

        let own_params = own_params(&decl, own_url.as_ref())?;
        let params = parent
            .params
            .merge(&own_params)
            .map_err(|param| RegistrationError::ParamCollision {
                state: name.clone(),
                param,
            })?;

        check_resolves(&name, &decl.resolve, &parent)?;

        let state = Arc::new(State {
            name: name.clone(),
            is_abstract: decl.is_abstract,
            own_url: own_url.clone(),
            url,
            own_params,
            params,
            resolvables: decl.resolve,
            resolve_policy: decl.resolve_policy,
            views: decl.views,
            data: merge_data(&parent.data, &decl.data),
            depth: parent.depth + 1,
            parent: Some(parent),
        });

        if let (false, Some(_), Some(url)) = (state.is_abstract, &own_url, &state.url) {
            self.rules.add(name.clone(), url.clone());
        }
        debug!(state = %name, url = ?state.url.as_ref().map(UrlMatcher::source), "registered state");

        self.states.insert(name.clone(), Arc::clone(&state));
        self.order.push(name);
        Ok(state)
    }

    fn parent_of(&self, decl: &StateDeclaration) -> Result<Arc<State>, RegistrationError> {
        let derived = decl.name.rsplit_once('.').map(|(prefix, _)| prefix);
        let parent = match (decl.parent.as_deref(), derived) {
            (Some(explicit), Some(derived)) if explicit != derived => {
                return Err(RegistrationError::ParentMismatch {
                    state: decl.name.clone(),
                    parent: explicit.to_string(),
                })
            }
            (Some(explicit), _) => explicit,
            (None, Some(derived)) => derived,
            (None, None) => "",
        };
        self.get(parent).ok_or_else(|| RegistrationError::UnknownParent {
            state: decl.name.clone(),
            parent: parent.to_string(),
        })
    }

    /// Own matcher and effective (composed) matcher.
    fn compile_url(
        &self,
        decl: &StateDeclaration,
        parent: &State,
    ) -> Result<(Option<UrlMatcher>, Option<UrlMatcher>), RegistrationError> {
        let Some(pattern) = decl.url.as_deref() else {
            return Ok((None, None));
        };
        let invalid = |source| RegistrationError::InvalidUrl {
            state: decl.name.clone(),
            source,
        };

        let (pattern, absolute) = match pattern.strip_prefix('^') {
            Some(rest) => (rest, true),
            None => (pattern, false),
        };
        let own = UrlMatcher::compile(pattern, &decl.params, self.options).map_err(invalid)?;

        let base = parent.navigable().and_then(State::url).filter(|_| !absolute);
        let effective = match base {
            Some(base) => {
                // Collisions with ancestors are reported as param collisions.
                if let Some(param) = own.params().find(|p| parent.params.contains(&p.id)) {
                    return Err(RegistrationError::ParamCollision {
                        state: decl.name.clone(),
                        param: param.id.clone(),
                    });
                }
                base.append(&own).map_err(invalid)?
            }
            None => own.clone(),
        };
        Ok((Some(own), Some(effective)))
    }

    /// Remove a state and all of its descendants.
    ///
    /// Returns the removed names, deepest first.
    pub fn deregister(&mut self, name: &str) -> Result<Vec<String>, RegistrationError> {
        if !self.states.contains_key(name) {
            return Err(RegistrationError::UnknownState(name.to_string()));
        }
        let mut removed: Vec<String> = self
            .order
            .iter()
            .filter(|candidate| self.states.get(*candidate).is_some_and(|s| s.includes(name)))
            .cloned()
            .collect();
        removed.sort_by_key(|n| std::cmp::Reverse(n.matches('.').count()));

        for state in &removed {
            self.states.remove(state);
            self.rules.remove(state);
        }
        self.order.retain(|n| !removed.contains(n));
        debug!(state = %name, removed = removed.len(), "deregistered state");
        Ok(removed)
    }

    /// Look up a state by absolute name. `""` is the root.
    pub fn get(&self, name: &str) -> Option<Arc<State>> {
        if name.is_empty() {
            return Some(Arc::clone(&self.root));
        }
        self.states.get(name).cloned()
    }

    /// The implicit root state.
    pub fn root(&self) -> &Arc<State> {
        &self.root
    }

    /// Registered states in registration order (the root excluded).
    pub fn states(&self) -> impl Iterator<Item = &Arc<State>> {
        self.order.iter().filter_map(|name| self.states.get(name))
    }

    /// Direct children of `name`.
    pub fn children(&self, name: &str) -> Vec<Arc<State>> {
        self.states()
            .filter(|s| s.parent().is_some_and(|p| p.name() == name))
            .cloned()
            .collect()
    }

    /// The chain from the root down to `state`, inclusive.
    pub fn path(&self, state: &Arc<State>) -> Vec<Arc<State>> {
        let mut chain = vec![Arc::clone(state)];
        while let Some(parent) = chain.last().and_then(|s| s.parent().cloned()) {
            chain.push(parent);
        }
        chain.reverse();
        chain
    }

    /// Whether `state` is `ancestor` or one of its descendants.
    pub fn includes(&self, state: &str, ancestor: &str) -> bool {
        self.get(state).is_some_and(|s| s.includes(ancestor))
    }

    /// Turn a possibly relative identifier into an absolute name.
    ///
    /// `.child` is relative to `base`; each leading `^` steps up one level,
    /// so `^.sibling` names a sibling of `base`.
    pub fn resolve_name(&self, identifier: &str, base: Option<&str>) -> Option<String> {
        if !identifier.starts_with(['.', '^']) {
            return Some(identifier.to_string());
        }
        let mut current = self.get(base?)?;
        if let Some(child) = identifier.strip_prefix('.') {
            return Some(join_name(current.name(), child));
        }
        let mut rest = identifier;
        while let Some(after) = rest.strip_prefix('^') {
            current = current.parent().cloned()?;
            rest = after.strip_prefix('.').unwrap_or(after);
        }
        Some(join_name(current.name(), rest))
    }

    /// [`resolve_name`](Self::resolve_name) followed by a lookup.
    pub fn find(&self, identifier: &str, base: Option<&str>) -> Option<Arc<State>> {
        self.resolve_name(identifier, base)
            .and_then(|name| self.get(&name))
    }

    /// The state whose URL matches, with its normalized params.
    ///
    /// No match is an ordinary `None`.
    pub fn match_url(&self, path: &str, search: &Params) -> Option<(Arc<State>, Params)> {
        let UrlMatch { state, params } = self.rules.find(path, search)?;
        let state = self.get(&state)?;
        let params = state.params.normalize(&params);
        Some((state, params))
    }

    /// Registered states, not counting the root.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

fn own_params(decl: &StateDeclaration, url: Option<&UrlMatcher>) -> Result<ParamSet, RegistrationError> {
    let mut set = ParamSet::new();
    let collision = |param: Param| RegistrationError::ParamCollision {
        state: decl.name.clone(),
        param: param.id,
    };
    if let Some(url) = url {
        for param in url.params() {
            set.insert(param.clone()).map_err(collision)?;
        }
    }
    for (id, config) in &decl.params {
        if !set.contains(id) {
            set.insert(Param::new(id.as_str(), ParamLocation::Config, None, Some(config)))
                .map_err(collision)?;
        }
    }
    Ok(set)
}

/// Resolve keys must be unique, dependencies visible and own-state edges acyclic.
fn check_resolves(name: &str, resolves: &[Resolvable], parent: &State) -> Result<(), RegistrationError> {
    let mut keys = HashSet::new();
    for resolvable in resolves {
        if !keys.insert(resolvable.key()) {
            return Err(RegistrationError::DuplicateResolve {
                state: name.to_string(),
                key: resolvable.key().to_string(),
            });
        }
    }

    let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for resolvable in resolves {
        for dep in resolvable.deps() {
            if dep != resolvable.key() && keys.contains(dep.as_str()) {
                edges.entry(resolvable.key()).or_default().push(dep.as_str());
            } else if !parent.ancestors().any(|s| s.resolvable(dep).is_some()) {
                return Err(RegistrationError::UnknownDependency {
                    state: name.to_string(),
                    key: resolvable.key().to_string(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        key: &'a str,
        edges: &BTreeMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Option<&'a str> {
        match marks.get(key) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => return Some(key),
            None => {}
        }
        marks.insert(key, Mark::Visiting);
        for &dep in edges.get(key).into_iter().flatten() {
            if let Some(cycle) = visit(dep, edges, marks) {
                return Some(cycle);
            }
        }
        marks.insert(key, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    for resolvable in resolves {
        if let Some(key) = visit(resolvable.key(), &edges, &mut marks) {
            return Err(RegistrationError::CyclicDependency {
                state: name.to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::params::ParamConfig;
    use serde_json::{json, Value};

    fn tree() -> StateRegistry {
        let mut registry = StateRegistry::default();
        for decl in [
            StateBuilder::new("A").url("/A").build(),
            StateBuilder::new("A.fwd").url("/fwd").build(),
            StateBuilder::new("A.fwd.nest").url("/nest").build(),
            StateBuilder::new("users").url("/users?page").abstract_state().build(),
            StateBuilder::new("users.detail").url("/{id:int}").build(),
            StateBuilder::new("users.detail.edit").build(),
        ] {
            registry.register(decl).unwrap();
        }
        registry
    }

    #[test]
    fn urls_compose_with_ancestors() {
        let registry = tree();
        let nest = registry.get("A.fwd.nest").unwrap();
        assert_eq!(nest.url().unwrap().format(&Params::new()).as_deref(), Some("/A/fwd/nest"));
        assert_eq!(nest.depth(), 3);
    }

    #[test]
    fn params_are_inherited() {
        let registry = tree();
        let detail = registry.get("users.detail").unwrap();
        let ids: Vec<&str> = detail.params().ids().collect();
        assert_eq!(ids, ["page", "id"]);
        assert_eq!(detail.own_params().len(), 1);
    }

    #[test]
    fn url_less_state_uses_navigable_ancestor() {
        let registry = tree();
        let edit = registry.get("users.detail.edit").unwrap();
        assert!(edit.url().is_none());
        assert_eq!(edit.navigable().map(State::name), Some("users.detail"));
    }

    #[test]
    fn rejects_missing_parent() {
        let mut registry = StateRegistry::default();
        let err = registry.register(StateBuilder::new("a.b").build()).unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownParent { parent, .. } if parent == "a"));
    }

    #[test]
    fn rejects_duplicates_and_bad_names() {
        let mut registry = tree();
        assert!(matches!(
            registry.register(StateBuilder::new("A").build()),
            Err(RegistrationError::DuplicateState(_))
        ));
        assert!(matches!(
            registry.register(StateBuilder::new("A..b").build()),
            Err(RegistrationError::InvalidName(_))
        ));
        assert!(matches!(
            registry.register(StateBuilder::new("").build()),
            Err(RegistrationError::InvalidName(_))
        ));
    }

    #[test]
    fn rejects_param_collision_with_ancestor() {
        let mut registry = tree();
        let err = registry
            .register(StateBuilder::new("users.detail.child").url("/:id").build())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ParamCollision { param, .. } if param == "id"));

        let err = registry
            .register(StateBuilder::new("users.other").param("page", ParamConfig::value(1)).build())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ParamCollision { .. }));
    }

    #[test]
    fn rejects_malformed_url() {
        let mut registry = StateRegistry::default();
        let err = registry
            .register(StateBuilder::new("bad").url("/x/{id:[}").build())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidUrl { .. }));
    }

    #[test]
    fn absolute_url_skips_parent() {
        let mut registry = tree();
        let state = registry
            .register(StateBuilder::new("A.login").url("^/login").build())
            .unwrap();
        assert_eq!(state.url().unwrap().source(), "/login");
        let (found, _) = registry.match_url("/login", &Params::new()).unwrap();
        assert_eq!(found.name(), "A.login");
    }

    #[test]
    fn resolve_dependencies_are_checked() {
        let mut registry = StateRegistry::default();
        registry
            .register(StateBuilder::new("a").resolve(Resolvable::value("user", Value::Null)).build())
            .unwrap();

        let ok = StateBuilder::new("a.b")
            .resolve(Resolvable::new("posts", ["user"], |_| async { Ok(Value::Null) }))
            .build();
        assert!(registry.register(ok).is_ok());

        let unknown = StateBuilder::new("a.c")
            .resolve(Resolvable::new("posts", ["missing"], |_| async { Ok(Value::Null) }))
            .build();
        assert!(matches!(
            registry.register(unknown),
            Err(RegistrationError::UnknownDependency { dependency, .. }) if dependency == "missing"
        ));

        let cyclic = StateBuilder::new("a.d")
            .resolve(Resolvable::new("x", ["y"], |_| async { Ok(Value::Null) }))
            .resolve(Resolvable::new("y", ["x"], |_| async { Ok(Value::Null) }))
            .build();
        assert!(matches!(
            registry.register(cyclic),
            Err(RegistrationError::CyclicDependency { .. })
        ));

        let duplicate = StateBuilder::new("a.e")
            .resolve(Resolvable::value("x", Value::Null))
            .resolve(Resolvable::value("x", Value::Null))
            .build();
        assert!(matches!(
            registry.register(duplicate),
            Err(RegistrationError::DuplicateResolve { .. })
        ));
    }

    #[test]
    fn relative_names_resolve_against_base() {
        let registry = tree();
        assert_eq!(registry.resolve_name(".nest", Some("A.fwd")).as_deref(), Some("A.fwd.nest"));
        assert_eq!(registry.resolve_name("^", Some("A.fwd")).as_deref(), Some("A"));
        assert_eq!(registry.resolve_name("^.fwd", Some("A.fwd")).as_deref(), Some("A.fwd"));
        assert_eq!(registry.resolve_name("^.^", Some("A.fwd.nest")).as_deref(), Some("A"));
        assert_eq!(registry.resolve_name("users", Some("A")).as_deref(), Some("users"));
        assert!(registry.resolve_name(".x", None).is_none());
        assert!(registry.resolve_name("^.^", Some("A")).is_none());
    }

    #[test]
    fn abstract_states_get_no_url_rule() {
        let registry = tree();
        assert!(registry.match_url("/users", &Params::new()).is_none());
        let (state, params) = registry.match_url("/users/5", &Params::new()).unwrap();
        assert_eq!(state.name(), "users.detail");
        assert_eq!(params["id"], json!(5));
        assert_eq!(params["page"], Value::Null);
    }

    #[test]
    fn path_runs_from_root() {
        let registry = tree();
        let leaf = registry.get("A.fwd.nest").unwrap();
        let path = registry.path(&leaf);
        let names: Vec<&str> = path.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["", "A", "A.fwd", "A.fwd.nest"]);
        assert!(registry.includes("A.fwd.nest", "A"));
        assert!(!registry.includes("A", "A.fwd"));
    }

    #[test]
    fn deregister_removes_subtree() {
        let mut registry = tree();
        let removed = registry.deregister("A.fwd").unwrap();
        assert_eq!(removed, ["A.fwd.nest", "A.fwd"]);
        assert!(registry.get("A.fwd").is_none());
        assert!(registry.match_url("/A/fwd/nest", &Params::new()).is_none());
        assert!(registry.get("A").is_some());
    }
}
