//! Per-transition resolve context.
//!
//! A [`ResolveContext`] is scoped to the `to` path of one transition. Each
//! node holds the values resolved for its state; retained nodes arrive
//! pre-populated from the committed path. Values are computed at most once
//! and are never observed once the owning transition stops being current.

use super::injector::Injector;
use super::resolvable::{ResolveArgs, ResolveError, ResolveFailure, ResolvePolicy, Resolvable};
use crate::core::{Locals, Path, State};
use crate::params::Params;
use crate::transition::TransitionToken;
use futures::future::try_join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

struct NodeSlot {
    state: Arc<State>,
    values: Mutex<Locals>,
}

/// Whether a resolve pass ran to completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    Complete,
    /// The owning transition was superseded; late results were dropped
    Abandoned,
}

type Plan = BTreeMap<usize, BTreeSet<String>>;

/// Lazily evaluated dependency graph over a path.
pub struct ResolveContext {
    nodes: Vec<NodeSlot>,
    params: Params,
    token: TransitionToken,
    services: Injector,
}

impl ResolveContext {
    /// Build a context for `path`, seeded with the locals its nodes already carry.
    pub fn new(path: &Path, params: Params, token: TransitionToken, services: Injector) -> Self {
        let nodes = path
            .nodes()
            .iter()
            .map(|node| NodeSlot {
                state: Arc::clone(&node.state),
                values: Mutex::new(node.locals.clone()),
            })
            .collect();
        Self {
            nodes,
            params,
            token,
            services,
        }
    }

    /// Number of nodes in the context.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True once `key` has a value at `depth`.
    pub fn is_resolved(&self, depth: usize, key: &str) -> bool {
        self.nodes
            .get(depth)
            .is_some_and(|node| node.values.lock().contains_key(key))
    }

    /// Value of `key` as seen from `depth` (own node first, then ancestors).
    pub fn value(&self, depth: usize, key: &str) -> Option<serde_json::Value> {
        let last = depth.min(self.nodes.len().checked_sub(1)?);
        self.nodes[..=last]
            .iter()
            .rev()
            .find_map(|node| node.values.lock().get(key).cloned())
    }

    /// All values visible from `depth`; nearer nodes shadow ancestors.
    pub fn locals(&self, depth: usize) -> Locals {
        let mut locals = Locals::new();
        for node in self.nodes.iter().take(depth.saturating_add(1)) {
            locals.extend(node.values.lock().iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        locals
    }

    /// Copy of `path` with every node's locals replaced by this context's values.
    pub fn apply_to(&self, path: &Path) -> Path {
        let mut path = path.clone();
        for (node, slot) in path.nodes_mut().iter_mut().zip(&self.nodes) {
            node.locals = slot.values.lock().clone();
        }
        path
    }

    /// Resolve every resolvable of every node.
    ///
    /// Returns the locals visible from the leaf, or `None` if the owning
    /// transition was superseded while resolving.
    pub async fn resolve_path(&self) -> Result<Option<Locals>, ResolveError> {
        let targets = self.targets(0, |_| true);
        match self.execute(self.plan(targets)?).await? {
            Progress::Complete => Ok(Some(self.locals(self.nodes.len().saturating_sub(1)))),
            Progress::Abandoned => Ok(None),
        }
    }

    /// Resolve everything declared on the node at `depth`, plus whatever it needs.
    pub(crate) async fn resolve_node(&self, depth: usize) -> Result<Progress, ResolveError> {
        let targets: Vec<(usize, String)> = self
            .nodes
            .get(depth)
            .map(|node| {
                node.state
                    .resolvables()
                    .iter()
                    .map(|r| (depth, r.key().to_string()))
                    .collect()
            })
            .unwrap_or_default();
        self.execute(self.plan(targets)?).await
    }

    /// Resolve the eager resolvables of every node from `from_depth` on.
    pub(crate) async fn resolve_eager(&self, from_depth: usize) -> Result<Progress, ResolveError> {
        let targets = self.targets(from_depth, |(state, r)| {
            r.policy(state.resolve_policy()) == ResolvePolicy::Eager
        });
        self.execute(self.plan(targets)?).await
    }

    fn targets<F>(&self, from_depth: usize, select: F) -> Vec<(usize, String)>
    where
        F: Fn((&State, &Resolvable)) -> bool,
    {
        self.nodes
            .iter()
            .enumerate()
            .skip(from_depth)
            .flat_map(|(depth, node)| {
                node.state
                    .resolvables()
                    .iter()
                    .filter(|r| select((&node.state, r)))
                    .map(move |r| (depth, r.key().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Depth of the node providing `dep` to `key` declared at `depth`.
    ///
    /// A dependency on a key's own name refers to the ancestor's value.
    fn locate(&self, depth: usize, key: &str, dep: &str) -> Option<usize> {
        if dep != key && self.nodes[depth].state.resolvable(dep).is_some() {
            return Some(depth);
        }
        (0..depth)
            .rev()
            .find(|&d| self.nodes[d].state.resolvable(dep).is_some())
    }

    fn failure(&self, depth: usize, key: &str, message: String) -> ResolveError {
        ResolveError {
            state: self.nodes[depth].state.name().to_string(),
            key: key.to_string(),
            cause: ResolveFailure::new(message),
        }
    }

    /// Close `targets` over their dependencies, skipping resolved values.
    fn plan(&self, targets: Vec<(usize, String)>) -> Result<Plan, ResolveError> {
        let mut plan = Plan::new();
        let mut work = targets;

        while let Some((depth, key)) = work.pop() {
            if self.is_resolved(depth, &key) || plan.get(&depth).is_some_and(|s| s.contains(&key)) {
                continue;
            }
            let Some(resolvable) = self.nodes[depth].state.resolvable(&key) else {
                return Err(self.failure(depth, &key, "no such resolvable".to_string()));
            };
            plan.entry(depth).or_default().insert(key.clone());
            for dep in resolvable.deps() {
                match self.locate(depth, &key, dep) {
                    Some(at) => work.push((at, dep.clone())),
                    None => {
                        return Err(self.failure(depth, &key, format!("unknown dependency '{dep}'")))
                    }
                }
            }
        }
        Ok(plan)
    }

    async fn execute(&self, plan: Plan) -> Result<Progress, ResolveError> {
        for (depth, keys) in plan {
            if !self.token.is_active() {
                return Ok(Progress::Abandoned);
            }
            if self.resolve_waves(depth, keys).await? == Progress::Abandoned {
                return Ok(Progress::Abandoned);
            }
        }
        Ok(Progress::Complete)
    }

    /// Run the planned keys of one node in dependency waves.
    ///
    /// Keys within a wave are independent and run concurrently.
    async fn resolve_waves(&self, depth: usize, keys: BTreeSet<String>) -> Result<Progress, ResolveError> {
        let state = Arc::clone(&self.nodes[depth].state);
        let mut pending: Vec<&Resolvable> = keys.iter().filter_map(|k| state.resolvable(k)).collect();

        while !pending.is_empty() {
            let (ready, blocked): (Vec<&Resolvable>, Vec<&Resolvable>) =
                pending.into_iter().partition(|r| {
                    r.deps().iter().all(|dep| {
                        self.locate(depth, r.key(), dep) != Some(depth) || self.is_resolved(depth, dep)
                    })
                });
            if ready.is_empty() {
                let key = blocked.first().map(|r| r.key()).unwrap_or_default();
                return Err(self.failure(depth, key, "dependency cycle".to_string()));
            }

            let futures = ready
                .iter()
                .map(|r| {
                    let args = self.args_for(depth, r)?;
                    let key = r.key().to_string();
                    let state_name = state.name().to_string();
                    debug!(transition = self.token.id(), state = %state_name, key = %key, "resolving");
                    Ok(r.invoke(args).map(move |result| {
                        result.map(|value| (key.clone(), value)).map_err(|cause| ResolveError {
                            state: state_name,
                            key,
                            cause,
                        })
                    }))
                })
                .collect::<Result<Vec<_>, ResolveError>>()?;

            let results = try_join_all(futures).await;
            if !self.token.is_active() {
                trace!(transition = self.token.id(), "discarding resolves of superseded transition");
                return Ok(Progress::Abandoned);
            }
            let mut values = self.nodes[depth].values.lock();
            for (key, value) in results? {
                values.entry(key).or_insert(value);
            }
            drop(values);
            pending = blocked;
        }
        Ok(Progress::Complete)
    }

    fn args_for(&self, depth: usize, resolvable: &Resolvable) -> Result<ResolveArgs, ResolveError> {
        let mut deps = BTreeMap::new();
        for dep in resolvable.deps() {
            let value = self
                .locate(depth, resolvable.key(), dep)
                .and_then(|at| self.nodes[at].values.lock().get(dep).cloned())
                .ok_or_else(|| {
                    self.failure(depth, resolvable.key(), format!("dependency '{dep}' is not available"))
                })?;
            deps.insert(dep.clone(), value);
        }
        Ok(ResolveArgs {
            deps,
            params: self.params.clone(),
            transition: self.token.clone(),
            services: self.services.clone(),
        })
    }
}

impl fmt::Debug for ResolveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveContext")
            .field("transition", &self.token.id())
            .field(
                "nodes",
                &self.nodes.iter().map(|n| n.state.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::StateRegistry;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn path_for(registry: &StateRegistry, name: &str) -> Path {
        let state = registry.get(name).unwrap();
        Path::build(registry.path(&state), &Params::new())
    }

    #[tokio::test]
    async fn dependencies_resolve_before_dependents() {
        let mut registry = StateRegistry::default();
        registry
            .register(
                StateBuilder::new("user")
                    .resolve(Resolvable::value("userId", json!(7)))
                    .build(),
            )
            .unwrap();
        registry
            .register(
                StateBuilder::new("user.profile")
                    .resolve(Resolvable::new("profile", ["userId", "theme"], |args| async move {
                        Ok(json!({
                            "id": args.dep("userId").cloned().unwrap_or(Value::Null),
                            "theme": args.dep("theme").cloned().unwrap_or(Value::Null),
                        }))
                    }))
                    .resolve(Resolvable::value("theme", json!("dark")))
                    .build(),
            )
            .unwrap();

        let path = path_for(&registry, "user.profile");
        let ctx = ResolveContext::new(&path, Params::new(), TransitionToken::detached(1), Injector::new());
        let locals = ctx.resolve_path().await.unwrap().unwrap();

        assert_eq!(locals["profile"], json!({ "id": 7, "theme": "dark" }));
        assert_eq!(locals["userId"], json!(7));
    }

    #[tokio::test]
    async fn values_are_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = StateRegistry::default();
        registry
            .register(
                StateBuilder::new("a")
                    .resolve(Resolvable::new("count", Vec::<String>::new(), move |_| {
                        let n = counter.fetch_add(1, Ordering::SeqCst);
                        async move { Ok(json!(n)) }
                    }))
                    .build(),
            )
            .unwrap();

        let path = path_for(&registry, "a");
        let ctx = ResolveContext::new(&path, Params::new(), TransitionToken::detached(1), Injector::new());
        ctx.resolve_node(1).await.unwrap();
        ctx.resolve_node(1).await.unwrap();
        ctx.resolve_path().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.value(1, "count"), Some(json!(0)));
    }

    #[tokio::test]
    async fn failure_names_state_and_key() {
        let mut registry = StateRegistry::default();
        registry
            .register(
                StateBuilder::new("broken")
                    .resolve(Resolvable::new("data", Vec::<String>::new(), |_| async {
                        Err(ResolveFailure::new("backend down"))
                    }))
                    .build(),
            )
            .unwrap();

        let path = path_for(&registry, "broken");
        let ctx = ResolveContext::new(&path, Params::new(), TransitionToken::detached(1), Injector::new());
        let err = ctx.resolve_path().await.unwrap_err();

        assert_eq!(err.state, "broken");
        assert_eq!(err.key, "data");
        assert_eq!(err.cause.message, "backend down");
    }

    #[tokio::test]
    async fn producers_see_params_and_services() {
        let mut registry = StateRegistry::default();
        registry
            .register(
                StateBuilder::new("item")
                    .url("/items/{id:int}")
                    .resolve(Resolvable::new("item", Vec::<String>::new(), |args| {
                        let prefix = args
                            .services
                            .get::<String>("prefix")
                            .map(|p| p.as_str().to_string())
                            .unwrap_or_default();
                        let id = args.param("id").cloned().unwrap_or(Value::Null);
                        async move { Ok(json!(format!("{prefix}{id}"))) }
                    }))
                    .build(),
            )
            .unwrap();

        let services = Injector::new();
        services.provide("prefix", "item-".to_string());
        let mut params = Params::new();
        params.insert("id".into(), json!(3));
        let path = path_for(&registry, "item");
        let ctx = ResolveContext::new(&path, params, TransitionToken::detached(1), services);

        assert_eq!(ctx.resolve_path().await.unwrap().unwrap()["item"], json!("item-3"));
    }

    #[tokio::test]
    async fn inactive_token_discards_results() {
        let mut registry = StateRegistry::default();
        registry
            .register(
                StateBuilder::new("a")
                    .resolve(Resolvable::value("x", json!(1)))
                    .build(),
            )
            .unwrap();

        let path = path_for(&registry, "a");
        let token = TransitionToken::detached(5);
        token.release();
        let ctx = ResolveContext::new(&path, Params::new(), token, Injector::new());

        assert_eq!(ctx.resolve_path().await.unwrap(), None);
        assert!(!ctx.is_resolved(1, "x"));
    }

    #[tokio::test]
    async fn shadowed_key_depends_on_ancestor_value() {
        let mut registry = StateRegistry::default();
        registry
            .register(
                StateBuilder::new("a")
                    .resolve(Resolvable::value("n", json!(1)))
                    .build(),
            )
            .unwrap();
        registry
            .register(
                StateBuilder::new("a.b")
                    .resolve(Resolvable::new("n", ["n"], |args| async move {
                        let n = args.dep("n").and_then(Value::as_i64).unwrap_or_default();
                        Ok(json!(n + 1))
                    }))
                    .build(),
            )
            .unwrap();

        let path = path_for(&registry, "a.b");
        let ctx = ResolveContext::new(&path, Params::new(), TransitionToken::detached(1), Injector::new());
        let locals = ctx.resolve_path().await.unwrap().unwrap();

        assert_eq!(locals["n"], json!(2));
        assert_eq!(ctx.value(1, "n"), Some(json!(1)));
    }
}
