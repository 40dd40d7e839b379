//! Paths through the state tree and the diff between two of them.
//!
//! A [`Path`] is the chain root → leaf for one tree position, each node
//! carrying the values of its state's own params. [`TreeChanges`] splits two
//! paths into what is kept, left and entered.

use super::state::State;
use crate::params::Params;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Resolved values of one node, by resolve key.
pub type Locals = BTreeMap<String, Value>;

/// One state of a path with the values of its own params.
#[derive(Clone)]
pub struct PathNode {
    pub state: Arc<State>,
    pub params: Params,
    pub locals: Locals,
}

impl PathNode {
    /// Node for `state`, keeping only its own params from `params` (normalized).
    pub fn new(state: Arc<State>, params: &Params) -> Self {
        let params = state.own_params().normalize(params);
        Self {
            state,
            params,
            locals: Locals::new(),
        }
    }

    /// Same state and deep-equal own param values.
    pub fn equals(&self, other: &PathNode) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
            && self.state.own_params().equals(&self.params, &other.params)
    }
}

impl fmt::Debug for PathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathNode")
            .field("state", &self.state.name())
            .field("params", &self.params)
            .field("locals", &self.locals.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Root-to-leaf chain of nodes.
#[derive(Clone, Debug, Default)]
pub struct Path {
    nodes: Vec<PathNode>,
}

impl Path {
    /// Build a path over `states` (root first), splitting `params` per node.
    pub fn build(states: Vec<Arc<State>>, params: &Params) -> Self {
        Self {
            nodes: states
                .into_iter()
                .map(|state| PathNode::new(state, params))
                .collect(),
        }
    }

    /// Wrap nodes that are already in root-first order.
    pub fn from_nodes(nodes: Vec<PathNode>) -> Self {
        Self { nodes }
    }

    /// Nodes, root first.
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [PathNode] {
        &mut self.nodes
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The deepest node.
    pub fn leaf(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    /// State of the deepest node.
    pub fn leaf_state(&self) -> Option<&Arc<State>> {
        self.leaf().map(|node| &node.state)
    }

    /// Union of every node's params.
    pub fn params(&self) -> Params {
        self.nodes
            .iter()
            .flat_map(|node| node.params.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }

    /// States along the path, root first.
    pub fn states(&self) -> impl Iterator<Item = &Arc<State>> {
        self.nodes.iter().map(|node| &node.state)
    }

    /// Whether `name` is a state on this path.
    pub fn contains(&self, name: &str) -> bool {
        self.states().any(|s| s.name() == name)
    }

    /// The first `len` nodes.
    pub fn prefix(&self, len: usize) -> Path {
        Self {
            nodes: self.nodes[..len.min(self.nodes.len())].to_vec(),
        }
    }
}

/// The diff between a committed path and a target path.
///
/// `retained ++ entering == to` and `retained ++ reverse(exiting) == from`.
#[derive(Clone, Debug, Default)]
pub struct TreeChanges {
    pub from: Path,
    pub to: Path,
    pub retained: Vec<PathNode>,
    /// Shallowest first
    pub entering: Vec<PathNode>,
    /// Deepest first
    pub exiting: Vec<PathNode>,
}

impl TreeChanges {
    /// Diff `from` against `to`.
    ///
    /// Nodes at or below `reload_depth` are never retained. Retained nodes
    /// come from `from`, so they keep their resolved locals; `to` is
    /// rebuilt from them plus the entering nodes.
    pub fn compute(from: &Path, to: &Path, reload_depth: Option<usize>) -> Self {
        let limit = reload_depth.unwrap_or(usize::MAX);
        let keep = from
            .nodes()
            .iter()
            .zip(to.nodes())
            .take(limit)
            .take_while(|(a, b)| a.equals(b))
            .count();

        let retained = from.nodes()[..keep].to_vec();
        let entering = to.nodes()[keep..].to_vec();
        let exiting = from.nodes()[keep..].iter().rev().cloned().collect();
        let to = Path::from_nodes(retained.iter().chain(&entering).cloned().collect());

        Self {
            from: from.clone(),
            to,
            retained,
            entering,
            exiting,
        }
    }

    /// No state is entered or exited.
    pub fn is_noop(&self) -> bool {
        self.entering.is_empty() && self.exiting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::StateRegistry;
    use crate::params;

    fn registry() -> StateRegistry {
        let mut registry = StateRegistry::default();
        registry.register(StateBuilder::new("a").url("/a").build()).unwrap();
        registry.register(StateBuilder::new("a.b").url("/b/:id").build()).unwrap();
        registry.register(StateBuilder::new("a.b.c").url("/c").build()).unwrap();
        registry.register(StateBuilder::new("x").url("/x").build()).unwrap();
        registry
    }

    fn path(registry: &StateRegistry, name: &str, params: Params) -> Path {
        let state = registry.get(name).unwrap();
        Path::build(registry.path(&state), &params)
    }

    fn names(nodes: &[PathNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.state.name()).collect()
    }

    #[test]
    fn nodes_keep_only_own_params() {
        let registry = registry();
        let p = path(&registry, "a.b.c", params! { "id" => "7", "extra" => 1 });
        assert!(p.nodes()[1].params.is_empty());
        assert_eq!(p.nodes()[2].params, params! { "id" => "7" });
        assert!(p.nodes()[3].params.is_empty());
        assert_eq!(p.params(), params! { "id" => "7" });
    }

    #[test]
    fn sibling_move_exits_and_enters() {
        let registry = registry();
        let from = path(&registry, "a.b.c", params! { "id" => "1" });
        let to = path(&registry, "x", Params::new());
        let changes = TreeChanges::compute(&from, &to, None);

        assert_eq!(names(&changes.retained), [""]);
        assert_eq!(names(&changes.exiting), ["a.b.c", "a.b", "a"]);
        assert_eq!(names(&changes.entering), ["x"]);
    }

    #[test]
    fn param_change_reenters_from_owner() {
        let registry = registry();
        let from = path(&registry, "a.b.c", params! { "id" => "1" });
        let to = path(&registry, "a.b.c", params! { "id" => "2" });
        let changes = TreeChanges::compute(&from, &to, None);

        assert_eq!(names(&changes.retained), ["", "a"]);
        assert_eq!(names(&changes.exiting), ["a.b.c", "a.b"]);
        assert_eq!(names(&changes.entering), ["a.b", "a.b.c"]);
    }

    #[test]
    fn identical_paths_are_noop() {
        let registry = registry();
        let from = path(&registry, "a.b", params! { "id" => "1" });
        let changes = TreeChanges::compute(&from, &from.clone(), None);
        assert!(changes.is_noop());
        assert_eq!(changes.to.len(), from.len());
    }

    #[test]
    fn reload_depth_forces_reentry() {
        let registry = registry();
        let from = path(&registry, "a.b.c", params! { "id" => "1" });
        let changes = TreeChanges::compute(&from, &from.clone(), Some(2));
        assert_eq!(names(&changes.retained), ["", "a"]);
        assert_eq!(names(&changes.entering), ["a.b", "a.b.c"]);

        let all = TreeChanges::compute(&from, &from.clone(), Some(1));
        assert_eq!(names(&all.retained), [""]);
        assert_eq!(all.exiting.len(), 3);
    }

    #[test]
    fn retained_nodes_keep_their_locals() {
        let registry = registry();
        let mut from = path(&registry, "a.b", params! { "id" => "1" });
        from.nodes_mut()[1].locals.insert("user".into(), serde_json::json!("ann"));
        let to = path(&registry, "a.b.c", params! { "id" => "1" });

        let changes = TreeChanges::compute(&from, &to, None);
        assert_eq!(changes.to.nodes()[1].locals["user"], "ann");
        assert_eq!(names(&changes.entering), ["a.b.c"]);
    }
}
