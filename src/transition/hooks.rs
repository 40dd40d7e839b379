//! Lifecycle hooks: registration, match criteria and invocation.
//!
//! Hooks are registered for a [`HookPhase`] with [`MatchCriteria`] over the
//! transition's `to` and `from` states. Each phase takes a snapshot of the
//! matching hooks when it starts, ordered by priority (highest first) and
//! then registration order.

use super::error::TransitionError;
use super::transition::Transition;
use crate::core::{Guard, Locals, State, TargetState, TransitionOptions};
use crate::params::Params;
use crate::router::Router;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

/// Pipeline phases that accept hooks, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// Synchronous, before anything is validated
    Before,
    /// After param validation
    Start,
    /// After eager resolves, before any state is left
    On,
    /// Once per exiting state, deepest first
    Exiting,
    /// Once per entering state, shallowest first
    Entering,
    Success,
    Error,
}

impl HookPhase {
    /// Whether hook results can change the course of the transition.
    pub fn is_observer_only(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Before => "onBefore",
            Self::Start => "onStart",
            Self::On => "on",
            Self::Exiting => "onExit",
            Self::Entering => "onEnter",
            Self::Success => "onSuccess",
            Self::Error => "onError",
        })
    }
}

/// Criterion over a single state.
#[derive(Clone, Debug, Default)]
pub enum StateMatcher {
    #[default]
    Any,
    /// Exact name, or a glob where `*` is one segment and `**` any number
    Name(String),
    /// The state or any of its ancestors has this name
    Includes(String),
    Predicate(Guard),
}

impl StateMatcher {
    pub fn matches(&self, state: &State) -> bool {
        match self {
            Self::Any => true,
            Self::Name(pattern) if pattern.contains('*') => glob_matches(pattern, state.name()),
            Self::Name(name) => name == state.name(),
            Self::Includes(name) => state.includes(name),
            Self::Predicate(guard) => guard.check(state),
        }
    }
}

impl From<&str> for StateMatcher {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<Guard> for StateMatcher {
    fn from(guard: Guard) -> Self {
        Self::Predicate(guard)
    }
}

/// Whether `name` matches a dotted glob such as `admin.*` or `**.detail`.
pub fn glob_matches(pattern: &str, name: &str) -> bool {
    fn walk(pattern: &[&str], name: &[&str]) -> bool {
        match (pattern.split_first(), name.split_first()) {
            (None, None) => true,
            (Some((&"**", rest)), _) => {
                walk(rest, name) || (!name.is_empty() && walk(pattern, &name[1..]))
            }
            (Some((p, rest)), Some((n, name_rest))) => (*p == "*" || p == n) && walk(rest, name_rest),
            _ => false,
        }
    }
    let pattern: Vec<&str> = pattern.split('.').collect();
    let name: Vec<&str> = if name.is_empty() { Vec::new() } else { name.split('.').collect() };
    walk(&pattern, &name)
}

/// Criteria a transition must meet for a hook to run.
#[derive(Clone, Debug, Default)]
pub struct MatchCriteria {
    pub to: StateMatcher,
    pub from: StateMatcher,
}

impl MatchCriteria {
    /// Matches every transition.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match transitions entering `matcher`.
    pub fn to(matcher: impl Into<StateMatcher>) -> Self {
        Self {
            to: matcher.into(),
            from: StateMatcher::Any,
        }
    }

    /// Match transitions leaving `matcher`.
    pub fn from(matcher: impl Into<StateMatcher>) -> Self {
        Self {
            to: StateMatcher::Any,
            from: matcher.into(),
        }
    }

    /// Also require the from state to match.
    pub fn and_from(mut self, matcher: impl Into<StateMatcher>) -> Self {
        self.from = matcher.into();
        self
    }

    /// Also require the to state to match.
    pub fn and_to(mut self, matcher: impl Into<StateMatcher>) -> Self {
        self.to = matcher.into();
        self
    }

    /// True when both criteria accept the pair.
    pub fn matches(&self, to: &State, from: &State) -> bool {
        self.to.matches(to) && self.from.matches(from)
    }
}

/// What a hook wants to happen next.
#[derive(Clone, Debug, Default)]
pub enum HookResult {
    #[default]
    Continue,
    /// Abort the transition
    Cancel,
    /// Abort and start a transition to this target instead
    Redirect(TargetState),
    /// Abort with an error
    Fail(String),
}

/// What a hook sees.
#[derive(Clone)]
pub struct HookContext {
    pub transition: Arc<Transition>,
    /// The entering or exiting state, for per-state phases
    pub state: Option<Arc<State>>,
    /// The failure, in the error phase
    pub error: Option<TransitionError>,
    router: Router,
}

impl HookContext {
    pub(crate) fn new(
        transition: Arc<Transition>,
        state: Option<Arc<State>>,
        error: Option<TransitionError>,
        router: Router,
    ) -> Self {
        Self {
            transition,
            state,
            error,
            router,
        }
    }

    /// The router running the transition.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Build a redirect target, relative to the transition's destination.
    pub fn target(&self, identifier: &str, params: Params) -> TargetState {
        let options = TransitionOptions {
            relative: Some(self.transition.to_state().name().to_string()),
            ..self.transition.options().clone()
        };
        self.router.target(identifier, params, options)
    }

    /// Resolved value visible from the hook's state (or the destination).
    pub fn value(&self, key: &str) -> Option<Value> {
        self.transition.value_at(self.focus(), key)
    }

    /// Every resolved value visible from the hook's state (or the destination).
    pub fn locals(&self) -> Locals {
        self.transition.locals_at(self.focus())
    }

    fn focus(&self) -> &State {
        self.state.as_deref().unwrap_or(self.transition.to_state())
    }
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("transition", &self.transition.id())
            .field("state", &self.state.as_ref().map(|s| s.name()))
            .field("error", &self.error)
            .finish()
    }
}

pub type SyncHookFn = Arc<dyn Fn(&HookContext) -> HookResult + Send + Sync>;
pub type AsyncHookFn = Arc<dyn Fn(HookContext) -> BoxFuture<'static, HookResult> + Send + Sync>;
pub type ObserverFn = Arc<dyn Fn(&HookContext) + Send + Sync>;

/// A hook body.
#[derive(Clone)]
pub enum HookCallback {
    Sync(SyncHookFn),
    Async(AsyncHookFn),
    /// Runs for side effects only; always continues
    Observer(ObserverFn),
}

impl HookCallback {
    /// Wrap a synchronous hook.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&HookContext) -> HookResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wrap an async hook.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |ctx| f(ctx).boxed()))
    }

    /// Wrap a hook that only observes and always continues.
    pub fn observer<F>(f: F) -> Self
    where
        F: Fn(&HookContext) + Send + Sync + 'static,
    {
        Self::Observer(Arc::new(f))
    }

    pub(crate) async fn invoke(&self, ctx: HookContext) -> HookResult {
        match self {
            Self::Sync(f) => f(&ctx),
            Self::Async(f) => f(ctx).await,
            Self::Observer(f) => {
                f(&ctx);
                HookResult::Continue
            }
        }
    }
}

impl fmt::Debug for HookCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sync(_) => "HookCallback::Sync",
            Self::Async(_) => "HookCallback::Async",
            Self::Observer(_) => "HookCallback::Observer",
        })
    }
}

/// A registered hook.
#[derive(Debug)]
pub struct HookRegistration {
    id: u64,
    pub phase: HookPhase,
    pub criteria: MatchCriteria,
    pub callback: HookCallback,
    pub priority: i32,
}

#[derive(Debug, Default)]
struct HookTable {
    hooks: Vec<Arc<HookRegistration>>,
    next_id: u64,
}

/// Append/remove-only hook table shared by a router and its handles.
#[derive(Clone, Debug, Default)]
pub struct HookRegistry {
    table: Arc<Mutex<HookTable>>,
}

/// Removes its hook on [`deregister`](Self::deregister).
#[derive(Debug)]
pub struct HookHandle {
    id: u64,
    table: Weak<Mutex<HookTable>>,
}

impl HookHandle {
    /// Remove the hook. Returns false if it was already gone.
    pub fn deregister(self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let mut table = table.lock();
        let before = table.hooks.len();
        table.hooks.retain(|hook| hook.id != self.id);
        table.hooks.len() != before
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for `phase`.
    ///
    /// Hooks run by descending priority, then in registration order.
    pub fn register(
        &self,
        phase: HookPhase,
        criteria: MatchCriteria,
        callback: HookCallback,
        priority: i32,
    ) -> HookHandle {
        let mut table = self.table.lock();
        table.next_id += 1;
        let id = table.next_id;
        table.hooks.push(Arc::new(HookRegistration {
            id,
            phase,
            criteria,
            callback,
            priority,
        }));
        HookHandle {
            id,
            table: Arc::downgrade(&self.table),
        }
    }

    /// Snapshot of every hook for `phase`, in invocation order.
    pub fn hooks_for(&self, phase: HookPhase) -> Vec<Arc<HookRegistration>> {
        let mut hooks: Vec<Arc<HookRegistration>> = self
            .table
            .lock()
            .hooks
            .iter()
            .filter(|hook| hook.phase == phase)
            .cloned()
            .collect();
        hooks.sort_by_key(|hook| (std::cmp::Reverse(hook.priority), hook.id));
        hooks
    }

    /// Snapshot of the hooks for `phase` whose criteria accept `to` and `from`.
    pub fn matching(&self, phase: HookPhase, to: &State, from: &State) -> Vec<Arc<HookRegistration>> {
        self.hooks_for(phase)
            .into_iter()
            .filter(|hook| hook.criteria.matches(to, from))
            .collect()
    }

    /// Number of registered hooks across all phases.
    pub fn len(&self) -> usize {
        self.table.lock().hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run before anything else. Can redirect or cancel.
    pub fn on_before<F>(&self, criteria: MatchCriteria, f: F) -> HookHandle
    where
        F: Fn(&HookContext) -> HookResult + Send + Sync + 'static,
    {
        self.register(HookPhase::Before, criteria, HookCallback::sync(f), 0)
    }

    /// Run once the target is known valid.
    pub fn on_start(&self, criteria: MatchCriteria, callback: HookCallback) -> HookHandle {
        self.register(HookPhase::Start, criteria, callback, 0)
    }

    /// Run after eager resolves, before any state is exited.
    pub fn on(&self, criteria: MatchCriteria, callback: HookCallback) -> HookHandle {
        self.register(HookPhase::On, criteria, callback, 0)
    }

    /// Run for each exiting state, deepest first. Failures are logged and ignored.
    pub fn on_exit(&self, criteria: MatchCriteria, callback: HookCallback) -> HookHandle {
        self.register(HookPhase::Exiting, criteria, callback, 0)
    }

    /// Run for each entering state, after its resolves.
    pub fn on_enter(&self, criteria: MatchCriteria, callback: HookCallback) -> HookHandle {
        self.register(HookPhase::Entering, criteria, callback, 0)
    }

    /// Observe transitions that committed.
    pub fn on_success<F>(&self, criteria: MatchCriteria, f: F) -> HookHandle
    where
        F: Fn(&HookContext) + Send + Sync + 'static,
    {
        self.register(HookPhase::Success, criteria, HookCallback::observer(f), 0)
    }

    /// Observe transitions that failed.
    pub fn on_error<F>(&self, criteria: MatchCriteria, f: F) -> HookHandle
    where
        F: Fn(&HookContext) + Send + Sync + 'static,
    {
        self.register(HookPhase::Error, criteria, HookCallback::observer(f), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::StateRegistry;
    use serde_json::json;

    fn registry() -> StateRegistry {
        let mut registry = StateRegistry::default();
        registry
            .register(StateBuilder::new("admin").data(json!({ "secure": true })).build())
            .unwrap();
        registry.register(StateBuilder::new("admin.users").build()).unwrap();
        registry.register(StateBuilder::new("admin.users.detail").build()).unwrap();
        registry.register(StateBuilder::new("home").build()).unwrap();
        registry
    }

    #[test]
    fn globs_match_segments() {
        assert!(glob_matches("admin.*", "admin.users"));
        assert!(!glob_matches("admin.*", "admin.users.detail"));
        assert!(glob_matches("admin.**", "admin.users.detail"));
        assert!(glob_matches("admin.**", "admin"));
        assert!(glob_matches("**.detail", "admin.users.detail"));
        assert!(glob_matches("**", ""));
        assert!(!glob_matches("home.*", "admin.users"));
    }

    #[test]
    fn matchers_cover_names_ancestry_and_predicates() {
        let registry = registry();
        let users = registry.get("admin.users").unwrap();

        assert!(StateMatcher::Any.matches(&users));
        assert!(StateMatcher::from("admin.users").matches(&users));
        assert!(!StateMatcher::from("admin").matches(&users));
        assert!(StateMatcher::Includes("admin".into()).matches(&users));
        assert!(StateMatcher::from(Guard::new(|s| s.data()["secure"] == true)).matches(&users));
    }

    #[test]
    fn criteria_check_both_ends() {
        let registry = registry();
        let home = registry.get("home").unwrap();
        let detail = registry.get("admin.users.detail").unwrap();
        let criteria = MatchCriteria::to("home").and_from(StateMatcher::Includes("admin".into()));

        assert!(criteria.matches(&home, &detail));
        assert!(!criteria.matches(&detail, &home));
    }

    #[test]
    fn snapshot_orders_by_priority_then_registration() {
        let hooks = HookRegistry::new();
        let noop = || HookCallback::sync(|_| HookResult::Continue);
        let low = hooks.register(HookPhase::Start, MatchCriteria::any(), noop(), -1);
        let first = hooks.register(HookPhase::Start, MatchCriteria::any(), noop(), 0);
        let high = hooks.register(HookPhase::Start, MatchCriteria::any(), noop(), 10);
        let second = hooks.register(HookPhase::Start, MatchCriteria::any(), noop(), 0);
        hooks.register(HookPhase::On, MatchCriteria::any(), noop(), 100);

        let order: Vec<u64> = hooks.hooks_for(HookPhase::Start).iter().map(|h| h.id).collect();
        assert_eq!(order, [high.id, first.id, second.id, low.id]);
    }

    #[test]
    fn handles_deregister_once() {
        let hooks = HookRegistry::new();
        let handle = hooks.on_success(MatchCriteria::any(), |_| {});
        let other = hooks.on_error(MatchCriteria::any(), |_| {});
        assert_eq!(hooks.len(), 2);

        assert!(handle.deregister());
        assert_eq!(hooks.len(), 1);
        assert!(hooks.hooks_for(HookPhase::Success).is_empty());
        drop(hooks);
        assert!(!other.deregister());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_registration() {
        let hooks = HookRegistry::new();
        hooks.on(MatchCriteria::any(), HookCallback::observer(|_| {}));
        let snapshot = hooks.hooks_for(HookPhase::On);
        hooks.on(MatchCriteria::any(), HookCallback::observer(|_| {}));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(hooks.hooks_for(HookPhase::On).len(), 2);
    }
}
