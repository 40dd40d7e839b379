//! The router: state tree, current location and navigation entry points.
//!
//! A [`Router`] owns the registered states, the hook registry and the
//! committed path. Navigation requests become [`TargetState`]s, then
//! [`Transition`]s; only a transition that is still current when it
//! finishes may replace the committed path.
//!
//! # Example
//!
//! ```
//! use wayfinder::builder::StateBuilder;
//! use wayfinder::params;
//! use wayfinder::router::{HrefOptions, RouterBuilder};
//!
//! # tokio_test_block(async {
//! let router = RouterBuilder::new()
//!     .state(StateBuilder::new("users").url("/users").build())
//!     .state(StateBuilder::new("users.detail").url("/{id:int}").build())
//!     .build()
//!     .unwrap();
//!
//! let outcome = router.go("users.detail", params! { "id" => 42 }).await;
//! assert!(outcome.is_success());
//! assert!(router.is("users.detail", None));
//! assert_eq!(router.href(".", params! {}, HrefOptions::default()).as_deref(), Some("/users/42"));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     futures::executor::block_on(f)
//! # }
//! ```

mod config;
mod events;
mod view;

pub use config::{RouterBuilder, RouterConfig};
pub use events::{Listener, LocationUpdate, Subscription, TransitionEvent};
pub use view::ViewConfig;

use crate::builder::RegistrationError;
use crate::checkpoint::{CheckpointError, RouterCheckpoint};
use crate::core::{
    InvalidTarget, Location, LocationMode, NavigationHistory, NavigationRecord, Path, Reload, State,
    StateDeclaration, StateRegistry, TargetState, TransitionOptions, TreeChanges,
};
use crate::params::Params;
use crate::resolve::Injector;
use crate::transition::hooks::glob_matches;
use crate::transition::{
    HookHandle, HookPhase, HookRegistry, MatchCriteria, Outcome, Step, StateMatcher, Transition,
    TransitionError, TransitionToken,
};
use crate::url::split_url;
use chrono::Utc;
use events::Listeners;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for [`Router::href`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HrefOptions {
    /// Fall back to the nearest ancestor with a URL
    pub lossy: bool,
    /// Prefix the configured `base_href`
    pub absolute: bool,
    /// Base for relative identifiers; defaults to the current state
    pub relative: Option<String>,
    /// Fill in missing params from the current location
    pub inherit: bool,
}

impl Default for HrefOptions {
    fn default() -> Self {
        Self {
            lossy: true,
            absolute: false,
            relative: None,
            inherit: true,
        }
    }
}

/// The transition currently allowed to commit, used to ignore duplicates.
struct Running {
    id: u64,
    state: String,
    params: Params,
    reload: Reload,
}

struct RouterInner {
    config: RouterConfig,
    registry: RwLock<StateRegistry>,
    hooks: HookRegistry,
    services: Injector,
    current: RwLock<Path>,
    active: Arc<AtomicU64>,
    next_id: AtomicU64,
    running: Mutex<Option<Running>>,
    listeners: Listeners,
    history: RwLock<NavigationHistory>,
    state_hooks: Mutex<HashMap<String, Vec<HookHandle>>>,
}

/// Cheaply cloneable handle to a router.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

impl Router {
    /// A router with no states and no services.
    pub fn new(config: RouterConfig) -> Self {
        Self::with_services(config, Injector::new())
    }

    /// A router whose resolves can reach `services`.
    pub fn with_services(config: RouterConfig, services: Injector) -> Self {
        let registry = StateRegistry::with_options(config.matcher_options());
        let root = Path::build(vec![Arc::clone(registry.root())], &Params::new());
        let history = match config.history_limit {
            Some(limit) => NavigationHistory::with_limit(limit),
            None => NavigationHistory::new(),
        };
        Self {
            inner: Arc::new(RouterInner {
                config,
                registry: RwLock::new(registry),
                hooks: HookRegistry::new(),
                services,
                current: RwLock::new(root),
                active: Arc::new(AtomicU64::new(0)),
                next_id: AtomicU64::new(0),
                running: Mutex::new(None),
                listeners: Listeners::default(),
                history: RwLock::new(history),
                state_hooks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Config the router was built with.
    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    /// Transition hooks shared by every transition.
    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /// Services handed to resolvables.
    pub fn services(&self) -> &Injector {
        &self.inner.services
    }

    // ---- state tree ----

    /// Register a state. Its `on_enter`/`on_exit` callbacks become hooks.
    pub fn register(&self, mut decl: StateDeclaration) -> Result<Arc<State>, RegistrationError> {
        let on_enter = decl.on_enter.take();
        let on_exit = decl.on_exit.take();
        let state = self.inner.registry.write().register(decl)?;

        let name = state.name().to_string();
        let mut handles = Vec::new();
        if let Some(callback) = on_enter {
            let criteria = MatchCriteria::to(StateMatcher::Name(name.clone()));
            handles.push(self.inner.hooks.register(HookPhase::Entering, criteria, callback, 0));
        }
        if let Some(callback) = on_exit {
            let criteria = MatchCriteria::from(StateMatcher::Name(name.clone()));
            handles.push(self.inner.hooks.register(HookPhase::Exiting, criteria, callback, 0));
        }
        if !handles.is_empty() {
            self.inner.state_hooks.lock().insert(name, handles);
        }
        Ok(state)
    }

    /// Remove a state, its descendants and their declared callbacks.
    pub fn deregister(&self, name: &str) -> Result<Vec<String>, RegistrationError> {
        let removed = self.inner.registry.write().deregister(name)?;
        let mut state_hooks = self.inner.state_hooks.lock();
        for state in &removed {
            for handle in state_hooks.remove(state).into_iter().flatten() {
                handle.deregister();
            }
        }
        Ok(removed)
    }

    /// Look up a registered state by name.
    pub fn get(&self, name: &str) -> Option<Arc<State>> {
        self.inner.registry.read().get(name)
    }

    /// Registered states in registration order.
    pub fn states(&self) -> Vec<Arc<State>> {
        self.inner.registry.read().states().cloned().collect()
    }

    // ---- current location ----

    /// Leaf state of the committed path (the root before any navigation).
    pub fn current(&self) -> Arc<State> {
        let current = self.inner.current.read();
        match current.leaf_state() {
            Some(state) => Arc::clone(state),
            None => Arc::clone(self.inner.registry.read().root()),
        }
    }

    /// Params of the committed path.
    pub fn params(&self) -> Params {
        self.inner.current.read().params()
    }

    /// The committed path, root first, with resolved values.
    pub fn current_path(&self) -> Path {
        self.inner.current.read().clone()
    }

    /// Current state and params as a [`Location`].
    pub fn location(&self) -> Location {
        Location::new(self.current().name(), self.params())
    }

    /// A snapshot of the navigation history.
    pub fn history(&self) -> NavigationHistory {
        self.inner.history.read().clone()
    }

    /// Whether the current state is `identifier` and its params include `params`.
    pub fn is(&self, identifier: &str, params: Option<&Params>) -> bool {
        let current = self.current();
        let Some(state) = self.inner.registry.read().find(identifier, Some(current.name())) else {
            return false;
        };
        Arc::ptr_eq(&state, &current) && self.params_match(&state, params)
    }

    /// Whether `identifier` (or a glob such as `admin.**`) is on the current path.
    pub fn includes(&self, identifier: &str, params: Option<&Params>) -> bool {
        let path = self.current_path();
        if identifier.contains('*') {
            return path.states().any(|s| glob_matches(identifier, s.name()))
                && params.map_or(true, |p| self.params_match(&self.current(), Some(p)));
        }
        let base = self.current();
        let Some(state) = self.inner.registry.read().find(identifier, Some(base.name())) else {
            return false;
        };
        path.states().any(|s| Arc::ptr_eq(s, &state)) && self.params_match(&state, params)
    }

    fn params_match(&self, state: &State, params: Option<&Params>) -> bool {
        let Some(params) = params else {
            return true;
        };
        let current = self.params();
        params.iter().all(|(key, value)| {
            let expected = state
                .params()
                .get(key)
                .and_then(|p| p.value(Some(value)))
                .unwrap_or_else(|| value.clone());
            current.get(key) == Some(&expected)
        })
    }

    /// View configs of the committed path, shallowest state first.
    pub fn view_configs(&self) -> Vec<ViewConfig> {
        view::view_configs(&self.inner.current.read())
    }

    // ---- URLs ----

    /// Build the URL for a state, or `None` if it has none or params don't fit.
    pub fn href(&self, identifier: &str, params: Params, options: HrefOptions) -> Option<String> {
        let base = options.relative.clone().unwrap_or_else(|| self.current().name().to_string());
        let state = self.inner.registry.read().find(identifier, Some(&base))?;
        let params = if options.inherit {
            self.inherit_params(&state, params)
        } else {
            params
        };

        let navigable: &State = if options.lossy {
            state.navigable()?
        } else if state.url().is_some() {
            &state
        } else {
            return None;
        };
        let url = navigable
            .url()?
            .format(&navigable.params().normalize(&params))?;

        if options.absolute {
            Some(format!("{}{url}", self.inner.config.base_href.trim_end_matches('/')))
        } else {
            Some(url)
        }
    }

    /// The state and normalized params a URL maps to.
    pub fn match_url(&self, url: &str) -> Option<(Arc<State>, Params)> {
        let (path, search) = split_url(url);
        self.inner.registry.read().match_url(path, &search)
    }

    /// Navigate to the state matching `url`, without pushing a URL.
    ///
    /// Falls back to the configured `otherwise` URL; `None` if nothing matches.
    pub async fn sync_url(&self, url: &str) -> Option<Outcome> {
        let (state, params, location) = match self.match_url(url) {
            Some((state, params)) => (state, params, LocationMode::Skip),
            None => {
                let fallback = self.inner.config.otherwise.as_deref()?;
                let (state, params) = self.match_url(fallback)?;
                debug!(url, otherwise = fallback, "no state matches url");
                (state, params, LocationMode::Replace)
            }
        };
        let options = TransitionOptions::default().location(location);
        Some(self.transition_to(state.name(), params, options).await)
    }

    // ---- navigation ----

    /// Build a target, resolving relative names and inheriting params per `options`.
    pub fn target(&self, identifier: &str, params: Params, mut options: TransitionOptions) -> TargetState {
        options.trace |= self.inner.config.default_trace;
        let state = self
            .inner
            .registry
            .read()
            .find(identifier, options.relative.as_deref());
        let params = match (&state, options.inherit) {
            (Some(state), true) => self.inherit_params(state, params),
            _ => params,
        };
        TargetState::new(identifier, state, params, options)
    }

    /// Copy params of current nodes that `state` shares with the current path.
    fn inherit_params(&self, state: &State, mut params: Params) -> Params {
        let current = self.inner.current.read();
        for node in current.nodes() {
            if state.includes(node.state.name()) {
                for (key, value) in &node.params {
                    params.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        params
    }

    /// Navigate relative to the current state, inheriting current params.
    pub async fn go(&self, identifier: &str, params: Params) -> Outcome {
        self.go_with(identifier, params, TransitionOptions::default()).await
    }

    /// [`go`](Self::go) with explicit options; `relative` defaults to the
    /// current state and params are always inherited.
    pub async fn go_with(&self, identifier: &str, params: Params, mut options: TransitionOptions) -> Outcome {
        options.inherit = true;
        if options.relative.is_none() {
            options.relative = Some(self.current().name().to_string());
        }
        self.transition_to(identifier, params, options).await
    }

    /// Navigate with explicit options.
    pub async fn transition_to(&self, identifier: &str, params: Params, options: TransitionOptions) -> Outcome {
        let target = self.target(identifier, params, options);
        self.navigate(target).await
    }

    /// Re-enter the current state, or `from` and everything below it.
    pub async fn reload(&self, from: Option<&str>) -> Outcome {
        let reload = from.map_or(Reload::All, |name| Reload::From(name.to_string()));
        let current = self.current();
        let options = TransitionOptions::default()
            .reload(reload)
            .location(LocationMode::Replace);
        self.transition_to(current.name(), self.params(), options).await
    }

    /// Run a transition to `target`, following redirects.
    pub async fn navigate(&self, target: TargetState) -> Outcome {
        if self.is_duplicate(&target) {
            debug!(target = %target, "identical transition already running");
            if target.options().notify {
                self.inner.listeners.emit(&TransitionEvent::Ignored {
                    to: Location::new(target.name(), target.params().clone()),
                });
            }
            return Outcome::Ignored;
        }

        let mut target = target;
        let mut redirects = 0;
        loop {
            match self.run_once(target, redirects).await {
                Step::Done(outcome) => return outcome,
                Step::Redirect(next) => {
                    redirects += 1;
                    target = next;
                }
            }
        }
    }

    fn is_duplicate(&self, target: &TargetState) -> bool {
        let Some(state) = target.state().filter(|_| target.valid()) else {
            return false;
        };
        let running = self.inner.running.lock();
        running.as_ref().is_some_and(|running| {
            running.id == self.inner.active.load(Ordering::SeqCst)
                && running.state == state.name()
                && running.reload == target.options().reload
                && running.params == state.params().normalize(target.params())
        })
    }

    async fn run_once(&self, target: TargetState, redirects: usize) -> Step {
        let notify = target.options().notify;
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        let state = match (target.error(), target.state()) {
            (None, Some(state)) => Arc::clone(state),
            (error, _) => {
                let reason = error
                    .cloned()
                    .unwrap_or_else(|| InvalidTarget::NoSuchState(target.identifier().to_string()));
                let err = TransitionError::InvalidTargetState {
                    target: target.identifier().to_string(),
                    reason,
                };
                warn!(transition = id, error = %err, "rejected target");
                if notify {
                    self.inner.listeners.emit(&TransitionEvent::Error {
                        transition: id,
                        to: Location::new(target.name(), target.params().clone()),
                        error: err.clone(),
                    });
                }
                return Step::Done(Outcome::Failed(err));
            }
        };

        let params = state.params().normalize(target.params());
        let to_path = {
            let registry = self.inner.registry.read();
            Path::build(registry.path(&state), &params)
        };
        let from_path = self.current_path();
        let depth = reload_depth(&target.options().reload, &from_path, &to_path);
        let changes = TreeChanges::compute(&from_path, &to_path, depth);

        self.inner.active.store(id, Ordering::SeqCst);
        *self.inner.running.lock() = Some(Running {
            id,
            state: state.name().to_string(),
            params: params.clone(),
            reload: target.options().reload.clone(),
        });

        let token = TransitionToken::new(id, Arc::clone(&self.inner.active));
        let transition = Arc::new(Transition::new(
            token,
            target,
            state,
            params,
            changes,
            self.inner.services.clone(),
            redirects,
        ));
        let trace = transition.options().trace;
        if trace {
            info!(transition = id, from = %transition.from_state(), to = %transition.to_state(), redirects, "transition started");
        } else {
            debug!(transition = id, from = %transition.from_state(), to = %transition.to_state(), redirects, "transition started");
        }
        if notify {
            self.inner.listeners.emit(&TransitionEvent::Started {
                transition: id,
                from: self.from_location(&transition),
                to: self.to_location(&transition),
            });
        }

        let step = transition.run(self).await;

        {
            let mut running = self.inner.running.lock();
            if running.as_ref().is_some_and(|r| r.id == id) {
                *running = None;
            }
        }
        if notify {
            match &step {
                Step::Done(Outcome::Succeeded { .. }) => {
                    self.inner.listeners.emit(&TransitionEvent::Success {
                        transition: id,
                        from: self.from_location(&transition),
                        to: self.to_location(&transition),
                        location: self.location_update(&transition),
                    });
                }
                Step::Done(Outcome::Failed(err)) => self.emit_error(&transition, err),
                Step::Done(Outcome::Superseded) | Step::Redirect(_) => {
                    self.inner.listeners.emit(&TransitionEvent::Superseded {
                        transition: id,
                        to: self.to_location(&transition),
                    });
                }
                Step::Done(Outcome::Ignored) => {}
            }
        }
        step
    }

    fn emit_error(&self, transition: &Transition, err: &TransitionError) {
        if transition.options().notify {
            self.inner.listeners.emit(&TransitionEvent::Error {
                transition: transition.id(),
                to: self.to_location(transition),
                error: err.clone(),
            });
        }
    }

    fn from_location(&self, transition: &Transition) -> Location {
        Location::new(transition.from_state().name(), transition.from_params())
    }

    fn to_location(&self, transition: &Transition) -> Location {
        Location::new(transition.to_state().name(), transition.params().clone())
    }

    fn url_for(&self, state: &State, params: &Params) -> Option<String> {
        let navigable = state.navigable()?;
        navigable.url()?.format(&navigable.params().normalize(params))
    }

    fn location_update(&self, transition: &Transition) -> Option<LocationUpdate> {
        let mode = transition.options().location;
        if mode == LocationMode::Skip {
            return None;
        }
        self.url_for(transition.to_state(), transition.params())
            .map(|url| LocationUpdate {
                url,
                replace: mode == LocationMode::Replace,
            })
    }

    /// Replace the committed path if `transition` is still current.
    pub(crate) fn commit(&self, transition: &Transition) -> bool {
        {
            let mut current = self.inner.current.write();
            if !transition.token().release() {
                return false;
            }
            *current = transition.resolves().apply_to(&transition.changes().to);
        }

        let record = NavigationRecord {
            transition: transition.id(),
            from: self.from_location(transition),
            to: self.to_location(transition),
            url: self.url_for(transition.to_state(), transition.params()),
            timestamp: Utc::now(),
            redirects: transition.redirect_count(),
        };
        {
            let mut history = self.inner.history.write();
            *history = history.record(record);
        }

        if transition.options().trace {
            info!(transition = transition.id(), state = %transition.to_state(), "committed");
        } else {
            debug!(transition = transition.id(), state = %transition.to_state(), "committed");
        }
        true
    }

    // ---- events ----

    /// Receive [`TransitionEvent`]s until the subscription is dropped via
    /// [`Subscription::unsubscribe`].
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TransitionEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(Arc::new(listener))
    }

    // ---- checkpoints ----

    /// Snapshot the committed location and history.
    pub fn checkpoint(&self) -> RouterCheckpoint {
        RouterCheckpoint::new(self.location(), self.history())
    }

    /// Restore history and navigate back to the checkpointed location.
    pub async fn restore(&self, checkpoint: RouterCheckpoint) -> Result<Outcome, CheckpointError> {
        checkpoint.validate()?;
        let Location { state, params } = checkpoint.location;
        if self.get(&state).is_none() {
            return Err(CheckpointError::UnknownState(state));
        }
        *self.inner.history.write() = checkpoint.history;

        let options = TransitionOptions::default().location(LocationMode::Replace);
        Ok(self.transition_to(&state, params, options).await)
    }
}

/// First path index a reload forces to re-enter.
///
/// A named state only reloads when it is on one of the two paths.
fn reload_depth(reload: &Reload, from: &Path, to: &Path) -> Option<usize> {
    match reload {
        Reload::None => None,
        Reload::All => Some(1),
        Reload::From(name) => [to, from]
            .into_iter()
            .find_map(|path| path.states().position(|s| s.name() == name))
            .map(|depth| depth.max(1)),
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("current", &self.current().name().to_string())
            .field("states", &self.inner.registry.read().len())
            .field("hooks", &self.inner.hooks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::StateRegistry;

    fn paths() -> (Path, Path) {
        let mut registry = StateRegistry::default();
        for name in ["A", "A.x", "B"] {
            registry.register(StateBuilder::new(name).build()).unwrap();
        }
        let build = |name: &str| {
            let state = registry.get(name).unwrap();
            Path::build(registry.path(&state), &Params::new())
        };
        (build("A.x"), build("B"))
    }

    #[test]
    fn reload_depth_uses_position_on_either_path() {
        let (from, to) = paths();

        assert_eq!(reload_depth(&Reload::None, &from, &to), None);
        assert_eq!(reload_depth(&Reload::All, &from, &to), Some(1));
        assert_eq!(reload_depth(&Reload::From("B".into()), &from, &to), Some(1));
        assert_eq!(reload_depth(&Reload::From("A.x".into()), &from, &to), Some(2));
    }

    #[test]
    fn reload_depth_ignores_states_off_both_paths() {
        let (from, _) = paths();

        assert_eq!(reload_depth(&Reload::From("B".into()), &from, &from), None);
        assert_eq!(reload_depth(&Reload::From("missing".into()), &from, &from), None);
        assert_eq!(reload_depth(&Reload::From("".into()), &from, &from), Some(1));
    }
}
