//! The transition pipeline.
//!
//! A transition walks its phases in a fixed order:
//!
//! 1. `onBefore` hooks
//! 2. param validation
//! 3. `onStart` hooks
//! 4. eager resolves of every entering state
//! 5. `on` hooks
//! 6. `onExit` hooks per exiting state, deepest first (failures are logged and ignored)
//! 7. per entering state, shallowest first: its resolves, then its `onEnter` hooks
//! 8. commit, then `onSuccess` hooks
//!
//! Any failure runs `onError` hooks instead and leaves the committed path
//! untouched. Before each phase and batch the transition checks that it is
//! still current; once superseded it stops without committing or reporting
//! an error.

use super::error::TransitionError;
use super::hooks::{HookContext, HookPhase, HookRegistration, HookResult};
use super::outcome::{Outcome, TransitionStatus};
use super::token::TransitionToken;
use crate::core::{Locals, State, TargetState, TransitionOptions, TreeChanges};
use crate::params::{self, Params};
use crate::resolve::{Injector, Progress, ResolveContext, ResolveError};
use crate::router::Router;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why the pipeline stopped early.
enum Halt {
    Superseded,
    Redirect(TargetState),
    Failed(TransitionError),
}

impl From<TransitionError> for Halt {
    fn from(err: TransitionError) -> Self {
        Self::Failed(err)
    }
}

/// What the router should do after running a transition.
pub(crate) enum Step {
    Done(Outcome),
    Redirect(TargetState),
}

/// One attempt to move the router from its committed path to a target.
pub struct Transition {
    id: u64,
    token: TransitionToken,
    target: TargetState,
    to: Arc<State>,
    from: Arc<State>,
    params: Params,
    changes: TreeChanges,
    resolves: ResolveContext,
    redirects: usize,
    status: Mutex<TransitionStatus>,
    redirected_to: Mutex<Option<TargetState>>,
}

impl Transition {
    /// `target` must be valid; `params` are its normalized params.
    pub(crate) fn new(
        token: TransitionToken,
        target: TargetState,
        to: Arc<State>,
        params: Params,
        changes: TreeChanges,
        services: Injector,
        redirects: usize,
    ) -> Self {
        let from = changes
            .from
            .leaf_state()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&to));
        let resolves = ResolveContext::new(&changes.to, params.clone(), token.clone(), services);
        Self {
            id: token.id(),
            token,
            target,
            to,
            from,
            params,
            changes,
            resolves,
            redirects,
            status: Mutex::new(TransitionStatus::Created),
            redirected_to: Mutex::new(None),
        }
    }

    /// Id shared with router events.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Token checked between phases.
    pub fn token(&self) -> &TransitionToken {
        &self.token
    }

    /// The target this transition was created from.
    pub fn target(&self) -> &TargetState {
        &self.target
    }

    pub fn options(&self) -> &TransitionOptions {
        self.target.options()
    }

    /// The state being navigated to.
    pub fn to_state(&self) -> &Arc<State> {
        &self.to
    }

    /// The state current when the transition started.
    pub fn from_state(&self) -> &Arc<State> {
        &self.from
    }

    /// Normalized params of the destination.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Params of the path being left.
    pub fn from_params(&self) -> Params {
        self.changes.from.params()
    }

    /// States to exit, retain and enter.
    pub fn changes(&self) -> &TreeChanges {
        &self.changes
    }

    /// Number of redirects that led to this transition.
    pub fn redirect_count(&self) -> usize {
        self.redirects
    }

    /// False once superseded or finished.
    pub fn is_active(&self) -> bool {
        self.token.is_active()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> TransitionStatus {
        *self.status.lock()
    }

    /// Target this transition was redirected to, if a hook redirected it.
    pub fn redirected_to(&self) -> Option<TargetState> {
        self.redirected_to.lock().clone()
    }

    pub(crate) fn resolves(&self) -> &ResolveContext {
        &self.resolves
    }

    fn is_exiting(&self, state: &State) -> bool {
        self.changes
            .exiting
            .iter()
            .any(|node| std::ptr::eq(node.state.as_ref(), state))
    }

    /// Resolved value of `key` as seen from `state`.
    ///
    /// Exiting states see the values of the path being left.
    pub fn value_at(&self, state: &State, key: &str) -> Option<Value> {
        if self.is_exiting(state) {
            return self.changes.from.nodes()[..=state.depth()]
                .iter()
                .rev()
                .find_map(|node| node.locals.get(key).cloned());
        }
        self.resolves.value(state.depth(), key)
    }

    /// Every resolved value visible from `state`.
    pub fn locals_at(&self, state: &State) -> Locals {
        if self.is_exiting(state) {
            let mut locals = Locals::new();
            for node in &self.changes.from.nodes()[..=state.depth()] {
                locals.extend(node.locals.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            return locals;
        }
        self.resolves.locals(state.depth())
    }

    fn set_status(&self, status: TransitionStatus) {
        *self.status.lock() = status;
    }

    fn log_phase(&self, phase: HookPhase, state: Option<&State>) {
        let state = state.map_or("", State::name);
        if self.options().trace {
            info!(transition = self.id, %phase, to = %self.to, state, "phase");
        } else {
            debug!(transition = self.id, %phase, to = %self.to, state, "phase");
        }
    }

    fn checkpoint(&self) -> Result<(), Halt> {
        if self.token.is_active() {
            Ok(())
        } else {
            Err(Halt::Superseded)
        }
    }

    fn resolved(&self, result: Result<Progress, ResolveError>) -> Result<(), Halt> {
        match result {
            Ok(Progress::Complete) => Ok(()),
            Ok(Progress::Abandoned) => Err(Halt::Superseded),
            Err(err) => Err(Halt::Failed(err.into())),
        }
    }

    /// Run the pipeline to completion.
    pub(crate) async fn run(self: &Arc<Self>, router: &Router) -> Step {
        let halt = match self.pipeline(router).await {
            Ok(()) if router.commit(self) => {
                self.set_status(TransitionStatus::Succeeded);
                self.observe(router, HookPhase::Success, None).await;
                return Step::Done(Outcome::Succeeded {
                    state: self.to.name().to_string(),
                    params: self.params.clone(),
                });
            }
            Ok(()) => Halt::Superseded,
            Err(Halt::Redirect(target)) if self.redirects >= router.config().max_redirects => {
                Halt::Failed(TransitionError::TooManyRedirects {
                    target: target.name().to_string(),
                    count: router.config().max_redirects,
                })
            }
            Err(halt) => halt,
        };

        match halt {
            Halt::Superseded => {
                debug!(transition = self.id, to = %self.to, "superseded");
                self.set_status(TransitionStatus::Superseded);
                Step::Done(Outcome::Superseded)
            }
            Halt::Redirect(target) => {
                debug!(transition = self.id, from = %self.to, to = %target, "redirected");
                self.set_status(TransitionStatus::Superseded);
                *self.redirected_to.lock() = Some(target.clone());
                Step::Redirect(target)
            }
            Halt::Failed(err) => {
                self.fail(router, err.clone()).await;
                Step::Done(Outcome::Failed(err))
            }
        }
    }

    /// Mark failed, release the router and run error hooks.
    async fn fail(self: &Arc<Self>, router: &Router, err: TransitionError) {
        warn!(transition = self.id, to = %self.to, kind = err.kind(), error = %err, "transition failed");
        self.set_status(TransitionStatus::Failed);
        self.token.release();
        self.observe(router, HookPhase::Error, Some(err)).await;
    }

    async fn pipeline(self: &Arc<Self>, router: &Router) -> Result<(), Halt> {
        self.phase(router, HookPhase::Before).await?;

        self.checkpoint()?;
        params::check(self.to.name(), self.to.params(), &self.params)
            .map_err(TransitionError::from)?;

        self.phase(router, HookPhase::Start).await?;

        self.checkpoint()?;
        self.set_status(TransitionStatus::Resolving);
        let entering_from = self.changes.retained.len();
        self.resolved(self.resolves.resolve_eager(entering_from).await)?;

        self.phase(router, HookPhase::On).await?;

        for node in &self.changes.exiting {
            self.checkpoint()?;
            self.log_phase(HookPhase::Exiting, Some(&node.state));
            let hooks = router.hooks().matching(HookPhase::Exiting, &self.to, &node.state);
            self.invoke(router, HookPhase::Exiting, hooks, Some(&node.state)).await?;
        }

        for (offset, node) in self.changes.entering.iter().enumerate() {
            self.checkpoint()?;
            self.set_status(TransitionStatus::Resolving);
            self.resolved(self.resolves.resolve_node(entering_from + offset).await)?;

            self.checkpoint()?;
            self.log_phase(HookPhase::Entering, Some(&node.state));
            let hooks = router.hooks().matching(HookPhase::Entering, &node.state, &self.from);
            self.invoke(router, HookPhase::Entering, hooks, Some(&node.state)).await?;
        }

        self.checkpoint()
    }

    async fn phase(self: &Arc<Self>, router: &Router, phase: HookPhase) -> Result<(), Halt> {
        self.checkpoint()?;
        self.log_phase(phase, None);
        let hooks = router.hooks().matching(phase, &self.to, &self.from);
        self.invoke(router, phase, hooks, None).await
    }

    /// Invoke a hook snapshot in order, stopping at the first hook that
    /// does not continue. Exit hooks are best effort.
    async fn invoke(
        self: &Arc<Self>,
        router: &Router,
        phase: HookPhase,
        hooks: Vec<Arc<HookRegistration>>,
        state: Option<&Arc<State>>,
    ) -> Result<(), Halt> {
        self.set_status(TransitionStatus::Running(phase));
        let best_effort = phase == HookPhase::Exiting;

        for hook in hooks {
            let ctx = HookContext::new(Arc::clone(self), state.cloned(), None, router.clone());
            let result = hook.callback.invoke(ctx).await;
            self.checkpoint()?;

            let failure = match result {
                HookResult::Continue => continue,
                HookResult::Redirect(target) => return Err(Halt::Redirect(target)),
                HookResult::Cancel => TransitionError::Cancelled {
                    target: self.to.name().to_string(),
                    phase: phase.to_string(),
                },
                HookResult::Fail(message) => TransitionError::HookFailed {
                    target: self.to.name().to_string(),
                    phase: phase.to_string(),
                    message,
                },
            };
            if !best_effort {
                return Err(Halt::Failed(failure));
            }
            let name = state.map_or("", |s| s.name());
            warn!(transition = self.id, state = name, error = %failure, "exit hook failed; continuing");
        }
        Ok(())
    }

    /// Run observer hooks; their results are ignored.
    async fn observe(self: &Arc<Self>, router: &Router, phase: HookPhase, error: Option<TransitionError>) {
        self.log_phase(phase, None);
        for hook in router.hooks().matching(phase, &self.to, &self.from) {
            let ctx = HookContext::new(Arc::clone(self), None, error.clone(), router.clone());
            hook.callback.invoke(ctx).await;
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("from", &self.from.name())
            .field("to", &self.to.name())
            .field("params", &self.params)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
