//! Resolve declarations: named, dependency-ordered async values.

use super::injector::Injector;
use crate::params::Params;
use crate::transition::TransitionToken;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a resolve producer.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct ResolveFailure {
    pub message: String,
}

impl ResolveFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ResolveFailure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ResolveFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// When a resolvable runs relative to the transition pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvePolicy {
    /// In the entering batch of the owning state
    #[default]
    Lazy,
    /// For every entering state, right after the `onStart` phase
    Eager,
}

/// Everything a producer gets to work with.
#[derive(Clone, Debug)]
pub struct ResolveArgs {
    /// Values of the declared dependencies
    pub deps: BTreeMap<String, Value>,
    /// Normalized params of the transition's target
    pub params: Params,
    /// The owning transition, for cooperative cancellation checks
    pub transition: TransitionToken,
    /// Global services
    pub services: Injector,
}

impl ResolveArgs {
    /// Value of a declared dependency.
    pub fn dep(&self, key: &str) -> Option<&Value> {
        self.deps.get(key)
    }

    /// Value of a target param.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

pub type ResolveFuture = BoxFuture<'static, Result<Value, ResolveFailure>>;

/// Type alias for resolve producers.
/// Each call creates a fresh future.
pub type ResolveFn = Arc<dyn Fn(ResolveArgs) -> ResolveFuture + Send + Sync>;

/// A named value a state needs before it can be entered.
#[derive(Clone)]
pub struct Resolvable {
    key: String,
    deps: Vec<String>,
    policy: Option<ResolvePolicy>,
    producer: ResolveFn,
}

impl Resolvable {
    /// Declare a resolvable computed by an async producer.
    pub fn new<I, S, F, Fut>(key: impl Into<String>, deps: I, producer: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ResolveArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolveFailure>> + Send + 'static,
    {
        Self {
            key: key.into(),
            deps: deps.into_iter().map(Into::into).collect(),
            policy: None,
            producer: Arc::new(move |args| producer(args).boxed()),
        }
    }

    /// Declare a resolvable with a constant value.
    pub fn value(key: impl Into<String>, value: Value) -> Self {
        Self::new(key, Vec::<String>::new(), move |_| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// Override the state's resolve policy for this resolvable.
    pub fn with_policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Key the value is published under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Keys this resolvable waits on.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Own policy, falling back to `state_policy`.
    pub fn policy(&self, state_policy: ResolvePolicy) -> ResolvePolicy {
        self.policy.unwrap_or(state_policy)
    }

    pub(crate) fn invoke(&self, args: ResolveArgs) -> ResolveFuture {
        (self.producer)(args)
    }
}

impl fmt::Debug for Resolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolvable")
            .field("key", &self.key)
            .field("deps", &self.deps)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// A resolvable that failed, tagged with where it lives.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("resolve '{key}' of state '{state}' failed: {cause}")]
pub struct ResolveError {
    pub state: String,
    pub key: String,
    #[source]
    pub cause: ResolveFailure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_falls_back_to_state_policy() {
        let lazy = Resolvable::value("a", Value::Null);
        assert_eq!(lazy.policy(ResolvePolicy::Eager), ResolvePolicy::Eager);

        let eager = Resolvable::value("b", Value::Null).with_policy(ResolvePolicy::Eager);
        assert_eq!(eager.policy(ResolvePolicy::Lazy), ResolvePolicy::Eager);
    }

    #[test]
    fn failure_converts_from_strings() {
        let failure: ResolveFailure = "boom".into();
        assert_eq!(failure.to_string(), "boom");
    }

    #[test]
    fn resolvable_debug_hides_producer() {
        let resolvable = Resolvable::new("user", ["userId"], |_| async { Ok(Value::Null) });
        let debug = format!("{resolvable:?}");
        assert!(debug.contains("user"));
        assert!(debug.contains("userId"));
    }
}
