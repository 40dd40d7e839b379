//! Predicate guards over states.
//!
//! Guards are pure boolean functions evaluated against a registered
//! [`State`]. Hook match criteria use them for anything a name can't express.

use super::state::State;
use std::fmt;
use std::sync::Arc;

/// Pure predicate over a [`State`].
///
/// # Example
///
/// ```rust
/// use wayfinder::core::Guard;
///
/// // Only states that carry `requiresAuth` in their data
/// let needs_auth = Guard::new(|state| state.data()["requiresAuth"] == true);
/// # let _ = needs_auth;
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<dyn Fn(&State) -> bool + Send + Sync>,
}

impl Guard {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&State) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the guard against a state.
    pub fn check(&self, state: &State) -> bool {
        (self.predicate)(state)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
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
            .register(StateBuilder::new("admin").data(json!({ "requiresAuth": true })).build())
            .unwrap();
        registry
            .register(StateBuilder::new("admin.users").build())
            .unwrap();
        registry.register(StateBuilder::new("public").build()).unwrap();
        registry
    }

    #[test]
    fn guard_reads_state_data() {
        let registry = registry();
        let guard = Guard::new(|s: &State| s.data()["requiresAuth"] == true);

        assert!(guard.check(&registry.get("admin").unwrap()));
        assert!(!guard.check(&registry.get("public").unwrap()));
    }

    #[test]
    fn guard_sees_inherited_data() {
        let registry = registry();
        let guard = Guard::new(|s: &State| s.data()["requiresAuth"] == true);

        assert!(guard.check(&registry.get("admin.users").unwrap()));
    }

    #[test]
    fn guard_is_deterministic() {
        let registry = registry();
        let state = registry.get("admin.users").unwrap();
        let guard = Guard::new(|s: &State| s.includes("admin"));

        assert_eq!(guard.check(&state), guard.check(&state));
    }
}
