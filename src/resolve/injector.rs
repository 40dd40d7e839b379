//! Global services made available to every resolve producer.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Service = Arc<dyn Any + Send + Sync>;

/// Name-keyed registry of shared services.
///
/// Cloning is cheap; clones share the same services.
#[derive(Clone, Default)]
pub struct Injector {
    services: Arc<RwLock<HashMap<String, Service>>>,
}

impl Injector {
    /// An empty injector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a service.
    pub fn provide<T: Any + Send + Sync>(&self, name: impl Into<String>, service: T) {
        self.services.write().insert(name.into(), Arc::new(service));
    }

    /// Fetch a service by name and type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let service = self.services.read().get(name).cloned()?;
        service.downcast::<T>().ok()
    }

    /// True if a service is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.services.read().contains_key(name)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("Injector").field("services", &names).finish()
    }
}
