//! Caller-owned map of backend names to factories.

use crate::backend::BackendFactory;
use crate::error::ConnectionError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registry of backend factories, keyed by backend name.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every backend compiled into this crate.
    pub fn with_builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "sqlite")]
        registry.register(
            crate::backend::sqlite::BACKEND_NAME,
            Arc::new(crate::backend::sqlite::SqliteBackendFactory),
        );
        registry
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, factory: Arc<dyn BackendFactory>) {
        self.factories.insert(name.to_string(), factory);
    }

    /// Look up the factory for `name`.
    ///
    /// # Errors
    /// Returns `ConnectionError::UnknownBackend` if nothing is registered
    /// under that name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn BackendFactory>, ConnectionError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| ConnectionError::UnknownBackend {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
