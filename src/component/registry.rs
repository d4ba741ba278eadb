//! String-keyed component factories.
//!
//! Concrete variants are registered once at startup with an explicit
//! [`BuilderRegistry::register_builder`] call; the registry is then passed
//! to whatever needs to build components (signal handlers reach it through
//! [`SignalContext`](crate::signal::SignalContext)). There is no global
//! instance.

use std::sync::Arc;

use indexmap::IndexMap;

use super::Component;
use crate::error::{Error, Result};

/// Factory building a fresh component with the given instance name.
pub type Builder = Arc<dyn Fn(&str) -> Component + Send + Sync>;

/// Map from concrete type name to factory.
#[derive(Clone, Default)]
pub struct BuilderRegistry {
    builders: IndexMap<String, Builder>,
}

impl std::fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl BuilderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `type_name`.
    ///
    /// A second registration for the same type is logged and ignored;
    /// returns `false` in that case.
    pub fn register_builder<F>(&mut self, type_name: &str, factory: F) -> bool
    where
        F: Fn(&str) -> Component + Send + Sync + 'static,
    {
        if self.builders.contains_key(type_name) {
            log::warn!("Builder for [{}] already registered, ignoring", type_name);
            return false;
        }
        self.builders.insert(type_name.to_string(), Arc::new(factory));
        log::debug!("Registered builder [{}]", type_name);
        true
    }

    /// Remove the factory for `type_name`. Returns `false` if none existed.
    pub fn unregister(&mut self, type_name: &str) -> bool {
        if self.builders.shift_remove(type_name).is_none() {
            log::warn!("No builder registered for [{}], nothing to remove", type_name);
            return false;
        }
        true
    }

    /// Returns `true` if `type_name` has a factory.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.builders.contains_key(type_name)
    }

    /// Registered type names in registration order.
    pub fn type_names(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    /// Build a detached component of type `type_name` named `instance_name`.
    pub fn create(&self, type_name: &str, instance_name: &str) -> Result<Component> {
        let builder = self
            .builders
            .get(type_name)
            .ok_or_else(|| Error::TypeNotFound(type_name.to_string()))?;
        let mut component = builder(instance_name);
        if component.type_name() != type_name {
            log::debug!(
                "Builder [{}] produced type [{}], retagging",
                type_name,
                component.type_name()
            );
            component.set_type_name(type_name);
        }
        Ok(component)
    }
}
