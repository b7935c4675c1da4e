//! Weave-time configuration
//!
//! The Weaver Context carries a keyed store of caller-defined settings. Keys
//! are typed so a lookup can never be cast to the wrong value type.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed key into a [`ConfigStore`]
pub struct ConfigKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ConfigKey<T> {
    /// Create a key; the name must be unique across the process
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ConfigKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ConfigKey<T> {}

impl<T> fmt::Debug for ConfigKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigKey").field(&self.name).finish()
    }
}

/// Keyed store of arbitrary settings
#[derive(Clone, Default)]
pub struct ConfigStore {
    entries: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one under the same key
    pub fn set<T: Any + Send + Sync>(&mut self, key: ConfigKey<T>, value: T) {
        self.entries.insert(key.name, Arc::new(value));
    }

    /// Get a value if present and of the key's type
    pub fn get<T: Any + Send + Sync>(&self, key: ConfigKey<T>) -> Option<&T> {
        self.entries
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Get a value or the type's default
    pub fn get_or_default<T: Any + Send + Sync + Clone + Default>(&self, key: ConfigKey<T>) -> T {
        self.get(key).cloned().unwrap_or_default()
    }

    pub fn contains<T>(&self, key: ConfigKey<T>) -> bool {
        self.entries.contains_key(key.name)
    }

    pub fn remove<T>(&mut self, key: ConfigKey<T>) -> bool {
        self.entries.remove(key.name).is_some()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Key of the built-in schema settings
pub const CORE_SCHEMA_CONFIG: ConfigKey<CoreSchemaConfig> = ConfigKey::new("loom.core.schema");

type NameHook = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Built-in schema settings
#[derive(Clone)]
pub struct CoreSchemaConfig {
    /// Name of the query root
    pub query_name: String,
    /// Name of the mutation root
    pub mutation_name: String,
    /// Name of the subscription root
    pub subscription_name: String,
    input_object_name: NameHook,
}

impl CoreSchemaConfig {
    /// Override how input objects derived from output types are named
    pub fn input_object_name<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.input_object_name = Arc::new(hook);
        self
    }

    /// Set the root type names
    pub fn root_names(
        mut self,
        query: impl Into<String>,
        mutation: impl Into<String>,
        subscription: impl Into<String>,
    ) -> Self {
        self.query_name = query.into();
        self.mutation_name = mutation.into();
        self.subscription_name = subscription.into();
        self
    }

    /// Name of the input object derived from an output type name
    pub fn input_name_for(&self, name: &str) -> String {
        (self.input_object_name)(name)
    }

    /// Whether a name is one of the three root names
    pub fn is_root_name(&self, name: &str) -> bool {
        name == self.query_name || name == self.mutation_name || name == self.subscription_name
    }
}

impl Default for CoreSchemaConfig {
    fn default() -> Self {
        Self {
            query_name: "Query".to_string(),
            mutation_name: "Mutation".to_string(),
            subscription_name: "Subscription".to_string(),
            input_object_name: Arc::new(default_input_name),
        }
    }
}

impl fmt::Debug for CoreSchemaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreSchemaConfig")
            .field("query_name", &self.query_name)
            .field("mutation_name", &self.mutation_name)
            .field("subscription_name", &self.subscription_name)
            .finish_non_exhaustive()
    }
}

fn default_input_name(name: &str) -> String {
    if name.ends_with("Input") {
        name.to_string()
    } else {
        format!("{name}Input")
    }
}
