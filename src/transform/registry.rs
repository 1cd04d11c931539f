//! Named transformation hooks
//!
//! Hooks are plain Rust callables registered by name at startup. A process
//! selects one through its transformation's `function_name` and passes it a
//! free-form `config` block.

use super::{CharacterStripper, FieldDropper, FieldSetter};
use crate::envelope::Envelope;
use eyre::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Signature of a transformation hook: `(envelope, config) -> envelope`
pub type HookFn = dyn Fn(&Envelope, &Value) -> Result<Envelope> + Send + Sync;

/// Registry mapping hook names to callables
///
/// # Example
/// ```
/// use etlit::transform::HookRegistry;
/// use etlit::Envelope;
///
/// let mut hooks = HookRegistry::with_builtins();
/// hooks.register("passthrough", |envelope: &Envelope, _config| Ok(envelope.clone()));
///
/// assert!(hooks.contains("passthrough"));
/// assert!(hooks.contains("set_fields"));
/// ```
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Arc<HookFn>>,
}

impl HookRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in hooks:
    /// `set_fields`, `strip_characters` and `drop_fields`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("set_fields", |envelope: &Envelope, config: &Value| {
            Ok(FieldSetter::from_config(config)?.apply(envelope))
        });
        registry.register("strip_characters", |envelope: &Envelope, config: &Value| {
            Ok(CharacterStripper::from_config(config)?.apply(envelope))
        });
        registry.register("drop_fields", |envelope: &Envelope, config: &Value| {
            Ok(FieldDropper::from_config(config)?.apply(envelope))
        });
        registry
    }

    /// Register a hook, replacing any hook with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&Envelope, &Value) -> Result<Envelope> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
    }

    pub fn get(&self, name: &str) -> Option<Arc<HookFn>> {
        self.hooks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Registered hook names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.names())
            .finish()
    }
}
