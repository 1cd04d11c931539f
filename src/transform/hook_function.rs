//! Hook function transformer (`type: hookfunction`)

use super::HookRegistry;
use crate::envelope::Envelope;
use crate::error::EtlError;
use crate::etl::Transformer;
use crate::process_context::ProcessContext;
use crate::storage::DebugSnapshots;
use eyre::Result;
use owo_colors::OwoColorize;
use serde::Deserialize;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;

/// Settings of a `hookfunction` transformation
#[derive(Debug, Clone, Deserialize)]
pub struct HookConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub function_name: Option<String>,
    /// Accepted for compatibility with older configurations; hooks are
    /// resolved from the registry by `function_name` only
    #[serde(default)]
    pub hook_file: Option<String>,
    #[serde(default = "default_hook_config")]
    pub config: Value,
    #[serde(default)]
    pub debug: bool,
}

fn default_name() -> String {
    "HookFunction".to_string()
}

fn default_hook_config() -> Value {
    Value::Object(Default::default())
}

/// Transformer that runs a registered hook over the envelope
///
/// Errors and panics raised by the hook are both reported as errors, which
/// makes the pipeline pass the original envelope on.
pub struct HookTransformer {
    ctx: ProcessContext,
    config: HookConfig,
    registry: Arc<HookRegistry>,
    hook: Option<Arc<super::HookFn>>,
    snapshots: DebugSnapshots,
}

impl HookTransformer {
    pub fn new(
        ctx: ProcessContext,
        config: HookConfig,
        registry: Arc<HookRegistry>,
        debug_dir: &Path,
    ) -> Self {
        let snapshots = DebugSnapshots::new(debug_dir, &config.name, config.debug);
        Self {
            ctx,
            config,
            registry,
            hook: None,
            snapshots,
        }
    }
}

impl Transformer for HookTransformer {
    fn setup(&mut self) -> Result<bool> {
        let Some(function_name) = self.config.function_name.as_deref() else {
            log::error!("{} No function_name configured", self.ctx);
            return Ok(false);
        };
        if let Some(hook_file) = &self.config.hook_file {
            log::debug!(
                "{} Ignoring hook_file '{}', hooks come from the registry",
                self.ctx,
                hook_file
            );
        }

        match self.registry.get(function_name) {
            Some(hook) => {
                log::debug!("{} Resolved hook {}", self.ctx, function_name.cyan());
                self.hook = Some(hook);
                Ok(true)
            }
            None => {
                log::error!(
                    "{} {} (available: {})",
                    self.ctx,
                    EtlError::UnknownHook(function_name.to_string()),
                    self.registry.names().join(", ")
                );
                Ok(false)
            }
        }
    }

    fn transform(&self, input: &Envelope) -> Result<Envelope> {
        let Some(hook) = &self.hook else {
            eyre::bail!("hook transformer used before setup");
        };

        let output = match catch_unwind(AssertUnwindSafe(|| hook(input, &self.config.config))) {
            Ok(result) => result?,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                eyre::bail!("hook panicked: {}", message);
            }
        };

        self.snapshots.record("debug_data_transform", &output);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transformer(config: Value, registry: HookRegistry) -> HookTransformer {
        let config: HookConfig = serde_json::from_value(config).unwrap();
        HookTransformer::new(
            ProcessContext::new("test").component("hookfunction"),
            config,
            Arc::new(registry),
            Path::new("debug"),
        )
    }

    fn input() -> Envelope {
        Envelope::from_values(vec![json!({"id": "1", "name": "O'Brien"})]).unwrap()
    }

    #[test]
    fn test_runs_builtin_hook() {
        let mut hook = transformer(
            json!({"function_name": "strip_characters", "config": {"characters": "'"}}),
            HookRegistry::with_builtins(),
        );
        assert!(hook.setup().unwrap());

        let output = hook.transform(&input()).unwrap();
        assert_eq!(output.items[0]["name"], "OBrien");
    }

    #[test]
    fn test_setup_without_function_name() {
        let mut hook = transformer(json!({"name": "x"}), HookRegistry::with_builtins());
        assert!(!hook.setup().unwrap());
    }

    #[test]
    fn test_setup_unknown_hook() {
        let mut hook = transformer(
            json!({"function_name": "does_not_exist"}),
            HookRegistry::with_builtins(),
        );
        assert!(!hook.setup().unwrap());
    }

    #[test]
    fn test_hook_error_is_reported() {
        let mut registry = HookRegistry::new();
        registry.register("broken", |_: &Envelope, _: &Value| eyre::bail!("nope"));
        let mut hook = transformer(json!({"function_name": "broken"}), registry);
        assert!(hook.setup().unwrap());

        let err = hook.transform(&input()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_hook_panic_is_reported() {
        let mut registry = HookRegistry::new();
        registry.register("panics", |_: &Envelope, _: &Value| -> Result<Envelope> {
            panic!("boom")
        });
        let mut hook = transformer(json!({"function_name": "panics"}), registry);
        assert!(hook.setup().unwrap());

        let err = hook.transform(&input()).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_hook_receives_config() {
        let mut registry = HookRegistry::new();
        registry.register("echo", |_: &Envelope, config: &Value| {
            Envelope::from_values(vec![config.clone()])
        });
        let mut hook = transformer(
            json!({"function_name": "echo", "hook_file": "hooks/echo.py", "config": {"k": "v"}}),
            registry,
        );
        assert!(hook.setup().unwrap());

        let output = hook.transform(&Envelope::empty()).unwrap();
        assert_eq!(output.items[0]["k"], "v");
    }

    #[test]
    fn test_transform_before_setup() {
        let hook = transformer(
            json!({"function_name": "set_fields"}),
            HookRegistry::with_builtins(),
        );
        assert!(hook.transform(&input()).is_err());
    }
}
