//! Per-process logging context
//!
//! Connectors never reach for a shared logger handle of their own. Each one is
//! handed a `ProcessContext` when it is built and prefixes its log lines with
//! it, so interleaved output from parallel processes stays attributable.

use owo_colors::OwoColorize;
use std::fmt;
use std::sync::Arc;

/// Identifies the process (and stage component) a log line belongs to
///
/// # Example
/// ```
/// use etlit::ProcessContext;
///
/// let ctx = ProcessContext::new("Item Ledger").component("d3businessobjects");
/// assert_eq!(ctx.process(), "Item Ledger");
/// assert_eq!(ctx.component_name(), Some("d3businessobjects"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessContext {
    process: Arc<str>,
    component: Option<Arc<str>>,
}

impl ProcessContext {
    pub fn new(process: impl AsRef<str>) -> Self {
        Self {
            process: Arc::from(process.as_ref()),
            component: None,
        }
    }

    /// Derive a context for one component of the same process
    pub fn component(&self, component: impl AsRef<str>) -> Self {
        Self {
            process: self.process.clone(),
            component: Some(Arc::from(component.as_ref())),
        }
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    pub fn component_name(&self) -> Option<&str> {
        self.component.as_deref()
    }
}

impl fmt::Display for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            Some(component) => write!(
                f,
                "[{}/{}]",
                self.process.cyan(),
                component.bright_black()
            ),
            None => write!(f, "[{}]", self.process.cyan()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_keeps_process() {
        let ctx = ProcessContext::new("orders");
        let csv = ctx.component("csv");

        assert_eq!(csv.process(), "orders");
        assert_eq!(csv.component_name(), Some("csv"));
        assert_eq!(ctx.component_name(), None);
    }

    #[test]
    fn test_display_contains_names() {
        let ctx = ProcessContext::new("orders").component("csv");
        let text = ctx.to_string();
        assert!(text.contains("orders"));
        assert!(text.contains("csv"));
    }
}
