//! `${VAR}` expansion for configuration values
//!
//! Secrets such as API keys and client credentials live in the environment
//! (usually sourced from a `.env` file) and are referenced from the
//! configuration file by name. Expansion runs on the parsed document and
//! only touches string values, so a secret is taken literally whatever
//! characters it contains.

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("environment reference pattern is valid")
});

/// Replace every `${VAR}` with the value of the environment variable `VAR`
///
/// Unset variables expand to the empty string and are logged, so a process
/// that references a missing secret fails at its own setup instead of
/// preventing the whole configuration from loading.
///
/// # Example
/// ```
/// use etlit::config::expand_env_vars;
///
/// // SAFETY: single-threaded doctest
/// unsafe { std::env::set_var("ETLIT_DOC_HOST", "db.local") };
/// assert_eq!(expand_env_vars("tcp:${ETLIT_DOC_HOST},1433"), "tcp:db.local,1433");
/// ```
pub fn expand_env_vars(content: &str) -> String {
    ENV_REFERENCE
        .replace_all(content, |caps: &Captures| {
            let name = &caps[1];
            match std::env::var(name) {
                Ok(value) => value,
                Err(_) => {
                    log::warn!("Environment variable {} is not set, using empty value", name);
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Expand `${VAR}` references in every string value of a document
///
/// Object keys, numbers and booleans are left as they are.
pub fn expand_env_in_value(value: &mut Value) {
    match value {
        Value::String(text) if text.contains("${") => *text = expand_env_vars(text),
        Value::Array(items) => items.iter_mut().for_each(expand_env_in_value),
        Value::Object(fields) => fields.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expands_nested_string_values_only() {
        unsafe { std::env::set_var("ETLIT_TEST_NESTED", "a: b # c") };

        let mut value = json!({
            "${ETLIT_TEST_NESTED}": 1,
            "list": ["${ETLIT_TEST_NESTED}", 2, true],
            "inner": {"secret": "pre-${ETLIT_TEST_NESTED}"}
        });
        expand_env_in_value(&mut value);
        assert_eq!(
            value,
            json!({
                "${ETLIT_TEST_NESTED}": 1,
                "list": ["a: b # c", 2, true],
                "inner": {"secret": "pre-a: b # c"}
            })
        );

        unsafe { std::env::remove_var("ETLIT_TEST_NESTED") };
    }

    #[test]
    #[serial]
    fn test_expands_set_variables() {
        unsafe {
            std::env::set_var("ETLIT_TEST_URL", "https://api.example.com");
            std::env::set_var("ETLIT_TEST_KEY", "s3cret");
        }

        let text = "base_url: ${ETLIT_TEST_URL}\napi_key: \"${ETLIT_TEST_KEY}\"";
        assert_eq!(
            expand_env_vars(text),
            "base_url: https://api.example.com\napi_key: \"s3cret\""
        );

        unsafe {
            std::env::remove_var("ETLIT_TEST_URL");
            std::env::remove_var("ETLIT_TEST_KEY");
        }
    }

    #[test]
    #[serial]
    fn test_unset_variable_expands_empty() {
        unsafe { std::env::remove_var("ETLIT_TEST_UNSET") };
        assert_eq!(expand_env_vars("key: '${ETLIT_TEST_UNSET}'"), "key: ''");
    }

    #[test]
    fn test_leaves_other_dollar_text_alone() {
        let text = "$filter: systemModifiedAt gt 2025-01-01 and $batch";
        assert_eq!(expand_env_vars(text), text);
    }
}
