use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits applied to every script evaluation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScriptConfig {
    /// Maximum number of operations a single run may perform
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    /// Maximum depth of nested function calls
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,

    /// Maximum nesting of expressions in the script source
    #[serde(default = "default_max_expr_depth")]
    pub max_expr_depth: usize,

    /// Maximum length of a string value, in bytes
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,

    /// Maximum number of elements in an array or blob
    #[serde(default = "default_max_array_size")]
    pub max_array_size: usize,

    /// Maximum number of properties in a map
    #[serde(default = "default_max_map_size")]
    pub max_map_size: usize,

    /// Wall-clock limit for a single run in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_operations() -> u64 {
    1_000_000
}

fn default_max_call_levels() -> usize {
    32
}

fn default_max_expr_depth() -> usize {
    64
}

fn default_max_string_size() -> usize {
    64 * 1024
}

fn default_max_array_size() -> usize {
    4096
}

fn default_max_map_size() -> usize {
    1024
}

fn default_timeout_ms() -> u64 {
    100
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_expr_depth: default_max_expr_depth(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_array_size(),
            max_map_size: default_max_map_size(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ScriptConfig {
    /// Load from `PAYLOAD_FORMATTER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("PAYLOAD_FORMATTER"))
            .build()?
            .try_deserialize()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::remove_var("PAYLOAD_FORMATTER_MAX_OPERATIONS");
            std::env::remove_var("PAYLOAD_FORMATTER_TIMEOUT_MS");
        }

        let config = ScriptConfig::from_env().unwrap();
        assert_eq!(config, ScriptConfig::default());
        assert_eq!(config.timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_config_from_env() {
        let _lock = TEST_LOCK.lock().unwrap();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("PAYLOAD_FORMATTER_MAX_OPERATIONS", "5000");
            std::env::set_var("PAYLOAD_FORMATTER_TIMEOUT_MS", "250");
        }

        let config = ScriptConfig::from_env().unwrap();
        assert_eq!(config.max_operations, 5000);
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.max_call_levels, 32);

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::remove_var("PAYLOAD_FORMATTER_MAX_OPERATIONS");
            std::env::remove_var("PAYLOAD_FORMATTER_TIMEOUT_MS");
        }
    }
}
