//! Runtime configuration.
//!
//! # Load Order
//!
//! 1. Default values
//! 2. TOML file (optional; a missing file keeps the defaults)
//! 3. Environment variables (`SWITCHBOARD_*`)
//!
//! ```toml
//! memory_limit_bytes = 67108864
//! interrupt_check_instructions = 1000
//! worker_threads = 16
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const ENV_MEMORY_LIMIT_BYTES: &str = "SWITCHBOARD_MEMORY_LIMIT_BYTES";
pub const ENV_INTERRUPT_CHECK_INSTRUCTIONS: &str = "SWITCHBOARD_INTERRUPT_CHECK_INSTRUCTIONS";
pub const ENV_WORKER_THREADS: &str = "SWITCHBOARD_WORKER_THREADS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },
}

impl ConfigError {
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Settings for the hosted runtime and the process hosting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// VM memory cap in bytes. `None` leaves the VM unbounded.
    pub memory_limit_bytes: Option<usize>,

    /// How often (in VM instructions) a pending interrupt is checked.
    /// Zero disables interrupts.
    pub interrupt_check_instructions: u32,

    /// Worker threads of the async runtime driving dispatch.
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: None,
            interrupt_check_instructions: 1000,
            worker_threads: 16,
        }
    }
}

macro_rules! parse_env_number {
    ($lookup:expr, $field:expr, $var:expr) => {
        if let Some(val) = $lookup($var) {
            $field = val
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env_var($var, format!("expected a number, got '{val}'")))?;
        }
    };
}

impl RuntimeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Loads `path` (if it exists) and applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path.as_ref())?.unwrap_or_default();
        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(config))
    }

    /// Applies `SWITCHBOARD_*` overrides read through `lookup`.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup(ENV_MEMORY_LIMIT_BYTES) {
            let val = val.trim();
            self.memory_limit_bytes = if val.is_empty() {
                None
            } else {
                Some(val.parse().map_err(|_| {
                    ConfigError::invalid_env_var(
                        ENV_MEMORY_LIMIT_BYTES,
                        format!("expected a number, got '{val}'"),
                    )
                })?)
            };
        }
        parse_env_number!(
            lookup,
            self.interrupt_check_instructions,
            ENV_INTERRUPT_CHECK_INSTRUCTIONS
        );
        parse_env_number!(lookup, self.worker_threads, ENV_WORKER_THREADS);

        if self.worker_threads == 0 {
            return Err(ConfigError::invalid_env_var(
                ENV_WORKER_THREADS,
                "worker_threads must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::load_file(&dir.path().join("absent.toml"))
            .unwrap()
            .unwrap_or_default();
        config.apply_env_with(env(&[])).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn file_values_then_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "memory_limit_bytes = 1048576\nworker_threads = 4").unwrap();

        let mut config = RuntimeConfig::load_file(file.path()).unwrap().unwrap();
        assert_eq!(config.memory_limit_bytes, Some(1_048_576));
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.interrupt_check_instructions, 1000);

        config
            .apply_env_with(env(&[(ENV_WORKER_THREADS, "2"), (ENV_MEMORY_LIMIT_BYTES, "")]))
            .unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.memory_limit_bytes, None);
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut config = RuntimeConfig::default();
        let err = config
            .apply_env_with(env(&[(ENV_INTERRUPT_CHECK_INSTRUCTIONS, "often")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvVar { ref name, .. } if name == ENV_INTERRUPT_CHECK_INSTRUCTIONS
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threads = 4").unwrap();
        assert!(matches!(
            RuntimeConfig::load_file(file.path()),
            Err(ConfigError::ParseToml { .. })
        ));
    }
}
