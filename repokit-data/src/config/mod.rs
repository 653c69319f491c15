//! Configuration for the read layer and its data sources.
//!
//! Values come from a YAML document, flattened into dot-separated keys, and
//! can be overridden by `REPOKIT_*` environment variables
//! (`repokit.data.page.max_size` <-> `REPOKIT_DATA_PAGE_MAX_SIZE`).

mod loader;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

use crate::page::DEFAULT_PAGE_SIZE;

pub use value::{ConfigValue, FromConfigValue};

/// Only environment variables with this prefix take part in overrides.
pub const ENV_PREFIX: &str = "REPOKIT_";

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
    /// The value parsed but violates a constraint of its section.
    Invalid { key: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::Invalid { key, message } => {
                write!(f, "Invalid config value for '{key}': {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Raw key-value configuration.
///
/// Resolution order (lowest to highest priority):
/// 1. the YAML file
/// 2. `.env` file (loaded into the process environment, never overwriting)
/// 3. `REPOKIT_*` environment variables
#[derive(Debug, Clone, Default)]
pub struct RepoConfig {
    values: HashMap<String, ConfigValue>,
    env: HashMap<String, String>,
}

impl RepoConfig {
    /// Load `path` (if it exists), then overlay the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_file(path.as_ref(), &mut values)?;
        let _ = dotenvy::dotenv();
        Ok(RepoConfig {
            values,
            env: HashMap::new(),
        }
        .with_env(std::env::vars()))
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(RepoConfig {
            values,
            env: HashMap::new(),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Overlay environment variables; names without [`ENV_PREFIX`] are ignored.
    pub fn with_env(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env
            .extend(vars.into_iter().filter(|(name, _)| name.starts_with(ENV_PREFIX)));
        self
    }

    /// Get a typed value for the given dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the key does not exist, or
    /// `ConfigError::TypeMismatch` if the value cannot be converted.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        self.get_optional(key)?
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
    }

    /// Like [`get`](Self::get), but a missing key is `Ok(None)`.
    pub fn get_optional<V: FromConfigValue>(&self, key: &str) -> Result<Option<V>, ConfigError> {
        if let Some(raw) = self.env.get(&loader::env_key(key)) {
            return V::from_config_value(&ConfigValue::String(raw.clone()), key).map(Some);
        }
        self.values
            .get(key)
            .map(|value| V::from_config_value(value, key))
            .transpose()
    }

    /// Get a typed value, returning a default if the key is missing or malformed.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.env.contains_key(&loader::env_key(key)) || self.values.contains_key(key)
    }

    /// Build a typed section from this config.
    pub fn section<C: ConfigSection>(&self) -> Result<C, ConfigError> {
        C::from_config(self)
    }
}

/// Trait for strongly-typed configuration sections.
pub trait ConfigSection: Sized {
    /// The configuration key prefix (e.g., `"repokit.data"`).
    fn prefix() -> &'static str;

    fn from_config(config: &RepoConfig) -> Result<Self, ConfigError>;
}

/// Paging limits applied by [`ReadRepository`](crate::ReadRepository).
///
/// ```yaml
/// repokit:
///   data:
///     page:
///       default_size: 25
///       max_size: 200
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    /// Size of the page requests the repository builds for callers.
    pub default_page_size: i64,
    /// Upper bound on the size a caller may request.
    pub max_page_size: Option<u64>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
        }
    }
}

impl ConfigSection for DataConfig {
    fn prefix() -> &'static str {
        "repokit.data"
    }

    fn from_config(config: &RepoConfig) -> Result<Self, ConfigError> {
        let default_key = format!("{}.page.default_size", Self::prefix());
        let max_key = format!("{}.page.max_size", Self::prefix());
        let default_page_size = config
            .get_optional::<i64>(&default_key)?
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let max_page_size = config.get_optional::<Option<u64>>(&max_key)?.flatten();

        if default_page_size <= 0 {
            return Err(ConfigError::Invalid {
                key: default_key,
                message: format!("must be positive, got {default_page_size}"),
            });
        }
        if let Some(max) = max_page_size {
            if max == 0 || default_page_size as u64 > max {
                return Err(ConfigError::Invalid {
                    key: max_key,
                    message: format!("must be at least the default page size {default_page_size}"),
                });
            }
        }
        Ok(Self {
            default_page_size,
            max_page_size,
        })
    }
}
