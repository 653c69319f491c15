use crate::error::SqlxErrorExt;
use repokit_data::{ConfigError, ConfigSection, DataError, RepoConfig};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connection settings for a SQLite pool.
///
/// ```yaml
/// repokit:
///   sqlite:
///     url: "sqlite://app.db"
///     max_connections: 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub url: String,
    pub max_connections: u32,
}

impl SqliteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Open a pool with these settings.
    pub async fn connect(&self) -> Result<SqlitePool, DataError> {
        tracing::info!(url = %self.url, max_connections = self.max_connections, "Connecting to SQLite");
        SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.url)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }
}

impl ConfigSection for SqliteConfig {
    fn prefix() -> &'static str {
        "repokit.sqlite"
    }

    fn from_config(config: &RepoConfig) -> Result<Self, ConfigError> {
        let url = config.get::<String>(&format!("{}.url", Self::prefix()))?;
        let max_key = format!("{}.max_connections", Self::prefix());
        let max_connections = config
            .get_optional::<u32>(&max_key)?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: max_key,
                message: "must be at least 1".into(),
            });
        }
        Ok(Self {
            url,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml() {
        let config = RepoConfig::from_yaml_str(
            "repokit:\n  sqlite:\n    url: \"sqlite::memory:\"\n    max_connections: 2\n",
        )
        .unwrap();
        let sqlite: SqliteConfig = config.section().unwrap();
        assert_eq!(sqlite.url, "sqlite::memory:");
        assert_eq!(sqlite.max_connections, 2);
    }

    #[test]
    fn test_defaults_and_errors() {
        let config =
            RepoConfig::from_yaml_str("repokit:\n  sqlite:\n    url: \"sqlite://app.db\"\n").unwrap();
        let sqlite: SqliteConfig = config.section().unwrap();
        assert_eq!(sqlite, SqliteConfig::new("sqlite://app.db"));

        let missing = RepoConfig::empty().section::<SqliteConfig>().unwrap_err();
        assert!(matches!(missing, ConfigError::NotFound(_)));

        let zero = RepoConfig::from_yaml_str(
            "repokit:\n  sqlite:\n    url: \"sqlite::memory:\"\n    max_connections: 0\n",
        )
        .unwrap();
        assert!(matches!(
            zero.section::<SqliteConfig>(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_env_overrides_yaml() {
        let config = RepoConfig::from_yaml_str("repokit:\n  sqlite:\n    url: \"sqlite://a.db\"\n")
            .unwrap()
            .with_env([("REPOKIT_SQLITE_URL".to_string(), "sqlite://b.db".to_string())]);
        let sqlite: SqliteConfig = config.section().unwrap();
        assert_eq!(sqlite.url, "sqlite://b.db");
    }
}
