//! # repokit-data-sqlx: SQLite data source for repokit-data
//!
//! Plugs a [SQLx](https://github.com/launchbadge/sqlx) SQLite pool into the
//! generic read layer of [`repokit-data`](repokit_data).
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqliteDataSource`] | `DataSource` over one table, with query filters and include loaders |
//! | [`SqliteConfig`] | `repokit.sqlite.*` config section; opens the pool |
//! | [`SelectBuilder`] | SELECT/COUNT text with validated, quoted identifiers |
//! | [`SqlxErrorExt`] | Converts `sqlx::Error` into `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//!
//! # Quick start
//!
//! ```ignore
//! use repokit_data::{PageRequest, QuerySpec, ReadRepository, RepoConfig};
//! use repokit_data_sqlx::{SqliteConfig, SqliteDataSource};
//!
//! #[derive(sqlx::FromRow, Clone)]
//! struct User { id: i64, name: String, active: bool }
//!
//! let config = RepoConfig::load("application.yaml")?;
//! let pool = config.section::<SqliteConfig>()?.connect().await?;
//! let repo = ReadRepository::new(SqliteDataSource::<User>::new(pool));
//!
//! let page = repo
//!     .get_paged_list(QuerySpec::new().filter(|u: &User| u.active), PageRequest::new(0, 20))
//!     .await?;
//! ```
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead:
//!
//! ```ignore
//! use repokit_data_sqlx::SqlxErrorExt;
//!
//! let rows = sqlx::query("DELETE FROM sessions")
//!     .execute(&pool)
//!     .await
//!     .map_err(|e| e.into_data_error())?;
//! ```

pub mod config;
pub mod error;
pub mod source;
pub mod sql;

pub use config::SqliteConfig;
pub use error::{SqlxErrorExt, SqlxResult};
pub use source::{SqliteDataSource, SqliteEntity};
pub use sql::{QueryError, SelectBuilder};

/// Re-exports of the most commonly used types from both `repokit-data` and this crate.
pub mod prelude {
    pub use crate::{SqliteConfig, SqliteDataSource, SqlxErrorExt};
    pub use repokit_data::prelude::*;
}
