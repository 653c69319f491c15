//! # repokit-data: generic read-access layer
//!
//! Compose a filter, an ordering rule, eager-load hints and a tracking mode
//! into one deferred query, then materialize it as a full enumeration, a
//! single entity, a scalar aggregate, or a page with pagination metadata.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`QuerySpec`] | Immutable predicate / order / include / tracking bundle |
//! | [`DataSource`] | Storage contract: count, slice, find, raw, scan |
//! | [`QueryExecutor`] | Resolves specs and runs cancellable round trips |
//! | [`Paginator`] | Counts, slices, and builds a [`PageResult`] |
//! | [`AggregateEvaluator`] | count, exists, sum, average, min, max |
//! | [`RawQueryAdapter`] | Positional-parameter raw queries |
//! | [`ReadRepository`] | Async facade over all of the above |
//! | [`BlockingReadRepository`] | The same operations, synchronously |
//! | [`MemoryDataSource`] | In-process source for tests and embedding |
//!
//! Storage backends live in their own crates (e.g. `repokit-data-sqlx`).

pub mod aggregate;
pub mod blocking;
pub mod config;
pub mod entity;
pub mod error;
pub mod executor;
pub mod memory;
pub mod page;
pub mod raw;
pub mod repository;
pub mod source;
pub mod spec;
pub mod value;

pub use aggregate::{AggregateEvaluator, AggregateRequest, Numeric, Selector};
pub use blocking::BlockingReadRepository;
pub use config::{ConfigError, ConfigSection, DataConfig, RepoConfig};
pub use entity::Entity;
pub use error::{DataError, DataResult};
pub use executor::QueryExecutor;
pub use memory::MemoryDataSource;
pub use page::{PageRequest, PageResult, PageWindow, Paginator};
pub use raw::RawQueryAdapter;
pub use repository::ReadRepository;
pub use source::{DataSource, DeferredQuery, OrderPolicy};
pub use spec::{Direction, Include, OrderBy, Predicate, QuerySpec, SortKey, Tracking};
pub use value::{KeyValues, Value};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        AggregateRequest, DataError, DataSource, Entity, OrderBy, PageRequest, PageResult,
        Predicate, QuerySpec, ReadRepository, Tracking, Value,
    };
}
