use crate::error::SqlxErrorExt;
use crate::sql::SelectBuilder;
use futures_util::future::BoxFuture;
use futures_util::TryStreamExt;
use repokit_data::{
    DataError, DataSource, DeferredQuery, Direction, Entity, KeyValues, Predicate, Tracking,
    Value,
};
use sqlx::query::QueryAs;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{FromRow, Sqlite};
use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

/// An [`Entity`] that SQLx can decode from a SQLite row.
pub trait SqliteEntity: Entity + for<'r> FromRow<'r, SqliteRow> {}

impl<T> SqliteEntity for T where T: Entity + for<'r> FromRow<'r, SqliteRow> {}

type IncludeLoader<T> = Arc<
    dyn Fn(SqlitePool, Vec<T>) -> BoxFuture<'static, Result<Vec<T>, DataError>> + Send + Sync,
>;

/// A [`DataSource`] reading one table through an `sqlx::SqlitePool`.
///
/// Predicates are Rust closures, so they run in-process over streamed rows.
/// Everything else SQL can express is pushed into the statement: ordering
/// when every sort key reads a stored column (never a computed key from
/// [`OrderBy::by`](repokit_data::OrderBy::by)), `LIMIT`/`OFFSET` when no
/// in-process filtering is needed, `COUNT(*)` under the same condition, and
/// key equality for lookups.
///
/// Instance tracking does not apply: rows are decoded into owned values.
///
/// # Example
///
/// ```ignore
/// let source = SqliteDataSource::<User>::new(pool.clone())
///     .with_query_filter(|u: &User| !u.deleted)
///     .with_include("orders", load_orders);
/// let repo = ReadRepository::new(source);
/// ```
pub struct SqliteDataSource<T> {
    pool: SqlitePool,
    query_filters: Vec<Predicate<T>>,
    includes: HashMap<String, IncludeLoader<T>>,
}

impl<T: SqliteEntity> SqliteDataSource<T> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            query_filters: Vec::new(),
            includes: HashMap::new(),
        }
    }

    /// Get the underlying pool reference.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Add a filter applied to every resolved query unless the query opts out of
    /// query filters. Never applied to key lookups or raw queries.
    pub fn with_query_filter(mut self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.query_filters.push(Predicate::new(f));
        self
    }

    /// Register the batch loader behind an include hint.
    ///
    /// The loader receives the materialized page and must hand back the same
    /// entities, in the same order, with the related data attached.
    pub fn with_include<F, Fut>(mut self, hint: impl Into<String>, loader: F) -> Self
    where
        F: Fn(SqlitePool, Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, DataError>> + Send + 'static,
    {
        let loader: IncludeLoader<T> = Arc::new(
            move |pool: SqlitePool, items: Vec<T>| -> BoxFuture<'static, Result<Vec<T>, DataError>> {
                Box::pin(loader(pool, items))
            },
        );
        self.includes.insert(hint.into(), loader);
        self
    }

    fn needs_filtering(&self, query: &DeferredQuery<T>) -> bool {
        query.predicate().is_some()
            || (!query.ignores_query_filters() && !self.query_filters.is_empty())
    }

    fn visible(&self, query: &DeferredQuery<T>, row: &T) -> bool {
        (query.ignores_query_filters() || self.query_filters.iter().all(|f| f.matches(row)))
            && query.matches(row)
    }

    /// The effective order as `ORDER BY` keys, or `None` when some sort key
    /// is computed or not a stored column and rows must be ordered in-process.
    fn sql_order(query: &DeferredQuery<T>) -> Option<Vec<(&str, Direction)>> {
        let Some(order) = query.order() else {
            return Some(Vec::new());
        };
        order
            .keys()
            .iter()
            .map(|key| {
                let stored = T::columns().iter().any(|column| *column == key.column());
                (stored && !key.is_computed()).then(|| (key.column(), key.direction()))
            })
            .collect()
    }

    fn select(order: &[(&str, Direction)]) -> SelectBuilder {
        order
            .iter()
            .fold(SelectBuilder::new(T::table_name()), |builder, (column, direction)| {
                builder.order_by(column, *direction)
            })
    }

    async fn fetch_all(&self, builder: &SelectBuilder) -> Result<Vec<T>, DataError> {
        let (sql, params) = builder
            .build_select(T::columns())
            .map_err(DataError::data_source)?;
        tracing::trace!(entity = T::table_name(), %sql, "Fetching rows");
        bind_all(sqlx::query_as::<Sqlite, T>(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    /// Stream decoded rows into `visit` until it breaks or the rows run out.
    async fn stream<F>(&self, builder: &SelectBuilder, mut visit: F) -> Result<(), DataError>
    where
        F: FnMut(T) -> ControlFlow<()> + Send,
    {
        let (sql, params) = builder
            .build_select(T::columns())
            .map_err(DataError::data_source)?;
        tracing::trace!(entity = T::table_name(), %sql, "Streaming rows");
        let mut rows = bind_all(sqlx::query_as::<Sqlite, T>(&sql), &params).fetch(&self.pool);
        while let Some(row) = rows
            .try_next()
            .await
            .map_err(SqlxErrorExt::into_data_error)?
        {
            if visit(row).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Visit rows passing the query filters and predicate, in effective order.
    async fn scan_matching<F>(&self, query: &DeferredQuery<T>, mut visit: F) -> Result<(), DataError>
    where
        F: FnMut(T) -> ControlFlow<()> + Send,
    {
        if let Some(order) = Self::sql_order(query) {
            return self
                .stream(&Self::select(&order), |row| {
                    if self.visible(query, &row) {
                        visit(row)
                    } else {
                        ControlFlow::Continue(())
                    }
                })
                .await;
        }

        let mut matched = Vec::new();
        self.stream(&SelectBuilder::new(T::table_name()), |row| {
            if self.visible(query, &row) {
                matched.push(row);
            }
            ControlFlow::Continue(())
        })
        .await?;
        if let Some(order) = query.order() {
            matched.sort_by(|a, b| order.compare(a, b));
        }
        for row in matched {
            if visit(row).is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn finish(&self, query: &DeferredQuery<T>, mut items: Vec<T>) -> Result<Vec<T>, DataError> {
        for hint in query.include().iter() {
            let loader = self.includes.get(hint).cloned().ok_or_else(|| {
                DataError::data_source_msg(format!(
                    "no include loader `{hint}` registered for {}",
                    T::table_name()
                ))
            })?;
            let expected = items.len();
            items = loader(self.pool.clone(), items).await?;
            if items.len() != expected {
                return Err(DataError::data_source_msg(format!(
                    "include loader `{hint}` returned {} of {expected} entities",
                    items.len()
                )));
            }
        }
        if query.tracking() == Tracking::Enabled {
            tracing::trace!(entity = T::table_name(), "Tracking requested; rows are detached");
        }
        Ok(items)
    }
}

impl<T> Clone for SqliteDataSource<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            query_filters: self.query_filters.clone(),
            includes: self.includes.clone(),
        }
    }
}

fn bind_all<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &[Value],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<i64>),
            Value::Bool(b) => query.bind(*b),
            Value::Integer(i) => query.bind(*i),
            Value::Real(r) => query.bind(*r),
            Value::Text(s) => query.bind(s.clone()),
            Value::Blob(b) => query.bind(b.clone()),
        };
    }
    query
}

impl<T: SqliteEntity> DataSource<T> for SqliteDataSource<T> {
    async fn count(&self, query: &DeferredQuery<T>) -> Result<u64, DataError> {
        if !self.needs_filtering(query) {
            let (sql, _) = SelectBuilder::new(T::table_name())
                .build_count()
                .map_err(DataError::data_source)?;
            let count = sqlx::query_scalar::<Sqlite, i64>(&sql)
                .fetch_one(&self.pool)
                .await
                .map_err(SqlxErrorExt::into_data_error)?;
            return u64::try_from(count)
                .map_err(|_| DataError::data_source_msg(format!("negative row count {count}")));
        }

        let mut count = 0u64;
        self.stream(&SelectBuilder::new(T::table_name()), |row| {
            if self.visible(query, &row) {
                count += 1;
            }
            ControlFlow::Continue(())
        })
        .await?;
        Ok(count)
    }

    async fn slice(
        &self,
        query: &DeferredQuery<T>,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<Vec<T>, DataError> {
        let items = match Self::sql_order(query) {
            Some(order) if !self.needs_filtering(query) => {
                let mut builder = Self::select(&order);
                if offset > 0 {
                    builder = builder.offset(offset);
                }
                if let Some(limit) = limit {
                    builder = builder.limit(limit);
                }
                self.fetch_all(&builder).await?
            }
            _ if limit == Some(0) => Vec::new(),
            _ => {
                let mut items = Vec::new();
                let mut skipped = 0u64;
                self.scan_matching(query, |row| {
                    if skipped < offset {
                        skipped += 1;
                        return ControlFlow::Continue(());
                    }
                    items.push(row);
                    match limit {
                        Some(limit) if items.len() as u64 >= limit => ControlFlow::Break(()),
                        _ => ControlFlow::Continue(()),
                    }
                })
                .await?;
                items
            }
        };
        self.finish(query, items).await
    }

    async fn find_by_key(&self, key: &T::Key) -> Result<Option<T>, DataError> {
        let values = key.key_values();
        if values.len() != T::key_columns().len() {
            return Err(DataError::invalid_argument(format!(
                "{} has {} key column(s), got {} key value(s)",
                T::table_name(),
                T::key_columns().len(),
                values.len()
            )));
        }
        let builder = T::key_columns()
            .iter()
            .zip(values)
            .fold(SelectBuilder::new(T::table_name()), |builder, (column, value)| {
                builder.where_eq(column, value)
            })
            .limit(1);
        Ok(self.fetch_all(&builder).await?.into_iter().next())
    }

    async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, DataError> {
        tracing::trace!(entity = T::table_name(), sql, params = params.len(), "Executing raw query");
        bind_all(sqlx::query_as::<Sqlite, T>(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn scan<F>(&self, query: &DeferredQuery<T>, mut visit: F) -> Result<(), DataError>
    where
        F: FnMut(&T) -> ControlFlow<()> + Send,
    {
        self.scan_matching(query, move |row| visit(&row)).await
    }
}
