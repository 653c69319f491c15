use crate::aggregate::{AggregateEvaluator, AggregateRequest, Numeric};
use crate::config::DataConfig;
use crate::entity::Entity;
use crate::error::DataError;
use crate::executor::QueryExecutor;
use crate::page::{PageRequest, PageResult, Paginator};
use crate::raw::RawQueryAdapter;
use crate::source::{DataSource, OrderPolicy};
use crate::spec::{Predicate, QuerySpec};
use crate::value::{KeyValues, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Generic async read repository over any [`DataSource`].
///
/// Every operation is stateless: it composes the caller's parameters into a
/// deferred query, runs it, and returns an owned result. Clones share the
/// underlying source.
///
/// # Example
///
/// ```ignore
/// let repo = ReadRepository::new(MemoryDataSource::from_rows(users));
/// let page = repo
///     .get_paged_list(
///         QuerySpec::new().filter(|u: &User| u.active),
///         PageRequest::new(0, 10),
///     )
///     .await?;
/// ```
pub struct ReadRepository<T, S> {
    source: Arc<S>,
    config: DataConfig,
    cancel: Option<CancellationToken>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity, S: DataSource<T>> ReadRepository<T, S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, DataConfig::default())
    }

    pub fn with_config(source: S, config: DataConfig) -> Self {
        Self {
            source: Arc::new(source),
            config,
            cancel: None,
            _marker: PhantomData,
        }
    }

    /// A repository sharing this one's source whose operations abort with
    /// [`DataError::Cancelled`] once `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    /// Get the underlying data source.
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// A request for page `index` using the configured default size.
    pub fn page_request(&self, index: i64) -> PageRequest {
        PageRequest::new(index, self.config.default_page_size)
    }

    fn executor(&self) -> QueryExecutor<'_, T, S> {
        QueryExecutor::new(self.source.as_ref()).with_cancellation(self.cancel.as_ref())
    }

    fn filtered(predicate: Option<Predicate<T>>) -> QuerySpec<T> {
        predicate.map(QuerySpec::from).unwrap_or_default()
    }

    /// Whether any record matches. Reads at most one record.
    pub async fn exists(&self, predicate: Option<Predicate<T>>) -> Result<bool, DataError> {
        let executor = self.executor();
        let query = executor.resolve(&Self::filtered(predicate), OrderPolicy::AsRequested);
        AggregateEvaluator::new(&executor).exists(&query).await
    }

    pub async fn count(&self, predicate: Option<Predicate<T>>) -> Result<usize, DataError> {
        let count = self.long_count(predicate).await?;
        usize::try_from(count)
            .map_err(|_| DataError::data_source_msg(format!("count {count} does not fit in usize")))
    }

    pub async fn long_count(&self, predicate: Option<Predicate<T>>) -> Result<u64, DataError> {
        let executor = self.executor();
        let query = executor.resolve(&Self::filtered(predicate), OrderPolicy::AsRequested);
        let count = AggregateEvaluator::new(&executor).count(&query).await?;
        tracing::debug!(entity = T::table_name(), count, "Counted records");
        Ok(count)
    }

    /// Sum of the projected values; `0` when nothing matches.
    ///
    /// A total that overflows `V` fails with [`DataError::InvalidArgument`]
    /// (the selector's type is too narrow), never [`DataError::DataSource`].
    pub async fn sum<V: Numeric>(&self, request: AggregateRequest<T, V>) -> Result<V, DataError> {
        let executor = self.executor();
        let query = executor.resolve(
            &Self::filtered(request.predicate().cloned()),
            OrderPolicy::AsRequested,
        );
        AggregateEvaluator::new(&executor)
            .sum(&query, request.selector())
            .await
    }

    /// Mean of the projected values; `EmptySequence` when nothing matches.
    pub async fn average<V: Numeric>(
        &self,
        request: AggregateRequest<T, V>,
    ) -> Result<f64, DataError> {
        let executor = self.executor();
        let query = executor.resolve(
            &Self::filtered(request.predicate().cloned()),
            OrderPolicy::AsRequested,
        );
        AggregateEvaluator::new(&executor)
            .average(&query, request.selector())
            .await
    }

    pub async fn min<V: PartialOrd + Send>(
        &self,
        request: AggregateRequest<T, V>,
    ) -> Result<V, DataError> {
        let executor = self.executor();
        let query = executor.resolve(
            &Self::filtered(request.predicate().cloned()),
            OrderPolicy::AsRequested,
        );
        AggregateEvaluator::new(&executor)
            .min(&query, request.selector())
            .await
    }

    pub async fn max<V: PartialOrd + Send>(
        &self,
        request: AggregateRequest<T, V>,
    ) -> Result<V, DataError> {
        let executor = self.executor();
        let query = executor.resolve(
            &Self::filtered(request.predicate().cloned()),
            OrderPolicy::AsRequested,
        );
        AggregateEvaluator::new(&executor)
            .max(&query, request.selector())
            .await
    }

    /// Run a raw parameterized query; see [`RawQueryAdapter`].
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, DataError> {
        let executor = self.executor();
        RawQueryAdapter::new(&executor).query(sql, params).await
    }

    /// Look a record up by primary key, bypassing predicates and query filters.
    pub async fn find(&self, key: &T::Key) -> Result<Option<T>, DataError> {
        let arity = key.key_values().len();
        if arity != T::key_columns().len() {
            return Err(DataError::invalid_argument(format!(
                "{} has {} key column(s), got {arity} key value(s)",
                T::table_name(),
                T::key_columns().len()
            )));
        }
        let found = self.executor().find_by_key(key).await?;
        tracing::debug!(entity = T::table_name(), ?key, found = found.is_some(), "Find by key");
        Ok(found)
    }

    /// First record matching `spec` under its effective order, if any.
    ///
    /// Uniqueness is not enforced. Without an explicit ordering rule the key
    /// order decides which match is first, so repeated calls agree.
    pub async fn single(&self, spec: QuerySpec<T>) -> Result<Option<T>, DataError> {
        let executor = self.executor();
        let query = executor.resolve(&spec, OrderPolicy::Deterministic);
        let mut first = executor.slice(&query, 0, Some(1)).await?;
        Ok(first.pop())
    }

    /// One page of the records matching `spec`.
    pub async fn get_paged_list(
        &self,
        spec: QuerySpec<T>,
        page: PageRequest,
    ) -> Result<PageResult<T>, DataError> {
        let executor = self.executor();
        let paginator = Paginator::new(&executor).max_page_size(self.config.max_page_size);
        let query = executor.resolve(&spec, OrderPolicy::Deterministic);
        paginator.page(&query, &page).await
    }

    /// One page of the records matching `spec`, each mapped through `selector`.
    pub async fn get_paged_list_projected<R>(
        &self,
        selector: impl FnMut(T) -> R,
        spec: QuerySpec<T>,
        page: PageRequest,
    ) -> Result<PageResult<R>, DataError> {
        Ok(self.get_paged_list(spec, page).await?.map(selector))
    }

    /// Every record matching `spec`, in the effective order.
    pub async fn get_all(&self, spec: QuerySpec<T>) -> Result<Vec<T>, DataError> {
        let items = self
            .executor()
            .materialize(&spec, OrderPolicy::AsRequested)
            .await?;
        tracing::debug!(entity = T::table_name(), count = items.len(), "Loaded all records");
        Ok(items)
    }
}

impl<T, S> Clone for ReadRepository<T, S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
            _marker: PhantomData,
        }
    }
}
