use crate::entity::Entity;
use crate::error::DataError;
use crate::source::{DataSource, DeferredQuery, OrderPolicy};
use crate::spec::QuerySpec;
use crate::value::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::ops::ControlFlow;
use tokio_util::sync::CancellationToken;

/// Resolves query specs against a [`DataSource`] and runs every storage
/// round trip, racing it against an optional cancellation token.
///
/// Shared by the paginator, the aggregate evaluator and the raw query adapter.
pub struct QueryExecutor<'a, T, S> {
    source: &'a S,
    cancel: Option<&'a CancellationToken>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Entity, S: DataSource<T>> QueryExecutor<'a, T, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            cancel: None,
            _marker: PhantomData,
        }
    }

    pub fn with_cancellation(mut self, token: Option<&'a CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    pub fn source(&self) -> &'a S {
        self.source
    }

    pub fn resolve(&self, spec: &QuerySpec<T>, policy: OrderPolicy) -> DeferredQuery<T> {
        self.source.resolve(spec, policy)
    }

    /// Await `fut`, or fail with `Cancelled` as soon as the token fires.
    ///
    /// Losing the race drops `fut`, which aborts its pending I/O.
    pub async fn guard<R>(
        &self,
        fut: impl Future<Output = Result<R, DataError>>,
    ) -> Result<R, DataError> {
        let Some(token) = self.cancel else {
            return fut.await;
        };
        if token.is_cancelled() {
            return Err(DataError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(DataError::Cancelled),
            res = fut => res,
        }
    }

    pub async fn count(&self, query: &DeferredQuery<T>) -> Result<u64, DataError> {
        self.guard(self.source.count(query)).await
    }

    pub async fn slice(
        &self,
        query: &DeferredQuery<T>,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<Vec<T>, DataError> {
        self.guard(self.source.slice(query, offset, limit)).await
    }

    pub async fn find_by_key(&self, key: &T::Key) -> Result<Option<T>, DataError> {
        self.guard(self.source.find_by_key(key)).await
    }

    pub async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, DataError> {
        self.guard(self.source.execute_raw(sql, params)).await
    }

    pub async fn scan<F>(&self, query: &DeferredQuery<T>, visit: F) -> Result<(), DataError>
    where
        F: FnMut(&T) -> ControlFlow<()> + Send,
    {
        self.guard(self.source.scan(query, visit)).await
    }

    /// Resolve `spec` and read it to the end.
    pub async fn materialize(
        &self,
        spec: &QuerySpec<T>,
        policy: OrderPolicy,
    ) -> Result<Vec<T>, DataError> {
        let query = self.resolve(spec, policy);
        self.slice(&query, 0, None).await
    }
}
