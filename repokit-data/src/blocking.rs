//! A synchronous facade over [`ReadRepository`].
//!
//! Each call drives the async operation to completion on a private
//! current-thread runtime, so both facades return identical results for the
//! same inputs. Do not call these methods from inside an async runtime.

use crate::aggregate::{AggregateRequest, Numeric};
use crate::entity::Entity;
use crate::error::DataError;
use crate::page::{PageRequest, PageResult};
use crate::repository::ReadRepository;
use crate::source::DataSource;
use crate::spec::{Predicate, QuerySpec};
use crate::value::Value;
use tokio::runtime::{Builder, Runtime};

pub struct BlockingReadRepository<T, S> {
    inner: ReadRepository<T, S>,
    runtime: Runtime,
}

impl<T: Entity, S: DataSource<T>> BlockingReadRepository<T, S> {
    pub fn new(inner: ReadRepository<T, S>) -> Result<Self, DataError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(DataError::data_source)?;
        Ok(Self { inner, runtime })
    }

    /// The async repository this facade drives.
    pub fn inner(&self) -> &ReadRepository<T, S> {
        &self.inner
    }

    pub fn exists(&self, predicate: Option<Predicate<T>>) -> Result<bool, DataError> {
        self.runtime.block_on(self.inner.exists(predicate))
    }

    pub fn count(&self, predicate: Option<Predicate<T>>) -> Result<usize, DataError> {
        self.runtime.block_on(self.inner.count(predicate))
    }

    pub fn long_count(&self, predicate: Option<Predicate<T>>) -> Result<u64, DataError> {
        self.runtime.block_on(self.inner.long_count(predicate))
    }

    pub fn sum<V: Numeric>(&self, request: AggregateRequest<T, V>) -> Result<V, DataError> {
        self.runtime.block_on(self.inner.sum(request))
    }

    pub fn average<V: Numeric>(&self, request: AggregateRequest<T, V>) -> Result<f64, DataError> {
        self.runtime.block_on(self.inner.average(request))
    }

    pub fn min<V: PartialOrd + Send>(&self, request: AggregateRequest<T, V>) -> Result<V, DataError> {
        self.runtime.block_on(self.inner.min(request))
    }

    pub fn max<V: PartialOrd + Send>(&self, request: AggregateRequest<T, V>) -> Result<V, DataError> {
        self.runtime.block_on(self.inner.max(request))
    }

    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, DataError> {
        self.runtime.block_on(self.inner.query(sql, params))
    }

    pub fn find(&self, key: &T::Key) -> Result<Option<T>, DataError> {
        self.runtime.block_on(self.inner.find(key))
    }

    pub fn single(&self, spec: QuerySpec<T>) -> Result<Option<T>, DataError> {
        self.runtime.block_on(self.inner.single(spec))
    }

    pub fn get_paged_list(
        &self,
        spec: QuerySpec<T>,
        page: PageRequest,
    ) -> Result<PageResult<T>, DataError> {
        self.runtime.block_on(self.inner.get_paged_list(spec, page))
    }

    pub fn get_paged_list_projected<R>(
        &self,
        selector: impl FnMut(T) -> R,
        spec: QuerySpec<T>,
        page: PageRequest,
    ) -> Result<PageResult<R>, DataError> {
        self.runtime
            .block_on(self.inner.get_paged_list_projected(selector, spec, page))
    }

    pub fn get_all(&self, spec: QuerySpec<T>) -> Result<Vec<T>, DataError> {
        self.runtime.block_on(self.inner.get_all(spec))
    }
}
