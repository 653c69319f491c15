//! An in-process [`DataSource`] over a vector of entities.
//!
//! Useful for tests and for embedders that keep a table in memory. Rows keep
//! insertion order, which is this source's natural order.

use crate::entity::Entity;
use crate::error::DataError;
use crate::source::{DataSource, DeferredQuery};
use crate::spec::{Predicate, Tracking};
use crate::value::Value;
use std::collections::{BTreeSet, HashMap};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

type IncludeFn<T> = Arc<dyn Fn(&mut T) + Send + Sync>;
type RawFn<T> = Arc<dyn Fn(&[Value]) -> Result<Vec<T>, DataError> + Send + Sync>;

/// In-memory data source with global query filters, include loaders,
/// registered raw queries, and a tracking registry.
///
/// `MemoryDataSource` is `Clone`; clones share the same rows.
///
/// # Example
///
/// ```ignore
/// let source = MemoryDataSource::from_rows(users)
///     .with_query_filter(|u: &User| !u.deleted)
///     .with_include("orders", |u: &mut User| u.orders = load_orders(u.id));
/// ```
pub struct MemoryDataSource<T: Entity> {
    rows: Arc<RwLock<Vec<T>>>,
    query_filters: Vec<Predicate<T>>,
    includes: HashMap<String, IncludeFn<T>>,
    raw_queries: HashMap<String, RawFn<T>>,
    tracked: Arc<Mutex<BTreeSet<T::Key>>>,
    reads: Arc<AtomicU64>,
}

impl<T: Entity + Clone> MemoryDataSource<T> {
    pub fn new() -> Self {
        Self::from_rows(Vec::new())
    }

    pub fn from_rows(rows: impl IntoIterator<Item = T>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows.into_iter().collect())),
            query_filters: Vec::new(),
            includes: HashMap::new(),
            raw_queries: HashMap::new(),
            tracked: Arc::new(Mutex::new(BTreeSet::new())),
            reads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add a filter applied to every resolved query unless the query opts out of
    /// query filters. Never applied to `find_by_key` or raw queries.
    pub fn with_query_filter(mut self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.query_filters.push(Predicate::new(f));
        self
    }

    /// Register the loader behind an include hint.
    pub fn with_include(
        mut self,
        hint: impl Into<String>,
        loader: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        self.includes.insert(hint.into(), Arc::new(loader));
        self
    }

    /// Register the handler answering a raw query text.
    pub fn with_raw_query(
        mut self,
        sql: impl Into<String>,
        handler: impl Fn(&[Value]) -> Result<Vec<T>, DataError> + Send + Sync + 'static,
    ) -> Self {
        self.raw_queries
            .insert(sql.into().trim().to_string(), Arc::new(handler));
        self
    }

    pub fn insert(&self, row: T) -> Result<(), DataError> {
        self.rows
            .write()
            .map_err(|_| poisoned())?
            .push(row);
        Ok(())
    }

    /// Remove the row with `key`, returning whether one existed.
    pub fn remove(&self, key: &T::Key) -> Result<bool, DataError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let before = rows.len();
        rows.retain(|row| row.key() != *key);
        Ok(rows.len() != before)
    }

    pub fn len(&self) -> Result<usize, DataError> {
        Ok(self.snapshot()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, DataError> {
        Ok(self.len()? == 0)
    }

    /// Number of stored rows visited since creation or the last reset.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn reset_reads(&self) {
        self.reads.store(0, Ordering::Relaxed);
    }

    /// Keys of instances handed out by tracking queries.
    pub fn tracked_keys(&self) -> Result<Vec<T::Key>, DataError> {
        let tracked = self.tracked.lock().map_err(|_| poisoned())?;
        Ok(tracked.iter().cloned().collect())
    }

    pub fn is_tracked(&self, key: &T::Key) -> Result<bool, DataError> {
        let tracked = self.tracked.lock().map_err(|_| poisoned())?;
        Ok(tracked.contains(key))
    }

    fn snapshot(&self) -> Result<RwLockReadGuard<'_, Vec<T>>, DataError> {
        self.rows.read().map_err(|_| poisoned())
    }

    fn visible(&self, query: &DeferredQuery<T>, row: &T) -> bool {
        self.reads.fetch_add(1, Ordering::Relaxed);
        (query.ignores_query_filters() || self.query_filters.iter().all(|f| f.matches(row)))
            && query.matches(row)
    }

    /// Matching rows in effective order. Reads every row.
    fn ordered<'r>(&self, query: &DeferredQuery<T>, rows: &'r [T]) -> Vec<&'r T> {
        let mut matched: Vec<&T> = rows.iter().filter(|row| self.visible(query, row)).collect();
        if let Some(order) = query.order() {
            matched.sort_by(|a, b| order.compare(a, b));
        }
        matched
    }

    fn finish(&self, query: &DeferredQuery<T>, mut items: Vec<T>) -> Result<Vec<T>, DataError> {
        for hint in query.include().iter() {
            let loader = self.includes.get(hint).ok_or_else(|| {
                DataError::data_source_msg(format!(
                    "no include loader `{hint}` registered for {}",
                    T::table_name()
                ))
            })?;
            items.iter_mut().for_each(|item| loader(item));
        }
        if query.tracking() == Tracking::Enabled {
            let mut tracked = self.tracked.lock().map_err(|_| poisoned())?;
            tracked.extend(items.iter().map(T::key));
            tracing::trace!(entity = T::table_name(), count = items.len(), "Tracking instances");
        }
        Ok(items)
    }
}

impl<T: Entity + Clone> Default for MemoryDataSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Clone for MemoryDataSource<T> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            query_filters: self.query_filters.clone(),
            includes: self.includes.clone(),
            raw_queries: self.raw_queries.clone(),
            tracked: self.tracked.clone(),
            reads: self.reads.clone(),
        }
    }
}

fn poisoned() -> DataError {
    DataError::data_source_msg("memory data source lock poisoned")
}

impl<T: Entity + Clone> DataSource<T> for MemoryDataSource<T> {
    async fn count(&self, query: &DeferredQuery<T>) -> Result<u64, DataError> {
        let rows = self.snapshot()?;
        Ok(rows.iter().filter(|row| self.visible(query, row)).count() as u64)
    }

    async fn slice(
        &self,
        query: &DeferredQuery<T>,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<Vec<T>, DataError> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let items: Vec<T> = {
            let rows = self.snapshot()?;
            if query.order().is_some() {
                self.ordered(query, &rows)
                    .into_iter()
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect()
            } else {
                // Natural order: stop reading once the slice is complete.
                rows.iter()
                    .filter(|row| self.visible(query, row))
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect()
            }
        };
        self.finish(query, items)
    }

    async fn find_by_key(&self, key: &T::Key) -> Result<Option<T>, DataError> {
        let rows = self.snapshot()?;
        Ok(rows
            .iter()
            .inspect(|_| {
                self.reads.fetch_add(1, Ordering::Relaxed);
            })
            .find(|row| row.key() == *key)
            .cloned())
    }

    async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, DataError> {
        let handler = self.raw_queries.get(sql.trim()).ok_or_else(|| {
            DataError::data_source_msg(format!("no raw query registered for `{}`", sql.trim()))
        })?;
        handler(params)
    }

    async fn scan<F>(&self, query: &DeferredQuery<T>, mut visit: F) -> Result<(), DataError>
    where
        F: FnMut(&T) -> ControlFlow<()> + Send,
    {
        let rows = self.snapshot()?;
        if query.order().is_some() {
            for row in self.ordered(query, &rows) {
                if visit(row).is_break() {
                    break;
                }
            }
        } else {
            for row in rows.iter().filter(|row| self.visible(query, row)) {
                if visit(row).is_break() {
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Tag {
        id: i64,
    }

    impl Entity for Tag {
        type Key = i64;

        fn table_name() -> &'static str {
            "tags"
        }

        fn key_columns() -> &'static [&'static str] {
            &["id"]
        }

        fn columns() -> &'static [&'static str] {
            &["id"]
        }

        fn key(&self) -> i64 {
            self.id
        }
    }

    #[test]
    fn test_poisoned_locks_surface_as_errors() {
        let source = MemoryDataSource::from_rows([Tag { id: 1 }, Tag { id: 2 }]);
        assert_eq!(source.len().unwrap(), 2);
        assert!(!source.is_empty().unwrap());
        assert!(source.tracked_keys().unwrap().is_empty());

        let rows = source.rows.clone();
        let tracked = source.tracked.clone();
        let _ = std::thread::spawn(move || {
            let _rows = rows.write().unwrap();
            let _tracked = tracked.lock().unwrap();
            panic!("writer died");
        })
        .join();

        assert!(matches!(source.len(), Err(DataError::DataSource(_))));
        assert!(matches!(source.is_empty(), Err(DataError::DataSource(_))));
        assert!(matches!(source.tracked_keys(), Err(DataError::DataSource(_))));
        assert!(matches!(source.is_tracked(&1), Err(DataError::DataSource(_))));
    }
}
