//! The data source contract: everything the read layer needs from storage.

use crate::entity::Entity;
use crate::error::DataError;
use crate::spec::{Include, OrderBy, Predicate, QuerySpec, Tracking};
use crate::value::Value;
use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;

/// How a query's effective order is settled during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPolicy {
    /// The explicit ordering rule if any, otherwise the source's natural order.
    AsRequested,
    /// The explicit rule followed by the key as tie-breaker, or key order when
    /// no rule was given. Required whenever results are sliced into pages.
    Deterministic,
}

/// A resolved, not yet materialized query.
///
/// Building one never touches storage; only the [`DataSource`] calls that
/// consume it do.
pub struct DeferredQuery<T> {
    predicate: Option<Predicate<T>>,
    order: Option<OrderBy<T>>,
    include: Include,
    tracking: Tracking,
    ignore_query_filters: bool,
}

impl<T: Entity> DeferredQuery<T> {
    pub fn new(spec: &QuerySpec<T>, policy: OrderPolicy) -> Self {
        let order = match (policy, spec.ordering()) {
            (OrderPolicy::AsRequested, order) => order.cloned(),
            (OrderPolicy::Deterministic, Some(order)) => Some(order.clone().with_key_tiebreak()),
            (OrderPolicy::Deterministic, None) => Some(OrderBy::by_key()),
        };
        Self {
            predicate: spec.predicate().cloned(),
            order,
            include: spec.includes().clone(),
            tracking: spec.tracking_mode(),
            ignore_query_filters: spec.ignores_query_filters(),
        }
    }
}

impl<T> DeferredQuery<T> {
    pub fn predicate(&self) -> Option<&Predicate<T>> {
        self.predicate.as_ref()
    }

    /// The effective order, `None` meaning the source's natural order.
    pub fn order(&self) -> Option<&OrderBy<T>> {
        self.order.as_ref()
    }

    pub fn include(&self) -> &Include {
        &self.include
    }

    pub fn tracking(&self) -> Tracking {
        self.tracking
    }

    pub fn ignores_query_filters(&self) -> bool {
        self.ignore_query_filters
    }

    /// Whether `item` passes the query's own predicate (absent matches all).
    pub fn matches(&self, item: &T) -> bool {
        self.predicate.as_ref().is_none_or(|p| p.matches(item))
    }
}

impl<T> Clone for DeferredQuery<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            order: self.order.clone(),
            include: self.include.clone(),
            tracking: self.tracking,
            ignore_query_filters: self.ignore_query_filters,
        }
    }
}

impl<T> fmt::Debug for DeferredQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQuery")
            .field("predicate", &self.predicate.is_some())
            .field("order", &self.order)
            .field("include", &self.include)
            .field("tracking", &self.tracking)
            .finish()
    }
}

/// Storage collaborator consumed by the read layer.
///
/// Uses RPITIT (return-position `impl Trait` in traits) like the rest of the
/// crate. Implementations own connection management, the translation of
/// predicates and orderings into their native query form, eager loading, and
/// instance tracking.
pub trait DataSource<T: Entity>: Send + Sync {
    /// Turn a spec into a deferred query. Never performs I/O.
    fn resolve(&self, spec: &QuerySpec<T>, policy: OrderPolicy) -> DeferredQuery<T> {
        DeferredQuery::new(spec, policy)
    }

    /// Count the records matching `query` without materializing them.
    fn count(&self, query: &DeferredQuery<T>) -> impl Future<Output = Result<u64, DataError>> + Send;

    /// Materialize the records at `offset..offset + limit` in the query's
    /// effective order, with include hints applied. `None` reads to the end.
    fn slice(
        &self,
        query: &DeferredQuery<T>,
        offset: u64,
        limit: Option<u64>,
    ) -> impl Future<Output = Result<Vec<T>, DataError>> + Send;

    /// Primary-key lookup. Ignores predicates and global query filters.
    fn find_by_key(&self, key: &T::Key) -> impl Future<Output = Result<Option<T>, DataError>> + Send;

    /// Run a raw query with positionally bound parameters.
    fn execute_raw(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Vec<T>, DataError>> + Send;

    /// Visit matching records in effective order until `visit` breaks.
    ///
    /// Used for delegated aggregation; include hints and tracking do not apply.
    fn scan<F>(
        &self,
        query: &DeferredQuery<T>,
        visit: F,
    ) -> impl Future<Output = Result<(), DataError>> + Send
    where
        F: FnMut(&T) -> ControlFlow<()> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Line {
        order_id: i64,
        line: i64,
        qty: u32,
    }

    impl Entity for Line {
        type Key = (i64, i64);

        fn table_name() -> &'static str {
            "order_lines"
        }

        fn key_columns() -> &'static [&'static str] {
            &["order_id", "line"]
        }

        fn columns() -> &'static [&'static str] {
            &["order_id", "line", "qty"]
        }

        fn key(&self) -> (i64, i64) {
            (self.order_id, self.line)
        }
    }

    fn line(order_id: i64, line: i64, qty: u32) -> Line {
        Line { order_id, line, qty }
    }

    #[test]
    fn test_matches_uses_the_predicate() {
        let spec = QuerySpec::new().filter(|l: &Line| l.qty > 2);
        let query = DeferredQuery::new(&spec, OrderPolicy::AsRequested);
        assert!(query.matches(&line(1, 1, 3)));
        assert!(!query.matches(&line(1, 2, 1)));

        let all = DeferredQuery::new(&QuerySpec::<Line>::new(), OrderPolicy::AsRequested);
        assert!(all.matches(&line(1, 2, 1)));
        assert!(all.order().is_none());
    }

    #[test]
    fn test_deterministic_order_uses_every_key_column() {
        let query = DeferredQuery::new(&QuerySpec::<Line>::new(), OrderPolicy::Deterministic);
        let order = query.order().unwrap();
        let columns: Vec<_> = order.keys().iter().map(|k| k.column()).collect();
        assert_eq!(columns, vec!["order_id", "line"]);

        let mut rows = vec![line(2, 1, 0), line(1, 2, 0), line(1, 1, 0)];
        rows.sort_by(|a, b| order.compare(a, b));
        let keys: Vec<_> = rows.iter().map(Line::key).collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (2, 1)]);

        let by_qty = QuerySpec::new().order_by(OrderBy::desc("qty", |l: &Line| l.qty));
        let query = DeferredQuery::new(&by_qty, OrderPolicy::Deterministic);
        let columns: Vec<_> = query.order().unwrap().keys().iter().map(|k| k.column()).collect();
        assert_eq!(columns, vec!["qty", "order_id", "line"]);
    }
}
