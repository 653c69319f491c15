//! Immutable query descriptions: predicate, ordering rule, eager-load hints,
//! and tracking mode.
//!
//! Every builder method on [`QuerySpec`] is independent of the others, so the
//! order in which they are called never changes the resulting query.

use crate::entity::Entity;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

type PredicateFn<T> = dyn Fn(&T) -> bool + Send + Sync;
type CompareFn<T> = dyn Fn(&T, &T) -> Ordering + Send + Sync;

/// A shared, pure filter function over `T`.
pub struct Predicate<T> {
    f: Arc<PredicateFn<T>>,
}

impl<T: 'static> Predicate<T> {
    pub fn new(f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    pub fn and(self, other: Predicate<T>) -> Self {
        let (a, b) = (self.f, other.f);
        Self::new(move |item| a(item) && b(item))
    }

    pub fn or(self, other: Predicate<T>) -> Self {
        let (a, b) = (self.f, other.f);
        Self::new(move |item| a(item) || b(item))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        let f = self.f;
        Self::new(move |item| !f(item))
    }
}

impl<T> Predicate<T> {
    pub fn matches(&self, item: &T) -> bool {
        (self.f)(item)
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One component of an ordering rule.
///
/// The comparator lets in-process sources order rows themselves. A key built
/// from a stored column's value also lets SQL-backed sources push the
/// ordering into query text; a computed key never leaves the process.
pub struct SortKey<T> {
    column: Cow<'static, str>,
    direction: Direction,
    compare: Arc<CompareFn<T>>,
    computed: bool,
}

impl<T> SortKey<T> {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the comparator derives its value instead of reading `column`.
    pub fn is_computed(&self) -> bool {
        self.computed
    }

    /// Compare two items, honoring the direction.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        let ord = (self.compare)(a, b);
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

impl<T> Clone for SortKey<T> {
    fn clone(&self) -> Self {
        Self {
            column: self.column.clone(),
            direction: self.direction,
            compare: self.compare.clone(),
            computed: self.computed,
        }
    }
}

/// An ordering rule: sort keys applied left to right.
pub struct OrderBy<T> {
    keys: Vec<SortKey<T>>,
}

impl<T: 'static> OrderBy<T> {
    /// Order ascending by the value of `column`, which `key` reads.
    ///
    /// `key` must return the column's stored value unchanged: SQL sources
    /// sort by the column itself and never call it. Use [`OrderBy::by`] for
    /// derived orderings such as case-insensitive text.
    pub fn asc<K: Ord>(
        column: impl Into<Cow<'static, str>>,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        Self { keys: Vec::new() }.then_asc(column, key)
    }

    pub fn desc<K: Ord>(
        column: impl Into<Cow<'static, str>>,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        Self { keys: Vec::new() }.then_desc(column, key)
    }

    /// Order by an arbitrary comparator. Always evaluated in process;
    /// `column` only names the key in logs.
    pub fn by(
        column: impl Into<Cow<'static, str>>,
        direction: Direction,
        compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Self { keys: Vec::new() }.then_by(column, direction, compare)
    }

    pub fn then_asc<K: Ord>(
        self,
        column: impl Into<Cow<'static, str>>,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        self.push(column.into(), Direction::Asc, key)
    }

    pub fn then_desc<K: Ord>(
        self,
        column: impl Into<Cow<'static, str>>,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        self.push(column.into(), Direction::Desc, key)
    }

    pub fn then_by(
        mut self,
        column: impl Into<Cow<'static, str>>,
        direction: Direction,
        compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.keys.push(SortKey {
            column: column.into(),
            direction,
            compare: Arc::new(compare),
            computed: true,
        });
        self
    }

    /// Append all keys of `other` after this rule's keys.
    pub fn then(mut self, other: OrderBy<T>) -> Self {
        self.keys.extend(other.keys);
        self
    }

    fn push<K: Ord>(
        mut self,
        column: Cow<'static, str>,
        direction: Direction,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        self.keys.push(SortKey {
            column,
            direction,
            compare: Arc::new(move |a, b| key(a).cmp(&key(b))),
            computed: false,
        });
        self
    }
}

impl<T> OrderBy<T> {
    pub fn keys(&self) -> &[SortKey<T>] {
        &self.keys
    }

    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        self.keys
            .iter()
            .map(|k| k.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl<T: Entity> OrderBy<T> {
    /// Ascending primary-key order: the deterministic fallback for paging.
    ///
    /// The first sort key compares the whole key; the remaining key columns
    /// only contribute their names to SQL `ORDER BY` clauses.
    pub fn by_key() -> Self {
        let keys = T::key_columns()
            .iter()
            .enumerate()
            .map(|(i, column)| SortKey {
                column: Cow::Borrowed(*column),
                direction: Direction::Asc,
                compare: if i == 0 {
                    Arc::new(|a: &T, b: &T| a.key().cmp(&b.key())) as Arc<CompareFn<T>>
                } else {
                    Arc::new(|_: &T, _: &T| Ordering::Equal) as Arc<CompareFn<T>>
                },
                computed: false,
            })
            .collect();
        Self { keys }
    }

    /// This rule followed by primary-key order as the final tie-breaker.
    pub fn with_key_tiebreak(self) -> Self {
        self.then(Self::by_key())
    }
}

impl<T> Clone for OrderBy<T> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
        }
    }
}

impl<T> fmt::Debug for OrderBy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.keys.iter().map(|k| (k.column(), k.direction())))
            .finish()
    }
}

/// Named eager-load hints. They attach related data and never filter or reorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Include {
    hints: BTreeSet<String>,
}

impl Include {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hint: impl Into<String>) -> Self {
        self.hints.insert(hint.into());
        self
    }

    pub fn contains(&self, hint: &str) -> bool {
        self.hints.contains(hint)
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hints.iter().map(String::as_str)
    }
}

/// Whether returned instances are registered by the data source for later mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tracking {
    #[default]
    Disabled,
    Enabled,
}

/// An immutable description of one logical read query.
///
/// # Example
///
/// ```ignore
/// let spec = QuerySpec::new()
///     .filter(|u: &User| u.active)
///     .order_by(OrderBy::desc("age", |u: &User| u.age))
///     .include("orders");
/// ```
pub struct QuerySpec<T> {
    predicate: Option<Predicate<T>>,
    order_by: Option<OrderBy<T>>,
    include: Include,
    tracking: Tracking,
    ignore_query_filters: bool,
}

impl<T: 'static> QuerySpec<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to items matching `f`. Repeated calls are AND-combined.
    pub fn filter(self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.with_predicate(Predicate::new(f))
    }

    pub fn with_predicate(mut self, predicate: Predicate<T>) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Set the ordering rule, replacing any previous one.
    pub fn order_by(mut self, order: OrderBy<T>) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn include(mut self, hint: impl Into<String>) -> Self {
        self.include = self.include.with(hint);
        self
    }

    pub fn with_include(mut self, include: Include) -> Self {
        for hint in include.hints {
            self.include.hints.insert(hint);
        }
        self
    }

    pub fn tracking(mut self, tracking: Tracking) -> Self {
        self.tracking = tracking;
        self
    }

    /// Bypass the data source's global query filters (e.g. soft-delete).
    pub fn ignore_query_filters(mut self) -> Self {
        self.ignore_query_filters = true;
        self
    }
}

impl<T> QuerySpec<T> {
    pub fn predicate(&self) -> Option<&Predicate<T>> {
        self.predicate.as_ref()
    }

    pub fn ordering(&self) -> Option<&OrderBy<T>> {
        self.order_by.as_ref()
    }

    pub fn includes(&self) -> &Include {
        &self.include
    }

    pub fn tracking_mode(&self) -> Tracking {
        self.tracking
    }

    pub fn ignores_query_filters(&self) -> bool {
        self.ignore_query_filters
    }
}

impl<T> Default for QuerySpec<T> {
    fn default() -> Self {
        Self {
            predicate: None,
            order_by: None,
            include: Include::default(),
            tracking: Tracking::Disabled,
            ignore_query_filters: false,
        }
    }
}

impl<T> Clone for QuerySpec<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            order_by: self.order_by.clone(),
            include: self.include.clone(),
            tracking: self.tracking,
            ignore_query_filters: self.ignore_query_filters,
        }
    }
}

impl<T> From<Predicate<T>> for QuerySpec<T> {
    fn from(predicate: Predicate<T>) -> Self {
        Self {
            predicate: Some(predicate),
            ..Self::default()
        }
    }
}

impl<T> fmt::Debug for QuerySpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("predicate", &self.predicate.is_some())
            .field("order_by", &self.order_by)
            .field("include", &self.include)
            .field("tracking", &self.tracking)
            .field("ignore_query_filters", &self.ignore_query_filters)
            .finish()
    }
}
