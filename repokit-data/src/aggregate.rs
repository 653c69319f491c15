//! Scalar aggregation over a deferred query.

use crate::entity::Entity;
use crate::error::DataError;
use crate::executor::QueryExecutor;
use crate::source::{DataSource, DeferredQuery};
use crate::spec::Predicate;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// A shared projection from an entity to an aggregated value.
pub type Selector<T, V> = Arc<dyn Fn(&T) -> V + Send + Sync>;

/// Numeric capability required by `sum` and `average`.
pub trait Numeric: Copy + Send + Sync + 'static {
    const ZERO: Self;

    /// Addition that reports overflow instead of wrapping or panicking.
    fn checked_add(self, other: Self) -> Option<Self>;

    fn to_f64(self) -> f64;
}

macro_rules! impl_numeric_int {
    ($($ty:ty),+) => {
        $(
            impl Numeric for $ty {
                const ZERO: Self = 0;

                fn checked_add(self, other: Self) -> Option<Self> {
                    <$ty>::checked_add(self, other)
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )+
    };
}

impl_numeric_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! impl_numeric_float {
    ($($ty:ty),+) => {
        $(
            impl Numeric for $ty {
                const ZERO: Self = 0.0;

                fn checked_add(self, other: Self) -> Option<Self> {
                    Some(self + other)
                }

                fn to_f64(self) -> f64 {
                    f64::from(self)
                }
            }
        )+
    };
}

impl_numeric_float!(f32, f64);

/// A filter plus an optional projection for one aggregate call.
pub struct AggregateRequest<T, V> {
    predicate: Option<Predicate<T>>,
    selector: Option<Selector<T, V>>,
}

impl<T: 'static, V> AggregateRequest<T, V> {
    /// No filter and no projection.
    pub fn new() -> Self {
        Self {
            predicate: None,
            selector: None,
        }
    }

    /// Aggregate the values `selector` projects out of each matching entity.
    pub fn select(selector: impl Fn(&T) -> V + Send + Sync + 'static) -> Self {
        Self {
            predicate: None,
            selector: Some(Arc::new(selector)),
        }
    }

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

    pub fn predicate(&self) -> Option<&Predicate<T>> {
        self.predicate.as_ref()
    }

    pub fn selector(&self) -> Option<&Selector<T, V>> {
        self.selector.as_ref()
    }
}

impl<T: Clone + 'static> AggregateRequest<T, T> {
    /// Aggregate the entities themselves, under their natural ordering.
    pub fn entity() -> Self {
        Self::select(T::clone)
    }
}

impl<T: 'static, V> Default for AggregateRequest<T, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, V> fmt::Debug for AggregateRequest<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRequest")
            .field("predicate", &self.predicate.is_some())
            .field("selector", &self.selector.is_some())
            .finish()
    }
}

/// Evaluates count/exists/sum/average/min/max against a deferred query.
pub struct AggregateEvaluator<'e, 'a, T, S> {
    executor: &'e QueryExecutor<'a, T, S>,
}

impl<'e, 'a, T: Entity, S: DataSource<T>> AggregateEvaluator<'e, 'a, T, S> {
    pub fn new(executor: &'e QueryExecutor<'a, T, S>) -> Self {
        Self { executor }
    }

    pub async fn count(&self, query: &DeferredQuery<T>) -> Result<u64, DataError> {
        self.executor.count(query).await
    }

    /// Reads at most one record.
    pub async fn exists(&self, query: &DeferredQuery<T>) -> Result<bool, DataError> {
        let first = self.executor.slice(query, 0, Some(1)).await?;
        Ok(!first.is_empty())
    }

    /// Sum of the projected values; zero over an empty sequence.
    ///
    /// A total that overflows `V` fails with [`DataError::InvalidArgument`]
    /// (the selector's type is too narrow), never [`DataError::DataSource`].
    pub async fn sum<V: Numeric>(
        &self,
        query: &DeferredQuery<T>,
        selector: Option<&Selector<T, V>>,
    ) -> Result<V, DataError> {
        let selector = selector.ok_or(DataError::MissingSelector("sum"))?;
        self.fold_sum(query, selector).await
    }

    pub async fn average<V: Numeric>(
        &self,
        query: &DeferredQuery<T>,
        selector: Option<&Selector<T, V>>,
    ) -> Result<f64, DataError> {
        let selector = selector.ok_or(DataError::MissingSelector("average"))?;
        let mut total = 0.0_f64;
        let mut count = 0_u64;
        self.executor
            .scan(query, |item| {
                total += selector(item).to_f64();
                count += 1;
                ControlFlow::Continue(())
            })
            .await?;
        if count == 0 {
            return Err(DataError::EmptySequence("average"));
        }
        Ok(total / count as f64)
    }

    pub async fn min<V: PartialOrd + Send>(
        &self,
        query: &DeferredQuery<T>,
        selector: Option<&Selector<T, V>>,
    ) -> Result<V, DataError> {
        let selector = selector.ok_or(DataError::MissingSelector("min"))?;
        self.extremum(query, selector, |candidate, best| candidate < best)
            .await?
            .ok_or(DataError::EmptySequence("min"))
    }

    pub async fn max<V: PartialOrd + Send>(
        &self,
        query: &DeferredQuery<T>,
        selector: Option<&Selector<T, V>>,
    ) -> Result<V, DataError> {
        let selector = selector.ok_or(DataError::MissingSelector("max"))?;
        self.extremum(query, selector, |candidate, best| candidate > best)
            .await?
            .ok_or(DataError::EmptySequence("max"))
    }

    async fn fold_sum<V: Numeric>(
        &self,
        query: &DeferredQuery<T>,
        selector: &Selector<T, V>,
    ) -> Result<V, DataError> {
        let mut total = V::ZERO;
        let mut overflowed = false;
        self.executor
            .scan(query, |item| match total.checked_add(selector(item)) {
                Some(next) => {
                    total = next;
                    ControlFlow::Continue(())
                }
                None => {
                    overflowed = true;
                    ControlFlow::Break(())
                }
            })
            .await?;
        if overflowed {
            return Err(DataError::invalid_argument(format!(
                "sum overflowed {}",
                std::any::type_name::<V>()
            )));
        }
        Ok(total)
    }

    /// Keep the first value for which no later one `replaces` it.
    async fn extremum<V: PartialOrd + Send>(
        &self,
        query: &DeferredQuery<T>,
        selector: &Selector<T, V>,
        replaces: fn(&V, &V) -> bool,
    ) -> Result<Option<V>, DataError> {
        let mut best: Option<V> = None;
        self.executor
            .scan(query, |item| {
                let candidate = selector(item);
                match &best {
                    Some(current) if !replaces(&candidate, current) => {}
                    _ => best = Some(candidate),
                }
                ControlFlow::Continue(())
            })
            .await?;
        Ok(best)
    }
}
