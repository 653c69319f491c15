use crate::entity::Entity;
use crate::error::DataError;
use crate::executor::QueryExecutor;
use crate::source::{DataSource, DeferredQuery};
use serde::{Deserialize, Serialize};

/// Page size used when a request does not name one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// Pagination parameters, deserializable from query params.
///
/// `from` is the index of the first page (0 by default); the page actually
/// read is `index - from`. Signed fields let out-of-range input reach
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub index: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
    #[serde(default)]
    pub from: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            index: 0,
            size: DEFAULT_PAGE_SIZE,
            from: 0,
        }
    }
}

impl PageRequest {
    pub fn new(index: i64, size: i64) -> Self {
        Self {
            index,
            size,
            from: 0,
        }
    }

    pub fn with_from(mut self, from: i64) -> Self {
        self.from = from;
        self
    }

    /// Check the request and compute the slice it addresses.
    pub fn window(&self, max_size: Option<u64>) -> Result<PageWindow, DataError> {
        if self.size <= 0 {
            return Err(DataError::invalid_argument(format!(
                "page size must be positive, got {}",
                self.size
            )));
        }
        if self.from < 0 {
            return Err(DataError::invalid_argument(format!(
                "page base must not be negative, got {}",
                self.from
            )));
        }
        if self.index < 0 {
            return Err(DataError::invalid_argument(format!(
                "page index must not be negative, got {}",
                self.index
            )));
        }
        if self.index < self.from {
            return Err(DataError::invalid_argument(format!(
                "page index {} is below the page base {}",
                self.index, self.from
            )));
        }
        let size = self.size as u64;
        if let Some(max) = max_size {
            if size > max {
                return Err(DataError::invalid_argument(format!(
                    "page size {size} exceeds the maximum of {max}"
                )));
            }
        }
        let page = (self.index - self.from) as u64;
        let offset = page.checked_mul(size).ok_or_else(|| {
            DataError::invalid_argument(format!("page {page} of size {size} is out of range"))
        })?;
        Ok(PageWindow { page, size, offset })
    }
}

/// A validated page request: zero-based page number, size, and row offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub size: u64,
    pub offset: u64,
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub index: i64,
    pub size: i64,
    pub from: i64,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total_count: u64) -> Self {
        let total_pages = if request.size <= 0 {
            0
        } else {
            total_count.div_ceil(request.size as u64)
        };
        let page = request.index - request.from;
        // Past the last page, a previous page exists only if any page does.
        let has_previous = page > 0 && total_pages > 0;
        let has_next = page >= 0 && (page as u64).saturating_add(1) < total_pages;
        Self {
            items,
            index: request.index,
            size: request.size,
            from: request.from,
            total_count,
            total_pages,
            has_previous,
            has_next,
        }
    }

    /// An empty first page of the default size.
    pub fn empty() -> Self {
        Self::new(Vec::new(), &PageRequest::default(), 0)
    }

    /// Convert the items, keeping the pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            items: self.items.into_iter().map(f).collect(),
            index: self.index,
            size: self.size,
            from: self.from,
            total_count: self.total_count,
            total_pages: self.total_pages,
            has_previous: self.has_previous,
            has_next: self.has_next,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Slices a deferred query into one page and computes its metadata.
pub struct Paginator<'e, 'a, T, S> {
    executor: &'e QueryExecutor<'a, T, S>,
    max_page_size: Option<u64>,
}

impl<'e, 'a, T: Entity, S: DataSource<T>> Paginator<'e, 'a, T, S> {
    pub fn new(executor: &'e QueryExecutor<'a, T, S>) -> Self {
        Self {
            executor,
            max_page_size: None,
        }
    }

    pub fn max_page_size(mut self, max: Option<u64>) -> Self {
        self.max_page_size = max;
        self
    }

    /// Count the filtered sequence, then read only the requested slice.
    ///
    /// `query` must carry a deterministic order (see
    /// [`OrderPolicy::Deterministic`](crate::OrderPolicy::Deterministic)).
    /// The request is validated before any data source call; a page past the
    /// end is answered from the count alone.
    pub async fn page(
        &self,
        query: &DeferredQuery<T>,
        request: &PageRequest,
    ) -> Result<PageResult<T>, DataError> {
        let window = request.window(self.max_page_size)?;
        let total = self.executor.count(query).await?;
        let items = if window.offset >= total {
            Vec::new()
        } else {
            self.executor
                .slice(query, window.offset, Some(window.size))
                .await?
        };
        tracing::debug!(
            entity = T::table_name(),
            index = request.index,
            size = request.size,
            total,
            returned = items.len(),
            "Page resolved"
        );
        Ok(PageResult::new(items, request, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(total: u64, index: i64, size: i64) -> PageResult<()> {
        PageResult::new(Vec::new(), &PageRequest::new(index, size), total)
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(meta(25, 0, 10).total_pages, 3);
        assert_eq!(meta(30, 0, 10).total_pages, 3);
        assert_eq!(meta(0, 0, 10).total_pages, 0);
        assert_eq!(meta(1, 0, 10).total_pages, 1);
        assert_eq!(meta(10, 0, 0).total_pages, 0);
    }

    #[test]
    fn test_flags() {
        let first = meta(25, 0, 10);
        assert!(!first.has_previous && first.has_next);
        let middle = meta(25, 1, 10);
        assert!(middle.has_previous && middle.has_next);
        let last = meta(25, 2, 10);
        assert!(last.has_previous && !last.has_next);
        let beyond = meta(25, 7, 10);
        assert!(beyond.has_previous && !beyond.has_next);
        let nothing = meta(0, 3, 10);
        assert!(!nothing.has_previous && !nothing.has_next);
    }

    #[test]
    fn test_from_base() {
        let request = PageRequest::new(1, 10).with_from(1);
        let page = PageResult::<()>::new(Vec::new(), &request, 25);
        assert!(!page.has_previous);
        assert!(page.has_next);
        assert_eq!(request.window(None).unwrap().offset, 0);
    }

    #[test]
    fn test_window_rejects_bad_input() {
        for request in [
            PageRequest::new(0, 0),
            PageRequest::new(0, -5),
            PageRequest::new(-1, 10),
            PageRequest::new(0, 10).with_from(1),
            PageRequest::new(0, 10).with_from(-1),
            PageRequest::new(i64::MAX, i64::MAX),
        ] {
            assert!(
                matches!(request.window(None), Err(DataError::InvalidArgument(_))),
                "{request:?} should be rejected"
            );
        }
        assert!(matches!(
            PageRequest::new(0, 51).window(Some(50)),
            Err(DataError::InvalidArgument(_))
        ));
        assert!(PageRequest::new(0, 50).window(Some(50)).is_ok());
    }

    #[test]
    fn test_deserialize_defaults() {
        let request: PageRequest = serde_json::from_str(r#"{"index": 2}"#).unwrap();
        assert_eq!(request, PageRequest::new(2, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = PageResult::new(vec![1, 2, 3], &PageRequest::new(0, 3), 7);
        let mapped = page.map(|n| n.to_string());
        assert_eq!(mapped.items, vec!["1", "2", "3"]);
        assert_eq!(mapped.total_pages, 3);
        assert!(mapped.has_next);
    }
}
