use repokit_data::{DataError, Entity, MemoryDataSource, PageRequest, QuerySpec, ReadRepository};

#[derive(Debug, Clone, PartialEq)]
struct OrderLine {
    order_id: i64,
    line: i64,
    sku: &'static str,
}

impl Entity for OrderLine {
    type Key = (i64, i64);

    fn table_name() -> &'static str {
        "order_lines"
    }

    fn key_columns() -> &'static [&'static str] {
        &["order_id", "line"]
    }

    fn columns() -> &'static [&'static str] {
        &["order_id", "line", "sku"]
    }

    fn key(&self) -> (i64, i64) {
        (self.order_id, self.line)
    }
}

/// Declares two key columns but a scalar key.
#[derive(Debug, Clone, PartialEq)]
struct MisKeyedLine {
    order_id: i64,
}

impl Entity for MisKeyedLine {
    type Key = i64;

    fn table_name() -> &'static str {
        "order_lines"
    }

    fn key_columns() -> &'static [&'static str] {
        &["order_id", "line"]
    }

    fn columns() -> &'static [&'static str] {
        &["order_id", "line"]
    }

    fn key(&self) -> i64 {
        self.order_id
    }
}

fn line(order_id: i64, line: i64, sku: &'static str) -> OrderLine {
    OrderLine { order_id, line, sku }
}

/// Stored out of key order.
fn lines() -> MemoryDataSource<OrderLine> {
    MemoryDataSource::from_rows([line(2, 1, "c"), line(1, 2, "b"), line(1, 1, "a")])
}

fn keys(items: &[OrderLine]) -> Vec<(i64, i64)> {
    items.iter().map(Entity::key).collect()
}

#[tokio::test]
async fn test_pages_follow_composite_key_order() {
    let repo = ReadRepository::new(lines());

    let page = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(0, 10))
        .await
        .unwrap();
    assert_eq!(keys(&page.items), vec![(1, 1), (1, 2), (2, 1)]);
    assert_eq!(page.total_count, 3);

    let first = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(0, 2))
        .await
        .unwrap();
    let second = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(keys(&first.items), vec![(1, 1), (1, 2)]);
    assert_eq!(keys(&second.items), vec![(2, 1)]);
    assert!(!second.has_next);
}

#[tokio::test]
async fn test_find_by_composite_key() {
    let repo = ReadRepository::new(lines());
    assert_eq!(repo.find(&(1, 2)).await.unwrap(), Some(line(1, 2, "b")));
    assert_eq!(repo.find(&(2, 2)).await.unwrap(), None);

    let first = repo.single(QuerySpec::new()).await.unwrap();
    assert_eq!(first.map(|l| l.key()), Some((1, 1)));
}

#[tokio::test]
async fn test_key_arity_mismatch_reads_nothing() {
    let source = MemoryDataSource::from_rows([MisKeyedLine { order_id: 1 }]);
    let repo = ReadRepository::new(source.clone());

    let err = repo.find(&1).await.unwrap_err();
    assert!(matches!(err, DataError::InvalidArgument(_)));
    assert_eq!(source.reads(), 0);
}
