mod common;

use common::{ids, init_tracing, source, user, User};
use repokit_data::{
    BlockingReadRepository, DataConfig, DataError, MemoryDataSource, OrderBy, PageRequest,
    QuerySpec, ReadRepository,
};

#[tokio::test]
async fn test_twenty_five_records_in_pages_of_ten() {
    init_tracing();
    let repo = ReadRepository::new(source(25));

    let page0 = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(0, 10))
        .await
        .unwrap();
    assert_eq!(page0.items.len(), 10);
    assert!(!page0.has_previous);
    assert!(page0.has_next);

    let page1 = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(page1.items.len(), 10);
    assert!(page1.has_previous);
    assert!(page1.has_next);

    let page2 = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(2, 10))
        .await
        .unwrap();
    assert_eq!(ids(&page2.items), vec![21, 22, 23, 24, 25]);
    assert!(page2.has_previous);
    assert!(!page2.has_next);

    for page in [&page0, &page1, &page2] {
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_count, 25);
    }
}

#[tokio::test]
async fn test_total_counts_filtered_records_before_slicing() {
    let repo = ReadRepository::new(source(50));
    let page = repo
        .get_paged_list(
            QuerySpec::new().filter(|u: &User| u.active),
            PageRequest::new(1, 10),
        )
        .await
        .unwrap();
    assert_eq!(page.total_count, 25);
    assert_eq!(page.total_pages, 3);
    assert_eq!(ids(&page.items), (22..=40).step_by(2).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_page_beyond_last_is_empty() {
    let source = source(25);
    let repo = ReadRepository::new(source.clone());
    source.reset_reads();
    let page = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(5, 10))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert!(!page.has_next);
    assert!(page.has_previous);
    assert_eq!(page.total_pages, 3);
    // Only the count pass touched the rows.
    assert_eq!(source.reads(), 25);
}

#[tokio::test]
async fn test_page_of_nothing() {
    let repo = ReadRepository::new(MemoryDataSource::<User>::new());
    let page = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(2, 10))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_pages, 0);
    assert!(!page.has_previous);
    assert!(!page.has_next);
}

#[tokio::test]
async fn test_invalid_requests_issue_no_reads() {
    let source = source(10);
    let repo = ReadRepository::new(source.clone());
    for request in [
        PageRequest::new(0, 0),
        PageRequest::new(0, -1),
        PageRequest::new(-1, 10),
    ] {
        let err = repo
            .get_paged_list(QuerySpec::new(), request)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidArgument(_)), "{err}");
    }
    assert_eq!(source.reads(), 0);
}

#[tokio::test]
async fn test_fallback_order_is_key_order() {
    let shuffled = [7, 3, 9, 1, 5, 2, 8, 4, 6].map(user);
    let repo = ReadRepository::new(MemoryDataSource::from_rows(shuffled));

    let first = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(0, 4))
        .await
        .unwrap();
    assert_eq!(ids(&first.items), vec![1, 2, 3, 4]);

    for _ in 0..3 {
        let again = repo
            .get_paged_list(QuerySpec::new(), PageRequest::new(1, 4))
            .await
            .unwrap();
        assert_eq!(ids(&again.items), vec![5, 6, 7, 8]);
    }
}

#[tokio::test]
async fn test_explicit_order_breaks_ties_by_key() {
    // Ages repeat every 7 ids, so many users share an age.
    let shuffled = [14, 7, 21, 1, 8, 15].map(user);
    let repo = ReadRepository::new(MemoryDataSource::from_rows(shuffled));
    let page = repo
        .get_paged_list(
            QuerySpec::new().order_by(OrderBy::asc("age", |u: &User| u.age)),
            PageRequest::new(0, 6),
        )
        .await
        .unwrap();
    assert_eq!(ids(&page.items), vec![7, 14, 21, 1, 8, 15]);
}

#[tokio::test]
async fn test_from_base() {
    let repo = ReadRepository::new(source(25));
    let page = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(1, 10).with_from(1))
        .await
        .unwrap();
    assert_eq!(ids(&page.items), (1..=10).collect::<Vec<_>>());
    assert!(!page.has_previous);
    assert!(page.has_next);

    let err = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(0, 10).with_from(1))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_configured_limits() {
    let config = DataConfig {
        default_page_size: 5,
        max_page_size: Some(8),
    };
    let repo = ReadRepository::with_config(source(12), config);

    let page = repo
        .get_paged_list(QuerySpec::new(), repo.page_request(2))
        .await
        .unwrap();
    assert_eq!(ids(&page.items), vec![11, 12]);

    let err = repo
        .get_paged_list(QuerySpec::new(), PageRequest::new(0, 9))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_projected_page() {
    let repo = ReadRepository::new(source(5));
    let page = repo
        .get_paged_list_projected(
            |u: User| u.name,
            QuerySpec::new().order_by(OrderBy::desc("id", |u: &User| u.id)),
            PageRequest::new(0, 2),
        )
        .await
        .unwrap();
    assert_eq!(page.items, vec!["user-05", "user-04"]);
    assert_eq!(page.total_pages, 3);
}

#[tokio::test]
async fn test_page_serializes() {
    let repo = ReadRepository::new(source(3));
    let page = repo
        .get_paged_list_projected(|u: User| u.id, QuerySpec::new(), PageRequest::new(0, 2))
        .await
        .unwrap();
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["items"], serde_json::json!([1, 2]));
    assert_eq!(json["total_count"], 3);
    assert_eq!(json["has_next"], true);
}

#[test]
fn test_blocking_matches_async() {
    let spec = || {
        QuerySpec::new()
            .filter(|u: &User| u.age > 21)
            .order_by(OrderBy::desc("name", |u: &User| u.name.clone()))
    };
    let repo = ReadRepository::new(source(40));
    let blocking = BlockingReadRepository::new(repo.clone()).unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    for index in 0..4 {
        let request = PageRequest::new(index, 7);
        let sync_page = blocking.get_paged_list(spec(), request).unwrap();
        let async_page = runtime
            .block_on(repo.get_paged_list(spec(), request))
            .unwrap();
        assert_eq!(sync_page, async_page);
    }
    assert_eq!(
        blocking.count(None).unwrap(),
        runtime.block_on(repo.count(None)).unwrap()
    );
}
