use futures_util::TryStreamExt;
use serde::Serialize;
use serde_json::json;
use strata_data::prelude::*;
use strata_data::{Expr, MemorySession};

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: Option<i64>,
    name: String,
    price: i64,
}

model! {
    Item {
        table: "items",
        primary_key: [id],
        fields: [id, name, price],
    }
}

#[derive(Serialize)]
struct ItemPatch {
    name: Option<String>,
    price: Option<i64>,
}

fn names(items: &[Item]) -> Vec<&str> {
    items.iter().map(|i| i.name.as_str()).collect()
}

async fn seeded(session: &MemorySession, count: usize) -> DataService<Item, &MemorySession> {
    let service = DataService::new(session);
    let values: Vec<Values> = (0..count)
        .map(|i| {
            [
                ("name", Value::from(format!("item-{i}"))),
                ("price", Value::from(i as i64)),
            ]
            .into_iter()
            .collect()
        })
        .collect();
    service.bulk_create(values, 50).await.unwrap();
    service
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let session = MemorySession::new();
    let items = DataService::<Item, _>::new(&session);

    let a = items.create(json!({"name": "a", "price": 1})).await.unwrap();
    let b = items.create(json!({"name": "b", "price": 2})).await.unwrap();
    assert_eq!(a.id, Some(1));
    assert_eq!(b.id, Some(2));

    let expensive = Filter::new([col("price").gt(1)]);
    let found = items.search(Some(&expensive), None, None).await.unwrap();
    assert_eq!(found, vec![b.clone()]);

    let by_price_desc = Sorting::default().desc([col("price")]);
    let sorted = items.search(None, Some(&by_price_desc), None).await.unwrap();
    assert_eq!(names(&sorted), vec!["b", "a"]);

    let deleted = items
        .bulk_delete(&Filter::new([col("price").gt(0)]), 1)
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert!(items.search(None, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_applies_filter_sort_then_page() {
    let session = MemorySession::new();
    let items = seeded(&session, 10).await;

    let filter = Filter::new([col("price").ge(2)]);
    let sorting = Sorting::default().desc([col("price")]);
    let page = Pagination::new(2, 3);
    let found = items.search(Some(&filter), Some(&sorting), Some(&page)).await.unwrap();
    let prices: Vec<i64> = found.iter().map(|i| i.price).collect();
    assert_eq!(prices, vec![6, 5, 4]);
}

#[tokio::test]
async fn test_filter_or_matches_union() {
    let session = MemorySession::new();
    let items = seeded(&session, 6).await;

    let low = Filter::new([col("price").lt(2)]);
    let high = Filter::new([col("price").gt(3)]);
    let overlap = Filter::new([col("price").lt(5)]);
    let by_price = Sorting::new(["price"]);

    let union = items
        .search(Some(&low.or_filter(&high)), Some(&by_price), None)
        .await
        .unwrap();
    let prices: Vec<i64> = union.iter().map(|i| i.price).collect();
    assert_eq!(prices, vec![0, 1, 4, 5]);

    let union = items
        .search(Some(&overlap.or_filter(&high)), Some(&by_price), None)
        .await
        .unwrap();
    assert_eq!(union.len(), 6);

    let anything = items
        .search(Some(&Filter::all().or(Vec::<Expr>::new())), None, None)
        .await
        .unwrap();
    assert_eq!(anything.len(), 6);
}

#[tokio::test]
async fn test_and_with_nothing_keeps_matches() {
    let session = MemorySession::new();
    let items = seeded(&session, 5).await;

    let f = Filter::new([col("price").lt(3)]);
    let same = f.and(Vec::<Expr>::new());
    let lhs = items.search(Some(&f), None, None).await.unwrap();
    let rhs = items.search(Some(&same), None, None).await.unwrap();
    assert_eq!(lhs, rhs);
}

#[tokio::test]
async fn test_get_multiplicity() {
    let session = MemorySession::new();
    let items = seeded(&session, 3).await;

    let one = items.get(&Filter::new([col("name").eq("item-1")])).await.unwrap();
    assert_eq!(one.map(|i| i.price), Some(1));

    let none = items.get(&Filter::new([col("name").eq("missing")])).await.unwrap();
    assert!(none.is_none());

    let err = items.get(&Filter::new([col("price").ge(1)])).await.unwrap_err();
    assert!(matches!(err, DataError::MultipleResults { table: "items" }));
}

#[tokio::test]
async fn test_by_id_operations() {
    let session = MemorySession::new();
    let items = seeded(&session, 2).await;

    let first = items.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(first.name, "item-0");

    let updated = items
        .update_by_id(1, json!({"price": 99}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.price, 99);
    assert_eq!(updated.name, "item-0");

    assert!(items.delete_by_id(2).await.unwrap());
    assert!(!items.delete_by_id(2).await.unwrap());
    session.commit().await.unwrap();
    assert_eq!(session.committed_rows("items").await.len(), 1);
}

#[tokio::test]
async fn test_update_by_id_missing_does_not_commit() {
    let session = MemorySession::new();
    let items = seeded(&session, 1).await;
    let commits = session.commit_count().await;

    let result = items.update_by_id(404, json!({"price": 1})).await.unwrap();
    assert!(result.is_none());
    assert_eq!(session.commit_count().await, commits);
}

#[tokio::test]
async fn test_get_by_id_rejects_wrong_arity() {
    let session = MemorySession::new();
    let items = DataService::<Item, _>::new(&session);
    let err = items.get_by_id((1i64, 2i64)).await.unwrap_err();
    assert!(matches!(err, DataError::InvalidKey { expected: 1, found: 2, .. }));
}

#[tokio::test]
async fn test_update_is_partial() {
    let session = MemorySession::new();
    let items = DataService::<Item, _>::new(&session);
    let lamp = items
        .create(Partial(ItemPatch {
            name: Some("lamp".into()),
            price: Some(10),
        }))
        .await
        .unwrap();

    let patched = items
        .update(
            lamp,
            Partial(ItemPatch {
                name: None,
                price: Some(12),
            }),
        )
        .await
        .unwrap();
    assert_eq!(patched.name, "lamp");
    assert_eq!(patched.price, 12);

    let stored = items.get_by_id(patched.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(stored, patched);
}

#[tokio::test]
async fn test_update_of_primary_key_renames_the_same_record() {
    let session = MemorySession::new();
    let items = DataService::<Item, _>::new(&session);
    let a = items.create(json!({"name": "a", "price": 1})).await.unwrap();
    let b = items.create(json!({"name": "b", "price": 2})).await.unwrap();
    let commits = session.commit_count().await;

    let err = items
        .update(a.clone(), json!({"id": 2, "name": "z"}))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Constraint(_)), "got {err:?}");
    assert_eq!(session.commit_count().await, commits);
    session.rollback().await.unwrap();
    assert_eq!(items.get_by_id(2).await.unwrap(), Some(b.clone()));
    assert_eq!(items.get_by_id(1).await.unwrap(), Some(a.clone()));

    let moved = items
        .update(a, json!({"id": 5, "name": "z"}))
        .await
        .unwrap();
    assert_eq!(
        moved,
        Item {
            id: Some(5),
            name: "z".into(),
            price: 1,
        }
    );
    assert!(items.get_by_id(1).await.unwrap().is_none());
    assert_eq!(items.get_by_id(5).await.unwrap(), Some(moved));
    assert_eq!(items.get_by_id(2).await.unwrap(), Some(b));
}

#[tokio::test]
async fn test_create_validates_input() {
    let session = MemorySession::new();
    let items = DataService::<Item, _>::new(&session);

    let err = items.create(json!({"name": "x"})).await.unwrap_err();
    assert!(matches!(err, DataError::MissingField { .. }));

    let err = items.create(json!({"name": "x", "price": "cheap"})).await.unwrap_err();
    assert!(matches!(err, DataError::InvalidValue { .. }));
    assert_eq!(session.commit_count().await, 0);
}

#[tokio::test]
async fn test_delete_does_not_commit() {
    let session = MemorySession::new();
    let items = seeded(&session, 1).await;
    let item = items.get_by_id(1).await.unwrap().unwrap();

    items.delete(&item).await.unwrap();
    assert!(items.get_by_id(1).await.unwrap().is_none());
    assert_eq!(session.committed_rows("items").await.len(), 1);

    session.rollback().await.unwrap();
    assert!(items.get_by_id(1).await.unwrap().is_some());
}

#[tokio::test]
async fn test_bulk_create_counts_and_commits_per_chunk() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let session = MemorySession::new();
    let items = DataService::<Item, _>::new(&session);
    let values = (0..7).map(|i| json!({"name": format!("n{i}"), "price": i}));

    let created = items.bulk_create(values, 3).await.unwrap();
    assert_eq!(created, 7);
    assert_eq!(session.commit_count().await, 3);
    assert_eq!(items.search(None, None, None).await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_bulk_create_exact_multiple_has_no_extra_commit() {
    let session = MemorySession::new();
    let items = DataService::<Item, _>::new(&session);
    let values = (0..6).map(|i| json!({"name": format!("n{i}"), "price": i}));

    assert_eq!(items.bulk_create(values, 3).await.unwrap(), 6);
    assert_eq!(session.commit_count().await, 2);
}

#[tokio::test]
async fn test_chunks_exact_multiple() {
    let session = MemorySession::new();
    let items = seeded(&session, 12).await;

    let mut chunks = items.model_chunks(None, 4);
    let mut sizes = Vec::new();
    while let Some(chunk) = chunks.next_chunk().await.unwrap() {
        sizes.push(chunk.len());
    }
    assert_eq!(sizes, vec![4, 4, 4]);
    assert!(chunks.next_chunk().await.unwrap().is_none());
}

#[tokio::test]
async fn test_chunks_with_singleton_tail() {
    let session = MemorySession::new();
    let items = seeded(&session, 13).await;

    let chunks: Vec<Vec<Item>> = items
        .model_chunks(None, 4)
        .into_stream()
        .try_collect()
        .await
        .unwrap();
    let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![4, 4, 4, 1]);

    let mut ids: Vec<i64> = chunks.iter().flatten().filter_map(|i| i.id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 13);
}

#[tokio::test]
async fn test_chunks_of_empty_set() {
    let session = MemorySession::new();
    let items = seeded(&session, 3).await;
    let nothing = Filter::new([col("price").gt(100)]);
    let mut chunks = items.model_chunks(Some(&nothing), 2);
    assert!(chunks.next_chunk().await.unwrap().is_none());
}

#[tokio::test]
async fn test_bulk_update_patches_every_match() {
    let session = MemorySession::new();
    let items = seeded(&session, 9).await;
    let commits = session.commit_count().await;

    let cheap = Filter::new([col("price").lt(5)]);
    let updated = items
        .bulk_update(&cheap, json!({"name": "cheap"}), 2)
        .await
        .unwrap();
    assert_eq!(updated, 5);
    assert_eq!(session.commit_count().await, commits + 3);

    let renamed = items
        .search(Some(&Filter::new([col("name").eq("cheap")])), None, None)
        .await
        .unwrap();
    assert_eq!(renamed.len(), 5);
    assert!(renamed.iter().all(|i| i.price < 5));
}

#[tokio::test]
async fn test_bulk_delete_drains_matches() {
    let session = MemorySession::new();
    let items = seeded(&session, 10).await;
    let commits = session.commit_count().await;

    let even_range = Filter::new([col("price").ge(3)]);
    let deleted = items.bulk_delete(&even_range, 3).await.unwrap();
    assert_eq!(deleted, 7);
    assert_eq!(session.commit_count().await, commits);

    let left = items.search(None, None, None).await.unwrap();
    assert_eq!(left.len(), 3);

    session.commit().await.unwrap();
    assert_eq!(session.committed_rows("items").await.len(), 3);
}

#[tokio::test]
async fn test_bulk_update_partial_failure_keeps_earlier_chunks() {
    let session = MemorySession::new();
    let items = seeded(&session, 6).await;
    let commits = session.commit_count().await;
    session.fail_commit_at(commits + 2).await;

    let err = items
        .bulk_update(&Filter::all(), json!({"name": "renamed"}), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Other(_)));

    let committed = session.committed_rows("items").await;
    let renamed = committed
        .iter()
        .filter(|row| row.get("name") == Some(&Value::from("renamed")))
        .count();
    assert_eq!(renamed, 2);
}

#[tokio::test]
async fn test_search_page_markers() {
    let session = MemorySession::new();
    let items = seeded(&session, 5).await;
    let by_price = Sorting::new(["price"]);

    let first = items
        .search_page(None, Some(&by_price), Pagination::new(1, 2))
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!((first.prev_page, first.next_page), (None, Some(2)));

    let last = items
        .search_page(None, Some(&by_price), Pagination::new(3, 2))
        .await
        .unwrap();
    assert_eq!(names(&last.items), vec!["item-4"]);
    assert_eq!((last.prev_page, last.next_page), (Some(2), None));
}
