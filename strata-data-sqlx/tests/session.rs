use futures_util::TryStreamExt;
use serde_json::json;
use strata_data::prelude::*;
use strata_data_sqlx::{Database, DatabaseConfig, SqlxSession};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: Option<i64>,
    name: String,
    price: i64,
    active: bool,
    weight: Option<f64>,
}

model! {
    Item {
        table: "items",
        primary_key: [id],
        fields: [id, name, price, active, weight],
    }
}

const SCHEMA: &str = "CREATE TABLE items (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    price INTEGER NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 1,
    weight REAL
)";

async fn setup() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("strata.db").display());
    let db = Database::new();
    db.init(&DatabaseConfig::new(url).max_connections(2))
        .await
        .unwrap();
    sqlx::query(SCHEMA)
        .execute(db.pool().unwrap())
        .await
        .unwrap();
    (dir, db)
}

fn item(name: &str, price: i64) -> serde_json::Value {
    json!({"name": name, "price": price, "active": true})
}

fn names(items: &[Item]) -> Vec<&str> {
    items.iter().map(|i| i.name.as_str()).collect()
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let (_dir, db) = setup().await;
    let session = db.session().unwrap();
    let items = DataService::<Item, _>::new(&session);

    let a = items.create(item("a", 1)).await.unwrap();
    let b = items.create(item("b", 2)).await.unwrap();
    assert_eq!(a.id, Some(1));
    assert_eq!(b.id, Some(2));

    let expensive = Filter::new([col("price").gt(1)]);
    let found = items.search(Some(&expensive), None, None).await.unwrap();
    assert_eq!(found, vec![b.clone()]);

    let sorted = items
        .search(None, Some(&Sorting::default().desc([col("price")])), None)
        .await
        .unwrap();
    assert_eq!(names(&sorted), vec!["b", "a"]);

    let deleted = items
        .bulk_delete(&Filter::new([col("price").gt(0)]), 1)
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert!(items.search(None, None, None).await.unwrap().is_empty());
    session.commit().await.unwrap();
}

#[tokio::test]
async fn test_values_round_trip_through_sqlite() {
    let (_dir, db) = setup().await;
    let session = db.session().unwrap();
    let items = DataService::<Item, _>::new(&session);

    let created = items
        .create(json!({"name": "anvil", "price": 90, "active": false, "weight": 42.5}))
        .await
        .unwrap();
    let fetched = items.get_by_id(created.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(fetched, created);
    assert!(!fetched.active);
    assert_eq!(fetched.weight, Some(42.5));
}

#[tokio::test]
async fn test_uncommitted_writes_are_session_local() {
    let (_dir, db) = setup().await;
    let writer = db.session().unwrap();
    let items = DataService::<Item, _>::new(&writer);
    let pending = Item {
        id: None,
        name: "pending".into(),
        price: 5,
        active: true,
        weight: None,
    };
    writer.insert(pending).await.unwrap();
    assert!(writer.in_transaction().await);
    assert_eq!(items.search(None, None, None).await.unwrap().len(), 1);

    let reader = db.session().unwrap();
    let other = DataService::<Item, _>::new(&reader);
    assert!(other.search(None, None, None).await.unwrap().is_empty());
    reader.rollback().await.unwrap();

    writer.rollback().await.unwrap();
    assert!(!writer.in_transaction().await);
    assert!(items.search(None, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dropped_session_discards_writes() {
    let (_dir, db) = setup().await;
    {
        let session = db.session().unwrap();
        let ghost = Item {
            id: None,
            name: "ghost".into(),
            price: 1,
            active: true,
            weight: None,
        };
        session.insert(ghost).await.unwrap();
    }

    let session = db.session().unwrap();
    let items = DataService::<Item, _>::new(&session);
    assert!(items.search(None, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_constraint_violation_propagates() {
    let (_dir, db) = setup().await;
    let session = db.session().unwrap();
    let items = DataService::<Item, _>::new(&session);

    items
        .create(json!({"id": 7, "name": "first", "price": 1, "active": true}))
        .await
        .unwrap();
    let err = items
        .create(json!({"id": 7, "name": "second", "price": 2, "active": true}))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Constraint(_)), "got {err:?}");
}

#[tokio::test]
async fn test_by_id_operations() {
    let (_dir, db) = setup().await;
    let session = db.session().unwrap();
    let items = DataService::<Item, _>::new(&session);
    let lamp = items.create(item("lamp", 12)).await.unwrap();
    let id = lamp.id.unwrap();

    let updated = items
        .update_by_id(id, json!({"price": 15}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.price, 15);
    assert_eq!(updated.name, "lamp");

    assert!(items
        .update_by_id(999, json!({"price": 1}))
        .await
        .unwrap()
        .is_none());
    assert!(items.get_by_id(999).await.unwrap().is_none());

    assert!(items.delete_by_id(id).await.unwrap());
    assert!(!items.delete_by_id(id).await.unwrap());
    session.commit().await.unwrap();

    let fresh = db.session().unwrap();
    let reread = DataService::<Item, _>::new(&fresh);
    assert!(reread.get_by_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_that_changes_the_key_renames_the_row() {
    let (_dir, db) = setup().await;
    let session = db.session().unwrap();
    let items = DataService::<Item, _>::new(&session);
    let a = items.create(item("a", 1)).await.unwrap();
    let b = items.create(item("b", 2)).await.unwrap();

    let err = items
        .update(a.clone(), json!({"id": b.id, "name": "z"}))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Constraint(_)), "got {err:?}");
    session.rollback().await.unwrap();

    let moved = items
        .update(a, json!({"id": 30, "name": "z"}))
        .await
        .unwrap();
    assert_eq!(moved.id, Some(30));

    let rows = items
        .search(None, Some(&Sorting::new(["id"])), None)
        .await
        .unwrap();
    let pairs: Vec<(Option<i64>, &str, i64)> = rows
        .iter()
        .map(|i| (i.id, i.name.as_str(), i.price))
        .collect();
    assert_eq!(pairs, vec![(Some(2), "b", 2), (Some(30), "z", 1)]);
}

#[tokio::test]
async fn test_update_and_delete_of_missing_row_fail() {
    let (_dir, db) = setup().await;
    let session = db.session().unwrap();
    let ghost = Item {
        id: Some(404),
        name: "ghost".into(),
        price: 0,
        active: true,
        weight: None,
    };
    let key = ghost.primary_key_values();
    assert!(session.update(&key, &ghost).await.unwrap_err().is_not_found());
    assert!(session.delete(&ghost).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_bulk_operations() {
    let (_dir, db) = setup().await;
    let session = db.session().unwrap();
    let items = DataService::<Item, _>::new(&session);

    let created = items
        .bulk_create((0..13).map(|i| item(&format!("item-{i}"), i)), 4)
        .await
        .unwrap();
    assert_eq!(created, 13);

    let chunks: Vec<Vec<Item>> = items
        .model_chunks(None, 4)
        .into_stream()
        .try_collect()
        .await
        .unwrap();
    let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![4, 4, 4, 1]);

    let cheap = Filter::new([col("price").lt(5)]);
    let updated = items
        .bulk_update(&cheap, json!({"name": "cheap"}), 2)
        .await
        .unwrap();
    assert_eq!(updated, 5);
    let renamed = items
        .search(Some(&Filter::new([col("name").eq("cheap")])), None, None)
        .await
        .unwrap();
    assert_eq!(renamed.len(), 5);

    let pricey = Filter::new([col("price").ge(10)]);
    assert_eq!(items.bulk_delete(&pricey, 2).await.unwrap(), 3);
    session.commit().await.unwrap();

    let fresh = db.session().unwrap();
    let remaining = DataService::<Item, _>::new(&fresh)
        .search(None, None, None)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 10);
}

#[tokio::test]
async fn test_search_page_against_sqlite() {
    let (_dir, db) = setup().await;
    let session = db.session().unwrap();
    let items = DataService::<Item, _>::new(&session);
    items
        .bulk_create((0..5).map(|i| item(&format!("item-{i}"), i)), 10)
        .await
        .unwrap();

    let by_price = Sorting::new(["price"]);
    let middle = items
        .search_page(None, Some(&by_price), Pagination::new(2, 2))
        .await
        .unwrap();
    assert_eq!(names(&middle.items), vec!["item-2", "item-3"]);
    assert_eq!((middle.prev_page, middle.next_page), (Some(1), Some(3)));

    let everything = items
        .search_page(None, Some(&by_price), Pagination::new(1, u64::MAX))
        .await
        .unwrap();
    assert_eq!(everything.items.len(), 5);
    assert_eq!(everything.next_page, None);

    let matching = Filter::new([col("name").like("ITEM-%")]).or([col("price").is_null()]);
    assert_eq!(
        items.search(Some(&matching), None, None).await.unwrap().len(),
        5
    );
}

#[tokio::test]
async fn test_uninitialized_database() {
    let db = Database::new();
    assert!(!db.is_initialized());
    assert!(matches!(db.session(), Err(DataError::Uninitialized)));
    assert!(matches!(db.pool(), Err(DataError::Uninitialized)));
}

#[tokio::test]
async fn test_double_init_is_rejected() {
    let (dir, db) = setup().await;
    let url = format!("sqlite://{}", dir.path().join("other.db").display());
    assert!(db.init(&DatabaseConfig::new(url)).await.is_err());
}

#[tokio::test]
async fn test_echo_session_still_executes() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (_dir, db) = setup().await;
    let session = SqlxSession::new(db.pool().unwrap().clone()).with_echo(true);
    let items = DataService::<Item, _>::new(&session);
    items.create(item("echoed", 3)).await.unwrap();
    assert_eq!(items.search(None, None, None).await.unwrap().len(), 1);
}
