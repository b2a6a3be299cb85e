//! PostgreSQL projection store tests. Need Docker:
//!
//! ```bash
//! cargo test -p projections --test postgres_store -- --ignored
//! ```

use std::sync::Arc;

use common::AggregateId;
use projections::{
    PostgresProjectionStore, ProjectionError, ProjectionRecord, ProjectionStore,
    ProjectionStoreExt, RecordChanges,
};
use serial_test::serial;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                connection_string: format!(
                    "postgres://postgres:postgres@{}:{}/postgres",
                    host, port
                ),
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresProjectionStore {
    let info = get_container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    let store = PostgresProjectionStore::new(pool.clone());
    store.ensure_schema().await.unwrap();
    sqlx::query(&format!("TRUNCATE TABLE {}", store.table()))
        .execute(&pool)
        .await
        .unwrap();
    store
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn ensure_schema_is_repeatable() {
    let store = get_test_store().await;
    store.ensure_schema().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn unique_violation_maps_to_duplicate_key() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    let record = ProjectionRecord::new(id, Some("Buy milk".to_string()), Some("a@x.com".to_string()));

    store.insert(record.clone()).await.unwrap();
    let err = store.insert(record).await.unwrap_err();

    assert!(matches!(err, ProjectionError::DuplicateKey(dup) if dup == id));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn partial_update_leaves_other_columns() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    store
        .insert(ProjectionRecord::new(id, Some("Buy milk".to_string()), Some("a@x.com".to_string())))
        .await
        .unwrap();

    store
        .update(id, RecordChanges::new().title(Some("Buy oat milk".to_string())))
        .await
        .unwrap();
    let record = store.get(id).await.unwrap();
    assert_eq!(record.title.as_deref(), Some("Buy oat milk"));
    assert_eq!(record.contact(), Some("a@x.com"));

    store
        .update(id, RecordChanges::new().contact_address(None))
        .await
        .unwrap();
    assert!(store.get(id).await.unwrap().contact_address.is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn update_and_get_miss_are_not_found() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    assert!(
        store
            .update(id, RecordChanges::new().title(Some("x".to_string())))
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(store.update(id, RecordChanges::new()).await.unwrap_err().is_not_found());
    assert!(store.find(id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn delete_is_idempotent() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    store
        .insert(ProjectionRecord::new(id, Some("Buy milk".to_string()), None))
        .await
        .unwrap();

    assert!(store.delete(id).await.unwrap());
    assert!(!store.delete(id).await.unwrap());
    assert_eq!(store.count().await.unwrap(), 0);
}
