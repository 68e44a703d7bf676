//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p audit-log --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use audit_log::{AuditAction, AuditEntry, AuditQuery, AuditSink, BasketId, PostgresAuditLog};
use chrono::{Duration, Utc};
use common::{Item, Money};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_baskets_and_audit.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh log with its own pool and a cleared table
async fn get_test_log() -> PostgresAuditLog {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE basket_audit")
        .execute(&pool)
        .await
        .unwrap();

    PostgresAuditLog::new(pool)
}

fn snapshot() -> Vec<Item> {
    vec![
        Item::new("UID-A", "Apple", Money::from_cents(50), 2),
        Item::new("UID-B", "Bread", Money::from_cents(300), 1),
    ]
}

#[tokio::test]
async fn append_and_read_back_entry() {
    let log = get_test_log().await;
    let basket = BasketId::new("basket-1");

    let entry = AuditEntry::new(basket.clone(), AuditAction::Synced, snapshot(), Utc::now());
    let entry_id = entry.entry_id;
    log.append(entry).await.unwrap();

    let entries = log.query_by_basket(&basket).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_id, entry_id);
    assert_eq!(entries[0].action, AuditAction::Synced);
    assert_eq!(entries[0].items, snapshot());
    assert_eq!(entries[0].total.cents(), 400);
    assert!(entries[0].detail.is_null());
}

#[tokio::test]
async fn reappending_same_entry_is_a_no_op() {
    let log = get_test_log().await;
    let basket = BasketId::new("basket-dup");

    let entry = AuditEntry::new(basket.clone(), AuditAction::Synced, snapshot(), Utc::now());
    log.append(entry.clone()).await.unwrap();
    log.append(entry.clone()).await.unwrap();

    let entries = log.query_by_basket(&basket).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_id, entry.entry_id);
}

#[tokio::test]
async fn detail_is_persisted() {
    let log = get_test_log().await;
    let basket = BasketId::new("basket-2");

    let entry = AuditEntry::new(
        basket.clone(),
        AuditAction::QuantityAdjusted,
        snapshot(),
        Utc::now(),
    )
    .with_detail(serde_json::json!({"itemId": "UID-A", "delta": -1}));
    log.append(entry).await.unwrap();

    let entries = log.query_by_basket(&basket).await.unwrap();
    assert_eq!(entries[0].detail["delta"], -1);
}

#[tokio::test]
async fn entries_come_back_in_timestamp_then_append_order() {
    let log = get_test_log().await;
    let basket = BasketId::new("basket-3");
    let now = Utc::now();

    log.append(AuditEntry::new(basket.clone(), AuditAction::Paid, vec![], now))
        .await
        .unwrap();
    log.append(AuditEntry::new(
        basket.clone(),
        AuditAction::Synced,
        vec![],
        now - Duration::seconds(30),
    ))
    .await
    .unwrap();
    log.append(AuditEntry::new(basket.clone(), AuditAction::AutoCleanup, vec![], now))
        .await
        .unwrap();

    let actions: Vec<_> = log
        .query_by_basket(&basket)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Synced,
            AuditAction::Paid,
            AuditAction::AutoCleanup
        ]
    );
}

#[tokio::test]
async fn query_filters_by_action_and_pages() {
    let log = get_test_log().await;
    let basket = BasketId::new("basket-4");
    let other = BasketId::new("basket-5");

    for _ in 0..3 {
        log.append(AuditEntry::new(basket.clone(), AuditAction::Synced, vec![], Utc::now()))
            .await
            .unwrap();
    }
    log.append(AuditEntry::new(basket.clone(), AuditAction::Cancelled, vec![], Utc::now()))
        .await
        .unwrap();
    log.append(AuditEntry::new(other.clone(), AuditAction::Synced, vec![], Utc::now()))
        .await
        .unwrap();

    let synced = log
        .query(AuditQuery::for_basket(basket.clone()).action(AuditAction::Synced))
        .await
        .unwrap();
    assert_eq!(synced.len(), 3);

    let all_synced = log
        .query(AuditQuery::new().action(AuditAction::Synced))
        .await
        .unwrap();
    assert_eq!(all_synced.len(), 4);

    let page = log
        .query(AuditQuery::for_basket(basket).offset(2).limit(5))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[1].action, AuditAction::Cancelled);
}
