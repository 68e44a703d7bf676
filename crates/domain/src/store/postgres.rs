use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BasketId, Item};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{BasketScan, BasketStore, StoreError, StoreResult};
use crate::basket::{Basket, BasketStatus};

const SELECT_COLUMNS: &str =
    "SELECT basket_id, status, items, seen_identifiers, created_at, updated_at FROM baskets";

/// PostgreSQL-backed basket store.
///
/// Shares its schema (and migrations) with `PostgresAuditLog`.
#[derive(Clone)]
pub struct PostgresBasketStore {
    pool: PgPool,
}

impl PostgresBasketStore {
    /// Creates a new PostgreSQL basket store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_basket(row: PgRow) -> StoreResult<Basket> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<BasketStatus>()
            .map_err(StoreError::InvalidRecord)?;
        let items: Vec<Item> = serde_json::from_value(row.try_get("items")?)?;
        let seen: BTreeSet<String> = serde_json::from_value(row.try_get("seen_identifiers")?)?;

        Ok(Basket::from_parts(
            BasketId::new(row.try_get::<String, _>("basket_id")?),
            status,
            items,
            seen,
            row.try_get::<DateTime<Utc>, _>("created_at")?,
            row.try_get::<DateTime<Utc>, _>("updated_at")?,
        ))
    }
}

#[async_trait]
impl BasketStore for PostgresBasketStore {
    async fn upsert(&self, basket: Basket) -> StoreResult<()> {
        let items_json = serde_json::to_value(basket.items())?;
        let seen_json = serde_json::to_value(basket.seen_identifiers())?;

        sqlx::query(
            r#"
            INSERT INTO baskets (basket_id, status, items, seen_identifiers, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (basket_id) DO UPDATE SET
                status = EXCLUDED.status,
                items = EXCLUDED.items,
                seen_identifiers = EXCLUDED.seen_identifiers,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(basket.id().as_str())
        .bind(basket.status().as_str())
        .bind(items_json)
        .bind(seen_json)
        .bind(basket.created_at())
        .bind(basket.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, basket_id: &BasketId) -> StoreResult<Option<Basket>> {
        let sql = format!("{SELECT_COLUMNS} WHERE basket_id = $1");
        let row = sqlx::query(&sql)
            .bind(basket_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_basket).transpose()
    }

    async fn delete(&self, basket_id: &BasketId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM baskets WHERE basket_id = $1")
            .bind(basket_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self, filter: &BasketScan) -> StoreResult<Vec<Basket>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        if !filter.statuses.is_empty() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ANY(${param_count})"));
        }
        if filter.updated_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND updated_at < ${param_count}"));
        }
        sql.push_str(" ORDER BY updated_at ASC, basket_id ASC");

        let mut query = sqlx::query(&sql);
        if !filter.statuses.is_empty() {
            let names: Vec<String> = filter
                .statuses
                .iter()
                .map(|s| s.as_str().to_string())
                .collect();
            query = query.bind(names);
        }
        if let Some(cutoff) = filter.updated_before {
            query = query.bind(cutoff);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_basket).collect()
    }
}
