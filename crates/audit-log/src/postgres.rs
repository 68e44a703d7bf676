use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Item, Money};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{AuditAction, AuditEntry, AuditQuery, AuditSink, BasketId, EntryId, Result};

const SELECT_COLUMNS: &str =
    "SELECT entry_id, basket_id, action, items, total_cents, detail, timestamp FROM basket_audit";

/// PostgreSQL-backed audit log implementation.
#[derive(Clone)]
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    /// Creates a new PostgreSQL audit log.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations (baskets and audit tables).
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_entry(row: PgRow) -> Result<AuditEntry> {
        let items_json: serde_json::Value = row.try_get("items")?;
        let items: Vec<Item> = serde_json::from_value(items_json)?;
        let action: String = row.try_get("action")?;
        let detail: Option<serde_json::Value> = row.try_get("detail")?;

        Ok(AuditEntry {
            entry_id: EntryId::from_uuid(row.try_get::<Uuid, _>("entry_id")?),
            basket_id: BasketId::new(row.try_get::<String, _>("basket_id")?),
            action: action.parse::<AuditAction>()?,
            items,
            total: Money::from_cents(row.try_get("total_cents")?),
            detail: detail.unwrap_or(serde_json::Value::Null),
            timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        })
    }
}

#[async_trait]
impl AuditSink for PostgresAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        let items_json = serde_json::to_value(&entry.items)?;
        let detail = (!entry.detail.is_null()).then(|| entry.detail.clone());

        sqlx::query(
            r#"
            INSERT INTO basket_audit (entry_id, basket_id, action, items, total_cents, detail, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (entry_id) DO NOTHING
            "#,
        )
        .bind(entry.entry_id.as_uuid())
        .bind(entry.basket_id.as_str())
        .bind(entry.action.as_str())
        .bind(items_json)
        .bind(entry.total.cents())
        .bind(detail)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;

        tracing::debug!(basket_id = %entry.basket_id, action = %entry.action, "audit entry appended");
        Ok(())
    }

    async fn query_by_basket(&self, basket_id: &BasketId) -> Result<Vec<AuditEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE basket_id = $1 ORDER BY timestamp ASC, seq ASC");
        let rows = sqlx::query(&sql)
            .bind(basket_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditEntry>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.basket_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND basket_id = ${param_count}"));
        }
        if query.actions.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND action = ANY(${param_count})"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp <= ${param_count}"));
        }

        sql.push_str(" ORDER BY timestamp ASC, seq ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(ref basket_id) = query.basket_id {
            sqlx_query = sqlx_query.bind(basket_id.as_str().to_string());
        }
        if let Some(ref actions) = query.actions {
            let names: Vec<String> = actions.iter().map(|a| a.as_str().to_string()).collect();
            sqlx_query = sqlx_query.bind(names);
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_entry).collect()
    }
}
