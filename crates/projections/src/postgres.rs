//! PostgreSQL projection store.

use async_trait::async_trait;
use common::AggregateId;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::record::{ProjectionRecord, RecordChanges};
use crate::store::ProjectionStore;
use crate::{ProjectionError, Result};

/// Table used when none is configured.
pub const DEFAULT_TABLE: &str = "reactor_todo_completed_notifier";

/// PostgreSQL-backed projection store.
#[derive(Clone)]
pub struct PostgresProjectionStore {
    pool: PgPool,
    table: String,
}

impl PostgresProjectionStore {
    /// Creates a store over [`DEFAULT_TABLE`].
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Creates a store over a named table.
    ///
    /// The name is interpolated into SQL, so only lowercase ASCII letters,
    /// digits and underscores are accepted, starting with a letter or
    /// underscore.
    pub fn with_table(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_plain_identifier(&table) {
            return Err(ProjectionError::InvalidTableName(table));
        }
        Ok(Self { pool, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the projection table if it does not exist.
    ///
    /// Called once at process startup, before any reactor runs.
    #[tracing::instrument(skip(self), fields(table = %self.table))]
    pub async fn ensure_schema(&self) -> Result<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                entity_id       UUID PRIMARY KEY,
                title           TEXT,
                contact_address TEXT
            )
            "#,
            table = self.table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        tracing::info!("projection schema ready");
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<ProjectionRecord> {
        Ok(ProjectionRecord {
            entity_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("entity_id")?),
            title: row.try_get("title")?,
            contact_address: row.try_get("contact_address")?,
        })
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[async_trait]
impl ProjectionStore for PostgresProjectionStore {
    async fn insert(&self, record: ProjectionRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (entity_id, title, contact_address) VALUES ($1, $2, $3)",
            self.table
        );

        sqlx::query(&sql)
            .bind(record.entity_id.as_uuid())
            .bind(&record.title)
            .bind(&record.contact_address)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return ProjectionError::DuplicateKey(record.entity_id);
                }
                ProjectionError::Database(e)
            })?;

        Ok(())
    }

    async fn update(&self, entity_id: AggregateId, changes: RecordChanges) -> Result<()> {
        if changes.is_empty() {
            // Nothing to set, but a missing record is still a miss
            return self.get(entity_id).await.map(|_| ());
        }

        let mut assignments = Vec::new();
        let mut param_count = 1;
        if changes.title.is_some() {
            param_count += 1;
            assignments.push(format!("title = ${param_count}"));
        }
        if changes.contact_address.is_some() {
            param_count += 1;
            assignments.push(format!("contact_address = ${param_count}"));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE entity_id = $1",
            self.table,
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql).bind(entity_id.as_uuid());
        if let Some(title) = changes.title {
            query = query.bind(title);
        }
        if let Some(contact_address) = changes.contact_address {
            query = query.bind(contact_address);
        }

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(ProjectionError::NotFound(entity_id));
        }
        Ok(())
    }

    async fn get(&self, entity_id: AggregateId) -> Result<ProjectionRecord> {
        let sql = format!(
            "SELECT entity_id, title, contact_address FROM {} WHERE entity_id = $1",
            self.table
        );

        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(entity_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_record(row),
            None => Err(ProjectionError::NotFound(entity_id)),
        }
    }

    async fn delete(&self, entity_id: AggregateId) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE entity_id = $1", self.table);
        let result = sqlx::query(&sql)
            .bind(entity_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as usize)
    }
}
