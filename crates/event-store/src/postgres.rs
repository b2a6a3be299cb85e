use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventIdentity, EventStoreError, InboundEvent, OutboundEvent, Result,
    SequenceNumber,
    log::{AppendOutcome, EventLog, EventSink},
};

/// Advisory lock key serializing writers to the `events` table.
const APPEND_LOCK_KEY: i64 = 0x7464_6f5f_6c6f_67;

/// PostgreSQL-backed event log.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Creates a new PostgreSQL event log.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `events` and `reactor_checkpoints` tables.
    ///
    /// Called once at process startup, before any reactor runs.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Records an upstream event at the next position and returns it.
    pub async fn record(
        &self,
        aggregate_id: AggregateId,
        event_type: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<InboundEvent> {
        let event_type = event_type.into();
        let mut tx = self.begin_append().await?;

        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO events (sequence_number, aggregate_id, event_type, body)
            SELECT COALESCE(MAX(sequence_number), 0) + 1, $1, $2, $3
            FROM events
            RETURNING sequence_number
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .bind(&event_type)
        .bind(&body)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(InboundEvent::new(
            aggregate_id,
            event_type,
            SequenceNumber::new(sequence),
            body,
        ))
    }

    /// Returns the reactions of a given type, in log order.
    pub async fn emitted(&self, event_type: &str) -> Result<Vec<OutboundEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT aggregate_id, event_type, body, caused_by_aggregate_id, caused_by_sequence
            FROM events
            WHERE event_type = $1 AND caused_by_sequence IS NOT NULL
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<OutboundEvent> {
                Ok(OutboundEvent {
                    aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
                    event_type: row.try_get("event_type")?,
                    body: row.try_get("body")?,
                    caused_by: EventIdentity {
                        aggregate_id: AggregateId::from_uuid(
                            row.try_get::<Uuid, _>("caused_by_aggregate_id")?,
                        ),
                        sequence_number: SequenceNumber::new(row.try_get("caused_by_sequence")?),
                    },
                })
            })
            .collect()
    }

    async fn begin_append(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    fn row_to_event(row: PgRow) -> Result<InboundEvent> {
        Ok(InboundEvent {
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            event_type: row.try_get("event_type")?,
            body: row.try_get("body")?,
            sequence_number: SequenceNumber::new(row.try_get("sequence_number")?),
        })
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    #[tracing::instrument(skip(self))]
    async fn read_after(
        &self,
        after: Option<SequenceNumber>,
        limit: usize,
    ) -> Result<Vec<InboundEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT sequence_number, aggregate_id, event_type, body
            FROM events
            WHERE sequence_number > $1
            ORDER BY sequence_number ASC
            LIMIT $2
            "#,
        )
        .bind(after.map(|p| p.as_i64()).unwrap_or(0))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn load_checkpoint(&self, processor: &str) -> Result<Option<SequenceNumber>> {
        let position: Option<i64> = sqlx::query_scalar(
            "SELECT last_sequence FROM reactor_checkpoints WHERE processor_name = $1",
        )
        .bind(processor)
        .fetch_optional(&self.pool)
        .await?;

        Ok(position.map(SequenceNumber::new))
    }

    async fn commit_checkpoint(&self, processor: &str, position: SequenceNumber) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reactor_checkpoints (processor_name, last_sequence, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (processor_name) DO UPDATE SET
                last_sequence = GREATEST(reactor_checkpoints.last_sequence, EXCLUDED.last_sequence),
                updated_at = NOW()
            "#,
        )
        .bind(processor)
        .bind(position.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl EventSink for PostgresEventLog {
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type, caused_by = %event.caused_by))]
    async fn append(&self, event: OutboundEvent) -> Result<AppendOutcome> {
        event.validate().map_err(EventStoreError::InvalidEvent)?;

        let mut tx = self.begin_append().await?;

        let sequence: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO events (
                sequence_number, aggregate_id, event_type, body,
                caused_by_aggregate_id, caused_by_sequence
            )
            SELECT COALESCE(MAX(sequence_number), 0) + 1, $1, $2, $3, $4, $5
            FROM events
            ON CONFLICT (event_type, caused_by_aggregate_id, caused_by_sequence) DO NOTHING
            RETURNING sequence_number
            "#,
        )
        .bind(event.aggregate_id.as_uuid())
        .bind(&event.event_type)
        .bind(&event.body)
        .bind(event.caused_by.aggregate_id.as_uuid())
        .bind(event.caused_by.sequence_number.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        match sequence {
            Some(sequence) => {
                metrics::counter!("event_log_appends_total").increment(1);
                Ok(AppendOutcome::Appended(SequenceNumber::new(sequence)))
            }
            None => {
                tracing::debug!("reaction already recorded");
                Ok(AppendOutcome::AlreadyRecorded)
            }
        }
    }
}
