use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventIdentity, EventStoreError, InboundEvent, OutboundEvent, Result,
    SequenceNumber,
    log::{AppendOutcome, EventLog, EventSink},
};

#[derive(Debug, Clone)]
struct StoredEvent {
    event: InboundEvent,
    caused_by: Option<EventIdentity>,
}

#[derive(Debug, Default)]
struct LogState {
    events: Vec<StoredEvent>,
    checkpoints: HashMap<String, SequenceNumber>,
}

impl LogState {
    fn next_sequence(&self) -> SequenceNumber {
        self.events
            .last()
            .map(|stored| stored.event.sequence_number.next())
            .unwrap_or(SequenceNumber::first())
    }
}

#[derive(Debug, Default)]
struct FaultSwitches {
    fail_on_read: AtomicBool,
    fail_on_append: AtomicBool,
    fail_on_commit: AtomicBool,
}

/// In-memory event log for tests.
///
/// Emitted events land in the same log as recorded ones, exactly as they
/// would in PostgreSQL, so a reactor reading the log also sees its own
/// reactions. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    state: Arc<RwLock<LogState>>,
    faults: Arc<FaultSwitches>,
}

impl InMemoryEventLog {
    /// Creates a new empty in-memory event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an upstream event at the next position and returns it.
    pub async fn record(
        &self,
        aggregate_id: AggregateId,
        event_type: impl Into<String>,
        body: serde_json::Value,
    ) -> InboundEvent {
        let mut state = self.state.write().await;
        let event = InboundEvent::new(aggregate_id, event_type, state.next_sequence(), body);
        state.events.push(StoredEvent {
            event: event.clone(),
            caused_by: None,
        });
        event
    }

    /// Returns every event in the log, in order.
    pub async fn events(&self) -> Vec<InboundEvent> {
        let state = self.state.read().await;
        state.events.iter().map(|s| s.event.clone()).collect()
    }

    /// Returns the reactions of a given type, in the order they were appended.
    pub async fn emitted(&self, event_type: &str) -> Vec<OutboundEvent> {
        let state = self.state.read().await;
        state
            .events
            .iter()
            .filter(|s| s.event.event_type == event_type)
            .filter_map(|s| {
                s.caused_by.map(|caused_by| OutboundEvent {
                    aggregate_id: s.event.aggregate_id,
                    event_type: s.event.event_type.clone(),
                    body: s.event.body.clone(),
                    caused_by,
                })
            })
            .collect()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Makes subsequent reads fail until switched off.
    pub fn set_fail_on_read(&self, fail: bool) {
        self.faults.fail_on_read.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent sink appends fail until switched off.
    pub fn set_fail_on_append(&self, fail: bool) {
        self.faults.fail_on_append.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent checkpoint commits fail until switched off.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.faults.fail_on_commit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn read_after(
        &self,
        after: Option<SequenceNumber>,
        limit: usize,
    ) -> Result<Vec<InboundEvent>> {
        if self.faults.fail_on_read.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable("read refused".to_string()));
        }

        let state = self.state.read().await;
        let events = state
            .events
            .iter()
            .filter(|s| after.is_none_or(|position| s.event.sequence_number > position))
            .take(limit)
            .map(|s| s.event.clone())
            .collect();
        Ok(events)
    }

    async fn load_checkpoint(&self, processor: &str) -> Result<Option<SequenceNumber>> {
        Ok(self.state.read().await.checkpoints.get(processor).copied())
    }

    async fn commit_checkpoint(&self, processor: &str, position: SequenceNumber) -> Result<()> {
        if self.faults.fail_on_commit.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable(format!(
                "checkpoint commit refused for {processor}"
            )));
        }

        let mut state = self.state.write().await;
        let checkpoint = state
            .checkpoints
            .entry(processor.to_string())
            .or_insert(position);
        if position > *checkpoint {
            *checkpoint = position;
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for InMemoryEventLog {
    async fn append(&self, event: OutboundEvent) -> Result<AppendOutcome> {
        event.validate().map_err(EventStoreError::InvalidEvent)?;

        if self.faults.fail_on_append.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable(format!(
                "append of {} refused",
                event.event_type
            )));
        }

        let mut state = self.state.write().await;

        // Unique reaction constraint
        let duplicate = state.events.iter().any(|s| {
            s.caused_by == Some(event.caused_by) && s.event.event_type == event.event_type
        });
        if duplicate {
            return Ok(AppendOutcome::AlreadyRecorded);
        }

        let sequence_number = state.next_sequence();
        state.events.push(StoredEvent {
            event: InboundEvent::new(
                event.aggregate_id,
                event.event_type,
                sequence_number,
                event.body,
            ),
            caused_by: Some(event.caused_by),
        });

        Ok(AppendOutcome::Appended(sequence_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn record_assigns_consecutive_positions() {
        let log = InMemoryEventLog::new();
        let id = AggregateId::new();

        let first = log.record(id, "todo_added", json!({"title": "a"})).await;
        let second = log.record(id, "todo_completed", json!({})).await;

        assert_eq!(first.sequence_number, SequenceNumber::first());
        assert_eq!(second.sequence_number, SequenceNumber::new(2));
        assert_eq!(log.event_count().await, 2);
    }

    #[tokio::test]
    async fn read_after_is_exclusive_and_limited() {
        let log = InMemoryEventLog::new();
        for _ in 0..5 {
            log.record(AggregateId::new(), "todo_added", json!({})).await;
        }

        let all = log.read_after(None, 10).await.unwrap();
        assert_eq!(all.len(), 5);

        let tail = log.read_after(Some(SequenceNumber::new(2)), 2).await.unwrap();
        let positions: Vec<i64> = tail.iter().map(|e| e.sequence_number.as_i64()).collect();
        assert_eq!(positions, vec![3, 4]);
    }

    #[tokio::test]
    async fn checkpoints_are_per_processor_and_never_regress() {
        let log = InMemoryEventLog::new();
        assert!(log.load_checkpoint("notifier").await.unwrap().is_none());

        log.commit_checkpoint("notifier", SequenceNumber::new(4))
            .await
            .unwrap();
        log.commit_checkpoint("notifier", SequenceNumber::new(2))
            .await
            .unwrap();
        log.commit_checkpoint("other", SequenceNumber::new(1))
            .await
            .unwrap();

        assert_eq!(
            log.load_checkpoint("notifier").await.unwrap(),
            Some(SequenceNumber::new(4))
        );
        assert_eq!(
            log.load_checkpoint("other").await.unwrap(),
            Some(SequenceNumber::new(1))
        );
    }

    #[tokio::test]
    async fn append_refuses_second_copy_of_a_reaction() {
        let log = InMemoryEventLog::new();
        let cause = log
            .record(AggregateId::new(), "todo_completed", json!({}))
            .await;

        let reaction = OutboundEvent::reacting_to(&cause, "stakeholder-notified", json!({}));
        let first = log.append(reaction.clone()).await.unwrap();
        let second = log.append(reaction).await.unwrap();

        assert_eq!(first, AppendOutcome::Appended(SequenceNumber::new(2)));
        assert_eq!(second, AppendOutcome::AlreadyRecorded);
        assert_eq!(log.emitted("stakeholder-notified").await.len(), 1);
    }

    #[tokio::test]
    async fn emitted_events_are_readable_from_the_log() {
        let log = InMemoryEventLog::new();
        let cause = log
            .record(AggregateId::new(), "todo_completed", json!({}))
            .await;
        log.append(OutboundEvent::reacting_to(
            &cause,
            "stakeholder-notified",
            json!({"notified_at": "2024-03-01T12:00:00Z"}),
        ))
        .await
        .unwrap();

        let events = log.read_after(Some(cause.sequence_number), 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "stakeholder-notified");
    }

    #[tokio::test]
    async fn fault_switches_fail_operations() {
        let log = InMemoryEventLog::new();
        let cause = log
            .record(AggregateId::new(), "todo_completed", json!({}))
            .await;

        log.set_fail_on_append(true);
        let result = log
            .append(OutboundEvent::reacting_to(&cause, "stakeholder-notified", json!({})))
            .await;
        assert!(matches!(result, Err(EventStoreError::Unavailable(_))));

        log.set_fail_on_commit(true);
        assert!(
            log.commit_checkpoint("notifier", SequenceNumber::first())
                .await
                .is_err()
        );

        log.set_fail_on_read(true);
        assert!(log.read_after(None, 1).await.is_err());

        log.set_fail_on_read(false);
        assert_eq!(log.read_after(None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_reaction_is_rejected() {
        let log = InMemoryEventLog::new();
        let cause = log
            .record(AggregateId::new(), "todo_completed", json!({}))
            .await;

        let result = log
            .append(OutboundEvent::reacting_to(&cause, "stakeholder-notified", json!("x")))
            .await;

        assert!(matches!(result, Err(EventStoreError::InvalidEvent(_))));
        assert_eq!(log.event_count().await, 1);
    }
}
