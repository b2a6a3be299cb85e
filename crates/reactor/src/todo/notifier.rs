//! The todo completion notifier.

use async_trait::async_trait;
use common::{AggregateId, Clock};
use event_store::{AppendOutcome, EventSink, InboundEvent, OutboundEvent};
use projections::{
    ProjectionError, ProjectionRecord, ProjectionStore, ProjectionStoreExt, RecordChanges,
};

use super::events::{
    STAKEHOLDER_NOTIFIED, StakeholderNotified, TodoEvent, TodoEventKind, completion_message,
};
use crate::dispatcher::Dispatcher;
use crate::error::Effect;
use crate::handler::{EventHandler, Reaction};
use crate::notification::NotificationPort;
use crate::{ReactorError, Result};

/// Keeps a projection of active todos and notifies the stakeholder when one
/// is completed.
///
/// Lifecycle of a record: created on `todo_added`, changed on
/// `todo_amended`, removed on `todo_abandoned` or `todo_completed`. On
/// completion the effects run in a fixed order: notify, emit
/// `stakeholder-notified`, delete. A failure anywhere leaves the record in
/// place, so redelivery repeats the unit; the sink refuses a second copy
/// of the emitted event.
pub struct TodoCompletedNotifier<P, N, S, C> {
    store: P,
    notifier: N,
    sink: S,
    clock: C,
    dispatcher: Dispatcher<TodoEventKind>,
}

impl<P, N, S, C> TodoCompletedNotifier<P, N, S, C>
where
    P: ProjectionStore,
    N: NotificationPort,
    S: EventSink,
    C: Clock,
{
    /// Creates a notifier routed by the standard todo event tags.
    pub fn new(store: P, notifier: N, sink: S, clock: C) -> Result<Self> {
        Ok(Self::with_dispatcher(
            store,
            notifier,
            sink,
            clock,
            TodoEventKind::dispatcher()?,
        ))
    }

    /// Creates a notifier with a custom routing table.
    pub fn with_dispatcher(
        store: P,
        notifier: N,
        sink: S,
        clock: C,
        dispatcher: Dispatcher<TodoEventKind>,
    ) -> Self {
        Self {
            store,
            notifier,
            sink,
            clock,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<TodoEventKind> {
        &self.dispatcher
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    async fn on_added(
        &self,
        entity_id: AggregateId,
        title: Option<String>,
        stakeholder_email: Option<String>,
    ) -> Result<Reaction> {
        let record = ProjectionRecord::new(entity_id, title, stakeholder_email);
        match self.store.insert(record).await {
            Ok(()) => Ok(Reaction::Inserted),
            Err(ProjectionError::DuplicateKey(_)) => {
                tracing::debug!(%entity_id, "record already exists, skipping");
                Ok(Reaction::AlreadyApplied)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn on_amended(&self, entity_id: AggregateId, changes: RecordChanges) -> Result<Reaction> {
        match self.store.update(entity_id, changes).await {
            Ok(()) => Ok(Reaction::Updated),
            // Amendment after the record was removed, or before it existed
            Err(ProjectionError::NotFound(_)) => {
                tracing::debug!(%entity_id, "no record to amend, skipping");
                Ok(Reaction::AlreadyApplied)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn on_abandoned(&self, entity_id: AggregateId) -> Result<Reaction> {
        if self.store.delete(entity_id).await? {
            Ok(Reaction::Deleted)
        } else {
            Ok(Reaction::AlreadyApplied)
        }
    }

    async fn on_completed(&self, event: &InboundEvent) -> Result<Reaction> {
        let entity_id = event.aggregate_id;
        let Some(record) = self.store.find(entity_id).await? else {
            tracing::debug!(%entity_id, "no record for completed todo, skipping");
            return Ok(Reaction::AlreadyApplied);
        };

        let Some(address) = record.contact() else {
            tracing::debug!(%entity_id, "completed todo has no stakeholder address");
            self.store.delete(entity_id).await?;
            metrics::counter!("reactor_notifications_skipped_total").increment(1);
            return Ok(Reaction::SkippedNoContact);
        };

        self.notifier
            .send(address, &completion_message(record.title.as_deref()))
            .await
            .map_err(|e| ReactorError::EffectFailure {
                effect: Effect::Notification,
                identity: event.identity(),
                reason: e.to_string(),
            })?;
        metrics::counter!("reactor_notifications_sent_total").increment(1);

        let emission = self.emit_notified(event).await?;
        if emission == AppendOutcome::AlreadyRecorded {
            tracing::info!(%entity_id, "stakeholder-notified already recorded for this completion");
        }

        self.store.delete(entity_id).await?;

        Ok(Reaction::Notified {
            address: address.to_string(),
            emission,
        })
    }

    async fn emit_notified(&self, cause: &InboundEvent) -> Result<AppendOutcome> {
        let body = serde_json::to_value(StakeholderNotified {
            notified_at: self.clock.now(),
        })?;
        let outbound = OutboundEvent::reacting_to(cause, STAKEHOLDER_NOTIFIED, body);

        self.sink
            .append(outbound)
            .await
            .map_err(|e| ReactorError::EffectFailure {
                effect: Effect::Emission,
                identity: cause.identity(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl<P, N, S, C> EventHandler for TodoCompletedNotifier<P, N, S, C>
where
    P: ProjectionStore,
    N: NotificationPort,
    S: EventSink,
    C: Clock,
{
    fn name(&self) -> &'static str {
        "TodoCompletedNotifier"
    }

    #[tracing::instrument(
        skip(self, event),
        fields(event_type = %event.event_type, event = %event.identity())
    )]
    async fn handle(&self, event: &InboundEvent) -> Result<Reaction> {
        let Some(kind) = self.dispatcher.route(&event.event_type) else {
            return Ok(Reaction::Ignored);
        };

        let reaction = match TodoEvent::decode(kind, event)? {
            TodoEvent::Added {
                title,
                stakeholder_email,
            } => {
                self.on_added(event.aggregate_id, title, stakeholder_email)
                    .await?
            }
            TodoEvent::Amended(changes) => self.on_amended(event.aggregate_id, changes).await?,
            TodoEvent::Abandoned => self.on_abandoned(event.aggregate_id).await?,
            TodoEvent::Completed => self.on_completed(event).await?,
        };

        tracing::debug!(%reaction, "event handled");
        Ok(reaction)
    }
}
