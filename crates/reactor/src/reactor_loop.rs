//! Checkpointed event loop.

use std::time::Instant;

use event_store::{EventLog, InboundEvent, SequenceNumber};
use tokio::sync::watch;

use crate::config::{ErrorPolicy, ReactorConfig};
use crate::handler::{EventHandler, Reaction};
use crate::Result;

/// What one poll of the log did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Events the handler reacted to.
    pub processed: usize,

    /// Events with no registered handler.
    pub ignored: usize,

    /// Malformed events passed over under [`ErrorPolicy::Skip`].
    pub skipped_malformed: usize,

    /// The poll stopped early on a retryable failure. The checkpoint sits
    /// just before the event that failed.
    pub stalled: bool,
}

impl PollOutcome {
    /// Number of events the checkpoint moved past.
    pub fn committed(&self) -> usize {
        self.processed + self.ignored + self.skipped_malformed
    }

    /// Nothing was pending and nothing failed.
    pub fn is_idle(&self) -> bool {
        self.committed() == 0 && !self.stalled
    }

    fn stall() -> Self {
        Self {
            stalled: true,
            ..Self::default()
        }
    }

    fn merge(&mut self, other: PollOutcome) {
        self.processed += other.processed;
        self.ignored += other.ignored;
        self.skipped_malformed += other.skipped_malformed;
        self.stalled |= other.stalled;
    }
}

/// Pulls events from a log in sequence order and feeds them to a handler.
///
/// The checkpoint is committed after each event the handler accepts, so a
/// crash redelivers at most the event in flight. Retryable failures (log
/// unavailable, projection store down, notification or emission refused)
/// stall the poll without moving the checkpoint; the next poll picks the
/// same event up again. Malformed events follow the configured
/// [`ErrorPolicy`].
pub struct ReactorLoop<L, H> {
    log: L,
    handler: H,
    config: ReactorConfig,
}

impl<L: EventLog, H: EventHandler> ReactorLoop<L, H> {
    pub fn new(log: L, handler: H, config: ReactorConfig) -> Self {
        Self {
            log,
            handler,
            config,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Returns the committed checkpoint for this loop's processor.
    pub async fn checkpoint(&self) -> Result<Option<SequenceNumber>> {
        Ok(self
            .log
            .load_checkpoint(&self.config.processor_name)
            .await?)
    }

    /// Reads one batch after the checkpoint and processes it.
    ///
    /// Returns `Err` only when a malformed event is met under
    /// [`ErrorPolicy::Halt`].
    #[tracing::instrument(skip(self), fields(processor = %self.config.processor_name))]
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        self.poll(None).await
    }

    /// Polls until the log is drained or a poll stalls.
    #[tracing::instrument(skip(self), fields(processor = %self.config.processor_name))]
    pub async fn catch_up(&self) -> Result<PollOutcome> {
        let mut total = PollOutcome::default();
        loop {
            let outcome = self.poll(None).await?;
            total.merge(outcome);
            if outcome.stalled || outcome.committed() == 0 {
                break;
            }
        }

        tracing::info!(
            processed = total.processed,
            ignored = total.ignored,
            skipped_malformed = total.skipped_malformed,
            stalled = total.stalled,
            "catch-up complete"
        );
        Ok(total)
    }

    /// Polls until `stop` turns true or its sender is dropped.
    ///
    /// Stop is checked between events, never in the middle of one. After an
    /// idle or stalled poll the loop waits `poll_interval` before polling
    /// again.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            processor = %self.config.processor_name,
            batch_size = self.config.batch_size,
            on_malformed = %self.config.on_malformed,
            "reactor started"
        );

        loop {
            if *stop.borrow() {
                break;
            }

            let outcome = self.poll(Some(&stop)).await?;
            if outcome.committed() > 0 && !outcome.stalled {
                continue;
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(processor = %self.config.processor_name, "reactor stopped");
        Ok(())
    }

    async fn poll(&self, stop: Option<&watch::Receiver<bool>>) -> Result<PollOutcome> {
        let processor = self.config.processor_name.as_str();

        let checkpoint = match self.log.load_checkpoint(processor).await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load checkpoint");
                metrics::counter!("reactor_stalls_total").increment(1);
                return Ok(PollOutcome::stall());
            }
        };

        let events = match self
            .log
            .read_after(checkpoint, self.config.batch_size)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read events");
                metrics::counter!("reactor_stalls_total").increment(1);
                return Ok(PollOutcome::stall());
            }
        };

        self.process_batch(checkpoint, events, stop).await
    }

    async fn process_batch(
        &self,
        mut checkpoint: Option<SequenceNumber>,
        events: Vec<InboundEvent>,
        stop: Option<&watch::Receiver<bool>>,
    ) -> Result<PollOutcome> {
        let processor = self.config.processor_name.as_str();
        let mut outcome = PollOutcome::default();

        for event in events {
            if stop.is_some_and(|stop| *stop.borrow()) {
                break;
            }

            let position = event.sequence_number;
            // Already past this one
            if checkpoint.is_some_and(|committed| position <= committed) {
                continue;
            }

            let start = Instant::now();
            let result = self.handler.handle(&event).await;
            metrics::histogram!("reactor_handler_duration_seconds")
                .record(start.elapsed().as_secs_f64());

            match result {
                Ok(Reaction::Ignored) => {
                    outcome.ignored += 1;
                    metrics::counter!("reactor_events_ignored_total").increment(1);
                }
                Ok(reaction) => {
                    outcome.processed += 1;
                    metrics::counter!("reactor_events_processed_total", "reaction" => reaction.as_str())
                        .increment(1);
                }
                Err(e) if e.is_malformed() => {
                    metrics::counter!("reactor_malformed_events_total").increment(1);
                    match self.config.on_malformed {
                        ErrorPolicy::Halt => {
                            tracing::error!(error = %e, "malformed event, halting");
                            return Err(e);
                        }
                        ErrorPolicy::Skip => {
                            tracing::warn!(error = %e, "malformed event, skipping");
                            outcome.skipped_malformed += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        event = %event.identity(),
                        handler = self.handler.name(),
                        "event handling failed, will retry"
                    );
                    metrics::counter!("reactor_stalls_total").increment(1);
                    outcome.stalled = true;
                    return Ok(outcome);
                }
            }

            if let Err(e) = self.log.commit_checkpoint(processor, position).await {
                tracing::warn!(error = %e, %position, "failed to commit checkpoint");
                metrics::counter!("reactor_stalls_total").increment(1);
                outcome.stalled = true;
                return Ok(outcome);
            }
            checkpoint = Some(position);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReactorError;
    use async_trait::async_trait;
    use common::AggregateId;
    use event_store::InMemoryEventLog;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Records the positions it sees; fails on configured event types.
    #[derive(Clone, Default)]
    struct RecordingHandler {
        seen: Arc<RwLock<Vec<i64>>>,
        failing: Arc<RwLock<Option<&'static str>>>,
    }

    impl RecordingHandler {
        async fn seen(&self) -> Vec<i64> {
            self.seen.read().await.clone()
        }

        async fn fail_on(&self, event_type: Option<&'static str>) {
            *self.failing.write().await = event_type;
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        fn name(&self) -> &'static str {
            "RecordingHandler"
        }

        async fn handle(&self, event: &InboundEvent) -> Result<Reaction> {
            self.seen.write().await.push(event.sequence_number.as_i64());

            if *self.failing.read().await == Some(event.event_type.as_str()) {
                return Err(event_store::EventStoreError::Unavailable("down".to_string()).into());
            }

            match event.event_type.as_str() {
                "bad" => Err(ReactorError::MalformedEvent {
                    identity: event.identity(),
                    event_type: event.event_type.clone(),
                    reason: "missing field `title`".to_string(),
                }),
                "other" => Ok(Reaction::Ignored),
                _ => Ok(Reaction::Inserted),
            }
        }
    }

    async fn seeded(types: &[&str]) -> InMemoryEventLog {
        let log = InMemoryEventLog::new();
        let id = AggregateId::new();
        for event_type in types {
            log.record(id, *event_type, json!({})).await;
        }
        log
    }

    fn reactor(
        log: &InMemoryEventLog,
        handler: &RecordingHandler,
        config: ReactorConfig,
    ) -> ReactorLoop<InMemoryEventLog, RecordingHandler> {
        ReactorLoop::new(log.clone(), handler.clone(), config)
    }

    #[tokio::test]
    async fn test_poll_processes_in_order_and_commits() {
        let log = seeded(&["good", "other", "good"]).await;
        let handler = RecordingHandler::default();
        let reactor = reactor(&log, &handler, ReactorConfig::default());

        let outcome = reactor.poll_once().await.unwrap();

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.ignored, 1);
        assert!(!outcome.stalled);
        assert_eq!(handler.seen().await, vec![1, 2, 3]);
        assert_eq!(reactor.checkpoint().await.unwrap(), Some(SequenceNumber::new(3)));

        assert!(reactor.poll_once().await.unwrap().is_idle());
        assert_eq!(handler.seen().await.len(), 3);
    }

    #[tokio::test]
    async fn test_batch_size_limits_each_poll() {
        let log = seeded(&["good", "good", "good"]).await;
        let handler = RecordingHandler::default();
        let reactor = reactor(&log, &handler, ReactorConfig::default().with_batch_size(2));

        assert_eq!(reactor.poll_once().await.unwrap().committed(), 2);
        assert_eq!(reactor.poll_once().await.unwrap().committed(), 1);
        assert!(reactor.poll_once().await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn test_catch_up_drains_the_log() {
        let log = seeded(&["good"; 7]).await;
        let handler = RecordingHandler::default();
        let reactor = reactor(&log, &handler, ReactorConfig::default().with_batch_size(3));

        let total = reactor.catch_up().await.unwrap();

        assert_eq!(total.processed, 7);
        assert_eq!(handler.seen().await, (1..=7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_handler_failure_stalls_without_commit() {
        let log = seeded(&["good", "flaky", "good"]).await;
        let handler = RecordingHandler::default();
        handler.fail_on(Some("flaky")).await;
        let reactor = reactor(&log, &handler, ReactorConfig::default());

        let outcome = reactor.poll_once().await.unwrap();
        assert!(outcome.stalled);
        assert_eq!(outcome.processed, 1);
        assert_eq!(reactor.checkpoint().await.unwrap(), Some(SequenceNumber::new(1)));

        handler.fail_on(None).await;
        let outcome = reactor.poll_once().await.unwrap();
        assert_eq!(outcome.processed, 2);
        assert_eq!(handler.seen().await, vec![1, 2, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_failure_stalls() {
        let log = seeded(&["good"]).await;
        let handler = RecordingHandler::default();
        let reactor = reactor(&log, &handler, ReactorConfig::default());
        log.set_fail_on_read(true);

        let outcome = reactor.poll_once().await.unwrap();

        assert_eq!(outcome, PollOutcome::stall());
        assert!(handler.seen().await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_redelivers_event() {
        let log = seeded(&["good"]).await;
        let handler = RecordingHandler::default();
        let reactor = reactor(&log, &handler, ReactorConfig::default());
        log.set_fail_on_commit(true);

        assert!(reactor.poll_once().await.unwrap().stalled);
        assert_eq!(reactor.checkpoint().await.unwrap(), None);

        log.set_fail_on_commit(false);
        assert_eq!(reactor.poll_once().await.unwrap().processed, 1);
        assert_eq!(handler.seen().await, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_malformed_event_halts_by_default() {
        let log = seeded(&["good", "bad", "good"]).await;
        let handler = RecordingHandler::default();
        let reactor = reactor(&log, &handler, ReactorConfig::default());

        let err = reactor.poll_once().await.unwrap_err();

        assert!(err.is_malformed());
        assert_eq!(reactor.checkpoint().await.unwrap(), Some(SequenceNumber::new(1)));
        assert_eq!(handler.seen().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_malformed_event_skipped_under_skip_policy() {
        let log = seeded(&["good", "bad", "good"]).await;
        let handler = RecordingHandler::default();
        let config = ReactorConfig::default().with_error_policy(ErrorPolicy::Skip);
        let reactor = reactor(&log, &handler, config);

        let outcome = reactor.poll_once().await.unwrap();

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.skipped_malformed, 1);
        assert_eq!(reactor.checkpoint().await.unwrap(), Some(SequenceNumber::new(3)));
    }

    #[tokio::test]
    async fn test_positions_at_or_below_checkpoint_are_skipped() {
        let log = seeded(&["good", "good", "good"]).await;
        let handler = RecordingHandler::default();
        let reactor = reactor(&log, &handler, ReactorConfig::default());
        let events = log.events().await;

        let outcome = reactor
            .process_batch(Some(SequenceNumber::new(2)), events, None)
            .await
            .unwrap();

        assert_eq!(outcome.processed, 1);
        assert_eq!(handler.seen().await, vec![3]);
    }

    #[tokio::test]
    async fn test_checkpoints_are_per_processor() {
        let log = seeded(&["good", "good"]).await;
        let first = RecordingHandler::default();
        let second = RecordingHandler::default();
        let a = reactor(&log, &first, ReactorConfig::new("a"));
        let b = reactor(&log, &second, ReactorConfig::new("b"));

        a.catch_up().await.unwrap();
        b.catch_up().await.unwrap();

        assert_eq!(first.seen().await, vec![1, 2]);
        assert_eq!(second.seen().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_already_stopped() {
        let log = seeded(&["good"]).await;
        let handler = RecordingHandler::default();
        let reactor = reactor(&log, &handler, ReactorConfig::default());
        let (_tx, rx) = watch::channel(true);

        reactor.run(rx).await.unwrap();

        assert!(handler.seen().await.is_empty());
        assert_eq!(reactor.checkpoint().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let log = seeded(&["good", "good"]).await;
        let handler = RecordingHandler::default();
        let reactor = reactor(&log, &handler, ReactorConfig::default());
        let (tx, rx) = watch::channel(false);
        drop(tx);

        reactor.run(rx).await.unwrap();

        assert_eq!(handler.seen().await, vec![1, 2]);
    }
}
