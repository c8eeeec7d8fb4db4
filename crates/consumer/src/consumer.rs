//! The order-event consumer loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::ProductId;
use compensation::{CompensationNotice, CompensationPublisher, FailureReason, StockDeductedEvent};
use ledger::{LedgerError, StockLedger};
use stock_store::StockStore;
use tokio::sync::{Mutex, watch};

use crate::applied::AppliedItems;
use crate::{
    CommitPolicy, ConsumerConfig, ConsumerState, ConsumerStats, EventSource, InboundRecord,
    OrderEvent, OrderLineItem, Result,
};

/// How a decoded event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Every line item was deducted or had already been deducted.
    Completed { applied: usize, skipped: usize },
    /// Processing stopped at the first failing item. Items before it stay
    /// deducted; items after it were not attempted.
    Failed {
        applied: usize,
        skipped: usize,
        product_id: ProductId,
        reason: FailureReason,
        compensated: bool,
    },
}

/// Result of one pass over an event's line items.
enum Pass {
    Completed,
    Failed {
        item: OrderLineItem,
        error: LedgerError,
    },
}

/// Drives the stock ledger from a stream of order events.
///
/// One task runs [`EventConsumer::run`]; the ledger may be used concurrently
/// by other callers.
pub struct EventConsumer<S: StockStore> {
    ledger: Arc<StockLedger<S>>,
    source: Arc<dyn EventSource>,
    publisher: Option<Arc<dyn CompensationPublisher>>,
    config: ConsumerConfig,
    state: watch::Sender<ConsumerState>,
    applied: Mutex<AppliedItems>,
}

impl<S: StockStore> EventConsumer<S> {
    pub fn new(
        ledger: Arc<StockLedger<S>>,
        source: Arc<dyn EventSource>,
        config: ConsumerConfig,
    ) -> Self {
        let (state, _) = watch::channel(ConsumerState::Idle);
        let applied = Mutex::new(AppliedItems::new(config.idempotency_window));
        Self {
            ledger,
            source,
            publisher: None,
            config,
            state,
            applied,
        }
    }

    /// Emits compensation notices and stock-deducted events through `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn CompensationPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Watches lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Liveness of the underlying stream.
    pub async fn health_check(&self) -> Result<()> {
        self.source.health_check().await
    }

    fn transition(&self, next: ConsumerState) {
        self.state.send_replace(next);
    }

    /// Runs the fetch, decode, apply and commit loop until `shutdown` turns
    /// `true` or its sender is dropped.
    ///
    /// Shutdown is observed while fetching, so the loop stops within one poll
    /// timeout. An event already being applied is finished and committed
    /// first. A pending retry backoff is cut short and the event is
    /// compensated as a transient failure.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ConsumerStats {
        let mut stats = ConsumerStats::default();
        tracing::info!(
            poll_timeout_ms = self.config.poll_timeout.as_millis() as u64,
            commit_policy = self.config.commit_policy.name(),
            "order event consumer started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.transition(ConsumerState::Fetching);
            let fetched = tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => break,
                fetched = self.source.fetch(self.config.poll_timeout) => fetched,
            };

            match fetched {
                Ok(Some(record)) => self.process_record(record, &mut stats, &mut shutdown).await,
                Ok(None) => self.transition(ConsumerState::Idle),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to fetch order events");
                    self.transition(ConsumerState::Idle);
                    tokio::select! {
                        biased;
                        () = shutdown_requested(&mut shutdown) => break,
                        () = tokio::time::sleep(self.config.fetch_error_backoff) => {}
                    }
                }
            }
        }

        self.transition(ConsumerState::Cancelling);
        tracing::info!(
            events_completed = stats.events_completed,
            events_failed = stats.events_failed,
            events_malformed = stats.events_malformed,
            "order event consumer stopping"
        );
        self.transition(ConsumerState::Stopped);

        stats
    }

    async fn process_record(
        &self,
        record: InboundRecord,
        stats: &mut ConsumerStats,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        metrics::counter!("order_events_consumed").increment(1);
        tracing::debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            key = ?record.key,
            "processing message"
        );

        self.transition(ConsumerState::Decoding);
        let event = match OrderEvent::decode(&record.payload) {
            Ok(event) => event,
            Err(err) => {
                // Skip and advance so one bad payload cannot stall the partition.
                stats.events_malformed += 1;
                metrics::counter!("order_events_malformed").increment(1);
                tracing::error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %err,
                    "skipping malformed order event"
                );
                self.commit(&record).await;
                return;
            }
        };

        self.transition(ConsumerState::Applying);
        match self.apply(&event, Some(shutdown)).await {
            EventOutcome::Completed { skipped, .. } => {
                stats.events_completed += 1;
                stats.duplicate_items += skipped as u64;
            }
            EventOutcome::Failed {
                skipped,
                compensated,
                ..
            } => {
                stats.events_failed += 1;
                stats.duplicate_items += skipped as u64;
                if compensated {
                    stats.compensations_published += 1;
                }
            }
        }

        self.commit(&record).await;
    }

    async fn commit(&self, record: &InboundRecord) {
        self.transition(ConsumerState::Committing);
        if let Err(err) = self.source.commit(record).await {
            tracing::warn!(
                partition = record.partition,
                offset = record.offset,
                error = %err,
                "failed to commit offset (event may be redelivered)"
            );
        }
        self.transition(ConsumerState::Idle);
    }

    /// Applies an event's line items in order, stopping at the first failure.
    ///
    /// A failed item produces exactly one compensation notice when a
    /// publisher is configured.
    pub async fn apply_event(&self, event: &OrderEvent) -> EventOutcome {
        self.apply(event, None).await
    }

    #[tracing::instrument(
        skip(self, event, shutdown),
        fields(event_id = %event.event_id, order_id = %event.order_id, request_id = %event.request_id)
    )]
    async fn apply(
        &self,
        event: &OrderEvent,
        mut shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> EventOutcome {
        tracing::info!(
            user_id = %event.user_id,
            items = event.items.len(),
            "processing order event"
        );

        let (max_attempts, backoff) = match self.config.commit_policy {
            CommitPolicy::AdvanceAlways => (1, Duration::ZERO),
            CommitPolicy::IdempotentRetry {
                max_attempts,
                backoff,
            } => (max_attempts.max(1), backoff),
        };

        let mut progress = Progress::default();
        let mut attempt = 1;
        loop {
            match self.apply_items(event, &mut progress).await {
                Pass::Completed => {
                    tracing::info!(
                        applied = progress.applied,
                        skipped = progress.skipped,
                        "order processing completed"
                    );
                    return EventOutcome::Completed {
                        applied: progress.applied,
                        skipped: progress.skipped,
                    };
                }
                Pass::Failed { item, error } => {
                    if matches!(&error, LedgerError::TransientStore(_)) && attempt < max_attempts {
                        tracing::warn!(attempt, max_attempts, "transient failure, retrying event");
                        if pause_for_retry(backoff, shutdown.as_deref_mut()).await {
                            attempt += 1;
                            continue;
                        }
                        tracing::warn!(attempt, "shutdown requested, abandoning retries");
                    }

                    let reason = failure_reason(&error);
                    metrics::counter!("order_events_failed", "reason" => reason.as_str())
                        .increment(1);
                    tracing::error!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        %reason,
                        error = %error,
                        "failed to deduct stock, stopping event"
                    );
                    let compensated = self.compensate(event, &item, reason).await;
                    return EventOutcome::Failed {
                        applied: progress.applied,
                        skipped: progress.skipped,
                        product_id: item.product_id,
                        reason,
                        compensated,
                    };
                }
            }
        }
    }

    /// One pass over the items not yet settled in `progress`.
    async fn apply_items(&self, event: &OrderEvent, progress: &mut Progress) -> Pass {
        let track_keys = self.config.commit_policy.tracks_idempotency_keys();

        for (index, item) in event.items.iter().enumerate() {
            if progress.settled.contains(&index) {
                continue;
            }

            if track_keys
                && self
                    .applied
                    .lock()
                    .await
                    .contains(&event.event_id, index, &item.product_id)
            {
                progress.skipped += 1;
                progress.settled.insert(index);
                metrics::counter!("order_events_duplicate_items").increment(1);
                tracing::info!(product_id = %item.product_id, "line item already applied, skipping");
                continue;
            }

            match self.ledger.deduct_stock(&item.product_id, item.quantity).await {
                Ok(result) => {
                    progress.applied += 1;
                    progress.settled.insert(index);
                    if track_keys {
                        self.applied.lock().await.insert(
                            &event.event_id,
                            index,
                            item.product_id.clone(),
                        );
                    }
                    tracing::info!(
                        product_id = %item.product_id,
                        previous_stock = result.previous_stock,
                        new_stock = result.new_stock,
                        deducted = result.deducted,
                        "line item deducted"
                    );
                    self.announce_deduction(event, item, result.new_stock).await;
                }
                Err(failure) => {
                    return Pass::Failed {
                        item: item.clone(),
                        error: failure.error,
                    };
                }
            }
        }

        Pass::Completed
    }

    /// Publishes a compensation notice. Returns whether it was accepted.
    async fn compensate(
        &self,
        event: &OrderEvent,
        item: &OrderLineItem,
        reason: FailureReason,
    ) -> bool {
        let Some(publisher) = &self.publisher else {
            tracing::warn!(product_id = %item.product_id, "no compensation publisher configured");
            return false;
        };

        let notice = CompensationNotice::new(
            event.order_id,
            item.product_id.clone(),
            item.quantity,
            reason,
        );
        match publisher.publish_stock_deduction_failed(&notice).await {
            Ok(()) => {
                metrics::counter!("compensation_notices_published").increment(1);
                tracing::info!(product_id = %item.product_id, %reason, "compensation notice published");
                true
            }
            Err(err) => {
                metrics::counter!("compensation_publish_failures").increment(1);
                tracing::error!(
                    product_id = %item.product_id,
                    error = %err,
                    "failed to publish compensation notice"
                );
                false
            }
        }
    }

    async fn announce_deduction(&self, event: &OrderEvent, item: &OrderLineItem, new_stock: i64) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let deducted = StockDeductedEvent::new(
            event.order_id,
            item.product_id.clone(),
            item.quantity,
            new_stock,
        );
        if let Err(err) = publisher.publish_stock_deducted(&deducted).await {
            tracing::warn!(
                product_id = %item.product_id,
                error = %err,
                "failed to publish stock deducted event"
            );
        }
    }
}

/// Items settled so far while applying one event, across retry passes.
#[derive(Debug, Default)]
struct Progress {
    applied: usize,
    skipped: usize,
    settled: HashSet<usize>,
}

fn failure_reason(error: &LedgerError) -> FailureReason {
    match error {
        LedgerError::InsufficientStock { .. } => FailureReason::InsufficientStock,
        LedgerError::NotFound(_) => FailureReason::ProductNotFound,
        LedgerError::TransientStore(_)
        | LedgerError::InvalidRequest(_)
        | LedgerError::AlreadyExists(_) => FailureReason::TransientError,
    }
}

/// Waits out a retry backoff. Returns `false` if shutdown was requested
/// first.
async fn pause_for_retry(backoff: Duration, shutdown: Option<&mut watch::Receiver<bool>>) -> bool {
    match shutdown {
        None => {
            tokio::time::sleep(backoff).await;
            true
        }
        Some(shutdown) => tokio::select! {
            biased;
            () = shutdown_requested(shutdown) => false,
            () = tokio::time::sleep(backoff) => true,
        },
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
