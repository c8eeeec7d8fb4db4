//! End-to-end tests for the order-event consumer over in-memory components.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use compensation::{FailureReason, InMemoryCompensationPublisher};
use consumer::{
    CommitPolicy, ConsumerConfig, ConsumerState, EventConsumer, EventOutcome,
    InMemoryEventSource, OrderEvent,
};
use ledger::{CreateProductRequest, Money, ProductId, StockLedger};
use stock_store::{InMemoryStockStore, Product, StockLevels, StockStore, StoreError};
use tokio::sync::{Mutex, watch};

/// Store wrapper whose deductions fail with `Unavailable` a set number of
/// times per product before reaching the real store.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: InMemoryStockStore,
    failures: Arc<Mutex<HashMap<ProductId, usize>>>,
}

impl FlakyStore {
    async fn fail_next(&self, product_id: &str, times: usize) {
        self.failures
            .lock()
            .await
            .insert(ProductId::new(product_id), times);
    }
}

#[async_trait]
impl StockStore for FlakyStore {
    async fn create(&self, product: Product) -> stock_store::Result<Product> {
        self.inner.create(product).await
    }

    async fn get(&self, product_id: &ProductId) -> stock_store::Result<Product> {
        self.inner.get(product_id).await
    }

    async fn deduct_stock(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> stock_store::Result<StockLevels> {
        {
            let mut failures = self.failures.lock().await;
            if let Some(remaining) = failures.get_mut(product_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StoreError::Unavailable("connection reset".to_string()));
                }
            }
        }
        self.inner.deduct_stock(product_id, quantity).await
    }

    async fn ping(&self) -> stock_store::Result<()> {
        self.inner.ping().await
    }
}

/// Store wrapper that delays every deduction.
#[derive(Clone)]
struct SlowStore {
    inner: InMemoryStockStore,
    delay: Duration,
}

#[async_trait]
impl StockStore for SlowStore {
    async fn create(&self, product: Product) -> stock_store::Result<Product> {
        self.inner.create(product).await
    }

    async fn get(&self, product_id: &ProductId) -> stock_store::Result<Product> {
        self.inner.get(product_id).await
    }

    async fn deduct_stock(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> stock_store::Result<StockLevels> {
        tokio::time::sleep(self.delay).await;
        self.inner.deduct_stock(product_id, quantity).await
    }

    async fn ping(&self) -> stock_store::Result<()> {
        self.inner.ping().await
    }
}

struct TestHarness<S: StockStore> {
    ledger: Arc<StockLedger<S>>,
    source: InMemoryEventSource,
    publisher: InMemoryCompensationPublisher,
}

impl TestHarness<InMemoryStockStore> {
    async fn new(products: &[(&str, i64)]) -> Self {
        Self::with_store(InMemoryStockStore::new(), products).await
    }
}

impl<S: StockStore + 'static> TestHarness<S> {
    async fn with_store(store: S, products: &[(&str, i64)]) -> Self {
        let ledger = StockLedger::new(store);
        for (id, stock) in products {
            ledger
                .create_product(CreateProductRequest::new(
                    *id,
                    "Test product",
                    Money::from_cents(1000),
                    *stock,
                ))
                .await
                .unwrap();
        }

        Self {
            ledger: Arc::new(ledger),
            source: InMemoryEventSource::new(),
            publisher: InMemoryCompensationPublisher::new(),
        }
    }

    fn consumer(&self, config: ConsumerConfig) -> EventConsumer<S> {
        EventConsumer::new(
            self.ledger.clone(),
            Arc::new(self.source.clone()),
            config,
        )
        .with_publisher(Arc::new(self.publisher.clone()))
    }

    async fn stock(&self, id: &str) -> i64 {
        self.ledger
            .get_product(&ProductId::new(id))
            .await
            .unwrap()
            .stock
    }
}

fn order_json(event_id: &str, order_id: i64, items: &[(&str, i64)]) -> serde_json::Value {
    let items: Vec<_> = items
        .iter()
        .map(|(product_id, quantity)| {
            serde_json::json!({
                "product_id": product_id,
                "product_name": "Test product",
                "quantity": quantity,
                "price": 10.0
            })
        })
        .collect();

    serde_json::json!({
        "event_id": event_id,
        "order_id": order_id,
        "user_id": "user-1",
        "total_amount": 10.0,
        "items": items,
        "status": "created",
        "timestamp": "2026-03-01T12:00:00Z",
        "request_id": format!("req-{event_id}")
    })
}

fn order_event(event_id: &str, order_id: i64, items: &[(&str, i64)]) -> OrderEvent {
    let payload = order_json(event_id, order_id, items).to_string();
    OrderEvent::decode(payload.as_bytes()).unwrap()
}

fn fast_config() -> ConsumerConfig {
    ConsumerConfig::default().with_poll_timeout(Duration::from_millis(20))
}

async fn wait_for_commit(source: &InMemoryEventSource, offset: i64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while source.committed_offset().await < Some(offset) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("offset was not committed in time");
}

#[tokio::test]
async fn failed_item_keeps_earlier_deductions_and_compensates_once() {
    let harness = TestHarness::new(&[("A", 10), ("B", 0)]).await;
    let consumer = harness.consumer(ConsumerConfig::default());

    let outcome = consumer
        .apply_event(&order_event("evt-1", 1, &[("A", 2), ("B", 3)]))
        .await;

    assert_eq!(
        outcome,
        EventOutcome::Failed {
            applied: 1,
            skipped: 0,
            product_id: ProductId::new("B"),
            reason: FailureReason::InsufficientStock,
            compensated: true,
        }
    );
    assert_eq!(harness.stock("A").await, 8);
    assert_eq!(harness.stock("B").await, 0);

    let notices = harness.publisher.notices().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].product_id, ProductId::new("B"));
    assert_eq!(notices[0].quantity, 3);
}

#[tokio::test]
async fn compensation_payload_for_insufficient_stock() {
    let harness = TestHarness::new(&[("P1", 5)]).await;
    let consumer = harness.consumer(ConsumerConfig::default());

    consumer
        .apply_event(&order_event("evt-1", 77, &[("P1", 10)]))
        .await;

    let notices = harness.publisher.notices().await;
    assert_eq!(notices.len(), 1);
    let json = serde_json::to_value(&notices[0]).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "order_id": 77,
            "product_id": "P1",
            "quantity": 10,
            "reason": "insufficient_stock"
        })
    );
    assert_eq!(harness.stock("P1").await, 5);
}

#[tokio::test]
async fn processing_stops_at_first_failure() {
    let harness = TestHarness::new(&[("A", 10), ("B", 1), ("C", 10)]).await;
    let consumer = harness.consumer(ConsumerConfig::default());

    consumer
        .apply_event(&order_event("evt-1", 1, &[("A", 1), ("B", 99), ("C", 1)]))
        .await;

    assert_eq!(harness.stock("A").await, 9);
    assert_eq!(harness.stock("B").await, 1);
    assert_eq!(harness.stock("C").await, 10);
    assert_eq!(harness.publisher.notices().await.len(), 1);
}

#[tokio::test]
async fn missing_product_is_reported_as_not_found() {
    let harness = TestHarness::new(&[]).await;
    let consumer = harness.consumer(ConsumerConfig::default());

    let outcome = consumer
        .apply_event(&order_event("evt-1", 5, &[("ghost", 1)]))
        .await;

    assert!(matches!(
        outcome,
        EventOutcome::Failed {
            reason: FailureReason::ProductNotFound,
            ..
        }
    ));
    assert_eq!(
        harness.publisher.notices().await[0].reason,
        FailureReason::ProductNotFound
    );
}

#[tokio::test]
async fn store_outage_is_reported_as_transient() {
    let store = FlakyStore::default();
    store.fail_next("A", 1).await;
    let harness = TestHarness::with_store(store, &[("A", 10)]).await;
    let consumer = harness.consumer(ConsumerConfig::default());

    let outcome = consumer
        .apply_event(&order_event("evt-1", 5, &[("A", 1)]))
        .await;

    assert!(matches!(
        outcome,
        EventOutcome::Failed {
            reason: FailureReason::TransientError,
            ..
        }
    ));
    assert_eq!(harness.stock("A").await, 10);
}

#[tokio::test]
async fn successful_deductions_are_announced() {
    let harness = TestHarness::new(&[("A", 10), ("B", 4)]).await;
    let consumer = harness.consumer(ConsumerConfig::default());

    let outcome = consumer
        .apply_event(&order_event("evt-1", 9, &[("A", 3), ("B", 4)]))
        .await;

    assert_eq!(
        outcome,
        EventOutcome::Completed {
            applied: 2,
            skipped: 0
        }
    );
    let events = harness.publisher.deducted_events().await;
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].product_id.as_str(), events[0].new_stock), ("A", 7));
    assert_eq!((events[1].product_id.as_str(), events[1].new_stock), ("B", 0));
    assert!(harness.publisher.notices().await.is_empty());
}

#[tokio::test]
async fn advance_always_reapplies_duplicate_delivery() {
    let harness = TestHarness::new(&[("A", 10)]).await;
    let consumer = harness.consumer(ConsumerConfig::default());
    let event = order_event("evt-1", 1, &[("A", 2)]);

    consumer.apply_event(&event).await;
    consumer.apply_event(&event).await;

    assert_eq!(harness.stock("A").await, 6);
}

#[tokio::test]
async fn idempotent_retry_skips_duplicate_delivery() {
    let harness = TestHarness::new(&[("A", 10), ("B", 10)]).await;
    let consumer = harness.consumer(
        ConsumerConfig::default()
            .with_commit_policy(CommitPolicy::idempotent_retry(3, Duration::ZERO)),
    );
    let event = order_event("evt-1", 1, &[("A", 2), ("B", 1)]);

    consumer.apply_event(&event).await;
    let outcome = consumer.apply_event(&event).await;

    assert_eq!(
        outcome,
        EventOutcome::Completed {
            applied: 0,
            skipped: 2
        }
    );
    assert_eq!(harness.stock("A").await, 8);
    assert_eq!(harness.stock("B").await, 9);
}

#[tokio::test]
async fn idempotent_retry_recovers_without_double_deduction() {
    let store = FlakyStore::default();
    store.fail_next("B", 1).await;
    let harness = TestHarness::with_store(store, &[("A", 10), ("B", 10)]).await;
    let consumer = harness.consumer(
        ConsumerConfig::default()
            .with_commit_policy(CommitPolicy::idempotent_retry(3, Duration::from_millis(1))),
    );

    let outcome = consumer
        .apply_event(&order_event("evt-1", 1, &[("A", 2), ("B", 3)]))
        .await;

    assert_eq!(
        outcome,
        EventOutcome::Completed {
            applied: 2,
            skipped: 0
        }
    );
    assert_eq!(harness.stock("A").await, 8);
    assert_eq!(harness.stock("B").await, 7);
    assert!(harness.publisher.notices().await.is_empty());
}

#[tokio::test]
async fn idempotent_retry_compensates_after_exhausting_attempts() {
    let store = FlakyStore::default();
    store.fail_next("B", 5).await;
    let harness = TestHarness::with_store(store, &[("A", 10), ("B", 10)]).await;
    let consumer = harness.consumer(
        ConsumerConfig::default()
            .with_commit_policy(CommitPolicy::idempotent_retry(3, Duration::ZERO)),
    );

    let outcome = consumer
        .apply_event(&order_event("evt-1", 1, &[("A", 2), ("B", 3)]))
        .await;

    assert!(matches!(
        outcome,
        EventOutcome::Failed {
            applied: 1,
            reason: FailureReason::TransientError,
            ..
        }
    ));
    assert_eq!(harness.stock("A").await, 8);
    assert_eq!(harness.stock("B").await, 10);
    assert_eq!(harness.publisher.notices().await.len(), 1);
}

#[tokio::test]
async fn publish_failure_does_not_stop_the_consumer() {
    let harness = TestHarness::new(&[("A", 1)]).await;
    harness.publisher.set_fail_on_publish(true);
    let consumer = Arc::new(harness.consumer(fast_config()));

    harness
        .source
        .push_json(&order_json("evt-1", 1, &[("A", 5)]))
        .await;
    let last = harness
        .source
        .push_json(&order_json("evt-2", 2, &[("A", 1)]))
        .await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.run(shutdown_rx).await })
    };

    wait_for_commit(&harness.source, last).await;
    shutdown_tx.send(true).unwrap();
    let stats = runner.await.unwrap();

    assert_eq!(stats.events_failed, 1);
    assert_eq!(stats.events_completed, 1);
    assert_eq!(stats.compensations_published, 0);
    assert_eq!(harness.stock("A").await, 0);
}

#[tokio::test]
async fn run_loop_commits_every_record_including_failures_and_garbage() {
    let harness = TestHarness::new(&[("A", 10), ("B", 0)]).await;
    let consumer = Arc::new(harness.consumer(fast_config()));

    harness
        .source
        .push_json(&order_json("evt-1", 1, &[("A", 2)]))
        .await;
    harness.source.push("{definitely not json").await;
    harness
        .source
        .push_json(&order_json("evt-2", 2, &[("A", 1), ("B", 1)]))
        .await;
    let last = harness
        .source
        .push_json(&order_json("evt-3", 3, &[("A", 3)]))
        .await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.run(shutdown_rx).await })
    };

    wait_for_commit(&harness.source, last).await;
    shutdown_tx.send(true).unwrap();
    let stats = runner.await.unwrap();

    assert_eq!(harness.source.commits().await, vec![0, 1, 2, 3]);
    assert_eq!(stats.events_completed, 2);
    assert_eq!(stats.events_failed, 1);
    assert_eq!(stats.events_malformed, 1);
    assert_eq!(stats.compensations_published, 1);
    assert_eq!(stats.records_seen(), 4);
    assert_eq!(harness.stock("A").await, 4);
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}

#[tokio::test]
async fn shutdown_while_idle_stops_within_poll_timeout() {
    let harness = TestHarness::new(&[]).await;
    let consumer = Arc::new(harness.consumer(
        ConsumerConfig::default().with_poll_timeout(Duration::from_millis(200)),
    ));
    let mut states = consumer.subscribe_state();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.run(shutdown_rx).await })
    };

    states
        .wait_for(|state| *state == ConsumerState::Fetching)
        .await
        .unwrap();
    shutdown_tx.send(true).unwrap();

    let stats = tokio::time::timeout(Duration::from_millis(500), runner)
        .await
        .expect("consumer did not stop within the poll timeout")
        .unwrap();

    assert_eq!(stats.records_seen(), 0);
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}

#[tokio::test]
async fn dropped_shutdown_sender_stops_the_consumer() {
    let harness = TestHarness::new(&[]).await;
    let consumer = harness.consumer(fast_config());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(shutdown_tx);

    let stats = tokio::time::timeout(Duration::from_secs(1), consumer.run(shutdown_rx))
        .await
        .unwrap();
    assert_eq!(stats.records_seen(), 0);
    assert!(consumer.state().is_terminal());
}

#[tokio::test]
async fn health_check_follows_the_source() {
    let harness = TestHarness::new(&[]).await;
    let consumer = harness.consumer(fast_config());

    assert!(consumer.health_check().await.is_ok());
    harness.source.set_unreachable(true);
    assert!(consumer.health_check().await.is_err());
}

#[tokio::test]
async fn numeric_catalog_ids_resolve_to_products() {
    let harness = TestHarness::new(&[("PROD001", 5)]).await;
    let consumer = harness.consumer(ConsumerConfig::default());

    let payload = serde_json::json!({
        "event_id": "evt-num",
        "order_id": 3,
        "user_id": "user-1",
        "total_amount": 20.0,
        "items": [{"product_id": 1, "product_name": "Widget", "quantity": 2, "price": 10.0}],
        "status": "created",
        "timestamp": "2026-03-01T12:00:00Z",
        "request_id": "req-num"
    })
    .to_string();
    let event = OrderEvent::decode(payload.as_bytes()).unwrap();

    let outcome = consumer.apply_event(&event).await;
    assert!(matches!(outcome, EventOutcome::Completed { applied: 1, .. }));
    assert_eq!(harness.stock("PROD001").await, 3);
}

#[tokio::test]
async fn idempotency_record_evicts_oldest_events() {
    let harness = TestHarness::new(&[("A", 100)]).await;
    let consumer = harness.consumer(
        ConsumerConfig::default()
            .with_commit_policy(CommitPolicy::idempotent_retry(3, Duration::ZERO))
            .with_idempotency_window(2),
    );

    for n in 0..3 {
        consumer
            .apply_event(&order_event(&format!("e{n}"), n, &[("A", 1)]))
            .await;
    }

    let recent = consumer
        .apply_event(&order_event("e2", 2, &[("A", 1)]))
        .await;
    assert_eq!(
        recent,
        EventOutcome::Completed {
            applied: 0,
            skipped: 1
        }
    );

    let evicted = consumer
        .apply_event(&order_event("e0", 0, &[("A", 1)]))
        .await;
    assert_eq!(
        evicted,
        EventOutcome::Completed {
            applied: 1,
            skipped: 0
        }
    );
    assert_eq!(harness.stock("A").await, 96);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_during_apply_finishes_and_commits_the_event() {
    let store = SlowStore {
        inner: InMemoryStockStore::new(),
        delay: Duration::from_millis(100),
    };
    let harness = TestHarness::with_store(store, &[("A", 10), ("C", 10)]).await;
    let consumer = Arc::new(harness.consumer(fast_config()));
    let mut states = consumer.subscribe_state();

    harness
        .source
        .push_json(&order_json("evt-1", 1, &[("A", 1), ("C", 1)]))
        .await;
    harness
        .source
        .push_json(&order_json("evt-2", 2, &[("A", 1)]))
        .await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.run(shutdown_rx).await })
    };

    states
        .wait_for(|state| *state == ConsumerState::Applying)
        .await
        .unwrap();
    shutdown_tx.send(true).unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("consumer did not stop")
        .unwrap();

    assert_eq!(stats.events_completed, 1);
    assert_eq!(harness.stock("A").await, 9);
    assert_eq!(harness.stock("C").await, 9);
    assert_eq!(harness.source.commits().await, vec![0]);
    assert_eq!(harness.source.pending_count().await, 1);
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_cuts_retry_backoff_short() {
    let store = FlakyStore::default();
    store.fail_next("A", 5).await;
    let harness = TestHarness::with_store(store, &[("A", 10)]).await;
    let consumer = Arc::new(harness.consumer(
        fast_config().with_commit_policy(CommitPolicy::idempotent_retry(
            3,
            Duration::from_secs(30),
        )),
    ));
    let mut states = consumer.subscribe_state();

    harness
        .source
        .push_json(&order_json("evt-1", 1, &[("A", 1)]))
        .await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.run(shutdown_rx).await })
    };

    states
        .wait_for(|state| *state == ConsumerState::Applying)
        .await
        .unwrap();
    shutdown_tx.send(true).unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(2), runner)
        .await
        .expect("retry backoff ignored shutdown")
        .unwrap();

    assert_eq!(stats.events_failed, 1);
    assert_eq!(harness.source.commits().await, vec![0]);
    assert_eq!(harness.stock("A").await, 10);
    let notices = harness.publisher.notices().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].reason, FailureReason::TransientError);
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}
