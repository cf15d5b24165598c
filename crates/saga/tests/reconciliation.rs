//! End-to-end tests across the command service, the broker, and the saga
//! consumer.
//!
//! The wiring mirrors the deployment: the two product repositories are
//! separate copies reconciled only through the event stream, while the
//! order repository handle is shared between the sides (one orders table).

use std::sync::Arc;
use std::time::Duration;

use broker::{
    Connection, EventPublisher, InProcessBroker, MessageBroker, ORDER_EVENTS_QUEUE, RetryPolicy,
    Topology,
};
use common::{ProductId, UserId};
use domain::{
    CancelOrder, InMemoryOrderRepository, InMemoryProductRepository, Money, OrderRepository,
    OrderStatus, PayOrder, PlaceOrder, Product, ProductRepository,
};
use event_store::InMemoryEventStore;
use orders::{InMemoryOutbox, OrderService, OutboxRelay};
use saga::{InMemoryAppliedEventLog, OrderEventConsumer, run_consumer};
use tokio::sync::watch;

type Service = OrderService<
    InMemoryProductRepository,
    InMemoryOrderRepository,
    InMemoryEventStore,
    InMemoryOutbox,
>;

struct Pipeline {
    service: Service,
    relay: OutboxRelay<InMemoryOutbox>,
    broker: InProcessBroker,
    store: InMemoryEventStore,
    command_products: InMemoryProductRepository,
    consumer_products: InMemoryProductRepository,
    orders: InMemoryOrderRepository,
    shutdown_tx: watch::Sender<bool>,
    consumer_task: tokio::task::JoinHandle<Result<(), saga::ConsumerError>>,
}

async fn start(stock: u32) -> Pipeline {
    let broker = InProcessBroker::new();
    broker
        .declare_topology(&Topology::storefront())
        .await
        .unwrap();
    let store = InMemoryEventStore::new();
    let outbox = InMemoryOutbox::new();
    let orders = InMemoryOrderRepository::new();

    let seed = |stock| Product::new(ProductId::new(5), "Keyboard", Money::from_cents(1000), stock);
    let command_products = InMemoryProductRepository::seeded(vec![seed(stock)]).await;
    let consumer_products = InMemoryProductRepository::seeded(vec![seed(stock)]).await;

    let service = OrderService::new(
        command_products.clone(),
        orders.clone(),
        store.clone(),
        outbox.clone(),
    );

    let publisher_conn = Connection::with_policy(
        Arc::new(broker.clone()),
        Topology::storefront(),
        RetryPolicy::no_retries(),
    );
    let relay = OutboxRelay::new(outbox, EventPublisher::new(Arc::new(publisher_conn)));

    let consumer = OrderEventConsumer::new(
        consumer_products.clone(),
        orders.clone(),
        InMemoryAppliedEventLog::new(),
    );
    let consumer_conn = Arc::new(Connection::with_policy(
        Arc::new(broker.clone()),
        Topology::storefront(),
        RetryPolicy::no_retries(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_task =
        tokio::spawn(async move { run_consumer(consumer_conn, consumer, shutdown_rx).await });

    Pipeline {
        service,
        relay,
        broker,
        store,
        command_products,
        consumer_products,
        orders,
        shutdown_tx,
        consumer_task,
    }
}

async fn consumer_stock(pipeline: &Pipeline) -> u32 {
    pipeline
        .consumer_products
        .find(ProductId::new(5))
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn command_stock(pipeline: &Pipeline) -> u32 {
    pipeline
        .command_products
        .find(ProductId::new(5))
        .await
        .unwrap()
        .unwrap()
        .stock
}

/// Polls until the condition holds; the event stream is asynchronous, so a
/// client can observe "order placed" before the consumer-side projection
/// has caught up. Two seconds bounds the allowed staleness in these tests.
async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

#[tokio::test]
async fn paid_order_is_completed_on_the_consumer_side() {
    let p = start(10).await;

    let order = p
        .service
        .place_order(PlaceOrder::new(UserId::new(3), ProductId::new(5), 2))
        .await
        .unwrap();
    p.relay.drain().await.unwrap();
    wait_until(|| async { consumer_stock(&p).await == 8 }).await;

    let paid = p
        .service
        .pay_order(PayOrder::new(UserId::new(3), order.id))
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);
    p.relay.drain().await.unwrap();

    wait_until(|| async {
        p.orders.find(order.id).await.unwrap().unwrap().status == OrderStatus::Completed
    })
    .await;

    // The two stock copies are intentionally skewed: the command side never
    // decrements its own copy.
    assert_eq!(command_stock(&p).await, 10);
    assert_eq!(consumer_stock(&p).await, 8);

    p.shutdown_tx.send(true).unwrap();
    p.consumer_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancelled_order_restores_consumer_stock() {
    let p = start(10).await;

    let order = p
        .service
        .place_order(PlaceOrder::new(UserId::new(3), ProductId::new(5), 2))
        .await
        .unwrap();
    p.relay.drain().await.unwrap();
    wait_until(|| async { consumer_stock(&p).await == 8 }).await;

    p.service
        .cancel_order(CancelOrder::new(UserId::new(3), order.id))
        .await
        .unwrap();
    p.relay.drain().await.unwrap();

    wait_until(|| async { consumer_stock(&p).await == 10 }).await;
    assert_eq!(
        p.orders.find(order.id).await.unwrap().unwrap().status,
        OrderStatus::Cancelled
    );

    p.shutdown_tx.send(true).unwrap();
    p.consumer_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_message_is_dead_lettered_without_mutation() {
    let p = start(10).await;

    // A valid placement goes through first and is recorded in the store.
    p.service
        .place_order(PlaceOrder::new(UserId::new(3), ProductId::new(5), 2))
        .await
        .unwrap();
    p.relay.drain().await.unwrap();
    wait_until(|| async { consumer_stock(&p).await == 8 }).await;

    // A malformed body follows the dead-letter path after one attempt.
    p.broker
        .publish(
            broker::EVENTS_EXCHANGE,
            "order.placed",
            b"{not valid json".to_vec(),
            true,
        )
        .await
        .unwrap();
    wait_until(|| async { p.broker.dead_letter_count(ORDER_EVENTS_QUEUE).await == 1 }).await;

    // Neither projection moved, and the recorded event is still present.
    assert_eq!(consumer_stock(&p).await, 8);
    assert_eq!(p.orders.order_count().await, 1);
    assert_eq!(p.store.event_count().await, 1);

    p.shutdown_tx.send(true).unwrap();
    p.consumer_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn republished_envelope_is_applied_once() {
    let p = start(10).await;

    let order = p
        .service
        .place_order(PlaceOrder::new(UserId::new(3), ProductId::new(5), 2))
        .await
        .unwrap();

    // Simulate a producer retrying after a crash: the same envelope is
    // published twice with a stable event id.
    let envelope = broker::Envelope::new(
        "order.placed",
        serde_json::json!({
            "orderId": order.id.as_i64(),
            "userId": 3,
            "productId": 5,
            "quantity": 2,
            "totalAmount": 20.0,
            "status": "pending"
        }),
    )
    .unwrap();

    let conn = Connection::with_policy(
        Arc::new(p.broker.clone()),
        Topology::storefront(),
        RetryPolicy::no_retries(),
    );
    let publisher = EventPublisher::new(Arc::new(conn));
    publisher.publish_envelope(&envelope).await.unwrap();
    publisher.publish_envelope(&envelope).await.unwrap();

    wait_until(|| async { consumer_stock(&p).await == 8 }).await;

    // Give the duplicate time to arrive; the stock must not move again.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(consumer_stock(&p).await, 8);
    assert_eq!(p.broker.queue_depth(ORDER_EVENTS_QUEUE).await, 0);

    p.shutdown_tx.send(true).unwrap();
    p.consumer_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn handler_error_dead_letters_after_one_attempt() {
    let p = start(10).await;

    // Parseable JSON, but a placement without its quantity fails the
    // handler and is not retried.
    p.broker
        .publish(
            broker::EVENTS_EXCHANGE,
            "order.placed",
            serde_json::to_vec(&serde_json::json!({
                "eventId": "evt-broken",
                "orderId": 1,
                "userId": 3,
                "productId": 5,
                "status": "pending"
            }))
            .unwrap(),
            true,
        )
        .await
        .unwrap();

    wait_until(|| async { p.broker.dead_letter_count(ORDER_EVENTS_QUEUE).await == 1 }).await;
    assert_eq!(consumer_stock(&p).await, 10);

    p.shutdown_tx.send(true).unwrap();
    p.consumer_task.await.unwrap().unwrap();
}
