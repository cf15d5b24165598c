//! HTTP API server for the storefront.
//!
//! Exposes the command surface (place/pay/cancel/list orders, list
//! products) and the event query surface (event listing and statistics),
//! with structured logging (tracing) and Prometheus metrics. The binary
//! wires both services — the command side and the saga consumer — over the
//! in-process broker.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use broker::{Connection, EventPublisher, InProcessBroker, Topology};
use common::ProductId;
use domain::{InMemoryOrderRepository, InMemoryProductRepository, Money, Product};
use event_store::{EventStore, InMemoryEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::{InMemoryOutbox, OrderService, OutboxRelay};
use saga::{InMemoryAppliedEventLog, OrderEventConsumer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::orders::AppState;

/// The consumer type used by the default single-process wiring.
pub type StorefrontConsumer = OrderEventConsumer<
    InMemoryProductRepository,
    InMemoryOrderRepository,
    InMemoryAppliedEventLog,
>;

/// Everything the binary needs to run the storefront in one process.
pub struct Storefront {
    pub state: Arc<AppState<InMemoryEventStore>>,
    pub relay: Arc<OutboxRelay<InMemoryOutbox>>,
    pub consumer: StorefrontConsumer,
    pub consumer_conn: Arc<Connection>,
    pub publisher_conn: Arc<Connection>,
    pub broker: InProcessBroker,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}/pay", post(routes::orders::pay::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/products", get(routes::orders::products::<S>))
        .route("/events", get(routes::events::list::<S>))
        .route("/events/stats", get(routes::events::stats::<S>))
        .route("/events/type/{type}", get(routes::events::by_type::<S>))
        .route("/events/user/{user_id}", get(routes::events::by_user::<S>))
        .route("/events/range", get(routes::events::by_range::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Demo catalog seeded into both product copies.
fn demo_catalog() -> Vec<Product> {
    vec![
        Product::new(ProductId::new(1), "Laptop", Money::from_cents(99999), 10),
        Product::new(ProductId::new(2), "Smartphone", Money::from_cents(59999), 25),
        Product::new(ProductId::new(3), "Headphones", Money::from_cents(14999), 50),
        Product::new(ProductId::new(4), "Keyboard", Money::from_cents(7999), 30),
        Product::new(ProductId::new(5), "Mouse", Money::from_cents(2999), 40),
    ]
}

/// Wires the full storefront over an in-process broker.
///
/// The two product repositories are separate copies reconciled only
/// through the event stream; the order repository handle is shared, as in
/// the deployment where both services read one orders table.
pub async fn build_storefront() -> Storefront {
    let broker = InProcessBroker::new();
    let store = InMemoryEventStore::new();
    let outbox = InMemoryOutbox::new();
    let orders_repo = InMemoryOrderRepository::new();

    let command_products = InMemoryProductRepository::seeded(demo_catalog()).await;
    let consumer_products = InMemoryProductRepository::seeded(demo_catalog()).await;

    let order_service = OrderService::new(
        command_products,
        orders_repo.clone(),
        store.clone(),
        outbox.clone(),
    );

    let publisher_conn = Arc::new(Connection::new(
        Arc::new(broker.clone()),
        Topology::storefront(),
    ));
    let relay = Arc::new(OutboxRelay::new(
        outbox,
        EventPublisher::new(Arc::clone(&publisher_conn)),
    ));

    let consumer = OrderEventConsumer::new(
        consumer_products,
        orders_repo,
        InMemoryAppliedEventLog::new(),
    );
    let consumer_conn = Arc::new(Connection::new(
        Arc::new(broker.clone()),
        Topology::storefront(),
    ));

    let state = Arc::new(AppState {
        order_service,
        event_store: store,
    });

    Storefront {
        state,
        relay,
        consumer,
        consumer_conn,
        publisher_conn,
        broker,
    }
}
