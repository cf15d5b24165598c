//! Command surface: place, pay, cancel, and the read endpoints backing it.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{
    CancelOrder, InMemoryOrderRepository, InMemoryProductRepository, Money, Order, OrderStatus,
    PayOrder, PlaceOrder, Product,
};
use event_store::EventStore;
use orders::{InMemoryOutbox, OrderService, OrderSummary};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub order_service:
        OrderService<InMemoryProductRepository, InMemoryOrderRepository, S, InMemoryOutbox>,
    pub event_store: S,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct OrderActionRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub quantity: u32,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            product_id: order.product_id,
            user_id: order.user_id,
            quantity: order.quantity,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
            stock: product.stock,
        }
    }
}

// -- Handlers --

/// POST /orders — place a new order.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let cmd = PlaceOrder::new(
        UserId::new(req.user_id),
        ProductId::new(req.product_id),
        req.quantity,
    );
    let order = state.order_service.place_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// POST /orders/{id}/pay — pay a pending order.
#[tracing::instrument(skip(state, req))]
pub async fn pay<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<OrderActionRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let cmd = PayOrder::new(UserId::new(req.user_id), OrderId::new(id));
    let order = state.order_service.pay_order(cmd).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/cancel — cancel a pending or paid order.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<OrderActionRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let cmd = CancelOrder::new(UserId::new(req.user_id), OrderId::new(id));
    let order = state.order_service.cancel_order(cmd).await?;
    Ok(Json(order.into()))
}

/// GET /orders?user_id= — list a user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let summaries = state
        .order_service
        .list_orders(UserId::new(query.user_id))
        .await?;
    Ok(Json(summaries))
}

/// GET /products — list the catalog, ascending by id.
#[tracing::instrument(skip(state))]
pub async fn products<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.order_service.list_products().await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}
