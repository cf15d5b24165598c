//! Repository traits and in-memory implementations.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::order::{NewOrder, Order, OrderStatus};
use crate::product::Product;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The underlying storage failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result of an atomic stock decrement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// The decrement was applied; `remaining` units are left.
    Applied { remaining: u32 },

    /// The decrement would have driven stock below zero; nothing changed.
    Insufficient { available: u32 },

    /// No product row with this id exists on this side.
    NotFound,
}

/// Storage for product rows.
///
/// `try_decrement_stock` is the single mutation concurrent commands race
/// on; implementations must make it an atomic compare-and-decrement so two
/// simultaneous decrements of the same product cannot lose an update or
/// drive stock negative.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Finds a product by id.
    async fn find(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Lists all products, ascending by id.
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Inserts or replaces a product row (used for seeding).
    async fn insert(&self, product: Product) -> Result<(), RepositoryError>;

    /// Atomically decrements stock by `quantity` if at least that much is
    /// available; otherwise leaves the row unchanged.
    async fn try_decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError>;

    /// Increments stock by `quantity`, returning the new level, or `None`
    /// if the product does not exist.
    async fn restore_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<Option<u32>, RepositoryError>;
}

/// Storage for order rows.
///
/// Orders are inserted once and then only change status; no delete exists.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a new order in `pending` status, assigning its id.
    async fn insert(&self, new_order: NewOrder) -> Result<Order, RepositoryError>;

    /// Finds an order by id.
    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Finds an order by id scoped to its owning user.
    async fn find_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Lists a user's orders, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Updates an order's status, returning the updated row, or `None` if
    /// the order does not exist.
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// In-memory product repository.
#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    products: Arc<RwLock<BTreeMap<ProductId, Product>>>,
}

impl InMemoryProductRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository seeded with the given products.
    pub async fn seeded(products: Vec<Product>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.products.write().await;
            for product in products {
                map.insert(product.id, product);
            }
        }
        repo
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products.read().await.values().cloned().collect())
    }

    async fn insert(&self, product: Product) -> Result<(), RepositoryError> {
        self.products.write().await.insert(product.id, product);
        Ok(())
    }

    async fn try_decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        // One write lock spans check and mutation, so concurrent decrements
        // of the same product serialize here.
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(StockDecrement::NotFound);
        };

        if product.stock < quantity {
            return Ok(StockDecrement::Insufficient {
                available: product.stock,
            });
        }

        product.stock -= quantity;
        Ok(StockDecrement::Applied {
            remaining: product.stock,
        })
    }

    async fn restore_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<Option<u32>, RepositoryError> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(None);
        };
        product.stock += quantity;
        Ok(Some(product.stock))
    }
}

#[derive(Default)]
struct OrderStoreState {
    orders: BTreeMap<OrderId, Order>,
    next_id: i64,
}

/// In-memory order repository.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<RwLock<OrderStoreState>>,
}

impl InMemoryOrderRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, new_order: NewOrder) -> Result<Order, RepositoryError> {
        let mut state = self.state.write().await;
        state.next_id += 1;

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(state.next_id),
            product_id: new_order.product_id,
            user_id: new_order.user_id,
            quantity: new_order.quantity,
            total_amount: new_order.total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn find_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .get(&id)
            .filter(|o| o.user_id == user_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(None);
        };
        order.status = status;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }
}
