//! Domain layer for the storefront.
//!
//! This crate provides:
//! - The order aggregate and its status state machine
//! - The product stock projection with the never-below-zero invariant
//! - Wire payload types for the order event stream
//! - Commands accepted by the command side
//! - Repository traits with in-memory implementations

pub mod commands;
pub mod events;
pub mod money;
pub mod order;
pub mod product;
pub mod repository;

pub use commands::{CancelOrder, PayOrder, PlaceOrder};
pub use events::{
    ORDER_CANCELLED, ORDER_PAID, ORDER_PLACED, OrderEvent, OrderEventKind, OrderEventPayload,
};
pub use money::Money;
pub use order::{NewOrder, Order, OrderStatus};
pub use product::Product;
pub use repository::{
    InMemoryOrderRepository, InMemoryProductRepository, OrderRepository, ProductRepository,
    RepositoryError, StockDecrement,
};
