//! Shared identifier types crossing service boundaries.

mod types;

pub use types::{OrderId, ProductId, UserId};
