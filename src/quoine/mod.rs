pub mod auth;
pub mod types;

pub use auth::QuoineAuth;
pub use types::{Execution, Order, OrderSide, OrderStatus, Trade, TradeSide};
