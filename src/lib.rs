pub mod config;
pub mod quoine;
pub mod execution;
pub mod line;
pub mod strategy;

pub use config::Config;
pub use execution::{ExchangeApi, QuoineClient, QuoineError};
pub use line::LineNotifier;
pub use quoine::QuoineAuth;
pub use strategy::{BracketStrategy, CooldownLock};
