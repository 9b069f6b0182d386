use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::TradingConfig;
use crate::quoine::auth::QuoineAuth;
use crate::quoine::types::*;

/// Errors from the exchange, split into the two tiers the trading loop
/// cares about: API errors (bad status, malformed body) are retried
/// forever; transport faults are fatal.
#[derive(Debug, Error)]
pub enum QuoineError {
    #[error("Quoine API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("unparseable Quoine response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl QuoineError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, QuoineError::Api { .. } | QuoineError::Parse(_))
    }
}

/// The exchange operations the trading loop needs. `QuoineClient` is the
/// real implementation; tests substitute a mock.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn recent_executions(&self, since: DateTime<Utc>) -> Result<Vec<Execution>, QuoineError>;
    async fn live_orders(&self) -> Result<Vec<Order>, QuoineError>;
    async fn place_order(
        &self,
        side: OrderSide,
        quantity: f64,
        price: f64,
    ) -> Result<Order, QuoineError>;
    async fn cancel_order(&self, id: u64) -> Result<Order, QuoineError>;
    async fn open_trades(&self) -> Result<Vec<Trade>, QuoineError>;
    async fn all_trades(&self, limit: u64) -> Result<Vec<Trade>, QuoineError>;
    async fn close_trade(&self, id: u64) -> Result<Trade, QuoineError>;
    async fn update_take_profit(&self, id: u64, take_profit: f64) -> Result<Trade, QuoineError>;
}

pub struct QuoineClient {
    client: Client,
    base_url: String,
    auth: Option<QuoineAuth>,
    product_id: u64,
    leverage_level: u32,
    funding_currency: String,
}

impl QuoineClient {
    pub fn new(base_url: String, auth: Option<QuoineAuth>, trading: &TradingConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
            auth,
            product_id: trading.product_id,
            leverage_level: trading.leverage_level,
            funding_currency: trading.funding_currency.clone(),
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        signed: bool,
    ) -> Result<String, QuoineError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .client
            .request(method, url)
            .header("X-Quoine-API-Version", "2")
            .header("Content-Type", "application/json");

        if signed {
            if let Some(auth) = &self.auth {
                request = request.header("X-Quoine-Auth", auth.sign_request(path));
            }
        }

        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!("{}", body);

        if !status.is_success() {
            return Err(QuoineError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl ExchangeApi for QuoineClient {
    async fn recent_executions(&self, since: DateTime<Utc>) -> Result<Vec<Execution>, QuoineError> {
        let path = format!(
            "/executions?product_id={}&timestamp={}",
            self.product_id,
            since.timestamp()
        );
        info!("Quoine API: GET {}", path);

        let body = self.request(Method::GET, &path, None, false).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn live_orders(&self) -> Result<Vec<Order>, QuoineError> {
        let path = "/orders?status=live";
        info!("Quoine API: GET {}", path);

        let body = self.request(Method::GET, path, None, true).await?;
        let orders: Models<Order> = serde_json::from_str(&body)?;
        Ok(orders.models)
    }

    async fn place_order(
        &self,
        side: OrderSide,
        quantity: f64,
        price: f64,
    ) -> Result<Order, QuoineError> {
        let path = format!("/orders?product_id={}", self.product_id);
        info!(
            "Quoine API: POST {} side={:?} quantity={} price={}",
            path, side, quantity, price
        );

        let body = json!({
            "order_type": "limit",
            "product_id": self.product_id,
            "side": side,
            "quantity": quantity,
            "price": price,
            "leverage_level": self.leverage_level,
            "funding_currency": self.funding_currency,
        });

        let body = self.request(Method::POST, &path, Some(body), true).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn cancel_order(&self, id: u64) -> Result<Order, QuoineError> {
        let path = format!("/orders/{}/cancel", id);
        info!("Quoine API: PUT {}", path);

        let body = self.request(Method::PUT, &path, None, true).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn open_trades(&self) -> Result<Vec<Trade>, QuoineError> {
        let path = "/trades?status=open";
        info!("Quoine API: GET {}", path);

        let body = self.request(Method::GET, path, None, true).await?;
        let trades: Models<Trade> = serde_json::from_str(&body)?;
        Ok(trades.models)
    }

    async fn all_trades(&self, limit: u64) -> Result<Vec<Trade>, QuoineError> {
        let path = format!("/trades?limit={}", limit);
        info!("Quoine API: GET {}", path);

        let body = self.request(Method::GET, &path, None, true).await?;
        let trades: Models<Trade> = serde_json::from_str(&body)?;
        Ok(trades.models)
    }

    async fn close_trade(&self, id: u64) -> Result<Trade, QuoineError> {
        let path = format!("/trades/{}/close", id);
        info!("Quoine API: PUT {}", path);

        let body = self.request(Method::PUT, &path, None, true).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn update_take_profit(&self, id: u64, take_profit: f64) -> Result<Trade, QuoineError> {
        let path = format!("/trades/{}", id);
        info!("Quoine API: PUT {} take_profit={}", path, take_profit);

        let body = json!({ "take_profit": take_profit });
        let body = self.request(Method::PUT, &path, Some(body), true).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let api = QuoineError::Api {
            status: 503,
            body: "Service Unavailable".to_string(),
        };
        assert!(api.is_recoverable());

        let parse = QuoineError::Parse(serde_json::from_str::<Models<Order>>("<html>").unwrap_err());
        assert!(parse.is_recoverable());
    }
}
