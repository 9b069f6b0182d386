use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Quoine wraps list responses for authenticated resources in a
/// `{"models": [...], ...}` envelope. `/executions` returns a bare array.
#[derive(Debug, Clone, Deserialize)]
pub struct Models<T> {
    pub models: Vec<T>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Live,
    Filled,
    Cancelled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Execution {
    pub id: u64,
    #[serde(deserialize_with = "flexible_f64")]
    pub quantity: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub price: f64,
    pub taker_side: OrderSide,
    #[serde(deserialize_with = "epoch_seconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: u64,
    pub side: OrderSide,
    #[serde(deserialize_with = "flexible_f64")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub filled_quantity: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub price: f64,
    pub status: OrderStatus,
    #[serde(default)]
    pub leverage_level: Option<u32>,
    #[serde(default)]
    pub product_id: Option<u64>,
    #[serde(default)]
    pub currency_pair_code: Option<String>,
    #[serde(deserialize_with = "epoch_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "epoch_seconds")]
    pub updated_at: DateTime<Utc>,
}

/// An open or closed leveraged position. Quoine calls these "trades".
#[derive(Debug, Clone, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub side: TradeSide,
    #[serde(deserialize_with = "flexible_f64")]
    pub open_price: f64,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub stop_loss: f64,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub take_profit: f64,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub pnl: f64,
    #[serde(deserialize_with = "epoch_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "epoch_seconds")]
    pub updated_at: DateTime<Utc>,
}

/// Quoine encodes most numeric fields as JSON strings ("0.1"), but not
/// consistently, and omits some as null. Accept all three.
fn flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Null,
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        Raw::Null => Ok(0.0),
    }
}

fn epoch_seconds<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    let secs = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom)?,
    };

    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_execution_with_string_numbers() {
        let json = r#"{
            "id": 1001232,
            "quantity": "6.118954",
            "price": "1011499.0",
            "taker_side": "sell",
            "created_at": 1457365977
        }"#;

        let execution: Execution = serde_json::from_str(json).unwrap();
        assert_eq!(execution.id, 1001232);
        assert_eq!(execution.quantity, 6.118954);
        assert_eq!(execution.price, 1011499.0);
        assert_eq!(execution.taker_side, OrderSide::Sell);
        assert_eq!(execution.created_at.timestamp(), 1457365977);
    }

    #[test]
    fn test_parse_order_envelope() {
        let json = r#"{
            "models": [{
                "id": 2157474,
                "order_type": "limit",
                "quantity": "0.01",
                "side": "sell",
                "filled_quantity": "0",
                "price": "500.0",
                "created_at": 1462123639,
                "updated_at": 1462123639,
                "status": "live",
                "leverage_level": 25,
                "product_id": 5,
                "currency_pair_code": "BTCJPY"
            }]
        }"#;

        let orders: Models<Order> = serde_json::from_str(json).unwrap();
        let order = &orders.models[0];
        assert_eq!(order.id, 2157474);
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.status, OrderStatus::Live);
        assert_eq!(order.filled_quantity, 0.0);
        assert_eq!(order.leverage_level, Some(25));
    }

    #[test]
    fn test_parse_trade_with_null_pnl() {
        let json = r#"{
            "id": 57896,
            "side": "long",
            "open_price": "417.65",
            "stop_loss": "0.0",
            "take_profit": "0.0",
            "pnl": null,
            "created_at": 1456250726,
            "updated_at": 1456251837
        }"#;

        let trade: Trade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.side, TradeSide::Long);
        assert_eq!(trade.open_price, 417.65);
        assert_eq!(trade.pnl, 0.0);
    }

    #[test]
    fn test_unknown_order_status() {
        let json = r#""partially_filled""#;
        let status: OrderStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status, OrderStatus::Other);
    }
}
