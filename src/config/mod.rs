use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub quoine: QuoineConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub line: LineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoineConfig {
    pub token_id: Option<String>,
    pub token_secret: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for QuoineConfig {
    fn default() -> Self {
        Self {
            token_id: None,
            token_secret: None,
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.quoine.com".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradingConfig {
    /// Quoine product id (5 = BTC/JPY).
    #[serde(default = "default_product_id")]
    pub product_id: u64,
    #[serde(default = "default_leverage_level")]
    pub leverage_level: u32,
    #[serde(default = "default_funding_currency")]
    pub funding_currency: String,
    /// Buy leg is placed at `price * lower_margin`.
    #[serde(default = "default_lower_margin")]
    pub lower_margin: f64,
    /// Sell leg is placed at `price * upper_margin`.
    #[serde(default = "default_upper_margin")]
    pub upper_margin: f64,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    /// How far back to look for a reference execution.
    #[serde(default = "default_signal_window_secs")]
    pub signal_window_secs: u64,
    /// How long placed bracket orders are given to fill.
    #[serde(default = "default_fill_wait_secs")]
    pub fill_wait_secs: u64,
    /// Delay before a resulting position is force-closed.
    #[serde(default = "default_unwind_delay_secs")]
    pub unwind_delay_secs: u64,
    /// Lockout after a losing close.
    #[serde(default = "default_loss_cooldown_secs")]
    pub loss_cooldown_secs: u64,
    #[serde(default = "default_api_retry_delay_secs")]
    pub api_retry_delay_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            product_id: default_product_id(),
            leverage_level: default_leverage_level(),
            funding_currency: default_funding_currency(),
            lower_margin: default_lower_margin(),
            upper_margin: default_upper_margin(),
            quantity: default_quantity(),
            signal_window_secs: default_signal_window_secs(),
            fill_wait_secs: default_fill_wait_secs(),
            unwind_delay_secs: default_unwind_delay_secs(),
            loss_cooldown_secs: default_loss_cooldown_secs(),
            api_retry_delay_secs: default_api_retry_delay_secs(),
        }
    }
}

fn default_product_id() -> u64 { 5 }
fn default_leverage_level() -> u32 { 25 }
fn default_funding_currency() -> String { "JPY".to_string() }
fn default_lower_margin() -> f64 { 0.99 }
fn default_upper_margin() -> f64 { 1.01 }
fn default_quantity() -> f64 { 0.1 }
fn default_signal_window_secs() -> u64 { 60 }
fn default_fill_wait_secs() -> u64 { 60 }
fn default_unwind_delay_secs() -> u64 { 60 }
fn default_loss_cooldown_secs() -> u64 { 600 }
fn default_api_retry_delay_secs() -> u64 { 60 }

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LineConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Part of the LINE channel credential pair. Only webhook signature
    /// verification needs it; outbound pushes authenticate with
    /// `channel_token` alone, so this bot accepts but never reads it.
    pub channel_secret: Option<String>,
    pub channel_token: Option<String>,
    pub user_id: Option<String>,
}

impl Config {
    pub fn load() -> Result<Arc<Self>> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("BOT").separator("_"));

        // Load credentials from environment
        if let Ok(token_id) = std::env::var("QUOINE_TOKEN_ID") {
            builder = builder.set_override("quoine.token_id", token_id)?;
        }

        if let Ok(token_secret) = std::env::var("QUOINE_TOKEN_SECRET") {
            builder = builder.set_override("quoine.token_secret", token_secret)?;
        }

        if let Ok(channel_secret) = std::env::var("LINE_CHANNEL_SECRET") {
            builder = builder.set_override("line.channel_secret", channel_secret)?;
        }

        if let Ok(channel_token) = std::env::var("LINE_CHANNEL_TOKEN") {
            builder = builder
                .set_override("line.channel_token", channel_token)?
                .set_override("line.enabled", true)?;
        }

        if let Ok(user_id) = std::env::var("LINE_USER_ID") {
            builder = builder.set_override("line.user_id", user_id)?;
        }

        let config = builder.build()?;
        Ok(Arc::new(config.try_deserialize()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_margins_mirror_bracket_ratios() {
        let trading = TradingConfig::default();
        assert_eq!(trading.lower_margin, 0.99);
        assert_eq!(trading.upper_margin, 1.01);
        assert_eq!(trading.product_id, 5);
        assert_eq!(trading.leverage_level, 25);
        assert_eq!(trading.quantity, 0.1);
    }
}
