use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;

use crate::quoine::types::{Trade, TradeSide};

const PUSH_URL: &str = "https://api.line.me/v2/bot/message/push";
const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Push-message notifier for a single LINE recipient. Delivery is
/// best-effort; callers ignore failures.
#[derive(Clone)]
pub struct LineNotifier {
    client: Client,
    channel_token: String,
    user_id: String,
}

impl LineNotifier {
    pub fn new(channel_token: String, user_id: String) -> Self {
        Self {
            client: Client::new(),
            channel_token,
            user_id,
        }
    }

    pub async fn send_alert(&self, text: &str) -> Result<()> {
        self.push_text(text).await
    }

    pub async fn report_trade_close(&self, trade: &Trade) -> Result<()> {
        self.push_text(&format_trade_close(trade, Utc::now())).await
    }

    pub async fn report_session_summary(
        &self,
        started_at: DateTime<Utc>,
        trades: &[Trade],
    ) -> Result<()> {
        self.push_text(&format_session_summary(started_at, Utc::now(), trades))
            .await
    }

    async fn push_text(&self, text: &str) -> Result<()> {
        self.client
            .post(PUSH_URL)
            .bearer_auth(&self.channel_token)
            .json(&json!({
                "to": self.user_id,
                "messages": [{ "type": "text", "text": text }],
            }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

fn format_trade_close(trade: &Trade, now: DateTime<Utc>) -> String {
    let side = match trade.side {
        TradeSide::Long => "long",
        TradeSide::Short => "short",
    };

    format!(
        "{}: Closed {} position with {} pnl.",
        now.format(TIME_FORMAT),
        side,
        trade.pnl
    )
}

fn format_session_summary(start: DateTime<Utc>, end: DateTime<Utc>, trades: &[Trade]) -> String {
    let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();

    format!(
        "Duration: {} ~ {}\nTotal pnl: {}",
        start.format(TIME_FORMAT),
        end.format(TIME_FORMAT),
        total_pnl
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(side: TradeSide, pnl: f64) -> Trade {
        Trade {
            id: 1,
            side,
            open_price: 1_000_000.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            pnl,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_trade_close_message() {
        let now = Utc.with_ymd_and_hms(2016, 5, 1, 12, 30, 0).unwrap();
        let message = format_trade_close(&trade(TradeSide::Short, -500.0), now);
        assert_eq!(
            message,
            "2016/05/01 12:30:00: Closed short position with -500 pnl."
        );
    }

    #[test]
    fn test_session_summary_sums_pnl() {
        let start = Utc.with_ymd_and_hms(2016, 5, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2016, 5, 1, 18, 0, 0).unwrap();
        let trades = vec![trade(TradeSide::Long, 1200.0), trade(TradeSide::Short, -500.0)];

        let message = format_session_summary(start, end, &trades);
        assert_eq!(
            message,
            "Duration: 2016/05/01 12:00:00 ~ 2016/05/01 18:00:00\nTotal pnl: 700"
        );
    }
}
