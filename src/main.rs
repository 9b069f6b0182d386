use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use quoine_bracket_bot::config::Config;
use quoine_bracket_bot::execution::QuoineClient;
use quoine_bracket_bot::line::LineNotifier;
use quoine_bracket_bot::quoine::QuoineAuth;
use quoine_bracket_bot::strategy::BracketStrategy;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Quoine Bracket Bot - Starting...");

    // Load configuration
    let config = Config::load()?;
    info!("✅ Configuration loaded");
    info!(
        "   Product: {} ({}x leverage, {} funding)",
        config.trading.product_id, config.trading.leverage_level, config.trading.funding_currency
    );
    info!(
        "   Bracket: {} / {} x last price, quantity {}",
        config.trading.lower_margin, config.trading.upper_margin, config.trading.quantity
    );

    // Initialize LINE notifier
    let notifier = if config.line.enabled {
        if let (Some(token), Some(user_id)) = (&config.line.channel_token, &config.line.user_id) {
            if !token.is_empty() {
                info!("📱 LINE notifications enabled");
                Some(LineNotifier::new(token.clone(), user_id.clone()))
            } else {
                info!("📱 LINE channel_token is empty, notifications disabled");
                None
            }
        } else {
            info!("📱 LINE user_id not configured, notifications disabled");
            None
        }
    } else {
        info!("📱 LINE notifications disabled in config");
        None
    };

    // Initialize Quoine REST client
    let auth = if let (Some(token_id), Some(token_secret)) =
        (&config.quoine.token_id, &config.quoine.token_secret)
    {
        Some(QuoineAuth::new(token_id.clone(), token_secret.clone()))
    } else {
        warn!("🔑 Quoine credentials missing; authenticated calls will be rejected");
        None
    };

    let client = QuoineClient::new(config.quoine.base_url.clone(), auth, &config.trading);
    info!("✅ REST client initialized");

    let strategy = Arc::new(BracketStrategy::new(
        Arc::new(client),
        notifier.clone(),
        config.clone(),
    ));
    info!("✅ Strategy initialized");

    let started_at = Utc::now();

    let run_result = tokio::select! {
        result = strategy.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    if let Err(err) = &run_result {
        warn!("Fatal error: {}", err);
        if let Some(notifier) = &notifier {
            if let Err(alert_err) = notifier
                .send_alert(&format!("Trading loop died: {}", err))
                .await
            {
                warn!("Failed to send error alert: {}", alert_err);
            }
        }
    }

    // Always unwind: cancel orders, close trades, report the session.
    strategy.shutdown(started_at).await;

    info!("👋 Bot stopped");
    run_result?;
    Ok(())
}
