use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::config::Config;
use crate::execution::{ExchangeApi, QuoineError};
use crate::line::LineNotifier;
use crate::quoine::types::{OrderSide, Trade, TradeSide};

/// Matches the source's `limit: 1<<30` when pulling the session history.
const SESSION_HISTORY_LIMIT: u64 = 1 << 30;

/// Process-wide cooldown deadline, shared between the trading loop and the
/// unwind tasks that set it.
///
/// The deadline only ever moves forward: `fetch_max` means two losing
/// closes racing each other can never replace a later deadline with an
/// earlier one.
#[derive(Clone)]
pub struct CooldownLock {
    locked_until_ms: Arc<AtomicI64>,
}

impl CooldownLock {
    pub fn new() -> Self {
        Self {
            locked_until_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn extend_until(&self, deadline: DateTime<Utc>) {
        self.locked_until_ms
            .fetch_max(deadline.timestamp_millis(), Ordering::SeqCst);
    }

    /// Remaining cooldown at `now`, or `None` when unlocked.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let millis = self.locked_until_ms.load(Ordering::SeqCst) - now.timestamp_millis();
        if millis > 0 {
            Some(Duration::from_millis(millis as u64))
        } else {
            None
        }
    }
}

impl Default for CooldownLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Limit prices bracketing a reference price: buy below, sell above.
pub fn bracket_prices(reference: f64, lower_margin: f64, upper_margin: f64) -> (f64, f64) {
    (reference * lower_margin, reference * upper_margin)
}

/// Take-profit for a position opened by a bracket leg: the inverse of the
/// margin that placed the originating order.
pub fn take_profit_for(
    side: TradeSide,
    open_price: f64,
    lower_margin: f64,
    upper_margin: f64,
) -> f64 {
    match side {
        TradeSide::Long => open_price / lower_margin,
        TradeSide::Short => open_price / upper_margin,
    }
}

/// The mean-reversion bracket loop: poll executions, bracket the latest
/// price, cancel stale orders, retarget and unwind resulting positions.
pub struct BracketStrategy<E: ExchangeApi + 'static> {
    exchange: Arc<E>,
    notifier: Option<LineNotifier>,
    config: Arc<Config>,
    lock: CooldownLock,
    unwind_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<E: ExchangeApi + 'static> BracketStrategy<E> {
    pub fn new(exchange: Arc<E>, notifier: Option<LineNotifier>, config: Arc<Config>) -> Self {
        Self {
            exchange,
            notifier,
            config,
            lock: CooldownLock::new(),
            unwind_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn lock(&self) -> &CooldownLock {
        &self.lock
    }

    /// Run cycles until a fatal error. API errors (bad status, malformed
    /// body) only abort the current cycle; the loop retries forever.
    pub async fn run(&self) -> Result<(), QuoineError> {
        loop {
            match self.run_cycle().await {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    let delay = self.config.trading.api_retry_delay_secs;
                    warn!("API error: {}. Sleeping {}s before retrying.", err, delay);
                    sleep(Duration::from_secs(delay)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn run_cycle(&self) -> Result<(), QuoineError> {
        let trading = &self.config.trading;

        if let Some(wait) = self.lock.remaining(Utc::now()) {
            info!("Cooldown active; sleeping {}s.", wait.as_secs());
            sleep(wait).await;
            return Ok(());
        }

        let since = Utc::now() - chrono::Duration::seconds(trading.signal_window_secs as i64);
        let executions = self.exchange.recent_executions(since).await?;

        let Some(latest) = executions.first() else {
            info!(
                "No executions in the last {}s; waiting.",
                trading.signal_window_secs
            );
            sleep(Duration::from_secs(trading.signal_window_secs)).await;
            return Ok(());
        };

        let (buy_price, sell_price) =
            bracket_prices(latest.price, trading.lower_margin, trading.upper_margin);
        info!(
            "Bracketing {}: buy @ {} / sell @ {}",
            latest.price, buy_price, sell_price
        );

        self.exchange
            .place_order(OrderSide::Buy, trading.quantity, buy_price)
            .await?;
        self.exchange
            .place_order(OrderSide::Sell, trading.quantity, sell_price)
            .await?;

        sleep(Duration::from_secs(trading.fill_wait_secs)).await;

        // Anything not filled inside the window is abandoned.
        for order in self.exchange.live_orders().await? {
            self.exchange.cancel_order(order.id).await?;
        }

        for trade in self.exchange.open_trades().await? {
            let take_profit = take_profit_for(
                trade.side,
                trade.open_price,
                trading.lower_margin,
                trading.upper_margin,
            );
            self.exchange.update_take_profit(trade.id, take_profit).await?;
            self.schedule_unwind(trade).await;
        }

        Ok(())
    }

    /// Spawn an independent task that closes `trade` after the unwind
    /// delay. A losing close advances the cooldown lock; a failed close is
    /// logged and dropped (the shutdown sweep will retry it at the latest).
    async fn schedule_unwind(&self, trade: Trade) {
        let exchange = Arc::clone(&self.exchange);
        let notifier = self.notifier.clone();
        let lock = self.lock.clone();
        let delay = Duration::from_secs(self.config.trading.unwind_delay_secs);
        let cooldown = chrono::Duration::seconds(self.config.trading.loss_cooldown_secs as i64);

        let handle = tokio::spawn(async move {
            sleep(delay).await;

            match exchange.close_trade(trade.id).await {
                Ok(closed) => {
                    info!(
                        "Closed {:?} trade {} with pnl {}.",
                        closed.side, closed.id, closed.pnl
                    );

                    if let Some(notifier) = &notifier {
                        let _ = notifier.report_trade_close(&closed).await;
                    }

                    if closed.pnl < 0.0 {
                        let until = Utc::now() + cooldown;
                        lock.extend_until(until);
                        info!("Losing close; no new brackets until {}.", until);
                    }
                }
                Err(err) => warn!("Failed to close trade {}: {}", trade.id, err),
            }
        });

        let mut tasks = self.unwind_tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Final cleanup: wait out in-flight unwinds, cancel whatever is still
    /// live, close whatever is still open, then report the session total.
    /// Runs on both interrupt and fatal error; every step is best-effort.
    /// Returns the trades the summary covered (created since `started_at`).
    pub async fn shutdown(&self, started_at: DateTime<Utc>) -> Vec<Trade> {
        let tasks: Vec<JoinHandle<()>> = self.unwind_tasks.lock().await.drain(..).collect();
        if !tasks.is_empty() {
            info!("Waiting for {} unwind task(s) ...", tasks.len());
        }
        for task in tasks {
            if let Err(err) = task.await {
                warn!("Unwind task failed: {}", err);
            }
        }

        info!("Cancelling all orders ...");
        match self.exchange.live_orders().await {
            Ok(orders) => {
                for order in orders {
                    if let Err(err) = self.exchange.cancel_order(order.id).await {
                        warn!("Failed to cancel order {}: {}", order.id, err);
                    }
                }
            }
            Err(err) => warn!("Failed to list live orders: {}", err),
        }

        info!("Closing all trades ...");
        match self.exchange.open_trades().await {
            Ok(trades) => {
                for trade in trades {
                    if let Err(err) = self.exchange.close_trade(trade.id).await {
                        warn!("Failed to close trade {}: {}", trade.id, err);
                    }
                }
            }
            Err(err) => warn!("Failed to list open trades: {}", err),
        }

        match self.exchange.all_trades(SESSION_HISTORY_LIMIT).await {
            Ok(trades) => {
                let session: Vec<Trade> = trades
                    .into_iter()
                    .filter(|trade| trade.created_at >= started_at)
                    .collect();
                let total_pnl: f64 = session.iter().map(|trade| trade.pnl).sum();
                info!("Session: {} trade(s), total pnl {}.", session.len(), total_pnl);

                if let Some(notifier) = &self.notifier {
                    let _ = notifier.report_session_summary(started_at, &session).await;
                }

                session
            }
            Err(err) => {
                warn!("Failed to fetch session trades: {}", err);
                Vec::new()
            }
        }
    }
}
