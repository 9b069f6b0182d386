use chrono::{Duration, Utc};
use quoine_bracket_bot::quoine::types::{Execution, Models, Order, OrderSide, OrderStatus, Trade, TradeSide};
use quoine_bracket_bot::strategy::{bracket_prices, take_profit_for, CooldownLock};

#[test]
fn test_bracket_math() {
    let (buy, sell) = bracket_prices(1_000_000.0, 0.99, 1.01);
    assert!((buy - 990_000.0).abs() < 1e-6);
    assert!((sell - 1_010_000.0).abs() < 1e-6);

    // Buy always below, sell always above, for any positive reference.
    for price in [417.65, 50_000.0, 1_011_499.0] {
        let (buy, sell) = bracket_prices(price, 0.99, 1.01);
        assert!(buy < price);
        assert!(sell > price);
    }
}

#[test]
fn test_take_profit_bounds() {
    let long_tp = take_profit_for(TradeSide::Long, 990_000.0, 0.99, 1.01);
    assert!(long_tp > 990_000.0);

    let short_tp = take_profit_for(TradeSide::Short, 1_010_000.0, 0.99, 1.01);
    assert!(short_tp < 1_010_000.0);
}

#[test]
fn test_cooldown_lock_is_monotonic() {
    let lock = CooldownLock::new();
    let now = Utc::now();

    assert!(lock.remaining(now).is_none());

    lock.extend_until(now + Duration::seconds(600));
    assert!(lock.remaining(now).is_some());

    // An earlier deadline from a racing writer must not shorten the lock.
    lock.extend_until(now + Duration::seconds(10));
    let remaining = lock.remaining(now).unwrap();
    assert!(remaining.as_secs() >= 599);

    // Time passing the deadline unlocks; nothing else does.
    assert!(lock.remaining(now + Duration::seconds(601)).is_none());
}

#[test]
fn test_wire_types_parse_quoine_payloads() {
    let executions: Vec<Execution> = serde_json::from_str(
        r#"[
            {"id": 1001232, "quantity": "6.118954", "price": "1011499.0",
             "taker_side": "buy", "created_at": 1457365977},
            {"id": 1001231, "quantity": "0.1", "price": "1011498.0",
             "taker_side": "sell", "created_at": 1457365975}
        ]"#,
    )
    .unwrap();
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[0].price, 1_011_499.0);
    assert_eq!(executions[0].taker_side, OrderSide::Buy);

    let orders: Models<Order> = serde_json::from_str(
        r#"{"models": [
            {"id": 2157474, "side": "buy", "quantity": "0.1",
             "filled_quantity": "0", "price": "990000.0", "status": "cancelled",
             "leverage_level": 25, "product_id": 5,
             "currency_pair_code": "BTCJPY",
             "created_at": 1462123639, "updated_at": 1462123700}
        ]}"#,
    )
    .unwrap();
    assert_eq!(orders.models[0].status, OrderStatus::Cancelled);

    let trade: Trade = serde_json::from_str(
        r#"{"id": 57896, "side": "short", "open_price": "1010000.0",
            "stop_loss": "0.0", "take_profit": "1000000.0", "pnl": "-500.0",
            "created_at": 1456250726, "updated_at": 1456251837}"#,
    )
    .unwrap();
    assert_eq!(trade.side, TradeSide::Short);
    assert_eq!(trade.pnl, -500.0);
}
