//! End-to-end scenarios against a live engine
//!
//! Scenario 1 runs against the built-in simulator (seeded books, drifting
//! mids); the others feed exact book levels so their assertions are
//! deterministic. Active-order counts are point-in-time estimates while
//! background tasks run, so assertions on them use ≥, never equality.

use execution_engine::ExecutionEngine;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use types::errors::ExecutionResult;
use types::numeric::{Price, Quantity};
use types::order::{OrderRequest, OrderStatus, OrderType, Side, TimeInForce};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn request(
    order_id: &str,
    symbol: &str,
    order_type: OrderType,
    side: Side,
    quantity: u64,
    limit: f64,
    stop: f64,
    time_in_force: TimeInForce,
) -> OrderRequest {
    OrderRequest {
        order_id: order_id.into(),
        symbol: symbol.into(),
        order_type,
        side,
        quantity: Quantity::from_u64(quantity),
        limit_price: Price::from_f64(limit),
        stop_price: Price::from_f64(stop),
        time_in_force,
        timestamp_ns: 0,
        client_id: "scenario".into(),
    }
}

/// Running engine with the simulator off and an exact AAPL top of book:
/// 149.85 × 150.15, size 1000 each side.
fn engine_with_static_book() -> Arc<ExecutionEngine> {
    init_tracing();
    let engine = ExecutionEngine::new();
    assert_eq!(
        engine.initialize(r#"{"enable_simulation": false}"#),
        ExecutionResult::Success
    );
    assert_eq!(engine.start(), ExecutionResult::Success);
    engine
        .apply_book_update("AAPL", Side::Buy, Price::from_f64(149.85), Quantity::from_u64(1_000), 0)
        .unwrap();
    engine
        .apply_book_update("AAPL", Side::Sell, Price::from_f64(150.15), Quantity::from_u64(1_000), 0)
        .unwrap();
    engine
}

#[test]
fn scenario_market_buy_against_simulated_book() {
    init_tracing();
    let engine = ExecutionEngine::new();
    assert_eq!(engine.initialize("{}"), ExecutionResult::Success);
    assert_eq!(engine.start(), ExecutionResult::Success);
    thread::sleep(Duration::from_millis(200));

    let response = engine.submit_order(&request(
        "mkt-1",
        "AAPL",
        OrderType::Market,
        Side::Buy,
        100,
        0.0,
        0.0,
        TimeInForce::Ioc,
    ));

    assert_eq!(response.result, ExecutionResult::Success);
    assert!(matches!(
        response.status,
        OrderStatus::Filled | OrderStatus::PartiallyFilled
    ));
    assert!(response.executed_quantity <= Quantity::from_u64(100));
    // A few ±1% drift ticks from the 150 seed, plus the half-spread
    let average = response.average_price.to_f64();
    assert!(
        (average - 150.0).abs() / 150.0 < 0.05,
        "average {average} strayed from the seed price"
    );
    assert!(response.latency_micros >= 0);

    assert_eq!(engine.stop(), ExecutionResult::Success);
}

#[test]
fn scenario_market_order_unknown_symbol() {
    let engine = engine_with_static_book();

    let response = engine.submit_order(&request(
        "mkt-2",
        "ZZZZ",
        OrderType::Market,
        Side::Buy,
        10,
        0.0,
        0.0,
        TimeInForce::Ioc,
    ));
    assert_eq!(response.result, ExecutionResult::InvalidOrder);

    engine.stop();
}

#[test]
fn scenario_aggressive_limit_fills_at_its_limit() {
    let engine = engine_with_static_book();

    let response = engine.submit_order(&request(
        "lim-1",
        "AAPL",
        OrderType::Limit,
        Side::Buy,
        10,
        200.0,
        0.0,
        TimeInForce::Gtc,
    ));

    assert_eq!(response.result, ExecutionResult::Success);
    assert_eq!(response.status, OrderStatus::Filled);
    assert_eq!(response.average_price, Price::from_f64(200.0));
    assert_eq!(response.executed_quantity, Quantity::from_u64(10));

    engine.stop();
}

#[test]
fn scenario_passive_limit_rests() {
    let engine = engine_with_static_book();

    let response = engine.submit_order(&request(
        "lim-2",
        "AAPL",
        OrderType::Limit,
        Side::Buy,
        10,
        1.0,
        0.0,
        TimeInForce::Gtc,
    ));

    assert_eq!(response.result, ExecutionResult::Success);
    assert_eq!(response.status, OrderStatus::Submitted);
    assert!(response.executed_quantity.is_zero());

    engine.stop();
}

#[test]
fn scenario_stop_not_triggered() {
    let engine = engine_with_static_book();

    // Mid 150.00, sell stop armed far below
    let response = engine.submit_order(&request(
        "stp-1",
        "AAPL",
        OrderType::Stop,
        Side::Sell,
        10,
        0.0,
        10.0,
        TimeInForce::Gtc,
    ));

    assert_eq!(response.result, ExecutionResult::Success);
    assert_eq!(response.status, OrderStatus::Submitted);
    assert!(response.executed_quantity.is_zero());

    engine.stop();
}

#[test]
fn scenario_cancel_then_cancel_again() {
    let engine = engine_with_static_book();

    let messages: Arc<Mutex<Vec<(String, OrderStatus, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);
    engine.register_status_callback(Box::new(move |order_id, status, message| {
        sink.lock()
            .unwrap()
            .push((order_id.to_string(), status, message.to_string()));
    }));

    engine.submit_order(&request(
        "cxl-1",
        "AAPL",
        OrderType::Limit,
        Side::Buy,
        10,
        1.0,
        0.0,
        TimeInForce::Gtc,
    ));

    engine.cancel_order("cxl-1").unwrap();
    {
        let messages = messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "cxl-1");
        assert_eq!(messages[0].1, OrderStatus::Cancelled);
        assert_eq!(messages[0].2, "Order cancelled");
    }

    let err = engine.cancel_order("cxl-1").unwrap_err();
    assert_eq!(err.result_code(), ExecutionResult::OrderNotFound);

    engine.stop();
}

#[test]
fn scenario_metrics_reflect_activity() {
    let engine = engine_with_static_book();

    let market = engine.submit_order(&request(
        "met-1",
        "AAPL",
        OrderType::Market,
        Side::Buy,
        100,
        0.0,
        0.0,
        TimeInForce::Ioc,
    ));
    assert_eq!(market.result, ExecutionResult::Success);

    let limit = engine.submit_order(&request(
        "met-2",
        "AAPL",
        OrderType::Limit,
        Side::Buy,
        10,
        200.0,
        0.0,
        TimeInForce::Gtc,
    ));
    assert_eq!(limit.result, ExecutionResult::Success);

    let metrics = engine.metrics();
    assert!(metrics.total_orders_processed >= 2);
    assert!(metrics.successful_executions >= 2);
    assert_eq!(
        metrics.successful_executions + metrics.failed_executions,
        metrics.total_orders_processed
    );
    assert!(metrics.average_latency_micros > 0.0);
    assert!(metrics.uptime_seconds >= 0);

    engine.stop();
}

#[test]
fn lifecycle_is_idempotent() {
    let engine = ExecutionEngine::new();

    // Stop before anything is a success
    assert_eq!(engine.stop(), ExecutionResult::Success);

    assert_eq!(engine.initialize("{}"), ExecutionResult::Success);
    assert_eq!(engine.initialize("{}"), ExecutionResult::Success);

    assert_eq!(engine.start(), ExecutionResult::Success);
    assert_eq!(engine.start(), ExecutionResult::Success);
    assert!(engine.is_healthy());

    assert_eq!(engine.stop(), ExecutionResult::Success);
    assert!(!engine.is_healthy());
    assert_eq!(engine.stop(), ExecutionResult::Success);
}

#[test]
fn expiry_sweep_retires_stale_orders() {
    let engine = ExecutionEngine::new();
    assert_eq!(
        engine.initialize(
            r#"{"enable_simulation": false, "order_timeout_ns": 1000000, "expiry_sweep_interval_ms": 20}"#
        ),
        ExecutionResult::Success
    );
    assert_eq!(engine.start(), ExecutionResult::Success);
    engine
        .apply_book_update("AAPL", Side::Sell, Price::from_f64(150.15), Quantity::from_u64(1_000), 0)
        .unwrap();

    let expired = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&expired);
    engine.register_status_callback(Box::new(move |order_id, status, message| {
        if status == OrderStatus::Expired {
            assert_eq!(order_id, "exp-1");
            assert_eq!(message, "Order expired");
            seen.fetch_add(1, Ordering::Relaxed);
        }
    }));

    let response = engine.submit_order(&request(
        "exp-1",
        "AAPL",
        OrderType::Limit,
        Side::Buy,
        10,
        1.0,
        0.0,
        TimeInForce::Gtc,
    ));
    assert_eq!(response.status, OrderStatus::Submitted);

    // 1 ms timeout, 20 ms sweep cadence: well retired within half a second
    for _ in 0..50 {
        if expired.load(Ordering::Relaxed) > 0 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(expired.load(Ordering::Relaxed), 1);

    let err = engine.cancel_order("exp-1").unwrap_err();
    assert_eq!(err.result_code(), ExecutionResult::OrderNotFound);

    engine.stop();
}

#[test]
fn concurrent_submissions_all_complete() {
    let engine = engine_with_static_book();
    // Deep book so every market order fills
    engine
        .apply_book_update("AAPL", Side::Sell, Price::from_f64(150.15), Quantity::from_u64(1_000_000), 0)
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..25 {
                    let response = engine.submit_order(&request(
                        &format!("con-{worker}-{i}"),
                        "AAPL",
                        OrderType::Market,
                        Side::Buy,
                        10,
                        0.0,
                        0.0,
                        TimeInForce::Ioc,
                    ));
                    assert_eq!(response.result, ExecutionResult::Success);
                    assert_eq!(response.status, OrderStatus::Filled);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let metrics = engine.metrics();
    assert_eq!(metrics.total_orders_processed, 100);
    assert_eq!(metrics.successful_executions, 100);

    engine.stop();
}

#[test]
fn fill_callbacks_carry_fees_and_venue() {
    let engine = engine_with_static_book();

    let fills: Arc<Mutex<Vec<(String, Quantity, Decimal, String)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fills);
    engine.register_fill_callback(Box::new(move |fill| {
        sink.lock().unwrap().push((
            fill.order_id.clone(),
            fill.quantity,
            fill.fee,
            fill.venue.clone(),
        ));
    }));

    engine.submit_order(&request(
        "fee-1",
        "AAPL",
        OrderType::Market,
        Side::Buy,
        200,
        0.0,
        0.0,
        TimeInForce::Ioc,
    ));

    let fills = fills.lock().unwrap();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].0, "fee-1");
    assert_eq!(fills[0].1, Quantity::from_u64(200));
    // fee = 0.001 · size
    assert_eq!(fills[0].2, Decimal::new(200, 3));
    assert_eq!(fills[0].3, "SIM");

    engine.stop();
}

#[test]
fn simulator_populates_all_seed_books() {
    let engine = ExecutionEngine::new();
    assert_eq!(engine.initialize("{}"), ExecutionResult::Success);
    assert_eq!(engine.start(), ExecutionResult::Success);
    thread::sleep(Duration::from_millis(250));

    for (symbol, seed_mid) in execution_engine::SEED_SYMBOLS {
        let snapshot = engine.book_snapshot(symbol).unwrap();
        assert!(snapshot.bid_price.is_positive(), "{symbol} bid unset");
        assert!(snapshot.ask_price.is_positive(), "{symbol} ask unset");
        assert!(snapshot.ask_price >= snapshot.bid_price, "{symbol} crossed");
        assert_eq!(snapshot.bid_size, Quantity::from_u64(1_000));
        assert!(snapshot.timestamp_ns > 0);

        let mid = snapshot.last_price.to_f64();
        assert!(
            (mid - seed_mid).abs() / seed_mid < 0.05,
            "{symbol} drifted implausibly far from {seed_mid}: {mid}"
        );
    }

    engine.stop();
    // Post-stop: no live simulator keeps touching the books
    let stamp = engine.book_snapshot("AAPL").unwrap().timestamp_ns;
    thread::sleep(Duration::from_millis(150));
    assert_eq!(engine.book_snapshot("AAPL").unwrap().timestamp_ns, stamp);
}
