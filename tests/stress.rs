//! Stress tests - push the book and engine near their limits.
//!
//! - Near-capacity operation
//! - High contention at single price levels
//! - Rapid order churn
//! - Extreme prices and quantities

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use quickmatch::{Order, OrderBook, OrderStatus, Side};

#[test]
fn test_near_capacity_operation() {
    const CAPACITY: u32 = 10_000;
    let book = OrderBook::with_capacity("STRESS", CAPACITY);

    // Fill to 95% with non-overlapping prices: bids 8000-8999, asks
    // 10000-10999, so nothing ever crosses.
    let target = (CAPACITY as f64 * 0.95) as u64;
    for i in 0..target {
        let (side, price) = if i % 2 == 0 {
            (Side::Buy, 8_000 + (i % 100) * 10)
        } else {
            (Side::Sell, 10_000 + (i % 100) * 10)
        };
        assert!(
            book.add_order(Order::limit(i + 1, 1, "STRESS", side, 100, price)),
            "order {} should be accepted",
            i
        );
    }

    assert_eq!(book.order_count(), target as usize);
    assert_eq!(book.trade_count(), 0);
}

#[test]
fn test_capacity_rejection_and_recovery() {
    const CAPACITY: u32 = 100;
    let book = OrderBook::with_capacity("STRESS", CAPACITY);

    for i in 0..CAPACITY as u64 {
        assert!(book.add_order(Order::limit(i + 1, 1, "STRESS", Side::Buy, 10, 5_000 + i)));
    }
    assert!(
        !book.add_order(Order::limit(1_000, 1, "STRESS", Side::Buy, 10, 4_000)),
        "book at capacity must refuse new resting orders"
    );

    // Freeing one slot restores admission.
    assert!(book.cancel_order(1));
    assert!(book.add_order(Order::limit(1_000, 1, "STRESS", Side::Buy, 10, 4_000)));
    assert_eq!(book.order_count(), CAPACITY as usize);
}

#[test]
fn test_single_level_contention() {
    let book = OrderBook::new("STRESS");

    // 1000 orders stacked on one price, then one sweep through half.
    for i in 0..1_000u64 {
        assert!(book.add_order(Order::limit(i + 1, 1, "STRESS", Side::Sell, 10, 10_000)));
    }
    assert_eq!(book.best_ask_quantity(), 10_000);

    assert!(book.add_order(Order::limit(5_000, 2, "STRESS", Side::Buy, 5_000, 10_000)));
    assert_eq!(book.trade_count(), 500, "each maker fills whole");
    assert_eq!(book.best_ask_quantity(), 5_000);
    assert_eq!(book.order_count(), 500);

    // The earliest 500 are gone, the rest remain in arrival order.
    assert!(book.get_order(500).is_none());
    assert!(book.get_order(501).is_some());
}

#[test]
fn test_rapid_churn_reuses_slots() {
    let book = OrderBook::with_capacity("STRESS", 64);
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    // Place/cancel far more orders than the book can hold at once.
    for round in 0..10_000u64 {
        let id = round + 1;
        let price = rng.gen_range(9_000..9_100);
        assert!(book.add_order(Order::limit(id, 1, "STRESS", Side::Buy, 10, price)));
        assert!(book.cancel_order(id));
    }
    assert_eq!(book.order_count(), 0);
    assert_eq!(book.best_bid(), None);
}

#[test]
fn test_deep_ladder_sweep() {
    let book = OrderBook::new("STRESS");

    for i in 0..100u64 {
        assert!(book.add_order(Order::limit(i + 1, 1, "STRESS", Side::Sell, 10, 10_000 + i)));
    }

    // One buy takes out the whole ladder.
    assert!(book.add_order(Order::limit(500, 2, "STRESS", Side::Buy, 1_000, 20_000)));
    assert_eq!(book.trade_count(), 100);
    assert_eq!(book.best_ask(), None);
    assert_eq!(book.order_count(), 0, "the taker finished exactly filled");

    // Prices consumed best-first.
    let mut trades = book.get_recent_trades(100);
    trades.reverse();
    let prices: Vec<u64> = trades
        .iter()
        .map(|t| match t.body {
            quickmatch::MarketDataBody::Trade { price, .. } => price,
            _ => panic!("expected trade"),
        })
        .collect();
    assert!(prices.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_extreme_values() {
    let book = OrderBook::new("STRESS");

    // Maximum price with unit quantity: notional exceeds u64.
    assert!(book.add_order(Order::limit(1, 1, "STRESS", Side::Buy, 3, u64::MAX)));
    assert!(book.add_order(Order::limit(2, 2, "STRESS", Side::Sell, 3, u64::MAX)));
    assert_eq!(book.total_volume(), u64::MAX as u128 * 3);

    // Huge quantities match without overflow.
    assert!(book.add_order(Order::limit(3, 1, "STRESS", Side::Buy, u64::MAX / 2, 100)));
    assert!(book.add_order(Order::limit(4, 2, "STRESS", Side::Sell, u64::MAX / 2, 100)));
    assert_eq!(book.order_count(), 0);
    assert_eq!(book.trade_count(), 2);
}

#[test]
fn test_market_orders_under_churn() {
    let book = OrderBook::new("STRESS");
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut next_id = 1u64;
    let mut market_residuals = 0u64;

    for _ in 0..2_000 {
        let id = next_id;
        next_id += 1;
        if rng.gen_bool(0.8) {
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let price = rng.gen_range(9_990..10_010);
            assert!(book.add_order(Order::limit(id, 1, "STRESS", side, rng.gen_range(1..50), price)));
        } else {
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            assert!(book.add_order(Order::market(id, 1, "STRESS", side, rng.gen_range(1..200))));
            market_residuals += 1;
        }

        // Market orders never rest, whatever happened above.
        assert!(book.get_order(id).is_none() || book.get_order(id).unwrap().order_type == quickmatch::OrderType::Limit);
        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            assert!(bid < ask, "book crossed after churn");
        }
    }
    assert!(market_residuals > 0, "stream should have included market orders");
}

#[test]
fn test_cancelled_order_status_is_terminal() {
    let book = OrderBook::new("STRESS");
    assert!(book.add_order(Order::limit(1, 1, "STRESS", Side::Buy, 100, 10_000)));
    assert!(book.add_order(Order::limit(2, 2, "STRESS", Side::Sell, 40, 10_000)));

    let resting = book.get_order(1).unwrap();
    assert_eq!(resting.status, OrderStatus::PartiallyFilled);

    assert!(book.cancel_order(1));
    assert!(book.get_order(1).is_none());
    assert!(!book.cancel_order(1));
}
