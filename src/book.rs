//! Per-symbol limit order book with price-time priority matching.
//!
//! Two sorted ladders (bids descending, asks ascending) of FIFO price
//! levels, an id map for O(1) cancel, and a bounded history of recent
//! trades. All state sits behind one reader-writer lock; books for
//! different symbols never contend.
//!
//! Matching is aggressor-driven: an incoming order crosses against the
//! opposite side level by level, then any remainder rests at its own
//! price. Executions print at the resting order's price. Market orders
//! never rest; a residual that exhausts the opposite side is cancelled.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::clock;
use crate::level::PriceLevel;
use crate::market_data::{MarketData, OrderBookSnapshot, SNAPSHOT_DEPTH};
use crate::order::{Order, OrderStatus, OrderType, Side};
use crate::slab::{OrderRef, OrderSlab};

/// Trades retained per book, oldest evicted.
pub const MAX_TRADE_HISTORY: usize = 1000;

/// Default bound on resting orders per book.
pub const DEFAULT_MAX_ORDERS_PER_BOOK: u32 = 100_000;

pub struct OrderBook {
    symbol: String,
    inner: RwLock<Inner>,
}

struct Inner {
    slab: OrderSlab,
    /// Bid ladder; best bid is the LAST key
    bids: BTreeMap<u64, PriceLevel>,
    /// Ask ladder; best ask is the FIRST key
    asks: BTreeMap<u64, PriceLevel>,
    by_id: FxHashMap<u64, OrderRef>,
    recent_trades: VecDeque<MarketData>,
    trade_count: u64,
    total_volume: u128,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_capacity(symbol, DEFAULT_MAX_ORDERS_PER_BOOK)
    }

    /// Create a book bounded at `max_orders` resting orders.
    pub fn with_capacity(symbol: impl Into<String>, max_orders: u32) -> Self {
        Self {
            symbol: symbol.into(),
            inner: RwLock::new(Inner {
                slab: OrderSlab::with_capacity(max_orders),
                bids: BTreeMap::new(),
                asks: BTreeMap::new(),
                by_id: FxHashMap::default(),
                recent_trades: VecDeque::with_capacity(MAX_TRADE_HISTORY),
                trade_count: 0,
                total_volume: 0,
            }),
        }
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Admit an order and run matching.
    ///
    /// Rejects (returns `false`, no state change) on: symbol mismatch,
    /// zero order id, duplicate id, zero quantity, zero-priced limit
    /// order, stop-type orders, or a full book. On admission the order
    /// gets its arrival timestamp, crosses against the opposite side,
    /// and any remaining limit quantity rests. Market residue is
    /// cancelled, never rested.
    pub fn add_order(&self, mut order: Order) -> bool {
        if order.symbol != self.symbol || order.order_id == 0 || order.quantity == 0 {
            return false;
        }
        match order.order_type {
            OrderType::Market => {}
            OrderType::Limit => {
                if order.price == 0 {
                    return false;
                }
            }
            // Tags without semantics; resting them silently would be worse
            OrderType::Stop | OrderType::StopLimit => return false,
        }

        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&order.order_id) {
            return false;
        }
        // Capacity is checked up front: matching only frees slots, so a
        // rejected order has touched nothing.
        if order.order_type == OrderType::Limit && inner.slab.is_full() {
            return false;
        }

        order.timestamp = clock::monotonic_ns();
        order.status = OrderStatus::Pending;
        order.filled_quantity = 0;

        match order.order_type {
            OrderType::Market => inner.execute_market(&self.symbol, order),
            _ => inner.execute_limit(&self.symbol, order),
        }
        true
    }

    /// Cancel a resting order. Returns `false` (and changes nothing) if
    /// the id is unknown; safe to call repeatedly.
    pub fn cancel_order(&self, order_id: u64) -> bool {
        let mut inner = self.inner.write();
        let Some(index) = inner.by_id.remove(&order_id) else {
            return false;
        };
        let mut order = inner.unlink_and_remove(index);
        order.status = OrderStatus::Cancelled;
        true
    }

    /// Amend a resting order's quantity and price.
    ///
    /// The order loses its time priority unconditionally: it is
    /// re-stamped and re-queued at the tail of its (possibly new) level,
    /// then matching runs. Returns `false` on unknown id, zero or
    /// already-filled-past quantity, or zero price.
    pub fn modify_order(&self, order_id: u64, new_quantity: u64, new_price: u64) -> bool {
        let mut inner = self.inner.write();
        let Some(&index) = inner.by_id.get(&order_id) else {
            return false;
        };
        if new_quantity == 0 || new_price == 0 || new_quantity <= inner.slab.get(index).filled_quantity {
            return false;
        }

        inner.by_id.remove(&order_id);
        let mut order = inner.unlink_and_remove(index);
        order.quantity = new_quantity;
        order.price = new_price;
        order.timestamp = clock::monotonic_ns();
        inner.execute_limit(&self.symbol, order);
        true
    }

    // ========================================================================
    // Top of Book
    // ========================================================================

    pub fn best_bid(&self) -> Option<u64> {
        self.inner.read().bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.inner.read().asks.keys().next().copied()
    }

    /// Remaining quantity at the best bid; 0 when the side is empty.
    pub fn best_bid_quantity(&self) -> u64 {
        let inner = self.inner.read();
        inner
            .bids
            .values()
            .next_back()
            .map_or(0, |level| level.total_remaining())
    }

    /// Remaining quantity at the best ask; 0 when the side is empty.
    pub fn best_ask_quantity(&self) -> u64 {
        let inner = self.inner.read();
        inner
            .asks
            .values()
            .next()
            .map_or(0, |level| level.total_remaining())
    }

    // ========================================================================
    // Depth and Snapshots
    // ========================================================================

    /// Up to `levels` best bid levels as `(price, total remaining)`.
    pub fn get_bids(&self, levels: usize) -> Vec<(u64, u64)> {
        let inner = self.inner.read();
        inner
            .bids
            .iter()
            .rev()
            .take(levels)
            .map(|(price, level)| (*price, level.total_remaining()))
            .collect()
    }

    /// Up to `levels` best ask levels as `(price, total remaining)`.
    pub fn get_asks(&self, levels: usize) -> Vec<(u64, u64)> {
        let inner = self.inner.read();
        inner
            .asks
            .iter()
            .take(levels)
            .map(|(price, level)| (*price, level.total_remaining()))
            .collect()
    }

    /// Point-in-time depth view, top 10 levels per side.
    pub fn get_snapshot(&self) -> OrderBookSnapshot {
        let inner = self.inner.read();
        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            timestamp: clock::monotonic_ns(),
            bids: inner
                .bids
                .iter()
                .rev()
                .take(SNAPSHOT_DEPTH)
                .map(|(price, level)| (*price, level.total_remaining()))
                .collect(),
            asks: inner
                .asks
                .iter()
                .take(SNAPSHOT_DEPTH)
                .map(|(price, level)| (*price, level.total_remaining()))
                .collect(),
        }
    }

    /// Up to `count` most recent trades, newest first.
    pub fn get_recent_trades(&self, count: usize) -> Vec<MarketData> {
        let inner = self.inner.read();
        inner.recent_trades.iter().rev().take(count).cloned().collect()
    }

    /// Value copy of a resting order.
    pub fn get_order(&self, order_id: u64) -> Option<Order> {
        let inner = self.inner.read();
        inner.by_id.get(&order_id).map(|&index| inner.slab.get(index).clone())
    }

    // ========================================================================
    // Counters
    // ========================================================================

    /// Number of resting orders
    pub fn order_count(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Trades executed over the book's lifetime
    pub fn trade_count(&self) -> u64 {
        self.inner.read().trade_count
    }

    /// Cumulative notional: sum of price * quantity over all trades
    pub fn total_volume(&self) -> u128 {
        self.inner.read().total_volume
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("OrderBook")
            .field("symbol", &self.symbol)
            .field("best_bid", &inner.bids.keys().next_back())
            .field("best_ask", &inner.asks.keys().next())
            .field("orders", &inner.by_id.len())
            .field("trades", &inner.trade_count)
            .finish()
    }
}

impl Inner {
    /// Cross an incoming limit order, then rest any remainder.
    fn execute_limit(&mut self, symbol: &str, mut order: Order) {
        loop {
            if order.remaining() == 0 {
                break;
            }
            let best = match order.side {
                Side::Buy => self.asks.keys().next().copied(),
                Side::Sell => self.bids.keys().next_back().copied(),
            };
            let Some(best_price) = best else { break };
            let crosses = match order.side {
                Side::Buy => order.price >= best_price,
                Side::Sell => order.price <= best_price,
            };
            if !crosses {
                break;
            }
            self.match_at(symbol, &mut order, best_price);
        }

        if order.remaining() > 0 {
            self.rest(order);
        }
    }

    /// Cross a market order against the opposite side until filled or
    /// the side is exhausted; the residual is cancelled, never rested.
    fn execute_market(&mut self, symbol: &str, mut order: Order) {
        loop {
            if order.remaining() == 0 {
                break;
            }
            let best = match order.side {
                Side::Buy => self.asks.keys().next().copied(),
                Side::Sell => self.bids.keys().next_back().copied(),
            };
            let Some(best_price) = best else { break };
            self.match_at(symbol, &mut order, best_price);
        }
        if order.remaining() > 0 {
            order.status = OrderStatus::Cancelled;
        }
    }

    /// Match the taker against the opposite-side level at `price` until
    /// the taker or the level is exhausted. Executions print at the
    /// level price. The level is re-queried after every unlink; no
    /// ladder iterator is held across a mutation.
    fn match_at(&mut self, symbol: &str, taker: &mut Order, price: u64) {
        let maker_side = taker.side.opposite();
        loop {
            if taker.remaining() == 0 {
                return;
            }
            let maker_index = {
                let level = match maker_side {
                    Side::Buy => self.bids.get(&price),
                    Side::Sell => self.asks.get(&price),
                };
                match level {
                    Some(level) if !level.is_empty() => level.front(),
                    _ => return,
                }
            };

            let maker_remaining = self.slab.get(maker_index).remaining();
            let quantity = taker.remaining().min(maker_remaining);

            self.push_trade(symbol, price, quantity);
            taker.fill(quantity);

            let maker = self.slab.get_mut(maker_index);
            maker.fill(quantity);
            let maker_done = maker.is_filled();
            let maker_id = maker.order_id;

            let level = match maker_side {
                Side::Buy => self.bids.get_mut(&price),
                Side::Sell => self.asks.get_mut(&price),
            };
            let Some(level) = level else { return };
            level.reduce(quantity);

            if maker_done {
                level.pop_front(&mut self.slab);
                let now_empty = level.is_empty();
                self.by_id.remove(&maker_id);
                self.slab.remove(maker_index);
                if now_empty {
                    match maker_side {
                        Side::Buy => self.bids.remove(&price),
                        Side::Sell => self.asks.remove(&price),
                    };
                    return; // level gone, caller re-queries the ladder
                }
            }
        }
    }

    /// Queue the remainder of an order at the tail of its price level.
    fn rest(&mut self, order: Order) {
        let order_id = order.order_id;
        let side = order.side;
        let price = order.price;

        let Some(index) = self.slab.insert(order) else {
            // Capacity was verified at admission and matching only frees
            unreachable!("order slab exhausted after admission check");
        };
        self.by_id.insert(order_id, index);
        let level = match side {
            Side::Buy => self.bids.entry(price).or_default(),
            Side::Sell => self.asks.entry(price).or_default(),
        };
        level.push_back(&mut self.slab, index);
    }

    /// Unlink a resting order from its level (dropping the level if it
    /// empties) and reclaim its slab slot.
    fn unlink_and_remove(&mut self, index: OrderRef) -> Order {
        let (side, price) = {
            let order = self.slab.get(index);
            (order.side, order.price)
        };
        let mut now_empty = false;
        match side {
            Side::Buy => {
                if let Some(level) = self.bids.get_mut(&price) {
                    now_empty = level.unlink(&mut self.slab, index);
                }
            }
            Side::Sell => {
                if let Some(level) = self.asks.get_mut(&price) {
                    now_empty = level.unlink(&mut self.slab, index);
                }
            }
        }
        if now_empty {
            match side {
                Side::Buy => self.bids.remove(&price),
                Side::Sell => self.asks.remove(&price),
            };
        }
        self.slab.remove(index)
    }

    fn push_trade(&mut self, symbol: &str, price: u64, quantity: u64) {
        let trade_id = self.trade_count + 1;
        let mut trade = MarketData::trade(symbol, clock::monotonic_ns(), price, quantity, trade_id);
        trade.sequence_number = trade_id;

        self.recent_trades.push_back(trade);
        if self.recent_trades.len() > MAX_TRADE_HISTORY {
            self.recent_trades.pop_front();
        }

        self.trade_count = trade_id;
        self.total_volume += price as u128 * quantity as u128;
    }
}
