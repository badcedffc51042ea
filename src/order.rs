//! Order types and quantity accounting.
//!
//! An [`Order`] is the unit of intent handed to the engine. The book owns
//! the mutable state of a resting order; everything outside the book sees
//! value copies.

use serde::{Deserialize, Serialize};

/// Recommended upper bound on symbol length.
pub const MAX_SYMBOL_LEN: usize = 16;

/// Order side (buy = bid, sell = ask)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Buy = 0,
    /// Sell side (asks)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type determines matching behavior.
///
/// Only `Market` and `Limit` have defined semantics; `Stop` and
/// `StopLimit` exist as tags and are rejected on submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderType {
    /// Match immediately against the opposite side, never rests
    Market = 0,
    /// Rest in the book if not fully matched (default)
    #[default]
    Limit = 1,
    /// Stop order (tag only, no semantics)
    Stop = 2,
    /// Stop-limit order (tag only, no semantics)
    StopLimit = 3,
}

/// Lifecycle state of an order.
///
/// Transitions are monotone: `Pending -> PartiallyFilled -> Filled`,
/// with `Cancelled` and `Rejected` as terminal exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderStatus {
    #[default]
    Pending = 0,
    PartiallyFilled = 1,
    Filled = 2,
    Cancelled = 3,
    Rejected = 4,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Rejected)
    }
}

/// A limit or market order.
///
/// Prices are fixed-point ticks; tick interpretation belongs to the
/// submitting edge. `timestamp` is assigned by the book at admission,
/// not by the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Globally unique, non-zero, assigned by the submitter
    pub order_id: u64,
    /// Opaque originator id, not interpreted by the engine
    pub client_id: u64,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Total intent; immutable except through modify
    pub quantity: u64,
    /// Monotonically non-decreasing, bounded by `quantity`
    pub filled_quantity: u64,
    /// Price in ticks; ignored for market orders
    pub price: u64,
    /// Monotonic nanoseconds at admission
    pub timestamp: u64,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(
        order_id: u64,
        client_id: u64,
        symbol: impl Into<String>,
        side: Side,
        order_type: OrderType,
        quantity: u64,
        price: u64,
    ) -> Self {
        Self {
            order_id,
            client_id,
            symbol: symbol.into(),
            side,
            order_type,
            quantity,
            filled_quantity: 0,
            price,
            timestamp: 0,
            status: OrderStatus::Pending,
        }
    }

    /// Create a limit order (most common case)
    #[inline]
    pub fn limit(
        order_id: u64,
        client_id: u64,
        symbol: impl Into<String>,
        side: Side,
        quantity: u64,
        price: u64,
    ) -> Self {
        Self::new(order_id, client_id, symbol, side, OrderType::Limit, quantity, price)
    }

    /// Create a market order; the price field is ignored
    #[inline]
    pub fn market(
        order_id: u64,
        client_id: u64,
        symbol: impl Into<String>,
        side: Side,
        quantity: u64,
    ) -> Self {
        Self::new(order_id, client_id, symbol, side, OrderType::Market, quantity, 0)
    }

    /// Unfilled quantity
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.quantity - self.filled_quantity
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }

    #[inline]
    pub fn is_partially_filled(&self) -> bool {
        self.filled_quantity > 0 && self.filled_quantity < self.quantity
    }

    /// Apply a fill and advance the status machine.
    #[inline]
    pub(crate) fn fill(&mut self, quantity: u64) {
        debug_assert!(quantity <= self.remaining());
        self.filled_quantity += quantity;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::new(0, 0, String::new(), Side::Buy, OrderType::Limit, 0, 0)
    }
}
