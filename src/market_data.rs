//! Market data events and book snapshots.
//!
//! Events are tagged records: a shared envelope (sequence number, symbol,
//! timestamp) plus a type-specific body. Trades produced by matching carry
//! the book-assigned trade id.

use serde::{Deserialize, Serialize};

/// Depth retained in a snapshot, per side.
pub const SNAPSHOT_DEPTH: usize = 10;

/// Discriminant of a market data event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MarketDataType {
    Trade = 0,
    Quote = 1,
    OrderBookUpdate = 2,
    Tick = 3,
}

/// Type-specific payload of a market data event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketDataBody {
    /// An execution
    Trade { price: u64, quantity: u64, trade_id: u64 },
    /// Top of book on both sides
    Quote {
        bid_price: u64,
        bid_quantity: u64,
        ask_price: u64,
        ask_quantity: u64,
    },
    /// A single level changed
    BookUpdate { price: u64, quantity: u64, is_bid: bool },
    /// Last price observation
    Tick { price: u64, quantity: u64 },
}

impl MarketDataBody {
    #[inline]
    pub const fn kind(&self) -> MarketDataType {
        match self {
            MarketDataBody::Trade { .. } => MarketDataType::Trade,
            MarketDataBody::Quote { .. } => MarketDataType::Quote,
            MarketDataBody::BookUpdate { .. } => MarketDataType::OrderBookUpdate,
            MarketDataBody::Tick { .. } => MarketDataType::Tick,
        }
    }
}

/// A market data event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketData {
    /// Assigned by the publisher; engine-submitted events are renumbered
    pub sequence_number: u64,
    pub symbol: String,
    /// Monotonic nanoseconds
    pub timestamp: u64,
    pub body: MarketDataBody,
}

impl MarketData {
    /// Build a trade event as emitted by the matching path.
    pub fn trade(symbol: impl Into<String>, timestamp: u64, price: u64, quantity: u64, trade_id: u64) -> Self {
        Self {
            sequence_number: 0,
            symbol: symbol.into(),
            timestamp,
            body: MarketDataBody::Trade { price, quantity, trade_id },
        }
    }
}

/// Aggregated point-in-time depth view of one book.
///
/// At most [`SNAPSHOT_DEPTH`] levels per side, best first. Entries are
/// `(price, total remaining quantity)` pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub timestamp: u64,
    pub bids: Vec<(u64, u64)>,
    pub asks: Vec<(u64, u64)>,
}

impl OrderBookSnapshot {
    #[inline]
    pub fn best_bid(&self) -> Option<(u64, u64)> {
        self.bids.first().copied()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<(u64, u64)> {
        self.asks.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_kind() {
        let trade = MarketDataBody::Trade { price: 100, quantity: 5, trade_id: 1 };
        assert_eq!(trade.kind(), MarketDataType::Trade);

        let quote = MarketDataBody::Quote {
            bid_price: 99,
            bid_quantity: 10,
            ask_price: 101,
            ask_quantity: 20,
        };
        assert_eq!(quote.kind(), MarketDataType::Quote);

        let update = MarketDataBody::BookUpdate { price: 100, quantity: 0, is_bid: true };
        assert_eq!(update.kind(), MarketDataType::OrderBookUpdate);

        let tick = MarketDataBody::Tick { price: 100, quantity: 1 };
        assert_eq!(tick.kind(), MarketDataType::Tick);
    }

    #[test]
    fn test_trade_constructor() {
        let trade = MarketData::trade("AAPL", 42, 150_00, 25, 7);
        assert_eq!(trade.symbol, "AAPL");
        assert_eq!(trade.timestamp, 42);
        assert_eq!(
            trade.body,
            MarketDataBody::Trade { price: 150_00, quantity: 25, trade_id: 7 }
        );
    }

    #[test]
    fn test_snapshot_best_levels() {
        let snapshot = OrderBookSnapshot {
            symbol: "AAPL".into(),
            timestamp: 0,
            bids: vec![(150_00, 30), (149_00, 10)],
            asks: vec![(151_00, 20)],
        };
        assert_eq!(snapshot.best_bid(), Some((150_00, 30)));
        assert_eq!(snapshot.best_ask(), Some((151_00, 20)));

        let empty = OrderBookSnapshot::default();
        assert_eq!(empty.best_bid(), None);
        assert_eq!(empty.best_ask(), None);
    }
}
