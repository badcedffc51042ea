//! # Quickmatch
//!
//! A multi-symbol limit order matching engine.
//!
//! ## Design Principles
//!
//! - **Price-time priority**: better price first, then earlier arrival;
//!   FIFO within a price level, never re-sorted
//! - **Symbol sharding**: all orders for a symbol drain on one worker,
//!   so per-symbol fairness follows from per-ring FIFO
//! - **Slab-backed books**: resting orders live in a slab with stable
//!   handles; cancel is O(1) via an intrusive level list
//! - **SPSC ingress**: one lock-free ring per worker; producers are
//!   serialized at the edge, never upgraded to multi-consumer
//!
//! ## Architecture
//!
//! ```text
//! [Submitters] --> [SPSC ring per shard] --> [Matching Workers]
//!                                                  |
//!                                   [BookRegistry: symbol -> OrderBook]
//!                                                  |
//!                     [market data rings] --> [MD Workers] --> callback
//! ```

pub mod book;
mod clock;
pub mod engine;
pub mod level;
pub mod market_data;
pub mod metrics;
pub mod order;
pub mod registry;
pub mod ring;
pub mod sim;
pub mod slab;

// Re-exports for convenience
pub use book::{OrderBook, DEFAULT_MAX_ORDERS_PER_BOOK, MAX_TRADE_HISTORY};
pub use engine::{EngineConfig, MarketDataCallback, MatchingEngine};
pub use market_data::{MarketData, MarketDataBody, MarketDataType, OrderBookSnapshot, SNAPSHOT_DEPTH};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use order::{Order, OrderStatus, OrderType, Side, MAX_SYMBOL_LEN};
pub use registry::BookRegistry;
pub use ring::RingBuffer;
pub use sim::{FeedConfig, FeedError, SimulatedFeed};
