//! Engine orchestration: sharded ingress, matching workers, market data
//! fan-out.
//!
//! Every matching worker owns one SPSC ring and is the only consumer of
//! it; `submit_order` routes by symbol hash so all orders for a symbol
//! land on the same worker, which preserves global price-time fairness
//! per symbol. External producers are serialized with a per-shard mutex
//! around the push, keeping the rings strictly single-producer.
//!
//! Cancels and amendments bypass the rings and go straight to the book;
//! cancellation latency must not queue behind submissions.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use tracing::{debug, info, warn};

use crate::book::{OrderBook, DEFAULT_MAX_ORDERS_PER_BOOK};
use crate::market_data::MarketData;
use crate::metrics::{EngineMetrics, RateWindow};
use crate::order::Order;
use crate::registry::BookRegistry;
use crate::ring::RingBuffer;

/// Observer invoked on market data workers for every drained event.
pub type MarketDataCallback = Arc<dyn Fn(&MarketData) + Send + Sync>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Matching workers; also the number of order ring shards
    pub matching_workers: usize,
    /// Market data workers; also the number of market data rings
    pub market_data_workers: usize,
    /// Slots per ring; must be a power of two
    pub ring_capacity: usize,
    /// Max items a worker drains per iteration
    pub batch_size: usize,
    /// Resting-order bound per book
    pub max_orders_per_book: u32,
    /// Idle park between empty batches, in microseconds
    pub idle_wait_us: u64,
    /// Pin workers to cores
    pub pin_workers: bool,
    /// Run the per-second accounting thread
    pub enable_metrics_thread: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching_workers: 4,
            market_data_workers: 2,
            ring_capacity: 65_536,
            batch_size: 100,
            max_orders_per_book: DEFAULT_MAX_ORDERS_PER_BOOK,
            idle_wait_us: 10,
            pin_workers: false,
            enable_metrics_thread: true,
        }
    }
}

/// One ingress lane: an SPSC ring plus the mutex that serializes
/// external producers. The owning worker is the only consumer.
struct Shard<T> {
    ring: Arc<RingBuffer<T>>,
    gate: Mutex<()>,
}

impl<T: Send> Shard<T> {
    fn new(capacity: usize) -> Self {
        Self {
            ring: Arc::new(RingBuffer::with_capacity(capacity)),
            gate: Mutex::new(()),
        }
    }

    fn push(&self, item: T) -> Result<(), T> {
        let _guard = self.gate.lock();
        self.ring.try_push(item)
    }
}

/// State shared with the worker threads.
struct Shared {
    registry: BookRegistry,
    metrics: EngineMetrics,
    callback: RwLock<Option<MarketDataCallback>>,
    shutdown: AtomicBool,
    md_shards: Vec<Shard<MarketData>>,
    md_cursor: AtomicUsize,
    md_sequence: AtomicU64,
}

impl Shared {
    /// Renumber and enqueue an event onto one of the market data rings.
    fn publish_market_data(&self, mut data: MarketData) -> bool {
        data.sequence_number = self.md_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let index = self.md_cursor.fetch_add(1, Ordering::Relaxed) % self.md_shards.len();
        self.md_shards[index].push(data).is_ok()
    }
}

pub struct MatchingEngine {
    config: EngineConfig,
    shared: Arc<Shared>,
    order_shards: Vec<Shard<Order>>,
    running: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// # Panics
    /// Panics when `ring_capacity` is not a power of two or a worker
    /// count is zero.
    pub fn with_config(config: EngineConfig) -> Self {
        assert!(
            config.ring_capacity.is_power_of_two() && config.ring_capacity > 1,
            "ring capacity must be a power of two greater than one"
        );
        assert!(config.matching_workers > 0, "at least one matching worker required");
        assert!(config.market_data_workers > 0, "at least one market data worker required");
        assert!(config.batch_size > 0, "batch size must be positive");

        let order_shards = (0..config.matching_workers)
            .map(|_| Shard::new(config.ring_capacity))
            .collect();
        let md_shards = (0..config.market_data_workers)
            .map(|_| Shard::new(config.ring_capacity))
            .collect();

        Self {
            shared: Arc::new(Shared {
                registry: BookRegistry::new(config.max_orders_per_book),
                metrics: EngineMetrics::new(),
                callback: RwLock::new(None),
                shutdown: AtomicBool::new(false),
                md_shards,
                md_cursor: AtomicUsize::new(0),
                md_sequence: AtomicU64::new(0),
            }),
            order_shards,
            config,
            running: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Spawn the worker pools. Returns `false` if already running.
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shared.shutdown.store(false, Ordering::SeqCst);

        let cores = if self.config.pin_workers {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut workers = self.workers.lock();
        let idle = Duration::from_micros(self.config.idle_wait_us);

        for (index, shard) in self.order_shards.iter().enumerate() {
            let ring = Arc::clone(&shard.ring);
            let shared = Arc::clone(&self.shared);
            let batch_size = self.config.batch_size;
            let core = if cores.is_empty() {
                None
            } else {
                Some(cores[index % cores.len()])
            };
            workers.push(thread::spawn(move || {
                matching_worker(index, ring, shared, batch_size, idle, core)
            }));
        }

        for (index, shard) in self.shared.md_shards.iter().enumerate() {
            let ring = Arc::clone(&shard.ring);
            let shared = Arc::clone(&self.shared);
            let batch_size = self.config.batch_size;
            workers.push(thread::spawn(move || {
                market_data_worker(index, ring, shared, batch_size, idle)
            }));
        }

        if self.config.enable_metrics_thread {
            let shared = Arc::clone(&self.shared);
            workers.push(thread::spawn(move || accounting_worker(shared)));
        }

        info!(
            matching_workers = self.config.matching_workers,
            market_data_workers = self.config.market_data_workers,
            ring_capacity = self.config.ring_capacity,
            "matching engine started"
        );
        true
    }

    /// Signal shutdown and join every worker. Idempotent.
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.shared.shutdown.store(true, Ordering::SeqCst);

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("engine worker panicked during shutdown");
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("matching engine stopped");
    }

    /// Flag-only shutdown request; safe from a signal handler. Workers
    /// wind down on their own; `stop` still joins them.
    pub fn request_stop(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Order Entry
    // ========================================================================

    /// Enqueue an order for matching.
    ///
    /// Returns `false` when the engine is not running or the target
    /// shard's ring is full; the order is then NOT accepted and no book
    /// is touched. Latency is measured here, at enqueue time, because
    /// this is where the engine's promise to the submitter is made.
    pub fn submit_order(&self, order: Order) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        let shard = &self.order_shards[self.shard_for(&order.symbol)];
        let start = Instant::now();
        match shard.push(order) {
            Ok(()) => {
                self.shared
                    .metrics
                    .record_submit_latency(start.elapsed().as_nanos() as u64);
                true
            }
            Err(order) => {
                debug!(order_id = order.order_id, symbol = %order.symbol, "order ring full");
                false
            }
        }
    }

    /// Cancel a resting order. Goes straight to the book, not through
    /// the ring.
    pub fn cancel_order(&self, order_id: u64, symbol: &str) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        match self.shared.registry.get(symbol) {
            Some(book) => book.cancel_order(order_id),
            None => false,
        }
    }

    /// Amend a resting order. Goes straight to the book, not through
    /// the ring.
    pub fn modify_order(&self, order_id: u64, symbol: &str, new_quantity: u64, new_price: u64) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        match self.shared.registry.get(symbol) {
            Some(book) => book.modify_order(order_id, new_quantity, new_price),
            None => false,
        }
    }

    // ========================================================================
    // Market Data
    // ========================================================================

    /// Enqueue an external market data event for observer dispatch.
    pub fn submit_market_data(&self, data: MarketData) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        self.shared.publish_market_data(data)
    }

    /// Register the observer invoked for every market data event,
    /// including trades produced by matching. Runs on market data
    /// workers; a panicking observer is isolated and logged.
    pub fn set_market_data_callback<F>(&self, callback: F)
    where
        F: Fn(&MarketData) + Send + Sync + 'static,
    {
        *self.shared.callback.write() = Some(Arc::new(callback));
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_order_book(&self, symbol: &str) -> Option<Arc<OrderBook>> {
        self.shared.registry.get(symbol)
    }

    pub fn get_order_book_snapshot(&self, symbol: &str) -> Option<crate::market_data::OrderBookSnapshot> {
        self.shared.registry.get(symbol).map(|book| book.get_snapshot())
    }

    pub fn registry(&self) -> &BookRegistry {
        &self.shared.registry
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.shared.metrics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active_symbols(&self) -> Vec<String> {
        self.shared.registry.symbols()
    }

    pub fn total_order_count(&self) -> usize {
        self.shared.registry.total_order_count()
    }

    pub fn total_trade_count(&self) -> u64 {
        self.shared.registry.total_trade_count()
    }

    fn shard_for(&self, symbol: &str) -> usize {
        let mut hasher = FxHasher::default();
        hasher.write(symbol.as_bytes());
        (hasher.finish() as usize) % self.order_shards.len()
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MatchingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drain one order ring in batches and feed the books.
fn matching_worker(
    worker: usize,
    ring: Arc<RingBuffer<Order>>,
    shared: Arc<Shared>,
    batch_size: usize,
    idle: Duration,
    core: Option<core_affinity::CoreId>,
) {
    if let Some(core) = core {
        if !core_affinity::set_for_current(core) {
            warn!(worker, "failed to pin matching worker");
        }
    }
    debug!(worker, "matching worker started");

    let mut batch = Vec::with_capacity(batch_size);
    while !shared.shutdown.load(Ordering::Acquire) {
        batch.clear();
        while batch.len() < batch_size {
            match ring.try_pop() {
                Some(order) => batch.push(order),
                None => break,
            }
        }
        if batch.is_empty() {
            thread::sleep(idle);
            continue;
        }

        for order in batch.drain(..) {
            let book = shared.registry.get_or_create(&order.symbol);
            let trades_before = book.trade_count();
            if book.add_order(order) {
                shared.metrics.incr_orders_processed();
                let new_trades = book.trade_count() - trades_before;
                if new_trades > 0 {
                    shared.metrics.add_trades_executed(new_trades);
                    // Newest-first from the book; republish in match order.
                    let mut trades = book.get_recent_trades(new_trades as usize);
                    trades.reverse();
                    for trade in trades {
                        if !shared.publish_market_data(trade) {
                            warn!(worker, "market data ring full, trade event dropped");
                        }
                    }
                }
            } else {
                shared.metrics.incr_orders_rejected();
            }
        }
    }
    debug!(worker, "matching worker stopped");
}

/// Drain one market data ring and dispatch to the observer.
fn market_data_worker(
    worker: usize,
    ring: Arc<RingBuffer<MarketData>>,
    shared: Arc<Shared>,
    batch_size: usize,
    idle: Duration,
) {
    debug!(worker, "market data worker started");

    while !shared.shutdown.load(Ordering::Acquire) {
        let mut drained = 0usize;
        while drained < batch_size {
            let Some(event) = ring.try_pop() else { break };
            drained += 1;
            shared.metrics.incr_market_data_updates();

            let callback = shared.callback.read().clone();
            if let Some(callback) = callback {
                // A faulty observer must not take the worker down.
                if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                    warn!(worker, "market data callback panicked, event dropped");
                }
            }
        }
        if drained == 0 {
            thread::sleep(idle);
        }
    }
    debug!(worker, "market data worker stopped");
}

/// Sample the counters about once a second into per-second gauges.
fn accounting_worker(shared: Arc<Shared>) {
    let mut window = RateWindow::default();
    let mut last_roll = Instant::now();

    while !shared.shutdown.load(Ordering::Acquire) {
        thread::sleep(Duration::from_millis(100));
        if last_roll.elapsed() >= Duration::from_secs(1) {
            shared.metrics.roll_rates(&mut window);
            last_roll = Instant::now();
            debug!(
                orders_per_s = shared.metrics.orders_per_second(),
                trades_per_s = shared.metrics.trades_per_second(),
                market_data_per_s = shared.metrics.market_data_per_second(),
                "throughput"
            );
        }
    }
}
