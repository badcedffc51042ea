//! Aggregate engine counters and submit-latency accounting.
//!
//! Plain monotonic atomics on the hot path; an accounting thread samples
//! them about once a second to derive per-second rates.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug)]
pub struct EngineMetrics {
    orders_processed: AtomicU64,
    orders_rejected: AtomicU64,
    trades_executed: AtomicU64,
    market_data_updates: AtomicU64,

    total_latency_ns: AtomicU64,
    min_latency_ns: AtomicU64,
    max_latency_ns: AtomicU64,

    orders_per_second: AtomicU64,
    trades_per_second: AtomicU64,
    market_data_per_second: AtomicU64,
}

/// Value copy of the counters for reporting.
#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub orders_processed: u64,
    pub orders_rejected: u64,
    pub trades_executed: u64,
    pub market_data_updates: u64,
    pub average_latency_ns: f64,
    /// 0 when nothing was recorded yet
    pub min_latency_ns: u64,
    pub max_latency_ns: u64,
    pub orders_per_second: u64,
    pub trades_per_second: u64,
    pub market_data_per_second: u64,
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

/// Baseline for per-second deltas, owned by the accounting thread.
#[derive(Debug, Default)]
pub(crate) struct RateWindow {
    orders: u64,
    trades: u64,
    market_data: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            orders_processed: AtomicU64::new(0),
            orders_rejected: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            market_data_updates: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            min_latency_ns: AtomicU64::new(u64::MAX),
            max_latency_ns: AtomicU64::new(0),
            orders_per_second: AtomicU64::new(0),
            trades_per_second: AtomicU64::new(0),
            market_data_per_second: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn incr_orders_processed(&self) {
        self.orders_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn incr_orders_rejected(&self) {
        self.orders_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_trades_executed(&self, count: u64) {
        self.trades_executed.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn incr_market_data_updates(&self) {
        self.market_data_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the enqueue latency of one accepted submission.
    pub(crate) fn record_submit_latency(&self, latency_ns: u64) {
        self.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);

        let mut current = self.min_latency_ns.load(Ordering::Relaxed);
        while latency_ns < current {
            match self.min_latency_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        let mut current = self.max_latency_ns.load(Ordering::Relaxed);
        while latency_ns > current {
            match self.max_latency_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Fold the last sampling window into the per-second gauges.
    pub(crate) fn roll_rates(&self, window: &mut RateWindow) {
        let orders = self.orders_processed.load(Ordering::Relaxed);
        let trades = self.trades_executed.load(Ordering::Relaxed);
        let market_data = self.market_data_updates.load(Ordering::Relaxed);

        self.orders_per_second.store(orders - window.orders, Ordering::Relaxed);
        self.trades_per_second.store(trades - window.trades, Ordering::Relaxed);
        self.market_data_per_second
            .store(market_data - window.market_data, Ordering::Relaxed);

        window.orders = orders;
        window.trades = trades;
        window.market_data = market_data;
    }

    pub fn orders_processed(&self) -> u64 {
        self.orders_processed.load(Ordering::Relaxed)
    }

    pub fn orders_rejected(&self) -> u64 {
        self.orders_rejected.load(Ordering::Relaxed)
    }

    pub fn trades_executed(&self) -> u64 {
        self.trades_executed.load(Ordering::Relaxed)
    }

    pub fn market_data_updates(&self) -> u64 {
        self.market_data_updates.load(Ordering::Relaxed)
    }

    pub fn orders_per_second(&self) -> u64 {
        self.orders_per_second.load(Ordering::Relaxed)
    }

    pub fn trades_per_second(&self) -> u64 {
        self.trades_per_second.load(Ordering::Relaxed)
    }

    pub fn market_data_per_second(&self) -> u64 {
        self.market_data_per_second.load(Ordering::Relaxed)
    }

    pub fn average_latency_ns(&self) -> f64 {
        let processed = self.orders_processed.load(Ordering::Relaxed);
        if processed == 0 {
            return 0.0;
        }
        self.total_latency_ns.load(Ordering::Relaxed) as f64 / processed as f64
    }

    pub fn min_latency_ns(&self) -> u64 {
        let min = self.min_latency_ns.load(Ordering::Relaxed);
        if min == u64::MAX {
            0
        } else {
            min
        }
    }

    pub fn max_latency_ns(&self) -> u64 {
        self.max_latency_ns.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.orders_processed.store(0, Ordering::Relaxed);
        self.orders_rejected.store(0, Ordering::Relaxed);
        self.trades_executed.store(0, Ordering::Relaxed);
        self.market_data_updates.store(0, Ordering::Relaxed);
        self.total_latency_ns.store(0, Ordering::Relaxed);
        self.min_latency_ns.store(u64::MAX, Ordering::Relaxed);
        self.max_latency_ns.store(0, Ordering::Relaxed);
        self.orders_per_second.store(0, Ordering::Relaxed);
        self.trades_per_second.store(0, Ordering::Relaxed);
        self.market_data_per_second.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            orders_processed: self.orders_processed(),
            orders_rejected: self.orders_rejected(),
            trades_executed: self.trades_executed(),
            market_data_updates: self.market_data_updates(),
            average_latency_ns: self.average_latency_ns(),
            min_latency_ns: self.min_latency_ns(),
            max_latency_ns: self.max_latency_ns(),
            orders_per_second: self.orders_per_second(),
            trades_per_second: self.trades_per_second(),
            market_data_per_second: self.market_data_per_second(),
            captured_at: chrono::Utc::now(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_extremes() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.min_latency_ns(), 0, "unset min reads as zero");
        assert_eq!(metrics.max_latency_ns(), 0);

        metrics.record_submit_latency(500);
        metrics.record_submit_latency(100);
        metrics.record_submit_latency(900);

        assert_eq!(metrics.min_latency_ns(), 100);
        assert_eq!(metrics.max_latency_ns(), 900);
    }

    #[test]
    fn test_average_latency() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.average_latency_ns(), 0.0);

        metrics.record_submit_latency(100);
        metrics.record_submit_latency(300);
        metrics.incr_orders_processed();
        metrics.incr_orders_processed();

        assert!((metrics.average_latency_ns() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rate_window_deltas() {
        let metrics = EngineMetrics::new();
        let mut window = RateWindow::default();

        for _ in 0..10 {
            metrics.incr_orders_processed();
        }
        metrics.add_trades_executed(4);
        metrics.roll_rates(&mut window);
        assert_eq!(metrics.orders_per_second(), 10);
        assert_eq!(metrics.trades_per_second(), 4);

        // Second window only sees the new activity.
        for _ in 0..3 {
            metrics.incr_orders_processed();
        }
        metrics.roll_rates(&mut window);
        assert_eq!(metrics.orders_per_second(), 3);
        assert_eq!(metrics.trades_per_second(), 0);
    }

    #[test]
    fn test_reset() {
        let metrics = EngineMetrics::new();
        metrics.incr_orders_processed();
        metrics.incr_orders_rejected();
        metrics.record_submit_latency(42);
        metrics.reset();

        assert_eq!(metrics.orders_processed(), 0);
        assert_eq!(metrics.orders_rejected(), 0);
        assert_eq!(metrics.min_latency_ns(), 0);
        assert_eq!(metrics.max_latency_ns(), 0);
    }

    #[test]
    fn test_snapshot_copies_counters() {
        let metrics = EngineMetrics::new();
        metrics.incr_orders_processed();
        metrics.add_trades_executed(2);
        metrics.incr_market_data_updates();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.orders_processed, 1);
        assert_eq!(snapshot.trades_executed, 2);
        assert_eq!(snapshot.market_data_updates, 1);
    }
}
