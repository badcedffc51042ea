//! Simulated market data source.
//!
//! A seedable random walk over a configured symbol list, emitting
//! quotes, trades and ticks on a background thread. Useful for driving
//! the engine without a live feed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use crate::clock;
use crate::market_data::{MarketData, MarketDataBody};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("feed is already streaming")]
    AlreadyStreaming,
    #[error("no symbols configured")]
    NoSymbols,
}

#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub symbols: Vec<String>,
    /// Pause between emission rounds
    pub tick_interval: Duration,
    /// Starting mid price, in ticks
    pub base_price: u64,
    /// Largest single random-walk step, in ticks
    pub max_step: u64,
    /// Deterministic stream when set
    pub seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            tick_interval: Duration::from_millis(1),
            base_price: 150_00,
            max_step: 25,
            seed: None,
        }
    }
}

pub struct SimulatedFeed {
    config: FeedConfig,
    running: Arc<AtomicBool>,
    sequence: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl SimulatedFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            sequence: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Events emitted so far.
    pub fn events_emitted(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Begin streaming into `sink` on a background thread.
    pub fn start<F>(&mut self, sink: F) -> Result<(), FeedError>
    where
        F: Fn(MarketData) + Send + 'static,
    {
        if self.config.symbols.is_empty() {
            return Err(FeedError::NoSymbols);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(FeedError::AlreadyStreaming);
        }

        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let sequence = Arc::clone(&self.sequence);

        self.handle = Some(thread::spawn(move || {
            let mut rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut mids: Vec<u64> = vec![config.base_price; config.symbols.len()];
            info!(symbols = config.symbols.len(), "simulated feed streaming");

            while running.load(Ordering::Acquire) {
                for (index, symbol) in config.symbols.iter().enumerate() {
                    let step = rng.gen_range(0..=config.max_step);
                    mids[index] = if rng.gen_bool(0.5) {
                        mids[index].saturating_add(step)
                    } else {
                        mids[index].saturating_sub(step).max(config.max_step + 1)
                    };
                    let mid = mids[index];
                    let spread = config.max_step.max(1);

                    let quote = MarketData {
                        sequence_number: sequence.fetch_add(1, Ordering::Relaxed) + 1,
                        symbol: symbol.clone(),
                        timestamp: clock::monotonic_ns(),
                        body: MarketDataBody::Quote {
                            bid_price: mid - spread,
                            bid_quantity: rng.gen_range(1..1000),
                            ask_price: mid + spread,
                            ask_quantity: rng.gen_range(1..1000),
                        },
                    };
                    sink(quote);

                    if rng.gen_bool(0.3) {
                        let sequence_number = sequence.fetch_add(1, Ordering::Relaxed) + 1;
                        sink(MarketData {
                            sequence_number,
                            symbol: symbol.clone(),
                            timestamp: clock::monotonic_ns(),
                            body: MarketDataBody::Trade {
                                price: mid,
                                quantity: rng.gen_range(1..500),
                                trade_id: sequence_number,
                            },
                        });
                    }

                    if rng.gen_bool(0.1) {
                        sink(MarketData {
                            sequence_number: sequence.fetch_add(1, Ordering::Relaxed) + 1,
                            symbol: symbol.clone(),
                            timestamp: clock::monotonic_ns(),
                            body: MarketDataBody::Tick {
                                price: mid,
                                quantity: rng.gen_range(1..100),
                            },
                        });
                    }
                }
                thread::sleep(config.tick_interval);
            }
            debug!("simulated feed stopped");
        }));

        Ok(())
    }

    /// Stop streaming and join the generator thread. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("simulated feed thread panicked");
            }
        }
    }
}

impl Drop for SimulatedFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn config(symbols: &[&str]) -> FeedConfig {
        FeedConfig {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            tick_interval: Duration::from_micros(100),
            seed: Some(7),
            ..FeedConfig::default()
        }
    }

    #[test]
    fn test_requires_symbols() {
        let mut feed = SimulatedFeed::new(FeedConfig::default());
        assert_eq!(feed.start(|_| {}), Err(FeedError::NoSymbols));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut feed = SimulatedFeed::new(config(&["AAPL"]));
        assert!(feed.start(|_| {}).is_ok());
        assert_eq!(feed.start(|_| {}), Err(FeedError::AlreadyStreaming));
        feed.stop();
        assert!(!feed.is_streaming());
    }

    #[test]
    fn test_emits_configured_symbols_with_increasing_sequence() {
        let events: Arc<Mutex<Vec<MarketData>>> = Arc::new(Mutex::new(Vec::new()));
        let mut feed = SimulatedFeed::new(config(&["AAPL", "MSFT"]));

        {
            let events = Arc::clone(&events);
            feed.start(move |data| events.lock().unwrap().push(data)).unwrap();
        }

        // Give the generator a few rounds.
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while feed.events_emitted() < 50 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        feed.stop();

        let events = events.lock().unwrap();
        assert!(events.len() >= 50);
        assert!(events.iter().all(|e| e.symbol == "AAPL" || e.symbol == "MSFT"));
        assert!(events.iter().all(|e| e.sequence_number > 0));
        // Quotes are emitted every round, so both sides stay sane.
        assert!(events.iter().any(|e| matches!(
            e.body,
            MarketDataBody::Quote { bid_price, ask_price, .. } if bid_price < ask_price
        )));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut feed = SimulatedFeed::new(config(&["AAPL"]));
        feed.start(|_| {}).unwrap();
        feed.stop();
        feed.stop();
        assert!(!feed.is_streaming());
    }
}
