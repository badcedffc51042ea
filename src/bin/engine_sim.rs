//! Demo driver: run the engine against simulated order flow and market
//! data, then report throughput and submit-latency percentiles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use hdrhistogram::Histogram;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use quickmatch::{
    EngineConfig, FeedConfig, MarketDataBody, MatchingEngine, Order, Side, SimulatedFeed,
};

#[derive(Parser, Debug)]
#[command(name = "engine-sim", about = "Run the matching engine against simulated flow")]
struct Args {
    /// Number of matching workers
    #[arg(short = 't', long, default_value_t = 4)]
    threads: usize,

    /// Number of market data workers
    #[arg(short = 'm', long, default_value_t = 2)]
    market_threads: usize,

    /// Ring capacity; must be a power of two
    #[arg(short = 'b', long, default_value_t = 65_536)]
    buffer_size: usize,

    /// Worker batch size
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Comma-separated symbol list
    #[arg(short, long, default_value = "AAPL,MSFT,GOOG,AMZN")]
    symbols: String,

    /// Run duration in seconds
    #[arg(short, long, default_value_t = 10)]
    duration: u64,

    /// Seed for deterministic flow
    #[arg(long)]
    seed: Option<u64>,

    /// Pin workers to cores
    #[arg(long)]
    pin_workers: bool,

    /// Emit final metrics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.buffer_size.is_power_of_two(), "buffer size must be a power of two");

    let symbols: Vec<String> = args
        .symbols
        .split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect();
    anyhow::ensure!(!symbols.is_empty(), "at least one symbol required");

    let engine = Arc::new(MatchingEngine::with_config(EngineConfig {
        matching_workers: args.threads,
        market_data_workers: args.market_threads,
        ring_capacity: args.buffer_size,
        batch_size: args.batch_size,
        pin_workers: args.pin_workers,
        ..EngineConfig::default()
    }));
    anyhow::ensure!(engine.start(), "engine failed to start");

    // Observe trades coming out of the matching path.
    let trades_seen = Arc::new(AtomicU64::new(0));
    {
        let trades_seen = Arc::clone(&trades_seen);
        engine.set_market_data_callback(move |event| {
            if matches!(event.body, MarketDataBody::Trade { .. }) {
                trades_seen.fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    // External tick stream.
    let mut feed = SimulatedFeed::new(FeedConfig {
        symbols: symbols.clone(),
        seed: args.seed,
        ..FeedConfig::default()
    });
    {
        let engine = Arc::clone(&engine);
        feed.start(move |data| {
            let _ = engine.submit_market_data(data);
        })?;
    }

    // Order flow with enqueue-latency histogram.
    let mut histogram = Histogram::<u64>::new_with_bounds(1, 1_000_000_000, 3)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(symbols = symbols.len(), duration = args.duration, "submitting order flow");
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut next_order_id = 1u64;
    let mut submitted = 0u64;

    while Instant::now() < deadline {
        let symbol = &symbols[rng.gen_range(0..symbols.len())];
        let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
        let price = 1_490_00 + rng.gen_range(0..200) * 10;
        let quantity = rng.gen_range(1..500);
        let order = Order::limit(next_order_id, 1, symbol.clone(), side, quantity, price);

        let start = Instant::now();
        if engine.submit_order(order) {
            histogram.record(start.elapsed().as_nanos().max(1) as u64).ok();
            next_order_id += 1;
            submitted += 1;
        } else {
            // Backpressure: let the workers catch up.
            std::thread::sleep(Duration::from_micros(50));
        }
    }

    // Let the workers drain before reading the counters.
    std::thread::sleep(Duration::from_millis(200));
    feed.stop();
    engine.stop();

    let snapshot = engine.metrics().snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("=== Run Summary ===");
        println!("submitted:           {}", submitted);
        println!("orders processed:    {}", snapshot.orders_processed);
        println!("orders rejected:     {}", snapshot.orders_rejected);
        println!("trades executed:     {}", snapshot.trades_executed);
        println!("trade callbacks:     {}", trades_seen.load(Ordering::Relaxed));
        println!("market data events:  {}", snapshot.market_data_updates);
        println!(
            "enqueue latency ns:  avg {:.0}  min {}  max {}",
            snapshot.average_latency_ns, snapshot.min_latency_ns, snapshot.max_latency_ns
        );
        println!(
            "enqueue percentiles: p50 {}  p99 {}  p99.9 {}",
            histogram.value_at_quantile(0.50),
            histogram.value_at_quantile(0.99),
            histogram.value_at_quantile(0.999),
        );

        let mut symbols = engine.active_symbols();
        symbols.sort();
        for symbol in symbols {
            if let Some(book) = engine.get_order_book(&symbol) {
                println!(
                    "{:<8} bid {:?} x {:<6} ask {:?} x {:<6} resting {:<6} trades {}",
                    symbol,
                    book.best_bid(),
                    book.best_bid_quantity(),
                    book.best_ask(),
                    book.best_ask_quantity(),
                    book.order_count(),
                    book.trade_count(),
                );
            }
        }
    }

    Ok(())
}
