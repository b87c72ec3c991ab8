//! Built-in market data simulator
//!
//! Drives the seed books when no external feed is attached. Runs at 10 Hz:
//! each tick draws a uniform ±1% drift per symbol, moves the mid, and writes
//! a 0.1%-wide top of book with size 1000 on both sides. The RNG is seeded
//! from config so simulated runs reproduce.

use crate::engine::ExecutionEngine;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use types::numeric::{Price, Quantity};
use types::order::Side;

/// Symbols seeded at initialization with their starting mid prices.
pub const SEED_SYMBOLS: [(&str, f64); 5] = [
    ("AAPL", 150.0),
    ("GOOGL", 2_500.0),
    ("MSFT", 300.0),
    ("TSLA", 800.0),
    ("AMZN", 3_000.0),
];

/// Tick period: 10 Hz.
const TICK: Duration = Duration::from_millis(100);

/// Displayed size written at the top of book each tick.
const LEVEL_SIZE: u64 = 1_000;

/// Simulator loop; exits promptly when the engine's running flag clears.
pub(crate) fn run(engine: Arc<ExecutionEngine>, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut mids: Vec<(&str, Price)> = SEED_SYMBOLS
        .iter()
        .map(|(symbol, mid)| (*symbol, Price::from_f64(*mid)))
        .collect();

    info!(seed, "market data simulator started");
    while engine.running() {
        for (symbol, mid) in mids.iter_mut() {
            let symbol: &str = *symbol;
            let delta: f64 = rng.gen_range(-0.01..=0.01);
            *mid = mid.scale(1.0 + delta);

            let bid = mid.scale(0.999);
            let ask = mid.scale(1.001);
            let size = Quantity::from_u64(LEVEL_SIZE);
            if let Err(err) = engine
                .apply_book_update(symbol, Side::Buy, bid, size, 0)
                .and_then(|()| engine.apply_book_update(symbol, Side::Sell, ask, size, 0))
            {
                warn!(symbol, %err, "simulator book update failed");
            }
        }
        engine.wait_tick(TICK);
    }
    info!("market data simulator stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_symbols_are_distinct() {
        for (i, (a, _)) in SEED_SYMBOLS.iter().enumerate() {
            for (b, _) in SEED_SYMBOLS.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_drift_stays_within_one_percent() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mid = Price::from_f64(150.0);
        for _ in 0..1_000 {
            let delta: f64 = rng.gen_range(-0.01..=0.01);
            let moved = mid.scale(1.0 + delta);
            assert!(moved.ticks() >= mid.scale(0.99).ticks());
            assert!(moved.ticks() <= mid.scale(1.01).ticks());
        }
    }

    #[test]
    fn test_seeded_rng_reproduces() {
        let draws = |seed| -> Vec<i64> {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..32)
                .map(|_| Price::from_f64(150.0).scale(1.0 + rng.gen_range(-0.01..=0.01)).ticks())
                .collect()
        };
        assert_eq!(draws(42), draws(42));
        assert_ne!(draws(42), draws(43));
    }
}
