//! Per-symbol aggregated depth book
//!
//! Each side is a fixed array of 20 levels, level 0 best. Writes are
//! addressed by index; the feed owns the ordering, the book never sorts.
//! Both sides live behind one `RwLock` so a reader walking levels sees a
//! mutually consistent snapshot and never a torn (price, size) pair.

use crate::clock;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use tracing::trace;
use types::numeric::{Price, Quantity};
use types::order::Side;

/// Number of depth levels tracked per side.
pub const BOOK_DEPTH: usize = 20;

/// One aggregated (price, size) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BookLevel {
    pub price: Price,
    pub size: Quantity,
}

impl BookLevel {
    /// A level participates in matching only when both fields are set.
    pub fn is_valid(&self) -> bool {
        self.price.is_positive() && !self.size.is_zero()
    }
}

#[derive(Debug, Default)]
struct Depth {
    bids: [BookLevel; BOOK_DEPTH],
    asks: [BookLevel; BOOK_DEPTH],
}

/// Top-of-book snapshot handed across the boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub timestamp_ns: i64,
    pub bid_price: Price,
    pub ask_price: Price,
    pub bid_size: Quantity,
    pub ask_size: Quantity,
    pub last_price: Price,
    pub last_size: Quantity,
}

/// Aggregated depth for a single symbol.
///
/// Holds no order queue: levels are whatever the feed (or simulator) last
/// wrote. Readers share the guard, writers take it exclusively, and the
/// update stamp comes from the steady clock so it is monotone.
pub struct OrderBook {
    symbol: String,
    depth: RwLock<Depth>,
    last_update_ns: AtomicI64,
}

impl OrderBook {
    /// Create an empty book for the given symbol.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            depth: RwLock::new(Depth::default()),
            last_update_ns: AtomicI64::new(0),
        }
    }

    /// Symbol of this book.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Write a bid level; out-of-range levels are ignored.
    pub fn update_bid(&self, price: Price, size: Quantity, level: usize) {
        if level >= BOOK_DEPTH {
            return;
        }
        let mut depth = self.depth.write().unwrap_or_else(|e| e.into_inner());
        depth.bids[level] = BookLevel { price, size };
        self.touch();
        trace!(symbol = %self.symbol, level, price = %price, size = %size, "bid level updated");
    }

    /// Write an ask level; out-of-range levels are ignored.
    pub fn update_ask(&self, price: Price, size: Quantity, level: usize) {
        if level >= BOOK_DEPTH {
            return;
        }
        let mut depth = self.depth.write().unwrap_or_else(|e| e.into_inner());
        depth.asks[level] = BookLevel { price, size };
        self.touch();
        trace!(symbol = %self.symbol, level, price = %price, size = %size, "ask level updated");
    }

    /// Best (highest) bid price; zero while uninitialized.
    pub fn best_bid(&self) -> Price {
        self.depth.read().unwrap_or_else(|e| e.into_inner()).bids[0].price
    }

    /// Best (lowest) ask price; zero while uninitialized.
    pub fn best_ask(&self) -> Price {
        self.depth.read().unwrap_or_else(|e| e.into_inner()).asks[0].price
    }

    /// Size resting at a bid level; zero when out of range.
    pub fn bid_size(&self, level: usize) -> Quantity {
        if level >= BOOK_DEPTH {
            return Quantity::zero();
        }
        self.depth.read().unwrap_or_else(|e| e.into_inner()).bids[level].size
    }

    /// Size resting at an ask level; zero when out of range.
    pub fn ask_size(&self, level: usize) -> Quantity {
        if level >= BOOK_DEPTH {
            return Quantity::zero();
        }
        self.depth.read().unwrap_or_else(|e| e.into_inner()).asks[level].size
    }

    /// Integer mean of the best bid and ask in ticks.
    pub fn mid_price(&self) -> Price {
        let depth = self.depth.read().unwrap_or_else(|e| e.into_inner());
        Price::midpoint(depth.bids[0].price, depth.asks[0].price)
    }

    /// Best ask minus best bid as a real value.
    pub fn spread(&self) -> f64 {
        let depth = self.depth.read().unwrap_or_else(|e| e.into_inner());
        (depth.asks[0].price - depth.bids[0].price).to_f64()
    }

    /// Steady-clock stamp of the most recent level write.
    pub fn last_update_ns(&self) -> i64 {
        self.last_update_ns.load(Ordering::Acquire)
    }

    /// Walk the opposing side from the top, accumulating size from levels
    /// whose price is acceptable (≤ limit for BUY, ≥ limit for SELL), and
    /// stop at the first invalid or out-of-limit level. True once the
    /// accumulated size covers the requested quantity.
    pub fn has_sufficient_liquidity(&self, side: Side, quantity: Quantity, limit: Price) -> bool {
        let depth = self.depth.read().unwrap_or_else(|e| e.into_inner());
        let levels = match side {
            Side::Buy => &depth.asks,
            Side::Sell => &depth.bids,
        };

        let mut available = Quantity::zero();
        for level in levels {
            if !level.is_valid() {
                break;
            }
            let acceptable = match side {
                Side::Buy => level.price <= limit,
                Side::Sell => level.price >= limit,
            };
            if !acceptable {
                break;
            }
            available = available + level.size;
            if available >= quantity {
                return true;
            }
        }
        false
    }

    /// Walk the opposing side in level order, emitting (price, taken) pairs
    /// that consume at most each level's size, until the quantity is
    /// exhausted or a level is invalid. May return less than requested; the
    /// caller infers insufficient liquidity from the shortfall.
    pub fn fills_for_market_order(&self, side: Side, quantity: Quantity) -> Vec<(Price, Quantity)> {
        let depth = self.depth.read().unwrap_or_else(|e| e.into_inner());
        let levels = match side {
            Side::Buy => &depth.asks,
            Side::Sell => &depth.bids,
        };

        let mut fills = Vec::new();
        let mut remaining = quantity;
        for level in levels {
            if !level.is_valid() || remaining.is_zero() {
                break;
            }
            let taken = remaining.min(level.size);
            fills.push((level.price, taken));
            remaining = remaining - taken;
        }
        fills
    }

    /// Top-of-book snapshot; the mid stands in for a last-trade price since
    /// the book holds no trade tape.
    pub fn snapshot(&self) -> BookSnapshot {
        let depth = self.depth.read().unwrap_or_else(|e| e.into_inner());
        BookSnapshot {
            symbol: self.symbol.clone(),
            timestamp_ns: self.last_update_ns(),
            bid_price: depth.bids[0].price,
            ask_price: depth.asks[0].price,
            bid_size: depth.bids[0].size,
            ask_size: depth.asks[0].size,
            last_price: Price::midpoint(depth.bids[0].price, depth.asks[0].price),
            last_size: Quantity::zero(),
        }
    }

    fn touch(&self) {
        let now = clock::monotonic_ns();
        self.last_update_ns.fetch_max(now, Ordering::AcqRel);
    }
}
