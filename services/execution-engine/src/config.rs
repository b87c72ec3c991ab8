//! Engine configuration
//!
//! `initialize` receives an opaque JSON blob from the host; unknown fields
//! are ignored and missing fields fall back to the defaults below, so an
//! empty blob configures a usable engine.

use serde::{Deserialize, Serialize};

/// Default bound on concurrently tracked orders (order pool capacity).
pub const DEFAULT_MAX_CONCURRENT_ORDERS: usize = 10_000;

/// Default order timeout: 30 seconds.
pub const DEFAULT_ORDER_TIMEOUT_NS: i64 = 30_000_000_000;

/// Engine configuration parsed from the host's `initialize` blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Order pool capacity; the fill pool holds ten times this.
    pub max_concurrent_orders: usize,
    /// Age past which a non-DAY order expires.
    pub order_timeout_ns: i64,
    /// Gate for the pre-admission quantity check.
    pub enable_risk_checks: bool,
    /// Largest admissible order quantity when risk checks are on.
    pub max_position_size: f64,
    /// Drive the books from the built-in simulator when no feed is attached.
    pub enable_simulation: bool,
    /// Workers draining the order queue.
    pub worker_thread_count: usize,
    /// Cadence of the expired-order sweep.
    pub expiry_sweep_interval_ms: u64,
    /// Seed for the simulator RNG; fixed so simulated runs reproduce.
    pub simulator_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_orders: DEFAULT_MAX_CONCURRENT_ORDERS,
            order_timeout_ns: DEFAULT_ORDER_TIMEOUT_NS,
            enable_risk_checks: true,
            max_position_size: 1_000_000.0,
            enable_simulation: true,
            worker_thread_count: 4,
            expiry_sweep_interval_ms: 1_000,
            simulator_seed: 42,
        }
    }
}

impl EngineConfig {
    /// Parse the host-supplied blob; empty or whitespace input means defaults.
    pub fn from_json(blob: &str) -> Result<Self, serde_json::Error> {
        if blob.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(blob)
    }
}
