//! Order Execution Engine
//!
//! Simulates an exchange venue for an embedding trading system: accepts
//! order requests, matches them against per-symbol aggregated-depth books,
//! records fills, and reports execution outcomes with latency metrics.
//!
//! # Architecture
//!
//! ```text
//!            submit / cancel (host thread)
//!                      │
//!                ┌─────▼──────┐
//!                │  Engine    │  validate → risk → admit → enqueue
//!                └─────┬──────┘
//!          ┌───────────┼───────────────┐
//!     ┌────▼───┐  ┌────▼────┐   ┌──────▼──────┐
//!     │Workers │  │ Sweeper │   │  Simulator  │
//!     └────┬───┘  └────┬────┘   └──────┬──────┘
//!          │ match      │ expire       │ 10 Hz book writes
//!     ┌────▼────────────▼──────────────▼────┐
//!     │     Books · Orders · Metrics        │
//!     └─────────────────────────────────────┘
//! ```
//!
//! The work queue is the authoritative execution path: submissions enqueue
//! a work item and block on its completion, so responses always carry the
//! finished match while latency accounting spans the whole pipeline.
//! Callbacks fire synchronously from the executing task and must not
//! reenter the engine's mutating operations.
//!
//! The `ffi` module exposes the ABI-flat records and `extern "C"` entry
//! points host bindings link against; everything else is the native API.

pub mod book;
mod clock;
pub mod config;
pub mod engine;
pub mod ffi;
pub mod metrics;
pub mod pool;
pub mod simulator;

pub use book::{BookLevel, BookSnapshot, OrderBook, BOOK_DEPTH};
pub use config::EngineConfig;
pub use engine::ExecutionEngine;
pub use metrics::{EngineMetrics, LatencyWindow, PerformanceMetrics, LATENCY_WINDOW};
pub use pool::{MemoryPool, PoolSlot};
pub use simulator::SEED_SYMBOLS;

/// Library version constant
pub const ENGINE_VERSION: &str = "0.1.0";
