//! Engine throughput and latency accounting
//!
//! Counters are atomics touched on every order; the latency window is a
//! bounded sample buffer behind a mutex, consulted only when a snapshot is
//! taken. P99 is the sample at ⌊0.99·n⌋ of the sorted buffer.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use types::numeric::{Price, Quantity};

/// Cap on retained latency samples.
pub const LATENCY_WINDOW: usize = 10_000;

/// Bounded rolling window of latency samples in microseconds.
#[derive(Debug)]
pub struct LatencyWindow {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyWindow {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Record a sample, evicting the oldest once the window is full.
    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// The sample at ⌊0.99·n⌋ of the sorted buffer; zero when empty.
    pub fn p99(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let index = (sorted.len() as f64 * 0.99) as usize;
        sorted[index.min(sorted.len() - 1)]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate the retained samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &u64> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Point-in-time metrics snapshot handed across the boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EngineMetrics {
    pub total_orders_processed: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub active_orders: u64,
    pub average_latency_micros: f64,
    pub p99_latency_micros: f64,
    pub orders_per_second: f64,
    pub memory_usage_bytes: u64,
    pub cpu_usage_percent: f64,
    pub uptime_seconds: i64,
}

/// Live engine counters plus the rolling latency window.
pub struct PerformanceMetrics {
    total_orders_processed: AtomicU64,
    successful_executions: AtomicU64,
    failed_executions: AtomicU64,
    total_latency_micros: AtomicU64,
    memory_usage_bytes: AtomicU64,
    cpu_usage_percent: Mutex<f64>,
    total_volume: Mutex<Decimal>,
    latency: Mutex<LatencyWindow>,
    started_at: Mutex<Instant>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            total_orders_processed: AtomicU64::new(0),
            successful_executions: AtomicU64::new(0),
            failed_executions: AtomicU64::new(0),
            total_latency_micros: AtomicU64::new(0),
            memory_usage_bytes: AtomicU64::new(0),
            cpu_usage_percent: Mutex::new(0.0),
            total_volume: Mutex::new(Decimal::ZERO),
            latency: Mutex::new(LatencyWindow::new(LATENCY_WINDOW)),
            started_at: Mutex::new(Instant::now()),
        }
    }

    /// Record one processed order.
    pub fn record_order_processed(&self, latency_micros: u64, success: bool) {
        self.total_orders_processed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_micros
            .fetch_add(latency_micros, Ordering::Relaxed);
        if success {
            self.successful_executions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_executions.fetch_add(1, Ordering::Relaxed);
        }

        let mut window = self.latency.lock().unwrap_or_else(|e| e.into_inner());
        window.record(latency_micros);
    }

    /// Accumulate executed notional volume.
    pub fn record_volume(&self, quantity: Quantity, price: Price) {
        let mut volume = self.total_volume.lock().unwrap_or_else(|e| e.into_inner());
        *volume += quantity.notional(price);
    }

    pub fn record_memory_usage(&self, bytes: u64) {
        self.memory_usage_bytes.store(bytes, Ordering::Relaxed);
    }

    pub fn record_cpu_usage(&self, percent: f64) {
        *self.cpu_usage_percent.lock().unwrap_or_else(|e| e.into_inner()) = percent;
    }

    /// Total executed notional.
    pub fn total_volume(&self) -> Decimal {
        *self.total_volume.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Build a snapshot; the engine stamps in its active-order count.
    pub fn snapshot(&self, active_orders: u64) -> EngineMetrics {
        let total = self.total_orders_processed.load(Ordering::Relaxed);
        let uptime = self
            .started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed();

        let average_latency_micros = if total > 0 {
            self.total_latency_micros.load(Ordering::Relaxed) as f64 / total as f64
        } else {
            0.0
        };
        let orders_per_second = if uptime.as_secs() > 0 {
            total as f64 / uptime.as_secs() as f64
        } else {
            0.0
        };
        let p99 = self
            .latency
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .p99();

        EngineMetrics {
            total_orders_processed: total,
            successful_executions: self.successful_executions.load(Ordering::Relaxed),
            failed_executions: self.failed_executions.load(Ordering::Relaxed),
            active_orders,
            average_latency_micros,
            p99_latency_micros: p99 as f64,
            orders_per_second,
            memory_usage_bytes: self.memory_usage_bytes.load(Ordering::Relaxed),
            cpu_usage_percent: *self.cpu_usage_percent.lock().unwrap_or_else(|e| e.into_inner()),
            uptime_seconds: uptime.as_secs() as i64,
        }
    }

    /// Zero every counter, drop all samples, restart the clock.
    pub fn reset(&self) {
        self.total_orders_processed.store(0, Ordering::Relaxed);
        self.successful_executions.store(0, Ordering::Relaxed);
        self.failed_executions.store(0, Ordering::Relaxed);
        self.total_latency_micros.store(0, Ordering::Relaxed);
        self.memory_usage_bytes.store(0, Ordering::Relaxed);
        *self.cpu_usage_percent.lock().unwrap_or_else(|e| e.into_inner()) = 0.0;
        *self.total_volume.lock().unwrap_or_else(|e| e.into_inner()) = Decimal::ZERO;
        self.latency
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        *self.started_at.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_window_caps_at_max() {
        let mut window = LatencyWindow::new(100);
        for i in 0..250u64 {
            window.record(i);
        }
        assert_eq!(window.len(), 100);
        // Oldest truncated: the newest 100 remain
        assert_eq!(window.iter().next(), Some(&150));
    }

    #[test]
    fn test_p99_empty_is_zero() {
        assert_eq!(LatencyWindow::new(10).p99(), 0);
    }

    #[test]
    fn test_p99_picks_sorted_index() {
        let mut window = LatencyWindow::new(LATENCY_WINDOW);
        for i in 1..=100u64 {
            window.record(i);
        }
        // ⌊0.99·100⌋ = index 99 of the sorted buffer
        assert_eq!(window.p99(), 100);
    }

    #[test]
    fn test_counters_and_average() {
        let metrics = PerformanceMetrics::new();
        metrics.record_order_processed(10, true);
        metrics.record_order_processed(30, false);

        let snap = metrics.snapshot(5);
        assert_eq!(snap.total_orders_processed, 2);
        assert_eq!(snap.successful_executions, 1);
        assert_eq!(snap.failed_executions, 1);
        assert_eq!(snap.active_orders, 5);
        assert!((snap.average_latency_micros - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_volume_accumulates_exactly() {
        let metrics = PerformanceMetrics::new();
        metrics.record_volume(Quantity::from_u64(10), Price::from_f64(150.0));
        metrics.record_volume(Quantity::from_str("0.5").unwrap(), Price::from_f64(200.0));
        assert_eq!(metrics.total_volume(), Decimal::from(1_600));
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let metrics = PerformanceMetrics::new();
        metrics.record_order_processed(10, true);
        metrics.record_volume(Quantity::from_u64(1), Price::from_f64(1.0));
        metrics.record_memory_usage(1024);
        metrics.reset();

        let snap = metrics.snapshot(0);
        assert_eq!(snap, EngineMetrics::default());
        assert_eq!(metrics.total_volume(), Decimal::ZERO);
    }

    proptest! {
        // P6: successful + failed = total; window never exceeds cap;
        // P99 is always one of the retained samples.
        #[test]
        fn prop_metrics_invariants(latencies in proptest::collection::vec((0u64..10_000, any::<bool>()), 1..300)) {
            let metrics = PerformanceMetrics::new();
            for (latency, success) in &latencies {
                metrics.record_order_processed(*latency, *success);
            }

            let snap = metrics.snapshot(0);
            prop_assert_eq!(snap.successful_executions + snap.failed_executions, snap.total_orders_processed);

            let window = metrics.latency.lock().unwrap();
            prop_assert!(window.len() <= LATENCY_WINDOW);
            let p99 = window.p99();
            prop_assert!(window.iter().any(|&s| s == p99));
        }
    }
}
