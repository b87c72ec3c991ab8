//! Execution engine core
//!
//! Lifecycle owner for the books, the active-order index, the worker pool,
//! the expiry sweeper, and the simulator. The work queue is the
//! authoritative execution path: `submit_order` enqueues a work item and
//! blocks on its completion, so the response always reflects the finished
//! match while latency accounting covers the whole pipeline. With no
//! workers running the submitter's thread executes the match inline.

use crate::book::{BookSnapshot, OrderBook};
use crate::clock;
use crate::config::EngineConfig;
use crate::metrics::{EngineMetrics, PerformanceMetrics};
use crate::pool::{MemoryPool, PoolSlot};
use crate::simulator;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use types::errors::{EngineError, ExecutionResult};
use types::fill::OrderFill;
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderRequest, OrderResponse, OrderStatus, OrderType, Side};

/// Per-fill fee rate applied to the fill size (0.001 · size).
fn taker_fee(quantity: Quantity) -> Decimal {
    quantity.as_decimal() * Decimal::new(1, 3)
}

/// Callback invoked synchronously for every market-path fill.
pub type FillCallback = Box<dyn Fn(&OrderFill) + Send + Sync>;

/// Callback invoked for asynchronous terminal transitions (cancel, expiry).
pub type StatusCallback = Box<dyn Fn(&str, OrderStatus, &str) + Send + Sync>;

/// An order shared between the active index and in-flight work items.
/// The pool slot's lock is what makes fill recording atomic.
type SharedOrder = Arc<PoolSlot<Order>>;

/// One-shot completion signal a submitter blocks on.
struct Completion {
    result: Mutex<Option<Result<(), EngineError>>>,
    cv: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    fn complete(&self, result: Result<(), EngineError>) {
        let mut slot = self.result.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(result);
        self.cv.notify_all();
    }

    fn wait(&self) -> Result<(), EngineError> {
        let mut slot = self.result.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            slot = self.cv.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
    }
}

struct WorkItem {
    order: SharedOrder,
    done: Arc<Completion>,
}

/// The execution core. One instance per embedding host.
pub struct ExecutionEngine {
    config: Mutex<EngineConfig>,
    initialized: AtomicBool,
    running: AtomicBool,
    healthy: AtomicBool,
    /// Serializes initialize/start/stop.
    lifecycle: Mutex<()>,

    books: DashMap<String, Arc<OrderBook>>,
    active_orders: DashMap<String, SharedOrder>,
    order_pool: OnceLock<MemoryPool<Order>>,
    fill_pool: OnceLock<MemoryPool<OrderFill>>,

    queue: Mutex<VecDeque<WorkItem>>,
    queue_cv: Condvar,
    worker_count: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,

    /// Timed-wait channel for the sweeper and simulator.
    idle: Mutex<()>,
    idle_cv: Condvar,

    metrics: PerformanceMetrics,
    fill_callback: RwLock<Option<FillCallback>>,
    status_callback: RwLock<Option<StatusCallback>>,
}

impl ExecutionEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(EngineConfig::default()),
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            healthy: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            books: DashMap::new(),
            active_orders: DashMap::new(),
            order_pool: OnceLock::new(),
            fill_pool: OnceLock::new(),
            queue: Mutex::new(VecDeque::new()),
            queue_cv: Condvar::new(),
            worker_count: AtomicUsize::new(0),
            workers: Mutex::new(Vec::new()),
            background: Mutex::new(Vec::new()),
            idle: Mutex::new(()),
            idle_cv: Condvar::new(),
            metrics: PerformanceMetrics::new(),
            fill_callback: RwLock::new(None),
            status_callback: RwLock::new(None),
        })
    }

    /// Idempotent admission: the first call parses the config, seeds the
    /// books, and allocates the pools; later calls succeed as no-ops.
    pub fn initialize(&self, config_blob: &str) -> ExecutionResult {
        let _guard = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        if self.initialized.load(Ordering::Acquire) {
            return ExecutionResult::Success;
        }

        let config = match EngineConfig::from_json(config_blob) {
            Ok(config) => config,
            Err(err) => {
                warn!(%err, "rejecting malformed engine config");
                return ExecutionResult::SystemError;
            }
        };

        for (symbol, _) in simulator::SEED_SYMBOLS {
            self.books
                .insert(symbol.to_string(), Arc::new(OrderBook::new(symbol)));
        }
        let _ = self.order_pool.set(MemoryPool::new(config.max_concurrent_orders));
        let _ = self
            .fill_pool
            .set(MemoryPool::new(config.max_concurrent_orders * 10));
        let reserved = config.max_concurrent_orders * std::mem::size_of::<Order>()
            + config.max_concurrent_orders * 10 * std::mem::size_of::<OrderFill>();
        self.metrics.record_memory_usage(reserved as u64);

        info!(
            workers = config.worker_thread_count,
            simulation = config.enable_simulation,
            "execution engine initialized"
        );
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config;
        self.initialized.store(true, Ordering::Release);
        ExecutionResult::Success
    }

    /// Spawn the workers, the expiry sweeper, and (when enabled) the
    /// simulator. Starting a running engine succeeds as a no-op.
    pub fn start(self: &Arc<Self>) -> ExecutionResult {
        if !self.initialized.load(Ordering::Acquire) {
            return ExecutionResult::SystemError;
        }
        let _guard = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        if self.running.load(Ordering::Acquire) {
            return ExecutionResult::Success;
        }

        let config = self.config.lock().unwrap_or_else(|e| e.into_inner()).clone();
        self.running.store(true, Ordering::Release);
        self.healthy.store(true, Ordering::Release);
        self.worker_count
            .store(config.worker_thread_count, Ordering::Release);

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        for _ in 0..config.worker_thread_count {
            let engine = Arc::clone(self);
            workers.push(std::thread::spawn(move || engine.worker_loop()));
        }

        let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
        let sweeper = Arc::clone(self);
        background.push(std::thread::spawn(move || sweeper.expiry_loop()));
        if config.enable_simulation {
            let engine = Arc::clone(self);
            let seed = config.simulator_seed;
            background.push(std::thread::spawn(move || simulator::run(engine, seed)));
        }

        info!("execution engine started");
        ExecutionResult::Success
    }

    /// Clear the running flag, wake everything, join workers and background
    /// tasks, and fail any still-queued work so no submitter blocks forever.
    /// Stopping a stopped (or never-started) engine succeeds.
    pub fn stop(&self) -> ExecutionResult {
        let _guard = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());

        {
            // Flag and wakeup under the queue lock so a worker cannot check
            // the flag and then miss the notification.
            let _queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            self.running.store(false, Ordering::Release);
            self.healthy.store(false, Ordering::Release);
            self.queue_cv.notify_all();
        }
        {
            let _idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
            self.idle_cv.notify_all();
        }

        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in workers {
            let _ = handle.join();
        }
        self.worker_count.store(0, Ordering::Release);

        let background: Vec<JoinHandle<()>> = self
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in background {
            let _ = handle.join();
        }

        let leftovers: Vec<WorkItem> = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.drain(..).collect()
        };
        for item in leftovers {
            item.done.complete(Err(EngineError::System {
                message: "engine stopped".into(),
            }));
        }

        info!("execution engine stopped");
        ExecutionResult::Success
    }

    /// True while running with no fatal flag raised.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire) && self.running.load(Ordering::Acquire)
    }

    pub(crate) fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Submit an order and return its execution outcome. The call returns
    /// only after the match has completed (on a worker when running,
    /// inline otherwise).
    pub fn submit_order(&self, request: &OrderRequest) -> OrderResponse {
        let started = Instant::now();

        if !self.initialized.load(Ordering::Acquire) {
            return self.response_for_error(
                request,
                started,
                EngineError::NotInitialized,
                OrderStatus::Pending,
            );
        }

        let mut order = Order::from_request(request, clock::unix_ns());
        if let Err(err) = order.validate() {
            let _ = order.reject();
            debug!(order_id = %request.order_id, %err, "order rejected at validation");
            return self.response_for_error(request, started, err.into(), order.status());
        }

        let config = self.config.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if config.enable_risk_checks {
            let limit = Quantity::from_f64(config.max_position_size).unwrap_or_else(Quantity::zero);
            if order.quantity > limit {
                let _ = order.reject();
                debug!(order_id = %request.order_id, quantity = %order.quantity, "order rejected by risk check");
                return self.response_for_error(
                    request,
                    started,
                    EngineError::RiskLimitExceeded {
                        quantity: order.quantity.to_string(),
                        limit: limit.to_string(),
                    },
                    order.status(),
                );
            }
        }

        let Some(pool) = self.order_pool.get() else {
            return self.response_for_error(
                request,
                started,
                EngineError::NotInitialized,
                OrderStatus::Pending,
            );
        };
        let Some(slot) = pool.acquire() else {
            warn!(order_id = %request.order_id, "order pool exhausted");
            let _ = order.reject();
            return self.response_for_error(
                request,
                started,
                EngineError::CapacityExhausted,
                order.status(),
            );
        };

        // Admission: PENDING → SUBMITTED, visible in the active index.
        let _ = order.submit();
        let order_id = order.order_id.clone();
        slot.with(|entry| *entry = order);
        let shared: SharedOrder = Arc::new(slot);
        self.active_orders.insert(order_id.clone(), Arc::clone(&shared));
        trace!(order_id = %order_id, "order admitted");

        // Enqueue under the queue lock, re-checking the running flag there:
        // stop() flips it under the same lock, so an item is only queued
        // while workers are guaranteed to drain it.
        let queued = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            if self.running() && self.worker_count.load(Ordering::Acquire) > 0 {
                let done = Arc::new(Completion::new());
                queue.push_back(WorkItem {
                    order: Arc::clone(&shared),
                    done: Arc::clone(&done),
                });
                self.queue_cv.notify_one();
                Some(done)
            } else {
                None
            }
        };
        let outcome = match queued {
            Some(done) => done.wait(),
            None => self.execute(&shared),
        };

        let (status, filled, average) = shared.with(|order| {
            (
                order.status(),
                order.filled_quantity(),
                order.average_fill_price(),
            )
        });

        let latency_micros = started.elapsed().as_micros() as i64;
        let (result, message) = match &outcome {
            Ok(()) => (ExecutionResult::Success, String::new()),
            Err(err) => (err.result_code(), err.to_string()),
        };

        self.metrics
            .record_order_processed(latency_micros as u64, outcome.is_ok());
        if outcome.is_ok() && !filled.is_zero() {
            self.metrics.record_volume(filled, average);
        }
        debug!(order_id = %order_id, ?result, %filled, "order processed");

        OrderResponse {
            order_id: order_id.clone(),
            result,
            status,
            message,
            executed_quantity: filled,
            average_price: average,
            execution_time_ns: clock::unix_ns(),
            latency_micros,
        }
    }

    /// Cancel an active order and fire the status callback.
    pub fn cancel_order(&self, order_id: &str) -> Result<(), EngineError> {
        let shared = self
            .active_orders
            .get(order_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        shared.with(|order| order.cancel())?;
        self.active_orders.remove(order_id);
        info!(order_id, "order cancelled");
        self.notify_status(order_id, OrderStatus::Cancelled, "Order cancelled");
        Ok(())
    }

    /// Top-of-book snapshot for a symbol.
    pub fn book_snapshot(&self, symbol: &str) -> Result<BookSnapshot, EngineError> {
        let book = self
            .books
            .get(symbol)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;
        Ok(book.snapshot())
    }

    /// Write one depth level through the engine; the simulator and any
    /// external feed share this entry point.
    pub fn apply_book_update(
        &self,
        symbol: &str,
        side: Side,
        price: Price,
        size: Quantity,
        level: usize,
    ) -> Result<(), EngineError> {
        let book = self
            .books
            .get(symbol)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;
        match side {
            Side::Buy => book.update_bid(price, size, level),
            Side::Sell => book.update_ask(price, size, level),
        }
        Ok(())
    }

    /// Current status of a tracked order, if it is still indexed.
    pub fn order_status(&self, order_id: &str) -> Option<OrderStatus> {
        self.active_orders
            .get(order_id)
            .map(|entry| entry.value().with(|order| order.status()))
    }

    /// Metrics snapshot stamped with the current active-order count.
    /// The count is a point-in-time estimate while workloads are live.
    pub fn metrics(&self) -> EngineMetrics {
        self.metrics.snapshot(self.active_orders.len() as u64)
    }

    /// Zero the metrics and restart their clock.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub fn register_fill_callback(&self, callback: FillCallback) {
        *self
            .fill_callback
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    pub fn register_status_callback(&self, callback: StatusCallback) {
        *self
            .status_callback
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    fn execute(&self, shared: &SharedOrder) -> Result<(), EngineError> {
        let order_type = shared.with(|order| order.order_type);
        match order_type {
            OrderType::Market => self.execute_market_order(shared),
            OrderType::Limit => self.execute_limit_order(shared),
            OrderType::Stop => self.execute_stop_order(shared),
            other => Err(EngineError::UnsupportedOrderType {
                order_type: format!("{other:?}"),
            }),
        }
    }

    /// Sweep the opposing depth and record every (price, taken) pair,
    /// firing the fill callback per fill.
    fn execute_market_order(&self, shared: &SharedOrder) -> Result<(), EngineError> {
        let (order_id, symbol, side, quantity) = shared.with(|order| {
            (
                order.order_id.clone(),
                order.symbol.clone(),
                order.side,
                order.quantity,
            )
        });
        let book = self.book(&symbol)?;

        let fills = book.fills_for_market_order(side, quantity);
        if fills.is_empty() {
            debug!(order_id = %order_id, %symbol, "no liquidity for market order");
            return Err(EngineError::InsufficientLiquidity {
                symbol,
                requested: quantity.to_string(),
            });
        }

        for (price, taken) in fills {
            shared.with(|order| order.add_fill(price, taken))?;
            self.dispatch_fill(&order_id, price, taken, taker_fee(taken));
        }
        Ok(())
    }

    /// Fill at the limit price when marketable against the top of the
    /// opposing side with enough depth; otherwise the order rests SUBMITTED
    /// (acknowledged; there is no counterparty queue to join).
    fn execute_limit_order(&self, shared: &SharedOrder) -> Result<(), EngineError> {
        let (symbol, side, quantity, limit) = shared.with(|order| {
            (
                order.symbol.clone(),
                order.side,
                order.quantity,
                order.limit_price,
            )
        });
        let book = self.book(&symbol)?;

        let reference = match side {
            Side::Buy => book.best_ask(),
            Side::Sell => book.best_bid(),
        };
        let marketable = match side {
            Side::Buy => limit >= reference,
            Side::Sell => limit <= reference,
        };

        if marketable && book.has_sufficient_liquidity(side, quantity, limit) {
            shared.with(|order| order.add_fill(limit, quantity))?;
        } else {
            trace!(%symbol, %limit, "limit order resting");
        }
        Ok(())
    }

    /// Trigger against the mid; a triggered stop fills at the mid for the
    /// full quantity. The trigger is evaluated at submission only.
    fn execute_stop_order(&self, shared: &SharedOrder) -> Result<(), EngineError> {
        let (symbol, side, quantity, stop) = shared.with(|order| {
            (
                order.symbol.clone(),
                order.side,
                order.quantity,
                order.stop_price,
            )
        });
        let book = self.book(&symbol)?;

        let mid = book.mid_price();
        let triggered = match side {
            Side::Buy => mid >= stop,
            Side::Sell => mid <= stop,
        };

        if triggered {
            shared.with(|order| order.add_fill(mid, quantity))?;
        } else {
            trace!(%symbol, %stop, "stop order not triggered");
        }
        Ok(())
    }

    fn book(&self, symbol: &str) -> Result<Arc<OrderBook>, EngineError> {
        self.books
            .get(symbol)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::UnknownSymbol {
                symbol: symbol.to_string(),
            })
    }

    /// Stage the fill through the fill pool when a slot is free, falling
    /// back to a stack value when the pool is dry.
    fn dispatch_fill(&self, order_id: &str, price: Price, quantity: Quantity, fee: Decimal) {
        let callbacks = self
            .fill_callback
            .read()
            .unwrap_or_else(|e| e.into_inner());
        let Some(callback) = callbacks.as_ref() else {
            return;
        };

        let timestamp_ns = clock::unix_ns();
        if let Some(pool) = self.fill_pool.get() {
            if let Some(slot) = pool.acquire() {
                slot.with(|fill| {
                    fill.assign(order_id, price, quantity, fee, timestamp_ns);
                    callback(fill);
                });
                return;
            }
        }
        let fill = OrderFill::new(order_id, price, quantity, fee, timestamp_ns);
        callback(&fill);
    }

    fn notify_status(&self, order_id: &str, status: OrderStatus, message: &str) {
        let callbacks = self
            .status_callback
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(callback) = callbacks.as_ref() {
            callback(order_id, status, message);
        }
    }

    fn response_for_error(
        &self,
        request: &OrderRequest,
        started: Instant,
        error: EngineError,
        status: OrderStatus,
    ) -> OrderResponse {
        OrderResponse {
            order_id: request.order_id.clone(),
            result: error.result_code(),
            status,
            message: error.to_string(),
            executed_quantity: Quantity::zero(),
            average_price: Price::ZERO,
            execution_time_ns: clock::unix_ns(),
            latency_micros: started.elapsed().as_micros() as i64,
        }
    }

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------

    fn worker_loop(self: Arc<Self>) {
        loop {
            let item = {
                let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
                loop {
                    if let Some(item) = queue.pop_front() {
                        break item;
                    }
                    if !self.running() {
                        return;
                    }
                    queue = self.queue_cv.wait(queue).unwrap_or_else(|e| e.into_inner());
                }
            };
            let result = self.execute(&item.order);
            item.done.complete(result);
        }
    }

    fn expiry_loop(self: Arc<Self>) {
        loop {
            let (interval_ms, timeout_ns) = {
                let config = self.config.lock().unwrap_or_else(|e| e.into_inner());
                (config.expiry_sweep_interval_ms, config.order_timeout_ns)
            };
            self.wait_tick(Duration::from_millis(interval_ms));
            if !self.running() {
                return;
            }
            self.sweep_expired(timeout_ns);
        }
    }

    /// Walk the active index: expire active orders past the timeout (with a
    /// status callback) and drop already-terminal entries. Dropping the
    /// index reference is what frees their pool slots.
    fn sweep_expired(&self, timeout_ns: i64) {
        let now = clock::unix_ns();
        let mut expired = Vec::new();
        let mut finished = Vec::new();

        for entry in self.active_orders.iter() {
            let (terminal, lapsed) = entry
                .value()
                .with(|order| (order.status().is_terminal(), order.is_expired(now, timeout_ns)));
            if terminal {
                finished.push(entry.key().clone());
            } else if lapsed {
                expired.push(entry.key().clone());
            }
        }

        for order_id in finished {
            self.active_orders.remove(&order_id);
        }
        for order_id in expired {
            let Some((_, shared)) = self.active_orders.remove(&order_id) else {
                continue;
            };
            if shared.with(|order| order.expire()).is_ok() {
                info!(order_id = %order_id, "order expired");
                self.notify_status(&order_id, OrderStatus::Expired, "Order expired");
            }
        }
    }

    /// Interruptible sleep for background tasks; stop() wakes it early.
    pub(crate) fn wait_tick(&self, duration: Duration) {
        let guard = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if !self.running() {
            return;
        }
        let _ = self
            .idle_cv
            .wait_timeout(guard, duration)
            .unwrap_or_else(|e| e.into_inner());
    }
}
