//! C ABI surface for embedding hosts
//!
//! Everything here is ABI-flat: fixed-size character arrays, 4-byte enums,
//! and plain doubles, matching the record layouts the host bindings expect
//! bit-for-bit. One engine instance exists per process behind a global
//! mutex; lifecycle calls are serialized through it while data-path calls
//! clone the handle and release the lock. No panic crosses the boundary:
//! every entry point is wrapped and reports `SYSTEM_ERROR` instead.

use crate::engine::ExecutionEngine;
use rust_decimal::prelude::ToPrimitive;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use types::errors::ExecutionResult;
use types::fill::OrderFill;
use types::numeric::{Price, Quantity};
use types::order::{OrderRequest, OrderResponse, OrderStatus, OrderType, Side, TimeInForce};

/// Incoming order request record.
#[repr(C)]
pub struct COrderRequest {
    pub order_id: [c_char; 64],
    pub symbol: [c_char; 16],
    pub order_type: i32,
    pub side: i32,
    pub quantity: f64,
    pub price: f64,
    pub stop_price: f64,
    pub time_in_force: i32,
    pub timestamp_ns: i64,
    pub client_id: [c_char; 64],
}

/// Execution outcome record.
#[repr(C)]
pub struct COrderResponse {
    pub order_id: [c_char; 64],
    pub result: i32,
    pub status: i32,
    pub message: [c_char; 256],
    pub executed_quantity: f64,
    pub average_price: f64,
    pub execution_time_ns: i64,
    pub latency_micros: i64,
}

/// Fill record delivered to the fill callback.
#[repr(C)]
pub struct COrderFill {
    pub fill_id: [c_char; 64],
    pub order_id: [c_char; 64],
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
    pub timestamp_ns: i64,
    pub venue: [c_char; 32],
}

/// Top-of-book snapshot record.
#[repr(C)]
pub struct COrderBook {
    pub symbol: [c_char; 16],
    pub timestamp_ns: i64,
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub last_price: f64,
    pub last_size: f64,
}

/// Metrics snapshot record.
#[repr(C)]
pub struct CEngineMetrics {
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

/// Host callback for fills.
pub type CFillCallback = extern "C" fn(*const COrderFill);

/// Host callback for asynchronous status transitions.
pub type CStatusCallback = extern "C" fn(*const c_char, i32, *const c_char);

static ENGINE: Mutex<Option<Arc<ExecutionEngine>>> = Mutex::new(None);

fn engine_handle() -> Option<Arc<ExecutionEngine>> {
    ENGINE.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Run an entry-point body, converting any panic into SYSTEM_ERROR.
fn guarded(body: impl FnOnce() -> i32) -> i32 {
    catch_unwind(AssertUnwindSafe(body)).unwrap_or(ExecutionResult::SystemError as i32)
}

/// Read a NUL-terminated fixed-size field.
fn read_fixed(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Write a string into a fixed-size field, truncated and NUL-terminated.
fn write_fixed(dst: &mut [c_char], src: &str) {
    dst.fill(0);
    let max_len = dst.len() - 1;
    for (slot, byte) in dst.iter_mut().zip(src.bytes().take(max_len)) {
        *slot = byte as c_char;
    }
}

fn decode_request(c_request: &COrderRequest) -> Result<OrderRequest, types::errors::EngineError> {
    let order_type = OrderType::from_raw(c_request.order_type).ok_or(
        types::errors::EngineError::UnsupportedOrderType {
            order_type: c_request.order_type.to_string(),
        },
    )?;
    let side = Side::from_raw(c_request.side).ok_or(types::errors::EngineError::InvalidRequest {
        field: "side".into(),
    })?;
    let time_in_force = TimeInForce::from_raw(c_request.time_in_force).ok_or(
        types::errors::EngineError::InvalidRequest {
            field: "time_in_force".into(),
        },
    )?;

    Ok(OrderRequest {
        order_id: read_fixed(&c_request.order_id),
        symbol: read_fixed(&c_request.symbol),
        order_type,
        side,
        // Non-finite quantities become zero and are rejected by validation.
        quantity: Quantity::from_f64(c_request.quantity).unwrap_or_else(Quantity::zero),
        limit_price: Price::from_f64(c_request.price),
        stop_price: Price::from_f64(c_request.stop_price),
        time_in_force,
        timestamp_ns: c_request.timestamp_ns,
        client_id: read_fixed(&c_request.client_id),
    })
}

fn write_response(dst: &mut COrderResponse, response: &OrderResponse) {
    write_fixed(&mut dst.order_id, &response.order_id);
    dst.result = response.result as i32;
    dst.status = response.status as i32;
    write_fixed(&mut dst.message, &response.message);
    dst.executed_quantity = response.executed_quantity.to_f64();
    dst.average_price = response.average_price.to_f64();
    dst.execution_time_ns = response.execution_time_ns;
    dst.latency_micros = response.latency_micros;
}

impl COrderFill {
    fn from_fill(fill: &OrderFill) -> Self {
        let mut c_fill = COrderFill {
            fill_id: [0; 64],
            order_id: [0; 64],
            price: fill.price.to_f64(),
            quantity: fill.quantity.to_f64(),
            fee: fill.fee.to_f64().unwrap_or(0.0),
            timestamp_ns: fill.timestamp_ns,
            venue: [0; 32],
        };
        write_fixed(&mut c_fill.fill_id, &fill.fill_id);
        write_fixed(&mut c_fill.order_id, &fill.order_id);
        write_fixed(&mut c_fill.venue, &fill.venue);
        c_fill
    }
}

/// Create (on first call) and initialize the process-wide engine.
///
/// # Safety
/// `config_json` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn engine_initialize(config_json: *const c_char) -> i32 {
    guarded(|| {
        let config = if config_json.is_null() {
            String::new()
        } else {
            unsafe { std::ffi::CStr::from_ptr(config_json) }
                .to_string_lossy()
                .into_owned()
        };

        let engine = {
            let mut guard = ENGINE.lock().unwrap_or_else(|e| e.into_inner());
            guard.get_or_insert_with(ExecutionEngine::new).clone()
        };
        engine.initialize(&config) as i32
    })
}

/// Start the engine's workers, sweeper, and simulator.
#[no_mangle]
pub extern "C" fn engine_start() -> i32 {
    guarded(|| match engine_handle() {
        Some(engine) => engine.start() as i32,
        None => ExecutionResult::SystemError as i32,
    })
}

/// Stop and destroy the process-wide engine. Safe to call when absent.
#[no_mangle]
pub extern "C" fn engine_stop() -> i32 {
    guarded(|| {
        let engine = ENGINE.lock().unwrap_or_else(|e| e.into_inner()).take();
        match engine {
            Some(engine) => engine.stop() as i32,
            None => ExecutionResult::Success as i32,
        }
    })
}

/// Submit an order and block until its execution outcome is known.
///
/// # Safety
/// `request` and `response` must be valid, properly aligned pointers.
#[no_mangle]
pub unsafe extern "C" fn engine_submit_order(
    request: *const COrderRequest,
    response: *mut COrderResponse,
) -> i32 {
    guarded(|| {
        if request.is_null() || response.is_null() {
            return ExecutionResult::SystemError as i32;
        }
        let Some(engine) = engine_handle() else {
            return ExecutionResult::SystemError as i32;
        };

        let c_request = unsafe { &*request };
        let c_response = unsafe { &mut *response };

        let native = match decode_request(c_request) {
            Ok(native) => native,
            Err(err) => {
                write_fixed(&mut c_response.order_id, &read_fixed(&c_request.order_id));
                c_response.result = err.result_code() as i32;
                c_response.status = OrderStatus::Rejected as i32;
                write_fixed(&mut c_response.message, &err.to_string());
                c_response.executed_quantity = 0.0;
                c_response.average_price = 0.0;
                c_response.execution_time_ns = 0;
                c_response.latency_micros = 0;
                return err.result_code() as i32;
            }
        };

        let outcome = engine.submit_order(&native);
        write_response(c_response, &outcome);
        outcome.result as i32
    })
}

/// Cancel an active order by id.
///
/// # Safety
/// `order_id` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn engine_cancel_order(order_id: *const c_char) -> i32 {
    guarded(|| {
        if order_id.is_null() {
            return ExecutionResult::SystemError as i32;
        }
        let Some(engine) = engine_handle() else {
            return ExecutionResult::SystemError as i32;
        };

        let id = unsafe { std::ffi::CStr::from_ptr(order_id) }
            .to_string_lossy()
            .into_owned();
        match engine.cancel_order(&id) {
            Ok(()) => ExecutionResult::Success as i32,
            Err(err) => err.result_code() as i32,
        }
    })
}

/// Copy the top of book for a symbol into `book`.
///
/// # Safety
/// `symbol` must be a valid NUL-terminated string and `book` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn engine_get_order_book(symbol: *const c_char, book: *mut COrderBook) -> i32 {
    guarded(|| {
        if symbol.is_null() || book.is_null() {
            return ExecutionResult::SystemError as i32;
        }
        let Some(engine) = engine_handle() else {
            return ExecutionResult::SystemError as i32;
        };

        let name = unsafe { std::ffi::CStr::from_ptr(symbol) }
            .to_string_lossy()
            .into_owned();
        match engine.book_snapshot(&name) {
            Ok(snapshot) => {
                let out = unsafe { &mut *book };
                write_fixed(&mut out.symbol, &snapshot.symbol);
                out.timestamp_ns = snapshot.timestamp_ns;
                out.bid_price = snapshot.bid_price.to_f64();
                out.ask_price = snapshot.ask_price.to_f64();
                out.bid_size = snapshot.bid_size.to_f64();
                out.ask_size = snapshot.ask_size.to_f64();
                out.last_price = snapshot.last_price.to_f64();
                out.last_size = snapshot.last_size.to_f64();
                ExecutionResult::Success as i32
            }
            Err(err) => err.result_code() as i32,
        }
    })
}

/// Copy the current metrics snapshot into `metrics`.
///
/// # Safety
/// `metrics` must be a valid, properly aligned pointer.
#[no_mangle]
pub unsafe extern "C" fn engine_get_metrics(metrics: *mut CEngineMetrics) -> i32 {
    guarded(|| {
        if metrics.is_null() {
            return ExecutionResult::SystemError as i32;
        }
        let Some(engine) = engine_handle() else {
            return ExecutionResult::SystemError as i32;
        };

        let snapshot = engine.metrics();
        let out = unsafe { &mut *metrics };
        out.total_orders_processed = snapshot.total_orders_processed;
        out.successful_executions = snapshot.successful_executions;
        out.failed_executions = snapshot.failed_executions;
        out.active_orders = snapshot.active_orders;
        out.average_latency_micros = snapshot.average_latency_micros;
        out.p99_latency_micros = snapshot.p99_latency_micros;
        out.orders_per_second = snapshot.orders_per_second;
        out.memory_usage_bytes = snapshot.memory_usage_bytes;
        out.cpu_usage_percent = snapshot.cpu_usage_percent;
        out.uptime_seconds = snapshot.uptime_seconds;
        ExecutionResult::Success as i32
    })
}

/// True (1) while the engine is running and healthy.
#[no_mangle]
pub extern "C" fn engine_is_healthy() -> c_int {
    guarded(|| match engine_handle() {
        Some(engine) if engine.is_healthy() => 1,
        _ => 0,
    })
}

/// Register the fill callback; a null callback is ignored.
#[no_mangle]
pub extern "C" fn engine_register_fill_callback(callback: Option<CFillCallback>) -> i32 {
    guarded(|| {
        let Some(engine) = engine_handle() else {
            return ExecutionResult::SystemError as i32;
        };
        if let Some(callback) = callback {
            engine.register_fill_callback(Box::new(move |fill: &OrderFill| {
                let c_fill = COrderFill::from_fill(fill);
                callback(&c_fill);
            }));
        }
        ExecutionResult::Success as i32
    })
}

/// Register the status callback; a null callback is ignored.
#[no_mangle]
pub extern "C" fn engine_register_status_callback(callback: Option<CStatusCallback>) -> i32 {
    guarded(|| {
        let Some(engine) = engine_handle() else {
            return ExecutionResult::SystemError as i32;
        };
        if let Some(callback) = callback {
            engine.register_status_callback(Box::new(
                move |order_id: &str, status: OrderStatus, message: &str| {
                    let id = CString::new(order_id).unwrap_or_default();
                    let text = CString::new(message).unwrap_or_default();
                    callback(id.as_ptr(), status as i32, text.as_ptr());
                },
            ));
        }
        ExecutionResult::Success as i32
    })
}
