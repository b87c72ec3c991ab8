//! Error taxonomy and boundary result codes
//!
//! Internal failures carry context through `thiserror` enums; the flat
//! `ExecutionResult` code handed across the ABI is derived from them at the
//! boundary. Nothing unwinds across the boundary; errors are values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat result code returned across the foreign-function boundary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionResult {
    Success = 0,
    InvalidOrder = 1,
    InsufficientLiquidity = 2,
    RiskLimitExceeded = 3,
    Timeout = 4,
    SystemError = 5,
    OrderNotFound = 6,
    MarketClosed = 7,
}

impl ExecutionResult {
    /// True for the success code.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success)
    }

    /// Decode a raw ABI value.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Success),
            1 => Some(Self::InvalidOrder),
            2 => Some(Self::InsufficientLiquidity),
            3 => Some(Self::RiskLimitExceeded),
            4 => Some(Self::Timeout),
            5 => Some(Self::SystemError),
            6 => Some(Self::OrderNotFound),
            7 => Some(Self::MarketClosed),
            _ => None,
        }
    }
}

/// Order-level failures raised by validation and the state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order id is empty")]
    EmptyOrderId,

    #[error("symbol is empty")]
    EmptySymbol,

    #[error("quantity must be positive")]
    InvalidQuantity,

    #[error("limit order requires a positive limit price")]
    MissingLimitPrice,

    #[error("stop order requires a positive stop price")]
    MissingStopPrice,

    #[error("order is already terminal: {status}")]
    AlreadyTerminal { status: String },

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("fill of {fill} would exceed order quantity {quantity}")]
    FillExceedsQuantity { fill: String, quantity: String },
}

/// Top-level engine error taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    #[error("unknown symbol: {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("insufficient liquidity for {requested} {symbol}")]
    InsufficientLiquidity { symbol: String, requested: String },

    #[error("risk limit exceeded: quantity {quantity} above limit {limit}")]
    RiskLimitExceeded { quantity: String, limit: String },

    #[error("order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("unsupported order type: {order_type}")]
    UnsupportedOrderType { order_type: String },

    #[error("invalid request field: {field}")]
    InvalidRequest { field: String },

    #[error("engine is not initialized")]
    NotInitialized,

    #[error("order capacity exhausted")]
    CapacityExhausted,

    #[error("system error: {message}")]
    System { message: String },
}

impl EngineError {
    /// Map onto the flat boundary code.
    pub fn result_code(&self) -> ExecutionResult {
        match self {
            EngineError::Order(_) => ExecutionResult::InvalidOrder,
            EngineError::UnknownSymbol { .. } => ExecutionResult::InvalidOrder,
            EngineError::UnsupportedOrderType { .. } => ExecutionResult::InvalidOrder,
            EngineError::InvalidRequest { .. } => ExecutionResult::InvalidOrder,
            EngineError::InsufficientLiquidity { .. } => ExecutionResult::InsufficientLiquidity,
            EngineError::RiskLimitExceeded { .. } => ExecutionResult::RiskLimitExceeded,
            EngineError::OrderNotFound { .. } => ExecutionResult::OrderNotFound,
            EngineError::NotInitialized => ExecutionResult::SystemError,
            EngineError::CapacityExhausted => ExecutionResult::SystemError,
            EngineError::System { .. } => ExecutionResult::SystemError,
        }
    }
}
