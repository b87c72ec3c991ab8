//! Order lifecycle types and the execution state machine
//!
//! An order moves strictly forward:
//!
//! ```text
//! PENDING ──submit──► SUBMITTED ──partial──► PARTIALLY_FILLED ──► FILLED
//!    │                    │                        │
//!    ├─reject─► REJECTED  ├─cancel─► CANCELLED     ├─fill─► FILLED
//!    ├─cancel─► CANCELLED └─expire─► EXPIRED       └─cancel─► CANCELLED
//!    └─expire─► EXPIRED
//! ```
//!
//! FILLED, CANCELLED, REJECTED, and EXPIRED are terminal. Transition methods
//! return errors instead of panicking so the engine can surface them as
//! result codes.

use crate::errors::OrderError;
use crate::numeric::{Price, Quantity};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order execution type. Discriminants match the wire protocol.
#[repr(i32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Execute immediately at the best available prices
    #[default]
    Market = 1,
    /// Execute only at the limit price or better
    Limit = 2,
    /// Market order armed at a stop price
    Stop = 3,
    /// Limit order armed at a stop price
    StopLimit = 4,
    /// Stop that trails the market price
    TrailingStop = 5,
}

impl OrderType {
    /// Decode a raw ABI value.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::Market),
            2 => Some(Self::Limit),
            3 => Some(Self::Stop),
            4 => Some(Self::StopLimit),
            5 => Some(Self::TrailingStop),
            _ => None,
        }
    }
}

/// Order side. Discriminants match the wire protocol.
#[repr(i32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    #[default]
    Buy = 1,
    Sell = 2,
}

impl Side {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Decode a raw ABI value.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::Buy),
            2 => Some(Self::Sell),
            _ => None,
        }
    }
}

/// Time-in-force policy. Discriminants match the wire protocol.
#[repr(i32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    /// Good-Till-Cancelled
    #[default]
    Gtc = 1,
    /// Immediate-Or-Cancel
    Ioc = 2,
    /// Fill-Or-Kill
    Fok = 3,
    /// Good for the trading day
    Day = 4,
    /// Good-Till-Date
    Gtd = 5,
}

impl TimeInForce {
    /// Decode a raw ABI value.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::Gtc),
            2 => Some(Self::Ioc),
            3 => Some(Self::Fok),
            4 => Some(Self::Day),
            5 => Some(Self::Gtd),
            _ => None,
        }
    }
}

/// Order status. Discriminants match the wire protocol.
#[repr(i32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending = 1,
    Submitted = 2,
    PartiallyFilled = 3,
    Filled = 4,
    Cancelled = 5,
    Rejected = 6,
    Expired = 7,
}

impl OrderStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// An order is active while it can still receive fills or a cancel.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Submitted | OrderStatus::PartiallyFilled)
    }

    /// Decode a raw ABI value.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::Pending),
            2 => Some(Self::Submitted),
            3 => Some(Self::PartiallyFilled),
            4 => Some(Self::Filled),
            5 => Some(Self::Cancelled),
            6 => Some(Self::Rejected),
            7 => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Incoming order submission in native form.
///
/// The ABI layer converts the flat C record into this before it reaches the
/// engine; embedding hosts link against the flat record only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: String,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub quantity: Quantity,
    pub limit_price: Price,
    pub stop_price: Price,
    pub time_in_force: TimeInForce,
    /// Submitter clock, retained for audit.
    pub timestamp_ns: i64,
    pub client_id: String,
}

/// Execution outcome reported back to the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub result: crate::errors::ExecutionResult,
    pub status: OrderStatus,
    pub message: String,
    pub executed_quantity: Quantity,
    pub average_price: Price,
    pub execution_time_ns: i64,
    pub latency_micros: i64,
}

/// One client intent with its mutable execution state and fill history.
///
/// The struct itself is single-threaded; the engine shares it behind a pool
/// slot whose lock provides the fill-recording atomicity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub quantity: Quantity,
    pub limit_price: Price,
    pub stop_price: Price,
    pub time_in_force: TimeInForce,
    pub client_id: String,
    /// Submitter clock from the request.
    pub client_timestamp_ns: i64,
    /// Engine clock at admission; expiry is measured from here.
    pub submitted_at_ns: i64,
    status: OrderStatus,
    filled_quantity: Quantity,
    avg_fill_price_ticks: i64,
    fills: Vec<(Price, Quantity)>,
}

impl Order {
    /// Build a PENDING order from a request, stamping the engine clock.
    pub fn from_request(request: &OrderRequest, submitted_at_ns: i64) -> Self {
        Self {
            order_id: request.order_id.clone(),
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            side: request.side,
            quantity: request.quantity,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            time_in_force: request.time_in_force,
            client_id: request.client_id.clone(),
            client_timestamp_ns: request.timestamp_ns,
            submitted_at_ns,
            status: OrderStatus::Pending,
            filled_quantity: Quantity::zero(),
            avg_fill_price_ticks: 0,
            fills: Vec::new(),
        }
    }

    /// Validate admission rules.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.order_id.is_empty() {
            return Err(OrderError::EmptyOrderId);
        }
        if self.symbol.is_empty() {
            return Err(OrderError::EmptySymbol);
        }
        if self.quantity.is_zero() {
            return Err(OrderError::InvalidQuantity);
        }
        if self.order_type == OrderType::Limit && !self.limit_price.is_positive() {
            return Err(OrderError::MissingLimitPrice);
        }
        if self.order_type == OrderType::Stop && !self.stop_price.is_positive() {
            return Err(OrderError::MissingStopPrice);
        }
        Ok(())
    }

    /// Current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Quantity filled so far.
    pub fn filled_quantity(&self) -> Quantity {
        self.filled_quantity
    }

    /// Quantity still unfilled.
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity.saturating_sub(self.filled_quantity)
    }

    /// Size-weighted average fill price.
    pub fn average_fill_price(&self) -> Price {
        Price::from_ticks(self.avg_fill_price_ticks)
    }

    /// Fill history in execution order.
    pub fn fills(&self) -> &[(Price, Quantity)] {
        &self.fills
    }

    /// True while the order can still receive fills or a cancel.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// True once the full quantity has been executed.
    pub fn is_fully_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }

    /// Whether the order has outlived the engine's order timeout.
    ///
    /// DAY orders do not expire here: without a market-hours source they
    /// behave like GTC bounded by the engine timeout.
    pub fn is_expired(&self, now_ns: i64, timeout_ns: i64) -> bool {
        if self.time_in_force == TimeInForce::Day {
            return false;
        }
        now_ns.saturating_sub(self.submitted_at_ns) > timeout_ns
    }

    /// PENDING → SUBMITTED on admission.
    pub fn submit(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Pending => {
                self.status = OrderStatus::Submitted;
                Ok(())
            }
            other => Err(OrderError::InvalidTransition {
                from: format!("{other:?}"),
                to: "SUBMITTED".into(),
            }),
        }
    }

    /// PENDING → REJECTED when validation or risk checks fail.
    pub fn reject(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Pending => {
                self.status = OrderStatus::Rejected;
                Ok(())
            }
            other => Err(OrderError::InvalidTransition {
                from: format!("{other:?}"),
                to: "REJECTED".into(),
            }),
        }
    }

    /// Any non-terminal state → CANCELLED.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                status: format!("{:?}", self.status),
            });
        }
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// Any non-terminal state → EXPIRED.
    pub fn expire(&mut self) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                status: format!("{:?}", self.status),
            });
        }
        self.status = OrderStatus::Expired;
        Ok(())
    }

    /// Record a fill: append to the history and update the filled quantity
    /// and size-weighted average price in one step.
    ///
    /// The average stays in integer ticks:
    /// `new_avg = (old_avg·old_filled + price·size) / new_filled`, truncated.
    /// Status becomes FILLED once the full quantity is executed, else
    /// PARTIALLY_FILLED.
    pub fn add_fill(&mut self, price: Price, quantity: Quantity) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                status: format!("{:?}", self.status),
            });
        }

        let new_filled = self.filled_quantity + quantity;
        if new_filled > self.quantity {
            return Err(OrderError::FillExceedsQuantity {
                fill: quantity.to_string(),
                quantity: self.quantity.to_string(),
            });
        }

        let numerator = Decimal::from(self.avg_fill_price_ticks) * self.filled_quantity.as_decimal()
            + Decimal::from(price.ticks()) * quantity.as_decimal();
        self.avg_fill_price_ticks = (numerator / new_filled.as_decimal())
            .trunc()
            .to_i64()
            .unwrap_or(0);

        self.fills.push((price, quantity));
        self.filled_quantity = new_filled;

        self.status = if self.is_fully_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(order_type: OrderType, quantity: &str) -> OrderRequest {
        OrderRequest {
            order_id: "ord-1".into(),
            symbol: "AAPL".into(),
            order_type,
            side: Side::Buy,
            quantity: Quantity::from_str(quantity).unwrap(),
            limit_price: Price::from_f64(150.0),
            stop_price: Price::from_f64(140.0),
            time_in_force: TimeInForce::Gtc,
            timestamp_ns: 1_700_000_000_000_000_000,
            client_id: "client-1".into(),
        }
    }

    fn order(order_type: OrderType, quantity: &str) -> Order {
        Order::from_request(&request(order_type, quantity), 1_700_000_000_000_000_000)
    }

    #[test]
    fn test_validation_rules() {
        assert!(order(OrderType::Market, "100").validate().is_ok());

        let mut o = order(OrderType::Market, "100");
        o.order_id.clear();
        assert_eq!(o.validate(), Err(OrderError::EmptyOrderId));

        let mut o = order(OrderType::Market, "100");
        o.symbol.clear();
        assert_eq!(o.validate(), Err(OrderError::EmptySymbol));

        assert_eq!(
            order(OrderType::Market, "0").validate(),
            Err(OrderError::InvalidQuantity)
        );

        let mut o = order(OrderType::Limit, "100");
        o.limit_price = Price::ZERO;
        assert_eq!(o.validate(), Err(OrderError::MissingLimitPrice));

        let mut o = order(OrderType::Stop, "100");
        o.stop_price = Price::ZERO;
        assert_eq!(o.validate(), Err(OrderError::MissingStopPrice));
    }

    #[test]
    fn test_submit_then_fill_moves_forward() {
        let mut o = order(OrderType::Market, "100");
        assert_eq!(o.status(), OrderStatus::Pending);

        o.submit().unwrap();
        assert_eq!(o.status(), OrderStatus::Submitted);
        assert!(o.is_active());

        o.add_fill(Price::from_f64(150.0), Quantity::from_u64(40))
            .unwrap();
        assert_eq!(o.status(), OrderStatus::PartiallyFilled);
        assert_eq!(o.remaining_quantity(), Quantity::from_u64(60));

        o.add_fill(Price::from_f64(151.0), Quantity::from_u64(60))
            .unwrap();
        assert_eq!(o.status(), OrderStatus::Filled);
        assert!(o.is_fully_filled());
        assert!(!o.is_active());
    }

    #[test]
    fn test_weighted_average_fill_price() {
        let mut o = order(OrderType::Market, "100");
        o.submit().unwrap();

        // 40 @ 150 + 60 @ 151 → 150.6
        o.add_fill(Price::from_f64(150.0), Quantity::from_u64(40))
            .unwrap();
        o.add_fill(Price::from_f64(151.0), Quantity::from_u64(60))
            .unwrap();

        assert_eq!(o.average_fill_price(), Price::from_f64(150.6));
        assert_eq!(o.fills().len(), 2);
    }

    #[test]
    fn test_overfill_rejected() {
        let mut o = order(OrderType::Market, "10");
        o.submit().unwrap();

        let err = o
            .add_fill(Price::from_f64(150.0), Quantity::from_u64(11))
            .unwrap_err();
        assert!(matches!(err, OrderError::FillExceedsQuantity { .. }));
        assert!(o.filled_quantity().is_zero());
    }

    #[test]
    fn test_cancel_terminal_fails() {
        let mut o = order(OrderType::Market, "10");
        o.submit().unwrap();
        o.add_fill(Price::from_f64(150.0), Quantity::from_u64(10))
            .unwrap();

        let err = o.cancel().unwrap_err();
        assert!(matches!(err, OrderError::AlreadyTerminal { .. }));
        assert_eq!(o.status(), OrderStatus::Filled);
    }

    #[test]
    fn test_fill_after_cancel_fails() {
        let mut o = order(OrderType::Limit, "10");
        o.submit().unwrap();
        o.cancel().unwrap();

        assert!(o
            .add_fill(Price::from_f64(150.0), Quantity::from_u64(1))
            .is_err());
        assert_eq!(o.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_double_submit_fails() {
        let mut o = order(OrderType::Market, "10");
        o.submit().unwrap();
        assert!(o.submit().is_err());
    }

    #[test]
    fn test_expiry_window() {
        let o = order(OrderType::Limit, "10");
        let timeout = 30_000_000_000i64;

        assert!(!o.is_expired(o.submitted_at_ns + timeout, timeout));
        assert!(o.is_expired(o.submitted_at_ns + timeout + 1, timeout));
    }

    #[test]
    fn test_day_orders_do_not_expire() {
        let mut req = request(OrderType::Limit, "10");
        req.time_in_force = TimeInForce::Day;
        let o = Order::from_request(&req, 0);

        assert!(!o.is_expired(i64::MAX, 30_000_000_000));
    }

    #[test]
    fn test_enum_raw_roundtrip() {
        for raw in 1..=5 {
            assert_eq!(OrderType::from_raw(raw).unwrap() as i32, raw);
            assert_eq!(TimeInForce::from_raw(raw).unwrap() as i32, raw);
        }
        for raw in 1..=7 {
            assert_eq!(OrderStatus::from_raw(raw).unwrap() as i32, raw);
        }
        assert_eq!(Side::from_raw(1), Some(Side::Buy));
        assert_eq!(Side::from_raw(2), Some(Side::Sell));
        assert_eq!(Side::from_raw(3), None);
        assert_eq!(OrderType::from_raw(0), None);
    }

    proptest! {
        // P1: avg_fill_price · Σ size = Σ price·size up to tick truncation,
        // and P2: filled ≤ quantity with FILLED ⇔ filled = quantity.
        #[test]
        fn prop_fill_accounting(fills in proptest::collection::vec((1_000i64..100_000_000, 1u64..1_000), 1..12)) {
            let total: u64 = fills.iter().map(|(_, q)| q).sum();
            let mut o = order(OrderType::Market, &total.to_string());
            o.submit().unwrap();

            for (ticks, qty) in &fills {
                o.add_fill(Price::from_ticks(*ticks), Quantity::from_u64(*qty)).unwrap();
            }

            prop_assert!(o.filled_quantity() <= o.quantity);
            prop_assert_eq!(o.status(), OrderStatus::Filled);

            let notional: i128 = fills.iter().map(|(t, q)| *t as i128 * *q as i128).sum();
            let avg = o.average_fill_price().ticks() as i128;
            let reconstructed = avg * total as i128;
            // Truncation loses at most one tick per unit of size
            prop_assert!((notional - reconstructed).abs() < total as i128);
        }
    }
}
