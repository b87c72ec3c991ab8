//! Fill records delivered to the host

use crate::ids::FillId;
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Venue stamped on fills produced by the built-in simulator.
pub const VENUE_SIM: &str = "SIM";

/// One execution against the book, owned by the order that produced it.
///
/// Append-only: a fill is immutable once observed by a callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub fill_id: String,
    pub order_id: String,
    pub price: Price,
    pub quantity: Quantity,
    pub fee: Decimal,
    pub timestamp_ns: i64,
    pub venue: String,
}

impl OrderFill {
    /// Build a fill with a fresh time-sortable id.
    pub fn new(
        order_id: &str,
        price: Price,
        quantity: Quantity,
        fee: Decimal,
        timestamp_ns: i64,
    ) -> Self {
        Self {
            fill_id: FillId::new().to_string(),
            order_id: order_id.to_string(),
            price,
            quantity,
            fee,
            timestamp_ns,
            venue: VENUE_SIM.to_string(),
        }
    }

    /// Overwrite all fields in place; used when staging through the fill pool
    /// so slots are reused without reallocating.
    pub fn assign(
        &mut self,
        order_id: &str,
        price: Price,
        quantity: Quantity,
        fee: Decimal,
        timestamp_ns: i64,
    ) {
        self.fill_id.clear();
        self.fill_id.push_str(&FillId::new().to_string());
        self.order_id.clear();
        self.order_id.push_str(order_id);
        self.price = price;
        self.quantity = quantity;
        self.fee = fee;
        self.timestamp_ns = timestamp_ns;
        self.venue.clear();
        self.venue.push_str(VENUE_SIM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fill_gets_unique_id() {
        let a = OrderFill::new("ord-1", Price::from_f64(150.0), Quantity::from_u64(10), Decimal::ZERO, 1);
        let b = OrderFill::new("ord-1", Price::from_f64(150.0), Quantity::from_u64(10), Decimal::ZERO, 1);
        assert_ne!(a.fill_id, b.fill_id);
        assert_eq!(a.venue, VENUE_SIM);
    }

    #[test]
    fn test_assign_reuses_slot() {
        let mut fill = OrderFill::default();
        fill.assign(
            "ord-2",
            Price::from_f64(99.5),
            Quantity::from_u64(5),
            Decimal::new(5, 3),
            42,
        );

        assert_eq!(fill.order_id, "ord-2");
        assert_eq!(fill.quantity, Quantity::from_u64(5));
        assert_eq!(fill.timestamp_ns, 42);
        assert!(!fill.fill_id.is_empty());
    }
}
