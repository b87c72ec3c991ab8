//! Fixed-point numeric types for prices and quantities
//!
//! Prices are integer tick counts with scale 10⁵ so that comparisons and
//! arithmetic stay exact on the hot path. Quantities use rust_decimal for
//! deterministic size/fee/notional arithmetic (no floating-point errors).

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Number of ticks per quote unit: one tick is 10⁻⁵.
pub const TICK_SCALE: i64 = 100_000;

/// Price as a fixed-point tick count (scale 10⁵, i.e. 5 decimal places).
///
/// The tick count is a plain `i64`, so ordering and arithmetic are exact.
/// Conversion from a real value truncates toward zero at the tick boundary.
/// Arithmetic does not check overflow; callers keep tick counts in range.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// The zero price (uninitialized book levels read as zero).
    pub const ZERO: Price = Price(0);

    /// Create a price from a raw tick count.
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Create a price from a real value, truncating toward zero.
    pub fn from_f64(value: f64) -> Self {
        Self((value * TICK_SCALE as f64) as i64)
    }

    /// Raw tick count.
    pub const fn ticks(&self) -> i64 {
        self.0
    }

    /// Real-valued view; lossless only back to the tick boundary.
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / TICK_SCALE as f64
    }

    /// Exact decimal view of the tick count (scale 5).
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.0, 5)
    }

    /// Multiply the tick count by a real factor, truncating toward zero.
    ///
    /// Used by the simulator for mid-price drift; not required to round-trip.
    pub fn scale(&self, factor: f64) -> Self {
        Self((self.0 as f64 * factor) as i64)
    }

    /// Integer midpoint of two prices, ties truncated toward zero.
    pub fn midpoint(a: Price, b: Price) -> Self {
        Self((a.0 + b.0) / 2)
    }

    /// True when the tick count is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

/// Quantity with fixed-point decimal representation.
///
/// Always non-negative. Sizes cross the ABI as doubles and are converted
/// here at the boundary so all internal size arithmetic is exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(Decimal);

impl Quantity {
    /// The zero quantity.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from a decimal, returning None if negative.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from a double, returning None for NaN, infinities, or negatives.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Decimal::from_f64(value).and_then(Self::try_new)
    }

    /// Create from an integer (tests and seed data).
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Create from a string (tests and seed data).
    pub fn from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        let decimal = Decimal::from_str(s)?;
        Ok(Self(decimal))
    }

    /// Inner decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Real-valued view for the ABI boundary.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    /// True when zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Smaller of two quantities.
    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if self.0 >= rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self(Decimal::ZERO)
        }
    }

    /// Exact notional value of this quantity at the given price.
    pub fn notional(&self, price: Price) -> Decimal {
        self.0 * price.as_decimal()
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    /// # Panics
    /// Panics if the result would be negative; use `saturating_sub` on
    /// feed-driven paths.
    fn sub(self, rhs: Self) -> Self::Output {
        assert!(self.0 >= rhs.0, "Quantity subtraction would be negative");
        Self(self.0 - rhs.0)
    }
}

// Serialized as a string to prevent JSON number precision loss.
impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("Quantity cannot be negative"))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
