use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trade direction as understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Direction of the order that closes a position opened in `self`.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Ok(Self::Buy),
            "SELL" | "SHORT" => Ok(Self::Sell),
            other => anyhow::bail!("Unknown direction: {other}"),
        }
    }
}

/// Current two-sided price for an instrument.
///
/// `buy` is the price used to value a BUY entry and `sell` the one used for a
/// SELL entry. A position opened BUY is marked against `sell` and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub buy: Decimal,
    pub sell: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    #[must_use]
    pub fn new(buy: Decimal, sell: Decimal) -> Self {
        Self {
            buy,
            sell,
            timestamp: Utc::now(),
        }
    }

    /// A quote is usable only when both sides are present and positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.buy > Decimal::ZERO && self.sell > Decimal::ZERO
    }

    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.sell - self.buy
    }

    #[must_use]
    pub fn midpoint(&self) -> Decimal {
        (self.buy + self.sell) / Decimal::TWO
    }

    /// Price at which a new position in `direction` is sized.
    #[must_use]
    pub const fn entry_price(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::Buy => self.buy,
            Direction::Sell => self.sell,
        }
    }

    /// Price at which an open position in `direction` is marked.
    #[must_use]
    pub const fn mark_price(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::Buy => self.sell,
            Direction::Sell => self.buy,
        }
    }
}

/// Sampling resolution for historical bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    Minute,
    Hour,
    #[serde(rename = "HOUR_4")]
    Hour4,
    Day,
}

impl Resolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Hour4 => "HOUR_4",
            Self::Day => "DAY",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized historical sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub close: f64,
}

impl PriceBar {
    #[must_use]
    pub const fn new(close: f64) -> Self {
        Self { close }
    }
}

/// Lossy conversion used wherever decimal prices feed floating-point math.
#[must_use]
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
