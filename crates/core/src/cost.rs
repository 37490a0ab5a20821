//! Trading-cost arithmetic shared by the entry gate and the exit monitors.
//!
//! All percentages are fractions (`0.015` is 1.5%) unless a name says
//! otherwise. Settings store user-facing percentages (`1.0` is 1%); they are
//! divided by 100 at the call site.

use crate::market::{to_f64, Direction, Quote};
use crate::settings::TrailingMode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spread assumed when a quote is unusable.
pub const DEFAULT_SPREAD: f64 = 0.002;

/// Commission charged per round trip unless configured otherwise.
pub const DEFAULT_COMMISSION: f64 = 0.0015;

/// Profit margin added on top of costs in automatic trailing mode.
pub const AUTO_MIN_PROFIT: f64 = 0.003;

/// Bounds applied to the automatic trailing requirement.
pub const AUTO_TRAILING_FLOOR: f64 = 0.004;
pub const AUTO_TRAILING_CEILING: f64 = 0.03;

/// Multiplier applied to trading cost to get the break-even target.
pub const BREAK_EVEN_MARGIN: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub commission: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            commission: DEFAULT_COMMISSION,
        }
    }
}

impl CostModel {
    #[must_use]
    pub const fn new(commission: f64) -> Self {
        Self { commission }
    }

    /// `|sell - buy| / midpoint`, or [`DEFAULT_SPREAD`] for an unusable quote.
    #[must_use]
    pub fn spread(quote: &Quote) -> f64 {
        if !quote.is_valid() {
            return DEFAULT_SPREAD;
        }
        let mid = to_f64(quote.midpoint());
        if mid <= 0.0 {
            return DEFAULT_SPREAD;
        }
        to_f64(quote.spread().abs()) / mid
    }

    #[must_use]
    pub fn trading_cost(&self, quote: &Quote) -> f64 {
        Self::spread(quote) + self.commission
    }

    /// Relative price move in the position's favour (negative when adverse).
    #[must_use]
    pub fn gross_move(direction: Direction, open_price: Decimal, current_price: Decimal) -> f64 {
        let open = to_f64(open_price);
        if open <= 0.0 {
            return 0.0;
        }
        let current = to_f64(current_price);
        match direction {
            Direction::Buy => (current - open) / open,
            Direction::Sell => (open - current) / open,
        }
    }

    #[must_use]
    pub fn net_profit(
        &self,
        direction: Direction,
        open_price: Decimal,
        current_price: Decimal,
        quote: &Quote,
    ) -> f64 {
        Self::gross_move(direction, open_price, current_price) - self.trading_cost(quote)
    }

    #[must_use]
    pub fn min_profit_to_break_even(&self, quote: &Quote) -> f64 {
        self.trading_cost(quote) * BREAK_EVEN_MARGIN
    }

    /// Favourable move required before the trailing monitor closes a position.
    ///
    /// `trailing_stop_percent` is the user setting in percent units. It is the
    /// minimum profit in manual mode and the flat fallback in advisory and
    /// test modes.
    #[must_use]
    pub fn required_trailing(
        &self,
        mode: TrailingMode,
        spread: f64,
        trailing_stop_percent: f64,
    ) -> f64 {
        match mode {
            TrailingMode::Manual => spread + self.commission + trailing_stop_percent / 100.0,
            TrailingMode::Auto => (spread + self.commission + AUTO_MIN_PROFIT)
                .clamp(AUTO_TRAILING_FLOOR, AUTO_TRAILING_CEILING),
            TrailingMode::Advisory | TrailingMode::Test => trailing_stop_percent / 100.0,
        }
    }

    /// Realized profit in quote currency for closing `size` at `current_price`.
    #[must_use]
    pub fn realized_pnl(
        direction: Direction,
        open_price: Decimal,
        current_price: Decimal,
        size: Decimal,
    ) -> Decimal {
        match direction {
            Direction::Buy => (current_price - open_price) * size,
            Direction::Sell => (open_price - current_price) * size,
        }
    }
}
