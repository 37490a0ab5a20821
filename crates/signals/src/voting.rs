//! Tier voting rules.
//!
//! Each indicator yields at most one [`Direction`] vote, so a tally can never
//! count the same indicator on both sides.

use auto_trade_core::{Direction, IndicatorSet, IndicatorSnapshot};
use serde::{Deserialize, Serialize};

/// Number of STRONG-tier votes needed out of five.
pub const STRONG_REQUIRED: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiThresholds {
    pub buy_below: f64,
    pub sell_above: f64,
}

impl Default for RsiThresholds {
    fn default() -> Self {
        Self {
            buy_below: 35.0,
            sell_above: 65.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub buy: usize,
    pub sell: usize,
    /// Indicators that were allowed to vote.
    pub eligible: usize,
}

impl VoteTally {
    fn cast(&mut self, vote: Option<Direction>) {
        match vote {
            Some(Direction::Buy) => self.buy += 1,
            Some(Direction::Sell) => self.sell += 1,
            None => {}
        }
    }

    /// Direction with at least `required` votes, if any.
    #[must_use]
    pub fn decide(&self, required: usize) -> Option<Direction> {
        if required == 0 {
            return None;
        }
        if self.buy >= required && self.buy > self.sell {
            Some(Direction::Buy)
        } else if self.sell >= required && self.sell > self.buy {
            Some(Direction::Sell)
        } else {
            None
        }
    }
}

/// `ceil(0.6 * enabled)` without going through floating point.
#[must_use]
pub const fn manual_required(enabled: usize) -> usize {
    (3 * enabled).div_ceil(5)
}

fn side(buy: bool, sell: bool) -> Option<Direction> {
    match (buy, sell) {
        (true, false) => Some(Direction::Buy),
        (false, true) => Some(Direction::Sell),
        _ => None,
    }
}

pub fn rsi_vote(s: &IndicatorSnapshot, t: &RsiThresholds) -> Option<Direction> {
    let rsi = s.rsi?;
    side(rsi < t.buy_below, rsi > t.sell_above)
}

pub fn ema_vote(s: &IndicatorSnapshot) -> Option<Direction> {
    let (fast, slow) = (s.ema20?, s.ema50?);
    side(fast > slow, fast < slow)
}

pub fn histogram_vote(s: &IndicatorSnapshot) -> Option<Direction> {
    let hist = s.macd_histogram?;
    side(hist > 0.0, hist < 0.0)
}

pub fn macd_cross_vote(s: &IndicatorSnapshot) -> Option<Direction> {
    let (line, signal) = (s.macd?, s.macd_signal?);
    side(line > signal, line < signal)
}

/// Band breach; `inclusive` also counts a touch of the band.
pub fn bollinger_vote(s: &IndicatorSnapshot, inclusive: bool) -> Option<Direction> {
    let (upper, lower) = (s.bollinger_upper?, s.bollinger_lower?);
    let price = s.last_price;
    if inclusive {
        side(price <= lower, price >= upper)
    } else {
        side(price < lower, price > upper)
    }
}

pub fn trend_vote(s: &IndicatorSnapshot) -> Option<Direction> {
    let (short, long) = (s.short_slope?, s.long_slope?);
    side(short > 0.0 && long > 0.0, short < 0.0 && long < 0.0)
}

/// Votes of the enabled indicators under the MANUAL rules.
#[must_use]
pub fn manual_tally(
    snapshot: &IndicatorSnapshot,
    enabled: &IndicatorSet,
    thresholds: &RsiThresholds,
) -> VoteTally {
    let mut tally = VoteTally {
        eligible: enabled.enabled_count(),
        ..VoteTally::default()
    };

    if enabled.ema {
        tally.cast(ema_vote(snapshot));
    }
    if enabled.rsi {
        tally.cast(rsi_vote(snapshot, thresholds));
    }
    if enabled.macd {
        tally.cast(histogram_vote(snapshot));
    }
    if enabled.bollinger {
        tally.cast(bollinger_vote(snapshot, true));
    }
    if enabled.trend {
        tally.cast(trend_vote(snapshot));
    }
    tally
}

#[must_use]
pub fn manual_decision(tally: &VoteTally) -> Option<Direction> {
    tally.decide(manual_required(tally.eligible))
}

/// The fixed five-vote STRONG scheme.
#[must_use]
pub fn strong_tally(snapshot: &IndicatorSnapshot, thresholds: &RsiThresholds) -> VoteTally {
    let mut tally = VoteTally {
        eligible: 5,
        ..VoteTally::default()
    };
    tally.cast(rsi_vote(snapshot, thresholds));
    tally.cast(ema_vote(snapshot));
    tally.cast(histogram_vote(snapshot));
    tally.cast(bollinger_vote(snapshot, false));
    tally.cast(macd_cross_vote(snapshot));
    tally
}

#[must_use]
pub fn strong_decision(tally: &VoteTally) -> Option<Direction> {
    tally.decide(STRONG_REQUIRED)
}

/// WEAK tier: RSI alone.
#[must_use]
pub fn weak_tally(snapshot: &IndicatorSnapshot, thresholds: &RsiThresholds) -> VoteTally {
    let mut tally = VoteTally {
        eligible: 1,
        ..VoteTally::default()
    };
    tally.cast(rsi_vote(snapshot, thresholds));
    tally
}
