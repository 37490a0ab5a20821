//! Request and response types for the advisory gate.

use crate::market::{Direction, Quote};
use crate::signal::IndicatorSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default take-profit suggestion when an exit answer omits one.
pub const DEFAULT_NET_TAKE_PROFIT_PCT: f64 = 2.0;

/// Default confidence when an exit answer omits one.
pub const DEFAULT_CONFIDENCE_PCT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Approve,
    Reject,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => f.write_str("APPROVE"),
            Self::Reject => f.write_str("REJECT"),
        }
    }
}

/// Entry gate answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryDecision {
    pub verdict: Verdict,
    pub reason: String,
}

impl AdvisoryDecision {
    pub fn approve(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Approve,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Reject,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.verdict == Verdict::Approve
    }
}

/// Everything the gate sees about a proposed entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryRequest {
    pub instrument_name: String,
    pub instrument_id: String,
    pub direction: Direction,
    pub quote: Quote,
    pub indicators: IndicatorSnapshot,
    /// Fractional round-trip cost at the current quote.
    pub trading_cost: f64,
    pub break_even: f64,
}

/// Everything the gate sees about an open position it may close.
#[derive(Debug, Clone, Serialize)]
pub struct ExitRequest {
    pub instrument_name: String,
    pub instrument_id: String,
    pub direction: Direction,
    pub quote: Quote,
    /// Snapshot over recent minute bars; only `last_price` is set when
    /// history is unavailable.
    pub indicators: IndicatorSnapshot,
    pub open_price: f64,
    pub current_price: f64,
    /// Cost-adjusted profit as a fraction.
    pub net_profit: f64,
    pub trading_cost: f64,
}

/// Exit gate answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitAdvice {
    Close {
        reason: String,
    },
    Hold {
        /// Suggested profit target after costs, in percent.
        net_take_profit_pct: f64,
        confidence_pct: f64,
        reason: String,
    },
    /// No usable instruction; the caller falls back to its own threshold.
    Ambiguous {
        raw: String,
    },
}

impl ExitAdvice {
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Self::Close { .. })
    }
}
