//! Indicator readings handed from the signal engine to the advisory gate.

use serde::{Deserialize, Serialize};

/// Latest value of every indicator the engine knows about.
///
/// A field is `None` when there were too few samples to compute it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub last_price: f64,
    pub rsi: Option<f64>,
    pub ema20: Option<f64>,
    pub ema50: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
    pub short_slope: Option<f64>,
    pub long_slope: Option<f64>,
}

impl IndicatorSnapshot {
    /// Compact `name=value` rendering for logs and advisory prompts.
    #[must_use]
    pub fn describe(&self) -> String {
        let fields = [
            ("rsi", self.rsi),
            ("ema20", self.ema20),
            ("ema50", self.ema50),
            ("macd", self.macd),
            ("macd_signal", self.macd_signal),
            ("macd_hist", self.macd_histogram),
            ("bb_upper", self.bollinger_upper),
            ("bb_middle", self.bollinger_middle),
            ("bb_lower", self.bollinger_lower),
        ];

        let mut parts = vec![format!("price={:.5}", self.last_price)];
        parts.extend(
            fields
                .iter()
                .filter_map(|(name, value)| value.map(|v| format!("{name}={v:.4}"))),
        );
        parts.join(", ")
    }
}
