use crate::indicators::{bollinger, ema, macd, rsi, slope};
use auto_trade_core::IndicatorSnapshot;

pub const RSI_PERIOD: usize = 14;
pub const EMA_FAST: usize = 20;
pub const EMA_SLOW: usize = 50;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;
pub const SHORT_SLOPE: usize = 5;
pub const LONG_SLOPE: usize = 20;

/// Computes every indicator the voting rules consult.
///
/// Returns `None` for an empty series.
#[must_use]
pub fn compute_snapshot(closes: &[f64]) -> Option<IndicatorSnapshot> {
    let last_price = *closes.last()?;
    let macd = macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let bands = bollinger(closes, BOLLINGER_PERIOD, BOLLINGER_WIDTH);

    Some(IndicatorSnapshot {
        last_price,
        rsi: rsi(closes, RSI_PERIOD),
        ema20: ema(closes, EMA_FAST),
        ema50: ema(closes, EMA_SLOW),
        macd: macd.map(|m| m.macd),
        macd_signal: macd.map(|m| m.signal),
        macd_histogram: macd.map(|m| m.histogram),
        bollinger_upper: bands.map(|b| b.upper),
        bollinger_middle: bands.map(|b| b.middle),
        bollinger_lower: bands.map(|b| b.lower),
        short_slope: slope(closes, SHORT_SLOPE),
        long_slope: slope(closes, LONG_SLOPE),
    })
}
