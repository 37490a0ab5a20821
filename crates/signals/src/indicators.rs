//! Technical indicators over a closing-price series.
//!
//! Every function takes prices ordered oldest to newest and returns `None`
//! when the series is too short for the requested window.

/// Exponentially weighted mean with `alpha = 2 / (span + 1)`.
///
/// Uses normalized weights, so early values are not biased toward the first
/// sample. Returns one value per input.
#[must_use]
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    #[allow(clippy::cast_precision_loss)]
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    values
        .iter()
        .map(|&x| {
            numerator = x + decay * numerator;
            denominator = 1.0 + decay * denominator;
            numerator / denominator
        })
        .collect()
}

/// Latest value of [`ema_series`].
#[must_use]
pub fn ema(values: &[f64], span: usize) -> Option<f64> {
    ema_series(values, span).last().copied()
}

/// Wilder's relative strength index.
///
/// Seeds the average gain and loss with the simple mean of the first
/// `period` changes, then smooths with `(prev * (period - 1) + x) / period`.
/// Needs `period + 1` prices.
#[must_use]
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    #[allow(clippy::cast_precision_loss)]
    let n = period as f64;

    let (seed_gain, seed_loss) = changes[..period]
        .iter()
        .fold((0.0, 0.0), |(g, l), &c| (g + c.max(0.0), l + (-c).max(0.0)));
    let mut avg_gain = seed_gain / n;
    let mut avg_loss = seed_loss / n;

    for &change in &changes[period..] {
        avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD line `EMA(fast) - EMA(slow)`, its `EMA(signal)` and the histogram.
#[must_use]
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if values.len() < 2 {
        return None;
    }

    let fast_line = ema_series(values, fast);
    let slow_line = ema_series(values, slow);
    let macd_line: Vec<f64> = fast_line
        .iter()
        .zip(&slow_line)
        .map(|(f, s)| f - s)
        .collect();

    let macd = *macd_line.last()?;
    let signal = ema(&macd_line, signal)?;
    Some(Macd {
        macd,
        signal,
        histogram: macd - signal,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Simple moving average of the last `period` values plus/minus `width`
/// sample standard deviations.
#[must_use]
pub fn bollinger(values: &[f64], period: usize, width: f64) -> Option<Bands> {
    if period < 2 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    #[allow(clippy::cast_precision_loss)]
    let n = period as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let deviation = variance.sqrt();

    Some(Bands {
        upper: mean + width * deviation,
        middle: mean,
        lower: mean - width * deviation,
    })
}

/// Price change between the last value and the one `lookback` samples back
/// (counting the last value as one).
#[must_use]
pub fn slope(values: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || values.len() < lookback {
        return None;
    }
    let last = values.last()?;
    Some(last - values[values.len() - lookback])
}
