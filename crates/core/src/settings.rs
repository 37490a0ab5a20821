use crate::instrument::Instrument;
use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Strictness level used to turn indicators into a trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalTier {
    Test,
    Manual,
    Weak,
    #[default]
    Strong,
}

impl fmt::Display for SignalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Test => "TEST",
            Self::Manual => "MANUAL",
            Self::Weak => "WEAK",
            Self::Strong => "STRONG",
        };
        f.write_str(name)
    }
}

impl FromStr for SignalTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TEST" => Ok(Self::Test),
            "MANUAL" | "MNL" => Ok(Self::Manual),
            "WEAK" => Ok(Self::Weak),
            "STRONG" => Ok(Self::Strong),
            other => anyhow::bail!("Unknown signal tier: {other}"),
        }
    }
}

/// How the trailing monitor derives its exit threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrailingMode {
    Manual,
    #[default]
    Auto,
    Advisory,
    Test,
}

/// Indicator toggles consulted by the MANUAL tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSet {
    #[serde(default = "enabled")]
    pub ema: bool,
    #[serde(default = "enabled")]
    pub rsi: bool,
    #[serde(default = "enabled")]
    pub macd: bool,
    #[serde(default = "enabled")]
    pub bollinger: bool,
    #[serde(default = "enabled")]
    pub trend: bool,
}

const fn enabled() -> bool {
    true
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self::all()
    }
}

impl IndicatorSet {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            ema: true,
            rsi: true,
            macd: true,
            bollinger: true,
            trend: true,
        }
    }

    #[must_use]
    pub const fn none() -> Self {
        Self {
            ema: false,
            rsi: false,
            macd: false,
            bollinger: false,
            trend: false,
        }
    }

    #[must_use]
    pub fn enabled_count(&self) -> usize {
        [self.ema, self.rsi, self.macd, self.bollinger, self.trend]
            .iter()
            .filter(|on| **on)
            .count()
    }
}

/// Per-instrument trading switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSettings {
    #[serde(default = "enabled")]
    pub active: bool,
    #[serde(default = "enabled")]
    pub buy: bool,
    #[serde(default = "enabled")]
    pub sell: bool,
    #[serde(default = "default_trade_amount")]
    pub trade_amount_usd: f64,
    #[serde(default = "default_max_trades")]
    pub max_trades: usize,
}

const fn default_trade_amount() -> f64 {
    100.0
}

const fn default_max_trades() -> usize {
    10
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self {
            active: true,
            buy: true,
            sell: true,
            trade_amount_usd: default_trade_amount(),
            max_trades: default_max_trades(),
        }
    }
}

/// Persisted engine configuration plus the position cache.
///
/// Percent-valued fields (`trailing_stop_percent`, `stop_loss_percent`) are
/// user-facing percentages, so `2.0` means 2%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSettings {
    #[serde(default = "enabled")]
    pub auto_trading_enabled: bool,
    #[serde(default)]
    pub signal_tier: SignalTier,
    #[serde(default)]
    pub enabled_indicators: IndicatorSet,
    #[serde(default = "default_rsi_buy")]
    pub rsi_buy_level: f64,
    #[serde(default = "default_rsi_sell")]
    pub rsi_sell_level: f64,
    #[serde(default)]
    pub entry_advisory_enabled: bool,
    #[serde(default)]
    pub trailing_mode: TrailingMode,
    #[serde(default)]
    pub advisory_trailing_enabled: bool,
    #[serde(default = "default_trailing_percent")]
    pub trailing_stop_percent: f64,
    #[serde(default = "enabled")]
    pub stop_loss_enabled: bool,
    #[serde(default = "default_stop_loss_percent")]
    pub stop_loss_percent: f64,
    #[serde(default = "default_max_open_trades")]
    pub max_open_trades: usize,
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentSettings>,
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
}

const fn default_rsi_buy() -> f64 {
    35.0
}

const fn default_rsi_sell() -> f64 {
    65.0
}

const fn default_trailing_percent() -> f64 {
    1.0
}

const fn default_stop_loss_percent() -> f64 {
    2.0
}

const fn default_max_open_trades() -> usize {
    3
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            auto_trading_enabled: true,
            signal_tier: SignalTier::default(),
            enabled_indicators: IndicatorSet::default(),
            rsi_buy_level: default_rsi_buy(),
            rsi_sell_level: default_rsi_sell(),
            entry_advisory_enabled: false,
            trailing_mode: TrailingMode::default(),
            advisory_trailing_enabled: false,
            trailing_stop_percent: default_trailing_percent(),
            stop_loss_enabled: true,
            stop_loss_percent: default_stop_loss_percent(),
            max_open_trades: default_max_open_trades(),
            instruments: BTreeMap::new(),
            positions: BTreeMap::new(),
        }
    }
}

impl TradingSettings {
    /// Default settings with one entry per instrument of `universe`.
    #[must_use]
    pub fn for_universe(universe: &[Instrument]) -> Self {
        let mut settings = Self::default();
        settings.reconcile(universe);
        settings
    }

    /// Keys the instrument map by exactly the names in `universe`.
    ///
    /// Returns `true` when entries were added or dropped.
    pub fn reconcile(&mut self, universe: &[Instrument]) -> bool {
        let before = self.instruments.len();
        self.instruments
            .retain(|name, _| universe.iter().any(|i| &i.name == name));
        let mut changed = self.instruments.len() != before;

        for instrument in universe {
            if !self.instruments.contains_key(&instrument.name) {
                self.instruments
                    .insert(instrument.name.clone(), InstrumentSettings::default());
                changed = true;
            }
        }
        changed
    }

    /// Settings for `name`, or the defaults when it is not configured.
    #[must_use]
    pub fn instrument(&self, name: &str) -> InstrumentSettings {
        self.instruments.get(name).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn open_positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }
}
