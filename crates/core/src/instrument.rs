use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trading-hours class of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarketHours {
    Crypto,
    Stocks,
    ForexCommodities,
    #[default]
    AlwaysOpen,
}

impl MarketHours {
    /// Whether the market is open at `now`, evaluated in the `tz` wall clock.
    ///
    /// Session windows are half-open `[start, end)` hours of the local day.
    #[must_use]
    pub fn is_open_at<T: TimeZone>(self, now: DateTime<T>, tz: Tz) -> bool {
        let local = now.with_timezone(&tz);
        let hour = local.hour();
        let in_window = |start: u32, end: u32| hour >= start && hour < end;

        match self {
            Self::Crypto | Self::AlwaysOpen => true,
            Self::Stocks => match local.weekday() {
                Weekday::Mon => in_window(13, 24),
                Weekday::Tue | Weekday::Wed | Weekday::Thu | Weekday::Fri => {
                    in_window(0, 5) || in_window(13, 24)
                }
                Weekday::Sat => in_window(0, 2),
                Weekday::Sun => false,
            },
            Self::ForexCommodities => match local.weekday() {
                Weekday::Mon => in_window(3, 24),
                Weekday::Tue | Weekday::Wed | Weekday::Thu | Weekday::Fri => {
                    in_window(0, 2) || in_window(3, 24)
                }
                Weekday::Sat => in_window(0, 2),
                Weekday::Sun => false,
            },
        }
    }

    #[must_use]
    pub fn is_open_now(self, tz: Tz) -> bool {
        self.is_open_at(Utc::now(), tz)
    }
}

/// Order-size constraints published by the gateway for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotRules {
    pub min: Decimal,
    pub step: Decimal,
    pub max: Decimal,
}

impl Default for LotRules {
    fn default() -> Self {
        Self {
            min: Decimal::new(2, 4),
            step: Decimal::new(1, 4),
            max: Decimal::ONE_THOUSAND,
        }
    }
}

/// A tradable asset in the configured universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Display name, also the key of per-instrument settings.
    pub name: String,
    /// Gateway identifier (epic).
    pub id: String,
    #[serde(default)]
    pub market_hours: MarketHours,
    #[serde(default)]
    pub lot: LotRules,
}

impl Instrument {
    pub fn new(name: impl Into<String>, id: impl Into<String>, market_hours: MarketHours) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            market_hours,
            lot: LotRules::default(),
        }
    }

    #[must_use]
    pub fn with_lot(mut self, lot: LotRules) -> Self {
        self.lot = lot;
        self
    }

    #[must_use]
    pub fn is_market_open(&self, tz: Tz) -> bool {
        self.market_hours.is_open_now(tz)
    }
}

/// The universe traded when no instruments are configured.
#[must_use]
pub fn default_universe() -> Vec<Instrument> {
    use MarketHours::{Crypto, ForexCommodities, Stocks};

    let whole = LotRules {
        min: Decimal::ONE,
        step: Decimal::ONE,
        max: Decimal::ONE_THOUSAND,
    };

    vec![
        Instrument::new("Tesla", "TSLA", Stocks).with_lot(whole),
        Instrument::new("Apple", "AAPL", Stocks).with_lot(whole),
        Instrument::new("Nvidia", "NVDA", Stocks).with_lot(whole),
        Instrument::new("Coca-Cola", "KO", Stocks).with_lot(whole),
        Instrument::new("Bitcoin", "BTCUSD", Crypto),
        Instrument::new("Ethereum", "ETHUSD", Crypto).with_lot(LotRules {
            min: Decimal::new(1, 3),
            step: Decimal::new(1, 3),
            max: Decimal::ONE_THOUSAND,
        }),
        Instrument::new("Gold", "GOLD", ForexCommodities).with_lot(LotRules {
            min: Decimal::new(1, 2),
            step: Decimal::new(1, 2),
            max: Decimal::ONE_THOUSAND,
        }),
        Instrument::new("Crude Oil", "OIL_CRUDE", ForexCommodities).with_lot(whole),
        Instrument::new("Natural Gas", "NATURALGAS", ForexCommodities).with_lot(whole),
        Instrument::new("USD/JPY", "USDJPY", ForexCommodities).with_lot(LotRules {
            min: Decimal::ONE_HUNDRED,
            step: Decimal::ONE_HUNDRED,
            max: Decimal::from(1_000_000),
        }),
        Instrument::new("EUR/USD", "EURUSD", ForexCommodities).with_lot(LotRules {
            min: Decimal::ONE_HUNDRED,
            step: Decimal::ONE_HUNDRED,
            max: Decimal::from(1_000_000),
        }),
    ]
}
