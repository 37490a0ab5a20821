pub mod advisory;
pub mod config;
pub mod config_loader;
pub mod cost;
pub mod error;
pub mod instrument;
pub mod market;
pub mod position;
pub mod position_sizing;
pub mod quote_cache;
pub mod settings;
pub mod signal;
pub mod traits;

pub use advisory::{AdvisoryDecision, EntryRequest, ExitAdvice, ExitRequest, Verdict};
pub use config::{
    AccountType, AdvisoryConfig, AppConfig, CapitalConfig, EngineConfig, MarketConfig,
    NotificationConfig, StorageConfig,
};
pub use config_loader::ConfigLoader;
pub use cost::CostModel;
pub use error::{AdvisoryError, GatewayError, PersistenceError};
pub use instrument::{default_universe, Instrument, LotRules, MarketHours};
pub use market::{Direction, PriceBar, Quote, Resolution};
pub use position::{
    count_open, CloseConfirmation, DealConfirmation, MarketSnapshot, Position, PositionDetails,
};
pub use position_sizing::{round_to_step, size_order};
pub use quote_cache::QuoteCache;
pub use settings::{IndicatorSet, InstrumentSettings, SignalTier, TradingSettings, TrailingMode};
pub use signal::IndicatorSnapshot;
pub use traits::{notify, AdvisoryService, MarketGateway, NotifyLevel, Notifier};
