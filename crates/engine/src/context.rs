use crate::retry::RetryPolicy;
use crate::settings_store::SettingsStore;
use crate::shutdown::Shutdown;
use auto_trade_core::{
    notify, AdvisoryService, CostModel, EngineConfig, Instrument, MarketGateway, NotifyLevel,
    Notifier,
};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Everything a loop needs, passed explicitly instead of held in globals.
///
/// The gateway slot starts empty and is filled once after login; loops skip
/// their cycle until then.
pub struct TradingContext {
    pub config: EngineConfig,
    pub universe: Vec<Instrument>,
    pub tz: Tz,
    pub store: Arc<SettingsStore>,
    pub notifier: Arc<dyn Notifier>,
    pub advisory: Option<Arc<dyn AdvisoryService>>,
    pub costs: CostModel,
    pub shutdown: Shutdown,
    gateway: OnceCell<Arc<dyn MarketGateway>>,
}

impl TradingContext {
    #[must_use]
    pub fn new(
        config: EngineConfig,
        universe: Vec<Instrument>,
        tz: Tz,
        store: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let costs = CostModel::new(config.commission);
        Self {
            config,
            universe,
            tz,
            store,
            notifier,
            advisory: None,
            costs,
            shutdown: Shutdown::new(),
            gateway: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_advisory(mut self, advisory: Arc<dyn AdvisoryService>) -> Self {
        self.advisory = Some(advisory);
        self
    }

    /// Fills the gateway slot. Returns `false` if it was already set.
    pub fn set_gateway(&self, gateway: Arc<dyn MarketGateway>) -> bool {
        self.gateway.set(gateway).is_ok()
    }

    #[must_use]
    pub fn gateway(&self) -> Option<Arc<dyn MarketGateway>> {
        self.gateway.get().cloned()
    }

    #[must_use]
    pub fn instrument_by_id(&self, id: &str) -> Option<&Instrument> {
        self.universe.iter().find(|i| i.id == id)
    }

    /// `true` for ids outside the universe, which carry no schedule.
    #[must_use]
    pub fn is_market_open(&self, instrument_id: &str) -> bool {
        self.instrument_by_id(instrument_id)
            .map_or(true, |i| i.is_market_open(self.tz))
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config)
    }

    pub async fn notify(&self, message: &str, level: NotifyLevel) {
        notify(self.notifier.as_ref(), message, level).await;
    }
}
