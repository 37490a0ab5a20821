use crate::advisory::{AdvisoryDecision, EntryRequest, ExitAdvice, ExitRequest};
use crate::error::{AdvisoryError, GatewayError};
use crate::instrument::LotRules;
use crate::market::{Direction, PriceBar, Quote, Resolution};
use crate::position::{CloseConfirmation, DealConfirmation, Position, PositionDetails};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Brokerage access used by the scheduler and monitors.
///
/// Implementations normalize every response into the crate's own types, so
/// callers never see gateway field-name variants.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    async fn login(&self) -> Result<(), GatewayError>;

    /// Latest quote, or `None` when no usable two-sided price is known.
    async fn get_prices(&self, instrument_id: &str) -> Result<Option<Quote>, GatewayError>;

    /// Bars ordered oldest to newest.
    async fn get_historical_prices(
        &self,
        instrument_id: &str,
        resolution: Resolution,
        count: usize,
    ) -> Result<Vec<PriceBar>, GatewayError>;

    async fn open_position(
        &self,
        instrument_id: &str,
        direction: Direction,
        size: Decimal,
    ) -> Result<DealConfirmation, GatewayError>;

    /// Closes `deal_id`; `direction` is the direction the position was opened in.
    async fn close_position(
        &self,
        deal_id: &str,
        direction: Direction,
        instrument_id: &str,
        size: Decimal,
    ) -> Result<CloseConfirmation, GatewayError>;

    async fn get_open_positions(&self) -> Result<Vec<Position>, GatewayError>;

    async fn get_position_details(&self, deal_id: &str) -> Result<PositionDetails, GatewayError>;

    /// Live lot rules, when the gateway publishes them.
    async fn lot_rules(&self, _instrument_id: &str) -> Result<Option<LotRules>, GatewayError> {
        Ok(None)
    }
}

/// Optional external approve/reject gate.
#[async_trait]
pub trait AdvisoryService: Send + Sync {
    async fn approve(&self, request: &EntryRequest) -> Result<AdvisoryDecision, AdvisoryError>;

    async fn advise_exit(&self, request: &ExitRequest) -> Result<ExitAdvice, AdvisoryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(tag)
    }
}

/// Outbound status channel. Delivery is best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_status(&self, message: &str, level: NotifyLevel) -> anyhow::Result<()>;
}

/// Sends a status message and logs delivery failures without retrying.
pub async fn notify(notifier: &dyn Notifier, message: &str, level: NotifyLevel) {
    if let Err(e) = notifier.send_status(message, level).await {
        tracing::warn!(level = %level, error = %e, "Failed to deliver notification");
    }
}
