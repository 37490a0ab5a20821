use async_trait::async_trait;
use auto_trade_core::{
    CloseConfirmation, CostModel, DealConfirmation, Direction, GatewayError, LotRules,
    MarketGateway, MarketSnapshot, Position, PositionDetails, PriceBar, Quote, Resolution,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::info;

/// Paper trading gateway.
///
/// Market data comes from the wrapped gateway; orders never leave the
/// process. Opens fill at the entry side of the current quote and closes
/// realize P/L against the mark side.
///
/// # Safety
///
/// No order, close or position-listing request reaches the inner gateway.
pub struct PaperGateway<G> {
    inner: G,
    positions: Mutex<BTreeMap<String, Position>>,
    next_deal: AtomicU64,
}

impl<G: MarketGateway> PaperGateway<G> {
    #[must_use]
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            positions: Mutex::new(BTreeMap::new()),
            next_deal: AtomicU64::new(1),
        }
    }

    async fn current_quote(&self, instrument_id: &str) -> Result<Quote, GatewayError> {
        self.inner
            .get_prices(instrument_id)
            .await?
            .ok_or_else(|| GatewayError::Transient(format!("No quote for {instrument_id}")))
    }

    fn not_found(deal_id: &str) -> GatewayError {
        GatewayError::Rejected {
            status: 404,
            message: format!("Unknown paper deal {deal_id}"),
        }
    }
}

#[async_trait]
impl<G: MarketGateway> MarketGateway for PaperGateway<G> {
    async fn login(&self) -> Result<(), GatewayError> {
        self.inner.login().await
    }

    async fn get_prices(&self, instrument_id: &str) -> Result<Option<Quote>, GatewayError> {
        self.inner.get_prices(instrument_id).await
    }

    async fn get_historical_prices(
        &self,
        instrument_id: &str,
        resolution: Resolution,
        count: usize,
    ) -> Result<Vec<PriceBar>, GatewayError> {
        self.inner
            .get_historical_prices(instrument_id, resolution, count)
            .await
    }

    async fn open_position(
        &self,
        instrument_id: &str,
        direction: Direction,
        size: Decimal,
    ) -> Result<DealConfirmation, GatewayError> {
        let quote = self.current_quote(instrument_id).await?;
        let deal_id = format!("PAPER-{}", self.next_deal.fetch_add(1, Ordering::Relaxed));
        let position = Position {
            deal_id: deal_id.clone(),
            instrument_id: instrument_id.to_string(),
            instrument_name: instrument_id.to_string(),
            direction,
            open_price: quote.entry_price(direction),
            size,
            opened_at: Utc::now(),
        };

        info!(
            deal_id = %deal_id,
            instrument = instrument_id,
            direction = %direction,
            price = %position.open_price,
            size = %size,
            "Paper position opened"
        );
        self.positions.lock().await.insert(deal_id.clone(), position);
        Ok(DealConfirmation { deal_id })
    }

    async fn close_position(
        &self,
        deal_id: &str,
        _direction: Direction,
        instrument_id: &str,
        _size: Decimal,
    ) -> Result<CloseConfirmation, GatewayError> {
        let quote = self.current_quote(instrument_id).await?;
        let position = self
            .positions
            .lock()
            .await
            .remove(deal_id)
            .ok_or_else(|| Self::not_found(deal_id))?;

        let exit_price = quote.mark_price(position.direction);
        let pnl = CostModel::realized_pnl(
            position.direction,
            position.open_price,
            exit_price,
            position.size,
        );
        info!(deal_id, exit_price = %exit_price, pnl = %pnl, "Paper position closed");

        Ok(CloseConfirmation {
            success: true,
            details: json!({
                "dealId": deal_id,
                "level": exit_price.to_string(),
                "profit": pnl.to_string(),
            }),
        })
    }

    async fn get_open_positions(&self) -> Result<Vec<Position>, GatewayError> {
        Ok(self.positions.lock().await.values().cloned().collect())
    }

    async fn get_position_details(&self, deal_id: &str) -> Result<PositionDetails, GatewayError> {
        let position = self
            .positions
            .lock()
            .await
            .get(deal_id)
            .cloned()
            .ok_or_else(|| Self::not_found(deal_id))?;
        let quote = self.inner.get_prices(&position.instrument_id).await?;

        let market = MarketSnapshot {
            instrument_id: position.instrument_id.clone(),
            instrument_name: position.instrument_name.clone(),
            bid: quote.map(|q| q.buy),
            offer: quote.map(|q| q.sell),
            status: Some("TRADEABLE".to_string()),
        };
        Ok(PositionDetails { position, market })
    }

    async fn lot_rules(&self, instrument_id: &str) -> Result<Option<LotRules>, GatewayError> {
        self.inner.lot_rules(instrument_id).await
    }
}
