use crate::client::CapitalClient;
use crate::normalize;
use async_trait::async_trait;
use auto_trade_core::market::to_f64;
use auto_trade_core::{
    CloseConfirmation, DealConfirmation, Direction, GatewayError, LotRules, MarketGateway,
    Position, PositionDetails, PriceBar, Quote, QuoteCache, Resolution,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// [`MarketGateway`] over the brokerage REST API.
///
/// Quotes come from the streaming cache while fresh and from the market
/// snapshot endpoint otherwise.
pub struct CapitalGateway {
    client: Arc<CapitalClient>,
    quotes: QuoteCache,
    max_quote_age: Duration,
}

impl CapitalGateway {
    pub const DEFAULT_MAX_QUOTE_AGE: Duration = Duration::from_secs(120);

    #[must_use]
    pub const fn new(client: Arc<CapitalClient>, quotes: QuoteCache) -> Self {
        Self {
            client,
            quotes,
            max_quote_age: Self::DEFAULT_MAX_QUOTE_AGE,
        }
    }

    #[must_use]
    pub fn with_max_quote_age(mut self, max_quote_age: Duration) -> Self {
        self.max_quote_age = max_quote_age;
        self
    }

    fn is_fresh(&self, quote: &Quote) -> bool {
        // A timestamp ahead of the local clock counts as fresh
        (Utc::now() - quote.timestamp)
            .to_std()
            .map_or(true, |age| age <= self.max_quote_age)
    }

    #[must_use]
    pub fn client(&self) -> Arc<CapitalClient> {
        Arc::clone(&self.client)
    }

    #[must_use]
    pub fn quotes(&self) -> QuoteCache {
        self.quotes.clone()
    }

    /// Resolves an order reference to the id of the deal it opened.
    ///
    /// `Ok(None)` when the confirmation endpoint cannot tell.
    async fn confirm(&self, reference: &str) -> Result<Option<String>, GatewayError> {
        match self.client.get(&format!("/api/v1/confirms/{reference}")).await {
            Ok(payload) => {
                if payload.get("dealStatus").and_then(|s| s.as_str()) == Some("REJECTED") {
                    let reason = payload
                        .get("reason")
                        .and_then(|r| r.as_str())
                        .unwrap_or("no reason given");
                    return Err(GatewayError::Rejected {
                        status: 200,
                        message: format!("Deal {reference} rejected: {reason}"),
                    });
                }
                Ok(normalize::deal_reference(&payload))
            }
            Err(e) => {
                debug!(reference, error = %e, "Deal confirmation unavailable");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl MarketGateway for CapitalGateway {
    async fn login(&self) -> Result<(), GatewayError> {
        self.client.login().await.map(|_| ())
    }

    async fn get_prices(&self, instrument_id: &str) -> Result<Option<Quote>, GatewayError> {
        if let Some(quote) = self.quotes.get(instrument_id).await {
            if self.is_fresh(&quote) {
                return Ok(Some(quote));
            }
            debug!(
                instrument = instrument_id,
                quoted_at = %quote.timestamp,
                "Streamed quote is stale, fetching snapshot"
            );
        }

        let payload = self
            .client
            .get(&format!("/api/v1/markets/{instrument_id}"))
            .await?;
        let quote = normalize::snapshot_quote(&payload);
        if let Some(quote) = quote {
            self.quotes.update(instrument_id, quote).await;
        }
        Ok(quote)
    }

    async fn get_historical_prices(
        &self,
        instrument_id: &str,
        resolution: Resolution,
        count: usize,
    ) -> Result<Vec<PriceBar>, GatewayError> {
        let payload = self
            .client
            .get_with_query(
                &format!("/api/v1/prices/{instrument_id}"),
                &[
                    ("resolution", resolution.as_str().to_string()),
                    ("max", count.to_string()),
                ],
            )
            .await?;
        Ok(normalize::bars(&payload))
    }

    async fn open_position(
        &self,
        instrument_id: &str,
        direction: Direction,
        size: Decimal,
    ) -> Result<DealConfirmation, GatewayError> {
        let body = json!({
            "epic": instrument_id,
            "direction": direction.as_str(),
            "size": to_f64(size),
            "orderType": "MARKET",
            "guaranteedStop": false,
            "forceOpen": true,
        });

        let response = self.client.post("/api/v1/positions", body).await?;
        let reference = normalize::deal_reference(&response).ok_or_else(|| {
            GatewayError::Decode(format!("Order response carried no deal reference: {response}"))
        })?;

        let deal_id = self.confirm(&reference).await?.unwrap_or(reference);
        info!(
            instrument = instrument_id,
            direction = %direction,
            size = %size,
            deal_id = %deal_id,
            "Position opened"
        );
        Ok(DealConfirmation { deal_id })
    }

    async fn close_position(
        &self,
        deal_id: &str,
        direction: Direction,
        instrument_id: &str,
        size: Decimal,
    ) -> Result<CloseConfirmation, GatewayError> {
        let details = self
            .client
            .delete(&format!("/api/v1/positions/{deal_id}"))
            .await?;

        let success = normalize::close_accepted(&details);
        if success {
            info!(
                deal_id,
                instrument = instrument_id,
                closing_direction = %direction.opposite(),
                size = %size,
                "Position closed"
            );
        } else {
            warn!(deal_id, instrument = instrument_id, response = %details, "Close not accepted");
        }
        Ok(CloseConfirmation { success, details })
    }

    async fn get_open_positions(&self) -> Result<Vec<Position>, GatewayError> {
        let payload = self.client.get("/api/v1/positions").await?;
        Ok(normalize::positions(&payload))
    }

    async fn get_position_details(&self, deal_id: &str) -> Result<PositionDetails, GatewayError> {
        let payload = self
            .client
            .get(&format!("/api/v1/positions/{deal_id}"))
            .await?;
        normalize::position_details(&payload)
            .ok_or_else(|| GatewayError::Decode(format!("Unreadable position {deal_id}")))
    }

    async fn lot_rules(&self, instrument_id: &str) -> Result<Option<LotRules>, GatewayError> {
        let payload = self
            .client
            .get(&format!("/api/v1/markets/{instrument_id}"))
            .await?;
        Ok(normalize::lot_rules(&payload))
    }
}
