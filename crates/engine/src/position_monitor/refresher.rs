use crate::context::TradingContext;
use crate::runner::drive;
use anyhow::Result;
use auto_trade_core::{MarketGateway, Position};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Mirrors the gateway's position listing into the settings store.
pub struct PositionRefresher {
    ctx: Arc<TradingContext>,
}

impl PositionRefresher {
    #[must_use]
    pub const fn new(ctx: Arc<TradingContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self) {
        let interval = Duration::from_secs(self.ctx.config.refresh_interval_secs);
        drive(&self.ctx, "position refresher", Duration::ZERO, interval, || async {
            self.run_cycle().await.map(|_| ())
        })
        .await;
    }

    /// Replaces the cached positions with the gateway listing.
    ///
    /// Returns the number of cached positions, or `None` when the cycle was
    /// skipped or the listing failed and the cache was kept.
    ///
    /// # Errors
    /// Returns an error when the gateway refuses the session; other listing
    /// failures keep the cache.
    pub async fn run_cycle(&self) -> Result<Option<usize>> {
        let Some(gateway) = self.ctx.gateway() else {
            return Ok(None);
        };

        let listing = match gateway.get_open_positions().await {
            Ok(listing) => listing,
            Err(e) if e.is_auth() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Position listing failed, keeping cached positions");
                return Ok(None);
            }
        };

        let mut positions = BTreeMap::new();
        for position in listing {
            let position = self.complete(gateway.as_ref(), position).await;
            positions.insert(position.deal_id.clone(), position);
        }

        let count = positions.len();
        if let Err(e) = self.ctx.store.update(|s| s.positions = positions).await {
            warn!(error = %e, "Failed to persist refreshed positions");
        }
        debug!(count, "Positions refreshed");
        Ok(Some(count))
    }

    /// Fills instrument id and name the listing left out.
    async fn complete(&self, gateway: &dyn MarketGateway, mut position: Position) -> Position {
        if position.instrument_id.is_empty() {
            match gateway.get_position_details(&position.deal_id).await {
                Ok(details) => {
                    position.instrument_id = if details.market.instrument_id.is_empty() {
                        details.position.instrument_id
                    } else {
                        details.market.instrument_id
                    };
                    if position.instrument_name.is_empty() {
                        position.instrument_name = details.market.instrument_name;
                    }
                }
                Err(e) => {
                    warn!(deal_id = %position.deal_id, error = %e, "Position details unavailable");
                }
            }
        }

        if position.instrument_name.is_empty() {
            if let Some(instrument) = self.ctx.instrument_by_id(&position.instrument_id) {
                position.instrument_name = instrument.name.clone();
            }
        }
        position
    }
}
