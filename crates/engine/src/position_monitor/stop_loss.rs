use super::close_and_forget;
use crate::context::TradingContext;
use crate::retry::{fetch_quote, is_auth_failure};
use crate::runner::drive;
use anyhow::Result;
use auto_trade_core::{CostModel, NotifyLevel, Position, Quote};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Closes positions whose adverse move reaches the stop-loss percent.
pub struct StopLossMonitor {
    ctx: Arc<TradingContext>,
}

/// Fractional loss of `position` at `quote`, positive when losing.
#[must_use]
pub fn adverse_move(position: &Position, quote: &Quote) -> f64 {
    -CostModel::gross_move(
        position.direction,
        position.open_price,
        quote.mark_price(position.direction),
    )
}

impl StopLossMonitor {
    #[must_use]
    pub const fn new(ctx: Arc<TradingContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self) {
        let interval = Duration::from_secs(self.ctx.config.stop_loss_interval_secs);
        drive(&self.ctx, "stop-loss monitor", Duration::ZERO, interval, || async {
            self.run_cycle().await.map(|_| ())
        })
        .await;
    }

    /// Checks every open position once. Returns the deal ids closed.
    ///
    /// # Errors
    /// Returns an error when the gateway refuses the session; other
    /// per-position failures are logged and skipped.
    pub async fn run_cycle(&self) -> Result<Vec<String>> {
        let Some(gateway) = self.ctx.gateway() else {
            return Ok(Vec::new());
        };
        let settings = self.ctx.store.get_settings().await;
        if !settings.stop_loss_enabled {
            return Ok(Vec::new());
        }
        let limit = settings.stop_loss_percent / 100.0;

        let mut closed = Vec::new();
        for position in settings.open_positions() {
            if !self.ctx.is_market_open(&position.instrument_id) {
                continue;
            }
            let Some(quote) = fetch_quote(
                gateway.as_ref(),
                &position.instrument_id,
                self.ctx.retry_policy(),
            )
            .await?
            else {
                continue;
            };

            let loss = adverse_move(&position, &quote);
            debug!(deal_id = %position.deal_id, loss, limit, "Stop-loss check");
            if loss < limit {
                continue;
            }

            let why = format!("Stop-loss {:.2}%", loss * 100.0);
            match close_and_forget(&self.ctx, gateway.as_ref(), &position, &quote, &why).await {
                Ok(_) => closed.push(position.deal_id.clone()),
                Err(e) if is_auth_failure(&e) => return Err(e),
                Err(e) => {
                    warn!(deal_id = %position.deal_id, error = %format!("{e:#}"), "Stop-loss close failed");
                    self.ctx
                        .notify(&format!("Stop-loss close failed: {e:#}"), NotifyLevel::Error)
                        .await;
                }
            }
        }
        Ok(closed)
    }
}
