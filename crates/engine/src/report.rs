use crate::context::TradingContext;
use crate::runner::drive;
use anyhow::Result;
use auto_trade_core::{NotifyLevel, Position, Quote};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

/// Periodic summary of open positions sent through the notifier.
pub struct StatusReporter {
    ctx: Arc<TradingContext>,
}

impl StatusReporter {
    #[must_use]
    pub const fn new(ctx: Arc<TradingContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self) {
        let interval = Duration::from_secs(self.ctx.config.report_interval_secs);
        drive(&self.ctx, "status reporter", interval, interval, || async {
            if let Some(report) = self.compose().await? {
                self.ctx.notify(&report, NotifyLevel::Info).await;
            }
            Ok(())
        })
        .await;
    }

    /// Builds the summary, or `None` while the gateway is not ready.
    ///
    /// # Errors
    /// Currently infallible; missing quotes are reported inline.
    pub async fn compose(&self) -> Result<Option<String>> {
        let Some(gateway) = self.ctx.gateway() else {
            return Ok(None);
        };
        let positions = self.ctx.store.get_settings().await.open_positions();
        if positions.is_empty() {
            return Ok(Some("Status: no open positions".to_string()));
        }

        let mut report = format!("Status: {} open position(s)", positions.len());
        for position in &positions {
            let quote = gateway
                .get_prices(&position.instrument_id)
                .await
                .ok()
                .flatten()
                .filter(Quote::is_valid);
            report.push('\n');
            self.describe(&mut report, position, quote.as_ref());
        }
        Ok(Some(report))
    }

    fn describe(&self, out: &mut String, position: &Position, quote: Option<&Quote>) {
        let name = if position.instrument_name.is_empty() {
            &position.instrument_id
        } else {
            &position.instrument_name
        };
        let _ = write!(
            out,
            "{name} {} size {} @ {}",
            position.direction, position.size, position.open_price
        );
        match quote {
            Some(quote) => {
                let net = self.ctx.costs.net_profit(
                    position.direction,
                    position.open_price,
                    quote.mark_price(position.direction),
                    quote,
                );
                let _ = write!(out, ", net {:+.2}%", net * 100.0);
            }
            None => out.push_str(", no quote"),
        }
    }
}
