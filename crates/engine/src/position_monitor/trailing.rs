use super::close_and_forget;
use crate::context::TradingContext;
use crate::retry::{fetch_quote, is_auth_failure};
use crate::runner::drive;
use anyhow::Result;
use auto_trade_core::market::to_f64;
use auto_trade_core::{
    CostModel, ExitAdvice, ExitRequest, IndicatorSnapshot, MarketGateway, NotifyLevel, Position,
    Quote, TradingSettings, TrailingMode,
};
use auto_trade_signals::{compute_snapshot, fetch_bars, TierProfile};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of weighing one position against its trailing requirement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingCheck {
    /// Favourable move at the mark side, as a fraction.
    pub favourable_move: f64,
    pub required: f64,
}

impl TrailingCheck {
    #[must_use]
    pub fn evaluate(
        costs: &CostModel,
        settings: &TradingSettings,
        position: &Position,
        quote: &Quote,
    ) -> Self {
        let favourable_move = CostModel::gross_move(
            position.direction,
            position.open_price,
            quote.mark_price(position.direction),
        );
        let required = costs.required_trailing(
            settings.trailing_mode,
            CostModel::spread(quote),
            settings.trailing_stop_percent,
        );
        Self {
            favourable_move,
            required,
        }
    }

    #[must_use]
    pub fn triggered(&self) -> bool {
        self.favourable_move >= self.required
    }
}

/// Closes positions once their favourable move covers costs plus the
/// configured profit, optionally deferring to the advisory service.
pub struct TrailingStopMonitor {
    ctx: Arc<TradingContext>,
    /// Last advisory call per deal id.
    last_advice: Mutex<HashMap<String, Instant>>,
}

impl TrailingStopMonitor {
    #[must_use]
    pub fn new(ctx: Arc<TradingContext>) -> Self {
        Self {
            ctx,
            last_advice: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run(self) {
        let initial = Duration::from_secs(self.ctx.config.trailing_initial_delay_secs);
        let interval = Duration::from_secs(self.ctx.config.trailing_interval_secs);
        drive(&self.ctx, "trailing-stop monitor", initial, interval, || async {
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
        let positions = settings.open_positions();
        self.forget_closed(&positions).await;

        let mut closed = Vec::new();
        for position in positions {
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

            let check = TrailingCheck::evaluate(&self.ctx.costs, &settings, &position, &quote);
            debug!(
                deal_id = %position.deal_id,
                favourable_move = check.favourable_move,
                required = check.required,
                "Trailing check"
            );

            let advisory = settings.trailing_mode == TrailingMode::Advisory
                && settings.advisory_trailing_enabled;
            let should_close = if advisory {
                self.advised_close(gateway.as_ref(), &position, &quote)
                    .await
                    .unwrap_or_else(|| check.triggered())
            } else {
                check.triggered()
            };
            if !should_close {
                continue;
            }

            let why = format!("Trailing stop {:+.2}%", check.favourable_move * 100.0);
            match close_and_forget(&self.ctx, gateway.as_ref(), &position, &quote, &why).await {
                Ok(_) => {
                    self.last_advice.lock().await.remove(&position.deal_id);
                    closed.push(position.deal_id.clone());
                }
                Err(e) if is_auth_failure(&e) => return Err(e),
                Err(e) => {
                    warn!(deal_id = %position.deal_id, error = %format!("{e:#}"), "Trailing close failed");
                    self.ctx
                        .notify(&format!("Trailing-stop close failed: {e:#}"), NotifyLevel::Error)
                        .await;
                }
            }
        }
        Ok(closed)
    }

    /// Asks the advisory service whether to close.
    ///
    /// `None` means "use the plain threshold": no service, rate limited,
    /// below break-even, ambiguous answer or a failed call.
    async fn advised_close(
        &self,
        gateway: &dyn MarketGateway,
        position: &Position,
        quote: &Quote,
    ) -> Option<bool> {
        let advisory = self.ctx.advisory.as_ref()?;
        let costs = &self.ctx.costs;
        let mark = quote.mark_price(position.direction);
        let net_profit = costs.net_profit(position.direction, position.open_price, mark, quote);
        if net_profit < costs.min_profit_to_break_even(quote) {
            return None;
        }

        {
            let mut last = self.last_advice.lock().await;
            let now = Instant::now();
            if let Some(at) = last.get(&position.deal_id) {
                if now.duration_since(*at) < self.ctx.config.advisory_min_interval() {
                    return None;
                }
            }
            last.insert(position.deal_id.clone(), now);
        }

        let indicators = fetch_bars(gateway, &position.instrument_id, &TierProfile::EXIT_REVIEW)
            .await
            .and_then(|series| compute_snapshot(&series.closes))
            .unwrap_or_else(|| IndicatorSnapshot {
                last_price: to_f64(mark),
                ..IndicatorSnapshot::default()
            });

        let request = ExitRequest {
            instrument_name: position.instrument_name.clone(),
            instrument_id: position.instrument_id.clone(),
            direction: position.direction,
            quote: *quote,
            indicators,
            open_price: to_f64(position.open_price),
            current_price: to_f64(mark),
            net_profit,
            trading_cost: costs.trading_cost(quote),
        };

        match advisory.advise_exit(&request).await {
            Ok(ExitAdvice::Close { reason }) => {
                info!(deal_id = %position.deal_id, reason = %reason, "Advisory recommends close");
                Some(true)
            }
            Ok(ExitAdvice::Hold {
                net_take_profit_pct,
                confidence_pct,
                reason,
            }) => {
                info!(
                    deal_id = %position.deal_id,
                    net_profit_pct = net_profit * 100.0,
                    net_take_profit_pct,
                    confidence_pct,
                    reason = %reason,
                    "Advisory recommends hold"
                );
                Some(false)
            }
            Ok(ExitAdvice::Ambiguous { raw }) => {
                debug!(deal_id = %position.deal_id, raw = %raw, "Ambiguous exit advice");
                None
            }
            Err(e) => {
                warn!(deal_id = %position.deal_id, error = %e, "Exit advice failed");
                None
            }
        }
    }

    async fn forget_closed(&self, open: &[Position]) {
        self.last_advice
            .lock()
            .await
            .retain(|deal, _| open.iter().any(|p| &p.deal_id == deal));
    }
}
