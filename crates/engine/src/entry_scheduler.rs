//! Periodic entry scan.
//!
//! Each cycle walks the instrument universe, turns signals into orders and
//! records every decision in a [`CycleReport`].

use crate::context::TradingContext;
use crate::retry::fetch_quote;
use crate::runner::drive;
use anyhow::Result;
use auto_trade_core::{
    count_open, size_order, Direction, EntryRequest, GatewayError, IndicatorSnapshot,
    Instrument, MarketGateway, NotifyLevel, Position, Quote, SignalTier, TradingSettings,
};
use auto_trade_signals::{RsiThresholds, SignalEngine};
use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a cycle did not scan at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleReason {
    GatewayUnavailable,
    AutoTradingDisabled,
    GlobalCap { open: usize, max: usize },
}

/// Why one instrument was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Inactive,
    MarketClosed,
    InstrumentCap,
    GlobalCap,
    NoQuote,
    NoSignal,
    DirectionDisabled,
    DuplicateDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Skipped {
        instrument: String,
        reason: SkipReason,
    },
    /// The advisory gate said no (or could not be asked).
    Rejected {
        instrument: String,
        direction: Direction,
        reason: String,
    },
    Submitted {
        instrument: String,
        direction: Direction,
        deal_id: String,
        size: Decimal,
    },
    Failed {
        instrument: String,
        direction: Direction,
        error: String,
    },
}

impl EntryOutcome {
    #[must_use]
    pub fn instrument(&self) -> &str {
        match self {
            Self::Skipped { instrument, .. }
            | Self::Rejected { instrument, .. }
            | Self::Submitted { instrument, .. }
            | Self::Failed { instrument, .. } => instrument,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    Idle(IdleReason),
    Scanned(Vec<EntryOutcome>),
}

impl CycleReport {
    #[must_use]
    pub fn outcomes(&self) -> &[EntryOutcome] {
        match self {
            Self::Idle(_) => &[],
            Self::Scanned(outcomes) => outcomes,
        }
    }

    #[must_use]
    pub fn submitted(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|o| matches!(o, EntryOutcome::Submitted { .. }))
            .count()
    }
}

pub struct EntryScheduler {
    ctx: Arc<TradingContext>,
}

impl EntryScheduler {
    #[must_use]
    pub const fn new(ctx: Arc<TradingContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self) {
        let interval = self.ctx.config.entry_interval();
        drive(&self.ctx, "entry scheduler", Duration::ZERO, interval, || async {
            let report = self.run_cycle().await?;
            if let CycleReport::Idle(reason) = &report {
                debug!(reason = ?reason, "Entry cycle idle");
            }
            Ok(())
        })
        .await;
    }

    /// Runs one scan over the universe.
    ///
    /// # Errors
    /// Returns an error when the gateway refuses the session; every other
    /// failure is handled per instrument.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let Some(gateway) = self.ctx.gateway() else {
            return Ok(CycleReport::Idle(IdleReason::GatewayUnavailable));
        };

        let settings = self.ctx.store.get_settings().await;
        if !settings.auto_trading_enabled {
            return Ok(CycleReport::Idle(IdleReason::AutoTradingDisabled));
        }

        let mut open = self.open_positions(gateway.as_ref(), &settings).await?;
        if open.len() >= settings.max_open_trades {
            return Ok(CycleReport::Idle(IdleReason::GlobalCap {
                open: open.len(),
                max: settings.max_open_trades,
            }));
        }

        let engine = SignalEngine::new(RsiThresholds {
            buy_below: settings.rsi_buy_level,
            sell_above: settings.rsi_sell_level,
        });

        let mut outcomes = Vec::with_capacity(self.ctx.universe.len());
        for instrument in &self.ctx.universe {
            if self.ctx.shutdown.is_triggered() {
                break;
            }
            if open.len() >= settings.max_open_trades {
                outcomes.push(skipped(instrument, SkipReason::GlobalCap));
                continue;
            }

            let outcome = self
                .scan_instrument(gateway.as_ref(), &engine, &settings, instrument, &open)
                .await?;
            if let EntryOutcome::Submitted {
                direction,
                deal_id,
                size,
                ..
            } = &outcome
            {
                open.push(Position {
                    deal_id: deal_id.clone(),
                    instrument_id: instrument.id.clone(),
                    instrument_name: instrument.name.clone(),
                    direction: *direction,
                    open_price: Decimal::ZERO,
                    size: *size,
                    opened_at: Utc::now(),
                });
            }
            outcomes.push(outcome);
        }

        Ok(CycleReport::Scanned(outcomes))
    }

    /// Gateway listing, or the persisted cache when the gateway cannot answer.
    async fn open_positions(
        &self,
        gateway: &dyn MarketGateway,
        settings: &TradingSettings,
    ) -> Result<Vec<Position>, GatewayError> {
        match gateway.get_open_positions().await {
            Ok(positions) => Ok(positions),
            Err(e) if e.is_auth() => Err(e),
            Err(e) => {
                warn!(error = %e, "Position listing failed, using cached positions");
                Ok(settings.open_positions())
            }
        }
    }

    async fn scan_instrument(
        &self,
        gateway: &dyn MarketGateway,
        engine: &SignalEngine,
        settings: &TradingSettings,
        instrument: &Instrument,
        open: &[Position],
    ) -> Result<EntryOutcome, GatewayError> {
        let switches = settings.instrument(&instrument.name);
        if !switches.active {
            return Ok(skipped(instrument, SkipReason::Inactive));
        }
        if !instrument.is_market_open(self.ctx.tz) {
            return Ok(skipped(instrument, SkipReason::MarketClosed));
        }
        if count_open(open, &instrument.id, None) >= switches.max_trades {
            return Ok(skipped(instrument, SkipReason::InstrumentCap));
        }

        let Some(quote) = fetch_quote(gateway, &instrument.id, self.ctx.retry_policy()).await?
        else {
            return Ok(skipped(instrument, SkipReason::NoQuote));
        };

        let signal = engine
            .evaluate(
                gateway,
                &instrument.id,
                settings.signal_tier,
                &settings.enabled_indicators,
            )
            .await;
        let Some(direction) = signal.direction else {
            return Ok(skipped(instrument, SkipReason::NoSignal));
        };

        let allowed = match direction {
            Direction::Buy => switches.buy,
            Direction::Sell => switches.sell,
        };
        if !allowed {
            return Ok(skipped(instrument, SkipReason::DirectionDisabled));
        }
        if count_open(open, &instrument.id, Some(direction)) > 0 {
            debug!(instrument = %instrument.name, direction = %direction, "Same-direction position already open");
            return Ok(skipped(instrument, SkipReason::DuplicateDirection));
        }

        if settings.entry_advisory_enabled && settings.signal_tier != SignalTier::Test {
            let snapshot = signal.snapshot.unwrap_or_default();
            if let Err(reason) = self.gate(instrument, direction, quote, snapshot).await {
                self.ctx
                    .notify(
                        &format!("{} {direction} rejected by advisory: {reason}", instrument.name),
                        NotifyLevel::Warning,
                    )
                    .await;
                return Ok(EntryOutcome::Rejected {
                    instrument: instrument.name.clone(),
                    direction,
                    reason,
                });
            }
        }

        Ok(self
            .submit(gateway, instrument, direction, quote, switches.trade_amount_usd)
            .await)
    }

    /// `Err(reason)` unless the advisory service approves.
    async fn gate(
        &self,
        instrument: &Instrument,
        direction: Direction,
        quote: Quote,
        indicators: IndicatorSnapshot,
    ) -> Result<(), String> {
        let Some(advisory) = &self.ctx.advisory else {
            return Err("advisory service not configured".to_string());
        };

        let request = EntryRequest {
            instrument_name: instrument.name.clone(),
            instrument_id: instrument.id.clone(),
            direction,
            quote,
            indicators,
            trading_cost: self.ctx.costs.trading_cost(&quote),
            break_even: self.ctx.costs.min_profit_to_break_even(&quote),
        };

        match advisory.approve(&request).await {
            Ok(decision) if decision.is_approved() => Ok(()),
            Ok(decision) => Err(decision.reason),
            Err(e) => {
                warn!(instrument = %instrument.name, error = %e, "Advisory unavailable, rejecting");
                Err(format!("advisory unavailable: {e}"))
            }
        }
    }

    async fn submit(
        &self,
        gateway: &dyn MarketGateway,
        instrument: &Instrument,
        direction: Direction,
        quote: Quote,
        amount_usd: f64,
    ) -> EntryOutcome {
        let lot = match gateway.lot_rules(&instrument.id).await {
            Ok(Some(rules)) => rules,
            Ok(None) => instrument.lot,
            Err(e) => {
                debug!(instrument = %instrument.id, error = %e, "Lot rules unavailable, using configured");
                instrument.lot
            }
        };
        let price = quote.entry_price(direction);
        let amount = Decimal::from_f64(amount_usd).unwrap_or(Decimal::ZERO);
        let size = size_order(amount, price, &lot);

        match gateway.open_position(&instrument.id, direction, size).await {
            Ok(confirmation) => {
                let position = Position {
                    deal_id: confirmation.deal_id.clone(),
                    instrument_id: instrument.id.clone(),
                    instrument_name: instrument.name.clone(),
                    direction,
                    open_price: price,
                    size,
                    opened_at: Utc::now(),
                };
                if let Err(e) = self
                    .ctx
                    .store
                    .update(|s| {
                        s.positions.insert(position.deal_id.clone(), position.clone());
                    })
                    .await
                {
                    warn!(deal_id = %confirmation.deal_id, error = %e, "Failed to persist new position");
                }

                info!(
                    instrument = %instrument.name,
                    direction = %direction,
                    size = %size,
                    price = %price,
                    deal_id = %confirmation.deal_id,
                    "Order submitted"
                );
                self.ctx
                    .notify(
                        &format!(
                            "Opened {direction} {} size {size} at {price}",
                            instrument.name
                        ),
                        NotifyLevel::Success,
                    )
                    .await;

                EntryOutcome::Submitted {
                    instrument: instrument.name.clone(),
                    direction,
                    deal_id: confirmation.deal_id,
                    size,
                }
            }
            Err(e) => {
                warn!(instrument = %instrument.name, direction = %direction, error = %e, "Order failed");
                self.ctx
                    .notify(
                        &format!("Failed to open {direction} {}: {e}", instrument.name),
                        NotifyLevel::Error,
                    )
                    .await;
                EntryOutcome::Failed {
                    instrument: instrument.name.clone(),
                    direction,
                    error: e.to_string(),
                }
            }
        }
    }
}

fn skipped(instrument: &Instrument, reason: SkipReason) -> EntryOutcome {
    EntryOutcome::Skipped {
        instrument: instrument.name.clone(),
        reason,
    }
}
