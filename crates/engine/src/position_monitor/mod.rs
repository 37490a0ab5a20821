//! Loops that watch open positions: a refresher that mirrors the gateway's
//! listing into the store, and the trailing-stop and stop-loss monitors that
//! close positions.

mod refresher;
mod stop_loss;
mod trailing;

pub use refresher::PositionRefresher;
pub use stop_loss::StopLossMonitor;
pub use trailing::TrailingStopMonitor;

use crate::context::TradingContext;
use anyhow::{Context, Result};
use auto_trade_core::{CostModel, MarketGateway, NotifyLevel, Position, Quote};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Closes `position` at the gateway, drops it from the store and reports P/L.
///
/// Returns the realized P/L measured against the quote's mark side. A close
/// the gateway does not acknowledge is an error and the record is kept.
pub(crate) async fn close_and_forget(
    ctx: &TradingContext,
    gateway: &dyn MarketGateway,
    position: &Position,
    quote: &Quote,
    why: &str,
) -> Result<Decimal> {
    let confirmation = gateway
        .close_position(
            &position.deal_id,
            position.direction,
            &position.instrument_id,
            position.size,
        )
        .await
        .with_context(|| format!("closing deal {}", position.deal_id))?;
    if !confirmation.success {
        anyhow::bail!(
            "close of deal {} not accepted: {}",
            position.deal_id,
            confirmation.details
        );
    }

    if let Err(e) = ctx
        .store
        .update(|s| s.positions.remove(&position.deal_id))
        .await
    {
        warn!(deal_id = %position.deal_id, error = %e, "Failed to persist closed position");
    }

    let exit_price = quote.mark_price(position.direction);
    let pnl = CostModel::realized_pnl(
        position.direction,
        position.open_price,
        exit_price,
        position.size,
    );
    info!(
        deal_id = %position.deal_id,
        instrument = %position.instrument_id,
        exit_price = %exit_price,
        pnl = %pnl,
        why,
        "Position closed"
    );

    let name = if position.instrument_name.is_empty() {
        &position.instrument_id
    } else {
        &position.instrument_name
    };
    ctx.notify(
        &format!(
            "{why}: closed {} {name} at {exit_price}, P/L {pnl}",
            position.direction
        ),
        NotifyLevel::Success,
    )
    .await;
    Ok(pnl)
}
