use crate::market::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open trade tracked by its gateway-issued deal id.
///
/// Monitors only read positions; a record leaves the cache when the gateway
/// confirms a close or stops listing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub deal_id: String,
    /// Gateway identifier (epic); empty when the listing omitted it.
    pub instrument_id: String,
    #[serde(default)]
    pub instrument_name: String,
    pub direction: Direction,
    pub open_price: Decimal,
    pub size: Decimal,
    pub opened_at: DateTime<Utc>,
}

/// Full record returned by a single-position lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionDetails {
    pub position: Position,
    pub market: MarketSnapshot,
}

/// Market fields that accompany a position lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarketSnapshot {
    pub instrument_id: String,
    pub instrument_name: String,
    pub bid: Option<Decimal>,
    pub offer: Option<Decimal>,
    pub status: Option<String>,
}

/// Gateway acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealConfirmation {
    pub deal_id: String,
}

/// Gateway acknowledgement of a close request.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseConfirmation {
    pub success: bool,
    pub details: serde_json::Value,
}

/// Counts positions for one instrument, optionally restricted to a direction.
pub fn count_open<'a>(
    positions: impl IntoIterator<Item = &'a Position>,
    instrument_id: &str,
    direction: Option<Direction>,
) -> usize {
    positions
        .into_iter()
        .filter(|p| p.instrument_id == instrument_id)
        .filter(|p| direction.map_or(true, |d| p.direction == d))
        .count()
}
