//! Boundary adapter from gateway JSON to the engine's types.
//!
//! Gateway responses name the same field several ways (`dealId` or
//! `positionId`, `level` or `openPrice`, `offer` or `ofr` or `ask`). Every
//! known variant is mapped here and nowhere else.

use auto_trade_core::{
    Direction, LotRules, MarketSnapshot, Position, PositionDetails, PriceBar, Quote,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Nested bid fields tried, in order, for a bar's close-like value.
const BAR_BID_PARENTS: [&str; 4] = ["closePrice", "openPrice", "highPrice", "lowPrice"];

/// Reads a JSON number or numeric string.
#[must_use]
pub fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64))
        }
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// First field of `keys` present on `obj` that parses as a decimal.
fn first_decimal(obj: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|k| obj.get(*k).and_then(decimal))
}

fn first_str<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// Close-like value of one historical bar.
#[must_use]
pub fn bar_close(bar: &Value) -> Option<f64> {
    BAR_BID_PARENTS
        .iter()
        .find_map(|parent| bar.get(*parent).and_then(|p| p.get("bid")).and_then(float))
        .or_else(|| bar.get("price").and_then(float))
        .or_else(|| {
            let bid = bar.get("bid").and_then(float)?;
            let ask = ["ask", "offer", "ofr"]
                .iter()
                .find_map(|k| bar.get(*k).and_then(float))?;
            Some((bid + ask) / 2.0)
        })
}

/// Bars from a `{"prices": [...]}` payload or a bare array, oldest first.
///
/// Bars without a usable value are dropped.
#[must_use]
pub fn bars(payload: &Value) -> Vec<PriceBar> {
    let list = payload
        .get("prices")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array());

    list.map(|items| items.iter().filter_map(bar_close).map(PriceBar::new).collect())
        .unwrap_or_default()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S:%3f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Flattens a `{position, market}` item into one object.
fn merged(item: &Value) -> Value {
    let mut out = serde_json::Map::new();
    for part in ["market", "position"] {
        if let Some(Value::Object(fields)) = item.get(part) {
            out.extend(fields.clone());
        }
    }
    if out.is_empty() {
        item.clone()
    } else {
        Value::Object(out)
    }
}

/// One position from any known listing shape.
#[must_use]
pub fn position(item: &Value) -> Option<Position> {
    let flat = merged(item);

    let deal_id = first_str(&flat, &["dealId", "positionId", "deal_id"])?.to_string();
    let direction = first_str(&flat, &["direction", "dealType"])?
        .parse::<Direction>()
        .ok()?;
    let open_price = first_decimal(&flat, &["level", "openPrice", "open_price"])?;
    let size = first_decimal(&flat, &["size", "dealSize", "contractSize"])?;

    let opened_at = first_str(&flat, &["createdDateUTC", "createdDate", "openedAt"])
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);

    Some(Position {
        deal_id,
        instrument_id: first_str(&flat, &["epic", "instrumentId"])
            .unwrap_or_default()
            .to_string(),
        instrument_name: first_str(&flat, &["instrumentName", "name"])
            .unwrap_or_default()
            .to_string(),
        direction,
        open_price,
        size,
        opened_at,
    })
}

/// All positions of a listing; entries that cannot be read are skipped.
#[must_use]
pub fn positions(payload: &Value) -> Vec<Position> {
    let list = payload
        .get("positions")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array());

    list.map(|items| items.iter().filter_map(position).collect())
        .unwrap_or_default()
}

#[must_use]
pub fn market_snapshot(market: &Value) -> MarketSnapshot {
    let snapshot = market.get("snapshot").unwrap_or(market);
    MarketSnapshot {
        instrument_id: first_str(market, &["epic"])
            .or_else(|| market.get("instrument").and_then(|i| first_str(i, &["epic"])))
            .unwrap_or_default()
            .to_string(),
        instrument_name: first_str(market, &["instrumentName"])
            .or_else(|| market.get("instrument").and_then(|i| first_str(i, &["name"])))
            .unwrap_or_default()
            .to_string(),
        bid: first_decimal(snapshot, &["bid"]),
        offer: first_decimal(snapshot, &["offer", "ofr", "ask"]),
        status: first_str(snapshot, &["marketStatus"]).map(str::to_string),
    }
}

#[must_use]
pub fn position_details(payload: &Value) -> Option<PositionDetails> {
    let position = position(payload)?;
    let market = payload
        .get("market")
        .map(market_snapshot)
        .unwrap_or_default();
    Some(PositionDetails { position, market })
}

/// Quote from a market-details snapshot (`bid` / `offer`).
#[must_use]
pub fn snapshot_quote(payload: &Value) -> Option<Quote> {
    let market = market_snapshot(payload);
    let quote = Quote::new(market.bid?, market.offer?);
    quote.is_valid().then_some(quote)
}

/// `(epic, quote)` from a streaming quote message.
#[must_use]
pub fn stream_quote(message: &Value) -> Option<(String, Quote)> {
    let destination = message.get("destination").and_then(Value::as_str)?;
    if destination != "quote" && destination != "marketData.update" {
        return None;
    }
    let payload = message.get("payload")?;
    let epic = first_str(payload, &["epic"])?.to_string();
    let bid = first_decimal(payload, &["bid"])?;
    let offer = first_decimal(payload, &["ofr", "offer", "ask"])?;

    let mut quote = Quote::new(bid, offer);
    if let Some(ms) = payload.get("timestamp").and_then(Value::as_i64) {
        if let Some(ts) = DateTime::from_timestamp_millis(ms) {
            quote.timestamp = ts;
        }
    }
    quote.is_valid().then_some((epic, quote))
}

fn rule_value(rules: &Value, key: &str) -> Option<Decimal> {
    let field = rules.get(key)?;
    field.get("value").and_then(decimal).or_else(|| decimal(field))
}

/// Lot constraints from a market-details payload.
///
/// Returns `None` when the payload carries no size rules at all.
#[must_use]
pub fn lot_rules(payload: &Value) -> Option<LotRules> {
    let defaults = LotRules {
        min: Decimal::ONE,
        step: Decimal::ONE,
        max: Decimal::ZERO,
    };

    let sized = ["dealSize", "dealSizeConfiguration"]
        .iter()
        .find_map(|k| payload.get(*k).filter(|v| v.is_object()));

    let mut rules = if let Some(cfg) = sized {
        LotRules {
            min: first_decimal(cfg, &["min"]).unwrap_or(defaults.min),
            step: first_decimal(cfg, &["step"]).unwrap_or(defaults.step),
            max: first_decimal(cfg, &["max"]).unwrap_or(defaults.max),
        }
    } else if let Some(dealing) = payload.get("dealingRules") {
        let min = rule_value(dealing, "minDealSize")?;
        LotRules {
            min,
            step: rule_value(dealing, "minSizeIncrement").unwrap_or(min),
            max: rule_value(dealing, "maxDealSize").unwrap_or(defaults.max),
        }
    } else {
        LotRules {
            min: rule_value(payload, "minDealSize")?,
            ..defaults
        }
    };

    if let Some(max) = rule_value(payload, "maxDealSize") {
        if max > Decimal::ZERO {
            rules.max = max;
        }
    }
    Some(rules)
}

/// Deal identity from an order or confirmation response.
#[must_use]
pub fn deal_reference(payload: &Value) -> Option<String> {
    payload
        .get("affectedDeals")
        .and_then(Value::as_array)
        .and_then(|deals| deals.first())
        .and_then(|d| first_str(d, &["dealId"]))
        .or_else(|| first_str(payload, &["dealId", "dealReference"]))
        .map(str::to_string)
}

/// Whether a close response acknowledges the close.
///
/// A 2xx body can still carry an `errorCode` or a rejected deal status.
#[must_use]
pub fn close_accepted(payload: &Value) -> bool {
    if payload.get("errorCode").is_some() {
        return false;
    }
    !first_str(payload, &["dealStatus", "status"])
        .is_some_and(|status| status.eq_ignore_ascii_case("REJECTED"))
}
