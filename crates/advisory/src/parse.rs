//! Turns advisory answers into decisions.
//!
//! A structured JSON answer is read first. Anything else goes through the
//! free-text markers. Every path fails closed: an entry that cannot be read
//! is rejected and an exit that cannot be read is [`ExitAdvice::Ambiguous`].

use auto_trade_core::advisory::{DEFAULT_CONFIDENCE_PCT, DEFAULT_NET_TAKE_PROFIT_PCT};
use auto_trade_core::{AdvisoryDecision, ExitAdvice};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

struct Markers {
    approve: Regex,
    reject: Regex,
    close: Regex,
    hold: Regex,
    net_tp: Regex,
    tp: Regex,
    confidence: Regex,
}

fn markers() -> &'static Markers {
    static MARKERS: OnceLock<Markers> = OnceLock::new();
    MARKERS.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("static pattern");
        Markers {
            approve: re(r"(?i)\bAPPROVE\b"),
            reject: re(r"(?i)\bREJECT\b"),
            close: re(r"(?i)\bCLOSE\b"),
            hold: re(r"(?i)\bHOLD\b"),
            net_tp: re(r"(?i)NET TP:\s*([\d.]+)%"),
            tp: re(r"(?i)\bTP:\s*([\d.]+)%"),
            confidence: re(r"(?i)(?:Confidence|Ishonch):\s*([\d.]+)%"),
        }
    })
}

#[derive(Debug, Deserialize)]
struct StructuredDecision {
    decision: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct StructuredExit {
    action: String,
    net_take_profit_pct: Option<f64>,
    confidence: Option<f64>,
    #[serde(default)]
    reason: String,
}

/// Drops a surrounding markdown code fence, if any.
fn unfenced(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

/// `Some` when the text is a JSON object, whatever its fields.
fn json_object(text: &str) -> Option<Value> {
    if !text.starts_with('{') {
        return None;
    }
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// Text after the marker match, stripped of separators.
fn after_marker(text: &str, end: usize) -> &str {
    text[end..].trim_start_matches([':', '-', ' ', '\n', '\t']).trim()
}

/// Parses an entry-gate answer.
#[must_use]
pub fn parse_decision(text: &str) -> AdvisoryDecision {
    let text = unfenced(text);
    if text.is_empty() {
        return AdvisoryDecision::reject("empty response");
    }

    if let Some(object) = json_object(text) {
        return match serde_json::from_value::<StructuredDecision>(object) {
            Ok(s) if s.decision.eq_ignore_ascii_case("APPROVE") => {
                AdvisoryDecision::approve(s.reason)
            }
            Ok(s) if s.decision.eq_ignore_ascii_case("REJECT") => AdvisoryDecision::reject(s.reason),
            Ok(s) => AdvisoryDecision::reject(format!("unknown decision '{}'", s.decision)),
            Err(e) => AdvisoryDecision::reject(format!("malformed structured response: {e}")),
        };
    }

    let m = markers();
    match (m.approve.find(text), m.reject.find(text)) {
        (Some(_), Some(_)) => AdvisoryDecision::reject("ambiguous"),
        (Some(hit), None) => {
            let reason = after_marker(text, hit.end());
            AdvisoryDecision::approve(if reason.is_empty() { text } else { reason })
        }
        (None, Some(hit)) => {
            let reason = after_marker(text, hit.end());
            AdvisoryDecision::reject(if reason.is_empty() { text } else { reason })
        }
        (None, None) => AdvisoryDecision::reject(text),
    }
}

fn percent(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Parses a trailing-exit answer.
#[must_use]
pub fn parse_exit(text: &str) -> ExitAdvice {
    let text = unfenced(text);
    if text.is_empty() {
        return ExitAdvice::Ambiguous { raw: String::new() };
    }

    if let Some(object) = json_object(text) {
        let ambiguous = || ExitAdvice::Ambiguous {
            raw: text.to_string(),
        };
        return match serde_json::from_value::<StructuredExit>(object) {
            Ok(s) if s.action.eq_ignore_ascii_case("CLOSE") => ExitAdvice::Close { reason: s.reason },
            Ok(s) if s.action.eq_ignore_ascii_case("HOLD") => ExitAdvice::Hold {
                net_take_profit_pct: s.net_take_profit_pct.unwrap_or(DEFAULT_NET_TAKE_PROFIT_PCT),
                confidence_pct: s.confidence.unwrap_or(DEFAULT_CONFIDENCE_PCT),
                reason: s.reason,
            },
            _ => ambiguous(),
        };
    }

    let m = markers();
    match (m.close.find(text), m.hold.find(text)) {
        (Some(hit), None) => ExitAdvice::Close {
            reason: after_marker(text, hit.end()).to_string(),
        },
        (None, Some(hit)) => {
            let net_take_profit_pct = percent(&m.net_tp, text)
                .or_else(|| percent(&m.tp, text))
                .unwrap_or(DEFAULT_NET_TAKE_PROFIT_PCT);
            ExitAdvice::Hold {
                net_take_profit_pct,
                confidence_pct: percent(&m.confidence, text).unwrap_or(DEFAULT_CONFIDENCE_PCT),
                reason: after_marker(text, hit.end()).to_string(),
            }
        }
        _ => ExitAdvice::Ambiguous {
            raw: text.to_string(),
        },
    }
}
