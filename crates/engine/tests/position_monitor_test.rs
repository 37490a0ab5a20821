mod common;

use auto_trade_core::{
    AdvisoryDecision, Direction, ExitAdvice, GatewayError, NotifyLevel, TrailingMode,
};
use auto_trade_engine::{PositionRefresher, StopLossMonitor, TrailingStopMonitor};
use common::{details, disconnected, harness, harness_with_advisor, position, Harness, ScriptedAdvisor};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;

async fn track(h: &Harness, deal: &str, id: &str, direction: Direction, open: Decimal) {
    let p = position(deal, id, direction, open);
    h.gateway.hold(p.clone());
    h.ctx
        .store
        .update(|s| {
            s.positions.insert(p.deal_id.clone(), p);
        })
        .await
        .unwrap();
}

// =============================================================================
// Trailing stop
// =============================================================================

#[tokio::test]
async fn test_manual_trailing_closes_and_forgets() {
    let h = harness();
    h.ctx
        .store
        .update(|s| {
            s.trailing_mode = TrailingMode::Manual;
            s.trailing_stop_percent = 1.0;
        })
        .await
        .unwrap();
    track(&h, "T1", "BTCUSD", Direction::Buy, dec!(100)).await;
    h.gateway.set_quote("BTCUSD", dec!(101.39855), dec!(101.5));

    let closed = TrailingStopMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(closed, vec!["T1".to_string()]);
    assert_eq!(
        h.gateway.closed(),
        vec![("T1".to_string(), Direction::Buy, "BTCUSD".to_string(), dec!(1))]
    );
    assert!(h.ctx.store.get_settings().await.positions.is_empty());
    let success = h.notifier.at(NotifyLevel::Success);
    assert_eq!(success.len(), 1);
    assert!(success[0].contains("P/L 1.5"));
}

#[tokio::test]
async fn test_auto_trailing_holds_below_requirement() {
    let h = harness();
    track(&h, "T1", "BTCUSD", Direction::Buy, dec!(100)).await;
    h.gateway.set_quote("BTCUSD", dec!(100.2), dec!(100.3));

    let closed = TrailingStopMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();
    assert!(closed.is_empty());
    assert_eq!(h.ctx.store.get_settings().await.positions.len(), 1);
}

#[tokio::test]
async fn test_trailing_skips_positions_without_quote() {
    let h = harness();
    track(&h, "T1", "BTCUSD", Direction::Buy, dec!(100)).await;

    let closed = TrailingStopMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();
    assert!(closed.is_empty());
    assert!(h.gateway.closed().is_empty());
}

async fn advisory_trailing(h: &Harness) {
    h.ctx
        .store
        .update(|s| {
            s.trailing_mode = TrailingMode::Advisory;
            s.advisory_trailing_enabled = true;
            s.trailing_stop_percent = 1.0;
        })
        .await
        .unwrap();
    track(h, "A1", "BTCUSD", Direction::Buy, dec!(100)).await;
    h.gateway.set_quote("BTCUSD", dec!(101.9), dec!(102));
}

#[tokio::test]
async fn test_advisory_hold_keeps_then_rate_limit_falls_back() {
    let advisor = ScriptedAdvisor::new(
        AdvisoryDecision::approve(""),
        ExitAdvice::Hold {
            net_take_profit_pct: 3.0,
            confidence_pct: 80.0,
            reason: "momentum intact".to_string(),
        },
    );
    let h = harness_with_advisor(advisor.clone());
    advisory_trailing(&h).await;
    let monitor = TrailingStopMonitor::new(h.ctx.clone());

    assert!(monitor.run_cycle().await.unwrap().is_empty());
    assert_eq!(advisor.exit_calls(), 1);

    // Within the advisory interval the plain 1% threshold decides
    assert_eq!(monitor.run_cycle().await.unwrap(), vec!["A1".to_string()]);
    assert_eq!(advisor.exit_calls(), 1);
}

#[tokio::test]
async fn test_advisory_close() {
    let advisor = ScriptedAdvisor::new(
        AdvisoryDecision::approve(""),
        ExitAdvice::Close {
            reason: "take profit".to_string(),
        },
    );
    let h = harness_with_advisor(advisor.clone());
    advisory_trailing(&h).await;
    h.ctx
        .store
        .update(|s| s.trailing_stop_percent = 5.0)
        .await
        .unwrap();

    let closed = TrailingStopMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(closed, vec!["A1".to_string()]);
    assert_eq!(advisor.exit_calls(), 1);
}

#[tokio::test]
async fn test_advisory_exit_sees_recent_indicators() {
    let advisor = ScriptedAdvisor::new(
        AdvisoryDecision::approve(""),
        ExitAdvice::Close {
            reason: "fading".to_string(),
        },
    );
    let h = harness_with_advisor(advisor.clone());
    advisory_trailing(&h).await;
    let rising: Vec<f64> = (0..30).map(|i| 99.0 + f64::from(i) * 0.1).collect();
    h.gateway.set_bars("BTCUSD", &rising);

    TrailingStopMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();

    let request = advisor.last_exit().unwrap();
    assert!((request.indicators.last_price - 101.9).abs() < 1e-9);
    assert!(request.indicators.rsi.is_some());
    assert!(request.indicators.ema20.is_some());
    assert!(request.indicators.ema50.is_none());
}

#[tokio::test]
async fn test_advisory_exit_without_history_sends_price_only() {
    let advisor = ScriptedAdvisor::new(
        AdvisoryDecision::approve(""),
        ExitAdvice::Hold {
            net_take_profit_pct: 3.0,
            confidence_pct: 60.0,
            reason: "trend".to_string(),
        },
    );
    let h = harness_with_advisor(advisor.clone());
    advisory_trailing(&h).await;

    TrailingStopMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();

    // Long positions are marked at the sell side
    let request = advisor.last_exit().unwrap();
    assert!((request.indicators.last_price - 102.0).abs() < 1e-9);
    assert!(request.indicators.rsi.is_none());
}

#[tokio::test]
async fn test_advisory_ambiguous_uses_threshold() {
    let advisor = ScriptedAdvisor::new(
        AdvisoryDecision::approve(""),
        ExitAdvice::Ambiguous {
            raw: "not sure".to_string(),
        },
    );
    let h = harness_with_advisor(advisor);
    advisory_trailing(&h).await;
    h.ctx
        .store
        .update(|s| s.trailing_stop_percent = 5.0)
        .await
        .unwrap();

    let closed = TrailingStopMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();
    assert!(closed.is_empty());
}

// =============================================================================
// Stop loss
// =============================================================================

#[tokio::test]
async fn test_stop_loss_closes_long_and_short() {
    let h = harness();
    track(&h, "L1", "BTCUSD", Direction::Buy, dec!(100)).await;
    track(&h, "S1", "ETHUSD", Direction::Sell, dec!(100)).await;
    h.gateway.set_quote("BTCUSD", dec!(96.5), dec!(97));
    h.gateway.set_quote("ETHUSD", dec!(103), dec!(103.5));

    let mut closed = StopLossMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();
    closed.sort();

    assert_eq!(closed, vec!["L1".to_string(), "S1".to_string()]);
    assert!(h.ctx.store.get_settings().await.positions.is_empty());
    let directions: Vec<Direction> = h.gateway.closed().iter().map(|c| c.1).collect();
    assert!(directions.contains(&Direction::Buy));
    assert!(directions.contains(&Direction::Sell));
}

#[tokio::test]
async fn test_stop_loss_respects_toggle_and_limit() {
    let h = harness();
    track(&h, "L1", "BTCUSD", Direction::Buy, dec!(100)).await;
    h.gateway.set_quote("BTCUSD", dec!(98.5), dec!(99));

    let monitor = StopLossMonitor::new(h.ctx.clone());
    assert!(monitor.run_cycle().await.unwrap().is_empty());

    h.gateway.set_quote("BTCUSD", dec!(90), dec!(90.5));
    h.ctx
        .store
        .update(|s| s.stop_loss_enabled = false)
        .await
        .unwrap();
    assert!(monitor.run_cycle().await.unwrap().is_empty());
    assert!(h.gateway.closed().is_empty());
}

#[tokio::test]
async fn test_unacknowledged_close_keeps_position() {
    let h = harness();
    track(&h, "L1", "BTCUSD", Direction::Buy, dec!(100)).await;
    h.gateway.set_quote("BTCUSD", dec!(96.5), dec!(97));
    h.gateway.refuse_closes.store(true, Ordering::SeqCst);

    let closed = StopLossMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();

    assert!(closed.is_empty());
    assert!(h.ctx.store.get_settings().await.positions.contains_key("L1"));
    assert!(h.notifier.at(NotifyLevel::Success).is_empty());
    let errors = h.notifier.at(NotifyLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("not accepted"));
    assert!(errors[0].contains("error.position.notfound"));
}

#[tokio::test]
async fn test_expired_session_fails_monitor_cycles() {
    let h = harness();
    track(&h, "L1", "BTCUSD", Direction::Buy, dec!(100)).await;
    h.gateway.set_quote("BTCUSD", dec!(90), dec!(90.5));
    h.gateway.fail_auth.store(true, Ordering::SeqCst);

    let is_auth = |e: &anyhow::Error| {
        e.downcast_ref::<GatewayError>()
            .is_some_and(GatewayError::is_auth)
    };
    let err = StopLossMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap_err();
    assert!(is_auth(&err));
    let err = TrailingStopMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap_err();
    assert!(is_auth(&err));
    let err = PositionRefresher::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap_err();
    assert!(is_auth(&err));

    assert!(h.gateway.closed().is_empty());
    assert!(h.ctx.store.get_settings().await.positions.contains_key("L1"));
}

// =============================================================================
// Refresher
// =============================================================================

#[tokio::test]
async fn test_refresher_mirrors_listing() {
    let h = harness();
    h.ctx
        .store
        .update(|s| {
            let stale = position("OLD", "BTCUSD", Direction::Buy, dec!(1));
            s.positions.insert(stale.deal_id.clone(), stale);
        })
        .await
        .unwrap();
    h.gateway
        .hold(position("N1", "ETHUSD", Direction::Sell, dec!(2500)));

    let count = PositionRefresher::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(count, Some(1));

    let positions = h.ctx.store.get_settings().await.positions;
    assert!(!positions.contains_key("OLD"));
    assert_eq!(positions["N1"].instrument_name, "Ethereum");
}

#[tokio::test]
async fn test_refresher_completes_missing_instrument() {
    let h = harness();
    h.gateway
        .hold(position("N2", "", Direction::Buy, dec!(50000)));
    h.gateway
        .details
        .lock()
        .unwrap()
        .insert("N2".to_string(), details("N2", "BTCUSD", "Bitcoin/USD"));

    PositionRefresher::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();

    let positions = h.ctx.store.get_settings().await.positions;
    assert_eq!(positions["N2"].instrument_id, "BTCUSD");
    assert_eq!(positions["N2"].instrument_name, "Bitcoin/USD");
}

#[tokio::test]
async fn test_refresher_keeps_cache_on_error() {
    let h = harness();
    track(&h, "K1", "BTCUSD", Direction::Buy, dec!(100)).await;
    h.gateway.fail_listing.store(true, Ordering::SeqCst);

    let count = PositionRefresher::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(count, None);
    assert!(h.ctx.store.get_settings().await.positions.contains_key("K1"));
}

#[tokio::test]
async fn test_monitors_skip_without_gateway() {
    let h = disconnected();
    assert!(TrailingStopMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap()
        .is_empty());
    assert!(StopLossMonitor::new(h.ctx.clone())
        .run_cycle()
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        PositionRefresher::new(h.ctx.clone())
            .run_cycle()
            .await
            .unwrap(),
        None
    );
}
