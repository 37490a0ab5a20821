mod common;

use auto_trade_core::{Direction, NotifyLevel, SignalTier};
use auto_trade_engine::{StatusReporter, TradingRuntime};
use common::{disconnected, harness, position};
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_connect_logs_in_once() {
    let h = disconnected();
    let runtime = TradingRuntime::new(h.ctx.clone());

    runtime.connect(h.gateway.clone()).await.unwrap();
    assert_eq!(h.gateway.logins.load(Ordering::SeqCst), 1);
    assert!(h.ctx.gateway().is_some());

    assert!(runtime.connect(h.gateway.clone()).await.is_err());
}

#[tokio::test]
async fn test_start_trades_then_shuts_down_promptly() {
    let h = disconnected();
    h.ctx
        .store
        .update(|s| s.signal_tier = SignalTier::Test)
        .await
        .unwrap();
    h.gateway.set_quote("BTCUSD", dec!(50000), dec!(50010));
    h.gateway.set_quote("ETHUSD", dec!(2500), dec!(2501));

    let mut runtime = TradingRuntime::new(h.ctx.clone());
    runtime.connect(h.gateway.clone()).await.unwrap();
    runtime.start();
    assert_eq!(runtime.task_count(), 5);

    // First entry cycle runs immediately
    for _ in 0..50 {
        if h.gateway.opened().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(h.gateway.opened().len(), 2);

    tokio::time::timeout(Duration::from_secs(5), runtime.shutdown())
        .await
        .expect("loops should stop on shutdown");
    assert!(h.ctx.shutdown.is_triggered());
}

#[tokio::test]
async fn test_expired_session_is_notified() {
    let h = disconnected();
    h.gateway.fail_auth.store(true, Ordering::SeqCst);

    let mut runtime = TradingRuntime::new(h.ctx.clone());
    runtime.connect(h.gateway.clone()).await.unwrap();
    runtime.start();

    let mut errors = Vec::new();
    for _ in 0..50 {
        errors = h.notifier.at(NotifyLevel::Error);
        if !errors.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(errors
        .iter()
        .any(|m| m.contains("Authentication failed")));

    tokio::time::timeout(Duration::from_secs(5), runtime.shutdown())
        .await
        .expect("loops should stop on shutdown");
}

#[tokio::test]
async fn test_status_report_lists_positions() {
    let h = harness();
    let reporter = StatusReporter::new(h.ctx.clone());
    assert_eq!(
        reporter.compose().await.unwrap().as_deref(),
        Some("Status: no open positions")
    );

    h.ctx
        .store
        .update(|s| {
            let mut p = position("R1", "BTCUSD", Direction::Buy, dec!(100));
            p.instrument_name = "Bitcoin".to_string();
            s.positions.insert(p.deal_id.clone(), p);
        })
        .await
        .unwrap();
    h.gateway.set_quote("BTCUSD", dec!(101.9), dec!(102));

    let report = reporter.compose().await.unwrap().unwrap();
    assert!(report.starts_with("Status: 1 open position(s)"));
    assert!(report.contains("Bitcoin BUY size 1 @ 100"));
    assert!(report.contains("net +1.75%"));
}

#[tokio::test]
async fn test_status_report_waits_for_gateway() {
    let h = disconnected();
    assert!(StatusReporter::new(h.ctx.clone())
        .compose()
        .await
        .unwrap()
        .is_none());
}
