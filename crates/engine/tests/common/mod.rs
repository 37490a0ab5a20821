#![allow(dead_code)]

use async_trait::async_trait;
use auto_trade_core::{
    AdvisoryDecision, AdvisoryError, AdvisoryService, CloseConfirmation, DealConfirmation,
    Direction, EngineConfig, EntryRequest, ExitAdvice, ExitRequest, GatewayError, Instrument,
    MarketGateway, MarketHours, MarketSnapshot, NotifyLevel, Notifier, Position,
    PositionDetails, PriceBar, Quote, Resolution,
};
use auto_trade_engine::{SettingsStore, TradingContext};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory broker: quotes and bars are scripted, orders land in `positions`.
#[derive(Default)]
pub struct MockGateway {
    pub quotes: Mutex<HashMap<String, Quote>>,
    pub bars: Mutex<HashMap<String, Vec<PriceBar>>>,
    pub positions: Mutex<Vec<Position>>,
    pub details: Mutex<HashMap<String, PositionDetails>>,
    pub opened: Mutex<Vec<(String, Direction, Decimal)>>,
    pub closed: Mutex<Vec<(String, Direction, String, Decimal)>>,
    pub fail_listing: AtomicBool,
    pub fail_orders: AtomicBool,
    /// Every read answers as if the session had expired.
    pub fail_auth: AtomicBool,
    /// Closes are answered without being acknowledged.
    pub refuse_closes: AtomicBool,
    pub logins: AtomicUsize,
    next_deal: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_quote(&self, id: &str, buy: Decimal, sell: Decimal) {
        self.quotes
            .lock()
            .unwrap()
            .insert(id.to_string(), Quote::new(buy, sell));
    }

    pub fn set_bars(&self, id: &str, closes: &[f64]) {
        self.bars.lock().unwrap().insert(
            id.to_string(),
            closes.iter().copied().map(PriceBar::new).collect(),
        );
    }

    pub fn hold(&self, position: Position) {
        self.positions.lock().unwrap().push(position);
    }

    pub fn opened(&self) -> Vec<(String, Direction, Decimal)> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<(String, Direction, String, Decimal)> {
        self.closed.lock().unwrap().clone()
    }

    fn check_session(&self) -> Result<(), GatewayError> {
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(GatewayError::Auth("error.invalid.session.token".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketGateway for MockGateway {
    async fn login(&self) -> Result<(), GatewayError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_prices(&self, instrument_id: &str) -> Result<Option<Quote>, GatewayError> {
        self.check_session()?;
        Ok(self.quotes.lock().unwrap().get(instrument_id).copied())
    }

    async fn get_historical_prices(
        &self,
        instrument_id: &str,
        _resolution: Resolution,
        _count: usize,
    ) -> Result<Vec<PriceBar>, GatewayError> {
        self.check_session()?;
        Ok(self
            .bars
            .lock()
            .unwrap()
            .get(instrument_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn open_position(
        &self,
        instrument_id: &str,
        direction: Direction,
        size: Decimal,
    ) -> Result<DealConfirmation, GatewayError> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "market closed".to_string(),
            });
        }
        let deal_id = format!("D{}", self.next_deal.fetch_add(1, Ordering::SeqCst) + 1);
        let price = self
            .quotes
            .lock()
            .unwrap()
            .get(instrument_id)
            .map_or(Decimal::ZERO, |q| q.entry_price(direction));
        self.opened
            .lock()
            .unwrap()
            .push((instrument_id.to_string(), direction, size));
        self.hold(Position {
            deal_id: deal_id.clone(),
            instrument_id: instrument_id.to_string(),
            instrument_name: String::new(),
            direction,
            open_price: price,
            size,
            opened_at: Utc::now(),
        });
        Ok(DealConfirmation { deal_id })
    }

    async fn close_position(
        &self,
        deal_id: &str,
        direction: Direction,
        instrument_id: &str,
        size: Decimal,
    ) -> Result<CloseConfirmation, GatewayError> {
        if self.refuse_closes.load(Ordering::SeqCst) {
            return Ok(CloseConfirmation {
                success: false,
                details: serde_json::json!({"errorCode": "error.position.notfound"}),
            });
        }
        self.closed.lock().unwrap().push((
            deal_id.to_string(),
            direction,
            instrument_id.to_string(),
            size,
        ));
        self.positions.lock().unwrap().retain(|p| p.deal_id != deal_id);
        Ok(CloseConfirmation {
            success: true,
            details: serde_json::Value::Null,
        })
    }

    async fn get_open_positions(&self) -> Result<Vec<Position>, GatewayError> {
        self.check_session()?;
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(GatewayError::Transient("HTTP 503: unavailable".to_string()));
        }
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn get_position_details(&self, deal_id: &str) -> Result<PositionDetails, GatewayError> {
        self.details
            .lock()
            .unwrap()
            .get(deal_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                message: format!("unknown deal {deal_id}"),
            })
    }
}

/// Advisor with a fixed answer for each gate.
pub struct ScriptedAdvisor {
    pub entry: Result<AdvisoryDecision, String>,
    pub exit: ExitAdvice,
    pub entry_calls: AtomicUsize,
    pub exit_calls: AtomicUsize,
    pub last_exit: Mutex<Option<ExitRequest>>,
}

impl ScriptedAdvisor {
    pub fn new(entry: AdvisoryDecision, exit: ExitAdvice) -> Arc<Self> {
        Arc::new(Self {
            entry: Ok(entry),
            exit,
            entry_calls: AtomicUsize::new(0),
            exit_calls: AtomicUsize::new(0),
            last_exit: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            entry: Err("connection reset".to_string()),
            exit: ExitAdvice::Ambiguous { raw: String::new() },
            entry_calls: AtomicUsize::new(0),
            exit_calls: AtomicUsize::new(0),
            last_exit: Mutex::new(None),
        })
    }

    pub fn exit_calls(&self) -> usize {
        self.exit_calls.load(Ordering::SeqCst)
    }

    pub fn last_exit(&self) -> Option<ExitRequest> {
        self.last_exit.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdvisoryService for ScriptedAdvisor {
    async fn approve(&self, _request: &EntryRequest) -> Result<AdvisoryDecision, AdvisoryError> {
        self.entry_calls.fetch_add(1, Ordering::SeqCst);
        self.entry.clone().map_err(AdvisoryError::Http)
    }

    async fn advise_exit(&self, request: &ExitRequest) -> Result<ExitAdvice, AdvisoryError> {
        self.exit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_exit.lock().unwrap() = Some(request.clone());
        Ok(self.exit.clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(NotifyLevel, String)>>,
}

impl RecordingNotifier {
    pub fn at(&self, level: NotifyLevel) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_status(&self, message: &str, level: NotifyLevel) -> anyhow::Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
        Ok(())
    }
}

pub fn universe() -> Vec<Instrument> {
    vec![
        Instrument::new("Bitcoin", "BTCUSD", MarketHours::Crypto),
        Instrument::new("Ethereum", "ETHUSD", MarketHours::Crypto),
    ]
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        quote_retry_base_ms: 0,
        error_backoff_secs: 1,
        ..EngineConfig::default()
    }
}

pub struct Harness {
    pub ctx: Arc<TradingContext>,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

/// Context over an in-memory store with the mock gateway already connected.
pub fn harness() -> Harness {
    build(None, true)
}

pub fn harness_with_advisor(advisor: Arc<ScriptedAdvisor>) -> Harness {
    build(Some(advisor), true)
}

pub fn disconnected() -> Harness {
    build(None, false)
}

fn build(advisor: Option<Arc<ScriptedAdvisor>>, connect: bool) -> Harness {
    let gateway = MockGateway::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let store = Arc::new(SettingsStore::in_memory(universe()));
    let mut ctx = TradingContext::new(
        fast_config(),
        universe(),
        chrono_tz::UTC,
        store,
        notifier.clone(),
    );
    if let Some(advisor) = advisor {
        ctx = ctx.with_advisory(advisor);
    }
    if connect {
        ctx.set_gateway(gateway.clone());
    }
    Harness {
        ctx: Arc::new(ctx),
        gateway,
        notifier,
    }
}

pub fn position(deal: &str, id: &str, direction: Direction, open: Decimal) -> Position {
    Position {
        deal_id: deal.to_string(),
        instrument_id: id.to_string(),
        instrument_name: String::new(),
        direction,
        open_price: open,
        size: Decimal::ONE,
        opened_at: Utc::now(),
    }
}

pub fn details(deal: &str, id: &str, name: &str) -> PositionDetails {
    PositionDetails {
        position: position(deal, "", Direction::Buy, Decimal::ONE_HUNDRED),
        market: MarketSnapshot {
            instrument_id: id.to_string(),
            instrument_name: name.to_string(),
            bid: None,
            offer: None,
            status: None,
        },
    }
}
