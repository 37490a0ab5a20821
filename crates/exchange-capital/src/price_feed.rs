//! Streaming quote feed.
//!
//! Keeps one websocket open to the brokerage streaming endpoint, subscribes to
//! the instrument universe and writes every quote into the shared
//! [`QuoteCache`]. The gateway reads from that cache before falling back to
//! REST snapshots.
//!
//! ```text
//! streaming websocket (quote / marketData.update)
//!         │
//!         ▼
//! PriceFeed::run()
//!         │
//!         ▼
//! QuoteCache (shared Arc<RwLock>)
//!         │
//!         ▼
//! CapitalGateway::get_prices()
//! ```

use crate::client::{CapitalClient, SessionTokens};
use crate::normalize;
use auto_trade_core::{CapitalConfig, QuoteCache};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum PriceFeedError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed: {0}")]
    Closed(String),

    /// The REST session has not been opened, so there are no tokens to subscribe with.
    #[error("No session tokens available for streaming")]
    NoSession,
}

#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    pub url: String,
    /// Instrument ids to subscribe to.
    pub epics: Vec<String>,
    pub reconnect_delay: Duration,
    /// Send a ping after this long without traffic.
    pub heartbeat_idle: Duration,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://api-streaming-capital.backend-capital.com/connect".to_string(),
            epics: Vec::new(),
            reconnect_delay: Duration::from_secs(5),
            heartbeat_idle: Duration::from_secs(600),
        }
    }
}

impl PriceFeedConfig {
    #[must_use]
    pub fn from_capital(config: &CapitalConfig, epics: Vec<String>) -> Self {
        Self {
            url: config.ws_url.clone(),
            epics,
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            heartbeat_idle: Duration::from_secs(config.heartbeat_idle_secs),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriceFeedStats {
    pub messages_received: u64,
    pub quotes_applied: u64,
    pub parse_errors: u64,
    pub reconnects: u32,
    pub last_update: Option<DateTime<Utc>>,
}

/// Builds the subscription request for `epics`.
#[must_use]
pub fn subscribe_message(tokens: &SessionTokens, epics: &[String], correlation_id: u64) -> Value {
    json!({
        "destination": "marketData.subscribe",
        "correlationId": correlation_id.to_string(),
        "cst": tokens.cst,
        "securityToken": tokens.security_token,
        "payload": { "epics": epics },
    })
}

#[must_use]
pub fn ping_message(tokens: &SessionTokens, correlation_id: u64) -> Value {
    json!({
        "destination": "ping",
        "correlationId": correlation_id.to_string(),
        "cst": tokens.cst,
        "securityToken": tokens.security_token,
    })
}

pub struct PriceFeed {
    config: PriceFeedConfig,
    client: Arc<CapitalClient>,
    quotes: QuoteCache,
    stats: Arc<RwLock<PriceFeedStats>>,
    correlation: AtomicU64,
    should_stop: Arc<AtomicBool>,
}

impl PriceFeed {
    #[must_use]
    pub fn new(config: PriceFeedConfig, client: Arc<CapitalClient>, quotes: QuoteCache) -> Self {
        Self {
            config,
            client,
            quotes,
            stats: Arc::new(RwLock::new(PriceFeedStats::default())),
            correlation: AtomicU64::new(1),
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the returned flag stops the feed at its next wake-up.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.should_stop)
    }

    pub async fn stats(&self) -> PriceFeedStats {
        self.stats.read().await.clone()
    }

    fn stopped(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    fn next_correlation(&self) -> u64 {
        self.correlation.fetch_add(1, Ordering::Relaxed)
    }

    /// Streams until stopped, reconnecting after every disconnect.
    pub async fn run(&self) {
        info!(url = %self.config.url, epics = self.config.epics.len(), "Price feed starting");

        loop {
            if self.stopped() {
                info!("Price feed stopping on request");
                return;
            }

            match self.connect_and_stream().await {
                Ok(()) => {
                    info!("Price feed stopping on request");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "Price feed disconnected");
                    self.stats.write().await.reconnects += 1;
                    if self.stopped() {
                        return;
                    }
                    warn!(delay = ?self.config.reconnect_delay, "Reconnecting price feed");
                    tokio::time::sleep(self.config.reconnect_delay).await;
                }
            }
        }
    }

    /// One connection lifetime. `Ok` only when stopped on request.
    async fn connect_and_stream(&self) -> Result<(), PriceFeedError> {
        let tokens = self.client.session().await.ok_or(PriceFeedError::NoSession)?;

        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.config.url).await?;
        info!("Connected to streaming quotes");
        let (mut write, mut read) = ws_stream.split();

        let subscribe = subscribe_message(&tokens, &self.config.epics, self.next_correlation());
        write.send(Message::Text(subscribe.to_string())).await?;

        loop {
            if self.stopped() {
                return Ok(());
            }

            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_message(&text).await,
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "unknown".to_string());
                        return Err(PriceFeedError::Closed(reason));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(PriceFeedError::WebSocket(e)),
                    None => return Err(PriceFeedError::Closed("Stream ended".to_string())),
                },
                () = tokio::time::sleep(self.config.heartbeat_idle) => {
                    debug!("Price feed idle, sending ping");
                    let ping = ping_message(&tokens, self.next_correlation());
                    write.send(Message::Text(ping.to_string())).await?;
                }
            }
        }
    }

    async fn handle_message(&self, text: &str) {
        let mut stats = self.stats.write().await;
        stats.messages_received += 1;

        let message: Value = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                stats.parse_errors += 1;
                if stats.parse_errors <= 5 {
                    warn!(error = %e, "Unreadable streaming message");
                }
                return;
            }
        };

        let Some((epic, quote)) = normalize::stream_quote(&message) else {
            return;
        };
        if self.quotes.update(&epic, quote).await {
            stats.quotes_applied += 1;
            stats.last_update = Some(quote.timestamp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Credentials;
    use rust_decimal_macros::dec;

    fn feed(quotes: QuoteCache) -> PriceFeed {
        let client = CapitalClient::new(
            "http://127.0.0.1:9",
            Credentials::default(),
            Duration::from_secs(1),
            10,
        )
        .unwrap();
        PriceFeed::new(PriceFeedConfig::default(), Arc::new(client), quotes)
    }

    fn tokens() -> SessionTokens {
        SessionTokens {
            cst: "cst-token".to_string(),
            security_token: "sec-token".to_string(),
        }
    }

    #[test]
    fn test_config_default() {
        let config = PriceFeedConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.heartbeat_idle, Duration::from_secs(600));
        assert!(config.epics.is_empty());
    }

    #[test]
    fn test_subscribe_message_shape() {
        let msg = subscribe_message(&tokens(), &["GOLD".to_string(), "BTCUSD".to_string()], 7);

        assert_eq!(msg["destination"], "marketData.subscribe");
        assert_eq!(msg["correlationId"], "7");
        assert_eq!(msg["cst"], "cst-token");
        assert_eq!(msg["securityToken"], "sec-token");
        assert_eq!(msg["payload"]["epics"][1], "BTCUSD");
    }

    #[test]
    fn test_ping_message_shape() {
        let msg = ping_message(&tokens(), 3);
        assert_eq!(msg["destination"], "ping");
        assert!(msg.get("payload").is_none());
    }

    #[tokio::test]
    async fn test_stop_handle() {
        let feed = feed(QuoteCache::new());
        let stop = feed.stop_handle();
        assert!(!feed.stopped());
        stop.store(true, Ordering::SeqCst);
        assert!(feed.stopped());
    }

    #[tokio::test]
    async fn test_run_returns_once_stopped() {
        let feed = feed(QuoteCache::new());
        feed.stop_handle().store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(1), feed.run())
            .await
            .expect("feed should return when stopped");
    }

    #[tokio::test]
    async fn test_quote_message_updates_cache() {
        let quotes = QuoteCache::new();
        let feed = feed(quotes.clone());

        let msg = r#"{"status":"OK","destination":"quote","payload":{"epic":"GOLD","bid":2350.5,"ofr":2351.1,"timestamp":1718000000000}}"#;
        feed.handle_message(msg).await;

        let quote = quotes.get("GOLD").await.unwrap();
        assert_eq!(quote.buy, dec!(2350.5));
        assert_eq!(quote.sell, dec!(2351.1));
        let stats = feed.stats().await;
        assert_eq!(stats.quotes_applied, 1);
        assert!(stats.last_update.is_some());
    }

    #[tokio::test]
    async fn test_non_quote_messages_are_ignored() {
        let quotes = QuoteCache::new();
        let feed = feed(quotes.clone());

        feed.handle_message(r#"{"status":"OK","destination":"ping","payload":{}}"#)
            .await;
        feed.handle_message("not json").await;

        assert!(quotes.is_empty().await);
        let stats = feed.stats().await;
        assert_eq!(stats.messages_received, 2);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.quotes_applied, 0);
    }

    #[tokio::test]
    async fn test_zero_price_quote_is_dropped() {
        let quotes = QuoteCache::new();
        let feed = feed(quotes.clone());

        feed.handle_message(
            r#"{"destination":"marketData.update","payload":{"epic":"KO","bid":0,"offer":61.2}}"#,
        )
        .await;

        assert!(quotes.get("KO").await.is_none());
    }
}
