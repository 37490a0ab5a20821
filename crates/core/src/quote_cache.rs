use crate::market::Quote;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide last-quote table written by the price feed.
#[derive(Debug, Clone, Default)]
pub struct QuoteCache {
    quotes: Arc<RwLock<HashMap<String, Quote>>>,
}

impl QuoteCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `quote` unless it is missing a side.
    pub async fn update(&self, instrument_id: &str, quote: Quote) -> bool {
        if !quote.is_valid() {
            return false;
        }
        self.quotes
            .write()
            .await
            .insert(instrument_id.to_string(), quote);
        true
    }

    pub async fn get(&self, instrument_id: &str) -> Option<Quote> {
        self.quotes.read().await.get(instrument_id).copied()
    }

    pub async fn len(&self) -> usize {
        self.quotes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.quotes.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_update_and_get() {
        let cache = QuoteCache::new();
        assert!(cache.update("GOLD", Quote::new(dec!(2300.1), dec!(2300.5))).await);
        let quote = cache.get("GOLD").await.unwrap();
        assert_eq!(quote.sell, dec!(2300.5));
        assert!(cache.get("OIL_CRUDE").await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_one_sided_quote() {
        let cache = QuoteCache::new();
        assert!(!cache.update("GOLD", Quote::new(Decimal::ZERO, dec!(1))).await);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = QuoteCache::new();
        let reader = cache.clone();
        cache.update("BTCUSD", Quote::new(dec!(65000), dec!(65010))).await;
        assert_eq!(reader.len().await, 1);
    }
}
