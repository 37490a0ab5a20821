use auto_trade_core::{EngineConfig, GatewayError, MarketGateway, Quote};
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded exponential backoff for quote lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(attempts: u32, base: Duration) -> Self {
        Self { attempts, base }
    }

    #[must_use]
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.quote_retry_attempts,
            Duration::from_millis(config.quote_retry_base_ms),
        )
    }

    /// Delay after failed attempt `attempt` (zero-based): `base * 2^attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Fetches a valid quote, retrying misses and transient failures.
///
/// `Ok(None)` after the last attempt. An authentication error is returned at
/// once so the calling loop can surface it.
///
/// # Errors
/// Returns [`GatewayError::Auth`] when the gateway refuses the session.
pub async fn fetch_quote(
    gateway: &dyn MarketGateway,
    instrument_id: &str,
    policy: RetryPolicy,
) -> Result<Option<Quote>, GatewayError> {
    for attempt in 0..policy.attempts {
        match gateway.get_prices(instrument_id).await {
            Ok(Some(quote)) if quote.is_valid() => return Ok(Some(quote)),
            Ok(_) => debug!(instrument = instrument_id, attempt, "No usable quote"),
            Err(e) if e.is_auth() => {
                warn!(instrument = instrument_id, error = %e, "Quote lookup refused");
                return Err(e);
            }
            Err(e) => debug!(instrument = instrument_id, attempt, error = %e, "Quote lookup failed"),
        }

        if attempt + 1 < policy.attempts {
            tokio::time::sleep(policy.delay(attempt)).await;
        }
    }

    warn!(
        instrument = instrument_id,
        attempts = policy.attempts,
        "Quote unavailable, skipping"
    );
    Ok(None)
}

/// Whether `error` was caused by a refused gateway session.
pub(crate) fn is_auth_failure(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<GatewayError>().is_some_and(GatewayError::is_auth))
}
