use crate::context::TradingContext;
use auto_trade_core::NotifyLevel;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Drives one periodic task until shutdown.
///
/// A failed iteration is logged, reported and followed by the error backoff
/// instead of the regular interval. The loop itself never ends on an error.
pub async fn drive<F, Fut>(
    ctx: &TradingContext,
    task: &'static str,
    initial_delay: Duration,
    interval: Duration,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    info!(task, interval = ?interval, "Loop starting");
    if !initial_delay.is_zero() && ctx.shutdown.sleep(initial_delay).await {
        info!(task, "Loop stopped");
        return;
    }

    loop {
        if ctx.shutdown.is_triggered() {
            break;
        }

        let delay = match cycle().await {
            Ok(()) => interval,
            Err(e) => {
                error!(task, error = %format!("{e:#}"), "Loop iteration failed");
                ctx.notify(&format!("{task} error: {e:#}"), NotifyLevel::Error)
                    .await;
                ctx.config.error_backoff()
            }
        };

        if ctx.shutdown.sleep(delay).await {
            break;
        }
    }
    info!(task, "Loop stopped");
}
