use crate::context::TradingContext;
use crate::entry_scheduler::EntryScheduler;
use crate::position_monitor::{PositionRefresher, StopLossMonitor, TrailingStopMonitor};
use crate::report::StatusReporter;
use anyhow::{Context, Result};
use auto_trade_core::{MarketGateway, NotifyLevel};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Owns the background loops and stops them together.
pub struct TradingRuntime {
    ctx: Arc<TradingContext>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl TradingRuntime {
    #[must_use]
    pub fn new(ctx: Arc<TradingContext>) -> Self {
        Self {
            ctx,
            handles: Vec::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<TradingContext> {
        &self.ctx
    }

    /// Logs in and publishes the gateway to every loop.
    ///
    /// # Errors
    /// Returns an error if login fails or a gateway was already connected.
    pub async fn connect(&self, gateway: Arc<dyn MarketGateway>) -> Result<()> {
        gateway.login().await.context("gateway login failed")?;
        if !self.ctx.set_gateway(gateway) {
            anyhow::bail!("gateway already connected");
        }
        info!("Gateway connected");
        Ok(())
    }

    /// Spawns the entry scheduler, refresher, both stop monitors and the reporter.
    pub fn start(&mut self) {
        let ctx = &self.ctx;
        let entry = EntryScheduler::new(Arc::clone(ctx));
        let refresher = PositionRefresher::new(Arc::clone(ctx));
        let trailing = TrailingStopMonitor::new(Arc::clone(ctx));
        let stop_loss = StopLossMonitor::new(Arc::clone(ctx));
        let reporter = StatusReporter::new(Arc::clone(ctx));

        self.spawn("entry scheduler", entry.run());
        self.spawn("position refresher", refresher.run());
        self.spawn("trailing-stop monitor", trailing.run());
        self.spawn("stop-loss monitor", stop_loss.run());
        self.spawn("status reporter", reporter.run());
    }

    /// Adds a task joined on shutdown. The task must watch
    /// [`TradingContext::shutdown`] (or its own stop flag) to finish.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push((name, tokio::spawn(task)));
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Signals every loop to stop and waits for all of them.
    pub async fn shutdown(self) {
        info!(tasks = self.handles.len(), "Shutting down");
        self.ctx.shutdown.trigger();
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "Task ended abnormally");
            }
        }
        self.ctx.notify("Engine stopped", NotifyLevel::Info).await;
    }
}
