//! Decision and risk loops for the auto-trade engine.
//!
//! A [`TradingContext`] carries configuration, the settings store, the
//! notifier and (once connected) the gateway. [`TradingRuntime`] spawns the
//! entry scheduler and the position monitors over that context and joins
//! them on shutdown.

pub mod context;
pub mod entry_scheduler;
pub mod notify;
pub mod position_monitor;
pub mod report;
pub mod retry;
pub mod runner;
pub mod runtime;
pub mod settings_store;
pub mod shutdown;

pub use context::TradingContext;
pub use entry_scheduler::{CycleReport, EntryOutcome, EntryScheduler, IdleReason, SkipReason};
pub use notify::{ChannelNotifier, FanoutNotifier, LogNotifier, StatusMessage, TelegramNotifier};
pub use position_monitor::{PositionRefresher, StopLossMonitor, TrailingStopMonitor};
pub use report::StatusReporter;
pub use retry::{fetch_quote, RetryPolicy};
pub use runtime::TradingRuntime;
pub use settings_store::SettingsStore;
pub use shutdown::Shutdown;
