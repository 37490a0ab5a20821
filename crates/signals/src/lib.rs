pub mod engine;
pub mod indicators;
pub mod snapshot;
pub mod voting;

pub use engine::{fetch_bars, BarSeries, SignalEngine, SignalOutcome, TierProfile};
pub use snapshot::compute_snapshot;
pub use voting::{RsiThresholds, VoteTally};
