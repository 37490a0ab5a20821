use crate::snapshot::compute_snapshot;
use crate::voting::{
    manual_decision, manual_tally, strong_decision, strong_tally, weak_tally, RsiThresholds,
    VoteTally,
};
use auto_trade_core::{
    Direction, IndicatorSet, IndicatorSnapshot, MarketGateway, Resolution, SignalTier,
};
use tracing::{debug, warn};

/// Data requirements for a tier: resolutions tried in order, how many bars
/// to request and how many must come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierProfile {
    pub resolutions: &'static [Resolution],
    pub count: usize,
    pub min_bars: usize,
}

impl TierProfile {
    /// Recent minute bars behind the indicator snapshot of an exit review.
    pub const EXIT_REVIEW: Self = Self {
        resolutions: &[Resolution::Minute],
        count: 30,
        min_bars: 1,
    };

    /// `None` for TEST, which never looks at data.
    #[must_use]
    pub const fn for_tier(tier: SignalTier) -> Option<Self> {
        match tier {
            SignalTier::Test => None,
            SignalTier::Manual => Some(Self {
                resolutions: &[
                    Resolution::Hour,
                    Resolution::Hour4,
                    Resolution::Day,
                    Resolution::Minute,
                ],
                count: 50,
                min_bars: 20,
            }),
            SignalTier::Weak => Some(Self {
                resolutions: &[Resolution::Hour, Resolution::Day],
                count: 50,
                min_bars: 14,
            }),
            SignalTier::Strong => Some(Self {
                resolutions: &[Resolution::Hour, Resolution::Hour4, Resolution::Day],
                count: 200,
                min_bars: 50,
            }),
        }
    }
}

/// Result of one evaluation. `direction` is `None` for "no signal".
#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutcome {
    pub tier: SignalTier,
    pub direction: Option<Direction>,
    pub resolution: Option<Resolution>,
    pub bars: usize,
    pub tally: VoteTally,
    pub snapshot: Option<IndicatorSnapshot>,
}

impl SignalOutcome {
    fn none(tier: SignalTier) -> Self {
        Self {
            tier,
            direction: None,
            resolution: None,
            bars: 0,
            tally: VoteTally::default(),
            snapshot: None,
        }
    }
}

/// Historical sample set selected for a tier.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub resolution: Resolution,
    pub closes: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignalEngine {
    thresholds: RsiThresholds,
}

impl SignalEngine {
    #[must_use]
    pub const fn new(thresholds: RsiThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub const fn thresholds(&self) -> RsiThresholds {
        self.thresholds
    }

    /// Fetches bars and computes a direction for `instrument_id`.
    ///
    /// Never fails: missing or insufficient data is reported as no signal.
    pub async fn evaluate(
        &self,
        gateway: &dyn MarketGateway,
        instrument_id: &str,
        tier: SignalTier,
        indicators: &IndicatorSet,
    ) -> SignalOutcome {
        let Some(profile) = TierProfile::for_tier(tier) else {
            return self.decide(tier, &[], indicators);
        };

        match fetch_bars(gateway, instrument_id, &profile).await {
            Some(series) => {
                let mut outcome = self.decide(tier, &series.closes, indicators);
                outcome.resolution = Some(series.resolution);
                debug!(
                    instrument = instrument_id,
                    tier = %tier,
                    resolution = %series.resolution,
                    bars = series.closes.len(),
                    buy_votes = outcome.tally.buy,
                    sell_votes = outcome.tally.sell,
                    direction = ?outcome.direction,
                    "Signal evaluated"
                );
                outcome
            }
            None => {
                debug!(instrument = instrument_id, tier = %tier, "Not enough history for signal");
                SignalOutcome::none(tier)
            }
        }
    }

    /// Applies the tier's voting rule to an already-fetched close series.
    #[must_use]
    pub fn decide(&self, tier: SignalTier, closes: &[f64], indicators: &IndicatorSet) -> SignalOutcome {
        if tier == SignalTier::Test {
            return SignalOutcome {
                direction: Some(Direction::Buy),
                ..SignalOutcome::none(tier)
            };
        }

        if let Some(profile) = TierProfile::for_tier(tier) {
            if closes.len() < profile.min_bars {
                return SignalOutcome::none(tier);
            }
        }

        let Some(snapshot) = compute_snapshot(closes) else {
            return SignalOutcome::none(tier);
        };

        let (tally, direction) = match tier {
            SignalTier::Manual => {
                let tally = manual_tally(&snapshot, indicators, &self.thresholds);
                (tally, manual_decision(&tally))
            }
            SignalTier::Weak => {
                let tally = weak_tally(&snapshot, &self.thresholds);
                (tally, tally.decide(1))
            }
            SignalTier::Strong => {
                let tally = strong_tally(&snapshot, &self.thresholds);
                (tally, strong_decision(&tally))
            }
            SignalTier::Test => (VoteTally::default(), Some(Direction::Buy)),
        };

        SignalOutcome {
            tier,
            direction,
            resolution: None,
            bars: closes.len(),
            tally,
            snapshot: Some(snapshot),
        }
    }
}

/// Tries each resolution of `profile` in order and returns the first series
/// holding at least `min_bars` samples.
///
/// A gateway error on one resolution is logged and the next one is tried.
pub async fn fetch_bars(
    gateway: &dyn MarketGateway,
    instrument_id: &str,
    profile: &TierProfile,
) -> Option<BarSeries> {
    for &resolution in profile.resolutions {
        match gateway
            .get_historical_prices(instrument_id, resolution, profile.count)
            .await
        {
            Ok(bars) if bars.len() >= profile.min_bars => {
                return Some(BarSeries {
                    resolution,
                    closes: bars.into_iter().map(|b| b.close).collect(),
                });
            }
            Ok(bars) => {
                debug!(
                    instrument = instrument_id,
                    resolution = %resolution,
                    bars = bars.len(),
                    required = profile.min_bars,
                    "Too few bars, trying next resolution"
                );
            }
            Err(e) => {
                warn!(
                    instrument = instrument_id,
                    resolution = %resolution,
                    error = %e,
                    "Historical price request failed"
                );
            }
        }
    }
    None
}
