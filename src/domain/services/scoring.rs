use chrono::Duration;

use crate::domain::entities::bias::BiasDirection;
use crate::domain::services::indicators;
use crate::domain::services::tick_window::TickWindow;
use crate::domain::services::vwap::SessionVwap;

/// Weights for the combined signal score. One parameterized scorer covers
/// what used to be separate momentum / gap / volume / strength code paths.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub momentum: f64,
    pub gap: f64,
    pub volume: f64,
    pub strength: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            momentum: 0.3,
            gap: 0.2,
            volume: 0.3,
            strength: 0.2,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.momentum + self.gap + self.volume + self.strength
    }

    /// Overlay weights from environment variables onto a base set.
    pub fn from_env(base: ScoreWeights) -> ScoreWeights {
        let mut weights = base;
        for (key, slot) in [
            ("SCORE_MOMENTUM_WEIGHT", &mut weights.momentum),
            ("SCORE_GAP_WEIGHT", &mut weights.gap),
            ("SCORE_VOLUME_WEIGHT", &mut weights.volume),
            ("SCORE_STRENGTH_WEIGHT", &mut weights.strength),
        ] {
            if let Ok(raw) = std::env::var(key) {
                match raw.parse::<f64>() {
                    Ok(value) if (0.0..=1.0).contains(&value) => *slot = value,
                    _ => tracing::warn!("Invalid {} '{}', keeping {}", key, raw, *slot),
                }
            }
        }
        weights
    }
}

/// Component scores in [0, 1] plus the weighted combination.
#[derive(Debug, Clone, Copy)]
pub struct SignalScore {
    pub momentum: f64,
    pub gap: f64,
    pub volume: f64,
    pub strength: f64,
    pub combined: f64,
}

/// Scores how well the recent tape supports trading in a given direction.
///
/// Components:
/// - momentum: short-horizon price change per second in the direction,
///   with the session VWAP rising (calls) or falling (puts);
/// - gap: open versus the prior close, volume-confirmed;
/// - volume: z-score of the latest volume against the trailing profile;
/// - strength: share of recent prices on the direction's side of VWAP.
#[derive(Debug, Clone)]
pub struct SignalScorer {
    weights: ScoreWeights,
    momentum_threshold_per_sec: f64,
    gap_threshold: f64,
}

impl SignalScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        SignalScorer {
            weights,
            // 0.05% per second saturates the momentum component.
            momentum_threshold_per_sec: 0.0005,
            // 0.5% gap saturates the gap component.
            gap_threshold: 0.005,
        }
    }

    pub fn score(
        &self,
        window: &TickWindow,
        session_vwap: &SessionVwap,
        direction: BiasDirection,
    ) -> SignalScore {
        let sign = match direction {
            BiasDirection::Calls => 1.0,
            BiasDirection::Puts => -1.0,
            BiasDirection::None => {
                return SignalScore {
                    momentum: 0.0,
                    gap: 0.0,
                    volume: 0.0,
                    strength: 0.0,
                    combined: 0.0,
                }
            }
        };

        let momentum = self.momentum_score(window, session_vwap, sign);
        let gap = self.gap_score(window, sign);
        let volume = self.volume_score(window);
        let strength = self.strength_score(window, session_vwap, sign);

        let total = self.weights.total();
        let combined = if total > 0.0 {
            (momentum * self.weights.momentum
                + gap * self.weights.gap
                + volume * self.weights.volume
                + strength * self.weights.strength)
                / total
        } else {
            0.0
        };

        SignalScore {
            momentum,
            gap,
            volume,
            strength,
            combined,
        }
    }

    fn momentum_score(&self, window: &TickWindow, vwap: &SessionVwap, sign: f64) -> f64 {
        let per_sec = match window.momentum_per_sec(Duration::seconds(30)) {
            Some(m) => m * sign,
            None => return 0.0,
        };
        let mut score = (per_sec / self.momentum_threshold_per_sec).clamp(0.0, 1.0);

        // Price on the right side of the short (1-minute) VWAP.
        let one_minute_aligned = match (window.vwap_over(Duration::seconds(60)), window.latest()) {
            (Some(v), Some(last)) => (last.price.value() - v) * sign > 0.0,
            _ => false,
        };
        if !one_minute_aligned {
            score *= 0.5;
        }

        // Session VWAP drifting with, not against, the direction.
        let vwap_trending = if sign > 0.0 {
            vwap.rising(10)
        } else {
            !vwap.rising(10)
        };
        if !vwap_trending {
            score *= 0.5;
        }
        score
    }

    fn gap_score(&self, window: &TickWindow, sign: f64) -> f64 {
        let reference = match window.gap_reference() {
            Some(r) if r.value() > 0.0 => r.value(),
            _ => return 0.0,
        };
        let last = match window.latest() {
            Some(t) => t.price.value(),
            None => return 0.0,
        };
        let gap = (last - reference) / reference * sign;
        if gap <= 0.0 {
            return 0.0;
        }
        let base = (gap / self.gap_threshold).clamp(0.0, 1.0);

        // Gap counts for more when volume confirms it.
        let volumes = window.recent_volumes(10);
        let latest = volumes.last().copied().unwrap_or(0.0);
        let confirmed = indicators::mean(&volumes)
            .map(|avg| latest > avg * 1.5)
            .unwrap_or(false);
        if confirmed {
            base
        } else {
            base * 0.5
        }
    }

    fn volume_score(&self, window: &TickWindow) -> f64 {
        let volumes = window.recent_volumes(100);
        if volumes.len() < 2 {
            return 0.0;
        }
        let (history, latest) = volumes.split_at(volumes.len() - 1);
        match indicators::zscore(latest[0], history) {
            // Three sigmas of volume surge saturate the component.
            Some(z) => (z / 3.0).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    fn strength_score(&self, window: &TickWindow, vwap: &SessionVwap, sign: f64) -> f64 {
        let vwap = match vwap.value() {
            Some(v) => v,
            None => return 0.0,
        };
        let prices = window.recent_prices(30);
        if prices.is_empty() {
            return 0.0;
        }
        let on_side = prices
            .iter()
            .filter(|p| (**p - vwap) * sign > 0.0)
            .count();
        on_side as f64 / prices.len() as f64
    }
}
