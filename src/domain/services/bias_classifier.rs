use std::collections::VecDeque;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::domain::entities::bar::Bar;
use crate::domain::entities::bias::{BarType, Bias, BiasDirection};
use crate::domain::services::market_clock;
use crate::domain::value_objects::price::Price;

/// Result of classifying a completed overnight bar.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub bar_type: BarType,
    /// Directional bias, absent on inside/outside bars.
    pub bias: Option<Bias>,
    /// Informational trigger levels even when no bias was set.
    pub trigger_high: Price,
    pub trigger_low: Price,
}

/// Classifies the 12-hour overnight bar (15:00-03:00 ET) against the prior
/// stored bar into inside / break-up / break-down / outside, producing the
/// day's directional bias and trigger levels.
///
/// Fires at most once per trading day, and only for bars whose close
/// timestamp lands in the 03:00:00-03:00:30 ET gate. Keeps a bounded
/// history of recent overnight bars plus the most recent inside bar's
/// high/low: when a directional break follows an inside bar, the inside
/// bar's levels are the tighter coil boundary and become the triggers.
#[derive(Debug)]
pub struct OvernightBiasClassifier {
    history: VecDeque<Bar>,
    max_history: usize,
    inside_coil: Option<(Price, Price)>,
    last_classified_day: Option<NaiveDate>,
}

impl OvernightBiasClassifier {
    pub fn new(max_history: usize) -> Self {
        OvernightBiasClassifier {
            history: VecDeque::new(),
            max_history: max_history.max(2),
            inside_coil: None,
            last_classified_day: None,
        }
    }

    /// Process a completed overnight bar. Returns `None` when the gate
    /// rejects the bar (wrong close time, already classified today) or when
    /// there is no prior bar to compare against; both are degraded days
    /// with the strategy inactive, never fabricated biases.
    pub fn on_overnight_bar(&mut self, bar: Bar) -> Option<Classification> {
        if !market_clock::is_overnight_close_gate(bar.timestamp) {
            debug!(
                "Overnight bar close {} outside the 03:00 ET gate, ignored",
                bar.timestamp
            );
            return None;
        }

        let day = market_clock::trading_day(bar.timestamp);
        if self.last_classified_day == Some(day) {
            debug!("Overnight bar for {} already classified", day);
            return None;
        }

        let previous = self.history.back().copied();
        self.history.push_back(bar);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
        self.last_classified_day = Some(day);

        let previous = match previous {
            Some(prev) => prev,
            None => {
                warn!("No prior overnight bar to compare against; degraded day, no bias");
                return None;
            }
        };

        Some(self.classify(bar, previous))
    }

    fn classify(&mut self, current: Bar, previous: Bar) -> Classification {
        if current.is_inside(&previous) {
            // The coil tightens: remember this bar's range for the next break.
            self.inside_coil = Some((current.high, current.low));
            info!(
                "Overnight bar type 1 (inside): high {} low {}, no bias",
                current.high, current.low
            );
            return Classification {
                bar_type: BarType::Inside,
                bias: None,
                trigger_high: current.high,
                trigger_low: current.low,
            };
        }

        let (bar_type, direction, distance, broken_level) =
            if current.close > previous.high {
                (
                    BarType::BreakUp,
                    BiasDirection::Calls,
                    current.close.value() - previous.high.value(),
                    previous.high,
                )
            } else if current.close < previous.low {
                (
                    BarType::BreakDown,
                    BiasDirection::Puts,
                    previous.low.value() - current.close.value(),
                    previous.low,
                )
            } else {
                self.inside_coil = None;
                info!(
                    "Overnight bar expanded without a directional close, no bias"
                );
                return Classification {
                    bar_type: BarType::Outside,
                    bias: None,
                    trigger_high: current.high,
                    trigger_low: current.low,
                };
            };

        let confidence = Self::confidence(distance, previous.range());
        let (trigger_high, trigger_low) = self
            .inside_coil
            .take()
            .unwrap_or((current.high, current.low));

        let bias = Bias::new(
            direction,
            confidence,
            trigger_high,
            trigger_low,
            current.timestamp,
        )
        .ok();

        match bias {
            Some(b) => info!(
                "Overnight bias set: {} ({}), confidence {:.2}, triggers {}/{} (broke {})",
                b.direction, bar_type, b.confidence, b.trigger_high, b.trigger_low, broken_level
            ),
            None => warn!("Overnight bias construction failed; degraded day"),
        }

        Classification {
            bar_type,
            bias,
            trigger_high,
            trigger_low,
        }
    }

    /// Confidence starts at 0.7 for any directional close and grows with the
    /// distance of the close beyond the broken level, scaled against the
    /// prior bar's range.
    fn confidence(distance: f64, prev_range: f64) -> f64 {
        if prev_range <= f64::EPSILON {
            return 0.7;
        }
        (0.7 + 0.25 * (distance / prev_range)).min(1.0)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Day rollover without a fresh overnight bar clears nothing here: the
    /// bar history spans days by design. Only the once-per-day latch resets.
    pub fn reset_daily_latch(&mut self) {
        self.last_classified_day = None;
    }
}
