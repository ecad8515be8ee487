use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_objects::price::Price;

/// One per-second sample from the underlying's tick stream.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: Price,
    pub volume: f64,
}

/// Duration-bounded ring buffer of recent ticks.
///
/// Holds the last `max_age` of per-second samples (default 20 minutes) and
/// answers the windowed queries the VWAP calculator and signal scorer need.
/// Ticks are assumed to arrive in timestamp order; the buffer is trimmed
/// against the newest sample, never the wall clock.
#[derive(Debug)]
pub struct TickWindow {
    max_age: Duration,
    ticks: VecDeque<Tick>,
    previous_close: Option<Price>,
    session_open: Option<Price>,
}

impl TickWindow {
    pub fn new(max_age_secs: u64) -> Self {
        TickWindow {
            max_age: Duration::seconds(max_age_secs as i64),
            ticks: VecDeque::new(),
            previous_close: None,
            session_open: None,
        }
    }

    pub fn push(&mut self, tick: Tick) {
        if self.session_open.is_none() {
            self.session_open = Some(tick.price);
        }
        self.ticks.push_back(tick);

        let cutoff = tick.timestamp - self.max_age;
        while let Some(front) = self.ticks.front() {
            if front.timestamp < cutoff {
                self.ticks.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn latest(&self) -> Option<&Tick> {
        self.ticks.back()
    }

    /// Reference close for gap measurement. Falls back to the session's
    /// first print when no prior close was supplied.
    pub fn gap_reference(&self) -> Option<Price> {
        self.previous_close.or(self.session_open)
    }

    pub fn set_previous_close(&mut self, close: Price) {
        self.previous_close = Some(close);
    }

    /// Volume-weighted average price over the trailing duration. None when
    /// the window holds no volume.
    pub fn vwap_over(&self, duration: Duration) -> Option<f64> {
        let newest = self.ticks.back()?.timestamp;
        let cutoff = newest - duration;
        let mut pv = 0.0;
        let mut volume = 0.0;
        for tick in self.ticks.iter().rev() {
            if tick.timestamp < cutoff {
                break;
            }
            pv += tick.price.value() * tick.volume;
            volume += tick.volume;
        }
        if volume > f64::EPSILON {
            Some(pv / volume)
        } else {
            None
        }
    }

    /// Last `n` trade prices, oldest first.
    pub fn recent_prices(&self, n: usize) -> Vec<f64> {
        let skip = self.ticks.len().saturating_sub(n);
        self.ticks.iter().skip(skip).map(|t| t.price.value()).collect()
    }

    /// Last `n` volume samples, oldest first.
    pub fn recent_volumes(&self, n: usize) -> Vec<f64> {
        let skip = self.ticks.len().saturating_sub(n);
        self.ticks.iter().skip(skip).map(|t| t.volume).collect()
    }

    /// Price change per second over the trailing duration. None with fewer
    /// than two samples in range.
    pub fn momentum_per_sec(&self, duration: Duration) -> Option<f64> {
        let newest = self.ticks.back()?;
        let cutoff = newest.timestamp - duration;
        let oldest = self
            .ticks
            .iter()
            .find(|t| t.timestamp >= cutoff)
            .copied()?;
        let elapsed = (newest.timestamp - oldest.timestamp).num_seconds();
        if elapsed <= 0 {
            return None;
        }
        let base = oldest.price.value();
        if base == 0.0 {
            return None;
        }
        Some((newest.price.value() - base) / base / elapsed as f64)
    }

    /// Drop all samples at day rollover. The last price seen becomes the
    /// next session's gap reference.
    pub fn reset_day(&mut self) {
        self.previous_close = self.ticks.back().map(|t| t.price);
        self.ticks.clear();
        self.session_open = None;
    }
}
