use std::collections::VecDeque;

use crate::domain::value_objects::price::Price;

/// Session-cumulative volume-weighted average price.
///
/// Accumulates monotonically within a session and is reset at session
/// start. Zero-volume sessions yield `None` rather than a fabricated value.
#[derive(Debug)]
pub struct SessionVwap {
    cumulative_pv: f64,
    cumulative_volume: f64,
    recent: VecDeque<f64>,
    recent_cap: usize,
}

impl SessionVwap {
    pub fn new() -> Self {
        SessionVwap {
            cumulative_pv: 0.0,
            cumulative_volume: 0.0,
            recent: VecDeque::new(),
            recent_cap: 60,
        }
    }

    pub fn update(&mut self, price: Price, volume: f64) -> Option<f64> {
        if volume > 0.0 && volume.is_finite() {
            self.cumulative_pv += price.value() * volume;
            self.cumulative_volume += volume;
        }
        let value = self.value();
        if let Some(v) = value {
            self.recent.push_back(v);
            while self.recent.len() > self.recent_cap {
                self.recent.pop_front();
            }
        }
        value
    }

    pub fn value(&self) -> Option<f64> {
        if self.cumulative_volume > f64::EPSILON {
            Some(self.cumulative_pv / self.cumulative_volume)
        } else {
            None
        }
    }

    /// Whether the VWAP has risen over the last `samples` updates.
    pub fn rising(&self, samples: usize) -> bool {
        if self.recent.len() <= samples {
            return false;
        }
        let newest = match self.recent.back() {
            Some(v) => *v,
            None => return false,
        };
        let reference = self.recent[self.recent.len() - 1 - samples];
        newest > reference
    }

    pub fn reset(&mut self) {
        self.cumulative_pv = 0.0;
        self.cumulative_volume = 0.0;
        self.recent.clear();
    }
}

impl Default for SessionVwap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(v: f64) -> Price {
        Price::new(v).unwrap()
    }

    #[test]
    fn test_vwap_accumulates() {
        let mut vwap = SessionVwap::new();
        assert!(vwap.value().is_none());
        vwap.update(price(240.0), 100.0);
        vwap.update(price(242.0), 300.0);
        let expected = (240.0 * 100.0 + 242.0 * 300.0) / 400.0;
        assert!((vwap.value().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_vwap_ignores_zero_volume() {
        let mut vwap = SessionVwap::new();
        vwap.update(price(240.0), 0.0);
        assert!(vwap.value().is_none());
        vwap.update(price(241.0), 50.0);
        assert!((vwap.value().unwrap() - 241.0).abs() < 1e-9);
    }

    #[test]
    fn test_vwap_reset() {
        let mut vwap = SessionVwap::new();
        vwap.update(price(240.0), 100.0);
        vwap.reset();
        assert!(vwap.value().is_none());
        assert!(!vwap.rising(1));
    }

    #[test]
    fn test_vwap_rising() {
        let mut vwap = SessionVwap::new();
        // Rising trade prices above the running average pull VWAP up.
        for i in 0..20 {
            vwap.update(price(240.0 + i as f64 * 0.1), 100.0);
        }
        assert!(vwap.rising(10));

        let mut falling = SessionVwap::new();
        for i in 0..20 {
            falling.update(price(242.0 - i as f64 * 0.1), 100.0);
        }
        assert!(!falling.rising(10));
    }
}
