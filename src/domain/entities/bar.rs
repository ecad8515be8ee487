use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::price::Price;

/// Immutable snapshot of a completed interval: the 12-hour overnight bar or
/// an intraday 5-minute candle. Created once at the interval boundary and
/// never mutated afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Bar {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl Bar {
    pub fn new(
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let bar = Bar {
            open: Price::new(open)?,
            high: Price::new(high)?,
            low: Price::new(low)?,
            close: Price::new(close)?,
            volume,
            timestamp,
        };
        if !volume.is_finite() || volume < 0.0 {
            return Err(ValidationError::InvalidBar(format!(
                "volume {} is not a non-negative finite number",
                volume
            )));
        }
        if high < low {
            return Err(ValidationError::InvalidBar(format!(
                "high {} below low {}",
                high, low
            )));
        }
        if open > high || open < low || close > high || close < low {
            return Err(ValidationError::InvalidBar(format!(
                "open {} / close {} outside [{}, {}]",
                open, close, low, high
            )));
        }
        Ok(bar)
    }

    /// Inside bar: fully contained within the previous bar's range.
    pub fn is_inside(&self, prev: &Bar) -> bool {
        self.high <= prev.high && self.low >= prev.low
    }

    pub fn range(&self) -> f64 {
        self.high.value() - self.low.value()
    }
}

/// Raw bar record as delivered by the market-data collaborator, before
/// validation. Malformed records are logged and skipped by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarRecord {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl BarRecord {
    pub fn validate(&self) -> Result<Bar, ValidationError> {
        Bar::new(
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.timestamp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        "2025-10-02T07:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_bar_new_valid() {
        let bar = Bar::new(240.5, 241.93, 240.19, 241.2, 1_000_000.0, ts()).unwrap();
        assert_eq!(bar.high.value(), 241.93);
        assert!((bar.range() - 1.74).abs() < 1e-9);
    }

    #[test]
    fn test_bar_rejects_inverted_range() {
        assert!(Bar::new(240.0, 239.0, 241.0, 240.0, 0.0, ts()).is_err());
    }

    #[test]
    fn test_bar_rejects_close_outside_range() {
        assert!(Bar::new(240.0, 241.0, 239.0, 242.0, 0.0, ts()).is_err());
    }

    #[test]
    fn test_bar_rejects_negative_volume() {
        assert!(Bar::new(240.0, 241.0, 239.0, 240.5, -5.0, ts()).is_err());
    }

    #[test]
    fn test_is_inside() {
        let prev = Bar::new(240.0, 240.80, 239.50, 240.3, 0.0, ts()).unwrap();
        let inside = Bar::new(240.0, 240.70, 239.60, 240.1, 0.0, ts()).unwrap();
        let outside = Bar::new(240.3, 241.93, 240.19, 241.2, 0.0, ts()).unwrap();
        assert!(inside.is_inside(&prev));
        assert!(!outside.is_inside(&prev));
    }

    #[test]
    fn test_bar_record_validate() {
        let record = BarRecord {
            timestamp: ts(),
            open: 240.5,
            high: 241.93,
            low: 240.19,
            close: 241.2,
            volume: 12.0,
        };
        assert!(record.validate().is_ok());

        let bad = BarRecord {
            high: f64::NAN,
            ..record
        };
        assert!(bad.validate().is_err());
    }
}
