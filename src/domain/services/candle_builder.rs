use chrono::{DateTime, TimeZone, Utc};

use crate::domain::entities::bar::Bar;
use crate::domain::services::market_clock;
use crate::domain::services::tick_window::Tick;

/// In-progress candle accumulator.
#[derive(Debug, Clone, Copy)]
struct Building {
    bucket: i64,
    opened_at: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Assembles clock-aligned 5-minute candles from the tick stream.
///
/// Candles open on :00/:05/:10... ET boundaries. A candle completes when
/// the first tick of the next bucket arrives; the completed bar is returned
/// so close-driven logic (confirmation, invalidation) runs exactly once per
/// interval, in arrival order.
#[derive(Debug, Default)]
pub struct FiveMinuteCandleBuilder {
    current: Option<Building>,
}

impl FiveMinuteCandleBuilder {
    pub fn new() -> Self {
        FiveMinuteCandleBuilder { current: None }
    }

    pub fn on_tick(&mut self, tick: &Tick) -> Option<Bar> {
        let bucket = market_clock::five_minute_bucket(tick.timestamp);
        let price = tick.price.value();

        match self.current {
            Some(ref mut building) if building.bucket == bucket => {
                building.high = building.high.max(price);
                building.low = building.low.min(price);
                building.close = price;
                building.volume += tick.volume;
                None
            }
            _ => {
                let completed = self.current.take().and_then(Self::finish);
                self.current = Some(Building {
                    bucket,
                    opened_at: Utc
                        .timestamp_opt(bucket * 300, 0)
                        .single()
                        .unwrap_or(tick.timestamp),
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: tick.volume,
                });
                completed
            }
        }
    }

    /// Close out whatever is building, e.g. at day rollover.
    pub fn flush(&mut self) -> Option<Bar> {
        self.current.take().and_then(Self::finish)
    }

    fn finish(building: Building) -> Option<Bar> {
        // Construction from ticks keeps open/close inside [low, high], so
        // this only fails on non-finite input already rejected upstream.
        Bar::new(
            building.open,
            building.high,
            building.low,
            building.close,
            building.volume,
            building.opened_at,
        )
        .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::price::Price;
    use chrono::Duration;

    fn tick(offset_secs: i64, price: f64, volume: f64) -> Tick {
        // 14:00 UTC = 10:00 ET, on a 5-minute boundary.
        let base: DateTime<Utc> = "2025-10-02T14:00:00Z".parse().unwrap();
        Tick {
            timestamp: base + Duration::seconds(offset_secs),
            price: Price::new(price).unwrap(),
            volume,
        }
    }

    #[test]
    fn test_candle_completes_on_bucket_roll() {
        let mut builder = FiveMinuteCandleBuilder::new();
        assert!(builder.on_tick(&tick(0, 240.0, 100.0)).is_none());
        assert!(builder.on_tick(&tick(60, 241.5, 100.0)).is_none());
        assert!(builder.on_tick(&tick(120, 239.8, 100.0)).is_none());
        assert!(builder.on_tick(&tick(299, 240.7, 100.0)).is_none());

        let candle = builder.on_tick(&tick(300, 240.9, 50.0)).unwrap();
        assert_eq!(candle.open.value(), 240.0);
        assert_eq!(candle.high.value(), 241.5);
        assert_eq!(candle.low.value(), 239.8);
        assert_eq!(candle.close.value(), 240.7);
        assert_eq!(candle.volume, 400.0);
        assert_eq!(candle.timestamp, tick(0, 0.0, 0.0).timestamp);
    }

    #[test]
    fn test_gap_across_buckets_still_completes() {
        let mut builder = FiveMinuteCandleBuilder::new();
        builder.on_tick(&tick(0, 240.0, 10.0));
        // Next tick lands two buckets later; the stale candle completes.
        let candle = builder.on_tick(&tick(700, 241.0, 10.0)).unwrap();
        assert_eq!(candle.close.value(), 240.0);
    }

    #[test]
    fn test_flush_returns_partial_candle() {
        let mut builder = FiveMinuteCandleBuilder::new();
        builder.on_tick(&tick(0, 240.0, 10.0));
        builder.on_tick(&tick(30, 240.5, 10.0));
        let candle = builder.flush().unwrap();
        assert_eq!(candle.close.value(), 240.5);
        assert!(builder.flush().is_none());
    }
}
