use chrono::{DateTime, NaiveTime, Utc};
use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::domain::entities::bias::BiasDirection;
use crate::domain::entities::position::Position;
use crate::domain::events::ExitReason;
use crate::domain::services::market_clock;
use crate::domain::value_objects::price::Price;

/// Hard invalidation and exit monitor for the open position.
///
/// Two adverse-streak counters run on 5-minute closes and are mutually
/// resetting, so at most one is non-zero at any instant:
/// - back inside the trigger range: two consecutive closes force an exit;
/// - across session VWAP: a single close suffices.
///
/// Independently of candle closes, every tick is checked against the hard
/// time stop, the tier's maximum holding time, and an extreme real-time
/// move beyond the opposite trigger level.
#[derive(Debug)]
pub struct InvalidationMonitor {
    hard_time_stop: NaiveTime,
    max_hold_minutes: i64,
    max_inside_closes: u32,
    vwap_close_limit: u32,

    inside_closes: u32,
    vwap_closes: u32,
}

impl InvalidationMonitor {
    pub fn new(config: &StrategyConfig) -> Self {
        InvalidationMonitor {
            hard_time_stop: config.hard_time_stop,
            max_hold_minutes: config.tier.controls().max_hold_minutes,
            max_inside_closes: 2,
            vwap_close_limit: 1,
            inside_closes: 0,
            vwap_closes: 0,
        }
    }

    /// Counters as (trigger-range, vwap).
    pub fn counters(&self) -> (u32, u32) {
        (self.inside_closes, self.vwap_closes)
    }

    /// Reset for a freshly opened position.
    pub fn reset(&mut self) {
        self.inside_closes = 0;
        self.vwap_closes = 0;
    }

    /// Run the streak counters against a completed 5-minute close.
    pub fn on_candle_close(
        &mut self,
        position: &mut Position,
        close: Price,
        session_vwap: Option<f64>,
    ) -> Option<ExitReason> {
        if let Some(reason) = self.check_trigger_range(position, close) {
            return Some(reason);
        }
        self.check_vwap(position, close, session_vwap)
    }

    fn check_trigger_range(&mut self, position: &Position, close: Price) -> Option<ExitReason> {
        let back_inside = match position.direction {
            BiasDirection::Calls => close <= position.trigger_high,
            BiasDirection::Puts => close >= position.trigger_low,
            BiasDirection::None => false,
        };

        if back_inside {
            self.inside_closes += 1;
            self.vwap_closes = 0;
            debug!(
                "Close {} back inside trigger range ({}/{})",
                close, self.inside_closes, self.max_inside_closes
            );
            if self.inside_closes >= self.max_inside_closes {
                info!(
                    "Hard invalidation: {} consecutive closes back inside trigger",
                    self.inside_closes
                );
                return Some(ExitReason::BackInsideTrigger);
            }
        } else {
            self.inside_closes = 0;
        }
        None
    }

    fn check_vwap(
        &mut self,
        position: &mut Position,
        close: Price,
        session_vwap: Option<f64>,
    ) -> Option<ExitReason> {
        let vwap = match session_vwap {
            Some(v) if v > 0.0 => v,
            _ => return None,
        };

        let adverse = match position.direction {
            BiasDirection::Calls => close.value() < vwap,
            BiasDirection::Puts => close.value() > vwap,
            BiasDirection::None => false,
        };

        if adverse {
            self.vwap_closes += 1;
            self.inside_closes = 0;
            position.vwap_exit_blocks = self.vwap_closes;
            if self.vwap_closes >= self.vwap_close_limit {
                info!("Hard invalidation: close {} across VWAP {:.2}", close, vwap);
                return Some(ExitReason::VwapCross);
            }
        } else {
            self.vwap_closes = 0;
            position.vwap_exit_blocks = 0;
        }
        None
    }

    /// Unconditional per-tick exits: time stop, tier hold timeout, and an
    /// extreme move beyond the opposite trigger level.
    pub fn on_tick(
        &self,
        position: &Position,
        price: Price,
        now: DateTime<Utc>,
    ) -> Option<ExitReason> {
        if market_clock::at_or_after(now, self.hard_time_stop) {
            info!("Time stop reached at {}", now);
            return Some(ExitReason::TimeStop);
        }

        if position.minutes_held(now) >= self.max_hold_minutes {
            info!(
                "Position held {} minutes, tier limit {}",
                position.minutes_held(now),
                self.max_hold_minutes
            );
            return Some(ExitReason::HoldTimeout);
        }

        let extreme = match position.direction {
            BiasDirection::Calls => price < position.trigger_low,
            BiasDirection::Puts => price > position.trigger_high,
            BiasDirection::None => false,
        };
        if extreme {
            info!(
                "Extreme move: {} beyond opposite trigger ({} / {})",
                price, position.trigger_low, position.trigger_high
            );
            return Some(ExitReason::ExtremeMove);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::quantity::Contracts;

    fn price(v: f64) -> Price {
        Price::new(v).unwrap()
    }

    // 14:05 UTC = 10:05 ET.
    fn entry_ts() -> DateTime<Utc> {
        "2025-10-02T14:05:00Z".parse().unwrap()
    }

    fn calls_position() -> Position {
        Position::open(
            "O:IWM251002C00242000".to_string(),
            BiasDirection::Calls,
            price(2.50),
            entry_ts(),
            Contracts::new(84).unwrap(),
            price(241.93),
            price(239.50),
        )
    }

    fn puts_position() -> Position {
        Position::open(
            "O:IWM251002P00240000".to_string(),
            BiasDirection::Puts,
            price(2.50),
            entry_ts(),
            Contracts::new(84).unwrap(),
            price(241.93),
            price(239.50),
        )
    }

    fn monitor() -> InvalidationMonitor {
        InvalidationMonitor::new(&StrategyConfig::default())
    }

    #[test]
    fn test_two_consecutive_closes_back_inside_trigger() {
        let mut monitor = monitor();
        let mut position = calls_position();

        // Both closes are at or below the 241.93 trigger, above VWAP.
        let first = monitor.on_candle_close(&mut position, price(241.50), Some(240.0));
        assert!(first.is_none());
        assert_eq!(monitor.counters(), (1, 0));

        let second = monitor.on_candle_close(&mut position, price(241.70), Some(240.0));
        assert_eq!(second, Some(ExitReason::BackInsideTrigger));
    }

    #[test]
    fn test_close_outside_resets_trigger_counter() {
        let mut monitor = monitor();
        let mut position = calls_position();

        monitor.on_candle_close(&mut position, price(241.50), Some(240.0));
        monitor.on_candle_close(&mut position, price(242.10), Some(240.0));
        assert_eq!(monitor.counters(), (0, 0));

        // The streak must be consecutive: one adverse close is not enough.
        let third = monitor.on_candle_close(&mut position, price(241.80), Some(240.0));
        assert!(third.is_none());
    }

    #[test]
    fn test_single_close_across_vwap_exits() {
        let mut monitor = monitor();
        let mut position = calls_position();

        // Close above trigger but below session VWAP at 241.00.
        let exit = monitor.on_candle_close(&mut position, price(240.50), Some(241.0));
        assert_eq!(exit, Some(ExitReason::VwapCross));
        assert_eq!(position.vwap_exit_blocks, 1);
    }

    #[test]
    fn test_puts_counters_mirror() {
        let mut monitor = monitor();
        let mut position = puts_position();

        // Back inside the range for puts means closing at or above the low.
        monitor.on_candle_close(&mut position, price(239.80), Some(241.0));
        assert_eq!(monitor.counters(), (1, 0));
        let exit = monitor.on_candle_close(&mut position, price(239.60), Some(241.0));
        assert_eq!(exit, Some(ExitReason::BackInsideTrigger));

        // Close above VWAP is adverse for puts.
        let mut monitor = InvalidationMonitor::new(&StrategyConfig::default());
        let mut position = puts_position();
        let exit = monitor.on_candle_close(&mut position, price(239.40), Some(239.0));
        assert_eq!(exit, Some(ExitReason::VwapCross));
    }

    #[test]
    fn test_counters_are_mutually_exclusive() {
        let mut monitor = monitor();
        let mut position = calls_position();

        // Adverse on both dimensions: the VWAP event zeroes the trigger
        // streak before exiting, so only one counter is ever non-zero.
        monitor.on_candle_close(&mut position, price(241.50), Some(242.0));
        let (inside, vwap) = monitor.counters();
        assert!(inside == 0 || vwap == 0);
    }

    #[test]
    fn test_missing_vwap_skips_vwap_check() {
        let mut monitor = monitor();
        let mut position = calls_position();
        let exit = monitor.on_candle_close(&mut position, price(240.50), None);
        // Below the (absent) VWAP would have exited; only the trigger
        // counter advances.
        assert!(exit.is_none());
        assert_eq!(monitor.counters(), (1, 0));
    }

    #[test]
    fn test_time_stop_fires_on_tick() {
        let monitor = monitor();
        let position = calls_position();
        // 19:55 UTC = 15:55 ET.
        let at_stop: DateTime<Utc> = "2025-10-02T19:55:00Z".parse().unwrap();
        assert_eq!(
            monitor.on_tick(&position, price(242.50), at_stop),
            Some(ExitReason::TimeStop)
        );
    }

    #[test]
    fn test_hold_timeout_fires_after_tier_limit() {
        let monitor = monitor();
        let position = calls_position();
        let later = entry_ts() + chrono::Duration::minutes(46);
        assert_eq!(
            monitor.on_tick(&position, price(242.50), later),
            Some(ExitReason::HoldTimeout)
        );
    }

    #[test]
    fn test_extreme_move_fires_immediately() {
        let monitor = monitor();
        let position = calls_position();
        let now = entry_ts() + chrono::Duration::minutes(1);
        assert_eq!(
            monitor.on_tick(&position, price(239.40), now),
            Some(ExitReason::ExtremeMove)
        );
        // Inside the range is not extreme.
        assert!(monitor.on_tick(&position, price(240.10), now).is_none());
    }
}
