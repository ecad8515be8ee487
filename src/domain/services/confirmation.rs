use chrono::{DateTime, NaiveTime, Utc};
use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::domain::entities::bar::Bar;
use crate::domain::entities::bias::{Bias, BiasDirection};
use crate::domain::services::market_clock::{self, EntryWindow};
use crate::domain::value_objects::price::Price;

/// Confirmation pipeline states. `Confirmed` is terminal for an episode:
/// the machine hands off to position management and drops back to
/// `Watching` for a later re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    /// No bias, or outside the entry windows.
    Idle,
    /// Bias set, inside a window, waiting for a trigger break.
    Watching,
    /// A 5-minute close broke the trigger; the next close must confirm.
    PendingConfirmation,
}

/// Confirmed entry signal, emitted at most once per pending episode.
#[derive(Debug, Clone, Copy)]
pub struct EntrySignal {
    pub direction: BiasDirection,
    /// Underlying price at the confirming candle close.
    pub entry_price: Price,
    pub trigger_level: Price,
    pub vwap: f64,
    pub ema20: f64,
    pub confidence: f64,
    /// Whether the break was retested before confirming; gates the add-on
    /// tranche in sizing.
    pub clean_retest: bool,
    pub at: DateTime<Utc>,
}

/// Watches 5-minute closes for a trigger break plus VWAP/EMA20 alignment,
/// with retest tracking while a confirmation is pending.
#[derive(Debug)]
pub struct ConfirmationMachine {
    windows: Vec<EntryWindow>,
    no_entry_after: NaiveTime,
    retest_tolerance: f64,
    max_retests: u32,
    cooldown_secs: i64,

    state: ConfirmationState,
    pending_trigger: Option<Price>,
    retest_count: u32,
    in_retest_zone: bool,
    last_entry_at: Option<DateTime<Utc>>,
}

impl ConfirmationMachine {
    pub fn new(config: &StrategyConfig) -> Self {
        ConfirmationMachine {
            windows: config.entry_windows.clone(),
            no_entry_after: config.no_entry_after,
            retest_tolerance: config.retest_tolerance,
            max_retests: config.max_retests,
            cooldown_secs: config.entry_cooldown_secs,
            state: ConfirmationState::Idle,
            pending_trigger: None,
            retest_count: 0,
            in_retest_zone: false,
            last_entry_at: None,
        }
    }

    pub fn state(&self) -> ConfirmationState {
        self.state
    }

    pub fn retest_count(&self) -> u32 {
        self.retest_count
    }

    /// Track a tick while a confirmation is pending: price revisiting the
    /// trigger within the tolerance counts one retest per visit. Exceeding
    /// the cap abandons the break and falls back to `Watching`.
    pub fn on_tick(&mut self, price: Price, bias: Option<&Bias>, now: DateTime<Utc>) {
        self.sync_state(bias, now);

        if self.state != ConfirmationState::PendingConfirmation {
            self.in_retest_zone = false;
            return;
        }
        let trigger = match self.pending_trigger {
            Some(t) => t,
            None => return,
        };

        let in_zone = price.distance_from(trigger) <= self.retest_tolerance;
        if in_zone && !self.in_retest_zone {
            if self.retest_count >= self.max_retests {
                info!(
                    "Retest cap {} exceeded at {}; confirmation abandoned",
                    self.max_retests, price
                );
                self.abandon();
                return;
            }
            self.retest_count += 1;
            debug!(
                "Trigger retest {}/{} at {}",
                self.retest_count, self.max_retests, price
            );
        }
        self.in_retest_zone = in_zone;
    }

    /// Process a completed 5-minute candle. Returns the entry signal when
    /// the pending break confirms.
    pub fn on_candle_close(
        &mut self,
        candle: &Bar,
        session_vwap: Option<f64>,
        ema20: Option<f64>,
        bias: Option<&Bias>,
        now: DateTime<Utc>,
    ) -> Option<EntrySignal> {
        self.sync_state(bias, now);
        let bias = bias?;

        match self.state {
            ConfirmationState::Idle => None,
            ConfirmationState::Watching => {
                if Self::breaks_trigger(candle.close, bias) {
                    self.state = ConfirmationState::PendingConfirmation;
                    self.pending_trigger = Some(bias.trigger_level());
                    self.retest_count = 0;
                    self.in_retest_zone = false;
                    info!(
                        "5-minute close {} broke trigger {} for {}; confirmation pending",
                        candle.close,
                        bias.trigger_level(),
                        bias.direction
                    );
                }
                None
            }
            ConfirmationState::PendingConfirmation => {
                let trigger = self.pending_trigger.unwrap_or_else(|| bias.trigger_level());

                let holds_beyond = Self::holds_beyond(candle.close, trigger, bias.direction);
                let aligned = Self::aligned(candle.close, session_vwap, bias.direction)
                    && Self::aligned(candle.close, ema20, bias.direction);

                if !(holds_beyond && aligned) {
                    info!(
                        "Confirmation failed at close {} (beyond trigger: {}, vwap/ema aligned: {}); back to watching",
                        candle.close, holds_beyond, aligned
                    );
                    self.abandon();
                    return None;
                }

                if let Some(last) = self.last_entry_at {
                    let elapsed = (now - last).num_seconds();
                    if elapsed < self.cooldown_secs {
                        info!(
                            "Entry cooldown active ({}s of {}s); confirmation dropped",
                            elapsed, self.cooldown_secs
                        );
                        self.abandon();
                        return None;
                    }
                }

                let signal = EntrySignal {
                    direction: bias.direction,
                    entry_price: candle.close,
                    trigger_level: trigger,
                    vwap: session_vwap.unwrap_or_default(),
                    ema20: ema20.unwrap_or_default(),
                    confidence: bias.confidence,
                    clean_retest: self.retest_count >= 1,
                    at: now,
                };
                info!(
                    "Entry confirmed: {} at {} (trigger {}, retests {})",
                    signal.direction, signal.entry_price, trigger, self.retest_count
                );
                self.last_entry_at = Some(now);
                self.abandon();
                Some(signal)
            }
        }
    }

    pub fn reset_day(&mut self) {
        self.state = ConfirmationState::Idle;
        self.pending_trigger = None;
        self.retest_count = 0;
        self.in_retest_zone = false;
        self.last_entry_at = None;
    }

    /// Clear the pending episode and resume watching.
    fn abandon(&mut self) {
        self.state = ConfirmationState::Watching;
        self.pending_trigger = None;
        self.retest_count = 0;
        self.in_retest_zone = false;
    }

    /// Idle whenever there is no bias or the clock is outside the entry
    /// windows; a pending episode does not survive the window closing.
    fn sync_state(&mut self, bias: Option<&Bias>, now: DateTime<Utc>) {
        let active = bias.is_some()
            && market_clock::in_entry_window(now, &self.windows)
            && !market_clock::at_or_after(now, self.no_entry_after);

        if !active {
            if self.state != ConfirmationState::Idle {
                debug!("Confirmation machine idle (no bias or outside entry window)");
            }
            self.state = ConfirmationState::Idle;
            self.pending_trigger = None;
            self.retest_count = 0;
            self.in_retest_zone = false;
        } else if self.state == ConfirmationState::Idle {
            self.state = ConfirmationState::Watching;
        }
    }

    fn breaks_trigger(close: Price, bias: &Bias) -> bool {
        match bias.direction {
            BiasDirection::Calls => close > bias.trigger_high,
            BiasDirection::Puts => close < bias.trigger_low,
            BiasDirection::None => false,
        }
    }

    fn holds_beyond(close: Price, trigger: Price, direction: BiasDirection) -> bool {
        match direction {
            BiasDirection::Calls => close > trigger,
            BiasDirection::Puts => close < trigger,
            BiasDirection::None => false,
        }
    }

    fn aligned(close: Price, level: Option<f64>, direction: BiasDirection) -> bool {
        let level = match level {
            Some(l) if l > 0.0 => l,
            // Missing VWAP/EMA means no structural read; never confirm on it.
            _ => return false,
        };
        match direction {
            BiasDirection::Calls => close.value() > level,
            BiasDirection::Puts => close.value() < level,
            BiasDirection::None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> StrategyConfig {
        StrategyConfig::default()
    }

    // 14:05 UTC = 10:05 ET, inside the primary entry window.
    fn in_window(offset_secs: i64) -> DateTime<Utc> {
        let base: DateTime<Utc> = "2025-10-02T14:05:00Z".parse().unwrap();
        base + Duration::seconds(offset_secs)
    }

    // 16:30 UTC = 12:30 ET, between the two windows.
    fn out_of_window() -> DateTime<Utc> {
        "2025-10-02T16:30:00Z".parse().unwrap()
    }

    fn calls_bias() -> Bias {
        Bias::new(
            BiasDirection::Calls,
            0.78,
            Price::new(241.93).unwrap(),
            Price::new(239.50).unwrap(),
            "2025-10-02T07:00:15Z".parse().unwrap(),
        )
        .unwrap()
    }

    fn candle(close: f64, at: DateTime<Utc>) -> Bar {
        Bar::new(close, close + 0.2, close - 0.2, close, 50_000.0, at).unwrap()
    }

    #[test]
    fn test_idle_without_bias() {
        let mut machine = ConfirmationMachine::new(&config());
        let signal = machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.0),
            None,
            in_window(0),
        );
        assert!(signal.is_none());
        assert_eq!(machine.state(), ConfirmationState::Idle);
    }

    #[test]
    fn test_idle_outside_entry_window() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();
        machine.on_candle_close(
            &candle(242.10, out_of_window()),
            Some(241.0),
            Some(241.0),
            Some(&bias),
            out_of_window(),
        );
        assert_eq!(machine.state(), ConfirmationState::Idle);
    }

    #[test]
    fn test_break_then_confirm_emits_entry() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();

        let broke = machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(0),
        );
        assert!(broke.is_none());
        assert_eq!(machine.state(), ConfirmationState::PendingConfirmation);

        let signal = machine
            .on_candle_close(
                &candle(242.30, in_window(300)),
                Some(241.1),
                Some(241.3),
                Some(&bias),
                in_window(300),
            )
            .unwrap();
        assert_eq!(signal.direction, BiasDirection::Calls);
        assert_eq!(signal.entry_price.value(), 242.30);
        assert_eq!(signal.trigger_level.value(), 241.93);
        assert!(!signal.clean_retest);
        assert_eq!(machine.state(), ConfirmationState::Watching);
    }

    #[test]
    fn test_confirmation_requires_alignment() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();

        machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(0),
        );
        // Close holds beyond the trigger but sits below VWAP.
        let signal = machine.on_candle_close(
            &candle(242.00, in_window(300)),
            Some(242.5),
            Some(241.3),
            Some(&bias),
            in_window(300),
        );
        assert!(signal.is_none());
        assert_eq!(machine.state(), ConfirmationState::Watching);
    }

    #[test]
    fn test_confirmation_requires_holding_beyond_trigger() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();

        machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(0),
        );
        let signal = machine.on_candle_close(
            &candle(241.50, in_window(300)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(300),
        );
        assert!(signal.is_none());
        assert_eq!(machine.state(), ConfirmationState::Watching);
    }

    #[test]
    fn test_missing_vwap_never_confirms() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();
        machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(0),
        );
        let signal = machine.on_candle_close(
            &candle(242.30, in_window(300)),
            None,
            Some(241.3),
            Some(&bias),
            in_window(300),
        );
        assert!(signal.is_none());
    }

    #[test]
    fn test_single_confirmation_per_episode() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();

        machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(0),
        );
        let first = machine.on_candle_close(
            &candle(242.30, in_window(300)),
            Some(241.1),
            Some(241.3),
            Some(&bias),
            in_window(300),
        );
        assert!(first.is_some());

        // The very next close cannot confirm again without a fresh break
        // and a fresh pending episode (and the cooldown blocks re-entry).
        let second = machine.on_candle_close(
            &candle(242.50, in_window(600)),
            Some(241.2),
            Some(241.4),
            Some(&bias),
            in_window(600),
        );
        assert!(second.is_none());
    }

    #[test]
    fn test_cooldown_blocks_immediate_reentry() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();

        machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(0),
        );
        machine
            .on_candle_close(
                &candle(242.30, in_window(300)),
                Some(241.1),
                Some(241.3),
                Some(&bias),
                in_window(300),
            )
            .unwrap();

        // Fresh break and would-be confirmation inside the cooldown.
        machine.on_candle_close(
            &candle(242.40, in_window(400)),
            Some(241.1),
            Some(241.3),
            Some(&bias),
            in_window(400),
        );
        let blocked = machine.on_candle_close(
            &candle(242.60, in_window(500)),
            Some(241.1),
            Some(241.3),
            Some(&bias),
            in_window(500),
        );
        assert!(blocked.is_none());

        // After the cooldown a new episode confirms normally.
        machine.on_candle_close(
            &candle(242.40, in_window(700)),
            Some(241.1),
            Some(241.3),
            Some(&bias),
            in_window(700),
        );
        let allowed = machine.on_candle_close(
            &candle(242.70, in_window(1000)),
            Some(241.1),
            Some(241.3),
            Some(&bias),
            in_window(1000),
        );
        assert!(allowed.is_some());
    }

    #[test]
    fn test_retest_counting_and_cap() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();

        machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(0),
        );
        assert_eq!(machine.state(), ConfirmationState::PendingConfirmation);

        let trigger = 241.93;
        let away = Price::new(trigger * 1.005).unwrap();
        let near = Price::new(trigger * 1.0005).unwrap();

        // Two retests: count caps at max_retests without abandoning.
        for _ in 0..2 {
            machine.on_tick(near, Some(&bias), in_window(30));
            machine.on_tick(away, Some(&bias), in_window(31));
        }
        assert_eq!(machine.retest_count(), 2);
        assert_eq!(machine.state(), ConfirmationState::PendingConfirmation);

        // A third visit exceeds the cap: the break is considered failed.
        machine.on_tick(near, Some(&bias), in_window(32));
        assert_eq!(machine.state(), ConfirmationState::Watching);
        assert_eq!(machine.retest_count(), 0);
    }

    #[test]
    fn test_retest_needs_zone_exit_between_counts() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();
        machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(0),
        );

        let near = Price::new(241.93 * 0.9995).unwrap();
        for i in 0..10 {
            machine.on_tick(near, Some(&bias), in_window(20 + i));
        }
        // One visit, however many ticks it spans.
        assert_eq!(machine.retest_count(), 1);
    }

    #[test]
    fn test_pending_does_not_survive_window_close() {
        let mut machine = ConfirmationMachine::new(&config());
        let bias = calls_bias();
        machine.on_candle_close(
            &candle(242.10, in_window(0)),
            Some(241.0),
            Some(241.2),
            Some(&bias),
            in_window(0),
        );
        machine.on_tick(
            Price::new(242.0).unwrap(),
            Some(&bias),
            out_of_window(),
        );
        assert_eq!(machine.state(), ConfirmationState::Idle);
    }
}
