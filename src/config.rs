use chrono::NaiveTime;

use crate::domain::services::market_clock::EntryWindow;
use crate::domain::services::scoring::ScoreWeights;

/// Risk tier for the traded symbol. Tiers tighten position size and holding
/// time for symbols with less reliable intraday structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTier {
    Tier1,
    Tier2,
    Tier3,
}

/// Tier-specific risk controls.
#[derive(Debug, Clone, Copy)]
pub struct TierControls {
    pub size_multiplier: f64,
    pub max_hold_minutes: i64,
}

impl SymbolTier {
    pub fn controls(&self) -> TierControls {
        match self {
            SymbolTier::Tier1 => TierControls {
                size_multiplier: 1.0,
                max_hold_minutes: 45,
            },
            SymbolTier::Tier2 => TierControls {
                size_multiplier: 0.7,
                max_hold_minutes: 30,
            },
            SymbolTier::Tier3 => TierControls {
                size_multiplier: 0.5,
                max_hold_minutes: 20,
            },
        }
    }
}

/// Complete strategy configuration. Loaded from environment variables with
/// range-validated fallbacks to defaults.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub symbol: String,
    pub account_balance: f64,
    /// Per-trade risk as a fraction of account balance (1.5%-3%).
    pub risk_fraction: f64,
    pub daily_loss_limit: f64,
    pub tier: SymbolTier,

    pub entry_windows: Vec<EntryWindow>,
    pub no_entry_after: NaiveTime,
    pub hard_time_stop: NaiveTime,

    /// Relative tolerance for counting a trigger retest (e.g. 0.001 = 0.1%).
    pub retest_tolerance: f64,
    pub max_retests: u32,
    pub entry_cooldown_secs: i64,

    pub scale_1_threshold: f64,
    pub scale_1_fraction: f64,
    pub scale_2_threshold: f64,
    pub scale_2_fraction: f64,

    // Contract selection criteria
    pub delta_min: f64,
    pub delta_max: f64,
    pub max_spread_percent: f64,
    pub min_volume: u64,
    pub min_open_interest: u64,
    pub max_contracts_to_track: usize,

    // Signal scoring
    pub score_weights: ScoreWeights,
    pub min_entry_score: f64,

    pub tick_window_secs: u64,
    pub overnight_history_bars: usize,
    pub enable_order_execution: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            symbol: "IWM".to_string(),
            account_balance: 7000.0,
            risk_fraction: 0.03,
            daily_loss_limit: 700.0,
            tier: SymbolTier::Tier1,

            entry_windows: vec![
                EntryWindow::new(time(9, 45), time(11, 0)),
                EntryWindow::new(time(13, 30), time(14, 15)),
            ],
            no_entry_after: time(15, 55),
            hard_time_stop: time(15, 55),

            retest_tolerance: 0.001,
            max_retests: 2,
            entry_cooldown_secs: 300,

            scale_1_threshold: 0.30,
            scale_1_fraction: 0.25,
            scale_2_threshold: 0.70,
            scale_2_fraction: 0.50,

            delta_min: 0.30,
            delta_max: 0.45,
            max_spread_percent: 4.0,
            min_volume: 500,
            min_open_interest: 1000,
            max_contracts_to_track: 3,

            score_weights: ScoreWeights::default(),
            min_entry_score: 0.0,

            tick_window_secs: 1200,
            overnight_history_bars: 10,
            enable_order_execution: false,
        }
    }
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("static clock time")
}

fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

fn parse_window(value: &str) -> Option<EntryWindow> {
    let (start, end) = value.split_once('-')?;
    let start = parse_clock(start)?;
    let end = parse_clock(end)?;
    if start < end {
        Some(EntryWindow::new(start, end))
    } else {
        None
    }
}

impl StrategyConfig {
    /// Load configuration from environment variables. Unparsable or
    /// out-of-range values are logged and replaced by the default.
    pub fn from_env() -> StrategyConfig {
        let mut config = StrategyConfig::default();

        if let Ok(symbol) = std::env::var("UNDERLYING_SYMBOL") {
            if !symbol.trim().is_empty() {
                config.symbol = symbol.trim().to_uppercase();
            }
        }

        if let Ok(balance) = std::env::var("ACCOUNT_BALANCE") {
            match balance.parse::<f64>() {
                Ok(value) if value > 0.0 && value.is_finite() => {
                    config.account_balance = value;
                }
                _ => tracing::warn!(
                    "Invalid ACCOUNT_BALANCE '{}', using default: {}",
                    balance,
                    config.account_balance
                ),
            }
        }

        if let Ok(fraction) = std::env::var("RISK_FRACTION") {
            match fraction.parse::<f64>() {
                Ok(value) if (0.015..=0.03).contains(&value) => {
                    config.risk_fraction = value;
                }
                _ => tracing::warn!(
                    "Invalid RISK_FRACTION '{}' (must be between 0.015 and 0.03), using default: {}",
                    fraction,
                    config.risk_fraction
                ),
            }
        }

        if let Ok(limit) = std::env::var("DAILY_LOSS_LIMIT") {
            match limit.parse::<f64>() {
                Ok(value) if value > 0.0 && value.is_finite() => {
                    config.daily_loss_limit = value;
                }
                _ => tracing::warn!(
                    "Invalid DAILY_LOSS_LIMIT '{}', using default: {}",
                    limit,
                    config.daily_loss_limit
                ),
            }
        }

        if let Ok(tier) = std::env::var("SYMBOL_TIER") {
            match tier.to_lowercase().as_str() {
                "tier1" | "1" => config.tier = SymbolTier::Tier1,
                "tier2" | "2" => config.tier = SymbolTier::Tier2,
                "tier3" | "3" => config.tier = SymbolTier::Tier3,
                other => tracing::warn!("Unknown SYMBOL_TIER '{}', using tier1", other),
            }
        }

        let mut windows = Vec::new();
        for (idx, key) in ["ENTRY_WINDOW_PRIMARY", "ENTRY_WINDOW_SECONDARY"]
            .iter()
            .enumerate()
        {
            if let Ok(raw) = std::env::var(key) {
                match parse_window(&raw) {
                    Some(window) => windows.push(window),
                    None => tracing::warn!(
                        "Invalid {} '{}' (expected HH:MM-HH:MM), keeping default window",
                        key,
                        raw
                    ),
                }
            } else if let Some(default) = config.entry_windows.get(idx) {
                windows.push(*default);
            }
        }
        if !windows.is_empty() {
            config.entry_windows = windows;
        }

        if let Ok(cutoff) = std::env::var("NO_ENTRY_AFTER") {
            match parse_clock(&cutoff) {
                Some(value) => config.no_entry_after = value,
                None => tracing::warn!("Invalid NO_ENTRY_AFTER '{}', using default", cutoff),
            }
        }

        if let Ok(stop) = std::env::var("HARD_TIME_STOP") {
            match parse_clock(&stop) {
                Some(value) => config.hard_time_stop = value,
                None => tracing::warn!("Invalid HARD_TIME_STOP '{}', using default", stop),
            }
        }

        if let Ok(tolerance) = std::env::var("RETEST_TOLERANCE") {
            match tolerance.parse::<f64>() {
                Ok(value) if (0.0001..=0.01).contains(&value) => {
                    config.retest_tolerance = value;
                }
                _ => tracing::warn!(
                    "Invalid RETEST_TOLERANCE '{}', using default: {}",
                    tolerance,
                    config.retest_tolerance
                ),
            }
        }

        if let Ok(max) = std::env::var("MAX_RETESTS") {
            if let Ok(value) = max.parse::<u32>() {
                if value <= 10 {
                    config.max_retests = value;
                }
            }
        }

        if let Ok(cooldown) = std::env::var("ENTRY_COOLDOWN_SECONDS") {
            match cooldown.parse::<i64>() {
                Ok(value) if (60..=300).contains(&value) => {
                    config.entry_cooldown_secs = value;
                }
                _ => tracing::warn!(
                    "Invalid ENTRY_COOLDOWN_SECONDS '{}' (must be 60-300), using default: {}",
                    cooldown,
                    config.entry_cooldown_secs
                ),
            }
        }

        if let Ok(raw) = std::env::var("SCALE_1_THRESHOLD") {
            if let Ok(value) = raw.parse::<f64>() {
                if (0.05..=2.0).contains(&value) {
                    config.scale_1_threshold = value;
                }
            }
        }

        if let Ok(raw) = std::env::var("SCALE_1_FRACTION") {
            if let Ok(value) = raw.parse::<f64>() {
                if (0.25..=0.50).contains(&value) {
                    config.scale_1_fraction = value;
                }
            }
        }

        if let Ok(raw) = std::env::var("SCALE_2_THRESHOLD") {
            if let Ok(value) = raw.parse::<f64>() {
                if (0.05..=2.0).contains(&value) {
                    config.scale_2_threshold = value;
                }
            }
        }

        if let Ok(raw) = std::env::var("SCALE_2_FRACTION") {
            if let Ok(value) = raw.parse::<f64>() {
                if (0.25..=0.50).contains(&value) {
                    config.scale_2_fraction = value;
                }
            }
        }

        if let Ok(delta) = std::env::var("DELTA_MIN") {
            if let Ok(value) = delta.parse::<f64>() {
                if (0.05..=0.95).contains(&value) {
                    config.delta_min = value;
                }
            }
        }

        if let Ok(delta) = std::env::var("DELTA_MAX") {
            if let Ok(value) = delta.parse::<f64>() {
                if (0.05..=0.95).contains(&value) {
                    config.delta_max = value;
                }
            }
        }

        if let Ok(spread) = std::env::var("MAX_SPREAD_PERCENT") {
            if let Ok(value) = spread.parse::<f64>() {
                if (0.5..=10.0).contains(&value) {
                    config.max_spread_percent = value;
                }
            }
        }

        if let Ok(volume) = std::env::var("MIN_VOLUME") {
            if let Ok(value) = volume.parse::<u64>() {
                config.min_volume = value;
            }
        }

        if let Ok(oi) = std::env::var("MIN_OPEN_INTEREST") {
            if let Ok(value) = oi.parse::<u64>() {
                config.min_open_interest = value;
            }
        }

        if let Ok(max) = std::env::var("MAX_CONTRACTS_TO_TRACK") {
            if let Ok(value) = max.parse::<usize>() {
                if (1..=10).contains(&value) {
                    config.max_contracts_to_track = value;
                }
            }
        }

        config.score_weights = ScoreWeights::from_env(config.score_weights);

        if let Ok(score) = std::env::var("MIN_ENTRY_SCORE") {
            match score.parse::<f64>() {
                Ok(value) if (0.0..=1.0).contains(&value) => {
                    config.min_entry_score = value;
                }
                _ => tracing::warn!(
                    "Invalid MIN_ENTRY_SCORE '{}' (must be between 0.0 and 1.0), using default: {}",
                    score,
                    config.min_entry_score
                ),
            }
        }

        if let Ok(secs) = std::env::var("TICK_WINDOW_SECONDS") {
            if let Ok(value) = secs.parse::<u64>() {
                if (60..=7200).contains(&value) {
                    config.tick_window_secs = value;
                }
            }
        }

        if let Ok(bars) = std::env::var("OVERNIGHT_HISTORY_BARS") {
            if let Ok(value) = bars.parse::<usize>() {
                if (2..=50).contains(&value) {
                    config.overnight_history_bars = value;
                }
            }
        }

        if let Ok(enabled) = std::env::var("ENABLE_ORDER_EXECUTION") {
            config.enable_order_execution = enabled.to_lowercase() == "true" || enabled == "1";
        }

        config
    }

    /// Validate cross-field constraints that the per-variable parsing cannot
    /// catch. Returns all problems at once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.symbol.is_empty() {
            errors.push("symbol must not be empty".to_string());
        }
        if self.delta_min >= self.delta_max {
            errors.push(format!(
                "delta band inverted: min {} >= max {}",
                self.delta_min, self.delta_max
            ));
        }
        if self.scale_1_threshold >= self.scale_2_threshold {
            errors.push(format!(
                "scale thresholds inverted: {} >= {}",
                self.scale_1_threshold, self.scale_2_threshold
            ));
        }
        if self.entry_windows.is_empty() {
            errors.push("at least one entry window is required".to_string());
        }
        for window in &self.entry_windows {
            if window.start >= window.end {
                errors.push(format!("entry window inverted: {}", window));
            }
        }
        if self.score_weights.total() <= 0.0 {
            errors.push("score weights must sum to a positive value".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Summary safe for logging at startup.
    pub fn summary(&self) -> String {
        format!(
            "symbol={} balance={:.0} risk={:.1}% daily_loss_limit={:.0} tier={:?} \
             windows={} cooldown={}s retests<={} scales=({:.0}%@{:.0}%, {:.0}%@{:.0}%) \
             delta=[{:.2},{:.2}] time_stop={} execution={}",
            self.symbol,
            self.account_balance,
            self.risk_fraction * 100.0,
            self.daily_loss_limit,
            self.tier,
            self.entry_windows
                .iter()
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
                .join(","),
            self.entry_cooldown_secs,
            self.max_retests,
            self.scale_1_fraction * 100.0,
            self.scale_1_threshold * 100.0,
            self.scale_2_fraction * 100.0,
            self.scale_2_threshold * 100.0,
            self.delta_min,
            self.delta_max,
            self.hard_time_stop.format("%H:%M"),
            if self.enable_order_execution {
                "enabled"
            } else {
                "disabled"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StrategyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.symbol, "IWM");
        assert_eq!(config.entry_windows.len(), 2);
    }

    #[test]
    fn test_tier_controls() {
        assert_eq!(SymbolTier::Tier1.controls().size_multiplier, 1.0);
        assert_eq!(SymbolTier::Tier2.controls().max_hold_minutes, 30);
        assert_eq!(SymbolTier::Tier3.controls().size_multiplier, 0.5);
    }

    #[test]
    fn test_parse_window() {
        let window = parse_window("09:45-11:00").unwrap();
        assert_eq!(window.start, time(9, 45));
        assert_eq!(window.end, time(11, 0));
        assert!(parse_window("11:00-09:45").is_none());
        assert!(parse_window("garbage").is_none());
    }

    #[test]
    fn test_validate_catches_inverted_delta_band() {
        let config = StrategyConfig {
            delta_min: 0.5,
            delta_max: 0.3,
            ..StrategyConfig::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("delta band")));
    }

    #[test]
    fn test_validate_catches_missing_windows() {
        let config = StrategyConfig {
            entry_windows: vec![],
            ..StrategyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_mentions_symbol_and_risk() {
        let summary = StrategyConfig::default().summary();
        assert!(summary.contains("symbol=IWM"));
        assert!(summary.contains("risk=3.0%"));
    }
}
