use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can surface from the strategy engine itself.
///
/// Expected market conditions (a skipped bias day, a rejected entry, a
/// forced exit) are modeled as return values, not errors. Only genuinely
/// unexpected input reaches this type.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Required market data is missing or incomplete. The strategy degrades
    /// to no-bias/no-entry rather than fabricating values.
    #[error("data gap: {0}")]
    DataGap(String),

    /// An input record failed validation. The orchestrator logs and skips
    /// the record rather than crashing the stream.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("engine channel closed")]
    ChannelClosed,
}

impl<T> From<mpsc::error::SendError<T>> for StrategyError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        StrategyError::ChannelClosed
    }
}

/// Reasons a sizing request is rejected. All of these are normal trading
/// outcomes, logged and surfaced to the caller without opening a position.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizingError {
    #[error("daily loss limit reached: {daily_pnl:.2} against limit {limit:.2}")]
    DailyLossLimit { daily_pnl: f64, limit: f64 },

    #[error("insufficient capital: {tranche:.2} buys no contract at {option_price:.2}")]
    InsufficientCapital { tranche: f64, option_price: f64 },

    #[error("both deployable tranches are committed; reserve is not traded")]
    ReserveExhausted,

    #[error("add-on entry requires a clean retest of the trigger")]
    AddOnRequiresRetest,

    #[error("entry cooldown active: {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: i64 },
}

/// Validation failures for domain values and input records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("invalid bar: {0}")]
    InvalidBar(String),

    #[error("invalid bias: {0}")]
    InvalidBias(String),

    #[error("value must be non-negative")]
    MustBeNonNegative,

    #[error("value must be finite")]
    MustBeFinite,
}

impl From<ValidationError> for StrategyError {
    fn from(e: ValidationError) -> Self {
        StrategyError::MalformedRecord(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_error_display_carries_context() {
        let err = SizingError::DailyLossLimit {
            daily_pnl: -710.0,
            limit: 700.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("-710.00"));
        assert!(msg.contains("700.00"));
    }

    #[test]
    fn validation_error_converts_to_malformed_record() {
        let err: StrategyError = ValidationError::MustBeFinite.into();
        assert!(matches!(err, StrategyError::MalformedRecord(_)));
    }

    #[test]
    fn sizing_error_serde_round_trip() {
        let err = SizingError::InsufficientCapital {
            tranche: 100.0,
            option_price: 250.0,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: SizingError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
