use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::price::Price;

/// The day's directional lean, set once from the overnight bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasDirection {
    Calls,
    Puts,
    None,
}

impl BiasDirection {
    pub fn is_directional(&self) -> bool {
        !matches!(self, BiasDirection::None)
    }
}

impl std::fmt::Display for BiasDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BiasDirection::Calls => write!(f, "calls"),
            BiasDirection::Puts => write!(f, "puts"),
            BiasDirection::None => write!(f, "none"),
        }
    }
}

/// Overnight bar classification against the prior bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarType {
    /// "1": fully contained within the prior bar's range.
    Inside,
    /// "2-up": closed above the prior bar's high.
    BreakUp,
    /// "2-down": closed below the prior bar's low.
    BreakDown,
    /// Wide bar with no directional close.
    Outside,
}

impl std::fmt::Display for BarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarType::Inside => write!(f, "1"),
            BarType::BreakUp => write!(f, "2-up"),
            BarType::BreakDown => write!(f, "2-down"),
            BarType::Outside => write!(f, "outside"),
        }
    }
}

/// Directional bias produced once per trading day by the overnight
/// classifier. Read-only for the rest of the day; replaced at the next
/// overnight bar or day rollover.
///
/// Invariants: `trigger_high >= trigger_low`; `confidence` in (0, 1] and the
/// direction is never `None` (a no-bias day is the absence of a `Bias`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bias {
    pub direction: BiasDirection,
    pub confidence: f64,
    pub trigger_high: Price,
    pub trigger_low: Price,
    pub set_at: DateTime<Utc>,
}

impl Bias {
    pub fn new(
        direction: BiasDirection,
        confidence: f64,
        trigger_high: Price,
        trigger_low: Price,
        set_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if !direction.is_directional() {
            return Err(ValidationError::InvalidBias(
                "bias direction must be calls or puts".to_string(),
            ));
        }
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(ValidationError::InvalidBias(format!(
                "confidence {} outside (0, 1]",
                confidence
            )));
        }
        if trigger_high < trigger_low {
            return Err(ValidationError::InvalidBias(format!(
                "trigger high {} below trigger low {}",
                trigger_high, trigger_low
            )));
        }
        Ok(Bias {
            direction,
            confidence,
            trigger_high,
            trigger_low,
            set_at,
        })
    }

    /// The level whose breach confirms the bias: the high for calls, the
    /// low for puts.
    pub fn trigger_level(&self) -> Price {
        match self.direction {
            BiasDirection::Puts => self.trigger_low,
            _ => self.trigger_high,
        }
    }

    /// The level on the far side of the coil; breaching it in real time is
    /// an immediate invalidation of the thesis.
    pub fn opposite_trigger(&self) -> Price {
        match self.direction {
            BiasDirection::Puts => self.trigger_high,
            _ => self.trigger_low,
        }
    }
}
