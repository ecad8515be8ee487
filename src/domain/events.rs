//! Tagged event records exchanged with the alerting and order-execution
//! collaborators. The core emits plain data; formatting and delivery live
//! outside this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::bias::{BarType, BiasDirection};
use crate::domain::entities::position::ScaleStage;

/// Why a position was closed. Expected terminal conditions, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Two consecutive 5-minute closes back inside the trigger range.
    BackInsideTrigger,
    /// A 5-minute close on the wrong side of session VWAP.
    VwapCross,
    /// Hard end-of-day time stop.
    TimeStop,
    /// Real-time move beyond the opposite trigger level.
    ExtremeMove,
    /// Tier-specific maximum holding time elapsed.
    HoldTimeout,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::BackInsideTrigger => {
                write!(f, "two consecutive closes back inside trigger")
            }
            ExitReason::VwapCross => write!(f, "close across VWAP"),
            ExitReason::TimeStop => write!(f, "hard time stop"),
            ExitReason::ExtremeMove => write!(f, "extreme move beyond opposite trigger"),
            ExitReason::HoldTimeout => write!(f, "maximum hold time elapsed"),
        }
    }
}

/// Overnight bias set (or explicitly absent) for the day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasEvent {
    pub direction: BiasDirection,
    pub confidence: f64,
    pub bar_type: BarType,
    pub trigger_high: f64,
    pub trigger_low: f64,
    pub set_at: DateTime<Utc>,
}

/// Confirmed entry signal with the full context the collaborators need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryEvent {
    pub direction: BiasDirection,
    pub contract_symbol: String,
    /// Underlying price at the confirming candle close.
    pub entry_price: f64,
    /// Option premium paid per contract.
    pub option_price: f64,
    pub num_contracts: u32,
    pub trigger_level: f64,
    pub vwap: f64,
    pub ema20: f64,
    pub confidence: f64,
    pub score: f64,
    pub at: DateTime<Utc>,
}

/// Partial profit-taking on an open position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleEvent {
    pub stage: ScaleStage,
    pub contract_symbol: String,
    pub contracts_sold: u32,
    pub contracts_remaining: u32,
    pub pnl_percent: f64,
    pub at: DateTime<Utc>,
}

/// Position closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitEvent {
    pub reason: ExitReason,
    pub contract_symbol: String,
    pub final_pnl: f64,
    pub at: DateTime<Utc>,
}

/// Everything the core pushes to the alerting collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyEvent {
    Bias(BiasEvent),
    Entry(EntryEvent),
    Scale(ScaleEvent),
    Exit(ExitEvent),
}
