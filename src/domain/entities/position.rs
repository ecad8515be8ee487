use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::bias::BiasDirection;
use crate::domain::value_objects::pnl::PnL;
use crate::domain::value_objects::price::Price;
use crate::domain::value_objects::quantity::Contracts;

/// Profit milestones at which part of a position is taken off. Each stage
/// fires at most once per position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleStage {
    First,
    Second,
}

impl std::fmt::Display for ScaleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleStage::First => write!(f, "scale_1"),
            ScaleStage::Second => write!(f, "scale_2"),
        }
    }
}

/// An open option position. Exactly one may exist per engine instance;
/// lifecycle transitions are owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct Position {
    pub contract_symbol: String,
    pub direction: BiasDirection,
    /// Option premium paid per contract. Replaced by the broker fill price
    /// when an execution report arrives.
    pub entry_price: Price,
    pub entry_time: DateTime<Utc>,
    /// Highest option premium seen since entry.
    pub peak_price: Price,
    pub quantity: Contracts,
    pub trigger_high: Price,
    pub trigger_low: Price,
    pub scales_taken: HashSet<ScaleStage>,
    /// Consecutive adverse closes across session VWAP, mirrored from the
    /// invalidation monitor for status reporting.
    pub vwap_exit_blocks: u32,
    pub order_id: Option<String>,
}

impl Position {
    pub fn open(
        contract_symbol: String,
        direction: BiasDirection,
        entry_price: Price,
        entry_time: DateTime<Utc>,
        quantity: Contracts,
        trigger_high: Price,
        trigger_low: Price,
    ) -> Self {
        Position {
            contract_symbol,
            direction,
            entry_price,
            entry_time,
            peak_price: entry_price,
            quantity,
            trigger_high,
            trigger_low,
            scales_taken: HashSet::new(),
            vwap_exit_blocks: 0,
            order_id: None,
        }
    }

    /// Track the latest option premium, maintaining the peak.
    pub fn record_price(&mut self, price: Price) {
        if price > self.peak_price {
            self.peak_price = price;
        }
    }

    /// Fractional P&L on premium. Positive means the option gained value.
    pub fn pnl_fraction(&self, current: Price) -> f64 {
        if self.entry_price.value() == 0.0 {
            return 0.0;
        }
        (current.value() - self.entry_price.value()) / self.entry_price.value()
    }

    pub fn unrealized_pnl(&self, current: Price) -> PnL {
        PnL::from_trade(self.entry_price, current, self.quantity)
    }

    /// Merge an asynchronous execution report into the position.
    pub fn apply_fill(&mut self, order_id: String, fill_price: Price) {
        self.order_id = Some(order_id);
        self.entry_price = fill_price;
        if self.peak_price < fill_price {
            self.peak_price = fill_price;
        }
    }

    pub fn scale_taken(&self, stage: ScaleStage) -> bool {
        self.scales_taken.contains(&stage)
    }

    /// Record a scale-out: mark the stage and reduce the remaining count.
    /// Returns the remaining quantity.
    pub fn take_scale(&mut self, stage: ScaleStage, sold: u32) -> Contracts {
        self.scales_taken.insert(stage);
        if let Ok(remaining) = self.quantity.reduce(sold) {
            self.quantity = remaining;
        }
        self.quantity
    }

    pub fn minutes_held(&self, now: DateTime<Utc>) -> i64 {
        (now - self.entry_time).num_minutes()
    }
}
