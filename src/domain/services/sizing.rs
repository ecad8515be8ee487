use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::domain::entities::position::{Position, ScaleStage};
use crate::domain::errors::SizingError;
use crate::domain::value_objects::pnl::PnL;
use crate::domain::value_objects::price::Price;
use crate::domain::value_objects::quantity::Contracts;

/// Which capital tranche an approved entry draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tranche {
    /// First entry: one third of capital.
    Initial,
    /// Add-on after a clean retest: the second third.
    AddOn,
}

/// Approved sizing decision.
#[derive(Debug, Clone, Copy)]
pub struct SizingApproval {
    pub contracts: Contracts,
    /// Dollars committed (contracts x option price), already deducted from
    /// the available pool.
    pub committed: f64,
    /// Worst-case loss: the full premium.
    pub risk_amount: f64,
    pub tranche: Tranche,
}

/// A due scale-out on an open position.
#[derive(Debug, Clone, Copy)]
pub struct ScaleDecision {
    pub stage: ScaleStage,
    pub contracts_to_sell: u32,
    pub pnl_fraction: f64,
}

/// Position sizing and profit scaling.
///
/// Capital is split in thirds: the first tranche on initial entry, the
/// second only after a clean retest, the last third never deployed. The
/// binding contract count is the smaller of the capital-based and
/// risk-based figures, and nothing sizes once the daily loss limit is hit.
#[derive(Debug)]
pub struct PositionSizer {
    account_balance: f64,
    risk_fraction: f64,
    daily_loss_limit: f64,
    size_multiplier: f64,

    scale_1_threshold: f64,
    scale_1_fraction: f64,
    scale_2_threshold: f64,
    scale_2_fraction: f64,

    available_cash: f64,
    tranches_used: u32,
    daily_pnl: PnL,
}

impl PositionSizer {
    pub fn new(config: &StrategyConfig) -> Self {
        let controls = config.tier.controls();
        PositionSizer {
            account_balance: config.account_balance,
            risk_fraction: config.risk_fraction.clamp(0.015, 0.03),
            daily_loss_limit: config.daily_loss_limit,
            size_multiplier: controls.size_multiplier,
            scale_1_threshold: config.scale_1_threshold,
            scale_1_fraction: config.scale_1_fraction,
            scale_2_threshold: config.scale_2_threshold,
            scale_2_fraction: config.scale_2_fraction,
            // The last third stays in reserve and is never deployed.
            available_cash: config.account_balance * (2.0 / 3.0),
            tranches_used: 0,
            daily_pnl: PnL::zero(),
        }
    }

    pub fn available_cash(&self) -> f64 {
        self.available_cash
    }

    pub fn daily_pnl(&self) -> PnL {
        self.daily_pnl
    }

    pub fn daily_loss_limit_reached(&self) -> bool {
        self.daily_pnl.value() <= -self.daily_loss_limit
    }

    /// Size and commit an entry tranche. The approved amount is deducted
    /// from the available pool immediately.
    pub fn approve_entry(
        &mut self,
        option_price: Price,
        clean_retest: bool,
    ) -> Result<SizingApproval, SizingError> {
        if self.daily_loss_limit_reached() {
            return Err(SizingError::DailyLossLimit {
                daily_pnl: self.daily_pnl.value(),
                limit: self.daily_loss_limit,
            });
        }

        let tranche = match self.tranches_used {
            0 => Tranche::Initial,
            1 if clean_retest => Tranche::AddOn,
            1 => return Err(SizingError::AddOnRequiresRetest),
            _ => return Err(SizingError::ReserveExhausted),
        };

        let price = option_price.value();
        if price <= 0.0 {
            return Err(SizingError::InsufficientCapital {
                tranche: 0.0,
                option_price: price,
            });
        }

        let tranche_value = (self.account_balance / 3.0 * self.size_multiplier)
            .min(self.available_cash);

        let capital_contracts = (tranche_value / price).floor() as i64;
        // The tier multiplier scales the whole position, risk budget included.
        let risk_budget = self.account_balance * self.risk_fraction * self.size_multiplier;
        let risk_contracts = (risk_budget / price).floor() as i64;
        let bound = capital_contracts.min(risk_contracts);

        debug!(
            "Sizing: tranche {:.2}, capital-based {}, risk-based {} (budget {:.2})",
            tranche_value, capital_contracts, risk_contracts, risk_budget
        );

        let contracts = match u32::try_from(bound).ok().and_then(|n| Contracts::new(n).ok()) {
            Some(contracts) => contracts,
            None => {
                return Err(SizingError::InsufficientCapital {
                    tranche: tranche_value,
                    option_price: price,
                })
            }
        };

        let committed = contracts.get() as f64 * price;
        self.available_cash -= committed;
        self.tranches_used += 1;

        info!(
            "Entry sized: {} contracts at {} ({:?}), {:.2} committed, {:.2} left in pool",
            contracts, option_price, tranche, committed, self.available_cash
        );

        Ok(SizingApproval {
            contracts,
            committed,
            risk_amount: committed,
            tranche,
        })
    }

    /// Check an open position against the profit-scale ladder. Each stage
    /// fires at most once; the decision leaves at least one contract on.
    pub fn check_scale(&self, position: &Position, current: Price) -> Option<ScaleDecision> {
        let pnl = position.pnl_fraction(current);

        let (stage, fraction) = if pnl >= self.scale_2_threshold
            && !position.scale_taken(ScaleStage::Second)
        {
            (ScaleStage::Second, self.scale_2_fraction)
        } else if pnl >= self.scale_1_threshold && !position.scale_taken(ScaleStage::First) {
            (ScaleStage::First, self.scale_1_fraction)
        } else {
            return None;
        };

        let quantity = position.quantity.get();
        if quantity <= 1 {
            // Nothing to peel off a one-lot.
            return None;
        }
        let contracts_to_sell = ((quantity as f64 * fraction).floor() as u32)
            .clamp(1, quantity - 1);

        Some(ScaleDecision {
            stage,
            contracts_to_sell,
            pnl_fraction: pnl,
        })
    }

    /// Return scale-out proceeds to the pool.
    pub fn apply_scale(&mut self, decision: &ScaleDecision, price: Price) {
        let freed = decision.contracts_to_sell as f64 * price.value();
        self.available_cash += freed;
        info!(
            "Scale {} executed: {} contracts freed {:.2} back to pool",
            decision.stage, decision.contracts_to_sell, freed
        );
    }

    /// Account for a closed position: realized P&L joins the daily total
    /// and the remaining premium value returns to the pool. The tranche
    /// ladder resets for a possible re-entry.
    pub fn record_exit(&mut self, entry: Price, exit: Price, contracts: Contracts) -> PnL {
        let realized = PnL::from_trade(entry, exit, contracts);
        self.daily_pnl += realized;
        self.available_cash += contracts.get() as f64 * exit.value();
        self.tranches_used = 0;

        if self.daily_loss_limit_reached() {
            warn!(
                "Daily loss limit reached: {} (limit {:.2}); no further entries today",
                self.daily_pnl, self.daily_loss_limit
            );
        }
        realized
    }

    /// Day rollover: pool and P&L reset.
    pub fn reset_day(&mut self) {
        self.available_cash = self.account_balance * (2.0 / 3.0);
        self.tranches_used = 0;
        self.daily_pnl = PnL::zero();
    }
}
