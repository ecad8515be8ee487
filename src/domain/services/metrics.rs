use crate::domain::value_objects::pnl::PnL;

/// Daily trading statistics for the engine's status surface and logs.
/// Reset at day rollover.
#[derive(Debug, Clone)]
pub struct DailyMetrics {
    realized_pnl: PnL,
    trades: u32,
    wins: u32,
    losses: u32,
    scales: u32,
    peak_pnl: f64,
    max_drawdown: f64,
}

impl DailyMetrics {
    pub fn new() -> Self {
        DailyMetrics {
            realized_pnl: PnL::zero(),
            trades: 0,
            wins: 0,
            losses: 0,
            scales: 0,
            peak_pnl: 0.0,
            max_drawdown: 0.0,
        }
    }

    pub fn record_trade(&mut self, pnl: PnL) {
        self.trades += 1;
        if pnl.is_profit() {
            self.wins += 1;
        } else if pnl.is_loss() {
            self.losses += 1;
        }
        self.realized_pnl += pnl;

        let total = self.realized_pnl.value();
        if total > self.peak_pnl {
            self.peak_pnl = total;
        }
        let drawdown = self.peak_pnl - total;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
    }

    pub fn record_scale(&mut self) {
        self.scales += 1;
    }

    pub fn realized_pnl(&self) -> PnL {
        self.realized_pnl
    }

    pub fn trades(&self) -> u32 {
        self.trades
    }

    pub fn scales(&self) -> u32 {
        self.scales
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        self.wins as f64 / self.trades as f64 * 100.0
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn reset_day(&mut self) {
        *self = DailyMetrics::new();
    }

    pub fn summary(&self) -> String {
        format!(
            "trades={} wins={} losses={} scales={} pnl={} max_drawdown={:.2}",
            self.trades, self.wins, self.losses, self.scales, self.realized_pnl, self.max_drawdown
        )
    }
}

impl Default for DailyMetrics {
    fn default() -> Self {
        Self::new()
    }
}
