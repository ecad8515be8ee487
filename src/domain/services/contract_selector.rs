use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::domain::entities::bias::BiasDirection;
use crate::domain::entities::contract::{ChainSnapshot, OptionContract};

/// Selects the same-day contract to alert (and optionally trade) from a
/// chain snapshot: delta band by direction, spread/volume/open-interest
/// floors, ranked tightest-spread first.
#[derive(Debug)]
pub struct ContractSelector {
    delta_min: f64,
    delta_max: f64,
    max_spread_percent: f64,
    min_volume: u64,
    min_open_interest: u64,
    max_tracked: usize,
}

impl ContractSelector {
    pub fn new(config: &StrategyConfig) -> Self {
        ContractSelector {
            delta_min: config.delta_min,
            delta_max: config.delta_max,
            max_spread_percent: config.max_spread_percent,
            min_volume: config.min_volume,
            min_open_interest: config.min_open_interest,
            max_tracked: config.max_contracts_to_track,
        }
    }

    /// Ranked shortlist of tradable 0DTE contracts for the direction,
    /// best first. Empty when the chain has nothing acceptable.
    pub fn shortlist(
        &self,
        chain: &ChainSnapshot,
        direction: BiasDirection,
        today: NaiveDate,
    ) -> Vec<OptionContract> {
        let band_mid = (self.delta_min + self.delta_max) / 2.0;

        let mut candidates: Vec<&OptionContract> = chain
            .contracts
            .iter()
            .filter(|c| c.expiration_date == today)
            .filter(|c| c.contract_type.matches(direction))
            .filter(|c| {
                // Puts carry negative deltas; the band is on magnitude.
                c.delta
                    .map(|d| (self.delta_min..=self.delta_max).contains(&d.abs()))
                    .unwrap_or(false)
            })
            .filter(|c| c.spread_percent() <= self.max_spread_percent)
            .filter(|c| c.volume >= self.min_volume)
            .filter(|c| c.open_interest >= self.min_open_interest)
            .collect();

        candidates.sort_by(|a, b| {
            let spread = a
                .spread_percent()
                .partial_cmp(&b.spread_percent())
                .unwrap_or(std::cmp::Ordering::Equal);
            let delta_fit = |c: &OptionContract| {
                c.delta.map(|d| (d.abs() - band_mid).abs()).unwrap_or(1.0)
            };
            spread
                .then(
                    delta_fit(a)
                        .partial_cmp(&delta_fit(b))
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(b.volume.cmp(&a.volume))
        });

        debug!(
            "Chain of {}: {} candidates for {} after filters",
            chain.contracts.len(),
            candidates.len(),
            direction
        );

        candidates
            .into_iter()
            .take(self.max_tracked)
            .cloned()
            .collect()
    }

    /// The single best contract for the direction, if any.
    pub fn best(
        &self,
        chain: &ChainSnapshot,
        direction: BiasDirection,
        today: NaiveDate,
    ) -> Option<OptionContract> {
        let best = self.shortlist(chain, direction, today).into_iter().next();
        match &best {
            Some(contract) => info!(
                "Selected {} (delta {:?}, spread {:.2}%)",
                contract.ticker,
                contract.delta,
                contract.spread_percent()
            ),
            None => info!("No acceptable {} contract in chain", direction),
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::contract::ContractType;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 2).unwrap()
    }

    fn contract(
        ticker: &str,
        contract_type: ContractType,
        delta: f64,
        bid: f64,
        ask: f64,
        expiry: NaiveDate,
    ) -> OptionContract {
        OptionContract {
            ticker: ticker.to_string(),
            strike: 242.0,
            contract_type,
            delta: Some(delta),
            bid,
            ask,
            volume: 1200,
            open_interest: 5400,
            expiration_date: expiry,
        }
    }

    fn chain(contracts: Vec<OptionContract>) -> ChainSnapshot {
        ChainSnapshot {
            taken_at: "2025-10-02T14:31:00Z".parse().unwrap(),
            contracts,
        }
    }

    fn selector() -> ContractSelector {
        ContractSelector::new(&StrategyConfig::default())
    }

    #[test]
    fn test_selects_same_day_call_for_calls_bias() {
        let tomorrow = today().succ_opt().unwrap();
        let snapshot = chain(vec![
            contract("weekly", ContractType::Call, 0.38, 2.45, 2.52, tomorrow),
            contract("zero-dte", ContractType::Call, 0.38, 2.45, 2.52, today()),
            contract("put", ContractType::Put, -0.38, 2.45, 2.52, today()),
        ]);
        let best = selector()
            .best(&snapshot, BiasDirection::Calls, today())
            .unwrap();
        assert_eq!(best.ticker, "zero-dte");
    }

    #[test]
    fn test_puts_bias_uses_delta_magnitude() {
        let snapshot = chain(vec![contract(
            "put",
            ContractType::Put,
            -0.38,
            2.45,
            2.52,
            today(),
        )]);
        let best = selector().best(&snapshot, BiasDirection::Puts, today());
        assert!(best.is_some());
    }

    #[test]
    fn test_delta_band_filters() {
        let snapshot = chain(vec![
            contract("deep", ContractType::Call, 0.80, 2.45, 2.52, today()),
            contract("lotto", ContractType::Call, 0.05, 2.45, 2.52, today()),
        ]);
        assert!(selector()
            .best(&snapshot, BiasDirection::Calls, today())
            .is_none());
    }

    #[test]
    fn test_wide_spread_rejected() {
        let snapshot = chain(vec![contract(
            "wide",
            ContractType::Call,
            0.38,
            2.00,
            3.00,
            today(),
        )]);
        assert!(selector()
            .best(&snapshot, BiasDirection::Calls, today())
            .is_none());
    }

    #[test]
    fn test_liquidity_floors() {
        let mut thin = contract("thin", ContractType::Call, 0.38, 2.45, 2.52, today());
        thin.volume = 12;
        let mut stale = contract("stale", ContractType::Call, 0.38, 2.45, 2.52, today());
        stale.open_interest = 10;
        let snapshot = chain(vec![thin, stale]);
        assert!(selector()
            .best(&snapshot, BiasDirection::Calls, today())
            .is_none());
    }

    #[test]
    fn test_ranking_prefers_tighter_spread_then_delta_fit() {
        let snapshot = chain(vec![
            contract("loose", ContractType::Call, 0.375, 2.44, 2.53, today()),
            contract("tight", ContractType::Call, 0.44, 2.48, 2.52, today()),
            contract("tight-fit", ContractType::Call, 0.375, 2.48, 2.52, today()),
        ]);
        let shortlist = selector().shortlist(&snapshot, BiasDirection::Calls, today());
        assert_eq!(shortlist.len(), 3);
        assert_eq!(shortlist[0].ticker, "tight-fit");
        assert_eq!(shortlist[1].ticker, "tight");
        assert_eq!(shortlist[2].ticker, "loose");
    }

    #[test]
    fn test_shortlist_bounded() {
        let contracts: Vec<OptionContract> = (0..10)
            .map(|i| {
                contract(
                    &format!("c{}", i),
                    ContractType::Call,
                    0.38,
                    2.45,
                    2.52,
                    today(),
                )
            })
            .collect();
        let shortlist = selector().shortlist(&chain(contracts), BiasDirection::Calls, today());
        assert_eq!(shortlist.len(), 3);
    }

    #[test]
    fn test_empty_chain_degrades_to_none() {
        let snapshot = chain(vec![]);
        assert!(selector()
            .best(&snapshot, BiasDirection::Calls, today())
            .is_none());
    }
}
