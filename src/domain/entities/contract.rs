use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::bias::BiasDirection;

/// Option side. Matched against the day's bias when selecting a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Call,
    Put,
}

impl ContractType {
    pub fn matches(&self, direction: BiasDirection) -> bool {
        matches!(
            (self, direction),
            (ContractType::Call, BiasDirection::Calls) | (ContractType::Put, BiasDirection::Puts)
        )
    }
}

/// One contract from an options-chain snapshot, as delivered by the
/// market-data collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    pub ticker: String,
    pub strike: f64,
    pub contract_type: ContractType,
    pub delta: Option<f64>,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub expiration_date: NaiveDate,
}

impl OptionContract {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Bid-ask spread as a percentage of mid. Infinite when mid is zero so
    /// quoteless contracts always fail spread filters.
    pub fn spread_percent(&self) -> f64 {
        let mid = self.mid();
        if mid <= 0.0 {
            return f64::INFINITY;
        }
        (self.ask - self.bid) / mid * 100.0
    }
}

/// Full chain snapshot, refreshed periodically by the data collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub taken_at: DateTime<Utc>,
    pub contracts: Vec<OptionContract>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(bid: f64, ask: f64) -> OptionContract {
        OptionContract {
            ticker: "O:IWM251002C00242000".to_string(),
            strike: 242.0,
            contract_type: ContractType::Call,
            delta: Some(0.38),
            bid,
            ask,
            volume: 1200,
            open_interest: 5400,
            expiration_date: NaiveDate::from_ymd_opt(2025, 10, 2).unwrap(),
        }
    }

    #[test]
    fn test_mid_and_spread() {
        let c = contract(2.40, 2.60);
        assert!((c.mid() - 2.50).abs() < 1e-9);
        assert!((c.spread_percent() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_spread_infinite_without_quotes() {
        let c = contract(0.0, 0.0);
        assert!(c.spread_percent().is_infinite());
    }

    #[test]
    fn test_contract_type_matches_bias() {
        assert!(ContractType::Call.matches(BiasDirection::Calls));
        assert!(ContractType::Put.matches(BiasDirection::Puts));
        assert!(!ContractType::Put.matches(BiasDirection::Calls));
        assert!(!ContractType::Call.matches(BiasDirection::None));
    }

    #[test]
    fn test_chain_snapshot_serde_round_trip() {
        let snapshot = ChainSnapshot {
            taken_at: "2025-10-02T14:31:00Z".parse().unwrap(),
            contracts: vec![contract(2.40, 2.60)],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: ChainSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.contracts.len(), 1);
        assert_eq!(back.contracts[0].ticker, snapshot.contracts[0].ticker);
    }
}
