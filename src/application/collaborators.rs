//! Trait seams to the out-of-scope collaborators.
//!
//! Alert delivery and broker order placement are external concerns; the
//! core exchanges plain data across these boundaries and never formats
//! human-readable text or performs network I/O itself. The traits exist so
//! the engine can be exercised with mocks and wired to real transports
//! elsewhere.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::events::StrategyEvent;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("alert delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("order placement failed: {0}")]
    OrderFailed(String),

    #[error("order execution is disabled")]
    ExecutionDisabled,
}

/// Receives strategy events for formatting and delivery (push
/// notifications, logs, dashboards).
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, event: StrategyEvent) -> CollaboratorResult<()>;
}

/// Execution result reported back by the broker collaborator. Merged into
/// position state by the orchestrator; never assumed to arrive before the
/// position is live.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub order_id: String,
    pub fill_price: f64,
}

/// Optional silent order placement mirroring the alert stream.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn place_entry(
        &self,
        contract_symbol: &str,
        contracts: u32,
        limit_price: f64,
    ) -> CollaboratorResult<ExecutionReport>;

    async fn scale_out(
        &self,
        contract_symbol: &str,
        contracts: u32,
    ) -> CollaboratorResult<ExecutionReport>;

    async fn close_position(
        &self,
        contract_symbol: &str,
        contracts: u32,
    ) -> CollaboratorResult<ExecutionReport>;
}

/// Sink that only logs. Default when no delivery transport is wired.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn deliver(&self, event: StrategyEvent) -> CollaboratorResult<()> {
        match serde_json::to_string(&event) {
            Ok(json) => info!("ALERT {}", json),
            Err(e) => info!("ALERT (unserializable: {}) {:?}", e, event),
        }
        Ok(())
    }
}

/// Executor bound when automated trading is switched off. Constructed and
/// injected like any other executor; the engine consults its config before
/// routing orders, so this only answers if wiring is wrong.
pub struct DisabledExecutor;

#[async_trait]
impl OrderExecutor for DisabledExecutor {
    async fn place_entry(
        &self,
        contract_symbol: &str,
        _contracts: u32,
        _limit_price: f64,
    ) -> CollaboratorResult<ExecutionReport> {
        debug!("Order execution disabled; entry for {} not routed", contract_symbol);
        Err(CollaboratorError::ExecutionDisabled)
    }

    async fn scale_out(
        &self,
        contract_symbol: &str,
        _contracts: u32,
    ) -> CollaboratorResult<ExecutionReport> {
        debug!("Order execution disabled; scale for {} not routed", contract_symbol);
        Err(CollaboratorError::ExecutionDisabled)
    }

    async fn close_position(
        &self,
        contract_symbol: &str,
        _contracts: u32,
    ) -> CollaboratorResult<ExecutionReport> {
        debug!("Order execution disabled; close for {} not routed", contract_symbol);
        Err(CollaboratorError::ExecutionDisabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::bias::{BarType, BiasDirection};
    use crate::domain::events::BiasEvent;

    #[tokio::test]
    async fn test_log_sink_accepts_events() {
        let sink = LogAlertSink;
        let event = StrategyEvent::Bias(BiasEvent {
            direction: BiasDirection::Calls,
            confidence: 0.78,
            bar_type: BarType::BreakUp,
            trigger_high: 241.93,
            trigger_low: 240.19,
            set_at: "2025-10-02T07:00:15Z".parse().unwrap(),
        });
        assert!(sink.deliver(event).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_executor_rejects_orders() {
        let executor = DisabledExecutor;
        let result = executor.place_entry("O:IWM251002C00242000", 84, 2.50).await;
        assert!(matches!(result, Err(CollaboratorError::ExecutionDisabled)));
    }
}
