use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odte::application::collaborators::{AlertSink, DisabledExecutor, LogAlertSink, OrderExecutor};
use odte::application::engine::{EngineMessage, StrategyEngine, TickRecord};
use odte::config::StrategyConfig;
use odte::domain::entities::bar::BarRecord;
use odte::domain::entities::contract::ChainSnapshot;
use odte::domain::errors::StrategyError;
use odte::task_runner::{run_supervised, SupervisorConfig, TaskOutcome};

/// Newline-delimited JSON records from the market-data collaborator.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FeedRecord {
    Tick(TickRecord),
    OvernightBar(BarRecord),
    Chain(ChainSnapshot),
    OptionQuote {
        symbol: String,
        bid: f64,
        ask: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    ExecutionUpdate {
        order_id: String,
        fill_price: f64,
    },
}

impl FeedRecord {
    fn into_message(self) -> EngineMessage {
        match self {
            FeedRecord::Tick(record) => EngineMessage::Tick(record),
            FeedRecord::OvernightBar(record) => EngineMessage::OvernightBar(record),
            FeedRecord::Chain(snapshot) => EngineMessage::Chain(snapshot),
            FeedRecord::OptionQuote {
                symbol,
                bid,
                ask,
                timestamp,
            } => EngineMessage::OptionQuote {
                symbol,
                bid,
                ask,
                timestamp,
            },
            FeedRecord::ExecutionUpdate {
                order_id,
                fill_price,
            } => EngineMessage::ExecutionUpdate {
                order_id,
                fill_price,
            },
        }
    }
}

/// Read feed records from stdin and forward them to the engine. Malformed
/// lines are logged and skipped; EOF ends the pump cleanly.
async fn pump_feed(engine: mpsc::Sender<EngineMessage>) -> Result<TaskOutcome, String> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<FeedRecord>(&line) {
            Ok(record) => {
                engine
                    .send(record.into_message())
                    .await
                    .map_err(|e| StrategyError::from(e).to_string())?;
            }
            Err(e) => warn!("Malformed feed record skipped: {}", e),
        }
    }

    Ok(TaskOutcome::Stop)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "odte=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StrategyConfig::from_env();
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Configuration error: {}", e);
        }
        return Err("invalid configuration".into());
    }

    info!("0DTE overnight-bias engine starting");
    info!("{}", config.summary());
    if config.enable_order_execution {
        warn!("Order execution enabled but no broker executor is wired; orders stay silent");
    }

    let alerts: Arc<dyn AlertSink> = Arc::new(LogAlertSink);
    let executor: Arc<dyn OrderExecutor> = Arc::new(DisabledExecutor);
    let engine = StrategyEngine::spawn(config, alerts, executor);

    let feed_engine = engine.clone();
    let pump = tokio::spawn(async move {
        run_supervised("market-data-pump", SupervisorConfig::default(), || {
            let engine = feed_engine.clone();
            async move { pump_feed(engine).await }
        })
        .await;
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = pump => {
            info!("Market-data feed ended");
        }
    }

    engine.send(EngineMessage::Shutdown).await.ok();
    Ok(())
}
