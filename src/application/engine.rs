//! Strategy engine actor.
//!
//! The engine owns every piece of mutable strategy state (bias,
//! confirmation machine, sizing pool, the open position) and mutates it
//! from exactly one place: its message loop. Feed pumps, chain refreshers
//! and monitors run as separate tasks but all communicate through the
//! engine's channel, so state transitions complete atomically per event.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::collaborators::{AlertSink, OrderExecutor};
use crate::config::StrategyConfig;
use crate::domain::entities::bar::{Bar, BarRecord};
use crate::domain::entities::bias::{Bias, BiasDirection};
use crate::domain::entities::contract::ChainSnapshot;
use crate::domain::entities::position::Position;
use crate::domain::errors::StrategyError;
use crate::domain::events::{
    BiasEvent, EntryEvent, ExitEvent, ExitReason, ScaleEvent, StrategyEvent,
};
use crate::domain::services::bias_classifier::OvernightBiasClassifier;
use crate::domain::services::candle_builder::FiveMinuteCandleBuilder;
use crate::domain::services::confirmation::{ConfirmationMachine, ConfirmationState, EntrySignal};
use crate::domain::services::contract_selector::ContractSelector;
use crate::domain::services::indicators::Ema;
use crate::domain::services::invalidation::InvalidationMonitor;
use crate::domain::services::market_clock;
use crate::domain::services::metrics::DailyMetrics;
use crate::domain::services::scoring::SignalScorer;
use crate::domain::services::sizing::PositionSizer;
use crate::domain::services::tick_window::{Tick, TickWindow};
use crate::domain::services::vwap::SessionVwap;
use crate::domain::value_objects::price::Price;

/// Raw per-second tick as delivered by the market-data collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TickRecord {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

/// Messages the engine processes, strictly in arrival order.
#[derive(Debug)]
pub enum EngineMessage {
    Tick(TickRecord),
    OvernightBar(BarRecord),
    Chain(ChainSnapshot),
    /// Quote update for the held option contract.
    OptionQuote {
        symbol: String,
        bid: f64,
        ask: f64,
        timestamp: DateTime<Utc>,
    },
    /// Asynchronous broker fill merged into the open position.
    ExecutionUpdate {
        order_id: String,
        fill_price: f64,
    },
    Snapshot {
        reply: mpsc::Sender<EngineSnapshot>,
    },
    Shutdown,
}

/// Point-in-time engine status.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub trading_day: Option<NaiveDate>,
    pub bias: Option<Bias>,
    pub confirmation_state: ConfirmationState,
    pub position: Option<Position>,
    pub daily_pnl: f64,
    pub available_cash: f64,
    pub invalidation_counters: (u32, u32),
}

pub struct StrategyEngine {
    config: StrategyConfig,
    alerts: Arc<dyn AlertSink>,
    executor: Arc<dyn OrderExecutor>,

    window: TickWindow,
    session_vwap: SessionVwap,
    ema20: Ema,
    candles: FiveMinuteCandleBuilder,

    classifier: OvernightBiasClassifier,
    confirmation: ConfirmationMachine,
    sizer: PositionSizer,
    monitor: InvalidationMonitor,
    scorer: SignalScorer,
    selector: ContractSelector,
    metrics: DailyMetrics,

    bias: Option<Bias>,
    position: Option<Position>,
    chain: Option<ChainSnapshot>,
    option_price: Option<Price>,
    current_day: Option<NaiveDate>,
}

impl StrategyEngine {
    pub fn new(
        config: StrategyConfig,
        alerts: Arc<dyn AlertSink>,
        executor: Arc<dyn OrderExecutor>,
    ) -> Self {
        StrategyEngine {
            window: TickWindow::new(config.tick_window_secs),
            session_vwap: SessionVwap::new(),
            ema20: Ema::new(20),
            candles: FiveMinuteCandleBuilder::new(),
            classifier: OvernightBiasClassifier::new(config.overnight_history_bars),
            confirmation: ConfirmationMachine::new(&config),
            sizer: PositionSizer::new(&config),
            monitor: InvalidationMonitor::new(&config),
            scorer: SignalScorer::new(config.score_weights),
            selector: ContractSelector::new(&config),
            metrics: DailyMetrics::new(),
            bias: None,
            position: None,
            chain: None,
            option_price: None,
            current_day: None,
            config,
            alerts,
            executor,
        }
    }

    /// Spawn the engine on its own task; the returned sender is the only
    /// way to reach its state.
    pub fn spawn(
        config: StrategyConfig,
        alerts: Arc<dyn AlertSink>,
        executor: Arc<dyn OrderExecutor>,
    ) -> mpsc::Sender<EngineMessage> {
        let (tx, rx) = mpsc::channel(1024);
        let engine = StrategyEngine::new(config, alerts, executor);
        tokio::spawn(async move {
            engine.run(rx).await;
        });
        tx
    }

    async fn run(mut self, mut rx: mpsc::Receiver<EngineMessage>) {
        info!("Strategy engine started for {}", self.config.symbol);

        while let Some(msg) = rx.recv().await {
            match msg {
                EngineMessage::Tick(record) => self.on_tick(record).await,
                EngineMessage::OvernightBar(record) => self.on_overnight_bar(record).await,
                EngineMessage::Chain(snapshot) => self.on_chain(snapshot),
                EngineMessage::OptionQuote {
                    symbol,
                    bid,
                    ask,
                    timestamp,
                } => self.on_option_quote(&symbol, bid, ask, timestamp).await,
                EngineMessage::ExecutionUpdate {
                    order_id,
                    fill_price,
                } => self.on_execution_update(order_id, fill_price),
                EngineMessage::Snapshot { reply } => {
                    let snapshot = self.snapshot();
                    if reply.send(snapshot).await.is_err() {
                        warn!("Snapshot requester went away");
                    }
                }
                EngineMessage::Shutdown => {
                    info!("Strategy engine shutting down");
                    break;
                }
            }
        }

        info!("Strategy engine stopped; {}", self.metrics.summary());
    }

    async fn emit(&self, event: StrategyEvent) {
        if let Err(e) = self.alerts.deliver(event).await {
            warn!("Alert delivery failed: {}", e);
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            trading_day: self.current_day,
            bias: self.bias,
            confirmation_state: self.confirmation.state(),
            position: self.position.clone(),
            daily_pnl: self.sizer.daily_pnl().value(),
            available_cash: self.sizer.available_cash(),
            invalidation_counters: self.monitor.counters(),
        }
    }

    async fn on_tick(&mut self, record: TickRecord) {
        let price = match Price::new(record.price) {
            Ok(p) => p,
            Err(e) => {
                warn!("Tick skipped: {} ({:?})", StrategyError::from(e), record);
                return;
            }
        };
        if !record.volume.is_finite() || record.volume < 0.0 {
            warn!(
                "Tick skipped: {} ({:?})",
                StrategyError::MalformedRecord("non-finite or negative volume".to_string()),
                record
            );
            return;
        }

        self.rollover_if_new_day(record.timestamp).await;

        let tick = Tick {
            timestamp: record.timestamp,
            price,
            volume: record.volume,
        };
        self.window.push(tick);
        self.ema20.update(price.value());
        if market_clock::is_regular_session(record.timestamp) {
            self.session_vwap.update(price, record.volume);
        }

        if let Some(candle) = self.candles.on_tick(&tick) {
            self.on_candle_close(candle, record.timestamp).await;
        }

        let tick_exit = match self.position.as_ref() {
            Some(position) => self.monitor.on_tick(position, price, record.timestamp),
            None => None,
        };
        if let Some(reason) = tick_exit {
            self.close_position(reason, record.timestamp).await;
        } else if self.position.is_none() {
            self.confirmation
                .on_tick(price, self.bias.as_ref(), record.timestamp);
        }
    }

    async fn on_candle_close(&mut self, candle: Bar, now: DateTime<Utc>) {
        debug!(
            "5-minute close {} (vwap {:?}, ema20 {:?})",
            candle.close,
            self.session_vwap.value(),
            self.ema20.value()
        );

        if self.position.is_some() {
            let session_vwap = self.session_vwap.value();
            let exit = match self.position.as_mut() {
                Some(position) => self
                    .monitor
                    .on_candle_close(position, candle.close, session_vwap),
                None => None,
            };
            if let Some(reason) = exit {
                self.close_position(reason, now).await;
            }
            return;
        }

        let signal = self.confirmation.on_candle_close(
            &candle,
            self.session_vwap.value(),
            self.ema20.value(),
            self.bias.as_ref(),
            now,
        );
        if let Some(signal) = signal {
            self.try_enter(signal).await;
        }
    }

    async fn try_enter(&mut self, signal: EntrySignal) {
        let today = market_clock::trading_day(signal.at);

        let chain = match &self.chain {
            Some(chain) => chain,
            None => {
                warn!(
                    "{}; entry signal dropped",
                    StrategyError::DataGap("no chain snapshot".to_string())
                );
                return;
            }
        };
        let contract = match self.selector.best(chain, signal.direction, today) {
            Some(contract) => contract,
            None => {
                warn!(
                    "{}; entry signal dropped",
                    StrategyError::DataGap("no acceptable contract in chain".to_string())
                );
                return;
            }
        };

        let score = self
            .scorer
            .score(&self.window, &self.session_vwap, signal.direction);
        if score.combined < self.config.min_entry_score {
            info!(
                "Entry skipped: combined score {:.2} below minimum {:.2}",
                score.combined, self.config.min_entry_score
            );
            return;
        }

        let option_price = match Price::new(contract.mid()) {
            Ok(p) if p.value() > 0.0 => p,
            _ => {
                warn!("Data gap: contract {} has no usable quote", contract.ticker);
                return;
            }
        };

        let approval = match self.sizer.approve_entry(option_price, signal.clean_retest) {
            Ok(approval) => approval,
            Err(e) => {
                info!("Sizing rejected: {}", e);
                return;
            }
        };

        let mut position = Position::open(
            contract.ticker.clone(),
            signal.direction,
            option_price,
            signal.at,
            approval.contracts,
            self.bias.map(|b| b.trigger_high).unwrap_or(signal.trigger_level),
            self.bias.map(|b| b.trigger_low).unwrap_or(signal.trigger_level),
        );
        self.monitor.reset();
        self.option_price = Some(option_price);

        let event = EntryEvent {
            direction: signal.direction,
            contract_symbol: contract.ticker.clone(),
            entry_price: signal.entry_price.value(),
            option_price: option_price.value(),
            num_contracts: approval.contracts.get(),
            trigger_level: signal.trigger_level.value(),
            vwap: signal.vwap,
            ema20: signal.ema20,
            confidence: signal.confidence,
            score: score.combined,
            at: signal.at,
        };
        self.emit(StrategyEvent::Entry(event)).await;

        if self.config.enable_order_execution {
            match self
                .executor
                .place_entry(
                    &contract.ticker,
                    approval.contracts.get(),
                    option_price.value(),
                )
                .await
            {
                Ok(report) => {
                    info!(
                        "Entry order {} filled at {:.2}",
                        report.order_id, report.fill_price
                    );
                    if let Ok(fill) = Price::new(report.fill_price) {
                        position.apply_fill(report.order_id, fill);
                    }
                }
                Err(e) => warn!("Entry order not placed: {}", e),
            }
        }

        self.position = Some(position);
    }

    async fn on_option_quote(
        &mut self,
        symbol: &str,
        bid: f64,
        ask: f64,
        timestamp: DateTime<Utc>,
    ) {
        let holds_symbol = self
            .position
            .as_ref()
            .map(|p| p.contract_symbol == symbol)
            .unwrap_or(false);
        if !holds_symbol {
            return;
        }

        let mid = match Price::new((bid + ask) / 2.0) {
            Ok(p) if p.value() > 0.0 => p,
            _ => {
                warn!("Malformed option quote for {} skipped", symbol);
                return;
            }
        };

        if let Some(position) = self.position.as_mut() {
            position.record_price(mid);
        }
        self.option_price = Some(mid);

        let decision = match self.position.as_ref() {
            Some(position) => self.sizer.check_scale(position, mid),
            None => None,
        };

        if let Some(decision) = decision {
            let (symbol, remaining) = match self.position.as_mut() {
                Some(position) => {
                    let remaining =
                        position.take_scale(decision.stage, decision.contracts_to_sell);
                    (position.contract_symbol.clone(), remaining)
                }
                None => return,
            };
            self.sizer.apply_scale(&decision, mid);
            self.metrics.record_scale();

            let event = ScaleEvent {
                stage: decision.stage,
                contract_symbol: symbol.clone(),
                contracts_sold: decision.contracts_to_sell,
                contracts_remaining: remaining.get(),
                pnl_percent: decision.pnl_fraction * 100.0,
                at: timestamp,
            };
            self.emit(StrategyEvent::Scale(event)).await;

            if self.config.enable_order_execution {
                if let Err(e) = self
                    .executor
                    .scale_out(&symbol, decision.contracts_to_sell)
                    .await
                {
                    warn!("Scale order not placed: {}", e);
                }
            }
        }
    }

    async fn close_position(&mut self, reason: ExitReason, now: DateTime<Utc>) {
        let position = match self.position.take() {
            Some(p) => p,
            None => return,
        };

        let exit_price = match self.option_price {
            Some(p) => p,
            None => {
                warn!("Data gap: no option quote at exit; P&L recorded flat");
                position.entry_price
            }
        };

        let realized = self
            .sizer
            .record_exit(position.entry_price, exit_price, position.quantity);
        self.metrics.record_trade(realized);
        self.monitor.reset();
        self.option_price = None;

        info!(
            "Position {} closed ({}): {}",
            position.contract_symbol, reason, realized
        );

        let event = ExitEvent {
            reason,
            contract_symbol: position.contract_symbol.clone(),
            final_pnl: realized.value(),
            at: now,
        };
        self.emit(StrategyEvent::Exit(event)).await;

        if self.config.enable_order_execution {
            if let Err(e) = self
                .executor
                .close_position(&position.contract_symbol, position.quantity.get())
                .await
            {
                warn!("Close order not placed: {}", e);
            }
        }
    }

    async fn on_overnight_bar(&mut self, record: BarRecord) {
        self.rollover_if_new_day(record.timestamp).await;

        let bar = match record.validate() {
            Ok(bar) => bar,
            Err(e) => {
                warn!(
                    "Degraded day: {}; no bias set",
                    StrategyError::MalformedRecord(format!("overnight bar: {}", e))
                );
                return;
            }
        };

        let classification = match self.classifier.on_overnight_bar(bar) {
            Some(c) => c,
            None => return,
        };

        self.bias = classification.bias;

        let event = BiasEvent {
            direction: classification
                .bias
                .map(|b| b.direction)
                .unwrap_or(BiasDirection::None),
            confidence: classification.bias.map(|b| b.confidence).unwrap_or(0.0),
            bar_type: classification.bar_type,
            trigger_high: classification.trigger_high.value(),
            trigger_low: classification.trigger_low.value(),
            set_at: bar.timestamp,
        };
        self.emit(StrategyEvent::Bias(event)).await;
    }

    fn on_chain(&mut self, snapshot: ChainSnapshot) {
        debug!(
            "Chain snapshot: {} contracts at {}",
            snapshot.contracts.len(),
            snapshot.taken_at
        );
        self.chain = Some(snapshot);
    }

    fn on_execution_update(&mut self, order_id: String, fill_price: f64) {
        let position = match self.position.as_mut() {
            Some(p) => p,
            None => {
                debug!("Execution update {} with no open position", order_id);
                return;
            }
        };
        match Price::new(fill_price) {
            Ok(fill) => {
                info!("Merging fill {} at {:.2}", order_id, fill_price);
                position.apply_fill(order_id, fill);
            }
            Err(e) => warn!("Execution update {} has bad fill price: {}", order_id, e),
        }
    }

    /// First event of a new ET trading day resets all session-scoped state.
    /// An open position never survives the boundary.
    async fn rollover_if_new_day(&mut self, ts: DateTime<Utc>) {
        let day = market_clock::trading_day(ts);
        if self.current_day == Some(day) {
            return;
        }

        if self.current_day.is_some() {
            info!("Day rollover to {}; {}", day, self.metrics.summary());
            if self.position.is_some() {
                warn!("Position still open at rollover; forcing exit");
                self.close_position(ExitReason::TimeStop, ts).await;
            }
        }

        self.current_day = Some(day);
        self.bias = None;
        self.window.reset_day();
        self.session_vwap.reset();
        self.ema20.reset();
        self.candles.flush();
        self.confirmation.reset_day();
        self.sizer.reset_day();
        self.metrics.reset_day();
        self.monitor.reset();
        self.classifier.reset_daily_latch();
    }
}
