pub mod bias_classifier;
pub mod candle_builder;
pub mod confirmation;
pub mod contract_selector;
pub mod indicators;
pub mod invalidation;
pub mod market_clock;
pub mod metrics;
pub mod scoring;
pub mod sizing;
pub mod tick_window;
pub mod vwap;
