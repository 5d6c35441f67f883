// Library root module for nerve-collector
// This file defines the public API and module structure for the collector
// library; the binary in main.rs only wires these pieces together
//
// Numan Thabit 2025 Nov

pub mod collector;
pub mod config;
pub mod control;
pub mod discovery;
pub mod errors;
pub mod metric;
pub mod metrics;
pub mod parser;
pub mod querier;

pub use collector::{CycleSummary, NerveCollector};
pub use errors::CollectorError;
pub use metric::{Metric, MetricType};
