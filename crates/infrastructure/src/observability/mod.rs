//! Observability: metrics collection and structured logging

pub mod metrics_collector;
pub mod structured_logger;

pub use metrics_collector::{init_metrics, InFlightJob, JobOutcome, MetricsCollector};
pub use structured_logger::StructuredLogger;
