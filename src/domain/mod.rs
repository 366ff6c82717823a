//! Domain layer for service-metrics.
//!
//! Contains the canonical types shared across all modules:
//! - `Metric`: a decoded gauge or counter sample, the pipeline's core data type
//! - `ServiceMetricsError`: Top-level error type

pub mod error;
pub mod metric;

pub use error::ServiceMetricsError;
pub use metric::{CounterSample, Metric, MetricSample};
