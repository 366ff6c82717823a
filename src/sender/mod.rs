pub mod envelope;
pub mod stats;
pub mod udp;

use crate::domain::Metric;
use std::future::Future;
use thiserror::Error;

pub use envelope::{CounterEvent, Envelope, EventType, ValueMetric};
pub use stats::{ForwardStats, ForwardStatsSnapshot};
pub use udp::UdpForwarder;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("failed to resolve metrics agent address '{address}': {reason}")]
    Resolve { address: String, reason: String },
    #[error("envelope of {size} bytes exceeds the {max} byte datagram limit")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Delivers decoded metrics to the metrics agent.
///
/// Each call is independent; a failure for one metric says nothing about
/// the next.
pub trait MetricForwarder: Send + Sync {
    fn forward(
        &self,
        metric: &Metric,
        origin: &str,
    ) -> impl Future<Output = Result<(), ForwardError>> + Send;
}
