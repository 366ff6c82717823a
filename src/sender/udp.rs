use super::envelope::Envelope;
use super::stats::{ForwardStats, ForwardStatsSnapshot};
use super::{ForwardError, MAX_DATAGRAM_SIZE, MetricForwarder};
use crate::app::AgentAddress;
use crate::domain::Metric;
use bytes::BytesMut;
use prost::Message;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{UdpSocket, lookup_host};
use tracing::debug;

/// Sends one envelope per datagram to the local metrics agent.
#[derive(Debug, Clone)]
pub struct UdpForwarder {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    source_id: String,
    stats: Arc<ForwardStats>,
}

impl UdpForwarder {
    /// Resolves `address` once and connects a UDP socket to it.
    pub async fn connect(address: &AgentAddress, source_id: impl Into<String>) -> Result<Self, ForwardError> {
        let target = resolve(address).await?;

        let bind_addr: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;

        debug!(agent = %address, resolved = %target, "connected to metrics agent");

        Ok(Self {
            socket: Arc::new(socket),
            target,
            source_id: source_id.into(),
            stats: Arc::new(ForwardStats::new()),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn stats(&self) -> ForwardStatsSnapshot {
        self.stats.snapshot()
    }

    fn encode(&self, metric: &Metric, origin: &str) -> Result<BytesMut, ForwardError> {
        let envelope = Envelope::now(metric, origin, &self.source_id);
        let size = envelope.encoded_len();
        if size > MAX_DATAGRAM_SIZE {
            return Err(ForwardError::PayloadTooLarge {
                size,
                max: MAX_DATAGRAM_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(size);
        envelope.encode(&mut buf)?;
        Ok(buf)
    }
}

impl MetricForwarder for UdpForwarder {
    async fn forward(&self, metric: &Metric, origin: &str) -> Result<(), ForwardError> {
        let buf = match self.encode(metric, origin) {
            Ok(buf) => buf,
            Err(e @ ForwardError::PayloadTooLarge { .. }) => {
                self.stats.record_oversized();
                return Err(e);
            }
            Err(e) => {
                self.stats.record_failed();
                return Err(e);
            }
        };

        match self.socket.send(&buf).await {
            Ok(sent) => {
                self.stats.record_sent(sent);
                Ok(())
            }
            Err(e) => {
                self.stats.record_failed();
                Err(ForwardError::Io(e))
            }
        }
    }
}

async fn resolve(address: &AgentAddress) -> Result<SocketAddr, ForwardError> {
    let mut addrs = lookup_host((address.host.as_str(), address.port))
        .await
        .map_err(|e| ForwardError::Resolve {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    addrs.next().ok_or_else(|| ForwardError::Resolve {
        address: address.to_string(),
        reason: "no addresses found".to_string(),
    })
}
