//! Transport Layer
//!
//! A [`Transport`] moves whole frames. It knows nothing about their
//! contents; the codec owns framing and checksums.

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

pub mod address;
pub mod memory;
pub mod udp;

pub use address::LinkAddress;
pub use memory::MemoryTransport;
pub use udp::{UdpConfig, UdpTransport};

/// Frame transport used by the receiver loop and the command dispatcher
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame
    async fn send(&self, frame: &[u8]) -> Result<()>;

    /// Wait up to `poll` for the next frame; `Ok(None)` when nothing arrived
    async fn recv(&self, poll: Duration) -> Result<Option<Bytes>>;

    /// Transport-specific information for logs
    fn transport_info(&self) -> TransportInfo;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, frame: &[u8]) -> Result<()> {
        (**self).send(frame).await
    }

    async fn recv(&self, poll: Duration) -> Result<Option<Bytes>> {
        (**self).recv(poll).await
    }

    fn transport_info(&self) -> TransportInfo {
        (**self).transport_info()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    Udp,
    Memory,
}

#[derive(Debug, Clone)]
pub struct TransportInfo {
    pub transport_type: TransportType,
    pub local_address: Option<String>,
    pub remote_address: Option<String>,
    pub frames_sent: u64,
    pub frames_received: u64,
}

/// Open a transport for a socket-backed address
///
/// `memory` links have no socket; build them with [`MemoryTransport::pair`].
pub async fn connect(address: &LinkAddress) -> Result<Arc<dyn Transport>> {
    match address {
        LinkAddress::Udp(bind) => Ok(Arc::new(UdpTransport::new(UdpConfig::listen(*bind)).await?)),
        LinkAddress::UdpOut(remote) => {
            Ok(Arc::new(UdpTransport::new(UdpConfig::connect(*remote)).await?))
        }
        LinkAddress::Memory => Err(crate::TransportError::configuration(
            "memory links are created in-process with MemoryTransport::pair",
            Some("address"),
        )),
    }
}
