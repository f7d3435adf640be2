//! UDP Network Transport Implementation
//!
//! One datagram carries one frame. A listening transport (`udp:`) learns
//! its peer from the most recent inbound datagram and replies there; an
//! outbound transport (`udpout:`) is connected to a fixed remote.

use super::{Transport, TransportInfo, TransportType};
use crate::{Result, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Largest payload a single UDP datagram can carry
pub const MAX_DATAGRAM: usize = 65_507;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpConfig {
    /// Local address to bind to
    pub bind_address: SocketAddr,
    /// Fixed remote; `None` replies to the last sender
    pub remote_address: Option<SocketAddr>,
    pub max_message_size: usize,
    pub send_timeout: Duration,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 0)),
            remote_address: None,
            max_message_size: MAX_DATAGRAM,
            send_timeout: Duration::from_secs(1),
        }
    }
}

impl UdpConfig {
    pub fn listen(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    pub fn connect(remote: SocketAddr) -> Self {
        let bind_address = if remote.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0, 0, 0, 0], 0))
        };
        Self {
            bind_address,
            remote_address: Some(remote),
            ..Default::default()
        }
    }
}

pub struct UdpTransport {
    config: UdpConfig,
    socket: UdpSocket,
    peer: Mutex<Option<SocketAddr>>,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
}

impl UdpTransport {
    /// Bind the socket; must be called inside a tokio runtime
    pub async fn new(config: UdpConfig) -> Result<Self> {
        if config.max_message_size > MAX_DATAGRAM {
            return Err(TransportError::configuration(
                format!("UDP max message size cannot exceed {} bytes", MAX_DATAGRAM),
                Some("max_message_size"),
            ));
        }

        let socket = UdpSocket::bind(config.bind_address).await.map_err(|e| {
            TransportError::network_with_source(
                format!("Failed to bind UDP socket on {}", config.bind_address),
                e,
            )
        })?;

        match config.remote_address {
            Some(remote) => info!("UDP link sending to {}", remote),
            None => info!("UDP link listening on {}", config.bind_address),
        }

        Ok(Self {
            peer: Mutex::new(config.remote_address),
            config,
            socket,
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| TransportError::network_with_source("Failed to get local address", e))
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        *self.peer.lock()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, frame: &[u8]) -> Result<()> {
        if frame.len() > self.config.max_message_size {
            return Err(TransportError::FrameTooLarge {
                size: frame.len(),
                limit: self.config.max_message_size,
            });
        }
        let peer = self.peer().ok_or(TransportError::NoPeer)?;

        let timeout_ms = self.config.send_timeout.as_millis() as u64;
        let sent = timeout(self.config.send_timeout, self.socket.send_to(frame, peer))
            .await
            .map_err(|_| TransportError::timeout("UDP send", timeout_ms))?
            .map_err(|e| TransportError::network_with_source("Failed to send UDP datagram", e))?;

        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        debug!("Sent UDP datagram to {}: {} bytes", peer, sent);
        Ok(())
    }

    async fn recv(&self, poll: Duration) -> Result<Option<Bytes>> {
        let mut buffer = vec![0u8; self.config.max_message_size];
        let (len, sender) = match timeout(poll, self.socket.recv_from(&mut buffer)).await {
            Err(_) => return Ok(None),
            Ok(result) => result.map_err(|e| {
                TransportError::network_with_source("Failed to receive UDP datagram", e)
            })?,
        };

        if self.config.remote_address.is_none() {
            let mut peer = self.peer.lock();
            if *peer != Some(sender) {
                if peer.is_some() {
                    warn!("UDP peer changed to {}", sender);
                } else {
                    info!("UDP peer discovered: {}", sender);
                }
                *peer = Some(sender);
            }
        }

        self.frames_received.fetch_add(1, Ordering::Relaxed);
        buffer.truncate(len);
        Ok(Some(Bytes::from(buffer)))
    }

    fn transport_info(&self) -> TransportInfo {
        TransportInfo {
            transport_type: TransportType::Udp,
            local_address: self.local_addr().ok().map(|a| a.to_string()),
            remote_address: self.peer().map(|a| a.to_string()),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
        }
    }
}
