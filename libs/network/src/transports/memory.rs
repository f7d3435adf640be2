//! In-process transport
//!
//! [`MemoryTransport::pair`] returns two connected ends. Tests hold one end
//! as the "vehicle": frames it sends arrive at the other end, and frames
//! the runtime sends can be read back from it.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use network::{MemoryTransport, Transport};
//! use std::time::Duration;
//!
//! let (client, vehicle) = MemoryTransport::pair();
//! vehicle.send(b"frame").await.unwrap();
//! let got = client.recv(Duration::from_millis(10)).await.unwrap();
//! assert_eq!(got.as_deref(), Some(&b"frame"[..]));
//! # });
//! ```

use super::{Transport, TransportInfo, TransportType};
use crate::{Result, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

pub struct MemoryTransport {
    name: &'static str,
    outbound: mpsc::UnboundedSender<Bytes>,
    inbound: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    fail_sends: AtomicUsize,
    closed: AtomicBool,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
}

impl MemoryTransport {
    fn new(
        name: &'static str,
        outbound: mpsc::UnboundedSender<Bytes>,
        inbound: mpsc::UnboundedReceiver<Bytes>,
    ) -> Self {
        Self {
            name,
            outbound,
            inbound: Mutex::new(inbound),
            fail_sends: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
        }
    }

    /// Two connected ends: (client, vehicle)
    pub fn pair() -> (Self, Self) {
        let (to_vehicle, from_client) = mpsc::unbounded_channel();
        let (to_client, from_vehicle) = mpsc::unbounded_channel();
        (
            Self::new("client", to_vehicle, from_vehicle),
            Self::new("vehicle", to_client, from_client),
        )
    }

    /// Make the next `count` sends fail with an injected error
    pub fn fail_next_sends(&self, count: usize) {
        self.fail_sends.store(count, Ordering::SeqCst);
    }

    /// Stop this end; further sends fail and receives report `Closed`
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Frames waiting to be received, without blocking
    pub async fn drain(&self) -> Vec<Bytes> {
        let mut inbound = self.inbound.lock().await;
        let mut frames = Vec::new();
        while let Ok(frame) = inbound.try_recv() {
            frames.push(frame);
        }
        self.frames_received
            .fetch_add(frames.len() as u64, Ordering::Relaxed);
        frames
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let injected = self
            .fail_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            debug!("{} end: injected send failure", self.name);
            return Err(TransportError::Injected { peer: None });
        }

        self.outbound
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| TransportError::Closed)?;
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn recv(&self, poll: Duration) -> Result<Option<Bytes>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut inbound = self.inbound.lock().await;
        match tokio::time::timeout(poll, inbound.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(frame)) => {
                self.frames_received.fetch_add(1, Ordering::Relaxed);
                Ok(Some(frame))
            }
            Ok(None) => Err(TransportError::Closed),
        }
    }

    fn transport_info(&self) -> TransportInfo {
        TransportInfo {
            transport_type: TransportType::Memory,
            local_address: Some(self.name.to_string()),
            remote_address: None,
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
        }
    }
}
