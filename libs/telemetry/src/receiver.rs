//! # Receiver Loop
//!
//! One background task per connection. It reads frames from the transport,
//! decodes them, caches the result and wakes waiters. Malformed frames are
//! counted and skipped. If no valid message arrives within the inactivity
//! timeout, or the transport fails for good, the link is marked lost and
//! every waiter is released so blocked callers return instead of hanging.

use crate::link::{LinkState, LinkStatus};
use network::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub(crate) struct ReceiverHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ReceiverHandle {
    pub fn spawn(link: Arc<LinkState>, transport: Arc<dyn Transport>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run(link, transport, stop.clone()));
        Self { stop, task }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stop and wait for the task; returns within one poll timeout
    pub async fn stop(self) {
        self.request_stop();
        if let Err(e) = self.task.await {
            error!("Receiver task ended abnormally: {}", e);
        }
    }
}

async fn run(link: Arc<LinkState>, transport: Arc<dyn Transport>, stop: Arc<AtomicBool>) {
    let poll = link.config.receiver.poll_timeout();
    let inactivity = link.config.receiver.inactivity_timeout();
    let info = transport.transport_info();
    info!(
        "📡 Receiver started ({:?} {})",
        info.transport_type,
        info.local_address.as_deref().unwrap_or("-")
    );

    let mut last_valid = Instant::now();

    loop {
        if stop.load(Ordering::SeqCst) {
            debug!("Receiver stop requested");
            break;
        }

        match transport.recv(poll).await {
            Ok(Some(frame)) => {
                link.stats.frames.fetch_add(1, Ordering::Relaxed);
                match link.codec.decode(&frame) {
                    Ok(msg) => {
                        let now = Instant::now();
                        last_valid = now;
                        link.ingest(msg, now);
                    }
                    Err(e) => {
                        link.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                        warn!("Dropping malformed frame ({} bytes): {}", frame.len(), e);
                    }
                }
            }
            Ok(None) => {}
            Err(e) if e.is_recoverable() => {
                link.stats.transport_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Transport read failed: {}", e);
            }
            Err(e) => {
                link.stats.transport_errors.fetch_add(1, Ordering::Relaxed);
                let silence = last_valid.elapsed();
                error!("Transport failed, link lost: {}", e);
                link.shut_down(LinkStatus::Lost { silence });
                return;
            }
        }

        let silence = last_valid.elapsed();
        if silence >= inactivity {
            error!(
                "No valid message for {:?} (limit {:?}), link lost",
                silence, inactivity
            );
            link.shut_down(LinkStatus::Lost { silence });
            return;
        }
    }

    link.shut_down(LinkStatus::Stopped);
    info!("Receiver stopped");
}
