//! State shared between the receiver task and every [`crate::Vehicle`]
//! handle of one connection.

use crate::commands::CommandDispatcher;
use crate::combinator::CombinatorRegistry;
use crate::error::{Result, TelemetryError};
use crate::params::ParamTable;
use crate::store::MessageStore;
use crate::waiters::WaiterRegistry;
use codec::MessageCodec;
use link_config::LinkConfig;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;
use types::definitions::ids;
use types::{Message, ParamValue, TelemetryMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    /// No valid message for `silence`; terminal
    Lost { silence: Duration },
    /// Stopped by the application
    Stopped,
}

/// Receiver counters
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub frames: AtomicU64,
    pub messages: AtomicU64,
    pub decode_errors: AtomicU64,
    pub transport_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub messages: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
}

impl ReceiverStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

pub(crate) struct LinkState {
    pub config: LinkConfig,
    pub codec: Arc<dyn MessageCodec>,
    pub store: MessageStore,
    pub waiters: Arc<WaiterRegistry>,
    pub params: ParamTable,
    pub dispatcher: CommandDispatcher,
    pub combinators: CombinatorRegistry,
    pub stats: ReceiverStats,
    status: RwLock<LinkStatus>,
}

impl LinkState {
    pub fn new(
        config: LinkConfig,
        codec: Arc<dyn MessageCodec>,
        store: MessageStore,
        dispatcher: CommandDispatcher,
    ) -> Self {
        Self {
            config,
            codec,
            store,
            waiters: Arc::new(WaiterRegistry::new()),
            params: ParamTable::new(),
            dispatcher,
            combinators: CombinatorRegistry::standard(),
            stats: ReceiverStats::default(),
            status: RwLock::new(LinkStatus::Connected),
        }
    }

    /// Cache, index and announce one decoded message
    ///
    /// Waiters are signaled last so a woken reader finds the message.
    pub fn ingest(&self, msg: Message, now: Instant) {
        let key = msg.key();
        if key.type_id == ids::PARAM_VALUE {
            match ParamValue::from_message(&msg) {
                Ok(param) => self.params.update(key.system, &param, now),
                Err(e) => warn!("Malformed PARAM_VALUE from system {}: {}", key.system, e),
            }
        }
        self.store.record(msg, now);
        self.stats.messages.fetch_add(1, Ordering::Relaxed);
        self.waiters.signal(key);
    }

    pub fn status(&self) -> LinkStatus {
        *self.status.read()
    }

    /// Move to a terminal status and release all waiters
    ///
    /// The first terminal status wins.
    pub fn shut_down(&self, status: LinkStatus) {
        {
            let mut current = self.status.write();
            if *current == LinkStatus::Connected {
                *current = status;
            }
        }
        self.waiters.close();
    }

    /// Fail fast once the link can no longer deliver
    pub fn ensure_alive(&self) -> Result<()> {
        match self.status() {
            LinkStatus::Connected => Ok(()),
            LinkStatus::Lost { silence } => Err(TelemetryError::ConnectionLost { silence }),
            LinkStatus::Stopped => Err(TelemetryError::Closed),
        }
    }

    /// Error for a wait cut short by closure
    pub fn closed_error(&self) -> TelemetryError {
        match self.ensure_alive() {
            Err(e) => e,
            Ok(()) => TelemetryError::Closed,
        }
    }
}
