//! # Connection
//!
//! Owns the receiver task and the state shared by every [`Vehicle`] handle
//! on one link. Opening a connection restores any persisted streams, then
//! starts the receiver; [`Connection::stop`] ends it and releases blocked
//! callers.

use crate::commands::{CommandDispatcher, Endpoint};
use crate::error::Result;
use crate::link::{LinkState, LinkStatus, StatsSnapshot};
use crate::receiver::ReceiverHandle;
use crate::store::{MessageStore, StreamSnapshot};
use crate::vehicle::Vehicle;
use codec::{FramedCodec, MessageCodec};
use link_config::LinkConfig;
use network::{LinkAddress, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;
use types::{ComponentId, MessageKey, SystemId};

pub struct Connection {
    link: Arc<LinkState>,
    receiver: Mutex<Option<ReceiverHandle>>,
}

impl Connection {
    /// Start the runtime over an existing transport
    pub async fn open(
        config: LinkConfig,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn MessageCodec>,
    ) -> Result<Self> {
        let store = MessageStore::open(&config.cache, codec.as_ref());
        let source = Endpoint::new(
            SystemId::new(config.connection.source_system),
            ComponentId::new(config.connection.source_component),
        );
        let dispatcher = CommandDispatcher::new(codec.clone(), transport.clone(), source);
        let link = Arc::new(LinkState::new(config, codec, store, dispatcher));
        let receiver = ReceiverHandle::spawn(link.clone(), transport);

        Ok(Self {
            link,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// Open the socket named by `config.connection.address` with the standard codec
    pub async fn connect(config: LinkConfig) -> Result<Self> {
        let address: LinkAddress = config.connection.address.parse()?;
        let transport = network::connect(&address).await?;
        info!("Connecting to {}", address);
        Self::open(config, transport, Arc::new(FramedCodec::standard())).await
    }

    pub fn config(&self) -> &LinkConfig {
        &self.link.config
    }

    /// Handle for the configured target vehicle
    pub fn vehicle(&self) -> Vehicle {
        let target = &self.link.config.connection;
        self.vehicle_for(
            SystemId::new(target.target_system),
            ComponentId::new(target.target_component),
        )
    }

    pub fn vehicle_for(&self, system: SystemId, component: ComponentId) -> Vehicle {
        Vehicle::new(self.link.clone(), Endpoint::new(system, component))
    }

    /// Systems that have sent anything so far
    pub fn systems(&self) -> Vec<SystemId> {
        let mut systems: Vec<_> = self.link.store.keys().iter().map(|k| k.system).collect();
        systems.dedup();
        systems
    }

    pub fn keys(&self) -> Vec<MessageKey> {
        self.link.store.keys()
    }

    /// Rate estimate for each key; 0 for keys never seen
    pub fn rates(&self, keys: &[MessageKey]) -> Vec<(MessageKey, f64)> {
        keys.iter()
            .map(|key| (*key, self.link.store.rate(*key).unwrap_or(0.0)))
            .collect()
    }

    pub fn snapshot(&self, key: MessageKey) -> Option<StreamSnapshot> {
        self.link.store.snapshot(key, Instant::now())
    }

    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.link.stats.snapshot()
    }

    /// Stop the receiver and release every waiter
    pub async fn stop(&self) {
        let receiver = self.receiver.lock().take();
        if let Some(receiver) = receiver {
            receiver.stop().await;
        }
        self.link.shut_down(LinkStatus::Stopped);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.get_mut().as_ref() {
            receiver.request_stop();
        }
    }
}
