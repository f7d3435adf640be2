//! # Command Dispatcher
//!
//! Outbound side of the link. Named commands are resolved through
//! [`table`], packed into a `COMMAND_LONG`, encoded by the codec and handed
//! to the transport. Parameter reads and writes go out the same way as
//! `PARAM_REQUEST_READ`, `PARAM_REQUEST_LIST` and `PARAM_SET`.
//!
//! Sending is fire-and-forget: success means the frame left through the
//! transport. Replies come back through the receiver like any other
//! message.

pub mod table;

pub use table::{interval_for_rate, Command, CommandSpec};

use crate::error::Result;
use codec::MessageCodec;
use network::Transport;
use std::sync::Arc;
use tracing::debug;
use types::definitions::{ids, PARAM_TYPE_REAL32};
use types::{ComponentId, Message, SystemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub system: SystemId,
    pub component: ComponentId,
}

impl Endpoint {
    pub const fn new(system: SystemId, component: ComponentId) -> Self {
        Self { system, component }
    }
}

pub struct CommandDispatcher {
    codec: Arc<dyn MessageCodec>,
    transport: Arc<dyn Transport>,
    source: Endpoint,
}

impl CommandDispatcher {
    pub fn new(
        codec: Arc<dyn MessageCodec>,
        transport: Arc<dyn Transport>,
        source: Endpoint,
    ) -> Self {
        Self {
            codec,
            transport,
            source,
        }
    }

    pub fn source(&self) -> Endpoint {
        self.source
    }

    fn outbound(&self, type_id: types::MessageTypeId) -> Result<Message> {
        Ok(self
            .codec
            .new_message(type_id, self.source.system, self.source.component)?)
    }

    /// Encode and send any message
    pub async fn send_message(&self, msg: &Message) -> Result<()> {
        let frame = self.codec.encode(msg)?;
        self.transport.send(&frame).await?;
        Ok(())
    }

    /// Resolve `name`, build its parameters and send it to `target`
    pub async fn send(&self, target: Endpoint, name: &str, args: &[f64]) -> Result<()> {
        let command = table::build(name, args)?;
        debug!(
            "Sending {} (command {}) to {}:{} params={:?}",
            name, command.id, target.system, target.component, command.params
        );
        self.send_command(target, command).await
    }

    pub async fn send_command(&self, target: Endpoint, command: Command) -> Result<()> {
        let mut msg = self
            .outbound(ids::COMMAND_LONG)?
            .with("target_system", target.system.inner())?
            .with("target_component", target.component.inner())?
            .with("command", command.id as u32)?;
        for (i, value) in command.params.iter().enumerate() {
            msg.set(&format!("param{}", i + 1), *value)?;
        }
        self.send_message(&msg).await
    }

    pub async fn request_parameter(&self, target: Endpoint, name: &str) -> Result<()> {
        let msg = self
            .outbound(ids::PARAM_REQUEST_READ)?
            .with("target_system", target.system.inner())?
            .with("target_component", target.component.inner())?
            .with("param_id", name)?
            .with("param_index", -1)?;
        self.send_message(&msg).await
    }

    pub async fn request_parameter_list(&self, target: Endpoint) -> Result<()> {
        let msg = self
            .outbound(ids::PARAM_REQUEST_LIST)?
            .with("target_system", target.system.inner())?
            .with("target_component", target.component.inner())?;
        self.send_message(&msg).await
    }

    pub async fn set_parameter(&self, target: Endpoint, name: &str, value: f64) -> Result<()> {
        let msg = self
            .outbound(ids::PARAM_SET)?
            .with("target_system", target.system.inner())?
            .with("target_component", target.component.inner())?
            .with("param_id", name)?
            .with("param_value", value)?
            .with("param_type", PARAM_TYPE_REAL32)?;
        self.send_message(&msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::FramedCodec;
    use network::MemoryTransport;
    use std::time::Duration;
    use types::definitions::commands;

    fn dispatcher() -> (CommandDispatcher, Arc<MemoryTransport>, Arc<FramedCodec>) {
        let codec = Arc::new(FramedCodec::standard());
        let (client, vehicle) = MemoryTransport::pair();
        let dispatcher = CommandDispatcher::new(
            codec.clone(),
            Arc::new(client),
            Endpoint::new(SystemId::new(255), ComponentId::new(190)),
        );
        (dispatcher, Arc::new(vehicle), codec)
    }

    #[tokio::test]
    async fn test_command_long_on_the_wire() {
        let (dispatcher, vehicle, codec) = dispatcher();
        let target = Endpoint::new(SystemId::new(1), ComponentId::new(1));
        dispatcher
            .send(target, "set_message_rate", &[31.0, 10.0])
            .await
            .unwrap();

        let frame = vehicle.recv(Duration::from_millis(50)).await.unwrap().unwrap();
        let msg = codec.decode(&frame).unwrap();
        assert_eq!(msg.type_id(), ids::COMMAND_LONG);
        assert_eq!(msg.header.system, SystemId::new(255));
        assert_eq!(msg.scalar("target_system").unwrap(), 1.0);
        assert_eq!(
            msg.scalar("command").unwrap(),
            commands::SET_MESSAGE_INTERVAL as f64
        );
        assert_eq!(msg.scalar("param1").unwrap(), 31.0);
        assert_eq!(msg.scalar("param2").unwrap(), 100_000.0);
        assert_eq!(msg.scalar("param7").unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_param_request_on_the_wire() {
        let (dispatcher, vehicle, codec) = dispatcher();
        let target = Endpoint::new(SystemId::new(1), ComponentId::new(1));
        dispatcher.request_parameter(target, "SYSID_THISMAV").await.unwrap();

        let frame = vehicle.recv(Duration::from_millis(50)).await.unwrap().unwrap();
        let msg = codec.decode(&frame).unwrap();
        assert_eq!(msg.type_id(), ids::PARAM_REQUEST_READ);
        assert_eq!(msg.text("param_id").unwrap(), "SYSID_THISMAV");
        assert_eq!(msg.scalar("param_index").unwrap(), -1.0);
    }

    #[tokio::test]
    async fn test_unknown_command_sends_nothing() {
        let (dispatcher, vehicle, _) = dispatcher();
        let target = Endpoint::new(SystemId::new(1), ComponentId::new(1));
        assert!(dispatcher.send(target, "warp", &[]).await.is_err());
        assert!(vehicle.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let codec = Arc::new(FramedCodec::standard());
        let (client, _vehicle) = MemoryTransport::pair();
        client.fail_next_sends(1);
        let dispatcher = CommandDispatcher::new(
            codec,
            Arc::new(client),
            Endpoint::new(SystemId::new(255), ComponentId::new(190)),
        );
        let target = Endpoint::new(SystemId::new(1), ComponentId::new(1));
        assert!(matches!(
            dispatcher.send(target, "arm", &[]).await,
            Err(crate::TelemetryError::Transport(_))
        ));
    }
}
