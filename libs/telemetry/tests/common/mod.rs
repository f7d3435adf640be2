//! Shared harness: a connection over an in-process link plus helpers that
//! play the vehicle's side.

#![allow(dead_code)]

use codec::{FramedCodec, MessageCodec, SchemaRegistry};
use link_config::LinkConfig;
use network::{MemoryTransport, Transport};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry::{Connection, Vehicle};
use tokio::task::JoinHandle;
use types::definitions::{commands, ids, PARAM_TYPE_REAL32};
use types::{ComponentId, Message, MessageTypeId, SystemId};

pub const VEHICLE_SYSTEM: u8 = 1;

/// Defaults with a long inactivity window so idle tests never lose the link
pub fn test_config() -> LinkConfig {
    let mut config = LinkConfig::default();
    config.connection.address = "memory".to_string();
    config.receiver.poll_timeout_ms = 50;
    config.receiver.inactivity_timeout_ms = 600_000;
    config
}

pub struct Harness {
    pub connection: Connection,
    pub vehicle: Vehicle,
    /// Client end, for injecting send failures
    pub client: Arc<MemoryTransport>,
    /// Vehicle end of the link
    pub remote: Arc<MemoryTransport>,
    pub codec: Arc<FramedCodec>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(test_config(), SchemaRegistry::standard()).await
    }

    pub async fn with(config: LinkConfig, registry: SchemaRegistry) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("telemetry=debug")
            .with_test_writer()
            .try_init();
        let codec = Arc::new(FramedCodec::new(registry));
        let (client, remote) = MemoryTransport::pair();
        let client = Arc::new(client);
        let connection = Connection::open(config, client.clone(), codec.clone())
            .await
            .expect("open connection");
        let vehicle = connection.vehicle();
        Self {
            connection,
            vehicle,
            client,
            remote: Arc::new(remote),
            codec,
        }
    }

    /// Message from the vehicle with the given fields set
    pub fn message(&self, type_id: MessageTypeId, fields: &[(&str, f64)]) -> Message {
        build(&self.codec, type_id, fields)
    }

    /// Send from the vehicle and let the receiver process it
    pub async fn feed(&self, msg: &Message) {
        send(&self.remote, &self.codec, msg).await;
        settle().await;
    }

    pub async fn feed_fields(&self, type_id: MessageTypeId, fields: &[(&str, f64)]) {
        let msg = self.message(type_id, fields);
        self.feed(&msg).await;
    }

    /// Everything the client has sent so far, decoded
    pub async fn sent(&self) -> Vec<Message> {
        self.remote
            .drain()
            .await
            .iter()
            .map(|frame| self.codec.decode(frame).expect("client frame decodes"))
            .collect()
    }

    /// `(command, param1, param2)` of every COMMAND_LONG sent so far
    pub async fn sent_commands(&self) -> Vec<(u16, f64, f64)> {
        self.sent()
            .await
            .iter()
            .filter(|msg| msg.type_id() == ids::COMMAND_LONG)
            .map(|msg| {
                (
                    msg.scalar("command").unwrap() as u16,
                    msg.scalar("param1").unwrap(),
                    msg.scalar("param2").unwrap(),
                )
            })
            .collect()
    }
}

pub fn build(codec: &FramedCodec, type_id: MessageTypeId, fields: &[(&str, f64)]) -> Message {
    let mut msg = codec
        .new_message(type_id, SystemId::new(VEHICLE_SYSTEM), ComponentId::new(1))
        .expect("schema registered");
    for (name, value) in fields {
        msg.set(name, *value).expect("field set");
    }
    msg
}

pub async fn send(remote: &MemoryTransport, codec: &FramedCodec, msg: &Message) {
    let frame = codec.encode(msg).expect("encode");
    remote.send(&frame).await.expect("vehicle send");
}

/// Yield long enough for the receiver to drain what was sent
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Send `msg` from the vehicle every `period`, `count` times
pub fn stream(
    remote: Arc<MemoryTransport>,
    codec: Arc<FramedCodec>,
    msg: Message,
    period: Duration,
    count: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for _ in 0..count {
            send(&remote, &codec, &msg).await;
            tokio::time::sleep(period).await;
        }
    })
}

/// Command ids among `(command, p1, p2)` tuples
pub fn command_ids(sent: &[(u16, f64, f64)]) -> Vec<u16> {
    sent.iter().map(|(id, _, _)| *id).collect()
}

pub fn is_rate_command(sent: &(u16, f64, f64), type_id: MessageTypeId) -> bool {
    sent.0 == commands::SET_MESSAGE_INTERVAL && sent.1 == type_id.inner() as f64
}

/// Answers parameter traffic the way an autopilot does
pub struct SimVehicle {
    pub params: Arc<Mutex<BTreeMap<String, f64>>>,
    /// Requests still to be ignored before answering
    pub ignore: Arc<AtomicUsize>,
    pub requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl SimVehicle {
    pub fn spawn(harness: &Harness, params: &[(&str, f64)]) -> Self {
        let table: BTreeMap<String, f64> = params
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        let params = Arc::new(Mutex::new(table));
        let ignore = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn(respond(
            harness.remote.clone(),
            harness.codec.clone(),
            params.clone(),
            ignore.clone(),
            requests.clone(),
        ));
        Self {
            params,
            ignore,
            requests,
            task,
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for SimVehicle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn respond(
    remote: Arc<MemoryTransport>,
    codec: Arc<FramedCodec>,
    params: Arc<Mutex<BTreeMap<String, f64>>>,
    ignore: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
) {
    loop {
        let frame = match remote.recv(Duration::from_millis(20)).await {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(_) => return,
        };
        let Ok(msg) = codec.decode(&frame) else {
            continue;
        };

        let replies: Vec<(String, f64)> = match msg.type_id() {
            id if id == ids::PARAM_REQUEST_READ || id == ids::PARAM_SET => {
                requests.fetch_add(1, Ordering::SeqCst);
                let skipped = ignore
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if skipped {
                    continue;
                }
                let name = msg.text("param_id").unwrap_or_default().to_string();
                let mut table = params.lock();
                if id == ids::PARAM_SET {
                    let value = msg.scalar("param_value").unwrap_or_default();
                    table.insert(name.clone(), value);
                }
                table
                    .get(&name)
                    .map(|value| vec![(name.clone(), *value)])
                    .unwrap_or_default()
            }
            id if id == ids::PARAM_REQUEST_LIST => {
                requests.fetch_add(1, Ordering::SeqCst);
                params
                    .lock()
                    .iter()
                    .map(|(name, value)| (name.clone(), *value))
                    .collect()
            }
            _ => Vec::new(),
        };

        let count = params.lock().len() as f64;
        for (index, (name, value)) in replies.into_iter().enumerate() {
            let reply = build(
                &codec,
                ids::PARAM_VALUE,
                &[
                    ("param_value", value),
                    ("param_type", PARAM_TYPE_REAL32 as f64),
                    ("param_count", count),
                    ("param_index", index as f64),
                ],
            )
            .with("param_id", name.as_str())
            .expect("param_id fits");
            send(&remote, &codec, &reply).await;
        }
    }
}
