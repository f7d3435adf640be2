//! # Message Store
//!
//! Per-stream cache of recently received messages. The receiver task is the
//! only writer; any number of application tasks read concurrently.
//!
//! Each [`MessageKey`] owns one [`CachedMessage`]: a ring of the newest
//! `history_len` messages, the monotonic arrival time of the newest one and
//! a running rate estimate. A stream's entry is replaced in place under its
//! shard lock, so a reader sees either the state before an arrival or the
//! state after it.
//!
//! ## Rate estimate
//!
//! With `n` the number of samples seen so far including the current one,
//! capped at `rate_window`, and `dt` the latest interval:
//!
//! ```text
//! rate = rate * (n - 1) / n + 1 / (n * dt)
//! ```
//!
//! The estimate is 0 until a stream has two arrivals. Arrivals with
//! `dt == 0` count as samples but leave the estimate alone.
//!
//! ## Persistence
//!
//! With a log directory configured, every arrival is also appended to the
//! stream's [`MessageLog`]. Opening the store scans that directory and
//! prefills each known stream from the tail of its log, so `last` answers
//! immediately after a restart. A log that fails is closed for the rest of
//! the session and the stream keeps caching in memory.

use crate::error::{Result, TelemetryError};
use crate::persistence::MessageLog;
use codec::MessageCodec;
use dashmap::DashMap;
use link_config::CacheSettings;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use types::{Message, MessageKey, MessageTypeId, SystemId};

/// Cache state of one stream
#[derive(Debug, Clone)]
pub struct CachedMessage {
    history: VecDeque<Arc<Message>>,
    capacity: usize,
    last_arrival: Option<Instant>,
    rate: f64,
    samples: u32,
}

impl CachedMessage {
    fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            last_arrival: None,
            rate: 0.0,
            samples: 0,
        }
    }

    /// Seed from a log tail; restored values carry no arrival time
    fn restored(capacity: usize, messages: Vec<Message>) -> Self {
        let mut entry = Self::new(capacity);
        for msg in messages {
            entry.push_ring(Arc::new(msg));
        }
        entry
    }

    fn push_ring(&mut self, msg: Arc<Message>) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(msg);
    }

    fn arrive(&mut self, msg: Arc<Message>, now: Instant, window: u32) {
        self.samples = self.samples.saturating_add(1);
        if let Some(previous) = self.last_arrival {
            let dt = now.saturating_duration_since(previous).as_secs_f64();
            if dt > 0.0 {
                let n = self.samples.min(window) as f64;
                self.rate = self.rate * (n - 1.0) / n + 1.0 / (n * dt);
            }
        }
        self.last_arrival = Some(now);
        self.push_ring(msg);
    }

    /// Newest message
    pub fn latest(&self) -> Option<&Arc<Message>> {
        self.history.back()
    }

    /// Messages oldest first
    pub fn history(&self) -> impl Iterator<Item = &Arc<Message>> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Messages per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Time since the newest arrival; `None` for restored-only entries
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last_arrival
            .map(|arrival| now.saturating_duration_since(arrival))
    }
}

/// Read-only summary of one stream
#[derive(Debug, Clone)]
pub struct StreamSnapshot {
    pub key: MessageKey,
    pub latest: Arc<Message>,
    pub rate: f64,
    pub age: Option<Duration>,
    pub len: usize,
}

pub struct MessageStore {
    entries: DashMap<MessageKey, CachedMessage>,
    history_len: usize,
    rate_window: u32,
    log_dir: Option<PathBuf>,
    /// `None` marks a stream whose log failed
    logs: Mutex<HashMap<MessageKey, Option<MessageLog>>>,
}

impl MessageStore {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            entries: DashMap::new(),
            history_len: settings.history_len.max(1),
            rate_window: settings.rate_window.max(1),
            log_dir: settings.log_dir.clone(),
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Build a store and prefill it from existing logs in `settings.log_dir`
    pub fn open(settings: &CacheSettings, codec: &dyn MessageCodec) -> Self {
        let store = Self::new(settings);
        if let Some(dir) = store.log_dir.clone() {
            let restored = store.restore(&dir, codec);
            if restored > 0 {
                info!("Restored {} streams from {:?}", restored, dir);
            }
        }
        store
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    fn restore(&self, dir: &Path, codec: &dyn MessageCodec) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("No logs to restore from {:?}: {}", dir, e);
                return 0;
            }
        };

        let mut restored = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(key) = parse_log_name(&path) else {
                continue;
            };
            let Some(schema) = codec.schema(key.type_id) else {
                debug!("Skipping log {:?}: no schema for type {}", path, key.type_id);
                continue;
            };
            match MessageLog::read_tail(&path, &schema, key, self.history_len) {
                Ok(messages) if !messages.is_empty() => {
                    self.entries
                        .insert(key, CachedMessage::restored(self.history_len, messages));
                    restored += 1;
                }
                Ok(_) => {}
                Err(e) => warn!("Could not restore {:?}: {}", path, e),
            }
        }
        restored
    }

    /// Record an arrival at monotonic time `now`
    pub fn record(&self, msg: Message, now: Instant) -> Arc<Message> {
        let key = msg.key();
        if self.log_dir.is_some() {
            self.persist(key, &msg);
        }

        let msg = Arc::new(msg);
        self.entries
            .entry(key)
            .or_insert_with(|| CachedMessage::new(self.history_len))
            .arrive(msg.clone(), now, self.rate_window);
        msg
    }

    fn persist(&self, key: MessageKey, msg: &Message) {
        let Some(dir) = self.log_dir.as_deref() else {
            return;
        };
        let mut logs = self.logs.lock();
        let slot = logs
            .entry(key)
            .or_insert_with(|| match MessageLog::open(dir, key, msg.schema()) {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!("Persistence disabled for stream {}: {}", key, e);
                    None
                }
            });

        if let Some(log) = slot {
            if let Err(e) = log.append(msg) {
                warn!("Persistence disabled for stream {}: {}", key, e);
                *slot = None;
            }
        }
    }

    /// Newest message for `key`, optionally no older than `max_age`
    ///
    /// The age bound is inclusive.
    pub fn query(
        &self,
        key: MessageKey,
        max_age: Option<Duration>,
        now: Instant,
    ) -> Result<Arc<Message>> {
        let entry = self
            .entries
            .get(&key)
            .ok_or(TelemetryError::NeverReceived { key })?;
        let latest = entry
            .latest()
            .cloned()
            .ok_or(TelemetryError::NeverReceived { key })?;

        if let Some(max_age) = max_age {
            let age = entry.age(now);
            match age {
                Some(age) if age <= max_age => {}
                _ => return Err(TelemetryError::TooOld { key, age, max_age }),
            }
        }
        Ok(latest)
    }

    /// Current rate estimate; `None` if the stream was never seen
    pub fn rate(&self, key: MessageKey) -> Option<f64> {
        self.entries.get(&key).map(|entry| entry.rate())
    }

    /// Cached messages for `key`, oldest first
    pub fn history(&self, key: MessageKey) -> Vec<Arc<Message>> {
        self.entries
            .get(&key)
            .map(|entry| entry.history().cloned().collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, key: MessageKey, now: Instant) -> Option<StreamSnapshot> {
        let entry = self.entries.get(&key)?;
        Some(StreamSnapshot {
            key,
            latest: entry.latest()?.clone(),
            rate: entry.rate(),
            age: entry.age(now),
            len: entry.len(),
        })
    }

    pub fn contains(&self, key: MessageKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// All keys seen so far, sorted
    pub fn keys(&self) -> Vec<MessageKey> {
        let mut keys: Vec<_> = self.entries.iter().map(|entry| *entry.key()).collect();
        keys.sort();
        keys
    }

    /// Keys belonging to one system, sorted
    pub fn keys_for(&self, system: SystemId) -> Vec<MessageKey> {
        self.keys()
            .into_iter()
            .filter(|key| key.system == system)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `<system>_<type>.csv`
fn parse_log_name(path: &Path) -> Option<MessageKey> {
    if path.extension()? != "csv" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (system, type_id) = stem.split_once('_')?;
    Some(MessageKey::new(
        SystemId::new(system.parse().ok()?),
        MessageTypeId::new(type_id.parse().ok()?),
    ))
}
