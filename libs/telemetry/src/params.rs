//! Vehicle parameter table
//!
//! Filled by the receiver from every `PARAM_VALUE` it caches, whether the
//! value was requested or arrived as part of a full list download. Request
//! and retry logic lives on [`crate::Vehicle`].
//!
//! Every update takes the next value of a table-wide sequence. A request
//! snapshots [`ParamTable::sequence`] before sending and accepts only
//! entries numbered above it, so a value cached earlier is never mistaken
//! for the reply.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use types::definitions::PARAM_ID_LEN;
use types::{ParamValue, SystemId};

#[derive(Debug, Clone, PartialEq)]
pub struct ParamEntry {
    pub value: f64,
    pub param_type: u8,
    pub index: u16,
    pub count: u16,
    /// Monotonic time the value was received
    pub updated_at: Instant,
    /// Table-wide arrival number
    pub seq: u64,
}

#[derive(Debug, Default)]
pub struct ParamTable {
    entries: DashMap<(SystemId, String), ParamEntry>,
    seq: AtomicU64,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, system: SystemId, param: &ParamValue, now: Instant) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries.insert(
            (system, param.name.clone()),
            ParamEntry {
                value: param.value,
                param_type: param.param_type,
                index: param.index,
                count: param.count,
                updated_at: now,
                seq,
            },
        );
    }

    pub fn get(&self, system: SystemId, name: &str) -> Option<ParamEntry> {
        self.entries
            .get(&(system, name.to_string()))
            .map(|entry| entry.clone())
    }

    /// Number of the latest update; 0 before any
    pub fn sequence(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Value received after update number `after`
    pub fn fresh(&self, system: SystemId, name: &str, after: u64) -> Option<ParamEntry> {
        self.get(system, name).filter(|entry| entry.seq > after)
    }

    /// Every known parameter of `system`, by name
    pub fn values(&self, system: SystemId) -> BTreeMap<String, f64> {
        self.entries
            .iter()
            .filter(|entry| entry.key().0 == system)
            .map(|entry| (entry.key().1.clone(), entry.value().value))
            .collect()
    }

    /// Total count the vehicle advertised, if any value has arrived
    pub fn advertised_count(&self, system: SystemId) -> Option<u16> {
        self.entries
            .iter()
            .filter(|entry| entry.key().0 == system)
            .map(|entry| entry.value().count)
            .max()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parameter names are at most 16 ASCII characters on the wire
pub fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("parameter name is empty".to_string());
    }
    if !name.is_ascii() {
        return Err(format!("parameter name '{}' is not ASCII", name));
    }
    if name.len() > PARAM_ID_LEN {
        return Err(format!(
            "parameter name '{}' exceeds {} characters",
            name, PARAM_ID_LEN
        ));
    }
    Ok(())
}

/// Retry policy for one parameter exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamOptions {
    /// Answer from the table without a request when a value is known
    pub use_cache: bool,
    /// Requests sent before giving up
    pub retries: u32,
    /// Wait for a reply after each request
    pub interval: Duration,
}

impl From<&link_config::ParameterSettings> for ParamOptions {
    fn from(settings: &link_config::ParameterSettings) -> Self {
        Self {
            use_cache: true,
            retries: settings.retries.max(1),
            interval: settings.interval(),
        }
    }
}

impl Default for ParamOptions {
    fn default() -> Self {
        Self::from(&link_config::ParameterSettings::default())
    }
}

/// The wire carries `f32`; compare at that precision
pub fn same_wire_value(a: f64, b: f64) -> bool {
    (a as f32) == (b as f32)
}
