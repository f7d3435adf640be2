//! # Waiter Registry
//!
//! Blocking readers register a [`Waiter`] for a stream and park on it. The
//! receiver signals every waiter registered for a key after it has updated
//! the store, so a woken reader always finds the new message in the cache.
//!
//! Waiters are per consumer: two tasks waiting on the same key each get
//! their own slot and both wake on the next arrival. A waiter is released
//! when it is dropped, whatever path the owning call returns through.
//!
//! A signal that arrives while the owner is not parked is remembered until
//! the next [`Waiter::wait`] or [`Waiter::take_signal`], so nothing is lost
//! between "check the cache" and "start waiting".

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use types::MessageKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A new message for the key was cached
    Signaled,
    /// The deadline passed first
    TimedOut,
    /// The registry was closed because the link went away
    Closed,
}

#[derive(Default)]
struct Slot {
    pending: AtomicBool,
    notify: Notify,
}

impl Slot {
    fn fire(&self) {
        self.pending.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

#[derive(Default)]
pub struct WaiterRegistry {
    slots: DashMap<MessageKey, HashMap<u64, Arc<Slot>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh, unsignaled waiter for `key`
    pub fn acquire(self: &Arc<Self>, key: MessageKey) -> Waiter {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot::default());
        self.slots.entry(key).or_default().insert(id, slot.clone());
        Waiter {
            registry: self.clone(),
            key,
            id,
            slot,
        }
    }

    /// Wake every waiter registered for `key`
    pub fn signal(&self, key: MessageKey) {
        if let Some(slots) = self.slots.get(&key) {
            for slot in slots.values() {
                slot.fire();
            }
        }
    }

    /// Wake everything and make further waits return [`WaitOutcome::Closed`]
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut woken = 0;
        for entry in self.slots.iter() {
            for slot in entry.value().values() {
                slot.notify.notify_one();
                woken += 1;
            }
        }
        debug!("Waiter registry closed, woke {} waiters", woken);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Waiters currently registered for `key`
    pub fn count(&self, key: MessageKey) -> usize {
        self.slots.get(&key).map(|slots| slots.len()).unwrap_or(0)
    }

    /// Waiters registered across all keys
    pub fn len(&self) -> usize {
        self.slots.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: MessageKey, id: u64) {
        if let Some(mut slots) = self.slots.get_mut(&key) {
            slots.remove(&id);
        }
        self.slots.remove_if(&key, |_, slots| slots.is_empty());
    }
}

/// One consumer's registration; released on drop
pub struct Waiter {
    registry: Arc<WaiterRegistry>,
    key: MessageKey,
    id: u64,
    slot: Arc<Slot>,
}

impl Waiter {
    pub fn key(&self) -> MessageKey {
        self.key
    }

    /// Consume a pending signal without blocking
    pub fn take_signal(&self) -> bool {
        self.slot.pending.swap(false, Ordering::AcqRel)
    }

    /// Park until signaled, closed or `deadline`
    pub async fn wait(&self, deadline: Instant) -> WaitOutcome {
        loop {
            if self.registry.is_closed() {
                return WaitOutcome::Closed;
            }
            if self.take_signal() {
                return WaitOutcome::Signaled;
            }
            if tokio::time::timeout_at(deadline, self.slot.notify.notified())
                .await
                .is_err()
            {
                if self.registry.is_closed() {
                    return WaitOutcome::Closed;
                }
                return if self.take_signal() {
                    WaitOutcome::Signaled
                } else {
                    WaitOutcome::TimedOut
                };
            }
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.registry.release(self.key, self.id);
    }
}
