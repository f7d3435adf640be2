//! # Rate Guard
//!
//! Keeps a set of streams at or above a target rate for a bounded scope.
//!
//! On activation each stream's baseline is sampled with a blocking `get`
//! and recorded as its initial rate (floored at `min_rate`). A background
//! task then checks the observed rates every `check_interval` and, for any
//! stream below target, asks the vehicle for `target * headroom`.
//!
//! [`RateGuard::deactivate`] stops the task, waits for it and restores every
//! stream to its recorded initial rate, even if the task failed. Dropping an
//! active guard does the same in the background on a best-effort basis;
//! [`run_scoped`] wraps a future with activate and deactivate.

use crate::error::{Result, TelemetryError};
use crate::scheduling::{ticker, Shutdown};
use crate::vehicle::Vehicle;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::MessageTypeId;

/// One controlled stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateEntry {
    pub type_id: MessageTypeId,
    /// Rate restored on release
    pub initial_rate: f64,
    /// Rate the control loop maintains
    pub target_rate: f64,
}

pub struct RateGuard {
    vehicle: Vehicle,
    entries: Arc<Vec<RateEntry>>,
    shutdown: Arc<Shutdown>,
    task: Option<JoinHandle<()>>,
}

impl RateGuard {
    /// Record baselines and start the control loop
    pub async fn activate(vehicle: &Vehicle, type_ids: &[MessageTypeId], rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(TelemetryError::invalid_arguments(
                "subscribe",
                format!("rate {} must be positive", rate),
            ));
        }
        let settings = vehicle.link().config.rate_control.clone();

        let mut entries = Vec::with_capacity(type_ids.len());
        for &type_id in type_ids {
            let observed = match vehicle.get(type_id, settings.baseline_timeout(), None).await {
                Ok(_) => vehicle.rate(type_id),
                Err(TelemetryError::Timeout { .. }) => {
                    warn!(
                        "No baseline for type {} within {:?}, assuming silent",
                        type_id,
                        settings.baseline_timeout()
                    );
                    0.0
                }
                Err(e) => return Err(e),
            };
            let initial_rate = observed.max(settings.min_rate);
            let target_rate = initial_rate.max(rate);
            debug!(
                "Rate guard for type {}: observed {:.2} Hz, initial {:.2} Hz, target {:.2} Hz",
                type_id, observed, initial_rate, target_rate
            );
            entries.push(RateEntry {
                type_id,
                initial_rate,
                target_rate,
            });
        }

        let entries = Arc::new(entries);
        let shutdown = Shutdown::new();
        let task = tokio::spawn(control_loop(
            vehicle.clone(),
            entries.clone(),
            shutdown.clone(),
            settings.check_interval(),
            settings.headroom,
        ));

        info!(
            "Rate guard active for {} stream(s) on vehicle {}",
            entries.len(),
            vehicle.system()
        );
        Ok(Self {
            vehicle: vehicle.clone(),
            entries,
            shutdown,
            task: Some(task),
        })
    }

    pub fn entries(&self) -> &[RateEntry] {
        &self.entries
    }

    pub fn initial_rate(&self, type_id: MessageTypeId) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.type_id == type_id)
            .map(|entry| entry.initial_rate)
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Stop the loop and restore every initial rate
    ///
    /// All streams are restored even if one fails; the first error is
    /// returned.
    pub async fn deactivate(mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        self.shutdown.trigger();
        if let Err(e) = task.await {
            error!("Rate control loop ended abnormally: {}", e);
        }
        let result = restore(&self.vehicle, &self.entries).await;
        info!("Rate guard released on vehicle {}", self.vehicle.system());
        result
    }
}

impl Drop for RateGuard {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.shutdown.trigger();
        task.abort();

        let vehicle = self.vehicle.clone();
        let entries = self.entries.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = restore(&vehicle, &entries).await {
                        warn!("Rate restore after drop failed: {}", e);
                    }
                });
            }
            Err(_) => warn!("Rate guard dropped outside a runtime; initial rates not restored"),
        }
    }
}

async fn restore(vehicle: &Vehicle, entries: &[RateEntry]) -> Result<()> {
    let mut first_error = None;
    for entry in entries {
        if let Err(e) = vehicle
            .set_message_rate(entry.type_id, entry.initial_rate)
            .await
        {
            warn!(
                "Could not restore type {} to {:.2} Hz: {}",
                entry.type_id, entry.initial_rate, e
            );
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn control_loop(
    vehicle: Vehicle,
    entries: Arc<Vec<RateEntry>>,
    shutdown: Arc<Shutdown>,
    check_interval: std::time::Duration,
    headroom: f64,
) {
    let mut ticker = ticker(check_interval);

    while !shutdown.tick(&mut ticker).await {
        for entry in entries.iter() {
            let observed = vehicle.rate(entry.type_id);
            if observed >= entry.target_rate {
                continue;
            }
            let requested = entry.target_rate * headroom;
            debug!(
                "Type {} at {:.2} Hz below {:.2} Hz, requesting {:.2} Hz",
                entry.type_id, observed, entry.target_rate, requested
            );
            if let Err(e) = vehicle.set_message_rate(entry.type_id, requested).await {
                warn!("Rate request for type {} failed: {}", entry.type_id, e);
            }
        }
    }
    debug!("Rate control loop stopped");
}

/// Run `work` with `type_ids` held at `rate`, restoring rates afterwards
pub async fn run_scoped<F, T>(
    vehicle: &Vehicle,
    type_ids: &[MessageTypeId],
    rate: f64,
    work: F,
) -> Result<T>
where
    F: Future<Output = T>,
{
    let guard = RateGuard::activate(vehicle, type_ids, rate).await?;
    let output = work.await;
    guard.deactivate().await?;
    Ok(output)
}
