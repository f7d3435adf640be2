//! # Scheduling Helpers
//!
//! Small background tasks built on `tokio::time::interval`:
//!
//! - [`Watcher`] samples a function every `period` into a bounded,
//!   timestamped history, optionally giving up after a timeout
//! - [`Repeater`] runs an async action at a fixed rate until stopped;
//!   [`repeat_during`] scopes one around a future
//!
//! Both stop cooperatively: a flag plus a wake-up, then a join. Dropping
//! either aborts its task.

use crate::error::{Result, TelemetryError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Stop flag with a wake-up for a task parked on a timer
pub(crate) struct Shutdown {
    stop: AtomicBool,
    wake: Notify,
}

impl Shutdown {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            stop: AtomicBool::new(false),
            wake: Notify::new(),
        })
    }

    pub(crate) fn trigger(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub(crate) fn is_set(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Wait for the next tick or a stop request; true if stopping
    pub(crate) async fn tick(&self, ticker: &mut tokio::time::Interval) -> bool {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = self.wake.notified() => {}
        }
        self.is_set()
    }
}

pub(crate) fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// One watched value
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    /// Time since the first successful read
    pub elapsed: Duration,
    pub value: T,
}

struct History<T> {
    samples: VecDeque<Sample<T>>,
    capacity: usize,
    first_at: Option<Instant>,
    last_at: Option<Instant>,
    timed_out: bool,
}

impl<T> History<T> {
    fn push(&mut self, value: T, now: Instant) {
        let first = *self.first_at.get_or_insert(now);
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            elapsed: now.saturating_duration_since(first),
            value,
        });
        self.last_at = Some(now);
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.first_at = None;
        self.last_at = None;
    }
}

/// Polls a function into a bounded history
pub struct Watcher<T> {
    history: Arc<Mutex<History<T>>>,
    shutdown: Arc<Shutdown>,
    timeout: Option<Duration>,
    task: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Watcher<T> {
    /// Call `read` every `period`, keeping the newest `capacity` results
    ///
    /// Failed reads are logged and skipped. With a `timeout`, watching
    /// ends once it has elapsed and [`Watcher::stop`] reports `Timeout`.
    pub fn spawn<F>(
        period: Duration,
        capacity: usize,
        timeout: Option<Duration>,
        read: F,
    ) -> Result<Self>
    where
        F: FnMut() -> Result<T> + Send + 'static,
    {
        if period.is_zero() || capacity == 0 {
            return Err(TelemetryError::invalid_arguments(
                "watch",
                format!("period {:?} and capacity {} must be non-zero", period, capacity),
            ));
        }
        let history = Arc::new(Mutex::new(History {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            first_at: None,
            last_at: None,
            timed_out: false,
        }));
        let shutdown = Shutdown::new();
        let task = tokio::spawn(watch_loop(
            read,
            history.clone(),
            shutdown.clone(),
            period,
            timeout,
        ));
        Ok(Self {
            history,
            shutdown,
            timeout,
            task: Some(task),
        })
    }

    pub fn len(&self) -> usize {
        self.history.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().samples.is_empty()
    }

    /// Time since the newest successful read
    pub fn last_result_age(&self) -> Option<Duration> {
        self.history
            .lock()
            .last_at
            .map(|at| Instant::now().saturating_duration_since(at))
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Forget every sample; elapsed times restart at the next read
    pub fn reset(&self) {
        self.history.lock().clear();
    }

    /// Stop sampling; the history stays readable
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            self.shutdown.trigger();
            if let Err(e) = task.await {
                error!("Watcher task ended abnormally: {}", e);
            }
        }
        match (self.history.lock().timed_out, self.timeout) {
            (true, Some(timeout)) => Err(TelemetryError::timeout("watcher", timeout)),
            _ => Ok(()),
        }
    }
}

impl<T: Clone> Watcher<T> {
    /// Samples oldest first
    pub fn samples(&self) -> Vec<Sample<T>> {
        self.history.lock().samples.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<T> {
        self.history
            .lock()
            .samples
            .back()
            .map(|sample| sample.value.clone())
    }
}

impl<T> Drop for Watcher<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.shutdown.trigger();
            task.abort();
        }
    }
}

async fn watch_loop<T, F>(
    mut read: F,
    history: Arc<Mutex<History<T>>>,
    shutdown: Arc<Shutdown>,
    period: Duration,
    timeout: Option<Duration>,
) where
    F: FnMut() -> Result<T>,
{
    let began = Instant::now();
    let mut ticker = ticker(period);

    while !shutdown.tick(&mut ticker).await {
        if let Some(limit) = timeout {
            if began.elapsed() >= limit {
                warn!("Watcher gave up after {:?}", limit);
                history.lock().timed_out = true;
                break;
            }
        }
        match read() {
            Ok(value) => history.lock().push(value, Instant::now()),
            Err(e) => debug!("Watched read failed: {}", e),
        }
    }
}

/// Runs an async action at a fixed rate
pub struct Repeater {
    shutdown: Arc<Shutdown>,
    calls: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl Repeater {
    /// Call `action` now and then `rate` times per second
    ///
    /// A failed call is logged; the next one still runs on schedule.
    pub fn start<F, Fut>(rate: f64, mut action: F) -> Result<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(TelemetryError::invalid_arguments(
                "repeat",
                format!("rate {} must be positive", rate),
            ));
        }
        let shutdown = Shutdown::new();
        let calls = Arc::new(AtomicU64::new(0));
        let period = Duration::from_secs_f64(1.0 / rate);

        let task = {
            let shutdown = shutdown.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                let mut ticker = ticker(period);
                while !shutdown.tick(&mut ticker).await {
                    if let Err(e) = action().await {
                        warn!("Repeated call failed: {}", e);
                    }
                    calls.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        debug!("Repeater started at {:.2} Hz", rate);
        Ok(Self {
            shutdown,
            calls,
            task: Some(task),
        })
    }

    /// Calls made so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Stop and wait for an in-flight call; returns the call count
    pub async fn stop(mut self) -> u64 {
        if let Some(task) = self.task.take() {
            self.shutdown.trigger();
            if let Err(e) = task.await {
                error!("Repeater task ended abnormally: {}", e);
            }
        }
        let calls = self.calls();
        info!("Repeater stopped after {} calls", calls);
        calls
    }
}

impl Drop for Repeater {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.shutdown.trigger();
            task.abort();
        }
    }
}

/// Run `work` while `action` repeats at `rate`
pub async fn repeat_during<F, Fut, W, T>(rate: f64, action: F, work: W) -> Result<T>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
    W: Future<Output = T>,
{
    let repeater = Repeater::start(rate, action)?;
    let output = work.await;
    repeater.stop().await;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_watcher_keeps_newest_samples_with_times() {
        let counter = Arc::new(AtomicUsize::new(0));
        let source = counter.clone();
        let mut watcher = Watcher::spawn(Duration::from_millis(100), 3, None, move || {
            Ok(source.fetch_add(1, Ordering::SeqCst))
        })
        .unwrap();

        // reads at 0, 100, .. 500 ms
        tokio::time::sleep(Duration::from_millis(550)).await;
        let samples = watcher.samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(
            samples.iter().map(|s| s.value).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
        assert_eq!(samples[2].elapsed, Duration::from_millis(500));
        assert_eq!(watcher.last_result_age(), Some(Duration::from_millis(50)));

        watcher.stop().await.unwrap();
        assert!(!watcher.is_running());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(watcher.latest(), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_skips_failed_reads() {
        let counter = Arc::new(AtomicUsize::new(0));
        let source = counter.clone();
        let mut watcher = Watcher::spawn(Duration::from_millis(100), 10, None, move || {
            let n = source.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Ok(n)
            } else {
                Err(TelemetryError::Closed)
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(watcher.len(), 2);
        assert_eq!(watcher.latest(), Some(2));

        watcher.reset();
        assert!(watcher.is_empty());
        assert_eq!(watcher.last_result_age(), None);
        watcher.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_timeout_is_reported() {
        let mut watcher =
            Watcher::spawn(Duration::from_millis(100), 5, Some(Duration::from_millis(250)), || {
                Ok(1u8)
            })
            .unwrap();

        // reads at 0, 100 and 200 ms; the 300 ms tick is past the limit
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!watcher.is_running());
        assert_eq!(watcher.len(), 3);
        assert!(matches!(
            watcher.stop().await,
            Err(TelemetryError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_watcher_rejects_zero_period() {
        assert!(Watcher::spawn(Duration::ZERO, 1, None, || Ok(0)).is_err());
        assert!(Watcher::spawn(Duration::from_millis(1), 0, None, || Ok(0)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeater_runs_at_rate_until_stopped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let repeater = Repeater::start(4.0, move || {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

        // calls at 0, 250, .. 1000 ms
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(repeater.calls(), 5);
        assert_eq!(repeater.stop().await, 5);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeater_survives_failing_calls() {
        let repeater = Repeater::start(10.0, || async { Err(TelemetryError::Closed) }).unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(repeater.stop().await, 3);
        assert!(Repeater::start(0.0, || async { Ok(()) }).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_during_scopes_the_repeater() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let output = repeat_during(
            2.0,
            move || {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            async {
                tokio::time::sleep(Duration::from_millis(1200)).await;
                "done"
            },
        )
        .await
        .unwrap();

        assert_eq!(output, "done");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
