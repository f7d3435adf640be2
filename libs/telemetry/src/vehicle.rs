//! # Vehicle Access Facade
//!
//! A [`Vehicle`] is a cheap, cloneable handle onto one target system of a
//! connection. Telemetry is read three ways:
//!
//! - [`Vehicle::last`]: newest cached value, never blocks
//! - [`Vehicle::next`]: the first value to arrive after the call
//! - [`Vehicle::get`]: cached if fresh enough, otherwise wait, requesting
//!   the message from the vehicle while waiting if the stream is too slow
//!   to answer in time on its own
//!
//! Each has a typed form (`last_as`, `next_as`, `get_as`) that converts via
//! [`TelemetryMessage`]. Once the link is lost or stopped, `next` and `get`
//! fail immediately; `last` keeps serving whatever is cached.
//!
//! The handle also carries the command surface (named commands, message
//! requests, stream rates), parameter access with retry, combinator fusion
//! and the world frame used by fusion. [`Vehicle::watch`] and
//! [`Vehicle::repeat_command`] start background samplers and command
//! repeaters bound to this vehicle.

use crate::combinator::{Composite, FusionContext, KinematicState, Pose, RoleValues};
use crate::commands::{table, Endpoint};
use crate::error::{Result, TelemetryError};
use crate::link::{LinkState, LinkStatus};
use crate::params::{same_wire_value, validate_name, ParamOptions};
use crate::rate::RateGuard;
use crate::scheduling::{Repeater, Watcher};
use crate::waiters::WaitOutcome;
use futures::future::try_join_all;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use types::definitions::ids;
use types::{
    ComponentId, Heartbeat, HomePosition, Message, MessageKey, MessageTypeId, SystemId,
    TelemetryMessage, Transform,
};

/// Re-request period while `get` waits
const MAX_REQUEST_PERIOD: Duration = Duration::from_secs(1);
/// Streams slower than once per this (or the timeout, if shorter) are requested
const MAX_PASSIVE_PERIOD: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct Vehicle {
    link: Arc<LinkState>,
    target: Endpoint,
    frame: Arc<RwLock<Transform>>,
}

impl Vehicle {
    pub(crate) fn new(link: Arc<LinkState>, target: Endpoint) -> Self {
        Self {
            link,
            target,
            frame: Arc::new(RwLock::new(Transform::identity())),
        }
    }

    pub fn system(&self) -> SystemId {
        self.target.system
    }

    pub fn component(&self) -> ComponentId {
        self.target.component
    }

    pub fn key(&self, type_id: MessageTypeId) -> MessageKey {
        MessageKey::new(self.target.system, type_id)
    }

    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    pub(crate) fn link(&self) -> &Arc<LinkState> {
        &self.link
    }

    // ===== Telemetry access =====

    /// Newest cached message, no older than `max_age` if given
    pub fn last(&self, type_id: MessageTypeId, max_age: Option<Duration>) -> Result<Arc<Message>> {
        self.link
            .store
            .query(self.key(type_id), max_age, Instant::now())
    }

    /// Wait for the next arrival after this call
    pub async fn next(&self, type_id: MessageTypeId, timeout: Duration) -> Result<Arc<Message>> {
        let key = self.key(type_id);
        self.link.ensure_alive()?;
        let waiter = self.link.waiters.acquire(key);

        match waiter.wait(Instant::now() + timeout).await {
            WaitOutcome::Signaled => self.link.store.query(key, None, Instant::now()),
            WaitOutcome::TimedOut => Err(TelemetryError::timeout(format!("next {}", key), timeout)),
            WaitOutcome::Closed => Err(self.link.closed_error()),
        }
    }

    /// Cached value if fresh, otherwise wait, requesting slow streams
    ///
    /// With `max_age` of `None` any cached value is fresh. While waiting,
    /// the message is requested from the vehicle if the stream has never
    /// been seen or its rate is below `1 / min(timeout, 2s)`; requests
    /// repeat every `min(timeout, 1s)`. A failed request is logged and the
    /// wait continues.
    pub async fn get(
        &self,
        type_id: MessageTypeId,
        timeout: Duration,
        max_age: Option<Duration>,
    ) -> Result<Arc<Message>> {
        let key = self.key(type_id);
        self.link.ensure_alive()?;

        // registered before the cache read so an arrival in between still signals
        let waiter = self.link.waiters.acquire(key);
        match self.link.store.query(key, max_age, Instant::now()) {
            Ok(msg) => return Ok(msg),
            Err(e) if e.is_cache_miss() => {}
            Err(e) => return Err(e),
        }

        let baseline = self.link.store.rate(key);
        let start = Instant::now();
        let deadline = start + timeout;

        let request_every = timeout.min(MAX_REQUEST_PERIOD);
        let needs_request = match baseline {
            None => true,
            Some(rate) => rate < 1.0 / timeout.min(MAX_PASSIVE_PERIOD).as_secs_f64(),
        };
        let mut next_request = start;

        loop {
            if waiter.take_signal() {
                return self.link.store.query(key, None, Instant::now());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TelemetryError::timeout(format!("get {}", key), timeout));
            }

            if needs_request && now >= next_request {
                if let Err(e) = self.request_message(type_id).await {
                    warn!("Request for {} failed, still waiting: {}", key, e);
                }
                next_request = now + request_every;
            }

            let wake = if needs_request {
                deadline.min(next_request)
            } else {
                deadline
            };
            match waiter.wait(wake).await {
                WaitOutcome::Signaled => {
                    return self.link.store.query(key, None, Instant::now());
                }
                WaitOutcome::TimedOut => {}
                WaitOutcome::Closed => return Err(self.link.closed_error()),
            }
        }
    }

    pub fn last_as<T: TelemetryMessage>(&self, max_age: Option<Duration>) -> Result<T> {
        let msg = self.last(T::TYPE_ID, max_age)?;
        Ok(T::from_message(&msg)?)
    }

    pub async fn next_as<T: TelemetryMessage>(&self, timeout: Duration) -> Result<T> {
        let msg = self.next(T::TYPE_ID, timeout).await?;
        Ok(T::from_message(&msg)?)
    }

    pub async fn get_as<T: TelemetryMessage>(
        &self,
        timeout: Duration,
        max_age: Option<Duration>,
    ) -> Result<T> {
        let msg = self.get(T::TYPE_ID, timeout, max_age).await?;
        Ok(T::from_message(&msg)?)
    }

    /// Cached messages for a type, oldest first
    pub fn history(&self, type_id: MessageTypeId) -> Vec<Arc<Message>> {
        self.link.store.history(self.key(type_id))
    }

    /// Observed rate in Hz; 0 for streams never seen
    pub fn rate(&self, type_id: MessageTypeId) -> f64 {
        self.link.store.rate(self.key(type_id)).unwrap_or(0.0)
    }

    /// Message types seen from this vehicle
    pub fn message_types(&self) -> Vec<MessageTypeId> {
        self.link
            .store
            .keys_for(self.target.system)
            .into_iter()
            .map(|key| key.type_id)
            .collect()
    }

    // ===== Waiting helpers =====

    /// Wait for a heartbeat reporting the vehicle initialised
    pub async fn wait_for_boot(&self, timeout: Duration) -> Result<Heartbeat> {
        let deadline = Instant::now() + timeout;
        if let Ok(heartbeat) = self.last_as::<Heartbeat>(None) {
            if heartbeat.is_initialised() {
                return Ok(heartbeat);
            }
        }
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TelemetryError::timeout("vehicle boot", timeout));
            }
            let heartbeat = match self.next_as::<Heartbeat>(remaining).await {
                Ok(heartbeat) => heartbeat,
                Err(TelemetryError::Timeout { .. }) => {
                    return Err(TelemetryError::timeout("vehicle boot", timeout))
                }
                Err(e) => return Err(e),
            };
            if heartbeat.is_initialised() {
                info!("Vehicle {} initialised", self.target.system);
                return Ok(heartbeat);
            }
        }
    }

    /// Poll `condition` every `poll` until it holds or `timeout` passes
    pub async fn wait_until<F>(&self, condition: F, timeout: Duration, poll: Duration) -> Result<()>
    where
        F: Fn(&Vehicle) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.link.ensure_alive()?;
            if condition(self) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TelemetryError::timeout("condition", timeout));
            }
            tokio::time::sleep_until(deadline.min(now + poll)).await;
        }
    }

    /// Sample `read` over this vehicle every `period` into a bounded history
    pub fn watch<T, F>(&self, period: Duration, capacity: usize, mut read: F) -> Result<Watcher<T>>
    where
        T: Send + 'static,
        F: FnMut(&Vehicle) -> Result<T> + Send + 'static,
    {
        let vehicle = self.clone();
        Watcher::spawn(period, capacity, None, move || read(&vehicle))
    }

    /// Resend a named command `rate` times per second until the repeater stops
    pub fn repeat_command(&self, name: &str, args: &[f64], rate: f64) -> Result<Repeater> {
        table::build(name, args)?;
        let vehicle = self.clone();
        let name = name.to_string();
        let args = args.to_vec();
        Repeater::start(rate, move || {
            let vehicle = vehicle.clone();
            let name = name.clone();
            let args = args.clone();
            async move { vehicle.send_command(&name, &args).await }
        })
    }

    // ===== Frames and fusion =====

    /// World-from-NED transform applied by combinators
    pub fn frame(&self) -> Transform {
        *self.frame.read()
    }

    pub fn set_frame(&self, frame: Transform) {
        *self.frame.write() = frame;
    }

    /// Make the world frame the vehicle's home frame
    pub async fn align_to_home(&self, timeout: Duration) -> Result<Transform> {
        let home: HomePosition = self.get_as(timeout, None).await?;
        let frame = Transform::new(home.position, home.orientation).inverse();
        self.set_frame(frame);
        info!(
            "Aligned vehicle {} world frame to home ({:.7}, {:.7})",
            self.target.system, home.latitude, home.longitude
        );
        Ok(frame)
    }

    /// Fuse the newest cached values of a combinator's roles
    pub fn combine(&self, name: &str) -> Result<Composite> {
        let combinator = self.link.combinators.get(name)?;
        let mut values = HashMap::with_capacity(combinator.roles.len());
        for (role, type_id) in &combinator.roles {
            match self.last(*type_id, None) {
                Ok(msg) => {
                    values.insert(*role, msg);
                }
                Err(TelemetryError::NeverReceived { key }) => {
                    return Err(TelemetryError::Unavailable {
                        combinator: combinator.name.to_string(),
                        role: *role,
                        key,
                    })
                }
                Err(e) => return Err(e),
            }
        }
        combinator.fuse(&RoleValues::new(values), &self.fusion_context())
    }

    /// Fuse after obtaining every role through `get`, concurrently
    pub async fn combine_get(
        &self,
        name: &str,
        timeout: Duration,
        max_age: Option<Duration>,
    ) -> Result<Composite> {
        let combinator = self.link.combinators.get(name)?;
        let fetches = combinator.roles.iter().map(|(role, type_id)| async move {
            self.get(*type_id, timeout, max_age)
                .await
                .map(|msg| (*role, msg))
        });
        let values: HashMap<_, _> = try_join_all(fetches).await?.into_iter().collect();
        combinator.fuse(&RoleValues::new(values), &self.fusion_context())
    }

    pub fn state(&self) -> Result<KinematicState> {
        self.combine("state")?
            .into_state()
            .ok_or_else(|| TelemetryError::UnknownCombinator("state".to_string()))
    }

    pub fn pose(&self) -> Result<Pose> {
        self.combine("pose")?
            .into_pose()
            .ok_or_else(|| TelemetryError::UnknownCombinator("pose".to_string()))
    }

    fn fusion_context(&self) -> FusionContext {
        FusionContext {
            frame: self.frame(),
            time: types::unix_time_secs(),
        }
    }

    // ===== Commands =====

    /// Send a named command from the command table
    pub async fn send_command(&self, name: &str, args: &[f64]) -> Result<()> {
        self.link.dispatcher.send(self.target, name, args).await
    }

    /// Ask the vehicle to emit one instance of a message
    pub async fn request_message(&self, type_id: MessageTypeId) -> Result<()> {
        self.send_command("request_message", &[type_id.inner() as f64])
            .await
    }

    /// Ask for a stream rate in Hz; 0 or less stops the stream
    pub async fn set_message_rate(&self, type_id: MessageTypeId, rate: f64) -> Result<()> {
        self.send_command("set_message_rate", &[type_id.inner() as f64, rate])
            .await
    }

    pub async fn arm(&self) -> Result<()> {
        self.send_command("arm", &[]).await
    }

    pub async fn disarm(&self) -> Result<()> {
        self.send_command("disarm", &[]).await
    }

    pub async fn set_mode(&self, custom_mode: u32) -> Result<()> {
        self.send_command("set_mode", &[custom_mode as f64]).await
    }

    /// Keep `type_ids` at `rate` Hz or faster until the guard is released
    pub async fn subscribe(&self, type_ids: &[MessageTypeId], rate: f64) -> Result<RateGuard> {
        RateGuard::activate(self, type_ids, rate).await
    }

    // ===== Parameters =====

    /// Read a parameter with the configured retry policy
    pub async fn get_parameter(&self, name: &str) -> Result<f64> {
        let options = ParamOptions::from(&self.link.config.parameters);
        self.get_parameter_with(name, options).await
    }

    pub async fn get_parameter_with(&self, name: &str, options: ParamOptions) -> Result<f64> {
        validate_name(name)
            .map_err(|reason| TelemetryError::invalid_arguments("get_parameter", reason))?;
        self.link.ensure_alive()?;

        if options.use_cache {
            if let Some(entry) = self.link.params.get(self.target.system, name) {
                return Ok(entry.value);
            }
        }

        self.param_exchange(
            name,
            options,
            |received| received.is_some(),
            |link, target| {
                let name = name.to_string();
                async move { link.dispatcher.request_parameter(target, &name).await }
            },
        )
        .await
    }

    /// Write a parameter and wait for the vehicle to echo the new value
    pub async fn set_parameter(&self, name: &str, value: f64) -> Result<()> {
        let options = ParamOptions::from(&self.link.config.parameters);
        self.set_parameter_with(name, value, options).await
    }

    pub async fn set_parameter_with(
        &self,
        name: &str,
        value: f64,
        options: ParamOptions,
    ) -> Result<()> {
        validate_name(name)
            .map_err(|reason| TelemetryError::invalid_arguments("set_parameter", reason))?;
        if !value.is_finite() {
            return Err(TelemetryError::invalid_arguments(
                "set_parameter",
                format!("value {} is not finite", value),
            ));
        }
        self.link.ensure_alive()?;

        self.param_exchange(
            name,
            options,
            |echoed| echoed.is_some_and(|v| same_wire_value(v, value)),
            |link, target| {
                let name = name.to_string();
                async move { link.dispatcher.set_parameter(target, &name, value).await }
            },
        )
        .await
        .map(|_| ())
    }

    /// Send, wait for a matching reply, resend on silence
    ///
    /// A reply counts only if the table entry was updated after the
    /// current attempt was sent.
    async fn param_exchange<A, S, Fut>(
        &self,
        name: &str,
        options: ParamOptions,
        accept: A,
        send: S,
    ) -> Result<f64>
    where
        A: Fn(Option<f64>) -> bool,
        S: Fn(Arc<LinkState>, Endpoint) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let key = self.key(ids::PARAM_VALUE);
        let attempts = options.retries.max(1);

        for attempt in 1..=attempts {
            let waiter = self.link.waiters.acquire(key);
            let sent_seq = self.link.params.sequence();
            let sent_at = Instant::now();
            if let Err(e) = send(self.link.clone(), self.target).await {
                warn!("Parameter {} attempt {}/{} not sent: {}", name, attempt, attempts, e);
            }
            let deadline = sent_at + options.interval;

            loop {
                let fresh = self
                    .link
                    .params
                    .fresh(self.target.system, name, sent_seq)
                    .map(|entry| entry.value);
                if accept(fresh) {
                    if let Some(value) = fresh {
                        return Ok(value);
                    }
                }
                match waiter.wait(deadline).await {
                    WaitOutcome::Signaled => continue,
                    WaitOutcome::TimedOut => break,
                    WaitOutcome::Closed => return Err(self.link.closed_error()),
                }
            }
            debug!("Parameter {} attempt {}/{} unanswered", name, attempt, attempts);
        }

        Err(TelemetryError::timeout(
            format!("parameter {}", name),
            options.interval * attempts,
        ))
    }

    /// Ask the vehicle to stream its full parameter list
    pub async fn request_parameter_list(&self) -> Result<()> {
        self.link.ensure_alive()?;
        self.link.dispatcher.request_parameter_list(self.target).await
    }

    /// Every parameter value received so far
    pub fn parameters(&self) -> BTreeMap<String, f64> {
        self.link.params.values(self.target.system)
    }

    /// Parameter count the vehicle advertised, if known
    pub fn parameter_count(&self) -> Option<u16> {
        self.link.params.advertised_count(self.target.system)
    }
}

impl std::fmt::Debug for Vehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vehicle")
            .field("target", &self.target)
            .field("status", &self.link.status())
            .finish()
    }
}
