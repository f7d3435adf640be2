//! # Tether Telemetry Runtime
//!
//! Client-side runtime for a vehicle telemetry link. A background receiver
//! decodes every incoming frame into a per-stream cache; applications read
//! that cache through a [`Vehicle`] handle without ever touching the
//! transport themselves.
//!
//! ## Architecture
//!
//! ```text
//! Transport ──> Receiver ──> MessageStore ──> Vehicle::last / next / get
//!                  │              │
//!                  │              └──> MessageLog (optional CSV per stream)
//!                  ├──> ParamTable
//!                  └──> WaiterRegistry ──> wakes blocked next / get
//!
//! Vehicle ──> CommandDispatcher ──> Transport
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use link_config::LinkConfig;
//! use std::time::Duration;
//! use telemetry::Connection;
//! use types::LocalPositionNed;
//!
//! # async fn demo() -> telemetry::Result<()> {
//! let connection = Connection::connect(LinkConfig::default()).await?;
//! let vehicle = connection.vehicle();
//! vehicle.wait_for_boot(Duration::from_secs(30)).await?;
//!
//! let position: LocalPositionNed = vehicle.get_as(Duration::from_secs(1), None).await?;
//! println!("altitude {:.1} m", -position.position.z);
//!
//! connection.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod combinator;
pub mod commands;
pub mod connection;
pub mod error;
mod link;
pub mod params;
pub mod persistence;
pub mod rate;
mod receiver;
pub mod scheduling;
pub mod store;
pub mod vehicle;
pub mod waiters;

pub use combinator::{Combinator, CombinatorRegistry, Composite, KinematicState, Pose};
pub use commands::{CommandDispatcher, Endpoint};
pub use connection::Connection;
pub use error::{Result, TelemetryError};
pub use link::{LinkStatus, StatsSnapshot};
pub use params::ParamOptions;
pub use persistence::MessageLog;
pub use rate::{run_scoped, RateEntry, RateGuard};
pub use scheduling::{repeat_during, Repeater, Sample, Watcher};
pub use store::{MessageStore, StreamSnapshot};
pub use vehicle::Vehicle;
pub use waiters::{WaitOutcome, Waiter, WaiterRegistry};
