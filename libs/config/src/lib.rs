//! # Tether Link Configuration
//!
//! Layered settings for a Tether client and the tracing setup that goes
//! with them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use link_config::{logging, LinkConfig};
//! use std::path::Path;
//!
//! let config = LinkConfig::load(Some(Path::new("config/link.toml")))?;
//! logging::init_tracing(&config.logging)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod link_config;
pub mod logging;

pub use link_config::{
    CacheSettings, ConnectionSettings, LinkConfig, LoggingSettings, ParameterSettings,
    RateControlSettings, ReceiverSettings, ENV_PREFIX,
};
