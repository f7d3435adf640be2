//! Link Configuration Module
//!
//! Layered configuration for a Tether client: built-in defaults, then an
//! optional TOML file, then `TETHER__<SECTION>__<KEY>` environment
//! variables.
//!
//! ```toml
//! [connection]
//! address = "udp:0.0.0.0:14550"
//! target_system = 1
//!
//! [cache]
//! history_len = 5
//! log_dir = "~/flight-logs"
//! ```

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "TETHER";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    pub connection: ConnectionSettings,
    pub receiver: ReceiverSettings,
    pub cache: CacheSettings,
    pub parameters: ParameterSettings,
    pub rate_control: RateControlSettings,
    pub logging: LoggingSettings,
}

/// Who we talk to and who we claim to be
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConnectionSettings {
    /// `udp:<bind>`, `udpout:<remote>` or `memory`
    pub address: String,
    pub target_system: u8,
    pub target_component: u8,
    pub source_system: u8,
    pub source_component: u8,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            address: "udp:0.0.0.0:14550".to_string(),
            target_system: 1,
            target_component: 1,
            source_system: 255,
            source_component: 190,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReceiverSettings {
    /// How long one transport read may block
    pub poll_timeout_ms: u64,
    /// Silence after which the link is declared lost
    pub inactivity_timeout_ms: u64,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 100,
            inactivity_timeout_ms: 5000,
        }
    }
}

impl ReceiverSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    /// Messages kept per stream
    pub history_len: usize,
    /// Upper bound on the sample count used by the rate estimate
    pub rate_window: u32,
    /// Directory for per-stream CSV logs; `None` disables persistence
    pub log_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            history_len: 3,
            rate_window: 10,
            log_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ParameterSettings {
    pub retries: u32,
    pub interval_ms: u64,
}

impl Default for ParameterSettings {
    fn default() -> Self {
        Self {
            retries: 3,
            interval_ms: 500,
        }
    }
}

impl ParameterSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RateControlSettings {
    pub check_interval_ms: u64,
    /// Multiplier applied to the target rate when re-requesting
    pub headroom: f64,
    /// Blocking wait used to sample each stream's baseline
    pub baseline_timeout_ms: u64,
    /// Floor for the recorded initial rate
    pub min_rate: f64,
}

impl Default for RateControlSettings {
    fn default() -> Self {
        Self {
            check_interval_ms: 1000,
            headroom: 1.5,
            baseline_timeout_ms: 2000,
            min_rate: 1.0,
        }
    }
}

impl RateControlSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn baseline_timeout(&self) -> Duration {
        Duration::from_millis(self.baseline_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LinkConfig {
    /// Load from an optional TOML file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading link config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build link configuration")?;

        let mut link: LinkConfig = config
            .try_deserialize()
            .context("Failed to deserialize link configuration")?;
        link.expand_paths()?;
        link.validate()?;

        debug!("Link config: {:?}", link);
        Ok(link)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut link: LinkConfig = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .context("Failed to parse link configuration")?
            .try_deserialize()
            .context("Failed to deserialize link configuration")?;
        link.expand_paths()?;
        link.validate()?;
        Ok(link)
    }

    /// Expand `~` and `$VAR` in filesystem paths
    pub fn expand_paths(&mut self) -> Result<()> {
        if let Some(dir) = &self.cache.log_dir {
            let raw = dir.to_string_lossy();
            let expanded = shellexpand::full(&raw).context("Failed to expand cache.log_dir")?;
            self.cache.log_dir = Some(PathBuf::from(expanded.as_ref()));
        }
        Ok(())
    }

    /// Reject settings the runtime cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.connection.address.trim().is_empty() {
            bail!("connection.address must not be empty");
        }
        if self.cache.history_len == 0 {
            bail!("cache.history_len must be at least 1");
        }
        if self.cache.rate_window < 2 {
            bail!("cache.rate_window must be at least 2");
        }
        if self.receiver.poll_timeout_ms == 0 {
            bail!("receiver.poll_timeout_ms must be positive");
        }
        if self.receiver.inactivity_timeout_ms < self.receiver.poll_timeout_ms {
            bail!(
                "receiver.inactivity_timeout_ms ({}) is shorter than poll_timeout_ms ({})",
                self.receiver.inactivity_timeout_ms,
                self.receiver.poll_timeout_ms
            );
        }
        if self.parameters.interval_ms == 0 {
            bail!("parameters.interval_ms must be positive");
        }
        if self.rate_control.check_interval_ms == 0 || self.rate_control.baseline_timeout_ms == 0 {
            bail!("rate_control intervals must be positive");
        }
        if !(self.rate_control.headroom >= 1.0) {
            bail!("rate_control.headroom must be >= 1.0");
        }
        if !(self.rate_control.min_rate > 0.0) {
            bail!("rate_control.min_rate must be positive");
        }
        Ok(())
    }
}
