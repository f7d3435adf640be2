//! Error taxonomy for telemetry access, commands and persistence

use codec::CodecError;
use network::TransportError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use types::{FieldError, MessageKey};

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Nothing has ever been cached for this stream
    #[error("No message received yet for stream {key}")]
    NeverReceived { key: MessageKey },

    /// Cached, but older than the caller allows; `age` is `None` for values
    /// restored from a log with no arrival time this session
    #[error("Latest message for stream {key} is too old (age {age:?}, limit {max_age:?})")]
    TooOld {
        key: MessageKey,
        age: Option<Duration>,
        max_age: Duration,
    },

    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    /// Receiver stopped hearing from the vehicle; terminal for this connection
    #[error("Connection lost: no valid message for {silence:?}")]
    ConnectionLost { silence: Duration },

    /// Connection was stopped by the application
    #[error("Connection closed")]
    Closed,

    /// A combinator role has never been received
    #[error("Combinator '{combinator}' unavailable: role '{role}' (stream {key}) never received")]
    Unavailable {
        combinator: String,
        role: &'static str,
        key: MessageKey,
    },

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Unknown combinator '{0}'")]
    UnknownCombinator(String),

    #[error("Invalid arguments for '{command}': {reason}")]
    InvalidArguments { command: String, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("Persistence error for {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

impl TelemetryError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            timeout,
        }
    }

    pub fn invalid_arguments(command: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// The connection can no longer deliver messages
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TelemetryError::ConnectionLost { .. } | TelemetryError::Closed
        )
    }

    /// Cache miss on the non-blocking path
    pub fn is_cache_miss(&self) -> bool {
        matches!(
            self,
            TelemetryError::NeverReceived { .. } | TelemetryError::TooOld { .. }
        )
    }
}
