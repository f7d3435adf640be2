//! Transport Error Types

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Socket-level failures
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Invalid addresses or transport settings
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Outbound frame before any peer is known (listening UDP)
    #[error("No peer address known yet; waiting for the first inbound datagram")]
    NoPeer,

    /// The other end of the transport has gone away
    #[error("Transport closed")]
    Closed,

    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Frame larger than the transport can carry
    #[error("Frame of {size} bytes exceeds limit {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    /// Send failure injected by a test transport
    #[error("Injected send failure to {peer:?}")]
    Injected { peer: Option<SocketAddr> },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn network_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Whether retrying the same operation later can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransportError::NoPeer
                | TransportError::Timeout { .. }
                | TransportError::Injected { .. }
                | TransportError::Network { .. }
        )
    }
}
