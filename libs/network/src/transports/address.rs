//! Link address strings
//!
//! ```text
//! udp:0.0.0.0:14550        listen, reply to whoever spoke last
//! udpout:127.0.0.1:14550   send to a fixed remote
//! memory                   in-process pair (tests, simulation)
//! ```

use crate::TransportError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAddress {
    Udp(SocketAddr),
    UdpOut(SocketAddr),
    Memory,
}

impl FromStr for LinkAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("memory") {
            return Ok(LinkAddress::Memory);
        }

        let (scheme, rest) = s.split_once(':').ok_or_else(|| {
            TransportError::configuration(
                format!("link address '{}' has no scheme (udp:, udpout:, memory)", s),
                Some("address"),
            )
        })?;

        let socket = |raw: &str| {
            raw.parse::<SocketAddr>().map_err(|e| {
                TransportError::configuration(
                    format!("invalid socket address '{}': {}", raw, e),
                    Some("address"),
                )
            })
        };

        match scheme.to_ascii_lowercase().as_str() {
            "udp" | "udpin" => Ok(LinkAddress::Udp(socket(rest)?)),
            "udpout" => Ok(LinkAddress::UdpOut(socket(rest)?)),
            other => Err(TransportError::configuration(
                format!("unsupported link scheme '{}'", other),
                Some("address"),
            )),
        }
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddress::Udp(addr) => write!(f, "udp:{}", addr),
            LinkAddress::UdpOut(addr) => write!(f, "udpout:{}", addr),
            LinkAddress::Memory => write!(f, "memory"),
        }
    }
}

impl Serialize for LinkAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LinkAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
