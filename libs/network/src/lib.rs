//! Network Infrastructure
//!
//! Frame transports for the Tether link: UDP sockets for real vehicles and
//! an in-process pair for tests and simulation.

pub mod error;
pub mod transports;

pub use error::{Result, TransportError};
pub use transports::{
    connect, LinkAddress, MemoryTransport, Transport, TransportInfo, TransportType, UdpConfig,
    UdpTransport,
};
