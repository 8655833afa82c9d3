//! Radio Mesh Transport
//!
//! Moves sensor events between nodes over a transparent serial radio:
//! - a receiver task fills a ring buffer from the serial port
//! - the framer pulls token-delimited packets out of that buffer
//! - the dispatcher turns packets into events, pairing configuration halves
//! - the send path frames outgoing messages and waits for them to go on air
//!
//! Provisioning of the radio module through AT command mode also runs
//! through the [`Transport`], which holds the receive buffer meanwhile.

mod collaborators;
mod config;
mod dispatcher;
mod error;
mod framer;
mod receiver;
mod transport;

pub use collaborators::{NodeIdentity, Uplink};
pub use config::TransportConfig;
pub use dispatcher::{PacketDispatcher, PairingState, TransportEvent};
pub use error::TransportError;
pub use framer::{FramerStats, PacketFramer};
pub use receiver::Receiver;
pub use transport::{PollReport, Transport};
