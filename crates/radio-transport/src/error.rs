//! Transport Error Types

use radio_protocol::{CommandError, LinkError};
use ring_buffer::RingBufferError;
use thiserror::Error;

/// Errors raised while setting up or driving the radio transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("Receive buffer error: {0}")]
    Buffer(#[from] RingBufferError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("Radio command mode failed: {0}")]
    Command(#[from] CommandError),
}
