//! Radio Protocol Error Types

use thiserror::Error;

/// Errors while decoding a packet payload into a typed message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Payload between the tokens was empty
    #[error("Empty packet payload")]
    EmptyPayload,

    /// Payload bytes are not valid UTF-8
    #[error("Packet payload is not valid UTF-8")]
    InvalidUtf8,

    /// Leading type tag is not one this protocol knows
    #[error("Unknown packet tag {0:?}")]
    UnknownTag(String),

    /// Wrong number of comma-separated fields for the tag
    #[error("Packet '{tag}' expects {expected} fields, got {actual}")]
    FieldCount {
        tag: char,
        expected: usize,
        actual: usize,
    },

    /// A field could not be parsed into its typed value
    #[error("Invalid {field} value: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// Errors on the serial connection to the radio module
#[derive(Debug, Error)]
pub enum LinkError {
    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Read or write on an open port failed
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_serial::Error> for LinkError {
    fn from(err: tokio_serial::Error) -> Self {
        LinkError::SerialError(err.to_string())
    }
}

/// Errors in the AT command-mode exchange
#[derive(Debug, Error)]
pub enum CommandError {
    /// Module did not answer `OK` at the given step
    #[error("No acknowledgment for {stage} (received {received:?})")]
    NoAcknowledgment {
        stage: &'static str,
        received: String,
    },

    /// Underlying serial link failed
    #[error(transparent)]
    Link(#[from] LinkError),
}
