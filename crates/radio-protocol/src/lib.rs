//! Radio Mesh Protocol
//!
//! This crate defines the byte-level protocol spoken between sensor nodes
//! over a transparent serial radio: the token-delimited packet format, the
//! typed messages carried inside packets, the serial link abstraction, and
//! the AT command-mode driver used to provision the radio module.

mod command;
mod error;
mod link;
mod message;
mod mock;
mod packet;

pub use command::{CommandModeDriver, CommandTiming, RadioRole};
pub use error::{CommandError, LinkError, ProtocolError};
pub use link::{SerialConfig, SerialLink, SerialPortLink};
pub use message::{DeviceConfiguration, RadioMessage, RateChange, SensorReading, SettingsIdentity, SettingsSchedule};
pub use mock::MockLink;
pub use packet::{frame_payload, Packet, PacketTag};

/// Reserved byte values on the radio link
pub mod token {
    /// Start of packet (ASCII STX)
    pub const START: u8 = 0x02;
    /// End of packet (ASCII ETX)
    pub const END: u8 = 0x03;
    /// Separator between the type tag and each field
    pub const FIELD_SEPARATOR: u8 = b',';
    /// Terminator appended by legacy firmware before the end token
    pub const LEGACY_TERMINATOR: u8 = b';';
}
