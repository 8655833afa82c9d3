//! Transport Configuration
//!
//! Every wait in the radio path is a fixed interval: the module gives no
//! completion signal for transmission or command-mode replies. The values
//! below are the ones field nodes run with.

use crate::error::TransportError;
use radio_protocol::{token, CommandTiming, SerialConfig};
use ring_buffer::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing, framing and serial settings for one [`Transport`](crate::Transport)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Byte that opens a packet
    pub start_token: u8,
    /// Byte that closes a packet
    pub end_token: u8,
    /// Receive ring buffer size in bytes
    pub buffer_capacity: usize,
    /// Receiver producer period
    pub read_interval_ms: u64,
    /// Main-loop period between polls
    pub poll_interval_ms: u64,
    /// Wait after flushing a send so the module can get it on air
    pub post_flush_delay_ms: u64,
    /// Line silence around the `+++` escape sequence
    pub guard_time_ms: u64,
    /// Wait before reading a command acknowledgment
    pub command_response_ms: u64,
    /// Wait before reading a register query reply
    pub query_response_ms: u64,
    /// Pause after forwarding a reading from a leaf node
    pub reading_settle_ms: u64,
    /// Pause after forwarding a rate change from a leaf node
    pub rate_settle_ms: u64,
    /// Gap between the `S` and `T` halves of a configuration
    pub settings_gap_ms: u64,
    /// Serial port to the radio module
    pub serial: SerialConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            start_token: token::START,
            end_token: token::END,
            buffer_capacity: DEFAULT_CAPACITY,
            read_interval_ms: 10,
            poll_interval_ms: 50,
            post_flush_delay_ms: 100,
            guard_time_ms: 1100,
            command_response_ms: 100,
            query_response_ms: 200,
            reading_settle_ms: 1000,
            rate_settle_ms: 2500,
            settings_gap_ms: 2000,
            serial: SerialConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Reject settings the framer cannot work with
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.start_token == self.end_token {
            return Err(TransportError::InvalidConfig(format!(
                "start and end tokens must differ (both 0x{:02X})",
                self.start_token
            )));
        }
        if [self.start_token, self.end_token].contains(&token::FIELD_SEPARATOR) {
            return Err(TransportError::InvalidConfig(
                "field separator cannot be used as a packet token".to_string(),
            ));
        }
        if self.buffer_capacity < 2 {
            return Err(TransportError::InvalidConfig(format!(
                "buffer capacity {} cannot hold a packet",
                self.buffer_capacity
            )));
        }
        if self.read_interval_ms == 0 {
            return Err(TransportError::InvalidConfig(
                "read interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Waits used by the AT command-mode driver
    pub fn command_timing(&self) -> CommandTiming {
        CommandTiming {
            guard_time: Duration::from_millis(self.guard_time_ms),
            response_wait: Duration::from_millis(self.command_response_ms),
            query_wait: Duration::from_millis(self.query_response_ms),
        }
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn post_flush_delay(&self) -> Duration {
        Duration::from_millis(self.post_flush_delay_ms)
    }

    pub fn reading_settle(&self) -> Duration {
        Duration::from_millis(self.reading_settle_ms)
    }

    pub fn rate_settle(&self) -> Duration {
        Duration::from_millis(self.rate_settle_ms)
    }

    pub fn settings_gap(&self) -> Duration {
        Duration::from_millis(self.settings_gap_ms)
    }
}
