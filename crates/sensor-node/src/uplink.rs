//! Log-backed uplink
//!
//! Stands in for the server connection: every event the coordinator would
//! forward is written as a JSON record to the log.

use chrono::{DateTime, Utc};
use radio_protocol::{DeviceConfiguration, RateChange, SensorReading};
use radio_transport::Uplink;
use serde::Serialize;
use tracing::{error, info};

/// One forwarded event
#[derive(Debug, Clone, Serialize)]
pub struct UplinkRecord<'a, T: Serialize> {
    pub message_type: &'static str,
    pub server: &'a str,
    pub received_at: DateTime<Utc>,
    pub event: &'a T,
}

/// [`Uplink`] that logs each event instead of sending it
#[derive(Debug)]
pub struct LoggingUplink {
    server: String,
    submitted: u64,
}

impl LoggingUplink {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            submitted: 0,
        }
    }

    /// Events accepted so far
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    fn record<T: Serialize>(&mut self, message_type: &'static str, event: &T) -> bool {
        let record = UplinkRecord {
            message_type,
            server: &self.server,
            received_at: Utc::now(),
            event,
        };
        match serde_json::to_string(&record) {
            Ok(json) => {
                info!(target: "uplink", "{}", json);
                self.submitted += 1;
                true
            }
            Err(e) => {
                error!("Failed to serialize {} event: {}", message_type, e);
                false
            }
        }
    }
}

impl Uplink for LoggingUplink {
    fn submit_reading(&mut self, reading: &SensorReading) -> bool {
        self.record("reading", reading)
    }

    fn submit_rate_change(&mut self, change: &RateChange) -> bool {
        self.record("rate_change", change)
    }

    fn submit_configuration(&mut self, configuration: &DeviceConfiguration) -> bool {
        self.record("configuration", configuration)
    }
}
