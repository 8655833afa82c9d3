//! Collaborator Interfaces
//!
//! The transport does not know how a node learns its identity or how events
//! leave the mesh. Both are supplied by the application.

use radio_protocol::{DeviceConfiguration, RateChange, SensorReading};

/// Identity of the local node
pub trait NodeIdentity {
    /// Whether this node coordinates the mesh and owns the uplink
    fn is_coordinator(&self) -> bool;

    fn device_id(&self) -> String;

    fn network_id(&self) -> String;

    /// Server that the coordinator forwards events to
    fn remote_server_address(&self) -> String;
}

/// Destination for events leaving the mesh.
///
/// Each call reports success as a boolean; the transport logs failures and
/// carries on without retrying.
pub trait Uplink {
    fn submit_reading(&mut self, reading: &SensorReading) -> bool;

    fn submit_rate_change(&mut self, change: &RateChange) -> bool;

    fn submit_configuration(&mut self, configuration: &DeviceConfiguration) -> bool;
}
