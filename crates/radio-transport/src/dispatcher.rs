//! Packet Dispatcher
//!
//! Turns framed payloads into transport events. Readings and rate changes
//! map one packet to one event. A device configuration arrives as an `S`
//! packet and a `T` packet that are held in two slots until both are present.
//!
//! The slots are filled by arrival order only and are not keyed by device,
//! so interleaved configuration traffic from two nodes can pair one node's
//! identity with another node's schedule.

use radio_protocol::{
    DeviceConfiguration, RadioMessage, RateChange, SensorReading, SettingsIdentity,
    SettingsSchedule,
};
use serde::Serialize;
use tracing::debug;

/// Event produced by a dispatched packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransportEvent {
    Reading(SensorReading),
    RateChange(RateChange),
    Configuration(DeviceConfiguration),
}

/// The two halves of a device configuration awaiting their partner
#[derive(Debug, Default)]
pub struct PairingState {
    identity: Option<SettingsIdentity>,
    schedule: Option<SettingsSchedule>,
}

impl PairingState {
    /// Store an `S` half, replacing any earlier one
    pub fn store_identity(&mut self, identity: SettingsIdentity) -> Option<DeviceConfiguration> {
        if self.identity.replace(identity).is_some() {
            debug!("Replaced unpaired settings identity");
        }
        self.try_pair()
    }

    /// Store a `T` half, replacing any earlier one
    pub fn store_schedule(&mut self, schedule: SettingsSchedule) -> Option<DeviceConfiguration> {
        if self.schedule.replace(schedule).is_some() {
            debug!("Replaced unpaired settings schedule");
        }
        self.try_pair()
    }

    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    pub fn has_schedule(&self) -> bool {
        self.schedule.is_some()
    }

    /// Forget any unpaired half
    pub fn clear(&mut self) {
        self.identity = None;
        self.schedule = None;
    }

    fn try_pair(&mut self) -> Option<DeviceConfiguration> {
        if self.identity.is_none() || self.schedule.is_none() {
            return None;
        }
        let identity = self.identity.take()?;
        let schedule = self.schedule.take()?;
        Some(DeviceConfiguration::combine(identity, schedule))
    }
}

/// Routes decoded packets to events
#[derive(Debug, Default)]
pub struct PacketDispatcher {
    pairing: PairingState,
    ignored: u64,
}

impl PacketDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and route one framed payload.
    ///
    /// Foreign or malformed packets are expected on a shared channel and
    /// are ignored.
    pub fn dispatch(&mut self, payload: &[u8]) -> Option<TransportEvent> {
        match RadioMessage::decode(payload) {
            Ok(message) => self.route(message),
            Err(e) => {
                debug!("Ignoring radio packet: {}", e);
                self.ignored += 1;
                None
            }
        }
    }

    /// Route an already decoded message
    pub fn route(&mut self, message: RadioMessage) -> Option<TransportEvent> {
        match message {
            RadioMessage::Reading(reading) => Some(TransportEvent::Reading(reading)),
            RadioMessage::RateChange(change) => Some(TransportEvent::RateChange(change)),
            RadioMessage::SettingsIdentity(identity) => self
                .pairing
                .store_identity(identity)
                .map(TransportEvent::Configuration),
            RadioMessage::SettingsSchedule(schedule) => self
                .pairing
                .store_schedule(schedule)
                .map(TransportEvent::Configuration),
        }
    }

    /// Pending configuration halves
    pub fn pairing(&self) -> &PairingState {
        &self.pairing
    }

    /// Packets dropped as foreign or malformed
    pub fn ignored(&self) -> u64 {
        self.ignored
    }
}
