//! Typed Radio Messages
//!
//! Each packet tag maps to one message type. Device configuration does not
//! fit in a single radio frame, so it travels as an `S` (identity) packet
//! and a `T` (schedule) packet that the receiver pairs back together.

use crate::error::ProtocolError;
use crate::packet::{Packet, PacketTag};
use serde::{Deserialize, Serialize};

/// A named sensor reading from a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    pub device_id: String,
    pub sensor_type: String,
    /// Reading exactly as the sensor node wrote it; always numeric
    pub value: String,
    pub timestamp: String,
}

impl SensorReading {
    /// Reading value as a number
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.trim().parse().ok()
    }
}

/// A change in a sensor's sampling rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateChange {
    pub device_id: String,
    pub sensor_type: String,
    /// New sampling period
    pub new_rate: u32,
    pub timestamp: String,
}

/// First half of a device configuration (`S` packet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsIdentity {
    pub device_id: String,
    pub location: String,
    pub project: String,
}

/// Second half of a device configuration (`T` packet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSchedule {
    pub coordinator: bool,
    /// Upload rate
    pub rate: u32,
    pub setup_date: String,
    pub teardown_date: String,
    pub timestamp: String,
    pub network_id: String,
}

/// Complete device configuration, produced by pairing `S` and `T`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub device_id: String,
    pub location: String,
    pub project: String,
    pub coordinator: bool,
    pub rate: u32,
    pub setup_date: String,
    pub teardown_date: String,
    pub timestamp: String,
    pub network_id: String,
}

impl DeviceConfiguration {
    /// Join the two halves received over the radio
    pub fn combine(identity: SettingsIdentity, schedule: SettingsSchedule) -> Self {
        Self {
            device_id: identity.device_id,
            location: identity.location,
            project: identity.project,
            coordinator: schedule.coordinator,
            rate: schedule.rate,
            setup_date: schedule.setup_date,
            teardown_date: schedule.teardown_date,
            timestamp: schedule.timestamp,
            network_id: schedule.network_id,
        }
    }

    /// Split into the halves sent as `S` and `T` packets
    pub fn split(&self) -> (SettingsIdentity, SettingsSchedule) {
        (
            SettingsIdentity {
                device_id: self.device_id.clone(),
                location: self.location.clone(),
                project: self.project.clone(),
            },
            SettingsSchedule {
                coordinator: self.coordinator,
                rate: self.rate,
                setup_date: self.setup_date.clone(),
                teardown_date: self.teardown_date.clone(),
                timestamp: self.timestamp.clone(),
                network_id: self.network_id.clone(),
            },
        )
    }
}

/// Any message that can arrive in a single packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioMessage {
    Reading(SensorReading),
    RateChange(RateChange),
    SettingsIdentity(SettingsIdentity),
    SettingsSchedule(SettingsSchedule),
}

impl RadioMessage {
    /// Decode a payload straight into a typed message
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        Self::try_from(&Packet::decode(payload)?)
    }

    /// Encode as a packet
    pub fn to_packet(&self) -> Packet {
        match self {
            RadioMessage::Reading(m) => m.to_packet(),
            RadioMessage::RateChange(m) => m.to_packet(),
            RadioMessage::SettingsIdentity(m) => m.to_packet(),
            RadioMessage::SettingsSchedule(m) => m.to_packet(),
        }
    }
}

impl TryFrom<&Packet> for RadioMessage {
    type Error = ProtocolError;

    fn try_from(packet: &Packet) -> Result<Self, Self::Error> {
        Ok(match packet.tag() {
            PacketTag::Reading => RadioMessage::Reading(SensorReading::try_from(packet)?),
            PacketTag::RateChange => RadioMessage::RateChange(RateChange::try_from(packet)?),
            PacketTag::SettingsIdentity => {
                RadioMessage::SettingsIdentity(SettingsIdentity::try_from(packet)?)
            }
            PacketTag::SettingsSchedule => {
                RadioMessage::SettingsSchedule(SettingsSchedule::try_from(packet)?)
            }
        })
    }
}

fn expect_tag(packet: &Packet, tag: PacketTag) -> Result<(), ProtocolError> {
    if packet.tag() != tag {
        return Err(ProtocolError::UnknownTag(packet.tag().as_char().to_string()));
    }
    Ok(())
}

fn text(packet: &Packet, index: usize) -> String {
    packet.field(index).unwrap_or_default().to_string()
}

fn number<T: std::str::FromStr>(packet: &Packet, index: usize, field: &'static str) -> Result<T, ProtocolError> {
    let raw = packet.field(index).unwrap_or_default();
    raw.trim().parse().map_err(|_| ProtocolError::InvalidValue {
        field,
        value: raw.to_string(),
    })
}

fn flag(packet: &Packet, index: usize, field: &'static str) -> Result<bool, ProtocolError> {
    match packet.field(index).map(str::trim) {
        Some("1") => Ok(true),
        Some("0") => Ok(false),
        other => Err(ProtocolError::InvalidValue {
            field,
            value: other.unwrap_or_default().to_string(),
        }),
    }
}

fn build(tag: PacketTag, fields: Vec<String>) -> Packet {
    debug_assert_eq!(fields.len(), tag.field_count());
    Packet::from_parts(tag, fields)
}

impl SensorReading {
    /// Encode as a `V` packet
    pub fn to_packet(&self) -> Packet {
        build(
            PacketTag::Reading,
            vec![
                self.device_id.clone(),
                self.sensor_type.clone(),
                self.value.clone(),
                self.timestamp.clone(),
            ],
        )
    }
}

impl TryFrom<&Packet> for SensorReading {
    type Error = ProtocolError;

    fn try_from(packet: &Packet) -> Result<Self, Self::Error> {
        expect_tag(packet, PacketTag::Reading)?;
        number::<f64>(packet, 2, "value")?;
        Ok(Self {
            device_id: text(packet, 0),
            sensor_type: text(packet, 1),
            value: text(packet, 2),
            timestamp: text(packet, 3),
        })
    }
}

impl RateChange {
    /// Encode as an `R` packet
    pub fn to_packet(&self) -> Packet {
        build(
            PacketTag::RateChange,
            vec![
                self.device_id.clone(),
                self.sensor_type.clone(),
                self.new_rate.to_string(),
                self.timestamp.clone(),
            ],
        )
    }
}

impl TryFrom<&Packet> for RateChange {
    type Error = ProtocolError;

    fn try_from(packet: &Packet) -> Result<Self, Self::Error> {
        expect_tag(packet, PacketTag::RateChange)?;
        Ok(Self {
            device_id: text(packet, 0),
            sensor_type: text(packet, 1),
            new_rate: number(packet, 2, "rate")?,
            timestamp: text(packet, 3),
        })
    }
}

impl SettingsIdentity {
    /// Encode as an `S` packet
    pub fn to_packet(&self) -> Packet {
        build(
            PacketTag::SettingsIdentity,
            vec![self.device_id.clone(), self.location.clone(), self.project.clone()],
        )
    }
}

impl TryFrom<&Packet> for SettingsIdentity {
    type Error = ProtocolError;

    fn try_from(packet: &Packet) -> Result<Self, Self::Error> {
        expect_tag(packet, PacketTag::SettingsIdentity)?;
        Ok(Self {
            device_id: text(packet, 0),
            location: text(packet, 1),
            project: text(packet, 2),
        })
    }
}

impl SettingsSchedule {
    /// Encode as a `T` packet
    pub fn to_packet(&self) -> Packet {
        build(
            PacketTag::SettingsSchedule,
            vec![
                if self.coordinator { "1" } else { "0" }.to_string(),
                self.rate.to_string(),
                self.setup_date.clone(),
                self.teardown_date.clone(),
                self.timestamp.clone(),
                self.network_id.clone(),
            ],
        )
    }
}

impl TryFrom<&Packet> for SettingsSchedule {
    type Error = ProtocolError;

    fn try_from(packet: &Packet) -> Result<Self, Self::Error> {
        expect_tag(packet, PacketTag::SettingsSchedule)?;
        Ok(Self {
            coordinator: flag(packet, 0, "coordinator")?,
            rate: number(packet, 1, "rate")?,
            setup_date: text(packet, 2),
            teardown_date: text(packet, 3),
            timestamp: text(packet, 4),
            network_id: text(packet, 5),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_configuration() -> DeviceConfiguration {
        DeviceConfiguration {
            device_id: "pod-12".into(),
            location: "Level 3 East".into(),
            project: "Tower".into(),
            coordinator: false,
            rate: 60,
            setup_date: "2024-04-01".into(),
            teardown_date: "2024-06-01".into(),
            timestamp: "2024-04-01 09:00:00".into(),
            network_id: "ABCD".into(),
        }
    }

    #[test]
    fn test_reading_from_packet() {
        let message = RadioMessage::decode(b"V,pod-7,CO2,412.5,2024-05-01 10:00:00").unwrap();
        match message {
            RadioMessage::Reading(reading) => {
                assert_eq!(reading.device_id, "pod-7");
                assert_eq!(reading.sensor_type, "CO2");
                assert_eq!(reading.numeric_value(), Some(412.5));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_reading_text_is_relayed_unchanged() {
        for raw in ["21.50", "1e3", "-0", "007"] {
            let payload = format!("V,pod-7,AirTemp,{raw},2024-05-01 10:00:00");
            let message = RadioMessage::decode(payload.as_bytes()).unwrap();
            assert_eq!(message.to_packet().encode(), payload.as_bytes());
        }
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let err = RadioMessage::decode(b"V,pod-7,CO2,high,2024").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidValue {
                field: "value",
                value: "high".into()
            }
        );
        assert!(RadioMessage::decode(b"T,yes,60,a,b,c,d").is_err());
    }

    #[test]
    fn test_configuration_split_and_combine() {
        let config = sample_configuration();
        let (identity, schedule) = config.split();

        assert_eq!(identity.to_packet().encode(), b"S,pod-12,Level 3 East,Tower");
        assert_eq!(
            schedule.to_packet().encode(),
            b"T,0,60,2024-04-01,2024-06-01,2024-04-01 09:00:00,ABCD"
        );
        assert_eq!(DeviceConfiguration::combine(identity, schedule), config);
    }

    #[test]
    fn test_rate_change_round_trip() {
        let change = RateChange {
            device_id: "pod-3".into(),
            sensor_type: "Sound".into(),
            new_rate: 15,
            timestamp: "2024-05-01 10:00:00".into(),
        };
        let decoded = RadioMessage::decode(&change.to_packet().encode()).unwrap();
        assert_eq!(decoded, RadioMessage::RateChange(change));
    }
}
