//! Packet Format and Codec
//!
//! On the wire every packet is
//!
//! ```text
//! <START> tag ',' field_1 ',' field_2 ... ',' field_n <END>
//! ```
//!
//! with no length prefix and no checksum. Fields are positional and never
//! contain a comma or a token byte.

use crate::error::ProtocolError;
use crate::token;
use serde::{Deserialize, Serialize};

/// Packet kinds, identified by the leading tag character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketTag {
    /// Sensor reading (`V`)
    Reading,
    /// Sampling rate change (`R`)
    RateChange,
    /// Device settings, identity half (`S`)
    SettingsIdentity,
    /// Device settings, schedule half (`T`)
    SettingsSchedule,
}

impl PacketTag {
    /// Tag character as sent on the wire
    pub fn as_char(&self) -> char {
        match self {
            PacketTag::Reading => 'V',
            PacketTag::RateChange => 'R',
            PacketTag::SettingsIdentity => 'S',
            PacketTag::SettingsSchedule => 'T',
        }
    }

    /// Parse a tag character
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'V' => Some(PacketTag::Reading),
            'R' => Some(PacketTag::RateChange),
            'S' => Some(PacketTag::SettingsIdentity),
            'T' => Some(PacketTag::SettingsSchedule),
            _ => None,
        }
    }

    /// Number of fields following the tag
    pub fn field_count(&self) -> usize {
        match self {
            PacketTag::Reading | PacketTag::RateChange => 4,
            PacketTag::SettingsIdentity => 3,
            PacketTag::SettingsSchedule => 6,
        }
    }
}

/// A decoded packet: tag plus its positional string fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    tag: PacketTag,
    fields: Vec<String>,
}

impl Packet {
    /// Build a packet, checking the field count for the tag
    pub fn new(tag: PacketTag, fields: Vec<String>) -> Result<Self, ProtocolError> {
        if fields.len() != tag.field_count() {
            return Err(ProtocolError::FieldCount {
                tag: tag.as_char(),
                expected: tag.field_count(),
                actual: fields.len(),
            });
        }
        Ok(Self { tag, fields })
    }

    pub(crate) fn from_parts(tag: PacketTag, fields: Vec<String>) -> Self {
        Self { tag, fields }
    }

    /// Decode a payload extracted from between the start and end tokens.
    ///
    /// A single trailing `;` left by legacy senders is ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let payload = payload
            .strip_suffix(&[token::LEGACY_TERMINATOR])
            .unwrap_or(payload);
        if payload.is_empty() {
            return Err(ProtocolError::EmptyPayload);
        }
        let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;

        let mut parts = text.split(token::FIELD_SEPARATOR as char);
        let raw_tag = parts.next().unwrap_or_default();
        let mut chars = raw_tag.chars();
        let tag = match (chars.next(), chars.next()) {
            (Some(c), None) => PacketTag::from_char(c),
            _ => None,
        }
        .ok_or_else(|| ProtocolError::UnknownTag(raw_tag.to_string()))?;

        Self::new(tag, parts.map(str::to_string).collect())
    }

    /// Encode the payload (without tokens)
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.fields.iter().map(|f| f.len() + 1).sum::<usize>());
        out.push(self.tag.as_char() as u8);
        for field in &self.fields {
            out.push(token::FIELD_SEPARATOR);
            out.extend_from_slice(field.as_bytes());
        }
        out
    }

    /// Packet tag
    pub fn tag(&self) -> PacketTag {
        self.tag
    }

    /// All fields in order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Field at a position
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// Wrap a payload with one start token and one end token
pub fn frame_payload(payload: &[u8], start: u8, end: u8) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 2);
    framed.push(start);
    framed.extend_from_slice(payload);
    framed.push(end);
    framed
}
