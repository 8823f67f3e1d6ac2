// MIDI event type and message classification

use serde::{Deserialize, Serialize};

/// Status bytes at or above this value are system messages (no channel nibble)
pub const SYSTEM_STATUS: u8 = 0xF0;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;

/// Classification of a message, decoded once from its status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    /// Includes note-on with velocity 0
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Any other channel voice message (program change, pitch bend, ...)
    Channel { kind: u8, channel: u8 },
    System,
}

impl MessageKind {
    /// Decode a raw payload. Returns None for an empty payload.
    pub fn classify(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;
        if status >= SYSTEM_STATUS {
            return Some(MessageKind::System);
        }

        let kind = status & 0xF0;
        let channel = status & 0x0F;
        let d1 = data.get(1).copied();
        let d2 = data.get(2).copied();

        let decoded = match (kind, d1, d2) {
            (NOTE_ON, Some(key), Some(velocity)) if velocity > 0 => {
                MessageKind::NoteOn { channel, key, velocity }
            }
            (NOTE_ON, Some(key), Some(0)) => MessageKind::NoteOff { channel, key, velocity: 0 },
            (NOTE_OFF, key, velocity) => MessageKind::NoteOff {
                channel,
                key: key.unwrap_or(0),
                velocity: velocity.unwrap_or(0),
            },
            (CONTROL_CHANGE, Some(controller), Some(value)) => {
                MessageKind::ControlChange { channel, controller, value }
            }
            _ => MessageKind::Channel { kind, channel },
        };
        Some(decoded)
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, MessageKind::NoteOn { .. })
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self, MessageKind::NoteOff { .. })
    }

    /// Note-on or note-off: the activity that keeps an auto-recording alive
    pub fn is_note(&self) -> bool {
        self.is_note_on() || self.is_note_off()
    }

    pub fn is_system(&self) -> bool {
        matches!(self, MessageKind::System)
    }

    /// Channel nibble, or None for system messages
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MessageKind::NoteOn { channel, .. }
            | MessageKind::NoteOff { channel, .. }
            | MessageKind::ControlChange { channel, .. }
            | MessageKind::Channel { channel, .. } => Some(channel),
            MessageKind::System => None,
        }
    }
}

/// A 1-3 byte MIDI message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    bytes: [u8; 3],
    len: u8,
}

impl Payload {
    /// Build from raw bytes. Returns None if empty; bytes past the third are dropped.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        let len = data.len().min(3);
        let mut bytes = [0u8; 3];
        bytes[..len].copy_from_slice(&data[..len]);
        Some(Self { bytes, len: len as u8 })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    /// Copy with the status byte replaced
    pub fn with_status(mut self, status: u8) -> Self {
        self.bytes[0] = status;
        self
    }
}

/// MIDI event with timestamp
///
/// Serialized as `{ "data": [..], "timestamp": ms }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMidiEvent", into = "RawMidiEvent")]
pub struct TimestampedMidiEvent {
    payload: Payload,
    kind: MessageKind,
    /// Milliseconds in the monotonic clock domain
    pub timestamp_ms: f64,
}

impl TimestampedMidiEvent {
    pub fn new(data: &[u8], timestamp_ms: f64) -> Option<Self> {
        let payload = Payload::from_slice(data)?;
        let kind = MessageKind::classify(payload.as_bytes())?;
        Some(Self { payload, kind, timestamp_ms })
    }

    pub fn data(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    pub fn payload(&self) -> Payload {
        self.payload
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn is_note_on(&self) -> bool {
        self.kind.is_note_on()
    }

    pub fn is_system(&self) -> bool {
        self.kind.is_system()
    }
}

#[derive(Serialize, Deserialize)]
struct RawMidiEvent {
    data: Vec<u8>,
    timestamp: f64,
}

impl TryFrom<RawMidiEvent> for TimestampedMidiEvent {
    type Error = String;

    fn try_from(raw: RawMidiEvent) -> Result<Self, Self::Error> {
        TimestampedMidiEvent::new(&raw.data, raw.timestamp)
            .ok_or_else(|| "MIDI event has an empty payload".to_string())
    }
}

impl From<TimestampedMidiEvent> for RawMidiEvent {
    fn from(event: TimestampedMidiEvent) -> Self {
        Self {
            data: event.data().to_vec(),
            timestamp: event.timestamp_ms,
        }
    }
}
