// Output channel remapping

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::recording::midi::{Payload, SYSTEM_STATUS};

/// Channel that outgoing messages are forced onto.
///
/// Persisted as `"default"` or the zero-based channel index (`"0"`..`"15"`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputChannel {
    /// Pass messages through on their original channel
    #[default]
    Default,
    /// Zero-based channel index, 0..=15
    Channel(u8),
}

impl OutputChannel {
    pub fn channel(index: u8) -> Option<Self> {
        (index < 16).then_some(OutputChannel::Channel(index))
    }
}

impl fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputChannel::Default => write!(f, "default"),
            OutputChannel::Channel(index) => write!(f, "{}", index),
        }
    }
}

impl FromStr for OutputChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("default") {
            return Ok(OutputChannel::Default);
        }
        s.parse::<u8>()
            .ok()
            .and_then(OutputChannel::channel)
            .ok_or_else(|| format!("Invalid output channel '{}': expected \"default\" or 0-15", s))
    }
}

impl TryFrom<String> for OutputChannel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputChannel> for String {
    fn from(channel: OutputChannel) -> Self {
        channel.to_string()
    }
}

/// Replace the channel nibble of a channel message. System messages carry no
/// channel and are returned untouched, as is everything when the target is
/// `Default`.
pub fn remap(payload: Payload, channel: OutputChannel) -> Payload {
    match channel {
        OutputChannel::Default => payload,
        _ if payload.status() >= SYSTEM_STATUS => payload,
        OutputChannel::Channel(index) => {
            payload.with_status((payload.status() & 0xF0) | (index & 0x0F))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bytes: &[u8]) -> Payload {
        Payload::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_remap_replaces_channel_nibble_only() {
        let out = remap(payload(&[0x91, 60, 100]), OutputChannel::Channel(4));
        assert_eq!(out.as_bytes(), &[0x94, 60, 100]);

        let out = remap(payload(&[0xE3, 0, 64]), OutputChannel::Channel(15));
        assert_eq!(out.as_bytes(), &[0xEF, 0, 64]);
    }

    #[test]
    fn test_default_is_identity() {
        let original = payload(&[0x91, 60, 100]);
        assert_eq!(remap(original, OutputChannel::Default), original);
    }

    #[test]
    fn test_system_messages_are_never_remapped() {
        let clock = payload(&[0xF8]);
        for index in 0..16 {
            assert_eq!(remap(clock, OutputChannel::Channel(index)), clock);
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("default".parse::<OutputChannel>().unwrap(), OutputChannel::Default);
        assert_eq!("4".parse::<OutputChannel>().unwrap(), OutputChannel::Channel(4));
        assert!("16".parse::<OutputChannel>().is_err());
        assert!("bass".parse::<OutputChannel>().is_err());
        assert_eq!(OutputChannel::Channel(9).to_string(), "9");
        assert_eq!(OutputChannel::Default.to_string(), "default");
    }
}
