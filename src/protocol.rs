//! Wire format for time broadcasts
//!
//! ## Table of Contents
//! - **ChannelId**: Namespaced logical channel (`namespace:name`)
//! - **TimeUpdate**: Broadcast payload codec
//!
//! A payload is a big-endian `i64` tick count followed by the date string
//! prefixed with its byte length as a big-endian `u16`.

use crate::error::{Result, TimeSyncError};
use crate::types::TimeSnapshot;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Channel downstream servers listen on unless configured otherwise
pub const DEFAULT_CHANNEL: &str = "timesync:time";

/// Logical channel identifier, e.g. `timesync:time`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId {
    namespace: String,
    name: String,
}

impl ChannelId {
    /// Build from parts, validating both
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();

        if namespace.is_empty() || !namespace.chars().all(valid_namespace_char) {
            return Err(TimeSyncError::config(format!(
                "Invalid channel namespace: {:?}",
                namespace
            )));
        }
        if name.is_empty() || !name.chars().all(|c| valid_namespace_char(c) || c == '/') {
            return Err(TimeSyncError::config(format!("Invalid channel name: {:?}", name)));
        }

        Ok(Self { namespace, name })
    }

    /// Namespace part
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name part
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn valid_namespace_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.')
}

impl Default for ChannelId {
    fn default() -> Self {
        Self {
            namespace: "timesync".to_string(),
            name: "time".to_string(),
        }
    }
}

impl FromStr for ChannelId {
    type Err = TimeSyncError;

    fn from_str(s: &str) -> Result<Self> {
        let (namespace, name) = s
            .split_once(':')
            .ok_or_else(|| TimeSyncError::config(format!("Channel id missing ':': {:?}", s)))?;
        Self::new(namespace, name)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = TimeSyncError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// One time broadcast as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeUpdate {
    /// Sub-day tick count
    pub ticks: i64,
    /// Formatted calendar date
    pub date: String,
}

impl TimeUpdate {
    /// Encode into the fixed layout
    pub fn encode(&self) -> Result<Bytes> {
        let date = self.date.as_bytes();
        let len = u16::try_from(date.len()).map_err(|_| {
            TimeSyncError::protocol(format!("Date string too long: {} bytes", date.len()))
        })?;

        let mut buf = BytesMut::with_capacity(8 + 2 + date.len());
        buf.put_i64(self.ticks);
        buf.put_u16(len);
        buf.put_slice(date);
        Ok(buf.freeze())
    }

    /// Decode a complete payload
    pub fn decode(mut payload: &[u8]) -> Result<Self> {
        if payload.remaining() < 10 {
            return Err(TimeSyncError::protocol(format!(
                "Payload too short: {} bytes",
                payload.len()
            )));
        }

        let ticks = payload.get_i64();
        let len = payload.get_u16() as usize;
        if payload.remaining() != len {
            return Err(TimeSyncError::protocol(format!(
                "Date length mismatch: header says {}, {} bytes left",
                len,
                payload.remaining()
            )));
        }

        let date = std::str::from_utf8(payload)
            .map_err(|e| TimeSyncError::protocol(format!("Date is not UTF-8: {}", e)))?
            .to_string();

        Ok(Self { ticks, date })
    }
}

impl From<&TimeSnapshot> for TimeUpdate {
    fn from(snapshot: &TimeSnapshot) -> Self {
        Self {
            ticks: snapshot.ticks,
            date: snapshot.date.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClockState;

    #[test]
    fn test_channel_parse() {
        let id: ChannelId = DEFAULT_CHANNEL.parse().unwrap();
        assert_eq!(id, ChannelId::default());
        assert_eq!(id.namespace(), "timesync");
        assert_eq!(id.name(), "time");
        assert_eq!(id.to_string(), "timesync:time");

        let nested: ChannelId = "arknesia:sync/time".parse().unwrap();
        assert_eq!(nested.name(), "sync/time");
    }

    #[test]
    fn test_channel_rejects_bad_ids() {
        for bad in ["timesync", ":time", "timesync:", "TimeSync:time", "time sync:time", "a/b:c"] {
            assert!(bad.parse::<ChannelId>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_encode_layout() {
        let update = TimeUpdate {
            ticks: 18_020,
            date: "Day 2, Month 1, Year 1".to_string(),
        };
        let bytes = update.encode().unwrap();

        assert_eq!(&bytes[..8], &18_020i64.to_be_bytes());
        assert_eq!(&bytes[8..10], &22u16.to_be_bytes());
        assert_eq!(&bytes[10..], b"Day 2, Month 1, Year 1");
        assert_eq!(TimeUpdate::decode(&bytes).unwrap(), update);
    }

    #[test]
    fn test_from_snapshot() {
        let snap = ClockState::default().snapshot();
        let update = TimeUpdate::from(&snap);
        assert_eq!(update.ticks, 0);
        assert_eq!(update.date, "Day 1, Month 1, Year 1");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(TimeUpdate::decode(&[0u8; 9]).is_err());

        let mut truncated = BytesMut::new();
        truncated.put_i64(0);
        truncated.put_u16(5);
        truncated.put_slice(b"Day");
        assert!(TimeUpdate::decode(&truncated).is_err());

        let mut invalid = BytesMut::new();
        invalid.put_i64(0);
        invalid.put_u16(2);
        invalid.put_slice(&[0xff, 0xfe]);
        assert!(TimeUpdate::decode(&invalid).is_err());
    }

    #[test]
    fn test_encode_rejects_oversized_date() {
        let update = TimeUpdate {
            ticks: 0,
            date: "x".repeat(70_000),
        };
        assert!(update.encode().is_err());
    }
}
