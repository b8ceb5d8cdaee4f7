//! 12-byte document identifiers.
//!
//! Layout (big-endian):
//!
//! ```text
//! | 4 bytes seconds | 5 bytes process | 3 bytes counter |
//! ```
//!
//! The process bytes are drawn once per process; the counter starts at a
//! random value and wraps at 2^24. Identifiers render as 24 lowercase hex
//! characters and parse from 24 hex characters of either case.

use core::{fmt, str::FromStr};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU32, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

const LEN: usize = 12;
const COUNTER_MASK: u32 = 0x00FF_FFFF;

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// Reasons a string is not an [`ObjectId`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseObjectIdError {
    #[error("expected 24 hex characters, got {0}")]
    Length(usize),
    #[error("invalid hex character {0:?}")]
    InvalidHex(char),
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; LEN]);

impl ObjectId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        // Truncation to 32 bits matches the wire layout.
        #[allow(clippy::cast_possible_truncation)]
        let secs = secs as u32;

        let process = PROCESS_UNIQUE.get_or_init(rand::random);
        let count = COUNTER
            .get_or_init(|| AtomicU32::new(rand::random::<u32>() & COUNTER_MASK))
            .fetch_add(1, Ordering::Relaxed)
            & COUNTER_MASK;

        let mut bytes = [0u8; LEN];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(process);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; LEN]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; LEN] {
        self.0
    }

    /// Seconds since the Unix epoch at generation time.
    pub const fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != LEN * 2 {
            return Err(ParseObjectIdError::Length(s.chars().count()));
        }
        let mut bytes = [0u8; LEN];
        let mut chars = s.chars();
        for byte in &mut bytes {
            let hi = nibble(chars.next())?;
            let lo = nibble(chars.next())?;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn nibble(c: Option<char>) -> Result<u8, ParseObjectIdError> {
    let c = c.ok_or(ParseObjectIdError::Length(0))?;
    c.to_digit(16)
        .and_then(|d| u8::try_from(d).ok())
        .ok_or(ParseObjectIdError::InvalidHex(c))
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_as_24_lowercase_hex() {
        let id = ObjectId::new();
        let hex = id.to_string();
        assert_eq!(hex.len(), 24);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hex.parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn parses_either_case() {
        let lower: ObjectId = "5f2b6c1e9d3a4b0012345678".parse().unwrap();
        let upper: ObjectId = "5F2B6C1E9D3A4B0012345678".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.timestamp(), 0x5f2b_6c1e);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert_eq!(
            "not-an-id".parse::<ObjectId>(),
            Err(ParseObjectIdError::Length(9))
        );
        assert_eq!("".parse::<ObjectId>(), Err(ParseObjectIdError::Length(0)));
        assert_eq!(
            "5f2b6c1e9d3a4b001234567g".parse::<ObjectId>(),
            Err(ParseObjectIdError::InvalidHex('g'))
        );
        // 24 bytes but not 24 characters.
        assert!("ééééééééééee".parse::<ObjectId>().is_err());
    }

    #[test]
    fn consecutive_ids_are_unique_and_share_process_bytes() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.bytes()[4..9], b.bytes()[4..9]);
    }

    #[test]
    fn serializes_as_a_string() {
        let id: ObjectId = "000000000000000000000001".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"000000000000000000000001\"");
        assert_eq!(serde_json::from_str::<ObjectId>(&json).unwrap(), id);
        assert!(serde_json::from_str::<ObjectId>("\"xyz\"").is_err());
    }
}
