//! Hardware address type used in stream definitions and interface tables.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 48 bit MAC address.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MacParseError {
    #[error("invalid string representation of mac address: {0}")]
    Invalid(String),
}

impl MacAddr {
    /// Builds an address from the low 48 bits of `value`.
    pub fn from_u64(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        MacAddr([bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]])
    }

    pub fn to_u64(self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, octet| (acc << 8) | u64::from(*octet))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(value: [u8; 6]) -> Self {
        MacAddr(value)
    }
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || MacParseError::Invalid(value.to_string());
        let mut octets = [0u8; 6];
        let mut parts = value.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddr(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_colon_notation() {
        let mac: MacAddr = "00:e0:ED:0b:dc:2a".parse().unwrap();
        assert_eq!(mac, MacAddr([0x00, 0xe0, 0xed, 0x0b, 0xdc, 0x2a]));
        assert_eq!(mac.to_string(), "00:e0:ed:0b:dc:2a");
    }

    #[test]
    fn integer_conversion_uses_low_48_bits() {
        let mac = MacAddr::from_u64(0x00e0ed11c7f7);
        assert_eq!(mac.to_string(), "00:e0:ed:11:c7:f7");
        assert_eq!(mac.to_u64(), 0x00e0ed11c7f7);
        assert_eq!(MacAddr::from_u64(0xffff_0000_0000_0001).to_u64(), 1);
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "00:e0:ed:0b:dc", "00:e0:ed:0b:dc:2a:11", "00:e0:ed:0b:dc:zz", "0:e0:ed:0b:dc:2a"] {
            assert_eq!(
                bad.parse::<MacAddr>(),
                Err(MacParseError::Invalid(bad.to_string())),
                "{bad}"
            );
        }
    }
}
