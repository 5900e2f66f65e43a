//! Bluetooth hardware addresses and vendor prefixes

use std::fmt;
use std::str::FromStr;

use crate::error::ErrorKind;
use crate::{Error, Result};

/// A 48-bit Bluetooth device address.
///
/// Displays in canonical form: six uppercase hex octets separated by colons, e.g. `00:25:DF:11:22:33`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address(pub [u8; 6]);

impl Address {
    /// Returns `true` if the first three octets of this address equal `prefix`
    pub fn has_prefix(&self, prefix: &AddressPrefix) -> bool {
        self.0[..3] == prefix.0
    }

    /// The vendor prefix (OUI) of this address
    pub fn prefix(&self) -> AddressPrefix {
        AddressPrefix([self.0[0], self.0[1], self.0[2]])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parses `AA:BB:CC:DD:EE:FF` or `aa-bb-cc-dd-ee-ff`.
    fn from_str(s: &str) -> Result<Self> {
        parse_octets(s).map(Address)
    }
}

/// A 3-octet vendor address prefix (organizationally unique identifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressPrefix(pub [u8; 3]);

impl fmt::Display for AddressPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}")
    }
}

impl FromStr for AddressPrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_octets(s).map(AddressPrefix)
    }
}

fn parse_octets<const N: usize>(s: &str) -> Result<[u8; N]> {
    let invalid = || {
        Error::new(
            ErrorKind::Other,
            None,
            format!("invalid address {s:?}: expected {N} hex octets"),
        )
    };

    let mut octets = [0u8; N];
    let mut parts = s.trim().split([':', '-']);
    for octet in octets.iter_mut() {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }

    match parts.next() {
        Some(_) => Err(invalid()),
        None => Ok(octets),
    }
}
