//! Service-data payload template and the counter-driven mutator

use std::fmt;

use crate::error::ErrorKind;
use crate::{Error, Result};

/// The reference service-data payload broadcast under the beacon service UUID.
pub const REFERENCE_TEMPLATE: [u8; 24] = [
    0x01, 0x58, 0x38, 0x37, 0x30, 0x30, 0x32, 0x46, //
    0x50, 0x34, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, //
    0xCE, 0x1B, 0x33, 0x00, 0x00, 0x02, 0x00, 0x00,
];

/// Byte positions overwritten by [`mutate`], in write order.
pub const MUTATED_OFFSETS: [usize; 4] = [10, 11, 20, 21];

/// Smallest template [`mutate`] can patch.
pub const MIN_TEMPLATE_LEN: usize = 22;

/// An immutable base payload of at least [`MIN_TEMPLATE_LEN`] bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BaseTemplate(Box<[u8]>);

impl BaseTemplate {
    /// Validates `bytes` as a template.
    ///
    /// Fails with [`ErrorKind::Configuration`][crate::error::ErrorKind::Configuration] if the template is too short
    /// for the mutated offsets.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_TEMPLATE_LEN {
            return Err(Error::configuration(format!(
                "base template is {} bytes, at least {MIN_TEMPLATE_LEN} required",
                bytes.len()
            )));
        }
        Ok(BaseTemplate(bytes.into_boxed_slice()))
    }

    /// The unmodified template bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// A fresh, unmutated copy of the template
    pub fn to_payload(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    #[allow(clippy::len_without_is_empty)]
    /// Template length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Default for BaseTemplate {
    fn default() -> Self {
        BaseTemplate(Box::new(REFERENCE_TEMPLATE))
    }
}

impl fmt::Debug for BaseTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BaseTemplate({})", Hex(&self.0))
    }
}

/// A 16-bit fuzz counter that wraps on increment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FuzzCounter(pub u16);

impl FuzzCounter {
    /// The counter value after one tick
    #[must_use]
    pub fn next(self) -> Self {
        FuzzCounter(self.0.wrapping_add(1))
    }
}

impl fmt::Display for FuzzCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Derives the broadcast payload for `counter` from `base`.
///
/// Bytes 10 and 11 receive the counter big-endian. Bytes 20 and 21 receive `counter >> 4` and `counter << 4`,
/// truncated to a byte. Every other byte is copied from `base`.
pub fn mutate(base: &BaseTemplate, counter: FuzzCounter) -> Vec<u8> {
    let n = counter.0;
    let mut payload = base.to_payload();
    payload[10] = (n >> 8) as u8;
    payload[11] = n as u8;
    payload[20] = (n >> 4) as u8;
    payload[21] = (n << 4) as u8;
    payload
}

/// Uppercase hex rendering of a byte slice, without separators.
#[derive(Clone, Copy)]
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// Parses a hex string into bytes. Whitespace between octets is ignored.
pub fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let digits: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    hex::decode(&digits).map_err(|err| {
        Error::new(
            ErrorKind::Configuration,
            Some(Box::new(err)),
            format!("invalid hex in {s:?}"),
        )
    })
}
