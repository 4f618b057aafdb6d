// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type.

use crate::errors::ModelError;
use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]`. Chain identifiers are bit-packed into
/// destination `Mac`s, so conversions to and from the low 48 bits of a `u64` are provided.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

impl Mac {
    /// The broadcast `Mac`
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac`.
    pub const ZERO: Mac = Mac([0; 6]);
    /// Mask selecting the 48 bits of a `Mac` held in a `u64`.
    pub const BITS_MASK: u64 = (1 << 48) - 1;

    /// Build a `Mac` from the 48 low-order bits of `value`. Higher bits are ignored.
    #[must_use]
    pub const fn from_u64(value: u64) -> Mac {
        let b = (value & Self::BITS_MASK).to_be_bytes();
        Mac([b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    /// The `Mac` as the 48 low-order bits of a `u64`.
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        let m = self.0;
        u64::from_be_bytes([0, 0, m[0], m[1], m[2], m[3], m[4], m[5]])
    }

    /// Returns true iff the least significant bit of the first octet is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the second least significant bit of the first octet is one.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }
}

impl FromStr for Mac {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        const MAX_OCTETS: usize = 6;
        let invalid = || ModelError::InvalidMac(value.to_string());
        let octets = value
            .split(':')
            .try_fold(ArrayVec::<u8, MAX_OCTETS>::new(), |mut acc, octet| {
                if octet.len() != 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid());
                }
                let parsed = u8::from_str_radix(octet, 16).map_err(|_| invalid())?;
                acc.try_push(parsed).map_err(|_| invalid())?;
                Ok(acc)
            })?;
        let octets: [u8; MAX_OCTETS] = octets.into_inner().map_err(|_| invalid())?;
        Ok(Mac(octets))
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}
