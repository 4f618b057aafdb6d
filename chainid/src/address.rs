// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bit layout of virtual addresses.
//!
//! ```text
//!  47            24 23  22 21                                         0
//! +----------------+------+--------------+----------------+-----------+
//! |     prefix     | flags|     port     |    chain id    |   index   |
//! +----------------+------+--------------+----------------+-----------+
//!       24 bits    2 bits   port_bits       chain_bits     the rest
//! ```

use crate::allocator::ChainId;
use crate::errors::ChainIdError;
use bitflags::bitflags;
use model::Mac;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::fmt::Display;

/// Number of bits of a virtual address
pub const ADDRESS_BITS: u32 = 48;
/// Number of bits of the organizational prefix
pub const PREFIX_BITS: u32 = 24;
/// Number of bits of the direction/reserved flag field
pub const FLAG_BITS: u32 = 2;
const SUFFIX_BITS: u32 = ADDRESS_BITS - PREFIX_BITS;
const FLAG_SHIFT: u32 = SUFFIX_BITS - FLAG_BITS;

const_assert!(FLAG_BITS < SUFFIX_BITS);
const_assert!(ADDRESS_BITS <= 64);

bitflags! {
    /// Value of the flag field of a [`VirtualAddress`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ChainFlags: u8 {
        const REVERSE = 0b01;
        const RESERVED = 0b10;
    }
}

impl ChainFlags {
    /// Flags of the forward direction of a path
    pub const FORWARD: ChainFlags = ChainFlags::empty();

    /// Build flags from a raw value, rejecting bits outside the flag field
    pub fn from_raw(bits: u8) -> Result<Self, ChainIdError> {
        Self::from_bits(bits).ok_or_else(|| {
            ChainIdError::InvalidEncoding(format!(
                "flags {bits:#04b} do not fit in {FLAG_BITS} bits"
            ))
        })
    }
    #[must_use]
    pub fn is_reverse(self) -> bool {
        self.contains(ChainFlags::REVERSE)
    }
}

const fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

// extracts a field of at most SUFFIX_BITS bits
#[allow(clippy::cast_possible_truncation)]
const fn field(value: u64, shift: u32, bits: u32) -> u32 {
    ((value >> shift) & mask(bits)) as u32
}

/// Widths of the fields of a [`VirtualAddress`] and the prefix it starts with.
///
/// A layout is only built through [`AddressLayout::new`] (or deserialization, which calls it), so
/// every instance leaves at least one bit for the index field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LayoutParams", into = "LayoutParams")]
pub struct AddressLayout {
    prefix: u32,
    port_bits: u32,
    chain_bits: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutParams {
    prefix: u32,
    port_bits: u32,
    chain_bits: u32,
}

impl TryFrom<LayoutParams> for AddressLayout {
    type Error = ChainIdError;
    fn try_from(p: LayoutParams) -> Result<Self, Self::Error> {
        AddressLayout::new(p.prefix, p.port_bits, p.chain_bits)
    }
}

impl From<AddressLayout> for LayoutParams {
    fn from(layout: AddressLayout) -> Self {
        LayoutParams {
            prefix: layout.prefix,
            port_bits: layout.port_bits,
            chain_bits: layout.chain_bits,
        }
    }
}

impl Default for AddressLayout {
    fn default() -> Self {
        Self {
            prefix: Self::DEFAULT_PREFIX,
            port_bits: Self::DEFAULT_PORT_BITS,
            chain_bits: Self::DEFAULT_CHAIN_BITS,
        }
    }
}

impl AddressLayout {
    /// Locally administered, unicast
    pub const DEFAULT_PREFIX: u32 = 0x02_53_46;
    pub const DEFAULT_PORT_BITS: u32 = 6;
    pub const DEFAULT_CHAIN_BITS: u32 = 10;

    /// Build a layout. Fails if the prefix does not fit in [`PREFIX_BITS`] or is a multicast
    /// prefix, if the chain field is empty, or if port, chain and flag fields leave no bit for
    /// the index field.
    pub fn new(prefix: u32, port_bits: u32, chain_bits: u32) -> Result<Self, ChainIdError> {
        if u64::from(prefix) > mask(PREFIX_BITS) {
            return Err(ChainIdError::InvalidLayout(format!(
                "prefix {prefix:#x} is wider than {PREFIX_BITS} bits"
            )));
        }
        if Mac::from_u64(u64::from(prefix) << SUFFIX_BITS).is_multicast() {
            return Err(ChainIdError::InvalidLayout(format!(
                "prefix {prefix:#08x} is a multicast prefix"
            )));
        }
        if chain_bits == 0 {
            return Err(ChainIdError::InvalidLayout(
                "the chain identifier field needs at least one bit".to_string(),
            ));
        }
        if port_bits.saturating_add(chain_bits).saturating_add(FLAG_BITS) >= SUFFIX_BITS {
            return Err(ChainIdError::InvalidLayout(format!(
                "{port_bits} port bits, {chain_bits} chain bits and {FLAG_BITS} flag bits leave no room for the index"
            )));
        }
        Ok(Self {
            prefix,
            port_bits,
            chain_bits,
        })
    }

    #[must_use]
    pub const fn prefix(&self) -> u32 {
        self.prefix
    }
    #[must_use]
    pub const fn port_bits(&self) -> u32 {
        self.port_bits
    }
    #[must_use]
    pub const fn chain_bits(&self) -> u32 {
        self.chain_bits
    }
    #[must_use]
    pub const fn index_bits(&self) -> u32 {
        SUFFIX_BITS - FLAG_BITS - self.port_bits - self.chain_bits
    }
    /// Number of chain identifiers that can be encoded
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        1 << self.chain_bits
    }
    #[must_use]
    pub const fn max_port(&self) -> u32 {
        field(u64::MAX, 0, self.port_bits)
    }
    /// Index value reserved to mark the end of a chain. Hop indices are strictly lower.
    #[must_use]
    pub const fn end_of_chain_index(&self) -> u32 {
        field(u64::MAX, 0, self.index_bits())
    }

    const fn chain_shift(&self) -> u32 {
        self.index_bits()
    }
    const fn port_shift(&self) -> u32 {
        self.index_bits() + self.chain_bits
    }

    /// Encode the base address of a chain: hop index 0.
    pub fn encode(
        &self,
        flags: ChainFlags,
        port: u32,
        chain_id: ChainId,
    ) -> Result<VirtualAddress, ChainIdError> {
        if u64::from(flags.bits()) > mask(FLAG_BITS) {
            return Err(ChainIdError::InvalidEncoding(format!(
                "flags {:#04b} do not fit in {FLAG_BITS} bits",
                flags.bits()
            )));
        }
        if port > self.max_port() {
            return Err(ChainIdError::InvalidEncoding(format!(
                "port {port} does not fit in {} bits",
                self.port_bits
            )));
        }
        if chain_id.as_u32() >= self.capacity() {
            return Err(ChainIdError::InvalidEncoding(format!(
                "chain id {chain_id} does not fit in {} bits",
                self.chain_bits
            )));
        }
        let base = (u64::from(self.prefix) << SUFFIX_BITS)
            | (u64::from(flags.bits()) << FLAG_SHIFT)
            | (u64::from(port) << self.port_shift())
            | (u64::from(chain_id.as_u32()) << self.chain_shift());
        Ok(VirtualAddress {
            layout: *self,
            flags,
            port,
            chain_id,
            base,
        })
    }

    /// Recover the fields of an address from its bits alone. Fails if the address does not
    /// carry this layout's prefix.
    pub fn decode(&self, mac: Mac) -> Result<(VirtualAddress, HopIndex), ChainIdError> {
        let value = mac.to_u64();
        if field(value, SUFFIX_BITS, PREFIX_BITS) != self.prefix {
            return Err(ChainIdError::InvalidEncoding(format!(
                "{mac} does not start with prefix {:#08x}",
                self.prefix
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        let flags = ChainFlags::from_bits_truncate(field(value, FLAG_SHIFT, FLAG_BITS) as u8);
        let port = field(value, self.port_shift(), self.port_bits);
        let chain_id = ChainId(field(value, self.chain_shift(), self.chain_bits));
        let index = field(value, 0, self.index_bits());
        let address = self.encode(flags, port, chain_id)?;
        let index = if index == self.end_of_chain_index() {
            HopIndex::EndOfChain
        } else {
            HopIndex::Hop(index)
        };
        Ok((address, index))
    }
}

/// Index field of a decoded address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopIndex {
    Hop(u32),
    EndOfChain,
}

/// The encoded identity of one direction of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualAddress {
    layout: AddressLayout,
    flags: ChainFlags,
    port: u32,
    chain_id: ChainId,
    base: u64,
}

impl VirtualAddress {
    #[must_use]
    pub fn flags(&self) -> ChainFlags {
        self.flags
    }
    #[must_use]
    pub fn port(&self) -> u32 {
        self.port
    }
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }
    #[must_use]
    pub fn layout(&self) -> &AddressLayout {
        &self.layout
    }
    /// The address of hop 0
    #[must_use]
    pub fn base(&self) -> Mac {
        Mac::from_u64(self.base)
    }
    /// The address of hop `index`: the base address incremented by `index`.
    pub fn hop_address(&self, index: u32) -> Result<Mac, ChainIdError> {
        if index >= self.layout.end_of_chain_index() {
            return Err(ChainIdError::InvalidEncoding(format!(
                "hop index {index} does not fit in {} bits",
                self.layout.index_bits()
            )));
        }
        Ok(Mac::from_u64(self.base + u64::from(index)))
    }
    /// The address marking traffic that went through every hop of the chain
    #[must_use]
    pub fn end_of_chain(&self) -> Mac {
        Mac::from_u64(self.base | u64::from(self.layout.end_of_chain_index()))
    }
    /// Number of distinct hop addresses
    #[must_use]
    pub fn max_hops(&self) -> u32 {
        self.layout.end_of_chain_index()
    }
    /// The same chain and port with other flags
    pub fn with_flags(&self, flags: ChainFlags) -> Result<VirtualAddress, ChainIdError> {
        self.layout.encode(flags, self.port, self.chain_id)
    }
}

impl Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = if self.flags.is_reverse() {
            "reverse"
        } else {
            "forward"
        };
        write!(
            f,
            "{} (chain {}, port {}, {direction})",
            self.base(),
            self.chain_id,
            self.port
        )
    }
}
