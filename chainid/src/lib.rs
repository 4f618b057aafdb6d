// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

//! Chain identifiers and their packet-level encoding.
//!
//! A chain identifier is a small integer drawn from a bounded pool by the [`ChainIdAllocator`].
//! It is bit-packed, together with a direction flag and a port, into a 48-bit [`VirtualAddress`]
//! that forwarders use as destination mac. The low-order field of the address carries the index
//! of the hop, so that the address of each hop is obtained by plain addition, and every field can
//! be recovered from the header bits alone with [`AddressLayout::decode`].

mod address;
mod allocator;
mod errors;

pub use address::{
    ADDRESS_BITS, AddressLayout, ChainFlags, FLAG_BITS, HopIndex, PREFIX_BITS, VirtualAddress,
};
pub use allocator::{Allocation, ChainId, ChainIdAllocator, ChainIdEvent};
pub use errors::ChainIdError;

use tracectl::{LevelFilter, trace_target};
trace_target!("chainid", LevelFilter::INFO, &["renderer"]);
