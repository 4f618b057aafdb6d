// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::allocator::ChainId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainIdError {
    #[error("Chain identifier pool exhausted: all {capacity} identifiers are in use")]
    PoolExhausted { capacity: u32 },
    #[error("Invalid release of chain identifier {chain_id}: {reason}")]
    InvalidRelease {
        chain_id: ChainId,
        reason: &'static str,
    },
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("Invalid address layout: {0}")]
    InvalidLayout(String),
}
