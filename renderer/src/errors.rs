// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use chainid::ChainIdError;
use flow::Direction;
use model::{ModelError, PathId, TransportKind};
use thiserror::Error;

/// Why a hop could not be resolved
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HopFault {
    #[error("unknown forwarder {0}")]
    UnknownForwarder(String),
    #[error("forwarder {forwarder} has no {transport} locator")]
    NoTransport {
        forwarder: String,
        transport: TransportKind,
    },
    #[error("unknown service function {0}")]
    UnknownFunction(String),
    #[error("forwarder {forwarder} has no locator bound to function {function}")]
    NoFunctionLocator { forwarder: String, function: String },
    #[error("unknown service function group {0}")]
    UnknownGroup(String),
    #[error("invalid group: {0}")]
    InvalidGroup(ModelError),
    #[error("no route from {from} to {to}")]
    NoRoute { from: String, to: String },
    #[error("forwarder {from} has no {transport} locator toward {to}")]
    NoNeighborLocator {
        from: String,
        to: String,
        transport: TransportKind,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] ModelError),
    #[error("Hop {hop} ({direction}): {cause}")]
    UnresolvedHop {
        hop: u8,
        direction: Direction,
        cause: HopFault,
    },
    #[error("Path {path_id} has {hops} hops but at most {max} can be encoded")]
    TooManyHops { path_id: PathId, hops: usize, max: u32 },
    #[error("Chain identifier error: {0}")]
    ChainId(#[from] ChainIdError),
}
