// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors found when validating a path model

use crate::ids::PathId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Path {0} has no hops")]
    NoHops(PathId),
    #[error("Path {path}: hop at position {position} has hop number {found}")]
    HopNumbering {
        path: PathId,
        position: usize,
        found: u8,
    },
    #[error("Path {path}: starting index {starting_index} is too small for {hops} hops")]
    StartingIndex {
        path: PathId,
        starting_index: u8,
        hops: usize,
    },
    #[error("Invalid mac address '{0}'")]
    InvalidMac(String),
    #[error("Group '{0}' has no members")]
    EmptyGroup(String),
    #[error("Group '{group}': member '{member}' has a zero weight")]
    ZeroWeight { group: String, member: String },
}
