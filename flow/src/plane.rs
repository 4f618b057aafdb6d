// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Interface to a flow-programmable forwarding plane

use crate::batch::{FlowBatch, FlowTransaction};
use crate::group::FlowGroup;
use crate::rule::FlowRule;
use model::PathId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaneError {
    #[error("Operation not supported by the plane: {0}")]
    Unsupported(&'static str),
    #[error("Forwarder {0} is unknown or unreachable")]
    Unreachable(String),
    #[error("Rejected by the plane: {0}")]
    Rejected(String),
}

/// A forwarding plane, as seen through its protocol adapter.
///
/// Methods take `&self`: a plane is shared by all the path workers and does its own locking.
pub trait FlowPlane: Send + Sync {
    /// Whether [`FlowPlane::commit`] applies a transaction atomically
    fn supports_transactions(&self) -> bool;

    /// Whether the plane implements weighted select groups
    fn supports_weighted_groups(&self) -> bool {
        true
    }

    /// Apply all the operations of `transaction`, or none of them
    fn commit(&self, transaction: FlowTransaction) -> Result<(), PlaneError>;

    /// Rules and groups currently installed for `path_id`, as tagged by their cookies
    fn installed(&self, path_id: PathId) -> Result<FlowBatch, PlaneError>;

    fn insert_rule(&self, rule: &FlowRule) -> Result<(), PlaneError>;
    fn remove_rule(&self, rule: &FlowRule) -> Result<(), PlaneError>;
    fn insert_group(&self, group: &FlowGroup) -> Result<(), PlaneError>;
    fn remove_group(&self, group: &FlowGroup) -> Result<(), PlaneError>;
}
