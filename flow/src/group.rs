// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Weighted select groups

use crate::rule::{Cookie, Direction, FlowAction};
use model::PathId;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of a group on a forwarder, derived from the path, direction and hop it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl GroupId {
    #[must_use]
    pub fn new(path_id: PathId, direction: Direction, hop: u16) -> Self {
        let direction = match direction {
            Direction::Forward => 0u64,
            Direction::Reverse => 1u64,
        };
        GroupId((u64::from(path_id.as_u32()) << 32) | (direction << 16) | u64::from(hop))
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bucket {
    pub weight: u16,
    pub actions: Vec<FlowAction>,
}

/// A select group: each flow is sent to one bucket, chosen with a probability proportional to
/// the bucket weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowGroup {
    pub forwarder: String,
    pub group_id: GroupId,
    pub buckets: Vec<Bucket>,
    pub cookie: Cookie,
}

impl FlowGroup {
    #[must_use]
    pub fn new(forwarder: &str, group_id: GroupId, cookie: Cookie) -> Self {
        Self {
            forwarder: forwarder.to_owned(),
            group_id,
            buckets: Vec::new(),
            cookie,
        }
    }
    #[must_use]
    pub fn with_bucket(mut self, weight: u16, actions: Vec<FlowAction>) -> Self {
        self.buckets.push(Bucket { weight, actions });
        self
    }
    #[must_use]
    pub fn path_id(&self) -> PathId {
        self.cookie.path_id()
    }
    #[must_use]
    pub fn total_weight(&self) -> u32 {
        self.buckets.iter().map(|b| u32::from(b.weight)).sum()
    }
}

impl Display for FlowGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} group={} select buckets={}",
            self.forwarder,
            self.group_id,
            self.buckets.len()
        )
    }
}
