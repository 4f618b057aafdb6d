// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Rule batches and the transactions that install them

use crate::group::FlowGroup;
use crate::rule::FlowRule;
use model::PathId;
use std::fmt::Display;

/// Everything installed for one path, on all forwarders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowBatch {
    pub rules: Vec<FlowRule>,
    pub groups: Vec<FlowGroup>,
}

impl FlowBatch {
    #[must_use]
    pub fn new(rules: Vec<FlowRule>, groups: Vec<FlowGroup>) -> Self {
        Self { rules, groups }
    }
    /// The empty batch. Applying it removes a path.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.groups.is_empty()
    }
    pub fn extend(&mut self, other: FlowBatch) {
        self.rules.extend(other.rules);
        self.groups.extend(other.groups);
    }
    /// Names of the forwarders touched by the batch, sorted and deduplicated
    #[must_use]
    pub fn forwarders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .rules
            .iter()
            .map(|r| r.forwarder.as_str())
            .chain(self.groups.iter().map(|g| g.forwarder.as_str()))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// One mutation of a forwarding plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOp {
    InsertRule(FlowRule),
    RemoveRule(FlowRule),
    InsertGroup(FlowGroup),
    RemoveGroup(FlowGroup),
}

impl FlowOp {
    /// The operation undoing this one
    #[must_use]
    pub fn inverse(&self) -> FlowOp {
        match self {
            FlowOp::InsertRule(rule) => FlowOp::RemoveRule(rule.clone()),
            FlowOp::RemoveRule(rule) => FlowOp::InsertRule(rule.clone()),
            FlowOp::InsertGroup(group) => FlowOp::RemoveGroup(group.clone()),
            FlowOp::RemoveGroup(group) => FlowOp::InsertGroup(group.clone()),
        }
    }
}

impl Display for FlowOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowOp::InsertRule(rule) => write!(f, "+rule {rule}"),
            FlowOp::RemoveRule(rule) => write!(f, "-rule {rule}"),
            FlowOp::InsertGroup(group) => write!(f, "+group {group}"),
            FlowOp::RemoveGroup(group) => write!(f, "-group {group}"),
        }
    }
}

/// An ordered list of operations to be applied to a plane as a whole, or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowTransaction {
    pub path_id: PathId,
    pub ops: Vec<FlowOp>,
}

impl FlowTransaction {
    /// Operations replacing `previous` with `next`. Old rules go before old groups, since rules
    /// may point to groups; new groups go before new rules for the same reason.
    #[must_use]
    pub fn replace(path_id: PathId, previous: FlowBatch, next: FlowBatch) -> Self {
        let ops = previous
            .rules
            .into_iter()
            .map(FlowOp::RemoveRule)
            .chain(previous.groups.into_iter().map(FlowOp::RemoveGroup))
            .chain(next.groups.into_iter().map(FlowOp::InsertGroup))
            .chain(next.rules.into_iter().map(FlowOp::InsertRule))
            .collect();
        Self { path_id, ops }
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}
