// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Output of the pipeline compiler

use chainid::{ChainId, VirtualAddress};
use flow::{Direction, FlowBatch, FlowGroup, FlowRule, TableRole};
use model::PathId;
use std::collections::BTreeSet;

/// Rules and groups realizing one direction of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    pub direction: Direction,
    pub address: VirtualAddress,
    pub rules: Vec<FlowRule>,
    pub groups: Vec<FlowGroup>,
}

impl RuleSet {
    pub fn rules_in(&self, role: TableRole) -> impl Iterator<Item = &FlowRule> {
        self.rules.iter().filter(move |r| r.role == role)
    }
    pub fn rules_on<'a>(&'a self, forwarder: &'a str) -> impl Iterator<Item = &'a FlowRule> {
        self.rules.iter().filter(move |r| r.forwarder == forwarder)
    }
    /// Forwarders that receive at least one rule or group
    #[must_use]
    pub fn forwarders(&self) -> BTreeSet<&str> {
        self.rules
            .iter()
            .map(|r| r.forwarder.as_str())
            .chain(self.groups.iter().map(|g| g.forwarder.as_str()))
            .collect()
    }
}

/// Every rule and group of a path, for one or both directions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPath {
    pub path_id: PathId,
    pub chain_id: ChainId,
    pub forward: RuleSet,
    pub reverse: Option<RuleSet>,
}

impl CompiledPath {
    pub fn rule_sets(&self) -> impl Iterator<Item = &RuleSet> {
        std::iter::once(&self.forward).chain(self.reverse.as_ref())
    }
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rule_sets().map(|s| s.rules.len()).sum()
    }
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.rule_sets().map(|s| s.groups.len()).sum()
    }
    /// The batch to hand over to the writer
    #[must_use]
    pub fn into_batch(self) -> FlowBatch {
        let mut batch = FlowBatch::new(self.forward.rules, self.forward.groups);
        if let Some(reverse) = self.reverse {
            batch.extend(FlowBatch::new(reverse.rules, reverse.groups));
        }
        batch
    }
}
