// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory forwarding plane with failure injection, for tests

use crate::batch::{FlowBatch, FlowOp, FlowTransaction};
use crate::group::{FlowGroup, GroupId};
use crate::plane::{FlowPlane, PlaneError};
use crate::rule::{FlowAction, FlowRule, RuleKey};
use concurrency::sync::{Mutex, MutexGuard};
use model::PathId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::PoisonError;

#[derive(Debug, Clone, Copy)]
struct FailurePlan {
    /// operations that still succeed before failures start
    after: u64,
    /// operations that fail once `after` is exhausted
    count: u64,
}

#[derive(Debug, Clone, Default)]
struct PlaneState {
    rules: BTreeMap<RuleKey, FlowRule>,
    groups: BTreeMap<(String, GroupId), FlowGroup>,
    /// if set, the only forwarders the plane can reach
    forwarders: Option<BTreeSet<String>>,
}

impl PlaneState {
    fn check_forwarder(&self, forwarder: &str) -> Result<(), PlaneError> {
        match &self.forwarders {
            Some(known) if !known.contains(forwarder) => {
                Err(PlaneError::Unreachable(forwarder.to_owned()))
            }
            _ => Ok(()),
        }
    }
    fn insert_rule(&mut self, rule: &FlowRule) -> Result<(), PlaneError> {
        self.check_forwarder(&rule.forwarder)?;
        for action in &rule.actions {
            if let FlowAction::Group(id) = action {
                if !self.groups.contains_key(&(rule.forwarder.clone(), *id)) {
                    return Err(PlaneError::Rejected(format!(
                        "rule points to missing group {id} on {}",
                        rule.forwarder
                    )));
                }
            }
        }
        self.rules.insert(rule.key(), rule.clone());
        Ok(())
    }
    fn remove_rule(&mut self, rule: &FlowRule) -> Result<(), PlaneError> {
        self.check_forwarder(&rule.forwarder)?;
        self.rules.remove(&rule.key());
        Ok(())
    }
    fn insert_group(&mut self, group: &FlowGroup) -> Result<(), PlaneError> {
        self.check_forwarder(&group.forwarder)?;
        self.groups
            .insert((group.forwarder.clone(), group.group_id), group.clone());
        Ok(())
    }
    fn remove_group(&mut self, group: &FlowGroup) -> Result<(), PlaneError> {
        self.check_forwarder(&group.forwarder)?;
        let in_use = self.rules.values().any(|rule| {
            rule.forwarder == group.forwarder
                && rule.actions.contains(&FlowAction::Group(group.group_id))
        });
        if in_use {
            return Err(PlaneError::Rejected(format!(
                "group {} on {} is still in use",
                group.group_id, group.forwarder
            )));
        }
        self.groups.remove(&(group.forwarder.clone(), group.group_id));
        Ok(())
    }
    fn execute(&mut self, op: &FlowOp) -> Result<(), PlaneError> {
        match op {
            FlowOp::InsertRule(rule) => self.insert_rule(rule),
            FlowOp::RemoveRule(rule) => self.remove_rule(rule),
            FlowOp::InsertGroup(group) => self.insert_group(group),
            FlowOp::RemoveGroup(group) => self.remove_group(group),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: PlaneState,
    failures: Option<FailurePlan>,
    /// operations (or transactions) applied successfully
    applied: u64,
}

impl Inner {
    fn inject(&mut self) -> Result<(), PlaneError> {
        if let Some(plan) = &mut self.failures {
            if plan.after > 0 {
                plan.after -= 1;
            } else if plan.count > 0 {
                plan.count -= 1;
                return Err(PlaneError::Rejected("injected failure".to_string()));
            }
        }
        Ok(())
    }
    fn run(&mut self, op: &FlowOp) -> Result<(), PlaneError> {
        self.inject()?;
        self.state.execute(op)?;
        self.applied += 1;
        Ok(())
    }
}

/// A [`FlowPlane`] keeping rules and groups in memory.
///
/// A rule is identified by its forwarder, table, priority and match set, so inserting a rule
/// with the same identity replaces the previous one.
#[derive(Debug)]
pub struct MemoryPlane {
    inner: Mutex<Inner>,
    transactions: bool,
    weighted_groups: bool,
}

impl Default for MemoryPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlane {
    /// A plane without transactions, supporting weighted groups
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            transactions: false,
            weighted_groups: true,
        }
    }
    /// A plane applying transactions atomically
    #[must_use]
    pub fn transactional() -> Self {
        Self {
            transactions: true,
            ..Self::new()
        }
    }
    #[must_use]
    pub fn without_weighted_groups(mut self) -> Self {
        self.weighted_groups = false;
        self
    }
    /// Only accept operations on the given forwarders
    #[must_use]
    pub fn with_forwarders<'a>(self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.lock().state.forwarders = Some(names.into_iter().map(str::to_owned).collect());
        self
    }
    /// Let `after` operations succeed, then fail the `count` following ones. A transaction
    /// counts as one operation.
    pub fn fail_after(&self, after: u64, count: u64) {
        self.lock().failures = Some(FailurePlan { after, count });
    }
    pub fn clear_failures(&self) {
        self.lock().failures = None;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All installed rules, in key order
    #[must_use]
    pub fn rules(&self) -> Vec<FlowRule> {
        self.lock().state.rules.values().cloned().collect()
    }
    #[must_use]
    pub fn rules_on(&self, forwarder: &str) -> Vec<FlowRule> {
        self.lock()
            .state
            .rules
            .values()
            .filter(|r| r.forwarder == forwarder)
            .cloned()
            .collect()
    }
    #[must_use]
    pub fn groups(&self) -> Vec<FlowGroup> {
        self.lock().state.groups.values().cloned().collect()
    }
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.lock().state.rules.len()
    }
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.lock().state.groups.len()
    }
    /// Number of operations or transactions applied so far
    #[must_use]
    pub fn applied(&self) -> u64 {
        self.lock().applied
    }
}

impl FlowPlane for MemoryPlane {
    fn supports_transactions(&self) -> bool {
        self.transactions
    }
    fn supports_weighted_groups(&self) -> bool {
        self.weighted_groups
    }
    fn commit(&self, transaction: FlowTransaction) -> Result<(), PlaneError> {
        if !self.transactions {
            return Err(PlaneError::Unsupported("transactions"));
        }
        let mut inner = self.lock();
        inner.inject()?;
        let mut staged = inner.state.clone();
        for op in &transaction.ops {
            staged.execute(op)?;
        }
        inner.state = staged;
        inner.applied += 1;
        Ok(())
    }
    fn installed(&self, path_id: PathId) -> Result<FlowBatch, PlaneError> {
        let inner = self.lock();
        let rules = inner
            .state
            .rules
            .values()
            .filter(|r| r.cookie.belongs_to(path_id))
            .cloned()
            .collect();
        let groups = inner
            .state
            .groups
            .values()
            .filter(|g| g.cookie.belongs_to(path_id))
            .cloned()
            .collect();
        Ok(FlowBatch::new(rules, groups))
    }
    fn insert_rule(&self, rule: &FlowRule) -> Result<(), PlaneError> {
        self.lock().run(&FlowOp::InsertRule(rule.clone()))
    }
    fn remove_rule(&self, rule: &FlowRule) -> Result<(), PlaneError> {
        self.lock().run(&FlowOp::RemoveRule(rule.clone()))
    }
    fn insert_group(&self, group: &FlowGroup) -> Result<(), PlaneError> {
        self.lock().run(&FlowOp::InsertGroup(group.clone()))
    }
    fn remove_group(&self, group: &FlowGroup) -> Result<(), PlaneError> {
        self.lock().run(&FlowOp::RemoveGroup(group.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Cookie, Direction, MatchField, OutputPort, TableRole};

    fn rule(path: u32, port: u32) -> FlowRule {
        let cookie = Cookie::new(PathId(path), Direction::Forward, TableRole::NextHop, 0);
        FlowRule::new("sff1", TableRole::NextHop, 0, cookie)
            .matching(MatchField::InPort(port))
            .then(FlowAction::Output(OutputPort::Normal))
    }

    concurrency::with_std! {
        #[test]
        fn same_key_replaces() {
            let plane = MemoryPlane::new();
            plane.insert_rule(&rule(1, 1)).unwrap();
            plane
                .insert_rule(&rule(1, 1).then(FlowAction::Drop))
                .unwrap();
            assert_eq!(plane.rule_count(), 1);
            assert_eq!(plane.rules()[0].actions.len(), 2);
        }

        #[test]
        fn group_references_are_checked() {
            let plane = MemoryPlane::new();
            let cookie = Cookie::new(PathId(1), Direction::Forward, TableRole::PathMapper, 0);
            let id = GroupId::new(PathId(1), Direction::Forward, 0);
            let group = FlowGroup::new("sff1", id, cookie).with_bucket(1, vec![]);
            let pointing = rule(1, 2).then(FlowAction::Group(id));
            assert!(plane.insert_rule(&pointing).is_err());
            plane.insert_group(&group).unwrap();
            plane.insert_rule(&pointing).unwrap();
            assert!(plane.remove_group(&group).is_err());
            plane.remove_rule(&pointing).unwrap();
            plane.remove_group(&group).unwrap();
            assert_eq!(plane.group_count(), 0);
        }

        #[test]
        fn injected_failures() {
            let plane = MemoryPlane::new().with_forwarders(["sff1"]);
            plane.fail_after(1, 1);
            plane.insert_rule(&rule(1, 1)).unwrap();
            assert_eq!(
                plane.insert_rule(&rule(1, 2)),
                Err(PlaneError::Rejected("injected failure".to_string()))
            );
            plane.insert_rule(&rule(1, 2)).unwrap();
            assert_eq!(plane.applied(), 2);

            let mut elsewhere = rule(1, 3);
            elsewhere.forwarder = "sff9".to_string();
            assert_eq!(
                plane.insert_rule(&elsewhere),
                Err(PlaneError::Unreachable("sff9".to_string()))
            );
        }

        #[test]
        fn transactions_are_all_or_nothing() {
            let plane = MemoryPlane::transactional();
            let mut bad = rule(2, 9);
            bad.actions.push(FlowAction::Group(GroupId(42)));
            let tx = FlowTransaction {
                path_id: PathId(2),
                ops: vec![FlowOp::InsertRule(rule(2, 1)), FlowOp::InsertRule(bad)],
            };
            assert!(plane.commit(tx).is_err());
            assert_eq!(plane.rule_count(), 0);
            assert!(MemoryPlane::new().commit(FlowTransaction {
                path_id: PathId(2),
                ops: vec![]
            })
            .is_err());
        }
    }
}
