// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Replacement of the rules of a path on a forwarding plane

use crate::batch::{FlowBatch, FlowOp, FlowTransaction};
use crate::plane::{FlowPlane, PlaneError};
use model::PathId;
use std::sync::Arc;
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, error, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriterError {
    #[error("Commit failed for path {path_id}: {reason}")]
    CommitFailed { path_id: PathId, reason: String },
}

fn commit_failed(path_id: PathId, reason: impl Into<String>) -> WriterError {
    WriterError::CommitFailed {
        path_id,
        reason: reason.into(),
    }
}

/// Applies rule batches to a [`FlowPlane`], one path at a time.
///
/// Applying a batch replaces everything installed for the path. If the plane has no
/// transactions, operations are applied one by one and undone in reverse order on failure. If
/// undoing fails too, every rule and group of the path is removed, so that neither the old nor
/// the new rules remain.
#[derive(Clone)]
pub struct FlowBatchWriter {
    plane: Arc<dyn FlowPlane>,
}

impl std::fmt::Debug for FlowBatchWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowBatchWriter")
            .field("transactions", &self.plane.supports_transactions())
            .finish()
    }
}

impl FlowBatchWriter {
    #[must_use]
    pub fn new(plane: Arc<dyn FlowPlane>) -> Self {
        Self { plane }
    }
    #[must_use]
    pub fn plane(&self) -> &Arc<dyn FlowPlane> {
        &self.plane
    }

    /// Replace the rules of `path_id` with `batch`. An empty batch removes the path.
    pub fn apply(&self, path_id: PathId, batch: FlowBatch) -> Result<(), WriterError> {
        if let Some(stray) = batch.rules.iter().find(|r| !r.cookie.belongs_to(path_id)) {
            error!("Refusing batch for path {path_id}: rule with cookie {}", stray.cookie);
            return Err(commit_failed(
                path_id,
                format!("rule with cookie {} belongs to another path", stray.cookie),
            ));
        }
        if let Some(stray) = batch.groups.iter().find(|g| !g.cookie.belongs_to(path_id)) {
            error!("Refusing batch for path {path_id}: group with cookie {}", stray.cookie);
            return Err(commit_failed(
                path_id,
                format!("group with cookie {} belongs to another path", stray.cookie),
            ));
        }

        let previous = self.plane.installed(path_id).map_err(|e| {
            error!("Could not read rules installed for path {path_id}: {e}");
            commit_failed(path_id, format!("could not read installed rules: {e}"))
        })?;
        if previous.is_empty() && batch.is_empty() {
            debug!("Nothing to do for path {path_id}");
            return Ok(());
        }
        let removing = previous.rules.len();
        let inserting = batch.rules.len();
        let transaction = FlowTransaction::replace(path_id, previous, batch);

        if self.plane.supports_transactions() {
            debug!(
                "Committing {} operations for path {path_id} as one transaction",
                transaction.len()
            );
            self.plane.commit(transaction).map_err(|e| {
                error!("Transaction for path {path_id} failed: {e}");
                commit_failed(path_id, e.to_string())
            })?;
        } else {
            self.apply_ordered(&transaction)?;
        }
        info!("Path {path_id}: removed {removing} rules, installed {inserting} rules");
        Ok(())
    }

    fn execute(&self, op: &FlowOp) -> Result<(), PlaneError> {
        match op {
            FlowOp::InsertRule(rule) => self.plane.insert_rule(rule),
            FlowOp::RemoveRule(rule) => self.plane.remove_rule(rule),
            FlowOp::InsertGroup(group) => self.plane.insert_group(group),
            FlowOp::RemoveGroup(group) => self.plane.remove_group(group),
        }
    }

    fn apply_ordered(&self, transaction: &FlowTransaction) -> Result<(), WriterError> {
        let path_id = transaction.path_id;
        for (done, op) in transaction.ops.iter().enumerate() {
            let Err(e) = self.execute(op) else {
                continue;
            };
            error!("Path {path_id}: failed to apply {op}: {e}");
            let applied = transaction.ops.get(..done).unwrap_or_default();
            if self.rollback(path_id, applied) {
                warn!("Path {path_id}: rolled back {done} operations");
                return Err(commit_failed(path_id, format!("{e}; previous rules restored")));
            }
            let reason = if self.purge(path_id) {
                format!("{e}; rollback failed, all rules of the path removed")
            } else {
                format!("{e}; rollback failed, rules of the path could not all be removed")
            };
            return Err(commit_failed(path_id, reason));
        }
        Ok(())
    }

    fn rollback(&self, path_id: PathId, applied: &[FlowOp]) -> bool {
        for op in applied.iter().rev() {
            let undo = op.inverse();
            if let Err(e) = self.execute(&undo) {
                error!("Path {path_id}: rollback failed on {undo}: {e}");
                return false;
            }
        }
        true
    }

    fn purge(&self, path_id: PathId) -> bool {
        let installed = match self.plane.installed(path_id) {
            Ok(installed) => installed,
            Err(e) => {
                error!("Path {path_id}: could not list rules to remove: {e}");
                return false;
            }
        };
        let mut clean = true;
        for rule in &installed.rules {
            if let Err(e) = self.plane.remove_rule(rule) {
                error!("Path {path_id}: could not remove {rule}: {e}");
                clean = false;
            }
        }
        for group in &installed.groups {
            if let Err(e) = self.plane.remove_group(group) {
                error!("Path {path_id}: could not remove {group}: {e}");
                clean = false;
            }
        }
        clean
    }
}
