// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Inputs delivered to the renderer by its collaborators

use crate::errors::ModelError;
use crate::forwarder::{ForwarderCatalog, FunctionCatalog, GroupCatalog};
use crate::ids::PathId;
use crate::path::RenderedPath;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A path together with every object it refers to, as seen at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSnapshot {
    pub path: RenderedPath,
    #[serde(default)]
    pub forwarders: ForwarderCatalog,
    #[serde(default)]
    pub functions: FunctionCatalog,
    #[serde(default)]
    pub groups: GroupCatalog,
}

impl PathSnapshot {
    #[must_use]
    pub fn new(path: RenderedPath) -> Self {
        Self {
            path,
            forwarders: ForwarderCatalog::new(),
            functions: FunctionCatalog::new(),
            groups: GroupCatalog::new(),
        }
    }
    #[must_use]
    pub fn with_forwarders(mut self, forwarders: ForwarderCatalog) -> Self {
        self.forwarders = forwarders;
        self
    }
    #[must_use]
    pub fn with_functions(mut self, functions: FunctionCatalog) -> Self {
        self.functions = functions;
        self
    }
    #[must_use]
    pub fn with_groups(mut self, groups: GroupCatalog) -> Self {
        self.groups = groups;
        self
    }
    #[must_use]
    pub fn path_id(&self) -> PathId {
        self.path.path_id
    }
    /// Structural validation of the path. Name resolution is left to the compiler, which reports
    /// the offending hop.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.path.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathEventKind {
    Create,
    Update,
    Delete,
}

impl Display for PathEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathEventKind::Create => write!(f, "create"),
            PathEventKind::Update => write!(f, "update"),
            PathEventKind::Delete => write!(f, "delete"),
        }
    }
}

/// A path-changed notification. Deletions carry the last known snapshot of the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEvent {
    pub kind: PathEventKind,
    pub snapshot: PathSnapshot,
}

impl PathEvent {
    #[must_use]
    pub fn create(snapshot: PathSnapshot) -> Self {
        Self {
            kind: PathEventKind::Create,
            snapshot,
        }
    }
    #[must_use]
    pub fn update(snapshot: PathSnapshot) -> Self {
        Self {
            kind: PathEventKind::Update,
            snapshot,
        }
    }
    #[must_use]
    pub fn delete(snapshot: PathSnapshot) -> Self {
        Self {
            kind: PathEventKind::Delete,
            snapshot,
        }
    }
    #[must_use]
    pub fn path_id(&self) -> PathId {
        self.snapshot.path_id()
    }
}

/// A change in the forwarder topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyUpdate {
    AddNode(String),
    AddEdge(String, String),
    RemoveNode(String),
    RemoveEdge(String, String),
}

impl Display for TopologyUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyUpdate::AddNode(n) => write!(f, "add node {n}"),
            TopologyUpdate::AddEdge(a, b) => write!(f, "add edge {a}-{b}"),
            TopologyUpdate::RemoveNode(n) => write!(f, "remove node {n}"),
            TopologyUpdate::RemoveEdge(a, b) => write!(f, "remove edge {a}-{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportKind;

    #[test]
    fn event_carries_path_id() {
        let path = RenderedPath::new(PathId(3), "p3", TransportKind::Ethernet).hop("sff1", "fw");
        let event = PathEvent::delete(PathSnapshot::new(path));
        assert_eq!(event.path_id(), PathId(3));
        assert_eq!(event.kind.to_string(), "delete");
        assert!(event.snapshot.validate().is_ok());
    }

    #[test]
    fn topology_update_display() {
        let update = TopologyUpdate::AddEdge("sff1".to_string(), "sff2".to_string());
        assert_eq!(update.to_string(), "add edge sff1-sff2");
    }
}
