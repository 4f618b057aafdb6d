// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Topology shared between the path workers and the topology feed

use crate::graph::{ShortestPath, TopologyGraph};
use concurrency::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use model::TopologyUpdate;
use std::sync::PoisonError;
use tracing::info;

/// A [`TopologyGraph`] behind a reader/writer lock. Compilations only read it.
#[derive(Debug)]
pub struct SharedTopology {
    graph: RwLock<TopologyGraph>,
}

impl Default for SharedTopology {
    fn default() -> Self {
        Self::new(TopologyGraph::new())
    }
}

impl SharedTopology {
    #[must_use]
    pub fn new(graph: TopologyGraph) -> Self {
        Self {
            graph: RwLock::new(graph),
        }
    }

    // graph mutations never leave it half-updated
    fn read_guard(&self) -> RwLockReadGuard<'_, TopologyGraph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }
    fn write_guard(&self) -> RwLockWriteGuard<'_, TopologyGraph> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn apply(&self, update: &TopologyUpdate) {
        info!("Topology update: {update}");
        self.write_guard().apply(update);
    }

    /// Run `f` with read access to the graph
    pub fn read<R>(&self, f: impl FnOnce(&TopologyGraph) -> R) -> R {
        f(&self.read_guard())
    }

    #[must_use]
    pub fn shortest_path(&self, src: &str, dst: &str) -> Option<ShortestPath> {
        self.read_guard().shortest_path(src, dst)
    }

    /// A copy of the current graph
    #[must_use]
    pub fn snapshot(&self) -> TopologyGraph {
        self.read_guard().clone()
    }
}
