// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Undirected adjacency graph with unweighted shortest paths

use model::TopologyUpdate;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt::Display;
#[allow(unused)]
use tracing::{debug, trace, warn};

/// A node of a [`ShortestPath`] and its distance, in hops, from the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
    pub name: String,
    pub distance: u32,
}

impl Display for PathNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.distance)
    }
}

/// Ordered sequence of nodes from a source to a destination, both included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortestPath {
    nodes: Vec<PathNode>,
}

impl ShortestPath {
    #[must_use]
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }
    /// Number of edges between source and destination
    #[must_use]
    pub fn distance(&self) -> u32 {
        self.nodes.last().map_or(0, |n| n.distance)
    }
    /// The node right after the source, if source and destination differ
    #[must_use]
    pub fn next_hop(&self) -> Option<&str> {
        self.nodes.get(1).map(|n| n.name.as_str())
    }
    /// Names of the nodes strictly between source and destination
    pub fn intermediates(&self) -> impl Iterator<Item = &str> {
        let inner = self.nodes.len().saturating_sub(2);
        self.nodes.iter().skip(1).take(inner).map(|n| n.name.as_str())
    }
    /// Consecutive pairs of node names along the path
    pub fn links(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes
            .windows(2)
            .map(|w| (w[0].name.as_str(), w[1].name.as_str()))
    }
}

impl Display for ShortestPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes: Vec<String> = self.nodes.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", nodes.join(", "))
    }
}

/// Adjacency structure over named nodes. Edges are undirected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyGraph {
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl TopologyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str) {
        if !self.adjacency.contains_key(name) {
            debug!("Adding node {name}");
            self.adjacency.insert(name.to_owned(), BTreeSet::new());
        }
    }

    /// Add an edge between `a` and `b`, creating them if they do not exist yet.
    pub fn add_edge(&mut self, a: &str, b: &str) {
        if a == b {
            warn!("Ignoring self-loop on node {a}");
            self.add_node(a);
            return;
        }
        self.add_node(a);
        self.add_node(b);
        let fresh = self
            .adjacency
            .get_mut(a)
            .is_some_and(|n| n.insert(b.to_owned()));
        if let Some(neighbors) = self.adjacency.get_mut(b) {
            neighbors.insert(a.to_owned());
        }
        if fresh {
            debug!("Added edge {a}-{b}");
        }
    }

    /// Remove the edge between `a` and `b`. Returns false if there was none.
    pub fn remove_edge(&mut self, a: &str, b: &str) -> bool {
        let removed = self.adjacency.get_mut(a).is_some_and(|n| n.remove(b));
        if let Some(neighbors) = self.adjacency.get_mut(b) {
            neighbors.remove(a);
        }
        if removed {
            debug!("Removed edge {a}-{b}");
        }
        removed
    }

    /// Remove a node and all its edges. Returns false if there was no such node.
    pub fn remove_node(&mut self, name: &str) -> bool {
        let Some(neighbors) = self.adjacency.remove(name) else {
            return false;
        };
        for neighbor in &neighbors {
            if let Some(others) = self.adjacency.get_mut(neighbor) {
                others.remove(name);
            }
        }
        debug!("Removed node {name} and {} edges", neighbors.len());
        true
    }

    pub fn apply(&mut self, update: &TopologyUpdate) {
        match update {
            TopologyUpdate::AddNode(name) => self.add_node(name),
            TopologyUpdate::AddEdge(a, b) => self.add_edge(a, b),
            TopologyUpdate::RemoveNode(name) => {
                self.remove_node(name);
            }
            TopologyUpdate::RemoveEdge(a, b) => {
                self.remove_edge(a, b);
            }
        }
    }

    #[must_use]
    pub fn has_node(&self, name: &str) -> bool {
        self.adjacency.contains_key(name)
    }
    #[must_use]
    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.adjacency.get(a).is_some_and(|n| n.contains(b))
    }
    /// Neighbors of `name`, in order. Empty for unknown nodes.
    #[must_use]
    pub fn neighbors(&self, name: &str) -> BTreeSet<String> {
        self.adjacency.get(name).cloned().unwrap_or_default()
    }
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    /// Breadth-first shortest path from `src` to `dst`. Neighbors are explored in order, so
    /// among paths of equal length the one through the lowest names is returned.
    ///
    /// Returns `None` if `dst` is unknown or not reachable. A path from a node to itself is the
    /// single node at distance 0.
    #[must_use]
    pub fn shortest_path(&self, src: &str, dst: &str) -> Option<ShortestPath> {
        if src == dst {
            return Some(ShortestPath {
                nodes: vec![PathNode {
                    name: src.to_owned(),
                    distance: 0,
                }],
            });
        }
        if !self.has_node(src) || !self.has_node(dst) {
            trace!("No path from {src} to {dst}: unknown node");
            return None;
        }

        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::from([src]);
        parents.insert(src, src);
        'bfs: while let Some(node) = queue.pop_front() {
            for neighbor in self.adjacency.get(node).into_iter().flatten() {
                if parents.contains_key(neighbor.as_str()) {
                    continue;
                }
                parents.insert(neighbor, node);
                if neighbor == dst {
                    break 'bfs;
                }
                queue.push_back(neighbor);
            }
        }
        if !parents.contains_key(dst) {
            trace!("No path from {src} to {dst}: unreachable");
            return None;
        }

        let mut names = vec![dst];
        let mut current = dst;
        while current != src {
            current = parents.get(current).copied()?;
            names.push(current);
        }
        names.reverse();
        let nodes = (0u32..)
            .zip(names)
            .map(|(distance, name)| PathNode {
                name: name.to_owned(),
                distance,
            })
            .collect();
        let path = ShortestPath { nodes };
        debug!("Shortest path from {src} to {dst}: {path}");
        Some(path)
    }
}
