// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Rendered service function paths

use crate::errors::ModelError;
use crate::ids::{ChainKey, PathId};
use crate::transport::TransportKind;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// What a hop sends traffic to: a single function, or a load-balanced group of functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HopTarget {
    Function(String),
    Group(String),
}

impl Display for HopTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HopTarget::Function(name) => write!(f, "function {name}"),
            HopTarget::Group(name) => write!(f, "group {name}"),
        }
    }
}

/// One traversal step of a [`RenderedPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathHop {
    pub hop_number: u8,
    pub forwarder: String,
    pub target: HopTarget,
}

impl PathHop {
    #[must_use]
    pub fn function(hop_number: u8, forwarder: &str, function: &str) -> Self {
        Self {
            hop_number,
            forwarder: forwarder.to_owned(),
            target: HopTarget::Function(function.to_owned()),
        }
    }
    #[must_use]
    pub fn group(hop_number: u8, forwarder: &str, group: &str) -> Self {
        Self {
            hop_number,
            forwarder: forwarder.to_owned(),
            target: HopTarget::Group(group.to_owned()),
        }
    }
}

/// Traffic-selection criteria of a classifier. Their meaning is owned by whoever defines the
/// classification policy; the renderer only turns them into match fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficSelector {
    EthType(u16),
    IpSrc(IpNet),
    IpDst(IpNet),
    IpProto(u8),
    L4SrcPort(u16),
    L4DstPort(u16),
}

/// Where the traffic enters the chain: a port of the forwarder of the first hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassifierAttachment {
    pub port: u32,
    #[serde(default)]
    pub selectors: Vec<TrafficSelector>,
}

/// Where the traffic leaves the chain: a port of the forwarder of the last hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainEgress {
    pub port: u32,
}

/// A named, ordered chain instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPath {
    pub path_id: PathId,
    pub name: String,
    pub chain_key: ChainKey,
    /// index of the first hop, decremented at each hop
    pub starting_index: u8,
    pub symmetric: bool,
    /// transport used between forwarders
    pub transport: TransportKind,
    pub hops: Vec<PathHop>,
    #[serde(default)]
    pub classifier: Option<ClassifierAttachment>,
    #[serde(default)]
    pub reverse_classifier: Option<ClassifierAttachment>,
    #[serde(default)]
    pub egress: Option<ChainEgress>,
    #[serde(default)]
    pub reverse_egress: Option<ChainEgress>,
}

impl RenderedPath {
    /// Create a path with no hops. The chain key is derived from the name.
    #[must_use]
    pub fn new(path_id: PathId, name: &str, transport: TransportKind) -> Self {
        Self {
            path_id,
            name: name.to_owned(),
            chain_key: ChainKey::from_name(name),
            starting_index: u8::MAX,
            symmetric: false,
            transport,
            hops: Vec::new(),
            classifier: None,
            reverse_classifier: None,
            egress: None,
            reverse_egress: None,
        }
    }
    /// Append a hop to a function, numbering it after the last one
    #[must_use]
    pub fn hop(mut self, forwarder: &str, function: &str) -> Self {
        let number = self.next_hop_number();
        self.hops.push(PathHop::function(number, forwarder, function));
        self
    }
    /// Append a hop to a group, numbering it after the last one
    #[must_use]
    pub fn group_hop(mut self, forwarder: &str, group: &str) -> Self {
        let number = self.next_hop_number();
        self.hops.push(PathHop::group(number, forwarder, group));
        self
    }
    #[must_use]
    pub fn symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }
    #[must_use]
    pub fn with_classifier(mut self, classifier: ClassifierAttachment) -> Self {
        self.classifier = Some(classifier);
        self
    }
    #[must_use]
    pub fn with_reverse_classifier(mut self, classifier: ClassifierAttachment) -> Self {
        self.reverse_classifier = Some(classifier);
        self
    }
    #[must_use]
    pub fn with_egress(mut self, port: u32) -> Self {
        self.egress = Some(ChainEgress { port });
        self
    }
    #[must_use]
    pub fn with_reverse_egress(mut self, port: u32) -> Self {
        self.reverse_egress = Some(ChainEgress { port });
        self
    }

    fn next_hop_number(&self) -> u8 {
        u8::try_from(self.hops.len()).unwrap_or(u8::MAX)
    }

    /// Check the structural invariants of the path: contiguous hop numbers starting at 0, and a
    /// starting index large enough to be decremented at every hop.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.hops.is_empty() {
            return Err(ModelError::NoHops(self.path_id));
        }
        for (position, hop) in self.hops.iter().enumerate() {
            if usize::from(hop.hop_number) != position {
                return Err(ModelError::HopNumbering {
                    path: self.path_id,
                    position,
                    found: hop.hop_number,
                });
            }
        }
        if usize::from(self.starting_index) < self.hops.len() {
            return Err(ModelError::StartingIndex {
                path: self.path_id,
                starting_index: self.starting_index,
                hops: self.hops.len(),
            });
        }
        Ok(())
    }

    /// Service index carried by the packet when it is processed by hop `hop_number`
    #[must_use]
    pub fn service_index(&self, hop_number: u8) -> u8 {
        self.starting_index.saturating_sub(hop_number)
    }

    /// Build the reverse traversal of this path: hops in opposite order, renumbered from 0, with
    /// the classifiers and egress points swapped. Path id and chain key are kept.
    #[must_use]
    pub fn reversed(&self) -> RenderedPath {
        let hops = self
            .hops
            .iter()
            .rev()
            .enumerate()
            .map(|(n, hop)| PathHop {
                hop_number: u8::try_from(n).unwrap_or(u8::MAX),
                forwarder: hop.forwarder.clone(),
                target: hop.target.clone(),
            })
            .collect();
        RenderedPath {
            path_id: self.path_id,
            name: format!("{}-reverse", self.name),
            chain_key: self.chain_key,
            starting_index: self.starting_index,
            symmetric: self.symmetric,
            transport: self.transport,
            hops,
            classifier: self.reverse_classifier.clone(),
            reverse_classifier: self.classifier.clone(),
            egress: self.reverse_egress,
            reverse_egress: self.egress,
        }
    }

    #[must_use]
    pub fn first_hop(&self) -> Option<&PathHop> {
        self.hops.first()
    }
    #[must_use]
    pub fn last_hop(&self) -> Option<&PathHop> {
        self.hops.last()
    }
}

impl Display for RenderedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "path {} '{}' [", self.path_id, self.name)?;
        for (n, hop) in self.hops.iter().enumerate() {
            if n > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}@{}", hop.target, hop.forwarder)?;
        }
        write!(f, "]")
    }
}
