// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Forwarder fabrics and paths to exercise the compiler with

use model::{
    ClassifierAttachment, DataPlaneLocator, ForwarderCatalog, FunctionCatalog, GroupCatalog,
    PathId, PathSnapshot, RenderedPath, ServiceFunction, ServiceFunctionForwarder,
    ServiceFunctionGroup, TrafficSelector, Transport, TransportKind,
};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use topology::TopologyGraph;

/// Transport parameters of kind `kind`, derived from `n`
#[must_use]
pub fn sample_transport(kind: TransportKind, n: u32) -> Transport {
    match kind {
        TransportKind::Ethernet => Transport::Ethernet { mac: None },
        TransportKind::Vlan => Transport::Vlan {
            vlan_id: u16::try_from(100 + n).unwrap_or(u16::MAX),
        },
        TransportKind::Mpls => Transport::Mpls { label: 1000 + n },
        TransportKind::VxlanGpe => Transport::VxlanGpe {
            remote: IpAddr::V4(Ipv4Addr::new(192, 0, 2, u8::try_from(n).unwrap_or(u8::MAX))),
            vni: 5000 + n,
        },
        TransportKind::Logical => Transport::Logical {
            interface: format!("lif{n}"),
        },
    }
}

/// Builder of forwarders, functions and groups.
///
/// Ports are handed out in sequence starting at 1, in the order locators are created. Functions
/// attach to their forwarder with plain Ethernet. Links bind a locator of the fabric's transport
/// on both ends, with parameters derived from the locator's port.
#[derive(Debug, Clone)]
pub struct Fabric {
    kind: TransportKind,
    forwarders: BTreeMap<String, ServiceFunctionForwarder>,
    functions: FunctionCatalog,
    groups: GroupCatalog,
    next_port: u32,
}

impl Fabric {
    #[must_use]
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            forwarders: BTreeMap::new(),
            functions: FunctionCatalog::new(),
            groups: GroupCatalog::new(),
            next_port: 1,
        }
    }

    fn port(&mut self) -> u32 {
        let port = self.next_port;
        self.next_port += 1;
        port
    }

    fn update(
        &mut self,
        name: &str,
        f: impl FnOnce(ServiceFunctionForwarder) -> ServiceFunctionForwarder,
    ) {
        let forwarder = self
            .forwarders
            .remove(name)
            .unwrap_or_else(|| ServiceFunctionForwarder::new(name));
        self.forwarders.insert(name.to_owned(), f(forwarder));
    }

    #[must_use]
    pub fn forwarder(mut self, name: &str) -> Self {
        self.update(name, |f| f);
        self
    }

    /// Host `function` on `forwarder`
    #[must_use]
    pub fn function(mut self, forwarder: &str, function: &str) -> Self {
        let port = self.port();
        let locator = format!("{forwarder}-{function}");
        self.update(forwarder, |f| {
            f.with_locator(DataPlaneLocator::new(
                &locator,
                port,
                Transport::Ethernet { mac: None },
            ))
            .bind_function(function, &locator)
        });
        self.functions.add(ServiceFunction::new(function, "generic"));
        self
    }

    /// Declare `function` without hosting it anywhere
    #[must_use]
    pub fn detached_function(mut self, function: &str) -> Self {
        self.functions.add(ServiceFunction::new(function, "generic"));
        self
    }

    /// Bind `a` and `b` to each other
    #[must_use]
    pub fn link(mut self, a: &str, b: &str) -> Self {
        for (from, to) in [(a, b), (b, a)] {
            let port = self.port();
            let transport = sample_transport(self.kind, port);
            let locator = format!("{from}-to-{to}");
            self.update(from, |f| {
                f.with_locator(DataPlaneLocator::new(&locator, port, transport))
                    .bind_neighbor(to, &locator)
            });
        }
        self
    }

    #[must_use]
    pub fn table_offset(mut self, forwarder: &str, offset: u8) -> Self {
        self.update(forwarder, |f| f.with_table_offset(offset));
        self
    }

    #[must_use]
    pub fn group(mut self, name: &str, members: &[(&str, u16)]) -> Self {
        let group = members
            .iter()
            .fold(ServiceFunctionGroup::new(name), |g, (function, weight)| {
                g.with_member(function, *weight)
            });
        self.groups.add(group);
        self
    }

    /// Port of locator `name` on `forwarder`
    #[must_use]
    pub fn port_of(&self, forwarder: &str, name: &str) -> Option<u32> {
        self.forwarders
            .get(forwarder)
            .and_then(|f| f.locator(name))
            .map(|l| l.port)
    }

    #[must_use]
    pub fn snapshot(&self, path: RenderedPath) -> PathSnapshot {
        PathSnapshot::new(path)
            .with_forwarders(self.forwarders.values().cloned().collect::<ForwarderCatalog>())
            .with_functions(self.functions.clone())
            .with_groups(self.groups.clone())
    }

    /// A graph with one edge per bound pair of forwarders
    #[must_use]
    pub fn topology(&self) -> TopologyGraph {
        let mut graph = TopologyGraph::new();
        for forwarder in self.forwarders.values() {
            graph.add_node(&forwarder.name);
            for neighbor in forwarder.neighbor_locators.keys() {
                graph.add_edge(&forwarder.name, neighbor);
            }
        }
        graph
    }
}

/// `sff1` hosts `fw` and `dpi`, `sff2` hosts `nat`, `sff3` hosts `ids`, with links
/// `sff1-sff2` and `sff2-sff3`.
#[must_use]
pub fn chain_fabric(kind: TransportKind) -> Fabric {
    Fabric::new(kind)
        .function("sff1", "fw")
        .function("sff1", "dpi")
        .function("sff2", "nat")
        .function("sff3", "ids")
        .link("sff1", "sff2")
        .link("sff2", "sff3")
}

/// `fw@sff1 -> dpi@sff1 -> nat@sff2 -> ids@sff3`, classified on port 1 of `sff1` and leaving
/// through port 9.
#[must_use]
pub fn four_hop_path(path_id: u32, kind: TransportKind) -> RenderedPath {
    RenderedPath::new(PathId(path_id), &format!("path-{path_id}"), kind)
        .hop("sff1", "fw")
        .hop("sff1", "dpi")
        .hop("sff2", "nat")
        .hop("sff3", "ids")
        .with_classifier(ClassifierAttachment {
            port: 1,
            selectors: vec![TrafficSelector::IpProto(6)],
        })
        .with_egress(9)
}
