// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Match/action rules of the forwarder pipeline

use crate::group::GroupId;
use ipnet::IpNet;
use model::{Mac, PathId};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::IpAddr;

/// Logical stage of the pipeline. The physical table index is the base index of the role plus
/// the table offset of the forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableRole {
    Classifier,
    TransportIngress,
    PathMapper,
    PathMapperAcl,
    NextHop,
    TransportEgress,
}

impl TableRole {
    pub const ALL: [TableRole; 6] = [
        TableRole::Classifier,
        TableRole::TransportIngress,
        TableRole::PathMapper,
        TableRole::PathMapperAcl,
        TableRole::NextHop,
        TableRole::TransportEgress,
    ];

    #[must_use]
    pub const fn base_index(self) -> u8 {
        match self {
            TableRole::Classifier => 0,
            TableRole::TransportIngress => 1,
            TableRole::PathMapper => 2,
            TableRole::PathMapperAcl => 3,
            TableRole::NextHop => 4,
            TableRole::TransportEgress => 10,
        }
    }
    /// Physical index of the table once shifted by `offset`
    #[must_use]
    pub const fn index(self, offset: u8) -> u8 {
        self.base_index().saturating_add(offset)
    }
    #[must_use]
    pub const fn priority(self) -> u16 {
        match self {
            TableRole::Classifier => 1000,
            TableRole::TransportIngress => 250,
            TableRole::PathMapper | TableRole::PathMapperAcl => 350,
            TableRole::NextHop => 550,
            TableRole::TransportEgress => 650,
        }
    }
    const fn code(self) -> u8 {
        match self {
            TableRole::Classifier => 0,
            TableRole::TransportIngress => 1,
            TableRole::PathMapper => 2,
            TableRole::PathMapperAcl => 3,
            TableRole::NextHop => 4,
            TableRole::TransportEgress => 5,
        }
    }
    fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.code() == code)
    }
}

impl Display for TableRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TableRole::Classifier => "classifier",
            TableRole::TransportIngress => "transport-ingress",
            TableRole::PathMapper => "path-mapper",
            TableRole::PathMapperAcl => "path-mapper-acl",
            TableRole::NextHop => "next-hop",
            TableRole::TransportEgress => "transport-egress",
        };
        write!(f, "{name}")
    }
}

/// Traversal direction of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// Opaque rule tag. Packs, from high to low bits: the path id (32 bits), the direction
/// (8 bits), the table role (8 bits) and the hop number (16 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cookie(pub u64);

impl Cookie {
    #[must_use]
    pub fn new(path_id: PathId, direction: Direction, role: TableRole, hop: u16) -> Self {
        let direction = match direction {
            Direction::Forward => 0u64,
            Direction::Reverse => 1u64,
        };
        Cookie(
            (u64::from(path_id.as_u32()) << 32)
                | (direction << 24)
                | (u64::from(role.code()) << 16)
                | u64::from(hop),
        )
    }
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn path_id(self) -> PathId {
        PathId((self.0 >> 32) as u32)
    }
    #[must_use]
    pub fn direction(self) -> Direction {
        if (self.0 >> 24) & 0xff == 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn role(self) -> Option<TableRole> {
        TableRole::from_code(((self.0 >> 16) & 0xff) as u8)
    }
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn hop(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
    #[must_use]
    pub fn belongs_to(self, path_id: PathId) -> bool {
        self.path_id() == path_id
    }
}

impl Display for Cookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A match predicate. All the predicates of a rule must hold for it to match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchField {
    InPort(u32),
    EthDst(Mac),
    EthType(u16),
    VlanId(u16),
    MplsLabel(u32),
    TunnelId(u32),
    IpSrc(IpNet),
    IpDst(IpNet),
    IpProto(u8),
    L4SrcPort(u16),
    L4DstPort(u16),
    /// Flow hash modulo `modulus` falls in `low..=high`
    HashBucket { modulus: u32, low: u32, high: u32 },
}

impl Display for MatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchField::InPort(port) => write!(f, "in_port={port}"),
            MatchField::EthDst(mac) => write!(f, "eth_dst={mac}"),
            MatchField::EthType(t) => write!(f, "eth_type={t:#06x}"),
            MatchField::VlanId(vid) => write!(f, "vlan_id={vid}"),
            MatchField::MplsLabel(label) => write!(f, "mpls_label={label}"),
            MatchField::TunnelId(vni) => write!(f, "tunnel_id={vni}"),
            MatchField::IpSrc(net) => write!(f, "ip_src={net}"),
            MatchField::IpDst(net) => write!(f, "ip_dst={net}"),
            MatchField::IpProto(proto) => write!(f, "ip_proto={proto}"),
            MatchField::L4SrcPort(port) => write!(f, "l4_src={port}"),
            MatchField::L4DstPort(port) => write!(f, "l4_dst={port}"),
            MatchField::HashBucket { modulus, low, high } => {
                write!(f, "hash%{modulus}={low}..={high}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputPort {
    Port(u32),
    /// Whatever the device does with traffic outside the pipeline
    Normal,
    InPort,
}

impl Display for OutputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputPort::Port(port) => write!(f, "{port}"),
            OutputPort::Normal => write!(f, "normal"),
            OutputPort::InPort => write!(f, "in_port"),
        }
    }
}

/// An action. Actions of a rule are applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowAction {
    SetEthDst(Mac),
    SetEthSrc(Mac),
    PushVlan,
    SetVlanId(u16),
    PopVlan,
    PushMpls(u32),
    PopMpls,
    SetTunnelDst(IpAddr),
    SetTunnelId(u32),
    SetMetadata(u64),
    Group(GroupId),
    Output(OutputPort),
    GotoTable(u8),
    Drop,
}

impl Display for FlowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowAction::SetEthDst(mac) => write!(f, "set_eth_dst:{mac}"),
            FlowAction::SetEthSrc(mac) => write!(f, "set_eth_src:{mac}"),
            FlowAction::PushVlan => write!(f, "push_vlan"),
            FlowAction::SetVlanId(vid) => write!(f, "set_vlan_id:{vid}"),
            FlowAction::PopVlan => write!(f, "pop_vlan"),
            FlowAction::PushMpls(label) => write!(f, "push_mpls:{label}"),
            FlowAction::PopMpls => write!(f, "pop_mpls"),
            FlowAction::SetTunnelDst(ip) => write!(f, "set_tunnel_dst:{ip}"),
            FlowAction::SetTunnelId(vni) => write!(f, "set_tunnel_id:{vni}"),
            FlowAction::SetMetadata(value) => write!(f, "set_metadata:{value:#x}"),
            FlowAction::Group(id) => write!(f, "group:{id}"),
            FlowAction::Output(port) => write!(f, "output:{port}"),
            FlowAction::GotoTable(table) => write!(f, "goto_table:{table}"),
            FlowAction::Drop => write!(f, "drop"),
        }
    }
}

/// Identity of a rule on a forwarder. Inserting a rule with the key of an installed one
/// replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub forwarder: String,
    pub table: u8,
    pub priority: u16,
    pub matches: Vec<MatchField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRule {
    /// forwarder the rule is installed on
    pub forwarder: String,
    pub role: TableRole,
    /// physical table index
    pub table: u8,
    pub priority: u16,
    pub matches: Vec<MatchField>,
    pub actions: Vec<FlowAction>,
    pub cookie: Cookie,
}

impl FlowRule {
    /// A rule with no match and no action, in the table of `role` shifted by `offset`, with the
    /// role's priority.
    #[must_use]
    pub fn new(forwarder: &str, role: TableRole, offset: u8, cookie: Cookie) -> Self {
        Self {
            forwarder: forwarder.to_owned(),
            role,
            table: role.index(offset),
            priority: role.priority(),
            matches: Vec::new(),
            actions: Vec::new(),
            cookie,
        }
    }
    #[must_use]
    pub fn matching(mut self, field: MatchField) -> Self {
        self.matches.push(field);
        self
    }
    #[must_use]
    pub fn matching_all(mut self, fields: impl IntoIterator<Item = MatchField>) -> Self {
        self.matches.extend(fields);
        self
    }
    #[must_use]
    pub fn then(mut self, action: FlowAction) -> Self {
        self.actions.push(action);
        self
    }
    #[must_use]
    pub fn then_all(mut self, actions: impl IntoIterator<Item = FlowAction>) -> Self {
        self.actions.extend(actions);
        self
    }
    #[must_use]
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }
    #[must_use]
    pub fn key(&self) -> RuleKey {
        RuleKey {
            forwarder: self.forwarder.clone(),
            table: self.table,
            priority: self.priority,
            matches: self.matches.clone(),
        }
    }
    #[must_use]
    pub fn path_id(&self) -> PathId {
        self.cookie.path_id()
    }
}

impl Display for FlowRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let matches: Vec<String> = self.matches.iter().map(ToString::to_string).collect();
        let actions: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{} table={} ({}) prio={} cookie={} match[{}] actions[{}]",
            self.forwarder,
            self.table,
            self.role,
            self.priority,
            self.cookie,
            matches.join(","),
            actions.join(",")
        )
    }
}
