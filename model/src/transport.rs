// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Objects to model data-plane locators and the transports they use

use crate::mac::Mac;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::IpAddr;

/// The kind of transport of a [`DataPlaneLocator`], without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    Ethernet,
    Vlan,
    VxlanGpe,
    Mpls,
    Logical,
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportKind::Ethernet => "ethernet",
            TransportKind::Vlan => "vlan",
            TransportKind::VxlanGpe => "vxlan-gpe",
            TransportKind::Mpls => "mpls",
            TransportKind::Logical => "logical",
        };
        write!(f, "{name}")
    }
}

/// A transport and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Transport {
    /// Plain ethernet. The optional mac is the address of the peer on the link.
    Ethernet { mac: Option<Mac> },
    Vlan { vlan_id: u16 },
    VxlanGpe { remote: IpAddr, vni: u32 },
    Mpls { label: u32 },
    /// A logical interface of the device, with no encapsulation of its own.
    Logical { interface: String },
}

impl Transport {
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Ethernet { .. } => TransportKind::Ethernet,
            Transport::Vlan { .. } => TransportKind::Vlan,
            Transport::VxlanGpe { .. } => TransportKind::VxlanGpe,
            Transport::Mpls { .. } => TransportKind::Mpls,
            Transport::Logical { .. } => TransportKind::Logical,
        }
    }
}

/// A transport endpoint of a forwarder, attached to one of its ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPlaneLocator {
    pub name: String,
    pub port: u32,
    pub transport: Transport,
}

impl DataPlaneLocator {
    #[must_use]
    pub fn new(name: &str, port: u32, transport: Transport) -> Self {
        Self {
            name: name.to_owned(),
            port,
            transport,
        }
    }
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }
}

impl Display for DataPlaneLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (port {}, {})", self.name, self.port, self.kind())
    }
}
