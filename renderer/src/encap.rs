// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-transport match fields and actions

use flow::{FlowAction, MatchField};
use model::Transport;

/// Fields identifying traffic that arrives with this transport
pub(crate) fn ingress_matches(transport: &Transport) -> Vec<MatchField> {
    match transport {
        Transport::Vlan { vlan_id } => vec![MatchField::VlanId(*vlan_id)],
        Transport::Mpls { label } => vec![MatchField::MplsLabel(*label)],
        Transport::VxlanGpe { vni, .. } => vec![MatchField::TunnelId(*vni)],
        Transport::Ethernet { .. } | Transport::Logical { .. } => vec![],
    }
}

/// Actions removing the encapsulation of this transport
pub(crate) fn decap_actions(transport: &Transport) -> Vec<FlowAction> {
    match transport {
        Transport::Vlan { .. } => vec![FlowAction::PopVlan],
        Transport::Mpls { .. } => vec![FlowAction::PopMpls],
        // the tunnel port terminates the tunnel
        Transport::VxlanGpe { .. } | Transport::Ethernet { .. } | Transport::Logical { .. } => {
            vec![]
        }
    }
}

/// Actions adding the encapsulation of this transport
pub(crate) fn encap_actions(transport: &Transport) -> Vec<FlowAction> {
    match transport {
        Transport::Vlan { vlan_id } => vec![FlowAction::PushVlan, FlowAction::SetVlanId(*vlan_id)],
        Transport::Mpls { label } => vec![FlowAction::PushMpls(*label)],
        Transport::VxlanGpe { remote, vni } => vec![
            FlowAction::SetTunnelDst(*remote),
            FlowAction::SetTunnelId(*vni),
        ],
        Transport::Ethernet { .. } | Transport::Logical { .. } => vec![],
    }
}
