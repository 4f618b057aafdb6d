// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Compilation of a path into the rules of the forwarder pipelines

use crate::compiled::{CompiledPath, RuleSet};
use crate::encap::{decap_actions, encap_actions, ingress_matches};
use crate::errors::{HopFault, RenderError};
use chainid::{AddressLayout, ChainFlags, ChainId, VirtualAddress};
use flow::{
    Cookie, Direction, FlowAction, FlowGroup, FlowRule, GroupId, MatchField, OutputPort,
    TableRole,
};
use model::{
    DataPlaneLocator, GroupMember, HopTarget, Mac, PathHop, PathSnapshot, RenderedPath,
    ServiceFunctionForwarder, ServiceFunctionGroup, TrafficSelector,
};
use topology::TopologyGraph;
#[allow(unused)]
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerSettings {
    /// Balance group hops with weighted plane groups. If false, members get hash ranges in the
    /// path mapper acl table instead.
    pub weighted_groups: bool,
    /// Table offset of forwarders that do not declare one
    pub default_table_offset: u8,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            weighted_groups: true,
            default_table_offset: 0,
        }
    }
}

fn selector_match(selector: &TrafficSelector) -> MatchField {
    match selector {
        TrafficSelector::EthType(t) => MatchField::EthType(*t),
        TrafficSelector::IpSrc(net) => MatchField::IpSrc(*net),
        TrafficSelector::IpDst(net) => MatchField::IpDst(*net),
        TrafficSelector::IpProto(proto) => MatchField::IpProto(*proto),
        TrafficSelector::L4SrcPort(port) => MatchField::L4SrcPort(*port),
        TrafficSelector::L4DstPort(port) => MatchField::L4DstPort(*port),
    }
}

/// Actions sending traffic out of `locator`
fn deliver(locator: &DataPlaneLocator) -> Vec<FlowAction> {
    let mut actions = encap_actions(&locator.transport);
    actions.push(FlowAction::Output(OutputPort::Port(locator.port)));
    actions
}

enum Target<'a> {
    Function(&'a DataPlaneLocator),
    Group {
        group: &'a ServiceFunctionGroup,
        members: Vec<(&'a GroupMember, &'a DataPlaneLocator)>,
    },
}

impl<'a> Target<'a> {
    /// Locators traffic comes back from, without duplicates
    fn return_locators(&self) -> Vec<&'a DataPlaneLocator> {
        match self {
            Target::Function(locator) => vec![*locator],
            Target::Group { members, .. } => {
                let mut locators: Vec<&'a DataPlaneLocator> = Vec::with_capacity(members.len());
                for (_, locator) in members {
                    if !locators.iter().any(|l| l.name == locator.name) {
                        locators.push(*locator);
                    }
                }
                locators
            }
        }
    }
}

struct ResolvedHop<'a> {
    number: u8,
    forwarder: &'a ServiceFunctionForwarder,
    offset: u8,
    target: Target<'a>,
}

impl ResolvedHop<'_> {
    fn name(&self) -> &str {
        &self.forwarder.name
    }
}

/// Turns paths into [`CompiledPath`]s.
///
/// Every hop gets a path mapper rule sending traffic to its function (or group) and next hop
/// rules for traffic coming back. Hops whose successor sits on another forwarder also get
/// transport egress rules, and transport ingress rules on the receiving end. The first hop gets
/// the classifier rule, if the path is attached to one, and the last hop sends traffic out of the
/// chain.
///
/// Compilation is all or nothing: any hop that cannot be resolved fails the whole path.
#[derive(Debug, Clone)]
pub struct PipelineCompiler {
    layout: AddressLayout,
    settings: CompilerSettings,
}

impl PipelineCompiler {
    #[must_use]
    pub fn new(layout: AddressLayout, settings: CompilerSettings) -> Self {
        Self { layout, settings }
    }
    #[must_use]
    pub fn layout(&self) -> &AddressLayout {
        &self.layout
    }
    #[must_use]
    pub fn settings(&self) -> CompilerSettings {
        self.settings
    }

    /// Compile `snapshot.path` with chain identifier `chain_id`. `topology` is only consulted
    /// for forwarders that are not bound to each other directly.
    pub fn compile(
        &self,
        snapshot: &PathSnapshot,
        chain_id: ChainId,
        topology: &TopologyGraph,
    ) -> Result<CompiledPath, RenderError> {
        let path = &snapshot.path;
        snapshot.validate()?;
        let max = self.layout.end_of_chain_index();
        let hops = u32::try_from(path.hops.len()).unwrap_or(u32::MAX);
        if hops > max {
            return Err(RenderError::TooManyHops {
                path_id: path.path_id,
                hops: path.hops.len(),
                max,
            });
        }

        let address = self.address(path, ChainFlags::FORWARD, chain_id)?;
        let forward =
            self.compile_direction(snapshot, path, Direction::Forward, address, topology)?;
        let reverse = if path.symmetric {
            let reversed = path.reversed();
            let address = self.address(&reversed, ChainFlags::REVERSE, chain_id)?;
            Some(self.compile_direction(
                snapshot,
                &reversed,
                Direction::Reverse,
                address,
                topology,
            )?)
        } else {
            None
        };

        let compiled = CompiledPath {
            path_id: path.path_id,
            chain_id,
            forward,
            reverse,
        };
        info!(
            "Compiled {path} with chain id {chain_id}: {} rules, {} groups",
            compiled.rule_count(),
            compiled.group_count()
        );
        Ok(compiled)
    }

    // the port field carries the port traffic leaves the chain through
    fn address(
        &self,
        path: &RenderedPath,
        flags: ChainFlags,
        chain_id: ChainId,
    ) -> Result<VirtualAddress, RenderError> {
        let port = path.egress.map_or(0, |e| e.port);
        Ok(self.layout.encode(flags, port, chain_id)?)
    }

    fn compile_direction(
        &self,
        snapshot: &PathSnapshot,
        path: &RenderedPath,
        direction: Direction,
        address: VirtualAddress,
        topology: &TopologyGraph,
    ) -> Result<RuleSet, RenderError> {
        let emitter = Emitter {
            settings: self.settings,
            snapshot,
            path,
            direction,
            address,
            topology,
            rules: Vec::new(),
            groups: Vec::new(),
        };
        let set = emitter.run()?;
        debug!(
            "Path {} {direction}: {} rules on {:?}",
            path.path_id,
            set.rules.len(),
            set.forwarders()
        );
        Ok(set)
    }
}

/// Rules of one direction of a path, accumulated hop after hop
struct Emitter<'a> {
    settings: CompilerSettings,
    snapshot: &'a PathSnapshot,
    path: &'a RenderedPath,
    direction: Direction,
    address: VirtualAddress,
    topology: &'a TopologyGraph,
    rules: Vec<FlowRule>,
    groups: Vec<FlowGroup>,
}

impl<'a> Emitter<'a> {
    fn run(mut self) -> Result<RuleSet, RenderError> {
        let hops = self.resolve()?;
        if let Some(first) = hops.first() {
            self.emit_entry(first)?;
        }
        for (position, hop) in hops.iter().enumerate() {
            let next = hops.get(position + 1);
            self.emit_mapper(hop)?;
            self.emit_next_hop(hop, next)?;
            match next {
                Some(next) if next.name() != hop.name() => self.emit_link(hop, next)?,
                Some(_) => {}
                None => self.emit_exit(hop),
            }
        }
        Ok(RuleSet {
            direction: self.direction,
            address: self.address,
            rules: self.rules,
            groups: self.groups,
        })
    }

    fn unresolved(&self, hop: u8, cause: HopFault) -> RenderError {
        RenderError::UnresolvedHop {
            hop,
            direction: self.direction,
            cause,
        }
    }

    fn offset(&self, forwarder: &ServiceFunctionForwarder) -> u8 {
        forwarder
            .table_offset
            .unwrap_or(self.settings.default_table_offset)
    }

    fn cookie(&self, role: TableRole, hop: u8) -> Cookie {
        Cookie::new(self.path.path_id, self.direction, role, u16::from(hop))
    }

    fn rule(&self, forwarder: &str, role: TableRole, offset: u8, hop: u8) -> FlowRule {
        FlowRule::new(forwarder, role, offset, self.cookie(role, hop))
    }

    fn hop_address(&self, hop: u8) -> Result<Mac, RenderError> {
        Ok(self.address.hop_address(u32::from(hop))?)
    }

    /// Resolve every hop before emitting anything. All faults are logged, the first one is
    /// returned.
    fn resolve(&self) -> Result<Vec<ResolvedHop<'a>>, RenderError> {
        let path: &'a RenderedPath = self.path;
        let mut resolved = Vec::with_capacity(path.hops.len());
        let mut faults = Vec::new();
        for hop in &path.hops {
            match self.resolve_hop(hop) {
                Ok(r) => resolved.push(r),
                Err(cause) => {
                    warn!(
                        "Path {} {}: hop {} ({} on {}): {cause}",
                        path.path_id, self.direction, hop.hop_number, hop.target, hop.forwarder
                    );
                    faults.push((hop.hop_number, cause));
                }
            }
        }
        if let Some((hop, cause)) = faults.into_iter().next() {
            return Err(self.unresolved(hop, cause));
        }
        Ok(resolved)
    }

    fn resolve_hop(&self, hop: &PathHop) -> Result<ResolvedHop<'a>, HopFault> {
        let snapshot: &'a PathSnapshot = self.snapshot;
        let forwarder = snapshot
            .forwarders
            .get(&hop.forwarder)
            .ok_or_else(|| HopFault::UnknownForwarder(hop.forwarder.clone()))?;
        if !forwarder.has_transport(self.path.transport) {
            return Err(HopFault::NoTransport {
                forwarder: forwarder.name.clone(),
                transport: self.path.transport,
            });
        }
        let target = match &hop.target {
            HopTarget::Function(function) => {
                Target::Function(function_locator(snapshot, forwarder, function)?)
            }
            HopTarget::Group(name) => {
                let group = snapshot
                    .groups
                    .get(name)
                    .ok_or_else(|| HopFault::UnknownGroup(name.clone()))?;
                group.validate().map_err(HopFault::InvalidGroup)?;
                let members = group
                    .members
                    .iter()
                    .map(|m| function_locator(snapshot, forwarder, &m.function).map(|l| (m, l)))
                    .collect::<Result<Vec<_>, HopFault>>()?;
                Target::Group { group, members }
            }
        };
        Ok(ResolvedHop {
            number: hop.hop_number,
            forwarder,
            offset: self.offset(forwarder),
            target,
        })
    }

    /// Classifier and transport ingress rules letting traffic into the chain at its first hop
    fn emit_entry(&mut self, first: &ResolvedHop<'_>) -> Result<(), RenderError> {
        let address = self.hop_address(first.number)?;
        if let Some(classifier) = &self.path.classifier {
            let rule = self
                .rule(first.name(), TableRole::Classifier, first.offset, first.number)
                .matching(MatchField::InPort(classifier.port))
                .matching_all(classifier.selectors.iter().map(selector_match))
                .then(FlowAction::SetEthDst(address))
                .then(FlowAction::SetMetadata(u64::from(self.path.path_id.0)))
                .then(FlowAction::GotoTable(
                    TableRole::TransportIngress.index(first.offset),
                ));
            self.rules.push(rule);
        }
        let entry = self
            .rule(first.name(), TableRole::TransportIngress, first.offset, first.number)
            .matching(MatchField::EthDst(address))
            .then(FlowAction::GotoTable(TableRole::PathMapper.index(first.offset)));
        self.rules.push(entry);
        Ok(())
    }

    fn emit_mapper(&mut self, hop: &ResolvedHop<'_>) -> Result<(), RenderError> {
        let address = self.hop_address(hop.number)?;
        let mapper = self
            .rule(hop.name(), TableRole::PathMapper, hop.offset, hop.number)
            .matching(MatchField::EthDst(address));
        match &hop.target {
            Target::Function(locator) => self.rules.push(mapper.then_all(deliver(locator))),
            Target::Group { members, .. } if self.settings.weighted_groups => {
                let id = GroupId::new(self.path.path_id, self.direction, u16::from(hop.number));
                let cookie = self.cookie(TableRole::PathMapper, hop.number);
                let group = members.iter().fold(
                    FlowGroup::new(hop.name(), id, cookie),
                    |group, (member, locator)| group.with_bucket(member.weight, deliver(locator)),
                );
                self.groups.push(group);
                self.rules.push(mapper.then(FlowAction::Group(id)));
            }
            Target::Group { group, members } => {
                let acl = TableRole::PathMapperAcl.index(hop.offset);
                self.rules.push(mapper.then(FlowAction::GotoTable(acl)));
                let modulus = group.total_weight();
                let mut low = 0;
                for (member, locator) in members {
                    let high = low + u32::from(member.weight) - 1;
                    let rule = self
                        .rule(hop.name(), TableRole::PathMapperAcl, hop.offset, hop.number)
                        .matching(MatchField::EthDst(address))
                        .matching(MatchField::HashBucket { modulus, low, high })
                        .then_all(deliver(locator));
                    self.rules.push(rule);
                    low = high + 1;
                }
            }
        }
        Ok(())
    }

    /// Traffic coming back from the function of `hop` is readdressed to the next hop, or to the
    /// end of the chain.
    fn emit_next_hop(
        &mut self,
        hop: &ResolvedHop<'_>,
        next: Option<&ResolvedHop<'_>>,
    ) -> Result<(), RenderError> {
        let address = self.hop_address(hop.number)?;
        let (rewrite, table) = match next {
            Some(next) if next.name() == hop.name() => (
                self.hop_address(next.number)?,
                TableRole::PathMapper.index(hop.offset),
            ),
            Some(next) => (
                self.hop_address(next.number)?,
                TableRole::TransportEgress.index(hop.offset),
            ),
            None => (
                self.address.end_of_chain(),
                TableRole::TransportEgress.index(hop.offset),
            ),
        };
        for locator in hop.target.return_locators() {
            let rule = self
                .rule(hop.name(), TableRole::NextHop, hop.offset, hop.number)
                .matching(MatchField::InPort(locator.port))
                .matching_all(ingress_matches(&locator.transport))
                .matching(MatchField::EthDst(address))
                .then_all(decap_actions(&locator.transport))
                .then(FlowAction::SetEthDst(rewrite))
                .then(FlowAction::GotoTable(table));
            self.rules.push(rule);
        }
        Ok(())
    }

    /// The forwarders traffic crosses from `hop` to `next`, both included
    fn route(
        &self,
        hop: &ResolvedHop<'_>,
        next: &ResolvedHop<'_>,
    ) -> Result<Vec<String>, RenderError> {
        let transport = self.path.transport;
        let bound = hop
            .forwarder
            .neighbor_locator(next.name())
            .is_some_and(|l| l.kind() == transport);
        if bound {
            return Ok(vec![hop.name().to_owned(), next.name().to_owned()]);
        }
        let Some(route) = self.topology.shortest_path(hop.name(), next.name()) else {
            return Err(self.unresolved(
                hop.number,
                HopFault::NoRoute {
                    from: hop.name().to_owned(),
                    to: next.name().to_owned(),
                },
            ));
        };
        debug!(
            "{} is not bound to {}, going through {route}",
            hop.name(),
            next.name()
        );
        Ok(route.nodes().iter().map(|n| n.name.clone()).collect())
    }

    fn transit(&self, hop: u8, name: &str) -> Result<&'a ServiceFunctionForwarder, RenderError> {
        let snapshot: &'a PathSnapshot = self.snapshot;
        snapshot
            .forwarders
            .get(name)
            .ok_or_else(|| self.unresolved(hop, HopFault::UnknownForwarder(name.to_owned())))
    }

    /// Transport egress and ingress rules on every link from `hop` to `next`
    fn emit_link(
        &mut self,
        hop: &ResolvedHop<'a>,
        next: &ResolvedHop<'a>,
    ) -> Result<(), RenderError> {
        let transport = self.path.transport;
        let address = self.hop_address(next.number)?;
        let route = self.route(hop, next)?;
        let links = route.len().saturating_sub(1);
        for (k, pair) in route.windows(2).enumerate() {
            let [sender_name, receiver_name] = pair else {
                continue;
            };
            let sender = if k == 0 {
                hop.forwarder
            } else {
                self.transit(hop.number, sender_name)?
            };
            let last = k + 1 == links;
            let receiver = if last {
                next.forwarder
            } else {
                self.transit(hop.number, receiver_name)?
            };
            let locator = sender
                .neighbor_locator(receiver_name)
                .filter(|l| l.kind() == transport)
                .ok_or_else(|| {
                    self.unresolved(
                        hop.number,
                        HopFault::NoNeighborLocator {
                            from: sender_name.clone(),
                            to: receiver_name.clone(),
                            transport,
                        },
                    )
                })?;

            let egress = self
                .rule(
                    sender_name,
                    TableRole::TransportEgress,
                    self.offset(sender),
                    next.number,
                )
                .matching(MatchField::EthDst(address))
                .then_all(deliver(locator));
            self.rules.push(egress);

            let receiver_offset = self.offset(receiver);
            let continuation = if last {
                TableRole::PathMapper
            } else {
                TableRole::TransportEgress
            };
            let ingress = self
                .rule(
                    receiver_name,
                    TableRole::TransportIngress,
                    receiver_offset,
                    next.number,
                )
                .matching_all(
                    receiver
                        .neighbor_locator(sender_name)
                        .map(|l| MatchField::InPort(l.port)),
                )
                .matching_all(ingress_matches(&locator.transport))
                .matching(MatchField::EthDst(address))
                .then_all(decap_actions(&locator.transport))
                .then(FlowAction::GotoTable(continuation.index(receiver_offset)));
            self.rules.push(ingress);
        }
        Ok(())
    }

    /// Traffic at the end of the chain leaves through the egress port, if any
    fn emit_exit(&mut self, last: &ResolvedHop<'_>) {
        let port = self
            .path
            .egress
            .map_or(OutputPort::Normal, |e| OutputPort::Port(e.port));
        let rule = self
            .rule(last.name(), TableRole::TransportEgress, last.offset, last.number)
            .matching(MatchField::EthDst(self.address.end_of_chain()))
            .then(FlowAction::Output(port));
        self.rules.push(rule);
    }
}

fn function_locator<'a>(
    snapshot: &PathSnapshot,
    forwarder: &'a ServiceFunctionForwarder,
    function: &str,
) -> Result<&'a DataPlaneLocator, HopFault> {
    if !snapshot.functions.contains(function) {
        return Err(HopFault::UnknownFunction(function.to_owned()));
    }
    forwarder
        .function_locator(function)
        .ok_or_else(|| HopFault::NoFunctionLocator {
            forwarder: forwarder.name.clone(),
            function: function.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fabric, chain_fabric, four_hop_path};
    use model::{ClassifierAttachment, ModelError, PathId, TransportKind};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn compiler() -> PipelineCompiler {
        PipelineCompiler::new(AddressLayout::default(), CompilerSettings::default())
    }

    fn mac(last: u8) -> Mac {
        Mac([0x02, 0x53, 0x46, 0x09, 0x00, last])
    }

    fn forwarders_of<'r>(set: &'r RuleSet, role: TableRole) -> Vec<&'r str> {
        set.rules_in(role).map(|r| r.forwarder.as_str()).collect()
    }

    #[test]
    fn two_forwarder_path() {
        let fabric = Fabric::new(TransportKind::Vlan)
            .function("sff1", "fw")
            .function("sff2", "nat")
            .link("sff1", "sff2");
        let path = RenderedPath::new(PathId(5), "p5", TransportKind::Vlan)
            .hop("sff1", "fw")
            .hop("sff2", "nat")
            .with_classifier(ClassifierAttachment {
                port: 7,
                selectors: vec![TrafficSelector::IpProto(6)],
            })
            .with_egress(9);
        let compiled = compiler()
            .compile(&fabric.snapshot(path), ChainId(3), &TopologyGraph::new())
            .unwrap();
        assert_eq!(compiled.chain_id, ChainId(3));
        assert!(compiled.reverse.is_none());
        assert!(compiled.forward.groups.is_empty());

        let fwd = Direction::Forward;
        let rule = |forwarder: &str, role: TableRole, hop: u8| {
            FlowRule::new(forwarder, role, 0, Cookie::new(PathId(5), fwd, role, u16::from(hop)))
        };
        let expected = vec![
            rule("sff1", TableRole::Classifier, 0)
                .matching(MatchField::InPort(7))
                .matching(MatchField::IpProto(6))
                .then(FlowAction::SetEthDst(mac(0xc0)))
                .then(FlowAction::SetMetadata(5))
                .then(FlowAction::GotoTable(1)),
            rule("sff1", TableRole::TransportIngress, 0)
                .matching(MatchField::EthDst(mac(0xc0)))
                .then(FlowAction::GotoTable(2)),
            rule("sff1", TableRole::PathMapper, 0)
                .matching(MatchField::EthDst(mac(0xc0)))
                .then(FlowAction::Output(OutputPort::Port(1))),
            rule("sff1", TableRole::NextHop, 0)
                .matching(MatchField::InPort(1))
                .matching(MatchField::EthDst(mac(0xc0)))
                .then(FlowAction::SetEthDst(mac(0xc1)))
                .then(FlowAction::GotoTable(10)),
            rule("sff1", TableRole::TransportEgress, 1)
                .matching(MatchField::EthDst(mac(0xc1)))
                .then(FlowAction::PushVlan)
                .then(FlowAction::SetVlanId(103))
                .then(FlowAction::Output(OutputPort::Port(3))),
            rule("sff2", TableRole::TransportIngress, 1)
                .matching(MatchField::InPort(4))
                .matching(MatchField::VlanId(103))
                .matching(MatchField::EthDst(mac(0xc1)))
                .then(FlowAction::PopVlan)
                .then(FlowAction::GotoTable(2)),
            rule("sff2", TableRole::PathMapper, 1)
                .matching(MatchField::EthDst(mac(0xc1)))
                .then(FlowAction::Output(OutputPort::Port(2))),
            rule("sff2", TableRole::NextHop, 1)
                .matching(MatchField::InPort(2))
                .matching(MatchField::EthDst(mac(0xc1)))
                .then(FlowAction::SetEthDst(mac(0xff)))
                .then(FlowAction::GotoTable(10)),
            rule("sff2", TableRole::TransportEgress, 1)
                .matching(MatchField::EthDst(mac(0xff)))
                .then(FlowAction::Output(OutputPort::Port(9))),
        ];
        assert_eq!(compiled.forward.rules, expected);
    }

    #[test]
    fn hops_on_the_same_forwarder_skip_transport() {
        let fabric = chain_fabric(TransportKind::Mpls);
        let compiled = compiler()
            .compile(
                &fabric.snapshot(four_hop_path(1, TransportKind::Mpls)),
                ChainId(3),
                &TopologyGraph::new(),
            )
            .unwrap();
        let set = &compiled.forward;
        let first = set.rules_in(TableRole::NextHop).next().unwrap();
        assert_eq!(first.forwarder, "sff1");
        assert_eq!(
            first.actions,
            vec![
                FlowAction::SetEthDst(mac(0xc1)),
                FlowAction::GotoTable(TableRole::PathMapper.index(0))
            ]
        );
        assert_eq!(forwarders_of(set, TableRole::Classifier), vec!["sff1"]);
        assert_eq!(
            forwarders_of(set, TableRole::PathMapper),
            vec!["sff1", "sff1", "sff2", "sff3"]
        );
        // entry on sff1, then one per link
        assert_eq!(
            forwarders_of(set, TableRole::TransportIngress),
            vec!["sff1", "sff2", "sff3"]
        );
        assert_eq!(
            forwarders_of(set, TableRole::TransportEgress),
            vec!["sff1", "sff2", "sff3"]
        );
        let mpls = set
            .rules_in(TableRole::TransportEgress)
            .next()
            .map(|r| r.actions.first().cloned());
        assert!(matches!(mpls, Some(Some(FlowAction::PushMpls(_)))));
    }

    #[test]
    #[traced_test]
    fn unresolved_hop_yields_no_rules() {
        let fabric = chain_fabric(TransportKind::Vlan);
        let path = RenderedPath::new(PathId(4), "p4", TransportKind::Vlan)
            .hop("sff1", "fw")
            .hop("sff1", "dpi")
            .hop("sff9", "nat")
            .hop("sff3", "ids");
        let result = compiler().compile(&fabric.snapshot(path), ChainId(1), &fabric.topology());
        assert_eq!(
            result,
            Err(RenderError::UnresolvedHop {
                hop: 2,
                direction: Direction::Forward,
                cause: HopFault::UnknownForwarder("sff9".to_string()),
            })
        );
        assert!(logs_contain("unknown forwarder sff9"));
    }

    #[test]
    fn first_fault_is_reported() {
        let fabric = chain_fabric(TransportKind::Vlan).detached_function("lb");
        let path = RenderedPath::new(PathId(4), "p4", TransportKind::Vlan)
            .hop("sff1", "fw")
            .hop("sff1", "lb")
            .hop("sff2", "nope");
        let result = compiler().compile(&fabric.snapshot(path), ChainId(1), &fabric.topology());
        assert_eq!(
            result,
            Err(RenderError::UnresolvedHop {
                hop: 1,
                direction: Direction::Forward,
                cause: HopFault::NoFunctionLocator {
                    forwarder: "sff1".to_string(),
                    function: "lb".to_string()
                },
            })
        );
    }

    #[test]
    fn forwarder_without_the_transport() {
        let fabric = Fabric::new(TransportKind::Vlan).function("sff1", "fw");
        let path = RenderedPath::new(PathId(2), "p2", TransportKind::Vlan).hop("sff1", "fw");
        let result = compiler().compile(&fabric.snapshot(path), ChainId(1), &fabric.topology());
        assert!(matches!(
            result,
            Err(RenderError::UnresolvedHop {
                hop: 0,
                cause: HopFault::NoTransport { .. },
                ..
            })
        ));
    }

    #[test]
    fn symmetric_paths_share_the_chain_id() {
        let fabric = chain_fabric(TransportKind::VxlanGpe);
        let path = four_hop_path(8, TransportKind::VxlanGpe)
            .symmetric(true)
            .with_reverse_classifier(ClassifierAttachment {
                port: 2,
                selectors: vec![],
            })
            .with_reverse_egress(4);
        let compiled = compiler()
            .compile(&fabric.snapshot(path), ChainId(12), &fabric.topology())
            .unwrap();
        let reverse = compiled.reverse.as_ref().unwrap();
        assert_eq!(compiled.forward.address.chain_id(), ChainId(12));
        assert_eq!(reverse.address.chain_id(), ChainId(12));
        assert!(!compiled.forward.address.flags().is_reverse());
        assert!(reverse.address.flags().is_reverse());
        assert_ne!(compiled.forward.address.base(), reverse.address.base());
        assert_eq!(reverse.address.port(), 4);

        assert_eq!(
            forwarders_of(reverse, TableRole::PathMapper),
            vec!["sff3", "sff2", "sff1", "sff1"]
        );
        assert_eq!(forwarders_of(reverse, TableRole::Classifier), vec!["sff3"]);
        assert!(
            reverse
                .rules
                .iter()
                .all(|r| r.cookie.direction() == Direction::Reverse)
        );
        let batch = compiled.clone().into_batch();
        assert_eq!(
            batch.rules.len(),
            compiled.forward.rules.len() + reverse.rules.len()
        );
    }

    #[test]
    fn weighted_group_hop() {
        let fabric = Fabric::new(TransportKind::Vlan)
            .function("sff1", "fw1")
            .function("sff1", "fw2")
            .function("sff2", "nat")
            .link("sff1", "sff2")
            .group("fws", &[("fw1", 3), ("fw2", 1)]);
        let path = RenderedPath::new(PathId(6), "p6", TransportKind::Vlan)
            .group_hop("sff1", "fws")
            .hop("sff2", "nat");
        let compiled = compiler()
            .compile(&fabric.snapshot(path), ChainId(3), &fabric.topology())
            .unwrap();
        let set = &compiled.forward;
        let id = GroupId::new(PathId(6), Direction::Forward, 0);
        assert_eq!(set.groups.len(), 1);
        let group = &set.groups[0];
        assert_eq!(group.group_id, id);
        let weights: Vec<u16> = group.buckets.iter().map(|b| b.weight).collect();
        assert_eq!(weights, vec![3, 1]);
        let mapper = set.rules_in(TableRole::PathMapper).next().unwrap();
        assert_eq!(mapper.actions, vec![FlowAction::Group(id)]);
        // one return rule per member
        assert_eq!(
            set.rules_in(TableRole::NextHop)
                .filter(|r| r.forwarder == "sff1")
                .count(),
            2
        );
        assert_eq!(set.rules_in(TableRole::PathMapperAcl).count(), 0);
    }

    #[test]
    fn group_hop_without_weighted_groups() {
        let fabric = Fabric::new(TransportKind::Vlan)
            .function("sff1", "fw1")
            .function("sff1", "fw2")
            .link("sff1", "sff2")
            .group("fws", &[("fw1", 3), ("fw2", 1)]);
        let path = RenderedPath::new(PathId(6), "p6", TransportKind::Vlan).group_hop("sff1", "fws");
        let settings = CompilerSettings {
            weighted_groups: false,
            ..CompilerSettings::default()
        };
        let compiled = PipelineCompiler::new(AddressLayout::default(), settings)
            .compile(&fabric.snapshot(path), ChainId(3), &fabric.topology())
            .unwrap();
        let set = &compiled.forward;
        assert!(set.groups.is_empty());
        let mapper = set.rules_in(TableRole::PathMapper).next().unwrap();
        assert_eq!(mapper.actions, vec![FlowAction::GotoTable(3)]);
        let buckets: Vec<(MatchField, Vec<FlowAction>)> = set
            .rules_in(TableRole::PathMapperAcl)
            .map(|r| (r.matches[1].clone(), r.actions.clone()))
            .collect();
        assert_eq!(
            buckets,
            vec![
                (
                    MatchField::HashBucket {
                        modulus: 4,
                        low: 0,
                        high: 2
                    },
                    vec![FlowAction::Output(OutputPort::Port(1))]
                ),
                (
                    MatchField::HashBucket {
                        modulus: 4,
                        low: 3,
                        high: 3
                    },
                    vec![FlowAction::Output(OutputPort::Port(2))]
                ),
            ]
        );
    }

    #[test]
    fn empty_or_unknown_group() {
        let fabric = Fabric::new(TransportKind::Vlan)
            .function("sff1", "fw1")
            .link("sff1", "sff2")
            .group("empty", &[]);
        let compile = |group: &str| {
            let path =
                RenderedPath::new(PathId(6), "p6", TransportKind::Vlan).group_hop("sff1", group);
            compiler().compile(&fabric.snapshot(path), ChainId(3), &fabric.topology())
        };
        assert_eq!(
            compile("empty"),
            Err(RenderError::UnresolvedHop {
                hop: 0,
                direction: Direction::Forward,
                cause: HopFault::InvalidGroup(ModelError::EmptyGroup("empty".to_string())),
            })
        );
        assert!(matches!(
            compile("missing"),
            Err(RenderError::UnresolvedHop {
                cause: HopFault::UnknownGroup(_),
                ..
            })
        ));
    }

    #[test]
    fn unbound_forwarders_route_through_the_topology() {
        let fabric = Fabric::new(TransportKind::Vlan)
            .function("sff1", "fw")
            .function("sff3", "ids")
            .forwarder("sff2")
            .link("sff1", "sff2")
            .link("sff2", "sff3");
        let path = RenderedPath::new(PathId(3), "p3", TransportKind::Vlan)
            .hop("sff1", "fw")
            .hop("sff3", "ids");
        let snapshot = fabric.snapshot(path);

        let compiled = compiler()
            .compile(&snapshot, ChainId(3), &fabric.topology())
            .unwrap();
        let transit: Vec<(TableRole, Vec<FlowAction>)> = compiled
            .forward
            .rules_on("sff2")
            .map(|r| (r.role, r.actions.clone()))
            .collect();
        let port = |forwarder: &str, locator: &str| fabric.port_of(forwarder, locator).unwrap();
        let vlan = |forwarder: &str, locator: &str| {
            u16::try_from(100 + port(forwarder, locator)).unwrap()
        };
        assert_eq!(
            transit,
            vec![
                (
                    TableRole::TransportIngress,
                    vec![FlowAction::PopVlan, FlowAction::GotoTable(10)]
                ),
                (
                    TableRole::TransportEgress,
                    vec![
                        FlowAction::PushVlan,
                        FlowAction::SetVlanId(vlan("sff2", "sff2-to-sff3")),
                        FlowAction::Output(OutputPort::Port(port("sff2", "sff2-to-sff3"))),
                    ]
                ),
            ]
        );

        let result = compiler().compile(&snapshot, ChainId(3), &TopologyGraph::new());
        assert_eq!(
            result,
            Err(RenderError::UnresolvedHop {
                hop: 0,
                direction: Direction::Forward,
                cause: HopFault::NoRoute {
                    from: "sff1".to_string(),
                    to: "sff3".to_string()
                },
            })
        );
    }

    #[test]
    fn table_offsets() {
        let fabric = chain_fabric(TransportKind::Vlan).table_offset("sff2", 20);
        let settings = CompilerSettings {
            default_table_offset: 5,
            ..CompilerSettings::default()
        };
        let compiled = PipelineCompiler::new(AddressLayout::default(), settings)
            .compile(
                &fabric.snapshot(four_hop_path(1, TransportKind::Vlan)),
                ChainId(3),
                &fabric.topology(),
            )
            .unwrap();
        for rule in &compiled.forward.rules {
            let offset = if rule.forwarder == "sff2" { 20 } else { 5 };
            assert_eq!(rule.table, rule.role.index(offset), "{rule}");
        }
        let classifier = compiled.forward.rules_in(TableRole::Classifier).next().unwrap();
        assert_eq!(classifier.actions.last(), Some(&FlowAction::GotoTable(6)));
    }

    #[test]
    fn encoding_limits() {
        let fabric = chain_fabric(TransportKind::Vlan);
        // two bits of hop index: three hops at most
        let narrow = AddressLayout::new(0x02_00_00, 6, 14).unwrap();
        let result = PipelineCompiler::new(narrow, CompilerSettings::default()).compile(
            &fabric.snapshot(four_hop_path(1, TransportKind::Vlan)),
            ChainId(3),
            &fabric.topology(),
        );
        assert_eq!(
            result,
            Err(RenderError::TooManyHops {
                path_id: PathId(1),
                hops: 4,
                max: 3
            })
        );

        let path = four_hop_path(1, TransportKind::Vlan).with_egress(100);
        let result = compiler().compile(&fabric.snapshot(path), ChainId(3), &fabric.topology());
        assert!(matches!(result, Err(RenderError::ChainId(_))));

        let empty = RenderedPath::new(PathId(2), "empty", TransportKind::Vlan);
        let result = compiler().compile(&fabric.snapshot(empty), ChainId(3), &fabric.topology());
        assert_eq!(
            result,
            Err(RenderError::InvalidPath(ModelError::NoHops(PathId(2))))
        );
    }
}
