// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Forwarders, service functions, groups and the catalogs to look them up by name

use crate::errors::ModelError;
use crate::transport::{DataPlaneLocator, TransportKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Objects that are looked up by name in a [`Catalog`]
pub trait Named {
    fn name(&self) -> &str;
}

/// A programmable switch hosting service functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFunctionForwarder {
    pub name: String,
    pub locators: Vec<DataPlaneLocator>,
    /// service function name -> name of the locator used to reach it
    #[serde(default)]
    pub function_locators: BTreeMap<String, String>,
    /// neighbor forwarder name -> name of the locator used to reach it
    #[serde(default)]
    pub neighbor_locators: BTreeMap<String, String>,
    /// added to every table index of the pipeline on this forwarder
    #[serde(default)]
    pub table_offset: Option<u8>,
}

impl ServiceFunctionForwarder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            locators: Vec::new(),
            function_locators: BTreeMap::new(),
            neighbor_locators: BTreeMap::new(),
            table_offset: None,
        }
    }
    #[must_use]
    pub fn with_locator(mut self, locator: DataPlaneLocator) -> Self {
        self.locators.push(locator);
        self
    }
    #[must_use]
    pub fn bind_function(mut self, function: &str, locator: &str) -> Self {
        self.function_locators
            .insert(function.to_owned(), locator.to_owned());
        self
    }
    #[must_use]
    pub fn bind_neighbor(mut self, forwarder: &str, locator: &str) -> Self {
        self.neighbor_locators
            .insert(forwarder.to_owned(), locator.to_owned());
        self
    }
    #[must_use]
    pub fn with_table_offset(mut self, offset: u8) -> Self {
        self.table_offset = Some(offset);
        self
    }

    #[must_use]
    pub fn locator(&self, name: &str) -> Option<&DataPlaneLocator> {
        self.locators.iter().find(|l| l.name == name)
    }
    /// The locator bound to reach service function `function`, if any
    #[must_use]
    pub fn function_locator(&self, function: &str) -> Option<&DataPlaneLocator> {
        self.function_locators
            .get(function)
            .and_then(|name| self.locator(name))
    }
    /// The locator bound to reach the neighbor forwarder `forwarder`, if any
    #[must_use]
    pub fn neighbor_locator(&self, forwarder: &str) -> Option<&DataPlaneLocator> {
        self.neighbor_locators
            .get(forwarder)
            .and_then(|name| self.locator(name))
    }
    /// Tell if the forwarder has at least one locator of the given transport kind
    #[must_use]
    pub fn has_transport(&self, kind: TransportKind) -> bool {
        self.locators.iter().any(|l| l.kind() == kind)
    }
}

impl Named for ServiceFunctionForwarder {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFunction {
    pub name: String,
    /// free-form type of function, e.g. "firewall" or "dpi"
    pub kind: String,
}

impl ServiceFunction {
    #[must_use]
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: kind.to_owned(),
        }
    }
}

impl Named for ServiceFunction {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub function: String,
    pub weight: u16,
}

/// A named set of interchangeable functions, load-balanced by weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFunctionGroup {
    pub name: String,
    pub members: Vec<GroupMember>,
}

impl ServiceFunctionGroup {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            members: Vec::new(),
        }
    }
    #[must_use]
    pub fn with_member(mut self, function: &str, weight: u16) -> Self {
        self.members.push(GroupMember {
            function: function.to_owned(),
            weight,
        });
        self
    }
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.members.is_empty() {
            return Err(ModelError::EmptyGroup(self.name.clone()));
        }
        if let Some(member) = self.members.iter().find(|m| m.weight == 0) {
            return Err(ModelError::ZeroWeight {
                group: self.name.clone(),
                member: member.function.clone(),
            });
        }
        Ok(())
    }
    /// Sum of the weights of all members
    #[must_use]
    pub fn total_weight(&self) -> u32 {
        self.members.iter().map(|m| u32::from(m.weight)).sum()
    }
}

impl Named for ServiceFunctionGroup {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Read-only collection of objects keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog<T>(BTreeMap<String, T>);

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T: Named> Catalog<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Add an object, replacing any other with the same name
    pub fn add(&mut self, object: T) {
        self.0.insert(object.name().to_owned(), object);
    }
    #[must_use]
    pub fn with(mut self, object: T) -> Self {
        self.add(object);
        self
    }
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.0.get(name)
    }
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.values()
    }
}

impl<T: Named> FromIterator<T> for Catalog<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for object in iter {
            catalog.add(object);
        }
        catalog
    }
}

pub type ForwarderCatalog = Catalog<ServiceFunctionForwarder>;
pub type FunctionCatalog = Catalog<ServiceFunction>;
pub type GroupCatalog = Catalog<ServiceFunctionGroup>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;

    fn sff() -> ServiceFunctionForwarder {
        ServiceFunctionForwarder::new("sff1")
            .with_locator(DataPlaneLocator::new("to-fw", 3, Transport::Vlan { vlan_id: 100 }))
            .with_locator(DataPlaneLocator::new(
                "to-sff2",
                1,
                Transport::Mpls { label: 2000 },
            ))
            .bind_function("fw", "to-fw")
            .bind_neighbor("sff2", "to-sff2")
            .bind_function("dpi", "missing")
    }

    #[test]
    fn forwarder_lookups() {
        let sff = sff();
        assert_eq!(sff.function_locator("fw").unwrap().port, 3);
        assert_eq!(sff.neighbor_locator("sff2").unwrap().port, 1);
        assert!(sff.function_locator("dpi").is_none());
        assert!(sff.function_locator("ids").is_none());
        assert!(sff.has_transport(TransportKind::Mpls));
        assert!(!sff.has_transport(TransportKind::VxlanGpe));
    }

    #[test]
    fn group_validation() {
        assert_eq!(
            ServiceFunctionGroup::new("g").validate(),
            Err(ModelError::EmptyGroup("g".to_string()))
        );
        let zero = ServiceFunctionGroup::new("g").with_member("fw1", 0);
        assert!(matches!(zero.validate(), Err(ModelError::ZeroWeight { .. })));
        let group = ServiceFunctionGroup::new("g")
            .with_member("fw1", 3)
            .with_member("fw2", 1);
        assert!(group.validate().is_ok());
        assert_eq!(group.total_weight(), 4);
    }

    #[test]
    fn catalog_replaces_by_name() {
        let catalog: FunctionCatalog = [
            ServiceFunction::new("fw", "firewall"),
            ServiceFunction::new("fw", "stateful-firewall"),
        ]
        .into_iter()
        .collect();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("fw").unwrap().kind, "stateful-firewall");
    }
}
