// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

//! Read-only model of rendered service function paths.
//!
//! The types in this crate describe what the renderer consumes: a [`RenderedPath`] and the
//! forwarders, functions and groups it refers to, delivered together as a [`PathSnapshot`].
//! The renderer never mutates them.

pub mod errors;
pub mod forwarder;
pub mod ids;
pub mod mac;
pub mod path;
pub mod snapshot;
pub mod transport;

// re-exports
pub use errors::ModelError;
pub use forwarder::{
    ForwarderCatalog, FunctionCatalog, GroupCatalog, GroupMember, ServiceFunction,
    ServiceFunctionForwarder, ServiceFunctionGroup,
};
pub use ids::{ChainKey, PathId};
pub use mac::Mac;
pub use path::{ChainEgress, ClassifierAttachment, HopTarget, PathHop, RenderedPath, TrafficSelector};
pub use snapshot::{PathEvent, PathEventKind, PathSnapshot, TopologyUpdate};
pub use transport::{DataPlaneLocator, Transport, TransportKind};
