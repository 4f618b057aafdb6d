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

//! Abstract forwarding-plane rules and their transactional application.
//!
//! This crate does not speak any switch protocol. It models the rules and groups the renderer
//! produces, defines the [`FlowPlane`] trait a protocol adapter implements, and provides the
//! [`FlowBatchWriter`] that replaces the rules of a path without leaving a partial state visible.

mod batch;
mod group;
#[cfg(any(test, feature = "testing"))]
mod memory;
mod plane;
mod rule;
mod writer;

pub use batch::{FlowBatch, FlowOp, FlowTransaction};
pub use group::{Bucket, FlowGroup, GroupId};
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryPlane;
pub use plane::{FlowPlane, PlaneError};
pub use rule::{Cookie, Direction, FlowAction, FlowRule, MatchField, OutputPort, RuleKey, TableRole};
pub use writer::{FlowBatchWriter, WriterError};

use tracectl::{LevelFilter, trace_target};
trace_target!("flow", LevelFilter::INFO, &["renderer"]);
