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
#![allow(clippy::module_name_repetitions)]

//! Adjacency graph of forwarders and shortest-path queries over it.

mod graph;
mod shared;

pub use graph::{PathNode, ShortestPath, TopologyGraph};
pub use shared::SharedTopology;

use tracectl::{LevelFilter, trace_target};
trace_target!("topology", LevelFilter::INFO, &["renderer"]);
