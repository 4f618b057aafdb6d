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

//! Compiler from rendered service function paths to pipeline rules.
//!
//! Each forwarder runs the same pipeline of tables:
//!
//! ```text
//!  classifier -> transport ingress -> path mapper (-> path mapper acl) -> [function]
//!                                          ^                                 |
//!                                          |                                 v
//!                                          +------ (same forwarder) ---- next hop
//!                                                                            |
//!                                                   transport egress <-------+
//! ```
//!
//! The [`PipelineCompiler`] turns one path into the rules of every table of every forwarder the
//! path traverses, in one or both directions, or fails without producing any rule.

mod compiled;
mod compiler;
mod encap;
mod errors;
#[cfg(any(test, feature = "testing"))]
pub mod fixtures;

pub use compiled::{CompiledPath, RuleSet};
pub use compiler::{CompilerSettings, PipelineCompiler};
pub use errors::{HopFault, RenderError};

use tracectl::{LevelFilter, trace_target};
trace_target!("renderer", LevelFilter::INFO, &["renderer"]);
