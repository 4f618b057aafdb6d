// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Crate to declare tracing targets and control their log level at runtime.
//!
//! Every crate of the renderer declares its target once with [`trace_target!`]. Targets are
//! collected at link time and loaded into the [`TracingControl`] returned by [`get_trace_ctl`],
//! which owns the process-wide subscriber and allows changing levels by tag.

pub mod control;
pub mod targets;

// re-exports
pub use control::{TargetCfg, TraceCtlError, TracingControl, get_trace_ctl};
pub use tracing_subscriber::filter::LevelFilter;

/// Level used for targets not explicitly configured.
pub const DEFAULT_DEFAULT_LOGLEVEL: LevelFilter = LevelFilter::INFO;
