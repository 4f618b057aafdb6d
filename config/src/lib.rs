// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration of the path renderer service. It is read once at startup, from YAML, and
//! validated before any worker is started.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]

pub mod errors;
pub mod renderer;

pub use errors::{ConfigError, ConfigResult}; // re-export
pub use renderer::RendererConfig; // re-export

use tracectl::{LevelFilter, trace_target};
trace_target!("config", LevelFilter::INFO, &["renderer"]);
