// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Path renderer service: per-path serialization of path events, chain identifier bookkeeping,
//! compilation and commit of the resulting rules on a forwarding plane.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod errors;
mod processor;
mod service;
mod stats;
mod sync;

pub use errors::{ProcessError, ServiceError};
pub use processor::{PathProcessor, Rendered};
pub use service::{PathOutcome, PathService};
pub use sync::{PathSynchronizer, PathTicket};

use tracectl::{LevelFilter, trace_target};
trace_target!("mgmt", LevelFilter::INFO, &["renderer", "management"]);
