// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration / validation failures

use thiserror::Error;
use tracectl::TraceCtlError;

/// The reasons why we may reject a configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Could not read configuration: {0}")]
    Io(String),
    #[error("Could not parse configuration: {0}")]
    Parse(String),
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Invalid tracing configuration: {0}")]
    Tracing(#[from] TraceCtlError),
}

/// Result-like type for configurations
pub type ConfigResult = Result<(), ConfigError>;
