// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use chainid::{ChainId, ChainIdError};
use config::ConfigError;
use flow::WriterError;
use model::PathId;
use renderer::RenderError;
use thiserror::Error;

/// Failure to process one path event
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Chain id allocation failed: {0}")]
    ChainId(#[from] ChainIdError),
    #[error("Chain id {chain_id} is in use by path {owner}")]
    ChainInUse { chain_id: ChainId, owner: PathId },
    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("Writing failed: {0}")]
    Write(#[from] WriterError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ServiceError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Could not spawn worker: {0}")]
    Spawn(String),
    #[error("The service is shut down")]
    ShutDown,
}
