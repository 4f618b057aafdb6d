// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::errors::{ConfigError, ConfigResult};
use chainid::AddressLayout;
use renderer::CompilerSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracectl::{TracingControl, get_trace_ctl};
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Startup configuration of the renderer. Every field is optional in the YAML input.
///
/// ```yaml
/// layout:
///   prefix: 152390
///   port_bits: 6
///   chain_bits: 10
/// workers: 4
/// queue_depth: 1024
/// weighted_groups: true
/// default_table_offset: 0
/// tracing: "default=warn,renderer=info"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Layout of the chain addresses
    pub layout: AddressLayout,
    /// Number of threads compiling and writing paths
    pub workers: usize,
    /// Path events that can be queued before submitters block
    pub queue_depth: usize,
    /// Whether group hops may use weighted plane groups
    pub weighted_groups: bool,
    pub default_table_offset: u8,
    /// Tracing levels, as `tag=level` pairs separated by commas
    pub tracing: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            layout: AddressLayout::default(),
            workers: Self::DEFAULT_WORKERS,
            queue_depth: Self::DEFAULT_QUEUE_DEPTH,
            weighted_groups: true,
            default_table_offset: 0,
            tracing: None,
        }
    }
}

impl RendererConfig {
    pub const DEFAULT_WORKERS: usize = 4;
    pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

    /// Parse and validate a YAML configuration
    pub fn from_yaml_str(input: &str) -> Result<Self, ConfigError> {
        let config: RendererConfig =
            serde_yaml_ng::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        debug!("Parsed configuration: {config:?}");
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&input)
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
    #[must_use]
    pub fn with_weighted_groups(mut self, weighted_groups: bool) -> Self {
        self.weighted_groups = weighted_groups;
        self
    }
    #[must_use]
    pub fn with_layout(mut self, layout: AddressLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn validate(&self) -> ConfigResult {
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers",
                reason: "at least one worker is needed".to_string(),
            });
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_depth",
                reason: "the queue must hold at least one event".to_string(),
            });
        }
        if let Some(tracing) = &self.tracing {
            let levels = TracingControl::parse_tracing_config(tracing)?;
            let tags: Vec<&str> = levels.keys().map(String::as_str).collect();
            get_trace_ctl().check_tags(&tags)?;
        }
        Ok(())
    }

    /// Compiler settings before knowing what the forwarding plane supports
    #[must_use]
    pub fn compiler_settings(&self) -> CompilerSettings {
        CompilerSettings {
            weighted_groups: self.weighted_groups,
            default_table_offset: self.default_table_offset,
        }
    }

    /// Apply the tracing levels, if any
    pub fn apply_tracing(&self) -> ConfigResult {
        if let Some(tracing) = &self.tracing {
            get_trace_ctl().setup_from_string(tracing)?;
            info!("Tracing configured with '{tracing}'");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracectl::TraceCtlError;

    #[test]
    fn empty_input_gives_defaults() {
        let config = RendererConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, RendererConfig::default());
        assert_eq!(config.compiler_settings(), CompilerSettings::default());
    }

    #[test]
    fn full_input() {
        let input = "
layout:
  prefix: 131072
  port_bits: 4
  chain_bits: 12
workers: 2
queue_depth: 16
weighted_groups: false
default_table_offset: 20
tracing: \"default=warn,renderer=debug\"
";
        let config = RendererConfig::from_yaml_str(input).unwrap();
        assert_eq!(config.layout, AddressLayout::new(0x02_00_00, 4, 12).unwrap());
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_depth, 16);
        assert_eq!(
            config.compiler_settings(),
            CompilerSettings {
                weighted_groups: false,
                default_table_offset: 20
            }
        );
    }

    #[test]
    fn rejected_inputs() {
        assert!(matches!(
            RendererConfig::from_yaml_str("workers: 0"),
            Err(ConfigError::InvalidValue { field: "workers", .. })
        ));
        assert!(matches!(
            RendererConfig::from_yaml_str("queue_depth: 0"),
            Err(ConfigError::InvalidValue {
                field: "queue_depth",
                ..
            })
        ));
        assert!(matches!(
            RendererConfig::from_yaml_str("threads: 3"),
            Err(ConfigError::Parse(_))
        ));
        // the layout leaves no room for the hop index
        assert!(matches!(
            RendererConfig::from_yaml_str("layout: {prefix: 131072, port_bits: 12, chain_bits: 12}"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RendererConfig::from_yaml_file("/nonexistent/renderer.yaml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn tracing_tags_are_checked() {
        assert_eq!(
            RendererConfig::from_yaml_str("tracing: \"nosuchtag=debug\""),
            Err(ConfigError::Tracing(TraceCtlError::UnknownTag(
                "nosuchtag".to_string()
            )))
        );
        assert_eq!(
            RendererConfig::from_yaml_str("tracing: \"renderer\""),
            Err(ConfigError::Tracing(TraceCtlError::Syntax(
                "renderer".to_string()
            )))
        );
        let config = RendererConfig::from_yaml_str("tracing: \"all=info\"").unwrap();
        config.apply_tracing().unwrap();
    }
}
