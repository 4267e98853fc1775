//! Process configuration, read from command line flags or the environment.
mod error;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::discovery::labels::parse_cs_labels;

pub use error::{Error, Result};

#[derive(Parser, Debug, Clone)]
#[command(about, version)]
pub struct Config {
    /// Port of the HTTP server exposing metrics and health.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Namespace of the metrics exported by this process.
    #[arg(long, env = "METRICS_NAMESPACE", default_value = "dockerlabelsdiscovery")]
    pub metrics_namespace: String,

    /// Subsystem of the metrics exported by this process.
    #[arg(long, env = "METRICS_SUBSYSTEM", default_value = "")]
    pub metrics_subsystem: String,

    #[arg(long, env = "METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    /// File-based service discovery document to maintain. Must end in `.json`.
    #[arg(long, env = "PROMETHEUS_CONFIG_FILE_PATH")]
    pub prometheus_config_file_path: PathBuf,

    /// Adds `__meta_container_id` and `__meta_container_name` to every target.
    #[arg(long, env = "PROMETHEUS_ADD_CONTAINER_METADATA")]
    pub prometheus_add_container_metadata: bool,

    /// Comma separated `key:value` labels added to every target.
    #[arg(
        long,
        env = "PROMETHEUS_COMMON_LABELS",
        default_value = "",
        value_parser = parse_common_labels
    )]
    pub prometheus_common_labels: BTreeMap<String, String>,

    /// Docker network the target address is taken from.
    #[arg(long, env = "DOCKER_NETWORK_NAME", default_value = "monitoring_default")]
    pub docker_network_name: String,

    /// Only scrape containers attached to `docker_network_name` (or carrying an
    /// explicit ip label) instead of falling back to another network.
    #[arg(long, env = "DOCKER_NETWORK_STRICT")]
    pub docker_network_strict: bool,

    /// Interval between full container listings, e.g. `30s` or `5m`. `0s`
    /// only lists once at startup.
    #[arg(
        long,
        env = "DOCKER_POLL_FREQUENCY",
        default_value = "5m",
        value_parser = humantime::parse_duration
    )]
    pub docker_poll_frequency: Duration,
}

fn parse_common_labels(src: &str) -> std::result::Result<BTreeMap<String, String>, String> {
    Ok(parse_cs_labels(src))
}

impl Config {
    /// Checks the settings that clap cannot validate on its own.
    pub fn validate(self) -> Result<Self> {
        if !self.metrics_path.starts_with('/')
            || self.metrics_path.contains(['{', '}'])
            || self.metrics_path == "/health"
            || self.metrics_path == "/targets"
        {
            return Err(Error::InvalidMetricsPath {
                path: self.metrics_path,
            });
        }

        Ok(self)
    }

    /// The read-only settings consumed by the discovery core.
    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            network_name: self.docker_network_name.clone(),
            network_strict: self.docker_network_strict,
            common_labels: self.prometheus_common_labels.clone(),
            add_container_metadata: self.prometheus_add_container_metadata,
            poll_interval: self.docker_poll_frequency,
        }
    }
}

/// Settings of the resolver and the poller. Never mutated after startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub network_name: String,
    pub network_strict: bool,
    pub common_labels: BTreeMap<String, String>,
    pub add_container_metadata: bool,
    pub poll_interval: Duration,
}
