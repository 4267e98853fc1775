use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::DiscoveryConfig;
use crate::container::ContainerID;
use crate::persistence::TargetGroup;
use crate::runtime::{self, ContainerDetail, ContainerRuntime, Protocol};

use super::labels;

/// Why a container was left out of the discovery document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The container does not carry the opt-in label with the exact value.
    NotManaged,
    /// The container is no longer running.
    NotRunning,
    /// No port label and not exactly one exposed port.
    AmbiguousPort { count: usize },
    /// No port label and the only exposed port is not TCP.
    NonTcpPort { protocol: Protocol },
    /// Not on the preferred network, no ip label, and strict networking is on.
    StrictNetworkViolation { network: String },
    /// Not on the preferred network, no ip label, and no other network either.
    NoNetwork,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotManaged => "not_managed",
            SkipReason::NotRunning => "not_running",
            SkipReason::AmbiguousPort { .. } => "ambiguous_port",
            SkipReason::NonTcpPort { .. } => "non_tcp_port",
            SkipReason::StrictNetworkViolation { .. } => "strict_network_violation",
            SkipReason::NoNetwork => "no_network",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotManaged => write!(f, "container is not opted in to scraping"),
            SkipReason::NotRunning => write!(f, "container is not running"),
            SkipReason::AmbiguousPort { count } => write!(
                f,
                "{} ports exposed, can't decide which one to pick, set the `{}` label",
                count,
                labels::PORT
            ),
            SkipReason::NonTcpPort { protocol } => write!(
                f,
                "the only exposed port is {} which can't be scraped, set the `{}` label",
                protocol,
                labels::PORT
            ),
            SkipReason::StrictNetworkViolation { network } => write!(
                f,
                "container is not attached to network `{}` and strict networking is requested",
                network
            ),
            SkipReason::NoNetwork => write!(f, "container is not attached to any network"),
        }
    }
}

/// Outcome of resolving one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Managed(TargetGroup),
    Skipped(SkipReason),
}

/// Inspects containers and turns their labels into scrape targets.
pub struct Resolver<R> {
    runtime: Arc<R>,
    config: Arc<DiscoveryConfig>,
}

impl<R: ContainerRuntime> Resolver<R> {
    pub fn new(runtime: Arc<R>, config: Arc<DiscoveryConfig>) -> Self {
        Self { runtime, config }
    }

    /// Inspects `id` and resolves it.
    ///
    /// # Errors
    ///
    /// Only the inspect call can fail; every resolution problem is reported as
    /// [`Resolution::Skipped`].
    pub async fn resolve(&self, id: &ContainerID) -> runtime::Result<Resolution> {
        let detail = self.runtime.inspect(id).await?;
        Ok(resolve(&detail, &self.config))
    }
}

/// Resolves an inspected container against `config`.
pub fn resolve(detail: &ContainerDetail, config: &DiscoveryConfig) -> Resolution {
    if !labels::is_managed(&detail.labels) {
        return Resolution::Skipped(SkipReason::NotManaged);
    }
    if !detail.running {
        return Resolution::Skipped(SkipReason::NotRunning);
    }

    let target = select_port(detail).and_then(|port| {
        select_address(detail, config).map(|address| format!("{address}:{port}"))
    });

    match target {
        Ok(target) => Resolution::Managed(TargetGroup {
            targets: vec![target],
            labels: assemble_labels(detail, config),
        }),
        Err(reason) => Resolution::Skipped(reason),
    }
}

fn select_port(detail: &ContainerDetail) -> Result<String, SkipReason> {
    if let Some(port) = labels::non_empty(&detail.labels, labels::PORT) {
        return Ok(port.to_owned());
    }

    match detail.ports.as_slice() {
        [mapping] if mapping.protocol == Protocol::Tcp => Ok(mapping.scrape_port().to_string()),
        [mapping] => Err(SkipReason::NonTcpPort {
            protocol: mapping.protocol.clone(),
        }),
        ports => Err(SkipReason::AmbiguousPort { count: ports.len() }),
    }
}

fn select_address(
    detail: &ContainerDetail,
    config: &DiscoveryConfig,
) -> Result<String, SkipReason> {
    if let Some(address) = detail.networks.get(&config.network_name) {
        return Ok(address.clone());
    }
    if let Some(address) = labels::non_empty(&detail.labels, labels::IP) {
        return Ok(address.to_owned());
    }
    if config.network_strict {
        return Err(SkipReason::StrictNetworkViolation {
            network: config.network_name.clone(),
        });
    }

    let (network, address) = detail
        .networks
        .iter()
        .next()
        .ok_or(SkipReason::NoNetwork)?;
    log::warn!(
        "container `{}` is not attached to network `{}`, network `{}` got chosen instead, \
         it may not be reachable by prometheus",
        detail.id.short(),
        config.network_name,
        network
    );
    Ok(address.clone())
}

/// Builds the target labels. Later sources overwrite earlier ones: common
/// labels, extra labels, container metadata, metrics path, scheme.
fn assemble_labels(
    detail: &ContainerDetail,
    config: &DiscoveryConfig,
) -> BTreeMap<String, String> {
    let mut out = config.common_labels.clone();

    if let Some(extra) = detail.labels.get(labels::EXTRA_LABELS) {
        out.extend(labels::parse_cs_labels(extra));
    }

    if config.add_container_metadata {
        out.insert(labels::META_CONTAINER_ID.to_owned(), detail.id.to_string());
        out.insert(labels::META_CONTAINER_NAME.to_owned(), detail.name.clone());
    }

    if let Some(path) = labels::non_empty(&detail.labels, labels::PATH) {
        out.insert(labels::METRICS_PATH_LABEL.to_owned(), path.to_owned());
    }

    if let Some(scheme) = labels::non_empty(&detail.labels, labels::SCHEME) {
        out.insert(labels::SCHEME_LABEL.to_owned(), scheme.to_owned());
    }

    out
}
