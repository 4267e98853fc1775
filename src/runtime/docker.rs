use std::collections::{BTreeMap, HashMap};

use bollard::Docker;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::{ContainerInspectResponse, EventMessage, EventMessageTypeEnum, PortMap};
use bollard::network::ListNetworksOptions;
use bollard::system::EventsOptions;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use crate::container::ContainerID;

use super::models::{
    ContainerDetail, ContainerSummary, EventKind, PortMapping, Protocol, RuntimeEvent,
};
use super::{ContainerRuntime, Error, Result};

/// [`ContainerRuntime`] backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects using the local defaults (`DOCKER_HOST` or the unix socket).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(Error::Connect)?;
        Ok(Self { docker })
    }

    /// Checks that the daemon answers and that `network_name` exists.
    pub async fn ensure_ready(&self, network_name: &str) -> Result<()> {
        self.docker.ping().await.map_err(Error::Ping)?;
        log::debug!("Docker daemon is reachable");

        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
            .map_err(Error::ListNetworks)?;
        if !networks
            .iter()
            .any(|network| network.name.as_deref() == Some(network_name))
        {
            return Err(Error::NetworkNotFound {
                name: network_name.to_owned(),
            });
        }
        log::debug!("Found preferred network `{}`", network_name);

        Ok(())
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self, label_filter: &str) -> Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("status".to_owned(), vec!["running".to_owned()]);
        filters.insert("label".to_owned(), vec![label_filter.to_owned()]);

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                filters,
                ..Default::default()
            }))
            .await
            .map_err(Error::ListContainers)?;

        Ok(containers
            .into_iter()
            .filter_map(|container| {
                let id = match ContainerID::new(container.id.unwrap_or_default()) {
                    Ok(id) => id,
                    Err(err) => {
                        log::warn!("skipping listed container: {}", err);
                        return None;
                    }
                };
                Some(ContainerSummary {
                    id,
                    labels: container.labels.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn inspect(&self, id: &ContainerID) -> Result<ContainerDetail> {
        let response = self
            .docker
            .inspect_container(id.as_ref(), None::<InspectContainerOptions>)
            .await
            .map_err(|source| match source {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => Error::NoSuchContainer {
                    id: id.to_string(),
                },
                source => Error::Inspect {
                    id: id.to_string(),
                    source,
                },
            })?;

        Ok(container_detail(id, response))
    }

    fn events(&self) -> BoxStream<'_, Result<RuntimeEvent>> {
        let mut filters = HashMap::new();
        filters.insert("type".to_owned(), vec!["container".to_owned()]);

        self.docker
            .events(Some(EventsOptions::<String> {
                since: None,
                until: None,
                filters,
            }))
            .map(|message| message.map(runtime_event).map_err(Error::EventStream))
            .boxed()
    }
}

fn runtime_event(message: EventMessage) -> RuntimeEvent {
    let kind = match message.typ {
        Some(EventMessageTypeEnum::CONTAINER) => EventKind::Container,
        Some(other) => EventKind::Other(other.to_string()),
        None => EventKind::Other(String::new()),
    };

    RuntimeEvent {
        kind,
        action: message.action.unwrap_or_default(),
        actor_id: message.actor.and_then(|actor| actor.id),
    }
}

fn container_detail(id: &ContainerID, response: ContainerInspectResponse) -> ContainerDetail {
    let running = response
        .state
        .as_ref()
        .and_then(|state| state.running)
        .unwrap_or(false);
    let labels = response
        .config
        .and_then(|config| config.labels)
        .unwrap_or_default();
    let name = response
        .name
        .map(|name| name.trim_start_matches('/').to_owned())
        .unwrap_or_default();

    let (ports, networks) = match response.network_settings {
        Some(settings) => {
            let ports = settings.ports.map(port_mappings).unwrap_or_default();
            let networks = settings
                .networks
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(name, endpoint)| {
                    endpoint
                        .ip_address
                        .filter(|ip| !ip.is_empty())
                        .map(|ip| (name, ip))
                })
                .collect::<BTreeMap<_, _>>();
            (ports, networks)
        }
        None => (Vec::new(), BTreeMap::new()),
    };

    ContainerDetail {
        id: id.clone(),
        name,
        running,
        labels,
        ports,
        networks,
    }
}

/// Converts Docker's `<port>/<proto>` keyed port map into [`PortMapping`]s,
/// ordered by container port.
fn port_mappings(ports: PortMap) -> Vec<PortMapping> {
    let mut mappings: Vec<PortMapping> = ports
        .into_iter()
        .filter_map(|(key, bindings)| {
            let mut parts = key.splitn(2, '/');
            let container_port = match parts.next().map(str::parse::<u16>) {
                Some(Ok(port)) => port,
                _ => {
                    log::warn!("ignoring unparsable port key `{}`", key);
                    return None;
                }
            };
            let protocol = Protocol::from_suffix(parts.next());
            let host_ports = bindings
                .unwrap_or_default()
                .into_iter()
                .filter_map(|binding| binding.host_port?.parse::<u16>().ok())
                .collect();

            Some(PortMapping {
                container_port,
                protocol,
                host_ports,
            })
        })
        .collect();
    mappings.sort_by_key(|mapping| mapping.container_port);
    mappings
}

#[cfg(test)]
mod tests {
    use bollard::models::{
        ContainerConfig, ContainerState, EndpointSettings, EventActor, NetworkSettings,
        PortBinding,
    };

    use super::*;

    #[test]
    fn test_port_mappings_groups_bindings_per_exposed_port() {
        let mut ports: PortMap = HashMap::new();
        ports.insert(
            "8080/tcp".to_owned(),
            Some(vec![
                PortBinding {
                    host_ip: Some("0.0.0.0".to_owned()),
                    host_port: Some("32768".to_owned()),
                },
                PortBinding {
                    host_ip: Some("::".to_owned()),
                    host_port: Some("32768".to_owned()),
                },
            ]),
        );
        ports.insert("53/udp".to_owned(), None);
        ports.insert("garbage/tcp".to_owned(), None);

        let mappings = port_mappings(ports);
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].container_port, 53);
        assert_eq!(mappings[0].protocol, Protocol::Udp);
        assert!(mappings[0].host_ports.is_empty());
        assert_eq!(mappings[1].container_port, 8080);
        assert_eq!(mappings[1].protocol, Protocol::Tcp);
        assert_eq!(mappings[1].host_ports, vec![32768, 32768]);
    }

    #[test]
    fn test_container_detail_from_inspect_response() {
        let id = ContainerID::new("abc123").unwrap();
        let mut networks = HashMap::new();
        networks.insert(
            "monitoring_default".to_owned(),
            EndpointSettings {
                ip_address: Some("10.0.0.5".to_owned()),
                ..Default::default()
            },
        );
        networks.insert(
            "none".to_owned(),
            EndpointSettings {
                ip_address: Some(String::new()),
                ..Default::default()
            },
        );
        let mut labels = HashMap::new();
        labels.insert("prometheus.io/scrape".to_owned(), "true".to_owned());

        let response = ContainerInspectResponse {
            name: Some("/exporter".to_owned()),
            state: Some(ContainerState {
                running: Some(true),
                ..Default::default()
            }),
            config: Some(ContainerConfig {
                labels: Some(labels.clone()),
                ..Default::default()
            }),
            network_settings: Some(NetworkSettings {
                networks: Some(networks),
                ..Default::default()
            }),
            ..Default::default()
        };

        let detail = container_detail(&id, response);
        assert_eq!(detail.name, "exporter");
        assert!(detail.running);
        assert_eq!(detail.labels, labels);
        assert!(detail.ports.is_empty());
        assert_eq!(detail.networks.len(), 1);
        assert_eq!(detail.networks["monitoring_default"], "10.0.0.5");
    }

    #[test]
    fn test_runtime_event_from_message() {
        let event = runtime_event(EventMessage {
            typ: Some(EventMessageTypeEnum::CONTAINER),
            action: Some("start".to_owned()),
            actor: Some(EventActor {
                id: Some("abc123".to_owned()),
                attributes: None,
            }),
            ..Default::default()
        });
        assert_eq!(event.kind, EventKind::Container);
        assert_eq!(event.action, "start");
        assert_eq!(event.actor_id.as_deref(), Some("abc123"));

        let event = runtime_event(EventMessage::default());
        assert!(matches!(event.kind, EventKind::Other(_)));
        assert!(event.action.is_empty());
        assert!(event.actor_id.is_none());
    }
}
