/// Errors returned by a [`super::ContainerRuntime`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to the docker daemon: {0}")]
    Connect(#[source] bollard::errors::Error),
    #[error("failed to ping the docker daemon: {0}")]
    Ping(#[source] bollard::errors::Error),
    #[error("failed to list docker networks: {0}")]
    ListNetworks(#[source] bollard::errors::Error),
    #[error("no network named `{name}` found, please `docker network create {name}`")]
    NetworkNotFound { name: String },
    #[error("failed to list running containers: {0}")]
    ListContainers(#[source] bollard::errors::Error),
    #[error("no such container `{id}`")]
    NoSuchContainer { id: String },
    #[error("failed to inspect container `{id}`: {source}")]
    Inspect {
        id: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("failed to receive event from the docker event stream: {0}")]
    EventStream(#[source] bollard::errors::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
