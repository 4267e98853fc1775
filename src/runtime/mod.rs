//! Container runtime client.
//!
//! The discovery core only talks to the runtime through [`ContainerRuntime`]:
//! list running containers, inspect one container, and follow the lifecycle
//! event stream. [`DockerRuntime`] implements it against the Docker Engine API.
mod docker;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod models;

use std::future::Future;

use futures_util::stream::BoxStream;

use crate::container::ContainerID;

pub use docker::DockerRuntime;
pub use error::{Error, Result};
pub use models::{
    ContainerDetail, ContainerSummary, EventKind, PortMapping, Protocol, RuntimeEvent,
};

pub trait ContainerRuntime: Send + Sync + 'static {
    /// Lists running containers carrying the label `label_filter` (`key=value`).
    fn list_running(
        &self,
        label_filter: &str,
    ) -> impl Future<Output = Result<Vec<ContainerSummary>>> + Send;

    /// Inspects a single container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchContainer`] if the container is gone, or another
    /// [`Error`] on transport failures.
    fn inspect(&self, id: &ContainerID) -> impl Future<Output = Result<ContainerDetail>> + Send;

    /// Subscribes to the lifecycle event stream. Transport errors are yielded
    /// in-band; the stream ends only when the runtime closes it.
    fn events(&self) -> BoxStream<'_, Result<RuntimeEvent>>;
}
