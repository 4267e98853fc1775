//! Container discovery.
//!
//! Two producers feed one consumer:
//!
//! - [`watch_events`] turns runtime start/stop events into add/remove batches.
//! - [`poll_containers`] lists the opted-in containers at startup and on an
//!   interval, and sends them as add batches.
//! - The [`Reconciler`] applies the batches one at a time to the [`Registry`],
//!   resolving each new container with the [`Resolver`], and writes the
//!   discovery document whenever the registry changed.
//!
//! [`Discoverer`] wires the three tasks together.
mod error;
mod events;
pub mod labels;
mod poller;
mod registry;
mod resolver;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::DiscoveryConfig;
use crate::metrics::Metrics;
use crate::persistence::TargetGroupPersister;
use crate::runtime::ContainerRuntime;

pub use error::{Error, Result};
pub use events::{Lifecycle, classify, watch_events};
pub use poller::{list_once, poll_containers};
pub use registry::{BatchReceiver, BatchSender, Reconciler, Registry, batch_channel};
pub use resolver::{Resolution, Resolver, SkipReason, resolve};

pub struct Discoverer<R> {
    runtime: Arc<R>,
    config: Arc<DiscoveryConfig>,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
    join_handles: Vec<(&'static str, tokio::task::JoinHandle<Result<()>>)>,
}

impl<R: ContainerRuntime> Discoverer<R> {
    pub fn new(
        runtime: Arc<R>,
        config: Arc<DiscoveryConfig>,
        registry: Arc<Registry>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            runtime,
            config,
            registry,
            metrics,
            join_handles: Vec::default(),
        }
    }

    /// Spawns the reconciler, the event watcher and the poller.
    ///
    /// If any of them fails, `cancel` is triggered so the others wind down too.
    pub fn start<P: TargetGroupPersister>(&mut self, persister: P, cancel: CancellationToken) {
        let (batches, rx) = batch_channel();

        let reconciler = Reconciler::new(
            Arc::clone(&self.registry),
            Resolver::new(Arc::clone(&self.runtime), Arc::clone(&self.config)),
            persister,
            Arc::clone(&self.metrics),
        );
        self.spawn("reconciler", reconciler.run(rx, cancel.clone()), &cancel);

        self.spawn(
            "events",
            watch_events(
                Arc::clone(&self.runtime),
                batches.clone(),
                Arc::clone(&self.metrics),
                cancel.clone(),
            ),
            &cancel,
        );

        self.spawn(
            "poller",
            poll_containers(
                Arc::clone(&self.runtime),
                batches,
                self.config.poll_interval,
                Arc::clone(&self.metrics),
                cancel.clone(),
            ),
            &cancel,
        );
    }

    fn spawn(
        &mut self,
        task: &'static str,
        fut: impl Future<Output = Result<()>> + Send + 'static,
        cancel: &CancellationToken,
    ) {
        let cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let result = fut.await;
            if let Err(ref err) = result {
                log::error!("discovery task `{}` failed: {}", task, err);
                cancel.cancel();
            }
            result
        });
        self.join_handles.push((task, handle));
    }

    /// Waits for every spawned task and returns the first error.
    pub async fn join_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for (task, handle) in self.join_handles.drain(..) {
            let result = handle
                .await
                .map_err(|source| Error::Join { task, source })
                .and_then(|result| result);
            if let Err(err) = result {
                first_err.get_or_insert(err);
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::persistence::{self, ManagedContainer};
    use crate::runtime::fake::{FakeRuntime, container_event, container_id, scrape_container};

    const NETWORK: &str = "monitoring_default";

    #[derive(Clone, Default)]
    struct MemoryPersister(Arc<Mutex<Vec<Vec<ManagedContainer>>>>);

    impl TargetGroupPersister for MemoryPersister {
        async fn write(&self, snapshot: &[ManagedContainer]) -> persistence::Result<()> {
            self.0.lock().unwrap().push(snapshot.to_vec());
            Ok(())
        }
    }

    fn discoverer(runtime: &Arc<FakeRuntime>, registry: &Arc<Registry>) -> Discoverer<FakeRuntime> {
        Discoverer::new(
            Arc::clone(runtime),
            Arc::new(DiscoveryConfig {
                network_name: NETWORK.to_owned(),
                poll_interval: Duration::from_secs(300),
                ..Default::default()
            }),
            Arc::clone(registry),
            Arc::new(Metrics::new("test", "").unwrap()),
        )
    }

    async fn wait_for(registry: &Registry, id: &str, present: bool) {
        let id = container_id(id);
        for _ in 0..200 {
            if registry.contains(&id).await == present {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("container `{}` never became present={}", id, present);
    }

    #[tokio::test]
    async fn test_startup_poll_and_events_end_to_end() {
        let runtime = Arc::new(FakeRuntime::default());
        let events = runtime.event_sender();
        runtime.insert(scrape_container("existing", NETWORK, "10.0.0.5"));
        let registry = Arc::new(Registry::default());
        let persister = MemoryPersister::default();
        let cancel = CancellationToken::new();

        let mut discoverer = discoverer(&runtime, &registry);
        discoverer.start(persister.clone(), cancel.clone());

        wait_for(&registry, "existing", true).await;

        runtime.insert(scrape_container("new", NETWORK, "10.0.0.6"));
        events.send(Ok(container_event("start", "new"))).unwrap();
        wait_for(&registry, "new", true).await;

        runtime.set_running(&container_id("existing"), false);
        events.send(Ok(container_event("die", "existing"))).unwrap();
        wait_for(&registry, "existing", false).await;

        let last = persister.0.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].id, container_id("new"));

        cancel.cancel();
        discoverer.join_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_event_stream_failure_cancels_everything() {
        let runtime = Arc::new(FakeRuntime::default());
        let events = runtime.event_sender();
        let registry = Arc::new(Registry::default());
        let cancel = CancellationToken::new();

        let mut discoverer = discoverer(&runtime, &registry);
        discoverer.start(MemoryPersister::default(), cancel.clone());
        drop(events);

        cancel.cancelled().await;
        assert!(matches!(
            discoverer.join_all().await,
            Err(Error::EventStreamClosed)
        ));
    }
}
