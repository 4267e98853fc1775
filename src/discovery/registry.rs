use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::container::ContainerID;
use crate::metrics::Metrics;
use crate::persistence::{ManagedContainer, TargetGroup, TargetGroupPersister};
use crate::runtime::ContainerRuntime;

use super::resolver::{Resolution, Resolver, SkipReason};
use super::{Error, Result};

/// Capacity of each batch channel. Producers wait when it is exhausted.
const BATCH_CHANNEL_CAPACITY: usize = 256;

/// The authoritative set of managed containers.
///
/// Only the [`Reconciler`] mutates it; everyone else may take a snapshot.
#[derive(Debug, Default)]
pub struct Registry {
    containers: Mutex<HashMap<ContainerID, TargetGroup>>,
}

impl Registry {
    /// Returns all managed containers, ordered by container id.
    pub async fn snapshot(&self) -> Vec<ManagedContainer> {
        snapshot_of(&*self.containers.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.containers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.containers.lock().await.is_empty()
    }

    pub async fn contains(&self, id: &ContainerID) -> bool {
        self.containers.lock().await.contains_key(id)
    }
}

fn snapshot_of(containers: &HashMap<ContainerID, TargetGroup>) -> Vec<ManagedContainer> {
    let mut out: Vec<ManagedContainer> = containers
        .iter()
        .map(|(id, target_group)| ManagedContainer {
            id: id.clone(),
            target_group: target_group.clone(),
        })
        .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

/// Producer side of the two batch channels.
#[derive(Debug, Clone)]
pub struct BatchSender {
    add_tx: mpsc::Sender<Vec<ContainerID>>,
    remove_tx: mpsc::Sender<Vec<ContainerID>>,
}

impl BatchSender {
    /// Requests that `ids` be resolved and added.
    pub async fn add(&self, ids: Vec<ContainerID>) -> Result<()> {
        self.add_tx
            .send(ids)
            .await
            .map_err(|_| Error::ReconcilerGone)
    }

    /// Requests that `ids` be removed.
    pub async fn remove(&self, ids: Vec<ContainerID>) -> Result<()> {
        self.remove_tx
            .send(ids)
            .await
            .map_err(|_| Error::ReconcilerGone)
    }
}

/// Consumer side of the two batch channels, owned by the [`Reconciler`] loop.
#[derive(Debug)]
pub struct BatchReceiver {
    pub(super) add_rx: mpsc::Receiver<Vec<ContainerID>>,
    pub(super) remove_rx: mpsc::Receiver<Vec<ContainerID>>,
}

pub fn batch_channel() -> (BatchSender, BatchReceiver) {
    let (add_tx, add_rx) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
    let (remove_tx, remove_rx) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
    (
        BatchSender { add_tx, remove_tx },
        BatchReceiver { add_rx, remove_rx },
    )
}

/// Applies add and remove batches to the [`Registry`] one at a time and
/// writes the document whenever a batch changed it.
pub struct Reconciler<R, P> {
    registry: Arc<Registry>,
    resolver: Resolver<R>,
    persister: P,
    metrics: Arc<Metrics>,
}

impl<R, P> Reconciler<R, P>
where
    R: ContainerRuntime,
    P: TargetGroupPersister,
{
    pub fn new(
        registry: Arc<Registry>,
        resolver: Resolver<R>,
        persister: P,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            resolver,
            persister,
            metrics,
        }
    }

    /// Runs until `cancel` fires or every producer is gone.
    ///
    /// The current (normally empty) registry is written once on entry so a
    /// document left behind by an earlier run does not survive. A batch that
    /// is being applied when `cancel` fires is completed; no further batch is
    /// taken afterwards.
    pub async fn run(self, mut rx: BatchReceiver, cancel: CancellationToken) -> Result<()> {
        {
            let containers = self.registry.containers.lock().await;
            self.flush(&containers).await;
        }

        let mut add_open = true;
        let mut remove_open = true;
        while add_open || remove_open {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("reconciler cancelled");
                    return Ok(());
                }
                ids = rx.add_rx.recv(), if add_open => match ids {
                    Some(ids) => {
                        self.add_batch(&ids).await;
                    }
                    None => add_open = false,
                },
                ids = rx.remove_rx.recv(), if remove_open => match ids {
                    Some(ids) => {
                        self.remove_batch(&ids).await;
                    }
                    None => remove_open = false,
                },
            }
        }
        log::debug!("all batch producers are gone");

        Ok(())
    }

    /// Resolves and inserts every id not yet managed. Returns true if the
    /// registry changed, in which case it was also written out.
    pub async fn add_batch(&self, ids: &[ContainerID]) -> bool {
        log::debug!("adding containers {:?}", ids);
        let mut containers = self.registry.containers.lock().await;
        let mut changed = false;

        for id in ids {
            if containers.contains_key(id) {
                log::trace!("container `{}` is already managed", id.short());
                continue;
            }

            match self.resolver.resolve(id).await {
                Ok(Resolution::Managed(target_group)) => {
                    log::info!(
                        "managing container `{}` with targets {:?}",
                        id.short(),
                        target_group.targets
                    );
                    containers.insert(id.clone(), target_group);
                    self.metrics.record_added();
                    changed = true;
                }
                Ok(Resolution::Skipped(SkipReason::NotManaged)) => {
                    log::debug!("container `{}` is not managed by us, ignoring", id.short());
                }
                Ok(Resolution::Skipped(reason)) => {
                    log::warn!("skipping container `{}`: {}", id.short(), reason);
                    self.metrics.record_skipped(&reason);
                }
                Err(err) => {
                    log::warn!(
                        "failed to get configuration details of container `{}`: {}",
                        id.short(),
                        err
                    );
                    self.metrics.record_inspect_failure();
                }
            }
        }

        if changed {
            self.flush(&containers).await;
        }
        changed
    }

    /// Deletes every managed id of the batch. Returns true if the registry
    /// changed, in which case it was also written out.
    pub async fn remove_batch(&self, ids: &[ContainerID]) -> bool {
        log::debug!("removing containers {:?}", ids);
        let mut containers = self.registry.containers.lock().await;
        let mut changed = false;

        for id in ids {
            if containers.remove(id).is_some() {
                log::info!("stopped managing container `{}`", id.short());
                self.metrics.record_removed();
                changed = true;
            }
        }

        if changed {
            self.flush(&containers).await;
        }
        changed
    }

    /// Writes the locked registry. Failures are logged only; the next change
    /// rewrites the whole document anyway.
    async fn flush(&self, containers: &HashMap<ContainerID, TargetGroup>) {
        let snapshot = snapshot_of(containers);
        let result = self.persister.write(&snapshot).await;
        self.metrics.record_flush(result.is_ok(), snapshot.len());
        if let Err(err) = result {
            log::warn!(
                "failed to write the discovery document, will retry on the next change: {}",
                err
            );
        }
    }
}
