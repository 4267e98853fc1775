use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::container::ContainerID;
use crate::metrics::Metrics;
use crate::runtime::ContainerRuntime;

use super::Result;
use super::labels;
use super::registry::BatchSender;

/// Lists the opted-in containers once, then every `interval` unless it is
/// zero, and forwards them as add batches.
///
/// Returns `Ok(())` once `cancel` fires, or after the single listing when
/// `interval` is zero.
pub async fn poll_containers<R: ContainerRuntime>(
    runtime: Arc<R>,
    batches: BatchSender,
    interval: Duration,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    if interval.is_zero() {
        log::debug!("Periodic polling disabled, listing containers once");
        return list_once(runtime.as_ref(), &batches, &metrics).await;
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }

        if let Err(err) = list_once(runtime.as_ref(), &batches, &metrics).await {
            if cancel.is_cancelled() {
                return Ok(());
            }
            return Err(err);
        }
    }
}

/// Performs one listing. A failed listing is logged and skipped; the next
/// tick tries again.
pub async fn list_once<R: ContainerRuntime>(
    runtime: &R,
    batches: &BatchSender,
    metrics: &Metrics,
) -> Result<()> {
    let containers = match runtime
        .list_running(&labels::scrape_enabled_filter())
        .await
    {
        Ok(containers) => containers,
        Err(err) => {
            log::warn!("Got an error while listing the containers: {}", err);
            metrics.record_poll(false);
            return Ok(());
        }
    };
    metrics.record_poll(true);

    let ids: Vec<ContainerID> = containers
        .into_iter()
        .filter(|container| labels::is_managed(&container.labels))
        .map(|container| container.id)
        .collect();
    log::debug!("Found {} running managed containers", ids.len());

    if ids.is_empty() {
        return Ok(());
    }
    batches.add(ids).await
}
