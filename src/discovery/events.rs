use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::container::ContainerID;
use crate::metrics::Metrics;
use crate::runtime::{ContainerRuntime, EventKind, RuntimeEvent};

use super::registry::BatchSender;
use super::{Error, Result};

const ACTION_START: &str = "start";
const ACTION_DIE: &str = "die";

/// A lifecycle event the discovery acts upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Started(ContainerID),
    Stopped(ContainerID),
}

/// Classifies a raw event. Everything but container `start` and `die` events
/// with a valid actor id is ignored.
pub fn classify(event: &RuntimeEvent) -> Option<Lifecycle> {
    if event.kind != EventKind::Container {
        return None;
    }
    let lifecycle: fn(ContainerID) -> Lifecycle = match event.action.as_str() {
        ACTION_START => Lifecycle::Started,
        ACTION_DIE => Lifecycle::Stopped,
        _ => return None,
    };

    match event.actor_id.as_deref().map(ContainerID::new) {
        Some(Ok(id)) => Some(lifecycle(id)),
        Some(Err(err)) => {
            log::warn!("ignoring `{}` event: {}", event.action, err);
            None
        }
        None => {
            log::warn!("ignoring `{}` event without container id", event.action);
            None
        }
    }
}

/// Follows the runtime event stream and forwards starts as add batches and
/// stops as remove batches, one container per batch.
///
/// Returns `Ok(())` once `cancel` fires.
///
/// # Errors
///
/// Any event stream failure, including the stream ending, is returned as
/// there is no other way to notice stopped containers in time.
pub async fn watch_events<R: ContainerRuntime>(
    runtime: Arc<R>,
    batches: BatchSender,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut stream = runtime.events();
    log::debug!("Subscribed to container events");

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            event = stream.next() => event,
        };

        let event = match event {
            Some(Ok(event)) => event,
            Some(Err(err)) => {
                log::error!("Got an error while listening to events: {}", err);
                return Err(Error::EventStream(err));
            }
            None => {
                log::error!("The runtime closed the event stream");
                return Err(Error::EventStreamClosed);
            }
        };
        log::trace!("Got an event {:?}", event);

        let sent = match classify(&event) {
            Some(Lifecycle::Started(id)) => {
                log::info!("Got a start of container `{}`", id.short());
                metrics.record_event(ACTION_START);
                batches.add(vec![id]).await
            }
            Some(Lifecycle::Stopped(id)) => {
                log::info!("Got a stop of container `{}`", id.short());
                metrics.record_event(ACTION_DIE);
                batches.remove(vec![id]).await
            }
            None => Ok(()),
        };

        if let Err(err) = sent {
            if cancel.is_cancelled() {
                return Ok(());
            }
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::registry::batch_channel;
    use crate::runtime::fake::{FakeRuntime, container_event, container_id};

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&container_event("start", "abc")),
            Some(Lifecycle::Started(container_id("abc")))
        );
        assert_eq!(
            classify(&container_event("die", "abc")),
            Some(Lifecycle::Stopped(container_id("abc")))
        );
        assert_eq!(classify(&container_event("create", "abc")), None);
        assert_eq!(classify(&container_event("stop", "abc")), None);
        assert_eq!(classify(&container_event("start", "")), None);

        let mut network_event = container_event("start", "abc");
        network_event.kind = EventKind::Other("network".to_owned());
        assert_eq!(classify(&network_event), None);

        let mut anonymous = container_event("die", "abc");
        anonymous.actor_id = None;
        assert_eq!(classify(&anonymous), None);
    }

    fn metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new("test", "").unwrap())
    }

    #[tokio::test]
    async fn test_watch_events_forwards_batches() {
        let runtime = Arc::new(FakeRuntime::default());
        let events = runtime.event_sender();
        let (tx, mut rx) = batch_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(watch_events(
            Arc::clone(&runtime),
            tx,
            metrics(),
            cancel.clone(),
        ));

        events.send(Ok(container_event("create", "a"))).unwrap();
        events.send(Ok(container_event("start", "a"))).unwrap();
        events.send(Ok(container_event("die", "b"))).unwrap();

        assert_eq!(rx.add_rx.recv().await, Some(vec![container_id("a")]));
        assert_eq!(rx.remove_rx.recv().await, Some(vec![container_id("b")]));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_watch_events_fails_on_stream_error() {
        let runtime = Arc::new(FakeRuntime::default());
        let events = runtime.event_sender();
        let (tx, _rx) = batch_channel();

        events
            .send(Err(crate::runtime::Error::EventStream(
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 500,
                    message: "broken pipe".to_owned(),
                },
            )))
            .unwrap();

        let result = watch_events(runtime, tx, metrics(), CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::EventStream(_))));
    }

    #[tokio::test]
    async fn test_watch_events_fails_when_stream_ends() {
        let runtime = Arc::new(FakeRuntime::default());
        let events = runtime.event_sender();
        drop(events);
        let (tx, _rx) = batch_channel();

        let result = watch_events(runtime, tx, metrics(), CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::EventStreamClosed)));
    }
}
