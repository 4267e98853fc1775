use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::mpsc;

use crate::container::ContainerID;

use super::models::{
    ContainerDetail, ContainerSummary, EventKind, PortMapping, Protocol, RuntimeEvent,
};
use super::{ContainerRuntime, Error, Result};

/// In-memory runtime for tests.
#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<ContainerID, ContainerDetail>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<Result<RuntimeEvent>>>>,
    failing_lists: AtomicUsize,
    list_ignores_filter: AtomicBool,
    inspect_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FakeRuntime {
    pub fn insert(&self, detail: ContainerDetail) {
        self.containers
            .lock()
            .unwrap()
            .insert(detail.id.clone(), detail);
    }

    pub fn remove(&self, id: &ContainerID) {
        self.containers.lock().unwrap().remove(id);
    }

    pub fn set_running(&self, id: &ContainerID, running: bool) {
        if let Some(detail) = self.containers.lock().unwrap().get_mut(id) {
            detail.running = running;
        }
    }

    /// Makes the next `n` listings fail.
    pub fn fail_next_lists(&self, n: usize) {
        self.failing_lists.store(n, Ordering::SeqCst);
    }

    /// Makes listings return every running container, like a daemon whose
    /// label filter lags behind the labels it reports.
    pub fn list_ignores_filter(&self, ignore: bool) {
        self.list_ignores_filter.store(ignore, Ordering::SeqCst);
    }

    pub fn inspect_calls(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Returns the sending half of the event stream handed out by `events()`.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<Result<RuntimeEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(rx);
        tx
    }
}

impl ContainerRuntime for FakeRuntime {
    async fn list_running(&self, label_filter: &str) -> Result<Vec<ContainerSummary>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::ListContainers(
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 500,
                    message: "daemon unavailable".to_owned(),
                },
            ));
        }

        let (key, value) = label_filter.split_once('=').unwrap_or((label_filter, ""));
        let ignore_filter = self.list_ignores_filter.load(Ordering::SeqCst);
        let mut out: Vec<ContainerSummary> = self
            .containers
            .lock()
            .unwrap()
            .values()
            .filter(|detail| detail.running)
            .filter(|detail| {
                ignore_filter || detail.labels.get(key).map(String::as_str) == Some(value)
            })
            .map(|detail| ContainerSummary {
                id: detail.id.clone(),
                labels: detail.labels.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn inspect(&self, id: &ContainerID) -> Result<ContainerDetail> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NoSuchContainer { id: id.to_string() })
    }

    fn events(&self) -> BoxStream<'_, Result<RuntimeEvent>> {
        match self.events.lock().unwrap().take() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }
}

pub fn container_id(raw: &str) -> ContainerID {
    ContainerID::new(raw).unwrap()
}

pub fn tcp_port(container_port: u16, host_port: Option<u16>) -> PortMapping {
    PortMapping {
        container_port,
        protocol: Protocol::Tcp,
        host_ports: host_port.into_iter().collect(),
    }
}

/// A running container opted in to scraping, with one published TCP port and
/// attached to `network` with `ip`.
pub fn scrape_container(id: &str, network: &str, ip: &str) -> ContainerDetail {
    let mut labels = HashMap::new();
    labels.insert("prometheus.io/scrape".to_owned(), "true".to_owned());
    let mut networks = BTreeMap::new();
    networks.insert(network.to_owned(), ip.to_owned());

    ContainerDetail {
        id: container_id(id),
        name: format!("{}-name", id),
        running: true,
        labels,
        ports: vec![tcp_port(8080, Some(32768))],
        networks,
    }
}

pub fn container_event(action: &str, id: &str) -> RuntimeEvent {
    RuntimeEvent {
        kind: EventKind::Container,
        action: action.to_owned(),
        actor_id: Some(id.to_owned()),
    }
}
