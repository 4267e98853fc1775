use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::container::ContainerID;

/// A running container as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: ContainerID,
    pub labels: HashMap<String, String>,
}

/// Transport protocol of an exposed port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
    Other(String),
}

impl Protocol {
    /// Parses the protocol suffix of a `<port>/<proto>` key. A missing suffix
    /// means TCP.
    pub fn from_suffix(suffix: Option<&str>) -> Self {
        match suffix.map(str::to_ascii_lowercase).as_deref() {
            None | Some("tcp") => Self::Tcp,
            Some("udp") => Self::Udp,
            Some("sctp") => Self::Sctp,
            Some(other) => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
            Protocol::Sctp => f.write_str("sctp"),
            Protocol::Other(other) => f.write_str(other),
        }
    }
}

/// One exposed container port together with the host ports it is published on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: Protocol,
    pub host_ports: Vec<u16>,
}

impl PortMapping {
    /// The port a scraper should use: the first published host port, or the
    /// container port itself when the port is exposed but not published.
    pub fn scrape_port(&self) -> u16 {
        self.host_ports
            .first()
            .copied()
            .unwrap_or(self.container_port)
    }
}

/// Current state of a single container as reported by an inspect call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetail {
    pub id: ContainerID,
    /// Container name without the leading `/`.
    pub name: String,
    pub running: bool,
    pub labels: HashMap<String, String>,
    pub ports: Vec<PortMapping>,
    /// Attached network name to the address assigned on that network. Only
    /// networks with an assigned address are listed.
    pub networks: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Container,
    Other(String),
}

/// A raw lifecycle event, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub kind: EventKind,
    pub action: String,
    pub actor_id: Option<String>,
}
