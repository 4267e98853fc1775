use std::collections::BTreeMap;

use crate::container::ContainerID;

/// One entry of a Prometheus file-based service discovery document.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

/// A container that is running, opted in and resolved to a target group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedContainer {
    pub id: ContainerID,
    pub target_group: TargetGroup,
}
