use std::collections::BTreeSet;
use serde::Serialize;
use crate::container::{Container, ContainerId};
use crate::resource::Resource;
use crate::resource_request::ResourceRequest;

/// What the application master gets on its next heartbeat.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Allocation {
    /// Containers granted since the previous pull.
    pub containers: Vec<Container>,
    pub headroom: Resource,
    /// Containers the preemption policy wants back.
    pub preempted_container_ids: BTreeSet<ContainerId>,
    /// Hint for the application master: how many minimum-size containers would cover the
    /// pending preemption.
    pub resource_requests: Vec<ResourceRequest>,
}

/// Summary of an attempt's consumption.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResourceUsageReport {
    pub num_used_containers: usize,
    pub num_reserved_containers: usize,
    pub used: Resource,
    pub reserved: Resource,
    pub needed: Resource,
    pub memory_seconds: u64,
    pub vcore_seconds: u64,
}
