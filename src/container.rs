//! Identifiers and the immutable container grant.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use crate::resource::Resource;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId {
    pub cluster_timestamp: u64,
    pub id: u32,
}

impl ApplicationId {
    pub fn new(cluster_timestamp: u64, id: u32) -> Self {
        Self {
            cluster_timestamp,
            id
        }
    }
}

impl Display for ApplicationId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "application_{}_{:04}", self.cluster_timestamp, self.id)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationAttemptId {
    pub application_id: ApplicationId,
    pub attempt_id: u32,
}

impl ApplicationAttemptId {
    pub fn new(application_id: ApplicationId, attempt_id: u32) -> Self {
        Self {
            application_id,
            attempt_id
        }
    }
}

impl Display for ApplicationAttemptId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "appattempt_{}_{:04}_{:06}", self.application_id.cluster_timestamp,
               self.application_id.id, self.attempt_id)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId {
    pub attempt: ApplicationAttemptId,
    pub id: u64,
}

impl ContainerId {
    pub fn new(attempt: ApplicationAttemptId, id: u64) -> Self {
        Self {
            attempt,
            id
        }
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "container_{}_{:04}_{:02}_{:06}", self.attempt.application_id.cluster_timestamp,
               self.attempt.application_id.id, self.attempt.attempt_id, self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub host: String,
    pub port: u16,
}

impl NodeId {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port
        }
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Request priority. Lower value means more important.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Priority(pub i32);

impl Priority {
    pub const UNDEFINED: Priority = Priority(-1);
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A granted bundle of node resources. Immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub node_id: NodeId,
    pub resource: Resource,
    pub priority: Priority,
}

impl Container {
    pub fn new(id: ContainerId, node_id: NodeId, resource: Resource, priority: Priority) -> Self {
        Self {
            id,
            node_id,
            resource,
            priority
        }
    }
}

/// Exit codes reported by the node for finished containers.
pub mod exit_status {
    pub const SUCCESS: i32 = 0;
    pub const INVALID: i32 = -1000;
    pub const ABORTED: i32 = -100;
    pub const DISKS_FAILED: i32 = -101;
    pub const PREEMPTED: i32 = -102;
    pub const KILLED_BY_RESOURCEMANAGER: i32 = -106;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Running,
    Complete,
}

impl Display for ContainerState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ContainerState::Running => write!(f, "running"),
            ContainerState::Complete => write!(f, "complete"),
        }
    }
}

/// Status reported by the node when a container exits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub container_id: ContainerId,
    pub state: ContainerState,
    pub exit_status: i32,
    pub diagnostics: String,
}

impl ContainerStatus {
    pub fn new(container_id: ContainerId, state: ContainerState, exit_status: i32,
               diagnostics: impl Into<String>) -> Self {
        Self {
            container_id,
            state,
            exit_status,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn completed(container_id: ContainerId, exit_status: i32) -> Self {
        Self::new(container_id, ContainerState::Complete, exit_status, "")
    }
}
