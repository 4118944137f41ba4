//! Error types of the attempt scheduler.

use thiserror::Error;
use crate::container::{ApplicationAttemptId, ContainerId, NodeId, Priority};
use crate::resource::Resource;
use crate::rm_container::{RMContainerEventType, RMContainerState};

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Which usage counter an accounting violation refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UsageKind {
    Used,
    Reserved,
}

impl std::fmt::Display for UsageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            UsageKind::Used => write!(f, "used"),
            UsageKind::Reserved => write!(f, "reserved"),
        }
    }
}

/// Errors surfaced by attempt operations.
///
/// Business-as-usual misses are never errors. Everything here means the attempt's
/// bookkeeping can no longer be trusted, except `InvalidTransition`, which the caller may log
/// and ignore.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A usage counter would become negative.
    #[error("{kind} usage on partition '{partition}' would go negative: {current} - {delta}")]
    AccountingViolation {
        partition: String,
        kind: UsageKind,
        current: Resource,
        delta: Resource,
    },

    /// A container id is already indexed as live.
    #[error("container {0} is already live")]
    DuplicateContainer(ContainerId),

    /// A lifecycle event is not valid in the container's current state.
    #[error("container {container_id}: invalid event {event} in state {state}")]
    InvalidTransition {
        container_id: ContainerId,
        state: RMContainerState,
        event: RMContainerEventType,
    },

    /// The node already hosts a reservation of another attempt.
    #[error("node {node_id} is already reserved by {holder}")]
    NodeReservedByOther {
        node_id: NodeId,
        holder: ApplicationAttemptId,
    },

    /// The node already hosts a reservation of the same attempt at another priority.
    #[error("node {node_id} is already reserved at priority {priority}")]
    NodeReservedAtPriority {
        node_id: NodeId,
        priority: Priority,
    },

    /// A reservation handed in for refresh belongs to another priority or node.
    #[error("reservation {container_id} is not held at priority {priority} on node {node_id}")]
    ReservationMismatch {
        container_id: ContainerId,
        node_id: NodeId,
        priority: Priority,
    },

    /// The attempt was stopped and no longer accepts new resources.
    #[error("attempt {0} is stopped")]
    AttemptStopped(ApplicationAttemptId),
}

/// Errors raised while loading the scheduler configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
