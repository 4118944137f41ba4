//! Scheduler-side view of a container: the grant plus its lifecycle state.

use std::fmt::{Display, Formatter};
use std::time::Instant;
use parking_lot::Mutex;
use serde::Serialize;
use crate::container::{ApplicationAttemptId, Container, ContainerId, ContainerStatus, NodeId, Priority};
use crate::error::{SchedulerError, SchedulerResult};
use crate::resource::Resource;
use crate::resource_request::ResourceRequest;

/// Lifecycle state of an RMContainer.
///
/// `Reserved` is a side state: a reservation either converts to `Allocated` or is `Released`,
/// it never runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RMContainerState {
    New,
    Reserved,
    Allocated,
    Acquired,
    Running,
    Completed,
    Killed,
    Expired,
    Released,
}

impl RMContainerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RMContainerState::Completed | RMContainerState::Killed |
            RMContainerState::Expired | RMContainerState::Released)
    }
}

impl Display for RMContainerState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RMContainerState::New => write!(f, "new"),
            RMContainerState::Reserved => write!(f, "reserved"),
            RMContainerState::Allocated => write!(f, "allocated"),
            RMContainerState::Acquired => write!(f, "acquired"),
            RMContainerState::Running => write!(f, "running"),
            RMContainerState::Completed => write!(f, "completed"),
            RMContainerState::Killed => write!(f, "killed"),
            RMContainerState::Expired => write!(f, "expired"),
            RMContainerState::Released => write!(f, "released"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RMContainerEventType {
    Start,
    Reserved,
    Acquired,
    Launched,
    Finished,
    Kill,
    Expire,
    Released,
}

impl Display for RMContainerEventType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RMContainerEventType::Start => write!(f, "START"),
            RMContainerEventType::Reserved => write!(f, "RESERVED"),
            RMContainerEventType::Acquired => write!(f, "ACQUIRED"),
            RMContainerEventType::Launched => write!(f, "LAUNCHED"),
            RMContainerEventType::Finished => write!(f, "FINISHED"),
            RMContainerEventType::Kill => write!(f, "KILL"),
            RMContainerEventType::Expire => write!(f, "EXPIRE"),
            RMContainerEventType::Released => write!(f, "RELEASED"),
        }
    }
}

/// Transition table. `None` means the event is not accepted in `state`.
fn next_state(state: RMContainerState, event: RMContainerEventType) -> Option<RMContainerState> {
    use RMContainerEventType as E;
    use RMContainerState as S;

    match (state, event) {
        (S::New, E::Start) => Some(S::Allocated),
        (S::New, E::Reserved) => Some(S::Reserved),
        (S::New, E::Kill) => Some(S::Killed),

        (S::Reserved, E::Reserved) => Some(S::Reserved),
        (S::Reserved, E::Start) => Some(S::Allocated),
        (S::Reserved, E::Released | E::Kill) => Some(S::Released),

        (S::Allocated, E::Acquired) => Some(S::Acquired),
        (S::Allocated, E::Expire) => Some(S::Expired),
        (S::Acquired, E::Launched) => Some(S::Running),
        (S::Acquired, E::Expire) => Some(S::Expired),

        (S::Allocated | S::Acquired | S::Running, E::Finished) => Some(S::Completed),
        (S::Allocated | S::Acquired | S::Running, E::Kill) => Some(S::Killed),
        (S::Allocated | S::Acquired | S::Running, E::Released) => Some(S::Released),

        _ => None,
    }
}

struct Lifecycle {
    state: RMContainerState,
    finished_status: Option<ContainerStatus>,
    resource_requests: Vec<ResourceRequest>,
}

/// Shared between the owning attempt, the node (as a weak back-reference for reservations)
/// and callers, so the mutable lifecycle sits behind its own lock.
pub struct RMContainer {
    container: Container,
    attempt_id: ApplicationAttemptId,
    partition: String,
    creation_time: Instant,
    lifecycle: Mutex<Lifecycle>,
}

impl RMContainer {
    pub fn new(container: Container, attempt_id: ApplicationAttemptId, partition: impl Into<String>) -> Self {
        Self {
            container,
            attempt_id,
            partition: partition.into(),
            creation_time: Instant::now(),
            lifecycle: Mutex::new(Lifecycle {
                state: RMContainerState::New,
                finished_status: None,
                resource_requests: Vec::default(),
            }),
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_id(&self) -> ContainerId {
        self.container.id
    }

    pub fn allocated_resource(&self) -> Resource {
        self.container.resource
    }

    pub fn node_id(&self) -> &NodeId {
        &self.container.node_id
    }

    pub fn priority(&self) -> Priority {
        self.container.priority
    }

    pub fn attempt_id(&self) -> ApplicationAttemptId {
        self.attempt_id
    }

    /// Partition (node label) of the node the container was granted on.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn creation_time(&self) -> Instant {
        self.creation_time
    }

    pub fn state(&self) -> RMContainerState {
        self.lifecycle.lock().state
    }

    pub fn finished_status(&self) -> Option<ContainerStatus> {
        self.lifecycle.lock().finished_status.clone()
    }

    /// Requests consumed by this allocation, kept so they can be put back on recovery.
    pub fn resource_requests(&self) -> Vec<ResourceRequest> {
        self.lifecycle.lock().resource_requests.clone()
    }

    pub(crate) fn set_resource_requests(&self, requests: Vec<ResourceRequest>) {
        self.lifecycle.lock().resource_requests = requests;
    }

    /// Applies a lifecycle event and returns the new state.
    /// An event that does not fit the current state leaves it untouched.
    pub fn handle(&self, event: RMContainerEventType) -> SchedulerResult<RMContainerState> {
        let mut lifecycle = self.lifecycle.lock();
        self.transition(&mut lifecycle, event)
    }

    /// Same as `handle`, and records the node-reported status on success.
    pub fn handle_finished(&self, event: RMContainerEventType,
                           status: ContainerStatus) -> SchedulerResult<RMContainerState> {
        let mut lifecycle = self.lifecycle.lock();
        let state = self.transition(&mut lifecycle, event)?;
        lifecycle.finished_status = Some(status);
        Ok(state)
    }

    fn transition(&self, lifecycle: &mut Lifecycle,
                  event: RMContainerEventType) -> SchedulerResult<RMContainerState> {
        match next_state(lifecycle.state, event) {
            Some(state) => {
                log::trace!("{} transitioned from {} to {} on {}", self.container.id, lifecycle.state,
                    state, event);
                lifecycle.state = state;
                Ok(state)
            }
            None => Err(SchedulerError::InvalidTransition {
                container_id: self.container.id,
                state: lifecycle.state,
                event,
            }),
        }
    }
}

impl std::fmt::Debug for RMContainer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RMContainer")
            .field("container", &self.container)
            .field("attempt_id", &self.attempt_id)
            .field("partition", &self.partition)
            .field("state", &self.state())
            .finish()
    }
}
