//! Scheduler-side representation of a cluster node

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use serde::Serialize;
use crate::container::{ApplicationAttemptId, Container, ContainerId, NodeId, Priority};
use crate::error::{SchedulerError, SchedulerResult};
use crate::resource::Resource;
use crate::rm_container::RMContainer;

/// Partition of nodes without a label.
pub const NO_LABEL: &str = "";

/// Node state (a node that is not running gets no new containers)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum NodeState {
    Running,
    Unhealthy,
    Decommissioned,
}

impl Display for NodeState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            NodeState::Running => write!(f, "running"),
            NodeState::Unhealthy => write!(f, "unhealthy"),
            NodeState::Decommissioned => write!(f, "decommissioned"),
        }
    }
}

/// Lookup-only reference from a node to the reservation it hosts. The owning attempt keeps
/// the strong reference.
struct ReservationRef {
    attempt_id: ApplicationAttemptId,
    priority: Priority,
    container_id: ContainerId,
    container: Weak<RMContainer>,
}

struct NodeAccounting {
    state: NodeState,
    allocated: Resource,
    containers: HashMap<ContainerId, Container>,
    reservation: Option<ReservationRef>,
}

pub struct SchedulerNode {
    node_id: NodeId,
    rack_name: String,
    partition: String,
    total: Resource,
    accounting: Mutex<NodeAccounting>,
}

impl SchedulerNode {
    pub fn new(node_id: NodeId, rack_name: impl Into<String>, total: Resource) -> Self {
        Self::with_partition(node_id, rack_name, NO_LABEL, total)
    }

    pub fn with_partition(node_id: NodeId, rack_name: impl Into<String>, partition: impl Into<String>,
                          total: Resource) -> Self {
        Self {
            node_id,
            rack_name: rack_name.into(),
            partition: partition.into(),
            total,
            accounting: Mutex::new(NodeAccounting {
                state: NodeState::Running,
                allocated: Resource::ZERO,
                containers: HashMap::default(),
                reservation: None,
            }),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn host(&self) -> &str {
        &self.node_id.host
    }

    pub fn rack_name(&self) -> &str {
        &self.rack_name
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn total_resource(&self) -> Resource {
        self.total
    }

    pub fn state(&self) -> NodeState {
        self.accounting.lock().state
    }

    pub fn set_state(&self, state: NodeState) {
        self.accounting.lock().state = state;
    }

    pub fn allocated_resource(&self) -> Resource {
        self.accounting.lock().allocated
    }

    pub fn unallocated_resource(&self) -> Resource {
        self.total.sub_clamped(&self.accounting.lock().allocated)
    }

    pub fn num_containers(&self) -> usize {
        self.accounting.lock().containers.len()
    }

    /// Books a container on this node. Returns false if it does not fit.
    pub fn allocate_container(&self, container: &Container) -> bool {
        let mut accounting = self.accounting.lock();
        let unallocated = self.total.sub_clamped(&accounting.allocated);
        if !container.resource.fits_in(&unallocated) {
            return false;
        }
        accounting.allocated = accounting.allocated + container.resource;
        accounting.containers.insert(container.id, container.clone());
        true
    }

    /// Frees a container's resources. Unknown containers are ignored.
    pub fn release_container(&self, container_id: &ContainerId) -> bool {
        let mut accounting = self.accounting.lock();
        match accounting.containers.remove(container_id) {
            Some(container) => {
                accounting.allocated = accounting.allocated.sub_clamped(&container.resource);
                true
            }
            None => {
                log::debug!("release of unknown container {} on node {}", container_id, self.node_id);
                false
            }
        }
    }

    /// Records that `attempt_id` holds a reservation here at `priority`. A node hosts one
    /// reservation: refreshing it is allowed, taking it at another priority or for another
    /// attempt is not.
    pub fn reserve_resource(&self, attempt_id: ApplicationAttemptId, priority: Priority,
                            container: &Arc<RMContainer>) -> SchedulerResult<()> {
        let mut accounting = self.accounting.lock();
        if let Some(existing) = accounting.reservation.as_ref().filter(|r| r.container.strong_count() > 0) {
            if existing.attempt_id != attempt_id {
                return Err(SchedulerError::NodeReservedByOther {
                    node_id: self.node_id.clone(),
                    holder: existing.attempt_id,
                });
            }
            if existing.priority != priority {
                return Err(SchedulerError::NodeReservedAtPriority {
                    node_id: self.node_id.clone(),
                    priority: existing.priority,
                });
            }
        }
        accounting.reservation = Some(ReservationRef {
            attempt_id,
            priority,
            container_id: container.container_id(),
            container: Arc::downgrade(container),
        });
        Ok(())
    }

    /// Drops the back-reference if it points at `container_id` of `attempt_id`.
    pub fn unreserve_resource(&self, attempt_id: ApplicationAttemptId, container_id: ContainerId) -> bool {
        let mut accounting = self.accounting.lock();
        match &accounting.reservation {
            Some(existing) if existing.attempt_id == attempt_id && existing.container_id == container_id => {
                accounting.reservation = None;
                true
            }
            Some(existing) => {
                log::warn!("node {} hosts {} of {}, not {} of {}", self.node_id, existing.container_id,
                    existing.attempt_id, container_id, attempt_id);
                false
            }
            None => false,
        }
    }

    /// The hosted reservation, if its owner still holds it.
    pub fn reserved_container(&self) -> Option<Arc<RMContainer>> {
        self.accounting.lock().reservation.as_ref().and_then(|r| r.container.upgrade())
    }

    pub fn reservation_holder(&self) -> Option<(ApplicationAttemptId, Priority)> {
        self.accounting.lock().reservation.as_ref()
            .filter(|r| r.container.strong_count() > 0)
            .map(|r| (r.attempt_id, r.priority))
    }
}

impl Display for SchedulerNode {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.node_id)
    }
}
