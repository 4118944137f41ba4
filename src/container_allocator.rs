use std::fmt::{Display, Formatter};
use std::sync::Arc;
use crate::attempt::AttemptGuard;
use crate::error::SchedulerResult;
use crate::node::SchedulerNode;
use crate::resource::Resource;
use crate::resource_request::NodeType;
use crate::rm_container::RMContainer;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulingMode {
    /// Only requests for the node's own partition are considered.
    RespectPartitionExclusivity,
    /// Requests of the default partition may use idle labelled nodes.
    IgnorePartitionExclusivity,
}

/// Limits handed down by the parent queue for one heartbeat.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    pub limit: Resource,
    /// Resource the attempt has to give back elsewhere before it may grow on this node.
    pub amount_needed_unreserve: Resource,
}

impl ResourceLimits {
    pub fn new(limit: Resource) -> Self {
        Self {
            limit,
            amount_needed_unreserve: Resource::ZERO,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssignmentKind {
    Allocated,
    Reserved,
    /// The attempt had demand but passed on this node (locality delay, limits).
    Skipped,
    Nothing,
}

impl Display for AssignmentKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            AssignmentKind::Allocated => write!(f, "allocated"),
            AssignmentKind::Reserved => write!(f, "reserved"),
            AssignmentKind::Skipped => write!(f, "skipped"),
            AssignmentKind::Nothing => write!(f, "nothing"),
        }
    }
}

/// Outcome of one `assign_containers` call.
#[derive(Clone, Debug)]
pub struct Assignment {
    pub resource: Resource,
    pub kind: AssignmentKind,
    pub node_type: Option<NodeType>,
    pub container: Option<Arc<RMContainer>>,
    /// Reservation released so this assignment could happen.
    pub excess_reservation: Option<Arc<RMContainer>>,
}

impl Assignment {
    pub fn nothing() -> Self {
        Self {
            resource: Resource::ZERO,
            kind: AssignmentKind::Nothing,
            node_type: None,
            container: None,
            excess_reservation: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            kind: AssignmentKind::Skipped,
            ..Self::nothing()
        }
    }

    pub fn allocated(container: Arc<RMContainer>, node_type: NodeType) -> Self {
        Self {
            resource: container.allocated_resource(),
            kind: AssignmentKind::Allocated,
            node_type: Some(node_type),
            container: Some(container),
            excess_reservation: None,
        }
    }

    pub fn reserved(container: Arc<RMContainer>, node_type: NodeType) -> Self {
        Self {
            resource: container.allocated_resource(),
            kind: AssignmentKind::Reserved,
            node_type: Some(node_type),
            container: Some(container),
            excess_reservation: None,
        }
    }
}

pub trait ContainerAllocator: Send + Sync {
    /// Decides what the attempt gets on `node`, calling back into `attempt` to allocate,
    /// reserve or unreserve. Runs with the attempt lock held.
    fn assign_containers(&self, attempt: &mut AttemptGuard<'_>, cluster_resource: &Resource,
                         node: &Arc<SchedulerNode>, limits: &ResourceLimits, mode: SchedulingMode,
                         reserved_container: Option<Arc<RMContainer>>) -> SchedulerResult<Assignment>;
}
