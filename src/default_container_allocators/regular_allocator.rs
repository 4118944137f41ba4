use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use crate::attempt::AttemptGuard;
use crate::container::{Container, Priority};
use crate::container_allocator::{Assignment, AssignmentKind, ContainerAllocator, ResourceLimits, SchedulingMode};
use crate::error::SchedulerResult;
use crate::node::{NodeState, SchedulerNode, NO_LABEL};
use crate::resource::Resource;
use crate::resource_request::{Location, NodeType, ResourceRequest};
use crate::rm_container::RMContainer;

/// Delay scheduling allocator: node-local first, then rack-local, then off-switch once the
/// priority has missed enough scheduling opportunities. Reserves when the node is too full.
pub struct RegularContainerAllocator {
    cluster_nodes: Arc<AtomicUsize>,
}

impl RegularContainerAllocator {
    pub fn new(cluster_nodes: Arc<AtomicUsize>) -> Self {
        Self { cluster_nodes }
    }

    /// Allocator for a cluster of fixed size.
    pub fn with_cluster_size(cluster_nodes: usize) -> Self {
        Self::new(Arc::new(AtomicUsize::new(cluster_nodes)))
    }

    fn cluster_nodes(&self) -> usize {
        self.cluster_nodes.load(Ordering::Relaxed)
    }

    /// Rounds `capability` up to the configured allocation step and bounds.
    fn normalize(attempt: &AttemptGuard<'_>, capability: &Resource) -> Resource {
        let config = attempt.config();
        attempt.calculator().normalize(capability, &config.minimum_allocation, &config.maximum_allocation,
                                       &config.minimum_allocation)
    }

    /// Resource this attempt must give up elsewhere before it may take more, if the
    /// configuration allows looking past its reservations at all.
    fn needed_unreserve(attempt: &AttemptGuard<'_>, limits: &ResourceLimits) -> Option<Resource> {
        if attempt.config().reservations_continue_look_all_nodes && !limits.amount_needed_unreserve.is_zero() {
            Some(limits.amount_needed_unreserve)
        } else {
            None
        }
    }

    /// Missed opportunities required before leaving node locality.
    fn node_locality_delay(&self, attempt: &AttemptGuard<'_>, priority: Priority) -> f32 {
        let cluster_nodes = self.cluster_nodes();
        let configured = attempt.config().node_locality_delay;
        if configured < 0 {
            attempt.locality_wait_factor(priority, cluster_nodes) * cluster_nodes as f32
        } else {
            configured.min(cluster_nodes as i32) as f32
        }
    }

    fn can_assign(&self, attempt: &AttemptGuard<'_>, priority: Priority, node_type: NodeType,
                  request: &ResourceRequest) -> bool {
        let missed = attempt.scheduling_opportunities(priority) as f32;
        let node_delay = self.node_locality_delay(attempt, priority);
        match node_type {
            NodeType::NodeLocal => true,
            NodeType::RackLocal => missed >= node_delay,
            NodeType::OffSwitch => {
                let rack_delay = attempt.config().rack_locality_additional_delay.max(0) as f32;
                request.relax_locality && missed >= node_delay + rack_delay
            }
        }
    }

    /// Picks the most local request at `priority` the node may serve right now.
    fn pick_request(&self, attempt: &AttemptGuard<'_>, node: &SchedulerNode, priority: Priority,
                    reserved: bool) -> Option<(NodeType, ResourceRequest)> {
        let book = attempt.request_book();
        let pending = |location: Location| book.get(priority, &location)
            .filter(|request| request.num_containers > 0)
            .cloned();

        let any = pending(Location::Any)?;
        if let Some(request) = pending(Location::Node(node.host().to_string())) {
            return Some((NodeType::NodeLocal, request));
        }
        if let Some(request) = pending(Location::Rack(node.rack_name().to_string())) {
            if reserved || self.can_assign(attempt, priority, NodeType::RackLocal, &request) {
                return Some((NodeType::RackLocal, request));
            }
            return None;
        }
        if reserved || self.can_assign(attempt, priority, NodeType::OffSwitch, &any) {
            return Some((NodeType::OffSwitch, any));
        }
        None
    }

    fn assign_at_priority(&self, attempt: &mut AttemptGuard<'_>, cluster_resource: &Resource,
                          node: &Arc<SchedulerNode>, priority: Priority, limits: &ResourceLimits,
                          reserved: Option<Arc<RMContainer>>) -> SchedulerResult<Assignment> {
        let Some((node_type, request)) = self.pick_request(attempt, node, priority, reserved.is_some()) else {
            if let Some(reserved) = reserved {
                if attempt.request_book().total_required_containers(priority) == 0 {
                    log::debug!("{} no longer needs {}, releasing the reservation", attempt.attempt_id(),
                        reserved.container_id());
                    attempt.unreserve(priority, node, &reserved)?;
                    let mut assignment = Assignment::nothing();
                    assignment.excess_reservation = Some(reserved);
                    return Ok(assignment);
                }
            }
            return Ok(Assignment::skipped());
        };
        let capability = Self::normalize(attempt, &request.capability);
        if !capability.fits_in(&node.total_resource()) {
            log::debug!("{} asks for {} which never fits on node {}", attempt.attempt_id(), capability,
                node.node_id());
            return Ok(Assignment::nothing());
        }

        let needed_unreserve = Self::needed_unreserve(attempt, limits);
        if capability.fits_in(&node.unallocated_resource()) {
            let mut excess_reservation = None;
            if let Some(needed) = needed_unreserve {
                let Some(to_unreserve) = attempt.find_node_to_unreserve(cluster_resource, node, priority,
                                                                        &needed) else {
                    return Ok(Assignment::skipped());
                };
                if let Some(reserved_node) = attempt.reserved_node(priority, to_unreserve.node_id()) {
                    attempt.unreserve(priority, &reserved_node, &to_unreserve)?;
                }
                excess_reservation = Some(to_unreserve);
            }
            let mut assignment = self.allocate_on_node(attempt, node, node_type, priority, &request, capability,
                                                       reserved)?;
            if excess_reservation.is_some() {
                assignment.excess_reservation = excess_reservation;
            }
            return Ok(assignment);
        }

        if needed_unreserve.is_some() {
            return Ok(Assignment::skipped());
        }
        if let Some((holder, held_priority)) = node.reservation_holder() {
            if holder != attempt.attempt_id() || held_priority != priority {
                log::debug!("node {} is reserved by {} at priority {}, {} can't reserve it at {}", node.node_id(),
                    holder, held_priority, attempt.attempt_id(), priority);
                return Ok(Assignment::skipped());
            }
        }
        let existing = reserved.or_else(|| attempt.reservation(priority, node.node_id()));
        let container = match &existing {
            Some(existing) => existing.container().clone(),
            None => Container::new(attempt.new_container_id(), node.node_id().clone(), capability, priority),
        };
        let rm_container = attempt.reserve(priority, node, existing, container)?;
        Ok(Assignment::reserved(rm_container, node_type))
    }

    fn allocate_on_node(&self, attempt: &mut AttemptGuard<'_>, node: &Arc<SchedulerNode>, node_type: NodeType,
                        priority: Priority, request: &ResourceRequest, capability: Resource,
                        reserved: Option<Arc<RMContainer>>) -> SchedulerResult<Assignment> {
        // A reservation held here turns into the container itself.
        let reservation = reserved.or_else(|| attempt.reservation(priority, node.node_id()));
        let container = match &reservation {
            Some(reservation) => reservation.container().clone(),
            None => Container::new(attempt.new_container_id(), node.node_id().clone(), capability, priority),
        };
        if !node.allocate_container(&container) {
            return Ok(Assignment::skipped());
        }
        match attempt.allocate(node_type, node, priority, request, container.clone()) {
            Ok(Some(rm_container)) => {
                if node_type != NodeType::OffSwitch {
                    attempt.reset_scheduling_opportunities(priority);
                }
                Ok(Assignment::allocated(rm_container, node_type))
            }
            Ok(None) => {
                node.release_container(&container.id);
                Ok(Assignment::nothing())
            }
            Err(e) => {
                node.release_container(&container.id);
                Err(e)
            }
        }
    }

    fn accepts_partition(node: &SchedulerNode, request: &ResourceRequest, mode: SchedulingMode) -> bool {
        let label = request.node_label.as_deref().unwrap_or(NO_LABEL);
        label == node.partition() || (mode == SchedulingMode::IgnorePartitionExclusivity && label == NO_LABEL)
    }
}

impl ContainerAllocator for RegularContainerAllocator {
    fn assign_containers(&self, attempt: &mut AttemptGuard<'_>, cluster_resource: &Resource,
                         node: &Arc<SchedulerNode>, limits: &ResourceLimits, mode: SchedulingMode,
                         reserved_container: Option<Arc<RMContainer>>) -> SchedulerResult<Assignment> {
        if node.state() != NodeState::Running {
            log::debug!("node {} is {}, nothing to assign", node.node_id(), node.state());
            return Ok(Assignment::nothing());
        }

        if let Some(reserved) = reserved_container {
            let priority = reserved.priority();
            let held = attempt.reservation(priority, node.node_id())
                .is_some_and(|current| current.container_id() == reserved.container_id());
            if !held {
                log::debug!("{} no longer holds {} on node {}", attempt.attempt_id(), reserved.container_id(),
                    node.node_id());
                return Ok(Assignment::nothing());
            }
            return self.assign_at_priority(attempt, cluster_resource, node, priority, limits, Some(reserved));
        }

        let max_assign = attempt.config().max_assign_per_heartbeat;
        let mut result = Assignment::nothing();
        let mut assigned = 0;
        'heartbeat: while assigned < max_assign {
            let mut skipped = false;
            let priorities = attempt.request_book().priorities();
            for priority in priorities {
                let Some(any) = attempt.request_book().get(priority, &Location::Any).cloned() else {
                    continue;
                };
                if any.num_containers == 0 || !Self::accepts_partition(node, &any, mode) {
                    continue;
                }
                let consumption = attempt.current_consumption() + Self::normalize(attempt, &any.capability);
                if !attempt.calculator().less_than_or_equal(cluster_resource, &consumption, &limits.limit) {
                    log::debug!("{} would exceed its limit {} at priority {}", attempt.attempt_id(), limits.limit,
                        priority);
                    skipped = true;
                    continue;
                }

                attempt.add_scheduling_opportunity(priority);
                let assignment = self.assign_at_priority(attempt, cluster_resource, node, priority, limits, None)?;
                match assignment.kind {
                    AssignmentKind::Allocated => {
                        assigned += 1;
                        result = Assignment {
                            resource: result.resource + assignment.resource,
                            excess_reservation: assignment.excess_reservation.or(result.excess_reservation),
                            ..assignment
                        };
                        continue 'heartbeat;
                    }
                    AssignmentKind::Reserved => {
                        if result.kind == AssignmentKind::Allocated {
                            return Ok(result);
                        }
                        return Ok(assignment);
                    }
                    AssignmentKind::Skipped => skipped = true,
                    AssignmentKind::Nothing => {}
                }
            }
            if result.kind == AssignmentKind::Nothing && skipped {
                result = Assignment::skipped();
            }
            break;
        }
        Ok(result)
    }
}
