//! Scheduling state of one application attempt.
//!
//! Every operation runs under a single per-attempt lock. Node heartbeats, the completion
//! notifier, the allocation collector and the preemption policy all race on the same attempt,
//! and the usage counters must agree with the container indices after every call.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::{Mutex, MutexGuard};
use crate::allocation::{Allocation, ResourceUsageReport};
use crate::audit::{AuditLogger, AuditOperation, LogAuditLogger};
use crate::container::{ApplicationAttemptId, ApplicationId, Container, ContainerId, ContainerStatus, NodeId, Priority};
use crate::container_allocator::{Assignment, ContainerAllocator, ResourceLimits, SchedulingMode};
use crate::error::{SchedulerError, SchedulerResult, UsageKind};
use crate::headroom_provider::HeadroomProvider;
use crate::node::SchedulerNode;
use crate::queue_metrics::QueueMetrics;
use crate::request_book::ResourceRequestBook;
use crate::reservation::{Reservation, ReservationBook};
use crate::resource::Resource;
use crate::resource_calculator::{resource_calculator_resolver, ResourceCalculator};
use crate::resource_request::{NodeType, ResourceRequest};
use crate::resource_usage::ResourceUsage;
use crate::rm_container::{RMContainer, RMContainerEventType, RMContainerState};
use crate::scheduler_config::SchedulerConfig;

const AUDIT_TARGET: &str = "SchedulerApp";

#[derive(Copy, Clone, Debug, Default)]
struct AggregateUsage {
    memory_seconds: u64,
    vcore_seconds: u64,
}

struct AttemptState {
    is_stopped: bool,
    request_book: ResourceRequestBook,
    live_containers: BTreeMap<ContainerId, Arc<RMContainer>>,
    /// Granted but not yet pulled by the application master.
    newly_allocated: Vec<Arc<RMContainer>>,
    reservations: ReservationBook,
    containers_to_preempt: BTreeSet<ContainerId>,
    usage: ResourceUsage,
    headroom: Resource,
    headroom_provider: Option<Arc<dyn HeadroomProvider>>,
    scheduling_opportunities: HashMap<Priority, u32>,
    re_reservations: HashMap<Priority, u32>,
    aggregate_usage: AggregateUsage,
    last_aggregate_update: Option<Instant>,
    last_container_id: u64,
}

impl AttemptState {
    fn new() -> Self {
        Self {
            is_stopped: false,
            request_book: ResourceRequestBook::new(),
            live_containers: BTreeMap::default(),
            newly_allocated: Vec::default(),
            reservations: ReservationBook::new(),
            containers_to_preempt: BTreeSet::default(),
            usage: ResourceUsage::new(),
            headroom: Resource::ZERO,
            headroom_provider: None,
            scheduling_opportunities: HashMap::default(),
            re_reservations: HashMap::default(),
            aggregate_usage: AggregateUsage::default(),
            last_aggregate_update: None,
            last_container_id: 0,
        }
    }
}

pub struct SchedulerApplicationAttempt {
    attempt_id: ApplicationAttemptId,
    user: String,
    config: Arc<SchedulerConfig>,
    calculator: Box<dyn ResourceCalculator>,
    allocator: Box<dyn ContainerAllocator>,
    metrics: Arc<QueueMetrics>,
    audit: Arc<dyn AuditLogger>,
    state: Mutex<AttemptState>,
}

impl SchedulerApplicationAttempt {
    pub fn new(attempt_id: ApplicationAttemptId, user: impl Into<String>, config: Arc<SchedulerConfig>,
               metrics: Arc<QueueMetrics>, allocator: Box<dyn ContainerAllocator>) -> Self {
        Self {
            attempt_id,
            user: user.into(),
            calculator: resource_calculator_resolver(config.resource_calculator),
            config,
            allocator,
            metrics,
            audit: Arc::new(LogAuditLogger::new()),
            state: Mutex::new(AttemptState::new()),
        }
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn attempt_id(&self) -> ApplicationAttemptId {
        self.attempt_id
    }

    pub fn application_id(&self) -> ApplicationId {
        self.attempt_id.application_id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn calculator(&self) -> &dyn ResourceCalculator {
        self.calculator.as_ref()
    }

    pub fn metrics(&self) -> &Arc<QueueMetrics> {
        &self.metrics
    }

    /// Takes the attempt lock. All other methods on this type are shorthands for
    /// `lock().<operation>`.
    pub fn lock(&self) -> AttemptGuard<'_> {
        AttemptGuard {
            attempt: self,
            state: self.state.lock(),
        }
    }

    /// Entry point of a node heartbeat: lets the allocator place work for this attempt on
    /// `node` while the attempt stays locked.
    pub fn assign_containers(&self, cluster_resource: &Resource, node: &Arc<SchedulerNode>,
                             limits: &ResourceLimits, mode: SchedulingMode,
                             reserved_container: Option<Arc<RMContainer>>) -> SchedulerResult<Assignment> {
        let mut guard = self.lock();
        if guard.is_stopped() {
            log::debug!("{} is stopped, skipping node {}", self.attempt_id, node.node_id());
            return Ok(Assignment::nothing());
        }
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("pre-assignContainers for {} on node {}", self.attempt_id, node.node_id());
            guard.show_requests();
        }
        self.allocator.assign_containers(&mut guard, cluster_resource, node, limits, mode, reserved_container)
    }

    pub fn allocate(&self, node_type: NodeType, node: &SchedulerNode, priority: Priority,
                    request: &ResourceRequest, container: Container) -> SchedulerResult<Option<Arc<RMContainer>>> {
        self.lock().allocate(node_type, node, priority, request, container)
    }

    pub fn container_completed(&self, rm_container: &RMContainer, status: ContainerStatus,
                               event: RMContainerEventType, partition: &str) -> SchedulerResult<bool> {
        self.lock().container_completed(rm_container, status, event, partition)
    }

    pub fn reserve(&self, priority: Priority, node: &Arc<SchedulerNode>, existing: Option<Arc<RMContainer>>,
                   container: Container) -> SchedulerResult<Arc<RMContainer>> {
        self.lock().reserve(priority, node, existing, container)
    }

    pub fn unreserve(&self, priority: Priority, node: &SchedulerNode,
                     rm_container: &RMContainer) -> SchedulerResult<bool> {
        self.lock().unreserve(priority, node, rm_container)
    }

    pub fn get_node_id_to_unreserve(&self, priority: Priority, needed: &Resource,
                                    calculator: &dyn ResourceCalculator, cluster_resource: &Resource) -> Option<NodeId> {
        self.lock().get_node_id_to_unreserve(priority, needed, calculator, cluster_resource)
    }

    pub fn find_node_to_unreserve(&self, cluster_resource: &Resource, target: &SchedulerNode, priority: Priority,
                                  minimum_unreserved: &Resource) -> Option<Arc<RMContainer>> {
        self.lock().find_node_to_unreserve(cluster_resource, target, priority, minimum_unreserved)
    }

    pub fn get_allocation(&self, calculator: &dyn ResourceCalculator, cluster_resource: &Resource,
                          minimum_allocation: &Resource) -> Allocation {
        self.lock().get_allocation(calculator, cluster_resource, minimum_allocation)
    }

    pub fn add_preempt_container(&self, container_id: ContainerId) {
        self.lock().add_preempt_container(container_id)
    }

    pub fn locality_wait_factor(&self, priority: Priority, cluster_nodes: usize) -> f32 {
        self.lock().locality_wait_factor(priority, cluster_nodes)
    }

    pub fn total_pending_requests(&self) -> Resource {
        self.lock().total_pending_requests()
    }

    pub fn update_resource_requests(&self, requests: Vec<ResourceRequest>) {
        self.lock().update_resource_requests(requests)
    }

    pub fn headroom(&self) -> Resource {
        self.lock().headroom()
    }

    pub fn set_headroom(&self, headroom: Resource) {
        self.lock().set_headroom(headroom)
    }

    pub fn set_headroom_provider(&self, provider: Option<Arc<dyn HeadroomProvider>>) {
        self.lock().set_headroom_provider(provider)
    }

    pub fn stop(&self) {
        self.lock().stop()
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().is_stopped()
    }

    pub fn recover_container(&self, rm_container: Arc<RMContainer>, partition: &str) -> SchedulerResult<()> {
        self.lock().recover_container(rm_container, partition)
    }

    pub fn node_partition_updated(&self, rm_container: &RMContainer, old_partition: &str,
                                  new_partition: &str) -> SchedulerResult<()> {
        self.lock().node_partition_updated(rm_container, old_partition, new_partition)
    }

    /// Copies live containers, usage and headroom of `previous` into this attempt and takes over
    /// its outstanding requests (work-preserving restart). The previous attempt keeps its own
    /// view of the containers. Reservations are not carried over.
    pub fn transfer_state_from_previous_attempt(&self, previous: &SchedulerApplicationAttempt) {
        let (live_containers, usage, headroom, provider, request_book) = {
            let mut prev = previous.state.lock();
            let mut used = ResourceUsage::new();
            for (partition, usage) in prev.usage.partitions() {
                used.inc_used(partition, usage.used);
            }
            (prev.live_containers.clone(), used, prev.headroom, prev.headroom_provider.clone(),
             std::mem::take(&mut prev.request_book))
        };
        let mut state = self.state.lock();
        log::info!("{} takes over {} live containers from {}", self.attempt_id, live_containers.len(),
            previous.attempt_id);
        state.live_containers = live_containers;
        state.usage = usage;
        state.headroom = headroom;
        state.headroom_provider = provider;
        state.request_book.transfer_from(request_book);
    }

    pub fn live_containers(&self) -> Vec<Arc<RMContainer>> {
        self.lock().live_containers()
    }

    pub fn reserved_containers(&self) -> Vec<Arc<RMContainer>> {
        self.lock().reserved_containers()
    }

    pub fn num_reserved_containers(&self, priority: Priority) -> usize {
        self.lock().num_reserved_containers(priority)
    }

    pub fn current_consumption(&self) -> Resource {
        self.lock().current_consumption()
    }

    pub fn current_reservation(&self) -> Resource {
        self.lock().current_reservation()
    }

    pub fn resource_usage_report(&self, now: Instant) -> ResourceUsageReport {
        self.lock().resource_usage_report(now)
    }
}

/// Locked view of an attempt. Handed to the `ContainerAllocator` so its callbacks run inside
/// the same critical section as the heartbeat that triggered them.
pub struct AttemptGuard<'a> {
    attempt: &'a SchedulerApplicationAttempt,
    state: MutexGuard<'a, AttemptState>,
}

impl AttemptGuard<'_> {
    pub fn attempt_id(&self) -> ApplicationAttemptId {
        self.attempt.attempt_id
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.attempt.config
    }

    pub fn calculator(&self) -> &dyn ResourceCalculator {
        self.attempt.calculator.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped
    }

    /// Rejects any further allocation. Completions and unreservations still go through so
    /// in-flight containers can be retired.
    pub fn stop(&mut self) {
        if !self.state.is_stopped {
            log::info!("stopping {}", self.attempt.attempt_id);
        }
        self.state.is_stopped = true;
        self.state.request_book.clear();
    }

    /// Next container id of this attempt.
    pub fn new_container_id(&mut self) -> ContainerId {
        self.state.last_container_id += 1;
        ContainerId::new(self.attempt.attempt_id, self.state.last_container_id)
    }

    pub fn request_book(&self) -> &ResourceRequestBook {
        &self.state.request_book
    }

    pub fn update_resource_requests(&mut self, requests: Vec<ResourceRequest>) {
        if self.state.is_stopped {
            log::debug!("{} is stopped, ignoring {} requests", self.attempt.attempt_id, requests.len());
            return;
        }
        self.state.request_book.update_requests(requests);
    }

    /// Turns a grant decided by the allocator into a live container.
    ///
    /// Returns `None` when the attempt is stopped or the application master withdrew its demand
    /// at `priority` in the meantime. If `container` is the placeholder of this attempt's
    /// reservation on `node`, the reservation is converted instead of discarded.
    pub fn allocate(&mut self, node_type: NodeType, node: &SchedulerNode, priority: Priority,
                    request: &ResourceRequest, container: Container) -> SchedulerResult<Option<Arc<RMContainer>>> {
        if self.state.is_stopped {
            log::debug!("{} is stopped, not allocating {}", self.attempt.attempt_id, container.id);
            return Ok(None);
        }
        // The application master may have lowered its demand since the allocator looked.
        if self.state.request_book.total_required_containers(priority) == 0 {
            log::debug!("{} has no pending requests at priority {}, not allocating {}",
                self.attempt.attempt_id, priority, container.id);
            return Ok(None);
        }
        if self.state.live_containers.contains_key(&container.id) {
            return Err(SchedulerError::DuplicateContainer(container.id));
        }

        let converts_reservation = self.state.reservations.get(priority, node.node_id())
            .is_some_and(|reservation| reservation.container.container_id() == container.id);
        let converted = if converts_reservation {
            self.remove_reservation(priority, node.node_id())?.map(|reservation| reservation.container)
        } else {
            None
        };
        let rm_container = match converted {
            Some(reserved) => reserved,
            None => Arc::new(RMContainer::new(container.clone(), self.attempt.attempt_id, node.partition())),
        };
        rm_container.handle(RMContainerEventType::Start)?;
        let resource = rm_container.allocated_resource();

        let state = &mut *self.state;
        state.newly_allocated.push(rm_container.clone());
        state.live_containers.insert(container.id, rm_container.clone());
        let consumed = state.request_book.allocate(node_type, node, priority, request, &container);
        state.usage.inc_used(node.partition(), resource);
        rm_container.set_resource_requests(consumed);

        self.attempt.metrics.allocate_resources(&self.attempt.user, 1, resource);
        log::debug!("allocate: applicationAttemptId={} container={} host={} type={}",
            self.attempt.attempt_id, container.id, node.node_id(), node_type);
        self.attempt.audit.log_success(&self.attempt.user, AuditOperation::AllocContainer, AUDIT_TARGET,
            self.attempt.attempt_id.application_id, container.id);
        Ok(Some(rm_container))
    }

    /// Retires a live container. Returns `false` if it is not live (duplicate notification).
    pub fn container_completed(&mut self, rm_container: &RMContainer, status: ContainerStatus,
                               event: RMContainerEventType, partition: &str) -> SchedulerResult<bool> {
        let container_id = rm_container.container_id();
        let Some(live) = self.state.live_containers.get(&container_id).cloned() else {
            log::debug!("{} is not live in {}, ignoring completion", container_id, self.attempt.attempt_id);
            return Ok(false);
        };
        let resource = live.allocated_resource();
        if self.state.usage.used(partition).checked_sub(&resource).is_none() {
            log::error!("{} completing {} would drive used on partition '{}' below zero", self.attempt.attempt_id,
                container_id, partition);
            return Err(SchedulerError::AccountingViolation {
                partition: partition.to_string(),
                kind: UsageKind::Used,
                current: self.state.usage.used(partition),
                delta: resource,
            });
        }

        let state = &mut *self.state;
        state.live_containers.remove(&container_id);
        let pulled = !state.newly_allocated.iter().any(|c| c.container_id() == container_id);
        state.newly_allocated.retain(|c| c.container_id() != container_id);
        if let Err(e) = live.handle_finished(event, status) {
            log::warn!("{}", e);
        }
        // Killed before the application master ever saw it: the demand is still outstanding.
        if !pulled && !state.is_stopped
            && matches!(event, RMContainerEventType::Kill | RMContainerEventType::Expire) {
            state.request_book.recover_requests(live.resource_requests());
        }
        state.containers_to_preempt.remove(&container_id);
        state.usage.dec_used(partition, resource)?;
        state.last_aggregate_update = None;

        self.attempt.metrics.release_resources(&self.attempt.user, 1, resource);
        self.attempt.audit.log_success(&self.attempt.user, AuditOperation::ReleaseContainer, AUDIT_TARGET,
            self.attempt.attempt_id.application_id, container_id);
        Ok(true)
    }

    /// Holds `container` on `node` at `priority`. Passing the current reservation as `existing`
    /// (or reserving again at the same place) refreshes it without counting it twice.
    pub fn reserve(&mut self, priority: Priority, node: &Arc<SchedulerNode>, existing: Option<Arc<RMContainer>>,
                   container: Container) -> SchedulerResult<Arc<RMContainer>> {
        if self.state.is_stopped {
            return Err(SchedulerError::AttemptStopped(self.attempt.attempt_id));
        }
        let current = self.state.reservations.get(priority, node.node_id()).map(|r| r.container.clone());
        if let (None, Some(existing)) = (&current, &existing) {
            if existing.priority() != priority || existing.node_id() != node.node_id() {
                return Err(SchedulerError::ReservationMismatch {
                    container_id: existing.container_id(),
                    node_id: node.node_id().clone(),
                    priority,
                });
            }
        }
        let first = current.is_none();
        let rm_container = match (current, existing) {
            (Some(current), Some(existing)) if !Arc::ptr_eq(&current, &existing) => {
                log::warn!("{} refreshes reservation {} on {} with {}", self.attempt.attempt_id,
                    current.container_id(), node.node_id(), existing.container_id());
                current
            }
            (Some(current), _) => current,
            (None, Some(existing)) => existing,
            (None, None) => Arc::new(RMContainer::new(container, self.attempt.attempt_id, node.partition())),
        };
        rm_container.handle(RMContainerEventType::Reserved)?;

        let resource = rm_container.allocated_resource();
        if first {
            self.state.usage.inc_reserved(node.partition(), resource);
            self.reset_re_reservations(priority);
            self.attempt.metrics.reserve_resource(&self.attempt.user, resource);
        } else {
            self.add_re_reservation(priority);
        }
        self.state.reservations.insert(priority, Reservation {
            container: rm_container.clone(),
            node: node.clone(),
        });

        if let Err(e) = node.reserve_resource(self.attempt.attempt_id, priority, &rm_container) {
            if first {
                self.state.reservations.remove(priority, node.node_id());
                self.state.usage.dec_reserved(node.partition(), resource)?;
                self.attempt.metrics.unreserve_resource(&self.attempt.user, resource);
                let _ = rm_container.handle(RMContainerEventType::Released);
            }
            return Err(e);
        }

        log::info!("{} reserved {} on node {} at priority {}, currently has {} at this priority",
            self.attempt.attempt_id, resource, node.node_id(), priority,
            self.state.reservations.count_at(priority));
        Ok(rm_container)
    }

    /// Discards the reservation at (`priority`, `node`). Returns `false` if there is none, or if
    /// it is not `rm_container` any more.
    pub fn unreserve(&mut self, priority: Priority, node: &SchedulerNode,
                     rm_container: &RMContainer) -> SchedulerResult<bool> {
        match self.state.reservations.get(priority, node.node_id()) {
            Some(reservation) if reservation.container.container_id() == rm_container.container_id() => {}
            Some(reservation) => {
                log::debug!("{} holds {} on {} at priority {}, not {}", self.attempt.attempt_id,
                    reservation.container.container_id(), node.node_id(), priority,
                    rm_container.container_id());
                return Ok(false);
            }
            None => {
                log::debug!("{} has no reservation on {} at priority {}", self.attempt.attempt_id,
                    node.node_id(), priority);
                return Ok(false);
            }
        }
        let Some(reservation) = self.remove_reservation(priority, node.node_id())? else {
            return Ok(false);
        };
        if let Err(e) = reservation.container.handle(RMContainerEventType::Released) {
            log::warn!("{}", e);
        }
        log::info!("{} unreserved on node {}, currently has {} at priority {}; currentReservation {} on partition '{}'",
            self.attempt.attempt_id, node.node_id(), self.state.reservations.count_at(priority), priority,
            self.state.usage.total_reserved(), reservation.node.partition());
        Ok(true)
    }

    /// Removal shared by `unreserve` and reservation conversion. Drops the node back-reference
    /// before the attempt's own entry.
    fn remove_reservation(&mut self, priority: Priority, node_id: &NodeId) -> SchedulerResult<Option<Reservation>> {
        let Some(reservation) = self.state.reservations.get(priority, node_id).cloned() else {
            return Ok(None);
        };
        let resource = reservation.resource();
        self.state.usage.dec_reserved(reservation.node.partition(), resource)?;
        reservation.node.unreserve_resource(self.attempt.attempt_id, reservation.container.container_id());
        self.state.reservations.remove(priority, node_id);
        self.reset_re_reservations(priority);
        self.attempt.metrics.unreserve_resource(&self.attempt.user, resource);
        Ok(Some(reservation))
    }

    /// First reservation at `priority`, in reservation order, that is at least `needed`.
    /// Deliberately first-fit: the answer only depends on the order of `reserve` calls.
    pub fn get_node_id_to_unreserve(&self, priority: Priority, needed: &Resource,
                                    calculator: &dyn ResourceCalculator, cluster_resource: &Resource) -> Option<NodeId> {
        for (node_id, reservation) in self.state.reservations.at_priority(priority) {
            let reserved = reservation.resource();
            if calculator.less_than_or_equal(cluster_resource, needed, &reserved) {
                log::debug!("unreserving node with reservation size: {} in order to allocate container with size: {}",
                    reserved, needed);
                return Some(node_id.clone());
            }
        }
        None
    }

    /// Picks a reservation to give up so a container can be placed on `target`. The freed
    /// resource is credited to the cached headroom right away; the caller still has to
    /// `unreserve` the returned container.
    pub fn find_node_to_unreserve(&mut self, cluster_resource: &Resource, target: &SchedulerNode,
                                  priority: Priority, minimum_unreserved: &Resource) -> Option<Arc<RMContainer>> {
        let Some(node_id) = self.get_node_id_to_unreserve(priority, minimum_unreserved,
                                                          self.attempt.calculator.as_ref(), cluster_resource) else {
            log::debug!("checked to see if could unreserve for {} but nothing reserved that matches",
                self.attempt.attempt_id);
            return None;
        };
        let reservation = self.state.reservations.get(priority, &node_id)?.clone();
        log::debug!("unreserving for {} on node {} in order to place it on node {} needing {}",
            self.attempt.attempt_id, node_id, target.node_id(), minimum_unreserved);
        self.state.headroom = self.state.headroom + reservation.resource();
        Some(reservation.container)
    }

    /// Drains granted containers and the preemption set for the application master.
    pub fn get_allocation(&mut self, calculator: &dyn ResourceCalculator, cluster_resource: &Resource,
                          minimum_allocation: &Resource) -> Allocation {
        let preempted = std::mem::take(&mut self.state.containers_to_preempt);
        let to_preempt: Resource = preempted.iter()
            .filter_map(|id| self.state.live_containers.get(id))
            .map(|container| container.allocated_resource())
            .sum();
        let num_containers = if to_preempt.is_zero() || calculator.is_invalid_divisor(minimum_allocation) {
            0
        } else {
            let ratio = calculator.divide(cluster_resource, &to_preempt, minimum_allocation).ceil();
            cast::u32(ratio).unwrap_or_else(|_| {
                log::warn!("preemption hint {} out of range for {}", ratio, self.attempt.attempt_id);
                0
            })
        };
        let hint = ResourceRequest::any(Priority::UNDEFINED, *minimum_allocation, num_containers);

        let containers = self.pull_newly_allocated_containers();
        let headroom = self.headroom();
        self.attempt.metrics.set_available_resources_to_user(&self.attempt.user, headroom);

        Allocation {
            containers,
            headroom,
            preempted_container_ids: preempted,
            resource_requests: vec![hint],
        }
    }

    fn pull_newly_allocated_containers(&mut self) -> Vec<Container> {
        let mut containers = Vec::with_capacity(self.state.newly_allocated.len());
        for rm_container in self.state.newly_allocated.drain(..) {
            match rm_container.handle(RMContainerEventType::Acquired) {
                Ok(_) => containers.push(rm_container.container().clone()),
                Err(e) => log::warn!("{}", e),
            }
        }
        containers
    }

    /// Marks a live container for preemption. Containers that already finished are ignored.
    pub fn add_preempt_container(&mut self, container_id: ContainerId) {
        if self.state.live_containers.contains_key(&container_id) {
            self.state.containers_to_preempt.insert(container_id);
        } else {
            log::debug!("{} is not live in {}, not marking for preemption", container_id,
                self.attempt.attempt_id);
        }
    }

    pub fn containers_to_preempt(&self) -> BTreeSet<ContainerId> {
        self.state.containers_to_preempt.clone()
    }

    /// How many scheduling opportunities to skip before relaxing locality, as a share of the
    /// cluster size.
    pub fn locality_wait_factor(&self, priority: Priority, cluster_nodes: usize) -> f32 {
        let required = self.state.request_book.distinct_locations(priority).saturating_sub(1);
        if required == 0 {
            return 0.0;
        }
        if cluster_nodes == 0 {
            return 1.0;
        }
        (required as f32 / cluster_nodes as f32).min(1.0)
    }

    pub fn total_pending_requests(&self) -> Resource {
        self.state.request_book.total_pending_across_priorities()
    }

    pub fn headroom(&self) -> Resource {
        match &self.state.headroom_provider {
            Some(provider) => provider.headroom(),
            None => self.state.headroom,
        }
    }

    /// Default headroom supplied by the parent queue.
    pub fn set_headroom(&mut self, headroom: Resource) {
        self.state.headroom = headroom;
    }

    pub fn set_headroom_provider(&mut self, provider: Option<Arc<dyn HeadroomProvider>>) {
        self.state.headroom_provider = provider;
    }

    pub fn headroom_provider(&self) -> Option<Arc<dyn HeadroomProvider>> {
        self.state.headroom_provider.clone()
    }

    /// Re-registers a container that survived a resource manager restart. The request book is
    /// left alone, the demand was consumed before the restart.
    pub fn recover_container(&mut self, rm_container: Arc<RMContainer>, partition: &str) -> SchedulerResult<()> {
        if rm_container.state().is_terminal() {
            log::debug!("{} already finished, nothing to recover", rm_container.container_id());
            return Ok(());
        }
        let container_id = rm_container.container_id();
        if self.state.live_containers.contains_key(&container_id) {
            return Err(SchedulerError::DuplicateContainer(container_id));
        }
        let resource = rm_container.allocated_resource();
        self.state.live_containers.insert(container_id, rm_container);
        self.state.usage.inc_used(partition, resource);
        self.state.last_container_id = self.state.last_container_id.max(container_id.id);
        log::info!("{} recovered {} with {} on partition '{}'", self.attempt.attempt_id, container_id,
            resource, partition);
        Ok(())
    }

    /// Moves a live container's usage to the node's new partition.
    pub fn node_partition_updated(&mut self, rm_container: &RMContainer, old_partition: &str,
                                  new_partition: &str) -> SchedulerResult<()> {
        let resource = rm_container.allocated_resource();
        self.state.usage.dec_used(old_partition, resource)?;
        self.state.usage.inc_used(new_partition, resource);
        Ok(())
    }

    pub fn add_scheduling_opportunity(&mut self, priority: Priority) -> u32 {
        let count = self.state.scheduling_opportunities.entry(priority).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn scheduling_opportunities(&self, priority: Priority) -> u32 {
        self.state.scheduling_opportunities.get(&priority).copied().unwrap_or(0)
    }

    pub fn reset_scheduling_opportunities(&mut self, priority: Priority) {
        self.state.scheduling_opportunities.remove(&priority);
    }

    pub fn add_re_reservation(&mut self, priority: Priority) {
        *self.state.re_reservations.entry(priority).or_insert(0) += 1;
    }

    pub fn re_reservations(&self, priority: Priority) -> u32 {
        self.state.re_reservations.get(&priority).copied().unwrap_or(0)
    }

    pub fn reset_re_reservations(&mut self, priority: Priority) {
        self.state.re_reservations.remove(&priority);
    }

    pub fn live_containers(&self) -> Vec<Arc<RMContainer>> {
        self.state.live_containers.values().cloned().collect()
    }

    pub fn live_container(&self, container_id: &ContainerId) -> Option<Arc<RMContainer>> {
        self.state.live_containers.get(container_id).cloned()
    }

    pub fn reserved_containers(&self) -> Vec<Arc<RMContainer>> {
        self.state.reservations.iter().map(|(_, _, reservation)| reservation.container.clone()).collect()
    }

    pub fn reservation(&self, priority: Priority, node_id: &NodeId) -> Option<Arc<RMContainer>> {
        self.state.reservations.get(priority, node_id).map(|reservation| reservation.container.clone())
    }

    /// Node hosting the reservation at (`priority`, `node_id`).
    pub fn reserved_node(&self, priority: Priority, node_id: &NodeId) -> Option<Arc<SchedulerNode>> {
        self.state.reservations.get(priority, node_id).map(|reservation| reservation.node.clone())
    }

    pub fn num_reserved_containers(&self, priority: Priority) -> usize {
        self.state.reservations.count_at(priority)
    }

    pub fn current_consumption(&self) -> Resource {
        self.state.usage.total_used()
    }

    pub fn current_reservation(&self) -> Resource {
        self.state.usage.total_reserved()
    }

    pub fn used(&self, partition: &str) -> Resource {
        self.state.usage.used(partition)
    }

    pub fn reserved(&self, partition: &str) -> Resource {
        self.state.usage.reserved(partition)
    }

    pub fn resource_usage_report(&mut self, now: Instant) -> ResourceUsageReport {
        let aggregate = self.running_aggregate_usage(now);
        let used = self.state.usage.total_used();
        let reserved = self.state.usage.total_reserved();
        ResourceUsageReport {
            num_used_containers: self.state.live_containers.len(),
            num_reserved_containers: self.state.reservations.len(),
            used,
            reserved,
            needed: used + reserved,
            memory_seconds: aggregate.memory_seconds,
            vcore_seconds: aggregate.vcore_seconds,
        }
    }

    /// Memory- and vcore-seconds of the live containers, recomputed at most once per cache
    /// interval or after a container completed.
    fn running_aggregate_usage(&mut self, now: Instant) -> AggregateUsage {
        let cache = Duration::from_millis(self.attempt.config.aggregate_usage_cache_ms);
        let stale = match self.state.last_aggregate_update {
            None => true,
            Some(last) => now.saturating_duration_since(last) > cache,
        };
        if stale {
            let mut aggregate = AggregateUsage::default();
            for container in self.state.live_containers.values() {
                let used_millis = cast::u64(now.saturating_duration_since(container.creation_time()).as_millis())
                    .unwrap_or(u64::MAX);
                let resource = container.allocated_resource();
                aggregate.memory_seconds = aggregate.memory_seconds
                    .saturating_add(resource.memory_mb.saturating_mul(used_millis) / 1000);
                aggregate.vcore_seconds = aggregate.vcore_seconds
                    .saturating_add(resource.vcores.saturating_mul(used_millis) / 1000);
            }
            self.state.aggregate_usage = aggregate;
            self.state.last_aggregate_update = Some(now);
        }
        self.state.aggregate_usage
    }

    pub fn show_requests(&self) {
        for request in self.state.request_book.all_requests() {
            log::debug!("showRequests: {} request={:?} headroom={} currentConsumption={} state={}",
                self.attempt.attempt_id, request, self.headroom(), self.state.usage.total_used(),
                if self.state.is_stopped { "stopped" } else { "active" });
        }
    }

    /// Number of live containers in `state`.
    pub fn count_live_in_state(&self, state: RMContainerState) -> usize {
        self.state.live_containers.values().filter(|c| c.state() == state).count()
    }
}
