//! Per-priority outstanding demand of one attempt.

use std::collections::BTreeMap;
use crate::container::{Container, Priority};
use crate::node::SchedulerNode;
use crate::resource::Resource;
use crate::resource_request::{Location, NodeType, ResourceRequest};

/// Requests keyed by (priority, location). A re-submitted request replaces the previous entry
/// for its key, counts are never merged.
#[derive(Clone, Debug, Default)]
pub struct ResourceRequestBook {
    requests: BTreeMap<Priority, BTreeMap<Location, ResourceRequest>>,
}

impl ResourceRequestBook {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn update_requests(&mut self, requests: impl IntoIterator<Item = ResourceRequest>) {
        for request in requests {
            log::debug!("update request priority={} location={} capability={} containers={}",
                request.priority, request.location, request.capability, request.num_containers);
            self.requests
                .entry(request.priority)
                .or_default()
                .insert(request.location.clone(), request);
        }
    }

    /// Puts back requests consumed by containers that will never run (recovery, preemption).
    pub fn recover_requests(&mut self, requests: impl IntoIterator<Item = ResourceRequest>) {
        for request in requests {
            let at_priority = self.requests.entry(request.priority).or_default();
            match at_priority.get_mut(&request.location) {
                Some(existing) => existing.num_containers += request.num_containers,
                None => {
                    at_priority.insert(request.location.clone(), request);
                }
            }
        }
    }

    pub fn get(&self, priority: Priority, location: &Location) -> Option<&ResourceRequest> {
        self.requests.get(&priority).and_then(|at_priority| at_priority.get(location))
    }

    pub fn requests_at(&self, priority: Priority) -> impl Iterator<Item = &ResourceRequest> {
        self.requests.get(&priority).into_iter().flat_map(|at_priority| at_priority.values())
    }

    /// Priorities in scheduling order (most important first).
    pub fn priorities(&self) -> Vec<Priority> {
        self.requests.keys().copied().collect()
    }

    pub fn all_requests(&self) -> impl Iterator<Item = &ResourceRequest> {
        self.requests.values().flat_map(|at_priority| at_priority.values())
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Outstanding container count of the ANY request at `priority`.
    pub fn total_required_containers(&self, priority: Priority) -> u32 {
        self.get(priority, &Location::Any).map_or(0, |request| request.num_containers)
    }

    /// Pending resource at `priority`. Only the ANY entry counts, host and rack entries
    /// describe the same containers.
    pub fn total_pending(&self, priority: Priority) -> Resource {
        self.get(priority, &Location::Any).map_or(Resource::ZERO, |request| request.total())
    }

    pub fn total_pending_across_priorities(&self) -> Resource {
        self.all_requests()
            .filter(|request| request.location.is_any())
            .map(|request| request.total())
            .sum()
    }

    /// Number of distinct locations (hosts, racks and ANY) requested at `priority`.
    pub fn distinct_locations(&self, priority: Priority) -> usize {
        self.requests.get(&priority).map_or(0, |at_priority| at_priority.len())
    }

    /// Consumes one container's worth of demand for an allocation of locality `node_type`
    /// on `node`. Returns single-container copies of every request that was decremented.
    pub fn allocate(&mut self, node_type: NodeType, node: &SchedulerNode, priority: Priority,
                    request: &ResourceRequest, container: &Container) -> Vec<ResourceRequest> {
        let mut locations = Vec::with_capacity(3);
        match node_type {
            NodeType::NodeLocal => {
                locations.push(Location::Node(node.host().to_string()));
                locations.push(Location::Rack(node.rack_name().to_string()));
            }
            NodeType::RackLocal => {
                locations.push(Location::Rack(node.rack_name().to_string()));
            }
            NodeType::OffSwitch => {}
        }
        locations.push(Location::Any);

        let mut consumed = Vec::with_capacity(locations.len());
        let Some(at_priority) = self.requests.get_mut(&priority) else {
            log::debug!("no requests at priority {} while allocating {}", priority, container.id);
            return consumed;
        };
        for location in locations {
            if let Some(entry) = at_priority.get_mut(&location) {
                let mut snapshot = entry.clone();
                snapshot.num_containers = 1;
                consumed.push(snapshot);
                entry.num_containers = entry.num_containers.saturating_sub(1);
            }
        }
        log::debug!("allocate {} type={} capability={} request={}", container.id, node_type,
            container.resource, request.location);
        consumed
    }

    /// Takes over the demand of a previous attempt of the same application.
    pub fn transfer_from(&mut self, previous: ResourceRequestBook) {
        self.requests = previous.requests;
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}
