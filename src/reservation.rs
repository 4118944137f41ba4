//! Reservations of one attempt, keyed by (priority, node).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::container::{NodeId, Priority};
use crate::node::SchedulerNode;
use crate::resource::Resource;
use crate::rm_container::RMContainer;

/// A placeholder container held on a node.
#[derive(Clone)]
pub struct Reservation {
    pub container: Arc<RMContainer>,
    pub node: Arc<SchedulerNode>,
}

impl Reservation {
    pub fn resource(&self) -> Resource {
        self.container.allocated_resource()
    }
}

/// At most one reservation per (priority, node). Iteration at a priority follows the order in
/// which reservations were first made; refreshing a reservation keeps its position.
#[derive(Default)]
pub struct ReservationBook {
    entries: HashMap<(Priority, NodeId), Reservation>,
    order: BTreeMap<Priority, Vec<NodeId>>,
}

impl ReservationBook {
    pub fn new() -> Self {
        Default::default()
    }

    /// Stores the reservation and returns the one it replaced, if any.
    pub fn insert(&mut self, priority: Priority, reservation: Reservation) -> Option<Reservation> {
        let node_id = reservation.node.node_id().clone();
        let previous = self.entries.insert((priority, node_id.clone()), reservation);
        if previous.is_none() {
            self.order.entry(priority).or_default().push(node_id);
        }
        previous
    }

    /// Removes the reservation and drops the priority once it holds no more nodes.
    pub fn remove(&mut self, priority: Priority, node_id: &NodeId) -> Option<Reservation> {
        let removed = self.entries.remove(&(priority, node_id.clone()))?;
        if let Some(nodes) = self.order.get_mut(&priority) {
            nodes.retain(|n| n != node_id);
            if nodes.is_empty() {
                self.order.remove(&priority);
            }
        }
        Some(removed)
    }

    pub fn get(&self, priority: Priority, node_id: &NodeId) -> Option<&Reservation> {
        self.entries.get(&(priority, node_id.clone()))
    }

    /// Reservations at `priority` in reservation order.
    pub fn at_priority(&self, priority: Priority) -> impl Iterator<Item = (&NodeId, &Reservation)> {
        self.order.get(&priority).into_iter().flat_map(move |nodes| {
            nodes.iter().filter_map(move |node_id| {
                self.entries.get(&(priority, node_id.clone())).map(|reservation| (node_id, reservation))
            })
        })
    }

    pub fn count_at(&self, priority: Priority) -> usize {
        self.order.get(&priority).map_or(0, |nodes| nodes.len())
    }

    pub fn priorities(&self) -> impl Iterator<Item = Priority> + '_ {
        self.order.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Priority, &NodeId, &Reservation)> {
        self.order.iter().flat_map(move |(priority, nodes)| {
            nodes.iter().filter_map(move |node_id| {
                self.entries.get(&(*priority, node_id.clone()))
                    .map(|reservation| (*priority, node_id, reservation))
            })
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_resource(&self) -> Resource {
        self.entries.values().map(|reservation| reservation.resource()).sum()
    }
}
