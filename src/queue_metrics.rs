use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Error, Write};
use parking_lot::Mutex;
use serde::Serialize;
use crate::resource::Resource;

/// Point-in-time view of the queue counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub allocated_containers: u64,
    pub allocated: Resource,
    pub aggregate_containers_allocated: u64,
    pub aggregate_containers_released: u64,
    pub reserved_containers: u64,
    pub reserved: Resource,
    pub available_to_user: BTreeMap<String, Resource>,
}

/// Queue-level counters the attempts report into. Shared by all attempts of a queue.
#[derive(Default)]
pub struct QueueMetrics {
    queue_name: String,
    counters: Mutex<MetricsSnapshot>,
}

impl QueueMetrics {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            counters: Mutex::default(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn allocate_resources(&self, _user: &str, containers: u64, resource: Resource) {
        let mut counters = self.counters.lock();
        counters.allocated_containers += containers;
        counters.aggregate_containers_allocated += containers;
        counters.allocated = counters.allocated + resource.multiply(containers);
    }

    pub fn release_resources(&self, _user: &str, containers: u64, resource: Resource) {
        let mut counters = self.counters.lock();
        counters.allocated_containers = counters.allocated_containers.saturating_sub(containers);
        counters.aggregate_containers_released += containers;
        counters.allocated = counters.allocated.sub_clamped(&resource.multiply(containers));
    }

    pub fn reserve_resource(&self, _user: &str, resource: Resource) {
        let mut counters = self.counters.lock();
        counters.reserved_containers += 1;
        counters.reserved = counters.reserved + resource;
    }

    pub fn unreserve_resource(&self, _user: &str, resource: Resource) {
        let mut counters = self.counters.lock();
        counters.reserved_containers = counters.reserved_containers.saturating_sub(1);
        counters.reserved = counters.reserved.sub_clamped(&resource);
    }

    pub fn set_available_resources_to_user(&self, user: &str, headroom: Resource) {
        self.counters.lock().available_to_user.insert(user.to_string(), headroom);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.counters.lock().clone()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.snapshot())
    }

    pub fn save(&self, path: &str) -> Result<(), Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &self.snapshot())?;
        writer.flush()
    }
}
