//! Used and reserved resources of an attempt, tracked per partition.

use std::collections::BTreeMap;
use serde::Serialize;
use crate::error::{SchedulerError, SchedulerResult, UsageKind};
use crate::resource::Resource;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PartitionUsage {
    pub used: Resource,
    pub reserved: Resource,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ResourceUsage {
    partitions: BTreeMap<String, PartitionUsage>,
}

impl ResourceUsage {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn used(&self, partition: &str) -> Resource {
        self.partitions.get(partition).map_or(Resource::ZERO, |usage| usage.used)
    }

    pub fn reserved(&self, partition: &str) -> Resource {
        self.partitions.get(partition).map_or(Resource::ZERO, |usage| usage.reserved)
    }

    pub fn total_used(&self) -> Resource {
        self.partitions.values().map(|usage| usage.used).sum()
    }

    pub fn total_reserved(&self) -> Resource {
        self.partitions.values().map(|usage| usage.reserved).sum()
    }

    pub fn partitions(&self) -> impl Iterator<Item = (&str, &PartitionUsage)> {
        self.partitions.iter().map(|(name, usage)| (name.as_str(), usage))
    }

    pub fn inc_used(&mut self, partition: &str, delta: Resource) {
        let usage = self.partitions.entry(partition.to_string()).or_default();
        usage.used = usage.used + delta;
    }

    pub fn dec_used(&mut self, partition: &str, delta: Resource) -> SchedulerResult<()> {
        self.decrement(partition, UsageKind::Used, delta)
    }

    pub fn inc_reserved(&mut self, partition: &str, delta: Resource) {
        let usage = self.partitions.entry(partition.to_string()).or_default();
        usage.reserved = usage.reserved + delta;
    }

    pub fn dec_reserved(&mut self, partition: &str, delta: Resource) -> SchedulerResult<()> {
        self.decrement(partition, UsageKind::Reserved, delta)
    }

    /// Fails without touching anything if the counter would go below zero.
    fn decrement(&mut self, partition: &str, kind: UsageKind, delta: Resource) -> SchedulerResult<()> {
        let current = match kind {
            UsageKind::Used => self.used(partition),
            UsageKind::Reserved => self.reserved(partition),
        };
        let Some(remaining) = current.checked_sub(&delta) else {
            log::error!("{} usage on partition '{}' would go negative: {} - {}", kind, partition,
                current, delta);
            return Err(SchedulerError::AccountingViolation {
                partition: partition.to_string(),
                kind,
                current,
                delta,
            });
        };
        let usage = self.partitions.entry(partition.to_string()).or_default();
        match kind {
            UsageKind::Used => usage.used = remaining,
            UsageKind::Reserved => usage.reserved = remaining,
        }
        Ok(())
    }
}
