//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use crate::error::ConfigError;
use crate::resource::Resource;
use crate::resource_calculator::CalculatorKind;

/// Holds raw scheduler config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawSchedulerConfig {
    pub minimum_allocation: Option<Resource>,
    pub maximum_allocation: Option<Resource>,
    pub resource_calculator: Option<CalculatorKind>,
    pub node_locality_delay: Option<i32>,
    pub rack_locality_additional_delay: Option<i32>,
    pub reservations_continue_look_all_nodes: Option<bool>,
    pub aggregate_usage_cache_ms: Option<u64>,
    pub max_assign_per_heartbeat: Option<u32>,
}

/// Represents scheduler configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Smallest container the scheduler hands out, also the normalization step.
    pub minimum_allocation: Resource,
    /// Largest container the scheduler hands out.
    pub maximum_allocation: Resource,
    /// How resources are compared.
    pub resource_calculator: CalculatorKind,
    /// Missed scheduling opportunities before giving up node locality.
    /// Negative means "derive from the locality wait factor".
    pub node_locality_delay: i32,
    /// Extra missed opportunities before giving up rack locality. Negative disables it.
    pub rack_locality_additional_delay: i32,
    /// Whether an attempt may unreserve elsewhere to fit a container on the current node.
    pub reservations_continue_look_all_nodes: bool,
    /// How long the aggregate memory/vcore-seconds stay cached, in milliseconds.
    pub aggregate_usage_cache_ms: u64,
    /// Containers the default allocator may hand out per node heartbeat
    pub max_assign_per_heartbeat: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            minimum_allocation: Resource::new(1024, 1),
            maximum_allocation: Resource::new(8192, 4),
            resource_calculator: CalculatorKind::Default,
            node_locality_delay: -1,
            rack_locality_additional_delay: -1,
            reservations_continue_look_all_nodes: true,
            aggregate_usage_cache_ms: 3000,
            max_assign_per_heartbeat: 1,
        }
    }
}

impl SchedulerConfig {
    pub fn new(minimum_allocation: Resource, maximum_allocation: Resource,
               resource_calculator: CalculatorKind) -> Self {
        Self {
            minimum_allocation,
            maximum_allocation,
            resource_calculator,
            ..Default::default()
        }
    }

    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSchedulerConfig = serde_yaml::from_str(content)?;
        let defaults = Self::default();

        let config = Self {
            minimum_allocation: raw.minimum_allocation.unwrap_or(defaults.minimum_allocation),
            maximum_allocation: raw.maximum_allocation.unwrap_or(defaults.maximum_allocation),
            resource_calculator: raw.resource_calculator.unwrap_or(defaults.resource_calculator),
            node_locality_delay: raw.node_locality_delay.unwrap_or(defaults.node_locality_delay),
            rack_locality_additional_delay: raw.rack_locality_additional_delay
                .unwrap_or(defaults.rack_locality_additional_delay),
            reservations_continue_look_all_nodes: raw.reservations_continue_look_all_nodes
                .unwrap_or(defaults.reservations_continue_look_all_nodes),
            aggregate_usage_cache_ms: raw.aggregate_usage_cache_ms.unwrap_or(defaults.aggregate_usage_cache_ms),
            max_assign_per_heartbeat: raw.max_assign_per_heartbeat.unwrap_or(defaults.max_assign_per_heartbeat),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_allocation.memory_mb == 0 || self.minimum_allocation.vcores == 0 {
            return Err(ConfigError::Invalid(format!(
                "minimum allocation {} must be positive in every dimension", self.minimum_allocation)));
        }
        if !self.minimum_allocation.fits_in(&self.maximum_allocation) {
            return Err(ConfigError::Invalid(format!(
                "minimum allocation {} exceeds maximum allocation {}",
                self.minimum_allocation, self.maximum_allocation)));
        }
        if self.max_assign_per_heartbeat == 0 {
            return Err(ConfigError::Invalid("max_assign_per_heartbeat must be at least 1".to_string()));
        }
        Ok(())
    }
}
