//! Outstanding demand of an application at one priority and location.

use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use crate::container::Priority;
use crate::resource::Resource;

/// Where a request may be satisfied.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Location {
    Any,
    Rack(String),
    Node(String),
}

impl Location {
    pub fn is_any(&self) -> bool {
        matches!(self, Location::Any)
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Location::Any => write!(f, "*"),
            Location::Rack(rack) => write!(f, "{}", rack),
            Location::Node(host) => write!(f, "{}", host),
        }
    }
}

/// Locality at which an allocation was made.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    NodeLocal,
    RackLocal,
    OffSwitch,
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            NodeType::NodeLocal => write!(f, "NODE_LOCAL"),
            NodeType::RackLocal => write!(f, "RACK_LOCAL"),
            NodeType::OffSwitch => write!(f, "OFF_SWITCH"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub priority: Priority,
    pub location: Location,
    pub capability: Resource,
    pub num_containers: u32,
    /// Whether the request may fall back to a less specific location.
    pub relax_locality: bool,
    /// Partition the request targets; `None` means the default partition.
    pub node_label: Option<String>,
}

impl ResourceRequest {
    pub fn new(priority: Priority, location: Location, capability: Resource, num_containers: u32) -> Self {
        Self {
            priority,
            location,
            capability,
            num_containers,
            relax_locality: true,
            node_label: None,
        }
    }

    pub fn any(priority: Priority, capability: Resource, num_containers: u32) -> Self {
        Self::new(priority, Location::Any, capability, num_containers)
    }

    pub fn with_relax_locality(mut self, relax_locality: bool) -> Self {
        self.relax_locality = relax_locality;
        self
    }

    pub fn with_node_label(mut self, node_label: impl Into<String>) -> Self {
        self.node_label = Some(node_label.into());
        self
    }

    /// Capability times outstanding container count.
    pub fn total(&self) -> Resource {
        self.capability.multiply(self.num_containers as u64)
    }
}
