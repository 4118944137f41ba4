//! Multi-dimensional resource vector (memory, vcores).

use std::fmt::{Display, Formatter};
use std::ops::{Add, Mul};
use serde::{Deserialize, Serialize};

/// Immutable bundle of resources. All arithmetic is dimension-wise and returns a new value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Memory in MB.
    pub memory_mb: u64,
    /// Virtual cores.
    pub vcores: u64,
}

impl Resource {
    pub const ZERO: Resource = Resource { memory_mb: 0, vcores: 0 };

    pub fn new(memory_mb: u64, vcores: u64) -> Self {
        Self {
            memory_mb,
            vcores
        }
    }

    pub fn is_zero(&self) -> bool {
        self.memory_mb == 0 && self.vcores == 0
    }

    /// Returns `None` if any dimension would drop below zero.
    pub fn checked_sub(&self, other: &Resource) -> Option<Resource> {
        Some(Resource::new(
            self.memory_mb.checked_sub(other.memory_mb)?,
            self.vcores.checked_sub(other.vcores)?,
        ))
    }

    /// Dimension-wise subtraction clamped at zero.
    pub fn sub_clamped(&self, other: &Resource) -> Resource {
        Resource::new(self.memory_mb.saturating_sub(other.memory_mb),
                      self.vcores.saturating_sub(other.vcores))
    }

    pub fn multiply(&self, by: u64) -> Resource {
        Resource::new(self.memory_mb * by, self.vcores * by)
    }

    /// True if every dimension of `self` is <= the same dimension of `other`.
    pub fn fits_in(&self, other: &Resource) -> bool {
        self.memory_mb <= other.memory_mb && self.vcores <= other.vcores
    }

    pub fn component_min(&self, other: &Resource) -> Resource {
        Resource::new(self.memory_mb.min(other.memory_mb), self.vcores.min(other.vcores))
    }

    pub fn component_max(&self, other: &Resource) -> Resource {
        Resource::new(self.memory_mb.max(other.memory_mb), self.vcores.max(other.vcores))
    }
}

impl Add for Resource {
    type Output = Resource;

    fn add(self, rhs: Resource) -> Resource {
        Resource::new(self.memory_mb + rhs.memory_mb, self.vcores + rhs.vcores)
    }
}

impl Mul<u64> for Resource {
    type Output = Resource;

    fn mul(self, rhs: u64) -> Resource {
        self.multiply(rhs)
    }
}

impl std::iter::Sum for Resource {
    fn sum<I: Iterator<Item = Resource>>(iter: I) -> Resource {
        iter.fold(Resource::ZERO, |acc, r| acc + r)
    }
}

impl<'a> std::iter::Sum<&'a Resource> for Resource {
    fn sum<I: Iterator<Item = &'a Resource>>(iter: I) -> Resource {
        iter.fold(Resource::ZERO, |acc, r| acc + *r)
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "<memory:{}, vCores:{}>", self.memory_mb, self.vcores)
    }
}
