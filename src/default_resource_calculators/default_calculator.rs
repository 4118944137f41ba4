use std::cmp::Ordering;
use crate::resource::Resource;
use crate::resource_calculator::{round_up, ResourceCalculator};

/// Only memory is taken into account.
#[derive(Clone, Default)]
pub struct DefaultResourceCalculator;

impl DefaultResourceCalculator {
    pub fn new() -> Self {
        Default::default()
    }
}

impl ResourceCalculator for DefaultResourceCalculator {
    fn name(&self) -> &'static str {
        "default"
    }

    fn compare(&self, _cluster: &Resource, lhs: &Resource, rhs: &Resource) -> Ordering {
        lhs.memory_mb.cmp(&rhs.memory_mb)
    }

    fn divide(&self, _cluster: &Resource, numerator: &Resource, denominator: &Resource) -> f64 {
        self.ratio(numerator, denominator)
    }

    fn is_invalid_divisor(&self, divisor: &Resource) -> bool {
        divisor.memory_mb == 0
    }

    fn ratio(&self, a: &Resource, b: &Resource) -> f64 {
        a.memory_mb as f64 / b.memory_mb as f64
    }

    fn compute_available_containers(&self, available: &Resource, required: &Resource) -> u64 {
        if required.memory_mb == 0 {
            return 0;
        }
        available.memory_mb / required.memory_mb
    }

    fn normalize(&self, resource: &Resource, minimum: &Resource, maximum: &Resource,
                 step: &Resource) -> Resource {
        let memory = round_up(resource.memory_mb.max(minimum.memory_mb), step.memory_mb)
            .min(maximum.memory_mb);
        Resource::new(memory, resource.vcores)
    }
}
