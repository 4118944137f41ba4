use std::cmp::Ordering;
use crate::resource::Resource;
use crate::resource_calculator::{round_up, ResourceCalculator};

/// Dominant Resource Fairness: resources are ranked by their largest share of the cluster,
/// ties are broken by the smaller share.
#[derive(Clone, Default)]
pub struct DominantResourceCalculator;

impl DominantResourceCalculator {
    pub fn new() -> Self {
        Default::default()
    }

    fn share(&self, cluster: &Resource, resource: &Resource, dominant: bool) -> f64 {
        let memory_share = resource.memory_mb as f64 / cluster.memory_mb as f64;
        let vcores_share = resource.vcores as f64 / cluster.vcores as f64;
        if dominant {
            memory_share.max(vcores_share)
        } else {
            memory_share.min(vcores_share)
        }
    }
}

impl ResourceCalculator for DominantResourceCalculator {
    fn name(&self) -> &'static str {
        "dominant"
    }

    fn compare(&self, cluster: &Resource, lhs: &Resource, rhs: &Resource) -> Ordering {
        if lhs == rhs {
            return Ordering::Equal;
        }
        if cluster.memory_mb == 0 || cluster.vcores == 0 {
            // No shares to compare against, fall back to plain lexicographic order.
            return (lhs.memory_mb, lhs.vcores).cmp(&(rhs.memory_mb, rhs.vcores));
        }
        let lhs_dominant = self.share(cluster, lhs, true);
        let rhs_dominant = self.share(cluster, rhs, true);
        match lhs_dominant.total_cmp(&rhs_dominant) {
            Ordering::Equal => {
                let lhs_secondary = self.share(cluster, lhs, false);
                let rhs_secondary = self.share(cluster, rhs, false);
                lhs_secondary.total_cmp(&rhs_secondary)
            }
            ordering => ordering,
        }
    }

    fn divide(&self, cluster: &Resource, numerator: &Resource, denominator: &Resource) -> f64 {
        self.share(cluster, numerator, true) / self.share(cluster, denominator, true)
    }

    fn is_invalid_divisor(&self, divisor: &Resource) -> bool {
        divisor.memory_mb == 0 || divisor.vcores == 0
    }

    fn ratio(&self, a: &Resource, b: &Resource) -> f64 {
        let memory_ratio = a.memory_mb as f64 / b.memory_mb as f64;
        let vcores_ratio = a.vcores as f64 / b.vcores as f64;
        memory_ratio.max(vcores_ratio)
    }

    fn compute_available_containers(&self, available: &Resource, required: &Resource) -> u64 {
        if required.memory_mb == 0 || required.vcores == 0 {
            return 0;
        }
        (available.memory_mb / required.memory_mb).min(available.vcores / required.vcores)
    }

    fn normalize(&self, resource: &Resource, minimum: &Resource, maximum: &Resource,
                 step: &Resource) -> Resource {
        let memory = round_up(resource.memory_mb.max(minimum.memory_mb), step.memory_mb)
            .min(maximum.memory_mb);
        let vcores = round_up(resource.vcores.max(minimum.vcores), step.vcores)
            .min(maximum.vcores);
        Resource::new(memory, vcores)
    }
}
