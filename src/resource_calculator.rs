use std::cmp::Ordering;
use dyn_clone::{clone_trait_object, DynClone};
use serde::{Deserialize, Serialize};
use crate::default_resource_calculators::default_calculator::DefaultResourceCalculator;
use crate::default_resource_calculators::dominant_calculator::DominantResourceCalculator;
use crate::resource::Resource;

/// Defines what "enough" and "less than" mean for resource vectors.
/// `cluster` is the total cluster resource, used by calculators that rank by share.
pub trait ResourceCalculator: DynClone + Send + Sync {
    fn name(&self) -> &'static str;

    /// Total order over resources. Must be deterministic for equal shares.
    fn compare(&self, cluster: &Resource, lhs: &Resource, rhs: &Resource) -> Ordering;

    fn divide(&self, cluster: &Resource, numerator: &Resource, denominator: &Resource) -> f64;

    fn is_invalid_divisor(&self, divisor: &Resource) -> bool;

    fn ratio(&self, a: &Resource, b: &Resource) -> f64;

    /// How many containers of `required` fit into `available`.
    fn compute_available_containers(&self, available: &Resource, required: &Resource) -> u64;

    /// Rounds `resource` up to a multiple of `step`, bounded by `minimum` and `maximum`.
    fn normalize(&self, resource: &Resource, minimum: &Resource, maximum: &Resource,
                 step: &Resource) -> Resource;

    fn less_than_or_equal(&self, cluster: &Resource, lhs: &Resource, rhs: &Resource) -> bool {
        self.compare(cluster, lhs, rhs) != Ordering::Greater
    }

    fn greater_than(&self, cluster: &Resource, lhs: &Resource, rhs: &Resource) -> bool {
        self.compare(cluster, lhs, rhs) == Ordering::Greater
    }

    fn greater_than_or_equal(&self, cluster: &Resource, lhs: &Resource, rhs: &Resource) -> bool {
        self.compare(cluster, lhs, rhs) != Ordering::Less
    }

    fn max(&self, cluster: &Resource, lhs: &Resource, rhs: &Resource) -> Resource {
        if self.greater_than_or_equal(cluster, lhs, rhs) { *lhs } else { *rhs }
    }

    fn min(&self, cluster: &Resource, lhs: &Resource, rhs: &Resource) -> Resource {
        if self.less_than_or_equal(cluster, lhs, rhs) { *lhs } else { *rhs }
    }
}

clone_trait_object!(ResourceCalculator);

/// Calculator selector used by the scheduler configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculatorKind {
    #[default]
    Default,
    Dominant,
}

pub fn resource_calculator_resolver(kind: CalculatorKind) -> Box<dyn ResourceCalculator> {
    match kind {
        CalculatorKind::Default => Box::new(DefaultResourceCalculator::new()),
        CalculatorKind::Dominant => Box::new(DominantResourceCalculator::new()),
    }
}

pub(crate) fn round_up(value: u64, step: u64) -> u64 {
    if step == 0 {
        return value;
    }
    value.div_ceil(step) * step
}
