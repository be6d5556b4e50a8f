//! Turn a fair distribution into one concrete cache decision.

use crate::{Allocation, AllocationDistribution};
use cacheplan_core::{AllocationError, Dataset, DatasetCatalog, PlannerResult};
use rand::Rng;

/// Draw one allocation in proportion to its weight.
pub fn sample_allocation<'d, R: Rng + ?Sized>(
    distribution: &'d AllocationDistribution,
    rng: &mut R,
) -> PlannerResult<&'d Allocation> {
    distribution.random_allocation(rng).ok_or_else(|| {
        AllocationError::InvalidDistribution {
            sum: distribution.weight_sum(),
        }
        .into()
    })
}

/// Sample an allocation and return the datasets it caches, in catalog order.
pub fn extract_allocation<R: Rng + ?Sized>(
    distribution: &AllocationDistribution,
    catalog: &DatasetCatalog,
    rng: &mut R,
) -> PlannerResult<Vec<Dataset>> {
    let allocation = sample_allocation(distribution, rng)?;
    Ok(catalog.resolve(allocation.cache_set()))
}
