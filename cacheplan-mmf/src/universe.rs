//! Enumeration of the allocation universe for one batch.

use crate::utility::{utility_vector, UtilityModel};
use crate::Allocation;
use cacheplan_core::{
    validate_capacity, AllocationError, CacheSet, DatasetCatalog, DatasetId, PlannerConfig,
    PlannerResult, Query,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Enumerate every maximal cache set that fits in `capacity` and attach its
/// utility vector.
///
/// Candidates are the datasets referenced by at least one query that fit on
/// their own. Sets are produced depth-first in catalog order, taking a
/// dataset before skipping it. When nothing fits the universe is the single
/// empty allocation.
pub fn generate_allocations(
    catalog: &DatasetCatalog,
    queries: &[Query],
    capacity: f64,
    model: &dyn UtilityModel,
    config: &PlannerConfig,
) -> PlannerResult<Vec<Allocation>> {
    validate_capacity(capacity)?;
    for query in queries {
        query.validate()?;
    }
    let budget = capacity + config.epsilon;

    let mut referenced = HashSet::with_capacity(queries.len());
    for (idx, query) in queries.iter().enumerate() {
        match catalog.find(&query.dataset) {
            Some(id) => {
                referenced.insert(id);
            }
            None => warn!(
                tenant = idx,
                dataset = %query.dataset,
                "query references unknown dataset, tenant gets no utility"
            ),
        }
    }

    let candidates: Vec<(DatasetId, f64)> = catalog
        .iter()
        .filter(|(id, dataset)| referenced.contains(id) && dataset.size <= budget)
        .map(|(id, dataset)| (id, dataset.size))
        .collect();
    if candidates.len() > config.max_candidate_datasets {
        return Err(AllocationError::UniverseTooLarge {
            candidates: candidates.len(),
            limit: config.max_candidate_datasets,
        }
        .into());
    }

    let mut sets = Vec::new();
    let mut taken = vec![false; candidates.len()];
    enumerate_maximal(&candidates, 0, budget, &mut taken, &mut sets);

    let allocations: Vec<Allocation> = sets
        .into_iter()
        .map(|set| {
            let size = catalog.total_size(&set);
            let utilities = utility_vector(model, catalog, queries, &set);
            Allocation::new(set, size, utilities)
        })
        .collect();

    debug!(
        candidates = candidates.len(),
        allocations = allocations.len(),
        capacity,
        "allocation universe enumerated"
    );
    Ok(allocations)
}

fn enumerate_maximal(
    candidates: &[(DatasetId, f64)],
    next: usize,
    remaining: f64,
    taken: &mut [bool],
    out: &mut Vec<CacheSet>,
) {
    if next == candidates.len() {
        let extendable = candidates
            .iter()
            .zip(taken.iter())
            .any(|((_, size), taken)| !taken && *size <= remaining);
        if !extendable {
            let ids = candidates
                .iter()
                .zip(taken.iter())
                .filter(|(_, taken)| **taken)
                .map(|((id, _), _)| *id);
            out.push(CacheSet::from_ids(ids));
        }
        return;
    }

    let size = candidates[next].1;
    if size <= remaining {
        taken[next] = true;
        enumerate_maximal(candidates, next + 1, remaining - size, taken, out);
        taken[next] = false;
    }
    enumerate_maximal(candidates, next + 1, remaining, taken, out);
}
