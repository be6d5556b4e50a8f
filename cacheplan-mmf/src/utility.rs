//! Per-tenant utility of a cache configuration.

use crate::universe::generate_allocations;
use crate::Allocation;
use cacheplan_core::{CacheSet, DatasetCatalog, PlannerConfig, PlannerResult, Query, UtilityKind};

/// Scores how well a cache set serves one query.
///
/// Implementations must be monotone: adding datasets to a cache set never
/// lowers a query's utility. The universe only enumerates maximal cache sets
/// and relies on this.
pub trait UtilityModel: Send + Sync {
    fn utility(&self, query: &Query, catalog: &DatasetCatalog, cached: &CacheSet) -> f64;
}

/// Query weight if the query's dataset is cached, zero otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachedDatasetUtility;

impl UtilityModel for CachedDatasetUtility {
    fn utility(&self, query: &Query, catalog: &DatasetCatalog, cached: &CacheSet) -> f64 {
        match catalog.find(&query.dataset) {
            Some(id) if cached.contains(id) => query.weight,
            _ => 0.0,
        }
    }
}

/// Bytes of the touched columns a cached dataset saves the query, scaled by
/// query weight. Queries naming no known column count the whole dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSavingsUtility;

impl UtilityModel for ScanSavingsUtility {
    fn utility(&self, query: &Query, catalog: &DatasetCatalog, cached: &CacheSet) -> f64 {
        let Some(id) = catalog.find(&query.dataset) else {
            return 0.0;
        };
        if !cached.contains(id) {
            return 0.0;
        }
        let Some(dataset) = catalog.get(id) else {
            return 0.0;
        };

        let touched: Vec<f64> = query
            .columns
            .iter()
            .filter_map(|name| dataset.column(name))
            .map(|c| c.size)
            .collect();
        let scanned = if touched.is_empty() {
            dataset.size
        } else {
            touched.iter().sum()
        };
        query.weight * scanned
    }
}

/// Utility model selected by configuration.
pub fn utility_model(kind: UtilityKind) -> Box<dyn UtilityModel> {
    match kind {
        UtilityKind::Binary => Box::new(CachedDatasetUtility),
        UtilityKind::ScanSavings => Box::new(ScanSavingsUtility),
    }
}

/// Utility vector of a cache set: one entry per query, in batch order.
pub fn utility_vector(
    model: &dyn UtilityModel,
    catalog: &DatasetCatalog,
    queries: &[Query],
    cached: &CacheSet,
) -> Vec<f64> {
    queries
        .iter()
        .map(|q| model.utility(q, catalog, cached))
        .collect()
}

/// Best utility each tenant can get from a single allocation, ignoring
/// everyone else.
pub fn u_stars(allocations: &[Allocation], tenants: usize) -> Vec<f64> {
    let mut best = vec![0.0_f64; tenants];
    for allocation in allocations {
        for (b, u) in best.iter_mut().zip(allocation.utilities()) {
            *b = b.max(*u);
        }
    }
    best
}

/// Enumerate the universe for a batch and return every tenant's `u_star`.
///
/// A tenant whose dataset never fits, or is unknown, gets 0.
pub fn compute_u_stars(
    catalog: &DatasetCatalog,
    queries: &[Query],
    capacity: f64,
    model: &dyn UtilityModel,
    config: &PlannerConfig,
) -> PlannerResult<Vec<f64>> {
    let allocations = generate_allocations(catalog, queries, capacity, model, config)?;
    Ok(u_stars(&allocations, queries.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cacheplan_core::Dataset;

    fn catalog() -> DatasetCatalog {
        DatasetCatalog::new(vec![
            Dataset::new("orders", 100.0)
                .with_column("o_id", 10.0)
                .with_column("o_total", 40.0),
            Dataset::new("parts", 30.0),
        ])
        .expect("valid catalog")
    }

    #[test]
    fn test_binary_utility() {
        let catalog = catalog();
        let orders = catalog.find("orders").expect("orders");
        let cached = CacheSet::from_ids([orders]);
        let model = CachedDatasetUtility;

        assert_eq!(model.utility(&Query::new("a", "orders").with_weight(2.0), &catalog, &cached), 2.0);
        assert_eq!(model.utility(&Query::new("a", "parts"), &catalog, &cached), 0.0);
        assert_eq!(model.utility(&Query::new("a", "unknown"), &catalog, &cached), 0.0);
    }

    #[test]
    fn test_scan_savings_counts_touched_columns() {
        let catalog = catalog();
        let cached = CacheSet::from_ids([
            catalog.find("orders").expect("orders"),
            catalog.find("parts").expect("parts"),
        ]);
        let model = ScanSavingsUtility;

        let narrow = Query::new("a", "orders").with_columns(["o_total"]);
        assert_eq!(model.utility(&narrow, &catalog, &cached), 40.0);

        let wide = Query::new("a", "orders")
            .with_columns(["o_id", "o_total", "missing"])
            .with_weight(0.5);
        assert_eq!(model.utility(&wide, &catalog, &cached), 25.0);

        // no known columns: the whole dataset is scanned
        let whole = Query::new("a", "parts").with_columns(["nope"]);
        assert_eq!(model.utility(&whole, &catalog, &cached), 30.0);

        assert_eq!(model.utility(&narrow, &catalog, &CacheSet::empty()), 0.0);
    }

    #[test]
    fn test_compute_u_stars_marks_unservable_tenants_zero() {
        let catalog = catalog();
        let queries = vec![
            Query::new("a", "orders"),
            Query::new("b", "parts"),
            Query::new("c", "ghost"),
        ];
        // only parts fits
        let u_star = compute_u_stars(
            &catalog,
            &queries,
            50.0,
            &CachedDatasetUtility,
            &PlannerConfig::default(),
        )
        .expect("universe builds");
        assert_eq!(u_star, vec![0.0, 1.0, 0.0]);
    }
}
