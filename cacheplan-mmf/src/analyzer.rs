//! Batch analyzers: one cache decision per batch of queries.

use crate::extractor::extract_allocation;
use crate::solver::{FairnessReport, ProgressiveSolver};
use crate::universe::generate_allocations;
use crate::utility::{utility_model, UtilityModel};
use crate::AllocationDistribution;
use cacheplan_core::{
    BatchId, Dataset, DatasetCatalog, PlannerConfig, PlannerResult, Query,
};
use cacheplan_lp::{DenseSimplex, LpSolver};
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info};

/// Cache contents chosen for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchDecision {
    pub batch_id: BatchId,
    /// Datasets to hold in the cache, in catalog order
    pub datasets: Vec<Dataset>,
    /// Absent when the batch was empty and no solve ran
    pub report: Option<FairnessReport>,
}

/// Decides which datasets to cache for a batch of queries.
pub trait BatchAnalyzer {
    /// `cached` is the cache content of the previous epoch. It is returned
    /// unchanged when `queries` is empty.
    fn analyze_batch(
        &self,
        queries: &[Query],
        cached: &[Dataset],
        capacity: f64,
        rng: &mut dyn RngCore,
    ) -> PlannerResult<BatchDecision>;
}

/// Fair distribution and its solve report, before sampling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairPlan {
    pub distribution: AllocationDistribution,
    pub report: FairnessReport,
}

/// Max-min-fair analyzer: every query is a tenant, and the decision is drawn
/// from the max-min-fair mixed strategy over all maximal cache sets.
pub struct MmfBatchAnalyzer<S: LpSolver = DenseSimplex> {
    catalog: DatasetCatalog,
    config: PlannerConfig,
    solver: S,
    utility: Box<dyn UtilityModel>,
}

impl MmfBatchAnalyzer<DenseSimplex> {
    /// Analyzer backed by the built-in simplex, sized by the config.
    pub fn with_default_solver(datasets: Vec<Dataset>, config: PlannerConfig) -> PlannerResult<Self> {
        let solver = DenseSimplex::new().with_max_iterations(config.simplex_max_iterations);
        Self::new(datasets, config, solver)
    }
}

impl<S: LpSolver> MmfBatchAnalyzer<S> {
    pub fn new(datasets: Vec<Dataset>, config: PlannerConfig, solver: S) -> PlannerResult<Self> {
        config.validate()?;
        let catalog = DatasetCatalog::new(datasets)?;
        Ok(Self {
            catalog,
            utility: utility_model(config.utility),
            config,
            solver,
        })
    }

    /// Replace the utility model chosen by `config.utility`.
    pub fn with_utility_model(mut self, utility: Box<dyn UtilityModel>) -> Self {
        self.utility = utility;
        self
    }

    pub fn catalog(&self) -> &DatasetCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Build the universe for `queries` and solve for its fair distribution.
    pub fn plan(&self, queries: &[Query], capacity: f64) -> PlannerResult<FairPlan> {
        let allocations = generate_allocations(
            &self.catalog,
            queries,
            capacity,
            self.utility.as_ref(),
            &self.config,
        )?;
        let physical = allocations.len();
        let mut distribution = AllocationDistribution::merged(allocations)?;
        debug!(
            physical,
            distinct = distribution.len(),
            tenants = distribution.tenants(),
            "allocation universe deduplicated"
        );

        let report = ProgressiveSolver::new(&self.solver, self.config.epsilon)
            .solve(&mut distribution)?;
        Ok(FairPlan {
            distribution,
            report,
        })
    }
}

impl<S: LpSolver> BatchAnalyzer for MmfBatchAnalyzer<S> {
    fn analyze_batch(
        &self,
        queries: &[Query],
        cached: &[Dataset],
        capacity: f64,
        rng: &mut dyn RngCore,
    ) -> PlannerResult<BatchDecision> {
        let batch_id = BatchId::now_v7();
        info!(
            batch_id = %batch_id,
            queries = queries.len(),
            capacity,
            "analyzing batch"
        );

        if queries.is_empty() {
            info!(batch_id = %batch_id, "empty batch, keeping cache contents");
            return Ok(BatchDecision {
                batch_id,
                datasets: cached.to_vec(),
                report: None,
            });
        }

        let plan = self.plan(queries, capacity)?;
        let datasets = extract_allocation(&plan.distribution, &self.catalog, rng)?;

        let served = queries
            .iter()
            .filter(|q| datasets.iter().any(|d| d.name == q.dataset))
            .count();
        info!(
            batch_id = %batch_id,
            levels = plan.report.levels.len(),
            lp_solves = plan.report.lp_solves,
            datasets = ?datasets.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            served,
            "batch decided"
        );

        Ok(BatchDecision {
            batch_id,
            datasets,
            report: Some(plan.report),
        })
    }
}
