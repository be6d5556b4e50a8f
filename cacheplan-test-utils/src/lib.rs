//! cacheplan Test Utilities
//!
//! Shared test infrastructure for the cacheplan workspace:
//! - Mock LP solvers for driving failure paths
//! - Proptest generators for datasets, queries and whole batches
//! - Fixtures for common scenarios
//! - Assertions on planner errors

pub use cacheplan_core::{
    AllocationError, Dataset, DatasetCatalog, PlannerConfig, PlannerError, PlannerResult, Query,
    TenantId, UtilityKind,
};
pub use cacheplan_lp::{DenseSimplex, LinearProgram, LpError, LpSolution, LpSolver};

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// MOCK SOLVERS
// ============================================================================

/// LP solver that fails every call.
#[derive(Debug, Clone)]
pub struct FailingLpSolver {
    error: LpError,
}

impl FailingLpSolver {
    pub fn new(error: LpError) -> Self {
        Self { error }
    }
}

impl Default for FailingLpSolver {
    fn default() -> Self {
        Self::new(LpError::Infeasible)
    }
}

impl LpSolver for FailingLpSolver {
    fn solve(&self, _lp: &LinearProgram) -> Result<LpSolution, LpError> {
        Err(self.error.clone())
    }
}

/// Delegates to [`DenseSimplex`] but fails the n-th call (0-based) with a
/// scripted error. Counts every call it receives.
#[derive(Debug)]
pub struct ScriptedLpSolver {
    inner: DenseSimplex,
    fail_at: Option<usize>,
    error: LpError,
    calls: AtomicUsize,
}

impl ScriptedLpSolver {
    /// Never fails; only counts calls.
    pub fn passthrough() -> Self {
        Self {
            inner: DenseSimplex::new(),
            fail_at: None,
            error: LpError::Infeasible,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_at(call: usize, error: LpError) -> Self {
        Self {
            fail_at: Some(call),
            error,
            ..Self::passthrough()
        }
    }

    /// Number of `solve` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LpSolver for ScriptedLpSolver {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(call) {
            return Err(self.error.clone());
        }
        self.inner.solve(lp)
    }
}

/// Deterministic random source for tests.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for planner inputs.

    use super::*;
    use proptest::prelude::*;

    /// A complete planner input.
    #[derive(Debug, Clone)]
    pub struct Batch {
        pub datasets: Vec<Dataset>,
        pub queries: Vec<Query>,
        pub capacity: f64,
    }

    /// Generate a dataset with an integral size in `1..20`.
    pub fn arb_dataset(name: String) -> impl Strategy<Value = Dataset> {
        (1u32..20).prop_map(move |size| Dataset::new(name.clone(), f64::from(size)))
    }

    /// Generate a query against one of `datasets` names.
    pub fn arb_query(datasets: Vec<String>) -> impl Strategy<Value = Query> {
        (prop::sample::select(datasets), 1u32..4, "[a-z]{1,6}").prop_map(
            |(dataset, weight, tenant)| Query::new(tenant, dataset).with_weight(f64::from(weight)),
        )
    }

    /// Generate a batch: up to 5 datasets, up to 5 queries over them, and a
    /// capacity that may fit none, some or all of them.
    pub fn arb_batch() -> impl Strategy<Value = Batch> {
        (1usize..6)
            .prop_flat_map(|count| {
                let names: Vec<String> = (0..count).map(|i| format!("d{}", i)).collect();
                let datasets: Vec<_> = names.iter().cloned().map(arb_dataset).collect();
                (
                    datasets,
                    prop::collection::vec(arb_query(names), 1..6),
                    0u32..40,
                )
            })
            .prop_map(|(datasets, queries, capacity)| Batch {
                datasets,
                queries,
                capacity: f64::from(capacity),
            })
    }

    /// Generate a valid planner configuration.
    pub fn arb_valid_config() -> impl Strategy<Value = PlannerConfig> {
        (
            prop_oneof![Just(1e-9), Just(1e-6), Just(1e-4)],
            8usize..=cacheplan_core::MAX_CANDIDATE_DATASETS_CEILING,
            prop_oneof![Just(UtilityKind::Binary), Just(UtilityKind::ScanSavings)],
            1000usize..20_000,
        )
            .prop_map(|(epsilon, max_candidate_datasets, utility, simplex_max_iterations)| {
                PlannerConfig {
                    epsilon,
                    max_candidate_datasets,
                    utility,
                    simplex_max_iterations,
                }
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built inputs for common scenarios.

    use super::*;

    /// Two equal datasets of which only one fits, and two tenants each
    /// wanting a different one. The fair answer is a coin flip.
    pub fn two_dataset_batch() -> (Vec<Dataset>, Vec<Query>, f64) {
        (
            vec![Dataset::new("A", 10.0), Dataset::new("B", 10.0)],
            vec![Query::new("alice", "A"), Query::new("bob", "B")],
            10.0,
        )
    }

    /// A batch where one tenant is served by every maximal cache set and
    /// therefore saturates a level after the others.
    pub fn shared_dataset_batch() -> (Vec<Dataset>, Vec<Query>, f64) {
        (
            vec![
                Dataset::new("orders", 6.0),
                Dataset::new("parts", 4.0),
                Dataset::new("customers", 6.0),
            ],
            vec![
                Query::new("alice", "orders"),
                Query::new("bob", "parts"),
                Query::new("carol", "customers"),
            ],
            10.0,
        )
    }

    /// Default configuration with a fixed epsilon.
    pub fn test_config() -> PlannerConfig {
        PlannerConfig {
            epsilon: 1e-6,
            ..PlannerConfig::default()
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on planner results.

    use super::*;

    /// Assert two floats agree within `tolerance`.
    #[track_caller]
    pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} within {}, got {}",
            expected,
            tolerance,
            actual
        );
    }

    /// Assert that a result is an `InfeasibleAllocation` raised at `level`.
    #[track_caller]
    pub fn assert_infeasible_at<T: std::fmt::Debug>(
        result: &PlannerResult<T>,
        level: usize,
        probe: Option<TenantId>,
    ) {
        match result {
            Err(PlannerError::Allocation(AllocationError::InfeasibleAllocation {
                level: l,
                probe: p,
                ..
            })) => {
                assert_eq!(*l, level, "wrong level");
                assert_eq!(*p, probe, "wrong probe");
            }
            other => panic!("Expected InfeasibleAllocation, got: {:?}", other),
        }
    }

    /// Assert that a result is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &PlannerResult<T>) {
        match result {
            Err(PlannerError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }
}
