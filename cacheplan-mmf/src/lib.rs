//! cacheplan MMF - Max-Min-Fair Cache Allocation
//!
//! Given a batch of queries (one tenant each), a dataset catalog and a cache
//! capacity, this crate:
//!
//! 1. enumerates every maximal cache set that fits ([`generate_allocations`]),
//! 2. collapses allocations that look identical to every tenant
//!    ([`AllocationDistribution::merged`]),
//! 3. computes the max-min-fair mixed strategy over them by progressive
//!    filling ([`ProgressiveSolver`]),
//! 4. samples one concrete cache decision ([`extract_allocation`]).
//!
//! [`MmfBatchAnalyzer`] runs the whole pipeline behind the
//! [`BatchAnalyzer`] trait.

pub mod allocation;
pub mod analyzer;
pub mod extractor;
pub mod solver;
pub mod universe;
pub mod utility;

pub use allocation::{Allocation, AllocationDistribution};
pub use analyzer::{BatchAnalyzer, BatchDecision, FairPlan, MmfBatchAnalyzer};
pub use extractor::{extract_allocation, sample_allocation};
pub use solver::{FairnessReport, LevelRecord, ProgressiveSolver};
pub use universe::generate_allocations;
pub use utility::{
    compute_u_stars, u_stars, utility_model, utility_vector, CachedDatasetUtility,
    ScanSavingsUtility, UtilityModel,
};
