//! Error types for cacheplan operations

use crate::TenantId;
use thiserror::Error;

/// Input validation errors (datasets, queries, capacity).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate dataset name in catalog: {name}")]
    DuplicateDataset { name: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors raised while building or solving the fair allocation.
///
/// Every variant is fatal to the batch: the planner never reports a partial
/// allocation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AllocationError {
    #[error("Allocation infeasible at level {level}{}: {reason}", probe_suffix(.probe))]
    InfeasibleAllocation {
        level: usize,
        /// Tenant being probed for saturation, `None` for the level solve itself.
        probe: Option<TenantId>,
        reason: String,
    },

    #[error("Allocation universe too large: {candidates} candidate datasets exceed limit {limit}")]
    UniverseTooLarge { candidates: usize, limit: usize },

    #[error("Allocation weights do not form a distribution (sum = {sum})")]
    InvalidDistribution { sum: f64 },

    #[error("Allocation universe is empty")]
    EmptyUniverse,
}

fn probe_suffix(probe: &Option<TenantId>) -> String {
    match probe {
        Some(tenant) => format!(" (saturation probe for {})", tenant),
        None => String::new(),
    }
}

/// Workload generation errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkloadError {
    #[error("Invalid arrival rate {lambda}: must be positive and finite")]
    InvalidRate { lambda: f64 },

    #[error("Query distribution references unknown dataset: {name}")]
    UnknownDataset { name: String },

    #[error("Query distribution references unknown column {column} of dataset {dataset}")]
    UnknownColumn { dataset: String, column: String },

    #[error("Invalid weight for {field}: {value}")]
    InvalidWeight { field: String, value: f64 },

    #[error("Query distribution has no positive weight")]
    EmptyDistribution,
}

/// Master error type for all cacheplan errors.
#[derive(Debug, Clone, Error)]
pub enum PlannerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Workload error: {0}")]
    Workload(#[from] WorkloadError),
}

/// Result type alias for cacheplan operations.
pub type PlannerResult<T> = Result<T, PlannerError>;

// =============================================================================
// TESTS
// =============================================================================
