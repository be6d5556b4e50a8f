//! Configuration types

use crate::{ConfigError, PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which utility function scores a query against a cache set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityKind {
    /// Query weight if its dataset is cached, zero otherwise
    #[default]
    Binary,
    /// Bytes of touched columns the cache saves, scaled by query weight
    ScanSavings,
}

impl FromStr for UtilityKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(UtilityKind::Binary),
            "scan_savings" | "scan-savings" => Ok(UtilityKind::ScanSavings),
            other => Err(ConfigError::InvalidValue {
                field: "utility".to_string(),
                value: other.to_string(),
                reason: "expected one of: binary, scan_savings".to_string(),
            }),
        }
    }
}

/// Planner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Tolerance for comparing LP optima, capacity checks and weight sums
    pub epsilon: f64,
    /// Upper bound on datasets considered when enumerating the universe
    pub max_candidate_datasets: usize,
    /// Utility function used to build utility vectors
    pub utility: UtilityKind,
    /// Pivot limit for each simplex phase
    pub simplex_max_iterations: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            max_candidate_datasets: 20,
            utility: UtilityKind::Binary,
            simplex_max_iterations: 10_000,
        }
    }
}

/// Hard ceiling on `max_candidate_datasets`; the universe is exponential in it.
pub const MAX_CANDIDATE_DATASETS_CEILING: usize = 30;

impl PlannerConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CACHEPLAN_EPSILON`: comparison tolerance (default: 1e-6)
    /// - `CACHEPLAN_MAX_CANDIDATES`: candidate dataset limit (default: 20)
    /// - `CACHEPLAN_UTILITY`: `binary` or `scan_savings` (default: binary)
    /// - `CACHEPLAN_SIMPLEX_MAX_ITERATIONS`: pivot limit (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            epsilon: std::env::var("CACHEPLAN_EPSILON")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.epsilon),
            max_candidate_datasets: std::env::var("CACHEPLAN_MAX_CANDIDATES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_candidate_datasets),
            utility: std::env::var("CACHEPLAN_UTILITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.utility),
            simplex_max_iterations: std::env::var("CACHEPLAN_SIMPLEX_MAX_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.simplex_max_iterations),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - epsilon is finite and in (0.0, 0.1)
    /// - max_candidate_datasets in [1, 30]
    /// - simplex_max_iterations > 0
    pub fn validate(&self) -> PlannerResult<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 || self.epsilon >= 0.1 {
            return Err(PlannerError::Config(ConfigError::InvalidValue {
                field: "epsilon".to_string(),
                value: self.epsilon.to_string(),
                reason: "epsilon must be in (0.0, 0.1)".to_string(),
            }));
        }

        if self.max_candidate_datasets == 0
            || self.max_candidate_datasets > MAX_CANDIDATE_DATASETS_CEILING
        {
            return Err(PlannerError::Config(ConfigError::InvalidValue {
                field: "max_candidate_datasets".to_string(),
                value: self.max_candidate_datasets.to_string(),
                reason: format!(
                    "max_candidate_datasets must be between 1 and {}",
                    MAX_CANDIDATE_DATASETS_CEILING
                ),
            }));
        }

        if self.simplex_max_iterations == 0 {
            return Err(PlannerError::Config(ConfigError::InvalidValue {
                field: "simplex_max_iterations".to_string(),
                value: self.simplex_max_iterations.to_string(),
                reason: "simplex_max_iterations must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
