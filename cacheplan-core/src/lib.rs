//! cacheplan Core - Data Types
//!
//! Datasets, queries, cache sets, errors and configuration shared by every
//! other cacheplan crate. This crate contains no planning logic.

pub mod config;
pub mod error;

pub use config::{PlannerConfig, UtilityKind, MAX_CANDIDATE_DATASETS_CEILING};
pub use error::{
    AllocationError, ConfigError, PlannerError, PlannerResult, ValidationError, WorkloadError,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Position of a query (and thus its tenant) inside one batch.
///
/// Only meaningful for the batch it was assigned in; nothing persists across
/// batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub usize);

impl TenantId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenant#{}", self.0)
    }
}

/// Position of a dataset inside a [`DatasetCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub usize);

impl DatasetId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identifier of one planner invocation, used to correlate log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Generate a new timestamp-sortable batch id.
    pub fn now_v7() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// DATASETS
// ============================================================================

/// A column of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Size in the same unit as dataset size and cache capacity
    #[serde(default)]
    pub size: f64,
}

impl Column {
    pub fn new(name: impl Into<String>, size: f64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// A named, sized unit of cacheable data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub size: f64,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, size: f64) -> Self {
        Self {
            name: name.into(),
            size,
            columns: Vec::new(),
        }
    }

    /// Add a column.
    pub fn with_column(mut self, name: impl Into<String>, size: f64) -> Self {
        self.columns.push(Column::new(name, size));
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Validate name and sizes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "dataset.name".to_string(),
            });
        }
        if !self.size.is_finite() || self.size < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("dataset[{}].size", self.name),
                reason: format!("size must be finite and non-negative, got {}", self.size),
            });
        }
        for column in &self.columns {
            if !column.size.is_finite() || column.size < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("dataset[{}].column[{}].size", self.name, column.name),
                    reason: format!("size must be finite and non-negative, got {}", column.size),
                });
            }
        }
        Ok(())
    }
}

/// Read-only, validated set of datasets available to one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetCatalog {
    datasets: Vec<Dataset>,
    by_name: HashMap<String, DatasetId>,
}

impl DatasetCatalog {
    /// Build a catalog, rejecting invalid datasets and duplicate names.
    pub fn new(datasets: Vec<Dataset>) -> Result<Self, ValidationError> {
        let mut by_name = HashMap::with_capacity(datasets.len());
        for (idx, dataset) in datasets.iter().enumerate() {
            dataset.validate()?;
            if by_name.insert(dataset.name.clone(), DatasetId(idx)).is_some() {
                return Err(ValidationError::DuplicateDataset {
                    name: dataset.name.clone(),
                });
            }
        }
        Ok(Self { datasets, by_name })
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn get(&self, id: DatasetId) -> Option<&Dataset> {
        self.datasets.get(id.0)
    }

    /// Resolve a dataset name to its id.
    pub fn find(&self, name: &str) -> Option<DatasetId> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DatasetId, &Dataset)> {
        self.datasets
            .iter()
            .enumerate()
            .map(|(idx, d)| (DatasetId(idx), d))
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// Map a cache set back to the concrete datasets it holds, in catalog order.
    pub fn resolve(&self, set: &CacheSet) -> Vec<Dataset> {
        set.iter()
            .filter_map(|id| self.get(id))
            .cloned()
            .collect()
    }

    /// Total size of the datasets in a cache set.
    pub fn total_size(&self, set: &CacheSet) -> f64 {
        set.iter()
            .filter_map(|id| self.get(id))
            .map(|d| d.size)
            .sum()
    }
}

// ============================================================================
// QUERIES
// ============================================================================

fn default_weight() -> f64 {
    1.0
}

/// An analytic query issued by a tenant against a single dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Owner of the query, used for reporting only
    #[serde(default)]
    pub tenant: String,
    /// Name of the dataset the query reads
    pub dataset: String,
    /// Columns the query touches
    #[serde(default)]
    pub columns: Vec<String>,
    /// Relative importance of the query
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Query {
    pub fn new(tenant: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            dataset: dataset.into(),
            columns: Vec::new(),
            weight: default_weight(),
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dataset.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "query.dataset".to_string(),
            });
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "query.weight".to_string(),
                reason: format!("weight must be finite and positive, got {}", self.weight),
            });
        }
        Ok(())
    }
}

// ============================================================================
// CACHE SETS
// ============================================================================

/// A concrete cache configuration: the datasets held, sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheSet(Vec<DatasetId>);

impl CacheSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_ids<I: IntoIterator<Item = DatasetId>>(ids: I) -> Self {
        let mut ids: Vec<DatasetId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    pub fn contains(&self, id: DatasetId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = DatasetId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Validate a capacity budget.
pub fn validate_capacity(capacity: f64) -> Result<(), ValidationError> {
    if !capacity.is_finite() || capacity < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "capacity".to_string(),
            reason: format!("capacity must be finite and non-negative, got {}", capacity),
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> DatasetCatalog {
        DatasetCatalog::new(vec![
            Dataset::new("orders", 40.0)
                .with_column("o_id", 10.0)
                .with_column("o_total", 30.0),
            Dataset::new("customers", 25.0),
            Dataset::new("parts", 10.0),
        ])
        .expect("valid catalog")
    }

    #[test]
    fn test_catalog_rejects_duplicate_names() {
        let err = DatasetCatalog::new(vec![Dataset::new("a", 1.0), Dataset::new("a", 2.0)])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateDataset {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_catalog_rejects_negative_size() {
        let err = DatasetCatalog::new(vec![Dataset::new("a", -1.0)]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_catalog_rejects_bad_column_size() {
        let dataset = Dataset::new("a", 1.0).with_column("c", f64::INFINITY);
        assert!(DatasetCatalog::new(vec![dataset]).is_err());
    }

    #[test]
    fn test_catalog_find_and_resolve() {
        let catalog = catalog();
        let parts = catalog.find("parts").expect("parts present");
        let orders = catalog.find("orders").expect("orders present");
        assert_eq!(catalog.find("missing"), None);

        let set = CacheSet::from_ids([parts, orders]);
        let resolved: Vec<String> = catalog.resolve(&set).into_iter().map(|d| d.name).collect();
        assert_eq!(resolved, vec!["orders".to_string(), "parts".to_string()]);
        assert_eq!(catalog.total_size(&set), 50.0);
    }

    #[test]
    fn test_cache_set_is_sorted_and_deduplicated() {
        let set = CacheSet::from_ids([DatasetId(3), DatasetId(1), DatasetId(3)]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(DatasetId(1)));
        assert!(set.contains(DatasetId(3)));
        assert!(!set.contains(DatasetId(2)));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![DatasetId(1), DatasetId(3)]);
    }

    #[test]
    fn test_query_validation() {
        assert!(Query::new("t", "orders").validate().is_ok());
        assert!(Query::new("t", "").validate().is_err());
        assert!(Query::new("t", "orders").with_weight(0.0).validate().is_err());
    }

    #[test]
    fn test_query_deserialize_defaults_weight() {
        let query: Query = serde_json::from_str(r#"{"dataset": "orders"}"#).expect("parse query");
        assert_eq!(query.weight, 1.0);
        assert!(query.columns.is_empty());
    }

    #[test]
    fn test_dataset_column_lookup() {
        let catalog = catalog();
        let orders = catalog.get(DatasetId(0)).expect("orders");
        assert_eq!(orders.column("o_total").map(|c| c.size), Some(30.0));
        assert!(orders.column("nope").is_none());
    }

    #[test]
    fn test_validate_capacity() {
        assert!(validate_capacity(0.0).is_ok());
        assert!(validate_capacity(-0.5).is_err());
        assert!(validate_capacity(f64::NAN).is_err());
    }

    #[test]
    fn test_tenant_id_display() {
        assert_eq!(TenantId(7).to_string(), "tenant#7");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a cache set is strictly increasing and contains
            /// exactly the ids it was built from.
            #[test]
            fn prop_cache_set_canonical(ids in prop::collection::vec(0usize..16, 0..32)) {
                let set = CacheSet::from_ids(ids.iter().copied().map(DatasetId));
                let held: Vec<DatasetId> = set.iter().collect();
                prop_assert!(held.windows(2).all(|w| w[0] < w[1]));
                for id in &ids {
                    prop_assert!(set.contains(DatasetId(*id)));
                }
                prop_assert!(held.iter().all(|d| ids.contains(&d.0)));
            }
        }
    }
}
