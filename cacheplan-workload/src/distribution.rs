//! Which datasets and columns generated queries touch.

use cacheplan_core::{Dataset, WorkloadError};
use serde::{Deserialize, Serialize};

/// Probability that a generated query touches one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChoice {
    pub column: String,
    pub probability: f64,
}

/// Relative weight of one dataset among generated queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetChoice {
    pub dataset: String,
    pub weight: f64,
    #[serde(default)]
    pub columns: Vec<ColumnChoice>,
}

/// Per-dataset weights plus per-column selection probabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDistribution {
    pub datasets: Vec<DatasetChoice>,
}

impl QueryDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset with the given relative weight.
    pub fn with_dataset(mut self, dataset: impl Into<String>, weight: f64) -> Self {
        self.datasets.push(DatasetChoice {
            dataset: dataset.into(),
            weight,
            columns: Vec::new(),
        });
        self
    }

    /// Give a column of the most recently added dataset a selection
    /// probability. Ignored when no dataset has been added.
    pub fn with_column(mut self, column: impl Into<String>, probability: f64) -> Self {
        if let Some(last) = self.datasets.last_mut() {
            last.columns.push(ColumnChoice {
                column: column.into(),
                probability,
            });
        }
        self
    }

    /// Uniform weight over every dataset, every column at probability 1/2.
    pub fn uniform(datasets: &[Dataset]) -> Self {
        Self {
            datasets: datasets
                .iter()
                .map(|d| DatasetChoice {
                    dataset: d.name.clone(),
                    weight: 1.0,
                    columns: d
                        .columns
                        .iter()
                        .map(|c| ColumnChoice {
                            column: c.name.clone(),
                            probability: 0.5,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.datasets.iter().map(|d| d.weight).sum()
    }

    /// Check the distribution against the datasets it draws from.
    pub fn validate(&self, datasets: &[Dataset]) -> Result<(), WorkloadError> {
        for choice in &self.datasets {
            let Some(dataset) = datasets.iter().find(|d| d.name == choice.dataset) else {
                return Err(WorkloadError::UnknownDataset {
                    name: choice.dataset.clone(),
                });
            };
            if !choice.weight.is_finite() || choice.weight < 0.0 {
                return Err(WorkloadError::InvalidWeight {
                    field: format!("dataset[{}].weight", choice.dataset),
                    value: choice.weight,
                });
            }
            for column in &choice.columns {
                if dataset.column(&column.column).is_none() {
                    return Err(WorkloadError::UnknownColumn {
                        dataset: choice.dataset.clone(),
                        column: column.column.clone(),
                    });
                }
                if !(0.0..=1.0).contains(&column.probability) {
                    return Err(WorkloadError::InvalidWeight {
                        field: format!("dataset[{}].column[{}].probability", choice.dataset, column.column),
                        value: column.probability,
                    });
                }
            }
        }
        if self.total_weight() <= 0.0 {
            return Err(WorkloadError::EmptyDistribution);
        }
        Ok(())
    }
}
