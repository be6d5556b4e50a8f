//! cacheplan CLI - Batch File Planning
//!
//! Loads one batch (capacity, datasets, queries and the previous cache
//! contents) from a TOML or JSON file, plans it, and reports the chosen
//! datasets.

use cacheplan_core::{Dataset, PlannerConfig, PlannerError, Query};
use cacheplan_mmf::{BatchAnalyzer, BatchDecision, MmfBatchAnalyzer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const USAGE: &str = "Usage: cacheplan <batch-file> [--seed N]";

/// Errors surfaced by the command-line front end.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Usage: cacheplan <batch-file> [--seed N]")]
    Usage,

    #[error("Invalid seed {value}: {reason}")]
    InvalidSeed { value: String, reason: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported batch file format: {} (expected .toml or .json)", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid TOML batch file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON batch file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cached dataset {name} is not in the batch catalog")]
    UnknownCachedDataset { name: String },

    #[error(transparent)]
    Planner(#[from] PlannerError),
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub batch_file: PathBuf,
    pub seed: Option<u64>,
}

impl CliArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut batch_file = None;
        let mut seed = None;
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--seed" => {
                    let value = args.next().ok_or(CliError::Usage)?;
                    let parsed = value.parse::<u64>().map_err(|e: std::num::ParseIntError| {
                        CliError::InvalidSeed {
                            value: value.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    seed = Some(parsed);
                }
                "-h" | "--help" => return Err(CliError::Usage),
                _ if batch_file.is_none() => batch_file = Some(PathBuf::from(arg)),
                _ => return Err(CliError::Usage),
            }
        }
        Ok(Self {
            batch_file: batch_file.ok_or(CliError::Usage)?,
            seed,
        })
    }
}

/// Contents of a batch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFile {
    pub capacity: f64,
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub queries: Vec<Query>,
    /// Names of the datasets cached during the previous epoch
    #[serde(default)]
    pub cached: Vec<String>,
    /// Overrides the environment-derived configuration when present
    #[serde(default)]
    pub config: Option<PlannerConfig>,
}

impl BatchFile {
    /// Load a batch file, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Err(CliError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Resolve `cached` names against the batch's datasets.
    pub fn cached_datasets(&self) -> Result<Vec<Dataset>, CliError> {
        self.cached
            .iter()
            .map(|name| {
                self.datasets
                    .iter()
                    .find(|d| &d.name == name)
                    .cloned()
                    .ok_or_else(|| CliError::UnknownCachedDataset { name: name.clone() })
            })
            .collect()
    }
}

/// Plan the batch named by `args` and return the decision.
pub fn run(args: &CliArgs) -> Result<BatchDecision, CliError> {
    let batch = BatchFile::load(&args.batch_file)?;
    let cached = batch.cached_datasets()?;
    let config = batch.config.clone().unwrap_or_else(PlannerConfig::from_env);
    let analyzer = MmfBatchAnalyzer::with_default_solver(batch.datasets.clone(), config)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let decision = analyzer.analyze_batch(&batch.queries, &cached, batch.capacity, &mut rng)?;

    if let Some(report) = &decision.report {
        for level in &report.levels {
            info!(
                level = level.level,
                max_value = level.max_value,
                saturated = ?level.saturated.iter().map(|t| t.index()).collect::<Vec<_>>(),
                "fairness level"
            );
        }
    }
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_batch(extension: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(extension)
            .tempfile()
            .expect("create temp file");
        file.write_all(content.as_bytes()).expect("write batch");
        file
    }

    const TOML_BATCH: &str = r#"
capacity = 10.0
cached = ["B"]

[[datasets]]
name = "A"
size = 10.0

[[datasets]]
name = "B"
size = 10.0

[[queries]]
tenant = "alice"
dataset = "A"

[[queries]]
tenant = "bob"
dataset = "B"
"#;

    #[test]
    fn test_parse_args() {
        let args = CliArgs::parse(["batch.toml", "--seed", "42"]).expect("valid args");
        assert_eq!(args.batch_file, PathBuf::from("batch.toml"));
        assert_eq!(args.seed, Some(42));

        assert!(matches!(CliArgs::parse(Vec::<String>::new()), Err(CliError::Usage)));
        assert!(matches!(CliArgs::parse(["a", "b"]), Err(CliError::Usage)));
        assert!(matches!(CliArgs::parse(["a", "--seed"]), Err(CliError::Usage)));
        assert!(matches!(
            CliArgs::parse(["a", "--seed", "x"]),
            Err(CliError::InvalidSeed { .. })
        ));
    }

    #[test]
    fn test_load_toml_batch() {
        let file = write_batch(".toml", TOML_BATCH);
        let batch = BatchFile::load(file.path()).expect("parse toml");
        assert_eq!(batch.capacity, 10.0);
        assert_eq!(batch.datasets.len(), 2);
        assert_eq!(batch.queries[1].weight, 1.0);
        assert_eq!(batch.cached_datasets().expect("known")[0].name, "B");
        assert!(batch.config.is_none());
    }

    #[test]
    fn test_load_json_batch_with_config() {
        let file = write_batch(
            ".json",
            r#"{"capacity": 5, "datasets": [{"name": "A", "size": 5}],
                "queries": [{"dataset": "A"}],
                "config": {"epsilon": 1e-7}}"#,
        );
        let batch = BatchFile::load(file.path()).expect("parse json");
        let config = batch.config.expect("config present");
        assert_eq!(config.epsilon, 1e-7);
        assert_eq!(config.max_candidate_datasets, 20);
    }

    #[test]
    fn test_unknown_extension_and_cached_name() {
        let file = write_batch(".yaml", "capacity: 1");
        assert!(matches!(
            BatchFile::load(file.path()),
            Err(CliError::UnsupportedFormat { .. })
        ));

        let batch = BatchFile {
            capacity: 1.0,
            datasets: Vec::new(),
            queries: Vec::new(),
            cached: vec!["ghost".to_string()],
            config: None,
        };
        assert!(matches!(
            batch.cached_datasets(),
            Err(CliError::UnknownCachedDataset { .. })
        ));
    }

    #[test]
    fn test_run_is_reproducible_with_seed() {
        let file = write_batch(".toml", TOML_BATCH);
        let args = CliArgs {
            batch_file: file.path().to_path_buf(),
            seed: Some(7),
        };
        let first = run(&args).expect("planned");
        let second = run(&args).expect("planned");
        assert_eq!(first.datasets, second.datasets);
        assert_eq!(first.datasets.len(), 1);
        assert!(first.report.is_some());
    }

    #[test]
    fn test_run_empty_batch_returns_cached() {
        let file = write_batch(
            ".json",
            r#"{"capacity": 10, "datasets": [{"name": "A", "size": 10}], "cached": ["A"]}"#,
        );
        let args = CliArgs {
            batch_file: file.path().to_path_buf(),
            seed: None,
        };
        let decision = run(&args).expect("no-op batch");
        assert_eq!(decision.datasets[0].name, "A");
        assert!(decision.report.is_none());
    }
}
