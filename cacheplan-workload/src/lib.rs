//! cacheplan Workload - Query Generation
//!
//! Simulated tenant queues that feed batches to a planner. Each queue is a
//! Poisson process of rate `lambda` whose queries follow a
//! [`QueryDistribution`] over datasets and columns.

pub mod distribution;
pub mod generator;

pub use distribution::{ColumnChoice, DatasetChoice, QueryDistribution};
pub use generator::{PoissonQueryGenerator, QuerySource, DEFAULT_EPOCH};
