//! Poisson arrival of queries from one tenant queue.

use crate::QueryDistribution;
use cacheplan_core::{Column, Dataset, Query, WorkloadError};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::{Rng, RngCore};
use std::time::Duration;
use tracing::{debug, warn};

/// Default simulated epoch for [`QuerySource::next_batch`].
pub const DEFAULT_EPOCH: Duration = Duration::from_secs(1);

/// Supplies the queries of one batch at a time.
pub trait QuerySource {
    fn next_batch(&self, rng: &mut dyn RngCore) -> Vec<Query>;
}

impl<S: QuerySource> QuerySource for Vec<S> {
    fn next_batch(&self, rng: &mut dyn RngCore) -> Vec<Query> {
        self.iter().flat_map(|source| source.next_batch(&mut *rng)).collect()
    }
}

/// Generates queries with exponential inter-arrival times (a Poisson
/// process of rate `lambda` queries per second).
#[derive(Debug, Clone)]
pub struct PoissonQueryGenerator {
    lambda: f64,
    queue_id: usize,
    name: String,
    datasets: Vec<Dataset>,
    distribution: QueryDistribution,
    picker: WeightedIndex<f64>,
    epoch: Duration,
}

impl PoissonQueryGenerator {
    pub fn new(
        lambda: f64,
        queue_id: usize,
        name: impl Into<String>,
        datasets: Vec<Dataset>,
        distribution: QueryDistribution,
    ) -> Result<Self, WorkloadError> {
        if !lambda.is_finite() || lambda <= 0.0 {
            return Err(WorkloadError::InvalidRate { lambda });
        }
        distribution.validate(&datasets)?;
        let picker = WeightedIndex::new(distribution.datasets.iter().map(|d| d.weight))
            .map_err(|_| WorkloadError::EmptyDistribution)?;

        Ok(Self {
            lambda,
            queue_id,
            name: name.into(),
            datasets,
            distribution,
            picker,
            epoch: DEFAULT_EPOCH,
        })
    }

    /// Epoch simulated by each [`QuerySource::next_batch`] call.
    pub fn with_epoch(mut self, epoch: Duration) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn queue_id(&self) -> usize {
        self.queue_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn distribution(&self) -> &QueryDistribution {
        &self.distribution
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn column<'d>(&self, dataset: &'d Dataset, name: &str) -> Option<&'d Column> {
        dataset.column(name)
    }

    /// Time until the next arrival: exponential with mean `1 / lambda`.
    ///
    /// Saturates at [`Duration::MAX`] when the draw does not fit a
    /// `Duration`.
    pub fn poisson_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        // shift [0, 1) to (0, 1] so ln never sees zero
        let u = 1.0 - rng.random::<f64>();
        Duration::try_from_secs_f64(-u.ln() / self.lambda).unwrap_or(Duration::MAX)
    }

    /// Draw one query: a dataset by weight, then each listed column
    /// independently by its probability. At least one listed column is
    /// always touched.
    pub fn generate_query<R: Rng + ?Sized>(&self, rng: &mut R) -> Query {
        let choice = &self.distribution.datasets[self.picker.sample(rng)];
        let mut columns: Vec<String> = choice
            .columns
            .iter()
            .filter(|c| rng.random_bool(c.probability))
            .map(|c| c.column.clone())
            .collect();
        if columns.is_empty() && !choice.columns.is_empty() {
            let idx = rng.random_range(0..choice.columns.len());
            columns.push(choice.columns[idx].column.clone());
        }
        Query::new(self.name.clone(), choice.dataset.clone()).with_columns(columns)
    }

    /// Queries arriving during one epoch starting now.
    ///
    /// Collection stops early at the first delay below clock resolution, so
    /// a rate too high to simulate yields no more arrivals instead of an
    /// unbounded batch.
    pub fn collect_batch<R: Rng + ?Sized>(&self, epoch: Duration, rng: &mut R) -> Vec<Query> {
        let mut queries = Vec::new();
        let mut elapsed = Duration::ZERO;
        loop {
            let delay = self.poisson_delay(rng);
            if delay.is_zero() {
                warn!(
                    queue_id = self.queue_id,
                    lambda = self.lambda,
                    arrivals = queries.len(),
                    "arrival delay below clock resolution, closing batch"
                );
                break;
            }
            elapsed = elapsed.saturating_add(delay);
            if elapsed > epoch {
                break;
            }
            queries.push(self.generate_query(rng));
        }
        debug!(
            queue_id = self.queue_id,
            generator = %self.name,
            arrivals = queries.len(),
            epoch_ms = epoch.as_millis() as u64,
            "batch collected"
        );
        queries
    }
}

impl QuerySource for PoissonQueryGenerator {
    fn next_batch(&self, rng: &mut dyn RngCore) -> Vec<Query> {
        self.collect_batch(self.epoch, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn datasets() -> Vec<Dataset> {
        vec![
            Dataset::new("orders", 40.0)
                .with_column("o_id", 10.0)
                .with_column("o_total", 30.0),
            Dataset::new("parts", 10.0),
        ]
    }

    fn generator(lambda: f64) -> PoissonQueryGenerator {
        let dist = QueryDistribution::new()
            .with_dataset("orders", 1.0)
            .with_column("o_id", 0.0)
            .with_column("o_total", 0.0)
            .with_dataset("parts", 0.0);
        PoissonQueryGenerator::new(lambda, 3, "analyst", datasets(), dist).expect("valid generator")
    }

    #[test]
    fn test_rejects_bad_rate() {
        for lambda in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = PoissonQueryGenerator::new(lambda, 0, "g", datasets(), QueryDistribution::uniform(&datasets()))
                .unwrap_err();
            assert!(matches!(err, WorkloadError::InvalidRate { .. }));
        }
    }

    #[test]
    fn test_generate_query_follows_weights_and_forces_a_column() {
        let generator = generator(1.0);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let query = generator.generate_query(&mut rng);
            assert_eq!(query.tenant, "analyst");
            assert_eq!(query.dataset, "orders");
            // both probabilities are zero, so exactly one column is forced
            assert_eq!(query.columns.len(), 1);
        }
    }

    #[test]
    fn test_lookups() {
        let generator = generator(1.0);
        let orders = generator.dataset("orders").expect("orders");
        assert_eq!(generator.column(orders, "o_total").map(|c| c.size), Some(30.0));
        assert!(generator.column(orders, "missing").is_none());
        assert!(generator.dataset("ghost").is_none());
        assert_eq!(generator.queue_id(), 3);
        assert_eq!(generator.name(), "analyst");
    }

    #[test]
    fn test_tiny_rate_saturates_delay() {
        let generator = generator(1e-300);
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(generator.poisson_delay(&mut rng), Duration::MAX);
        assert!(generator.collect_batch(DEFAULT_EPOCH, &mut rng).is_empty());
    }

    #[test]
    fn test_rate_beyond_clock_resolution_terminates() {
        let generator = generator(1e12);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(generator.poisson_delay(&mut rng), Duration::ZERO);
        assert!(generator.collect_batch(DEFAULT_EPOCH, &mut rng).is_empty());
        assert!(generator.next_batch(&mut rng).is_empty());
    }

    #[test]
    fn test_empty_epoch_collects_nothing() {
        let generator = generator(5.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generator.collect_batch(Duration::ZERO, &mut rng).is_empty());
    }
}
