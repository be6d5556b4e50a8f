//! Statistical and property tests for the Poisson query generator.

use cacheplan_core::Dataset;
use cacheplan_test_utils::seeded_rng;
use cacheplan_workload::{PoissonQueryGenerator, QueryDistribution, QuerySource};
use proptest::prelude::*;
use std::time::Duration;

fn datasets() -> Vec<Dataset> {
    vec![
        Dataset::new("orders", 40.0)
            .with_column("o_id", 10.0)
            .with_column("o_total", 30.0),
        Dataset::new("parts", 10.0).with_column("p_name", 10.0),
    ]
}

#[test]
fn test_poisson_delay_mean_is_inverse_rate() {
    let generator = PoissonQueryGenerator::new(
        4.0,
        0,
        "q0",
        datasets(),
        QueryDistribution::uniform(&datasets()),
    )
    .expect("valid generator");
    let mut rng = seeded_rng(2024);

    let samples = 20_000;
    let total: f64 = (0..samples)
        .map(|_| generator.poisson_delay(&mut rng).as_secs_f64())
        .sum();
    let mean = total / samples as f64;
    assert!((mean - 0.25).abs() < 0.01, "mean delay {}", mean);
}

#[test]
fn test_batch_size_tracks_rate() {
    let generator = PoissonQueryGenerator::new(
        50.0,
        1,
        "q1",
        datasets(),
        QueryDistribution::uniform(&datasets()),
    )
    .expect("valid generator");
    let mut rng = seeded_rng(7);

    let epochs = 200;
    let total: usize = (0..epochs)
        .map(|_| generator.collect_batch(Duration::from_secs(1), &mut rng).len())
        .sum();
    let per_epoch = total as f64 / epochs as f64;
    assert!((per_epoch - 50.0).abs() < 3.0, "{} queries per epoch", per_epoch);
}

#[test]
fn test_dataset_weights_shape_the_mix() {
    let dist = QueryDistribution::new()
        .with_dataset("orders", 3.0)
        .with_dataset("parts", 1.0);
    let generator =
        PoissonQueryGenerator::new(1.0, 0, "q", datasets(), dist).expect("valid generator");
    let mut rng = seeded_rng(99);

    let draws = 4000;
    let orders = (0..draws)
        .filter(|_| generator.generate_query(&mut rng).dataset == "orders")
        .count();
    let share = orders as f64 / draws as f64;
    assert!((share - 0.75).abs() < 0.03, "orders share {}", share);
}

#[test]
fn test_several_queues_feed_one_batch() {
    let sources: Vec<PoissonQueryGenerator> = (0..3)
        .map(|id| {
            PoissonQueryGenerator::new(
                20.0,
                id,
                format!("queue{}", id),
                datasets(),
                QueryDistribution::uniform(&datasets()),
            )
            .expect("valid generator")
            .with_epoch(Duration::from_millis(500))
        })
        .collect();
    let mut rng = seeded_rng(3);

    let batch = sources.next_batch(&mut rng);
    assert!(!batch.is_empty());
    let mut tenants: Vec<&str> = batch.iter().map(|q| q.tenant.as_str()).collect();
    // concatenated in source order
    let sorted = {
        let mut s = tenants.clone();
        s.sort();
        s
    };
    assert_eq!(tenants, sorted);
    tenants.dedup();
    assert!(tenants.len() <= 3);
}

#[test]
fn test_distribution_deserializes() {
    let dist: QueryDistribution = serde_json::from_str(
        r#"{"datasets": [{"dataset": "orders", "weight": 2.0,
             "columns": [{"column": "o_id", "probability": 0.3}]}]}"#,
    )
    .expect("parse distribution");
    assert_eq!(dist.datasets[0].columns[0].probability, 0.3);
    assert!(dist.validate(&datasets()).is_ok());
}

proptest! {
    /// Property: every generated query names a distribution dataset and only
    /// columns listed for it, at least one when any are listed.
    #[test]
    fn prop_generated_queries_are_well_formed(
        seed in any::<u64>(),
        p_id in 0.0f64..=1.0,
        p_total in 0.0f64..=1.0,
    ) {
        let dist = QueryDistribution::new()
            .with_dataset("orders", 1.0)
            .with_column("o_id", p_id)
            .with_column("o_total", p_total)
            .with_dataset("parts", 1.0);
        let generator = PoissonQueryGenerator::new(2.0, 0, "q", datasets(), dist)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut rng = seeded_rng(seed);

        for _ in 0..20 {
            let query = generator.generate_query(&mut rng);
            prop_assert!(query.validate().is_ok());
            match query.dataset.as_str() {
                "orders" => {
                    prop_assert!(!query.columns.is_empty());
                    prop_assert!(query.columns.iter().all(|c| c == "o_id" || c == "o_total"));
                }
                "parts" => prop_assert!(query.columns.is_empty()),
                other => prop_assert!(false, "unexpected dataset {}", other),
            }
        }
    }
}
