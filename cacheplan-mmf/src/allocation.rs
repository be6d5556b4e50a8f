//! Allocations and the mixed strategy over them.

use cacheplan_core::{AllocationError, CacheSet, TenantId};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;

/// One candidate cache configuration and its utility to every tenant of the
/// batch.
///
/// The utility vector is fixed at construction; only `cache_prob` changes,
/// written by the solver once per level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    cache_set: CacheSet,
    size: f64,
    utilities: Vec<f64>,
    cache_prob: f64,
    merged: usize,
}

impl Allocation {
    pub fn new(cache_set: CacheSet, size: f64, utilities: Vec<f64>) -> Self {
        Self {
            cache_set,
            size,
            utilities,
            cache_prob: 0.0,
            merged: 1,
        }
    }

    pub fn cache_set(&self) -> &CacheSet {
        &self.cache_set
    }

    /// Total size of the datasets held.
    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn utilities(&self) -> &[f64] {
        &self.utilities
    }

    pub fn utility(&self, tenant: TenantId) -> f64 {
        self.utilities.get(tenant.0).copied().unwrap_or(0.0)
    }

    /// Selection probability in the current mixed strategy.
    pub fn cache_prob(&self) -> f64 {
        self.cache_prob
    }

    /// Number of physically distinct allocations this one stands for.
    pub fn merged(&self) -> usize {
        self.merged
    }

    fn utility_key(&self) -> Vec<u64> {
        // + 0.0 folds -0.0 into 0.0 so both hash alike
        self.utilities.iter().map(|u| (u + 0.0).to_bits()).collect()
    }
}

/// Probability distribution over a deduplicated allocation universe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationDistribution {
    allocations: Vec<Allocation>,
    tenants: usize,
}

impl AllocationDistribution {
    /// Build a distribution, collapsing allocations whose utility vectors are
    /// identical for every tenant into the first one seen.
    pub fn merged(allocations: Vec<Allocation>) -> Result<Self, AllocationError> {
        let Some(first) = allocations.first() else {
            return Err(AllocationError::EmptyUniverse);
        };
        let tenants = first.utilities.len();

        let mut index: HashMap<Vec<u64>, usize> = HashMap::with_capacity(allocations.len());
        let mut merged: Vec<Allocation> = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            debug_assert_eq!(allocation.utilities.len(), tenants);
            match index.get(&allocation.utility_key()) {
                Some(&slot) => {
                    let representative = &mut merged[slot];
                    representative.cache_prob += allocation.cache_prob;
                    representative.merged += allocation.merged;
                }
                None => {
                    index.insert(allocation.utility_key(), merged.len());
                    merged.push(allocation);
                }
            }
        }

        Ok(Self {
            allocations: merged,
            tenants,
        })
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Number of tenants (length of every utility vector).
    pub fn tenants(&self) -> usize {
        self.tenants
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn get(&self, idx: usize) -> Option<&Allocation> {
        self.allocations.get(idx)
    }

    pub fn weights(&self) -> Vec<f64> {
        self.allocations.iter().map(|a| a.cache_prob).collect()
    }

    /// Overwrite allocation weights in order. Extra weights are ignored.
    pub fn set_weights(&mut self, weights: &[f64]) {
        for (allocation, weight) in self.allocations.iter_mut().zip(weights) {
            allocation.cache_prob = *weight;
        }
    }

    pub fn set_uniform(&mut self) {
        let share = 1.0 / self.allocations.len().max(1) as f64;
        self.allocations
            .iter_mut()
            .for_each(|a| a.cache_prob = share);
    }

    pub fn weight_sum(&self) -> f64 {
        self.allocations.iter().map(|a| a.cache_prob).sum()
    }

    /// Best utility each tenant gets from any single allocation.
    pub fn u_stars(&self) -> Vec<f64> {
        crate::utility::u_stars(&self.allocations, self.tenants)
    }

    /// Utility a tenant obtains in expectation under the current weights.
    pub fn expected_utility(&self, tenant: TenantId) -> f64 {
        self.allocations
            .iter()
            .map(|a| a.cache_prob * a.utility(tenant))
            .sum()
    }

    pub fn expected_utilities(&self) -> Vec<f64> {
        (0..self.tenants)
            .map(|t| self.expected_utility(TenantId(t)))
            .collect()
    }

    /// Whether weights are non-negative and sum to one within `epsilon`.
    pub fn is_valid(&self, epsilon: f64) -> bool {
        self.allocations.iter().all(|a| a.cache_prob >= -epsilon)
            && (self.weight_sum() - 1.0).abs() <= epsilon
    }

    /// Clamp round-off negatives to zero and rescale weights to sum to one.
    ///
    /// Fails when the weights are too far from a distribution to be a
    /// round-off artifact.
    pub fn normalize(&mut self, epsilon: f64) -> Result<(), AllocationError> {
        let tolerance = epsilon * 1e3;
        if self.allocations.iter().any(|a| a.cache_prob < -tolerance) {
            return Err(AllocationError::InvalidDistribution {
                sum: self.weight_sum(),
            });
        }
        for allocation in &mut self.allocations {
            allocation.cache_prob = allocation.cache_prob.max(0.0);
        }
        let sum = self.weight_sum();
        if !sum.is_finite() || (sum - 1.0).abs() > tolerance {
            return Err(AllocationError::InvalidDistribution { sum });
        }
        self.allocations
            .iter_mut()
            .for_each(|a| a.cache_prob /= sum);
        Ok(())
    }

    /// Index of an allocation drawn with probability proportional to its
    /// weight, or `None` when no allocation carries positive weight.
    pub fn random_index<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let weights = self.allocations.iter().map(|a| a.cache_prob.max(0.0));
        let dist = WeightedIndex::new(weights).ok()?;
        Some(dist.sample(rng))
    }

    /// Draw one allocation with probability proportional to its weight.
    pub fn random_allocation<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Allocation> {
        self.random_index(rng).and_then(|idx| self.allocations.get(idx))
    }
}
