//! Progressive filling over allocation weights.
//!
//! Each level maximizes the common fairness ratio `M` of every tenant not yet
//! saturated, subject to the floors locked at earlier levels. Every remaining
//! tenant is then probed: if it cannot beat `M` while everyone else keeps `M`,
//! it saturates at this level and its floor is locked for the rest of the
//! solve.
//!
//! Utility rows are divided by the tenant's `u_star`, so ratios and locked
//! floors all live in `[0, 1]`.

use crate::AllocationDistribution;
use cacheplan_core::{AllocationError, PlannerResult, TenantId};
use cacheplan_lp::{Constraint, LinearProgram, LpError, LpSolver, Relation, VarId};
use serde::Serialize;
use tracing::{debug, trace};

/// Relaxation of locked floors, as a fraction of epsilon.
const FLOOR_SLACK: f64 = 1e-3;

/// Outcome of one fairness level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelRecord {
    pub level: usize,
    /// Fairness ratio reached by every tenant saturated at this level
    pub max_value: f64,
    pub saturated: Vec<TenantId>,
    /// Weights produced by this level's LP; `None` when no LP was solved
    pub weights: Option<Vec<f64>>,
}

/// Audit trail of a progressive solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairnessReport {
    pub u_star: Vec<f64>,
    pub levels: Vec<LevelRecord>,
    pub final_weights: Vec<f64>,
    pub lp_solves: usize,
}

impl FairnessReport {
    /// `max_value` of every level, in level order.
    pub fn max_values(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.max_value).collect()
    }

    /// Level at which a tenant saturated.
    pub fn saturation_level(&self, tenant: TenantId) -> Option<usize> {
        self.levels
            .iter()
            .find(|l| l.saturated.contains(&tenant))
            .map(|l| l.level)
    }

    /// Expected utility the tenant is guaranteed: its level's ratio times its
    /// `u_star`.
    pub fn locked_floor(&self, tenant: TenantId) -> Option<f64> {
        let level = self.saturation_level(tenant)?;
        let u_star = self.u_star.get(tenant.0)?;
        Some(self.levels[level].max_value * u_star)
    }

    pub fn final_weights(&self) -> &[f64] {
        &self.final_weights
    }
}

/// Level bookkeeping, indexed by level and by tenant.
struct Levels {
    max_values: Vec<f64>,
    saturated: Vec<Vec<TenantId>>,
    level_of: Vec<Option<usize>>,
}

impl Levels {
    fn new(tenants: usize) -> Self {
        Self {
            max_values: Vec::new(),
            saturated: Vec::new(),
            level_of: vec![None; tenants],
        }
    }

    fn current(&self) -> usize {
        self.max_values.len()
    }

    fn lock(&mut self, max_value: f64, tenants: Vec<TenantId>) {
        let level = self.current();
        for tenant in &tenants {
            self.level_of[tenant.0] = Some(level);
        }
        self.max_values.push(max_value);
        self.saturated.push(tenants);
    }

    fn unsaturated(&self) -> Vec<usize> {
        (0..self.level_of.len())
            .filter(|&i| self.level_of[i].is_none())
            .collect()
    }

    /// Ratio floor a saturated tenant must keep.
    fn floor(&self, tenant: usize) -> Option<f64> {
        self.level_of[tenant].map(|level| self.max_values[level])
    }
}

/// Computes a max-min-fair mixed strategy over a distribution's allocations.
pub struct ProgressiveSolver<'a, S: LpSolver + ?Sized> {
    solver: &'a S,
    epsilon: f64,
}

impl<'a, S: LpSolver + ?Sized> ProgressiveSolver<'a, S> {
    pub fn new(solver: &'a S, epsilon: f64) -> Self {
        Self { solver, epsilon }
    }

    /// Run progressive filling and leave the final weights on `distribution`.
    ///
    /// On error the distribution's weights are unspecified and must not be
    /// used.
    pub fn solve(&self, distribution: &mut AllocationDistribution) -> PlannerResult<FairnessReport> {
        let tenants = distribution.tenants();
        let u_star = distribution.u_stars();
        let ratios: Vec<Vec<f64>> = (0..tenants)
            .map(|i| {
                if u_star[i] > 0.0 {
                    distribution
                        .allocations()
                        .iter()
                        .map(|a| a.utility(TenantId(i)) / u_star[i])
                        .collect()
                } else {
                    Vec::new()
                }
            })
            .collect();

        let mut levels = Levels::new(tenants);
        let mut records = Vec::new();
        let mut lp_solves = 0;

        let degenerate: Vec<TenantId> = (0..tenants)
            .filter(|&i| u_star[i] <= 0.0)
            .map(TenantId)
            .collect();
        if !degenerate.is_empty() || tenants == 0 {
            debug!(tenants = degenerate.len(), "degenerate tenants saturated at zero");
            records.push(LevelRecord {
                level: 0,
                max_value: 0.0,
                saturated: degenerate.clone(),
                weights: None,
            });
            levels.lock(0.0, degenerate);
        }

        let mut solved_any = false;
        loop {
            let unsaturated = levels.unsaturated();
            if unsaturated.is_empty() {
                break;
            }
            let level = levels.current();

            let (lp, weights_vars, m) = self.level_program(&ratios, &levels, &unsaturated, level);
            let solution = self.run(&lp, level, None)?;
            lp_solves += 1;
            let max_value = solution.value(m);
            let weights: Vec<f64> = weights_vars.iter().map(|x| solution.value(*x)).collect();
            distribution.set_weights(&weights);
            solved_any = true;

            let mut probes = Vec::with_capacity(unsaturated.len());
            for &tenant in &unsaturated {
                let lp = self.probe_program(&ratios, &levels, &unsaturated, tenant, max_value);
                let solution = self.run(&lp, level, Some(TenantId(tenant)))?;
                lp_solves += 1;
                probes.push((tenant, solution.objective()));
            }

            let mut saturated: Vec<TenantId> = probes
                .iter()
                .filter(|(_, improved)| improved - max_value <= self.epsilon)
                .map(|(tenant, _)| TenantId(*tenant))
                .collect();
            if saturated.is_empty() {
                let lowest = probes
                    .iter()
                    .map(|(_, improved)| *improved)
                    .fold(f64::INFINITY, f64::min);
                saturated = probes
                    .iter()
                    .filter(|(_, improved)| improved - lowest <= self.epsilon)
                    .map(|(tenant, _)| TenantId(*tenant))
                    .collect();
                debug!(level, lowest, "no probe saturated, locking the lowest");
            }

            debug!(
                level,
                max_value,
                saturated = saturated.len(),
                remaining = unsaturated.len() - saturated.len(),
                "fairness level solved"
            );
            records.push(LevelRecord {
                level,
                max_value,
                saturated: saturated.clone(),
                weights: Some(weights),
            });
            levels.lock(max_value, saturated);
        }

        if solved_any {
            distribution.normalize(self.epsilon)?;
        } else {
            distribution.set_uniform();
        }

        Ok(FairnessReport {
            u_star,
            levels: records,
            final_weights: distribution.weights(),
            lp_solves,
        })
    }

    fn run(
        &self,
        lp: &LinearProgram,
        level: usize,
        probe: Option<TenantId>,
    ) -> Result<cacheplan_lp::LpSolution, AllocationError> {
        trace!(
            level,
            probe = probe.map(|t| t.0),
            variables = lp.num_variables(),
            constraints = lp.constraints().len(),
            "solving LP"
        );
        self.solver.solve(lp).map_err(|err: LpError| {
            AllocationError::InfeasibleAllocation {
                level,
                probe,
                reason: err.to_string(),
            }
        })
    }

    /// Weight variables, the simplex constraint and every locked floor.
    fn base_program(&self, ratios: &[Vec<f64>], levels: &Levels) -> (LinearProgram, Vec<VarId>) {
        let allocations = ratios.iter().map(Vec::len).max().unwrap_or(0);
        let mut lp = LinearProgram::new();
        let xs: Vec<VarId> = (0..allocations).map(|j| lp.variable(format!("x{}", j))).collect();

        let mut norm = Constraint::new("norm", Relation::Eq, 1.0);
        for x in &xs {
            norm.plus(*x, 1.0);
        }
        lp.add_constraint(norm);

        for (tenant, row) in ratios.iter().enumerate() {
            let Some(floor) = levels.floor(tenant) else {
                continue;
            };
            if floor <= 0.0 || row.is_empty() {
                continue;
            }
            lp.add_constraint(self.ratio_floor(format!("locked{}", tenant), row, &xs, floor));
        }
        (lp, xs)
    }

    fn level_program(
        &self,
        ratios: &[Vec<f64>],
        levels: &Levels,
        unsaturated: &[usize],
        level: usize,
    ) -> (LinearProgram, Vec<VarId>, VarId) {
        let (mut lp, xs) = self.base_program(ratios, levels);
        let m = lp.variable(format!("M{}", level));
        lp.maximize(m, 1.0);
        for &tenant in unsaturated {
            let mut row = Constraint::new(format!("unsat{}", tenant), Relation::Ge, 0.0);
            for (x, r) in xs.iter().zip(&ratios[tenant]) {
                if *r != 0.0 {
                    row.plus(*x, *r);
                }
            }
            row.plus(m, -1.0);
            lp.add_constraint(row);
        }
        (lp, xs, m)
    }

    /// Maximize one tenant's ratio while every other unsaturated tenant keeps
    /// `max_value`.
    fn probe_program(
        &self,
        ratios: &[Vec<f64>],
        levels: &Levels,
        unsaturated: &[usize],
        probed: usize,
        max_value: f64,
    ) -> LinearProgram {
        let (mut lp, xs) = self.base_program(ratios, levels);
        for (x, r) in xs.iter().zip(&ratios[probed]) {
            lp.maximize(*x, *r);
        }
        for &tenant in unsaturated {
            if tenant == probed || max_value <= 0.0 {
                continue;
            }
            lp.add_constraint(self.ratio_floor(
                format!("hold{}", tenant),
                &ratios[tenant],
                &xs,
                max_value,
            ));
        }
        lp
    }

    fn ratio_floor(&self, name: String, row: &[f64], xs: &[VarId], floor: f64) -> Constraint {
        let mut constraint =
            Constraint::new(name, Relation::Ge, floor - self.epsilon * FLOOR_SLACK);
        for (x, r) in xs.iter().zip(row) {
            if *r != 0.0 {
                constraint.plus(*x, *r);
            }
        }
        constraint
    }
}
