//! Dense two-phase tableau simplex.
//!
//! Phase one minimizes the sum of artificial variables to find a basic
//! feasible point, phase two maximizes the program's objective from there.
//! Entering and leaving variables follow Bland's rule, so the method never
//! cycles on degenerate programs. Intended for the small, dense programs the
//! fair planner builds (one column per distinct allocation).

use crate::{LinearProgram, LpError, LpSolution, LpSolver, Relation};
use tracing::trace;

pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Dense simplex solver. Holds configuration only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseSimplex {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for DenseSimplex {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl DenseSimplex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pivot limit shared by both phases.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Pivot and reduced-cost tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn feasibility_tolerance(&self) -> f64 {
        self.tolerance * 100.0
    }

    fn optimize(
        &self,
        tableau: &mut Tableau,
        cost: &[f64],
        allowed: &[bool],
        iterations: &mut usize,
    ) -> Result<(), LpError> {
        loop {
            let mut is_basic = vec![false; tableau.width];
            for &b in &tableau.basis {
                is_basic[b] = true;
            }

            let entering = (0..tableau.width).find(|&j| {
                allowed[j] && !is_basic[j] && tableau.reduced_cost(cost, j) > self.tolerance
            });
            let Some(col) = entering else {
                return Ok(());
            };

            let mut leaving: Option<(usize, f64)> = None;
            for row in 0..tableau.rows.len() {
                let a = tableau.rows[row][col];
                if a <= self.tolerance {
                    continue;
                }
                let ratio = tableau.rhs(row) / a;
                leaving = match leaving {
                    None => Some((row, ratio)),
                    Some((best_row, best)) => {
                        let tie = (ratio - best).abs() <= self.tolerance;
                        if ratio < best - self.tolerance
                            || (tie && tableau.basis[row] < tableau.basis[best_row])
                        {
                            Some((row, ratio))
                        } else {
                            Some((best_row, best))
                        }
                    }
                };
            }
            let Some((row, _)) = leaving else {
                return Err(LpError::Unbounded);
            };

            if *iterations >= self.max_iterations {
                return Err(LpError::IterationLimit {
                    limit: self.max_iterations,
                });
            }
            *iterations += 1;
            tableau.pivot(row, col, self.tolerance);
        }
    }

    /// Pivot zero-level artificial variables out of the basis after phase one,
    /// dropping rows that turn out to be redundant.
    fn evict_artificials(&self, tableau: &mut Tableau, first_artificial: usize) {
        let mut row = 0;
        while row < tableau.rows.len() {
            if tableau.basis[row] < first_artificial {
                row += 1;
                continue;
            }
            let replacement =
                (0..first_artificial).find(|&j| tableau.rows[row][j].abs() > self.tolerance);
            match replacement {
                Some(col) => {
                    tableau.pivot(row, col, self.tolerance);
                    row += 1;
                }
                None => {
                    tableau.rows.remove(row);
                    tableau.basis.remove(row);
                }
            }
        }
    }
}

impl LpSolver for DenseSimplex {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError> {
        lp.check()?;
        let n = lp.num_variables();

        // Normalize every row to a non-negative right-hand side.
        let mut normalized = Vec::with_capacity(lp.constraints().len());
        let mut rhs_scale: f64 = 1.0;
        for constraint in lp.constraints() {
            let mut coeffs = vec![0.0; n];
            for (var, coef) in &constraint.terms {
                coeffs[var.index()] += coef;
            }
            let (relation, rhs) = if constraint.rhs < 0.0 {
                coeffs.iter_mut().for_each(|v| *v = -*v);
                (constraint.relation.flipped(), -constraint.rhs)
            } else {
                (constraint.relation, constraint.rhs)
            };
            rhs_scale = rhs_scale.max(rhs);
            normalized.push((coeffs, relation, rhs));
        }

        let slack_count = normalized
            .iter()
            .filter(|(_, relation, _)| *relation != Relation::Eq)
            .count();
        let artificial_count = normalized
            .iter()
            .filter(|(_, relation, _)| *relation != Relation::Le)
            .count();
        let first_artificial = n + slack_count;
        let width = first_artificial + artificial_count;

        let mut rows = Vec::with_capacity(normalized.len());
        let mut basis = Vec::with_capacity(normalized.len());
        let mut next_slack = n;
        let mut next_artificial = first_artificial;
        for (coeffs, relation, rhs) in normalized {
            let mut row = vec![0.0; width + 1];
            row[..n].copy_from_slice(&coeffs);
            row[width] = rhs;
            match relation {
                Relation::Le => {
                    row[next_slack] = 1.0;
                    basis.push(next_slack);
                    next_slack += 1;
                }
                Relation::Ge => {
                    row[next_slack] = -1.0;
                    next_slack += 1;
                    row[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
                Relation::Eq => {
                    row[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
            }
            rows.push(row);
        }

        let mut tableau = Tableau { rows, basis, width };
        let mut iterations = 0;

        if artificial_count > 0 {
            let phase_one_cost: Vec<f64> = (0..width)
                .map(|j| if j >= first_artificial { -1.0 } else { 0.0 })
                .collect();
            let allowed = vec![true; width];
            self.optimize(&mut tableau, &phase_one_cost, &allowed, &mut iterations)
                .map_err(|e| match e {
                    LpError::Unbounded => LpError::Numerical {
                        reason: "phase one reported an unbounded ray".to_string(),
                    },
                    other => other,
                })?;
            let residual = -tableau.objective_value(&phase_one_cost);
            if residual > self.feasibility_tolerance() * rhs_scale {
                trace!(residual, iterations, "simplex phase one infeasible");
                return Err(LpError::Infeasible);
            }
            self.evict_artificials(&mut tableau, first_artificial);
        }

        let mut cost = vec![0.0; width];
        for (var, coef) in lp.objective() {
            cost[var.index()] += coef;
        }
        let allowed: Vec<bool> = (0..width).map(|j| j < first_artificial).collect();
        self.optimize(&mut tableau, &cost, &allowed, &mut iterations)?;

        let mut values = vec![0.0; n];
        for (row, &b) in tableau.basis.iter().enumerate() {
            if b < n {
                values[b] = tableau.rhs(row).max(0.0);
            }
        }
        let objective = lp
            .objective()
            .iter()
            .map(|(var, coef)| coef * values[var.index()])
            .sum();

        trace!(
            variables = n,
            constraints = lp.constraints().len(),
            iterations,
            objective,
            "simplex solved"
        );
        Ok(LpSolution::new(objective, values, lp.names().to_vec()))
    }
}

struct Tableau {
    /// Each row holds `width` coefficients followed by the right-hand side.
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    width: usize,
}

impl Tableau {
    fn rhs(&self, row: usize) -> f64 {
        self.rows[row][self.width]
    }

    fn objective_value(&self, cost: &[f64]) -> f64 {
        self.basis
            .iter()
            .enumerate()
            .map(|(row, &b)| cost[b] * self.rhs(row))
            .sum()
    }

    fn reduced_cost(&self, cost: &[f64], col: usize) -> f64 {
        let basic: f64 = self
            .basis
            .iter()
            .enumerate()
            .map(|(row, &b)| cost[b] * self.rows[row][col])
            .sum();
        cost[col] - basic
    }

    fn pivot(&mut self, row: usize, col: usize, tolerance: f64) {
        let pivot = self.rows[row][col];
        self.rows[row].iter_mut().for_each(|v| *v /= pivot);
        let pivot_row = self.rows[row].clone();

        for (r, current) in self.rows.iter_mut().enumerate() {
            if r == row {
                continue;
            }
            let factor = current[col];
            if factor == 0.0 {
                continue;
            }
            for (v, p) in current.iter_mut().zip(&pivot_row) {
                *v -= factor * p;
            }
            current[col] = 0.0;
            // round-off can push a degenerate rhs just below zero
            let rhs = &mut current[self.width];
            if *rhs < 0.0 && *rhs > -tolerance {
                *rhs = 0.0;
            }
        }
        self.basis[row] = col;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Constraint;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-7
    }

    #[test]
    fn test_textbook_maximum() {
        // max 3x + 2y  s.t.  x + y <= 4,  x + 3y <= 6,  x <= 3
        let mut lp = LinearProgram::new();
        let x = lp.variable("x");
        let y = lp.variable("y");
        lp.maximize(x, 3.0).maximize(y, 2.0);
        lp.add_constraint(Constraint::new("c1", Relation::Le, 4.0).with_term(x, 1.0).with_term(y, 1.0));
        lp.add_constraint(Constraint::new("c2", Relation::Le, 6.0).with_term(x, 1.0).with_term(y, 3.0));
        lp.add_constraint(Constraint::new("c3", Relation::Le, 3.0).with_term(x, 1.0));

        let solution = DenseSimplex::new().solve(&lp).expect("solvable");
        assert!(approx(solution.objective(), 11.0));
        assert!(approx(solution.value(x), 3.0));
        assert!(approx(solution.value(y), 1.0));
    }

    #[test]
    fn test_iteration_limit_is_reported() {
        let mut lp = LinearProgram::new();
        let x = lp.variable("x");
        let y = lp.variable("y");
        lp.maximize(x, 1.0).maximize(y, 1.0);
        lp.add_constraint(Constraint::new("c1", Relation::Le, 1.0).with_term(x, 1.0));
        lp.add_constraint(Constraint::new("c2", Relation::Le, 1.0).with_term(y, 1.0));

        let err = DenseSimplex::new()
            .with_max_iterations(1)
            .solve(&lp)
            .unwrap_err();
        assert_eq!(err, LpError::IterationLimit { limit: 1 });
    }

    #[test]
    fn test_redundant_equality_rows_are_dropped() {
        // x + y = 1 stated twice; max x
        let mut lp = LinearProgram::new();
        let x = lp.variable("x");
        let y = lp.variable("y");
        lp.maximize(x, 1.0);
        for name in ["e1", "e2"] {
            lp.add_constraint(Constraint::new(name, Relation::Eq, 1.0).with_term(x, 1.0).with_term(y, 1.0));
        }

        let solution = DenseSimplex::new().solve(&lp).expect("solvable");
        assert!(approx(solution.value(x), 1.0));
        assert!(approx(solution.value(y), 0.0));
    }
}
