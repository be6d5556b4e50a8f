//! Linear program model: named non-negative variables, a linear objective to
//! maximize, and named linear constraints.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Handle to a variable of one [`LinearProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Constraint relation between the linear expression and its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// expression <= rhs
    Le,
    /// expression >= rhs
    Ge,
    /// expression == rhs
    Eq,
}

impl Relation {
    /// Relation obtained when both sides are multiplied by -1.
    pub fn flipped(self) -> Self {
        match self {
            Relation::Le => Relation::Ge,
            Relation::Ge => Relation::Le,
            Relation::Eq => Relation::Eq,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
            Relation::Eq => write!(f, "="),
        }
    }
}

/// A named linear constraint `Σ coef·var  (<=|>=|=)  rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(name: impl Into<String>, relation: Relation, rhs: f64) -> Self {
        Self {
            name: name.into(),
            terms: Vec::new(),
            relation,
            rhs,
        }
    }

    /// Add `coef·var` to the left-hand side.
    pub fn plus(&mut self, var: VarId, coef: f64) -> &mut Self {
        self.terms.push((var, coef));
        self
    }

    pub fn with_term(mut self, var: VarId, coef: f64) -> Self {
        self.plus(var, coef);
        self
    }

    /// Value of the left-hand side at a point.
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values.get(var.0).copied().unwrap_or(0.0))
            .sum()
    }

    /// Whether a point satisfies this constraint within `tolerance`.
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(values);
        match self.relation {
            Relation::Le => lhs <= self.rhs + tolerance,
            Relation::Ge => lhs >= self.rhs - tolerance,
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// A maximization problem over non-negative real variables.
#[derive(Debug, Clone, Default)]
pub struct LinearProgram {
    names: Vec<String>,
    index: HashMap<String, VarId>,
    objective: Vec<(VarId, f64)>,
    constraints: Vec<Constraint>,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the variable with this name.
    pub fn variable(&mut self, name: impl Into<String>) -> VarId {
        let name = name.into();
        if let Some(id) = self.index.get(&name) {
            return *id;
        }
        let id = VarId(self.names.len());
        self.index.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    /// Look up an existing variable.
    pub fn var(&self, name: &str) -> Option<VarId> {
        self.index.get(name).copied()
    }

    pub fn var_name(&self, var: VarId) -> &str {
        &self.names[var.0]
    }

    /// Add `coef·var` to the objective (maximized).
    pub fn maximize(&mut self, var: VarId, coef: f64) -> &mut Self {
        self.objective.push((var, coef));
        self
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    pub fn num_variables(&self) -> usize {
        self.names.len()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &[(VarId, f64)] {
        &self.objective
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Check that the program is well formed before handing it to a solver.
    pub fn check(&self) -> Result<(), LpError> {
        if self.objective.is_empty() {
            return Err(LpError::MissingObjective);
        }
        let known = |var: &VarId| var.0 < self.names.len();
        for (var, coef) in &self.objective {
            if !known(var) {
                return Err(LpError::UnknownVariable {
                    name: format!("#{}", var.0),
                });
            }
            if !coef.is_finite() {
                return Err(LpError::Numerical {
                    reason: format!("objective coefficient of {} is {}", self.names[var.0], coef),
                });
            }
        }
        for constraint in &self.constraints {
            if !constraint.rhs.is_finite() {
                return Err(LpError::Numerical {
                    reason: format!("rhs of {} is {}", constraint.name, constraint.rhs),
                });
            }
            for (var, coef) in &constraint.terms {
                if !known(var) {
                    return Err(LpError::UnknownVariable {
                        name: format!("#{}", var.0),
                    });
                }
                if !coef.is_finite() {
                    return Err(LpError::Numerical {
                        reason: format!(
                            "coefficient of {} in {} is {}",
                            self.names[var.0], constraint.name, coef
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Optimal point of a linear program.
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    objective: f64,
    values: Vec<f64>,
    names: Vec<String>,
}

impl LpSolution {
    pub fn new(objective: f64, values: Vec<f64>, names: Vec<String>) -> Self {
        Self {
            objective,
            values,
            names,
        }
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.0).copied().unwrap_or(0.0)
    }

    /// Value of a variable by name.
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|idx| self.values.get(idx).copied())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Errors reported by an LP solver.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LpError {
    #[error("Linear program is infeasible")]
    Infeasible,

    #[error("Linear program is unbounded")]
    Unbounded,

    #[error("Iteration limit {limit} reached")]
    IterationLimit { limit: usize },

    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("Linear program has no objective")]
    MissingObjective,

    #[error("Numerical failure: {reason}")]
    Numerical { reason: String },
}
