//! cacheplan LP - Linear Programming Capability
//!
//! The fair planner only needs "maximize one variable subject to linear
//! constraints". This crate defines that contract ([`LpSolver`]), the model
//! handed to it ([`LinearProgram`]), and a default in-process backend
//! ([`DenseSimplex`]). Other backends plug in by implementing [`LpSolver`].

mod model;
mod simplex;
mod solver;

pub use model::{Constraint, LinearProgram, LpError, LpSolution, Relation, VarId};
pub use simplex::{DenseSimplex, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
pub use solver::LpSolver;
