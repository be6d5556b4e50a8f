//! The LP solving capability consumed by the planner.

use crate::{LinearProgram, LpError, LpSolution};

/// A linear program solver.
///
/// Implementations must be stateless across calls: the planner issues one
/// blocking `solve` at a time and assumes nothing carries over between them.
pub trait LpSolver: Send + Sync {
    /// Maximize the program's objective over non-negative variables.
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError>;
}

impl<S: LpSolver + ?Sized> LpSolver for &S {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError> {
        (**self).solve(lp)
    }
}

impl<S: LpSolver + ?Sized> LpSolver for Box<S> {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError> {
        (**self).solve(lp)
    }
}

impl<S: LpSolver + ?Sized> LpSolver for std::sync::Arc<S> {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError> {
        (**self).solve(lp)
    }
}
