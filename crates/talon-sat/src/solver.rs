//! The SAT solver contract and back-end dispatch

use crate::cdcl::CdclSolver;
use crate::clause::SatClause;
use crate::literal::SatLiteral;
use thiserror::Error;

/// Solver status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A satisfying assignment was found
    Satisfiable,
    /// The clause set (under current assumptions) is unsatisfiable
    Unsatisfiable,
    /// Nothing is known yet
    Unknown,
}

/// Truth value of a variable in a satisfying assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Assigned true
    True,
    /// Assigned false
    False,
    /// Either value satisfies
    DontCare,
}

/// The capability set shared by every SAT back-end
///
/// Contract: after [`SatSolver::retract_all_assumptions`] the solver is in
/// the state it would be in had no assumption ever been made; permanent
/// clauses are preserved. [`SatSolver::assignment`] is only meaningful when
/// the last status is [`Status::Satisfiable`].
pub trait SatSolver {
    /// Widen the variable universe to at least `n` variables
    fn ensure_var_count(&mut self, n: u32);

    /// Ingest clauses; with `only_propagate` no decisions are taken, only
    /// unit propagation runs
    fn add_clauses(&mut self, clauses: Vec<SatClause>, only_propagate: bool);

    /// Run the search to completion
    fn solve(&mut self) -> Status;

    /// The last known status
    fn status(&self) -> Status;

    /// Truth value of a variable after a satisfiable answer
    fn assignment(&self, var: u32) -> Assignment;

    /// Add an assumption literal
    fn add_assumption(&mut self, lit: SatLiteral, only_propagate: bool);

    /// Drop all assumptions, restoring the assumption-free state
    fn retract_all_assumptions(&mut self);

    /// Check whether any assumptions are active
    fn has_assumptions(&self) -> bool;

    /// Convenience: is `lit` true under the current satisfying assignment
    /// (don't-care counts as true for positive literals)
    fn true_in_assignment(&self, lit: SatLiteral) -> bool {
        match self.assignment(lit.var()) {
            Assignment::True => lit.is_positive(),
            Assignment::False => !lit.is_positive(),
            Assignment::DontCare => lit.is_positive(),
        }
    }
}

impl<S: SatSolver + ?Sized> SatSolver for Box<S> {
    fn ensure_var_count(&mut self, n: u32) {
        (**self).ensure_var_count(n)
    }
    fn add_clauses(&mut self, clauses: Vec<SatClause>, only_propagate: bool) {
        (**self).add_clauses(clauses, only_propagate)
    }
    fn solve(&mut self) -> Status {
        (**self).solve()
    }
    fn status(&self) -> Status {
        (**self).status()
    }
    fn assignment(&self, var: u32) -> Assignment {
        (**self).assignment(var)
    }
    fn add_assumption(&mut self, lit: SatLiteral, only_propagate: bool) {
        (**self).add_assumption(lit, only_propagate)
    }
    fn retract_all_assumptions(&mut self) {
        (**self).retract_all_assumptions()
    }
    fn has_assumptions(&self) -> bool {
        (**self).has_assumptions()
    }
}

/// Which SAT back-end to instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverChoice {
    /// The built-in CDCL engine
    #[default]
    InternalCdcl,
    /// An external lingeling library (not compiled into this build)
    ExternalLingeling,
    /// An external minisat library (not compiled into this build)
    ExternalMinisat,
}

/// Errors from the SAT layer
#[derive(Debug, Clone, Error)]
pub enum SatError {
    /// The requested back-end is not available in this build
    #[error("sat back-end {0:?} is not compiled into this build")]
    UnsupportedSolver(SolverChoice),
}

/// Instantiate a fresh solver for the given back-end choice
pub fn build_solver(choice: SolverChoice) -> Result<Box<dyn SatSolver>, SatError> {
    match choice {
        SolverChoice::InternalCdcl => Ok(Box::new(CdclSolver::new())),
        SolverChoice::ExternalLingeling | SolverChoice::ExternalMinisat => {
            Err(SatError::UnsupportedSolver(choice))
        }
    }
}
