//! Talon FMB - finite model building
//!
//! A non-incremental finite model builder: starting from domain size one,
//! the candidate size grows until either the SAT encoding of the current
//! size is satisfiable (a finite model, printed in TPTP format), the size
//! reaches a proven upper bound (a refutation), the propositional variable
//! space overflows, or the deadline expires.
//!
//! The encoding assigns every ground function value claim `f(d..) = e` and
//! every ground predicate claim `p(d..)` a propositional variable from a
//! per-symbol block; clause instances, functionality, symmetry-breaking
//! and totality axioms are emitted in a fixed deterministic order and
//! handed to a fresh SAT solver per size.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod model;

pub use builder::{FiniteModelBuilder, FmbConfig, FmbOutcome, UnknownReason};
