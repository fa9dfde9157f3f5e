//! Talon core - first-order data model
//!
//! The shared vocabulary of the talon workspace:
//! - terms, literals and clauses with variable-only argument positions
//! - the symbol signature (functions, predicates, fresh-symbol minting)
//! - clause flattening and variable normalisation
//! - sort-bound inference (per-argument domain-size bounds)
//! - one-sided matching and unification over literals
//! - quantified formulas and formula units
//!
//! Everything here is constructed once by the front end and treated as
//! read-only by the solving layers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clause;
pub mod flatten;
pub mod formula;
pub mod signature;
pub mod sorts;
pub mod subst;
pub mod term;

pub use clause::Clause;
pub use flatten::{flatten, normalize_variables, Flattened};
pub use formula::{Formula, FormulaUnit, Inference};
pub use signature::Signature;
pub use sorts::{SortedSignature, UNBOUNDED};
pub use subst::{match_literals, unify_literals, Substitution};
pub use term::{FnSym, Literal, PredSym, Term, Var};
