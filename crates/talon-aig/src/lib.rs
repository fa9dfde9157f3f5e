//! Talon AIG - shared formula DAGs
//!
//! Formulas as and-inverter graphs: the only interior nodes are binary
//! conjunctions and quantifiers, every edge carries a polarity bit, and
//! hash-consing makes structural equality a pointer comparison. On top of
//! the representation sit:
//! - formula conversion in both directions
//! - rewrite-map utilities (single-step dereference, saturation to a
//!   fixed point, substitution application)
//! - the compressing normaliser
//! - the definition inliner (equivalence-based atom expansion)
//! - the definition introducer (reference-count-driven naming)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aig;
pub mod compress;
pub mod convert;
pub mod inliner;
pub mod introducer;
pub mod transform;

pub use aig::{Aig, AigNode, AigRef, InsideOutTraversal};
pub use compress::AigCompressor;
pub use convert::{aig_to_formula, formula_to_aig};
pub use inliner::AigInliner;
pub use introducer::AigDefinitionIntroducer;
pub use transform::{apply_subst, lev0_deref, saturate_map, RefMap};

use talon_core::FormulaUnit;

/// Outcome of applying a rewriting pass to a formula unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitChange {
    /// The unit is unaffected
    Unchanged,
    /// The unit is replaced by a rewritten one
    Replaced(FormulaUnit),
    /// The unit became a tautology and is deleted
    Deleted,
}
