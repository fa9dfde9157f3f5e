//! Talon - finite model building core of a TPTP reasoning engine
//!
//! This is the umbrella crate that re-exports all components.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use talon_aig as aig;
pub use talon_core as core;
pub use talon_fmb as fmb;
pub use talon_sat as sat;
