//! Quantified formulas and formula units

use crate::term::{Literal, Var};
use std::fmt;

/// A first-order formula
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    /// The true constant
    True,
    /// The false constant
    False,
    /// An atomic formula (a literal, possibly negative)
    Literal(Literal),
    /// Conjunction
    And(Vec<Formula>),
    /// Disjunction
    Or(Vec<Formula>),
    /// Negation
    Not(Box<Formula>),
    /// Equivalence
    Iff(Box<Formula>, Box<Formula>),
    /// Universal quantification
    Forall(Vec<Var>, Box<Formula>),
    /// Existential quantification
    Exists(Vec<Var>, Box<Formula>),
}

impl Formula {
    /// Wrap in a universal quantifier, unless the variable list is empty
    pub fn forall(vars: Vec<Var>, body: Formula) -> Formula {
        if vars.is_empty() {
            body
        } else {
            Formula::Forall(vars, Box::new(body))
        }
    }

    /// The free variables of the formula, sorted ascending
    pub fn free_vars(&self) -> Vec<Var> {
        let mut out = Vec::new();
        self.collect_free(&mut Vec::new(), &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_free(&self, bound: &mut Vec<Var>, out: &mut Vec<Var>) {
        match self {
            Formula::True | Formula::False => {}
            Formula::Literal(lit) => {
                let mut vars = Vec::new();
                lit.collect_vars(&mut vars);
                out.extend(vars.into_iter().filter(|v| !bound.contains(v)));
            }
            Formula::And(fs) | Formula::Or(fs) => {
                for f in fs {
                    f.collect_free(bound, out);
                }
            }
            Formula::Not(f) => f.collect_free(bound, out),
            Formula::Iff(a, b) => {
                a.collect_free(bound, out);
                b.collect_free(bound, out);
            }
            Formula::Forall(vars, body) | Formula::Exists(vars, body) => {
                let depth = bound.len();
                bound.extend_from_slice(vars);
                body.collect_free(bound, out);
                bound.truncate(depth);
            }
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::True => write!(f, "$true"),
            Formula::False => write!(f, "$false"),
            Formula::Literal(lit) => write!(f, "{lit}"),
            Formula::And(fs) => write_assoc(f, fs, " & "),
            Formula::Or(fs) => write_assoc(f, fs, " | "),
            Formula::Not(inner) => write!(f, "~({inner})"),
            Formula::Iff(a, b) => write!(f, "({a} <=> {b})"),
            Formula::Forall(vars, body) => write_quant(f, "!", vars, body),
            Formula::Exists(vars, body) => write_quant(f, "?", vars, body),
        }
    }
}

fn write_assoc(f: &mut fmt::Formatter<'_>, fs: &[Formula], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, sub) in fs.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{sub}")?;
    }
    write!(f, ")")
}

fn write_quant(
    f: &mut fmt::Formatter<'_>,
    q: &str,
    vars: &[Var],
    body: &Formula,
) -> fmt::Result {
    write!(f, "{q}[")?;
    for (i, v) in vars.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "X{v}")?;
    }
    write!(f, "]: ({body})")
}

/// Provenance of a formula unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inference {
    /// Part of the input problem
    Input,
    /// A freshly introduced predicate definition
    PredicateDefinition,
    /// A unit rewritten by folding named subformulas back in
    DefinitionFolding,
    /// A unit rewritten by unfolding predicate definitions
    PredicateDefinitionUnfolding,
    /// The empty clause produced when the model search space is exhausted
    ModelNotFound,
}

/// A formula with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaUnit {
    /// The formula proper
    pub formula: Formula,
    /// How the unit came to be
    pub inference: Inference,
}

impl FormulaUnit {
    /// Create an input unit
    pub fn input(formula: Formula) -> Self {
        FormulaUnit {
            formula,
            inference: Inference::Input,
        }
    }
}
