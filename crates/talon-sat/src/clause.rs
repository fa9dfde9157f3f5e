//! SAT clause representation

use crate::literal::SatLiteral;
use std::fmt;

/// A propositional clause (disjunction of literals)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SatClause {
    literals: Box<[SatLiteral]>,
}

impl SatClause {
    /// Create a clause from literals, as given
    pub fn new(literals: Vec<SatLiteral>) -> Self {
        SatClause {
            literals: literals.into_boxed_slice(),
        }
    }

    /// Create a unit clause
    pub fn unit(lit: SatLiteral) -> Self {
        SatClause::new(vec![lit])
    }

    /// Create a clause with duplicate literals removed, preserving first
    /// occurrences; returns `None` for a tautology (both polarities of a
    /// variable present)
    pub fn cleaned(literals: Vec<SatLiteral>) -> Option<Self> {
        let mut out: Vec<SatLiteral> = Vec::with_capacity(literals.len());
        for lit in literals {
            if out.contains(&lit.negated()) {
                return None;
            }
            if !out.contains(&lit) {
                out.push(lit);
            }
        }
        Some(SatClause::new(out))
    }

    /// The literals
    #[inline]
    pub fn literals(&self) -> &[SatLiteral] {
        &self.literals
    }

    /// Number of literals
    #[inline]
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    /// Check if the clause is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Check if the clause has exactly one literal
    #[inline]
    pub fn is_unit(&self) -> bool {
        self.literals.len() == 1
    }
}

impl fmt::Display for SatClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, lit) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{lit}")?;
        }
        write!(f, " 0")
    }
}
