//! DIMACS CNF emission
//!
//! Writes the classical format: a `p cnf <vars> <clauses>` header followed
//! by one zero-terminated clause per line, literals as signed integers.

use crate::clause::SatClause;
use std::io::{self, Write};

/// Write a clause set in DIMACS CNF format
pub fn write_dimacs<W: Write>(
    out: &mut W,
    num_vars: u32,
    clauses: &[SatClause],
) -> io::Result<()> {
    writeln!(out, "p cnf {} {}", num_vars, clauses.len())?;
    for clause in clauses {
        for lit in clause.literals() {
            write!(out, "{} ", lit.to_dimacs())?;
        }
        writeln!(out, "0")?;
    }
    Ok(())
}

/// Render a clause set as a DIMACS string
pub fn dimacs_string(num_vars: u32, clauses: &[SatClause]) -> String {
    let mut buf = Vec::new();
    write_dimacs(&mut buf, num_vars, clauses).expect("write to Vec cannot fail");
    String::from_utf8(buf).expect("DIMACS output is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::SatLiteral;

    #[test]
    fn format_is_bit_exact() {
        let clauses = vec![
            SatClause::new(vec![
                SatLiteral::new(1, true),
                SatLiteral::new(2, false),
            ]),
            SatClause::new(vec![SatLiteral::new(3, true)]),
        ];
        assert_eq!(
            dimacs_string(3, &clauses),
            "p cnf 3 2\n1 -2 0\n3 0\n"
        );
    }

    #[test]
    fn empty_clause_set() {
        assert_eq!(dimacs_string(0, &[]), "p cnf 0 0\n");
    }
}
