//! Clause flattening and variable normalisation
//!
//! Flattening rewrites a clause so that every argument position of every
//! non-equality literal holds a variable and every equality literal has the
//! shape `f(x1,...,xn) = y` or `x = y`. A nested subterm `t` at some
//! position is pulled out through a fresh variable `v`: `C[t]` becomes
//! `C[v] | t != v`, which is equivalent under the implicit universal
//! quantification. For an equality `s = t` with terms on both sides, the
//! right-hand side is lifted first.
//!
//! After flattening, variables are renamed to the smallest indices in
//! left-to-right order of first occurrence, so two clauses that differ only
//! in variable names become structurally equal, and `flatten` is
//! idempotent.

use crate::clause::Clause;
use crate::term::{Literal, Term, Var};
use std::collections::VecDeque;

/// Result of flattening: a clause, or the refutation sentinel when the
/// clause came out empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flattened {
    /// A flat, normalised clause
    Clause(Clause),
    /// The clause collapsed to the empty clause
    Refutation,
}

struct Flattener {
    next_var: Var,
    work: VecDeque<Literal>,
    out: Vec<Literal>,
}

impl Flattener {
    fn fresh(&mut self) -> Var {
        let v = self.next_var;
        self.next_var += 1;
        v
    }

    /// Replace every non-variable argument by a fresh variable, queueing
    /// the defining disequality for each extracted subterm
    fn extract_args(&mut self, args: &[Term]) -> Vec<Term> {
        args.iter()
            .map(|a| match a {
                Term::Var(_) => a.clone(),
                Term::App(..) => {
                    let v = self.fresh();
                    self.work.push_back(Literal::equality(a.clone(), Term::Var(v), false));
                    Term::Var(v)
                }
            })
            .collect()
    }

    fn step(&mut self, lit: Literal) {
        if !lit.is_equality() {
            let args = self.extract_args(lit.args());
            self.out
                .push(Literal::new(lit.pred(), args, lit.is_positive()));
            return;
        }

        let lhs = lit.args()[0].clone();
        let rhs = lit.args()[1].clone();
        match (&lhs, &rhs) {
            (Term::Var(x), Term::Var(y)) => {
                // x != x is false and can be dropped; x = x is kept, every
                // grounding of it satisfies the clause
                if x == y && !lit.is_positive() {
                    return;
                }
                self.out.push(lit);
            }
            (Term::App(f, fargs), Term::Var(_)) => {
                let args = self.extract_args(fargs);
                self.out.push(Literal::equality(
                    Term::App(*f, args),
                    rhs,
                    lit.is_positive(),
                ));
            }
            (Term::Var(_), Term::App(..)) => {
                // orient term-side left
                self.work
                    .push_back(Literal::equality(rhs, lhs, lit.is_positive()));
            }
            (Term::App(..), Term::App(..)) => {
                // lift both sides through a shared fresh variable
                let v = self.fresh();
                self.work
                    .push_back(Literal::equality(lhs, Term::Var(v), lit.is_positive()));
                self.work
                    .push_back(Literal::equality(rhs, Term::Var(v), false));
            }
        }
    }
}

/// Flatten a clause and normalise its variables
pub fn flatten(clause: &Clause) -> Flattened {
    let mut max_var = None;
    let mut vars = Vec::new();
    for lit in clause.literals() {
        lit.collect_vars(&mut vars);
    }
    for &v in &vars {
        max_var = Some(max_var.map_or(v, |m: Var| m.max(v)));
    }

    let mut fl = Flattener {
        next_var: max_var.map_or(0, |m| m + 1),
        work: clause.literals().iter().cloned().collect(),
        out: Vec::new(),
    };
    while let Some(lit) = fl.work.pop_front() {
        fl.step(lit);
    }

    if fl.out.is_empty() {
        return Flattened::Refutation;
    }
    Flattened::Clause(normalize_variables(&Clause::new(fl.out)))
}

/// Rename the variables of a clause to `0..var_count` in left-to-right
/// order of first occurrence
pub fn normalize_variables(clause: &Clause) -> Clause {
    let mut order = Vec::new();
    for lit in clause.literals() {
        lit.collect_vars(&mut order);
    }
    let rename = |t: &Term| rename_term(t, &order);
    let literals = clause
        .literals()
        .iter()
        .map(|lit| {
            Literal::new(
                lit.pred(),
                lit.args().iter().map(rename).collect(),
                lit.is_positive(),
            )
        })
        .collect();
    Clause::new(literals)
}

fn rename_term(t: &Term, order: &[Var]) -> Term {
    match t {
        Term::Var(v) => {
            let idx = order.iter().position(|&o| o == *v).expect("unknown variable");
            Term::Var(idx as Var)
        }
        Term::App(f, args) => {
            Term::App(*f, args.iter().map(|a| rename_term(a, order)).collect())
        }
    }
}
