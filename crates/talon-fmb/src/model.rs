//! TPTP model rendering
//!
//! Walks every non-introduced symbol of the signature, reads the unique
//! true value literal for each grounding off the satisfying assignment,
//! and prints the interpretation as `fof` statements. Domain element `k`
//! is the token `fmbK`.

use std::fmt::Write;
use talon_core::Signature;
use talon_sat::{SatLiteral, SatSolver};

/// Render the satisfying assignment as a TPTP interpretation
///
/// `sat_literal` is the encoding function of the builder: symbol id,
/// grounding (argument values, then the result value for functions),
/// polarity, function flag, size.
pub fn render_model<F>(
    sig: &Signature,
    solver: &dyn SatSolver,
    size: u32,
    sat_literal: F,
) -> String
where
    F: Fn(u32, &[u32], bool, bool, u32) -> SatLiteral,
{
    let mut out = String::new();

    // the domain
    let _ = writeln!(out, "fof(domain,interpretation_domain,");
    let _ = write!(out, "      ! [X] : (");
    for i in 1..=size {
        if i > 1 {
            let _ = write!(out, " | ");
        }
        let _ = write!(out, "X = fmb{i}");
    }
    let _ = writeln!(out, ") ).");
    let _ = writeln!(out);

    // distinctness of the domain
    if size > 1 {
        let _ = writeln!(out, "fof(distinct_domain,interpreted_domain,");
        let _ = write!(out, "      ");
        let mut first = true;
        for i in 1..=size {
            for j in (i + 1)..=size {
                if !first {
                    let _ = write!(out, " & ");
                }
                first = false;
                let _ = write!(out, "fmb{i} != fmb{j}");
            }
        }
        let _ = writeln!(out, ").");
        let _ = writeln!(out);
    }

    // constants
    for f in sig.function_syms() {
        if sig.function_arity(f) > 0 || sig.function_introduced(f) {
            continue;
        }
        let name = sig.function_name(f);
        let value = (1..=size)
            .find(|&c| solver.true_in_assignment(sat_literal(f.0, &[c], true, true, size)))
            .expect("totality fixes every constant");
        let _ = writeln!(out, "fof(constant_{name},functors,{name} = fmb{value}).");
    }
    let _ = writeln!(out);

    // functions of arity at least one
    for f in sig.function_syms() {
        let arity = sig.function_arity(f) as usize;
        if arity == 0 || sig.function_introduced(f) {
            continue;
        }
        let name = sig.function_name(f);
        let _ = writeln!(out, "fof(function_{name},functors,");
        let mut first = true;
        let mut grounding = Grounding::new(arity, size);
        while grounding.step() {
            if !first {
                let _ = writeln!(out, " &");
            }
            first = false;
            let _ = write!(out, "         {name}(");
            for (j, d) in grounding.values.iter().enumerate() {
                if j > 0 {
                    let _ = write!(out, ",");
                }
                let _ = write!(out, "fmb{d}");
            }
            let mut used = grounding.values.clone();
            used.push(0);
            let value = (1..=size)
                .find(|&c| {
                    *used.last_mut().expect("result slot") = c;
                    solver.true_in_assignment(sat_literal(f.0, &used, true, true, size))
                })
                .expect("totality fixes every function value");
            let _ = write!(out, ") = fmb{value}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, ").");
        let _ = writeln!(out);
    }

    // propositional symbols
    for p in sig.predicate_syms() {
        if sig.predicate_arity(p) > 0 || sig.predicate_introduced(p) {
            continue;
        }
        let name = sig.predicate_name(p);
        let truth = solver.true_in_assignment(sat_literal(p.0, &[], true, false, size));
        let neg = if truth { "" } else { "~" };
        let _ = writeln!(out, "fof(predicate_{name},predicates,{neg}{name}).");
    }
    let _ = writeln!(out);

    // predicates of arity at least one
    for p in sig.predicate_syms() {
        let arity = sig.predicate_arity(p) as usize;
        if arity == 0 || sig.predicate_introduced(p) {
            continue;
        }
        let name = sig.predicate_name(p);
        let _ = writeln!(out, "fof(predicate_{name},predicates,");
        let mut first = true;
        let mut grounding = Grounding::new(arity, size);
        while grounding.step() {
            if !first {
                let _ = writeln!(out, " &");
            }
            first = false;
            let truth = solver
                .true_in_assignment(sat_literal(p.0, &grounding.values, true, false, size));
            let neg = if truth { "" } else { "~" };
            let _ = write!(out, "         {neg}{name}(");
            for (j, d) in grounding.values.iter().enumerate() {
                if j > 0 {
                    let _ = write!(out, ",");
                }
                let _ = write!(out, "fmb{d}");
            }
            let _ = write!(out, ")");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, ").");
        let _ = writeln!(out);
    }

    out
}

/// Odometer over the full domain, used only for printing
struct Grounding {
    values: Vec<u32>,
    size: u32,
}

impl Grounding {
    fn new(arity: usize, size: u32) -> Self {
        let mut values = vec![1; arity];
        if let Some(last) = values.last_mut() {
            *last = 0;
        }
        Grounding { values, size }
    }

    fn step(&mut self) -> bool {
        for i in (0..self.values.len()).rev() {
            if self.values[i] == self.size {
                self.values[i] = 1;
            } else {
                self.values[i] += 1;
                return true;
            }
        }
        false
    }
}
