//! Formula / AIG conversion

use crate::aig::{Aig, AigNode, AigRef};
use talon_core::Formula;

/// Convert a formula into the shared DAG
pub fn formula_to_aig(aig: &mut Aig, f: &Formula) -> AigRef {
    match f {
        Formula::True => aig.tru(),
        Formula::False => aig.fls(),
        Formula::Literal(lit) => aig.atom(lit),
        Formula::And(fs) => {
            let refs: Vec<AigRef> = fs.iter().map(|g| formula_to_aig(aig, g)).collect();
            aig.conj_all(refs)
        }
        Formula::Or(fs) => {
            let refs: Vec<AigRef> = fs.iter().map(|g| formula_to_aig(aig, g)).collect();
            aig.disj_all(refs)
        }
        Formula::Not(g) => formula_to_aig(aig, g).neg(),
        Formula::Iff(a, b) => {
            // a <=> b as ~(a & ~b) & ~(~a & b)
            let ar = formula_to_aig(aig, a);
            let br = formula_to_aig(aig, b);
            let left = aig.conj(ar, br.neg()).neg();
            let right = aig.conj(ar.neg(), br).neg();
            aig.conj(left, right)
        }
        Formula::Forall(vars, body) => {
            let br = formula_to_aig(aig, body);
            aig.forall(vars.clone(), br)
        }
        Formula::Exists(vars, body) => {
            let br = formula_to_aig(aig, body);
            aig.exists(vars.clone(), br)
        }
    }
}

/// Collect the conjunct spine of a positive conjunction
fn collect_conjuncts(aig: &Aig, r: AigRef, out: &mut Vec<AigRef>) {
    if r.polarity() {
        if let AigNode::Conj(a, b) = aig.node(r) {
            let (a, b) = (*a, *b);
            collect_conjuncts(aig, a, out);
            collect_conjuncts(aig, b, out);
            return;
        }
    }
    out.push(r);
}

/// Read a formula back out of the DAG
pub fn aig_to_formula(aig: &Aig, r: AigRef) -> Formula {
    if r == aig.tru() {
        return Formula::True;
    }
    if r == aig.fls() {
        return Formula::False;
    }
    match aig.node(r) {
        AigNode::True => unreachable!("constants handled above"),
        AigNode::Atom(lit) => {
            if r.polarity() {
                Formula::Literal(lit.clone())
            } else {
                Formula::Literal(lit.complementary())
            }
        }
        AigNode::Conj(..) => {
            if r.polarity() {
                let mut parts = Vec::new();
                collect_conjuncts(aig, r, &mut parts);
                Formula::And(parts.iter().map(|&p| aig_to_formula(aig, p)).collect())
            } else {
                let mut parts = Vec::new();
                collect_conjuncts(aig, r.neg(), &mut parts);
                Formula::Or(
                    parts
                        .iter()
                        .map(|&p| aig_to_formula(aig, p.neg()))
                        .collect(),
                )
            }
        }
        AigNode::Quant { vars, body } => {
            if r.polarity() {
                Formula::Exists(vars.clone(), Box::new(aig_to_formula(aig, *body)))
            } else {
                Formula::Forall(vars.clone(), Box::new(aig_to_formula(aig, body.neg())))
            }
        }
    }
}
