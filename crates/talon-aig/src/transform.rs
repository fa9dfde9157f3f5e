//! Rewrite-map utilities over the shared DAG
//!
//! A rewrite map sends positive node references to replacement references.
//! [`lev0_deref`] follows the map through exactly one indirection;
//! [`saturate_map`] composes the map with itself until a fixed point, so a
//! single dereference afterwards yields the fully rewritten node. Children
//! of a replacement may themselves be mapped (renamed atoms inside an
//! inlined definition), which is why saturation rebuilds targets bottom-up;
//! a key is never expanded inside its own replacement, which guards
//! against cyclic definitions.

use crate::aig::{Aig, AigNode, AigRef};
use rustc_hash::FxHashMap;
use talon_core::Substitution;

/// A rewrite map keyed by positive references
pub type RefMap = FxHashMap<AigRef, AigRef>;

/// Follow the map through a single indirection, respecting polarity
pub fn lev0_deref(r: AigRef, map: &RefMap) -> AigRef {
    if r.polarity() {
        map.get(&r).copied().unwrap_or(r)
    } else {
        match map.get(&r.neg()) {
            Some(&t) => t.neg(),
            None => r,
        }
    }
}

/// One composition step: rebuild `r` bottom-up, replacing every mapped
/// node except `skip` by its image
fn apply_once(aig: &mut Aig, map: &RefMap, r: AigRef, skip: AigRef) -> AigRef {
    let pos = r.positive();
    let new_pos = if pos != skip && map.contains_key(&pos) {
        map[&pos]
    } else {
        match aig.node(pos).clone() {
            AigNode::True | AigNode::Atom(_) => pos,
            AigNode::Conj(a, b) => {
                let na = apply_once(aig, map, a, skip);
                let nb = apply_once(aig, map, b, skip);
                if na == a && nb == b {
                    pos
                } else {
                    aig.conj(na, nb)
                }
            }
            AigNode::Quant { vars, body } => {
                let nb = apply_once(aig, map, body, skip);
                if nb == body {
                    pos
                } else {
                    aig.exists(vars, nb)
                }
            }
        }
    };
    if r.polarity() {
        new_pos
    } else {
        new_pos.neg()
    }
}

/// Compose the map with itself until nothing changes
pub fn saturate_map(aig: &mut Aig, map: &mut RefMap) {
    loop {
        let mut changed = false;
        let keys: Vec<AigRef> = map.keys().copied().collect();
        for k in keys {
            let t = map[&k];
            let nt = apply_once(aig, map, t, k);
            if nt != t {
                map.insert(k, nt);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Apply a substitution through the DAG, rebuilding affected nodes
///
/// Bindings for variables bound by a quantifier on the path are masked
/// out below that quantifier.
pub fn apply_subst(aig: &mut Aig, subst: &Substitution, r: AigRef) -> AigRef {
    let pos = r.positive();
    let new_pos = match aig.node(pos).clone() {
        AigNode::True => pos,
        AigNode::Atom(lit) => aig.atom(&subst.apply_literal(&lit)),
        AigNode::Conj(a, b) => {
            let na = apply_subst(aig, subst, a);
            let nb = apply_subst(aig, subst, b);
            aig.conj(na, nb)
        }
        AigNode::Quant { vars, body } => {
            let masked = subst.without(&vars);
            let nb = apply_subst(aig, &masked, body);
            aig.exists(vars, nb)
        }
    };
    if r.polarity() {
        new_pos
    } else {
        new_pos.neg()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talon_core::{Literal, PredSym, Term};

    fn atom(aig: &mut Aig, p: u32, vars: &[u32]) -> AigRef {
        aig.atom(&Literal::new(
            PredSym(p),
            vars.iter().map(|&v| Term::Var(v)).collect(),
            true,
        ))
    }

    #[test]
    fn lev0_deref_respects_polarity() {
        let mut aig = Aig::new();
        let a = atom(&mut aig, 1, &[]);
        let b = atom(&mut aig, 2, &[]);
        let mut map = RefMap::default();
        map.insert(a, b.neg());
        assert_eq!(lev0_deref(a, &map), b.neg());
        assert_eq!(lev0_deref(a.neg(), &map), b);
        assert_eq!(lev0_deref(b, &map), b);
    }

    #[test]
    fn saturation_chases_chains_and_rewrites_children() {
        // p -> q & r, q -> s: after saturation p maps to s & r
        let mut aig = Aig::new();
        let p = atom(&mut aig, 1, &[]);
        let q = atom(&mut aig, 2, &[]);
        let rr = atom(&mut aig, 3, &[]);
        let s = atom(&mut aig, 4, &[]);
        let qr = aig.conj(q, rr);
        let mut map = RefMap::default();
        map.insert(p, qr);
        map.insert(q, s);
        saturate_map(&mut aig, &mut map);
        let expected = aig.conj(s, rr);
        assert_eq!(lev0_deref(p, &map), expected);
    }

    #[test]
    fn saturation_terminates_on_cycles() {
        let mut aig = Aig::new();
        let p = atom(&mut aig, 1, &[]);
        let q = atom(&mut aig, 2, &[]);
        let mut map = RefMap::default();
        map.insert(p, q);
        map.insert(q, p);
        saturate_map(&mut aig, &mut map);
        // each key resolves without diverging
        let _ = lev0_deref(p, &map);
        let _ = lev0_deref(q, &map);
    }

    #[test]
    fn subst_rewrites_atoms_below_conjunctions() {
        let mut aig = Aig::new();
        let px = atom(&mut aig, 1, &[0]);
        let qx = atom(&mut aig, 2, &[0]);
        let both = aig.conj(px, qx.neg());

        let c = Term::constant(talon_core::FnSym(0));
        let mut subst = Substitution::new();
        subst.bind(0, c);

        let res = apply_subst(&mut aig, &subst, both);
        let pc = aig.atom(&Literal::new(PredSym(1), vec![Term::constant(talon_core::FnSym(0))], true));
        let qc = aig.atom(&Literal::new(PredSym(2), vec![Term::constant(talon_core::FnSym(0))], true));
        let expected = aig.conj(pc, qc.neg());
        assert_eq!(res, expected);
    }

    #[test]
    fn subst_is_masked_under_binders() {
        let mut aig = Aig::new();
        let px = atom(&mut aig, 1, &[0]);
        let q = aig.exists(vec![0], px);

        let mut subst = Substitution::new();
        subst.bind(0, Term::constant(talon_core::FnSym(0)));
        assert_eq!(apply_subst(&mut aig, &subst, q), q);
    }
}
