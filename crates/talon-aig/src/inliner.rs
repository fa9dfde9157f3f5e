//! Definition inliner
//!
//! Recognises predicate definitions `! [X..] : (p(X..) <=> phi)` (and bare
//! atoms, read as `p(..) <=> $true`) among the input units, indexes them by
//! their head atom, and rewrites every occurrence of a defined atom to the
//! instantiated definition body. Only one definition may cover an atom: a
//! head that unifies with an already-stored head is rejected.
//!
//! After the atom map is built it is saturated, because a definition body
//! may itself contain defined atoms. An orthogonal simplification map is
//! then populated with the compressing normaliser, and application is two
//! single-step dereferences: inline, then simplify.

use crate::aig::{Aig, AigRef};
use crate::compress::AigCompressor;
use crate::convert::{aig_to_formula, formula_to_aig};
use crate::transform::{apply_subst, lev0_deref, saturate_map, RefMap};
use crate::UnitChange;
use rustc_hash::FxHashMap;
use talon_core::{
    match_literals, unify_literals, Formula, FormulaUnit, Inference, Literal, PredSym, Signature,
    Var,
};
use tracing::debug;

/// A recognised definition
#[derive(Debug, Clone)]
pub struct EquivInfo {
    /// The head literal as written (possibly negative)
    pub lhs: Literal,
    /// The body formula
    pub rhs: Formula,
    /// Index of the originating unit in the scanned slice
    pub unit_index: usize,
    /// The head with positive polarity, as indexed
    pub pos_lhs: Literal,
    /// The compressed body AIG with the head polarity folded in
    pub active_rhs: AigRef,
}

/// Is the literal fit to be a definition head: an unprotected predicate
/// applied to pairwise distinct variables
pub(crate) fn is_definition_head(lit: &Literal, sig: &Signature) -> bool {
    !sig.predicate_protected(lit.pred()) && lit.has_distinct_var_args()
}

/// Deterministic ordering used to orient an equivalence between two atoms;
/// the greater side becomes the head
pub(crate) fn lit_is_less(l1: &Literal, l2: &Literal, sig: &Signature) -> bool {
    let p1 = sig.predicate_protected(l1.pred());
    let p2 = sig.predicate_protected(l2.pred());
    if p1 != p2 {
        return p1;
    }
    if l1.pred() != l2.pred() {
        return l1.pred() < l2.pred();
    }
    (l1.weight(), l1.args()) < (l2.weight(), l2.args())
}

/// Try to read a unit as an equivalence with an atom head
pub(crate) fn try_get_equiv(sig: &Signature, fu: &FormulaUnit) -> Option<(Literal, Formula)> {
    let mut qvars: Vec<Var> = Vec::new();
    let mut f = &fu.formula;
    if let Formula::Forall(vars, body) = f {
        qvars = vars.clone();
        f = body;
    }

    match f {
        Formula::Literal(lhs) => {
            if sig.predicate_protected(lhs.pred()) {
                return None;
            }
            Some((lhs.clone(), Formula::True))
        }
        Formula::Iff(a, b) => {
            let mut c1: &Formula = a;
            let mut c2: &Formula = b;
            if !matches!(c1, Formula::Literal(_)) {
                std::mem::swap(&mut c1, &mut c2);
            } else if let (Formula::Literal(l1), Formula::Literal(l2)) = (c1, c2) {
                let l1_head = is_definition_head(l1, sig);
                let l2_head = is_definition_head(l2, sig);
                if l1_head == l2_head {
                    if l1.pred() == l2.pred() {
                        if l1 == l2 || *l1 == l2.complementary() {
                            return None;
                        }
                    }
                    if lit_is_less(l1, l2, sig) {
                        std::mem::swap(&mut c1, &mut c2);
                    }
                } else if l2_head {
                    std::mem::swap(&mut c1, &mut c2);
                }
            }

            let Formula::Literal(lhs) = c1 else {
                return None;
            };
            if sig.predicate_protected(lhs.pred()) {
                return None;
            }

            // the quantifier prefix must bind exactly the head variables
            let mut lhs_vars = Vec::new();
            lhs.collect_vars(&mut lhs_vars);
            lhs_vars.sort_unstable();
            lhs_vars.dedup();
            qvars.sort_unstable();
            qvars.dedup();
            if qvars != lhs_vars {
                return None;
            }

            Some((lhs.clone(), c2.clone()))
        }
        _ => None,
    }
}

/// Strict definition shape for the introducer: the head must be a
/// definition head proper
pub(crate) fn split_definition(
    sig: &Signature,
    fu: &FormulaUnit,
) -> Option<(Literal, Formula)> {
    let (lhs, rhs) = try_get_equiv(sig, fu)?;
    if !is_definition_head(&lhs, sig) {
        return None;
    }
    if matches!(rhs, Formula::True) {
        return None;
    }
    Some((lhs, rhs))
}

/// The inlining pass
pub struct AigInliner<'a> {
    aig: &'a mut Aig,
    sig: &'a Signature,
    compressor: AigCompressor,
    infos: Vec<EquivInfo>,
    by_pred: FxHashMap<PredSym, Vec<usize>>,
    unit_to_def: FxHashMap<usize, usize>,
    units: Vec<FormulaUnit>,
    inl_map: RefMap,
    simpl_map: RefMap,
}

impl<'a> AigInliner<'a> {
    /// Create an inliner over a shared arena and signature
    pub fn new(aig: &'a mut Aig, sig: &'a Signature) -> Self {
        AigInliner {
            aig,
            sig,
            compressor: AigCompressor::new(),
            infos: Vec::new(),
            by_pred: FxHashMap::default(),
            unit_to_def: FxHashMap::default(),
            units: Vec::new(),
            inl_map: RefMap::default(),
            simpl_map: RefMap::default(),
        }
    }

    /// Number of definitions accepted during the scan
    pub fn definition_count(&self) -> usize {
        self.infos.len()
    }

    fn add_info(&mut self, lhs: Literal, rhs: Formula, unit_index: usize) -> bool {
        let pos_lhs = lhs.positive_form();

        // one inlining rule per atom
        if let Some(existing) = self.by_pred.get(&pos_lhs.pred()) {
            for &i in existing {
                if unify_literals(&self.infos[i].pos_lhs, &pos_lhs) {
                    return false;
                }
            }
        }

        let mut rhs_aig = formula_to_aig(self.aig, &rhs);
        if !lhs.is_positive() {
            rhs_aig = rhs_aig.neg();
        }
        let active_rhs = self.compressor.compress(self.aig, rhs_aig);

        debug!(head = %pos_lhs, "definition accepted for inlining");

        let idx = self.infos.len();
        self.by_pred.entry(pos_lhs.pred()).or_default().push(idx);
        self.unit_to_def.insert(unit_index, idx);
        self.infos.push(EquivInfo {
            lhs,
            rhs,
            unit_index,
            pos_lhs,
            active_rhs,
        });
        true
    }

    fn try_expand_atom(&mut self, atom: AigRef) -> Option<AigRef> {
        let lit = self.aig.atom_literal(atom)?.clone();
        let candidates = self.by_pred.get(&lit.pred())?.clone();
        for i in candidates {
            let (head, body) = {
                let info = &self.infos[i];
                (info.pos_lhs.clone(), info.active_rhs)
            };
            if let Some(subst) = match_literals(&head, &lit) {
                if head == lit {
                    return Some(body);
                }
                return Some(apply_subst(self.aig, &subst, body));
            }
        }
        None
    }

    /// Collect definitions from the units and build the saturated rewrite
    /// maps
    pub fn scan(&mut self, units: &[FormulaUnit]) {
        let mut relevant: Vec<AigRef> = Vec::new();

        for (i, unit) in units.iter().enumerate() {
            self.units.push(unit.clone());
            let relevant_formula = match try_get_equiv(self.sig, unit) {
                Some((lhs, rhs)) => {
                    if self.add_info(lhs, rhs.clone(), i) {
                        rhs
                    } else {
                        unit.formula.clone()
                    }
                }
                None => unit.formula.clone(),
            };
            relevant.push(formula_to_aig(self.aig, &relevant_formula));
        }

        // map every defined atom occurring anywhere to its instantiated
        // body, chasing into the bodies as they are added
        let mut traversal = crate::aig::InsideOutTraversal::new();
        for &r in &relevant {
            traversal.add(r);
        }
        let mut atom_map = RefMap::default();
        while let Some(node) = traversal.next_node(self.aig) {
            if !self.aig.is_atom(node) {
                continue;
            }
            if let Some(target) = self.try_expand_atom(node) {
                atom_map.insert(node, target);
                traversal.add(target);
            }
        }
        self.inl_map = atom_map;
        saturate_map(self.aig, &mut self.inl_map);

        // the simplification map covers everything reachable after
        // inlining; interior nodes are rebuilt bottom-up from the images
        // of their children, so one dereference of a root rewrites the
        // whole subgraph
        let mut traversal = crate::aig::InsideOutTraversal::new();
        for &base in &relevant {
            traversal.add(lev0_deref(base, &self.inl_map));
        }
        let mut nodes = Vec::new();
        while let Some(node) = traversal.next_node(self.aig) {
            nodes.push(node);
        }
        for r in nodes {
            let rebuilt = match self.aig.node(r).clone() {
                crate::aig::AigNode::True | crate::aig::AigNode::Atom(_) => continue,
                crate::aig::AigNode::Conj(a, b) => {
                    let ia = self.image(a);
                    let ib = self.image(b);
                    let c = self.aig.conj(ia, ib);
                    self.compressor.compress(self.aig, c)
                }
                crate::aig::AigNode::Quant { vars, body } => {
                    let ib = self.image(body);
                    let q = self.aig.exists(vars, ib);
                    self.compressor.compress(self.aig, q)
                }
            };
            if rebuilt != r {
                self.simpl_map.insert(r, rebuilt);
            }
        }
    }

    /// The fully rewritten form of a reference, assuming its children have
    /// already been mapped
    fn image(&self, r: AigRef) -> AigRef {
        let inlined = lev0_deref(r, &self.inl_map);
        lev0_deref(inlined, &self.simpl_map)
    }

    /// Rewrite a reference: inline, then simplify
    pub fn apply_aig(&self, r: AigRef) -> AigRef {
        let inlined = lev0_deref(r, &self.inl_map);
        lev0_deref(inlined, &self.simpl_map)
    }

    /// Rewrite a formula, returning it unchanged when the DAG is unchanged
    pub fn apply_formula(&mut self, f: &Formula) -> Formula {
        let a = formula_to_aig(self.aig, f);
        let target = self.apply_aig(a);
        if target == a {
            f.clone()
        } else {
            aig_to_formula(self.aig, target)
        }
    }

    /// Rewrite one scanned unit
    pub fn apply_unit(&mut self, index: usize) -> UnitChange {
        if let Some(&def_idx) = self.unit_to_def.get(&index) {
            // a definition keeps its head; only the body is rewritten
            let (lhs, rhs) = {
                let info = &self.infos[def_idx];
                (info.lhs.clone(), info.rhs.clone())
            };
            let new_rhs = self.apply_formula(&rhs);
            if new_rhs == rhs {
                return UnitChange::Unchanged;
            }
            let lhs_formula = Formula::Literal(lhs.clone());
            let body = match new_rhs {
                Formula::True => lhs_formula,
                Formula::False => Formula::Literal(lhs.complementary()),
                other => Formula::Iff(Box::new(lhs_formula), Box::new(other)),
            };
            let qvars = body.free_vars();
            return UnitChange::Replaced(FormulaUnit {
                formula: Formula::forall(qvars, body),
                inference: Inference::PredicateDefinitionUnfolding,
            });
        }

        let original = self.units[index].formula.clone();
        let rewritten = self.apply_formula(&original);
        if matches!(rewritten, Formula::True) {
            return UnitChange::Deleted;
        }
        if rewritten == original {
            return UnitChange::Unchanged;
        }
        UnitChange::Replaced(FormulaUnit {
            formula: rewritten,
            inference: Inference::PredicateDefinitionUnfolding,
        })
    }

    /// Rewrite every scanned unit, dropping deleted ones
    pub fn apply_all(&mut self) -> Vec<FormulaUnit> {
        let mut out = Vec::with_capacity(self.units.len());
        for i in 0..self.units.len() {
            match self.apply_unit(i) {
                UnitChange::Unchanged => out.push(self.units[i].clone()),
                UnitChange::Replaced(u) => out.push(u),
                UnitChange::Deleted => {}
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talon_core::Term;

    fn setup() -> (Aig, Signature) {
        (Aig::new(), Signature::new())
    }

    fn atom_f(p: PredSym, args: Vec<Term>) -> Formula {
        Formula::Literal(Literal::new(p, args, true))
    }

    fn def(p: PredSym, rhs: Formula) -> FormulaUnit {
        // ! [X0] : (p(X0) <=> rhs)
        FormulaUnit::input(Formula::Forall(
            vec![0],
            Box::new(Formula::Iff(
                Box::new(atom_f(p, vec![Term::Var(0)])),
                Box::new(rhs),
            )),
        ))
    }

    #[test]
    fn chained_definitions_inline_to_fixpoint() {
        // p(x) <=> q(x) & r(x), q(x) <=> s(x): p(c) expands to s(c) & r(c)
        let (mut aig, mut sig) = setup();
        let p = sig.add_predicate("p", 1);
        let q = sig.add_predicate("q", 1);
        let r = sig.add_predicate("r", 1);
        let s = sig.add_predicate("s", 1);
        let c = sig.add_function("c", 0);

        let units = vec![
            def(
                p,
                Formula::And(vec![
                    atom_f(q, vec![Term::Var(0)]),
                    atom_f(r, vec![Term::Var(0)]),
                ]),
            ),
            def(q, atom_f(s, vec![Term::Var(0)])),
            FormulaUnit::input(atom_f(p, vec![Term::constant(c)])),
        ];

        let mut inliner = AigInliner::new(&mut aig, &sig);
        inliner.scan(&units);
        assert_eq!(inliner.definition_count(), 2);

        let pc = Literal::new(p, vec![Term::constant(c)], true);
        let sc = Literal::new(s, vec![Term::constant(c)], true);
        let rc = Literal::new(r, vec![Term::constant(c)], true);

        let pc_ref = inliner.aig.atom(&pc);
        let result = inliner.apply_aig(pc_ref);
        let s_ref = inliner.aig.atom(&sc);
        let r_ref = inliner.aig.atom(&rc);
        let expected = inliner.aig.conj(s_ref, r_ref);
        assert_eq!(result, expected);
    }

    #[test]
    fn inlined_atom_matches_instantiated_body() {
        // for a defined atom a: apply(a) equals the body under the matcher
        let (mut aig, mut sig) = setup();
        let p = sig.add_predicate("p", 1);
        let q = sig.add_predicate("q", 1);
        let c = sig.add_function("c", 0);

        let units = vec![
            def(p, atom_f(q, vec![Term::Var(0)])),
            FormulaUnit::input(atom_f(p, vec![Term::constant(c)])),
        ];

        let mut inliner = AigInliner::new(&mut aig, &sig);
        inliner.scan(&units);

        let pc = Literal::new(p, vec![Term::constant(c)], true);
        let qc = Literal::new(q, vec![Term::constant(c)], true);
        let pc_ref = inliner.aig.atom(&pc);
        let qc_ref = inliner.aig.atom(&qc);
        assert_eq!(inliner.apply_aig(pc_ref), qc_ref);
        // negative occurrences follow by polarity
        assert_eq!(inliner.apply_aig(pc_ref.neg()), qc_ref.neg());
    }

    #[test]
    fn second_definition_for_same_head_is_rejected() {
        let (mut aig, mut sig) = setup();
        let p = sig.add_predicate("p", 1);
        let q = sig.add_predicate("q", 1);
        let r = sig.add_predicate("r", 1);

        let units = vec![
            def(p, atom_f(q, vec![Term::Var(0)])),
            def(p, atom_f(r, vec![Term::Var(0)])),
        ];

        let mut inliner = AigInliner::new(&mut aig, &sig);
        inliner.scan(&units);
        assert_eq!(inliner.definition_count(), 1);
    }

    #[test]
    fn protected_heads_are_not_definitions() {
        let (mut aig, mut sig) = setup();
        let q = sig.add_predicate("q", 1);
        // ! [X,Y] : (X = Y <=> q(X)) must not index an equality head
        let unit = FormulaUnit::input(Formula::Forall(
            vec![0, 1],
            Box::new(Formula::Iff(
                Box::new(Formula::Literal(Literal::equality(
                    Term::Var(0),
                    Term::Var(1),
                    true,
                ))),
                Box::new(atom_f(q, vec![Term::Var(0)])),
            )),
        ));
        let mut inliner = AigInliner::new(&mut aig, &sig);
        inliner.scan(&[unit]);
        assert_eq!(inliner.definition_count(), 0);
    }

    #[test]
    fn quantifier_mismatch_is_rejected() {
        // ! [X0,X1] : (p(X0) <=> q(X1)) binds a variable the head lacks
        let (mut aig, mut sig) = setup();
        let p = sig.add_predicate("p", 1);
        let q = sig.add_predicate("q", 1);
        let unit = FormulaUnit::input(Formula::Forall(
            vec![0, 1],
            Box::new(Formula::Iff(
                Box::new(atom_f(p, vec![Term::Var(0)])),
                Box::new(atom_f(q, vec![Term::Var(1)])),
            )),
        ));
        let mut inliner = AigInliner::new(&mut aig, &sig);
        inliner.scan(&[unit]);
        assert_eq!(inliner.definition_count(), 0);
    }

    #[test]
    fn bare_atom_defines_truth() {
        // a unit p(c) inlines other occurrences of p(c) to $true
        let (mut aig, mut sig) = setup();
        let p = sig.add_predicate("p", 1);
        let q = sig.add_predicate("q", 0);
        let c = sig.add_function("c", 0);

        let units = vec![
            FormulaUnit::input(atom_f(p, vec![Term::constant(c)])),
            FormulaUnit::input(Formula::Or(vec![
                atom_f(p, vec![Term::constant(c)]),
                atom_f(q, vec![]),
            ])),
        ];
        let mut inliner = AigInliner::new(&mut aig, &sig);
        inliner.scan(&units);
        assert_eq!(inliner.definition_count(), 1);

        // the disjunction collapses to a tautology and is deleted
        assert_eq!(inliner.apply_unit(1), UnitChange::Deleted);
    }

    #[test]
    fn definition_bodies_are_rewritten_in_place() {
        // p(x) <=> q(x), q(x) <=> s(x): the p-definition body becomes s(x)
        let (mut aig, mut sig) = setup();
        let p = sig.add_predicate("p", 1);
        let q = sig.add_predicate("q", 1);
        let s = sig.add_predicate("s", 1);

        let units = vec![
            def(p, atom_f(q, vec![Term::Var(0)])),
            def(q, atom_f(s, vec![Term::Var(0)])),
        ];
        let mut inliner = AigInliner::new(&mut aig, &sig);
        inliner.scan(&units);

        match inliner.apply_unit(0) {
            UnitChange::Replaced(unit) => {
                assert_eq!(unit.inference, Inference::PredicateDefinitionUnfolding);
                let expected = Formula::Forall(
                    vec![0],
                    Box::new(Formula::Iff(
                        Box::new(atom_f(p, vec![Term::Var(0)])),
                        Box::new(atom_f(s, vec![Term::Var(0)])),
                    )),
                );
                assert_eq!(unit.formula, expected);
            }
            other => panic!("expected replacement, got {other:?}"),
        }
    }
}
