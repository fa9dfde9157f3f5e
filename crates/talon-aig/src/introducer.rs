//! Definition introducer
//!
//! The converse of inlining: subformulas that are referenced often enough
//! get a fresh predicate name. The pass works on the topologically ordered
//! list of nodes reachable from the top-level AIGs.
//!
//! The first pass runs children-first and computes, per node, the direct
//! reference count and whether the node contains a quantifier, per
//! effective polarity. The second pass runs parents-first: it accumulates
//! formula reference counts, polarity and under-quantifier bits downwards,
//! and names every countable node (neither constant nor atom, not already
//! named) whose count reaches the threshold. Naming mints a fresh
//! predicate over the node's free variables in canonical order, emits the
//! defining equivalence as a new unit, and resets the node's count to one
//! so ancestors see a single occurrence.
//!
//! Application afterwards folds any unit whose entire formula has a name.

use crate::aig::{Aig, AigRef};
use crate::convert::{aig_to_formula, formula_to_aig};
use crate::inliner::split_definition;
use crate::transform::{saturate_map, RefMap};
use crate::UnitChange;
use rustc_hash::FxHashMap;
use talon_core::{Formula, FormulaUnit, Inference, Literal, Signature, Term};
use tracing::debug;

/// Default reference-count threshold for naming
pub const DEFAULT_NAMING_THRESHOLD: u32 = 4;

#[derive(Debug, Clone, Default)]
struct NodeInfo {
    direct_ref_cnt: u32,
    name: Option<AigRef>,
    /// Does the subgraph contain a quantifier, per effective polarity
    has_quant: [bool; 2],
    /// Polarities in which the node occurs in some top-level formula
    in_pol: [bool; 2],
    /// Does the node occur under a quantifier, per effective polarity
    in_quant: [bool; 2],
    form_ref_cnt: u32,
}

/// The naming pass
pub struct AigDefinitionIntroducer<'a> {
    aig: &'a mut Aig,
    sig: &'a mut Signature,
    threshold: u32,
    /// Node (positive) to its name atom, both aligned positive
    defs: RefMap,
    toplevel: Vec<(AigRef, usize)>,
    ref_aigs: Vec<AigRef>,
    index_of: FxHashMap<AigRef, usize>,
    infos: Vec<NodeInfo>,
    new_defs: Vec<FormulaUnit>,
    units: Vec<FormulaUnit>,
}

impl<'a> AigDefinitionIntroducer<'a> {
    /// Create an introducer with the default threshold
    pub fn new(aig: &'a mut Aig, sig: &'a mut Signature) -> Self {
        Self::with_threshold(aig, sig, DEFAULT_NAMING_THRESHOLD)
    }

    /// Create an introducer with an explicit naming threshold
    pub fn with_threshold(aig: &'a mut Aig, sig: &'a mut Signature, threshold: u32) -> Self {
        AigDefinitionIntroducer {
            aig,
            sig,
            threshold,
            defs: RefMap::default(),
            toplevel: Vec::new(),
            ref_aigs: Vec::new(),
            index_of: FxHashMap::default(),
            infos: Vec::new(),
            new_defs: Vec::new(),
            units: Vec::new(),
        }
    }

    /// Scan the units, run both passes, and saturate the name map
    pub fn scan(&mut self, units: &[FormulaUnit]) {
        self.units = units.to_vec();
        for (i, unit) in units.iter().enumerate() {
            if let Some((lhs, rhs)) = split_definition(self.sig, unit) {
                self.scan_definition(&lhs, &rhs, i);
                continue;
            }
            let a = formula_to_aig(self.aig, &unit.formula);
            self.toplevel.push((a, i));
        }

        let roots: Vec<AigRef> = self.toplevel.iter().map(|&(a, _)| a).collect();
        self.ref_aigs = self.aig.ordered_nodes(&roots);

        self.first_pass();
        self.second_pass();
        saturate_map(self.aig, &mut self.defs);
    }

    /// Register an existing definition so its body is not named again
    fn scan_definition(&mut self, lhs: &Literal, rhs: &Formula, unit_index: usize) {
        let mut rhs_aig = formula_to_aig(self.aig, rhs);
        let mut lhs_aig = self.aig.atom(lhs);
        if !rhs_aig.polarity() {
            rhs_aig = rhs_aig.neg();
            lhs_aig = lhs_aig.neg();
        }
        if self.defs.contains_key(&rhs_aig) {
            // the body already has a name
            return;
        }
        self.defs.insert(rhs_aig, lhs_aig);
        self.toplevel.push((rhs_aig, unit_index));
    }

    fn first_pass(&mut self) {
        debug_assert!(self.infos.is_empty());
        for i in 0..self.ref_aigs.len() {
            let r = self.ref_aigs[i];
            debug_assert!(r.polarity());
            self.index_of.insert(r, i);

            let mut info = NodeInfo {
                name: self.defs.get(&r).copied(),
                ..NodeInfo::default()
            };
            info.has_quant[1] = self.aig.is_quantifier(r);

            for child in self.aig.children(r) {
                let flip = usize::from(!child.polarity());
                let ci = self.index_of[&child.positive()];
                self.infos[ci].direct_ref_cnt += 1;
                let child_quant = self.infos[ci].has_quant;
                info.has_quant[flip] |= child_quant[0];
                info.has_quant[1 ^ flip] |= child_quant[1];
            }
            self.infos.push(info);
        }
    }

    fn second_pass(&mut self) {
        let toplevel: Vec<AigRef> = self.toplevel.iter().map(|&(a, _)| a).collect();
        for a in toplevel {
            let idx = self.index_of[&a.positive()];
            self.infos[idx].form_ref_cnt += 1;
            self.infos[idx].in_pol[usize::from(a.polarity())] = true;
        }

        for i in (0..self.ref_aigs.len()).rev() {
            let r = self.ref_aigs[i];

            if self.infos[i].name.is_some() {
                self.infos[i].form_ref_cnt = 1;
            }
            if self.should_introduce(i, r) {
                self.introduce_name(i, r);
            }

            let r_is_quant = self.aig.is_quantifier(r);
            let frc = self.infos[i].form_ref_cnt;
            let in_pol = self.infos[i].in_pol;
            let in_quant = self.infos[i].in_quant;
            for child in self.aig.children(r) {
                let flip = usize::from(!child.polarity());
                let ci = self.index_of[&child.positive()];
                let child_info = &mut self.infos[ci];
                if r_is_quant {
                    child_info.in_quant[usize::from(child.polarity())] = true;
                }
                child_info.in_quant[flip] |= in_quant[0];
                child_info.in_quant[1 ^ flip] |= in_quant[1];
                child_info.in_pol[flip] |= in_pol[0];
                child_info.in_pol[1 ^ flip] |= in_pol[1];
                child_info.form_ref_cnt += frc;
            }
        }
    }

    fn should_introduce(&self, idx: usize, r: AigRef) -> bool {
        if self.aig.is_prop_const(r) || self.aig.is_atom(r) {
            return false;
        }
        if self.threshold == 0 || self.infos[idx].form_ref_cnt < self.threshold {
            return false;
        }
        !self.defs.contains_key(&r)
    }

    /// Fresh predicate over the node's free variables in canonical order
    fn name_literal(&mut self, r: AigRef) -> Literal {
        let vars = self.aig.free_vars(r);
        let pred = self.sig.add_fresh_predicate(vars.len() as u32, "sP");
        Literal::new(pred, vars.into_iter().map(Term::Var).collect(), true)
    }

    fn introduce_name(&mut self, idx: usize, r: AigRef) {
        debug_assert!(self.infos[idx].name.is_none());
        self.infos[idx].form_ref_cnt = 1;

        let name_lit = self.name_literal(r);
        let name_ref = self.aig.atom(&name_lit);
        self.infos[idx].name = Some(name_ref);
        self.defs.insert(r, name_ref);

        let lhs = Formula::Literal(name_lit);
        let rhs = aig_to_formula(self.aig, r);
        let equiv = Formula::Iff(Box::new(lhs), Box::new(rhs));
        let vars = equiv.free_vars();
        let def = FormulaUnit {
            formula: Formula::forall(vars, equiv),
            inference: Inference::PredicateDefinition,
        };
        debug!(unit = %def.formula, "introduced definition");
        self.new_defs.push(def);
    }

    fn apply_to(&mut self, unit: &FormulaUnit) -> UnitChange {
        let mut a = formula_to_aig(self.aig, &unit.formula);
        let negated = !a.polarity();
        if negated {
            a = a.neg();
        }
        let Some(&target) = self.defs.get(&a) else {
            return UnitChange::Unchanged;
        };
        if target == a {
            // cyclic definitions can saturate to the identity
            return UnitChange::Unchanged;
        }
        let result = if negated { target.neg() } else { target };
        let formula = aig_to_formula(self.aig, result);
        if matches!(formula, Formula::True) {
            return UnitChange::Deleted;
        }
        UnitChange::Replaced(FormulaUnit {
            formula,
            inference: Inference::DefinitionFolding,
        })
    }

    /// Fold a scanned unit whose top-level AIG has a name
    pub fn apply_unit(&mut self, index: usize) -> UnitChange {
        let unit = self.units[index].clone();
        self.apply_to(&unit)
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

    /// The definitions introduced by the pass, themselves folded where
    /// applicable
    pub fn introduced_formulas(&mut self) -> Vec<FormulaUnit> {
        let defs = self.new_defs.clone();
        defs.into_iter()
            .map(|def| match self.apply_to(&def) {
                UnitChange::Replaced(u) => u,
                _ => def,
            })
            .collect()
    }

    /// Number of names minted
    pub fn introduced_count(&self) -> usize {
        self.new_defs.len()
    }

    /// The name for a node, if one is registered
    pub fn name_of(&self, r: AigRef) -> Option<AigRef> {
        self.defs.get(&r.positive()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talon_core::PredSym;

    fn atom_f(p: PredSym, vars: &[u32]) -> Formula {
        Formula::Literal(Literal::new(
            p,
            vars.iter().map(|&v| Term::Var(v)).collect(),
            true,
        ))
    }

    /// Four units each containing q(c) & r(c) plus a distinguishing atom,
    /// and a fifth unit that is exactly q(c) & r(c)
    fn shared_conjunction_units(sig: &mut Signature) -> (Vec<FormulaUnit>, Formula) {
        let q = sig.add_predicate("q", 1);
        let r = sig.add_predicate("r", 1);
        let c = sig.add_function("c", 0);
        let qc = Formula::Literal(Literal::new(q, vec![Term::constant(c)], true));
        let rc = Formula::Literal(Literal::new(r, vec![Term::constant(c)], true));
        let shared = Formula::And(vec![qc, rc]);

        let mut units = Vec::new();
        for i in 0..4 {
            let t = sig.add_predicate(&format!("t{i}"), 0);
            units.push(FormulaUnit::input(Formula::Or(vec![
                atom_f(t, &[]),
                shared.clone(),
            ])));
        }
        units.push(FormulaUnit::input(shared.clone()));
        (units, shared)
    }

    #[test]
    fn frequent_subformula_gets_exactly_one_name() {
        let mut aig = Aig::new();
        let mut sig = Signature::new();
        let (units, shared) = shared_conjunction_units(&mut sig);

        let mut intro = AigDefinitionIntroducer::new(&mut aig, &mut sig);
        intro.scan(&units);
        assert_eq!(intro.introduced_count(), 1);

        let shared_ref = formula_to_aig(intro.aig, &shared);
        let name = intro.name_of(shared_ref).expect("shared node is named");
        assert!(intro.aig.is_atom(name));
        // the minted predicate is introduced and nullary (the body is
        // ground)
        let lit = intro.aig.atom_literal(name).unwrap();
        assert!(intro.sig.predicate_introduced(lit.pred()));
        assert_eq!(lit.arity(), 0);

        // the emitted definition is name <=> body
        let defs = intro.introduced_formulas();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].inference, Inference::PredicateDefinition);
        assert!(matches!(defs[0].formula, Formula::Iff(..)));
    }

    #[test]
    fn unit_equal_to_named_node_is_folded() {
        let mut aig = Aig::new();
        let mut sig = Signature::new();
        let (units, _) = shared_conjunction_units(&mut sig);

        let mut intro = AigDefinitionIntroducer::new(&mut aig, &mut sig);
        intro.scan(&units);

        // the fifth unit is exactly the named conjunction
        match intro.apply_unit(4) {
            UnitChange::Replaced(unit) => {
                assert_eq!(unit.inference, Inference::DefinitionFolding);
                assert!(matches!(unit.formula, Formula::Literal(_)));
            }
            other => panic!("expected folding, got {other:?}"),
        }
        // units whose top level is not the named node stay as they are
        assert_eq!(intro.apply_unit(0), UnitChange::Unchanged);
    }

    #[test]
    fn below_threshold_is_not_named() {
        let mut aig = Aig::new();
        let mut sig = Signature::new();
        let q = sig.add_predicate("q", 0);
        let r = sig.add_predicate("r", 0);
        let shared = Formula::And(vec![atom_f(q, &[]), atom_f(r, &[])]);

        let mut units = Vec::new();
        for i in 0..3 {
            let t = sig.add_predicate(&format!("t{i}"), 0);
            units.push(FormulaUnit::input(Formula::Or(vec![
                atom_f(t, &[]),
                shared.clone(),
            ])));
        }
        let mut intro = AigDefinitionIntroducer::new(&mut aig, &mut sig);
        intro.scan(&units);
        assert_eq!(intro.introduced_count(), 0);
    }

    #[test]
    fn atoms_and_constants_are_never_named() {
        let mut aig = Aig::new();
        let mut sig = Signature::new();
        let q = sig.add_predicate("q", 0);
        // the same atom occurs in many units
        let units: Vec<FormulaUnit> = (0..6)
            .map(|_| FormulaUnit::input(atom_f(q, &[])))
            .collect();
        let mut intro = AigDefinitionIntroducer::new(&mut aig, &mut sig);
        intro.scan(&units);
        assert_eq!(intro.introduced_count(), 0);
    }

    #[test]
    fn named_node_with_free_vars_quantifies_definition() {
        let mut aig = Aig::new();
        let mut sig = Signature::new();
        let q = sig.add_predicate("q", 1);
        let r = sig.add_predicate("r", 1);
        let shared = Formula::And(vec![atom_f(q, &[0]), atom_f(r, &[0])]);

        let mut units = Vec::new();
        for i in 0..4 {
            let t = sig.add_predicate(&format!("t{i}"), 1);
            units.push(FormulaUnit::input(Formula::Forall(
                vec![0],
                Box::new(Formula::Or(vec![atom_f(t, &[0]), shared.clone()])),
            )));
        }
        let mut intro = AigDefinitionIntroducer::new(&mut aig, &mut sig);
        intro.scan(&units);
        assert_eq!(intro.introduced_count(), 1);

        let defs = intro.introduced_formulas();
        match &defs[0].formula {
            Formula::Forall(vars, body) => {
                assert_eq!(vars.as_slice(), &[0]);
                assert!(matches!(**body, Formula::Iff(..)));
            }
            other => panic!("expected quantified definition, got {other}"),
        }
        // the minted predicate carries the free variable as argument
        let shared_ref = formula_to_aig(intro.aig, &shared);
        let name = intro.name_of(shared_ref).unwrap();
        let lit = intro.aig.atom_literal(name).unwrap();
        assert_eq!(lit.arity(), 1);
    }

    #[test]
    fn existing_definitions_are_respected() {
        // a unit with definition shape seeds the name map, so its body is
        // not named again even above threshold
        let mut aig = Aig::new();
        let mut sig = Signature::new();
        let q = sig.add_predicate("q", 0);
        let r = sig.add_predicate("r", 0);
        let d = sig.add_predicate("d", 0);
        let shared = Formula::And(vec![atom_f(q, &[]), atom_f(r, &[])]);

        let mut units = vec![FormulaUnit::input(Formula::Iff(
            Box::new(atom_f(d, &[])),
            Box::new(shared.clone()),
        ))];
        for i in 0..4 {
            let t = sig.add_predicate(&format!("t{i}"), 0);
            units.push(FormulaUnit::input(Formula::Or(vec![
                atom_f(t, &[]),
                shared.clone(),
            ])));
        }

        let mut intro = AigDefinitionIntroducer::new(&mut aig, &mut sig);
        intro.scan(&units);
        assert_eq!(intro.introduced_count(), 0);

        let shared_ref = formula_to_aig(intro.aig, &shared);
        let name = intro.name_of(shared_ref).unwrap();
        let lit = intro.aig.atom_literal(name).unwrap();
        assert_eq!(intro.sig.predicate_name(lit.pred()), "d");
    }
}
