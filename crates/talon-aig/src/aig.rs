//! The AIG arena
//!
//! Nodes live in an arena and references are 32-bit indices with the
//! polarity bit stored in the lowest bit, so negation is a single XOR and
//! costs nothing. Hash-consing on the node structure guarantees that
//! structurally equal subgraphs share one node, which makes equality on
//! references decide structural equality.
//!
//! Node kinds: the propositional constant (true; false is its negation),
//! atoms (always the positive literal), binary conjunctions, and
//! existential quantifiers (a universal quantifier is a negated
//! existential over the negated body).

use hashbrown::HashMap;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use talon_core::{Literal, Var};

/// A polarity-tagged reference to an AIG node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AigRef(u32);

impl AigRef {
    fn new(index: u32, positive: bool) -> Self {
        AigRef((index << 1) | u32::from(!positive))
    }

    /// The polarity: true when the reference is not negated
    #[inline]
    pub fn polarity(self) -> bool {
        (self.0 & 1) == 0
    }

    /// The negated reference
    #[inline]
    pub fn neg(self) -> Self {
        AigRef(self.0 ^ 1)
    }

    /// The reference with positive polarity
    #[inline]
    pub fn positive(self) -> Self {
        AigRef(self.0 & !1)
    }

    /// Arena index of the referenced node
    #[inline]
    pub fn index(self) -> usize {
        (self.0 >> 1) as usize
    }
}

/// An AIG node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AigNode {
    /// The propositional constant true
    True,
    /// An atom; the literal is always positive
    Atom(Literal),
    /// Conjunction of two polarity-tagged children
    Conj(AigRef, AigRef),
    /// Existential quantification of a polarity-tagged body
    Quant {
        /// The quantified variables, sorted
        vars: Vec<Var>,
        /// The body reference
        body: AigRef,
    },
}

/// The hash-consing arena
#[derive(Debug, Clone)]
pub struct Aig {
    nodes: Vec<AigNode>,
    ids: HashMap<AigNode, u32>,
}

impl Default for Aig {
    fn default() -> Self {
        Self::new()
    }
}

impl Aig {
    /// Create an arena containing the true constant
    pub fn new() -> Self {
        let mut aig = Aig {
            nodes: Vec::new(),
            ids: HashMap::new(),
        };
        aig.intern(AigNode::True);
        aig
    }

    fn intern(&mut self, node: AigNode) -> AigRef {
        if let Some(&idx) = self.ids.get(&node) {
            return AigRef::new(idx, true);
        }
        let idx = self.nodes.len() as u32;
        self.nodes.push(node.clone());
        self.ids.insert(node, idx);
        AigRef::new(idx, true)
    }

    /// The true constant
    #[inline]
    pub fn tru(&self) -> AigRef {
        AigRef::new(0, true)
    }

    /// The false constant
    #[inline]
    pub fn fls(&self) -> AigRef {
        self.tru().neg()
    }

    /// The atom node for a literal; a negative literal yields a negated
    /// reference to the positive atom
    pub fn atom(&mut self, lit: &Literal) -> AigRef {
        let r = self.intern(AigNode::Atom(lit.positive_form()));
        if lit.is_positive() {
            r
        } else {
            r.neg()
        }
    }

    /// Conjunction with local simplification
    pub fn conj(&mut self, a: AigRef, b: AigRef) -> AigRef {
        if a == self.tru() {
            return b;
        }
        if b == self.tru() {
            return a;
        }
        if a == self.fls() || b == self.fls() {
            return self.fls();
        }
        if a == b {
            return a;
        }
        if a == b.neg() {
            return self.fls();
        }
        let (x, y) = if a <= b { (a, b) } else { (b, a) };
        self.intern(AigNode::Conj(x, y))
    }

    /// Disjunction, via De Morgan
    pub fn disj(&mut self, a: AigRef, b: AigRef) -> AigRef {
        self.conj(a.neg(), b.neg()).neg()
    }

    /// Conjunction of many references
    pub fn conj_all(&mut self, refs: impl IntoIterator<Item = AigRef>) -> AigRef {
        let mut acc = self.tru();
        for r in refs {
            acc = self.conj(acc, r);
        }
        acc
    }

    /// Disjunction of many references
    pub fn disj_all(&mut self, refs: impl IntoIterator<Item = AigRef>) -> AigRef {
        let mut acc = self.fls();
        for r in refs {
            acc = self.disj(acc, r);
        }
        acc
    }

    /// Existential quantification; variables not free in the body are
    /// dropped, and quantifying nothing is the identity
    pub fn exists(&mut self, vars: Vec<Var>, body: AigRef) -> AigRef {
        if body.index() == 0 {
            return body;
        }
        let free = self.free_vars(body);
        let mut vars: Vec<Var> = vars.into_iter().filter(|v| free.contains(v)).collect();
        vars.sort_unstable();
        vars.dedup();
        if vars.is_empty() {
            return body;
        }
        self.intern(AigNode::Quant { vars, body })
    }

    /// Universal quantification: a negated existential over the negated
    /// body
    pub fn forall(&mut self, vars: Vec<Var>, body: AigRef) -> AigRef {
        self.exists(vars, body.neg()).neg()
    }

    /// The node a reference points at (polarity ignored)
    #[inline]
    pub fn node(&self, r: AigRef) -> &AigNode {
        &self.nodes[r.index()]
    }

    /// Number of interned nodes
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Is this the propositional constant?
    #[inline]
    pub fn is_prop_const(&self, r: AigRef) -> bool {
        r.index() == 0
    }

    /// Is the referenced node an atom?
    #[inline]
    pub fn is_atom(&self, r: AigRef) -> bool {
        matches!(self.node(r), AigNode::Atom(_))
    }

    /// Is the referenced node a quantifier?
    #[inline]
    pub fn is_quantifier(&self, r: AigRef) -> bool {
        matches!(self.node(r), AigNode::Quant { .. })
    }

    /// The positive literal of an atom node
    pub fn atom_literal(&self, r: AigRef) -> Option<&Literal> {
        match self.node(r) {
            AigNode::Atom(lit) => Some(lit),
            _ => None,
        }
    }

    /// The polarity-tagged children of the referenced node
    pub fn children(&self, r: AigRef) -> Vec<AigRef> {
        match self.node(r) {
            AigNode::True | AigNode::Atom(_) => Vec::new(),
            AigNode::Conj(a, b) => vec![*a, *b],
            AigNode::Quant { body, .. } => vec![*body],
        }
    }

    /// The free variables of the referenced node, sorted
    pub fn free_vars(&self, r: AigRef) -> Vec<Var> {
        let mut memo: FxHashMap<usize, Vec<Var>> = FxHashMap::default();
        self.free_vars_memo(r, &mut memo)
    }

    fn free_vars_memo(&self, r: AigRef, memo: &mut FxHashMap<usize, Vec<Var>>) -> Vec<Var> {
        if let Some(cached) = memo.get(&r.index()) {
            return cached.clone();
        }
        let mut out = match self.node(r) {
            AigNode::True => Vec::new(),
            AigNode::Atom(lit) => {
                let mut vars = Vec::new();
                lit.collect_vars(&mut vars);
                vars
            }
            AigNode::Conj(a, b) => {
                let (a, b) = (*a, *b);
                let mut vars = self.free_vars_memo(a, memo);
                vars.extend(self.free_vars_memo(b, memo));
                vars
            }
            AigNode::Quant { vars, body } => {
                let bound = vars.clone();
                let body = *body;
                self.free_vars_memo(body, memo)
                    .into_iter()
                    .filter(|v| !bound.contains(v))
                    .collect()
            }
        };
        out.sort_unstable();
        out.dedup();
        memo.insert(r.index(), out.clone());
        out
    }

    /// All nodes reachable from the roots as positive references, children
    /// before parents
    pub fn ordered_nodes(&self, roots: &[AigRef]) -> Vec<AigRef> {
        let mut traversal = InsideOutTraversal::default();
        for &r in roots {
            traversal.add(r);
        }
        let mut out = Vec::new();
        while let Some(n) = traversal.next_node(self) {
            out.push(n);
        }
        out
    }
}

/// Children-before-parents traversal over the shared DAG
///
/// Roots can be added while the iteration is running; nodes already
/// yielded are never repeated.
#[derive(Debug, Default)]
pub struct InsideOutTraversal {
    visited: FxHashSet<usize>,
    stack: Vec<(AigRef, bool)>,
}

impl InsideOutTraversal {
    /// Create an empty traversal
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root to visit (the polarity is ignored)
    pub fn add(&mut self, r: AigRef) {
        let pos = r.positive();
        if !self.visited.contains(&pos.index()) {
            self.stack.push((pos, false));
        }
    }

    /// The next unvisited node, as a positive reference, all its children
    /// having been yielded before it
    pub fn next_node(&mut self, aig: &Aig) -> Option<AigRef> {
        while let Some((r, expanded)) = self.stack.pop() {
            if self.visited.contains(&r.index()) {
                continue;
            }
            if expanded {
                self.visited.insert(r.index());
                return Some(r);
            }
            self.stack.push((r, true));
            for child in aig.children(r) {
                let pos = child.positive();
                if !self.visited.contains(&pos.index()) {
                    self.stack.push((pos, false));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talon_core::{PredSym, Term};

    fn atom_lit(p: u32, vars: &[Var]) -> Literal {
        Literal::new(
            PredSym(p),
            vars.iter().map(|&v| Term::Var(v)).collect(),
            true,
        )
    }

    #[test]
    fn negation_is_involutive_and_free() {
        let mut aig = Aig::new();
        let a = aig.atom(&atom_lit(1, &[0]));
        assert_eq!(a.neg().neg(), a);
        assert!(a.polarity());
        assert!(!a.neg().polarity());
        assert_eq!(a.neg().index(), a.index());
    }

    #[test]
    fn hash_consing_shares_nodes() {
        let mut aig = Aig::new();
        let a = aig.atom(&atom_lit(1, &[0]));
        let b = aig.atom(&atom_lit(2, &[0]));
        let c1 = aig.conj(a, b);
        let c2 = aig.conj(b, a);
        assert_eq!(c1, c2);
        let count = aig.node_count();
        let _ = aig.conj(a, b);
        assert_eq!(aig.node_count(), count);
    }

    #[test]
    fn negative_atom_is_negated_positive_node() {
        let mut aig = Aig::new();
        let pos = aig.atom(&atom_lit(1, &[0]));
        let neg = aig.atom(&atom_lit(1, &[0]).complementary());
        assert_eq!(neg, pos.neg());
    }

    #[test]
    fn conj_simplifications() {
        let mut aig = Aig::new();
        let a = aig.atom(&atom_lit(1, &[0]));
        let t = aig.tru();
        let f = aig.fls();
        assert_eq!(aig.conj(a, t), a);
        assert_eq!(aig.conj(t, a), a);
        assert_eq!(aig.conj(a, f), f);
        assert_eq!(aig.conj(a, a), a);
        assert_eq!(aig.conj(a, a.neg()), f);
    }

    #[test]
    fn quantifier_drops_unused_vars() {
        let mut aig = Aig::new();
        let a = aig.atom(&atom_lit(1, &[0]));
        let q = aig.exists(vec![0, 7], a);
        match aig.node(q) {
            AigNode::Quant { vars, .. } => assert_eq!(vars, &[0]),
            other => panic!("expected quantifier, got {other:?}"),
        }
        assert_eq!(aig.exists(vec![7], a), a);
    }

    #[test]
    fn free_vars_subtract_bound() {
        let mut aig = Aig::new();
        let a = aig.atom(&atom_lit(1, &[0, 1]));
        let q = aig.exists(vec![0], a);
        assert_eq!(aig.free_vars(q), vec![1]);
        assert_eq!(aig.free_vars(a), vec![0, 1]);
    }

    #[test]
    fn ordered_nodes_children_first() {
        let mut aig = Aig::new();
        let a = aig.atom(&atom_lit(1, &[]));
        let b = aig.atom(&atom_lit(2, &[]));
        let c = aig.conj(a, b);
        let d = aig.conj(c, a.neg());
        let order = aig.ordered_nodes(&[d]);
        let pos = |r: AigRef| order.iter().position(|&x| x == r.positive()).unwrap();
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(c));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn traversal_accepts_roots_mid_iteration() {
        let mut aig = Aig::new();
        let a = aig.atom(&atom_lit(1, &[]));
        let b = aig.atom(&atom_lit(2, &[]));
        let c = aig.conj(a, b);
        let mut t = InsideOutTraversal::new();
        t.add(a);
        let first = t.next_node(&aig).unwrap();
        assert_eq!(first, a);
        t.add(c);
        let mut rest = Vec::new();
        while let Some(n) = t.next_node(&aig) {
            rest.push(n);
        }
        assert!(rest.contains(&b.positive()));
        assert!(rest.contains(&c.positive()));
        assert!(!rest.contains(&a.positive()));
    }
}
