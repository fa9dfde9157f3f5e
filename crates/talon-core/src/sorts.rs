//! Sort-bound inference
//!
//! A one-shot pass over the flattened clause set that over-approximates, for
//! every argument position of every symbol, how many distinct domain
//! elements that position can require. Argument positions are partitioned
//! into sorts by a union-find: a clause variable occurring in two positions
//! merges them, and the result position of a function merges with whatever
//! its value is compared against.
//!
//! A sort whose members are produced only by constants is bounded by the
//! number of those constants; any sort fed by a function of arity at least
//! one is unbounded. The finite model builder clamps every bound with the
//! current candidate size, so [`UNBOUNDED`] simply means "the whole domain".

use crate::clause::Clause;
use crate::signature::Signature;
use crate::term::{Term, Var};
use rustc_hash::FxHashMap;

/// Bound value meaning "no restriction beyond the domain size"
pub const UNBOUNDED: u32 = u32::MAX;

/// Per-symbol sort bounds, read-only once inferred
///
/// `function_bounds[f]` is `[result, arg0, arg1, ...]`;
/// `predicate_bounds[p]` lists argument bounds only. Every bound is at
/// least one.
#[derive(Debug, Clone)]
pub struct SortedSignature {
    /// Result and argument bounds per function symbol
    pub function_bounds: Vec<Vec<u32>>,
    /// Argument bounds per predicate symbol (index 0, equality, is unused)
    pub predicate_bounds: Vec<Vec<u32>>,
}

struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new() -> Self {
        UnionFind { parent: Vec::new() }
    }

    fn add(&mut self) -> u32 {
        let id = self.parent.len() as u32;
        self.parent.push(id);
        id
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut cur = x;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra as usize] = rb;
        }
    }
}

impl SortedSignature {
    /// Infer sort bounds from a flattened clause set
    pub fn infer<'a>(
        sig: &Signature,
        clauses: impl IntoIterator<Item = &'a Clause>,
    ) -> SortedSignature {
        let mut uf = UnionFind::new();

        // one node per argument/result position, laid out symbol by symbol
        let mut fn_pos: Vec<Vec<u32>> = Vec::new(); // [result, args...]
        for f in sig.function_syms() {
            let arity = sig.function_arity(f);
            fn_pos.push((0..=arity).map(|_| uf.add()).collect());
        }
        let mut pred_pos: Vec<Vec<u32>> = vec![Vec::new()]; // equality has none
        for p in sig.predicate_syms() {
            let arity = sig.predicate_arity(p);
            pred_pos.push((0..arity).map(|_| uf.add()).collect());
        }

        for clause in clauses {
            let mut var_node: FxHashMap<Var, u32> = FxHashMap::default();
            let mut node_of = |uf: &mut UnionFind, v: Var| {
                *var_node.entry(v).or_insert_with(|| uf.add())
            };
            for lit in clause.literals() {
                if lit.is_equality() {
                    match (&lit.args()[0], &lit.args()[1]) {
                        (Term::Var(x), Term::Var(y)) => {
                            let nx = node_of(&mut uf, *x);
                            let ny = node_of(&mut uf, *y);
                            uf.union(nx, ny);
                        }
                        (Term::App(f, fargs), Term::Var(y)) => {
                            let ny = node_of(&mut uf, *y);
                            uf.union(ny, fn_pos[f.0 as usize][0]);
                            for (i, a) in fargs.iter().enumerate() {
                                if let Term::Var(v) = a {
                                    let nv = node_of(&mut uf, *v);
                                    uf.union(nv, fn_pos[f.0 as usize][i + 1]);
                                }
                            }
                        }
                        _ => {}
                    }
                } else {
                    for (i, a) in lit.args().iter().enumerate() {
                        if let Term::Var(v) = a {
                            let nv = node_of(&mut uf, *v);
                            uf.union(nv, pred_pos[lit.pred().0 as usize][i]);
                        }
                    }
                }
            }
        }

        // per sort class: constant count, and whether a proper function
        // produces it
        let mut constants: FxHashMap<u32, u32> = FxHashMap::default();
        let mut has_proper_fn: FxHashMap<u32, bool> = FxHashMap::default();
        for f in sig.function_syms() {
            let root = uf.find(fn_pos[f.0 as usize][0]);
            if sig.function_arity(f) == 0 {
                *constants.entry(root).or_insert(0) += 1;
            } else {
                has_proper_fn.insert(root, true);
            }
        }

        let mut bound_of = |uf: &mut UnionFind, node: u32| -> u32 {
            let root = uf.find(node);
            if has_proper_fn.get(&root).copied().unwrap_or(false) {
                UNBOUNDED
            } else {
                match constants.get(&root) {
                    Some(&k) => k.max(1),
                    None => UNBOUNDED,
                }
            }
        };

        let function_bounds = sig
            .function_syms()
            .map(|f| {
                fn_pos[f.0 as usize]
                    .iter()
                    .map(|&n| bound_of(&mut uf, n))
                    .collect()
            })
            .collect();
        let predicate_bounds = (0..sig.predicate_count())
            .map(|p| {
                pred_pos[p as usize]
                    .iter()
                    .map(|&n| bound_of(&mut uf, n))
                    .collect()
            })
            .collect();

        SortedSignature {
            function_bounds,
            predicate_bounds,
        }
    }

    /// The smallest bound in a function's row
    pub fn function_min_bound(&self, f: u32) -> u32 {
        self.function_bounds[f as usize]
            .iter()
            .copied()
            .min()
            .unwrap_or(UNBOUNDED)
    }
}
