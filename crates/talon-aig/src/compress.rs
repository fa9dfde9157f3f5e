//! Compressing normaliser
//!
//! Rebuilds a subgraph bottom-up through the arena constructors, so that
//! every local simplification (constant propagation, duplicate and
//! complementary conjuncts, vacuous quantifiers) is applied at every
//! level. The result is a normal form: compressing twice equals
//! compressing once.

use crate::aig::{Aig, AigNode, AigRef};
use crate::transform::RefMap;

/// Normaliser with a per-instance result cache
#[derive(Debug, Default)]
pub struct AigCompressor {
    cache: RefMap,
}

impl AigCompressor {
    /// Create a compressor
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalise the subgraph below `r`
    pub fn compress(&mut self, aig: &mut Aig, r: AigRef) -> AigRef {
        let pos = r.positive();
        let res = if let Some(&cached) = self.cache.get(&pos) {
            cached
        } else {
            let rebuilt = match aig.node(pos).clone() {
                AigNode::True | AigNode::Atom(_) => pos,
                AigNode::Conj(a, b) => {
                    let ca = self.compress(aig, a);
                    let cb = self.compress(aig, b);
                    aig.conj(ca, cb)
                }
                AigNode::Quant { vars, body } => {
                    let cb = self.compress(aig, body);
                    aig.exists(vars, cb)
                }
            };
            self.cache.insert(pos, rebuilt);
            rebuilt
        };
        if r.polarity() {
            res
        } else {
            res.neg()
        }
    }

    /// Record, for every node of the traversal order, its compressed form
    /// where it differs
    pub fn populate_compressing_map(
        &mut self,
        aig: &mut Aig,
        nodes: &[AigRef],
        map: &mut RefMap,
    ) {
        for &r in nodes {
            let pos = r.positive();
            let c = self.compress(aig, pos);
            if c != pos {
                map.insert(pos, c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talon_core::{Literal, PredSym, Term};

    fn atom(aig: &mut Aig, p: u32) -> AigRef {
        aig.atom(&Literal::new(PredSym(p), Vec::<Term>::new(), true))
    }

    #[test]
    fn compress_is_idempotent() {
        let mut aig = Aig::new();
        let a = atom(&mut aig, 1);
        let b = atom(&mut aig, 2);
        let c = aig.conj(a, b);
        let d = aig.conj(c, a.neg());

        let mut compressor = AigCompressor::new();
        let once = compressor.compress(&mut aig, d);
        let twice = compressor.compress(&mut aig, once);
        assert_eq!(once, twice);
    }

    #[test]
    fn compress_preserves_normal_forms() {
        let mut aig = Aig::new();
        let a = atom(&mut aig, 1);
        let b = atom(&mut aig, 2);
        let c = aig.conj(a, b);
        let mut compressor = AigCompressor::new();
        assert_eq!(compressor.compress(&mut aig, c), c);
        assert_eq!(compressor.compress(&mut aig, c.neg()), c.neg());
    }

    #[test]
    fn populate_map_records_only_changes() {
        let mut aig = Aig::new();
        let a = atom(&mut aig, 1);
        let b = atom(&mut aig, 2);
        let c = aig.conj(a, b);
        let nodes = aig.ordered_nodes(&[c]);
        let mut compressor = AigCompressor::new();
        let mut map = RefMap::default();
        compressor.populate_compressing_map(&mut aig, &nodes, &mut map);
        assert!(map.is_empty());
    }
}
