//! Substitutions, matching and unification

use crate::term::{Literal, Term, Var};
use rustc_hash::FxHashMap;

/// A finite mapping from variables to terms
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    binding: FxHashMap<Var, Term>,
}

impl Substitution {
    /// Create an empty substitution
    pub fn new() -> Self {
        Substitution::default()
    }

    /// Look up a variable binding
    #[inline]
    pub fn get(&self, v: Var) -> Option<&Term> {
        self.binding.get(&v)
    }

    /// Bind a variable to a term
    #[inline]
    pub fn bind(&mut self, v: Var, t: Term) {
        self.binding.insert(v, t);
    }

    /// Apply the substitution to a term
    pub fn apply_term(&self, t: &Term) -> Term {
        match t {
            Term::Var(v) => match self.binding.get(v) {
                Some(bound) => bound.clone(),
                None => t.clone(),
            },
            Term::App(f, args) => {
                Term::App(*f, args.iter().map(|a| self.apply_term(a)).collect())
            }
        }
    }

    /// Iterate over the bindings
    pub fn iter(&self) -> impl Iterator<Item = (Var, &Term)> {
        self.binding.iter().map(|(&v, t)| (v, t))
    }

    /// The substitution with bindings for the given variables removed
    pub fn without(&self, vars: &[Var]) -> Substitution {
        Substitution {
            binding: self
                .binding
                .iter()
                .filter(|(v, _)| !vars.contains(v))
                .map(|(&v, t)| (v, t.clone()))
                .collect(),
        }
    }

    /// Apply the substitution to a literal
    pub fn apply_literal(&self, lit: &Literal) -> Literal {
        Literal::new(
            lit.pred(),
            lit.args().iter().map(|a| self.apply_term(a)).collect(),
            lit.is_positive(),
        )
    }
}

/// Match `general` against `instance`, extending `subst`
///
/// One-sided: only variables of `general` are bound. Returns false (leaving
/// `subst` partially extended) if the terms do not match.
fn match_terms(general: &Term, instance: &Term, subst: &mut Substitution) -> bool {
    match (general, instance) {
        (Term::Var(v), _) => match subst.get(*v) {
            Some(bound) => bound == instance,
            None => {
                subst.bind(*v, instance.clone());
                true
            }
        },
        (Term::App(f, fargs), Term::App(g, gargs)) => {
            f == g
                && fargs.len() == gargs.len()
                && fargs
                    .iter()
                    .zip(gargs)
                    .all(|(a, b)| match_terms(a, b, subst))
        }
        (Term::App(..), Term::Var(_)) => false,
    }
}

/// Match the atom `general` against the atom `instance`
///
/// Both literals must share predicate and polarity. On success the returned
/// substitution maps `general`'s variables so that
/// `subst.apply_literal(general) == instance`.
pub fn match_literals(general: &Literal, instance: &Literal) -> Option<Substitution> {
    if general.pred() != instance.pred()
        || general.is_positive() != instance.is_positive()
        || general.arity() != instance.arity()
    {
        return None;
    }
    let mut subst = Substitution::new();
    for (g, i) in general.args().iter().zip(instance.args()) {
        if !match_terms(g, i, &mut subst) {
            return None;
        }
    }
    Some(subst)
}

fn occurs(v: Var, t: &Term, subst: &Substitution) -> bool {
    match t {
        Term::Var(u) => {
            *u == v
                || match subst.get(*u) {
                    Some(bound) => occurs(v, bound, subst),
                    None => false,
                }
        }
        Term::App(_, args) => args.iter().any(|a| occurs(v, a, subst)),
    }
}

fn walk<'a>(t: &'a Term, subst: &'a Substitution) -> &'a Term {
    let mut cur = t;
    while let Term::Var(v) = cur {
        match subst.get(*v) {
            Some(bound) => cur = bound,
            None => break,
        }
    }
    cur
}

fn unify_terms(s: &Term, t: &Term, subst: &mut Substitution) -> bool {
    let s = walk(s, subst).clone();
    let t = walk(t, subst).clone();
    match (s, t) {
        (Term::Var(v), Term::Var(u)) if v == u => true,
        (Term::Var(v), other) | (other, Term::Var(v)) => {
            if occurs(v, &other, subst) {
                return false;
            }
            subst.bind(v, other);
            true
        }
        (Term::App(f, fargs), Term::App(g, gargs)) => {
            f == g
                && fargs.len() == gargs.len()
                && fargs
                    .iter()
                    .zip(&gargs)
                    .all(|(a, b)| unify_terms(a, b, subst))
        }
    }
}

/// Check whether two atoms are unifiable (shared variable space)
///
/// Used to reject a definition head that overlaps an already-stored one.
pub fn unify_literals(a: &Literal, b: &Literal) -> bool {
    if a.pred() != b.pred() || a.arity() != b.arity() {
        return false;
    }
    let mut subst = Substitution::new();
    a.args()
        .iter()
        .zip(b.args())
        .all(|(s, t)| unify_terms(s, t, &mut subst))
}
