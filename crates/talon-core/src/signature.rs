//! Symbol signature
//!
//! The signature assigns identifiers to function and predicate symbols and
//! records their arities. Predicate 0 is reserved for equality and marked
//! protected; protected predicates never become definition heads.

use crate::term::{FnSym, PredSym};
use rustc_hash::FxHashMap;

/// Per-symbol bookkeeping
#[derive(Debug, Clone)]
struct SymbolInfo {
    name: String,
    arity: u32,
    /// Introduced during preprocessing (fresh names); skipped in model output
    introduced: bool,
    /// Must not be rewritten away (equality, interpreted symbols)
    protected: bool,
}

/// The symbol table shared by all components
#[derive(Debug, Clone)]
pub struct Signature {
    functions: Vec<SymbolInfo>,
    predicates: Vec<SymbolInfo>,
    function_ids: FxHashMap<(String, u32), FnSym>,
    predicate_ids: FxHashMap<(String, u32), PredSym>,
    fresh_counter: u32,
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

impl Signature {
    /// Create a signature with the reserved equality predicate installed
    pub fn new() -> Self {
        let mut sig = Signature {
            functions: Vec::new(),
            predicates: Vec::new(),
            function_ids: FxHashMap::default(),
            predicate_ids: FxHashMap::default(),
            fresh_counter: 0,
        };
        sig.predicates.push(SymbolInfo {
            name: "=".to_owned(),
            arity: 2,
            introduced: false,
            protected: true,
        });
        sig
    }

    /// Add (or look up) a function symbol
    pub fn add_function(&mut self, name: &str, arity: u32) -> FnSym {
        if let Some(&f) = self.function_ids.get(&(name.to_owned(), arity)) {
            return f;
        }
        let f = FnSym(self.functions.len() as u32);
        self.functions.push(SymbolInfo {
            name: name.to_owned(),
            arity,
            introduced: false,
            protected: false,
        });
        self.function_ids.insert((name.to_owned(), arity), f);
        f
    }

    /// Add (or look up) a predicate symbol
    pub fn add_predicate(&mut self, name: &str, arity: u32) -> PredSym {
        if let Some(&p) = self.predicate_ids.get(&(name.to_owned(), arity)) {
            return p;
        }
        let p = PredSym(self.predicates.len() as u32);
        self.predicates.push(SymbolInfo {
            name: name.to_owned(),
            arity,
            introduced: false,
            protected: false,
        });
        self.predicate_ids.insert((name.to_owned(), arity), p);
        p
    }

    /// Mint a fresh predicate symbol, marked as introduced
    ///
    /// The name is `<prefix><n>` with `n` a global counter, so fresh names
    /// never clash with each other; a suffix number is bumped past any
    /// existing symbol of the same name.
    pub fn add_fresh_predicate(&mut self, arity: u32, prefix: &str) -> PredSym {
        loop {
            let name = format!("{}{}", prefix, self.fresh_counter);
            self.fresh_counter += 1;
            if self.predicate_ids.contains_key(&(name.clone(), arity)) {
                continue;
            }
            let p = PredSym(self.predicates.len() as u32);
            self.predicates.push(SymbolInfo {
                name: name.clone(),
                arity,
                introduced: true,
                protected: false,
            });
            self.predicate_ids.insert((name, arity), p);
            return p;
        }
    }

    /// Number of function symbols
    #[inline]
    pub fn function_count(&self) -> u32 {
        self.functions.len() as u32
    }

    /// Number of predicate symbols (including equality)
    #[inline]
    pub fn predicate_count(&self) -> u32 {
        self.predicates.len() as u32
    }

    /// Arity of a function symbol
    #[inline]
    pub fn function_arity(&self, f: FnSym) -> u32 {
        self.functions[f.0 as usize].arity
    }

    /// Arity of a predicate symbol
    #[inline]
    pub fn predicate_arity(&self, p: PredSym) -> u32 {
        self.predicates[p.0 as usize].arity
    }

    /// Name of a function symbol
    #[inline]
    pub fn function_name(&self, f: FnSym) -> &str {
        &self.functions[f.0 as usize].name
    }

    /// Name of a predicate symbol
    #[inline]
    pub fn predicate_name(&self, p: PredSym) -> &str {
        &self.predicates[p.0 as usize].name
    }

    /// Whether a function symbol was introduced during preprocessing
    #[inline]
    pub fn function_introduced(&self, f: FnSym) -> bool {
        self.functions[f.0 as usize].introduced
    }

    /// Whether a predicate symbol was introduced during preprocessing
    #[inline]
    pub fn predicate_introduced(&self, p: PredSym) -> bool {
        self.predicates[p.0 as usize].introduced
    }

    /// Whether a predicate symbol is protected
    #[inline]
    pub fn predicate_protected(&self, p: PredSym) -> bool {
        self.predicates[p.0 as usize].protected
    }

    /// Iterate over all function symbols
    pub fn function_syms(&self) -> impl Iterator<Item = FnSym> + '_ {
        (0..self.functions.len() as u32).map(FnSym)
    }

    /// Iterate over all predicate symbols, excluding equality
    pub fn predicate_syms(&self) -> impl Iterator<Item = PredSym> + '_ {
        (1..self.predicates.len() as u32).map(PredSym)
    }

    /// Constant symbols (nullary functions), in signature order
    pub fn constants(&self) -> Vec<FnSym> {
        self.function_syms()
            .filter(|&f| self.function_arity(f) == 0)
            .collect()
    }

    /// Non-constant function symbols, in signature order
    pub fn proper_functions(&self) -> Vec<FnSym> {
        self.function_syms()
            .filter(|&f| self.function_arity(f) > 0)
            .collect()
    }

    /// Check whether the signature is effectively propositional: no
    /// function symbol of arity at least one
    pub fn is_epr(&self) -> bool {
        self.functions.iter().all(|s| s.arity == 0)
    }
}
