//! The size-ascending search loop and SAT encoding

use crate::model::render_model;
use std::path::PathBuf;
use talon_core::{
    flatten, Clause, Flattened, FnSym, Signature, SortedSignature, Term, UNBOUNDED,
};
use talon_sat::{
    build_solver, dimacs_string, SatClause, SatLiteral, SatSolver, SolverChoice, Status,
    TransparentSolver,
};
use tracing::{debug, info, trace};

/// Options bundle for the model builder
pub struct FmbConfig {
    /// Which SAT back-end to use
    pub solver: SolverChoice,
    /// Spider mode silences progress output
    pub spider: bool,
    /// Whether to reconstruct and render the model on success
    pub proof: bool,
    /// Verdict of the completeness check: false short-circuits to UNKNOWN
    pub complete: bool,
    /// Write the SAT instance of each size in DIMACS format next to this
    /// path, suffixed with the size
    pub dimacs_path: Option<PathBuf>,
}

impl Default for FmbConfig {
    fn default() -> Self {
        FmbConfig {
            solver: SolverChoice::default(),
            spider: false,
            proof: true,
            complete: true,
            dimacs_path: None,
        }
    }
}

/// Why the builder gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownReason {
    /// The completeness predicate rejected the input
    Incomplete,
    /// The propositional variable numbering left the 32-bit range
    CannotRepresent,
    /// The configured SAT back-end is not available
    SolverUnavailable,
}

/// Result of a model building run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FmbOutcome {
    /// A finite model was found
    Satisfiable {
        /// The domain size of the model
        size: u32,
        /// TPTP rendering of the model (empty when proof output is off)
        model: String,
    },
    /// No model of any admissible size exists
    Refutation,
    /// The search gave up
    Unknown(UnknownReason),
    /// The deadline expired
    TimeLimit,
}

/// Odometer enumeration of groundings, last position fastest
///
/// Positions run over `1..=mins[i]`; the enumeration order is part of the
/// encoding contract.
struct Odometer {
    grounding: Vec<u32>,
    mins: Vec<u32>,
}

impl Odometer {
    fn new(mins: Vec<u32>) -> Self {
        let mut grounding = vec![1; mins.len()];
        if let Some(last) = grounding.last_mut() {
            *last = 0;
        }
        Odometer { grounding, mins }
    }

    fn step(&mut self) -> bool {
        for i in (0..self.grounding.len()).rev() {
            if self.grounding[i] == self.mins[i] {
                self.grounding[i] = 1;
            } else {
                self.grounding[i] += 1;
                return true;
            }
        }
        false
    }
}

/// The non-incremental finite model builder
pub struct FiniteModelBuilder<'a> {
    sig: &'a Signature,
    config: FmbConfig,
    deadline: Box<dyn Fn() -> bool + 'a>,
    input: Vec<Clause>,

    ground_clauses: Vec<Clause>,
    clauses: Vec<Clause>,
    clause_bounds: Vec<Vec<u32>>,
    sorted: Option<SortedSignature>,
    f_offsets: Vec<u32>,
    p_offsets: Vec<u32>,
    constants: Vec<FnSym>,
    functions: Vec<FnSym>,
    constant_count: u32,
    max_model_size: u32,
    var_count: u32,
    solver: Option<Box<dyn SatSolver>>,
    pending: Vec<SatClause>,
}

/// Non-local exit from the initialisation phase
enum InitStop {
    Refutation,
}

impl<'a> FiniteModelBuilder<'a> {
    /// Create a builder over a clause set
    pub fn new(sig: &'a Signature, clauses: Vec<Clause>, config: FmbConfig) -> Self {
        Self::with_deadline(sig, clauses, config, || false)
    }

    /// Create a builder with an injected wall-clock deadline predicate
    pub fn with_deadline(
        sig: &'a Signature,
        clauses: Vec<Clause>,
        config: FmbConfig,
        deadline: impl Fn() -> bool + 'a,
    ) -> Self {
        FiniteModelBuilder {
            sig,
            config,
            deadline: Box::new(deadline),
            input: clauses,
            ground_clauses: Vec::new(),
            clauses: Vec::new(),
            clause_bounds: Vec::new(),
            sorted: None,
            f_offsets: Vec::new(),
            p_offsets: Vec::new(),
            constants: Vec::new(),
            functions: Vec::new(),
            constant_count: 0,
            max_model_size: u32::MAX,
            var_count: 0,
            solver: None,
            pending: Vec::new(),
        }
    }

    /// Flatten the input, derive size bounds and the sorted signature
    fn init(&mut self) -> Result<(), InitStop> {
        let input = std::mem::take(&mut self.input);
        for clause in &input {
            let flat = match flatten(clause) {
                Flattened::Clause(c) => c,
                Flattened::Refutation => return Err(InitStop::Refutation),
            };
            if flat.is_ground() {
                trace!(clause = %flat, "ground clause");
                self.ground_clauses.push(flat);
            } else {
                trace!(clause = %flat, "non-ground clause");
                // a clause of nothing but positive variable equalities
                // forces collapses once the domain outgrows its variables
                if flat.is_all_positive_var_equalities() {
                    let bound = flat.var_count().saturating_sub(1).max(1);
                    if bound < self.max_model_size {
                        debug!(clause = %flat, bound, "tightening maximum model size");
                        self.max_model_size = bound;
                    }
                }
                self.clauses.push(flat);
            }
        }

        let sorted = SortedSignature::infer(
            self.sig,
            self.clauses.iter().chain(self.ground_clauses.iter()),
        );

        self.constants = self.sig.constants();
        self.functions = self.sig.proper_functions();
        self.constant_count = self.constants.len() as u32;

        // per-clause, per-variable bounds taken from the symbol positions
        // the variable occupies
        for clause in &self.clauses {
            let mut bounds = vec![0u32; clause.var_count() as usize];
            for lit in clause.literals() {
                if lit.is_equality() {
                    if lit.is_two_var_equality() {
                        continue;
                    }
                    let Term::App(f, args) = &lit.args()[0] else {
                        unreachable!("flat equality has a term on the left");
                    };
                    let row = &sorted.function_bounds[f.0 as usize];
                    let result_var = lit.args()[1].as_var().expect("flat equality") as usize;
                    debug_assert!(bounds[result_var] == 0 || bounds[result_var] == row[0]);
                    bounds[result_var] = row[0];
                    for (j, arg) in args.iter().enumerate() {
                        let v = arg.as_var().expect("flat term argument") as usize;
                        debug_assert!(bounds[v] == 0 || bounds[v] == row[j + 1]);
                        bounds[v] = row[j + 1];
                    }
                } else {
                    let row = &sorted.predicate_bounds[lit.pred().0 as usize];
                    for (j, arg) in lit.args().iter().enumerate() {
                        let v = arg.as_var().expect("flat literal argument") as usize;
                        debug_assert!(bounds[v] == 0 || bounds[v] == row[j]);
                        bounds[v] = row[j];
                    }
                }
            }
            // variables touched only by variable equalities are free to
            // range over the whole domain
            for b in &mut bounds {
                if *b == 0 {
                    *b = UNBOUNDED;
                }
            }
            self.clause_bounds.push(bounds);
        }

        self.sorted = Some(sorted);
        Ok(())
    }

    /// Recompute variable offsets for a size and instantiate a fresh
    /// solver; false on offset overflow
    fn reset(&mut self, size: u32) -> Result<bool, UnknownReason> {
        let mut offsets: u32 = 1;
        self.f_offsets.resize(self.sig.function_count() as usize, 0);
        self.p_offsets.resize(self.sig.predicate_count() as usize, 0);

        for f in self.sig.function_syms() {
            self.f_offsets[f.0 as usize] = offsets;
            let arity = self.sig.function_arity(f);
            let Some(add) = size.checked_pow(arity + 1) else {
                return Ok(false);
            };
            if u32::MAX - add < offsets {
                return Ok(false);
            }
            offsets += add;
        }
        for p in self.sig.predicate_syms() {
            self.p_offsets[p.0 as usize] = offsets;
            let arity = self.sig.predicate_arity(p);
            let Some(add) = size.checked_pow(arity) else {
                return Ok(false);
            };
            if u32::MAX - add < offsets {
                return Ok(false);
            }
            offsets += add;
        }

        let inner = match build_solver(self.config.solver) {
            Ok(s) => s,
            Err(_) => return Err(UnknownReason::SolverUnavailable),
        };
        // the back-end is reached through the transparent pre-solver, which
        // keeps pure literals and subsumed units away from it
        self.solver = Some(Box::new(TransparentSolver::new(inner)));
        self.var_count = offsets;
        self.solver
            .as_mut()
            .expect("solver just installed")
            .ensure_var_count(offsets + 1);
        self.pending.clear();
        Ok(true)
    }

    /// Propositional variable of a symbol under a grounding
    ///
    /// The grounding carries the argument values and, for functions, the
    /// result value last; the index is the offset plus the mixed-radix
    /// value of the grounding digits.
    fn sat_literal(
        &self,
        symbol: u32,
        grounding: &[u32],
        positive: bool,
        is_function: bool,
        size: u32,
    ) -> SatLiteral {
        let offset = if is_function {
            self.f_offsets[symbol as usize]
        } else {
            self.p_offsets[symbol as usize]
        };
        let mut var = offset;
        let mut mult = 1u32;
        for &d in grounding {
            debug_assert!((1..=size.max(1)).contains(&d));
            var += mult * (d - 1);
            mult = mult.wrapping_mul(size);
        }
        SatLiteral::new(var, positive)
    }

    fn add_sat_clause(&mut self, lits: Vec<SatLiteral>) {
        if let Some(clause) = SatClause::cleaned(lits) {
            trace!(clause = %clause, "adding");
            self.pending.push(clause);
        }
    }

    /// Family 1: ground clauses translate directly
    ///
    /// After flattening, a ground clause consists of nullary predicate
    /// literals only.
    fn add_ground_clauses(&mut self, size: u32) {
        for ci in 0..self.ground_clauses.len() {
            let lits: Vec<SatLiteral> = self.ground_clauses[ci]
                .literals()
                .iter()
                .map(|lit| {
                    debug_assert!(!lit.is_equality() && lit.arity() == 0);
                    self.sat_literal(lit.pred().0, &[], lit.is_positive(), false, size)
                })
                .collect();
            self.add_sat_clause(lits);
        }
    }

    /// Family 2: all groundings of every non-ground clause
    fn add_new_instances(&mut self, size: u32) {
        for ci in 0..self.clauses.len() {
            let clause = self.clauses[ci].clone();
            let bounds = &self.clause_bounds[ci];
            let mins: Vec<u32> = bounds.iter().map(|&b| b.min(size)).collect();

            let mut odo = Odometer::new(mins);
            'instance: while odo.step() {
                let mut lits = Vec::with_capacity(clause.len());
                for lit in clause.literals() {
                    if lit.is_two_var_equality() {
                        let x = odo.grounding[lit.args()[0].as_var().unwrap() as usize];
                        let y = odo.grounding[lit.args()[1].as_var().unwrap() as usize];
                        if lit.is_positive() == (x == y) {
                            // the grounded literal is true: skip instance
                            continue 'instance;
                        }
                        // the grounded literal is false: skip literal
                        continue;
                    }
                    if lit.is_equality() {
                        let Term::App(f, args) = &lit.args()[0] else {
                            unreachable!("flat equality has a term on the left");
                        };
                        let mut used = Vec::with_capacity(args.len() + 1);
                        for arg in args {
                            used.push(odo.grounding[arg.as_var().unwrap() as usize]);
                        }
                        used.push(odo.grounding[lit.args()[1].as_var().unwrap() as usize]);
                        lits.push(self.sat_literal(f.0, &used, lit.is_positive(), true, size));
                    } else {
                        let used: Vec<u32> = lit
                            .args()
                            .iter()
                            .map(|arg| odo.grounding[arg.as_var().unwrap() as usize])
                            .collect();
                        lits.push(self.sat_literal(
                            lit.pred().0,
                            &used,
                            lit.is_positive(),
                            false,
                            size,
                        ));
                    }
                }
                self.add_sat_clause(lits);
            }
        }
    }

    /// Family 3: functionality, `f(x..) != y | f(x..) != z` for `y != z`
    fn add_new_functional_defs(&mut self, size: u32) {
        for fi in 0..self.functions.len() {
            let f = self.functions[fi];
            let arity = self.sig.function_arity(f) as usize;
            let row = &self.sorted.as_ref().expect("init ran").function_bounds[f.0 as usize];

            // grounding layout: result y, result z, then the arguments
            let mut mins = Vec::with_capacity(arity + 2);
            let result_min = row[0].min(size);
            mins.push(result_min);
            mins.push(result_min);
            for i in 0..arity {
                mins.push(row[i + 1].min(size));
            }

            let mut odo = Odometer::new(mins);
            while odo.step() {
                if odo.grounding[0] == odo.grounding[1] {
                    continue;
                }
                let mut used = Vec::with_capacity(arity + 1);
                used.extend_from_slice(&odo.grounding[2..]);
                used.push(odo.grounding[0]);
                let first = self.sat_literal(f.0, &used, false, true, size);
                *used.last_mut().expect("result slot") = odo.grounding[1];
                let second = self.sat_literal(f.0, &used, false, true, size);
                self.add_sat_clause(vec![first, second]);
            }
        }
    }

    /// Family 4: symmetry breaking for the `s`-th domain element
    ///
    /// While constants last, the constant at index `s-1` is restricted to
    /// `[1..s]` and canonicity clauses order the constants. Once the
    /// constants are exhausted the axioms cycle through proper functions
    /// applied to the first `n` domain elements.
    fn add_new_symmetry_axioms(&mut self, s: u32, size: u32) {
        if (self.constants.len() as u32) < s {
            if self.constants.is_empty() {
                return;
            }
            let n = self.constants.len() as u32;
            let index = (s / n) as usize;
            if self.functions.len() <= index {
                return;
            }
            let f = self.functions[index];
            let arity = self.sig.function_arity(f) as usize;
            let element = match s % n {
                0 => n,
                e => e,
            };

            let mut grounding = vec![element; arity + 1];
            let mut lits = Vec::with_capacity(s as usize);
            for value in 1..=s {
                grounding[arity] = value;
                lits.push(self.sat_literal(f.0, &grounding, true, true, size));
            }
            self.add_sat_clause(lits);
            return;
        }

        // restricted totality: the s-th constant takes a value in [1..s]
        let c1 = self.constants[(s - 1) as usize];
        let lits: Vec<SatLiteral> = (1..=s)
            .map(|value| self.sat_literal(c1.0, &[value], true, true, size))
            .collect();
        self.add_sat_clause(lits);

        // canonicity: c_s = d requires some earlier constant to be d-1
        if s > 1 {
            for d in 1..s {
                let mut lits = vec![self.sat_literal(c1.0, &[d + 1], false, true, size)];
                for i in 0..(s - 1) {
                    let ci = self.constants[i as usize];
                    lits.push(self.sat_literal(ci.0, &[d], true, true, size));
                }
                self.add_sat_clause(lits);
            }
        }
    }

    /// Family 5: totality, every function application takes some value
    fn add_new_totality_defs(&mut self, size: u32) {
        for fi in 0..(self.constants.len() + self.functions.len()) {
            let f = if fi < self.constants.len() {
                self.constants[fi]
            } else {
                self.functions[fi - self.constants.len()]
            };
            let arity = self.sig.function_arity(f) as usize;
            let row = &self.sorted.as_ref().expect("init ran").function_bounds[f.0 as usize];
            let result_max = row[0].min(size);

            if arity == 0 {
                let lits: Vec<SatLiteral> = (1..=result_max)
                    .map(|value| self.sat_literal(f.0, &[value], true, true, size))
                    .collect();
                self.add_sat_clause(lits);
                continue;
            }

            let mins: Vec<u32> = (0..arity).map(|i| row[i + 1].min(size)).collect();
            let mut odo = Odometer::new(mins);
            while odo.step() {
                let mut lits = Vec::with_capacity(result_max as usize);
                for value in 1..=result_max {
                    let mut used = odo.grounding.clone();
                    used.push(value);
                    lits.push(self.sat_literal(f.0, &used, true, true, size));
                }
                self.add_sat_clause(lits);
            }
        }
    }

    fn emit_dimacs(&self, size: u32) {
        if let Some(path) = &self.config.dimacs_path {
            let text = dimacs_string(self.var_count, &self.pending);
            let target = format!("{}.{}", path.display(), size);
            if let Err(err) = std::fs::write(&target, text) {
                debug!(%target, %err, "failed to write DIMACS instance");
            }
        }
    }

    /// Run the search loop
    pub fn run(&mut self) -> FmbOutcome {
        if !self.config.complete {
            // the completeness predicate rejected the input: give up
            return FmbOutcome::Unknown(UnknownReason::Incomplete);
        }

        if let Err(InitStop::Refutation) = self.init() {
            return FmbOutcome::Refutation;
        }

        if self.sig.is_epr() {
            self.max_model_size = self.max_model_size.min(self.constant_count);
        }
        if self.max_model_size < u32::MAX && !self.config.spider {
            info!(max = self.max_model_size, "detected maximum model size");
        }

        let mut size: u32 = 1;
        match self.reset(size) {
            Ok(true) => {}
            Ok(false) => return FmbOutcome::Unknown(UnknownReason::CannotRepresent),
            Err(reason) => return FmbOutcome::Unknown(reason),
        }

        loop {
            if !self.config.spider {
                info!(size, "trying domain size");
            }
            if (self.deadline)() {
                return FmbOutcome::TimeLimit;
            }

            self.add_ground_clauses(size);
            self.add_new_instances(size);
            self.add_new_functional_defs(size);
            for s in 1..=size {
                self.add_new_symmetry_axioms(s, size);
            }
            self.add_new_totality_defs(size);

            if (self.deadline)() {
                return FmbOutcome::TimeLimit;
            }
            self.emit_dimacs(size);

            let pending = std::mem::take(&mut self.pending);
            let solver = self.solver.as_mut().expect("reset installed a solver");
            solver.add_clauses(pending, false);
            let status = solver.solve();

            if status == Status::Satisfiable {
                if !self.config.spider {
                    info!(size, "found finite model");
                }
                let model = if self.config.proof {
                    render_model(self.sig, self.solver.as_deref().expect("solver"), size, |f, g, p, func, sz| {
                        self.sat_literal(f, g, p, func, sz)
                    })
                } else {
                    String::new()
                };
                return FmbOutcome::Satisfiable { size, model };
            }

            if size == u32::MAX {
                return FmbOutcome::Unknown(UnknownReason::CannotRepresent);
            }

            if size >= self.max_model_size {
                if !self.config.spider {
                    if self.sig.is_epr() {
                        info!("checked all constants of an EPR problem");
                    } else {
                        info!("all further sizes are unsatisfiable by the variable bound");
                    }
                }
                return FmbOutcome::Refutation;
            }

            size += 1;
            match self.reset(size) {
                Ok(true) => {}
                Ok(false) => {
                    if !self.config.spider {
                        info!("cannot represent all propositional literals internally");
                    }
                    return FmbOutcome::Unknown(UnknownReason::CannotRepresent);
                }
                Err(reason) => return FmbOutcome::Unknown(reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talon_core::Literal;

    fn quiet() -> FmbConfig {
        FmbConfig {
            spider: true,
            ..FmbConfig::default()
        }
    }

    #[test]
    fn odometer_runs_last_position_fastest() {
        let mut odo = Odometer::new(vec![2, 3]);
        let mut seen = Vec::new();
        while odo.step() {
            seen.push(odo.grounding.clone());
        }
        assert_eq!(
            seen,
            vec![
                vec![1, 1],
                vec![1, 2],
                vec![1, 3],
                vec![2, 1],
                vec![2, 2],
                vec![2, 3],
            ]
        );
    }

    #[test]
    fn odometer_without_positions_is_empty() {
        let mut odo = Odometer::new(vec![]);
        assert!(!odo.step());
    }

    #[test]
    fn sat_variables_stay_inside_symbol_blocks() {
        let mut sig = Signature::new();
        let f = sig.add_function("f", 1);
        let p = sig.add_predicate("p", 2);
        let clause = Clause::new(vec![Literal::new(
            p,
            vec![Term::Var(0), Term::Var(1)],
            true,
        )]);
        let mut b = FiniteModelBuilder::new(&sig, vec![clause], quiet());
        b.init().ok().expect("no refutation");
        let size = 3u32;
        assert!(matches!(b.reset(size), Ok(true)));

        // function block: size^2 variables, then the predicate block
        let f_off = b.f_offsets[f.0 as usize];
        let p_off = b.p_offsets[p.0 as usize];
        assert_eq!(f_off, 1);
        assert_eq!(p_off, 1 + size.pow(2));
        for x in 1..=size {
            for y in 1..=size {
                let fl = b.sat_literal(f.0, &[x, y], true, true, size);
                assert!(fl.var() >= f_off && fl.var() < f_off + size.pow(2));
                let pl = b.sat_literal(p.0, &[x, y], true, false, size);
                assert!(pl.var() >= p_off && pl.var() < p_off + size.pow(2));
            }
        }
        assert_eq!(b.var_count, 1 + 2 * size.pow(2));
    }

    fn emit_all(size: u32) -> Vec<SatClause> {
        let mut sig = Signature::new();
        let a = sig.add_function("a", 0);
        let f = sig.add_function("f", 1);
        let p = sig.add_predicate("p", 1);
        let clauses = vec![
            Clause::new(vec![Literal::new(p, vec![Term::constant(a)], true)]),
            Clause::new(vec![Literal::new(
                p,
                vec![Term::App(f, vec![Term::Var(0)])],
                false,
            )]),
        ];
        let mut b = FiniteModelBuilder::new(&sig, clauses, quiet());
        b.init().ok().expect("no refutation");
        assert!(matches!(b.reset(size), Ok(true)));
        b.add_ground_clauses(size);
        b.add_new_instances(size);
        b.add_new_functional_defs(size);
        for s in 1..=size {
            b.add_new_symmetry_axioms(s, size);
        }
        b.add_new_totality_defs(size);
        b.pending
    }

    #[test]
    fn clause_emission_is_deterministic() {
        assert_eq!(emit_all(2), emit_all(2));
        assert_eq!(emit_all(3), emit_all(3));
    }

    #[test]
    fn functionality_axioms_are_binary_negative() {
        let pending = emit_all(2);
        // every functionality clause is two negative literals over one
        // block; at least one must exist for f and for a
        let binary_negative = pending
            .iter()
            .filter(|c| c.len() == 2 && c.literals().iter().all(|l| !l.is_positive()))
            .count();
        assert!(binary_negative >= 2);
    }
}
