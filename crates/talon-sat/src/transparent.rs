//! Transparent pre-solver
//!
//! Wraps an inner [`SatSolver`] and filters the clause stream through a
//! pure-literal analysis. A variable that has only ever been seen with one
//! polarity is *pure*; a clause containing a pure literal with the matching
//! polarity is *watched* on that variable and withheld from the inner
//! solver, because setting the pure variable accordingly satisfies it. The
//! wrapper stays observationally transparent: `assignment` answers from the
//! pure polarity (or an active assumption) before delegating.
//!
//! When a clause cannot be watched, the wrapper first tries to *sweep* one
//! of the clause's pure variables: re-home every clause watched there onto
//! other variables. A fully swept variable with no unit clause returns to
//! the unseen state and can adopt the opposite polarity. If sweeping fails,
//! the affected variables become impure, their watched clauses are
//! re-queued, and the clause is forwarded.
//!
//! Assumptions that contradict a pure polarity trigger the same sweep;
//! on failure the variable is made impure, the queue is re-drained, inner
//! assumptions are retracted, pending clauses are flushed, and all recorded
//! assumptions are re-issued in order with `only_propagate` set on every
//! assumption except the last.

use crate::clause::SatClause;
use crate::literal::SatLiteral;
use crate::solver::{Assignment, SatSolver, Status};
use std::collections::VecDeque;
use tracing::trace;

type ClauseId = u32;

#[derive(Debug, Clone)]
struct VarInfo {
    /// No clause has touched this variable yet
    unseen: bool,
    is_pure: bool,
    /// Relevant while `is_pure`: all occurrences are positive
    pure_positive: bool,
    /// A unit clause fixing this variable, if one arrived
    unit: Option<ClauseId>,
    /// Clauses parked on this variable; empty unless pure
    watched: Vec<ClauseId>,
    /// Assumed polarity, while an assumption is active
    assumption: Option<bool>,
}

impl Default for VarInfo {
    fn default() -> Self {
        VarInfo {
            unseen: true,
            is_pure: false,
            pure_positive: false,
            unit: None,
            watched: Vec::new(),
            assumption: None,
        }
    }
}

/// Pure-literal filtering wrapper around an inner SAT solver
pub struct TransparentSolver<S> {
    inner: S,
    /// All clauses routed through the watching machinery
    arena: Vec<SatClause>,
    unprocessed: VecDeque<ClauseId>,
    to_be_added: Vec<ClauseId>,
    vars: Vec<VarInfo>,
    assumptions: Vec<SatLiteral>,
}

impl<S: SatSolver> TransparentSolver<S> {
    /// Wrap an inner solver
    pub fn new(inner: S) -> Self {
        TransparentSolver {
            inner,
            arena: Vec::new(),
            unprocessed: VecDeque::new(),
            to_be_added: Vec::new(),
            vars: Vec::new(),
            assumptions: Vec::new(),
        }
    }

    /// Access the wrapped solver
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn lits(&self, cl: ClauseId) -> &[SatLiteral] {
        self.arena[cl as usize].literals()
    }

    fn flush_clauses_to_inner(&mut self, only_propagate: bool) {
        let ids: Vec<ClauseId> = self.to_be_added.drain(..).collect();
        let clauses: Vec<SatClause> = ids
            .into_iter()
            .map(|id| self.arena[id as usize].clone())
            .collect();
        self.inner.add_clauses(clauses, only_propagate);
    }

    fn process_unit(&mut self, cl: ClauseId) {
        let lit = self.lits(cl)[0];
        let var = lit.var() as usize;

        if let Some(unit) = self.vars[var].unit {
            if self.lits(unit)[0].is_positive() == lit.is_positive() {
                // subsumed by the existing unit
                return;
            }
            // contradicting units: forward for refutation
        } else {
            self.vars[var].unit = Some(cl);
            // units never sit among watched clauses, so this cannot run
            // while an assumption drain is in progress
            debug_assert!(self.vars[var].assumption.is_none());
            if !self.vars[var].unseen && self.vars[var].is_pure {
                if self.vars[var].pure_positive == lit.is_positive() {
                    // the watched clauses are subsumed by the unit
                    self.vars[var].watched.clear();
                } else if !self.try_to_sweep_pure(var, false) {
                    self.make_var_impure(var);
                }
            }
            if self.vars[var].unseen {
                self.vars[var].unseen = false;
                self.vars[var].is_pure = true;
                self.vars[var].pure_positive = lit.is_positive();
            }
        }

        self.to_be_added.push(cl);
    }

    /// Strip a variable of its pure status, re-queueing what cannot be
    /// swept elsewhere
    fn make_var_impure(&mut self, var: usize) {
        debug_assert!(!self.vars[var].unseen && self.vars[var].is_pure);
        trace!(var, "variable becomes impure");

        // move away as many watched clauses as possible; the rest re-enter
        // the queue
        let fully_swept = self.try_to_sweep_pure(var, true);
        debug_assert!(!fully_swept);
        let watched = std::mem::take(&mut self.vars[var].watched);
        self.unprocessed.extend(watched);
        self.vars[var].is_pure = false;
    }

    fn process_unprocessed(&mut self) {
        while let Some(cl) = self.unprocessed.pop_front() {
            if self.lits(cl).len() == 1 {
                self.process_unit(cl);
                continue;
            }
            if self.try_watch_or_subsume(cl, None) {
                continue;
            }

            // the clause has no watchable literal; try to flip some pure
            // variable's polarity by sweeping, otherwise every pure
            // variable in the clause becomes impure and the clause is
            // forwarded
            let lits: Vec<SatLiteral> = self.lits(cl).to_vec();
            let mut to_unpure: Vec<usize> = Vec::new();
            let mut fixed = false;
            for lit in lits {
                let var = lit.var() as usize;
                debug_assert!(!self.vars[var].unseen || self.vars[var].assumption.is_some());
                if self.vars[var].unseen || !self.vars[var].is_pure {
                    continue;
                }
                if self.try_to_sweep_pure(var, false) {
                    // the freed variable is unseen again, so watching now
                    // succeeds
                    let watched = self.try_watch_or_subsume(cl, None);
                    debug_assert!(watched);
                    fixed = true;
                    break;
                }
                to_unpure.push(var);
            }

            if fixed {
                continue;
            }
            self.to_be_added.push(cl);
            for var in to_unpure {
                self.make_var_impure(var);
            }
        }
    }

    /// Attempt to sweep all clauses watched on `var` onto other variables
    ///
    /// With `eager` false the attempt stops at the first immovable clause;
    /// with `eager` true every clause is tried. Returns true only when the
    /// watch list ends up empty and no unit clause pins the variable, in
    /// which case the variable returns to the unseen state.
    fn try_to_sweep_pure(&mut self, var: usize, eager: bool) -> bool {
        debug_assert!(self.vars[var].is_pure);
        trace!(var, eager, "sweeping pure variable");

        if !eager && self.vars[var].unit.is_some() {
            return false;
        }

        let mut watched = std::mem::take(&mut self.vars[var].watched);
        let mut failed = false;
        let mut i = 0;
        while i < watched.len() {
            let cl = watched[i];
            let moved = self.try_watch_or_subsume(cl, Some(var));
            // the forbidden-variable parameter keeps the clause from being
            // re-homed right back here
            debug_assert!(self.vars[var].watched.is_empty());
            if moved {
                watched.swap_remove(i);
            } else if !eager {
                failed = true;
                break;
            } else {
                i += 1;
            }
        }
        self.vars[var].watched = watched;
        if failed {
            return false;
        }

        if self.vars[var].watched.is_empty() && self.vars[var].unit.is_none() {
            self.vars[var].unseen = true;
            return true;
        }
        false
    }

    /// Try to park the clause on a pure (or fresh) variable, or detect that
    /// a unit clause subsumes it
    ///
    /// Never watches on `forbidden`, so a sweep cannot re-home a clause on
    /// the variable it is sweeping.
    fn try_watch_or_subsume(&mut self, cl: ClauseId, forbidden: Option<usize>) -> bool {
        let lits: Vec<SatLiteral> = self.lits(cl).to_vec();
        for lit in lits {
            let var = lit.var() as usize;
            if Some(var) == forbidden {
                continue;
            }
            if let Some(unit) = self.vars[var].unit {
                if self.lits(unit)[0].is_positive() == lit.is_positive() {
                    // subsumed by the unit
                    return true;
                }
                continue;
            }
            if let Some(assumed) = self.vars[var].assumption {
                if assumed != lit.is_positive() {
                    continue;
                }
            }
            let vi = &mut self.vars[var];
            if vi.unseen {
                vi.unseen = false;
                vi.is_pure = true;
                vi.pure_positive = lit.is_positive();
            }
            if vi.is_pure && vi.pure_positive == lit.is_positive() {
                debug_assert!(vi.unit.is_none());
                vi.watched.push(cl);
                return true;
            }
        }
        false
    }
}

impl<S: SatSolver> SatSolver for TransparentSolver<S> {
    fn ensure_var_count(&mut self, n: u32) {
        self.inner.ensure_var_count(n);
        if self.vars.len() < (n + 1) as usize {
            self.vars.resize((n + 1) as usize, VarInfo::default());
        }
    }

    fn add_clauses(&mut self, clauses: Vec<SatClause>, only_propagate: bool) {
        debug_assert!(self.assumptions.is_empty());
        debug_assert!(self.unprocessed.is_empty());
        debug_assert!(self.to_be_added.is_empty());

        for cl in clauses {
            for lit in cl.literals() {
                self.ensure_var_count(lit.var());
            }
            let id = self.arena.len() as ClauseId;
            self.arena.push(cl);
            self.unprocessed.push_back(id);
        }

        self.process_unprocessed();
        self.flush_clauses_to_inner(only_propagate);
    }

    fn solve(&mut self) -> Status {
        self.inner.solve()
    }

    fn status(&self) -> Status {
        self.inner.status()
    }

    fn assignment(&self, var: u32) -> Assignment {
        match self.vars.get(var as usize) {
            Some(vi) => {
                if let Some(assumed) = vi.assumption {
                    return if assumed {
                        Assignment::True
                    } else {
                        Assignment::False
                    };
                }
                if !vi.unseen && vi.is_pure {
                    return if vi.pure_positive {
                        Assignment::True
                    } else {
                        Assignment::False
                    };
                }
                self.inner.assignment(var)
            }
            None => self.inner.assignment(var),
        }
    }

    fn add_assumption(&mut self, lit: SatLiteral, only_propagate: bool) {
        let var = lit.var() as usize;
        if self.vars.len() <= var {
            self.ensure_var_count(lit.var());
        }

        if let Some(assumed) = self.vars[var].assumption {
            if assumed == lit.is_positive() {
                // duplicate assumption, silently dropped
                return;
            }
            // contradictory assumptions: drive the inner solver into an
            // unsatisfiable state directly
            self.inner.add_assumption(lit.negated(), true);
            self.inner.add_assumption(lit, true);
            debug_assert_eq!(self.inner.status(), Status::Unsatisfiable);
            return;
        }

        self.assumptions.push(lit);
        self.vars[var].assumption = Some(lit.is_positive());

        if self.inner.status() == Status::Unsatisfiable {
            return;
        }

        if self.vars[var].unit.is_some() || self.vars[var].unseen || !self.vars[var].is_pure {
            self.inner.add_assumption(lit, only_propagate);
            return;
        }
        if self.vars[var].pure_positive == lit.is_positive() {
            // the pure polarity already agrees; nothing to tell the inner
            // solver
            return;
        }

        if self.try_to_sweep_pure(var, false) {
            self.inner.add_assumption(lit, only_propagate);
            return;
        }

        // the assumption contradicts a pure polarity that cannot be swept
        // away: the variable becomes impure, its clauses go down, and the
        // inner assumptions are rebuilt from scratch
        self.make_var_impure(var);
        self.process_unprocessed();
        self.inner.retract_all_assumptions();
        self.flush_clauses_to_inner(true);

        let count = self.assumptions.len();
        for i in 0..count {
            let restored = self.assumptions[i];
            let last = i + 1 == count;
            self.inner.add_assumption(restored, only_propagate || !last);
        }
    }

    fn retract_all_assumptions(&mut self) {
        self.inner.retract_all_assumptions();
        while let Some(lit) = self.assumptions.pop() {
            let vi = &mut self.vars[lit.var() as usize];
            debug_assert_eq!(vi.assumption, Some(lit.is_positive()));
            vi.assumption = None;
        }
    }

    fn has_assumptions(&self) -> bool {
        !self.assumptions.is_empty()
    }
}
