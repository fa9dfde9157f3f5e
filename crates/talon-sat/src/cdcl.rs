//! Internal CDCL SAT engine
//!
//! A compact conflict-driven solver implementing the [`SatSolver`]
//! contract:
//! - 2-watched literal scheme for unit propagation
//! - first-UIP conflict analysis with clause learning
//! - activity-based branching with exponential decay
//! - assumptions handled as forced decisions on the first levels, so that
//!   retracting them restores the assumption-free state exactly
//!
//! Clauses are added at decision level zero and simplified against the
//! level-zero assignment before being attached, which keeps the watch
//! invariant (a watched literal is false only if the clause is unit or
//! conflicting) intact.

use crate::clause::SatClause;
use crate::literal::SatLiteral;
use crate::solver::{Assignment, SatSolver, Status};
use tracing::trace;

const ACTIVITY_DECAY: f64 = 0.95;
const ACTIVITY_RESCALE: f64 = 1e100;

struct ClauseSlot {
    lits: Vec<SatLiteral>,
}

/// The built-in CDCL solver
pub struct CdclSolver {
    num_vars: u32,
    clauses: Vec<ClauseSlot>,
    /// Watch lists indexed by literal
    watches: Vec<Vec<u32>>,
    /// Current assignment per variable (None = unassigned)
    value: Vec<Option<bool>>,
    /// Decision level per variable
    level: Vec<u32>,
    /// Reason clause per variable (None for decisions and assumptions)
    reason: Vec<Option<u32>>,
    trail: Vec<SatLiteral>,
    trail_lim: Vec<usize>,
    qhead: usize,
    activity: Vec<f64>,
    var_inc: f64,
    /// Scratch for conflict analysis
    seen: Vec<bool>,
    assumptions: Vec<SatLiteral>,
    status: Status,
    /// False once a conflict is derived at level zero
    ok: bool,
}

impl Default for CdclSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CdclSolver {
    /// Create an empty solver
    pub fn new() -> Self {
        CdclSolver {
            num_vars: 0,
            clauses: Vec::new(),
            watches: Vec::new(),
            value: Vec::new(),
            level: Vec::new(),
            reason: Vec::new(),
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            activity: Vec::new(),
            var_inc: 1.0,
            seen: Vec::new(),
            assumptions: Vec::new(),
            status: Status::Unknown,
            ok: true,
        }
    }

    #[inline]
    fn value_of(&self, lit: SatLiteral) -> Option<bool> {
        self.value[lit.var() as usize].map(|v| v == lit.is_positive())
    }

    #[inline]
    fn decision_level(&self) -> u32 {
        self.trail_lim.len() as u32
    }

    fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len());
    }

    fn enqueue(&mut self, lit: SatLiteral, reason: Option<u32>) {
        debug_assert!(self.value_of(lit).is_none());
        let v = lit.var() as usize;
        self.value[v] = Some(lit.is_positive());
        self.level[v] = self.decision_level();
        self.reason[v] = reason;
        self.trail.push(lit);
    }

    fn backtrack(&mut self, target: u32) {
        if self.decision_level() <= target {
            return;
        }
        let keep = self.trail_lim[target as usize];
        while self.trail.len() > keep {
            let lit = self.trail.pop().expect("trail underflow");
            let v = lit.var() as usize;
            self.value[v] = None;
            self.reason[v] = None;
        }
        self.trail_lim.truncate(target as usize);
        self.qhead = keep;
    }

    /// Run unit propagation; returns the conflicting clause, if any
    fn propagate(&mut self) -> Option<u32> {
        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            let false_lit = p.negated();
            let mut ws = std::mem::take(&mut self.watches[false_lit.index()]);

            let mut i = 0;
            'watches: while i < ws.len() {
                let ci = ws[i];
                let cl = &mut self.clauses[ci as usize].lits;
                if cl[0] == false_lit {
                    cl.swap(0, 1);
                }
                debug_assert_eq!(cl[1], false_lit);
                let first = cl[0];
                if self.value[first.var() as usize] == Some(first.is_positive()) {
                    i += 1;
                    continue;
                }
                for k in 2..cl.len() {
                    let cand = cl[k];
                    if self.value[cand.var() as usize] != Some(!cand.is_positive()) {
                        cl.swap(1, k);
                        let new_watch = cl[1];
                        self.watches[new_watch.index()].push(ci);
                        ws.swap_remove(i);
                        continue 'watches;
                    }
                }
                if self.value[first.var() as usize] == Some(!first.is_positive()) {
                    // conflict
                    self.watches[false_lit.index()] = ws;
                    self.qhead = self.trail.len();
                    return Some(ci);
                }
                self.enqueue(first, Some(ci));
                i += 1;
            }
            self.watches[false_lit.index()] = ws;
        }
        None
    }

    fn bump(&mut self, var: usize) {
        self.activity[var] += self.var_inc;
        if self.activity[var] > ACTIVITY_RESCALE {
            for a in &mut self.activity {
                *a /= ACTIVITY_RESCALE;
            }
            self.var_inc /= ACTIVITY_RESCALE;
        }
    }

    /// First-UIP conflict analysis
    ///
    /// Returns the learned clause (asserting literal first) and the
    /// backjump level.
    fn analyze(&mut self, conflict: u32) -> (Vec<SatLiteral>, u32) {
        let cur_level = self.decision_level();
        let mut rest: Vec<SatLiteral> = Vec::new();
        let mut counter = 0usize;
        let mut p: Option<SatLiteral> = None;
        let mut idx = self.trail.len();
        let mut confl = conflict;

        loop {
            let lits = self.clauses[confl as usize].lits.clone();
            for q in lits {
                if let Some(pl) = p {
                    if q.var() == pl.var() {
                        continue;
                    }
                }
                let v = q.var() as usize;
                if !self.seen[v] && self.level[v] > 0 {
                    self.seen[v] = true;
                    self.bump(v);
                    if self.level[v] >= cur_level {
                        counter += 1;
                    } else {
                        rest.push(q);
                    }
                }
            }

            // walk back to the next marked trail literal
            loop {
                idx -= 1;
                if self.seen[self.trail[idx].var() as usize] {
                    break;
                }
            }
            let pl = self.trail[idx];
            self.seen[pl.var() as usize] = false;
            counter -= 1;
            p = Some(pl);
            if counter == 0 {
                break;
            }
            confl = self.reason[pl.var() as usize].expect("propagated literal without reason");
        }

        for q in &rest {
            self.seen[q.var() as usize] = false;
        }

        let mut learnt = Vec::with_capacity(rest.len() + 1);
        learnt.push(p.expect("no UIP found").negated());
        learnt.extend(rest);

        let backjump = learnt[1..]
            .iter()
            .map(|l| self.level[l.var() as usize])
            .max()
            .unwrap_or(0);
        (learnt, backjump)
    }

    fn attach_clause(&mut self, lits: Vec<SatLiteral>) -> u32 {
        debug_assert!(lits.len() >= 2);
        let ci = self.clauses.len() as u32;
        self.watches[lits[0].index()].push(ci);
        self.watches[lits[1].index()].push(ci);
        self.clauses.push(ClauseSlot { lits });
        ci
    }

    fn record_learnt(&mut self, mut learnt: Vec<SatLiteral>, backjump: u32) {
        self.backtrack(backjump);
        if learnt.len() == 1 {
            if self.value_of(learnt[0]) == Some(false) {
                self.ok = false;
                return;
            }
            if self.value_of(learnt[0]).is_none() {
                self.enqueue(learnt[0], None);
            }
        } else {
            // watch the asserting literal and one literal of the backjump
            // level, so the clause is unit right now and correct later
            let mut mi = 1;
            for k in 2..learnt.len() {
                if self.level[learnt[k].var() as usize] > self.level[learnt[mi].var() as usize] {
                    mi = k;
                }
            }
            learnt.swap(1, mi);
            let asserting = learnt[0];
            let ci = self.attach_clause(learnt);
            self.enqueue(asserting, Some(ci));
        }
        self.var_inc /= ACTIVITY_DECAY;
    }

    fn pick_branch_var(&self) -> Option<u32> {
        let mut best: Option<u32> = None;
        for v in 1..=self.num_vars {
            if self.value[v as usize].is_none() {
                match best {
                    Some(b) if self.activity[b as usize] >= self.activity[v as usize] => {}
                    _ => best = Some(v),
                }
            }
        }
        best
    }

    /// Re-establish assumption levels after a restart or backjump
    ///
    /// Returns false when the assumptions are already contradicted.
    fn establish_assumptions(&mut self) -> bool {
        while (self.decision_level() as usize) < self.assumptions.len() {
            let a = self.assumptions[self.decision_level() as usize];
            match self.value_of(a) {
                Some(true) => self.new_decision_level(),
                None => {
                    self.new_decision_level();
                    self.enqueue(a, None);
                    if self.propagate().is_some() {
                        return false;
                    }
                }
                Some(false) => return false,
            }
        }
        true
    }
}

impl SatSolver for CdclSolver {
    fn ensure_var_count(&mut self, n: u32) {
        if n <= self.num_vars {
            return;
        }
        self.num_vars = n;
        let vn = (n + 1) as usize;
        self.value.resize(vn, None);
        self.level.resize(vn, 0);
        self.reason.resize(vn, None);
        self.activity.resize(vn, 0.0);
        self.seen.resize(vn, false);
        self.watches.resize(2 * vn, Vec::new());
    }

    fn add_clauses(&mut self, clauses: Vec<SatClause>, only_propagate: bool) {
        self.backtrack(0);
        if self.ok {
            self.status = Status::Unknown;
        }
        for cl in clauses {
            if !self.ok {
                break;
            }
            for lit in cl.literals() {
                self.ensure_var_count(lit.var());
            }
            // simplify against the level-zero assignment
            let mut lits: Vec<SatLiteral> = Vec::with_capacity(cl.len());
            let mut satisfied = false;
            for &lit in cl.literals() {
                match self.value_of(lit) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => {}
                    None => {
                        if !lits.contains(&lit) {
                            lits.push(lit);
                        }
                    }
                }
            }
            if satisfied {
                continue;
            }
            match lits.len() {
                0 => {
                    trace!("clause is falsified at level zero");
                    self.ok = false;
                }
                1 => {
                    self.enqueue(lits[0], None);
                    if self.propagate().is_some() {
                        self.ok = false;
                    }
                }
                _ => {
                    self.attach_clause(lits);
                }
            }
        }
        if self.ok && self.propagate().is_some() {
            self.ok = false;
        }
        if !self.ok {
            self.status = Status::Unsatisfiable;
        } else if only_propagate {
            self.status = Status::Unknown;
        }
    }

    fn solve(&mut self) -> Status {
        if !self.ok {
            self.status = Status::Unsatisfiable;
            return self.status;
        }
        self.backtrack(0);
        if self.propagate().is_some() {
            self.ok = false;
            self.status = Status::Unsatisfiable;
            return self.status;
        }
        loop {
            if !self.establish_assumptions() {
                self.status = Status::Unsatisfiable;
                return self.status;
            }
            match self.propagate() {
                Some(conflict) => {
                    if self.decision_level() == 0 {
                        self.ok = false;
                        self.status = Status::Unsatisfiable;
                        return self.status;
                    }
                    if (self.decision_level() as usize) <= self.assumptions.len() {
                        // conflict forced by assumptions alone
                        self.status = Status::Unsatisfiable;
                        return self.status;
                    }
                    let (learnt, backjump) = self.analyze(conflict);
                    self.record_learnt(learnt, backjump);
                    if !self.ok {
                        self.status = Status::Unsatisfiable;
                        return self.status;
                    }
                }
                None => {
                    if self.trail.len() == self.num_vars as usize {
                        self.status = Status::Satisfiable;
                        return self.status;
                    }
                    let v = self.pick_branch_var().expect("unassigned variable exists");
                    self.new_decision_level();
                    self.enqueue(SatLiteral::new(v, false), None);
                }
            }
        }
    }

    fn status(&self) -> Status {
        self.status
    }

    fn assignment(&self, var: u32) -> Assignment {
        if var == 0 || var > self.num_vars {
            return Assignment::DontCare;
        }
        match self.value[var as usize] {
            Some(true) => Assignment::True,
            Some(false) => Assignment::False,
            None => Assignment::DontCare,
        }
    }

    fn add_assumption(&mut self, lit: SatLiteral, only_propagate: bool) {
        if self.assumptions.contains(&lit) {
            return;
        }
        self.assumptions.push(lit);
        if !self.ok {
            self.status = Status::Unsatisfiable;
            return;
        }
        if only_propagate {
            self.backtrack(0);
            if self.propagate().is_some() {
                self.ok = false;
                self.status = Status::Unsatisfiable;
                return;
            }
            if !self.establish_assumptions() {
                self.status = Status::Unsatisfiable;
            } else {
                self.status = Status::Unknown;
            }
        } else {
            self.solve();
        }
    }

    fn retract_all_assumptions(&mut self) {
        self.assumptions.clear();
        self.backtrack(0);
        self.status = if self.ok {
            Status::Unknown
        } else {
            Status::Unsatisfiable
        };
    }

    fn has_assumptions(&self) -> bool {
        !self.assumptions.is_empty()
    }
}
