//! End-to-end model building scenarios through the internal CDCL engine

use talon_core::{Clause, Literal, Signature, Term};
use talon_fmb::{FiniteModelBuilder, FmbConfig, FmbOutcome, UnknownReason};
use talon_sat::SolverChoice;

fn quiet() -> FmbConfig {
    FmbConfig {
        spider: true,
        ..FmbConfig::default()
    }
}

#[test]
fn distinct_constants_need_two_elements() {
    // P(a), ~P(b): satisfiable at size two with a and b apart
    let mut sig = Signature::new();
    let a = sig.add_function("a", 0);
    let b = sig.add_function("b", 0);
    let p = sig.add_predicate("p", 1);

    let clauses = vec![
        Clause::new(vec![Literal::new(p, vec![Term::constant(a)], true)]),
        Clause::new(vec![Literal::new(p, vec![Term::constant(b)], false)]),
    ];

    let mut fmb = FiniteModelBuilder::new(&sig, clauses, quiet());
    match fmb.run() {
        FmbOutcome::Satisfiable { size, model } => {
            assert_eq!(size, 2);
            // symmetry pins the first constant to the first element
            assert!(model.contains("a = fmb1"));
            assert!(model.contains("b = fmb2"));
            assert!(model.contains("p(fmb1)"));
            assert!(model.contains("~p(fmb2)"));
        }
        other => panic!("expected a model, got {other:?}"),
    }
}

#[test]
fn contradictory_equalities_are_refuted() {
    // a = b, a != b
    let mut sig = Signature::new();
    let a = sig.add_function("a", 0);
    let b = sig.add_function("b", 0);

    let clauses = vec![
        Clause::new(vec![Literal::equality(
            Term::constant(a),
            Term::constant(b),
            true,
        )]),
        Clause::new(vec![Literal::equality(
            Term::constant(a),
            Term::constant(b),
            false,
        )]),
    ];

    let mut fmb = FiniteModelBuilder::new(&sig, clauses, quiet());
    assert_eq!(fmb.run(), FmbOutcome::Refutation);
}

#[test]
fn tautological_clause_has_trivial_model() {
    // P(x) | ~P(x) is satisfiable with a single element either way
    let mut sig = Signature::new();
    let p = sig.add_predicate("p", 1);

    let clauses = vec![Clause::new(vec![
        Literal::new(p, vec![Term::Var(0)], true),
        Literal::new(p, vec![Term::Var(0)], false),
    ])];

    let mut fmb = FiniteModelBuilder::new(&sig, clauses, quiet());
    match fmb.run() {
        FmbOutcome::Satisfiable { size, .. } => assert_eq!(size, 1),
        other => panic!("expected a model, got {other:?}"),
    }
}

#[test]
fn two_variable_equality_collapses_the_domain() {
    // x = y bounds the model size and holds in the one-element model
    let sig = Signature::new();
    let clauses = vec![Clause::new(vec![Literal::equality(
        Term::Var(0),
        Term::Var(1),
        true,
    )])];

    let mut fmb = FiniteModelBuilder::new(&sig, clauses, quiet());
    match fmb.run() {
        FmbOutcome::Satisfiable { size, .. } => assert_eq!(size, 1),
        other => panic!("expected a model, got {other:?}"),
    }
}

#[test]
fn symmetry_orders_distinct_constants() {
    // three pairwise distinct constants land on fmb1, fmb2, fmb3 in
    // signature order
    let mut sig = Signature::new();
    let names = ["a", "b", "c"];
    let consts: Vec<_> = names.iter().map(|n| sig.add_function(n, 0)).collect();

    let mut clauses = Vec::new();
    for i in 0..3 {
        for j in (i + 1)..3 {
            clauses.push(Clause::new(vec![Literal::equality(
                Term::constant(consts[i]),
                Term::constant(consts[j]),
                false,
            )]));
        }
    }

    let mut fmb = FiniteModelBuilder::new(&sig, clauses, quiet());
    match fmb.run() {
        FmbOutcome::Satisfiable { size, model } => {
            assert_eq!(size, 3);
            assert!(model.contains("a = fmb1"));
            assert!(model.contains("b = fmb2"));
            assert!(model.contains("c = fmb3"));
        }
        other => panic!("expected a model, got {other:?}"),
    }
}

#[test]
fn functions_are_total_in_the_model() {
    // P(f(x)) forces a value for f everywhere and P on its range
    let mut sig = Signature::new();
    let f = sig.add_function("f", 1);
    let p = sig.add_predicate("p", 1);

    let clauses = vec![Clause::new(vec![Literal::new(
        p,
        vec![Term::App(f, vec![Term::Var(0)])],
        true,
    )])];

    let mut fmb = FiniteModelBuilder::new(&sig, clauses, quiet());
    match fmb.run() {
        FmbOutcome::Satisfiable { size, model } => {
            assert_eq!(size, 1);
            assert!(model.contains("f(fmb1) = fmb1"));
            assert!(model.contains("p(fmb1)"));
        }
        other => panic!("expected a model, got {other:?}"),
    }
}

#[test]
fn empty_clause_refutes_immediately() {
    let sig = Signature::new();
    let clauses = vec![Clause::new(vec![])];
    let mut fmb = FiniteModelBuilder::new(&sig, clauses, quiet());
    assert_eq!(fmb.run(), FmbOutcome::Refutation);
}

#[test]
fn incomplete_problems_give_up() {
    let sig = Signature::new();
    let config = FmbConfig {
        complete: false,
        spider: true,
        ..FmbConfig::default()
    };
    let mut fmb = FiniteModelBuilder::new(&sig, vec![], config);
    assert_eq!(fmb.run(), FmbOutcome::Unknown(UnknownReason::Incomplete));
}

#[test]
fn expired_deadline_is_a_time_limit() {
    let mut sig = Signature::new();
    let p = sig.add_predicate("p", 0);
    let clauses = vec![Clause::new(vec![Literal::new(p, vec![], true)])];
    let mut fmb = FiniteModelBuilder::with_deadline(&sig, clauses, quiet(), || true);
    assert_eq!(fmb.run(), FmbOutcome::TimeLimit);
}

#[test]
fn variable_overflow_reports_cannot_represent() {
    // a 32-ary predicate makes size two unrepresentable in 32 bits; the
    // problem needs two elements, so the attempt is abandoned
    let mut sig = Signature::new();
    let a = sig.add_function("a", 0);
    let b = sig.add_function("b", 0);
    let p = sig.add_predicate("p", 1);
    sig.add_predicate("wide", 32);

    let clauses = vec![
        Clause::new(vec![Literal::new(p, vec![Term::constant(a)], true)]),
        Clause::new(vec![Literal::new(p, vec![Term::constant(b)], false)]),
    ];

    let mut fmb = FiniteModelBuilder::new(&sig, clauses, quiet());
    assert_eq!(
        fmb.run(),
        FmbOutcome::Unknown(UnknownReason::CannotRepresent)
    );
}

#[test]
fn external_solvers_are_reported_unavailable() {
    let mut sig = Signature::new();
    let p = sig.add_predicate("p", 0);
    let clauses = vec![Clause::new(vec![Literal::new(p, vec![], true)])];
    let config = FmbConfig {
        solver: SolverChoice::ExternalMinisat,
        spider: true,
        ..FmbConfig::default()
    };
    let mut fmb = FiniteModelBuilder::new(&sig, clauses, config);
    assert_eq!(
        fmb.run(),
        FmbOutcome::Unknown(UnknownReason::SolverUnavailable)
    );
}

#[test]
fn model_lists_domain_and_distinctness() {
    let mut sig = Signature::new();
    let a = sig.add_function("a", 0);
    let b = sig.add_function("b", 0);
    let p = sig.add_predicate("p", 1);

    let clauses = vec![
        Clause::new(vec![Literal::new(p, vec![Term::constant(a)], true)]),
        Clause::new(vec![Literal::new(p, vec![Term::constant(b)], false)]),
    ];

    let mut fmb = FiniteModelBuilder::new(&sig, clauses, quiet());
    let FmbOutcome::Satisfiable { model, .. } = fmb.run() else {
        panic!("expected a model");
    };
    assert!(model.contains("fof(domain,interpretation_domain,"));
    assert!(model.contains("X = fmb1 | X = fmb2"));
    assert!(model.contains("fof(distinct_domain,interpreted_domain,"));
    assert!(model.contains("fmb1 != fmb2"));
    assert!(model.contains("fof(constant_a,functors,"));
    assert!(model.contains("fof(predicate_p,predicates,"));
}

#[test]
fn dimacs_artifacts_are_written_when_enabled() {
    let mut sig = Signature::new();
    let p = sig.add_predicate("p", 0);
    let clauses = vec![Clause::new(vec![Literal::new(p, vec![], true)])];

    let path = std::env::temp_dir().join("talon-fmb-dimacs-test");
    let config = FmbConfig {
        spider: true,
        dimacs_path: Some(path.clone()),
        ..FmbConfig::default()
    };
    let mut fmb = FiniteModelBuilder::new(&sig, clauses, config);
    assert!(matches!(fmb.run(), FmbOutcome::Satisfiable { size: 1, .. }));

    let emitted = format!("{}.1", path.display());
    let text = std::fs::read_to_string(&emitted).expect("DIMACS file written");
    assert!(text.starts_with("p cnf "));
    let _ = std::fs::remove_file(&emitted);
}
