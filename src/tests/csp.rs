use smallvec::smallvec;

use crate::csp::{Csp, Operand, SchemaCsp};
use crate::formula::Comparator;
use crate::object::Object;
use crate::state::State;
use crate::test_utils::{pick_problem, ITEM};

#[test]
fn interval_vars_enumerate_in_order() {
    let mut csp = Csp::new();
    csp.new_interval_var(0, 2).unwrap();
    let solutions = csp.solve_all();
    assert_eq!(solutions, vec![vec![0], vec![1], vec![2]]);
}

#[test]
fn oversized_intervals_are_rejected() {
    let mut csp = Csp::new();
    assert!(csp.new_interval_var(0, i64::MAX).is_err());
    assert!(csp.new_interval_var(5, 4).is_err());
}

#[test]
fn relational_constraints_prune() {
    let mut csp = Csp::new();
    let x = csp.new_interval_var(0, 3).unwrap();
    let y = csp.new_interval_var(0, 3).unwrap();
    csp.post_rel(Comparator::Lt, Operand::Var(x), Operand::Var(y));
    csp.post_rel(Comparator::Geq, Operand::Var(x), Operand::Const(2));

    let solutions = csp.solve_all();
    // x >= 2 and x < y over [0,3] leaves exactly x=2, y=3.
    assert_eq!(solutions, vec![vec![2, 3]]);
}

#[test]
fn propagation_narrows_without_branching() {
    let mut csp = Csp::new();
    let x = csp.new_interval_var(0, 9).unwrap();
    csp.post_rel(Comparator::Leq, Operand::Var(x), Operand::Const(3));
    csp.post_rel(Comparator::Neq, Operand::Var(x), Operand::Const(0));

    let domains = csp.propagate().unwrap();
    assert_eq!(domains[x.index()], vec![1, 2, 3]);
}

#[test]
fn inconsistent_problems_propagate_to_empty() {
    let mut csp = Csp::new();
    let x = csp.new_interval_var(0, 3).unwrap();
    csp.post_rel(Comparator::Gt, Operand::Var(x), Operand::Const(5));
    assert!(csp.propagate().is_err());
    assert!(csp.solve_all().is_empty());
}

#[test]
fn table_constraints_restrict_to_listed_tuples() {
    let mut csp = Csp::new();
    let x = csp.new_interval_var(0, 2).unwrap();
    let y = csp.new_interval_var(0, 2).unwrap();
    csp.post_table(
        smallvec![x, y],
        vec![smallvec![0, 1], smallvec![2, 0]],
    );

    let solutions = csp.solve_all();
    assert_eq!(solutions, vec![vec![0, 1], vec![2, 0]]);
}

#[test]
fn schema_csp_enumerates_applicable_bindings() {
    let problem = pick_problem(3, &[1]);
    let schema = &problem.schemas[0];
    let csp = SchemaCsp::build(&schema.signature, &schema.precondition, &problem.info)
        .expect("pick precondition is CSP-translatable");

    let matches = csp.matches(&problem.init, &problem.info);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].binding.value(0), Some(Object::Obj(1)));

    // The support is the state atom backing the fluent subterm.
    let at = problem.info.symbols().get("at").unwrap();
    let var = problem
        .info
        .resolve_variable(at, &[Object::Obj(1)])
        .unwrap();
    assert_eq!(matches[0].supports.as_slice(), &[(var, Object::Bool(true))]);
}

#[test]
fn schema_csp_refreshes_tables_per_state() {
    let problem = pick_problem(3, &[1]);
    let schema = &problem.schemas[0];
    let csp = SchemaCsp::build(&schema.signature, &schema.precondition, &problem.info).unwrap();

    // After picking o1 nothing is applicable; after placing everything,
    // all three bindings are, in ascending parameter order.
    let empty = State::new(vec![Object::Bool(false); 3]);
    assert!(csp.matches(&empty, &problem.info).is_empty());

    let full = State::new(vec![Object::Bool(true); 3]);
    let matches = csp.matches(&full, &problem.info);
    let params: Vec<_> = matches.iter().map(|m| m.binding.value(0).unwrap()).collect();
    assert_eq!(
        params,
        vec![Object::Obj(0), Object::Obj(1), Object::Obj(2)]
    );
}

#[test]
fn unsupported_preconditions_fall_back() {
    // A universally quantified precondition is outside the CSP fragment.
    let problem = pick_problem(2, &[0]);
    let forall = problem.goal.clone();
    assert!(SchemaCsp::build(&[ITEM], &forall, &problem.info).is_none());
}
