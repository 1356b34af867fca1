use smallvec::smallvec;

use crate::binding::Binding;
use crate::error::LangError;
use crate::info::{ProblemInfo, TypeInfo, TypeKind};
use crate::object::{Object, TypeIdx};
use crate::state::{PartialAssignment, State};
use crate::symbol::{SymbolKind, SymbolTable};
use crate::term::{StaticOp, Term};

const BOOL: TypeIdx = TypeIdx::new(0);
const BLOCK: TypeIdx = TypeIdx::new(1);
const COUNT: TypeIdx = TypeIdx::new(2);
const MEASURE: TypeIdx = TypeIdx::new(3);

/// Two blocks, a boolean fluent `clear(block)` and an integer fluent
/// `height(block)` with all four state variables registered.
fn fixture() -> ProblemInfo {
    let mut symbols = SymbolTable::new();
    symbols.declare("clear", SymbolKind::Fluent, smallvec![BLOCK], BOOL);
    symbols.declare("height", SymbolKind::Fluent, smallvec![BLOCK], COUNT);
    let types = vec![
        TypeInfo {
            name: "bool".to_string(),
            kind: TypeKind::Bool,
            objects: vec![Object::Bool(false), Object::Bool(true)],
        },
        TypeInfo {
            name: "block".to_string(),
            kind: TypeKind::Object,
            objects: vec![Object::Obj(0), Object::Obj(1)],
        },
        TypeInfo {
            name: "count".to_string(),
            kind: TypeKind::Int { lb: 0, ub: 10 },
            objects: (0..=10).map(Object::Int).collect(),
        },
        TypeInfo {
            name: "measure".to_string(),
            kind: TypeKind::Float,
            objects: Vec::new(),
        },
    ];
    let mut info = ProblemInfo::new(
        symbols,
        types,
        vec![BLOCK, BLOCK],
        vec!["a".to_string(), "b".to_string()],
    );
    let clear = info.symbols().get("clear").unwrap();
    let height = info.symbols().get("height").unwrap();
    info.add_variable(clear, smallvec![Object::Obj(0)]);
    info.add_variable(clear, smallvec![Object::Obj(1)]);
    info.add_variable(height, smallvec![Object::Obj(0)]);
    info.add_variable(height, smallvec![Object::Obj(1)]);
    info
}

/// clear(a)=true, clear(b)=false, height(a)=3, height(b)=7.
fn fixture_state() -> State {
    State::new(vec![
        Object::Bool(true),
        Object::Bool(false),
        Object::Int(3),
        Object::Int(7),
    ])
}

fn fluent(info: &ProblemInfo, name: &str, sub: Term) -> Term {
    Term::Fluent {
        symbol: info.symbols().get(name).unwrap(),
        subterms: vec![sub],
    }
}

#[test]
fn constant_ignores_state_and_binding() {
    let info = fixture();
    let state = fixture_state();
    let term = Term::Constant(Object::Int(42));
    let value = term.interpret(&state, &Binding::empty(), &info).unwrap();
    assert_eq!(value, Object::Int(42));
}

#[test]
fn bound_variable_requires_a_binding() {
    let info = fixture();
    let state = fixture_state();
    let term = Term::BoundVariable { id: 0, ty: BLOCK };

    let err = term.interpret(&state, &Binding::empty(), &info);
    assert_eq!(err, Err(LangError::UnboundVariable(0)));

    let binding = Binding::from_values([Object::Obj(1)]);
    assert_eq!(
        term.interpret(&state, &binding, &info).unwrap(),
        Object::Obj(1)
    );
}

#[test]
fn fluent_term_composes_subterms_then_reads_state() {
    let info = fixture();
    let state = fixture_state();
    let term = fluent(&info, "height", Term::BoundVariable { id: 0, ty: BLOCK });
    let binding = Binding::from_values([Object::Obj(1)]);
    assert_eq!(
        term.interpret(&state, &binding, &info).unwrap(),
        Object::Int(7)
    );
}

#[test]
fn partial_assignment_fails_on_unset_variable() {
    let info = fixture();
    let term = fluent(&info, "clear", Term::Constant(Object::Obj(1)));
    let partial = PartialAssignment::with_size(4);
    let err = term.interpret(&partial, &Binding::empty(), &info);
    assert!(matches!(err, Err(LangError::UnassignedVariable(_))));
}

#[test]
fn arithmetic_static_terms_evaluate() {
    let info = fixture();
    let state = fixture_state();
    let sum = Term::Static {
        op: StaticOp::Add,
        subterms: vec![
            fluent(&info, "height", Term::Constant(Object::Obj(0))),
            fluent(&info, "height", Term::Constant(Object::Obj(1))),
        ],
    };
    assert_eq!(
        sum.interpret(&state, &Binding::empty(), &info).unwrap(),
        Object::Int(10)
    );
}

#[test]
fn division_by_zero_is_an_error() {
    let info = fixture();
    let state = fixture_state();
    let term = Term::Static {
        op: StaticOp::Div,
        subterms: vec![
            Term::Constant(Object::Int(1)),
            Term::Constant(Object::Int(0)),
        ],
    };
    assert!(matches!(
        term.interpret(&state, &Binding::empty(), &info),
        Err(LangError::Arithmetic(_))
    ));
}

#[test]
fn int_min_division_overflow_is_distinguished() {
    let info = fixture();
    let state = fixture_state();
    let term = Term::Static {
        op: StaticOp::Div,
        subterms: vec![
            Term::Constant(Object::Int(i32::MIN)),
            Term::Constant(Object::Int(-1)),
        ],
    };
    assert_eq!(
        term.interpret(&state, &Binding::empty(), &info),
        Err(LangError::Arithmetic("overflow"))
    );
}

#[test]
fn mixed_tag_arithmetic_is_a_type_mismatch() {
    let info = fixture();
    let state = fixture_state();
    let term = Term::Static {
        op: StaticOp::Add,
        subterms: vec![
            Term::Constant(Object::Int(1)),
            Term::Constant(Object::Float(1.0)),
        ],
    };
    assert!(matches!(
        term.interpret(&state, &Binding::empty(), &info),
        Err(LangError::TypeMismatch { .. })
    ));
}

#[test]
fn bind_substitutes_and_consolidates_state_variables() {
    let info = fixture();
    let term = fluent(&info, "clear", Term::BoundVariable { id: 0, ty: BLOCK });
    let binding = Binding::from_values([Object::Obj(0)]);

    let bound = term.bind(&binding, &info).unwrap();
    let clear = info.symbols().get("clear").unwrap();
    let expected = info.resolve_variable(clear, &[Object::Obj(0)]).unwrap();
    assert_eq!(bound, Term::StateVariable { var: expected });
}

#[test]
fn bind_leaves_unbound_variables_open() {
    let info = fixture();
    let term = fluent(&info, "clear", Term::BoundVariable { id: 3, ty: BLOCK });
    let bound = term.bind(&Binding::empty(), &info).unwrap();
    assert_eq!(bound, term);
}

#[test]
fn bind_folds_constant_arithmetic() {
    let info = fixture();
    let term = Term::Static {
        op: StaticOp::Mul,
        subterms: vec![
            Term::BoundVariable { id: 0, ty: COUNT },
            Term::Constant(Object::Int(3)),
        ],
    };
    let binding = Binding::from_values([Object::Int(4)]);
    assert_eq!(
        term.bind(&binding, &info).unwrap(),
        Term::Constant(Object::Int(12))
    );
}

#[test]
fn bind_agrees_with_direct_interpretation() {
    // F.bind(B).interpret(S) == F.interpret(S, B)
    let info = fixture();
    let state = fixture_state();
    let term = Term::Static {
        op: StaticOp::Max,
        subterms: vec![
            fluent(&info, "height", Term::BoundVariable { id: 0, ty: BLOCK }),
            Term::Constant(Object::Int(5)),
        ],
    };
    let binding = Binding::from_values([Object::Obj(0)]);

    let direct = term.interpret(&state, &binding, &info).unwrap();
    let via_bind = term
        .bind(&binding, &info)
        .unwrap()
        .interpret(&state, &Binding::empty(), &info)
        .unwrap();
    assert_eq!(direct, via_bind);
}

#[test]
fn clone_is_idempotent_under_structural_equality() {
    let info = fixture();
    let term = fluent(&info, "height", Term::BoundVariable { id: 1, ty: BLOCK });
    #[allow(clippy::redundant_clone)]
    let once = term.clone();
    assert_eq!(once.clone(), once);
}

#[test]
fn bounds_are_sound() {
    let info = fixture();

    assert_eq!(Term::Constant(Object::Int(9)).bounds(&info), (9, 9));

    let height = fluent(&info, "height", Term::Constant(Object::Obj(0)));
    assert_eq!(height.bounds(&info), (0, 10));

    let sum = Term::Static {
        op: StaticOp::Add,
        subterms: vec![height.clone(), height.clone()],
    };
    assert_eq!(sum.bounds(&info), (0, 20));

    let diff = Term::Static {
        op: StaticOp::Sub,
        subterms: vec![height.clone(), height.clone()],
    };
    assert_eq!(diff.bounds(&info), (-10, 10));

    let negated = Term::Static {
        op: StaticOp::Div,
        subterms: vec![height, Term::Constant(Object::Int(-1))],
    };
    assert_eq!(negated.bounds(&info), (-10, 0));
}

#[test]
fn division_bounds_never_panic_on_extreme_intervals() {
    let info = fixture();
    // A float-typed operand spans the full integer range; dividing it by
    // an interval containing -1 must widen instead of overflowing.
    let wide = Term::BoundVariable { id: 0, ty: MEASURE };
    assert_eq!(wide.bounds(&info), (i64::MIN, i64::MAX));

    let quotient = Term::Static {
        op: StaticOp::Div,
        subterms: vec![wide.clone(), Term::Constant(Object::Int(-1))],
    };
    assert_eq!(quotient.bounds(&info), (i64::MIN, i64::MAX));

    // A divisor interval spanning zero also widens.
    let spanning = Term::Static {
        op: StaticOp::Div,
        subterms: vec![Term::Constant(Object::Int(4)), wide],
    };
    assert_eq!(spanning.bounds(&info), (i64::MIN, i64::MAX));
}

#[test]
fn all_terms_walks_the_tree_in_preorder() {
    let info = fixture();
    let inner = Term::BoundVariable { id: 0, ty: BLOCK };
    let term = fluent(&info, "height", inner.clone());
    let all = term.all_terms();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0], &term);
    assert_eq!(all[1], &inner);
    assert_eq!(term.free_variables(), vec![0]);
}

#[test]
fn interpret_variable_resolves_fluent_heads_only() {
    let info = fixture();
    let state = fixture_state();
    let term = fluent(&info, "clear", Term::Constant(Object::Obj(1)));
    let clear = info.symbols().get("clear").unwrap();
    let expected = info.resolve_variable(clear, &[Object::Obj(1)]).unwrap();
    assert_eq!(
        term.interpret_variable(&state, &Binding::empty(), &info)
            .unwrap(),
        expected
    );

    let err = Term::Constant(Object::Int(1)).interpret_variable(&state, &Binding::empty(), &info);
    assert!(matches!(err, Err(LangError::TypeMismatch { .. })));
}
