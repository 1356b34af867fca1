use smallvec::{smallvec, SmallVec};

use crate::action::{ActionSchema, Effect, EffectKind};
use crate::formula::{BoundVarDecl, Comparator, Formula};
use crate::info::{ProblemInfo, TypeInfo, TypeKind};
use crate::object::{Object, TypeIdx};
use crate::problem::Problem;
use crate::state::State;
use crate::symbol::{SymbolKind, SymbolTable};
use crate::term::Term;

pub(crate) const BOOL: TypeIdx = TypeIdx::new(0);
pub(crate) const ITEM: TypeIdx = TypeIdx::new(1);

pub(crate) fn bool_type() -> TypeInfo {
    TypeInfo {
        name: "bool".to_string(),
        kind: TypeKind::Bool,
        objects: vec![Object::Bool(false), Object::Bool(true)],
    }
}

pub(crate) fn item_type(n: u32) -> TypeInfo {
    TypeInfo {
        name: "item".to_string(),
        kind: TypeKind::Object,
        objects: (0..n).map(Object::Obj).collect(),
    }
}

pub(crate) fn eq(lhs: Term, rhs: Term) -> Formula {
    Formula::Relation {
        cmp: Comparator::Eq,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub(crate) fn fluent(info: &ProblemInfo, name: &str, subterms: Vec<Term>) -> Term {
    Term::Fluent {
        symbol: info.symbols().get(name).unwrap(),
        subterms,
    }
}

/// Nullary boolean fluents, one state variable each, all false initially.
pub(crate) fn switches_info(names: &[&str]) -> ProblemInfo {
    let mut symbols = SymbolTable::new();
    for name in names {
        symbols.declare(name, SymbolKind::Fluent, SmallVec::new(), BOOL);
    }
    let mut info = ProblemInfo::new(symbols, vec![bool_type()], Vec::new(), Vec::new());
    for name in names {
        let sym = info.symbols().get(name).unwrap();
        info.add_variable(sym, SmallVec::new());
    }
    info
}

/// An unconditional schema that makes the named switch true.
pub(crate) fn set_action(info: &ProblemInfo, switch: &str) -> ActionSchema {
    ActionSchema {
        name: format!("set_{}", switch),
        signature: SmallVec::new(),
        param_names: Vec::new(),
        precondition: Formula::Tautology,
        effects: vec![Effect::unconditional(EffectKind::Add {
            lhs: fluent(info, switch, Vec::new()),
        })],
    }
}

/// S3-style problem: independent boolean switches, goal = all true.
pub(crate) fn switches_problem(names: &[&str]) -> Problem {
    let info = switches_info(names);
    let init = State::new(vec![Object::Bool(false); names.len()]);
    let schemas = names.iter().map(|n| set_action(&info, n)).collect();
    let goal = Formula::And(
        names
            .iter()
            .map(|n| eq(fluent(&info, n, Vec::new()), Term::Constant(Object::Bool(true))))
            .collect(),
    );
    Problem::new(info, init, schemas, goal, None)
}

/// S4-style problem: items o0..o{n-1}, fluent `at(item)`, schema
/// `pick(x)` with precondition `at(x)` and effect `at(x) := false`,
/// goal `forall x. at(x) = false`.
pub(crate) fn pick_problem(n: u32, initially_at: &[u32]) -> Problem {
    let mut symbols = SymbolTable::new();
    symbols.declare("at", SymbolKind::Fluent, smallvec![ITEM], BOOL);
    let object_names = (0..n).map(|i| format!("o{}", i)).collect();
    let mut info = ProblemInfo::new(
        symbols,
        vec![bool_type(), item_type(n)],
        vec![ITEM; n as usize],
        object_names,
    );
    let at = info.symbols().get("at").unwrap();
    for i in 0..n {
        info.add_variable(at, smallvec![Object::Obj(i)]);
    }

    let init = State::new(
        (0..n)
            .map(|i| Object::Bool(initially_at.contains(&i)))
            .collect(),
    );

    let param = Term::BoundVariable { id: 0, ty: ITEM };
    let schema = ActionSchema {
        name: "pick".to_string(),
        signature: smallvec![ITEM],
        param_names: vec!["x".to_string()],
        precondition: eq(
            fluent(&info, "at", vec![param.clone()]),
            Term::Constant(Object::Bool(true)),
        ),
        effects: vec![Effect::unconditional(EffectKind::Delete {
            lhs: fluent(&info, "at", vec![param]),
        })],
    };

    let goal = Formula::Forall {
        vars: vec![BoundVarDecl { id: 0, ty: ITEM }],
        body: Box::new(eq(
            fluent(&info, "at", vec![Term::BoundVariable { id: 0, ty: ITEM }]),
            Term::Constant(Object::Bool(false)),
        )),
    };

    Problem::new(info, init, vec![schema], goal, None)
}
