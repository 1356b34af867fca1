//! Logical terms: the expression half of the planning language.
//!
//! A term is a tagged variant rather than a class hierarchy; shared
//! behaviour (interpretation, binding, bounds, subterm traversal) is an
//! exhaustive match, which keeps dispatch out of the hot loop. Trees are
//! pure data: the argument scratch buffer for nested terms lives on the
//! interpreter's stack, so interpretation is re-entrant and trees can be
//! shared read-only across threads.

use smallvec::SmallVec;

use crate::binding::Binding;
use crate::error::LangError;
use crate::external;
use crate::info::ProblemInfo;
use crate::object::{Object, TypeIdx, VariableIdx};
use crate::symbol::{SymbolIdx, SymbolKind};
use crate::state::Valuation;

/// Head of a statically-interpreted nested term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    /// A user-supplied symbol, interpreted through the problem's
    /// extensional data or the external function registry.
    Symbol(SymbolIdx),
}

impl StaticOp {
    pub fn name(&self) -> &'static str {
        match self {
            StaticOp::Add => "+",
            StaticOp::Sub => "-",
            StaticOp::Mul => "*",
            StaticOp::Div => "/",
            StaticOp::Min => "min",
            StaticOp::Max => "max",
            StaticOp::Symbol(_) => "<symbol>",
        }
    }
}

/// A logical term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// A fixed value, independent of state and binding.
    Constant(Object),
    /// A variable bound by an enclosing quantifier or action schema.
    BoundVariable { id: u32, ty: TypeIdx },
    /// A consolidated ground fluent: reads `state[var]` directly.
    StateVariable { var: VariableIdx },
    /// A fluent application `f(t1..tn)`: subterms are interpreted first,
    /// the resulting tuple indexes the state.
    Fluent {
        symbol: SymbolIdx,
        subterms: Vec<Term>,
    },
    /// A statically-interpreted application: a pure function of the
    /// subterm values.
    Static {
        op: StaticOp,
        subterms: Vec<Term>,
    },
}

impl Term {
    /// True for terms that need no recursive interpretation.
    pub fn is_flat(&self) -> bool {
        matches!(
            self,
            Term::Constant(_) | Term::BoundVariable { .. } | Term::StateVariable { .. }
        )
    }

    /// Nesting depth; fluent heads add a level, static heads do not.
    pub fn nestedness(&self) -> u32 {
        match self {
            Term::Constant(_) | Term::StateVariable { .. } => 0,
            Term::BoundVariable { .. } => 1,
            Term::Fluent { subterms, .. } => {
                1 + subterms.iter().map(Term::nestedness).max().unwrap_or(0)
            }
            Term::Static { subterms, .. } => {
                subterms.iter().map(Term::nestedness).max().unwrap_or(0)
            }
        }
    }

    /// All contained terms, including self, in preorder.
    pub fn all_terms(&self) -> Vec<&Term> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a Term>) {
        out.push(self);
        match self {
            Term::Fluent { subterms, .. } | Term::Static { subterms, .. } => {
                for sub in subterms {
                    sub.collect_terms(out);
                }
            }
            _ => {}
        }
    }

    /// Ids of free bound-variables in this term.
    pub fn free_variables(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for term in self.all_terms() {
            if let Term::BoundVariable { id, .. } = term {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
        }
        out
    }

    /// The value of the term under the given valuation and binding.
    pub fn interpret(
        &self,
        valuation: &dyn Valuation,
        binding: &Binding,
        info: &ProblemInfo,
    ) -> Result<Object, LangError> {
        match self {
            Term::Constant(value) => Ok(*value),
            Term::BoundVariable { id, .. } => binding
                .value(*id)
                .ok_or(LangError::UnboundVariable(*id)),
            Term::StateVariable { var } => valuation.read(*var),
            Term::Fluent { symbol, subterms } => {
                let args = interpret_subterms(subterms, valuation, binding, info)?;
                let var = info.resolve_variable(*symbol, &args)?;
                valuation.read(var)
            }
            Term::Static { op, subterms } => {
                let args = interpret_subterms(subterms, valuation, binding, info)?;
                apply_static(*op, &args, info)
            }
        }
    }

    /// The state variable the term resolves to under the given valuation.
    /// Only fluent-headed terms and state variables can resolve.
    pub fn interpret_variable(
        &self,
        valuation: &dyn Valuation,
        binding: &Binding,
        info: &ProblemInfo,
    ) -> Result<VariableIdx, LangError> {
        match self {
            Term::StateVariable { var } => Ok(*var),
            Term::Fluent { symbol, subterms } => {
                let args = interpret_subterms(subterms, valuation, binding, info)?;
                info.resolve_variable(*symbol, &args)
            }
            other => Err(LangError::TypeMismatch {
                expected: "fluent-headed term",
                found: other.kind_name(),
            }),
        }
    }

    /// Substitute bound variables present in `binding` by constants,
    /// consolidating fully-ground fluent applications into state
    /// variables and folding constant arithmetic. Returns a new tree.
    pub fn bind(&self, binding: &Binding, info: &ProblemInfo) -> Result<Term, LangError> {
        match self {
            Term::Constant(_) | Term::StateVariable { .. } => Ok(self.clone()),
            Term::BoundVariable { id, .. } => match binding.value(*id) {
                Some(value) => Ok(Term::Constant(value)),
                None => Ok(self.clone()),
            },
            Term::Fluent { symbol, subterms } => {
                let bound = bind_subterms(subterms, binding, info)?;
                if let Some(args) = constant_values(&bound) {
                    let var = info.resolve_variable(*symbol, &args)?;
                    Ok(Term::StateVariable { var })
                } else {
                    Ok(Term::Fluent {
                        symbol: *symbol,
                        subterms: bound,
                    })
                }
            }
            Term::Static { op, subterms } => {
                let bound = bind_subterms(subterms, binding, info)?;
                if !matches!(op, StaticOp::Symbol(_)) {
                    if let Some(args) = constant_values(&bound) {
                        if let Ok(folded) = apply_static(*op, &args, info) {
                            return Ok(Term::Constant(folded));
                        }
                    }
                }
                Ok(Term::Static {
                    op: *op,
                    subterms: bound,
                })
            }
        }
    }

    /// Sound integer bounds on the term's value.
    pub fn bounds(&self, info: &ProblemInfo) -> (i64, i64) {
        match self {
            Term::Constant(value) => {
                let v = value.feature_value() as i64;
                (v, v)
            }
            Term::BoundVariable { ty, .. } => info.type_info(*ty).bounds(),
            Term::StateVariable { var } => info.type_info(info.variable_type(*var)).bounds(),
            Term::Fluent { symbol, .. } => info
                .type_info(info.symbols().info(*symbol).return_type)
                .bounds(),
            Term::Static { op, subterms } => match op {
                StaticOp::Symbol(symbol) => info
                    .type_info(info.symbols().info(*symbol).return_type)
                    .bounds(),
                _ => {
                    let lhs = subterms[0].bounds(info);
                    let rhs = subterms
                        .get(1)
                        .map(|t| t.bounds(info))
                        .unwrap_or(lhs);
                    combine_bounds(*op, lhs, rhs)
                }
            },
        }
    }

    /// The declared return type, where one exists.
    pub fn return_type(&self, info: &ProblemInfo) -> Option<TypeIdx> {
        match self {
            Term::Constant(value) => info.type_of(value),
            Term::BoundVariable { ty, .. } => Some(*ty),
            Term::StateVariable { var } => Some(info.variable_type(*var)),
            Term::Fluent { symbol, .. } => Some(info.symbols().info(*symbol).return_type),
            Term::Static { op, .. } => match op {
                StaticOp::Symbol(symbol) => Some(info.symbols().info(*symbol).return_type),
                _ => None,
            },
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Term::Constant(_) => "constant",
            Term::BoundVariable { .. } => "bound variable",
            Term::StateVariable { .. } => "state variable",
            Term::Fluent { .. } => "fluent term",
            Term::Static { .. } => "static term",
        }
    }

    /// Boundary-only renderer.
    pub fn format(&self, info: &ProblemInfo) -> String {
        match self {
            Term::Constant(value) => info.format_object(value),
            Term::BoundVariable { id, .. } => format!("?{}", id),
            Term::StateVariable { var } => info.format_variable(*var),
            Term::Fluent { symbol, subterms } => {
                format_application(info.symbols().name(*symbol), subterms, info)
            }
            Term::Static { op, subterms } => {
                let name = match op {
                    StaticOp::Symbol(symbol) => info.symbols().name(*symbol),
                    other => other.name(),
                };
                format_application(name, subterms, info)
            }
        }
    }
}

fn format_application(name: &str, subterms: &[Term], info: &ProblemInfo) -> String {
    let mut out = String::from(name);
    out.push('(');
    for (i, sub) in subterms.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&sub.format(info));
    }
    out.push(')');
    out
}

/// Interpret a subterm list into an arity-sized stack buffer.
pub fn interpret_subterms(
    subterms: &[Term],
    valuation: &dyn Valuation,
    binding: &Binding,
    info: &ProblemInfo,
) -> Result<SmallVec<[Object; 4]>, LangError> {
    let mut out = SmallVec::with_capacity(subterms.len());
    for sub in subterms {
        out.push(sub.interpret(valuation, binding, info)?);
    }
    Ok(out)
}

fn bind_subterms(
    subterms: &[Term],
    binding: &Binding,
    info: &ProblemInfo,
) -> Result<Vec<Term>, LangError> {
    subterms.iter().map(|t| t.bind(binding, info)).collect()
}

/// If every term is a constant, their values.
fn constant_values(subterms: &[Term]) -> Option<SmallVec<[Object; 4]>> {
    let mut out = SmallVec::with_capacity(subterms.len());
    for sub in subterms {
        match sub {
            Term::Constant(value) => out.push(*value),
            _ => return None,
        }
    }
    Some(out)
}

fn apply_static(op: StaticOp, args: &[Object], info: &ProblemInfo) -> Result<Object, LangError> {
    match op {
        StaticOp::Symbol(symbol) => {
            let sym_info = info.symbols().info(symbol);
            if sym_info.kind == SymbolKind::External {
                external::registry().eval_function(info.symbols().name(symbol), args)
            } else {
                info.static_value(symbol, args)
            }
        }
        _ => apply_arithmetic(op, args),
    }
}

fn apply_arithmetic(op: StaticOp, args: &[Object]) -> Result<Object, LangError> {
    if args.len() != 2 {
        return Err(LangError::Arithmetic("expected two operands"));
    }
    match (args[0], args[1]) {
        (Object::Int(a), Object::Int(b)) => {
            let v = match op {
                StaticOp::Add => a.checked_add(b).ok_or(LangError::Arithmetic("overflow"))?,
                StaticOp::Sub => a.checked_sub(b).ok_or(LangError::Arithmetic("overflow"))?,
                StaticOp::Mul => a.checked_mul(b).ok_or(LangError::Arithmetic("overflow"))?,
                StaticOp::Div => a.checked_div(b).ok_or(if b == 0 {
                    LangError::Arithmetic("division by zero")
                } else {
                    LangError::Arithmetic("overflow")
                })?,
                StaticOp::Min => a.min(b),
                StaticOp::Max => a.max(b),
                StaticOp::Symbol(_) => unreachable!(),
            };
            Ok(Object::Int(v))
        }
        (Object::Float(a), Object::Float(b)) => {
            let v = match op {
                StaticOp::Add => a + b,
                StaticOp::Sub => a - b,
                StaticOp::Mul => a * b,
                StaticOp::Div => {
                    if b == 0.0 {
                        return Err(LangError::Arithmetic("division by zero"));
                    }
                    a / b
                }
                StaticOp::Min => a.min(b),
                StaticOp::Max => a.max(b),
                StaticOp::Symbol(_) => unreachable!(),
            };
            Ok(Object::Float(v))
        }
        (a, b) => Err(LangError::TypeMismatch {
            expected: a.tag(),
            found: b.tag(),
        }),
    }
}

/// Interval arithmetic over subterm bounds. Never tighter than the true
/// range.
fn combine_bounds(op: StaticOp, lhs: (i64, i64), rhs: (i64, i64)) -> (i64, i64) {
    match op {
        StaticOp::Add => (lhs.0.saturating_add(rhs.0), lhs.1.saturating_add(rhs.1)),
        StaticOp::Sub => (lhs.0.saturating_sub(rhs.1), lhs.1.saturating_sub(rhs.0)),
        StaticOp::Mul => {
            let candidates = [
                lhs.0.saturating_mul(rhs.0),
                lhs.0.saturating_mul(rhs.1),
                lhs.1.saturating_mul(rhs.0),
                lhs.1.saturating_mul(rhs.1),
            ];
            (
                *candidates.iter().min().unwrap(),
                *candidates.iter().max().unwrap(),
            )
        }
        StaticOp::Div => {
            if rhs.0 <= 0 && rhs.1 >= 0 {
                (i64::MIN, i64::MAX)
            } else {
                let quotients = [
                    lhs.0.checked_div(rhs.0),
                    lhs.0.checked_div(rhs.1),
                    lhs.1.checked_div(rhs.0),
                    lhs.1.checked_div(rhs.1),
                ];
                // i64::MIN / -1 overflows; widen to the full range.
                if quotients.iter().any(|q| q.is_none()) {
                    return (i64::MIN, i64::MAX);
                }
                let candidates = quotients.map(Option::unwrap);
                (
                    *candidates.iter().min().unwrap(),
                    *candidates.iter().max().unwrap(),
                )
            }
        }
        StaticOp::Min => (lhs.0.min(rhs.0), lhs.1.min(rhs.1)),
        StaticOp::Max => (lhs.0.max(rhs.0), lhs.1.max(rhs.1)),
        StaticOp::Symbol(_) => (i64::MIN, i64::MAX),
    }
}

#[cfg(test)]
#[path = "tests/term.rs"]
mod tests;
