//! Logical formulas over terms.
//!
//! Like terms, formulas are a tagged variant with exhaustive-match
//! dispatch. Quantifiers enumerate the Cartesian product of their bound
//! variables' type universes in declared order, copying the binding at
//! each recursion level so sibling branches never interfere.

use crate::binding::Binding;
use crate::error::LangError;
use crate::external;
use crate::info::ProblemInfo;
use crate::object::{Object, TypeIdx};
use crate::symbol::SymbolIdx;
use crate::state::Valuation;
use crate::term::{interpret_subterms, Term};

/// Comparison operator of an atomic relational formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl Comparator {
    /// Apply the comparator to two values. Equality demands matching tags;
    /// order comparisons demand same-tag numeric values.
    pub fn apply(&self, lhs: Object, rhs: Object) -> Result<bool, LangError> {
        match self {
            Comparator::Eq | Comparator::Neq => {
                if lhs.tag() != rhs.tag() {
                    return Err(LangError::TypeMismatch {
                        expected: lhs.tag(),
                        found: rhs.tag(),
                    });
                }
                let equal = lhs == rhs;
                Ok(if matches!(self, Comparator::Eq) {
                    equal
                } else {
                    !equal
                })
            }
            ordered => {
                let ord = lhs.partial_cmp_numeric(&rhs)?;
                Ok(match ordered {
                    Comparator::Lt => ord.is_lt(),
                    Comparator::Leq => ord.is_le(),
                    Comparator::Gt => ord.is_gt(),
                    Comparator::Geq => ord.is_ge(),
                    Comparator::Eq | Comparator::Neq => unreachable!(),
                })
            }
        }
    }

    pub fn negated(&self) -> Comparator {
        match self {
            Comparator::Eq => Comparator::Neq,
            Comparator::Neq => Comparator::Eq,
            Comparator::Lt => Comparator::Geq,
            Comparator::Leq => Comparator::Gt,
            Comparator::Gt => Comparator::Leq,
            Comparator::Geq => Comparator::Lt,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Neq => "!=",
            Comparator::Lt => "<",
            Comparator::Leq => "<=",
            Comparator::Gt => ">",
            Comparator::Geq => ">=",
        }
    }
}

/// Descriptor of a quantifier-bound variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundVarDecl {
    pub id: u32,
    pub ty: TypeIdx,
}

/// A logical formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    Tautology,
    Contradiction,
    /// `lhs <cmp> rhs`
    Relation {
        cmp: Comparator,
        lhs: Box<Term>,
        rhs: Box<Term>,
    },
    /// An externally-defined predicate atom, dispatched by symbol name.
    External {
        symbol: SymbolIdx,
        subterms: Vec<Term>,
    },
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Exists {
        vars: Vec<BoundVarDecl>,
        body: Box<Formula>,
    },
    Forall {
        vars: Vec<BoundVarDecl>,
        body: Box<Formula>,
    },
}

impl Formula {
    /// Truth value under the given valuation and binding.
    pub fn interpret(
        &self,
        valuation: &dyn Valuation,
        binding: &Binding,
        info: &ProblemInfo,
    ) -> Result<bool, LangError> {
        match self {
            Formula::Tautology => Ok(true),
            Formula::Contradiction => Ok(false),
            Formula::Relation { cmp, lhs, rhs } => {
                let l = lhs.interpret(valuation, binding, info)?;
                let r = rhs.interpret(valuation, binding, info)?;
                cmp.apply(l, r)
            }
            Formula::External { symbol, subterms } => {
                let args = interpret_subterms(subterms, valuation, binding, info)?;
                external::registry().eval_predicate(info.symbols().name(*symbol), valuation, &args)
            }
            Formula::Not(inner) => Ok(!inner.interpret(valuation, binding, info)?),
            Formula::And(parts) => {
                for part in parts {
                    if !part.interpret(valuation, binding, info)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Formula::Or(parts) => {
                for part in parts {
                    if part.interpret(valuation, binding, info)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Formula::Exists { vars, body } => {
                enumerate_quantifier(vars, body, valuation, binding, info, true)
            }
            Formula::Forall { vars, body } => {
                enumerate_quantifier(vars, body, valuation, binding, info, false)
            }
        }
    }

    /// Substitute bound variables present in `binding` by constants,
    /// consolidating state variables in all contained terms. Returns a
    /// new tree; quantifier binders are untouched.
    pub fn bind(&self, binding: &Binding, info: &ProblemInfo) -> Result<Formula, LangError> {
        match self {
            Formula::Tautology | Formula::Contradiction => Ok(self.clone()),
            Formula::Relation { cmp, lhs, rhs } => Ok(Formula::Relation {
                cmp: *cmp,
                lhs: Box::new(lhs.bind(binding, info)?),
                rhs: Box::new(rhs.bind(binding, info)?),
            }),
            Formula::External { symbol, subterms } => Ok(Formula::External {
                symbol: *symbol,
                subterms: subterms
                    .iter()
                    .map(|t| t.bind(binding, info))
                    .collect::<Result<_, _>>()?,
            }),
            Formula::Not(inner) => Ok(Formula::Not(Box::new(inner.bind(binding, info)?))),
            Formula::And(parts) => Ok(Formula::And(bind_parts(parts, binding, info)?)),
            Formula::Or(parts) => Ok(Formula::Or(bind_parts(parts, binding, info)?)),
            Formula::Exists { vars, body } => Ok(Formula::Exists {
                vars: vars.clone(),
                body: Box::new(body.bind(binding, info)?),
            }),
            Formula::Forall { vars, body } => Ok(Formula::Forall {
                vars: vars.clone(),
                body: Box::new(body.bind(binding, info)?),
            }),
        }
    }

    /// All terms contained in the formula tree, in preorder.
    pub fn all_terms(&self) -> Vec<&Term> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a Term>) {
        match self {
            Formula::Tautology | Formula::Contradiction => {}
            Formula::Relation { lhs, rhs, .. } => {
                out.extend(lhs.all_terms());
                out.extend(rhs.all_terms());
            }
            Formula::External { subterms, .. } => {
                for sub in subterms {
                    out.extend(sub.all_terms());
                }
            }
            Formula::Not(inner) => inner.collect_terms(out),
            Formula::And(parts) | Formula::Or(parts) => {
                for part in parts {
                    part.collect_terms(out);
                }
            }
            Formula::Exists { body, .. } | Formula::Forall { body, .. } => {
                body.collect_terms(out)
            }
        }
    }

    /// Top-level conjuncts: the components of an `And`, or the formula
    /// itself. Used to count unachieved goals.
    pub fn conjuncts(&self) -> Vec<&Formula> {
        match self {
            Formula::And(parts) => parts.iter().collect(),
            other => vec![other],
        }
    }

    /// Truth value determined by static evaluation alone, if any.
    /// `Some(false)` prunes trivially-falsified ground instantiations.
    pub fn static_truth(&self) -> Option<bool> {
        match self {
            Formula::Tautology => Some(true),
            Formula::Contradiction => Some(false),
            Formula::Relation { cmp, lhs, rhs } => match (lhs.as_ref(), rhs.as_ref()) {
                (Term::Constant(l), Term::Constant(r)) => cmp.apply(*l, *r).ok(),
                _ => None,
            },
            Formula::Not(inner) => inner.static_truth().map(|b| !b),
            Formula::And(parts) => {
                let mut all_true = true;
                for part in parts {
                    match part.static_truth() {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => all_true = false,
                    }
                }
                if all_true {
                    Some(true)
                } else {
                    None
                }
            }
            Formula::Or(parts) => {
                let mut all_false = true;
                for part in parts {
                    match part.static_truth() {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => all_false = false,
                    }
                }
                if all_false {
                    Some(false)
                } else {
                    None
                }
            }
            Formula::External { .. } | Formula::Exists { .. } | Formula::Forall { .. } => None,
        }
    }

    /// Boundary-only renderer.
    pub fn format(&self, info: &ProblemInfo) -> String {
        match self {
            Formula::Tautology => "true".to_string(),
            Formula::Contradiction => "false".to_string(),
            Formula::Relation { cmp, lhs, rhs } => format!(
                "{} {} {}",
                lhs.format(info),
                cmp.symbol(),
                rhs.format(info)
            ),
            Formula::External { symbol, subterms } => {
                let args: Vec<_> = subterms.iter().map(|t| t.format(info)).collect();
                format!("@{}({})", info.symbols().name(*symbol), args.join(", "))
            }
            Formula::Not(inner) => format!("!({})", inner.format(info)),
            Formula::And(parts) => {
                let rendered: Vec<_> = parts.iter().map(|p| p.format(info)).collect();
                format!("({})", rendered.join(" & "))
            }
            Formula::Or(parts) => {
                let rendered: Vec<_> = parts.iter().map(|p| p.format(info)).collect();
                format!("({})", rendered.join(" | "))
            }
            Formula::Exists { vars, body } => format!(
                "exists {} . ({})",
                format_binders(vars),
                body.format(info)
            ),
            Formula::Forall { vars, body } => format!(
                "forall {} . ({})",
                format_binders(vars),
                body.format(info)
            ),
        }
    }
}

fn format_binders(vars: &[BoundVarDecl]) -> String {
    let rendered: Vec<_> = vars.iter().map(|v| format!("?{}", v.id)).collect();
    rendered.join(", ")
}

fn bind_parts(
    parts: &[Formula],
    binding: &Binding,
    info: &ProblemInfo,
) -> Result<Vec<Formula>, LangError> {
    parts.iter().map(|p| p.bind(binding, info)).collect()
}

/// Recursive Cartesian enumeration of quantifier binders.
///
/// `existential` selects the acceptance condition: exists returns true on
/// the first satisfying assignment, forall returns false on the first
/// falsifying one.
fn enumerate_quantifier(
    vars: &[BoundVarDecl],
    body: &Formula,
    valuation: &dyn Valuation,
    binding: &Binding,
    info: &ProblemInfo,
    existential: bool,
) -> Result<bool, LangError> {
    match vars.split_first() {
        None => body.interpret(valuation, binding, info),
        Some((first, rest)) => {
            for object in info.objects_of(first.ty) {
                let extended = binding.extended(first.id, *object);
                let inner = enumerate_quantifier(rest, body, valuation, &extended, info, existential)?;
                if inner == existential {
                    return Ok(existential);
                }
            }
            Ok(!existential)
        }
    }
}

#[cfg(test)]
#[path = "tests/formula.rs"]
mod tests;
