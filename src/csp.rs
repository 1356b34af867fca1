//! Finite-domain constraint solving for lifted-action applicability.
//!
//! The solver sits behind a narrow interface (integer variables, binary
//! relational constraints, table constraints, solve-all) so that any sound
//! finite-domain backend could replace it. The built-in backend is a
//! backtracking search with AC-3 style revision, which is enough for the
//! small arities action schemas have in practice.
//!
//! The lifted layer builds one CSP per schema: parameter variables range
//! over their type universes, one auxiliary variable stands for each
//! nested fluent subterm of the precondition, and a table constraint links
//! each auxiliary variable to the current state's extension of its symbol.
//! The tables are rebuilt from the state on every enumeration, which is
//! what keeps the skeleton reusable across the whole search.

use smallvec::SmallVec;

use crate::binding::Binding;
use crate::error::CspInconsistency;
use crate::formula::{Comparator, Formula};
use crate::info::{ProblemInfo, TypeKind};
use crate::object::{Object, TypeIdx};
use crate::state::{Atom, State};
use crate::symbol::SymbolIdx;
use crate::term::Term;
use crate::trace::debug;

/// Largest interval a CSP variable may be created over.
const MAX_INTERVAL_DOMAIN: i64 = 1 << 16;

/// Index of a CSP variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CspVar(usize);

impl CspVar {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A variable or a constant operand of a relational constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Var(CspVar),
    Const(i64),
}

#[derive(Debug, Clone)]
enum Constraint {
    /// `lhs <cmp> rhs`
    Rel {
        cmp: Comparator,
        lhs: Operand,
        rhs: Operand,
    },
    /// The listed variables must jointly take one of the tuples.
    Table {
        vars: SmallVec<[CspVar; 4]>,
        tuples: Vec<SmallVec<[i64; 4]>>,
    },
}

/// A finite-domain constraint problem.
#[derive(Debug, Clone, Default)]
pub struct Csp {
    domains: Vec<Vec<i64>>,
    constraints: Vec<Constraint>,
}

impl Csp {
    pub fn new() -> Self {
        Self::default()
    }

    /// A variable over an explicit, ordered value list.
    pub fn new_var(&mut self, domain: Vec<i64>) -> CspVar {
        let var = CspVar(self.domains.len());
        self.domains.push(domain);
        var
    }

    /// A variable over the inclusive interval `[lb, ub]`. Fails when the
    /// interval is too wide to materialise.
    pub fn new_interval_var(&mut self, lb: i64, ub: i64) -> Result<CspVar, CspInconsistency> {
        if lb > ub || ub.saturating_sub(lb) >= MAX_INTERVAL_DOMAIN {
            return Err(CspInconsistency);
        }
        Ok(self.new_var((lb..=ub).collect()))
    }

    pub fn post_rel(&mut self, cmp: Comparator, lhs: Operand, rhs: Operand) {
        self.constraints.push(Constraint::Rel { cmp, lhs, rhs });
    }

    pub fn post_table(&mut self, vars: SmallVec<[CspVar; 4]>, tuples: Vec<SmallVec<[i64; 4]>>) {
        self.constraints.push(Constraint::Table { vars, tuples });
    }

    pub fn num_vars(&self) -> usize {
        self.domains.len()
    }

    /// Run propagation to a fixpoint over a domain copy. Returns the
    /// narrowed domains, or the inconsistency if any domain empties.
    pub fn propagate(&self) -> Result<Vec<Vec<i64>>, CspInconsistency> {
        let mut domains = self.domains.clone();
        self.propagate_into(&mut domains)?;
        Ok(domains)
    }

    fn propagate_into(&self, domains: &mut [Vec<i64>]) -> Result<(), CspInconsistency> {
        // Constraint-oriented AC-3: revise every constraint until nothing
        // shrinks.
        loop {
            let mut changed = false;
            for constraint in &self.constraints {
                changed |= revise(constraint, domains)?;
            }
            if !changed {
                return Ok(());
            }
        }
    }

    /// Enumerate every solution in deterministic order: variables are
    /// assigned in creation order, values in domain order.
    pub fn solve_all(&self) -> Vec<Vec<i64>> {
        let mut solutions = Vec::new();
        let mut domains = self.domains.clone();
        if self.propagate_into(&mut domains).is_err() {
            return solutions;
        }
        self.branch(0, &mut domains, &mut solutions);
        solutions
    }

    fn branch(&self, var: usize, domains: &mut Vec<Vec<i64>>, solutions: &mut Vec<Vec<i64>>) {
        if var == domains.len() {
            solutions.push(domains.iter().map(|d| d[0]).collect());
            return;
        }
        let values = domains[var].clone();
        for value in values {
            let saved = domains.clone();
            domains[var] = vec![value];
            if self.propagate_into(domains).is_ok() {
                self.branch(var + 1, domains, solutions);
            }
            *domains = saved;
        }
    }
}

/// Narrow one constraint against the current domains. Returns whether any
/// domain shrank; empties are an inconsistency.
fn revise(constraint: &Constraint, domains: &mut [Vec<i64>]) -> Result<bool, CspInconsistency> {
    match constraint {
        Constraint::Rel { cmp, lhs, rhs } => {
            let mut changed = false;
            if let Operand::Var(x) = lhs {
                let before = domains[x.index()].len();
                let rhs_dom = operand_domain(*rhs, domains);
                domains[x.index()]
                    .retain(|&a| rhs_dom.iter().any(|&b| rel_holds(*cmp, a, b)));
                if domains[x.index()].is_empty() {
                    return Err(CspInconsistency);
                }
                changed |= domains[x.index()].len() != before;
            }
            if let Operand::Var(y) = rhs {
                let before = domains[y.index()].len();
                let lhs_dom = operand_domain(*lhs, domains);
                domains[y.index()]
                    .retain(|&b| lhs_dom.iter().any(|&a| rel_holds(*cmp, a, b)));
                if domains[y.index()].is_empty() {
                    return Err(CspInconsistency);
                }
                changed |= domains[y.index()].len() != before;
            }
            Ok(changed)
        }
        Constraint::Table { vars, tuples } => {
            let live: Vec<&SmallVec<[i64; 4]>> = tuples
                .iter()
                .filter(|tuple| {
                    tuple
                        .iter()
                        .zip(vars.iter())
                        .all(|(value, var)| domains[var.index()].contains(value))
                })
                .collect();
            let mut changed = false;
            for (pos, var) in vars.iter().enumerate() {
                let before = domains[var.index()].len();
                domains[var.index()].retain(|value| live.iter().any(|t| t[pos] == *value));
                if domains[var.index()].is_empty() {
                    return Err(CspInconsistency);
                }
                changed |= domains[var.index()].len() != before;
            }
            Ok(changed)
        }
    }
}

fn operand_domain(op: Operand, domains: &[Vec<i64>]) -> Vec<i64> {
    match op {
        Operand::Var(v) => domains[v.index()].clone(),
        Operand::Const(c) => vec![c],
    }
}

fn rel_holds(cmp: Comparator, a: i64, b: i64) -> bool {
    match cmp {
        Comparator::Eq => a == b,
        Comparator::Neq => a != b,
        Comparator::Lt => a < b,
        Comparator::Leq => a <= b,
        Comparator::Gt => a > b,
        Comparator::Geq => a >= b,
    }
}

/// Encode an object as a CSP domain value for its declared type.
fn encode(object: &Object) -> i64 {
    object.to_code()
}

/// Decode a CSP value back into an object of the given type.
fn decode(code: i64, ty: TypeIdx, info: &ProblemInfo) -> Object {
    match info.type_info(ty).kind {
        TypeKind::Bool => Object::Bool(code != 0),
        TypeKind::Int { .. } => Object::Int(code as i32),
        TypeKind::Float => Object::Float(f32::from_bits(code as u32)),
        TypeKind::Object => Object::Obj(code as u32),
    }
}

/// A fluent subterm of the precondition, linked to the state through a
/// table constraint.
#[derive(Debug, Clone)]
struct FluentLink {
    aux: CspVar,
    symbol: SymbolIdx,
    args: SmallVec<[Operand; 4]>,
}

/// One applicable parameter binding, together with the state atoms that
/// support the precondition's fluent subterms.
#[derive(Debug, Clone)]
pub struct LiftedMatch {
    pub binding: Binding,
    pub supports: SmallVec<[Atom; 4]>,
}

/// The reusable applicability CSP of one action schema.
///
/// `None` from [`SchemaCsp::build`] means the schema's precondition falls
/// outside the CSP-translatable fragment (disjunction, quantification,
/// nested fluency); the enumerator grounds such schemas instead.
pub struct SchemaCsp {
    skeleton: Csp,
    param_types: SmallVec<[TypeIdx; 4]>,
    links: Vec<FluentLink>,
}

impl SchemaCsp {
    pub fn build(
        signature: &[TypeIdx],
        precondition: &Formula,
        info: &ProblemInfo,
    ) -> Option<SchemaCsp> {
        let mut csp = Csp::new();
        let param_types: SmallVec<[TypeIdx; 4]> = SmallVec::from_slice(signature);

        // One variable per schema parameter, domain = its type universe.
        for ty in signature {
            let domain: Vec<i64> = info.objects_of(*ty).iter().map(encode).collect();
            csp.new_var(domain);
        }

        let mut links = Vec::new();
        for conjunct in precondition.conjuncts() {
            match conjunct {
                Formula::Tautology => {}
                Formula::Relation { cmp, lhs, rhs } => {
                    let l = map_term(lhs, signature.len(), &mut csp, &mut links, info)?;
                    let r = map_term(rhs, signature.len(), &mut csp, &mut links, info)?;
                    csp.post_rel(*cmp, l, r);
                }
                _ => return None,
            }
        }

        Some(SchemaCsp {
            skeleton: csp,
            param_types,
            links,
        })
    }

    /// Enumerate every parameter binding satisfying the precondition in
    /// `state`, in ascending lexicographic order of parameter tuples.
    pub fn matches(&self, state: &State, info: &ProblemInfo) -> Vec<LiftedMatch> {
        let mut csp = self.skeleton.clone();

        // Refresh each fluent link's table with the state's extension.
        for link in &self.links {
            let mut vars: SmallVec<[CspVar; 4]> = SmallVec::new();
            let mut fixed: SmallVec<[(usize, i64); 4]> = SmallVec::new();
            for (pos, arg) in link.args.iter().enumerate() {
                match arg {
                    Operand::Var(v) => vars.push(*v),
                    Operand::Const(c) => fixed.push((pos, *c)),
                }
            }
            vars.push(link.aux);

            let mut tuples = Vec::new();
            for (var_idx, data) in info.variables_of_symbol(link.symbol) {
                let codes: SmallVec<[i64; 4]> = data.args.iter().map(encode).collect();
                if fixed.iter().any(|(pos, c)| codes[*pos] != *c) {
                    continue;
                }
                let mut tuple: SmallVec<[i64; 4]> = codes
                    .iter()
                    .enumerate()
                    .filter(|(pos, _)| !fixed.iter().any(|(fp, _)| fp == pos))
                    .map(|(_, code)| *code)
                    .collect();
                tuple.push(encode(&state.get(var_idx)));
                tuples.push(tuple);
            }
            csp.post_table(vars, tuples);
        }

        let solutions = csp.solve_all();
        debug!(solutions = solutions.len(), "schema CSP enumerated");

        solutions
            .into_iter()
            .filter_map(|solution| self.extract(&solution, state, info))
            .collect()
    }

    fn extract(
        &self,
        solution: &[i64],
        state: &State,
        info: &ProblemInfo,
    ) -> Option<LiftedMatch> {
        let mut binding = Binding::with_size(self.param_types.len());
        for (i, ty) in self.param_types.iter().enumerate() {
            binding.set(i as u32, decode(solution[i], *ty, info));
        }

        let mut supports: SmallVec<[Atom; 4]> = SmallVec::new();
        for link in &self.links {
            let signature = &info.symbols().info(link.symbol).signature;
            let args: SmallVec<[Object; 4]> = link
                .args
                .iter()
                .zip(signature.iter())
                .map(|(arg, ty)| match arg {
                    Operand::Var(v) => decode(solution[v.index()], *ty, info),
                    Operand::Const(c) => decode(*c, *ty, info),
                })
                .collect();
            let var = info.resolve_variable(link.symbol, &args).ok()?;
            supports.push((var, state.get(var)));
        }

        Some(LiftedMatch { binding, supports })
    }
}

fn map_term(
    term: &Term,
    num_params: usize,
    csp: &mut Csp,
    links: &mut Vec<FluentLink>,
    info: &ProblemInfo,
) -> Option<Operand> {
    match term {
        Term::Constant(object) => Some(Operand::Const(encode(object))),
        Term::BoundVariable { id, .. } => {
            if (*id as usize) < num_params {
                Some(Operand::Var(CspVar(*id as usize)))
            } else {
                None
            }
        }
        Term::Fluent { symbol, subterms } => {
            let args: Option<SmallVec<[Operand; 4]>> = subterms
                .iter()
                .map(|sub| match sub {
                    // Fluent arguments must be flat: a parameter or a
                    // constant. Deeper nesting falls back to grounding.
                    Term::Constant(object) => Some(Operand::Const(encode(object))),
                    Term::BoundVariable { id, .. } if (*id as usize) < num_params => {
                        Some(Operand::Var(CspVar(*id as usize)))
                    }
                    _ => None,
                })
                .collect();
            let args = args?;
            let (lb, ub) = term.bounds(info);
            let aux = csp.new_interval_var(lb, ub).ok()?;
            links.push(FluentLink {
                aux,
                symbol: *symbol,
                args,
            });
            Some(Operand::Var(aux))
        }
        Term::StateVariable { .. } | Term::Static { .. } => None,
    }
}

#[cfg(test)]
#[path = "tests/csp.rs"]
mod tests;
