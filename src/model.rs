//! The state model: goal tests and applicable-action enumeration.
//!
//! Two realisations coexist behind one surface. The ground model
//! instantiates every schema up front and filters by precondition at
//! expansion time; the lifted model keeps one applicability CSP per schema
//! and enumerates satisfying parameter bindings against each state. Both
//! enumerate deterministically, duplicate-free, in ascending lexicographic
//! parameter order within each schema.

use std::rc::Rc;

use crate::action::GroundAction;
use crate::applicability::ActionManager;
use crate::csp::SchemaCsp;
use crate::error::LangError;
use crate::grounding::{ground_all, ground_schema};
use crate::object::ActionIdx;
use crate::problem::Problem;
use crate::state::State;
use crate::trace::info;

enum SchemaStrategy {
    /// Applicability CSP over the schema's parameters.
    Csp(SchemaCsp),
    /// Pre-grounded instances of one schema, filtered at enumeration.
    Grounded(Vec<Rc<GroundAction>>),
}

enum Generator {
    Ground(Vec<Rc<GroundAction>>),
    Lifted(Vec<SchemaStrategy>),
}

/// A problem plus a successor-generation policy.
pub struct StateModel<'p> {
    problem: &'p Problem,
    manager: ActionManager<'p>,
    generator: Generator,
}

impl<'p> StateModel<'p> {
    /// Fully ground model: every schema instantiated at construction.
    pub fn ground(problem: &'p Problem) -> Result<Self, LangError> {
        let actions = ground_all(&problem.schemas, &problem.info)?
            .into_iter()
            .map(Rc::new)
            .collect::<Vec<_>>();
        info!(actions = actions.len(), "built ground state model");
        Ok(Self {
            problem,
            manager: ActionManager::new(&problem.info, problem.state_constraints.as_ref()),
            generator: Generator::Ground(actions),
        })
    }

    /// Lifted model: one CSP per schema where the precondition fits the
    /// translatable fragment, grounding as a per-schema fallback.
    pub fn lifted(problem: &'p Problem) -> Result<Self, LangError> {
        let mut strategies = Vec::with_capacity(problem.schemas.len());
        for (schema_idx, schema) in problem.schemas.iter().enumerate() {
            match SchemaCsp::build(&schema.signature, &schema.precondition, &problem.info) {
                Some(csp) => strategies.push(SchemaStrategy::Csp(csp)),
                None => {
                    let mut grounded = Vec::new();
                    ground_one(problem, schema_idx, &mut grounded)?;
                    strategies.push(SchemaStrategy::Grounded(grounded));
                }
            }
        }
        info!(schemas = strategies.len(), "built lifted state model");
        Ok(Self {
            problem,
            manager: ActionManager::new(&problem.info, problem.state_constraints.as_ref()),
            generator: Generator::Lifted(strategies),
        })
    }

    pub fn problem(&self) -> &'p Problem {
        self.problem
    }

    pub fn manager(&self) -> &ActionManager<'p> {
        &self.manager
    }

    /// Whether `state` satisfies the goal formula.
    pub fn goal_satisfied(&self, state: &State) -> Result<bool, LangError> {
        self.manager.holds(&self.problem.goal, state)
    }

    /// All ground actions applicable in `state`, in deterministic order.
    pub fn applicable(&self, state: &State) -> Result<Vec<Rc<GroundAction>>, LangError> {
        match &self.generator {
            Generator::Ground(actions) => {
                let mut out = Vec::new();
                for action in actions {
                    if self.manager.is_applicable(state, action)? {
                        out.push(Rc::clone(action));
                    }
                }
                Ok(out)
            }
            Generator::Lifted(strategies) => {
                let mut out = Vec::new();
                for (schema_idx, strategy) in strategies.iter().enumerate() {
                    match strategy {
                        SchemaStrategy::Csp(csp) => {
                            for matched in csp.matches(state, &self.problem.info) {
                                let id = ActionIdx::new(out.len() as u32);
                                let action = self.problem.schemas[schema_idx].ground(
                                    schema_idx,
                                    id,
                                    matched.binding,
                                    &self.problem.info,
                                )?;
                                out.push(Rc::new(action));
                            }
                        }
                        SchemaStrategy::Grounded(actions) => {
                            for action in actions {
                                if self.manager.is_applicable(state, action)? {
                                    out.push(Rc::clone(action));
                                }
                            }
                        }
                    }
                }
                Ok(out)
            }
        }
    }
}

fn ground_one(
    problem: &Problem,
    schema_idx: usize,
    out: &mut Vec<Rc<GroundAction>>,
) -> Result<(), LangError> {
    let mut actions = Vec::new();
    ground_schema(
        schema_idx,
        &problem.schemas[schema_idx],
        &problem.info,
        &mut actions,
    )?;
    out.extend(actions.into_iter().map(Rc::new));
    Ok(())
}
