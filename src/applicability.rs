//! Applicability checks and effect extraction for ground actions.
//!
//! Effects are returned as an atom batch rather than applied directly,
//! which lets the driver choose between allocating a successor state (for
//! search) and reusing a buffer (for validation).
//!
//! Error policy: interpretation failures other than `TypeMismatch` make
//! the action inapplicable; `TypeMismatch` is fatal and propagates.

use smallvec::SmallVec;

use crate::action::{EffectKind, GroundAction};
use crate::binding::Binding;
use crate::error::LangError;
use crate::formula::Formula;
use crate::info::ProblemInfo;
use crate::object::Object;
use crate::state::{Atom, State};

/// Decides applicability and computes successor atoms.
pub struct ActionManager<'p> {
    info: &'p ProblemInfo,
    constraints: Option<&'p Formula>,
}

impl<'p> ActionManager<'p> {
    pub fn new(info: &'p ProblemInfo, constraints: Option<&'p Formula>) -> Self {
        Self { info, constraints }
    }

    /// Whether the action's closed precondition holds in `state`.
    pub fn is_applicable(
        &self,
        state: &State,
        action: &GroundAction,
    ) -> Result<bool, LangError> {
        self.holds(&action.precondition, state)
    }

    /// The atom updates the action produces in `state`, in effect order.
    pub fn effects_of(
        &self,
        state: &State,
        action: &GroundAction,
    ) -> Result<SmallVec<[Atom; 4]>, LangError> {
        let binding = Binding::empty();
        let mut atoms = SmallVec::new();
        for effect in &action.effects {
            if let Some(condition) = &effect.condition {
                if !self.holds(condition, state)? {
                    continue;
                }
            }
            match &effect.kind {
                EffectKind::Functional { lhs, rhs } => {
                    let var = lhs.interpret_variable(state, &binding, self.info)?;
                    let value = rhs.interpret(state, &binding, self.info)?;
                    atoms.push((var, value));
                }
                EffectKind::Add { lhs } => {
                    let var = lhs.interpret_variable(state, &binding, self.info)?;
                    atoms.push((var, Object::Bool(true)));
                }
                EffectKind::Delete { lhs } => {
                    let var = lhs.interpret_variable(state, &binding, self.info)?;
                    atoms.push((var, Object::Bool(false)));
                }
            }
        }
        Ok(atoms)
    }

    /// The successor of `state` under `action`, or `None` when the action
    /// is inapplicable or the successor violates the state constraints.
    pub fn successor(
        &self,
        state: &State,
        action: &GroundAction,
    ) -> Result<Option<State>, LangError> {
        if !self.is_applicable(state, action)? {
            return Ok(None);
        }
        let atoms = self.effects_of(state, action)?;
        let next = state.progress(atoms);
        if let Some(constraints) = self.constraints {
            if !self.holds(constraints, &next)? {
                return Ok(None);
            }
        }
        Ok(Some(next))
    }

    /// Truth of a closed formula under the applicability error policy.
    pub fn holds(&self, formula: &Formula, state: &State) -> Result<bool, LangError> {
        match formula.interpret(state, &Binding::empty(), self.info) {
            Ok(value) => Ok(value),
            Err(err) if err.is_fatal() => Err(err),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
#[path = "tests/applicability.rs"]
mod tests;
