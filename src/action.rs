//! Action schemas, effects and ground actions.

use smallvec::SmallVec;

use crate::binding::Binding;
use crate::error::LangError;
use crate::formula::Formula;
use crate::info::ProblemInfo;
use crate::object::{ActionIdx, TypeIdx};
use crate::term::Term;

/// One atomic change to the state, optionally guarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    /// Guard formula; `None` means unconditional.
    pub condition: Option<Formula>,
    pub kind: EffectKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectKind {
    /// `lhs := rhs`, where `lhs` is fluent-headed (or already a
    /// consolidated state variable).
    Functional { lhs: Term, rhs: Term },
    /// Make an atomic proposition true.
    Add { lhs: Term },
    /// Make an atomic proposition false.
    Delete { lhs: Term },
}

impl Effect {
    pub fn unconditional(kind: EffectKind) -> Self {
        Effect {
            condition: None,
            kind,
        }
    }

    /// Close the effect under a parameter binding.
    pub fn bind(&self, binding: &Binding, info: &ProblemInfo) -> Result<Effect, LangError> {
        let condition = match &self.condition {
            Some(cond) => Some(cond.bind(binding, info)?),
            None => None,
        };
        let kind = match &self.kind {
            EffectKind::Functional { lhs, rhs } => EffectKind::Functional {
                lhs: lhs.bind(binding, info)?,
                rhs: rhs.bind(binding, info)?,
            },
            EffectKind::Add { lhs } => EffectKind::Add {
                lhs: lhs.bind(binding, info)?,
            },
            EffectKind::Delete { lhs } => EffectKind::Delete {
                lhs: lhs.bind(binding, info)?,
            },
        };
        Ok(Effect { condition, kind })
    }

    /// The term written by this effect.
    pub fn lhs(&self) -> &Term {
        match &self.kind {
            EffectKind::Functional { lhs, .. }
            | EffectKind::Add { lhs }
            | EffectKind::Delete { lhs } => lhs,
        }
    }
}

/// A lifted action: name, typed parameters, precondition and effects.
///
/// Effects apply in declared order; within one action, later writes to the
/// same variable win.
#[derive(Debug, Clone)]
pub struct ActionSchema {
    pub name: String,
    /// Parameter types, in declared order.
    pub signature: SmallVec<[TypeIdx; 4]>,
    pub param_names: Vec<String>,
    pub precondition: Formula,
    pub effects: Vec<Effect>,
}

impl ActionSchema {
    pub fn arity(&self) -> usize {
        self.signature.len()
    }

    /// Close the schema under a full parameter binding.
    pub fn ground(
        &self,
        schema_idx: usize,
        id: ActionIdx,
        binding: Binding,
        info: &ProblemInfo,
    ) -> Result<GroundAction, LangError> {
        let precondition = self.precondition.bind(&binding, info)?;
        let effects = self
            .effects
            .iter()
            .map(|e| e.bind(&binding, info))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GroundAction {
            id,
            schema: schema_idx,
            binding,
            precondition,
            effects,
        })
    }
}

/// An action schema closed by a full parameter binding. The precondition
/// and effects have been rebound, so interpretation needs no binding.
#[derive(Debug, Clone)]
pub struct GroundAction {
    pub id: ActionIdx,
    /// Index of the originating schema in the problem's schema list.
    pub schema: usize,
    pub binding: Binding,
    pub precondition: Formula,
    pub effects: Vec<Effect>,
}

impl GroundAction {
    /// Boundary-only renderer: `name(arg1, arg2)`.
    pub fn format(&self, schemas: &[ActionSchema], info: &ProblemInfo) -> String {
        let schema = &schemas[self.schema];
        let args: Vec<_> = (0..schema.arity() as u32)
            .map(|i| match self.binding.value(i) {
                Some(object) => info.format_object(&object),
                None => format!("?{}", i),
            })
            .collect();
        format!("{}({})", schema.name, args.join(", "))
    }
}
