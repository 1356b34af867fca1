//! Error kinds shared across the engine.
//!
//! Interpretation errors propagate to the applicability manager, which
//! treats them as "not applicable" with the exception of `TypeMismatch`,
//! which is fatal. CSP inconsistencies are absorbed by the enumerator.
//! Resource errors unwind to the search driver, which finalises statistics
//! and maps them to an exit code.

use crate::object::VariableIdx;

/// Errors raised while interpreting or binding terms and formulas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LangError {
    /// Value tags violate the declared signature.
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A bound variable was interpreted without a binding for it.
    UnboundVariable(u32),
    /// A partial assignment was read at an unset variable.
    UnassignedVariable(VariableIdx),
    /// A ground fluent tuple has no registered state variable.
    UnregisteredStateVariable(String),
    /// A static or external symbol has no interpretation.
    UndefinedSymbol(String),
    /// An arithmetic composite could not be evaluated.
    Arithmetic(&'static str),
}

impl std::fmt::Display for LangError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LangError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            LangError::UnboundVariable(id) => {
                write!(f, "bound variable ?{} interpreted without a binding", id)
            }
            LangError::UnassignedVariable(var) => {
                write!(f, "variable v{} is unassigned", var.raw())
            }
            LangError::UnregisteredStateVariable(desc) => {
                write!(f, "no state variable registered for {}", desc)
            }
            LangError::UndefinedSymbol(name) => {
                write!(f, "symbol '{}' has no interpretation", name)
            }
            LangError::Arithmetic(what) => write!(f, "arithmetic error: {}", what),
        }
    }
}

impl std::error::Error for LangError {}

impl LangError {
    /// Whether the error is fatal under the applicability policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LangError::TypeMismatch { .. })
    }
}

/// The applicability CSP became empty during propagation. Non-fatal: the
/// enumerator reports no applicable binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CspInconsistency;

impl std::fmt::Display for CspInconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "constraint propagation emptied a domain")
    }
}

impl std::error::Error for CspInconsistency {}

/// A novelty table would exceed its memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoveltyBudgetExceeded {
    pub required: u64,
    pub budget: u64,
}

impl std::fmt::Display for NoveltyBudgetExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "novelty table needs {} bytes, budget is {} bytes",
            self.required, self.budget
        )
    }
}

impl std::error::Error for NoveltyBudgetExceeded {}

/// Deadline or memory cap breached during search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceExhausted {
    OutOfTime,
    OutOfMemory,
}

impl std::fmt::Display for ResourceExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceExhausted::OutOfTime => write!(f, "search deadline exceeded"),
            ResourceExhausted::OutOfMemory => write!(f, "search memory budget exceeded"),
        }
    }
}

impl std::error::Error for ResourceExhausted {}

/// A returned plan does not execute cleanly from the initial state.
/// Indicates a bug in the search or the effect machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanInvariant {
    pub step: usize,
    pub reason: String,
}

impl std::fmt::Display for PlanInvariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plan invalid at step {}: {}", self.step, self.reason)
    }
}

impl std::error::Error for PlanInvariant {}

/// Problem ingestion failure. Raised only at the loader boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub message: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        LoadError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "problem load failed: {}", self.message)
    }
}

impl std::error::Error for LoadError {}

impl From<LangError> for LoadError {
    fn from(err: LangError) -> Self {
        LoadError::new(err.to_string())
    }
}
