//! The in-memory planning problem consumed by the search drivers.

use crate::action::ActionSchema;
use crate::formula::Formula;
use crate::info::ProblemInfo;
use crate::state::State;

/// A fully loaded planning problem.
///
/// Read-only after load; the search only ever clones states out of it.
#[derive(Debug)]
pub struct Problem {
    pub info: ProblemInfo,
    pub init: State,
    pub schemas: Vec<ActionSchema>,
    pub goal: Formula,
    /// Invariant that every state along a plan must satisfy, if declared.
    pub state_constraints: Option<Formula>,
}

impl Problem {
    pub fn new(
        info: ProblemInfo,
        init: State,
        schemas: Vec<ActionSchema>,
        goal: Formula,
        state_constraints: Option<Formula>,
    ) -> Self {
        Self {
            info,
            init,
            schemas,
            goal,
            state_constraints,
        }
    }
}
