//! Goal-distance estimation.
//!
//! The BFWS family only needs a cheap, non-admissible estimate: the number
//! of top-level goal conjuncts unsatisfied in a state. Interpretation
//! failures count a conjunct as unsatisfied, matching the applicability
//! error policy.

use crate::binding::Binding;
use crate::error::LangError;
use crate::formula::Formula;
use crate::info::ProblemInfo;
use crate::state::State;

/// Counts unsatisfied top-level goal conjuncts.
#[derive(Debug, Clone)]
pub struct UnachievedGoalCount {
    conjuncts: Vec<Formula>,
}

impl UnachievedGoalCount {
    pub fn new(goal: &Formula) -> Self {
        Self {
            conjuncts: goal.conjuncts().into_iter().cloned().collect(),
        }
    }

    pub fn num_conjuncts(&self) -> usize {
        self.conjuncts.len()
    }

    pub fn conjuncts(&self) -> &[Formula] {
        &self.conjuncts
    }

    /// Number of conjuncts not satisfied by `state`.
    pub fn evaluate(&self, state: &State, info: &ProblemInfo) -> Result<u32, LangError> {
        let binding = Binding::empty();
        let mut unachieved = 0;
        for conjunct in &self.conjuncts {
            match conjunct.interpret(state, &binding, info) {
                Ok(true) => {}
                Ok(false) => unachieved += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(_) => unachieved += 1,
            }
        }
        Ok(unachieved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Object, VariableIdx};
    use crate::test_utils::switches_problem;

    #[test]
    fn counts_unsatisfied_conjuncts() {
        let problem = switches_problem(&["a", "b", "c"]);
        let heuristic = UnachievedGoalCount::new(&problem.goal);
        assert_eq!(heuristic.num_conjuncts(), 3);

        assert_eq!(heuristic.evaluate(&problem.init, &problem.info).unwrap(), 3);

        let mid = problem
            .init
            .progress([(VariableIdx::new(1), Object::Bool(true))]);
        assert_eq!(heuristic.evaluate(&mid, &problem.info).unwrap(), 2);

        let done = mid.progress([
            (VariableIdx::new(0), Object::Bool(true)),
            (VariableIdx::new(2), Object::Bool(true)),
        ]);
        assert_eq!(heuristic.evaluate(&done, &problem.info).unwrap(), 0);
    }

    #[test]
    fn non_conjunctive_goals_count_as_one() {
        let problem = switches_problem(&["a"]);
        let heuristic = UnachievedGoalCount::new(&problem.goal.conjuncts()[0]);
        assert_eq!(heuristic.num_conjuncts(), 1);
    }
}
