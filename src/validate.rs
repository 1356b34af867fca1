//! Plan validation by replay.
//!
//! A returned plan is replayed from the initial state: every action must
//! be applicable where it appears, every intermediate state must satisfy
//! the state constraints, and the final state must satisfy the goal. A
//! failure here is a `PlanInvariant` — a bug, not a planning outcome.

use std::rc::Rc;

use crate::action::GroundAction;
use crate::applicability::ActionManager;
use crate::error::PlanInvariant;
use crate::problem::Problem;
use crate::state::State;

/// Replay `plan` from the problem's initial state.
pub fn check_plan(problem: &Problem, plan: &[Rc<GroundAction>]) -> Result<(), PlanInvariant> {
    let manager = ActionManager::new(&problem.info, problem.state_constraints.as_ref());
    let mut state: State = problem.init.clone();

    for (step, action) in plan.iter().enumerate() {
        let applicable = manager.is_applicable(&state, action).map_err(|err| PlanInvariant {
            step,
            reason: err.to_string(),
        })?;
        if !applicable {
            return Err(PlanInvariant {
                step,
                reason: format!(
                    "action {} is not applicable",
                    action.format(&problem.schemas, &problem.info)
                ),
            });
        }
        let atoms = manager.effects_of(&state, action).map_err(|err| PlanInvariant {
            step,
            reason: err.to_string(),
        })?;
        state.accumulate(atoms);

        if let Some(constraints) = &problem.state_constraints {
            let holds = manager.holds(constraints, &state).map_err(|err| PlanInvariant {
                step,
                reason: err.to_string(),
            })?;
            if !holds {
                return Err(PlanInvariant {
                    step,
                    reason: "state constraints violated".to_string(),
                });
            }
        }
    }

    let goal_holds = manager
        .holds(&problem.goal, &state)
        .map_err(|err| PlanInvariant {
            step: plan.len(),
            reason: err.to_string(),
        })?;
    if !goal_holds {
        return Err(PlanInvariant {
            step: plan.len(),
            reason: "final state does not satisfy the goal".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::object::{ActionIdx, Object};
    use crate::test_utils::{pick_problem, switches_problem};

    #[test]
    fn valid_plans_replay_cleanly() {
        let problem = pick_problem(3, &[1]);
        let action = problem.schemas[0]
            .ground(
                0,
                ActionIdx::new(0),
                Binding::from_values([Object::Obj(1)]),
                &problem.info,
            )
            .unwrap();
        assert!(check_plan(&problem, &[Rc::new(action)]).is_ok());
    }

    #[test]
    fn inapplicable_steps_are_reported() {
        let problem = pick_problem(3, &[1]);
        let wrong = problem.schemas[0]
            .ground(
                0,
                ActionIdx::new(0),
                Binding::from_values([Object::Obj(0)]),
                &problem.info,
            )
            .unwrap();
        let err = check_plan(&problem, &[Rc::new(wrong)]).unwrap_err();
        assert_eq!(err.step, 0);
    }

    #[test]
    fn unsatisfied_goals_are_reported_at_the_end() {
        let problem = switches_problem(&["a", "b"]);
        let set_a = problem.schemas[0]
            .ground(0, ActionIdx::new(0), Binding::empty(), &problem.info)
            .unwrap();
        let err = check_plan(&problem, &[Rc::new(set_a)]).unwrap_err();
        assert_eq!(err.step, 1);
        assert!(err.reason.contains("goal"));
    }

    #[test]
    fn empty_plan_is_valid_iff_init_satisfies_goal() {
        let solved = pick_problem(2, &[]);
        assert!(check_plan(&solved, &[]).is_ok());

        let unsolved = switches_problem(&["a"]);
        assert!(check_plan(&unsolved, &[]).is_err());
    }
}
