//! Full grounding of action schemas.
//!
//! Instantiates every schema over the Cartesian product of its parameter
//! type universes, in declared order, so ground-action ids ascend
//! lexicographically on parameter tuples. Bindings whose closed
//! precondition is statically falsified are pruned before they cost a
//! search-time evaluation.

use crate::action::{ActionSchema, GroundAction};
use crate::binding::Binding;
use crate::error::LangError;
use crate::info::ProblemInfo;
use crate::object::{ActionIdx, Object};
use crate::trace::debug;

/// Ground every schema, assigning dense ids in enumeration order.
pub fn ground_all(
    schemas: &[ActionSchema],
    info: &ProblemInfo,
) -> Result<Vec<GroundAction>, LangError> {
    let mut out = Vec::new();
    for (schema_idx, schema) in schemas.iter().enumerate() {
        ground_schema(schema_idx, schema, info, &mut out)?;
    }
    debug!(
        ground_actions = out.len(),
        "finished grounding action schemas"
    );
    Ok(out)
}

/// Ground a single schema, appending its surviving instances to `out`
/// with ids continuing from `out`'s current length.
pub fn ground_schema(
    schema_idx: usize,
    schema: &ActionSchema,
    info: &ProblemInfo,
    out: &mut Vec<GroundAction>,
) -> Result<(), LangError> {
    let mut tuple: Vec<Object> = Vec::with_capacity(schema.arity());
    enumerate_bindings(schema_idx, schema, info, &mut tuple, out)
}

fn enumerate_bindings(
    schema_idx: usize,
    schema: &ActionSchema,
    info: &ProblemInfo,
    tuple: &mut Vec<Object>,
    out: &mut Vec<GroundAction>,
) -> Result<(), LangError> {
    let depth = tuple.len();
    if depth == schema.arity() {
        let binding = Binding::from_values(tuple.iter().copied());
        let id = ActionIdx::new(out.len() as u32);
        match schema.ground(schema_idx, id, binding, info) {
            Ok(action) => {
                // Drop instantiations whose precondition is already
                // falsified by static information alone.
                if action.precondition.static_truth() != Some(false) {
                    out.push(action);
                }
                Ok(())
            }
            // An unregistered ground fluent means this tuple denotes no
            // state variable; the instantiation is vacuous.
            Err(LangError::UnregisteredStateVariable(_)) => Ok(()),
            Err(err) => Err(err),
        }
    } else {
        let ty = schema.signature[depth];
        for object in info.objects_of(ty) {
            tuple.push(*object);
            enumerate_bindings(schema_idx, schema, info, tuple, out)?;
            tuple.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applicability::ActionManager;
    use crate::formula::{Comparator, Formula};
    use crate::term::Term;
    use crate::test_utils::{pick_problem, switches_problem, ITEM};

    #[test]
    fn grounds_the_cartesian_product_in_order() {
        let problem = pick_problem(3, &[0, 1, 2]);
        let actions = ground_all(&problem.schemas, &problem.info).unwrap();
        assert_eq!(actions.len(), 3);
        for (i, action) in actions.iter().enumerate() {
            assert_eq!(action.id.index(), i);
            assert_eq!(action.binding.value(0), Some(Object::Obj(i as u32)));
        }
    }

    #[test]
    fn nullary_schemas_ground_once() {
        let problem = switches_problem(&["a", "b"]);
        let actions = ground_all(&problem.schemas, &problem.info).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].format(&problem.schemas, &problem.info), "set_a()");
    }

    #[test]
    fn statically_false_instantiations_are_pruned() {
        let mut problem = pick_problem(2, &[0]);
        // Restrict the schema to parameter o1 via a static equality.
        let schema = &mut problem.schemas[0];
        let old_pre = schema.precondition.clone();
        schema.precondition = Formula::And(vec![
            old_pre,
            Formula::Relation {
                cmp: Comparator::Eq,
                lhs: Box::new(Term::BoundVariable { id: 0, ty: ITEM }),
                rhs: Box::new(Term::Constant(Object::Obj(1))),
            },
        ]);

        let actions = ground_all(&problem.schemas, &problem.info).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].binding.value(0), Some(Object::Obj(1)));
    }

    #[test]
    fn grounded_actions_agree_with_the_applicability_manager() {
        let problem = pick_problem(4, &[2]);
        let actions = ground_all(&problem.schemas, &problem.info).unwrap();
        let manager = ActionManager::new(&problem.info, None);

        let applicable: Vec<_> = actions
            .iter()
            .filter(|a| manager.is_applicable(&problem.init, a).unwrap())
            .collect();
        assert_eq!(applicable.len(), 1);
        assert_eq!(applicable[0].binding.value(0), Some(Object::Obj(2)));
    }

    #[test]
    fn enumeration_is_duplicate_free() {
        let problem = pick_problem(3, &[0, 1, 2]);
        let actions = ground_all(&problem.schemas, &problem.info).unwrap();
        let mut seen = std::collections::HashSet::new();
        for action in &actions {
            let key: Vec<_> = action.binding.iter().collect();
            assert!(seen.insert((action.schema, key)));
        }
    }
}
