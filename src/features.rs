//! Novelty features: projections from states to small integers.
//!
//! The default feature set has one feature per state variable whose value
//! is the variable's object coerced to an integer. Richer feature sets
//! plug in through the same valuation interface.

use crate::info::ProblemInfo;
use crate::state::State;

/// A state's feature valuation, in fixed feature order.
pub type FeatureValuation = Vec<i32>;

/// The feature set novelty is computed over.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Inclusive (min, max) value range of each feature.
    ranges: Vec<(i32, i32)>,
}

impl FeatureSet {
    /// One feature per state variable, ranged by the variable's type.
    pub fn state_variables(info: &ProblemInfo) -> Self {
        let ranges = (0..info.num_variables())
            .map(|i| {
                let var = crate::object::VariableIdx::new(i as u32);
                let (lb, ub) = info.type_info(info.variable_type(var)).bounds();
                (clamp_i32(lb), clamp_i32(ub))
            })
            .collect();
        Self { ranges }
    }

    pub fn num_features(&self) -> usize {
        self.ranges.len()
    }

    pub fn range(&self, feature: usize) -> (i32, i32) {
        self.ranges[feature]
    }

    /// Project a state onto its feature valuation.
    pub fn valuation(&self, state: &State) -> FeatureValuation {
        debug_assert_eq!(state.num_variables(), self.ranges.len());
        state.values().iter().map(|v| v.feature_value()).collect()
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use crate::state::State;
    use crate::test_utils::{pick_problem, switches_problem};

    #[test]
    fn default_features_cover_every_variable() {
        let problem = pick_problem(3, &[0]);
        let features = FeatureSet::state_variables(&problem.info);
        assert_eq!(features.num_features(), 3);
        assert_eq!(features.range(0), (0, 1));
    }

    #[test]
    fn valuation_coerces_objects() {
        let problem = switches_problem(&["a", "b"]);
        let features = FeatureSet::state_variables(&problem.info);
        let state = State::new(vec![Object::Bool(true), Object::Bool(false)]);
        assert_eq!(features.valuation(&state), vec![1, 0]);
    }
}
