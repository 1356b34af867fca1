//! Iterated-width machinery.
//!
//! Two users share this module: the standalone `iw` driver, which runs
//! IW(1), IW(2), ... until a width solves the problem, and the BFWS
//! heuristic, which runs a single bounded-width simulation from a seed
//! state to extract the relevant-atom set R.
//!
//! Both are breadth-first searches that admit a generated state only when
//! it is novel under the width-capped table; everything else is pruned.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::action::GroundAction;
use crate::error::LangError;
use crate::features::FeatureSet;
use crate::heuristic::UnachievedGoalCount;
use crate::model::StateModel;
use crate::novelty::{NoveltyTable, NOVELTY_UNKNOWN};
use crate::relevant::RelevantAtomSet;
use crate::search::{ExitCode, ResourceMonitor, SearchResult};
use crate::state::State;
use crate::stats::SearchStats;
use crate::trace::debug;

/// A node of the simulation tree. Carries no search metadata beyond the
/// parent link needed to walk witness paths.
struct SimNode {
    state: State,
    parent: Option<Rc<SimNode>>,
}

/// Outcome of one IW simulation run.
pub struct SimulationResult {
    /// Atoms on witness paths to achieved subgoals, all unreached.
    pub relevant: RelevantAtomSet,
    /// Number of subgoals some simulated state achieved.
    pub reachable_subgoals: u32,
}

/// A single breadth-first IW run used to compute R from a seed state.
pub struct IwSimulation<'a> {
    pub template: &'a NoveltyTable,
    pub goal: &'a UnachievedGoalCount,
    pub features: &'a FeatureSet,
    pub mark_negative: bool,
    pub node_cap: u64,
}

impl<'a> IwSimulation<'a> {
    pub fn run(&self, seed: &State, model: &StateModel) -> Result<SimulationResult, LangError> {
        let num_goals = self.goal.num_conjuncts();
        let mut witnesses: Vec<Option<Rc<SimNode>>> = vec![None; num_goals];

        if self.template.max_width() == 0 {
            return Ok(SimulationResult {
                relevant: RelevantAtomSet::new(),
                reachable_subgoals: 0,
            });
        }

        let mut table = self.template.clone();
        let mut queue: VecDeque<Rc<SimNode>> = VecDeque::new();
        let mut expanded: u64 = 0;

        let info = &model.problem().info;
        let root = Rc::new(SimNode {
            state: seed.clone(),
            parent: None,
        });
        table.evaluate(&self.features.valuation(&root.state));
        let mut remaining =
            num_goals - self.record_achievements(&root, info, &mut witnesses)? as usize;
        queue.push_back(root);

        while let Some(node) = queue.pop_front() {
            if remaining == 0 || expanded >= self.node_cap {
                break;
            }
            expanded += 1;

            for action in model.applicable(&node.state)? {
                let atoms = match model.manager().effects_of(&node.state, &action) {
                    Ok(atoms) => atoms,
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(_) => continue,
                };
                let child_state = node.state.progress(atoms);
                let novelty = table.evaluate(&self.features.valuation(&child_state));
                if novelty == NOVELTY_UNKNOWN {
                    continue;
                }
                let child = Rc::new(SimNode {
                    state: child_state,
                    parent: Some(Rc::clone(&node)),
                });
                remaining = remaining
                    .saturating_sub(self.record_achievements(&child, info, &mut witnesses)? as usize);
                queue.push_back(child);
            }
        }

        let mut relevant = RelevantAtomSet::new();
        let mut reachable = 0;
        for witness in witnesses.iter().flatten() {
            reachable += 1;
            self.collect_path_atoms(witness, &mut relevant);
        }
        debug!(
            reachable,
            relevant = relevant.len(),
            expanded,
            "IW simulation finished"
        );

        Ok(SimulationResult {
            relevant,
            reachable_subgoals: reachable,
        })
    }

    /// Record which still-unwitnessed subgoals `node` achieves, returning
    /// how many it newly achieved.
    fn record_achievements(
        &self,
        node: &Rc<SimNode>,
        info: &crate::info::ProblemInfo,
        witnesses: &mut [Option<Rc<SimNode>>],
    ) -> Result<u32, LangError> {
        let mut achieved = 0;
        for (i, conjunct) in self.goal.conjuncts().iter().enumerate() {
            if witnesses[i].is_some() {
                continue;
            }
            let holds = match conjunct.interpret(&node.state, &crate::binding::Binding::empty(), info)
            {
                Ok(value) => value,
                Err(err) if err.is_fatal() => return Err(err),
                Err(_) => false,
            };
            if holds {
                witnesses[i] = Some(Rc::clone(node));
                achieved += 1;
            }
        }
        Ok(achieved)
    }

    /// Add the atoms of every non-seed state on the witness path.
    fn collect_path_atoms(&self, witness: &Rc<SimNode>, relevant: &mut RelevantAtomSet) {
        let mut current = witness;
        while let Some(parent) = &current.parent {
            for i in 0..current.state.num_variables() {
                let var = crate::object::VariableIdx::new(i as u32);
                let value = current.state.get(var);
                if !self.mark_negative && value == crate::object::Object::Bool(false) {
                    continue;
                }
                relevant.insert_unreached((var, value));
            }
            current = parent;
        }
    }
}

/// The standalone IW driver: IW(1), IW(2), ... up to `max_width`.
pub struct IwSearch<'p> {
    pub model: StateModel<'p>,
    pub features: FeatureSet,
    pub max_width: u32,
    pub ignore_negative: bool,
    pub novelty_budget: u64,
    pub monitor: ResourceMonitor,
}

impl<'p> IwSearch<'p> {
    pub fn solve(&self, stats: &mut SearchStats) -> Result<SearchResult, LangError> {
        // Tables account widths 1 and 2; higher requested widths end the
        // ladder at 2.
        for width in 1..=self.max_width.min(2) {
            debug!(width, "starting IW iteration");
            match self.run_width(width, stats)? {
                SearchResult {
                    exit: ExitCode::Unsolvable,
                    ..
                } => continue,
                found => return Ok(found),
            }
        }
        Ok(SearchResult::failure(ExitCode::Unsolvable))
    }

    fn run_width(&self, width: u32, stats: &mut SearchStats) -> Result<SearchResult, LangError> {
        let indexer = crate::novelty::ValuationIndexer::new(&self.features);
        let mut table = match NoveltyTable::create(
            indexer,
            self.ignore_negative,
            width,
            self.novelty_budget,
        ) {
            Ok(table) => table,
            // A too-wide table ends the widening ladder early.
            Err(_) => return Ok(SearchResult::failure(ExitCode::Unsolvable)),
        };

        struct PlanNode {
            state: State,
            action: Option<Rc<GroundAction>>,
            parent: Option<Rc<PlanNode>>,
        }

        let mut queue: VecDeque<Rc<PlanNode>> = VecDeque::new();
        let root = Rc::new(PlanNode {
            state: self.model.problem().init.clone(),
            action: None,
            parent: None,
        });
        table.evaluate(&self.features.valuation(&root.state));
        stats.generation();
        queue.push_back(root);

        while let Some(node) = queue.pop_front() {
            if let Err(exhausted) = self.monitor.check(stats.generated()) {
                return Ok(SearchResult::failure(ExitCode::from(exhausted)));
            }
            if self.model.goal_satisfied(&node.state)? {
                let mut plan = Vec::new();
                let mut current = &node;
                while let Some(parent) = &current.parent {
                    plan.push(Rc::clone(current.action.as_ref().expect("non-root has action")));
                    current = parent;
                }
                plan.reverse();
                return Ok(SearchResult::plan_found(plan));
            }
            stats.expansion();

            for action in self.model.applicable(&node.state)? {
                let atoms = match self.model.manager().effects_of(&node.state, &action) {
                    Ok(atoms) => atoms,
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(_) => continue,
                };
                let child_state = node.state.progress(atoms);
                stats.generation();
                if let Some(constraints) = &self.model.problem().state_constraints {
                    if !self.model.manager().holds(constraints, &child_state)? {
                        continue;
                    }
                }
                let novelty = table.evaluate(&self.features.valuation(&child_state));
                stats.evaluation();
                if novelty == NOVELTY_UNKNOWN {
                    continue;
                }
                queue.push_back(Rc::new(PlanNode {
                    state: child_state,
                    action: Some(action),
                    parent: Some(Rc::clone(&node)),
                }));
            }
        }

        Ok(SearchResult::failure(ExitCode::Unsolvable))
    }
}
