//! Best-first width search.
//!
//! The engine owns the open list (a binary heap with lazy deletion), the
//! closed map (best known node per state), the novelty evaluators and the
//! resource monitor. The expansion loop is single-threaded and
//! cooperative: the deadline and memory monitor is polled once per pop,
//! and nothing inside an expansion blocks.

use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;

use crate::action::GroundAction;
use crate::config::{BfwsType, SearchConfig};
use crate::error::{LangError, ResourceExhausted};
use crate::features::FeatureSet;
use crate::heuristic::UnachievedGoalCount;
use crate::iw::IwSimulation;
use crate::model::StateModel;
use crate::novelty::{novelty_key, NoveltyEvaluator, NoveltyTable, ValuationIndexer};
use crate::relevant::RelevantAtomSet;
use crate::state::State;
use crate::stats::SearchStats;
use crate::trace::{debug, info};

/// Final verdict of a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    PlanFound,
    Unsolvable,
    OutOfMemory,
    OutOfTime,
    ValidationFailed,
}

impl From<ResourceExhausted> for ExitCode {
    fn from(err: ResourceExhausted) -> Self {
        match err {
            ResourceExhausted::OutOfTime => ExitCode::OutOfTime,
            ResourceExhausted::OutOfMemory => ExitCode::OutOfMemory,
        }
    }
}

/// A search verdict plus the plan, when one was found.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub exit: ExitCode,
    pub plan: Vec<Rc<GroundAction>>,
}

impl SearchResult {
    pub fn plan_found(plan: Vec<Rc<GroundAction>>) -> Self {
        Self {
            exit: ExitCode::PlanFound,
            plan,
        }
    }

    pub fn failure(exit: ExitCode) -> Self {
        Self {
            exit,
            plan: Vec::new(),
        }
    }

    pub fn solved(&self) -> bool {
        self.exit == ExitCode::PlanFound
    }
}

/// Deadline and memory-budget polling, once per pop.
///
/// Peak memory is estimated from the generated-node count and a per-node
/// size derived from the state width; the engine has no allocator hook.
pub struct ResourceMonitor {
    deadline: Option<Instant>,
    memory_budget_bytes: Option<u64>,
    node_bytes: u64,
}

impl ResourceMonitor {
    pub fn new(config: &SearchConfig, num_variables: usize) -> Self {
        let deadline = config
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        // State vector plus node metadata, feature valuation and the
        // amortised share of open/closed bookkeeping.
        let node_bytes = (num_variables as u64) * 20 + 160;
        Self {
            deadline,
            memory_budget_bytes: config.memory_mb.map(|mb| mb * 1024 * 1024),
            node_bytes,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            deadline: None,
            memory_budget_bytes: None,
            node_bytes: 0,
        }
    }

    pub fn check(&self, generated: u64) -> Result<(), ResourceExhausted> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ResourceExhausted::OutOfTime);
            }
        }
        if let Some(budget) = self.memory_budget_bytes {
            if generated.saturating_mul(self.node_bytes) > budget {
                return Err(ResourceExhausted::OutOfMemory);
            }
        }
        Ok(())
    }

    /// Estimated peak memory in kilobytes, for the statistics document.
    pub fn estimated_kb(&self, generated: u64) -> u64 {
        generated.saturating_mul(self.node_bytes) / 1024
    }
}

/// A BFWS search node. Mutable only between construction and evaluation;
/// once pushed it is shared through `Rc` by the open list, the closed map
/// and its children.
pub struct SearchNode {
    pub state: State,
    /// Action that produced this node; `None` at the root.
    pub action: Option<Rc<GroundAction>>,
    pub parent: Option<Rc<SearchNode>>,
    pub g: u32,
    pub novelty: u32,
    /// #g: unachieved goal conjuncts.
    pub unachieved: u32,
    /// #r: relevant atoms reached along the path.
    pub reached: u32,
    pub relevant: RelevantAtomSet,
    pub feature_valuation: Vec<i32>,
    /// The novelty type ⟨#g, #r⟩ packed into the table key.
    pub novelty_type: u64,
}

impl SearchNode {
    fn root(state: State) -> Self {
        Self {
            state,
            action: None,
            parent: None,
            g: 0,
            novelty: u32::MAX,
            unachieved: u32::MAX,
            reached: 0,
            relevant: RelevantAtomSet::new(),
            feature_valuation: Vec::new(),
            novelty_type: 0,
        }
    }

    fn child(state: State, action: Rc<GroundAction>, parent: Rc<SearchNode>) -> Self {
        let g = parent.g + 1;
        Self {
            state,
            action: Some(action),
            parent: Some(parent),
            g,
            novelty: u32::MAX,
            unachieved: u32::MAX,
            reached: 0,
            relevant: RelevantAtomSet::new(),
            feature_valuation: Vec::new(),
            novelty_type: 0,
        }
    }
}

/// Open-list entry: priority key, FIFO sequence for tie-breaking, node.
struct OpenEntry {
    key: [u32; 4],
    seq: u64,
    node: Rc<SearchNode>,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap, the search wants the
        // lexicographically smallest key (and oldest entry on ties).
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The BFWS heuristic ensemble: unachieved-goal count, relevant-atom
/// maintenance (via IW simulation) and per-type novelty.
pub struct BfwsHeuristic {
    goal_counter: UnachievedGoalCount,
    features: FeatureSet,
    search_evaluator: NoveltyEvaluator,
    simulation_template: NoveltyTable,
    mark_negative: bool,
    simulation_node_cap: u64,
}

impl BfwsHeuristic {
    /// Build the ensemble from the resolved configuration. A width-2
    /// search table over budget downgrades to width 1 when the
    /// configuration allows it; otherwise the budget error propagates.
    pub fn new(
        goal: &crate::formula::Formula,
        info: &crate::info::ProblemInfo,
        config: &SearchConfig,
    ) -> Result<Self, crate::error::NoveltyBudgetExceeded> {
        let features = FeatureSet::state_variables(info);
        let indexer = ValuationIndexer::new(&features);

        let search_template = match NoveltyTable::create(
            indexer.clone(),
            config.ignore_negative,
            config.search_width.min(2),
            config.novelty_budget,
        ) {
            Ok(table) => table,
            Err(err) if config.downgrade_on_budget => {
                info!(
                    required = err.required,
                    budget = err.budget,
                    "novelty table over budget, downgrading to width 1"
                );
                NoveltyTable::create(indexer.clone(), config.ignore_negative, 1, config.novelty_budget)?
            }
            Err(err) => return Err(err),
        };

        let simulation_template = NoveltyTable::create(
            indexer,
            config.ignore_negative,
            config.simulation_width.min(2),
            config.novelty_budget,
        )?;

        Ok(Self {
            goal_counter: UnachievedGoalCount::new(goal),
            features,
            search_evaluator: NoveltyEvaluator::new(search_template),
            simulation_template,
            mark_negative: config.mark_negative_propositions,
            simulation_node_cap: config.simulation_node_cap,
        })
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Evaluate a node: #g, then R, then novelty. The order matters — the
    /// novelty type is keyed by the first two.
    pub fn evaluate(
        &mut self,
        node: &mut SearchNode,
        parent: Option<&SearchNode>,
        model: &StateModel,
        stats: &mut SearchStats,
    ) -> Result<(), LangError> {
        let info = &model.problem().info;

        node.unachieved = self.goal_counter.evaluate(&node.state, info)?;

        // R is recomputed at the root and whenever #g strictly decreases;
        // otherwise it is inherited and re-marked against this state.
        let recompute = match parent {
            None => true,
            Some(parent) => node.unachieved < parent.unachieved,
        };
        if recompute {
            stats.simulation();
            let simulation = IwSimulation {
                template: &self.simulation_template,
                goal: &self.goal_counter,
                features: &self.features,
                mark_negative: self.mark_negative,
                node_cap: self.simulation_node_cap,
            };
            let outcome = simulation.run(&node.state, model)?;
            if parent.is_none() {
                stats.set_initial_reachable_subgoals(outcome.reachable_subgoals);
                stats.set_initial_relevant_atoms(outcome.relevant.num_unreached());
            }
            node.relevant = outcome.relevant;
        } else {
            node.relevant = parent.expect("inherit requires a parent").relevant.clone();
        }
        node.relevant.mark_reached(&node.state, self.mark_negative);
        node.reached = node.relevant.num_reached();

        node.novelty_type = novelty_key(node.unachieved, node.reached);
        node.feature_valuation = self.features.valuation(&node.state);
        node.novelty = self
            .search_evaluator
            .evaluate(node.novelty_type, &node.feature_valuation);
        stats.evaluation();
        Ok(())
    }
}

/// Priority key of a node under the configured ordering.
pub(crate) fn priority(bfws_type: BfwsType, node: &SearchNode) -> [u32; 4] {
    match bfws_type {
        BfwsType::F0 => [node.g, 0, 0, 0],
        BfwsType::F1 => [node.unachieved, node.novelty, node.g, 0],
        BfwsType::F2 => [node.novelty, node.unachieved, node.g, 0],
        BfwsType::F5 => [
            node.novelty,
            node.unachieved,
            u32::MAX - node.reached,
            node.g,
        ],
    }
}

/// The best-first width search engine.
pub struct BfwsSearch<'p> {
    model: StateModel<'p>,
    heuristic: BfwsHeuristic,
    bfws_type: BfwsType,
    monitor: ResourceMonitor,
    stats: SearchStats,
}

impl<'p> BfwsSearch<'p> {
    pub fn new(
        model: StateModel<'p>,
        heuristic: BfwsHeuristic,
        bfws_type: BfwsType,
        monitor: ResourceMonitor,
    ) -> Self {
        Self {
            model,
            heuristic,
            bfws_type,
            monitor,
            stats: SearchStats::new(),
        }
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn monitor(&self) -> &ResourceMonitor {
        &self.monitor
    }

    /// Run the expansion loop to a verdict.
    pub fn solve(&mut self) -> Result<SearchResult, LangError> {
        let mut open: BinaryHeap<OpenEntry> = BinaryHeap::new();
        let mut closed: HashMap<State, Rc<SearchNode>> = HashMap::new();
        let mut seq: u64 = 0;

        let mut root = SearchNode::root(self.model.problem().init.clone());
        self.heuristic
            .evaluate(&mut root, None, &self.model, &mut self.stats)?;
        self.stats.generation();
        let root = Rc::new(root);
        closed.insert(root.state.clone(), Rc::clone(&root));
        open.push(OpenEntry {
            key: priority(self.bfws_type, &root),
            seq,
            node: root,
        });

        while let Some(entry) = open.pop() {
            if let Err(exhausted) = self.monitor.check(self.stats.generated()) {
                info!(?exhausted, "search aborted by resource monitor");
                return Ok(SearchResult::failure(ExitCode::from(exhausted)));
            }

            let node = entry.node;

            // Lazy deletion: a rediscovered state leaves its older open
            // entry behind; only the closed map's current node is live.
            match closed.get(&node.state) {
                Some(current) if !Rc::ptr_eq(current, &node) => continue,
                _ => {}
            }

            if self.model.goal_satisfied(&node.state)? {
                debug!(g = node.g, "goal reached");
                return Ok(SearchResult::plan_found(reconstruct(&node)));
            }
            self.stats.expansion();

            for action in self.model.applicable(&node.state)? {
                let atoms = match self.model.manager().effects_of(&node.state, &action) {
                    Ok(atoms) => atoms,
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(_) => continue,
                };
                let child_state = node.state.progress(atoms);
                self.stats.generation();

                if let Some(constraints) = &self.model.problem().state_constraints {
                    if !self.model.manager().holds(constraints, &child_state)? {
                        continue;
                    }
                }

                let g = node.g + 1;
                if let Some(existing) = closed.get(&child_state) {
                    if existing.g <= g {
                        continue;
                    }
                }

                let mut child = SearchNode::child(child_state, Rc::clone(&action), Rc::clone(&node));
                self.heuristic
                    .evaluate(&mut child, Some(node.as_ref()), &self.model, &mut self.stats)?;
                let child = Rc::new(child);

                closed.insert(child.state.clone(), Rc::clone(&child));
                seq += 1;
                open.push(OpenEntry {
                    key: priority(self.bfws_type, &child),
                    seq,
                    node: child,
                });
            }
        }

        Ok(SearchResult::failure(ExitCode::Unsolvable))
    }
}

/// Walk the parent chain back to the root, collecting actions.
fn reconstruct(node: &Rc<SearchNode>) -> Vec<Rc<GroundAction>> {
    let mut plan = Vec::with_capacity(node.g as usize);
    let mut current = node;
    while let Some(parent) = &current.parent {
        plan.push(Rc::clone(
            current.action.as_ref().expect("non-root node has an action"),
        ));
        current = parent;
    }
    plan.reverse();
    plan
}

#[cfg(test)]
#[path = "tests/search.rs"]
mod tests;
