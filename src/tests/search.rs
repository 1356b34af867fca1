use smallvec::smallvec;

use crate::action::{ActionSchema, Effect, EffectKind};
use crate::config::{BfwsType, SearchConfig};
use crate::formula::Formula;
use crate::model::StateModel;
use crate::object::Object;
use crate::problem::Problem;
use crate::search::{BfwsHeuristic, BfwsSearch, ExitCode, ResourceMonitor};
use crate::state::State;
use crate::term::Term;
use crate::test_utils::{eq, fluent, pick_problem, switches_info, switches_problem};

fn run(problem: &Problem, bfws_type: BfwsType) -> (crate::search::SearchResult, crate::stats::SearchStats) {
    let config = SearchConfig::default();
    let model = StateModel::ground(problem).unwrap();
    let heuristic = BfwsHeuristic::new(&problem.goal, &problem.info, &config).unwrap();
    let mut engine = BfwsSearch::new(model, heuristic, bfws_type, ResourceMonitor::unlimited());
    let result = engine.solve().unwrap();
    (result, engine.stats().clone())
}

fn plan_names(problem: &Problem, result: &crate::search::SearchResult) -> Vec<String> {
    result
        .plan
        .iter()
        .map(|a| a.format(&problem.schemas, &problem.info))
        .collect()
}

/// Trivial goal: no actions, goal already satisfied in the initial state.
#[test]
fn trivial_goal_returns_the_empty_plan() {
    let info = switches_info(&["p"]);
    let goal = eq(
        fluent(&info, "p", Vec::new()),
        Term::Constant(Object::Bool(false)),
    );
    let problem = Problem::new(
        info,
        State::new(vec![Object::Bool(false)]),
        Vec::new(),
        goal,
        None,
    );

    let (result, stats) = run(&problem, BfwsType::F5);
    assert_eq!(result.exit, ExitCode::PlanFound);
    assert!(result.plan.is_empty());
    assert_eq!(stats.generated(), 1);
    assert!(stats.expanded() <= 1);
}

/// Single toggle: one action flips `p`, goal `p = true`.
#[test]
fn single_toggle_finds_a_one_step_plan() {
    let info = switches_info(&["p"]);
    let p = fluent(&info, "p", Vec::new());
    let toggle = ActionSchema {
        name: "toggle".to_string(),
        signature: smallvec![],
        param_names: Vec::new(),
        precondition: Formula::Tautology,
        effects: vec![
            Effect {
                condition: Some(eq(p.clone(), Term::Constant(Object::Bool(false)))),
                kind: EffectKind::Add { lhs: p.clone() },
            },
            Effect {
                condition: Some(eq(p.clone(), Term::Constant(Object::Bool(true)))),
                kind: EffectKind::Delete { lhs: p.clone() },
            },
        ],
    };
    let goal = eq(p, Term::Constant(Object::Bool(true)));
    let problem = Problem::new(
        info,
        State::new(vec![Object::Bool(false)]),
        vec![toggle],
        goal,
        None,
    );

    let (result, stats) = run(&problem, BfwsType::F5);
    assert_eq!(result.exit, ExitCode::PlanFound);
    assert_eq!(plan_names(&problem, &result), vec!["toggle()"]);
    assert!(stats.expanded() <= 2);
}

/// Conjunctive goal over two independent switches: any order works, the
/// plan has exactly both actions.
#[test]
fn independent_switches_need_both_actions() {
    let problem = switches_problem(&["a", "b"]);
    let (result, _) = run(&problem, BfwsType::F5);

    assert_eq!(result.exit, ExitCode::PlanFound);
    let mut names = plan_names(&problem, &result);
    names.sort();
    assert_eq!(names, vec!["set_a()", "set_b()"]);
    crate::validate::check_plan(&problem, &result.plan).unwrap();
}

/// Existential-style precondition over a typed parameter; universal goal.
#[test]
fn pick_problem_selects_the_held_object() {
    let problem = pick_problem(3, &[1]);
    let (result, _) = run(&problem, BfwsType::F5);

    assert_eq!(result.exit, ExitCode::PlanFound);
    assert_eq!(plan_names(&problem, &result), vec!["pick(o1)"]);
}

/// Goal satisfied at the root even though no action can ever fire.
#[test]
fn satisfied_goal_beats_unreachable_actions() {
    let info = switches_info(&["p"]);
    let p = fluent(&info, "p", Vec::new());
    let needs_p = ActionSchema {
        name: "consume".to_string(),
        signature: smallvec![],
        param_names: Vec::new(),
        precondition: eq(p.clone(), Term::Constant(Object::Bool(true))),
        effects: vec![Effect::unconditional(EffectKind::Delete { lhs: p.clone() })],
    };
    let goal = eq(p, Term::Constant(Object::Bool(false)));
    let problem = Problem::new(
        info,
        State::new(vec![Object::Bool(false)]),
        vec![needs_p],
        goal,
        None,
    );

    let (result, _) = run(&problem, BfwsType::F5);
    assert_eq!(result.exit, ExitCode::PlanFound);
    assert!(result.plan.is_empty());
}

/// No action can make `p` true: the search must exhaust and report
/// unsolvable.
#[test]
fn unreachable_goal_is_unsolvable() {
    let info = switches_info(&["p"]);
    let p = fluent(&info, "p", Vec::new());
    let clear = ActionSchema {
        name: "clear".to_string(),
        signature: smallvec![],
        param_names: Vec::new(),
        precondition: Formula::Tautology,
        effects: vec![Effect::unconditional(EffectKind::Delete { lhs: p.clone() })],
    };
    let goal = eq(p, Term::Constant(Object::Bool(true)));
    let problem = Problem::new(
        info,
        State::new(vec![Object::Bool(false)]),
        vec![clear],
        goal,
        None,
    );

    let (result, _) = run(&problem, BfwsType::F5);
    assert_eq!(result.exit, ExitCode::Unsolvable);
    assert!(result.plan.is_empty());
}

/// The returned plan must replay cleanly from the initial state.
#[test]
fn plans_always_validate() {
    for problem in [
        switches_problem(&["a", "b", "c"]),
        pick_problem(4, &[0, 3]),
    ] {
        let (result, _) = run(&problem, BfwsType::F5);
        assert_eq!(result.exit, ExitCode::PlanFound);
        crate::validate::check_plan(&problem, &result.plan).unwrap();
    }
}

/// Determinism: identical runs yield identical plans and counters.
#[test]
fn repeated_runs_are_deterministic() {
    let problem = pick_problem(5, &[0, 2, 4]);
    let (first, stats_a) = run(&problem, BfwsType::F2);
    let (second, stats_b) = run(&problem, BfwsType::F2);

    assert_eq!(plan_names(&problem, &first), plan_names(&problem, &second));
    assert_eq!(stats_a.expanded(), stats_b.expanded());
    assert_eq!(stats_a.generated(), stats_b.generated());
    assert_eq!(stats_a.evaluated(), stats_b.evaluated());
}

/// All four orderings solve the same problem with valid plans.
#[test]
fn every_ordering_solves_and_validates() {
    for bfws_type in [BfwsType::F0, BfwsType::F1, BfwsType::F2, BfwsType::F5] {
        let problem = switches_problem(&["a", "b"]);
        let (result, _) = run(&problem, bfws_type);
        assert_eq!(result.exit, ExitCode::PlanFound, "ordering {:?}", bfws_type);
        crate::validate::check_plan(&problem, &result.plan).unwrap();
    }
}

/// Deadline of zero trips the monitor on the first pop.
#[test]
fn expired_deadline_returns_out_of_time() {
    let problem = switches_problem(&["a", "b"]);
    let mut config = SearchConfig::default();
    config.timeout_ms = Some(0);

    let model = StateModel::ground(&problem).unwrap();
    let heuristic = BfwsHeuristic::new(&problem.goal, &problem.info, &config).unwrap();
    let monitor = ResourceMonitor::new(&config, problem.info.num_variables());
    let mut engine = BfwsSearch::new(model, heuristic, BfwsType::F5, monitor);
    let result = engine.solve().unwrap();
    assert_eq!(result.exit, ExitCode::OutOfTime);
}

/// A one-byte memory budget trips the monitor immediately.
#[test]
fn tiny_memory_budget_returns_out_of_memory() {
    let problem = switches_problem(&["a", "b"]);
    let mut config = SearchConfig::default();
    config.memory_mb = Some(0);

    let model = StateModel::ground(&problem).unwrap();
    let heuristic = BfwsHeuristic::new(&problem.goal, &problem.info, &config).unwrap();
    let monitor = ResourceMonitor::new(&config, problem.info.num_variables());
    let mut engine = BfwsSearch::new(model, heuristic, BfwsType::F5, monitor);
    let result = engine.solve().unwrap();
    assert_eq!(result.exit, ExitCode::OutOfMemory);
}

/// State constraints prune successors during search: with `a` pinned
/// false, only the `b` switch can be flipped.
#[test]
fn state_constraints_prune_successors() {
    let mut problem = switches_problem(&["a", "b"]);
    problem.goal = eq(
        fluent(&problem.info, "b", Vec::new()),
        Term::Constant(Object::Bool(true)),
    );
    problem.state_constraints = Some(eq(
        fluent(&problem.info, "a", Vec::new()),
        Term::Constant(Object::Bool(false)),
    ));

    let (result, _) = run(&problem, BfwsType::F5);
    assert_eq!(result.exit, ExitCode::PlanFound);
    assert_eq!(plan_names(&problem, &result), vec!["set_b()"]);
    crate::validate::check_plan(&problem, &result.plan).unwrap();
}

/// Lifted and ground models produce the same plan.
#[test]
fn lifted_model_matches_ground_model() {
    let problem = pick_problem(3, &[2]);
    let config = SearchConfig::default();

    let (ground_result, _) = run(&problem, BfwsType::F5);

    let model = StateModel::lifted(&problem).unwrap();
    let heuristic = BfwsHeuristic::new(&problem.goal, &problem.info, &config).unwrap();
    let mut engine = BfwsSearch::new(model, heuristic, BfwsType::F5, ResourceMonitor::unlimited());
    let lifted_result = engine.solve().unwrap();

    assert_eq!(lifted_result.exit, ExitCode::PlanFound);
    assert_eq!(
        plan_names(&problem, &ground_result),
        plan_names(&problem, &lifted_result)
    );
}

/// Closed-set soundness: once a state is expanded, no later node for the
/// same state with smaller g can appear; with unit costs a plan through a
/// 2-switch lattice has length exactly 2.
#[test]
fn rediscovered_states_do_not_regress() {
    let problem = switches_problem(&["a", "b"]);
    let (result, stats) = run(&problem, BfwsType::F0);
    assert_eq!(result.plan.len(), 2);
    // The diamond has 4 states; nothing should be expanded twice.
    assert!(stats.expanded() <= 4);
}

/// Novelty tie-break: with equal h, F2 prefers the more novel node; with
/// unequal h, F1 lets h dominate where F2 still orders by novelty first.
#[test]
fn f1_and_f2_order_novelty_differently() {
    let problem = switches_problem(&["a"]);

    let mut fresh = crate::search::SearchNode {
        state: problem.init.clone(),
        action: None,
        parent: None,
        g: 1,
        novelty: 1,
        unachieved: 2,
        reached: 0,
        relevant: crate::relevant::RelevantAtomSet::new(),
        feature_valuation: Vec::new(),
        novelty_type: 0,
    };
    let mut stale = crate::search::SearchNode {
        state: problem.init.clone(),
        action: None,
        parent: None,
        g: 1,
        novelty: 2,
        unachieved: 2,
        reached: 0,
        relevant: crate::relevant::RelevantAtomSet::new(),
        feature_valuation: Vec::new(),
        novelty_type: 0,
    };

    // Equal h: both orderings expand the novelty-1 node first.
    let p = crate::search::priority;
    assert!(p(BfwsType::F2, &fresh) < p(BfwsType::F2, &stale));
    assert!(p(BfwsType::F1, &fresh) < p(BfwsType::F1, &stale));

    // Smaller h on the less novel node: F1 flips, F2 does not.
    stale.unachieved = 1;
    fresh.unachieved = 2;
    assert!(p(BfwsType::F1, &stale) < p(BfwsType::F1, &fresh));
    assert!(p(BfwsType::F2, &fresh) < p(BfwsType::F2, &stale));
}
