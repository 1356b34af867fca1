//! Search drivers: configuration-selected engine setups.
//!
//! A driver name resolves to a model realisation plus an engine:
//! `bfws`/`smart`/`native` run BFWS on the ground model, `lsmart`/`lifted`
//! run it on the lifted CSP model, `iw` runs the iterated-width ladder and
//! `bfs` runs plain breadth-first (BFWS with the F0 ordering and a
//! zero-width evaluator).

use std::path::Path;
use std::time::Instant;

use crate::config::{BfwsType, Config, SearchConfig};
use crate::error::LoadError;
use crate::features::FeatureSet;
use crate::iw::IwSearch;
use crate::problem::Problem;
use crate::search::{BfwsHeuristic, BfwsSearch, ExitCode, ResourceMonitor, SearchResult};
use crate::stats::{write_plan_file, ResultsDocument, SearchStats};
use crate::trace::info;
use crate::validate::check_plan;

/// Everything the host needs to report one run.
pub struct SearchOutcome {
    pub exit: ExitCode,
    /// Rendered ground-action names, in plan order.
    pub plan: Vec<String>,
    pub stats: SearchStats,
    pub search_time: f64,
    pub peak_memory_kb: u64,
    pub valid: bool,
}

impl SearchOutcome {
    pub fn solved(&self) -> bool {
        self.exit == ExitCode::PlanFound
    }

    /// Build the results document; `total_time` includes load time.
    pub fn results(&self, total_time: f64) -> ResultsDocument {
        ResultsDocument::new(
            &self.stats,
            total_time,
            self.search_time,
            self.peak_memory_kb,
            self.solved(),
            self.valid,
            self.exit == ExitCode::OutOfMemory,
            self.plan.clone(),
        )
    }

    /// Write `results.json` and `first.plan` under `out_dir`.
    pub fn write(&self, out_dir: &Path, total_time: f64) -> std::io::Result<()> {
        self.results(total_time).write(out_dir)?;
        write_plan_file(out_dir, &self.plan)
    }
}

/// Resolve the configured driver and run the search to completion.
pub fn solve(problem: &Problem, config: &Config) -> Result<SearchOutcome, LoadError> {
    let resolved = SearchConfig::resolve(config)?;
    crate::external::registry().freeze();

    let outcome = dispatch(problem, &resolved)?;
    info!(
        exit = ?outcome.exit,
        expanded = outcome.stats.expanded(),
        generated = outcome.stats.generated(),
        "search finished"
    );
    Ok(outcome)
}

fn dispatch(problem: &Problem, config: &SearchConfig) -> Result<SearchOutcome, LoadError> {
    match config.driver.as_str() {
        "bfws" | "smart" | "native" => run_bfws(problem, config, false, config.bfws_type),
        "lsmart" | "lifted" => run_bfws(problem, config, true, config.bfws_type),
        "bfs" => {
            // Plain breadth-first: F0 ordering, novelty switched off.
            let mut flat = config.clone();
            flat.search_width = 0;
            flat.simulation_width = 0;
            run_bfws(problem, &flat, false, BfwsType::F0)
        }
        "iw" => run_iw(problem, config),
        other => Err(LoadError::new(format!("unknown driver '{}'", other))),
    }
}

fn run_bfws(
    problem: &Problem,
    config: &SearchConfig,
    lifted: bool,
    bfws_type: BfwsType,
) -> Result<SearchOutcome, LoadError> {
    let model = if lifted {
        crate::model::StateModel::lifted(problem).map_err(LoadError::from)?
    } else {
        crate::model::StateModel::ground(problem).map_err(LoadError::from)?
    };
    let heuristic = BfwsHeuristic::new(&problem.goal, &problem.info, config)
        .map_err(|err| LoadError::new(err.to_string()))?;
    let monitor = ResourceMonitor::new(config, problem.info.num_variables());
    let mut engine = BfwsSearch::new(model, heuristic, bfws_type, monitor);

    let started = Instant::now();
    let result = engine.solve().map_err(LoadError::from)?;
    finish(problem, engine.stats().clone(), engine.monitor(), result, started)
}

fn run_iw(problem: &Problem, config: &SearchConfig) -> Result<SearchOutcome, LoadError> {
    let model = crate::model::StateModel::ground(problem).map_err(LoadError::from)?;
    let features = FeatureSet::state_variables(&problem.info);
    let monitor = ResourceMonitor::new(config, problem.info.num_variables());
    let engine = IwSearch {
        model,
        features,
        max_width: config.max_width,
        ignore_negative: config.ignore_negative,
        novelty_budget: config.novelty_budget,
        monitor,
    };

    let started = Instant::now();
    let mut stats = SearchStats::new();
    let result = engine.solve(&mut stats).map_err(LoadError::from)?;
    finish(problem, stats, &engine.monitor, result, started)
}

fn finish(
    problem: &Problem,
    stats: SearchStats,
    monitor: &ResourceMonitor,
    result: SearchResult,
    started: Instant,
) -> Result<SearchOutcome, LoadError> {
    let search_time = started.elapsed().as_secs_f64();

    let mut exit = result.exit;
    let mut valid = false;
    if result.solved() {
        match check_plan(problem, &result.plan) {
            Ok(()) => valid = true,
            Err(invariant) => {
                crate::trace::error!(%invariant, "plan failed validation");
                exit = ExitCode::ValidationFailed;
            }
        }
    }

    let plan = result
        .plan
        .iter()
        .map(|action| action.format(&problem.schemas, &problem.info))
        .collect();

    Ok(SearchOutcome {
        exit,
        plan,
        peak_memory_kb: monitor.estimated_kb(stats.generated()),
        stats,
        search_time,
        valid,
    })
}

#[cfg(test)]
#[path = "tests/driver.rs"]
mod tests;
