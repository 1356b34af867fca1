//! Search statistics and the outbound results documents.
//!
//! Counters mirror the expansion loop one-to-one: `generation` per child
//! state built, `expansion` per popped node, `evaluation` per heuristic
//! evaluation, `simulation` per IW run. The JSON results document and the
//! plain-text `.plan` file are the planner's only outbound artifacts.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

/// Aggregate counters of one search run.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    expanded: u64,
    generated: u64,
    evaluated: u64,
    simulations: u64,
    /// Subgoals reachable in the initial-state simulation.
    initial_reachable_subgoals: u32,
    /// |R| after the initial-state simulation.
    initial_relevant_atoms: u32,
}

impl SearchStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn expansion(&mut self) {
        self.expanded += 1;
    }

    #[inline]
    pub fn generation(&mut self) {
        self.generated += 1;
    }

    #[inline]
    pub fn evaluation(&mut self) {
        self.evaluated += 1;
    }

    #[inline]
    pub fn simulation(&mut self) {
        self.simulations += 1;
    }

    pub fn expanded(&self) -> u64 {
        self.expanded
    }

    pub fn generated(&self) -> u64 {
        self.generated
    }

    pub fn evaluated(&self) -> u64 {
        self.evaluated
    }

    pub fn simulations(&self) -> u64 {
        self.simulations
    }

    pub fn set_initial_reachable_subgoals(&mut self, num: u32) {
        self.initial_reachable_subgoals = num;
    }

    pub fn set_initial_relevant_atoms(&mut self, num: u32) {
        self.initial_relevant_atoms = num;
    }

    pub fn initial_reachable_subgoals(&self) -> u32 {
        self.initial_reachable_subgoals
    }

    pub fn initial_relevant_atoms(&self) -> u32 {
        self.initial_relevant_atoms
    }
}

/// The JSON results document, with the exact key set the host expects.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsDocument {
    pub total_time: f64,
    pub search_time: f64,
    /// Peak memory estimate, in kilobytes.
    pub memory: u64,
    pub generated: u64,
    pub expanded: u64,
    pub evaluated: u64,
    pub gen_per_second: f64,
    pub eval_per_second: f64,
    pub solved: bool,
    pub valid: bool,
    pub out_of_memory: bool,
    pub plan_length: usize,
    pub plan: Vec<String>,
}

impl ResultsDocument {
    pub fn new(
        stats: &SearchStats,
        total_time: f64,
        search_time: f64,
        memory_kb: u64,
        solved: bool,
        valid: bool,
        out_of_memory: bool,
        plan: Vec<String>,
    ) -> Self {
        let gen_per_second = if search_time > 0.0 {
            stats.generated() as f64 / search_time
        } else {
            0.0
        };
        let eval_per_second = if search_time > 0.0 {
            stats.evaluated() as f64 / search_time
        } else {
            0.0
        };
        ResultsDocument {
            total_time,
            search_time,
            memory: memory_kb,
            generated: stats.generated(),
            expanded: stats.expanded(),
            evaluated: stats.evaluated(),
            gen_per_second,
            eval_per_second,
            solved,
            valid,
            out_of_memory,
            plan_length: plan.len(),
            plan,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("results document serializes")
    }

    /// Write `results.json` under `out_dir`.
    pub fn write(&self, out_dir: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(out_dir.join("results.json"))?;
        let rendered = serde_json::to_string_pretty(self).expect("results document serializes");
        file.write_all(rendered.as_bytes())?;
        file.write_all(b"\n")
    }
}

/// Write `first.plan` under `out_dir`: one ground-action name per line.
pub fn write_plan_file(out_dir: &Path, plan: &[String]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(out_dir.join("first.plan"))?;
    for name in plan {
        writeln!(file, "{}", name)?;
    }
    Ok(())
}
