//! String-keyed engine configuration.
//!
//! There is no process-wide configuration object: a `Config` is built by
//! the host, resolved into a [`SearchConfig`], and threaded through
//! construction.

use hashbrown::HashMap;

use crate::error::LoadError;

/// Raw key/value configuration, as parsed from the command line or a
/// host-supplied map.
#[derive(Debug, Clone, Default)]
pub struct Config {
    entries: HashMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_or(&self, key: &str, default: &'static str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    fn get_u32(&self, key: &str, default: u32) -> Result<u32, LoadError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| LoadError::new(format!("option '{}' is not an integer: {}", key, raw))),
        }
    }

    fn get_u64_opt(&self, key: &str) -> Result<Option<u64>, LoadError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| LoadError::new(format!("option '{}' is not an integer: {}", key, raw))),
        }
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, LoadError> {
        match self.get(key) {
            None => Ok(default),
            Some("true") | Some("1") => Ok(true),
            Some("false") | Some("0") => Ok(false),
            Some(raw) => Err(LoadError::new(format!(
                "option '{}' is not a boolean: {}",
                key, raw
            ))),
        }
    }
}

/// The BFWS open-list ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BfwsType {
    /// ⟨g⟩: plain breadth-first by accumulated cost.
    F0,
    /// ⟨h, novelty, g⟩.
    F1,
    /// ⟨novelty, h, g⟩.
    F2,
    /// ⟨novelty, h, reached (descending), g⟩.
    F5,
}

impl BfwsType {
    fn parse(raw: &str) -> Result<Self, LoadError> {
        match raw {
            "F0" | "f0" => Ok(BfwsType::F0),
            "F1" | "f1" => Ok(BfwsType::F1),
            "F2" | "f2" => Ok(BfwsType::F2),
            "F5" | "f5" => Ok(BfwsType::F5),
            other => Err(LoadError::new(format!("unknown bfws.type: {}", other))),
        }
    }
}

/// Resolved configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Search variant: bfws, iw, bfs, lifted.
    pub driver: String,
    pub bfws_type: BfwsType,
    /// Maximum width tried by the IW driver.
    pub max_width: u32,
    /// Width cap of the main-search novelty tables.
    pub search_width: u32,
    /// Width cap of the simulation novelty table.
    pub simulation_width: u32,
    /// Node cap of one IW simulation run.
    pub simulation_node_cap: u64,
    /// Whether falsified propositions count as relevant/reached.
    pub mark_negative_propositions: bool,
    /// Novelty-evaluator flag: feature value 0 contributes nothing.
    pub ignore_negative: bool,
    /// Novelty-table storage flavour.
    pub evaluator_t: String,
    /// Per-table novelty memory budget, bytes.
    pub novelty_budget: u64,
    /// Downgrade to width 1 instead of failing when a width-2 table
    /// exceeds the budget.
    pub downgrade_on_budget: bool,
    pub timeout_ms: Option<u64>,
    pub memory_mb: Option<u64>,
}

impl SearchConfig {
    pub fn resolve(config: &Config) -> Result<Self, LoadError> {
        Ok(SearchConfig {
            driver: config.get_or("driver", "bfws"),
            bfws_type: BfwsType::parse(&config.get_or("bfws.type", "F5"))?,
            max_width: config.get_u32("width.max", 2)?,
            search_width: config.get_u32("search_width", 2)?,
            simulation_width: config.get_u32("simulation_width", 1)?,
            simulation_node_cap: config
                .get_u64_opt("simulation_node_cap")?
                .unwrap_or(50_000),
            mark_negative_propositions: config.get_bool("mark_negative_propositions", false)?,
            ignore_negative: config.get_bool("ignore_negative", false)?,
            evaluator_t: config.get_or("evaluator_t", "generic"),
            novelty_budget: config
                .get_u64_opt("novelty_budget")?
                .unwrap_or(crate::novelty::DEFAULT_TABLE_BUDGET),
            downgrade_on_budget: config.get_bool("downgrade_on_budget", true)?,
            timeout_ms: config.get_u64_opt("timeout_ms")?,
            memory_mb: config.get_u64_opt("memory_mb")?,
        })
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig::resolve(&Config::new()).expect("defaults are valid")
    }
}
