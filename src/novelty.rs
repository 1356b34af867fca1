//! Width-1 and width-2 novelty tables over feature valuations.
//!
//! A table answers "does this valuation contain a feature tuple never seen
//! before?" and records every tuple it is shown (query-and-mark). Novelty
//! of a valuation is the smallest width at which a new tuple exists, or
//! [`NOVELTY_UNKNOWN`] when every tuple is stale. Both widths are marked on
//! every query, so re-evaluating the same valuation against the same table
//! always yields `NOVELTY_UNKNOWN`.
//!
//! The evaluator keeps one table per caller-supplied key (for BFWS, the
//! pair of unachieved-goal and reached-relevant counts packed into an
//! integer), cloned on first use from a preconfigured template.

use hashbrown::HashMap;

use crate::error::NoveltyBudgetExceeded;
use crate::features::FeatureSet;
use crate::trace::debug;

/// Sentinel for "no tuple of any admitted width is new".
pub const NOVELTY_UNKNOWN: u32 = u32::MAX;

/// Default per-table memory budget, in bytes.
pub const DEFAULT_TABLE_BUDGET: u64 = 10_000_000;

/// Maps each (feature position, value) pair into a dense atom index in
/// `[0, num_indexes)`.
#[derive(Debug, Clone)]
pub struct ValuationIndexer {
    offsets: Vec<u32>,
    mins: Vec<i32>,
    num_indexes: u32,
}

impl ValuationIndexer {
    pub fn new(features: &FeatureSet) -> Self {
        let mut offsets = Vec::with_capacity(features.num_features());
        let mut mins = Vec::with_capacity(features.num_features());
        // Accumulate in u64: a feature over an unbounded integer range
        // must saturate rather than wrap, and the budget check in
        // `NoveltyTable::create` then refuses the table.
        let mut next = 0u64;
        for i in 0..features.num_features() {
            let (lo, hi) = features.range(i);
            offsets.push(next.min(u32::MAX as u64) as u32);
            mins.push(lo);
            let span = (hi as i64 - lo as i64) as u64 + 1;
            next = next.saturating_add(span).min(u32::MAX as u64);
        }
        Self {
            offsets,
            mins,
            num_indexes: next as u32,
        }
    }

    pub fn num_indexes(&self) -> u32 {
        self.num_indexes
    }

    pub fn to_index(&self, feature: usize, value: i32) -> u32 {
        self.offsets[feature] + (value - self.mins[feature]) as u32
    }
}

/// Symmetric pair code over atom indexes: strictly monotone in
/// `max(i, j)`, so growing the index range only appends to the table.
pub fn combine_indexes(i: u32, j: u32) -> u32 {
    debug_assert_ne!(i, j);
    let (hi, lo) = if i > j { (i, j) } else { (j, i) };
    hi * (hi - 1) / 2 + lo
}

/// Number of distinct pair codes over `num_indexes` atom indexes:
/// `combine(n-1, n-2) + 1`, i.e. n choose 2.
pub fn num_combined_indexes(num_indexes: u32) -> u64 {
    let n = num_indexes as u64;
    if n < 2 {
        return 0;
    }
    n * (n - 1) / 2
}

/// One query-and-mark novelty table for widths up to 2.
#[derive(Debug, Clone)]
pub struct NoveltyTable {
    indexer: ValuationIndexer,
    ignore_negative: bool,
    max_width: u32,
    seen1: Vec<bool>,
    seen2: Vec<bool>,
}

impl NoveltyTable {
    /// Build a table, refusing construction when the width-2 marker would
    /// exceed `budget` bytes.
    pub fn create(
        indexer: ValuationIndexer,
        ignore_negative: bool,
        max_width: u32,
        budget: u64,
    ) -> Result<Self, NoveltyBudgetExceeded> {
        debug_assert!(max_width <= 2, "tables only account widths 1 and 2");
        let max_width = max_width.min(2);
        let num_indexes = indexer.num_indexes();

        // The width-1 marker is usually negligible, but unbounded feature
        // ranges saturate the indexer and must be refused here as well.
        if max_width >= 1 {
            let expected = num_indexes as u64;
            if expected > budget {
                return Err(NoveltyBudgetExceeded {
                    required: expected,
                    budget,
                });
            }
        }

        let seen2 = if max_width >= 2 {
            let combined = num_combined_indexes(num_indexes);
            // One byte per marker; the estimate matches the allocation.
            let expected = combined;
            if expected > budget {
                return Err(NoveltyBudgetExceeded {
                    required: expected,
                    budget,
                });
            }
            debug!(size_kb = expected / 1024, "allocated width-2 novelty table");
            vec![false; combined as usize]
        } else {
            Vec::new()
        };

        Ok(Self {
            seen1: vec![false; num_indexes as usize],
            indexer,
            ignore_negative,
            max_width,
            seen2,
        })
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    /// Memory footprint of the markers, in bytes.
    pub fn expected_size(&self) -> u64 {
        self.seen1.len() as u64 + self.seen2.len() as u64
    }

    /// Novelty of `valuation`: 1 if some single feature value is new, else
    /// 2 if some pair is new (when width 2 is accounted), else
    /// `NOVELTY_UNKNOWN`. Every admitted tuple is marked as seen.
    pub fn evaluate(&mut self, valuation: &[i32]) -> u32 {
        if self.max_width == 0 {
            return NOVELTY_UNKNOWN;
        }

        let novel1 = self.update_width1(valuation);
        let novel2 = if self.max_width >= 2 {
            self.update_pairs(valuation)
        } else {
            false
        };

        if novel1 {
            1
        } else if novel2 {
            2
        } else {
            NOVELTY_UNKNOWN
        }
    }

    fn update_width1(&mut self, valuation: &[i32]) -> bool {
        let mut exists_novel = false;
        for (feature, &value) in valuation.iter().enumerate() {
            if self.ignore_negative && value == 0 {
                continue;
            }
            let index = self.indexer.to_index(feature, value) as usize;
            if !self.seen1[index] {
                self.seen1[index] = true;
                exists_novel = true;
            }
        }
        exists_novel
    }

    fn update_pairs(&mut self, valuation: &[i32]) -> bool {
        let indexes = self.index_valuation(valuation);
        let mut exists_novel = false;
        for (pos, &index_i) in indexes.iter().enumerate() {
            for &index_j in &indexes[pos + 1..] {
                let combined = combine_indexes(index_i, index_j) as usize;
                if !self.seen2[combined] {
                    self.seen2[combined] = true;
                    exists_novel = true;
                }
            }
        }
        exists_novel
    }

    /// Map a valuation to atom indexes, skipping suppressed values.
    fn index_valuation(&self, valuation: &[i32]) -> Vec<u32> {
        let mut indexes = Vec::with_capacity(valuation.len());
        for (feature, &value) in valuation.iter().enumerate() {
            if self.ignore_negative && value == 0 {
                continue;
            }
            indexes.push(self.indexer.to_index(feature, value));
        }
        indexes
    }
}

/// Pack the BFWS novelty type ⟨#unachieved goals, #reached relevant⟩ into
/// a single table key.
pub fn novelty_key(unachieved: u32, reached: u32) -> u64 {
    ((unachieved as u64) << 16) | (reached as u64 & 0xffff)
}

/// Per-key novelty accounting: each novelty type gets its own table,
/// cloned from the template on first use.
#[derive(Debug, Clone)]
pub struct NoveltyEvaluator {
    template: NoveltyTable,
    tables: HashMap<u64, NoveltyTable>,
}

impl NoveltyEvaluator {
    pub fn new(template: NoveltyTable) -> Self {
        Self {
            template,
            tables: HashMap::new(),
        }
    }

    pub fn max_width(&self) -> u32 {
        self.template.max_width()
    }

    /// Evaluate against (and mark in) the table for `key`.
    pub fn evaluate(&mut self, key: u64, valuation: &[i32]) -> u32 {
        let template = &self.template;
        self.tables
            .entry(key)
            .or_insert_with(|| template.clone())
            .evaluate(valuation)
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }
}

#[cfg(test)]
#[path = "tests/novelty.rs"]
mod tests;
