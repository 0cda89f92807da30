//! Aggregation Engine
//!
//! Walks a batch of tree records, resolves each species code to its i-Tree
//! code in the record's own region, interpolates every factor and sums the
//! results. Any lookup failure aborts the whole batch: a partial sum would
//! silently undercount benefits.

use crate::curves::CurveStore;
use crate::error::{EcoError, EcoResult};
use crate::factors::BenefitVector;
use crate::interpolate::calc_one_tree;
use crate::species::SpeciesMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One tree: local species code, trunk diameter, region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub otm_code: String,
    pub diameter: f64,
    pub region: String,
}

impl TreeRecord {
    pub fn new(otm_code: impl Into<String>, diameter: f64, region: impl Into<String>) -> Self {
        TreeRecord {
            otm_code: otm_code.into(),
            diameter,
            region: region.into(),
        }
    }
}

/// Ordered records with a progress cursor
///
/// `advance` and `reset` are the only mutators, so one allocation can be
/// replayed any number of times.
#[derive(Debug, Clone)]
pub struct TreeBatch {
    records: Vec<TreeRecord>,
    cursor: usize,
    multi_region: bool,
}

impl TreeBatch {
    pub fn new(records: Vec<TreeRecord>) -> Self {
        let multi_region = records
            .split_first()
            .map(|(first, rest)| rest.iter().any(|r| r.region != first.region))
            .unwrap_or(false);

        TreeBatch {
            records,
            cursor: 0,
            multi_region,
        }
    }

    /// Next unprocessed record, moving the cursor past it
    pub fn advance(&mut self) -> Option<&TreeRecord> {
        let record = self.records.get(self.cursor)?;
        self.cursor += 1;
        Some(record)
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn is_multi_region(&self) -> bool {
        self.multi_region
    }

    pub fn records(&self) -> &[TreeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Whether per-tree vectors are kept alongside the totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    Summary,
    PerTree,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenefitResults {
    /// Sum over every processed tree
    pub total: BenefitVector,
    /// Per-region sums; only filled for multi-region batches
    pub by_region: BTreeMap<String, BenefitVector>,
    /// One vector per processed tree in batch order (`Accumulation::PerTree`)
    pub per_tree: Vec<BenefitVector>,
    pub tree_count: usize,
}

/// Compute benefits for every record of `batch` from `start` onwards
pub fn calc_benefits(
    batch: &mut TreeBatch,
    start: usize,
    species: &SpeciesMap,
    curves: &CurveStore,
    accumulation: Accumulation,
) -> EcoResult<BenefitResults> {
    let multi_region = batch.is_multi_region();
    let mut results = BenefitResults::default();
    if accumulation == Accumulation::PerTree {
        results.per_tree.reserve(batch.len().saturating_sub(start));
    }

    batch.reset();
    for _ in 0..start {
        if batch.advance().is_none() {
            break;
        }
    }

    while let Some(record) = batch.advance() {
        let region_species = species
            .region(&record.region)
            .ok_or_else(|| EcoError::UnknownRegion(record.region.clone()))?;

        let itree_code = region_species
            .get(&record.otm_code)
            .ok_or_else(|| EcoError::UnknownSpecies {
                region: record.region.clone(),
                code: record.otm_code.clone(),
            })?;

        let region_curves = curves
            .region(&record.region)
            .ok_or_else(|| EcoError::RegionNotLoaded(record.region.clone()))?;

        let mut tree = BenefitVector::zero();
        calc_one_tree(region_curves, itree_code, record.diameter, &mut tree);

        results.total += &tree;
        if multi_region {
            *results
                .by_region
                .entry(record.region.clone())
                .or_insert_with(BenefitVector::zero) += &tree;
        }
        if accumulation == Accumulation::PerTree {
            results.per_tree.push(tree);
        }
        results.tree_count += 1;
    }

    Ok(results)
}
