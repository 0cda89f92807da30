//! Benefit Data Cache
//!
//! Owns the loaded species map and curve store as one immutable
//! [`Generation`]. Readers clone an `Arc` to the current generation and keep
//! using it for the whole request; invalidation builds a complete new
//! generation off to the side and then swaps the pointer, so a request sees
//! either the old data or the new data, never a mix of both.

use crate::aggregate::{calc_benefits, Accumulation, BenefitResults, TreeBatch};
use crate::config::Config;
use crate::curves::{CurveStore, RegionCurveSet};
use crate::error::{EcoError, EcoResult};
use crate::species::SpeciesMap;
use anyhow::Result;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

// ============================================================================
// Generation
// ============================================================================

/// One consistent, read-only snapshot of all benefit data
#[derive(Debug)]
pub struct Generation {
    id: u64,
    species: SpeciesMap,
    curves: CurveStore,
}

/// Regions present in only one of the two data sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionMismatch {
    pub missing_curves: Vec<String>,
    pub missing_species: Vec<String>,
}

impl RegionMismatch {
    pub fn is_empty(&self) -> bool {
        self.missing_curves.is_empty() && self.missing_species.is_empty()
    }
}

impl Generation {
    pub fn new(id: u64, species: SpeciesMap, curves: CurveStore) -> Self {
        Generation { id, species, curves }
    }

    /// Load the species file and every region's curves
    pub fn load(id: u64, data_dir: &Path, species_file: &Path) -> Result<Self> {
        let (species, curves) = rayon::join(
            || SpeciesMap::load(species_file),
            || CurveStore::load(data_dir),
        );
        let generation = Generation::new(id, species?, curves?);

        let mismatch = generation.region_mismatches();
        if !mismatch.is_empty() {
            tracing::warn!(
                "Region sets differ: no curves for {:?}, no species map for {:?}",
                mismatch.missing_curves,
                mismatch.missing_species
            );
        }

        Ok(generation)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn species(&self) -> &SpeciesMap {
        &self.species
    }

    pub fn curves(&self) -> &CurveStore {
        &self.curves
    }

    pub fn species_for(&self, region: &str) -> Option<&FxHashMap<String, String>> {
        self.species.region(region)
    }

    pub fn curves_for(&self, region: &str) -> Option<&RegionCurveSet> {
        self.curves.region(region)
    }

    /// i-Tree code for an OTM code, as a data error when either is unknown
    pub fn resolve(&self, region: &str, otm_code: &str) -> EcoResult<&str> {
        let codes = self
            .species_for(region)
            .ok_or_else(|| EcoError::UnknownRegion(region.to_string()))?;

        codes
            .get(otm_code)
            .map(|s| s.as_str())
            .ok_or_else(|| EcoError::UnknownSpecies {
                region: region.to_string(),
                code: otm_code.to_string(),
            })
    }

    pub fn calc_benefits(
        &self,
        batch: &mut TreeBatch,
        start: usize,
        accumulation: Accumulation,
    ) -> EcoResult<BenefitResults> {
        calc_benefits(batch, start, &self.species, &self.curves, accumulation)
    }

    /// Sorted i-Tree codes with curve data, per region
    pub fn itree_codes(&self) -> BTreeMap<String, Vec<String>> {
        self.curves
            .regions()
            .filter_map(|region| {
                let set = self.curves.region(region)?;
                let codes: Vec<String> = set.itree_codes().into_iter().map(str::to_string).collect();
                Some((region.to_string(), codes))
            })
            .collect()
    }

    /// Cross-check the species map against the curve store
    pub fn region_mismatches(&self) -> RegionMismatch {
        let species: BTreeSet<&str> = self.species.regions().collect();
        let curves: BTreeSet<&str> = self.curves.regions().collect();

        RegionMismatch {
            missing_curves: species.difference(&curves).map(|s| s.to_string()).collect(),
            missing_species: curves.difference(&species).map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Long-lived owner of the current [`Generation`]
pub struct EcoCache {
    data_dir: PathBuf,
    species_file: PathBuf,
    current: RwLock<Option<Arc<Generation>>>,
    /// Serializes loads; never held by readers
    reload: Mutex<()>,
    next_id: AtomicU64,
}

impl EcoCache {
    /// Empty cache; data is loaded on first [`snapshot`](Self::snapshot) or
    /// [`invalidate`](Self::invalidate)
    pub fn new(config: &Config) -> Self {
        EcoCache {
            data_dir: config.data_dir.clone(),
            species_file: config.species_file.clone(),
            current: RwLock::new(None),
            reload: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Shared cache plus a zero-argument invalidation hook
    pub fn init(
        config: &Config,
    ) -> (Arc<Self>, impl Fn() -> EcoResult<u64> + Clone + Send + Sync + 'static) {
        let cache = Arc::new(EcoCache::new(config));
        let handle = Arc::clone(&cache);
        let invalidate = move || handle.invalidate().map(|g| g.id());
        (cache, invalidate)
    }

    /// Current generation, if one has been published
    pub fn current(&self) -> Option<Arc<Generation>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current generation, loading it first if nothing is published yet
    pub fn snapshot(&self) -> EcoResult<Arc<Generation>> {
        if let Some(generation) = self.current() {
            return Ok(generation);
        }

        let _guard = self.reload.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished loading while we waited
        if let Some(generation) = self.current() {
            return Ok(generation);
        }
        self.load_and_publish()
    }

    /// Reload everything from disk and publish it as the new generation
    ///
    /// On failure the previous generation stays in service.
    pub fn invalidate(&self) -> EcoResult<Arc<Generation>> {
        let _guard = self.reload.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_and_publish()
    }

    // Caller holds `reload`
    fn load_and_publish(&self) -> EcoResult<Arc<Generation>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let generation = match Generation::load(id, &self.data_dir, &self.species_file) {
            Ok(g) => Arc::new(g),
            Err(e) => {
                tracing::warn!("Failed to load generation {}: {:#}", id, e);
                return Err(EcoError::Load(e));
            }
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&generation));

        tracing::info!(
            "Published data generation {} ({} species regions, {} curve regions) in {:?}",
            id,
            generation.species().len(),
            generation.curves().len(),
            start.elapsed()
        );

        Ok(generation)
    }
}
