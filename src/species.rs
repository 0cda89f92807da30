//! Species Resolver
//!
//! Maps a region's local (OTM) species codes to the canonical i-Tree codes
//! that key the benefit curves. Loaded once from a single JSON file:
//!
//! ```json
//! { "NoEastXXX": { "MASO": "BDS OTHER", "ACRU": "ACRU" }, ... }
//! ```

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Region → (OTM code → i-Tree code)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeciesMap {
    regions: FxHashMap<String, FxHashMap<String, String>>,
}

impl SpeciesMap {
    /// Load the species mapping for all regions from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read species file: {:?}", path))?;

        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse species file: {:?}", path))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let raw: HashMap<String, HashMap<String, String>> = serde_json::from_str(contents)?;

        let regions = raw
            .into_iter()
            .map(|(region, codes)| (region, codes.into_iter().collect()))
            .collect();

        Ok(SpeciesMap { regions })
    }

    /// i-Tree code for an OTM code in a region
    pub fn resolve(&self, region: &str, otm_code: &str) -> Option<&str> {
        self.regions
            .get(region)
            .and_then(|codes| codes.get(otm_code))
            .map(|s| s.as_str())
    }

    /// Full code table for one region
    pub fn region(&self, region: &str) -> Option<&FxHashMap<String, String>> {
        self.regions.get(region)
    }

    pub fn contains_region(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl FromIterator<(String, FxHashMap<String, String>)> for SpeciesMap {
    fn from_iter<I: IntoIterator<Item = (String, FxHashMap<String, String>)>>(iter: I) -> Self {
        SpeciesMap {
            regions: iter.into_iter().collect(),
        }
    }
}
