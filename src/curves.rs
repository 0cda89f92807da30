//! Curve Store - per-region breakpoint curves, one collection per factor
//!
//! On disk each region is a directory holding one CSV per benefit factor:
//!
//! ```text
//! <data_dir>/<region>/<factor>.csv
//!
//! itree_code,3.81,11.43,22.86,38.10
//! ACRU,0.41,2.07,7.53,19.88
//! BDS OTHER,0.38,1.95,6.91,18.02
//! ```
//!
//! The header row carries the diameter breakpoints shared by every i-Tree
//! code in the file; each following row is one code's benefit values.

use crate::error::{EcoError, EcoResult};
use crate::factors::{FACTORS, FACTOR_COUNT};
use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Borrowed view of one breakpoint curve; breaks and values always pair up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Curve<'a> {
    breaks: &'a [f64],
    values: &'a [f64],
}

impl<'a> Curve<'a> {
    /// `None` unless there is at least one breakpoint and one value per breakpoint
    pub fn new(breaks: &'a [f64], values: &'a [f64]) -> Option<Self> {
        if breaks.is_empty() || breaks.len() != values.len() {
            return None;
        }
        Some(Curve { breaks, values })
    }

    pub fn breaks(&self) -> &'a [f64] {
        self.breaks
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }
}

/// All curves of one (region, factor): shared breakpoints + values per code
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactorCurves {
    breaks: Vec<f64>,
    values: FxHashMap<String, Vec<f64>>,
}

impl FactorCurves {
    /// Build a curve collection, checking that breakpoints are strictly
    /// increasing and that every code has one value per breakpoint
    pub fn new<I>(breaks: Vec<f64>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<f64>)>,
    {
        if breaks.is_empty() {
            anyhow::bail!("curve has no breakpoints");
        }
        if let Some(w) = breaks.windows(2).find(|w| !(w[0] < w[1])) {
            anyhow::bail!(
                "breakpoints must be strictly increasing ({} then {})",
                w[0],
                w[1]
            );
        }

        let mut map = FxHashMap::default();
        for (code, row) in values {
            if row.len() != breaks.len() {
                anyhow::bail!(
                    "code '{}' has {} values for {} breakpoints",
                    code,
                    row.len(),
                    breaks.len()
                );
            }
            if map.insert(code.clone(), row).is_some() {
                anyhow::bail!("duplicate code '{}'", code);
            }
        }

        Ok(FactorCurves { breaks, values: map })
    }

    /// Collection with no curves; every code contributes zero for this factor
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn curve(&self, itree_code: &str) -> Option<Curve<'_>> {
        self.values.get(itree_code).map(|values| Curve {
            breaks: &self.breaks,
            values,
        })
    }

    pub fn breaks(&self) -> &[f64] {
        &self.breaks
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One region's curves, indexed by position in [`FACTORS`]
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCurveSet {
    factors: Vec<FactorCurves>,
}

impl RegionCurveSet {
    /// Requires exactly one collection per factor
    pub fn new(factors: Vec<FactorCurves>) -> EcoResult<Self> {
        if factors.len() != FACTOR_COUNT {
            return Err(EcoError::FactorMismatch {
                expected: FACTOR_COUNT,
                actual: factors.len(),
            });
        }
        Ok(RegionCurveSet { factors })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FactorCurves> {
        self.factors.iter()
    }

    /// Every i-Tree code that has a curve for at least one factor
    pub fn itree_codes(&self) -> BTreeSet<&str> {
        self.factors.iter().flat_map(|f| f.codes()).collect()
    }
}

/// Region → curve set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveStore {
    regions: FxHashMap<String, RegionCurveSet>,
}

impl CurveStore {
    /// Load every region directory under `data_dir`
    ///
    /// Regions are loaded in parallel; any bad file fails the whole load.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(data_dir)
            .with_context(|| format!("Failed to read data directory: {:?}", data_dir))?;

        let mut region_dirs = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to list {:?}", data_dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // Hidden directories (.git, .cache) are not regions
            if !entry.file_type()?.is_dir() || name.starts_with('.') {
                continue;
            }
            region_dirs.push((name, entry.path()));
        }

        let regions = region_dirs
            .par_iter()
            .map(|(region, dir)| -> Result<(String, RegionCurveSet)> {
                let set = load_region(dir)
                    .with_context(|| format!("Failed to load region '{}'", region))?;
                Ok((region.clone(), set))
            })
            .collect::<Result<FxHashMap<_, _>>>()?;

        tracing::info!("Loaded curve sets for {} regions from {:?}", regions.len(), data_dir);

        Ok(CurveStore { regions })
    }

    pub fn region(&self, region: &str) -> Option<&RegionCurveSet> {
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

impl FromIterator<(String, RegionCurveSet)> for CurveStore {
    fn from_iter<I: IntoIterator<Item = (String, RegionCurveSet)>>(iter: I) -> Self {
        CurveStore {
            regions: iter.into_iter().collect(),
        }
    }
}

/// Load the per-factor files of one region directory
pub fn load_region(dir: &Path) -> Result<RegionCurveSet> {
    let factors = FACTORS
        .iter()
        .map(|factor| load_factor_file(&dir.join(format!("{}.csv", factor))))
        .collect::<Result<Vec<_>>>()?;

    Ok(RegionCurveSet::new(factors)?)
}

/// Parse one factor CSV into a curve collection
pub fn load_factor_file(path: &Path) -> Result<FactorCurves> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None) // Scan entire file
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to create CSV reader: {:?}", path))?
        .finish()
        .with_context(|| format!("Failed to load curve file: {:?}", path))?;

    let (code_col, value_cols) = df
        .get_columns()
        .split_first()
        .ok_or_else(|| anyhow!("Curve file has no columns: {:?}", path))?;

    // Header cells after the first are the diameter breakpoints
    let breaks = value_cols
        .iter()
        .map(|c| {
            let name = c.name().to_string();
            name.trim()
                .parse::<f64>()
                .with_context(|| format!("Breakpoint '{}' is not a number in {:?}", name, path))
        })
        .collect::<Result<Vec<f64>>>()?;

    let codes = code_col.cast(&DataType::String)?;
    let codes = codes.str()?;

    // Integer-looking columns come back as i64; normalise everything to f64
    let value_cols = value_cols
        .iter()
        .map(|c| c.cast(&DataType::Float64))
        .collect::<PolarsResult<Vec<_>>>()?;
    let value_cols = value_cols
        .iter()
        .map(|c| c.f64())
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let code = codes
            .get(idx)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Missing i-Tree code on row {} of {:?}", idx + 1, path))?;

        let values = value_cols
            .iter()
            .zip(breaks.iter())
            .map(|(col, brk)| {
                col.get(idx).ok_or_else(|| {
                    anyhow!("Missing value for '{}' at breakpoint {} in {:?}", code, brk, path)
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        rows.push((code, values));
    }

    FactorCurves::new(breaks, rows).with_context(|| format!("Invalid curve data in {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, contents: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_factor_curves_validation() {
        assert!(FactorCurves::new(vec![], Vec::new()).is_err());
        assert!(FactorCurves::new(vec![1.0, 1.0], Vec::new()).is_err());
        assert!(FactorCurves::new(vec![3.0, 1.0], Vec::new()).is_err());
        assert!(FactorCurves::new(vec![1.0, 2.0], vec![("A".to_string(), vec![1.0])]).is_err());

        let dup = vec![
            ("A".to_string(), vec![1.0, 2.0]),
            ("A".to_string(), vec![3.0, 4.0]),
        ];
        assert!(FactorCurves::new(vec![1.0, 2.0], dup).is_err());

        let ok = FactorCurves::new(vec![1.0, 2.0], vec![("A".to_string(), vec![1.0, 2.0])])
            .unwrap();
        let curve = ok.curve("A").unwrap();
        assert_eq!(curve.breaks(), &[1.0, 2.0]);
        assert_eq!(curve.values(), &[1.0, 2.0]);
        assert!(ok.curve("B").is_none());
    }

    #[test]
    fn test_region_curve_set_requires_every_factor() {
        let err = RegionCurveSet::new(vec![FactorCurves::empty()]).unwrap_err();
        assert!(matches!(err, EcoError::FactorMismatch { actual: 1, .. }));

        let set = RegionCurveSet::new(vec![FactorCurves::empty(); FACTOR_COUNT]).unwrap();
        assert!(set.itree_codes().is_empty());
    }

    #[test]
    fn test_load_factor_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("co2_storage.csv");
        write_file(
            &path,
            "itree_code,2.5,10,20\nACRU,1,4.5,9\nBDS OTHER,0.5,2.25,4.5\n",
        );

        let curves = load_factor_file(&path).unwrap();
        assert_eq!(curves.breaks(), &[2.5, 10.0, 20.0]);
        assert_eq!(curves.len(), 2);
        assert_eq!(curves.curve("ACRU").unwrap().values(), &[1.0, 4.5, 9.0]);
        assert_eq!(curves.curve("BDS OTHER").unwrap().values(), &[0.5, 2.25, 4.5]);
    }

    #[test]
    fn test_load_factor_file_rejects_bad_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bvoc.csv");
        write_file(&path, "itree_code,small,large\nACRU,1,2\n");

        let err = load_factor_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("not a number"));
    }

    #[test]
    fn test_load_region_missing_factor_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("co2_storage.csv"), "itree_code,1,2\nACRU,1,2\n");

        assert!(load_region(dir.path()).is_err());
    }

    #[test]
    fn test_curve_new_rejects_mismatched_lengths() {
        assert!(Curve::new(&[1.0, 2.0], &[1.0]).is_none());
        assert!(Curve::new(&[], &[]).is_none());
        assert!(Curve::new(&[1.0, 2.0], &[3.0, 4.0]).is_some());
    }

    #[test]
    fn test_load_factor_file_late_float_after_integer_rows() {
        // Integer-only leading rows must not pin the value columns to i64
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bvoc.csv");
        let mut contents = String::from("itree_code,3.81,11.43\n");
        for i in 0..150 {
            contents.push_str(&format!("CODE{},0,0\n", i));
        }
        contents.push_str("LATE,-0.0012,-0.0045\n");
        write_file(&path, &contents);

        let curves = load_factor_file(&path).unwrap();
        assert_eq!(curves.len(), 151);
        assert_eq!(curves.curve("CODE0").unwrap().values(), &[0.0, 0.0]);
        assert_eq!(curves.curve("LATE").unwrap().values(), &[-0.0012, -0.0045]);
    }

    #[test]
    fn test_curve_store_skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        let region = dir.path().join("NoEastXXX");
        fs::create_dir_all(&region).unwrap();
        for factor in FACTORS {
            write_file(&region.join(format!("{}.csv", factor)), "itree_code,1,2\nACRU,1,2\n");
        }
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join(".cache")).unwrap();

        let store = CurveStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains_region("NoEastXXX"));
        assert!(!store.contains_region(".git"));
    }
}
