//! Benefit Factor Table
//!
//! The canonical, ordered list of benefit factors. Every per-factor array in
//! the crate (curve sets, benefit vectors) is indexed by position in
//! [`FACTORS`].

use crate::error::{EcoError, EcoResult};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::ops::{AddAssign, Index, IndexMut};

/// Ordered benefit factor names
pub const FACTORS: [&str; 15] = [
    "aq_nox_avoided",
    "aq_nox_dep",
    "aq_ozone_dep",
    "aq_pm10_avoided",
    "aq_pm10_dep",
    "aq_sox_avoided",
    "aq_sox_dep",
    "aq_voc_avoided",
    "bvoc",
    "co2_avoided",
    "co2_sequestered",
    "co2_storage",
    "electricity",
    "hydro_interception",
    "natural_gas",
];

pub const FACTOR_COUNT: usize = FACTORS.len();

/// Position of a factor in [`FACTORS`]
pub fn factor_index(name: &str) -> Option<usize> {
    FACTORS.iter().position(|f| *f == name)
}

/// Per-factor benefit values for one tree or an aggregate of trees
///
/// Fixed length keeps values aligned with [`FACTORS`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenefitVector([f64; FACTOR_COUNT]);

impl Default for BenefitVector {
    fn default() -> Self {
        Self::zero()
    }
}

impl BenefitVector {
    pub fn zero() -> Self {
        BenefitVector([0.0; FACTOR_COUNT])
    }

    pub fn from_array(values: [f64; FACTOR_COUNT]) -> Self {
        BenefitVector(values)
    }

    /// Build from a slice that must have exactly one value per factor
    pub fn try_from_slice(values: &[f64]) -> EcoResult<Self> {
        let array: [f64; FACTOR_COUNT] =
            values.try_into().map_err(|_| EcoError::FactorMismatch {
                expected: FACTOR_COUNT,
                actual: values.len(),
            })?;
        Ok(BenefitVector(array))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value for a named factor
    pub fn get(&self, factor: &str) -> Option<f64> {
        factor_index(factor).map(|i| self.0[i])
    }

    /// Zip factor names with values
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        FACTORS.iter().copied().zip(self.0.iter().copied()).collect()
    }

    /// Iterate `(factor, value)` pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FACTORS.iter().copied().zip(self.0.iter().copied())
    }
}

impl Index<usize> for BenefitVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for BenefitVector {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl AddAssign<&BenefitVector> for BenefitVector {
    fn add_assign(&mut self, rhs: &BenefitVector) {
        for (acc, v) in self.0.iter_mut().zip(rhs.0.iter()) {
            *acc += v;
        }
    }
}

// Serialized as a {factor: value} object in table order
impl Serialize for BenefitVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FACTOR_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}
