//! Urban Tree Ecobenefits
//!
//! Estimates the environmental benefits of individual trees (air quality,
//! carbon, stormwater, energy) from region- and species-specific breakpoint
//! curves.
//!
//! - `factors`: canonical benefit factor table and `BenefitVector`
//! - `species`: OTM species code → i-Tree code per region
//! - `curves`: per-region, per-factor breakpoint curves (CSV via Polars)
//! - `interpolate`: piecewise-linear curve evaluation
//! - `aggregate`: batch traversal and summation
//! - `cache`: generation-swapped data cache with explicit invalidation
//! - `api_server`: Axum REST surface (`api` feature)

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod curves;
pub mod error;
pub mod factors;
pub mod interpolate;
pub mod species;

#[cfg(feature = "api")]
pub mod api_server;

// Re-export commonly used types
pub use aggregate::{calc_benefits, Accumulation, BenefitResults, TreeBatch, TreeRecord};
pub use cache::{EcoCache, Generation, RegionMismatch};
pub use config::Config;
pub use curves::{Curve, CurveStore, FactorCurves, RegionCurveSet};
pub use error::{EcoError, EcoResult, ErrorKind};
pub use factors::{BenefitVector, FACTORS, FACTOR_COUNT};
pub use interpolate::{calc_one_tree, interpolate};
pub use species::SpeciesMap;

#[cfg(feature = "api")]
pub use api_server::{create_router, AppState};
